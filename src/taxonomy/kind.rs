//! 错误种类与分类表
//!
//! 新增一个 `ErrorKind` 时，编译器会强制补齐 `category` / `retryable` / `user_message`
//! 三张表（全部是穷尽的 `match`，不允许 `_` 分支）

use serde::{Deserialize, Serialize};
use std::fmt;

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// 临时性故障，可重试
    Temporary,
    /// 远端页面结构变化，需要改代码
    Configuration,
    /// 凭据被拒绝
    Credentials,
    /// 无权访问该目标
    Permission,
    /// 未分类
    Unknown,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Temporary => "temporary",
            Category::Configuration => "configuration",
            Category::Credentials => "credentials",
            Category::Permission => "permission",
            Category::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 错误种类（封闭枚举）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ServerUnavailable,
    ServerError,
    NetworkError,
    SessionExpired,
    RateLimited,
    WafBlocked,
    LoginPageChanged,
    PostSsoPageChanged,
    ApiShapeChanged,
    ChallengeChanged,
    InvalidCredentials,
    NotAuthorized,
    ExtractionFailed,
    NoDataFound,
    UnexpectedRedirect,
    ChallengeFailed,
    ScriptError,
    Cancelled,
}

/// 线上编码 → 种类
static KIND_BY_CODE: phf::Map<&'static str, ErrorKind> = phf::phf_map! {
    "SERVER_UNAVAILABLE" => ErrorKind::ServerUnavailable,
    "SERVER_ERROR" => ErrorKind::ServerError,
    "NETWORK_ERROR" => ErrorKind::NetworkError,
    "SESSION_EXPIRED" => ErrorKind::SessionExpired,
    "RATE_LIMITED" => ErrorKind::RateLimited,
    "WAF_BLOCKED" => ErrorKind::WafBlocked,
    "LOGIN_PAGE_CHANGED" => ErrorKind::LoginPageChanged,
    "POST_SSO_PAGE_CHANGED" => ErrorKind::PostSsoPageChanged,
    "API_SHAPE_CHANGED" => ErrorKind::ApiShapeChanged,
    "CHALLENGE_CHANGED" => ErrorKind::ChallengeChanged,
    "INVALID_CREDENTIALS" => ErrorKind::InvalidCredentials,
    "NOT_AUTHORIZED" => ErrorKind::NotAuthorized,
    "EXTRACTION_FAILED" => ErrorKind::ExtractionFailed,
    "NO_DATA_FOUND" => ErrorKind::NoDataFound,
    "UNEXPECTED_REDIRECT" => ErrorKind::UnexpectedRedirect,
    "CHALLENGE_FAILED" => ErrorKind::ChallengeFailed,
    "SCRIPT_ERROR" => ErrorKind::ScriptError,
    "CANCELLED" => ErrorKind::Cancelled,
};

impl ErrorKind {
    /// 全部种类，测试与报表使用
    pub const ALL: [ErrorKind; 18] = [
        ErrorKind::ServerUnavailable,
        ErrorKind::ServerError,
        ErrorKind::NetworkError,
        ErrorKind::SessionExpired,
        ErrorKind::RateLimited,
        ErrorKind::WafBlocked,
        ErrorKind::LoginPageChanged,
        ErrorKind::PostSsoPageChanged,
        ErrorKind::ApiShapeChanged,
        ErrorKind::ChallengeChanged,
        ErrorKind::InvalidCredentials,
        ErrorKind::NotAuthorized,
        ErrorKind::ExtractionFailed,
        ErrorKind::NoDataFound,
        ErrorKind::UnexpectedRedirect,
        ErrorKind::ChallengeFailed,
        ErrorKind::ScriptError,
        ErrorKind::Cancelled,
    ];

    /// 线上编码（与 serde 序列化结果一致）
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::ServerUnavailable => "SERVER_UNAVAILABLE",
            ErrorKind::ServerError => "SERVER_ERROR",
            ErrorKind::NetworkError => "NETWORK_ERROR",
            ErrorKind::SessionExpired => "SESSION_EXPIRED",
            ErrorKind::RateLimited => "RATE_LIMITED",
            ErrorKind::WafBlocked => "WAF_BLOCKED",
            ErrorKind::LoginPageChanged => "LOGIN_PAGE_CHANGED",
            ErrorKind::PostSsoPageChanged => "POST_SSO_PAGE_CHANGED",
            ErrorKind::ApiShapeChanged => "API_SHAPE_CHANGED",
            ErrorKind::ChallengeChanged => "CHALLENGE_CHANGED",
            ErrorKind::InvalidCredentials => "INVALID_CREDENTIALS",
            ErrorKind::NotAuthorized => "NOT_AUTHORIZED",
            ErrorKind::ExtractionFailed => "EXTRACTION_FAILED",
            ErrorKind::NoDataFound => "NO_DATA_FOUND",
            ErrorKind::UnexpectedRedirect => "UNEXPECTED_REDIRECT",
            ErrorKind::ChallengeFailed => "CHALLENGE_FAILED",
            ErrorKind::ScriptError => "SCRIPT_ERROR",
            ErrorKind::Cancelled => "CANCELLED",
        }
    }

    /// 从线上编码解析
    pub fn from_code(code: &str) -> Option<Self> {
        KIND_BY_CODE.get(code).copied()
    }

    pub fn category(self) -> Category {
        match self {
            ErrorKind::ServerUnavailable
            | ErrorKind::ServerError
            | ErrorKind::NetworkError
            | ErrorKind::SessionExpired
            | ErrorKind::RateLimited
            | ErrorKind::WafBlocked => Category::Temporary,
            ErrorKind::LoginPageChanged
            | ErrorKind::PostSsoPageChanged
            | ErrorKind::ApiShapeChanged
            | ErrorKind::ChallengeChanged => Category::Configuration,
            ErrorKind::InvalidCredentials => Category::Credentials,
            ErrorKind::NotAuthorized => Category::Permission,
            ErrorKind::ExtractionFailed
            | ErrorKind::NoDataFound
            | ErrorKind::UnexpectedRedirect
            | ErrorKind::ChallengeFailed
            | ErrorKind::ScriptError
            | ErrorKind::Cancelled => Category::Unknown,
        }
    }

    pub fn retryable(self) -> bool {
        match self {
            ErrorKind::ServerUnavailable
            | ErrorKind::ServerError
            | ErrorKind::NetworkError
            | ErrorKind::SessionExpired
            | ErrorKind::RateLimited
            | ErrorKind::WafBlocked => true,
            ErrorKind::LoginPageChanged
            | ErrorKind::PostSsoPageChanged
            | ErrorKind::ApiShapeChanged
            | ErrorKind::ChallengeChanged => false,
            ErrorKind::InvalidCredentials => false,
            ErrorKind::NotAuthorized => false,
            // 未知错误默认视为临时故障
            ErrorKind::ExtractionFailed
            | ErrorKind::UnexpectedRedirect
            | ErrorKind::ChallengeFailed
            | ErrorKind::ScriptError => true,
            // 终止但不算故障
            ErrorKind::NoDataFound => false,
            ErrorKind::Cancelled => false,
        }
    }

    /// 面向最终用户的提示（葡萄牙语，界面直接展示）
    pub fn user_message(self) -> &'static str {
        match self {
            ErrorKind::ServerUnavailable => {
                "O sistema do tribunal está indisponível no momento. Tentaremos novamente."
            }
            ErrorKind::ServerError => {
                "O sistema do tribunal retornou um erro interno. Tentaremos novamente."
            }
            ErrorKind::NetworkError => "Falha de comunicação com o tribunal. Tentaremos novamente.",
            ErrorKind::SessionExpired => "A sessão expirou durante a consulta. Tentaremos novamente.",
            ErrorKind::RateLimited => {
                "O tribunal limitou o número de requisições. Tentaremos novamente mais tarde."
            }
            ErrorKind::WafBlocked => {
                "O acesso foi bloqueado temporariamente pelo firewall do tribunal."
            }
            ErrorKind::LoginPageChanged => {
                "A página de login do tribunal mudou. Nossa equipe foi notificada."
            }
            ErrorKind::PostSsoPageChanged => {
                "A página de autenticação única (SSO) mudou. Nossa equipe foi notificada."
            }
            ErrorKind::ApiShapeChanged => {
                "O formato dos dados do tribunal mudou. Nossa equipe foi notificada."
            }
            ErrorKind::ChallengeChanged => {
                "A verificação de segurança (captcha) do tribunal mudou. Nossa equipe foi notificada."
            }
            ErrorKind::InvalidCredentials => "CPF ou senha inválidos. Verifique as credenciais cadastradas.",
            ErrorKind::NotAuthorized => "O usuário não tem permissão para acessar este tribunal.",
            ErrorKind::ExtractionFailed => "Falha ao extrair os dados do tribunal. Tentaremos novamente.",
            ErrorKind::NoDataFound => "Nenhum processo encontrado para este usuário.",
            ErrorKind::UnexpectedRedirect => {
                "O tribunal redirecionou para uma página inesperada. Tentaremos novamente."
            }
            ErrorKind::ChallengeFailed => {
                "Não foi possível resolver a verificação de segurança. Tentaremos novamente."
            }
            ErrorKind::ScriptError => "Erro inesperado durante a automação. Tentaremos novamente.",
            ErrorKind::Cancelled => "A execução foi cancelada.",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_round_trips_through_its_code() {
        for kind in ErrorKind::ALL {
            assert_eq!(ErrorKind::from_code(kind.code()), Some(kind));
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, serde_json::json!(kind.code()));
        }
        assert_eq!(ErrorKind::from_code("NOPE"), None);
    }

    #[test]
    fn temporary_kinds_are_retryable() {
        for kind in ErrorKind::ALL {
            if kind.category() == Category::Temporary {
                assert!(kind.retryable(), "{kind} 应可重试");
            }
            if matches!(
                kind.category(),
                Category::Configuration | Category::Credentials | Category::Permission
            ) {
                assert!(!kind.retryable(), "{kind} 不应重试");
            }
        }
    }

    #[test]
    fn no_data_found_is_terminal() {
        assert_eq!(ErrorKind::NoDataFound.category(), Category::Unknown);
        assert!(!ErrorKind::NoDataFound.retryable());
        assert!(ErrorKind::ScriptError.retryable());
    }
}

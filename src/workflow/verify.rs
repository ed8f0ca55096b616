//! 登录落地页判定
//!
//! 判定顺序固定：防火墙拦截 → 仍在身份提供方 → 服务器错误 → 目标域名 → 其他。
//! 一个页面可能同时命中多个特征（例如仍在 SSO 域名下的错误页），顺序保证结果唯一。

use crate::models::session::{host_of, host_matches};
use crate::models::TargetDescriptor;
use crate::taxonomy::{ClassifiedError, ErrorKind, StageResult};

const DEFAULT_WAF_MARKERS: &[&str] = &[
    "request rejected",
    "the requested url was rejected",
    "403 forbidden",
    "access denied",
    "support id",
];

const DEFAULT_SERVER_ERROR_MARKERS: &[&str] = &[
    "401 unauthorized",
    "500 internal server error",
    "503 service unavailable",
    "service unavailable",
    "erro interno do servidor",
    "serviço indisponível",
];

/// 提交凭据后读取到的页面
#[derive(Debug, Clone, Default)]
pub struct LandingPage {
    pub url: String,
    pub title: String,
    pub content: String,
}

impl LandingPage {
    fn contains_any<'m>(&self, markers: impl IntoIterator<Item = &'m str>) -> Option<&'m str> {
        let title = self.title.to_lowercase();
        let content = self.content.to_lowercase();
        markers.into_iter().find(|marker| {
            let marker = marker.to_lowercase();
            !marker.is_empty() && (title.contains(&marker) || content.contains(&marker))
        })
    }
}

/// 判定落地页；成功返回 `Ok(())`
pub fn verify_landing(page: &LandingPage, target: &TargetDescriptor) -> StageResult<()> {
    let login = &target.login;
    let host = host_of(&page.url).unwrap_or_default();

    let waf = DEFAULT_WAF_MARKERS
        .iter()
        .copied()
        .chain(login.waf_markers.iter().map(String::as_str));
    if let Some(marker) = page.contains_any(waf) {
        return Err(ClassifiedError::new(
            ErrorKind::WafBlocked,
            format!("防火墙拦截 (特征 '{}') @ {}", marker, page.url),
        ));
    }

    if still_on_login(page, target, &host) {
        return Err(ClassifiedError::new(
            ErrorKind::InvalidCredentials,
            format!("提交凭据后仍停留在登录页: {}", page.url),
        ));
    }

    let server_errors = DEFAULT_SERVER_ERROR_MARKERS
        .iter()
        .copied()
        .chain(login.error_markers.iter().map(String::as_str));
    if let Some(marker) = page.contains_any(server_errors) {
        return Err(ClassifiedError::new(
            ErrorKind::ServerUnavailable,
            format!("服务器错误页 (特征 '{}') @ {}", marker, page.url),
        ));
    }

    let target_domain = host_of(&target.base_url).unwrap_or_default();
    if host_matches(&host, &target_domain) {
        return Ok(());
    }

    Err(ClassifiedError::new(
        ErrorKind::UnexpectedRedirect,
        format!("登录后跳转到未知页面: {} (期望 {})", page.url, target_domain),
    ))
}

/// SSO 流程看身份提供方域名；直接表单流程看是否仍是登录地址
fn still_on_login(page: &LandingPage, target: &TargetDescriptor, host: &str) -> bool {
    if let Some(idp) = target.login.identity_provider_domain.as_deref() {
        if host_matches(host, idp) {
            return true;
        }
    }
    strip_query(&page.url) == strip_query(&target.login_url)
}

fn strip_query(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    url[..end].trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::target;
    use crate::taxonomy::Category;

    fn page(url: &str, content: &str) -> LandingPage {
        LandingPage {
            url: url.to_string(),
            title: String::new(),
            content: content.to_string(),
        }
    }

    #[test]
    fn identity_provider_wins_over_transient_error_markers() {
        let trt2 = target("trt2");
        let landing = page(
            "https://sso.cloud.pje.jus.br/auth/realms/pje/login-actions/authenticate",
            "<h1>500 Internal Server Error</h1>",
        );
        let err = verify_landing(&landing, &trt2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
        assert_eq!(err.category(), Category::Credentials);
        assert!(!err.retryable());
    }

    #[test]
    fn firewall_block_is_checked_first() {
        let trt2 = target("trt2");
        let landing = page(
            "https://sso.cloud.pje.jus.br/auth",
            "The requested URL was rejected. Your support ID is: 1234",
        );
        let err = verify_landing(&landing, &trt2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WafBlocked);
        assert!(err.retryable());
    }

    #[test]
    fn server_error_on_target_domain_is_temporary() {
        let trt2 = target("trt2");
        let landing = page("https://pje.trt2.jus.br/pjekz/", "503 Service Unavailable");
        let err = verify_landing(&landing, &trt2).unwrap_err();
        assert_eq!(err.category(), Category::Temporary);
    }

    #[test]
    fn target_domain_is_success() {
        let trt2 = target("trt2");
        let landing = page("https://pje.trt2.jus.br/pjekz/painel/usuario-externo", "Painel");
        assert!(verify_landing(&landing, &trt2).is_ok());
    }

    #[test]
    fn anything_else_is_an_unexpected_redirect() {
        let trt2 = target("trt2");
        let landing = page("https://www.cnj.jus.br/", "Portal");
        let err = verify_landing(&landing, &trt2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedRedirect);
        assert_eq!(err.category(), Category::Unknown);
        assert!(err.retryable());
    }

    #[test]
    fn direct_form_still_on_login_url_is_rejected_credentials() {
        let tjsp = target("tjsp");
        let landing = page("https://esaj.tjsp.jus.br/sajcas/login?service=x", "Usuário ou senha inválidos");
        let err = verify_landing(&landing, &tjsp).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
    }

    #[test]
    fn per_target_markers_extend_the_defaults() {
        let mut tjsp = target("tjsp");
        tjsp.login.error_markers = vec!["Sistema em manutenção".to_string()];
        let landing = page("https://esaj.tjsp.jus.br/esaj/portal.do", "SISTEMA EM MANUTENÇÃO");
        let err = verify_landing(&landing, &tjsp).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ServerUnavailable);
    }
}

//! 目标描述：一个法院系统的全部可配置差异（URL、选择器、登录流程、分页方式、特殊行为）

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::record::RecordKind;
use crate::error::{AppError, AppResult};

/// 部署时确定、运行时只读的目标描述
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetDescriptor {
    pub id: String,
    pub name: String,
    pub base_url: String,
    pub login_url: String,
    /// 登录后页面会先闪出一个错误页，需要强制刷新一次
    #[serde(default)]
    pub requires_reload_after_login: bool,
    pub login: LoginConfig,
    pub navigation: Navigation,
}

/// 登录流程
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoginFlow {
    /// 登录页直接是表单
    #[default]
    DirectForm,
    /// 先点击跳转到身份提供方页面
    SsoRedirect,
    /// 身份提供方之前有语音验证码
    SsoWithChallenge,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginConfig {
    #[serde(default)]
    pub flow: LoginFlow,
    pub username_selector: String,
    pub password_selector: String,
    pub submit_selector: String,
    #[serde(default)]
    pub sso_button_selector: Option<String>,
    #[serde(default)]
    pub identity_provider_domain: Option<String>,
    /// 未设置时取 `Config::element_timeout_secs`
    #[serde(default)]
    pub field_timeout_secs: Option<u64>,
    /// 有些目标在 direct-form 流程下也会出现验证码
    #[serde(default)]
    pub challenge: Option<ChallengeConfig>,
    /// 额外的防火墙拦截特征
    #[serde(default)]
    pub waf_markers: Vec<String>,
    /// 额外的服务器错误特征
    #[serde(default)]
    pub error_markers: Vec<String>,
}

impl LoginConfig {
    pub fn field_timeout(&self) -> Duration {
        Duration::from_secs(self.field_timeout_secs.unwrap_or(DEFAULT_ELEMENT_TIMEOUT_SECS))
    }

    pub fn uses_sso(&self) -> bool {
        matches!(self.flow, LoginFlow::SsoRedirect | LoginFlow::SsoWithChallenge)
    }
}

/// 语音验证码
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeConfig {
    /// 切换到语音模式的按钮
    #[serde(default)]
    pub audio_button_selector: Option<String>,
    /// 依次尝试的音频定位器
    #[serde(default = "default_audio_locators")]
    pub audio_locators: Vec<String>,
    pub answer_selector: String,
    pub submit_selector: String,
    /// 验证通过后应出现的元素（通常是登录表单）
    pub success_selector: String,
    #[serde(default = "default_challenge_timeout_secs")]
    pub success_timeout_secs: u64,
    /// 识别服务直接接受的格式
    #[serde(default = "default_accepted_formats")]
    pub accepted_formats: Vec<String>,
}

impl ChallengeConfig {
    pub fn success_timeout(&self) -> Duration {
        Duration::from_secs(self.success_timeout_secs)
    }
}

/// 导航模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NavigationMode {
    ApiPaginated,
    TreePaginated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum Navigation {
    ApiPaginated(ApiPagination),
    TreePaginated(TreePagination),
}

impl Navigation {
    pub fn mode(&self) -> NavigationMode {
        match self {
            Navigation::ApiPaginated(_) => NavigationMode::ApiPaginated,
            Navigation::TreePaginated(_) => NavigationMode::TreePaginated,
        }
    }
}

/// REST 分页接口
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiPagination {
    /// 含 `{page}`（从 1 开始）和可选 `{size}` 占位符
    pub endpoint: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// 硬上限，防止来源异常导致无限翻页
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_records_field")]
    pub records_field: String,
    #[serde(default = "default_total_pages_field")]
    pub total_pages_field: String,
    #[serde(default = "default_key_field")]
    pub key_field: String,
    /// 从该 cookie 读取令牌并作为 Bearer 发送
    #[serde(default)]
    pub auth_cookie: Option<String>,
    /// 单条详情接口，含 `{key}` 占位符；失败不影响主记录
    #[serde(default)]
    pub detail_endpoint: Option<String>,
    #[serde(default)]
    pub record_kind: RecordKind,
}

impl ApiPagination {
    pub fn page_url(&self, page: u32) -> String {
        self.endpoint
            .replace("{page}", &page.to_string())
            .replace("{size}", &self.page_size.to_string())
    }

    pub fn detail_url(&self, key: &str) -> Option<String> {
        self.detail_endpoint
            .as_ref()
            .map(|endpoint| endpoint.replace("{key}", key))
    }
}

/// 树形页面（地区 → 收件箱 → 表格）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreePagination {
    /// 树所在页面；为空表示登录后的当前页
    #[serde(default)]
    pub tree_url: Option<String>,
    pub node_selector: String,
    #[serde(default)]
    pub node_label_selector: Option<String>,
    pub node_count_selector: String,
    /// 节点展开后的收件箱（相对节点）
    pub inbox_selector: String,
    pub table_selector: String,
    pub row_selector: String,
    pub next_page_selector: String,
    pub fields: Vec<FieldRule>,
    #[serde(default = "default_key_field")]
    pub key_field: String,
    /// 结构化选择器取不到案号时，对整行文本使用的正则
    #[serde(default = "default_case_number_pattern")]
    pub case_number_pattern: String,
    /// 未设置时取 `Config::element_timeout_secs`
    #[serde(default)]
    pub table_timeout_secs: Option<u64>,
    /// 单个节点的翻页上限，"下一页"控件失灵时不至于无限翻页
    #[serde(default = "default_max_pages")]
    pub max_pages_per_node: u32,
    #[serde(default)]
    pub record_kind: RecordKind,
}

impl TreePagination {
    pub fn table_timeout(&self) -> Duration {
        Duration::from_secs(self.table_timeout_secs.unwrap_or(DEFAULT_ELEMENT_TIMEOUT_SECS))
    }
}

/// 单元格映射规则
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRule {
    pub name: String,
    /// 相对行的选择器
    pub selector: String,
    /// 读取属性而不是文本
    #[serde(default)]
    pub attribute: Option<String>,
}

impl TargetDescriptor {
    /// 目录里没写的元素等待超时改用全局配置
    pub fn fill_element_timeouts(&mut self, secs: u64) {
        if self.login.field_timeout_secs.is_none() {
            self.login.field_timeout_secs = Some(secs);
        }
        if let Navigation::TreePaginated(tree) = &mut self.navigation {
            if tree.table_timeout_secs.is_none() {
                tree.table_timeout_secs = Some(secs);
            }
        }
    }

    /// 加载时校验，配置错误不应拖到运行时
    pub fn validate(&self) -> AppResult<()> {
        let fail = |reason: &str| Err(AppError::invalid_target(&self.id, reason));

        if self.id.trim().is_empty() {
            return Err(AppError::invalid_target("<vazio>", "id vazio"));
        }
        for (name, url) in [("base_url", &self.base_url), ("login_url", &self.login_url)] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return fail(&format!("{} inválida: {}", name, url));
            }
        }

        let login = &self.login;
        if [
            &login.username_selector,
            &login.password_selector,
            &login.submit_selector,
        ]
        .iter()
        .any(|s| s.trim().is_empty())
        {
            return fail("seletor de login vazio");
        }
        if login.uses_sso() {
            if login.sso_button_selector.as_deref().map_or(true, str::is_empty) {
                return fail("fluxo SSO sem sso_button_selector");
            }
            if login.identity_provider_domain.as_deref().map_or(true, str::is_empty) {
                return fail("fluxo SSO sem identity_provider_domain");
            }
        }
        if login.flow == LoginFlow::SsoWithChallenge && login.challenge.is_none() {
            return fail("fluxo sso-with-challenge sem [login.challenge]");
        }
        if let Some(challenge) = &login.challenge {
            if challenge.audio_locators.is_empty() {
                return fail("desafio sem audio_locators");
            }
        }

        match &self.navigation {
            Navigation::ApiPaginated(api) => {
                if !api.endpoint.contains("{page}") {
                    return fail("endpoint sem {page}");
                }
                if api.page_size == 0 || api.max_pages == 0 {
                    return fail("page_size e max_pages devem ser positivos");
                }
            }
            Navigation::TreePaginated(tree) => {
                if tree.max_pages_per_node == 0 {
                    return fail("max_pages_per_node deve ser positivo");
                }
                if tree.fields.is_empty() {
                    return fail("árvore sem regras de campo");
                }
                if let Err(e) = regex::Regex::new(&tree.case_number_pattern) {
                    return fail(&format!("case_number_pattern inválido: {}", e));
                }
            }
        }
        Ok(())
    }
}

/// 与 `Config::default().element_timeout_secs` 一致
const DEFAULT_ELEMENT_TIMEOUT_SECS: u64 = 15;

fn default_challenge_timeout_secs() -> u64 {
    20
}

fn default_page_size() -> u32 {
    100
}

fn default_max_pages() -> u32 {
    1000
}

fn default_records_field() -> String {
    "resultado".to_string()
}

fn default_total_pages_field() -> String {
    "qtdPaginas".to_string()
}

fn default_key_field() -> String {
    "numeroProcesso".to_string()
}

/// 统一编号（CNJ）：NNNNNNN-DD.AAAA.J.TR.OOOO
pub(crate) fn default_case_number_pattern() -> String {
    r"\d{7}-\d{2}\.\d{4}\.\d\.\d{2}\.\d{4}".to_string()
}

fn default_audio_locators() -> Vec<String> {
    vec![
        "audio#audioCaptcha source".to_string(),
        "audio source".to_string(),
        "audio".to_string(),
        "a[href*='audio']".to_string(),
    ]
}

fn default_accepted_formats() -> Vec<String> {
    vec!["wav".to_string(), "mp3".to_string()]
}

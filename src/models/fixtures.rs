//! 测试用目标描述

use super::loaders::parse_targets;
use super::target::TargetDescriptor;

pub(crate) const CATALOG: &str = r##"
[[targets]]
id = "trt2"
name = "TRT 2ª Região"
base_url = "https://pje.trt2.jus.br"
login_url = "https://pje.trt2.jus.br/primeirograu/login.seam"

[targets.login]
flow = "sso-redirect"
username_selector = "#username"
password_selector = "#password"
submit_selector = "#kc-login"
sso_button_selector = "#btnSsoPdpj"
identity_provider_domain = "sso.cloud.pje.jus.br"
field_timeout_secs = 1

[targets.navigation]
mode = "api-paginated"
endpoint = "https://pje.trt2.jus.br/pje-comum-api/api/processos?pagina={page}&tamanhoPagina={size}"
auth_cookie = "access_token"

[[targets]]
id = "trt15"
name = "TRT 15ª Região"
base_url = "https://pje.trt15.jus.br"
login_url = "https://pje.trt15.jus.br/primeirograu/login.seam"
requires_reload_after_login = true

[targets.login]
flow = "sso-with-challenge"
username_selector = "#username"
password_selector = "#password"
submit_selector = "#kc-login"
sso_button_selector = "#btnSsoPdpj"
identity_provider_domain = "sso.cloud.pje.jus.br"
field_timeout_secs = 1

[targets.login.challenge]
audio_button_selector = "#btnAudio"
audio_locators = ["#audioCaptcha source", "audio"]
answer_selector = "#captchaInput"
submit_selector = "#btnValidar"
success_selector = "#btnSsoPdpj"
success_timeout_secs = 1
accepted_formats = ["wav"]

[targets.navigation]
mode = "api-paginated"
endpoint = "https://pje.trt15.jus.br/pje-comum-api/api/processos?pagina={page}&tamanhoPagina={size}"

[[targets]]
id = "tjsp"
name = "TJSP"
base_url = "https://esaj.tjsp.jus.br"
login_url = "https://esaj.tjsp.jus.br/sajcas/login"

[targets.login]
username_selector = "#usernameForm"
password_selector = "#passwordForm"
submit_selector = "#pbEntrar"
field_timeout_secs = 1

[targets.navigation]
mode = "tree-paginated"
tree_url = "https://esaj.tjsp.jus.br/intimacoes/painel"
node_selector = ".tree-region"
node_count_selector = ".badge"
inbox_selector = ".inbox"
table_selector = "table#intimacoes"
row_selector = "tbody tr"
next_page_selector = "a.next:not(.disabled)"
key_field = "numeroProcesso"
table_timeout_secs = 1
record_kind = "intimacao"

[[targets.navigation.fields]]
name = "numeroProcesso"
selector = "td.processo a"

[[targets.navigation.fields]]
name = "prazo"
selector = "td.prazo"
"##;

pub(crate) fn target(id: &str) -> TargetDescriptor {
    parse_targets(CATALOG)
        .unwrap()
        .into_iter()
        .find(|t| t.id == id)
        .unwrap()
}

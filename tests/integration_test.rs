use std::collections::HashSet;
use std::time::Duration;

use tribunal_sync::browser::{BrowserFactory, ChromiumFactory, WaitCondition};
use tribunal_sync::models::parse_targets;
use tribunal_sync::taxonomy::{classify, make};
use tribunal_sync::workflow::{verify_landing, LandingPage};
use tribunal_sync::{Category, ClassifiedError, Config, ErrorKind, Phase, RunOutcome};

const CATALOG: &str = r##"
[[targets]]
id = "trt3"
name = "TRT 3ª Região"
base_url = "https://pje.trt3.jus.br"
login_url = "https://pje.trt3.jus.br/primeirograu/login.seam"

[targets.login]
flow = "sso-redirect"
username_selector = "#username"
password_selector = "#password"
submit_selector = "#kc-login"
sso_button_selector = "#btnSsoPdpj"
identity_provider_domain = "sso.cloud.pje.jus.br"

[targets.navigation]
mode = "api-paginated"
endpoint = "https://pje.trt3.jus.br/pje-comum-api/api/pautas?pagina={page}&tamanhoPagina={size}"
record_kind = "audiencia"
"##;

#[test]
fn every_kind_is_classified() {
    let mut codes = HashSet::new();
    for kind in ErrorKind::ALL {
        let classification = classify(kind);
        assert_eq!(classification.category, kind.category());
        assert!(!classification.user_message.is_empty(), "{:?}", kind);
        assert_eq!(ErrorKind::from_code(kind.code()), Some(kind));
        assert!(codes.insert(kind.code()), "código duplicado {}", kind.code());
    }
}

#[test]
fn only_terminal_unknown_kinds_are_not_retried() {
    for kind in ErrorKind::ALL {
        let expected = match kind.category() {
            Category::Temporary => true,
            Category::Unknown => !matches!(kind, ErrorKind::NoDataFound | ErrorKind::Cancelled),
            Category::Configuration | Category::Credentials | Category::Permission => false,
        };
        assert_eq!(kind.retryable(), expected, "{:?}", kind);
    }
}

#[test]
fn failed_outcome_report_matches_the_scheduler_contract() {
    let error: ClassifiedError = make(
        ErrorKind::WafBlocked,
        "403 em /pje-comum-api",
        Some(serde_json::json!({ "status": 403 })),
    );
    let report = serde_json::to_value(RunOutcome::failure(error, Phase::DataFetch).to_report())
        .unwrap();

    assert_eq!(report["success"], false);
    assert_eq!(report["processosCount"], 0);
    assert_eq!(report["error"]["type"], "WAF_BLOCKED");
    assert_eq!(report["error"]["category"], "temporary");
    assert_eq!(report["error"]["phase"], "data-fetch");
    assert_eq!(report["error"]["retryable"], true);
    assert_ne!(report["error"]["message"], report["error"]["technicalMessage"]);
}

#[test]
fn catalog_drives_landing_verification() {
    let targets = parse_targets(CATALOG).unwrap();
    let trt3 = &targets[0];

    let still_on_sso = LandingPage {
        url: "https://sso.cloud.pje.jus.br/auth/realms/pje/login-actions/authenticate".to_string(),
        title: "Erro".to_string(),
        content: "503 Service Unavailable".to_string(),
    };
    assert_eq!(
        verify_landing(&still_on_sso, trt3).unwrap_err().kind(),
        ErrorKind::InvalidCredentials
    );

    let painel = LandingPage {
        url: "https://pje.trt3.jus.br/pjekz/painel".to_string(),
        ..Default::default()
    };
    assert!(verify_landing(&painel, trt3).is_ok());
}

#[tokio::test]
#[ignore] // 需要本机 Chrome：cargo test -- --ignored
async fn opens_and_closes_a_real_browser_context() {
    let config = Config::from_env();
    let factory = ChromiumFactory::new(&config);
    let browser = factory.open().await.expect("打开浏览器失败");

    browser
        .navigate("https://example.com", WaitCondition::Load, Duration::from_secs(30))
        .await
        .expect("导航失败");
    let title = browser.title().await.expect("读取标题失败");
    assert!(title.contains("Example"));

    browser.close().await.expect("关闭失败");
}

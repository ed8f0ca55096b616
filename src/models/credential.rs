use serde::Deserialize;
use std::fmt;

/// 调用方持有的登录凭据，引擎只在一次运行中使用，不落盘
#[derive(Clone, Deserialize)]
pub struct Credential {
    id: String,
    secret: String,
}

impl Credential {
    pub fn new(id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            secret: secret.into(),
        }
    }

    /// CPF 或等价标识
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// 日志用的脱敏标识
    pub fn masked_id(&self) -> String {
        let visible: String = self.id.chars().take(3).collect();
        format!("{}***", visible)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.masked_id())
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_never_prints_the_secret() {
        let credential = Credential::new("12345678900", "s3nh@");
        let printed = format!("{:?}", credential);
        assert!(!printed.contains("s3nh@"));
        assert!(!printed.contains("12345678900"));
        assert!(printed.contains("123***"));
    }
}

use async_trait::async_trait;

/// Application identifier/secret pair. Constructed once at startup and
/// passed by reference into the adapter; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppCredentials {
    pub app_id: String,
    pub app_password: String,
}

impl AppCredentials {
    pub fn new(app_id: impl Into<String>, app_password: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_password: app_password.into(),
        }
    }

    /// Anonymous credentials, used by emulator-style local setups.
    pub fn anonymous() -> Self {
        Self::new("", "")
    }

    pub fn is_empty(&self) -> bool {
        self.app_id.trim().is_empty()
    }
}

/// Answers whether a given application identifier is authorized.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn is_valid_app_id(&self, app_id: &str) -> bool;

    /// True when no application id is configured at all, in which case
    /// inbound authentication is skipped (local emulator flows).
    fn is_authentication_disabled(&self) -> bool {
        false
    }
}

/// Provider backed by a single configured application id.
#[derive(Debug, Clone)]
pub struct SimpleCredentialProvider {
    app_id: String,
}

impl SimpleCredentialProvider {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for SimpleCredentialProvider {
    async fn is_valid_app_id(&self, app_id: &str) -> bool {
        !self.app_id.is_empty() && self.app_id == app_id
    }

    fn is_authentication_disabled(&self) -> bool {
        self.app_id.trim().is_empty()
    }
}

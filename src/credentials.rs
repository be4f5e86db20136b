//! Resolution of the GitLab URL and API token at submission time.

use crate::config::ConfigManager;
use crate::secrets::SecretsManager;
use log::warn;

/// Everything needed to call the GitLab API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub gitlab_url: String,
    pub api_token: String,
}

/// Supplies the configured GitLab instance and token. Read on every use so settings
/// changes apply without a restart.
pub trait CredentialSource: Send + Sync + 'static {
    fn gitlab_url(&self) -> Option<String>;
    fn api_token(&self) -> Option<String>;

    /// Both values, or `None` when either is missing.
    fn credentials(&self) -> Option<Credentials> {
        Some(Credentials {
            gitlab_url: self.gitlab_url()?,
            api_token: self.api_token()?,
        })
    }
}

/// Production source: URL from `config.json` (or env), token from the keyring (or env).
pub struct StoredCredentials {
    config: ConfigManager,
    secrets: SecretsManager,
}

impl StoredCredentials {
    pub fn new(config: ConfigManager, secrets: SecretsManager) -> Self {
        Self { config, secrets }
    }
}

impl CredentialSource for StoredCredentials {
    fn gitlab_url(&self) -> Option<String> {
        self.config.load().effective_gitlab_url()
    }

    fn api_token(&self) -> Option<String> {
        match self.secrets.get_token() {
            Ok(token) => token,
            Err(err) => {
                warn!("API token unavailable: {}", err);
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::CredentialSource;

    /// Fixed credentials for coordinator tests.
    pub struct StaticCredentials {
        pub gitlab_url: Option<String>,
        pub api_token: Option<String>,
    }

    impl StaticCredentials {
        pub fn configured(url: impl Into<String>) -> Self {
            Self {
                gitlab_url: Some(url.into()),
                api_token: Some("test-token".to_string()),
            }
        }

        pub fn missing() -> Self {
            Self {
                gitlab_url: None,
                api_token: None,
            }
        }
    }

    impl CredentialSource for StaticCredentials {
        fn gitlab_url(&self) -> Option<String> {
            self.gitlab_url.clone()
        }

        fn api_token(&self) -> Option<String> {
            self.api_token.clone()
        }
    }
}

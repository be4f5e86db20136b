use keyring::{Entry, Error as KeyringError};
use std::sync::{Arc, Mutex};

/// Environment variable overriding the stored API token.
pub const GITLAB_TOKEN_ENV: &str = "GITLAB_TIMER_TOKEN";

const KEYRING_SERVICE: &str = "com.gitlab-timer";
const KEYRING_ACCOUNT: &str = "api-token";

/// Keeps the GitLab personal access token in the OS keyring with an in-process cache.
#[derive(Clone)]
pub struct SecretsManager {
    inner: Arc<SecretsInner>,
}

struct SecretsInner {
    keyring_service: String,
    token_cache: Mutex<Option<String>>,
}

impl SecretsManager {
    pub fn new() -> Self {
        Self::with_service(KEYRING_SERVICE)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        SecretsManager {
            inner: Arc::new(SecretsInner {
                keyring_service: service.into(),
                token_cache: Mutex::new(None),
            }),
        }
    }

    /// Returns the token from the environment, the cache or the keyring, in that order.
    pub fn get_token(&self) -> Result<Option<String>, String> {
        if let Some(token) = std::env::var(GITLAB_TOKEN_ENV)
            .ok()
            .and_then(|value| normalize_token(&value))
        {
            return Ok(Some(token));
        }

        {
            let cache = self.lock_cache()?;
            if cache.is_some() {
                return Ok(cache.clone());
            }
        }

        let token = self.load_token_from_store()?;
        *self.lock_cache()? = token.clone();
        Ok(token)
    }

    pub fn save_token(&self, token: &str) -> Result<(), String> {
        let token =
            normalize_token(token).ok_or_else(|| "API token must not be empty".to_string())?;
        self.persist_token(Some(&token))?;
        *self.lock_cache()? = Some(token);
        Ok(())
    }

    pub fn clear_token(&self) -> Result<(), String> {
        self.persist_token(None)?;
        *self.lock_cache()? = None;
        Ok(())
    }

    fn lock_cache(&self) -> Result<std::sync::MutexGuard<'_, Option<String>>, String> {
        self.inner
            .token_cache
            .lock()
            .map_err(|_| "Token cache is poisoned".to_string())
    }

    fn load_token_from_store(&self) -> Result<Option<String>, String> {
        let entry = self.token_entry()?;
        match entry.get_password() {
            Ok(secret) => Ok(normalize_token(&secret)),
            Err(KeyringError::NoEntry) => Ok(None),
            Err(err) => Err(format!("Failed to read token from keyring: {err}")),
        }
    }

    fn persist_token(&self, token: Option<&str>) -> Result<(), String> {
        let entry = self.token_entry()?;
        match token {
            Some(value) => entry
                .set_password(value)
                .map_err(|err| format!("Failed to store token in keyring: {err}")),
            None => match entry.delete_credential() {
                Ok(()) | Err(KeyringError::NoEntry) => Ok(()),
                Err(err) => Err(format!("Failed to delete token from keyring: {err}")),
            },
        }
    }

    fn token_entry(&self) -> Result<Entry, String> {
        Entry::new(&self.inner.keyring_service, KEYRING_ACCOUNT)
            .map_err(|err| format!("Failed to open keyring entry: {err}"))
    }
}

impl Default for SecretsManager {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_token(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Masks all but the last four characters for display.
pub fn mask_token(token: &str) -> String {
    let visible: String = token
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if token.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("****{visible}")
    }
}

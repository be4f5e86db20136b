use std::time::Duration;

const API_PATH: &str = "api/v4";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Where to reach a GitLab instance and how to authenticate.
#[derive(Clone, Debug)]
pub struct GitLabConfig {
    /// Instance URL such as `https://gitlab.example.com`, with or without a trailing slash.
    pub base_url: String,
    /// Personal access token sent as `PRIVATE-TOKEN`.
    pub token: String,
    pub user_agent: String,
    pub timeout: Duration,
}

impl GitLabConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            user_agent: format!("gitlab-timer/{}", env!("CARGO_PKG_VERSION")),
            timeout: REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, duration: Duration) -> Self {
        self.timeout = duration;
        self
    }

    /// Connection setup never waits longer than the whole request may take.
    pub fn connect_timeout(&self) -> Duration {
        self.timeout.min(CONNECT_TIMEOUT)
    }

    /// Root of the REST API, always ending with a slash.
    pub fn api_root(&self) -> String {
        format!("{}/{}/", self.base_url.trim_end_matches('/'), API_PATH)
    }
}

use crate::config::GitLabConfig;
use crate::error::{GitLabError, Result};
use crate::models::{Issue, TimeStats, User};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Client as HttpClient, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

const PRIVATE_TOKEN_HEADER: &str = "private-token";

#[derive(Clone)]
pub struct GitLabClient {
    http: HttpClient,
    config: GitLabConfig,
}

impl GitLabClient {
    pub fn new(config: GitLabConfig) -> Result<Self> {
        let http = build_http_client(&config)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &GitLabConfig {
        &self.config
    }

    pub async fn get<T>(&self, path: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.send_with_body(Method::GET, path, Option::<&Value>::None)
            .await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_with_body(Method::POST, path, Some(body)).await
    }

    pub async fn send_with_body<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url_for(path);
        tracing::debug!(%method, %url, "sending GitLab request");
        let mut request = self.http.request(method, url);
        if let Some(payload) = body {
            request = request.json(payload);
        }
        let response = request.send().await?;
        Self::parse_json(response).await
    }

    fn url_for(&self, path: &str) -> String {
        let mut base = self.config.api_root();
        base.push_str(path.trim_start_matches('/'));
        base
    }

    async fn parse_json<T>(response: Response) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let status = response.status();
        if status.is_success() {
            let body = response.text().await?;
            return serde_json::from_str::<T>(&body).map_err(GitLabError::from);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!(status = status.as_u16(), "GitLab request failed");
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Err(GitLabError::Authentication(
                GitLabError::from_response(status, &body).user_message(),
            ))
        } else {
            Err(GitLabError::from_response(status, &body))
        }
    }

    /// Adds spent time to an issue. `duration` uses GitLab's human syntax, e.g. `1h 30m`.
    pub async fn add_spent_time(
        &self,
        project_id: &str,
        issue_iid: &str,
        duration: &str,
    ) -> Result<TimeStats> {
        let path = format!(
            "projects/{}/issues/{}/add_spent_time",
            encode_path_segment(project_id),
            encode_path_segment(issue_iid)
        );
        let payload = SpentTimeRequest { duration };
        self.post(&path, &payload).await
    }

    pub async fn get_issue(&self, project_id: &str, issue_iid: &str) -> Result<Issue> {
        let path = format!(
            "projects/{}/issues/{}",
            encode_path_segment(project_id),
            encode_path_segment(issue_iid)
        );
        self.get(&path).await
    }

    /// Returns the account owning the configured token.
    pub async fn current_user(&self) -> Result<User> {
        self.get("user").await
    }
}

fn build_http_client(config: &GitLabConfig) -> Result<HttpClient> {
    let mut headers = HeaderMap::new();

    let mut token = header_value(config.token.clone())?;
    token.set_sensitive(true);
    headers.insert(HeaderName::from_static(PRIVATE_TOKEN_HEADER), token);
    headers.insert(USER_AGENT, header_value(config.user_agent.clone())?);

    HttpClient::builder()
        .default_headers(headers)
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout())
        .build()
        .map_err(|err| GitLabError::Other(err.to_string()))
}

fn header_value(value: String) -> Result<HeaderValue> {
    HeaderValue::from_str(&value).map_err(|err| GitLabError::Other(err.to_string()))
}

/// Percent-encodes a single path segment so `group/project` ids stay one segment.
fn encode_path_segment(value: &str) -> String {
    urlencoding::encode(value.trim()).into_owned()
}

#[derive(Debug, Serialize)]
struct SpentTimeRequest<'a> {
    duration: &'a str,
}

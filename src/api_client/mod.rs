//! Typed bindings over the backend REST surface. This is the only module
//! that talks to the network; everything above it works with raw wire
//! records or canonical feed items.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::types::{RsvpStatus, Scope};

pub mod wire;

pub use wire::{
    NewEvent, NewPoll, NewThread, RawAuthor, RawComment, RawEvent, RawPoll, RawPollOption,
    RawPollOptionFields, RawProfile, RawTags, RawThread,
};

#[derive(Error, Debug)]
pub enum ApiClientError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ApiClientError>;

/// Paged query for the thread list endpoint.
#[derive(Debug, Clone, Default)]
pub struct ThreadQuery {
    pub skip: usize,
    pub limit: usize,
    pub search: Option<String>,
    pub category: Option<Scope>,
    pub university: Option<String>,
    pub tag: Option<String>,
}

impl ThreadQuery {
    fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("skip", self.skip.to_string()),
            ("limit", self.limit.to_string()),
        ];
        if let Some(search) = &self.search {
            params.push(("search", search.clone()));
        }
        if let Some(category) = self.category {
            params.push(("category", category.as_str().to_string()));
        }
        if let Some(university) = &self.university {
            params.push(("university", university.clone()));
        }
        if let Some(tag) = &self.tag {
            params.push(("tag", tag.clone()));
        }
        params
    }
}

/// Query for the event list endpoint. Events have no cursor semantics beyond
/// one fixed page; `include_past` mirrors the server flag.
#[derive(Debug, Clone)]
pub struct EventQuery {
    pub skip: usize,
    pub limit: usize,
    pub university: Option<String>,
    pub include_past: bool,
}

impl Default for EventQuery {
    fn default() -> Self {
        EventQuery {
            skip: 0,
            limit: 10,
            university: None,
            include_past: false,
        }
    }
}

impl EventQuery {
    fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("skip", self.skip.to_string()),
            ("limit", self.limit.to_string()),
        ];
        if let Some(university) = &self.university {
            params.push(("university", university.clone()));
        }
        params.push(("include_past", self.include_past.to_string()));
        params
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl ApiClient {
    /// Default timeout for backend requests.
    pub(crate) fn default_timeout() -> Duration {
        Duration::from_secs(10)
    }

    pub fn new(base_url: impl Into<String>, auth_token: Option<String>) -> Result<Self> {
        Self::with_timeout(base_url, auth_token, Self::default_timeout())
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(ApiClient {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_token,
        })
    }

    /// Whether the client carries a caller identity. The scope resolver
    /// skips the profile fetch entirely without one.
    pub fn has_auth_token(&self) -> bool {
        self.auth_token.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.http.request(method, self.url(path));
        if let Some(token) = &self.auth_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("detail").and_then(|d| d.as_str().map(String::from)))
            .unwrap_or_else(|| body.trim().to_string());
        Err(ApiClientError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let response = self
            .request(reqwest::Method::GET, path)
            .query(params)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let response = self
            .request(reqwest::Method::POST, path)
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    // --- threads ---

    pub async fn list_threads(&self, query: &ThreadQuery) -> Result<Vec<RawThread>> {
        self.get_json("/api/threads/", &query.to_params()).await
    }

    pub async fn create_thread(&self, payload: &NewThread) -> Result<RawThread> {
        self.post_json("/api/threads/", payload).await
    }

    pub async fn vote_thread(&self, thread_id: i64, value: i8) -> Result<()> {
        let path = format!("/api/threads/{}/vote", thread_id);
        let _: serde_json::Value = self
            .post_json(&path, &serde_json::json!({ "value": value }))
            .await?;
        Ok(())
    }

    pub async fn report_thread(&self, thread_id: i64) -> Result<()> {
        let path = format!("/api/threads/{}/report", thread_id);
        let _: serde_json::Value = self.post_json(&path, &serde_json::json!({})).await?;
        Ok(())
    }

    pub async fn delete_thread(&self, thread_id: i64) -> Result<()> {
        let path = format!("/api/threads/{}", thread_id);
        let response = self.request(reqwest::Method::DELETE, &path).send().await?;
        let _: serde_json::Value = Self::decode(response).await?;
        Ok(())
    }

    pub async fn list_comments(
        &self,
        thread_id: i64,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<RawComment>> {
        let path = format!("/api/threads/{}/comments", thread_id);
        let params = [("skip", skip.to_string()), ("limit", limit.to_string())];
        self.get_json(&path, &params).await
    }

    pub async fn add_comment(&self, thread_id: i64, content: &str) -> Result<RawComment> {
        let path = format!("/api/threads/{}/comments", thread_id);
        self.post_json(&path, &serde_json::json!({ "content": content }))
            .await
    }

    // --- events ---

    pub async fn list_events(&self, query: &EventQuery) -> Result<Vec<RawEvent>> {
        self.get_json("/api/events/", &query.to_params()).await
    }

    pub async fn create_event(&self, payload: &NewEvent) -> Result<RawEvent> {
        self.post_json("/api/events/", payload).await
    }

    pub async fn rsvp_event(&self, event_id: i64, status: RsvpStatus) -> Result<()> {
        let path = format!("/api/events/{}/rsvp", event_id);
        let _: serde_json::Value = self
            .post_json(&path, &serde_json::json!({ "status": status.as_str() }))
            .await?;
        Ok(())
    }

    // --- polls ---

    pub async fn list_polls(
        &self,
        audience: Option<Scope>,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<RawPoll>> {
        let mut params = vec![("skip", skip.to_string()), ("limit", limit.to_string())];
        if let Some(audience) = audience {
            params.push(("audience", audience.as_str().to_string()));
        }
        self.get_json("/api/polls/", &params).await
    }

    pub async fn create_poll(&self, payload: &NewPoll) -> Result<RawPoll> {
        self.post_json("/api/polls/", payload).await
    }

    /// Casts (or toggles) a poll vote. The server answers with the updated
    /// poll record, which the caller folds back into the feed.
    pub async fn vote_poll(&self, poll_id: i64, option_label: &str) -> Result<RawPoll> {
        let path = format!("/api/polls/{}/vote", poll_id);
        self.post_json(&path, &serde_json::json!({ "option_label": option_label }))
            .await
    }

    // --- profile ---

    pub async fn fetch_my_profile(&self) -> Result<RawProfile> {
        self.get_json("/profiles/me", &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    async fn test_client(server: &mockito::ServerGuard) -> ApiClient {
        ApiClient::new(server.url(), Some("test-token".to_string())).unwrap()
    }

    #[tokio::test]
    async fn list_threads_sends_pagination_and_filters() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/threads/")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("skip".into(), "20".into()),
                Matcher::UrlEncoded("limit".into(), "20".into()),
                Matcher::UrlEncoded("search".into(), "estágio".into()),
                Matcher::UrlEncoded("category".into(), "faculdade".into()),
                Matcher::UrlEncoded("university".into(), "USP".into()),
            ]))
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_body(r#"[{"id": 1, "title": "Vagas"}]"#)
            .create_async()
            .await;

        let client = test_client(&server).await;
        let threads = client
            .list_threads(&ThreadQuery {
                skip: 20,
                limit: 20,
                search: Some("estágio".into()),
                category: Some(Scope::Faculdade),
                university: Some("USP".into()),
                tag: None,
            })
            .await
            .unwrap();

        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].id, 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn error_status_maps_to_detail_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/threads/9/vote")
            .with_status(404)
            .with_body(r#"{"detail": "Thread não encontrada."}"#)
            .create_async()
            .await;

        let client = test_client(&server).await;
        let err = client.vote_thread(9, 1).await.unwrap_err();
        match err {
            ApiClientError::Status { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Thread não encontrada.");
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn vote_poll_posts_label_and_parses_updated_poll() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/polls/5/vote")
            .match_body(Matcher::Json(serde_json::json!({"option_label": "Sim"})))
            .with_status(200)
            .with_body(
                r#"{"id": 5, "title": "Mudar horário?", "options": [{"label": "Sim", "votes_count": 3}], "user_vote": "Sim"}"#,
            )
            .create_async()
            .await;

        let client = test_client(&server).await;
        let poll = client.vote_poll(5, "Sim").await.unwrap();
        assert_eq!(poll.user_vote.as_deref(), Some("Sim"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn requests_without_token_skip_the_auth_header() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/polls/")
            .match_query(Matcher::Any)
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let client = ApiClient::new(server.url(), None).unwrap();
        assert!(!client.has_auth_token());
        let polls = client.list_polls(None, 0, 20).await.unwrap();
        assert!(polls.is_empty());
        mock.assert_async().await;
    }
}

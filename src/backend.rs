//! HTTP client for the forum backend REST API.
//!
//! One reusable [`reqwest::Client`] per process; each method maps to exactly
//! one backend endpoint. The connection pool is released when the client is
//! dropped at shutdown.

use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::models::{CreateCommentRequest, CreatePostRequest, JsonMap};

/// Longest response snippet included in a shape error.
const SHAPE_DETAIL_MAX_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum BackendError {
    /// Backend answered with a non-2xx status.
    #[error("backend returned HTTP {status}")]
    Status { status: StatusCode },
    /// The request never completed (DNS, refused connection, timeout).
    #[error("failed to reach backend: {source}")]
    Transport {
        #[from]
        source: reqwest::Error,
    },
    /// Transport succeeded but the body is not the expected JSON shape.
    #[error("unexpected response shape: {detail}")]
    Shape { detail: String },
}

/// Client for the backend endpoints used by the tool handlers.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    /// Build a client bound to the backend base URL with a fixed timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(base_url: &Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("forum-mcp/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
        })
    }

    /// Call the global search endpoint.
    pub async fn global_search(
        &self,
        keyword: &str,
        token: Option<&str>,
    ) -> Result<Vec<JsonMap>, BackendError> {
        let request = self
            .http
            .get(self.endpoint("/api/search/global"))
            .query(&[("keyword", keyword)]);
        let payload = self.fetch_json(with_bearer(request, token)).await?;
        expect_array(payload)
    }

    /// Return posts created within the given time window.
    pub async fn recent_posts(
        &self,
        minutes: i64,
        token: Option<&str>,
    ) -> Result<Vec<JsonMap>, BackendError> {
        let request = self
            .http
            .get(self.endpoint("/api/posts/recent"))
            .query(&[("minutes", minutes)]);
        let payload = self.fetch_json(with_bearer(request, token)).await?;
        expect_array(payload)
    }

    /// Retrieve the detailed payload for a single post.
    pub async fn get_post(
        &self,
        post_id: i64,
        token: Option<&str>,
    ) -> Result<JsonMap, BackendError> {
        let request = self.http.get(self.endpoint(&format!("/api/posts/{post_id}")));
        let payload = self.fetch_json(with_bearer(request, token)).await?;
        expect_object(payload)
    }

    /// Create a new post and return the backend's detailed post payload.
    pub async fn create_post(
        &self,
        token: &str,
        payload: &CreatePostRequest,
    ) -> Result<JsonMap, BackendError> {
        let request = self
            .http
            .post(self.endpoint("/api/posts"))
            .bearer_auth(token)
            .json(payload);
        let body = self.fetch_json(request).await?;
        expect_object(body)
    }

    /// Add a comment to a post and return the created comment.
    pub async fn create_comment(
        &self,
        post_id: i64,
        token: &str,
        payload: &CreateCommentRequest,
    ) -> Result<JsonMap, BackendError> {
        let request = self
            .http
            .post(self.endpoint(&format!("/api/posts/{post_id}/comments")))
            .bearer_auth(token)
            .json(payload);
        let body = self.fetch_json(request).await?;
        expect_object(body)
    }

    /// Reply to an existing comment and return the created reply.
    pub async fn reply_to_comment(
        &self,
        comment_id: i64,
        token: &str,
        payload: &CreateCommentRequest,
    ) -> Result<JsonMap, BackendError> {
        let request = self
            .http
            .post(self.endpoint(&format!("/api/comments/{comment_id}/replies")))
            .bearer_auth(token)
            .json(payload);
        let body = self.fetch_json(request).await?;
        expect_object(body)
    }

    /// List unread notifications for the token's user, paged.
    pub async fn unread_notifications(
        &self,
        page: u32,
        size: u32,
        token: &str,
    ) -> Result<Vec<JsonMap>, BackendError> {
        let request = self
            .http
            .get(self.endpoint("/api/notifications/unread"))
            .query(&[("page", page), ("size", size)])
            .bearer_auth(token);
        let payload = self.fetch_json(request).await?;
        expect_array(payload)
    }

    /// Mark the given notifications as read. The backend returns no body.
    pub async fn mark_notifications_read(
        &self,
        ids: &[i64],
        token: &str,
    ) -> Result<(), BackendError> {
        let request = self
            .http
            .post(self.endpoint("/api/notifications/read"))
            .bearer_auth(token)
            .json(&serde_json::json!({ "ids": ids }));
        let response = request.header(ACCEPT, "application/json").send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status { status });
        }
        Ok(())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Send a request and parse the body as JSON.
    ///
    /// Non-2xx answers become [`BackendError::Status`]; an unparseable body
    /// on a successful answer becomes [`BackendError::Shape`].
    async fn fetch_json(&self, request: RequestBuilder) -> Result<Value, BackendError> {
        let response = request.header(ACCEPT, "application/json").send().await?;
        let status = response.status();
        debug!(status = %status, "backend call completed");
        if !status.is_success() {
            return Err(BackendError::Status { status });
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|_| BackendError::Shape {
            detail: truncate_for_display(&body),
        })
    }
}

fn with_bearer(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

fn expect_array(payload: Value) -> Result<Vec<JsonMap>, BackendError> {
    let Value::Array(entries) = payload else {
        return Err(shape_error(&payload));
    };
    entries
        .into_iter()
        .map(|entry| match entry {
            Value::Object(map) => Ok(map),
            other => Err(shape_error(&other)),
        })
        .collect()
}

fn expect_object(payload: Value) -> Result<JsonMap, BackendError> {
    match payload {
        Value::Object(map) => Ok(map),
        other => Err(shape_error(&other)),
    }
}

fn shape_error(payload: &Value) -> BackendError {
    BackendError::Shape {
        detail: truncate_for_display(&payload.to_string()),
    }
}

fn truncate_for_display(raw: &str) -> String {
    let mut detail: String = raw.chars().take(SHAPE_DETAIL_MAX_CHARS).collect();
    if raw.chars().count() > SHAPE_DETAIL_MAX_CHARS {
        detail.push('…');
    }
    detail
}

//! Tool handler logic, independent of the invocation transport.
//!
//! Each operation is one adaptation step: sanitize arguments, resolve a
//! token, issue a single backend call, translate failures into one
//! user-facing message, and validate the response into its typed model.

pub mod args;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::backend::{BackendClient, BackendError};
use crate::config::Settings;
use crate::models::{
    Comment, CommentCreateResult, CommentReplyResult, JsonMap, MarkReadResult, Notification,
    PostCreateResult, PostDetail, PostSummary, RecentPostsResponse, SearchResponse,
    SearchResultItem, UnreadNotificationsResponse,
};
use crate::token_cache::{SessionHandle, TokenCache};

use self::args::{
    required_text, CreatePostArgs, GetPostArgs, ListUnreadArgs, MarkReadArgs, RecentPostsArgs,
    ReplyToCommentArgs, ReplyToPostArgs, SearchArgs, DEFAULT_NOTIFICATION_PAGE_SIZE,
    MAX_NOTIFICATION_PAGE_SIZE, MAX_RECENT_MINUTES,
};

/// Failure of a single tool invocation, already worded for the caller.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Caller input is malformed; detected before any network call.
    #[error("{0}")]
    Validation(String),
    /// An authenticated operation had no resolvable token.
    #[error("{0}")]
    AuthRequired(String),
    /// Backend answered with a non-2xx status.
    #[error("{0}")]
    Upstream(String),
    /// Backend could not be reached at all.
    #[error("{0}")]
    Unreachable(String),
    /// Backend answered 2xx but the body failed structural validation.
    #[error("{0}")]
    MalformedResponse(String),
}

/// Process-wide shared state handed to every tool invocation.
pub struct AppState {
    pub settings: Settings,
    pub backend: BackendClient,
    pub tokens: TokenCache,
}

impl AppState {
    /// Build the shared state from validated settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend HTTP client cannot be constructed.
    pub fn new(settings: Settings) -> Result<Self, reqwest::Error> {
        let backend = BackendClient::new(&settings.backend_base_url, settings.request_timeout)?;
        Ok(Self {
            settings,
            backend,
            tokens: TokenCache::new(),
        })
    }

    fn resolve_token(
        &self,
        session: &Arc<SessionHandle>,
        explicit: Option<&str>,
    ) -> Option<String> {
        self.tokens
            .resolve(session, explicit, self.settings.access_token.as_deref())
    }

    fn require_token(
        &self,
        session: &Arc<SessionHandle>,
        explicit: Option<&str>,
        action: &str,
    ) -> Result<String, ToolError> {
        self.resolve_token(session, explicit).ok_or_else(|| {
            ToolError::AuthRequired(format!(
                "An authentication token is required to {action}."
            ))
        })
    }

    /// Perform a global search across forum resources.
    pub async fn search(
        &self,
        session: &Arc<SessionHandle>,
        args: SearchArgs,
    ) -> Result<SearchResponse, ToolError> {
        let keyword = required_text(&args.keyword, "Keyword")?;
        let token = self.resolve_token(session, None);

        debug!(keyword = %keyword, "issuing global search");
        let raw = self
            .backend
            .global_search(&keyword, token.as_deref())
            .await
            .map_err(|e| {
                map_backend_error(e, "search service", "search endpoint", |status| {
                    format!(
                        "Forum backend returned HTTP {} while searching for '{keyword}'.",
                        status.as_u16()
                    )
                })
            })?;

        let results: Vec<SearchResultItem> = validate_items(raw, "search endpoint")?;
        info!(keyword = %keyword, total = results.len(), "search completed");
        Ok(SearchResponse {
            keyword,
            total: results.len(),
            results,
        })
    }

    /// Fetch posts created within the last `minutes` minutes.
    pub async fn recent_posts(
        &self,
        session: &Arc<SessionHandle>,
        args: RecentPostsArgs,
    ) -> Result<RecentPostsResponse, ToolError> {
        let minutes = args.minutes;
        if minutes < 1 || minutes > MAX_RECENT_MINUTES {
            return Err(ToolError::Validation(format!(
                "Minutes must be between 1 and {MAX_RECENT_MINUTES}."
            )));
        }
        let token = self.resolve_token(session, None);

        let raw = self
            .backend
            .recent_posts(minutes, token.as_deref())
            .await
            .map_err(|e| {
                map_backend_error(e, "recent posts service", "recent posts endpoint", |status| {
                    format!(
                        "Forum backend returned HTTP {} while fetching recent posts for the last {minutes} minutes.",
                        status.as_u16()
                    )
                })
            })?;

        let posts: Vec<PostSummary> = validate_items(raw, "recent posts endpoint")?;
        info!(minutes, total = posts.len(), "recent posts fetched");
        Ok(RecentPostsResponse {
            minutes,
            total: posts.len(),
            posts,
        })
    }

    /// Retrieve detailed information for a single post.
    pub async fn get_post(
        &self,
        session: &Arc<SessionHandle>,
        args: GetPostArgs,
    ) -> Result<PostDetail, ToolError> {
        let post_id = args::positive_id(args.post_id, "Post id")?;
        let token = self.resolve_token(session, args.token.as_deref());

        let raw = self
            .backend
            .get_post(post_id, token.as_deref())
            .await
            .map_err(|e| {
                map_backend_error(e, "post service", "post detail endpoint", |status| {
                    match status.as_u16() {
                        404 => format!("Post {post_id} was not found."),
                        401 => "Authentication failed while retrieving the post.".to_string(),
                        403 => "The provided token is not authorized to view this post."
                            .to_string(),
                        code => format!(
                            "Forum backend returned HTTP {code} while retrieving post {post_id}."
                        ),
                    }
                })
            })?;

        let post = validate_object::<PostDetail>(raw, "post detail endpoint")?;
        info!(post_id, "post retrieved");
        Ok(post)
    }

    /// Create a new post and return the backend's detailed payload.
    pub async fn create_post(
        &self,
        session: &Arc<SessionHandle>,
        mut args: CreatePostArgs,
    ) -> Result<PostCreateResult, ToolError> {
        let explicit = args.token.take();
        let payload = args.into_payload()?;
        let token = self.require_token(session, explicit.as_deref(), "create a post")?;

        let raw = self
            .backend
            .create_post(&token, &payload)
            .await
            .map_err(|e| {
                map_backend_error(e, "post service", "post creation endpoint", |status| {
                    match status.as_u16() {
                        400 => "Forum backend rejected the new post (HTTP 400). Check the input fields and captcha."
                            .to_string(),
                        401 => "Authentication failed while creating the post. Please verify the token."
                            .to_string(),
                        403 => "The provided token is not authorized to create posts.".to_string(),
                        code => {
                            format!("Forum backend returned HTTP {code} while creating the post.")
                        }
                    }
                })
            })?;

        let post = validate_object::<PostDetail>(raw, "post creation endpoint")?;
        info!(post_id = ?post.post.id, "post created");
        Ok(PostCreateResult { post })
    }

    /// Add a comment to a post.
    pub async fn reply_to_post(
        &self,
        session: &Arc<SessionHandle>,
        args: ReplyToPostArgs,
    ) -> Result<CommentCreateResult, ToolError> {
        let post_id = args::positive_id(args.post_id, "Post id")?;
        let content = required_text(&args.content, "Reply content")?;
        let captcha = args::optional_text(args.captcha.as_deref());
        let token = self.require_token(session, args.token.as_deref(), "reply to a post")?;

        let payload = crate::models::CreateCommentRequest { content, captcha };
        let raw = self
            .backend
            .create_comment(post_id, &token, &payload)
            .await
            .map_err(|e| {
                map_backend_error(e, "comment service", "comment creation endpoint", |status| {
                    match status.as_u16() {
                        400 => "Forum backend rejected the comment (HTTP 400). Check the content and captcha."
                            .to_string(),
                        401 => format!(
                            "Authentication failed while commenting on post {post_id}. Please verify the token."
                        ),
                        403 => format!(
                            "The provided token is not authorized to comment on post {post_id}."
                        ),
                        404 => format!("Post {post_id} was not found."),
                        code => format!(
                            "Forum backend returned HTTP {code} while commenting on post {post_id}."
                        ),
                    }
                })
            })?;

        let comment = validate_object::<Comment>(raw, "comment creation endpoint")?;
        info!(post_id, comment_id = ?comment.id, "comment created");
        Ok(CommentCreateResult { comment })
    }

    /// Reply to an existing comment.
    pub async fn reply_to_comment(
        &self,
        session: &Arc<SessionHandle>,
        args: ReplyToCommentArgs,
    ) -> Result<CommentReplyResult, ToolError> {
        let comment_id = args::positive_id(args.comment_id, "Comment id")?;
        let content = required_text(&args.content, "Reply content")?;
        let captcha = args::optional_text(args.captcha.as_deref());
        let token = self.require_token(session, args.token.as_deref(), "reply to a comment")?;

        let payload = crate::models::CreateCommentRequest { content, captcha };
        let raw = self
            .backend
            .reply_to_comment(comment_id, &token, &payload)
            .await
            .map_err(|e| {
                map_backend_error(e, "comment service", "reply comment endpoint", |status| {
                    match status.as_u16() {
                        400 => "Forum backend rejected the reply (HTTP 400). Check the content and captcha."
                            .to_string(),
                        401 => format!(
                            "Authentication failed while replying to comment {comment_id}. Please verify the token."
                        ),
                        403 => format!(
                            "The provided token is not authorized to reply to comment {comment_id}."
                        ),
                        404 => format!("Comment {comment_id} was not found."),
                        code => format!(
                            "Forum backend returned HTTP {code} while replying to comment {comment_id}."
                        ),
                    }
                })
            })?;

        let comment = validate_object::<Comment>(raw, "reply comment endpoint")?;
        info!(comment_id, reply_id = ?comment.id, "reply created");
        Ok(CommentReplyResult { comment })
    }

    /// List unread notifications for the authenticated user.
    pub async fn list_unread_messages(
        &self,
        session: &Arc<SessionHandle>,
        args: ListUnreadArgs,
    ) -> Result<UnreadNotificationsResponse, ToolError> {
        let page = args.page.unwrap_or(0);
        let size = args.size.unwrap_or(DEFAULT_NOTIFICATION_PAGE_SIZE);
        if size < 1 || size > MAX_NOTIFICATION_PAGE_SIZE {
            return Err(ToolError::Validation(format!(
                "Size must be between 1 and {MAX_NOTIFICATION_PAGE_SIZE}."
            )));
        }
        let token =
            self.require_token(session, args.token.as_deref(), "list unread notifications")?;

        let raw = self
            .backend
            .unread_notifications(page, size, &token)
            .await
            .map_err(|e| {
                map_backend_error(
                    e,
                    "notification service",
                    "unread notifications endpoint",
                    |status| match status.as_u16() {
                        401 => "Authentication failed while listing unread notifications. Please verify the token."
                            .to_string(),
                        403 => "The provided token is not authorized to list notifications."
                            .to_string(),
                        code => format!(
                            "Forum backend returned HTTP {code} while listing unread notifications."
                        ),
                    },
                )
            })?;

        let notifications: Vec<Notification> = validate_items(raw, "unread notifications endpoint")?;
        info!(page, size, total = notifications.len(), "unread notifications listed");
        Ok(UnreadNotificationsResponse {
            page,
            size,
            total: notifications.len(),
            notifications,
        })
    }

    /// Mark the given notifications as read.
    pub async fn mark_notifications_read(
        &self,
        session: &Arc<SessionHandle>,
        args: MarkReadArgs,
    ) -> Result<MarkReadResult, ToolError> {
        if args.ids.is_empty() {
            return Err(ToolError::Validation(
                "At least one notification id is required.".to_string(),
            ));
        }
        for &id in &args.ids {
            args::positive_id(id, "Notification ids")?;
        }
        let token = self.require_token(
            session,
            args.token.as_deref(),
            "mark notifications as read",
        )?;

        self.backend
            .mark_notifications_read(&args.ids, &token)
            .await
            .map_err(|e| {
                map_backend_error(
                    e,
                    "notification service",
                    "notification read endpoint",
                    |status| match status.as_u16() {
                        401 => "Authentication failed while marking notifications as read. Please verify the token."
                            .to_string(),
                        403 => "The provided token is not authorized to mark notifications as read."
                            .to_string(),
                        code => format!(
                            "Forum backend returned HTTP {code} while marking notifications as read."
                        ),
                    },
                )
            })?;

        info!(total = args.ids.len(), "notifications marked as read");
        Ok(MarkReadResult {
            total_marked: args.ids.len(),
            processed_ids: args.ids,
        })
    }
}

/// Translate a backend failure into the operation's user-facing error.
fn map_backend_error(
    err: BackendError,
    service: &str,
    endpoint: &str,
    status_message: impl FnOnce(reqwest::StatusCode) -> String,
) -> ToolError {
    match err {
        BackendError::Status { status } => ToolError::Upstream(status_message(status)),
        BackendError::Transport { source } => ToolError::Unreachable(format!(
            "Unable to reach the forum backend {service}: {source}."
        )),
        BackendError::Shape { detail } => ToolError::MalformedResponse(format!(
            "Unexpected response format from the {endpoint}: {detail}"
        )),
    }
}

fn validate_items<T: DeserializeOwned>(
    entries: Vec<JsonMap>,
    endpoint: &str,
) -> Result<Vec<T>, ToolError> {
    entries
        .into_iter()
        .map(|entry| serde_json::from_value(Value::Object(entry)))
        .collect::<Result<Vec<T>, _>>()
        .map_err(|_| malformed(endpoint))
}

fn validate_object<T: DeserializeOwned>(entry: JsonMap, endpoint: &str) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(entry)).map_err(|_| malformed(endpoint))
}

fn malformed(endpoint: &str) -> ToolError {
    ToolError::MalformedResponse(format!("Received malformed data from the {endpoint}."))
}

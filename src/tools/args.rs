//! Tool argument schemas and input sanitization.
//!
//! Every handler trims string inputs and range-checks numeric ones before
//! anything touches the network. Numeric fields are typed integers in the
//! schema, so JSON booleans are rejected during deserialization.

use schemars::JsonSchema;
use serde::Deserialize;

use crate::models::CreatePostRequest;

use super::ToolError;

/// Largest accepted time window for `recent_posts`, in minutes (one day).
pub const MAX_RECENT_MINUTES: i64 = 1440;
/// Largest accepted page size for `list_unread_messages`.
pub const MAX_NOTIFICATION_PAGE_SIZE: u32 = 100;
/// Page size used when `list_unread_messages` is called without one.
pub const DEFAULT_NOTIFICATION_PAGE_SIZE: u32 = 30;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchArgs {
    /// Keyword to search for.
    pub keyword: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RecentPostsArgs {
    /// Time window in minutes to search for new posts, between 1 and 1440.
    pub minutes: i64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetPostArgs {
    /// Identifier of the post to retrieve.
    pub post_id: i64,
    /// Optional bearer token to view the post as an authenticated user.
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreatePostArgs {
    /// Title of the new post.
    pub title: String,
    /// Markdown content of the new post.
    pub content: String,
    /// Identifier of the category the post belongs to.
    pub category_id: i64,
    /// One or two tag identifiers for the post.
    pub tag_ids: Vec<i64>,
    /// Post type (e.g. NORMAL, LOTTERY, POLL, CATEGORY_PROPOSAL).
    pub post_type: Option<String>,
    /// Visibility scope (e.g. ALL, ONLY_ME, ONLY_REGISTER).
    pub visible_scope: Option<String>,
    /// Prize description for lottery posts.
    pub prize_description: Option<String>,
    /// Prize icon URL for lottery posts.
    pub prize_icon: Option<String>,
    /// Number of prizes for lottery posts.
    pub prize_count: Option<i64>,
    /// Point cost to join a lottery.
    pub point_cost: Option<i64>,
    /// Start time for lottery posts.
    pub start_time: Option<String>,
    /// End time for lottery or poll posts.
    pub end_time: Option<String>,
    /// Poll options for poll posts.
    pub options: Option<Vec<String>>,
    /// Whether a poll allows selecting multiple options.
    pub multiple: Option<bool>,
    /// Proposed category name for category-proposal posts.
    pub proposed_name: Option<String>,
    /// Description of the proposed category.
    pub proposal_description: Option<String>,
    /// Optional captcha solution if the backend requires it.
    pub captcha: Option<String>,
    /// Bearer token overriding the session or configured default.
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReplyToPostArgs {
    /// Identifier of the post being commented on.
    pub post_id: i64,
    /// Markdown content of the comment.
    pub content: String,
    /// Optional captcha solution if the backend requires it.
    pub captcha: Option<String>,
    /// Bearer token overriding the session or configured default.
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReplyToCommentArgs {
    /// Identifier of the comment being replied to.
    pub comment_id: i64,
    /// Markdown content of the reply.
    pub content: String,
    /// Optional captcha solution if the backend requires it.
    pub captcha: Option<String>,
    /// Bearer token overriding the session or configured default.
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListUnreadArgs {
    /// Zero-based page index, defaults to 0.
    pub page: Option<u32>,
    /// Page size between 1 and 100, defaults to 30.
    pub size: Option<u32>,
    /// Bearer token overriding the session or configured default.
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MarkReadArgs {
    /// Identifiers of the notifications to mark as read.
    pub ids: Vec<i64>,
    /// Bearer token overriding the session or configured default.
    pub token: Option<String>,
}

/// Trim a required string, rejecting blank input.
pub fn required_text(value: &str, field: &str) -> Result<String, ToolError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ToolError::Validation(format!("{field} must not be empty.")));
    }
    Ok(trimmed.to_string())
}

/// Trim an optional string, dropping it entirely when blank.
#[must_use]
pub fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Check that an identifier is a positive integer.
pub fn positive_id(value: i64, field: &str) -> Result<i64, ToolError> {
    if value < 1 {
        return Err(ToolError::Validation(format!(
            "{field} must be a positive integer."
        )));
    }
    Ok(value)
}

impl CreatePostArgs {
    /// Sanitize the arguments into the outbound payload.
    ///
    /// Optional fields survive only when non-blank; the payload then carries
    /// exactly the keys that were actually supplied.
    pub fn into_payload(self) -> Result<CreatePostRequest, ToolError> {
        let title = required_text(&self.title, "Title")?;
        let content = required_text(&self.content, "Content")?;
        let category_id = positive_id(self.category_id, "Category id")?;

        if self.tag_ids.is_empty() || self.tag_ids.len() > 2 {
            return Err(ToolError::Validation(
                "Between 1 and 2 tag ids are required.".to_string(),
            ));
        }
        for &tag_id in &self.tag_ids {
            positive_id(tag_id, "Tag ids")?;
        }

        let mut payload = CreatePostRequest::new(title, content, category_id, self.tag_ids);
        payload.post_type = optional_text(self.post_type.as_deref());
        payload.visible_scope = optional_text(self.visible_scope.as_deref());
        payload.prize_description = optional_text(self.prize_description.as_deref());
        payload.prize_icon = optional_text(self.prize_icon.as_deref());
        payload.start_time = optional_text(self.start_time.as_deref());
        payload.end_time = optional_text(self.end_time.as_deref());
        payload.proposed_name = optional_text(self.proposed_name.as_deref());
        payload.proposal_description = optional_text(self.proposal_description.as_deref());
        payload.captcha = optional_text(self.captcha.as_deref());

        if let Some(count) = self.prize_count {
            payload.prize_count = Some(positive_id(count, "Prize count")?);
        }
        if let Some(cost) = self.point_cost {
            payload.point_cost = Some(positive_id(cost, "Point cost")?);
        }

        if let Some(options) = self.options {
            let mut sanitized = Vec::with_capacity(options.len());
            for option in &options {
                let trimmed = option.trim();
                if trimmed.is_empty() {
                    return Err(ToolError::Validation(
                        "Poll options must not contain blank entries.".to_string(),
                    ));
                }
                sanitized.push(trimmed.to_string());
            }
            if !sanitized.is_empty() {
                payload.options = Some(sanitized);
            }
        }
        payload.multiple = self.multiple;

        Ok(payload)
    }
}

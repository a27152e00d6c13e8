//! Typed shapes for backend payloads and tool results.
//!
//! Backend records tolerate missing and unknown fields: every scalar is
//! optional, list fields turn `null` into an empty `Vec`, and unrecognized
//! keys are kept in an explicit `extra` side map so newer backend fields
//! survive a round trip.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A JSON object as returned by the backend.
pub type JsonMap = serde_json::Map<String, Value>;

/// Deserialize a list field treating JSON `null` as an empty list.
fn null_to_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let value = Option::<Vec<T>>::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}

/// A single global search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultItem {
    /// Entity type for the result (post, user, tag, etc.).
    #[serde(rename = "type")]
    pub kind: String,
    pub id: Option<i64>,
    pub text: Option<String>,
    pub sub_text: Option<String>,
    pub extra: Option<String>,
    pub post_id: Option<i64>,
    pub highlighted_text: Option<String>,
    pub highlighted_sub_text: Option<String>,
    pub highlighted_extra: Option<String>,
}

/// Summary of a post or comment author.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorInfo {
    pub id: Option<i64>,
    pub username: Option<String>,
    pub avatar: Option<String>,
    pub display_medal: Option<String>,
    #[serde(flatten)]
    pub extra: JsonMap,
}

/// Basic information about a post category.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryInfo {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub small_icon: Option<String>,
    pub count: Option<i64>,
    #[serde(flatten)]
    pub extra: JsonMap,
}

/// Details for a tag assigned to a post.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagInfo {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub small_icon: Option<String>,
    pub created_at: Option<String>,
    pub count: Option<i64>,
    #[serde(flatten)]
    pub extra: JsonMap,
}

/// A reaction on a post or comment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionInfo {
    pub id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub user: Option<String>,
    pub post_id: Option<i64>,
    pub comment_id: Option<i64>,
    pub message_id: Option<i64>,
    pub reward: Option<i64>,
    #[serde(flatten)]
    pub extra: JsonMap,
}

/// Comment returned by the backend, with nested replies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Option<i64>,
    /// Markdown content of the comment.
    pub content: Option<String>,
    pub created_at: Option<String>,
    pub pinned_at: Option<String>,
    pub author: Option<AuthorInfo>,
    #[serde(default, deserialize_with = "null_to_empty")]
    pub replies: Vec<Comment>,
    #[serde(default, deserialize_with = "null_to_empty")]
    pub reactions: Vec<ReactionInfo>,
    pub reward: Option<i64>,
    pub point_reward: Option<i64>,
    #[serde(flatten)]
    pub extra: JsonMap,
}

/// Summary information for a post.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSummary {
    pub id: Option<i64>,
    pub title: Option<String>,
    /// Excerpt or full content, depending on the endpoint.
    pub content: Option<String>,
    pub created_at: Option<String>,
    pub author: Option<AuthorInfo>,
    pub category: Option<CategoryInfo>,
    #[serde(default, deserialize_with = "null_to_empty")]
    pub tags: Vec<TagInfo>,
    pub views: Option<i64>,
    pub comment_count: Option<i64>,
    pub status: Option<String>,
    pub pinned_at: Option<String>,
    pub last_reply_at: Option<String>,
    #[serde(default, deserialize_with = "null_to_empty")]
    pub reactions: Vec<ReactionInfo>,
    #[serde(default, deserialize_with = "null_to_empty")]
    pub participants: Vec<AuthorInfo>,
    pub subscribed: Option<bool>,
    pub reward: Option<i64>,
    pub point_reward: Option<i64>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Lottery metadata for lottery posts, passed through untyped.
    pub lottery: Option<JsonMap>,
    /// Poll metadata for poll posts, passed through untyped.
    pub poll: Option<JsonMap>,
    pub rss_excluded: Option<bool>,
    pub closed: Option<bool>,
    pub visible_scope: Option<String>,
    #[serde(flatten)]
    pub extra: JsonMap,
}

/// Detailed information for a single post, including its comments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: PostSummary,
    #[serde(default, deserialize_with = "null_to_empty")]
    pub comments: Vec<Comment>,
}

/// Unread notification payload returned by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub post: Option<PostSummary>,
    pub comment: Option<Comment>,
    pub parent_comment: Option<Comment>,
    pub from_user: Option<AuthorInfo>,
    pub reaction_type: Option<String>,
    pub content: Option<String>,
    pub approved: Option<bool>,
    pub read: Option<bool>,
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: JsonMap,
}

/// Structured result of the `search` tool.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub keyword: String,
    pub total: usize,
    pub results: Vec<SearchResultItem>,
}

/// Structured result of the `recent_posts` tool.
#[derive(Debug, Clone, Serialize)]
pub struct RecentPostsResponse {
    pub minutes: i64,
    pub total: usize,
    pub posts: Vec<PostSummary>,
}

/// Structured result of the `create_post` tool.
#[derive(Debug, Clone, Serialize)]
pub struct PostCreateResult {
    pub post: PostDetail,
}

/// Structured result of the `reply_to_post` tool.
#[derive(Debug, Clone, Serialize)]
pub struct CommentCreateResult {
    pub comment: Comment,
}

/// Structured result of the `reply_to_comment` tool.
#[derive(Debug, Clone, Serialize)]
pub struct CommentReplyResult {
    pub comment: Comment,
}

/// Structured result of the `list_unread_messages` tool.
#[derive(Debug, Clone, Serialize)]
pub struct UnreadNotificationsResponse {
    pub page: u32,
    pub size: u32,
    pub total: usize,
    pub notifications: Vec<Notification>,
}

/// Structured result of the `mark_notifications_read` tool.
#[derive(Debug, Clone, Serialize)]
pub struct MarkReadResult {
    pub processed_ids: Vec<i64>,
    pub total_marked: usize,
}

/// Outbound payload for creating a post.
///
/// Optional fields are omitted from the JSON body entirely when unset, so a
/// minimal request carries exactly `title`, `content`, `categoryId` and
/// `tagIds`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    pub category_id: i64,
    pub tag_ids: Vec<i64>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub post_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible_scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prize_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prize_icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prize_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub point_cost: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiple: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposed_name: Option<String>,
    #[serde(rename = "description", skip_serializing_if = "Option::is_none")]
    pub proposal_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captcha: Option<String>,
}

impl CreatePostRequest {
    /// Payload carrying only the required fields.
    #[must_use]
    pub fn new(title: String, content: String, category_id: i64, tag_ids: Vec<i64>) -> Self {
        Self {
            title,
            content,
            category_id,
            tag_ids,
            post_type: None,
            visible_scope: None,
            prize_description: None,
            prize_icon: None,
            prize_count: None,
            point_cost: None,
            start_time: None,
            end_time: None,
            options: None,
            multiple: None,
            proposed_name: None,
            proposal_description: None,
            captcha: None,
        }
    }
}

/// Outbound payload for creating a comment or a comment reply.
#[derive(Debug, Clone, Serialize)]
pub struct CreateCommentRequest {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captcha: Option<String>,
}

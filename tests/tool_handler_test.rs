//! End-to-end tests for the tool handlers against a mocked backend.

use forum_mcp::config::Settings;
use forum_mcp::token_cache::SessionHandle;
use forum_mcp::tools::args::{
    CreatePostArgs, GetPostArgs, ListUnreadArgs, MarkReadArgs, RecentPostsArgs,
    ReplyToCommentArgs, ReplyToPostArgs, SearchArgs,
};
use forum_mcp::tools::{AppState, ToolError};
use serde_json::json;
use url::Url;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn state_for(server: &MockServer, access_token: Option<&str>) -> AppState {
    let settings = Settings {
        backend_base_url: Url::parse(&server.uri()).expect("mock server URI"),
        access_token: access_token.map(ToString::to_string),
        ..Settings::for_testing()
    };
    AppState::new(settings).expect("state should build")
}

fn create_post_args() -> CreatePostArgs {
    CreatePostArgs {
        title: "Title".to_string(),
        content: "Body".to_string(),
        category_id: 3,
        tag_ids: vec![1, 2],
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
        token: None,
    }
}

async fn assert_no_requests(server: &MockServer) {
    let requests = server.received_requests().await.expect("recording enabled");
    assert!(requests.is_empty(), "expected no backend calls");
}

#[tokio::test]
async fn test_search_sanitizes_keyword_and_maps_results() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/search/global"))
        .and(query_param("keyword", "hello"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"type": "post", "id": 5, "text": "hi"},
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let state = state_for(&server, None);
    let session = SessionHandle::new();
    let response = state
        .search(
            &session,
            SearchArgs {
                keyword: "  hello  ".to_string(),
            },
        )
        .await
        .expect("search");

    assert_eq!(response.keyword, "hello");
    assert_eq!(response.total, 1);
    assert_eq!(response.results[0].kind, "post");
    assert_eq!(response.results[0].id, Some(5));
    assert_eq!(response.results[0].text.as_deref(), Some("hi"));
    assert!(response.results[0].sub_text.is_none());
}

#[tokio::test]
async fn test_search_rejects_blank_keyword_without_calling_backend() {
    let server = MockServer::start().await;
    let state = state_for(&server, None);
    let session = SessionHandle::new();

    let err = state
        .search(
            &session,
            SearchArgs {
                keyword: "   ".to_string(),
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ToolError::Validation(_)));
    assert_no_requests(&server).await;
}

#[tokio::test]
async fn test_recent_posts_rejects_out_of_range_minutes() {
    let server = MockServer::start().await;
    let state = state_for(&server, None);
    let session = SessionHandle::new();

    for minutes in [0, -5, 1500] {
        let err = state
            .recent_posts(&session, RecentPostsArgs { minutes })
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)), "minutes={minutes}");
    }
    assert_no_requests(&server).await;
}

#[tokio::test]
async fn test_recent_posts_tolerates_null_lists() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/posts/recent"))
        .and(query_param("minutes", "30"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "title": "a", "tags": null, "reactions": null, "participants": null},
        ])))
        .mount(&server)
        .await;

    let state = state_for(&server, None);
    let session = SessionHandle::new();
    let response = state
        .recent_posts(&session, RecentPostsArgs { minutes: 30 })
        .await
        .expect("recent posts");

    assert_eq!(response.minutes, 30);
    assert_eq!(response.total, 1);
    assert!(response.posts[0].tags.is_empty());
    assert!(response.posts[0].reactions.is_empty());
}

#[tokio::test]
async fn test_get_post_rejects_non_positive_id() {
    let server = MockServer::start().await;
    let state = state_for(&server, None);
    let session = SessionHandle::new();

    let err = state
        .get_post(
            &session,
            GetPostArgs {
                post_id: 0,
                token: None,
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ToolError::Validation(_)));
    assert_no_requests(&server).await;
}

#[tokio::test]
async fn test_get_post_maps_404_to_not_found_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/posts/999"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let state = state_for(&server, None);
    let session = SessionHandle::new();
    let err = state
        .get_post(
            &session,
            GetPostArgs {
                post_id: 999,
                token: None,
            },
        )
        .await
        .unwrap_err();

    match err {
        ToolError::Upstream(message) => assert_eq!(message, "Post 999 was not found."),
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_get_post_parses_detail_with_comments() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/posts/5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 5,
            "title": "hello",
            "commentCount": 1,
            "comments": [
                {"id": 1, "content": "first", "replies": null},
            ],
        })))
        .mount(&server)
        .await;

    let state = state_for(&server, None);
    let session = SessionHandle::new();
    let detail = state
        .get_post(
            &session,
            GetPostArgs {
                post_id: 5,
                token: None,
            },
        )
        .await
        .expect("post detail");

    assert_eq!(detail.post.id, Some(5));
    assert_eq!(detail.comments.len(), 1);
    assert!(detail.comments[0].replies.is_empty());
}

#[tokio::test]
async fn test_create_post_requires_a_token() {
    let server = MockServer::start().await;
    let state = state_for(&server, None);
    let session = SessionHandle::new();

    let err = state
        .create_post(&session, create_post_args())
        .await
        .unwrap_err();

    assert!(matches!(err, ToolError::AuthRequired(_)));
    assert_no_requests(&server).await;
}

#[tokio::test]
async fn test_create_post_rejects_too_many_tags_before_auth() {
    let server = MockServer::start().await;
    // No token configured either; validation must win over auth.
    let state = state_for(&server, None);
    let session = SessionHandle::new();

    let mut args = create_post_args();
    args.tag_ids = vec![1, 2, 3];
    let err = state.create_post(&session, args).await.unwrap_err();

    assert!(matches!(err, ToolError::Validation(_)));
    assert_no_requests(&server).await;
}

#[tokio::test]
async fn test_create_post_succeeds_with_explicit_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/posts"))
        .and(header("Authorization", "Bearer t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 42,
            "title": "Title",
            "comments": null,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let state = state_for(&server, None);
    let session = SessionHandle::new();
    let mut args = create_post_args();
    args.token = Some("t1".to_string());

    let result = state.create_post(&session, args).await.expect("create");
    assert_eq!(result.post.post.id, Some(42));
    assert!(result.post.comments.is_empty());
}

#[tokio::test]
async fn test_token_precedence_explicit_then_cached_then_default() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/posts/1/comments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 10})))
        .mount(&server)
        .await;

    let state = state_for(&server, Some("t3"));
    let session = SessionHandle::new();

    let reply = |token: Option<&str>| ReplyToPostArgs {
        post_id: 1,
        content: "hello".to_string(),
        captcha: None,
        token: token.map(ToString::to_string),
    };

    // Explicit token wins and is cached for the session.
    state
        .reply_to_post(&session, reply(Some("t1")))
        .await
        .expect("explicit token");

    // No explicit token: the cached one is reused.
    state
        .reply_to_post(&session, reply(None))
        .await
        .expect("cached token");

    // Blank explicit token clears the cache; the default applies.
    state
        .reply_to_post(&session, reply(Some("  ")))
        .await
        .expect("default token");

    // A different session never sees the first session's token.
    let other = SessionHandle::new();
    state
        .reply_to_post(&other, reply(None))
        .await
        .expect("default token for fresh session");

    let requests = server.received_requests().await.expect("recorded requests");
    let bearers: Vec<&str> = requests
        .iter()
        .map(|r| r.headers.get("Authorization").unwrap().to_str().unwrap())
        .collect();
    assert_eq!(
        bearers,
        vec!["Bearer t1", "Bearer t1", "Bearer t3", "Bearer t3"]
    );
}

#[tokio::test]
async fn test_reply_to_post_rejects_blank_content() {
    let server = MockServer::start().await;
    let state = state_for(&server, Some("t3"));
    let session = SessionHandle::new();

    let err = state
        .reply_to_post(
            &session,
            ReplyToPostArgs {
                post_id: 1,
                content: "   ".to_string(),
                captcha: None,
                token: None,
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ToolError::Validation(_)));
    assert_no_requests(&server).await;
}

#[tokio::test]
async fn test_reply_to_comment_maps_401_to_auth_failed_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/comments/8/replies"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let state = state_for(&server, Some("bad"));
    let session = SessionHandle::new();
    let err = state
        .reply_to_comment(
            &session,
            ReplyToCommentArgs {
                comment_id: 8,
                content: "hello".to_string(),
                captcha: None,
                token: None,
            },
        )
        .await
        .unwrap_err();

    match err {
        ToolError::Upstream(message) => {
            assert_eq!(
                message,
                "Authentication failed while replying to comment 8. Please verify the token."
            );
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_list_unread_rejects_out_of_range_size() {
    let server = MockServer::start().await;
    let state = state_for(&server, Some("t3"));
    let session = SessionHandle::new();

    for size in [0, 101] {
        let err = state
            .list_unread_messages(
                &session,
                ListUnreadArgs {
                    page: None,
                    size: Some(size),
                    token: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)), "size={size}");
    }
    assert_no_requests(&server).await;
}

#[tokio::test]
async fn test_list_unread_uses_defaults_and_maps_notifications() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/notifications/unread"))
        .and(query_param("page", "0"))
        .and(query_param("size", "30"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "type": "comment", "fromUser": {"username": "bob"}, "read": false},
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let state = state_for(&server, Some("t3"));
    let session = SessionHandle::new();
    let response = state
        .list_unread_messages(
            &session,
            ListUnreadArgs {
                page: None,
                size: None,
                token: None,
            },
        )
        .await
        .expect("list unread");

    assert_eq!(response.page, 0);
    assert_eq!(response.size, 30);
    assert_eq!(response.total, 1);
    assert_eq!(response.notifications[0].kind.as_deref(), Some("comment"));
    assert_eq!(
        response.notifications[0]
            .from_user
            .as_ref()
            .and_then(|u| u.username.as_deref()),
        Some("bob")
    );
}

#[tokio::test]
async fn test_mark_read_rejects_bad_ids_without_calling_backend() {
    let server = MockServer::start().await;
    let state = state_for(&server, Some("t3"));
    let session = SessionHandle::new();

    let err = state
        .mark_notifications_read(
            &session,
            MarkReadArgs {
                ids: vec![3, 3, -1],
                token: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::Validation(_)));

    let err = state
        .mark_notifications_read(
            &session,
            MarkReadArgs {
                ids: vec![],
                token: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::Validation(_)));

    assert_no_requests(&server).await;
}

#[tokio::test]
async fn test_mark_read_reports_processed_ids() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/notifications/read"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let state = state_for(&server, Some("t3"));
    let session = SessionHandle::new();
    let result = state
        .mark_notifications_read(
            &session,
            MarkReadArgs {
                ids: vec![3, 7],
                token: None,
            },
        )
        .await
        .expect("mark read");

    assert_eq!(result.processed_ids, vec![3, 7]);
    assert_eq!(result.total_marked, 2);
}

#[tokio::test]
async fn test_malformed_search_body_is_reported_distinctly() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/search/global"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": true})))
        .mount(&server)
        .await;

    let state = state_for(&server, None);
    let session = SessionHandle::new();
    let err = state
        .search(
            &session,
            SearchArgs {
                keyword: "hello".to_string(),
            },
        )
        .await
        .unwrap_err();

    match err {
        ToolError::MalformedResponse(message) => {
            assert!(message.contains("Unexpected response format"), "{message}");
        }
        other => panic!("expected malformed response error, got {other:?}"),
    }
}

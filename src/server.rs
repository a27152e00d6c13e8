//! MCP service wiring: tool registration, notices, and transports.
//!
//! One [`ForumMcp`] value exists per connected session; it owns the session
//! handle used as the token-cache key, so closing the connection drops the
//! handle and invalidates any cached token.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, LoggingLevel, LoggingMessageNotificationParam,
    ServerCapabilities, ServerInfo,
};
use rmcp::service::Peer;
use rmcp::transport::sse_server::{SseServer, SseServerConfig};
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::{StreamableHttpServerConfig, StreamableHttpService};
use rmcp::{
    tool, tool_handler, tool_router, ErrorData as McpError, RoleServer, ServerHandler, ServiceExt,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::token_cache::SessionHandle;
use crate::tools::args::{
    CreatePostArgs, GetPostArgs, ListUnreadArgs, MarkReadArgs, RecentPostsArgs,
    ReplyToCommentArgs, ReplyToPostArgs, SearchArgs,
};
use crate::tools::{AppState, ToolError};

/// MCP server exposing the forum tools for one session.
#[derive(Clone)]
pub struct ForumMcp {
    state: Arc<AppState>,
    session: Arc<SessionHandle>,
    tool_router: ToolRouter<Self>,
}

impl ForumMcp {
    /// Create the service for a new session.
    #[must_use]
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            session: SessionHandle::new(),
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl ForumMcp {
    #[tool(
        name = "search",
        description = "Perform a global search across forum resources."
    )]
    async fn search(
        &self,
        Parameters(args): Parameters<SearchArgs>,
        peer: Peer<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        match self.state.search(&self.session, args).await {
            Ok(response) => {
                let summary = format!(
                    "Search keyword '{}' returned {} results.",
                    response.keyword, response.total
                );
                notify(&peer, LoggingLevel::Info, summary.clone()).await;
                structured(&response, summary)
            }
            Err(err) => Err(fail(&peer, err).await),
        }
    }

    #[tool(
        name = "recent_posts",
        description = "Retrieve posts created in the last N minutes."
    )]
    async fn recent_posts(
        &self,
        Parameters(args): Parameters<RecentPostsArgs>,
        peer: Peer<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        match self.state.recent_posts(&self.session, args).await {
            Ok(response) => {
                let summary = format!(
                    "Found {} posts created within the last {} minutes.",
                    response.total, response.minutes
                );
                notify(&peer, LoggingLevel::Info, summary.clone()).await;
                structured(&response, summary)
            }
            Err(err) => Err(fail(&peer, err).await),
        }
    }

    #[tool(
        name = "get_post",
        description = "Retrieve detailed information for a single post."
    )]
    async fn get_post(
        &self,
        Parameters(args): Parameters<GetPostArgs>,
        peer: Peer<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let post_id = args.post_id;
        match self.state.get_post(&self.session, args).await {
            Ok(post) => {
                let summary = format!("Retrieved post {post_id} successfully.");
                notify(&peer, LoggingLevel::Info, summary.clone()).await;
                structured(&post, summary)
            }
            Err(err) => Err(fail(&peer, err).await),
        }
    }

    #[tool(
        name = "create_post",
        description = "Create a new post using an authentication token."
    )]
    async fn create_post(
        &self,
        Parameters(args): Parameters<CreatePostArgs>,
        peer: Peer<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        match self.state.create_post(&self.session, args).await {
            Ok(result) => {
                let summary = match result.post.post.id {
                    Some(id) => format!("Post {id} created successfully."),
                    None => "Post created successfully.".to_string(),
                };
                notify(&peer, LoggingLevel::Info, summary.clone()).await;
                structured(&result, summary)
            }
            Err(err) => Err(fail(&peer, err).await),
        }
    }

    #[tool(
        name = "reply_to_post",
        description = "Add a comment to a post using an authentication token."
    )]
    async fn reply_to_post(
        &self,
        Parameters(args): Parameters<ReplyToPostArgs>,
        peer: Peer<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let post_id = args.post_id;
        match self.state.reply_to_post(&self.session, args).await {
            Ok(result) => {
                let summary = format!("Comment created successfully for post {post_id}.");
                notify(&peer, LoggingLevel::Info, summary.clone()).await;
                structured(&result, summary)
            }
            Err(err) => Err(fail(&peer, err).await),
        }
    }

    #[tool(
        name = "reply_to_comment",
        description = "Reply to an existing comment using an authentication token."
    )]
    async fn reply_to_comment(
        &self,
        Parameters(args): Parameters<ReplyToCommentArgs>,
        peer: Peer<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let comment_id = args.comment_id;
        match self.state.reply_to_comment(&self.session, args).await {
            Ok(result) => {
                let summary = format!("Reply created successfully for comment {comment_id}.");
                notify(&peer, LoggingLevel::Info, summary.clone()).await;
                structured(&result, summary)
            }
            Err(err) => Err(fail(&peer, err).await),
        }
    }

    #[tool(
        name = "list_unread_messages",
        description = "List unread notifications for the authenticated user."
    )]
    async fn list_unread_messages(
        &self,
        Parameters(args): Parameters<ListUnreadArgs>,
        peer: Peer<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        match self.state.list_unread_messages(&self.session, args).await {
            Ok(response) => {
                let summary = format!(
                    "Found {} unread notifications on page {}.",
                    response.total, response.page
                );
                notify(&peer, LoggingLevel::Info, summary.clone()).await;
                structured(&response, summary)
            }
            Err(err) => Err(fail(&peer, err).await),
        }
    }

    #[tool(
        name = "mark_notifications_read",
        description = "Mark the given notifications as read for the authenticated user."
    )]
    async fn mark_notifications_read(
        &self,
        Parameters(args): Parameters<MarkReadArgs>,
        peer: Peer<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        match self.state.mark_notifications_read(&self.session, args).await {
            Ok(result) => {
                let summary = format!("Marked {} notifications as read.", result.total_marked);
                notify(&peer, LoggingLevel::Info, summary.clone()).await;
                structured(&result, summary)
            }
            Err(err) => Err(fail(&peer, err).await),
        }
    }
}

#[tool_handler]
impl ServerHandler for ForumMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_logging()
                .build(),
            server_info: Implementation {
                name: "forum-mcp".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(
                "Use this server to search forum content, create posts and replies with an \
                 authentication token, retrieve details for a specific post, list posts created \
                 within a recent time window, and manage unread notifications."
                    .to_string(),
            ),
        }
    }
}

/// Best-effort MCP logging notification; failures are logged and ignored.
async fn notify(peer: &Peer<RoleServer>, level: LoggingLevel, message: String) {
    let params = LoggingMessageNotificationParam {
        level,
        logger: None,
        data: serde_json::Value::String(message),
    };
    if let Err(e) = peer.notify_logging_message(params).await {
        warn!("failed to deliver logging notification: {e}");
    }
}

/// Emit the error notice, then convert the failure for the caller.
async fn fail(peer: &Peer<RoleServer>, err: ToolError) -> McpError {
    notify(peer, LoggingLevel::Error, err.to_string()).await;
    match err {
        ToolError::Validation(msg) | ToolError::AuthRequired(msg) => {
            McpError::invalid_params(msg, None)
        }
        ToolError::Upstream(msg) | ToolError::Unreachable(msg) | ToolError::MalformedResponse(msg) => {
            McpError::internal_error(msg, None)
        }
    }
}

/// Wrap a serializable result as a tool result with structured content.
fn structured<T: Serialize>(value: &T, summary: String) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_value(value)
        .map_err(|e| McpError::internal_error(format!("failed to serialize result: {e}"), None))?;
    let mut result = CallToolResult::success(vec![Content::text(summary)]);
    result.structured_content = Some(json);
    Ok(result)
}

/// Serve over stdio until the client disconnects.
pub async fn serve_stdio(state: Arc<AppState>) -> anyhow::Result<()> {
    let service = ForumMcp::new(state).serve(rmcp::transport::stdio()).await?;
    service.waiting().await?;
    Ok(())
}

/// Serve the SSE transport on `addr` until a shutdown signal arrives.
pub async fn serve_sse(state: Arc<AppState>, addr: SocketAddr) -> anyhow::Result<()> {
    let ct = CancellationToken::new();
    let config = SseServerConfig {
        bind: addr,
        sse_path: "/sse".to_string(),
        post_path: "/message".to_string(),
        ct: ct.clone(),
        sse_keep_alive: Some(Duration::from_secs(15)),
    };
    let (sse_server, router) = SseServer::new(config);

    let service_state = state;
    sse_server.with_service(move || ForumMcp::new(service_state.clone()));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "SSE transport listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            ct.cancel();
        })
        .await?;
    Ok(())
}

/// Serve the streamable HTTP transport at `/mcp` until a shutdown signal.
pub async fn serve_streamable_http(state: Arc<AppState>, addr: SocketAddr) -> anyhow::Result<()> {
    let service_state = state;
    let service = StreamableHttpService::new(
        move || Ok(ForumMcp::new(service_state.clone())),
        Arc::new(LocalSessionManager::default()),
        StreamableHttpServerConfig {
            stateful_mode: true,
            sse_keep_alive: Some(Duration::from_secs(15)),
            ..Default::default()
        },
    );
    let app = axum::Router::new().nest_service("/mcp", service);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "streamable HTTP transport listening at /mcp");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Resolve when SIGINT or SIGTERM is received.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

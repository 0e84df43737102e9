use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{delete, get, patch, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use strand_api::middleware::require_auth;
use strand_api::state::{AppState, AppStateInner};
use strand_api::{chat, threads, users};
use strand_llm::{LlmClient, ProviderConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "strand=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let db_path = std::env::var("STRAND_DB_PATH").unwrap_or_else(|_| "strand.db".into());
    let host = std::env::var("STRAND_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("STRAND_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database and model provider
    let db = strand_db::Database::open(&PathBuf::from(&db_path))?;
    let llm = LlmClient::new(ProviderConfig::from_env());

    let state: AppState = Arc::new(AppStateInner { db, llm });

    // Routes
    let public_routes = Router::new()
        .route("/share/{share_id}", get(threads::get_shared_thread))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/threads", get(threads::list_threads))
        .route("/threads/new", post(threads::new_thread))
        .route("/threads/branch", post(threads::branch_thread))
        .route("/threads/{thread_id}", get(threads::get_thread))
        .route("/threads/{thread_id}", patch(threads::rename_thread))
        .route("/threads/{thread_id}", delete(threads::delete_thread))
        .route("/threads/{thread_id}/messages", put(threads::save_messages))
        .route("/threads/{thread_id}/pin", put(threads::set_pinned))
        .route("/threads/{thread_id}/share", put(threads::set_require_auth))
        .route("/threads/{thread_id}/share/rotate", post(threads::rotate_share_id))
        .route("/threads/{thread_id}/clone", post(threads::clone_thread))
        .route("/chat", post(chat::completions))
        .route("/me/settings", get(users::get_ai_settings))
        .route("/me/settings", patch(users::update_ai_settings))
        .route("/me", delete(users::delete_me))
        .layer(middleware::from_fn(require_auth))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Strand server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

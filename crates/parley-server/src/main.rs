use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use parley_api::attachments::AttachmentStore;
use parley_api::auth::{self, AppState, AppStateInner};
use parley_api::ingress::ChatService;
use parley_api::messages;
use parley_api::middleware::require_auth;
use parley_api::users;
use parley_gateway::connection::{self, GatewayState};
use parley_gateway::fanout::DeliveryFanout;
use parley_gateway::registry::ConnectionRegistry;
use parley_types::token::TokenVerifier;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("PARLEY_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("PARLEY_DB_PATH").unwrap_or_else(|_| "parley.db".into());
    let host = std::env::var("PARLEY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("PARLEY_PORT")
        .unwrap_or_else(|_| "8000".into())
        .parse()?;
    let attachment_url = std::env::var("PARLEY_ATTACHMENT_URL").ok();

    // Init database
    let db = Arc::new(parley_db::Database::open(&PathBuf::from(&db_path))?);

    // Shared state: one registry and one verifier for the whole process,
    // injected into both boundaries.
    let verifier = Arc::new(TokenVerifier::new(&jwt_secret));
    let registry = ConnectionRegistry::new();
    let fanout = DeliveryFanout::new(registry.clone());
    let chat = ChatService::new(db.clone(), fanout, AttachmentStore::new(attachment_url));

    let app_state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret,
        chat: chat.clone(),
    });
    let gateway_state = GatewayState {
        verifier: verifier.clone(),
        registry,
        ingress: Arc::new(chat),
    };

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route(
            "/messages",
            post(messages::send_message).get(messages::list_messages),
        )
        .route("/messages/search", get(messages::search_messages))
        .route(
            "/messages/{id}",
            get(messages::get_message)
                .put(messages::update_message)
                .delete(messages::delete_message),
        )
        .route("/users", get(users::list_users))
        .route("/users/{id}", get(users::get_user))
        .layer(middleware::from_fn_with_state(verifier, require_auth))
        .with_state(app_state);

    let ws_route = Router::new()
        .route("/gateway", get(connection::ws_upgrade))
        .with_state(gateway_state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Parley server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use crate::config::TransientConfig;
use crate::scheduler::DumpScheduler;
use crate::storage::{schema, SharedEngine, SqliteStore};
use crate::seeder;

pub mod routes;

pub const APP_NAME: &str = "TransientDB";

/// Header carrying the API token when auth is configured
pub const AUTH_HEADER: &str = "x-auth-token";

/// Server state
pub struct AppState {
    pub store: Arc<SqliteStore>,
    pub auth_token: Option<String>,
}

pub fn router(state: Arc<AppState>, access_log: bool) -> Router {
    let app = Router::new()
        .route("/", get(routes::root))
        .route("/tables", get(routes::tables))
        .route("/vacuum", get(routes::vacuum))
        .route("/execute", post(routes::execute))
        .route("/query", post(routes::query))
        .route("/index/{table}/{name}/{field}", post(routes::create_index))
        .route("/count/{table}", get(routes::count))
        .route("/{table}", get(routes::get_rows).post(routes::insert))
        .layer(middleware::from_fn_with_state(state.clone(), check_token))
        .layer(middleware::from_fn(security_headers))
        .with_state(state);

    if access_log {
        app.layer(TraceLayer::new_for_http())
    } else {
        app
    }
}

async fn check_token(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    if let Some(expected) = state.auth_token.as_deref() {
        let supplied = request.headers().get(AUTH_HEADER).and_then(|v| v.to_str().ok());
        if supplied != Some(expected) {
            return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("x-xss-protection", HeaderValue::from_static("1; mode=block"));
    headers.insert(header::SERVER, HeaderValue::from_static(APP_NAME));
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("deny"));
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    response
}

/// Bring the whole system up and serve until Ctrl-C.
///
/// Startup order: open the engine, apply schema files, launch the CSV
/// loads and the dump scheduler in the background, then accept requests.
/// On shutdown the scheduler is cancelled and awaited.
pub async fn start_server(config: TransientConfig) -> anyhow::Result<()> {
    tracing::info!("Initializing db ({})", config.server.dsn);
    let store = Arc::new(SqliteStore::open(&config.server.dsn)?);
    let engine: SharedEngine = store.clone();

    let schemas = &config.server.schemas_folder;
    let applied = schema::apply_schema_dir(engine.as_ref(), schemas);
    tracing::info!("Applied {} schema file(s) from {}", applied, schemas.display());

    let loads = seeder::seed(engine.clone(), &config.server.data_folder);
    tokio::spawn(async move {
        let summary = seeder::collect(loads).await;
        tracing::info!("Startup load finished: {}", summary);
    });

    let cancel = CancellationToken::new();
    let maintenance = DumpScheduler::new(engine, config.scheduler()).spawn(cancel.clone());

    let state = Arc::new(AppState {
        store,
        auth_token: config.auth_token().map(str::to_string),
    });
    tracing::info!("Auth enabled={}", state.auth_token.is_some());
    let app = router(state, config.server.access_log);

    let addr = format!("{}:{}", config.server.listen, config.server.port);
    tracing::info!("{} [{}] listening on {}", APP_NAME, config.server.tag, addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shut down triggered - stopping maintenance.");
    cancel.cancel();
    maintenance.await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

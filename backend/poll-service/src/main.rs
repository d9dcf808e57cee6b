use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use poll_service::{
    config::{Config, StoreBackend},
    db, error::AppError, logging,
    middleware::TokenVerifier,
    repository::{MemoryPollRepository, PgPollRepository, PollRepository},
    routes,
    state::AppState,
    websocket::PollEventHub,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing_actix_web::TracingLogger;

fn build_cors(allowed_origins: &[String]) -> Cors {
    let cors = Cors::default()
        .allow_any_method()
        .allow_any_header()
        .max_age(3600);

    if allowed_origins.is_empty() {
        return cors.allow_any_origin();
    }
    allowed_origins
        .iter()
        .fold(cors, |cors, origin| cors.allowed_origin(origin))
}

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    logging::init_tracing();

    let cfg = Config::from_env()?;
    tracing::info!(config = ?cfg, "configuration loaded");

    let (repo, pool): (Arc<dyn PollRepository>, Option<PgPool>) = match cfg.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store; polls are lost on restart");
            let repo: Arc<dyn PollRepository> = Arc::new(MemoryPollRepository::new());
            (repo, None)
        }
        StoreBackend::Postgres => {
            let db_cfg = cfg
                .database
                .as_ref()
                .ok_or_else(|| AppError::Config("DATABASE_URL missing".into()))?;
            let pool = db::init_pool(db_cfg)
                .await
                .map_err(|e| AppError::StartServer(format!("db: {e}")))?;
            let repo: Arc<dyn PollRepository> = Arc::new(PgPollRepository::new(pool.clone()));
            (repo, Some(pool))
        }
    };

    let hub = PollEventHub::new();
    let state = AppState::new(repo, hub.clone(), TokenVerifier::new(&cfg.jwt_secret));

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, "starting poll-service");

    let allowed_origins = cfg.cors_allowed_origins.clone();
    let server = HttpServer::new(move || {
        App::new()
            .wrap(build_cors(&allowed_origins))
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(state.clone()))
            .configure(routes::configure)
    })
    .bind(&bind_addr)
    .map_err(|e| AppError::StartServer(format!("bind: {e}")))?
    .run();

    let result = server
        .await
        .map_err(|e| AppError::StartServer(format!("server: {e}")));

    hub.shutdown();
    if let Some(pool) = pool {
        pool.close().await;
    }
    tracing::info!("poll-service stopped");

    result
}

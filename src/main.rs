use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tower::make::Shared;
use tracing_subscriber::EnvFilter;

use talenta_backend::auth::jwt::JwtService;
use talenta_backend::config::AppConfig;
use talenta_backend::db;
use talenta_backend::routes::create_router;
use talenta_backend::s3::build_storage;
use talenta_backend::school_lookup::KemdikbudDirectory;
use talenta_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "api",
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        server_host = %config.server_host,
        server_port = config.server_port,
        s3_bucket = %config.s3_bucket,
        school_lookup_url = %config.school_lookup_url,
        max_upload_bytes = config.max_upload_bytes,
        "loaded backend configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    let applied = db::run_migrations(&pool)?;
    tracing::info!(applied, "database migrations up to date");

    let storage = Arc::new(build_storage(&config).await?);
    let school_directory = Arc::new(KemdikbudDirectory::new(config.school_lookup_url.clone()));
    let jwt = JwtService::from_config(&config)?;

    let state = AppState::new(pool, config, storage, school_directory, jwt);
    let listen_addr: SocketAddr = {
        let config = state.config.clone();
        format!("{}:{}", config.server_host, config.server_port).parse()?
    };
    let router = create_router(state);

    let listener = TcpListener::bind(listen_addr).await?;
    tracing::info!("listening on {}", listen_addr);

    axum::serve(listener, Shared::new(router)).await?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

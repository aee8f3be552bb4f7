use anyhow::Result;
use common::{
    cache::{RedisConfig, RedisPool},
    database::{self, DatabaseConfig},
};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use identity::{
    AppState, Backends,
    config::Settings,
    jwt::{JwtConfig, JwtService},
    password::PasswordService,
    repositories::{PgAttemptLedger, PgRefreshTokenStore, PgRoleStore, UserRepository},
    routes,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting identity service");

    let settings = Settings::from_env()?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;
    database::health_check(&pool).await?;
    info!("Database connection successful");

    // Initialize Redis connection pool
    let redis_config = RedisConfig::from_env()?;
    let redis_pool = RedisPool::new(&redis_config).await?;
    if !redis_pool.health_check().await? {
        anyhow::bail!("Failed to connect to Redis");
    }

    // Initialize JWT service
    let jwt_config = JwtConfig::from_env(settings.access_token_ttl())?;
    let jwt_service = JwtService::new(jwt_config)?;

    let backends = Backends {
        users: Arc::new(UserRepository::new(pool.clone())),
        attempts: Arc::new(PgAttemptLedger::new(pool.clone())),
        refresh_tokens: Arc::new(PgRefreshTokenStore::new(pool.clone())),
        roles: Arc::new(PgRoleStore::new(pool)),
        cache: Arc::new(redis_pool),
    };

    let listen_addr = settings.listen_addr.clone();
    let app_state = AppState::new(settings, jwt_service, PasswordService::new()?, backends);

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Identity service listening on {}", listen_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

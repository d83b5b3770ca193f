use admins_server::{
    auth::{RoleChecker, RoleMatrix},
    build_router,
    cli::{Cli, Commands},
    config::ServerConfig,
    state::ServerState,
    storage::{
        AccountStore, MemoryAccountStore, MemorySessionStore, PostgresAccountStore,
        PostgresSessionStore, SessionStore,
    },
};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "admins_server=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = ServerConfig::from_env()?;

    let (account_store, session_store): (Arc<dyn AccountStore>, Arc<dyn SessionStore>) =
        match &config.database_url {
            Some(url) => {
                let pool = PgPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await?;

                let accounts = PostgresAccountStore::new(pool.clone());
                accounts.initialize().await?;
                let sessions = PostgresSessionStore::new(pool);
                sessions.initialize().await?;

                info!("✅ Database connected and schema initialized");
                (Arc::new(accounts), Arc::new(sessions))
            }
            None => {
                warn!("DATABASE_URL not set, accounts and sessions are kept in memory");
                (
                    Arc::new(MemoryAccountStore::new()),
                    Arc::new(MemorySessionStore::new()),
                )
            }
        };

    let roles: Option<Arc<dyn RoleChecker>> = match &config.role_matrix_path {
        Some(path) => {
            let matrix = RoleMatrix::from_file(path)?;
            info!("Loaded {} roles from {:?}", matrix.role_count(), path);
            Some(Arc::new(matrix))
        }
        None => None,
    };

    let state = Arc::new(ServerState::new(
        config.clone(),
        account_store,
        session_store,
        roles,
    )?);

    match cli.command {
        Some(Commands::Account(cmd)) => {
            if config.database_url.is_none() {
                warn!("Account changes will be lost on exit without DATABASE_URL");
            }
            return cmd.execute(state.accounts()).await;
        }
        Some(Commands::Serve) | None => {}
    }

    info!("🚀 Starting admins server v{}", VERSION);
    info!("📋 Configuration loaded:");
    info!("   Port: {}", config.port);
    info!("   Bind address: {}", config.bind_addr);
    info!("   Session cookie: {}", config.session_cookie_name);
    info!("   Session TTL: {}s (0 = until logout)", config.session_ttl_seconds);
    info!("   Role enforcement: {}", state.auth_state.role_enforcement());
    info!("   Passwordless accounts: {}", config.allow_passwordless_accounts);
    info!("   Self registration: {}", config.allow_self_registration);
    info!("   CORS origins: {:?}", config.cors_origins);

    // Spawn background task to cleanup expired sessions
    {
        let session_manager = state.auth_state.sessions.clone();
        tokio::spawn(async move {
            let mut interval = time::interval(Duration::from_secs(300)); // Every 5 minutes
            loop {
                interval.tick().await;
                match session_manager.cleanup_expired().await {
                    Ok(0) => {}
                    Ok(cleaned) => info!("Cleaned up {} expired sessions", cleaned),
                    Err(e) => error!("Session cleanup failed: {}", e),
                }
            }
        });
    }

    let app = build_router(state);

    let addr: SocketAddr = config.bind_address().parse()?;
    info!("🎧 Listening on http://{}", addr);
    info!("🔑 Health endpoint: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

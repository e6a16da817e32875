use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::info;

use stockroom_api::auth::AuthService;
use stockroom_api::config::{self, AppConfig};
use stockroom_api::db;
use stockroom_api::events::{process_events, EventSender};
use stockroom_api::poller::PollPolicy;
use stockroom_api::services::cart::MemoryCartStore;
use stockroom_api::services::{
    AnalysisService, DashboardService, GuestService, ItemService, RequestService, UserService,
};
use stockroom_api::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::load_config().context("failed to load configuration")?;
    config::init_tracing(&config.log_level, config.log_json);
    info!(
        environment = %config.environment,
        "starting {} {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let db_pool = Arc::new(
        db::establish_connection(&config)
            .await
            .context("failed to connect to the database")?,
    );
    if config.auto_migrate {
        db::run_migrations(&db_pool)
            .await
            .context("failed to run migrations")?;
        info!("database schema up to date");
    }

    let (event_tx, event_rx) = mpsc::channel(1024);
    let event_sender = EventSender::new(event_tx);
    tokio::spawn(process_events(event_rx));

    let state = build_state(config, db_pool, Some(event_sender))?;
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, "listening");

    let router = build_router(Arc::clone(&state));
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutdown complete");
    Ok(())
}

fn build_state(
    config: AppConfig,
    db_pool: Arc<db::DbPool>,
    event_sender: Option<EventSender>,
) -> anyhow::Result<Arc<AppState>> {
    let auth = Arc::new(AuthService::new(&config));
    let http_client = reqwest::Client::new();

    let analysis = Arc::new(AnalysisService::new(
        http_client,
        config.analysis_base_url.clone(),
        PollPolicy::from_config(&config),
        config.max_upload_bytes,
        event_sender.clone(),
    ));

    Ok(Arc::new(AppState {
        auth,
        db: Arc::clone(&db_pool),
        items: ItemService::new(Arc::clone(&db_pool), event_sender.clone()),
        requests: RequestService::new(
            Arc::clone(&db_pool),
            event_sender.clone(),
            config.empty_request_policy,
        ),
        users: UserService::new(Arc::clone(&db_pool)),
        guests: GuestService::new(Arc::clone(&db_pool), event_sender),
        dashboard: DashboardService::new(Arc::clone(&db_pool)),
        analysis,
        cart: MemoryCartStore::new(),
        config,
    }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

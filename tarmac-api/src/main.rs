use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tarmac_api::{app, state::{AppState, AuthConfig}};
use tarmac_core::{BookingService, FlightService, PassengerService, TransactionManager};
use tarmac_store::app_config::{Config, LogFormat};
use tarmac_store::{
    DbClient, PgBaggageRepository, PgFlightRepository, PgPassengerRepository, PgTicketRepository,
    PgTransactions,
};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tarmac_api=debug,tarmac_core=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("Failed to load config")?;
    init_tracing(config.log.format);
    tracing::info!("Starting Tarmac booking API on port {}", config.server.port);

    let db = DbClient::new(&config.database)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await.context("Failed to run migrations")?;

    let pool = db.pool.clone();
    let flights = Arc::new(PgFlightRepository::new(pool.clone()));
    let tickets = Arc::new(PgTicketRepository::new(pool.clone()));
    let passengers = PassengerService::new(Arc::new(PgPassengerRepository::new(pool.clone())));
    let transactions = TransactionManager::new(Arc::new(PgTransactions::new(pool.clone())))
        .with_timeout(config.booking.unit_of_work_timeout());

    let bookings = BookingService::new(
        transactions,
        flights.clone(),
        tickets.clone(),
        passengers,
        Arc::new(PgBaggageRepository::new(pool)),
    );
    let catalog = FlightService::<PgTransactions>::new(flights, tickets);

    let app_state = AppState {
        bookings: Arc::new(bookings),
        flights: Arc::new(catalog),
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app(app_state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

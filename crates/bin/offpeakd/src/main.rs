//! # offpeakd
//!
//! Binary entry-point for the offpeak scheduler daemon.
//!
//! This is the **composition root**: the only place that knows about every
//! adapter. It builds the schedulers from configuration, restores persisted
//! options, spawns the background tasks and serves the HTTP API until a
//! shutdown signal arrives.

mod config;

use std::error::Error;
use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use offpeak_adapter_homeassistant::{StatePoller, run_state_poller};
use offpeak_adapter_http_axum::router;
use offpeak_adapter_http_axum::state::AppState;
use offpeak_adapter_storage_sqlite_sqlx::SqliteOptionsStore;
use offpeak_adapter_virtual::VirtualIntegration;
use offpeak_app::event_bus::InProcessEventBus;
use offpeak_app::ports::{Actuator, StateReader, SystemClock};
use offpeak_app::registry::SchedulerRegistry;
use offpeak_app::scheduler::Scheduler;
use offpeak_app::services::control_service::ControlService;
use offpeak_app::tasks::{run_door_watcher, run_minute_ticker};

use crate::config::{Config, IntegrationKind};

const EVENT_BUS_CAPACITY: usize = 256;
const SNAPSHOT_FEED_CAPACITY: usize = 64;

type Bus = Arc<InProcessEventBus>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.logging.filter).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let db = offpeak_adapter_storage_sqlite_sqlx::Config {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await?;
    let store = SqliteOptionsStore::new(db.pool().clone());
    let bus: Bus = Arc::new(InProcessEventBus::new(EVENT_BUS_CAPACITY));
    let shutdown = shutdown_signal();

    match config.integration.kind {
        IntegrationKind::Virtual => {
            let integration = Arc::new(VirtualIntegration::new(
                config.schedulers.iter().map(|scheduler| scheduler.name.clone()),
                config.timezone()?,
                Arc::clone(&bus),
                SystemClock,
            ));
            tracing::info!(
                integration = integration.name(),
                devices = integration.dishwashers().count(),
                "simulated devices ready"
            );
            run(&config, integration, store, &bus, shutdown).await
        }
        IntegrationKind::HomeAssistant => {
            let homeassistant = offpeak_adapter_homeassistant::Config {
                base_url: config.integration.base_url.clone().unwrap_or_default(),
                token: config.integration.token.clone().unwrap_or_default(),
                request_timeout: config.actuator_timeout(),
            }
            .build()?;

            let doors: Vec<String> = config
                .schedulers
                .iter()
                .filter_map(|scheduler| scheduler.door_sensor_entity.clone())
                .collect();
            let poller = (!doors.is_empty()).then(|| {
                tokio::spawn(run_state_poller(
                    StatePoller::new(doors),
                    homeassistant.clone(),
                    Arc::clone(&bus),
                    SystemClock,
                    config.poll_interval(),
                    shutdown.clone(),
                ))
            });

            run(&config, homeassistant, store, &bus, shutdown).await?;
            if let Some(poller) = poller {
                poller.await?;
            }
            Ok(())
        }
    }
}

/// Build the schedulers over `integration`, then serve until shutdown.
async fn run<I>(
    config: &Config,
    integration: I,
    store: SqliteOptionsStore,
    bus: &Bus,
    shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn Error>>
where
    I: StateReader + Actuator + Clone + 'static,
{
    let timezone = config.timezone()?;
    let mut registry = SchedulerRegistry::new(SNAPSHOT_FEED_CAPACITY);
    for scheduler in &config.schedulers {
        let settings = scheduler.settings(timezone, config.actuator_timeout());
        tracing::info!(
            scheduler = %settings.name,
            start_button = %settings.start_button_entity,
            "scheduler configured"
        );
        registry.insert(Scheduler::new(
            settings,
            scheduler.options()?,
            integration.clone(),
            integration.clone(),
            SystemClock,
        ));
    }
    let registry = Arc::new(registry);

    let control = Arc::new(ControlService::new(Arc::clone(&registry), store));
    control.restore_options().await?;

    let ticker = tokio::spawn(run_minute_ticker(
        Arc::clone(&registry),
        SystemClock,
        shutdown.clone(),
    ));
    let door_watcher = tokio::spawn(run_door_watcher(
        Arc::clone(&registry),
        bus.subscribe(),
        shutdown.clone(),
    ));

    let app = router::build(AppState::from_arc(control));
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "offpeakd listening");

    let mut stop = shutdown;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = stop.wait_for(|stopping| *stopping).await;
        })
        .await?;

    ticker.await?;
    door_watcher.await?;
    tracing::info!("offpeakd stopped");
    Ok(())
}

/// Flip the returned channel to `true` on Ctrl+C or SIGTERM.
fn shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("shutdown signal received");
        let _ = tx.send(true);
    });
    rx
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

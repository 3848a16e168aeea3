// main.rs
mod commands;
mod config;
mod docs;
mod driver;
mod error;
mod handlers;
mod lut;
mod metrics;
mod models;
mod registry;
mod scheduler;

use axum::{Router, response::Redirect, routing::get};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tower_http::services::ServeDir;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use validator::Validate;

use driver::{ALL_FIXTURES, FixtureDriver, LightsdClient};
use error::AppError;
use handlers::*;
use lut::{Lut, StateTable};
use models::{AppState, PowerState};
use registry::ObserverRegistry;
use scheduler::{FadeSettings, Scheduler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let settings = config::Settings::new()
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
    settings
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid config: {}", e))?;

    if settings.metrics.enabled {
        metrics::setup(settings.metrics.port)?;
    }

    tracing::info!("<<<<<<<<<<<<<<<<<< SYSTEM RESTART >>>>>>>>>>>>>>>>>>>>>");

    let driver: Arc<dyn FixtureDriver> =
        Arc::new(LightsdClient::new(&settings.driver.socket));
    // no reachable fixtures means there is nothing to control
    let initial_power = probe_fixtures(driver.as_ref()).await?;

    let table: Arc<dyn StateTable> = Arc::new(Lut::from_curve(&settings.curve)?);

    let registry = Arc::new(ObserverRegistry::new());
    let (power_tx, _) = watch::channel(initial_power);
    let (command_tx, command_rx) = mpsc::channel(16);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sched = Scheduler::new(
        driver,
        Arc::clone(&table),
        registry,
        FadeSettings::from(&settings.fade),
        power_tx,
        command_rx,
        shutdown_rx.clone(),
    );
    let scheduler_task = tokio::spawn(sched.run());
    let refresh_task = tokio::spawn(scheduler::run_daily_refresh(table, shutdown_rx));

    let state = Arc::new(AppState {
        requests: command_tx,
    });

    let app = Router::new()
        .route("/", get(|| async { Redirect::permanent("/static/") }))
        .route("/ws", get(handle_switch_ws_upgrade))
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", docs::ApiDoc::openapi()))
        .nest_service("/static", ServeDir::new("static"))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&settings.server.address)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind address: {}", e))?;

    tracing::info!("Server started on {}", settings.server.address);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
            let _ = shutdown_tx.send(true);
        })
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    let _ = tokio::join!(scheduler_task, refresh_task);
    Ok(())
}

/// Boot check: list every fixture and take the first one's power as the
/// shared state. The whole set is driven in lockstep from here on.
async fn probe_fixtures(driver: &dyn FixtureDriver) -> Result<PowerState, AppError> {
    let fixtures = driver
        .query_state(ALL_FIXTURES)
        .await
        .map_err(AppError::DriverUnavailable)?;
    for fixture in &fixtures {
        tracing::info!(
            label = %fixture.label,
            power = fixture.power,
            hsbk = ?fixture.hsbk,
            "fixture"
        );
    }
    let on = fixtures.first().map(|f| f.power).unwrap_or(true);
    Ok(PowerState::from_on(on))
}

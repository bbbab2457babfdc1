use anyhow::{Context, Result};
use fulcrum_tracker::api::{create_routes, TrackerAppState};
use fulcrum_tracker::config::{AppConfig, TrackerConfig};
use fulcrum_tracker::services::sensor_service::sensor_catalogue;
use fulcrum_tracker::services::{
    CoordinatorSettings, GoogleCalendarClient, GoogleServiceAccountAuth, RefreshCoordinator,
    RefreshScheduler, Sources, WorkoutCalendarClient, ZenPlannerAttendanceClient, ZenPlannerAuth,
    ZenPlannerPrClient,
};
use fulcrum_tracker::storage::TrackerStore;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let app_config = AppConfig::from_env().context("Invalid server settings")?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&app_config.log_level)),
        )
        .init();

    let config_path = app_config.config_path.as_ref().map(PathBuf::from);
    let config = TrackerConfig::load(config_path.as_deref()).context("Failed to load tracker config")?;

    // ZenPlanner clients share one session
    let zenplanner_auth = Arc::new(ZenPlannerAuth::new(&config.zenplanner)?);
    let attendance = Arc::new(ZenPlannerAttendanceClient::new(
        zenplanner_auth.clone(),
        &config.zenplanner,
    ));
    let records = Arc::new(ZenPlannerPrClient::new(
        zenplanner_auth.clone(),
        &config.zenplanner,
        config.exercises.clone(),
    ));

    let google_auth = Arc::new(GoogleServiceAccountAuth::new(&config.google)?);
    let calendar = Arc::new(GoogleCalendarClient::new(
        google_auth,
        &config.google,
        config.zenplanner.start_date,
    )?);
    let workouts = Arc::new(WorkoutCalendarClient::new(
        calendar.clone(),
        config.google.workout_calendar_id.clone(),
    ));

    let store = Arc::new(TrackerStore::load(config.storage.path.clone()).await);
    let history_loaded = store.historical_load_done().await;

    let sources = Sources {
        attendance,
        records,
        calendar,
        workouts,
    };
    let coordinator = Arc::new(
        RefreshCoordinator::new(sources, store, CoordinatorSettings::from_config(&config)).await,
    );

    let scheduler = RefreshScheduler::new(
        coordinator.clone(),
        config.schedule.update_interval(),
        config.schedule.startup_delay(history_loaded),
    )
    .await?;
    scheduler.start().await?;

    let catalogue = sensor_catalogue(&config.trainer_roster(), &config.exercise_kinds());
    info!("Publishing {} sensors", catalogue.len());
    let app = create_routes(TrackerAppState::new(coordinator, catalogue));

    let address = app_config.server_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Fulcrum Tracker listening on http://{}", address);
    info!("Sensors available at http://{}/api/sensors", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop().await?;
    zenplanner_auth.close();
    info!("Fulcrum Tracker stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
    }
}

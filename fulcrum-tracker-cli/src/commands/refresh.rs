use anyhow::Result;

use crate::api::{ApiClient, ApiError};
use crate::models::CollectionStats;

pub async fn trigger_refresh(client: &ApiClient) -> Result<()> {
    println!("Refreshing from ZenPlanner and Google Calendar...");

    match client.refresh().await {
        Ok(stats) => {
            println!("{}", format_refresh(&stats));
            Ok(())
        }
        Err(e) => {
            match e.downcast_ref::<ApiError>() {
                Some(ApiError::Conflict(_)) => {
                    println!("✗ A refresh is already running; try again shortly.")
                }
                _ => println!("✗ Refresh failed: {}", e),
            }
            Err(e)
        }
    }
}

pub fn format_refresh(stats: &CollectionStats) -> String {
    format!(
        "✓ Refresh complete in {:.1}s: {} sessions, phase {}",
        stats.refresh_duration_secs, stats.total_sessions, stats.current_phase
    )
}

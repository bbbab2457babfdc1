use anyhow::Result;

use crate::api::ApiClient;
use crate::models::StatusResponse;

pub async fn show_status(client: &ApiClient) -> Result<()> {
    let status = client.status().await?;
    println!("{}", format_status(client.base_url(), &status));
    Ok(())
}

pub fn format_status(base_url: &str, status: &StatusResponse) -> String {
    let stats = &status.collection_stats;
    let storage = &status.storage;

    let last_refresh = stats
        .last_refresh_completed
        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "never".to_string());
    let outcome = match (stats.refresh_in_progress, stats.refresh_success) {
        (true, _) => "running".to_string(),
        (false, Some(true)) => format!("ok ({:.1}s)", stats.refresh_duration_secs),
        (false, Some(false)) => "failed".to_string(),
        (false, None) => "pending".to_string(),
    };

    let mut lines = vec![
        format!("Fulcrum Tracker at {}", base_url),
        "────────────────────────────────".to_string(),
        format!("  Phase:           {}", stats.current_phase),
        format!("  Last refresh:    {}", last_refresh),
        format!("  Result:          {}", outcome),
        format!("  Total sessions:  {}", storage.total_sessions),
        format!("  New sessions:    {}", stats.new_sessions_today),
        format!("  Update streak:   {}", stats.update_streak),
        format!(
            "  History loaded:  {}",
            if storage.historical_load_done { "yes" } else { "no" }
        ),
    ];

    if let Some(error) = &stats.last_error {
        lines.push(format!("  Last error:      {}", error));
    }
    if !status.has_data {
        lines.push(String::new());
        lines.push("No data published yet; sensors report loading states.".to_string());
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CollectionStats, StorageSummary};

    #[test]
    fn test_format_status_failed_refresh() {
        let status = StatusResponse {
            collection_stats: CollectionStats {
                current_phase: "historical_load".to_string(),
                refresh_success: Some(false),
                last_error: Some("Calendar request failed: 403".to_string()),
                ..Default::default()
            },
            storage: StorageSummary::default(),
            has_data: false,
        };

        let out = format_status("http://localhost:8787", &status);
        assert!(out.contains("Phase:           historical_load"));
        assert!(out.contains("Last refresh:    never"));
        assert!(out.contains("Result:          failed"));
        assert!(out.contains("Last error:      Calendar request failed: 403"));
        assert!(out.contains("No data published yet"));
    }

    #[test]
    fn test_format_status_loaded() {
        let status = StatusResponse {
            collection_stats: CollectionStats {
                current_phase: "incremental".to_string(),
                refresh_success: Some(true),
                refresh_duration_secs: 2.34,
                update_streak: 4,
                ..Default::default()
            },
            storage: StorageSummary {
                historical_load_done: true,
                total_sessions: 212,
                ..Default::default()
            },
            has_data: true,
        };

        let out = format_status("http://localhost:8787", &status);
        assert!(out.contains("Result:          ok (2.3s)"));
        assert!(out.contains("Total sessions:  212"));
        assert!(out.contains("History loaded:  yes"));
        assert!(!out.contains("No data published"));
    }
}

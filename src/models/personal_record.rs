use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Best result for one exercise type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalRecord {
    pub value: String,
    pub date: Option<String>,
    pub last_result: Option<String>,
    pub days_since: Option<String>,
    pub attempts: Option<String>,
}

impl PersonalRecord {
    pub fn days_since(&self) -> Option<i64> {
        self.days_since.as_deref().and_then(|d| d.trim().parse().ok())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// Entries were filtered by the member id found on the page
    Auto,
    /// Entries were filtered by the configured member id
    Configured,
    /// No id available, every entry on the page was used
    AllData,
    None,
}

/// Formatted PR data published to the sensors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrSummary {
    pub prs_by_type: BTreeMap<String, Option<PersonalRecord>>,
    pub recent_prs: String,
    pub total_prs: u32,
    pub recent_pr_count: u32,
    pub user_id_detected: bool,
    pub detection_method: DetectionMethod,
}

impl PrSummary {
    pub fn empty(kinds: &[String]) -> Self {
        Self {
            prs_by_type: kinds.iter().map(|kind| (kind.clone(), None)).collect(),
            recent_prs: "No PR data available".to_string(),
            total_prs: 0,
            recent_pr_count: 0,
            user_id_detected: false,
            detection_method: DetectionMethod::None,
        }
    }

    pub fn record(&self, kind: &str) -> Option<&PersonalRecord> {
        self.prs_by_type.get(kind).and_then(|pr| pr.as_ref())
    }
}

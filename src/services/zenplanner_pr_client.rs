use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::config::{ExerciseMapping, ZenPlannerConfig};
use crate::error::TrackerError;
use crate::models::{DetectionMethod, PersonalRecord, PrSummary};
use crate::services::zenplanner_auth_client::{check_status, ZenPlannerAuth};

/// Days within which a PR counts as recent
pub const RECENT_PR_DAYS: i64 = 7;

const NO_RECENT_PRS: &str = "No new PRs yet... but there's still time! 💪";

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("PR page pattern should compile"))
        .collect()
}

static USER_ID_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r#"(?i)personid["\s]*:["\s]*([A-F0-9-]{36})"#,
        r#"(?i)userId["\s]*:["\s]*([A-F0-9-]{36})"#,
        r#"(?i)currentUser["\s]*:["\s]*([A-F0-9-]{36})"#,
        r#"(?i)data-user-id["\s]*=["\s]*([A-F0-9-]{36})"#,
        r#"(?i)person[iI]d["\s]*:["\s]*["']([A-F0-9-]{36})["']"#,
    ])
});

static RESULT_SET_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?is)personResults\.resultSet\s*=\s*\[(.*?)\];",
        r"(?is)resultSet\s*=\s*\[(.*?)\]",
        r"(?is)var\s+results\s*=\s*\[(.*?)\]",
        r"(?is)data\s*=\s*\[(.*?)\]",
        r#"(?is)"results"\s*:\s*\[(.*?)\]"#,
    ])
});

static ANY_ENTRY_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r#"(?i)\{[^}]*personid\s*:\s*["'][^}]+\}"#,
        r#"(?i)\{[^}]*["']personid["'][^}]+\}"#,
        r"(?i)\{[^}]*skillname[^}]+\}",
    ])
});

static NAME_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r#"(?i)skillname["\s]*:["\s]*["']([^"']+)["']"#,
        r#"(?i)["']skillname["'][^:]*:["\s]*["']([^"']+)["']"#,
        r#"(?i)name["\s]*:["\s]*["']([^"']+)["']"#,
    ])
});

static VALUE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r#"(?i)\bpr["\s]*:["\s]*["']([^"']+)["']"#,
        r#"(?i)["']pr["'][^:]*:["\s]*["']([^"']+)["']"#,
        r#"(?i)record["\s]*:["\s]*["']([^"']+)["']"#,
    ])
});

static LAST_RESULT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r#"(?i)lastresult["\s]*:["\s]*["']([^"']+)["']"#,
        r#"(?i)\blast["\s]*:["\s]*["']([^"']+)["']"#,
    ])
});

static DAYS_SINCE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r#"(?i)dayssince["\s]*:["\s]*["']([^"']+)["']"#,
        r#"(?i)dayssince["\s]*:\s*(\d+)"#,
        r#"(?i)\bdays["\s]*:["\s]*["']([^"']+)["']"#,
    ])
});

static ATTEMPT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r#"(?i)tries["\s]*:["\s]*["']([^"']+)["']"#,
        r#"(?i)tries["\s]*:\s*(\d+)"#,
        r#"(?i)attempts["\s]*:["\s]*["']([^"']+)["']"#,
    ])
});

static DATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r#"(?i)lastdate["\s]*:["\s]*["']([^"']+)["']"#,
        r#"(?i)\bdate["\s]*:["\s]*["']([^"']+)["']"#,
    ])
});

/// One row of the PR table as it appears in the page script
#[derive(Debug, Clone, PartialEq)]
pub struct RawPrEntry {
    pub name: String,
    pub record: PersonalRecord,
}

/// Reads personal records from the ZenPlanner PR page
pub struct ZenPlannerPrClient {
    auth: Arc<ZenPlannerAuth>,
    configured_user_id: Option<String>,
    exercises: Vec<ExerciseMapping>,
    detected_user_id: Mutex<Option<String>>,
}

impl ZenPlannerPrClient {
    pub fn new(
        auth: Arc<ZenPlannerAuth>,
        config: &ZenPlannerConfig,
        exercises: Vec<ExerciseMapping>,
    ) -> Self {
        Self {
            auth,
            configured_user_id: config.user_id.clone().filter(|id| !id.trim().is_empty()),
            exercises,
            detected_user_id: Mutex::new(None),
        }
    }

    pub fn exercise_kinds(&self) -> Vec<String> {
        self.exercises.iter().map(|e| e.kind.clone()).collect()
    }

    pub fn detected_user_id(&self) -> Option<String> {
        self.detected_user_id
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    async fn fetch_page(&self) -> Result<String, TrackerError> {
        let url = format!("{}/workout-pr-page.cfm", self.auth.base_url());
        let response = self
            .auth
            .http()
            .get(&url)
            .send()
            .await
            .map_err(|e| TrackerError::Network(format!("Failed to load PR page: {}", e)))?;

        check_status(response.status(), "PR page")?;

        response
            .text()
            .await
            .map_err(|e| TrackerError::Network(format!("Failed to read PR page: {}", e)))
    }

    /// Best record per exercise kind and how the member's rows were picked
    pub async fn fetch_prs(
        &self,
    ) -> Result<(BTreeMap<String, PersonalRecord>, DetectionMethod), TrackerError> {
        self.auth.ensure_authenticated().await?;
        let content = self.fetch_page().await?;

        let (user_id, method) = match &self.configured_user_id {
            Some(id) => (Some(id.clone()), DetectionMethod::Configured),
            None => match detect_user_id(&content) {
                Some(id) => {
                    info!("Detected ZenPlanner member id {}", id);
                    *self
                        .detected_user_id
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(id.clone());
                    (Some(id), DetectionMethod::Auto)
                }
                None => {
                    warn!("No member id found on PR page, using every entry");
                    (None, DetectionMethod::AllData)
                }
            },
        };

        let Some(result_set) = extract_result_set(&content) else {
            warn!("No PR result set found on PR page");
            return Ok((BTreeMap::new(), DetectionMethod::None));
        };

        let mut records = BTreeMap::new();
        for entry_text in extract_entries(result_set, user_id.as_deref()) {
            let Some(entry) = parse_pr_entry(&entry_text) else {
                continue;
            };
            match match_exercise_type(&entry.name, &self.exercises) {
                Some(kind) => {
                    debug!("PR {} -> {}: {}", entry.name, kind, entry.record.value);
                    records.insert(kind, entry.record);
                }
                None => debug!("Unmapped PR exercise: {}", entry.name),
            }
        }

        Ok((records, method))
    }

    pub async fn get_formatted_prs(&self) -> Result<PrSummary, TrackerError> {
        let (records, method) = self.fetch_prs().await?;
        let summary = summarize_prs(&self.exercise_kinds(), records, method);
        info!(
            "PRs loaded: {} total, {} recent",
            summary.total_prs, summary.recent_pr_count
        );
        Ok(summary)
    }
}

pub fn detect_user_id(content: &str) -> Option<String> {
    USER_ID_PATTERNS
        .iter()
        .find_map(|re| re.captures(content))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Body of the first JavaScript array that looks like the PR result set
pub fn extract_result_set(content: &str) -> Option<&str> {
    RESULT_SET_PATTERNS
        .iter()
        .find_map(|re| re.captures(content))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Object literals of the result set, limited to `user_id` when given
pub fn extract_entries(result_set: &str, user_id: Option<&str>) -> Vec<String> {
    let find_all = |re: &Regex| -> Vec<String> {
        re.find_iter(result_set).map(|m| m.as_str().to_string()).collect()
    };

    match user_id {
        Some(id) => {
            let id = regex::escape(id);
            let patterns = [
                format!(r#"(?i)\{{[^}}]*personid\s*:\s*["']?{}[^}}]+\}}"#, id),
                format!(r#"(?i)\{{[^}}]*["']personid["'][^}}]*["']?{}[^}}]+\}}"#, id),
            ];
            patterns
                .iter()
                .filter_map(|p| Regex::new(p).ok())
                .map(|re| find_all(&re))
                .find(|entries| !entries.is_empty())
                .unwrap_or_default()
        }
        None => ANY_ENTRY_PATTERNS
            .iter()
            .map(find_all)
            .find(|entries| !entries.is_empty())
            .unwrap_or_default(),
    }
}

fn first_match(patterns: &[Regex], text: &str) -> Option<String> {
    patterns
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Entries without a name or a record value are skipped
pub fn parse_pr_entry(text: &str) -> Option<RawPrEntry> {
    let name = first_match(&NAME_PATTERNS, text)?;
    let value = first_match(&VALUE_PATTERNS, text)?;

    Some(RawPrEntry {
        name,
        record: PersonalRecord {
            value,
            date: first_match(&DATE_PATTERNS, text),
            last_result: first_match(&LAST_RESULT_PATTERNS, text),
            days_since: first_match(&DAYS_SINCE_PATTERNS, text),
            attempts: first_match(&ATTEMPT_PATTERNS, text),
        },
    })
}

/// First exercise kind whose patterns occur in the exercise name
pub fn match_exercise_type(name: &str, exercises: &[ExerciseMapping]) -> Option<String> {
    let name = name.to_lowercase();
    exercises
        .iter()
        .find(|mapping| {
            mapping
                .patterns
                .iter()
                .any(|pattern| name.contains(&pattern.to_lowercase()))
        })
        .map(|mapping| mapping.kind.clone())
}

pub fn summarize_prs(
    kinds: &[String],
    mut records: BTreeMap<String, PersonalRecord>,
    method: DetectionMethod,
) -> PrSummary {
    if records.is_empty() {
        return PrSummary::empty(kinds);
    }

    let mut recent = Vec::new();
    let mut prs_by_type = BTreeMap::new();
    for kind in kinds {
        let record = records.remove(kind);
        if let Some(record) = &record {
            if record
                .days_since()
                .map_or(false, |days| (0..=RECENT_PR_DAYS).contains(&days))
            {
                recent.push(format!("{}: {} 🎯", display_kind(kind), record.value));
            }
        }
        prs_by_type.insert(kind.clone(), record);
    }

    let total_prs = prs_by_type.values().filter(|pr| pr.is_some()).count() as u32;
    let recent_pr_count = recent.len() as u32;

    PrSummary {
        prs_by_type,
        recent_prs: if recent.is_empty() {
            NO_RECENT_PRS.to_string()
        } else {
            recent.join(", ")
        },
        total_prs,
        recent_pr_count,
        user_id_detected: matches!(method, DetectionMethod::Auto | DetectionMethod::Configured),
        detection_method: method,
    }
}

/// `clean_and_jerk` -> `Clean And Jerk`
pub fn display_kind(kind: &str) -> String {
    kind.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::TrackerError;
use crate::models::Phase;

pub const STORAGE_VERSION: u32 = 1;

/// Only the most recent transitions are kept
pub const PHASE_HISTORY_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub phase: Phase,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub details: Value,
}

/// State that survives restarts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredState {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub historical_load_done: bool,
    #[serde(default)]
    pub initialization_phase: Phase,
    #[serde(default)]
    pub total_sessions: u32,
    #[serde(default)]
    pub last_update: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_setup_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub trainer_sessions: BTreeMap<String, u32>,
    /// Every day ZenPlanner reported as attended, oldest first
    #[serde(default)]
    pub attended_days: Vec<NaiveDate>,
    #[serde(default)]
    pub phase_history: Vec<PhaseTransition>,
}

fn default_version() -> u32 {
    STORAGE_VERSION
}

impl Default for StoredState {
    fn default() -> Self {
        Self {
            version: STORAGE_VERSION,
            historical_load_done: false,
            initialization_phase: Phase::Init,
            total_sessions: 0,
            last_update: None,
            last_setup_time: None,
            trainer_sessions: BTreeMap::new(),
            attended_days: Vec::new(),
            phase_history: Vec::new(),
        }
    }
}

/// JSON file store for `StoredState`; every mutation is written through
pub struct TrackerStore {
    path: PathBuf,
    state: RwLock<StoredState>,
}

impl TrackerStore {
    /// Open the store, starting fresh when the file is missing or unreadable
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => match serde_json::from_str::<StoredState>(&contents) {
                Ok(state) => {
                    info!(
                        "Loaded tracker state from {} (phase {}, {} sessions)",
                        path.display(),
                        state.initialization_phase,
                        state.total_sessions
                    );
                    state
                }
                Err(err) => {
                    warn!("Ignoring unreadable state file {}: {}", path.display(), err);
                    StoredState::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("No state file at {}, starting fresh", path.display());
                StoredState::default()
            }
            Err(err) => {
                warn!("Failed to read state file {}: {}", path.display(), err);
                StoredState::default()
            }
        };

        Self {
            path,
            state: RwLock::new(state),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn state(&self) -> StoredState {
        self.state.read().await.clone()
    }

    pub async fn phase(&self) -> Phase {
        self.state.read().await.initialization_phase
    }

    pub async fn historical_load_done(&self) -> bool {
        self.state.read().await.historical_load_done
    }

    /// Apply `f` to a copy and only keep it once the copy is on disk
    async fn mutate(&self, f: impl FnOnce(&mut StoredState)) -> Result<(), TrackerError> {
        let mut state = self.state.write().await;
        let mut updated = state.clone();
        f(&mut updated);

        let path = self.path.clone();
        let updated = tokio::task::spawn_blocking(move || {
            write_atomically(&path, &updated).map(|_| updated)
        })
        .await
        .map_err(|e| TrackerError::Storage(format!("Save task failed: {}", e)))??;

        *state = updated;
        Ok(())
    }

    pub async fn transition_phase(&self, phase: Phase, details: Value) -> Result<(), TrackerError> {
        info!("Collection phase -> {}", phase);
        self.mutate(|state| {
            state.initialization_phase = phase;
            state.phase_history.push(PhaseTransition {
                phase,
                timestamp: Utc::now(),
                details,
            });
            if state.phase_history.len() > PHASE_HISTORY_LIMIT {
                let excess = state.phase_history.len() - PHASE_HISTORY_LIMIT;
                state.phase_history.drain(..excess);
            }
        })
        .await
    }

    pub async fn mark_historical_load_complete(
        &self,
        total_sessions: u32,
        details: Value,
    ) -> Result<(), TrackerError> {
        self.mutate(|state| {
            state.historical_load_done = true;
            state.total_sessions = total_sessions;
        })
        .await?;
        self.transition_phase(Phase::Incremental, details).await
    }

    pub async fn update_session_count(&self, total_sessions: u32) -> Result<(), TrackerError> {
        self.mutate(|state| state.total_sessions = total_sessions).await
    }

    pub async fn update_trainer_sessions(
        &self,
        trainer_sessions: BTreeMap<String, u32>,
    ) -> Result<(), TrackerError> {
        self.mutate(|state| state.trainer_sessions = trainer_sessions).await
    }

    pub async fn update_attended_days(&self, mut days: Vec<NaiveDate>) -> Result<(), TrackerError> {
        days.sort_unstable();
        days.dedup();
        self.mutate(|state| state.attended_days = days).await
    }

    pub async fn record_update(&self, at: DateTime<Utc>) -> Result<(), TrackerError> {
        self.mutate(|state| state.last_update = Some(at)).await
    }

    pub async fn record_setup(&self, at: DateTime<Utc>) -> Result<(), TrackerError> {
        self.mutate(|state| state.last_setup_time = Some(at)).await
    }

    /// Forget everything, e.g. to force a new historical load
    pub async fn clear(&self) -> Result<(), TrackerError> {
        self.mutate(|state| *state = StoredState::default()).await
    }
}

/// Write through a temp file in the same directory, then rename over the target
fn write_atomically(path: &Path, state: &StoredState) -> Result<(), TrackerError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)
        .map_err(|e| TrackerError::Storage(format!("Cannot create {}: {}", dir.display(), e)))?;

    let contents = serde_json::to_vec_pretty(state)?;
    let mut file = tempfile::NamedTempFile::new_in(&dir)?;
    file.write_all(&contents)?;
    file.flush()?;
    file.persist(path)
        .map_err(|e| TrackerError::Storage(format!("Cannot save {}: {}", path.display(), e)))?;

    debug!("Saved tracker state to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_starts_fresh() {
        let dir = TempDir::new().unwrap();
        let store = TrackerStore::load(dir.path().join("state.json")).await;

        let state = store.state().await;
        assert_eq!(state, StoredState::default());
        assert_eq!(state.version, STORAGE_VERSION);
        assert!(!store.historical_load_done().await);
    }

    #[tokio::test]
    async fn test_state_survives_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let store = TrackerStore::load(&path).await;
        store.transition_phase(Phase::HistoricalLoad, json!({"trigger": "initial_setup"})).await.unwrap();
        let mut trainers = BTreeMap::new();
        trainers.insert("ash".to_string(), 4);
        store.update_trainer_sessions(trainers).await.unwrap();
        store.mark_historical_load_complete(312, json!({})).await.unwrap();

        let reloaded = TrackerStore::load(&path).await.state().await;
        assert!(reloaded.historical_load_done);
        assert_eq!(reloaded.initialization_phase, Phase::Incremental);
        assert_eq!(reloaded.total_sessions, 312);
        assert_eq!(reloaded.trainer_sessions.get("ash"), Some(&4));
        assert_eq!(reloaded.phase_history.len(), 2);
    }

    #[tokio::test]
    async fn test_phase_history_is_capped() {
        let dir = TempDir::new().unwrap();
        let store = TrackerStore::load(dir.path().join("state.json")).await;

        for _ in 0..25 {
            store.transition_phase(Phase::HistoricalLoad, Value::Null).await.unwrap();
        }
        assert_eq!(store.state().await.phase_history.len(), PHASE_HISTORY_LIMIT);
    }

    #[tokio::test]
    async fn test_clear_forces_new_history_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let store = TrackerStore::load(&path).await;
        store.mark_historical_load_complete(40, json!({})).await.unwrap();

        store.clear().await.unwrap();

        let reloaded = TrackerStore::load(&path).await;
        assert!(!reloaded.historical_load_done().await);
        assert_eq!(reloaded.phase().await, Phase::Init);
        assert_eq!(reloaded.state().await.total_sessions, 0);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_state_untouched() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();
        let store = TrackerStore::load(blocker.join("state.json")).await;

        let result = store.mark_historical_load_complete(40, json!({})).await;

        assert!(result.is_err());
        assert!(!store.historical_load_done().await);
        assert_eq!(store.state().await, StoredState::default());
    }

    #[tokio::test]
    async fn test_attended_days_are_sorted_and_unique() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let store = TrackerStore::load(&path).await;
        let day = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();

        store
            .update_attended_days(vec![day("2024-03-06"), day("2024-02-05"), day("2024-03-06")])
            .await
            .unwrap();

        let reloaded = TrackerStore::load(&path).await.state().await;
        assert_eq!(reloaded.attended_days, vec![day("2024-02-05"), day("2024-03-06")]);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = TrackerStore::load(&path).await;
        assert_eq!(store.phase().await, Phase::Init);
    }

    #[tokio::test]
    async fn test_older_files_fill_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"historical_load_done": true, "total_sessions": 10}"#).unwrap();

        let state = TrackerStore::load(&path).await.state().await;
        assert!(state.historical_load_done);
        assert_eq!(state.initialization_phase, Phase::Init);
        assert!(state.phase_history.is_empty());
    }
}

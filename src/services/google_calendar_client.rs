use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::GoogleConfig;
use crate::error::TrackerError;
use crate::models::CalendarSession;
use crate::services::google_auth_client::GoogleServiceAccountAuth;

const MAX_RESULTS: u32 = 2500;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    #[serde(default)]
    pub date_time: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventCreator {
    #[serde(default)]
    pub email: Option<String>,
}

/// The subset of a Calendar API event resource we read
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoogleEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub start: Option<EventTime>,
    #[serde(default)]
    pub creator: Option<EventCreator>,
    #[serde(default)]
    pub updated: Option<String>,
}

impl GoogleEvent {
    /// Wall-clock start in the event's own offset; all-day events start at midnight
    pub fn start_local(&self) -> Option<(NaiveDate, NaiveTime)> {
        let start = self.start.as_ref()?;
        if let Some(date_time) = start.date_time {
            let naive = date_time.naive_local();
            return Some((naive.date(), naive.time()));
        }
        start.date.map(|date| (date, NaiveTime::MIN))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsPage {
    #[serde(default)]
    items: Vec<GoogleEvent>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Searches the member's calendar for training bookings
pub struct GoogleCalendarClient {
    client: Client,
    auth: Arc<GoogleServiceAccountAuth>,
    api_base_url: String,
    calendar_id: String,
    search_terms: Vec<String>,
    history_start: NaiveDate,
    cache_ttl: Duration,
    lookahead: ChronoDuration,
    cache: Mutex<Option<(Instant, Vec<CalendarSession>)>>,
}

impl GoogleCalendarClient {
    pub fn new(
        auth: Arc<GoogleServiceAccountAuth>,
        config: &GoogleConfig,
        history_start: NaiveDate,
    ) -> Result<Self, TrackerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            auth,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            calendar_id: config.calendar_id.clone(),
            search_terms: config.search_terms.clone(),
            history_start,
            cache_ttl: Duration::from_secs(config.cache_ttl_seconds),
            lookahead: ChronoDuration::days(config.lookahead_days),
            cache: Mutex::new(None),
        })
    }

    fn events_url(&self, calendar_id: &str) -> Result<Url, TrackerError> {
        let mut url = Url::parse(&self.api_base_url)
            .map_err(|e| TrackerError::Config(format!("Invalid calendar API URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| TrackerError::Config("Calendar API URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["calendars", calendar_id, "events"]);
        Ok(url)
    }

    /// Every event of `calendar_id` starting in the range, following pagination
    pub async fn list_events(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
        query: Option<&str>,
    ) -> Result<Vec<GoogleEvent>, TrackerError> {
        let url = self.events_url(calendar_id)?;
        let token = self.auth.access_token().await?;

        let mut events = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut params = vec![
                ("timeMin", time_min.to_rfc3339_opts(SecondsFormat::Secs, true)),
                ("timeMax", time_max.to_rfc3339_opts(SecondsFormat::Secs, true)),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
                ("maxResults", MAX_RESULTS.to_string()),
            ];
            if let Some(query) = query {
                params.push(("q", query.to_string()));
            }
            if let Some(page_token) = &page_token {
                params.push(("pageToken", page_token.clone()));
            }

            let response = self
                .client
                .get(url.clone())
                .bearer_auth(&token)
                .query(&params)
                .send()
                .await
                .map_err(|e| TrackerError::CalendarFetch(format!("Events request failed: {}", e)))?;

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED {
                self.auth.invalidate().await;
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(TrackerError::CalendarFetch(format!(
                    "Calendar API returned {}: {}",
                    status, body
                )));
            }

            let page: EventsPage = response
                .json()
                .await
                .map_err(|e| TrackerError::CalendarFetch(format!("Invalid events response: {}", e)))?;

            events.extend(page.items);
            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        Ok(events)
    }

    async fn search_sessions(
        &self,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<CalendarSession>, TrackerError> {
        let mut sessions = Vec::new();
        for term in &self.search_terms {
            let events = self
                .list_events(&self.calendar_id, time_min, time_max, Some(term))
                .await?;
            debug!("Search term {:?} matched {} events", term, events.len());
            sessions.extend(events.iter().filter_map(|event| process_event(event, term)));
        }
        Ok(deduplicate_sessions(sessions))
    }

    /// All sessions from the history start up to `now`, cached for a few minutes
    pub async fn get_calendar_events(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<CalendarSession>, TrackerError> {
        if let Some(sessions) = self.cached() {
            debug!("Using cached calendar history ({} sessions)", sessions.len());
            return Ok(sessions);
        }

        let time_min = Utc.from_utc_datetime(&self.history_start.and_time(NaiveTime::MIN));
        let sessions = self.search_sessions(time_min, now).await?;
        info!("Calendar history loaded: {} sessions", sessions.len());

        *self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) =
            Some((Instant::now(), sessions.clone()));
        Ok(sessions)
    }

    /// Sessions in an explicit range; never served from the cache
    pub async fn get_events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarSession>, TrackerError> {
        self.search_sessions(start, end).await
    }

    /// Earliest upcoming session across all search terms within the lookahead window
    pub async fn get_next_session(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<CalendarSession>, TrackerError> {
        let time_max = now + self.lookahead;
        let mut candidates = Vec::new();

        for term in &self.search_terms {
            match self
                .list_events(&self.calendar_id, now, time_max, Some(term))
                .await
            {
                Ok(events) => {
                    candidates.extend(events.iter().filter_map(|event| process_event(event, term)))
                }
                Err(err) => warn!("Next session lookup for {:?} failed: {}", term, err),
            }
        }

        Ok(deduplicate_sessions(candidates).into_iter().next())
    }

    /// Raw events of another calendar, no search filter
    pub async fn get_events_for_calendar(
        &self,
        calendar_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<GoogleEvent>, TrackerError> {
        self.list_events(calendar_id, start, end, None).await
    }

    fn cached(&self) -> Option<Vec<CalendarSession>> {
        let cache = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        cache
            .as_ref()
            .filter(|(stored_at, _)| stored_at.elapsed() < self.cache_ttl)
            .map(|(_, sessions)| sessions.clone())
    }

    pub fn clear_cache(&self) {
        *self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }
}

/// Instructor named on the `Instructor:` line of the description
pub fn extract_instructor(description: &str) -> String {
    description
        .split_once("Instructor:")
        .and_then(|(_, rest)| rest.lines().next())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or("Unknown")
        .to_string()
}

pub fn process_event(event: &GoogleEvent, search_term: &str) -> Option<CalendarSession> {
    let summary = event.summary.as_ref()?;
    let (date, time) = event.start_local()?;
    let description = event.description.clone().unwrap_or_default();

    Some(CalendarSession {
        date: date.format("%Y-%m-%d").to_string(),
        time: time.format("%H:%M").to_string(),
        subject: summary.clone(),
        instructor: extract_instructor(&description),
        search_term: search_term.to_string(),
        description,
        location: event.location.clone().unwrap_or_default(),
        event_id: event.id.clone(),
    })
}

/// Sort by start and keep the first session per date/time slot
pub fn deduplicate_sessions(mut sessions: Vec<CalendarSession>) -> Vec<CalendarSession> {
    sessions.sort_by(|a, b| (&a.date, &a.time).cmp(&(&b.date, &b.time)));
    let mut seen = HashSet::new();
    sessions.retain(|session| seen.insert(session.slot_key()));
    sessions
}

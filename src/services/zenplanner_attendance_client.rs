use chrono::{Datelike, NaiveDate};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::ZenPlannerConfig;
use crate::error::TrackerError;
use crate::models::{AttendanceSummary, AttendedDay};
use crate::services::aggregation_service::monthly_count;
use crate::services::html_scrape::find_tags;
use crate::services::zenplanner_auth_client::{check_status, ZenPlannerAuth};

/// Reads the member's monthly attendance calendar from ZenPlanner
pub struct ZenPlannerAttendanceClient {
    auth: Arc<ZenPlannerAuth>,
    start_date: NaiveDate,
    request_delay: Duration,
}

impl ZenPlannerAttendanceClient {
    pub fn new(auth: Arc<ZenPlannerAuth>, config: &ZenPlannerConfig) -> Self {
        Self {
            auth,
            start_date: config.start_date,
            request_delay: Duration::from_millis(config.request_delay_ms),
        }
    }

    /// Attended days of one month plus the month the page links to next
    pub async fn fetch_month(
        &self,
        month_start: NaiveDate,
        today: NaiveDate,
    ) -> Result<(Vec<AttendedDay>, Option<NaiveDate>), TrackerError> {
        let url = format!("{}/workouts.cfm", self.auth.base_url());
        let start_param = month_start.format("%Y-%m-%d").to_string();

        debug!("Fetching attendance for {}", month_start.format("%B %Y"));
        let response = self
            .auth
            .http()
            .get(&url)
            .query(&[("startdate", start_param.as_str())])
            .send()
            .await
            .map_err(|e| TrackerError::Network(format!("Failed to load attendance page: {}", e)))?;

        check_status(response.status(), "attendance page")?;

        let html = response
            .text()
            .await
            .map_err(|e| TrackerError::Network(format!("Failed to read attendance page: {}", e)))?;

        Ok((
            parse_month_page(&html, month_start, today),
            parse_next_month(&html),
        ))
    }

    /// Walk every month from `start` up to `today`
    pub async fn fetch_all_history(
        &self,
        start: NaiveDate,
        today: NaiveDate,
    ) -> Result<Vec<AttendedDay>, TrackerError> {
        let mut history = Vec::new();
        let mut month_start = first_of_month(start);

        while month_start <= today {
            let (days, linked_next) = self.fetch_month(month_start, today).await?;
            info!(
                "Found {} sessions in {}",
                days.len(),
                month_start.format("%B %Y")
            );
            history.extend(days);

            let fallback = next_month(month_start);
            month_start = match linked_next {
                Some(next) if next > month_start => first_of_month(next),
                _ => fallback,
            };

            if month_start <= today && !self.request_delay.is_zero() {
                sleep(self.request_delay).await;
            }
        }

        Ok(history)
    }

    /// Full attendance summary from the configured start date
    pub async fn get_attendance_data(
        &self,
        today: NaiveDate,
    ) -> Result<AttendanceSummary, TrackerError> {
        self.auth.ensure_authenticated().await?;
        let history = self.fetch_all_history(self.start_date, today).await?;
        let summary = summarize(history, today);

        info!(
            "Attendance loaded: {} total, {} this month",
            summary.total_sessions, summary.monthly_sessions
        );
        Ok(summary)
    }

    /// Attended days of the month containing `today`
    pub async fn get_current_month(&self, today: NaiveDate) -> Result<Vec<AttendedDay>, TrackerError> {
        self.auth.ensure_authenticated().await?;
        let (days, _) = self.fetch_month(first_of_month(today), today).await?;
        debug!("{} sessions so far in {}", days.len(), today.format("%B %Y"));
        Ok(days)
    }
}

/// Attended days on one calendar page, restricted to `month_start`'s month and not after `today`
pub fn parse_month_page(html: &str, month_start: NaiveDate, today: NaiveDate) -> Vec<AttendedDay> {
    find_tags(html, "div")
        .into_iter()
        .filter(|tag| tag.has_class("dayBlock") && tag.has_class("attended"))
        .filter_map(|tag| {
            let date = NaiveDate::parse_from_str(tag.attr("date")?.trim(), "%Y-%m-%d").ok()?;
            if date.year() != month_start.year() || date.month() != month_start.month() || date > today {
                return None;
            }

            Some(AttendedDay::new(
                date,
                tag.has_class("hasResults"),
                tag.has_class("isPR"),
                tag.attr("tooltiptext").unwrap_or_default().trim().to_string(),
            ))
        })
        .collect()
}

/// Month the page's "next" arrow points at
pub fn parse_next_month(html: &str) -> Option<NaiveDate> {
    find_tags(html, "a")
        .into_iter()
        .filter(|tag| tag.has_class("next"))
        .find_map(|tag| {
            let href = tag.attr("href")?;
            let value = href.rsplit("startdate=").next()?;
            let value = value.split('&').next()?;
            NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
        })
}

pub fn summarize(mut history: Vec<AttendedDay>, today: NaiveDate) -> AttendanceSummary {
    history.sort_by_key(|day| day.date);
    history.dedup_by_key(|day| day.date);

    AttendanceSummary {
        total_sessions: history.len() as u32,
        monthly_sessions: monthly_count(&history, today),
        last_session: history.last().map(|day| day.date),
        sessions: history,
    }
}

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn next_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    const MARCH_PAGE: &str = r#"
        <div class="calendar">
          <div class="dayBlock" date="2024-02-28"></div>
          <div class="dayBlock attended" date="2024-02-29"></div>
          <div class="dayBlock attended hasResults" date="2024-03-04" tooltiptext="Back Squat 5x5"></div>
          <div class="dayBlock" date="2024-03-05"></div>
          <div class="dayBlock attended hasResults isPR" date="2024-03-06" tooltiptext="Deadlift 1RM"></div>
          <div class="dayBlock attended" date="2024-03-28"></div>
        </div>
        <a class="prev" href="workouts.cfm?&startdate=2024-02-01">&lt;</a>
        <a class="next" href="workouts.cfm?&startdate=2024-04-01">&gt;</a>
    "#;

    #[test]
    fn test_parse_month_page_filters_month_and_future() {
        let days = parse_month_page(MARCH_PAGE, date("2024-03-01"), date("2024-03-20"));

        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, date("2024-03-04"));
        assert!(days[0].has_results);
        assert!(!days[0].is_pr);
        assert_eq!(days[0].details, "Back Squat 5x5");
        assert_eq!(days[0].month_year, "March 2024");
        assert!(days[1].is_pr);
    }

    #[test]
    fn test_parse_next_month() {
        assert_eq!(parse_next_month(MARCH_PAGE), Some(date("2024-04-01")));
        assert_eq!(parse_next_month("<a class='prev' href='x?startdate=2024-01-01'>"), None);
    }

    #[test]
    fn test_next_month_rolls_over_year() {
        assert_eq!(next_month(date("2023-12-15")), date("2024-01-01"));
        assert_eq!(first_of_month(date("2023-12-15")), date("2023-12-01"));
    }

    #[test]
    fn test_summarize_counts_current_month() {
        let history = vec![
            AttendedDay::new(date("2024-03-06"), false, false, String::new()),
            AttendedDay::new(date("2024-02-10"), false, false, String::new()),
            AttendedDay::new(date("2024-03-01"), true, false, String::new()),
        ];
        let summary = summarize(history, date("2024-03-20"));

        assert_eq!(summary.total_sessions, 3);
        assert_eq!(summary.monthly_sessions, 2);
        assert_eq!(summary.last_session, Some(date("2024-03-06")));
        assert_eq!(summary.sessions[0].date, date("2024-02-10"));
    }

    #[test]
    fn test_summarize_empty_history() {
        let summary = summarize(Vec::new(), date("2024-03-20"));
        assert_eq!(summary.total_sessions, 0);
        assert!(summary.sessions.is_empty());
        assert_eq!(summary.last_session, None);
    }
}

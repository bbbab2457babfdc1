use chrono::{Datelike, Days, IsoWeek, NaiveDate, NaiveTime};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, warn};

use crate::models::{AttendedDay, CalendarSession, CollectionReport, TrainerStats};

/// Sources disagreeing by more than this many sessions are reconciled to the larger count
pub const MISMATCH_THRESHOLD: u32 = 5;

/// A session counts only with a parseable date and time and a named instructor
pub fn validate_event(event: &CalendarSession) -> bool {
    NaiveDate::parse_from_str(&event.date, "%Y-%m-%d").is_ok()
        && NaiveTime::parse_from_str(&event.time, "%H:%M").is_ok()
        && !event.instructor.trim().is_empty()
        && !event.instructor.trim().eq_ignore_ascii_case("unknown")
}

/// Sessions per roster trainer, counting each date/time/instructor once
pub fn trainer_stats(events: &[CalendarSession], roster: &[String]) -> TrainerStats {
    let mut sessions: BTreeMap<String, u32> =
        roster.iter().map(|name| (name.clone(), 0)).collect();
    let mut report = CollectionReport::default();
    let mut seen = HashSet::new();
    let mut unmatched = BTreeSet::new();

    for event in events {
        if !validate_event(event) {
            report.invalid_events += 1;
            continue;
        }

        let instructor = event.instructor.trim().to_lowercase();
        let session_id = format!("{}_{}_{}", event.date, event.time, instructor);
        if !seen.insert(session_id) {
            report.duplicates_skipped += 1;
            continue;
        }

        match sessions.get_mut(&instructor) {
            Some(count) => {
                *count += 1;
                report.total_processed += 1;
            }
            None => {
                if unmatched.insert(instructor.clone()) {
                    debug!("Instructor {:?} is not on the trainer roster", instructor);
                }
            }
        }
    }

    report.unmatched_trainers = unmatched.into_iter().collect();
    if !report.unmatched_trainers.is_empty() {
        warn!("Unmatched trainers: {}", report.unmatched_trainers.join(", "));
    }

    TrainerStats { sessions, report }
}

/// Valid sessions in chronological order
pub fn session_history(events: &[CalendarSession]) -> Vec<CalendarSession> {
    let mut history: Vec<CalendarSession> =
        events.iter().filter(|event| validate_event(event)).cloned().collect();
    history.sort_by(|a, b| (&a.date, &a.time).cmp(&(&b.date, &b.time)));
    history
}

/// Attendance is authoritative unless the calendar is off by more than the threshold
pub fn reconcile_sessions(attendance_total: u32, calendar_count: u32) -> u32 {
    let difference = attendance_total.abs_diff(calendar_count);
    if difference > MISMATCH_THRESHOLD {
        warn!(
            "Session count mismatch: attendance={}, calendar={}, using the larger",
            attendance_total, calendar_count
        );
        attendance_total.max(calendar_count)
    } else {
        attendance_total
    }
}

pub fn monthly_count(days: &[AttendedDay], today: NaiveDate) -> u32 {
    days.iter()
        .filter(|day| day.date.year() == today.year() && day.date.month() == today.month())
        .count() as u32
}

/// Consecutive ISO weeks with at least one session, ending this week or last week
pub fn training_streak_weeks(days: &[AttendedDay], today: NaiveDate) -> u32 {
    let weeks: HashSet<IsoWeek> = days
        .iter()
        .filter(|day| day.date <= today)
        .map(|day| day.date.iso_week())
        .collect();

    let mut cursor = today;
    if !weeks.contains(&cursor.iso_week()) {
        match cursor.checked_sub_days(Days::new(7)) {
            Some(previous) if weeks.contains(&previous.iso_week()) => cursor = previous,
            _ => return 0,
        }
    }

    let mut streak = 0;
    while weeks.contains(&cursor.iso_week()) {
        streak += 1;
        match cursor.checked_sub_days(Days::new(7)) {
            Some(previous) => cursor = previous,
            None => break,
        }
    }
    streak
}

// Upstream clients and business logic services

pub mod aggregation_service;
pub mod cost_analysis_service;
pub mod google_auth_client;
pub mod google_calendar_client;
pub mod html_scrape;
pub mod refresh_coordinator;
pub mod refresh_scheduler;
pub mod sensor_service;
pub mod sources;
pub mod workout_calendar_client;
pub mod zenplanner_attendance_client;
pub mod zenplanner_auth_client;
pub mod zenplanner_pr_client;

pub use google_auth_client::GoogleServiceAccountAuth;
pub use google_calendar_client::GoogleCalendarClient;
pub use refresh_coordinator::{CoordinatorSettings, RefreshCoordinator};
pub use refresh_scheduler::RefreshScheduler;
pub use sources::{AttendanceSource, CalendarSource, RecordSource, Sources, WorkoutSource};
pub use workout_calendar_client::WorkoutCalendarClient;
pub use zenplanner_attendance_client::ZenPlannerAttendanceClient;
pub use zenplanner_auth_client::{AuthStatus, ZenPlannerAuth};
pub use zenplanner_pr_client::ZenPlannerPrClient;

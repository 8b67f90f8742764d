//! Logging activities and querying recent ones.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{info, instrument};

use crate::core::activity::Activity;
use crate::core::scripted::ScriptedResponses;
use crate::core::summary::{RecentActivities, recent_activities};
use crate::io::clock::Clock;
use crate::io::config::TrackerConfig;
use crate::io::repository::ActivityRepository;

pub struct ActivitiesService {
    repository: ActivityRepository,
    clock: Clock,
}

impl ActivitiesService {
    pub fn new(repository: ActivityRepository, clock: Clock) -> Self {
        Self { repository, clock }
    }

    /// Service over the configured activity file and the system clock.
    pub fn create(config: &TrackerConfig) -> Self {
        Self::new(
            ActivityRepository::create(&config.activities_path),
            Clock::create(),
        )
    }

    /// Service over a nulled repository and a frozen clock.
    pub fn create_null(
        activities: Option<ScriptedResponses<Vec<Activity>>>,
        now: Option<DateTime<Utc>>,
    ) -> Self {
        Self::new(
            ActivityRepository::create_null(activities),
            Clock::create_null(now),
        )
    }

    pub fn repository(&self) -> &ActivityRepository {
        &self.repository
    }

    /// Validate a `LogActivity` request and store the activity.
    #[instrument(skip_all)]
    pub fn log_activity(&self, request: &Value) -> Result<Activity> {
        let activity = Activity::from_request(request)?;
        self.repository
            .add(&activity)
            .context("store activity")?;
        info!(task = %activity.task, duration = %activity.duration, "activity logged");
        Ok(activity)
    }

    /// Activities of the last days relative to the clock's today.
    #[instrument(skip_all)]
    pub fn recent_activities(&self) -> Result<RecentActivities> {
        let activities = self.repository.find_all().context("load activities")?;
        Ok(recent_activities(&activities, self.clock.today()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::duration::IsoDuration;
    use crate::core::scripted::{ScriptError, ScriptedFailure};
    use crate::core::validation::ValidationError;
    use crate::exit_codes::{ErrorClass, classify};
    use crate::test_support::{activity, log_request};

    #[test]
    fn log_activity_records_validated_activity() {
        let service = ActivitiesService::create_null(None, None);
        let recorded = service.repository().track_recorded();

        let logged = service
            .log_activity(&log_request("2024-06-24T14:00:00Z", "PT1H", "Review"))
            .expect("log");

        assert_eq!(logged.duration, IsoDuration::from_hours(1));
        assert_eq!(recorded.data(), vec![logged]);
    }

    #[test]
    fn invalid_request_is_a_validation_error_and_records_nothing() {
        let service = ActivitiesService::create_null(None, None);
        let recorded = service.repository().track_recorded();

        let err = service
            .log_activity(&serde_json::json!({ "task": "Review" }))
            .expect_err("invalid");

        assert_eq!(classify(&err), ErrorClass::Validation);
        assert_eq!(
            err.downcast_ref::<ValidationError>().map(ValidationError::message),
            Some("The property \"timestamp\" is required for LogActivity.")
        );
        assert!(recorded.data().is_empty());
    }

    #[test]
    fn recent_activities_use_clock_today() {
        let service = ActivitiesService::create_null(
            Some(ScriptedResponses::always(
                "find_all",
                Ok(vec![
                    activity("2024-06-24T10:00:00Z", 60, "today"),
                    activity("2024-06-23T10:00:00Z", 30, "yesterday"),
                ]),
            )),
            None,
        );

        let recent = service.recent_activities().expect("recent");

        assert_eq!(recent.working_days.len(), 2);
        assert_eq!(recent.time_summary.hours_today, IsoDuration::from_hours(1));
        assert_eq!(
            recent.time_summary.hours_yesterday,
            IsoDuration::from_minutes(30)
        );
    }

    #[test]
    fn storage_failure_is_internal() {
        let service = ActivitiesService::create_null(
            Some(ScriptedResponses::always(
                "find_all",
                Err(ScriptedFailure::new("permission denied")),
            )),
            None,
        );

        let err = service.recent_activities().expect_err("fails");

        assert_eq!(classify(&err), ErrorClass::Internal);
        assert!(err.downcast_ref::<ScriptError>().is_some());
        assert_eq!(format!("{err:#}"), "load activities: permission denied");
    }
}

//! Recent activities grouped by working day, with hour totals.

use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;

use crate::core::activity::Activity;
use crate::core::duration::IsoDuration;

/// How far back "recent" reaches, in days before today.
pub const RECENT_DAYS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkingDay {
    pub date: NaiveDate,
    /// Newest first.
    pub activities: Vec<Activity>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TimeSummary {
    pub hours_today: IsoDuration,
    pub hours_yesterday: IsoDuration,
    pub hours_this_week: IsoDuration,
    pub hours_this_month: IsoDuration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentActivities {
    /// Newest day first.
    pub working_days: Vec<WorkingDay>,
    pub time_summary: TimeSummary,
}

/// Summarize `activities` relative to `today` (UTC calendar date).
///
/// Activities older than [`RECENT_DAYS`] are dropped from the working days;
/// the month total still counts every activity of the current month.
pub fn recent_activities(activities: &[Activity], today: NaiveDate) -> RecentActivities {
    let cutoff = today.checked_sub_days(Days::new(RECENT_DAYS)).unwrap_or(NaiveDate::MIN);
    let yesterday = today.pred_opt();

    let mut time_summary = TimeSummary::default();
    for activity in activities {
        let date = activity.timestamp.date_naive();
        let duration = activity.duration;
        if date == today {
            time_summary.hours_today = time_summary.hours_today + duration;
        }
        if Some(date) == yesterday {
            time_summary.hours_yesterday = time_summary.hours_yesterday + duration;
        }
        if date.iso_week() == today.iso_week() {
            time_summary.hours_this_week = time_summary.hours_this_week + duration;
        }
        if date.year() == today.year() && date.month() == today.month() {
            time_summary.hours_this_month = time_summary.hours_this_month + duration;
        }
    }

    let mut recent: Vec<&Activity> = activities
        .iter()
        .filter(|activity| activity.timestamp.date_naive() >= cutoff)
        .collect();
    recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let mut working_days: Vec<WorkingDay> = Vec::new();
    for activity in recent {
        let date = activity.timestamp.date_naive();
        match working_days.last_mut() {
            Some(day) if day.date == date => day.activities.push(activity.clone()),
            _ => working_days.push(WorkingDay {
                date,
                activities: vec![activity.clone()],
            }),
        }
    }

    RecentActivities {
        working_days,
        time_summary,
    }
}

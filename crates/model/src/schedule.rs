use std::fmt::{Debug, Display};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Time window a course runs in. Either bound may be absent; a course with
/// neither bound is "not scheduled" and callers must treat it as such.
#[derive(Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleStatus {
    NotScheduled,
    Upcoming,
    InProgress,
    Ended,
}

impl Schedule {
    pub fn new(start_at: Option<DateTime<Utc>>, end_at: Option<DateTime<Utc>>) -> Schedule {
        Schedule { start_at, end_at }
    }

    pub fn window(start_at: DateTime<Utc>, end_at: DateTime<Utc>) -> Schedule {
        Schedule {
            start_at: Some(start_at),
            end_at: Some(end_at),
        }
    }

    pub fn not_scheduled() -> Schedule {
        Schedule::default()
    }

    pub fn is_scheduled(&self) -> bool {
        self.start_at.is_some() || self.end_at.is_some()
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.end_at.map(|end| end <= now).unwrap_or(false)
    }

    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        let after_start = self.start_at.map(|start| time >= start).unwrap_or(true);
        let before_end = self.end_at.map(|end| time < end).unwrap_or(true);
        self.is_scheduled() && after_start && before_end
    }

    pub fn status(&self, now: DateTime<Utc>) -> ScheduleStatus {
        if !self.is_scheduled() {
            ScheduleStatus::NotScheduled
        } else if self.has_ended(now) {
            ScheduleStatus::Ended
        } else if self.start_at.map(|start| now < start).unwrap_or(false) {
            ScheduleStatus::Upcoming
        } else {
            ScheduleStatus::InProgress
        }
    }

    pub fn has_conflict(&self, other: &Schedule) -> bool {
        match (self.start_at, self.end_at, other.start_at, other.end_at) {
            (Some(start), Some(end), Some(other_start), Some(other_end)) => {
                start < other_end && other_start < end
            }
            _ => false,
        }
    }
}

impl Display for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fmt = "%d.%m.%Y %H:%M";
        match (self.start_at, self.end_at) {
            (None, None) => write!(f, "not scheduled"),
            (Some(start), Some(end)) => {
                write!(f, "{} - {}", start.format(fmt), end.format(fmt))
            }
            (Some(start), None) => write!(f, "from {}", start.format(fmt)),
            (None, Some(end)) => write!(f, "until {}", end.format(fmt)),
        }
    }
}

impl Debug for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 1, h, m, 0).single().unwrap()
    }

    #[test]
    fn test_not_scheduled() {
        let schedule = Schedule::not_scheduled();
        assert!(!schedule.is_scheduled());
        assert!(!schedule.has_ended(at(12, 0)));
        assert!(!schedule.contains(at(12, 0)));
        assert_eq!(ScheduleStatus::NotScheduled, schedule.status(at(12, 0)));
        assert_eq!("not scheduled", schedule.to_string());
    }

    #[test]
    fn test_status() {
        let schedule = Schedule::window(at(12, 0), at(13, 0));
        assert_eq!(ScheduleStatus::Upcoming, schedule.status(at(11, 59)));
        assert_eq!(ScheduleStatus::InProgress, schedule.status(at(12, 0)));
        assert_eq!(ScheduleStatus::InProgress, schedule.status(at(12, 59)));
        assert_eq!(ScheduleStatus::Ended, schedule.status(at(13, 0)));
    }

    #[test]
    fn test_open_ended() {
        let schedule = Schedule::new(Some(at(12, 0)), None);
        assert!(!schedule.has_ended(at(23, 0)));
        assert!(schedule.contains(at(23, 0)));
        assert!(!schedule.contains(at(11, 0)));

        let schedule = Schedule::new(None, Some(at(12, 0)));
        assert!(schedule.has_ended(at(12, 0)));
        assert_eq!(ScheduleStatus::InProgress, schedule.status(at(11, 0)));
    }

    #[test]
    fn test_contains_bounds() {
        let schedule = Schedule::window(at(12, 0), at(13, 0));
        assert!(schedule.contains(at(12, 0)));
        assert!(schedule.contains(at(12, 30)));
        assert!(!schedule.contains(at(13, 0)));
        assert!(!schedule.contains(at(11, 59)));
    }

    #[test]
    fn test_conflict() {
        let first = Schedule::window(at(12, 0), at(13, 0));
        assert!(first.has_conflict(&Schedule::window(at(12, 30), at(13, 30))));
        assert!(first.has_conflict(&Schedule::window(at(11, 30), at(12, 30))));
        assert!(first.has_conflict(&Schedule::window(at(12, 15), at(12, 45))));
        assert!(!first.has_conflict(&Schedule::window(at(13, 0), at(14, 0))));
        assert!(!first.has_conflict(&Schedule::not_scheduled()));
    }
}

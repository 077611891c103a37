// Copyright 2025 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Milestone ("eclipse") evaluation against a calendar day in a fixed timezone.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::error::ConfigError;

/// Default thresholds on the number of aligned wallets.
pub const DEFAULT_MILESTONES: &[u64] = &[10, 25, 50, 100, 250, 500, 1_000];
/// Timezone whose calendar day decides whether a milestone is active.
pub const DEFAULT_TIMEZONE: &str = "Europe/Athens";

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Milestone flags for the current count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MilestoneState {
    /// True when the latest qualifying event happened on today's calendar day.
    pub is_active: bool,
    /// Highest threshold reached, if any.
    pub milestone: Option<u64>,
    /// Next threshold above the count.
    pub next_milestone: u64,
    /// Today as `YYYY-MM-DD` in the schedule's timezone.
    pub calendar_day_key: String,
}

/// Strictly ascending thresholds plus the timezone used for day boundaries.
#[derive(Debug, Clone, PartialEq)]
pub struct MilestoneSchedule {
    thresholds: Vec<u64>,
    timezone: Tz,
}

impl MilestoneSchedule {
    pub fn new(thresholds: Vec<u64>, timezone: Tz) -> Result<Self, ConfigError> {
        if thresholds.is_empty() {
            return Err(ConfigError::Missing("milestones"));
        }
        if thresholds[0] == 0 || thresholds.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(ConfigError::Invalid {
                name: "milestones",
                reason: format!("thresholds must be positive and strictly ascending: {thresholds:?}"),
            });
        }
        Ok(Self { thresholds, timezone })
    }

    /// Parse an IANA timezone name alongside the thresholds.
    pub fn with_timezone_name(thresholds: Vec<u64>, timezone: &str) -> Result<Self, ConfigError> {
        let timezone: Tz = timezone.parse().map_err(|_| ConfigError::Invalid {
            name: "milestone timezone",
            reason: format!("unknown timezone {timezone}"),
        })?;
        Self::new(thresholds, timezone)
    }

    pub fn thresholds(&self) -> &[u64] {
        &self.thresholds
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Highest threshold `<= count`.
    pub fn reached(&self, count: u64) -> Option<u64> {
        self.thresholds.iter().rev().find(|threshold| **threshold <= count).copied()
    }

    /// Lowest threshold `> count`; past the schedule, the next multiple of the last threshold.
    pub fn next(&self, count: u64) -> u64 {
        if let Some(next) = self.thresholds.iter().find(|threshold| **threshold > count) {
            return *next;
        }
        let last = self.thresholds[self.thresholds.len() - 1];
        (count / last + 1).saturating_mul(last)
    }

    pub fn day_key(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.timezone).format("%Y-%m-%d").to_string()
    }

    /// Evaluate the schedule. Active needs a reached threshold and a latest event dated today.
    pub fn evaluate(
        &self,
        count: u64,
        latest_event_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> MilestoneState {
        let calendar_day_key = self.day_key(now);
        let milestone = self.reached(count);
        let is_active = milestone.is_some()
            && latest_event_at.is_some_and(|at| self.day_key(at) == calendar_day_key);
        MilestoneState {
            is_active,
            milestone,
            next_milestone: self.next(count),
            calendar_day_key,
        }
    }
}

impl Default for MilestoneSchedule {
    fn default() -> Self {
        Self { thresholds: DEFAULT_MILESTONES.to_vec(), timezone: chrono_tz::Europe::Athens }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn thresholds_are_validated() {
        assert!(MilestoneSchedule::new(vec![], chrono_tz::UTC).is_err());
        assert!(MilestoneSchedule::new(vec![10, 10], chrono_tz::UTC).is_err());
        assert!(MilestoneSchedule::new(vec![0, 10], chrono_tz::UTC).is_err());
        assert!(MilestoneSchedule::with_timezone_name(vec![10], "Mars/Olympus").is_err());
        assert!(MilestoneSchedule::with_timezone_name(vec![10], DEFAULT_TIMEZONE).is_ok());
    }

    #[test]
    fn reached_and_next() {
        let schedule = MilestoneSchedule::new(vec![10, 25, 50], chrono_tz::UTC).unwrap();
        assert_eq!(schedule.reached(9), None);
        assert_eq!(schedule.next(9), 10);
        assert_eq!(schedule.reached(10), Some(10));
        assert_eq!(schedule.next(10), 25);
        assert_eq!(schedule.reached(49), Some(25));
        assert_eq!(schedule.next(50), 100);
        assert_eq!(schedule.next(130), 150);
    }

    #[test]
    fn day_rollover_in_schedule_timezone() {
        let schedule = MilestoneSchedule::default();
        // 23:30 in Athens (UTC+2 in winter).
        let event = at(2026, 1, 29, 21, 30);

        let same_day = schedule.evaluate(12, Some(event), at(2026, 1, 29, 21, 50));
        assert!(same_day.is_active);
        assert_eq!(same_day.milestone, Some(10));
        assert_eq!(same_day.next_milestone, 25);
        assert_eq!(same_day.calendar_day_key, "2026-01-29");

        // 00:10 the next day in Athens, still Jan 29 in UTC.
        let next_day = schedule.evaluate(12, Some(event), at(2026, 1, 29, 22, 10));
        assert!(!next_day.is_active);
        assert_eq!(next_day.calendar_day_key, "2026-01-30");
    }

    #[test]
    fn event_today_below_first_threshold_is_inactive() {
        let schedule = MilestoneSchedule::new(vec![10, 25], chrono_tz::UTC).unwrap();
        let now = at(2026, 3, 4, 12, 0);

        let state = schedule.evaluate(3, Some(now), now);
        assert!(!state.is_active);
        assert_eq!(state.milestone, None);
        assert_eq!(state.next_milestone, 10);

        assert!(schedule.evaluate(10, Some(now), now).is_active);
    }

    #[test]
    fn no_event_is_inactive() {
        let state = MilestoneSchedule::default().evaluate(0, None, at(2026, 6, 1, 12, 0));
        assert!(!state.is_active);
        assert_eq!(state.milestone, None);
        assert_eq!(state.next_milestone, 10);
    }

    #[test]
    fn fixed_clock_is_stable() {
        let clock = FixedClock(at(2026, 3, 1, 8, 0));
        assert_eq!(clock.now(), clock.now());
    }
}

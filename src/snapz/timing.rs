//! # Timing Policy
//!
//! Decides which snapshot periods are due at a given instant. All schedule
//! fields are wall-clock values; timestamps are compared in the wall-clock
//! frame of `now` (the last snapshot timestamp is converted to `now`'s offset
//! first).
//!
//! | Period   | Due when |
//! |----------|----------|
//! | frequent | `now` is in a different period-of-hour slot than the last snapshot |
//! | hourly   | `now.minute >= hourly_minute` and the last snapshot is from another hour |
//! | daily    | today's `daily_time` has passed and the last snapshot predates it |
//! | weekly   | this ISO week's `weekly_day` at `weekly_time` has passed, last predates it |
//! | monthly  | this month's `monthly_day` at `monthly_time` has passed, last predates it |
//! | yearly   | this year's `yearly_month`/`yearly_day` at `yearly_time` has passed, last predates it |
//!
//! Days past the end of a month are clamped to its last day, so
//! `monthly_day = 31` fires on the 30th in April and on the 28th/29th in
//! February.
//!
//! Every period is evaluated on its own. Several may be due at once and each
//! yields its own snapshot.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike,
    Weekday,
};
use confique::Config;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SnapzError};
use crate::model::SnapshotPeriod;

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TimingPolicy {
    /// Length of a frequent period in minutes; must divide 60.
    #[config(default = 15)]
    pub frequent_period_minutes: u32,

    /// Minute of the hour at which hourly snapshots are taken.
    #[config(default = 0)]
    pub hourly_minute: u32,

    #[config(default = "00:00:00")]
    pub daily_time: NaiveTime,

    #[config(default = "Mon")]
    pub weekly_day: Weekday,

    #[config(default = "00:00:00")]
    pub weekly_time: NaiveTime,

    /// 1-31; clamped to the month's last day.
    #[config(default = 1)]
    pub monthly_day: u32,

    #[config(default = "00:00:00")]
    pub monthly_time: NaiveTime,

    #[config(default = 1)]
    pub yearly_month: u32,

    /// 1-31; clamped to the last day of `yearly_month`.
    #[config(default = 1)]
    pub yearly_day: u32,

    #[config(default = "00:00:00")]
    pub yearly_time: NaiveTime,
}

impl Default for TimingPolicy {
    fn default() -> Self {
        Self {
            frequent_period_minutes: 15,
            hourly_minute: 0,
            daily_time: NaiveTime::MIN,
            weekly_day: Weekday::Mon,
            weekly_time: NaiveTime::MIN,
            monthly_day: 1,
            monthly_time: NaiveTime::MIN,
            yearly_month: 1,
            yearly_day: 1,
            yearly_time: NaiveTime::MIN,
        }
    }
}

impl TimingPolicy {
    pub fn validate(&self) -> Result<()> {
        let minutes = self.frequent_period_minutes;
        if minutes == 0 || minutes > 60 || 60 % minutes != 0 {
            return Err(SnapzError::Config(format!(
                "frequent_period_minutes must divide 60, got {}",
                minutes
            )));
        }
        if self.hourly_minute > 59 {
            return Err(SnapzError::Config(format!(
                "hourly_minute must be 0-59, got {}",
                self.hourly_minute
            )));
        }
        if !(1..=31).contains(&self.monthly_day) {
            return Err(SnapzError::Config(format!(
                "monthly_day must be 1-31, got {}",
                self.monthly_day
            )));
        }
        if !(1..=12).contains(&self.yearly_month) {
            return Err(SnapzError::Config(format!(
                "yearly_month must be 1-12, got {}",
                self.yearly_month
            )));
        }
        if !(1..=31).contains(&self.yearly_day) {
            return Err(SnapzError::Config(format!(
                "yearly_day must be 1-31, got {}",
                self.yearly_day
            )));
        }
        Ok(())
    }

    /// Zero-based frequent slot within the hour: `minute / frequent_period_minutes`.
    pub fn period_of_hour<T: Timelike>(&self, ts: &T) -> u32 {
        ts.minute() / self.frequent_period_minutes.max(1)
    }

    pub fn is_period_due(
        &self,
        period: SnapshotPeriod,
        now: DateTime<FixedOffset>,
        last: Option<DateTime<FixedOffset>>,
    ) -> bool {
        let now_local = now.naive_local();
        let last_local = last.map(|ts| ts.with_timezone(now.offset()).naive_local());

        match period {
            SnapshotPeriod::Frequent => match last_local {
                None => true,
                Some(last) => self.frequent_slot(&last) != self.frequent_slot(&now_local),
            },
            SnapshotPeriod::Hourly => {
                now_local.minute() >= self.hourly_minute
                    && last_local.map_or(true, |last| hour_slot(&last) != hour_slot(&now_local))
            }
            SnapshotPeriod::NotSet => false,
            calendar => match self.boundary(calendar, &now_local) {
                Some(boundary) => {
                    now_local >= boundary && last_local.map_or(true, |last| last < boundary)
                }
                None => false,
            },
        }
    }

    /// All periods due at `now`, finest first. `last_of` yields the timestamp
    /// of the previous snapshot of a period, if any.
    pub fn due_periods<F>(&self, now: DateTime<FixedOffset>, last_of: F) -> Vec<SnapshotPeriod>
    where
        F: Fn(SnapshotPeriod) -> Option<DateTime<FixedOffset>>,
    {
        SnapshotPeriod::ALL
            .into_iter()
            .filter(|period| self.is_period_due(*period, now, last_of(*period)))
            .collect()
    }

    /// The scheduled instant of `period` within the calendar unit (day, ISO
    /// week, month, year) that contains `now`.
    pub fn boundary(&self, period: SnapshotPeriod, now: &NaiveDateTime) -> Option<NaiveDateTime> {
        let today = now.date();
        match period {
            SnapshotPeriod::Daily => Some(today.and_time(self.daily_time)),
            SnapshotPeriod::Weekly => {
                let monday = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
                let day = monday + Duration::days(i64::from(self.weekly_day.num_days_from_monday()));
                Some(day.and_time(self.weekly_time))
            }
            SnapshotPeriod::Monthly => {
                let day = clamped_date(today.year(), today.month(), self.monthly_day)?;
                Some(day.and_time(self.monthly_time))
            }
            SnapshotPeriod::Yearly => {
                let day = clamped_date(today.year(), self.yearly_month, self.yearly_day)?;
                Some(day.and_time(self.yearly_time))
            }
            SnapshotPeriod::Frequent | SnapshotPeriod::Hourly | SnapshotPeriod::NotSet => None,
        }
    }

    fn frequent_slot(&self, ts: &NaiveDateTime) -> (NaiveDate, u32, u32) {
        (ts.date(), ts.hour(), self.period_of_hour(ts))
    }
}

fn hour_slot(ts: &NaiveDateTime) -> (NaiveDate, u32) {
    (ts.date(), ts.hour())
}

fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    u32::try_from((next - first).num_days()).ok()
}

fn clamped_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let last = days_in_month(year, month)?;
    NaiveDate::from_ymd_opt(year, month, day.clamp(1, last))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn default_policy_is_valid() {
        TimingPolicy::default().validate().unwrap();
    }

    #[test]
    fn validation_rejects_bad_values() {
        let bad = [
            TimingPolicy { frequent_period_minutes: 7, ..Default::default() },
            TimingPolicy { frequent_period_minutes: 0, ..Default::default() },
            TimingPolicy { hourly_minute: 60, ..Default::default() },
            TimingPolicy { monthly_day: 0, ..Default::default() },
            TimingPolicy { yearly_month: 13, ..Default::default() },
            TimingPolicy { yearly_day: 32, ..Default::default() },
        ];
        for policy in bad {
            assert!(matches!(policy.validate(), Err(SnapzError::Config(_))), "{:?}", policy);
        }
    }

    #[test]
    fn frequent_due_when_bucket_changes() {
        let policy = TimingPolicy { frequent_period_minutes: 15, ..Default::default() };
        let last = at("2024-03-01T10:20:00+00:00");
        let now = at("2024-03-01T10:31:00+00:00");
        assert_eq!(policy.period_of_hour(&last.naive_local()), 1);
        assert_eq!(policy.period_of_hour(&now.naive_local()), 2);
        assert!(policy.is_period_due(SnapshotPeriod::Frequent, now, Some(last)));
    }

    #[test]
    fn frequent_not_due_within_same_bucket() {
        let policy = TimingPolicy::default();
        let last = at("2024-03-01T10:16:00+00:00");
        let now = at("2024-03-01T10:29:59+00:00");
        assert!(!policy.is_period_due(SnapshotPeriod::Frequent, now, Some(last)));
    }

    #[test]
    fn frequent_same_bucket_in_another_hour_is_due() {
        let policy = TimingPolicy::default();
        let last = at("2024-03-01T09:16:00+00:00");
        let now = at("2024-03-01T10:16:00+00:00");
        assert!(policy.is_period_due(SnapshotPeriod::Frequent, now, Some(last)));
    }

    #[test]
    fn no_prior_snapshot_makes_frequent_due() {
        let policy = TimingPolicy::default();
        assert!(policy.is_period_due(SnapshotPeriod::Frequent, at("2024-03-01T10:01:00Z"), None));
    }

    #[test]
    fn hourly_waits_for_configured_minute() {
        let policy = TimingPolicy { hourly_minute: 30, ..Default::default() };
        let last = at("2024-03-01T09:30:00Z");
        assert!(!policy.is_period_due(SnapshotPeriod::Hourly, at("2024-03-01T10:29:00Z"), Some(last)));
        assert!(policy.is_period_due(SnapshotPeriod::Hourly, at("2024-03-01T10:30:00Z"), Some(last)));
        assert!(!policy.is_period_due(
            SnapshotPeriod::Hourly,
            at("2024-03-01T10:45:00Z"),
            Some(at("2024-03-01T10:30:00Z"))
        ));
    }

    #[test]
    fn hourly_compares_date_too() {
        let policy = TimingPolicy::default();
        let last = at("2024-02-29T10:05:00Z");
        assert!(policy.is_period_due(SnapshotPeriod::Hourly, at("2024-03-01T10:05:00Z"), Some(last)));
    }

    #[test]
    fn daily_fires_once_after_time_of_day() {
        let policy = TimingPolicy { daily_time: time(2, 0), ..Default::default() };
        let yesterday = at("2024-03-01T02:00:00Z");
        assert!(!policy.is_period_due(SnapshotPeriod::Daily, at("2024-03-02T01:59:00Z"), Some(yesterday)));
        assert!(policy.is_period_due(SnapshotPeriod::Daily, at("2024-03-02T02:00:00Z"), Some(yesterday)));
        assert!(!policy.is_period_due(
            SnapshotPeriod::Daily,
            at("2024-03-02T09:00:00Z"),
            Some(at("2024-03-02T02:00:01Z"))
        ));
    }

    #[test]
    fn daily_compares_in_now_offset() {
        let policy = TimingPolicy::default();
        // 23:30 UTC on the 1st is 00:30 on the 2nd at +01:00.
        let last = at("2024-03-01T23:30:00+00:00");
        let now = at("2024-03-02T08:00:00+01:00");
        assert!(!policy.is_period_due(SnapshotPeriod::Daily, now, Some(last)));
    }

    #[test]
    fn weekly_uses_current_iso_week() {
        let policy = TimingPolicy {
            weekly_day: Weekday::Wed,
            weekly_time: time(3, 0),
            ..Default::default()
        };
        let last_week = at("2024-02-28T03:00:00Z"); // Wednesday
        // Tuesday of the following week: boundary not reached yet.
        assert!(!policy.is_period_due(SnapshotPeriod::Weekly, at("2024-03-05T12:00:00Z"), Some(last_week)));
        // Wednesday after 03:00.
        assert!(policy.is_period_due(SnapshotPeriod::Weekly, at("2024-03-06T03:00:00Z"), Some(last_week)));
        // Friday, boundary passed and still no snapshot this week.
        assert!(policy.is_period_due(SnapshotPeriod::Weekly, at("2024-03-08T00:00:00Z"), Some(last_week)));
    }

    #[test]
    fn monthly_clamps_to_short_months() {
        let policy = TimingPolicy { monthly_day: 31, ..Default::default() };
        let last = at("2024-01-31T00:00:00Z");
        assert!(!policy.is_period_due(SnapshotPeriod::Monthly, at("2024-02-28T23:59:00Z"), Some(last)));
        assert!(policy.is_period_due(SnapshotPeriod::Monthly, at("2024-02-29T00:00:00Z"), Some(last)));
        assert_eq!(
            policy.boundary(SnapshotPeriod::Monthly, &at("2024-04-10T00:00:00Z").naive_local()),
            Some(NaiveDate::from_ymd_opt(2024, 4, 30).unwrap().and_time(NaiveTime::MIN))
        );
    }

    #[test]
    fn yearly_clamps_leap_day() {
        let policy = TimingPolicy {
            yearly_month: 2,
            yearly_day: 29,
            yearly_time: time(12, 0),
            ..Default::default()
        };
        assert_eq!(
            policy.boundary(SnapshotPeriod::Yearly, &at("2023-06-01T00:00:00Z").naive_local()),
            Some(NaiveDate::from_ymd_opt(2023, 2, 28).unwrap().and_time(time(12, 0)))
        );
        let last = at("2022-02-28T12:00:00Z");
        assert!(policy.is_period_due(SnapshotPeriod::Yearly, at("2023-02-28T12:00:00Z"), Some(last)));
        assert!(!policy.is_period_due(SnapshotPeriod::Yearly, at("2023-02-28T11:00:00Z"), Some(last)));
    }

    #[test]
    fn several_periods_can_be_due_together() {
        let policy = TimingPolicy::default();
        // Monday 2024-01-01 00:00 is the start of a day, ISO week, month and year.
        let now = at("2024-01-01T00:00:00Z");
        let last = at("2023-12-31T23:45:00Z");
        let due = policy.due_periods(now, |_| Some(last));
        assert_eq!(due, SnapshotPeriod::ALL.to_vec());
    }

    #[test]
    fn not_set_is_never_due() {
        let policy = TimingPolicy::default();
        assert!(!policy.is_period_due(SnapshotPeriod::NotSet, at("2024-01-01T00:00:00Z"), None));
    }
}

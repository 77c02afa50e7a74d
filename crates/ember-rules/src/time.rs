//! Calendar windows and point-in-time events with repetition rules.
//!
//! Everything here operates in the server's configured `chrono_tz::Tz` —
//! callers pass a zone-aware `DateTime<Tz>`; nothing in this module reads
//! the system clock itself (see `ember-rules::engine` for the tick driver).

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Weekday};
use ember_types::EmberError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    None,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

/// Weekday numbered 1 (Monday) through 7 (Sunday), per spec.md.
pub type WeekDayNum = u8;
/// Day of month, 1 through 31.
pub type MonthDayNum = u8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatingOption {
    pub mode: RepeatMode,
    #[serde(default)]
    pub week_days: Vec<WeekDayNum>,
    #[serde(default)]
    pub month_days: Vec<MonthDayNum>,
}

impl RepeatingOption {
    pub fn none() -> Self {
        Self { mode: RepeatMode::None, week_days: Vec::new(), month_days: Vec::new() }
    }

    /// Weekly requires non-empty weekDays; monthly requires non-empty
    /// monthDays; every other mode requires both empty.
    pub fn validate(&self) -> Result<(), EmberError> {
        let days_ok = match self.mode {
            RepeatMode::Weekly => !self.week_days.is_empty() && self.month_days.is_empty(),
            RepeatMode::Monthly => !self.month_days.is_empty() && self.week_days.is_empty(),
            _ => self.week_days.is_empty() && self.month_days.is_empty(),
        };
        if !days_ok {
            return Err(EmberError::InvalidRepeatingOption(format!(
                "weekDays/monthDays inconsistent with mode {:?}",
                self.mode
            )));
        }
        if self.week_days.iter().any(|d| !(1..=7).contains(d)) {
            return Err(EmberError::InvalidRepeatingOption("weekDay out of range 1..7".into()));
        }
        if self.month_days.iter().any(|d| !(1..=31).contains(d)) {
            return Err(EmberError::InvalidRepeatingOption("monthDay out of range 1..31".into()));
        }
        Ok(())
    }

    fn matches_date(&self, date: NaiveDate, base_date: Option<NaiveDate>) -> bool {
        if let Some(base) = base_date {
            if date < base {
                return false;
            }
        }
        match self.mode {
            RepeatMode::None => base_date == Some(date),
            RepeatMode::Hourly | RepeatMode::Daily => true,
            RepeatMode::Weekly => self.week_days.contains(&weekday_num(date.weekday())),
            RepeatMode::Monthly => self.month_days.contains(&(date.day() as u8)),
            RepeatMode::Yearly => {
                let base = base_date.expect("yearly items are anchored to an absolute date");
                date.month() == base.month() && date.day() == base.day()
            }
        }
    }
}

fn weekday_num(w: Weekday) -> u8 {
    // chrono's Weekday::Mon == 0; spec.md numbers Monday as 1.
    w.num_days_from_monday() as u8 + 1
}

/// The anchor a [`CalendarItem`] or [`TimeEventItem`] starts from: either a
/// fixed instant, or a bare local time-of-day repeated on a schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TimeAnchor {
    DateTime(DateTime<chrono::Utc>),
    StartTime(NaiveTime),
}

impl TimeAnchor {
    fn base_date(&self) -> Option<NaiveDate> {
        match self {
            TimeAnchor::DateTime(dt) => Some(dt.date_naive()),
            TimeAnchor::StartTime(_) => None,
        }
    }

    fn time_of_day(&self) -> NaiveTime {
        match self {
            TimeAnchor::DateTime(dt) => dt.time(),
            TimeAnchor::StartTime(t) => *t,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarItem {
    pub anchor: TimeAnchor,
    /// Window length in minutes, >= 1.
    pub duration_minutes: u32,
    pub repeating: RepeatingOption,
}

impl CalendarItem {
    pub fn validate(&self) -> Result<(), EmberError> {
        if self.duration_minutes < 1 {
            return Err(EmberError::InvalidCalendarItem("duration must be >= 1 minute".into()));
        }
        if matches!(self.anchor, TimeAnchor::StartTime(_))
            && matches!(self.repeating.mode, RepeatMode::None | RepeatMode::Hourly | RepeatMode::Yearly)
        {
            return Err(EmberError::InvalidCalendarItem(
                "a bare time-of-day item needs a day-level repetition (daily/weekly/monthly)".into(),
            ));
        }
        self.repeating.validate().map_err(|e| EmberError::InvalidCalendarItem(e.to_string()))
    }

    /// True iff `now` lies in any instance of this item's window.
    pub fn contains<Tz: TimeZone>(&self, now: DateTime<Tz>) -> bool {
        let duration = Duration::minutes(self.duration_minutes as i64);

        if self.repeating.mode == RepeatMode::Hourly {
            let TimeAnchor::DateTime(start) = &self.anchor else {
                return false;
            };
            let start = start.with_timezone(&now.timezone());
            if now < start {
                return false;
            }
            let elapsed = now.clone().signed_duration_since(start.clone());
            let period = Duration::hours(1);
            let rem = elapsed.num_seconds().rem_euclid(period.num_seconds());
            return rem < duration.num_seconds();
        }

        let today = now.date_naive();
        for candidate_date in [today - Duration::days(1), today] {
            if !self.repeating.matches_date(candidate_date, self.anchor.base_date()) {
                continue;
            }
            let Some(naive_start) = candidate_date.and_time(self.anchor.time_of_day()).and_local_timezone(now.timezone()).single()
            else {
                continue;
            };
            if now >= naive_start && now < naive_start + duration {
                return true;
            }
        }
        false
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeEventItem {
    pub anchor: TimeAnchor,
    pub repeating: RepeatingOption,
}

impl TimeEventItem {
    pub fn validate(&self) -> Result<(), EmberError> {
        if matches!(self.anchor, TimeAnchor::StartTime(_))
            && matches!(self.repeating.mode, RepeatMode::None | RepeatMode::Hourly | RepeatMode::Yearly)
        {
            return Err(EmberError::InvalidTimeEventItem(
                "a bare time-of-day item needs a day-level repetition (daily/weekly/monthly)".into(),
            ));
        }
        self.repeating.validate().map_err(|e| EmberError::InvalidTimeEventItem(e.to_string()))
    }

    /// True iff this item has an instance strictly after `from` and at or
    /// before `to`. `from` and `to` must be in the same zone.
    pub fn fired_between<Tz: TimeZone>(&self, from: DateTime<Tz>, to: DateTime<Tz>) -> bool {
        if self.repeating.mode == RepeatMode::Hourly {
            let TimeAnchor::DateTime(start) = &self.anchor else {
                return false;
            };
            let start = start.with_timezone(&to.timezone());
            if to < start {
                return false;
            }
            let period = Duration::hours(1);
            let k_max = (to.clone().signed_duration_since(start.clone()).num_seconds() / period.num_seconds()).max(0);
            let occurrence = start + period * (k_max as i32);
            return occurrence > from && occurrence <= to;
        }

        let mut date = from.date_naive();
        let end_date = to.date_naive();
        loop {
            if self.repeating.matches_date(date, self.anchor.base_date()) {
                if let Some(instant) = date.and_time(self.anchor.time_of_day()).and_local_timezone(to.timezone()).single() {
                    if instant > from && instant <= to {
                        return true;
                    }
                }
            }
            if date >= end_date {
                break;
            }
            date += Duration::days(1);
        }
        false
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeDescriptor {
    #[serde(default)]
    pub calendar_items: Vec<CalendarItem>,
    #[serde(default)]
    pub time_event_items: Vec<TimeEventItem>,
}

impl TimeDescriptor {
    pub fn is_empty(&self) -> bool {
        self.calendar_items.is_empty() && self.time_event_items.is_empty()
    }

    pub fn validate(&self) -> Result<(), EmberError> {
        for item in &self.calendar_items {
            item.validate()?;
        }
        for item in &self.time_event_items {
            item.validate()?;
        }
        Ok(())
    }

    /// A rule is time-active iff this descriptor is empty, or any calendar
    /// item currently contains the clock. `timeEventItems` alone never make
    /// a rule "active" — they're one-shot triggers, handled separately by
    /// `RuleEngine::evaluate_time`.
    pub fn is_time_active<Tz: TimeZone>(&self, now: DateTime<Tz>) -> bool {
        if self.calendar_items.is_empty() {
            return true;
        }
        self.calendar_items.iter().any(|c| c.contains(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn dt(y: i32, m: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, mi, 0).unwrap()
    }

    #[test]
    fn one_shot_calendar_item_contains_only_its_window() {
        let item = CalendarItem {
            anchor: TimeAnchor::DateTime(dt(2026, 1, 1, 10, 0)),
            duration_minutes: 30,
            repeating: RepeatingOption::none(),
        };
        assert!(item.contains(dt(2026, 1, 1, 10, 15)));
        assert!(!item.contains(dt(2026, 1, 1, 10, 31)));
        assert!(!item.contains(dt(2026, 1, 2, 10, 15)));
    }

    #[test]
    fn daily_calendar_item_recurs() {
        let item = CalendarItem {
            anchor: TimeAnchor::DateTime(dt(2026, 1, 1, 22, 0)),
            duration_minutes: 60,
            repeating: RepeatingOption { mode: RepeatMode::Daily, week_days: vec![], month_days: vec![] },
        };
        assert!(item.contains(dt(2026, 1, 5, 22, 30)));
        assert!(!item.contains(dt(2025, 12, 31, 22, 30)));
    }

    #[test]
    fn weekly_calendar_item_only_matches_declared_weekdays() {
        // 2026-01-05 is a Monday.
        let item = CalendarItem {
            anchor: TimeAnchor::DateTime(dt(2026, 1, 5, 8, 0)),
            duration_minutes: 30,
            repeating: RepeatingOption { mode: RepeatMode::Weekly, week_days: vec![1, 3], month_days: vec![] },
        };
        assert!(item.contains(dt(2026, 1, 5, 8, 10))); // Monday
        assert!(!item.contains(dt(2026, 1, 6, 8, 10))); // Tuesday
        assert!(item.contains(dt(2026, 1, 7, 8, 10))); // Wednesday
    }

    #[test]
    fn weekly_requires_nonempty_weekdays() {
        let opt = RepeatingOption { mode: RepeatMode::Weekly, week_days: vec![], month_days: vec![] };
        assert!(opt.validate().is_err());
    }

    #[test]
    fn bare_time_of_day_with_none_mode_is_invalid() {
        let item = CalendarItem {
            anchor: TimeAnchor::StartTime(NaiveTime::from_hms_opt(22, 0, 0).unwrap()),
            duration_minutes: 30,
            repeating: RepeatingOption::none(),
        };
        assert!(item.validate().is_err());
    }

    #[test]
    fn time_descriptor_with_no_items_is_always_time_active() {
        let td = TimeDescriptor::default();
        assert!(td.is_time_active(dt(2026, 1, 1, 0, 0)));
    }

    #[test]
    fn time_event_item_fires_once_in_window() {
        let item = TimeEventItem {
            anchor: TimeAnchor::DateTime(dt(2026, 1, 1, 10, 0)),
            repeating: RepeatingOption::none(),
        };
        assert!(item.fired_between(dt(2026, 1, 1, 9, 59), dt(2026, 1, 1, 10, 0)));
        assert!(!item.fired_between(dt(2026, 1, 1, 10, 0), dt(2026, 1, 1, 10, 1)));
        assert!(!item.fired_between(dt(2026, 1, 1, 9, 0), dt(2026, 1, 1, 9, 59)));
    }

    #[test]
    fn time_event_item_daily_fires_every_day() {
        let item = TimeEventItem {
            anchor: TimeAnchor::DateTime(dt(2026, 1, 1, 6, 0)),
            repeating: RepeatingOption { mode: RepeatMode::Daily, week_days: vec![], month_days: vec![] },
        };
        assert!(item.fired_between(dt(2026, 1, 5, 5, 59), dt(2026, 1, 5, 6, 0)));
    }
}

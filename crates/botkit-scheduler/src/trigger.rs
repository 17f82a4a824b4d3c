//! Triggers: when a scheduled task becomes due.

use botkit_core::config::TaskConfig;
use botkit_core::error::{BotError, Result};
use chrono::{DateTime, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

/// Longest accepted recurring period: 100 years.
pub const MAX_PERIOD_DAYS: i64 = 36_500;

fn max_period() -> TimeDelta {
    TimeDelta::days(MAX_PERIOD_DAYS)
}

/// How/when a task triggers.
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    /// Once, at a specific instant.
    Absolute(DateTime<Utc>),
    /// Every `period`, measured from the previous fire.
    Recurring(TimeDelta),
    /// Every day at a local time of day.
    DailyAt { time: NaiveTime, tz: Tz },
}

impl Trigger {
    /// Fire once at `instant`, given in any timezone.
    pub fn at<Z: TimeZone>(instant: DateTime<Z>) -> Self {
        Self::Absolute(instant.with_timezone(&Utc))
    }

    /// Fire every `period`, capped at [`MAX_PERIOD_DAYS`].
    pub fn every(period: std::time::Duration) -> Self {
        let period = TimeDelta::from_std(period).unwrap_or(TimeDelta::MAX);
        Self::Recurring(period.min(max_period()))
    }

    /// Fire every day at `time` in `tz`.
    pub fn daily(time: NaiveTime, tz: Tz) -> Self {
        Self::DailyAt { time, tz }
    }

    /// The instant this trigger is due at, as seen at `now`.
    ///
    /// `None` for a daily time that does not exist today in its timezone
    /// (skipped by a DST change), or a recurring due instant past the end
    /// of representable time.
    pub fn due(
        &self,
        now: DateTime<Utc>,
        last_fired: Option<DateTime<Utc>>,
    ) -> Option<DateTime<Utc>> {
        match self {
            Trigger::Absolute(instant) => Some(*instant),
            Trigger::Recurring(period) => match last_fired {
                Some(last) => last.checked_add_signed(*period),
                None => Some(now),
            },
            Trigger::DailyAt { time, tz } => {
                let today = now.with_timezone(tz).date_naive();
                tz.from_local_datetime(&today.and_time(*time))
                    .earliest()
                    .map(|local| local.with_timezone(&Utc))
            }
        }
    }

    /// Should the task fire on a tick observed at `now`?
    ///
    /// Due, not already fired for this due instant, and no later than
    /// `catch_up` past it.
    pub fn should_fire(
        &self,
        now: DateTime<Utc>,
        last_fired: Option<DateTime<Utc>>,
        catch_up: TimeDelta,
    ) -> bool {
        let Some(due) = self.due(now, last_fired) else {
            return false;
        };
        due <= now && last_fired.is_none_or(|last| last < due) && now - due <= catch_up
    }

    /// Build a trigger from a declarative task. Exactly one of `at`,
    /// `every`, `daily` must be given.
    pub fn from_config(task: &TaskConfig) -> Result<Self> {
        let given = [task.at.is_some(), task.every.is_some(), task.daily.is_some()]
            .iter()
            .filter(|set| **set)
            .count();
        if given != 1 {
            return Err(BotError::config(format!(
                "Task for '{}' needs exactly one of `at`, `every`, `daily` (got {given})",
                task.channel
            )));
        }
        if task.tz.is_some() && task.daily.is_none() {
            return Err(BotError::config("`tz` is only valid with `daily`"));
        }

        if let Some(at) = &task.at {
            let instant = DateTime::parse_from_rfc3339(at)
                .map_err(|e| BotError::config(format!("Invalid `at` '{at}': {e}")))?;
            return Ok(Self::at(instant));
        }
        if let Some(every) = &task.every {
            return Ok(Self::Recurring(parse_period(every)?));
        }

        let daily = task.daily.as_deref().unwrap_or_default();
        let time = NaiveTime::parse_from_str(daily, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(daily, "%H:%M"))
            .map_err(|e| BotError::config(format!("Invalid `daily` '{daily}': {e}")))?;
        let tz = match &task.tz {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|e| BotError::config(format!("Unknown timezone '{name}': {e}")))?,
            None => Tz::UTC,
        };
        Ok(Self::daily(time, tz))
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Absolute(at) => write!(f, "at {}", at.to_rfc3339()),
            Trigger::Recurring(period) => write!(f, "every {}s", period.num_seconds()),
            Trigger::DailyAt { time, tz } => write!(f, "daily at {time} {tz}"),
        }
    }
}

/// Parse `30s`, `5m`, `2h`, `1d` (a bare number is seconds).
pub fn parse_period(s: &str) -> Result<TimeDelta> {
    let s = s.trim();
    let (digits, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(i) => s.split_at(i),
        None => (s, "s"),
    };
    let n: i64 = digits
        .parse()
        .map_err(|_| BotError::config(format!("Invalid period '{s}'")))?;
    let period = match unit {
        "s" => TimeDelta::try_seconds(n),
        "m" => TimeDelta::try_minutes(n),
        "h" => TimeDelta::try_hours(n),
        "d" => TimeDelta::try_days(n),
        _ => None,
    }
    .ok_or_else(|| BotError::config(format!("Invalid period '{s}'")))?;
    if period <= TimeDelta::zero() {
        return Err(BotError::config(format!("Period must be positive: '{s}'")));
    }
    if period > max_period() {
        return Err(BotError::config(format!(
            "Period '{s}' is longer than {MAX_PERIOD_DAYS} days"
        )));
    }
    Ok(period)
}

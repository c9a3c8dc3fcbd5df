//! Yesterday / today / tomorrow buckets.
//!
//! Partitioning is a pure function of the task universe, the current
//! instant and the reference timezone. It compares calendar dates in that
//! timezone, not elapsed hours, and holds no state of its own.

use chrono::{DateTime, Days, FixedOffset, NaiveDate, Utc};

use crate::types::Task;

/// Tasks grouped by calendar day relative to "now".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayPartition {
    /// Tasks scheduled the day before.
    pub yesterday: Vec<Task>,
    /// Tasks scheduled today.
    pub today: Vec<Task>,
    /// Tasks scheduled the day after.
    pub tomorrow: Vec<Task>,
}

/// Calendar date of `instant` in `tz`.
pub fn local_date(instant: DateTime<Utc>, tz: FixedOffset) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// Splits `tasks` into yesterday/today/tomorrow relative to `now` in `tz`.
///
/// Tasks on any other date are left out of every bucket. Each bucket is
/// ordered by scheduled instant, then client, then id.
///
/// # Examples
///
/// ```
/// use chrono::{FixedOffset, TimeZone, Utc};
/// use dockboard::partition::partition;
/// use dockboard::Task;
///
/// let tz = FixedOffset::west_opt(3 * 3600).unwrap();
/// let now = Utc.with_ymd_and_hms(2025, 1, 10, 15, 0, 0).unwrap();
/// // 01:30 UTC on the 11th is still the 10th in UTC-3.
/// let late = Task::new(
///     "late".into(),
///     Utc.with_ymd_and_hms(2025, 1, 11, 1, 30, 0).unwrap(),
///     "22:30".into(),
///     "Acme".into(),
///     "Import".into(),
/// );
///
/// let days = partition([&late], now, tz);
/// assert_eq!(days.today.len(), 1);
/// assert!(days.tomorrow.is_empty());
/// ```
pub fn partition<'a, I>(tasks: I, now: DateTime<Utc>, tz: FixedOffset) -> DayPartition
where
    I: IntoIterator<Item = &'a Task>,
{
    partition_on(tasks, local_date(now, tz), tz)
}

/// Splits `tasks` into the days around the calendar date `today` in `tz`.
///
/// Same ordering as [`partition`]; used when the board's day is pinned
/// rather than read off a clock.
pub fn partition_on<'a, I>(tasks: I, today: NaiveDate, tz: FixedOffset) -> DayPartition
where
    I: IntoIterator<Item = &'a Task>,
{
    let yesterday = today.checked_sub_days(Days::new(1));
    let tomorrow = today.checked_add_days(Days::new(1));

    let mut days = DayPartition::default();
    for task in tasks {
        let date = Some(local_date(task.scheduled_at, tz));
        if date == Some(today) {
            days.today.push(task.clone());
        } else if date == yesterday {
            days.yesterday.push(task.clone());
        } else if date == tomorrow {
            days.tomorrow.push(task.clone());
        }
    }

    for bucket in [&mut days.yesterday, &mut days.today, &mut days.tomorrow] {
        bucket.sort_by(|a, b| {
            a.scheduled_at
                .cmp(&b.scheduled_at)
                .then_with(|| a.client.cmp(&b.client))
                .then_with(|| a.id.cmp(&b.id))
        });
    }

    days
}

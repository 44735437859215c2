//! crates/polls_core/src/visibility.rs
//!
//! Rules deciding which questions anonymous visitors may see, and the
//! "recent" predicate shown in the admin list.

use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};

use crate::domain::Question;

/// Maximum number of questions on the public index.
pub const INDEX_LIMIT: usize = 5;

/// Trailing window around "now" inside which a question counts as recent.
///
/// A question is recent iff `now - lookback <= publication_time <= now + lookahead`.
/// With the default zero lookahead a future-dated question is never recent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecencyWindow {
    pub lookback: Duration,
    pub lookahead: Duration,
}

impl RecencyWindow {
    pub fn new(lookback: Duration, lookahead: Duration) -> Self {
        Self {
            lookback,
            lookahead,
        }
    }

    /// A bound that falls outside the representable date range leaves that
    /// side of the window open.
    pub fn contains(&self, publication_time: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let after_start = now
            .checked_sub_signed(self.lookback)
            .map_or(true, |start| start <= publication_time);
        let before_end = now
            .checked_add_signed(self.lookahead)
            .map_or(true, |end| publication_time <= end);
        after_start && before_end
    }
}

impl Default for RecencyWindow {
    fn default() -> Self {
        Self::new(Duration::days(1), Duration::zero())
    }
}

/// A question is visible once published and as soon as it has a choice.
pub fn is_visible(question: &Question, choice_count: usize, now: DateTime<Utc>) -> bool {
    question.publication_time <= now && choice_count > 0
}

/// Applies the index rule to `(question, choice_count)` candidates: visible
/// only, newest publication first, at most `limit` entries.
///
/// Candidates sharing an id are reported once.
pub fn select_visible<I>(candidates: I, now: DateTime<Utc>, limit: usize) -> Vec<Question>
where
    I: IntoIterator<Item = (Question, usize)>,
{
    let mut visible: Vec<Question> = Vec::new();
    for (question, choice_count) in candidates {
        if is_visible(&question, choice_count, now) && !visible.iter().any(|q| q.id == question.id)
        {
            visible.push(question);
        }
    }
    visible.sort_by(|a, b| b.publication_time.cmp(&a.publication_time));
    visible.truncate(limit);
    visible
}

/// Publication-date filter of the admin question list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublishedFilter {
    #[default]
    Any,
    Today,
    Past7Days,
    ThisMonth,
    ThisYear,
}

impl PublishedFilter {
    /// Half-open `[from, to)` range of publication times matched by the
    /// filter, or `None` for [`PublishedFilter::Any`].
    pub fn range(&self, now: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let today = now.date_naive();
        let from = match self {
            PublishedFilter::Any => return None,
            PublishedFilter::Today => today,
            PublishedFilter::Past7Days => today - Duration::days(7),
            PublishedFilter::ThisMonth => NaiveDate::from_ymd_opt(today.year(), today.month(), 1)?,
            PublishedFilter::ThisYear => NaiveDate::from_ymd_opt(today.year(), 1, 1)?,
        };
        let to = today.succ_opt()?;
        Some((start_of_day(from)?, start_of_day(to)?))
    }
}

impl FromStr for PublishedFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "any" => Ok(PublishedFilter::Any),
            "today" => Ok(PublishedFilter::Today),
            "past_7_days" => Ok(PublishedFilter::Past7Days),
            "this_month" => Ok(PublishedFilter::ThisMonth),
            "this_year" => Ok(PublishedFilter::ThisYear),
            other => Err(format!("unknown publication filter '{}'", other)),
        }
    }
}

fn start_of_day(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: i64, publication_time: DateTime<Utc>) -> Question {
        Question {
            id,
            text: format!("q{}", id),
            publication_time,
        }
    }

    #[test]
    fn recent_window_excludes_future_and_old() {
        let now = Utc::now();
        let window = RecencyWindow::default();

        assert!(!window.contains(now + Duration::days(3), now));
        assert!(!window.contains(now - Duration::days(3), now));
        assert!(window.contains(now, now));
        assert!(window.contains(now - Duration::hours(23) - Duration::minutes(59), now));
    }

    #[test]
    fn recent_window_bounds_are_inclusive() {
        let now = Utc::now();
        let window = RecencyWindow::new(Duration::days(3), Duration::hours(1));

        assert!(window.contains(now - Duration::days(3), now));
        assert!(window.contains(now + Duration::hours(1), now));
        assert!(!window.contains(now + Duration::hours(1) + Duration::seconds(1), now));
    }

    #[test]
    fn out_of_range_bounds_leave_the_window_open() {
        let now = Utc::now();
        let huge = Duration::hours(i64::from(u32::MAX));
        let window = RecencyWindow::new(huge, huge);

        assert!(window.contains(now - Duration::days(365 * 1000), now));
        assert!(window.contains(now + Duration::days(365 * 1000), now));
        assert!(!RecencyWindow::new(huge, Duration::zero()).contains(now + Duration::days(1), now));
    }

    #[test]
    fn future_or_choiceless_questions_are_hidden() {
        let now = Utc::now();

        assert!(!is_visible(&question(1, now + Duration::days(3)), 2, now));
        assert!(!is_visible(&question(2, now - Duration::days(3)), 0, now));
        assert!(is_visible(&question(3, now - Duration::days(3)), 1, now));
        assert!(is_visible(&question(4, now), 1, now));
    }

    #[test]
    fn select_visible_orders_newest_first_and_truncates() {
        let now = Utc::now();
        let candidates = (1..=8).map(|i| (question(i, now - Duration::days(i)), 1));

        let ids: Vec<i64> = select_visible(candidates, now, INDEX_LIMIT)
            .into_iter()
            .map(|q| q.id)
            .collect();

        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn select_visible_drops_duplicates_and_hidden() {
        let now = Utc::now();
        let past = question(1, now - Duration::days(3));
        let candidates = vec![
            (past.clone(), 2),
            (past, 2),
            (question(2, now + Duration::days(3)), 1),
            (question(3, now - Duration::days(1)), 0),
        ];

        let visible = select_visible(candidates, now, INDEX_LIMIT);

        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, 1);
    }

    #[test]
    fn published_filter_ranges() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 30, 0).unwrap();
        let tomorrow = Utc.with_ymd_and_hms(2024, 3, 16, 0, 0, 0).unwrap();

        assert_eq!(PublishedFilter::Any.range(now), None);
        assert_eq!(
            PublishedFilter::Today.range(now),
            Some((Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap(), tomorrow))
        );
        assert_eq!(
            PublishedFilter::Past7Days.range(now),
            Some((Utc.with_ymd_and_hms(2024, 3, 8, 0, 0, 0).unwrap(), tomorrow))
        );
        assert_eq!(
            PublishedFilter::ThisMonth.range(now),
            Some((Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(), tomorrow))
        );
        assert_eq!(
            PublishedFilter::ThisYear.range(now),
            Some((Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(), tomorrow))
        );
    }

    #[test]
    fn published_filter_parses_query_values() {
        assert_eq!("".parse::<PublishedFilter>(), Ok(PublishedFilter::Any));
        assert_eq!("past_7_days".parse::<PublishedFilter>(), Ok(PublishedFilter::Past7Days));
        assert!("yesterday".parse::<PublishedFilter>().is_err());
    }
}

//! Rule expansion: turns a rule and an anchor into concrete occurrences.
//!
//! Expansion walks periods (day, week, month, year) starting at the
//! anchor's period and stepping by the rule's interval. Each period yields
//! its candidate dates in order; the anchor's time of day is applied to
//! every candidate.

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, Utc};

use super::rule::{Frequency, RecurrenceRule, Weekday};

/// Upper bound on periods scanned for a single expansion. Sparse rules
/// (Feb 29 yearly, the 31st monthly) may produce nothing for many periods.
const MAX_PERIODS: u64 = 10_000;

/// Expand `rule` from `anchor`, returning at most `limit` occurrences in
/// ascending order.
///
/// `count` and `until` from the rule are honored; occurrences before the
/// anchor are never returned. The rule is expected to be validated.
pub(crate) fn expand(rule: &RecurrenceRule, anchor: DateTime<Utc>, limit: usize) -> Vec<DateTime<Utc>> {
    let limit = rule
        .count
        .map_or(limit, |count| limit.min(count as usize));
    let rule = rule.normalized();
    let interval = u64::from(rule.interval.max(1));
    let anchor_date = anchor.date_naive();
    let time = anchor.time();

    let mut occurrences = Vec::with_capacity(limit.min(64));
    if limit == 0 {
        return occurrences;
    }

    for period in 0..MAX_PERIODS {
        let Some(offset) = period.checked_mul(interval) else {
            break;
        };
        let Some(candidates) = period_candidates(&rule, anchor_date, offset) else {
            // Past the representable calendar.
            break;
        };

        for date in candidates {
            let at = at_time(date, time);
            if at < anchor {
                continue;
            }
            if rule.until.is_some_and(|until| at > until) {
                return occurrences;
            }
            occurrences.push(at);
            if occurrences.len() >= limit {
                return occurrences;
            }
        }
    }

    occurrences
}

fn at_time(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    date.and_time(time).and_utc()
}

/// Candidate dates of the period `offset` periods after the anchor's, in
/// ascending order. `None` when the period lies outside chrono's range.
fn period_candidates(rule: &RecurrenceRule, anchor: NaiveDate, offset: u64) -> Option<Vec<NaiveDate>> {
    match rule.frequency {
        Frequency::Daily => {
            let date = anchor.checked_add_days(Days::new(offset))?;
            let keep = rule.by_weekday.is_empty()
                || rule.by_weekday.contains(&Weekday::from(date.weekday()));
            Some(if keep { vec![date] } else { Vec::new() })
        }
        Frequency::Weekly => {
            let monday = anchor
                .checked_sub_days(Days::new(u64::from(anchor.weekday().num_days_from_monday())))?;
            let week_start = monday.checked_add_days(Days::new(offset.checked_mul(7)?))?;
            let days: Vec<Weekday> = if rule.by_weekday.is_empty() {
                vec![Weekday::from(anchor.weekday())]
            } else {
                rule.by_weekday.clone()
            };
            days.into_iter()
                .map(|day| week_start.checked_add_days(Days::new(u64::from(day.days_from_monday()))))
                .collect()
        }
        Frequency::Monthly => {
            let month_index = i64::from(anchor.year()) * 12 + i64::from(anchor.month0());
            let target = month_index.checked_add(i64::try_from(offset).ok()?)?;
            let year = i32::try_from(target.div_euclid(12)).ok()?;
            let month = u32::try_from(target.rem_euclid(12)).ok()? + 1;
            let first = NaiveDate::from_ymd_opt(year, month, 1)?;
            if rule.by_weekday.is_empty() {
                // Months without the anchor's day are skipped, not clamped.
                Some(NaiveDate::from_ymd_opt(year, month, anchor.day()).into_iter().collect())
            } else {
                Some(matching_days(first, |d| d.month() == month, &rule.by_weekday))
            }
        }
        Frequency::Yearly => {
            let year = anchor.year().checked_add(i32::try_from(offset).ok()?)?;
            let first = NaiveDate::from_ymd_opt(year, 1, 1)?;
            if rule.by_weekday.is_empty() {
                // Feb 29 anchors only recur in leap years.
                Some(
                    NaiveDate::from_ymd_opt(year, anchor.month(), anchor.day())
                        .into_iter()
                        .collect(),
                )
            } else {
                Some(matching_days(first, |d| d.year() == year, &rule.by_weekday))
            }
        }
    }
}

/// Every day from `first` while `in_period` holds whose weekday is listed.
fn matching_days(
    first: NaiveDate,
    in_period: impl Fn(&NaiveDate) -> bool,
    weekdays: &[Weekday],
) -> Vec<NaiveDate> {
    first
        .iter_days()
        .take_while(|d| in_period(d))
        .filter(|d| weekdays.contains(&Weekday::from(d.weekday())))
        .collect()
}

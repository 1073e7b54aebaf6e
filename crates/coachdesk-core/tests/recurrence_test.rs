//! Behavioral tests for the recurrence planner through its public API.

use chrono::{DateTime, Duration, TimeZone, Utc};

use coachdesk_core::recurrence::{
    Frequency, PlanRequest, RecurrenceError, RecurrenceRule, RecurrenceService, Weekday,
    parse_rrule,
};

fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

fn due_dates(service: &RecurrenceService, due: DateTime<Utc>, rule: RecurrenceRule) -> Vec<DateTime<Utc>> {
    service
        .plan_instances(&PlanRequest {
            due_date: Some(due),
            scheduled_date: None,
            recurrence_rule: Some(rule),
        })
        .unwrap()
        .instances
        .into_iter()
        .map(|i| i.due_date.unwrap())
        .collect()
}

#[test]
fn one_off_task_has_single_instance_at_due_date() {
    let due = at(2025, 3, 1, 9, 30);
    let plan = RecurrenceService::default()
        .plan_instances(&PlanRequest {
            due_date: Some(due),
            ..Default::default()
        })
        .unwrap();

    assert_eq!(plan.recurrence_rule, None);
    assert_eq!(plan.rrule(), None);
    assert_eq!(plan.instances.len(), 1);
    assert_eq!(plan.instances[0].due_date, Some(due));
    assert_eq!(plan.instances[0].scheduled_date, Some(due));
}

#[test]
fn weekly_monday_count_three_is_seven_days_apart() {
    let anchor = at(2025, 2, 10, 12, 0);
    let rule = RecurrenceRule::new(Frequency::Weekly)
        .count(3)
        .on([Weekday::Monday]);

    let dates = due_dates(&RecurrenceService::default(), anchor, rule);

    assert_eq!(
        dates,
        vec![
            at(2025, 2, 10, 12, 0),
            at(2025, 2, 17, 12, 0),
            at(2025, 2, 24, 12, 0),
        ]
    );
}

#[test]
fn rrule_text_from_storage_plans_the_same_dates() {
    let anchor = at(2025, 2, 10, 12, 0);
    let rule = parse_rrule("FREQ=WEEKLY;COUNT=3;BYDAY=MO").unwrap();
    let dates = due_dates(&RecurrenceService::default(), anchor, rule);
    assert_eq!(dates.len(), 3);
    assert_eq!(dates[2] - dates[0], Duration::days(14));
}

#[test]
fn open_ended_daily_rule_stops_at_cap() {
    let anchor = at(2025, 5, 5, 8, 0);
    let service = RecurrenceService::new(2).unwrap();
    let dates = due_dates(&service, anchor, RecurrenceRule::new(Frequency::Daily));
    assert_eq!(dates, vec![anchor, anchor + Duration::days(1)]);
}

#[test]
fn larger_cap_yields_more_open_ended_instances() {
    let anchor = at(2025, 5, 5, 8, 0);
    let service = RecurrenceService::new(5).unwrap();
    let dates = due_dates(&service, anchor, RecurrenceRule::new(Frequency::Weekly));
    assert_eq!(dates.len(), 5);
    assert_eq!(dates[4], anchor + Duration::weeks(4));
}

#[test]
fn rule_without_due_date_is_a_validation_error() {
    let rules = [
        RecurrenceRule::new(Frequency::Daily),
        RecurrenceRule::new(Frequency::Weekly).count(3).on([Weekday::Monday]),
        RecurrenceRule::new(Frequency::Monthly).until(at(2026, 1, 1, 0, 0)),
    ];
    for rule in rules {
        let err = RecurrenceService::default()
            .plan_instances(&PlanRequest {
                due_date: None,
                scheduled_date: None,
                recurrence_rule: Some(rule),
            })
            .unwrap_err();
        assert_eq!(err, RecurrenceError::MissingAnchor);
        assert!(err.is_validation());
    }
}

#[test]
fn zero_interval_and_zero_count_are_rejected() {
    let due = Some(at(2025, 1, 1, 0, 0));
    let service = RecurrenceService::default();

    let err = service
        .plan_instances(&PlanRequest {
            due_date: due,
            scheduled_date: None,
            recurrence_rule: Some(RecurrenceRule::new(Frequency::Daily).every(0)),
        })
        .unwrap_err();
    assert_eq!(err, RecurrenceError::InvalidInterval);

    let err = service
        .plan_instances(&PlanRequest {
            due_date: due,
            scheduled_date: None,
            recurrence_rule: Some(RecurrenceRule::new(Frequency::Daily).count(0)),
        })
        .unwrap_err();
    assert_eq!(err, RecurrenceError::InvalidCount);
}

#[test]
fn rule_survives_rrule_round_trip() {
    let rules = [
        RecurrenceRule::new(Frequency::Daily),
        RecurrenceRule::new(Frequency::Weekly)
            .every(2)
            .on([Weekday::Friday, Weekday::Monday, Weekday::Friday]),
        RecurrenceRule::new(Frequency::Monthly).count(12),
        RecurrenceRule::new(Frequency::Yearly).until(at(2030, 6, 30, 23, 59)),
    ];
    for rule in rules {
        let text = rule.to_string();
        let parsed = parse_rrule(&text).unwrap();
        assert_eq!(parsed, rule.normalized(), "round trip of {text}");
        assert_eq!(parsed.to_string(), text);
    }
}

#[test]
fn weekly_with_several_weekdays_fills_each_window() {
    // Wednesday anchor: Monday of the first week is before the anchor.
    let anchor = at(2025, 2, 12, 7, 0);
    let rule = RecurrenceRule::new(Frequency::Weekly)
        .count(4)
        .on([Weekday::Monday, Weekday::Friday]);

    let dates = due_dates(&RecurrenceService::default(), anchor, rule);

    assert_eq!(
        dates,
        vec![
            at(2025, 2, 14, 7, 0),
            at(2025, 2, 17, 7, 0),
            at(2025, 2, 21, 7, 0),
            at(2025, 2, 24, 7, 0),
        ]
    );
}

#[test]
fn biweekly_rule_skips_alternate_weeks() {
    let anchor = at(2025, 2, 10, 12, 0);
    let rule = RecurrenceRule::new(Frequency::Weekly)
        .every(2)
        .count(3)
        .on([Weekday::Monday]);
    let dates = due_dates(&RecurrenceService::default(), anchor, rule);
    assert_eq!(
        dates,
        vec![
            at(2025, 2, 10, 12, 0),
            at(2025, 2, 24, 12, 0),
            at(2025, 3, 10, 12, 0),
        ]
    );
}

#[test]
fn until_is_inclusive() {
    let anchor = at(2025, 2, 10, 12, 0);
    let rule = RecurrenceRule::new(Frequency::Daily).until(at(2025, 2, 12, 12, 0));
    let dates = due_dates(&RecurrenceService::default(), anchor, rule);
    assert_eq!(dates.len(), 3);
}

#[test]
fn count_and_until_take_the_smaller_bound() {
    let anchor = at(2025, 2, 10, 12, 0);
    let rule = RecurrenceRule::new(Frequency::Daily)
        .count(10)
        .until(at(2025, 2, 13, 0, 0));
    let dates = due_dates(&RecurrenceService::default(), anchor, rule);
    assert_eq!(dates.len(), 3);
}

#[test]
fn count_bounds_before_a_later_until() {
    let anchor = at(2025, 2, 10, 12, 0);
    let rule = RecurrenceRule::new(Frequency::Daily)
        .count(2)
        .until(at(2025, 3, 1, 0, 0));
    let dates = due_dates(&RecurrenceService::default(), anchor, rule);
    assert_eq!(dates, vec![anchor, at(2025, 2, 11, 12, 0)]);
}

#[test]
fn rrule_text_with_count_and_until_takes_the_smaller_bound() {
    let anchor = at(2025, 2, 10, 12, 0);
    let service = RecurrenceService::default();

    let until_first = parse_rrule("FREQ=DAILY;COUNT=5;UNTIL=20250212T120000Z").unwrap();
    assert_eq!(due_dates(&service, anchor, until_first).len(), 3);

    let count_first = parse_rrule("FREQ=DAILY;COUNT=5;UNTIL=20250301T000000Z").unwrap();
    let dates = due_dates(&service, anchor, count_first.clone());
    assert_eq!(dates.len(), 5);
    assert_eq!(dates[4], at(2025, 2, 14, 12, 0));
    assert_eq!(
        count_first.to_string(),
        "FREQ=DAILY;INTERVAL=1;COUNT=5;UNTIL=20250301T000000Z"
    );
}

#[test]
fn subsecond_until_plans_the_same_before_and_after_storage() {
    let ts = |s: &str| DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc);
    let anchor = ts("2025-02-10T09:00:00.250Z");
    let rule = RecurrenceRule::new(Frequency::Daily).until(ts("2025-02-12T09:00:00.500Z"));
    let service = RecurrenceService::default();

    let plan = service
        .plan_instances(&PlanRequest {
            due_date: Some(anchor),
            scheduled_date: None,
            recurrence_rule: Some(rule),
        })
        .unwrap();
    let stored = plan.rrule().unwrap();
    let reloaded = service.replan(Some(&stored), Some(anchor), None).unwrap();

    assert_eq!(plan.recurrence_rule, reloaded.recurrence_rule);
    assert_eq!(plan.instances, reloaded.instances);
}

#[test]
fn monthly_rule_skips_short_months() {
    let anchor = at(2025, 1, 31, 10, 0);
    let rule = RecurrenceRule::new(Frequency::Monthly).count(3);
    let dates = due_dates(&RecurrenceService::default(), anchor, rule);
    assert_eq!(
        dates,
        vec![
            at(2025, 1, 31, 10, 0),
            at(2025, 3, 31, 10, 0),
            at(2025, 5, 31, 10, 0),
        ]
    );
}

#[test]
fn yearly_leap_day_recurs_only_in_leap_years() {
    let anchor = at(2024, 2, 29, 0, 0);
    let rule = RecurrenceRule::new(Frequency::Yearly).count(2);
    let dates = due_dates(&RecurrenceService::default(), anchor, rule);
    assert_eq!(dates, vec![at(2024, 2, 29, 0, 0), at(2028, 2, 29, 0, 0)]);
}

#[test]
fn instances_are_strictly_increasing() {
    let anchor = at(2025, 6, 1, 18, 45);
    let rule = RecurrenceRule::new(Frequency::Monthly)
        .count(20)
        .on([Weekday::Tuesday, Weekday::Thursday]);
    let dates = due_dates(&RecurrenceService::default(), anchor, rule);
    assert_eq!(dates.len(), 20);
    assert!(dates.windows(2).all(|w| w[0] < w[1]));
    assert!(dates.iter().all(|d| *d >= anchor));
}

#[test]
fn planning_is_deterministic_across_threads() {
    let service = RecurrenceService::default();
    let request = PlanRequest {
        due_date: Some(at(2025, 2, 10, 12, 0)),
        scheduled_date: Some(at(2025, 2, 9, 12, 0)),
        recurrence_rule: Some(RecurrenceRule::new(Frequency::Weekly).count(3)),
    };
    let expected = service.plan_instances(&request).unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| service.plan_instances(&request).unwrap()))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}

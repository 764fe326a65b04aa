// tests/trigger_evaluation.rs

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc, Weekday};

use buildloop::engine::StatusMap;
use buildloop::integration::{IntegrationStatus, IntegrationSummary};
use buildloop::triggers::{
    IntervalTrigger, MultiTrigger, ProjectTrigger, ScheduleTrigger, Trigger, TriggerContext,
    TriggerDecision, TriggerOperator,
};
use buildloop_test_utils::builders::summary;
use buildloop_test_utils::init_tracing;

fn empty_peers() -> StatusMap {
    Arc::new(RwLock::new(HashMap::new()))
}

fn ctx<'a>(
    now: DateTime<Utc>,
    last_build: Option<&'a IntegrationSummary>,
    peers: &'a StatusMap,
) -> TriggerContext<'a> {
    TriggerContext {
        now,
        last_build,
        peers,
    }
}

fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

#[test]
fn interval_is_due_immediately_for_never_built_project() {
    init_tracing();
    let peers = empty_peers();
    let mut trigger = IntervalTrigger::new(Duration::seconds(60));

    let decision = trigger.fire(&ctx(at(2026, 3, 2, 12, 0), None, &peers));
    assert_eq!(decision, TriggerDecision::BuildIfModified);
}

#[test]
fn interval_waits_for_elapsed_time_after_completed_check() {
    init_tracing();
    let peers = empty_peers();
    let t0 = at(2026, 3, 2, 12, 0);
    let mut trigger = IntervalTrigger::new(Duration::seconds(60));
    trigger.integration_completed(t0);

    let early = trigger.fire(&ctx(t0 + Duration::seconds(30), None, &peers));
    assert_eq!(early, TriggerDecision::NoBuild);

    let due = trigger.fire(&ctx(t0 + Duration::seconds(61), None, &peers));
    assert_eq!(due, TriggerDecision::BuildIfModified);
}

#[test]
fn interval_falls_back_to_last_build_start_time() {
    init_tracing();
    let peers = empty_peers();
    let t0 = at(2026, 3, 2, 12, 0);
    let last = summary(7, IntegrationStatus::Success, t0);
    let mut trigger = IntervalTrigger::new(Duration::seconds(60));

    let early = trigger.fire(&ctx(t0 + Duration::seconds(59), Some(&last), &peers));
    assert_eq!(early, TriggerDecision::NoBuild);

    let due = trigger.fire(&ctx(t0 + Duration::seconds(60), Some(&last), &peers));
    assert_eq!(due, TriggerDecision::BuildIfModified);
}

#[test]
fn schedule_fires_once_per_day_after_its_time() {
    init_tracing();
    let peers = empty_peers();
    let three_am = NaiveTime::from_hms_opt(3, 0, 0).unwrap();
    let mut trigger = ScheduleTrigger::new(three_am, vec![]);

    let before = trigger.fire(&ctx(at(2026, 3, 2, 2, 59), None, &peers));
    assert_eq!(before, TriggerDecision::NoBuild);

    let due = trigger.fire(&ctx(at(2026, 3, 2, 3, 5), None, &peers));
    assert_eq!(due, TriggerDecision::BuildNow);

    // Polling again inside the same day must not double-fire.
    let again = trigger.fire(&ctx(at(2026, 3, 2, 3, 6), None, &peers));
    assert_eq!(again, TriggerDecision::NoBuild);

    let next_day = trigger.fire(&ctx(at(2026, 3, 3, 3, 5), None, &peers));
    assert_eq!(next_day, TriggerDecision::BuildNow);
}

#[test]
fn schedule_respects_weekday_restriction() {
    init_tracing();
    let peers = empty_peers();
    let three_am = NaiveTime::from_hms_opt(3, 0, 0).unwrap();
    let mut trigger = ScheduleTrigger::new(three_am, vec![Weekday::Mon]);

    // 2026-03-02 is a Monday, 2026-03-03 a Tuesday.
    let monday = trigger.fire(&ctx(at(2026, 3, 2, 4, 0), None, &peers));
    assert_eq!(monday, TriggerDecision::BuildNow);

    let tuesday = trigger.fire(&ctx(at(2026, 3, 3, 4, 0), None, &peers));
    assert_eq!(tuesday, TriggerDecision::NoBuild);
}

#[test]
fn completed_build_past_schedule_time_consumes_the_slot() {
    init_tracing();
    let peers = empty_peers();
    let three_am = NaiveTime::from_hms_opt(3, 0, 0).unwrap();
    let mut trigger = ScheduleTrigger::new(three_am, vec![]);

    // A forced build finished at 03:10; the daily slot is spent.
    trigger.integration_completed(at(2026, 3, 2, 3, 10));

    let later = trigger.fire(&ctx(at(2026, 3, 2, 3, 20), None, &peers));
    assert_eq!(later, TriggerDecision::NoBuild);
}

#[test]
fn build_completing_before_schedule_time_leaves_slot_open() {
    init_tracing();
    let peers = empty_peers();
    let three_am = NaiveTime::from_hms_opt(3, 0, 0).unwrap();
    let mut trigger = ScheduleTrigger::new(three_am, vec![]);

    trigger.integration_completed(at(2026, 3, 2, 1, 0));

    let due = trigger.fire(&ctx(at(2026, 3, 2, 3, 5), None, &peers));
    assert_eq!(due, TriggerDecision::BuildNow);
}

#[test]
fn project_trigger_fires_once_per_new_peer_success() {
    init_tracing();
    let peers = empty_peers();
    let t0 = at(2026, 3, 2, 12, 0);
    peers
        .write()
        .unwrap()
        .insert("core".to_string(), summary(3, IntegrationStatus::Success, t0));

    let mut trigger = ProjectTrigger::new("core");

    let first = trigger.fire(&ctx(t0 + Duration::seconds(5), None, &peers));
    assert_eq!(first, TriggerDecision::BuildNow);

    // Same peer label again: no re-trigger.
    let second = trigger.fire(&ctx(t0 + Duration::seconds(10), None, &peers));
    assert_eq!(second, TriggerDecision::NoBuild);

    // Peer succeeds again with a new label.
    peers.write().unwrap().insert(
        "core".to_string(),
        summary(4, IntegrationStatus::Success, t0 + Duration::seconds(20)),
    );
    let third = trigger.fire(&ctx(t0 + Duration::seconds(25), None, &peers));
    assert_eq!(third, TriggerDecision::BuildNow);
}

#[test]
fn project_trigger_ignores_peer_failures() {
    init_tracing();
    let peers = empty_peers();
    let t0 = at(2026, 3, 2, 12, 0);
    peers
        .write()
        .unwrap()
        .insert("core".to_string(), summary(3, IntegrationStatus::Failure, t0));

    let mut trigger = ProjectTrigger::new("core");
    let decision = trigger.fire(&ctx(t0 + Duration::seconds(5), None, &peers));
    assert_eq!(decision, TriggerDecision::NoBuild);
}

#[test]
fn project_trigger_ignores_success_predating_our_last_build() {
    init_tracing();
    let peers = empty_peers();
    let t0 = at(2026, 3, 2, 12, 0);
    peers
        .write()
        .unwrap()
        .insert("core".to_string(), summary(3, IntegrationStatus::Success, t0));

    let ours = summary(9, IntegrationStatus::Success, t0 + Duration::seconds(30));

    let mut trigger = ProjectTrigger::new("core");
    let decision = trigger.fire(&ctx(t0 + Duration::seconds(60), Some(&ours), &peers));
    assert_eq!(decision, TriggerDecision::NoBuild);
}

#[test]
fn multi_or_takes_the_strongest_decision() {
    init_tracing();
    let peers = empty_peers();
    let three_am = NaiveTime::from_hms_opt(3, 0, 0).unwrap();

    let mut trigger = MultiTrigger::new(
        TriggerOperator::Or,
        vec![
            Box::new(IntervalTrigger::new(Duration::seconds(60))),
            Box::new(ScheduleTrigger::new(three_am, vec![])),
        ],
    );

    // Interval says build-if-modified, schedule says build-now: now wins.
    let decision = trigger.fire(&ctx(at(2026, 3, 2, 3, 5), None, &peers));
    assert_eq!(decision, TriggerDecision::BuildNow);
}

#[test]
fn multi_and_requires_every_sub_trigger_to_fire() {
    init_tracing();
    let peers = empty_peers();
    let three_am = NaiveTime::from_hms_opt(3, 0, 0).unwrap();
    let t0 = at(2026, 3, 2, 3, 5);

    let mut interval = IntervalTrigger::new(Duration::seconds(3600));
    interval.integration_completed(t0 - Duration::seconds(10));

    let mut trigger = MultiTrigger::new(
        TriggerOperator::And,
        vec![
            Box::new(interval),
            Box::new(ScheduleTrigger::new(three_am, vec![])),
        ],
    );

    // Schedule is due but the interval is not: the conjunction holds back.
    let decision = trigger.fire(&ctx(t0, None, &peers));
    assert_eq!(decision, TriggerDecision::NoBuild);
}

#[test]
fn suppressed_conjunction_does_not_spend_the_schedule_slot() {
    init_tracing();
    let peers = empty_peers();
    let three_am = NaiveTime::from_hms_opt(3, 0, 0).unwrap();

    let mut interval = IntervalTrigger::new(Duration::seconds(3600));
    interval.integration_completed(at(2026, 3, 2, 2, 55));

    let mut trigger = MultiTrigger::new(
        TriggerOperator::And,
        vec![
            Box::new(interval),
            Box::new(ScheduleTrigger::new(three_am, vec![])),
        ],
    );

    // 03:05: schedule due, interval not; the conjunction suppresses.
    let held = trigger.fire(&ctx(at(2026, 3, 2, 3, 5), None, &peers));
    assert_eq!(held, TriggerDecision::NoBuild);

    // 04:10 same day: the interval has elapsed and the schedule slot must
    // still be available.
    let due = trigger.fire(&ctx(at(2026, 3, 2, 4, 10), None, &peers));
    assert_eq!(due, TriggerDecision::BuildNow);
}

#[test]
fn suppressed_conjunction_still_reports_a_fresh_peer_success() {
    init_tracing();
    let peers = empty_peers();
    let t0 = at(2026, 3, 2, 12, 0);
    peers
        .write()
        .unwrap()
        .insert("core".to_string(), summary(3, IntegrationStatus::Success, t0));

    let mut interval = IntervalTrigger::new(Duration::seconds(3600));
    interval.integration_completed(t0);

    let mut trigger = MultiTrigger::new(
        TriggerOperator::And,
        vec![
            Box::new(interval),
            Box::new(ProjectTrigger::new("core")),
        ],
    );

    // Held back by the interval; the peer label must not be marked seen.
    let held = trigger.fire(&ctx(t0 + Duration::seconds(5), None, &peers));
    assert_eq!(held, TriggerDecision::NoBuild);

    let due = trigger.fire(&ctx(t0 + Duration::seconds(3700), None, &peers));
    assert_eq!(due, TriggerDecision::BuildNow);
}

#[test]
fn trigger_objects_are_shareable_across_spawned_tasks() {
    fn assert_send_sync<T: Send + Sync + ?Sized>() {}
    assert_send_sync::<dyn Trigger>();
    assert_send_sync::<buildloop::engine::ProjectIntegrator>();
}

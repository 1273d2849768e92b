//! Integration tests for the reconciling scheduler, driven through the
//! engine's event handling with a fault-injecting store and a recording
//! timer facility.

mod common;

use common::{ExecutorEvent, MockJobStore, RecordingExecutor};
use railway_collector_core::scheduler::{
    CompositeJobSource, InMemoryJobStore, JobEvent, JobRow, JobScanner, ReconciliationEngine,
    RetryConfig, SchedulerConfig, SchedulerService, TaskExecutor,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    store: Arc<MockJobStore>,
    executor: Arc<RecordingExecutor>,
    source: Arc<CompositeJobSource>,
    engine: ReconciliationEngine,
}

fn harness(job_names: &[&'static str]) -> Harness {
    let mut scanner = JobScanner::new();
    for name in job_names {
        scanner = scanner.register_named(name, "Collector", "run", || async { Ok(()) });
    }
    let handlers = scanner.scan().expect("handler names are unique");
    harness_with_handlers(handlers)
}

fn harness_with_handlers(
    handlers: HashMap<String, railway_collector_core::scheduler::JobHandler>,
) -> Harness {
    let config = SchedulerConfig::builder()
        .retry(RetryConfig {
            max_attempts: 5,
            initial_backoff_ms: 10,
            max_backoff_ms: 50,
            jitter: 0.0,
        })
        .build();

    let store = Arc::new(MockJobStore::new());
    let executor = Arc::new(RecordingExecutor::new());
    let source = Arc::new(CompositeJobSource::new(store.clone(), config));
    let armed = Arc::new(railway_collector_core::scheduler::ArmedJobRegistry::new());
    let engine = ReconciliationEngine::new(
        source.clone(),
        executor.clone() as Arc<dyn TaskExecutor>,
        handlers,
        armed,
    );

    Harness {
        store,
        executor,
        source,
        engine,
    }
}

#[tokio::test]
async fn test_startup_arms_desired_schedule() {
    let h = harness(&["delay-poll", "weather-refresh"]);
    h.store.add_job(1, "delay-poll");
    h.store.set_interval(1, Duration::from_secs(300));
    h.store.add_job(2, "weather-refresh");
    h.store.set_crons(2, &["0 0 * * *", "0 12 * * *"]);

    h.engine.handle_event(JobEvent::StartupComplete).await;

    let armed = h.engine.armed();
    assert_eq!(armed.len(), 2);

    let delay = armed.armed_state("delay-poll").unwrap();
    assert_eq!(delay.fixed_interval, Some(Duration::from_secs(300)));
    assert!(delay.cron_expressions.is_empty());

    let weather = armed.armed_state("weather-refresh").unwrap();
    assert_eq!(weather.fixed_interval, None);
    assert_eq!(weather.cron_expressions.len(), 2);

    assert_eq!(h.executor.schedule_count(), 3);
    assert_eq!(h.executor.cancel_count(), 0);
}

#[tokio::test]
async fn test_second_pass_with_unchanged_state_issues_no_commands() {
    let h = harness(&["delay-poll"]);
    h.store.add_job(1, "delay-poll");
    h.store.set_interval(1, Duration::from_secs(60));
    h.store.set_crons(1, &["0 6 * * *"]);

    h.engine.handle_event(JobEvent::StartupComplete).await;
    let after_first = h.executor.events();

    h.engine.handle_event(JobEvent::StartupComplete).await;
    let after_second = h.executor.events();

    assert_eq!(after_first.len(), 2);
    assert_eq!(after_first, after_second);
}

#[tokio::test]
async fn test_interval_change_cancels_old_timer_before_arming_new() {
    let h = harness(&["delay-poll"]);
    h.store.add_job(1, "delay-poll");
    h.store.set_interval(1, Duration::from_secs(300));
    h.engine.handle_event(JobEvent::StartupComplete).await;

    h.store.set_interval(1, Duration::from_secs(600));
    h.engine
        .handle_event(JobEvent::Modified(JobRow {
            id: 1,
            name: "delay-poll".to_string(),
        }))
        .await;

    let events = h.executor.events();
    let cancel_at = events
        .iter()
        .position(|event| matches!(event, ExecutorEvent::Cancelled { .. }))
        .expect("old fixed-rate timer must be cancelled");
    let rearm_at = events
        .iter()
        .position(|event| {
            matches!(
                event,
                ExecutorEvent::ScheduledFixed { period, .. }
                    if *period == Duration::from_secs(600)
            )
        })
        .expect("new fixed-rate timer must be armed");
    assert!(cancel_at < rearm_at, "cancel must precede the replacement");

    let armed = h.engine.armed().armed_state("delay-poll").unwrap();
    assert_eq!(armed.fixed_interval, Some(Duration::from_secs(600)));
}

#[tokio::test]
async fn test_removed_job_is_fully_disarmed() {
    let h = harness(&["delay-poll"]);
    h.store.add_job(1, "delay-poll");
    h.store.set_interval(1, Duration::from_secs(300));
    h.store.set_crons(1, &["0 0 * * *"]);
    h.engine.handle_event(JobEvent::StartupComplete).await;
    assert_eq!(h.engine.armed().len(), 1);

    h.store.remove_job(1);
    h.engine.handle_event(JobEvent::Removed(1)).await;

    assert!(h.engine.armed().is_empty());
    assert_eq!(h.executor.cancel_count(), 2);
}

#[tokio::test]
async fn test_added_job_is_armed_without_reload() {
    let h = harness(&["delay-poll", "weather-refresh"]);
    h.store.add_job(1, "delay-poll");
    h.store.set_interval(1, Duration::from_secs(300));
    h.engine.handle_event(JobEvent::StartupComplete).await;
    let listings_after_startup = h.store.list_calls();

    h.store.add_job(2, "weather-refresh");
    h.store.set_crons(2, &["0 0 * * *"]);
    h.engine
        .handle_event(JobEvent::Added(JobRow {
            id: 2,
            name: "weather-refresh".to_string(),
        }))
        .await;

    assert_eq!(h.engine.armed().len(), 2);
    // Change notifications resolve the one job; they never re-list the store.
    assert_eq!(h.store.list_calls(), listings_after_startup);
}

#[tokio::test]
async fn test_redelivered_added_event_does_not_shadow_later_changes() {
    let h = harness(&["delay-poll"]);
    h.store.add_job(1, "delay-poll");
    h.store.set_interval(1, Duration::from_secs(300));
    h.engine.handle_event(JobEvent::StartupComplete).await;

    // At-least-once delivery: the same Added notification arrives twice.
    let row = JobRow {
        id: 1,
        name: "delay-poll".to_string(),
    };
    h.engine.handle_event(JobEvent::Added(row.clone())).await;
    h.engine.handle_event(JobEvent::Added(row.clone())).await;

    let desired = h.source.scheduled_jobs().await.unwrap();
    assert_eq!(desired.len(), 1);

    h.store.set_interval(1, Duration::from_secs(600));
    h.engine.handle_event(JobEvent::Modified(row)).await;

    let armed = h.engine.armed().armed_state("delay-poll").unwrap();
    assert_eq!(armed.fixed_interval, Some(Duration::from_secs(600)));
}

#[tokio::test]
async fn test_desired_job_without_handler_is_skipped() {
    let h = harness(&["delay-poll"]);
    h.store.add_job(1, "unregistered-job");
    h.store.set_interval(1, Duration::from_secs(300));

    h.engine.handle_event(JobEvent::StartupComplete).await;

    assert!(h.engine.armed().is_empty());
    assert_eq!(h.executor.schedule_count(), 0);
}

#[tokio::test]
async fn test_failed_interval_read_degrades_to_crons_only() {
    let h = harness(&["delay-poll"]);
    h.store.add_job(1, "delay-poll");
    h.store.set_interval(1, Duration::from_secs(300));
    h.store.set_crons(1, &["0 0 * * *"]);
    h.store.fail_interval_for(1);

    h.engine.handle_event(JobEvent::StartupComplete).await;

    let armed = h.engine.armed().armed_state("delay-poll").unwrap();
    assert_eq!(armed.fixed_interval, None);
    assert_eq!(armed.cron_expressions.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_not_ready_store_is_retried_until_it_answers() {
    let h = harness(&["delay-poll"]);
    h.store.add_job(1, "delay-poll");
    h.store.set_interval(1, Duration::from_secs(300));
    h.store.not_ready_for(2);

    h.engine.handle_event(JobEvent::StartupComplete).await;

    assert_eq!(h.store.list_calls(), 3);
    assert_eq!(h.engine.armed().len(), 1);
}

#[tokio::test]
async fn test_disabled_scheduler_accepts_and_drops_notifications() {
    let config = SchedulerConfig::builder().enabled(false).build();
    let store = Arc::new(InMemoryJobStore::new());
    let row = store.insert_job("delay-poll");
    store.set_interval(row.id, Duration::from_secs(60));

    let scanner =
        JobScanner::new().register_named("delay-poll", "Collector", "run", || async { Ok(()) });
    let service = SchedulerService::start(config, store, scanner)
        .await
        .expect("service starts even when disabled");

    service
        .notify(JobEvent::StartupComplete)
        .await
        .expect("disabled scheduler still accepts notifications");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(service.armed_jobs().is_empty());
    service.shutdown().await;
}

#[tokio::test]
async fn test_listing_failure_degrades_to_empty_schedule() {
    let h = harness(&["delay-poll"]);
    h.store.add_job(1, "delay-poll");
    h.store.set_interval(1, Duration::from_secs(300));
    h.store.fail_listing();

    h.engine.handle_event(JobEvent::StartupComplete).await;

    assert!(h.engine.armed().is_empty());
    assert_eq!(h.executor.schedule_count(), 0);
    // The load still completed; the cached schedule is empty, not missing.
    let desired = h.source.scheduled_jobs().await.unwrap();
    assert!(desired.is_empty());
}

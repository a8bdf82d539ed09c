use super::*;
use appointment_finder::{CycleOutcome, CycleScheduler, PluginManager};
use std::time::Duration;
use tokio::sync::watch;

#[tokio::test]
async fn test_run_once_opens_and_closes_one_session() -> anyhow::Result<()> {
    let doc = TestDocument::new(TWO_KEY_DOC);
    let notifier = Arc::new(RecordingNotifier::default());
    let adapter = ScriptedAdapter::new().with_date("90002", "02/01/2026");
    let launcher = Arc::new(ScriptedLauncher { adapter: adapter.clone() });
    let mut scheduler = CycleScheduler::new(controller(&doc, &notifier), launcher, Duration::from_millis(5));
    let (_tx, rx) = watch::channel(false);

    let report = scheduler.run_once(rx).await?.expect("cycle should finish");

    assert_eq!(report.outcome, CycleOutcome::Completed);
    assert_eq!(adapter.count("launch"), 1);
    assert_eq!(adapter.count("close"), 1);
    assert_eq!(adapter.calls().last().map(String::as_str), Some("close"));

    let stats = scheduler.get_stats();
    assert_eq!(stats.cycles_run, 1);
    assert_eq!(stats.improvements, 1);
    assert_eq!(notifier.events().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_failed_cycle_still_closes_session() -> anyhow::Result<()> {
    let doc = TestDocument::new(TWO_KEY_DOC);
    let notifier = Arc::new(RecordingNotifier::default());
    let adapter = ScriptedAdapter::new().with_sign_ins(&[false]);
    let launcher = Arc::new(ScriptedLauncher { adapter: adapter.clone() });
    let mut scheduler = CycleScheduler::new(controller(&doc, &notifier), launcher, Duration::from_millis(5));
    let (_tx, rx) = watch::channel(false);

    let report = scheduler.run_once(rx).await?.expect("cycle should finish");

    assert!(!report.outcome.is_success());
    assert_eq!(adapter.count("close"), 1);
    let stats = scheduler.get_stats();
    assert_eq!(stats.failed, 1);
    assert!(stats.last_error.unwrap().starts_with("authenticating"));
    Ok(())
}

#[tokio::test]
async fn test_run_repeats_until_shutdown() -> anyhow::Result<()> {
    let doc = TestDocument::new(TWO_KEY_DOC);
    let adapter = ScriptedAdapter::new();
    let launcher = Arc::new(ScriptedLauncher { adapter: adapter.clone() });
    let controller = appointment_finder::CycleController::new(
        doc.store(),
        Arc::new(PluginManager::new()),
        appointment_finder::CycleTiming::immediate(),
    );
    let mut scheduler = CycleScheduler::new(controller, launcher, Duration::from_millis(5));
    let (tx, rx) = watch::channel(false);

    let stopper = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(60)).await;
        tx.send(true).ok();
        tx
    });
    let stats = scheduler.run(rx).await;
    drop(stopper.await?);

    assert!(stats.cycles_run >= 2);
    assert_eq!(adapter.count("launch"), adapter.count("close"));
    Ok(())
}

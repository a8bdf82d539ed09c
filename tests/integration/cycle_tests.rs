use super::*;
use appointment_finder::{BestResult, CycleOutcome};

#[tokio::test]
async fn test_two_key_cycle_records_best_and_notifies_once() -> anyhow::Result<()> {
    let doc = TestDocument::new(TWO_KEY_DOC);
    let notifier = Arc::new(RecordingNotifier::default());
    let mut controller = controller(&doc, &notifier);
    let mut adapter = ScriptedAdapter::new()
        .with_date("90001", "03/15/2026")
        .with_date("90002", "02/01/2026");

    let report = controller.run_cycle(&mut adapter).await;

    assert_eq!(report.outcome, CycleOutcome::Completed);
    assert_eq!(report.keys_checked, vec!["90001", "90002"]);
    assert_eq!(report.improvement, Some(BestResult::new(date("02/01/2026"), "90002")));
    assert!(report.notified);
    assert!(report.recycled);

    let state = doc.store().read()?;
    assert_eq!(state.pending_keys, vec!["90001", "90002"]);
    assert!(state.checked_keys.is_empty());
    assert_eq!(state.best, Some(BestResult::new(date("02/01/2026"), "90002")));

    let events = notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].key, "90002");
    assert_eq!(events[0].formatted_date(), "02/01/2026");
    assert_eq!(events[0].previous, None);

    assert_eq!(
        adapter.calls(),
        vec![
            "authenticate:A1234567",
            "verify",
            "challenge?",
            "challenge?",
            "search:90001",
            "select",
            "read",
            "back",
            "challenge?",
            "search:90002",
            "select",
            "read",
        ]
    );

    let contents = doc.contents();
    assert!(contents.contains("- Zip Codes: 90001, 90002\n- Zip Codes Checked:\n"));
    assert!(contents.contains("- Found Earliest Availability Date: 02/01/2026\n"));
    assert!(contents.contains("- Found Earliest Availability Zip Code: 90002\n"));
    assert!(contents.starts_with("# Appointment Finder Parameters\n"));
    Ok(())
}

#[tokio::test]
async fn test_failed_search_leaves_key_pending() -> anyhow::Result<()> {
    let doc = TestDocument::new(TWO_KEY_DOC);
    let notifier = Arc::new(RecordingNotifier::default());
    let mut controller = controller(&doc, &notifier);
    let mut adapter = ScriptedAdapter::new()
        .with_failed_search("90001")
        .with_date("90001", "01/05/2026")
        .with_date("90002", "04/01/2026");

    let report = controller.run_cycle(&mut adapter).await;

    assert_eq!(report.outcome, CycleOutcome::Completed);
    assert_eq!(report.keys_skipped, vec!["90001"]);
    assert!(!report.recycled);

    let state = doc.store().read()?;
    assert_eq!(state.pending_keys, vec!["90001"]);
    assert_eq!(state.checked_keys, vec!["90002"]);

    let events = notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].key, "90002");
    Ok(())
}

#[tokio::test]
async fn test_persistent_challenge_at_start_changes_nothing() -> anyhow::Result<()> {
    let doc = TestDocument::new(TWO_KEY_DOC);
    let before = doc.contents();
    let notifier = Arc::new(RecordingNotifier::default());
    let mut controller = controller(&doc, &notifier);
    let mut adapter = ScriptedAdapter::new()
        .with_challenges(&[true, true])
        .with_date("90001", "01/05/2026");

    let report = controller.run_cycle(&mut adapter).await;

    assert!(!report.outcome.is_success());
    assert_eq!(doc.contents(), before);
    assert_eq!(adapter.count("search"), 0);
    assert_eq!(adapter.count("reload"), 1);
    assert!(notifier.events().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_challenge_on_a_key_skips_only_that_key() -> anyhow::Result<()> {
    let doc = TestDocument::new(TWO_KEY_DOC);
    let notifier = Arc::new(RecordingNotifier::default());
    let mut controller = controller(&doc, &notifier);
    // start of cycle, first key, then the second key twice (detect + re-check)
    let mut adapter = ScriptedAdapter::new().with_challenges(&[false, false, true, true]);

    let report = controller.run_cycle(&mut adapter).await;

    assert_eq!(report.outcome, CycleOutcome::Completed);
    assert_eq!(report.keys_checked, vec!["90001"]);
    assert_eq!(report.keys_skipped, vec!["90002"]);

    let state = doc.store().read()?;
    assert_eq!(state.pending_keys, vec!["90002"]);
    assert_eq!(state.checked_keys, vec!["90001"]);
    Ok(())
}

#[tokio::test]
async fn test_later_date_does_not_replace_best() -> anyhow::Result<()> {
    let doc = TestDocument::new(&TWO_KEY_DOC.replace(
        "- Found Earliest Availability Date:\n- Found Earliest Availability Zip Code:\n",
        "- Found Earliest Availability Date: 01/10/2026\n- Found Earliest Availability Zip Code: 94103\n",
    ));
    let notifier = Arc::new(RecordingNotifier::default());
    let mut controller = controller(&doc, &notifier);
    let mut adapter = ScriptedAdapter::new()
        .with_date("90001", "01/10/2026")
        .with_date("90002", "03/01/2026");

    let report = controller.run_cycle(&mut adapter).await;

    assert_eq!(report.outcome, CycleOutcome::Completed);
    assert!(report.improvement.is_none());
    assert!(!report.notified);
    assert!(notifier.events().is_empty());
    assert_eq!(
        doc.store().read()?.best,
        Some(BestResult::new(date("01/10/2026"), "94103"))
    );
    Ok(())
}

#[tokio::test]
async fn test_notification_carries_previous_best() -> anyhow::Result<()> {
    let doc = TestDocument::new(&TWO_KEY_DOC.replace(
        "- Found Earliest Availability Date:\n- Found Earliest Availability Zip Code:\n",
        "- Found Earliest Availability Date: 05/01/2026\n- Found Earliest Availability Zip Code: 94103\n",
    ));
    let notifier = Arc::new(RecordingNotifier::default());
    let mut controller = controller(&doc, &notifier);
    let mut adapter = ScriptedAdapter::new()
        .with_date("90001", "04/01/2026")
        .with_date("90002", "04/15/2026");

    controller.run_cycle(&mut adapter).await;

    let events = notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].key, "90001");
    assert_eq!(events[0].previous, Some(BestResult::new(date("05/01/2026"), "94103")));
    assert_eq!(doc.store().read()?.best, Some(BestResult::new(date("04/01/2026"), "90001")));
    Ok(())
}

#[tokio::test]
async fn test_back_failure_recovers_by_signing_in_again() -> anyhow::Result<()> {
    let doc = TestDocument::new(TWO_KEY_DOC);
    let notifier = Arc::new(RecordingNotifier::default());
    let mut controller = controller(&doc, &notifier);
    let mut adapter = ScriptedAdapter::new().with_failed_back("90001");

    let report = controller.run_cycle(&mut adapter).await;

    assert_eq!(report.outcome, CycleOutcome::Completed);
    assert_eq!(report.keys_checked, vec!["90001", "90002"]);
    assert_eq!(adapter.count("authenticate"), 2);
    assert_eq!(adapter.count("verify"), 2);
    assert!(report.recycled);
    Ok(())
}

#[tokio::test]
async fn test_aborted_cycle_resumes_with_remaining_keys() -> anyhow::Result<()> {
    let doc = TestDocument::new(&TWO_KEY_DOC.replace("90001, 90002", "90001, 90002, 90003"));
    let notifier = Arc::new(RecordingNotifier::default());
    let mut controller = controller(&doc, &notifier);

    let mut first = ScriptedAdapter::new()
        .with_failed_back("90001")
        .with_sign_ins(&[true, false]);
    let report = controller.run_cycle(&mut first).await;

    assert!(!report.outcome.is_success());
    let state = doc.store().read()?;
    assert_eq!(state.pending_keys, vec!["90002", "90003"]);
    assert_eq!(state.checked_keys, vec!["90001"]);

    let mut second = ScriptedAdapter::new().with_date("90003", "02/02/2026");
    let report = controller.run_cycle(&mut second).await;

    assert_eq!(report.outcome, CycleOutcome::Completed);
    assert_eq!(report.keys_checked, vec!["90002", "90003"]);
    assert_eq!(second.count("search:90001"), 0);

    let state = doc.store().read()?;
    assert_eq!(state.pending_keys, vec!["90001", "90002", "90003"]);
    assert!(state.checked_keys.is_empty());
    assert_eq!(notifier.events().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_notifier_failure_does_not_fail_cycle() -> anyhow::Result<()> {
    let doc = TestDocument::new(TWO_KEY_DOC);
    let notifier = Arc::new(RecordingNotifier::failing());
    let mut controller = controller(&doc, &notifier);
    let mut adapter = ScriptedAdapter::new().with_date("90002", "02/01/2026");

    let report = controller.run_cycle(&mut adapter).await;

    assert_eq!(report.outcome, CycleOutcome::Completed);
    assert!(!report.notified);
    assert_eq!(notifier.events().len(), 1);
    assert_eq!(doc.store().read()?.best.map(|b| b.key), Some("90002".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_drained_document_is_recycled_without_a_session() -> anyhow::Result<()> {
    let doc = TestDocument::new(&TWO_KEY_DOC.replace(
        "- Zip Codes: 90001, 90002\n- Zip Codes Checked:\n",
        "- Zip Codes:\n- Zip Codes Checked: 90001, 90002\n",
    ));
    let notifier = Arc::new(RecordingNotifier::default());
    let mut controller = controller(&doc, &notifier);
    let mut adapter = ScriptedAdapter::new();

    let report = controller.run_cycle(&mut adapter).await;

    assert_eq!(report.outcome, CycleOutcome::Exhausted);
    assert!(adapter.calls().is_empty());
    let state = doc.store().read()?;
    assert_eq!(state.pending_keys, vec!["90001", "90002"]);
    assert!(state.checked_keys.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_missing_credentials_fail_the_cycle() -> anyhow::Result<()> {
    let doc = TestDocument::new(&TWO_KEY_DOC.replace("A1234567", ""));
    let before = doc.contents();
    let notifier = Arc::new(RecordingNotifier::default());
    let mut controller = controller(&doc, &notifier);
    let mut adapter = ScriptedAdapter::new();

    let report = controller.run_cycle(&mut adapter).await;

    match report.outcome {
        CycleOutcome::Failed { reason, .. } => assert!(reason.contains("Permit Number")),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(adapter.calls().is_empty());
    assert_eq!(doc.contents(), before);
    Ok(())
}

//! End-to-end pipeline tests over an in-memory store and document source.

use std::time::Duration;

use billserve_core::{bill::NewBill, store::BillStore};
use chrono::{TimeZone, Utc};
use uuid::Uuid;

use crate::{
  Chain, Scheduler, Task, TaskOutput, TaskRecord, TaskState,
  testing::{HR996, S534, StaticSource, config, start, url},
};

async fn idle(scheduler: &Scheduler) {
  tokio::time::timeout(Duration::from_secs(10), scheduler.registry().wait_idle())
    .await
    .expect("pipeline went idle");
}

fn records_of(scheduler: &Scheduler, kind: &str) -> Vec<TaskRecord> {
  scheduler
    .registry()
    .list()
    .into_iter()
    .filter(|r| r.task.kind() == kind)
    .collect()
}

fn both_bills() -> StaticSource {
  StaticSource::new([(url(115, "HR", 996), HR996.to_vec()), (url(115, "S", 534), S534.to_vec())])
}

// ─── Single documents ────────────────────────────────────────────────────────

#[tokio::test]
async fn ingest_builds_graph_and_symmetric_related_bills() {
  let source = both_bills();
  let (store, handle) = start(source.clone(), config(4)).await;
  let scheduler = handle.scheduler();

  let task_id = scheduler.ingest_document(url(115, "HR", 996));
  idle(scheduler).await;

  let record = scheduler.registry().get(task_id).unwrap();
  let TaskState::Succeeded { output: TaskOutput::Bill { bill_id } } = record.state else {
    panic!("populate did not succeed: {:?}", record.state);
  };

  let bill = store.get_bill(bill_id).await.unwrap().unwrap();
  assert_eq!(bill.url, url(115, "HR", 996));
  assert_eq!((bill.congress, bill.bill_type.as_str(), bill.number), (115, "HR", 996));
  assert_eq!(bill.title, "Small Business Tax Relief Act");
  assert!(bill.last_modified.is_some());
  assert_eq!(bill.cbo_cost_estimate.as_deref(), Some("https://www.cbo.gov/publication/52400"));
  assert!(bill.policy_area_id.is_some());
  let house = store.find_chamber("House".into()).await.unwrap().unwrap();
  assert_eq!(bill.origin_chamber_id, Some(house.chamber_id));

  let sponsors = store.sponsors(bill_id).await.unwrap();
  assert_eq!(sponsors.len(), 1);
  assert_eq!(sponsors[0].full_name(), "Peter King");
  assert_eq!(sponsors[0].seat.discriminant(), "representative");

  let cosponsorships = store.cosponsorships(bill_id).await.unwrap();
  assert_eq!(cosponsorships.len(), 2);
  assert_eq!(cosponsorships.iter().filter(|c| c.is_original).count(), 1);
  assert_eq!(store.cosponsors(bill_id).await.unwrap().len(), 2);

  assert_eq!(store.bill_subjects(bill_id).await.unwrap().len(), 2);
  assert_eq!(store.bill_committees(bill_id).await.unwrap().len(), 1);
  assert_eq!(store.summaries(bill_id).await.unwrap().len(), 1);

  let actions = store.actions(bill_id).await.unwrap();
  let committee = store.find_committee("hswm00".into()).await.unwrap().unwrap();
  assert_eq!(actions.len(), 1);
  assert_eq!(actions[0].committee_id, Some(committee.committee_id));

  let related = store.related_bills(bill_id).await.unwrap();
  assert_eq!(related.len(), 1);
  assert_eq!(related[0].url, url(115, "S", 534));

  let back = store.related_bills(related[0].bill_id).await.unwrap();
  assert_eq!(back.len(), 1);
  assert_eq!(back[0].bill_id, bill_id);

  // The second bill's reference back is absorbed by the URL key.
  assert_eq!(source.fetch_count(&url(115, "HR", 996)), 1);
  assert_eq!(source.fetch_count(&url(115, "S", 534)), 1);

  let links = records_of(scheduler, "link_related_bill");
  assert_eq!(links.len(), 2);
  assert!(links.iter().all(|r| matches!(r.state, TaskState::Succeeded { .. })));
  assert!(links.iter().all(|r| r.after.is_some()));
}

#[tokio::test]
async fn reingesting_known_url_does_not_fetch() {
  let source = both_bills();
  let (store, handle) = start(source.clone(), config(2)).await;
  let scheduler = handle.scheduler();

  scheduler.ingest_document(url(115, "HR", 996));
  idle(scheduler).await;
  scheduler.ingest_document(url(115, "HR", 996));
  idle(scheduler).await;

  assert_eq!(source.fetch_count(&url(115, "HR", 996)), 1);
  let bill = store.find_bill_by_url(url(115, "HR", 996)).await.unwrap().unwrap();
  assert_eq!(store.cosponsors(bill.bill_id).await.unwrap().len(), 2);
  assert_eq!(store.related_bills(bill.bill_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn unfetchable_related_bill_leaves_primary_intact() {
  let source = StaticSource::new([(url(115, "HR", 996), HR996.to_vec())]);
  let (store, handle) = start(source, config(2)).await;
  let scheduler = handle.scheduler();

  scheduler.ingest_document(url(115, "HR", 996));
  idle(scheduler).await;

  let bill = store.find_bill_by_url(url(115, "HR", 996)).await.unwrap().unwrap();
  assert_eq!(store.sponsors(bill.bill_id).await.unwrap().len(), 1);
  assert!(store.related_bills(bill.bill_id).await.unwrap().is_empty());

  let failed = records_of(scheduler, "populate")
    .into_iter()
    .find(|r| r.task == Task::Populate { url: url(115, "S", 534) })
    .unwrap();
  let TaskState::Failed { error } = failed.state else { panic!("expected failure") };
  assert!(error.contains("fetching"), "{error}");
  assert!(error.contains("404"), "{error}");

  // The link step never ran.
  assert!(records_of(scheduler, "link_related_bill").is_empty());
}

#[tokio::test]
async fn malformed_document_fails_without_writing() {
  let bad = url(115, "HR", 1);
  let source = StaticSource::new([(bad.clone(), b"<billStatus><bill><title>x</title></bill></billStatus>".to_vec())]);
  let (store, handle) = start(source, config(1)).await;
  let scheduler = handle.scheduler();

  let id = scheduler.ingest_document(bad.clone());
  idle(scheduler).await;

  let TaskState::Failed { error } = scheduler.registry().get(id).unwrap().state else {
    panic!("expected failure");
  };
  assert!(error.contains("normalizing"), "{error}");
  assert!(error.contains("missing required fields"), "{error}");
  assert!(store.find_bill_by_url(bad).await.unwrap().is_none());
}

/// HR 996 with its action pointing at a subcommittee the document does not
/// list among its committees.
fn hr996_with_subcommittee_action() -> Vec<u8> {
  let text = std::str::from_utf8(HR996).unwrap();
  let action_code = text.rfind("<systemCode>hswm00</systemCode>").unwrap();
  let mut edited = text.to_owned();
  edited.replace_range(
    action_code..action_code + "<systemCode>hswm00</systemCode>".len(),
    "<systemCode>hswm01</systemCode>",
  );
  edited.into_bytes()
}

#[tokio::test]
async fn unknown_action_committee_skips_only_the_action() {
  let source = StaticSource::new([
    (url(115, "HR", 996), hr996_with_subcommittee_action()),
    (url(115, "S", 534), S534.to_vec()),
  ]);
  let (store, handle) = start(source.clone(), config(2)).await;
  let scheduler = handle.scheduler();

  let id = scheduler.ingest_document(url(115, "HR", 996));
  idle(scheduler).await;

  let TaskState::Succeeded { output: TaskOutput::Bill { bill_id } } =
    scheduler.registry().get(id).unwrap().state
  else {
    panic!("populate did not succeed");
  };
  let bill = store.get_bill(bill_id).await.unwrap().unwrap();
  assert!(bill.is_ingested());

  assert!(store.actions(bill_id).await.unwrap().is_empty());
  assert_eq!(store.sponsors(bill_id).await.unwrap().len(), 1);
  assert_eq!(store.cosponsors(bill_id).await.unwrap().len(), 2);
  assert_eq!(store.bill_committees(bill_id).await.unwrap().len(), 1);
  assert!(store.find_committee("hswm01".into()).await.unwrap().is_none());

  // Related bills are still scheduled and linked both ways.
  let related = store.related_bills(bill_id).await.unwrap();
  assert_eq!(related.len(), 1);
  assert_eq!(related[0].url, url(115, "S", 534));
  assert_eq!(store.related_bills(related[0].bill_id).await.unwrap().len(), 1);

  scheduler.ingest_document(url(115, "HR", 996));
  idle(scheduler).await;
  assert_eq!(source.fetch_count(&url(115, "HR", 996)), 1);
}

#[tokio::test]
async fn interrupted_ingestion_is_resumed() {
  let source = both_bills();
  let (store, handle) = start(source.clone(), config(2)).await;
  let scheduler = handle.scheduler();

  // A bill row left behind by a run that stopped before its relations.
  let stranded = store
    .get_or_create_bill(NewBill {
      url:               url(115, "HR", 996),
      bill_type:         "HR".into(),
      number:            996,
      title:             "Small Business Tax Relief Act".into(),
      congress:          115,
      introduced_at:     Utc.with_ymd_and_hms(2017, 2, 7, 0, 0, 0).unwrap(),
      last_modified:     None,
      origin_chamber_id: None,
      cbo_cost_estimate: None,
      policy_area_id:    None,
    })
    .await
    .unwrap()
    .value;
  assert!(!stranded.is_ingested());

  let id = scheduler.ingest_document(url(115, "HR", 996));
  idle(scheduler).await;

  let record = scheduler.registry().get(id).unwrap();
  assert_eq!(record.state, TaskState::Succeeded { output: TaskOutput::Bill { bill_id: stranded.bill_id } });
  assert_eq!(source.fetch_count(&url(115, "HR", 996)), 1);

  let bill = store.get_bill(stranded.bill_id).await.unwrap().unwrap();
  assert!(bill.is_ingested());
  assert_eq!(store.sponsors(bill.bill_id).await.unwrap().len(), 1);
  assert_eq!(store.cosponsorships(bill.bill_id).await.unwrap().len(), 2);
  assert_eq!(store.related_bills(bill.bill_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_populates_of_one_url_share_a_bill() {
  let source = both_bills();
  let (store, handle) = start(source, config(4)).await;
  let scheduler = handle.scheduler();

  let first = scheduler.ingest_document(url(115, "HR", 996));
  let second = scheduler.ingest_document(url(115, "HR", 996));
  idle(scheduler).await;

  let bill_of = |id| match scheduler.registry().get(id).unwrap().state {
    TaskState::Succeeded { output: TaskOutput::Bill { bill_id } } => bill_id,
    other => panic!("populate did not succeed: {other:?}"),
  };
  let bill_id = bill_of(first);
  assert_eq!(bill_of(second), bill_id);

  assert_eq!(store.sponsors(bill_id).await.unwrap().len(), 1);
  assert_eq!(store.cosponsorships(bill_id).await.unwrap().len(), 2);
  assert_eq!(store.summaries(bill_id).await.unwrap().len(), 1);
  assert_eq!(store.actions(bill_id).await.unwrap().len(), 1);
  assert_eq!(store.bill_subjects(bill_id).await.unwrap().len(), 2);
  assert_eq!(store.related_bills(bill_id).await.unwrap().len(), 1);
  for subject in store.bill_subjects(bill_id).await.unwrap() {
    let bills = store.subject_bills(subject.subject_id).await.unwrap();
    assert_eq!(bills.iter().filter(|b| b.url == url(115, "HR", 996)).count(), 1);
  }
}

// ─── Substrate behaviour ─────────────────────────────────────────────────────

#[tokio::test]
async fn transport_failures_are_retried() {
  let mut cfg = config(1);
  cfg.task_retries = 2;
  let source = StaticSource::default();
  let (_store, handle) = start(source.clone(), cfg).await;
  let scheduler = handle.scheduler();

  let missing = url(115, "HR", 404);
  let id = scheduler.ingest_document(missing.clone());
  idle(scheduler).await;

  let record = scheduler.registry().get(id).unwrap();
  assert!(matches!(record.state, TaskState::Failed { .. }));
  assert_eq!(record.attempts, 3);
  assert_eq!(source.fetch_count(&missing), 3);
}

#[tokio::test]
async fn chain_link_rejects_unexpected_input() {
  let (_store, handle) = start(StaticSource::default(), config(1)).await;
  let scheduler = handle.scheduler();

  scheduler.submit(
    Chain::new(Task::RebuildAggregation).then(Task::LinkRelatedBill { bill_id: Uuid::new_v4() }),
  );
  idle(scheduler).await;

  let links = records_of(scheduler, "link_related_bill");
  let link = &links[0];
  let TaskState::Failed { error } = &link.state else { panic!("expected failure") };
  assert!(error.contains("chain input"), "{error}");
  assert_eq!(link.attempts, 1);
}

// ─── Bulk runs ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn bulk_run_ingests_manifest_then_rebuilds() {
  let manifest_url = "https://www.govinfo.gov/bulkdata/json/BILLSTATUS/115/hr".to_owned();
  let manifest = serde_json::json!({
    "files": [{ "link": url(115, "HR", 996) }, { "link": url(115, "S", 534) }]
  });
  let source = StaticSource::new([
    (url(115, "HR", 996), HR996.to_vec()),
    (url(115, "S", 534), S534.to_vec()),
    (manifest_url.clone(), manifest.to_string().into_bytes()),
  ]);
  // One worker keeps queue order deterministic.
  let (store, handle) = start(source, config(1)).await;
  let scheduler = handle.scheduler();

  let bulk_id = scheduler.bulk_ingest_from_manifest(manifest_url.clone());
  idle(scheduler).await;

  let TaskState::Succeeded { output } = scheduler.registry().get(bulk_id).unwrap().state else {
    panic!("bulk run failed");
  };
  assert_eq!(output, TaskOutput::Bulk { discovered: 2, skipped: 0, succeeded: 2, failed: 0 });

  let rebuilds = records_of(scheduler, "rebuild_aggregation");
  let rebuild = &rebuilds[0];
  assert_eq!(rebuild.after, Some(bulk_id));
  assert_eq!(rebuild.state, TaskState::Succeeded { output: TaskOutput::Rebuilt { subjects: 2 } });

  let small_business = store.get_or_create_subject("Small business".into()).await.unwrap().value;
  let splits = store.support_splits().await.unwrap();
  let split = splits.iter().find(|s| s.subject_id == small_business.subject_id).unwrap();
  // King (R), Maloney (D), Zeldin (R) on HR 996; Sanders (I) on S 534.
  assert_eq!((split.red_count, split.blue_count, split.white_count), (2, 1, 1));

  // A second run skips everything already stored and rebuilds identically.
  let again = scheduler.bulk_ingest_from_manifest(manifest_url);
  idle(scheduler).await;
  let TaskState::Succeeded { output } = scheduler.registry().get(again).unwrap().state else {
    panic!("second bulk run failed");
  };
  assert_eq!(output, TaskOutput::Bulk { discovered: 2, skipped: 2, succeeded: 0, failed: 0 });
  assert_eq!(store.support_splits().await.unwrap(), splits);
}

#[tokio::test]
async fn bulk_run_counts_failed_documents_and_still_rebuilds() {
  let manifest_url = "https://m/manifest.json".to_owned();
  let manifest = serde_json::json!({
    "files": [{ "link": url(115, "S", 534) }, { "link": url(115, "HR", 7) }]
  });
  let source = StaticSource::new([
    (url(115, "S", 534), S534.to_vec()),
    (manifest_url.clone(), manifest.to_string().into_bytes()),
  ]);
  let (_store, handle) = start(source, config(2)).await;
  let scheduler = handle.scheduler();

  let bulk_id = scheduler.bulk_ingest_from_manifest(manifest_url);
  idle(scheduler).await;

  let TaskState::Succeeded { output } = scheduler.registry().get(bulk_id).unwrap().state else {
    panic!("bulk run failed");
  };
  assert_eq!(output, TaskOutput::Bulk { discovered: 2, skipped: 0, succeeded: 1, failed: 1 });
  assert!(matches!(
    records_of(scheduler, "rebuild_aggregation")[0].state,
    TaskState::Succeeded { .. }
  ));
}

#[tokio::test]
async fn unreadable_manifest_fails_bulk_and_skips_rebuild() {
  let (_store, handle) = start(StaticSource::default(), config(1)).await;
  let scheduler = handle.scheduler();

  let bulk_id = scheduler.bulk_ingest_from_manifest("https://m/none.json");
  idle(scheduler).await;

  assert!(matches!(scheduler.registry().get(bulk_id).unwrap().state, TaskState::Failed { .. }));
  assert!(records_of(scheduler, "rebuild_aggregation").is_empty());
}

//! Ingestion of a single bill status document.
//!
//! A document moves through [`Stage`]s in order; a failure is reported with
//! the stage it happened in. A sub-record that cannot be stored (an unknown
//! committee on an action, an unknown state on a cosponsor) is logged and
//! skipped; the rest of the document still lands.
//!
//! A bill is stamped as ingested only after its relations are persisted, so
//! an interrupted ingestion is resumed by the next populate of the same URL.
//! Related bills are never fetched inline: each one is queued as a populate
//! chained to a link back to this bill, and repeat visits are absorbed by the
//! URL natural key.

use billserve_core::{
  Upserted,
  bill::{Bill, NewBill},
  normalize::{BILL_FIELDS, RELATED_BILL_FIELDS, Record, seq_at},
  store::BillStore,
};
use billserve_govinfo::{DocumentSource, xml};
use chrono::Utc;
use serde_json::Value;
use tracing::{Instrument as _, debug, info, info_span, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  error::Stage,
  pipeline::Pipeline,
  tasks::{Chain, Task},
  upsert::{self, DATE_FORMAT, TIMESTAMP_FORMAT, parse_date, parse_number},
};

const DOCUMENT_WRAPPER: &str = "billStatus";
const BILL_WRAPPER: &str = "bill";

fn staged<E: Into<Error>>(url: &str, stage: Stage) -> impl FnOnce(E) -> Error + '_ {
  move |err| Error::Stage { url: url.to_owned(), stage, source: Box::new(err.into()) }
}

/// Pass a sub-record's result through, or log and count it when the failure
/// is confined to that record.
fn keep<T>(entity: &'static str, result: Result<T>, skipped: &mut usize) -> Result<Option<T>> {
  match result {
    Ok(value) => Ok(Some(value)),
    Err(e) if e.is_record_scoped() => {
      warn!(entity, error = %e, "skipping record");
      *skipped += 1;
      Ok(None)
    }
    Err(e) => Err(e),
  }
}

/// Extract and validate the bill record from a raw status document.
pub fn bill_record(document: &[u8]) -> Result<Record> {
  let tree = xml::parse_document(document)?;
  let bill = tree
    .get(DOCUMENT_WRAPPER)
    .and_then(|status| status.get(BILL_WRAPPER))
    .cloned()
    .ok_or_else(|| Error::MalformedInput(format!("missing {DOCUMENT_WRAPPER}.{BILL_WRAPPER}")))?;
  Ok(Record::new(bill, BILL_FIELDS)?.cleaned())
}

impl<S, F> Pipeline<S, F>
where
  S: BillStore + 'static,
  F: DocumentSource + 'static,
{
  /// Ingest the document at `url` unless a fully ingested bill with that URL
  /// exists.
  pub(crate) async fn populate(&self, url: &str) -> Result<Uuid> {
    async {
      let known = self
        .store
        .find_bill_by_url(url.to_owned())
        .await
        .map_err(Error::store)?;
      match &known {
        Some(bill) if bill.is_ingested() => {
          debug!("bill already stored");
          return Ok(bill.bill_id);
        }
        Some(_) => info!("resuming interrupted ingestion"),
        None => {}
      }

      debug!(stage = %Stage::Fetching, "entering stage");
      let body = self.source.fetch(url.to_owned()).await.map_err(staged(url, Stage::Fetching))?;

      debug!(stage = %Stage::Normalizing, "entering stage");
      let record = bill_record(&body).map_err(staged(url, Stage::Normalizing))?;

      debug!(stage = %Stage::PersistingCore, "entering stage");
      let bill = self.persist_core(url, &record).await.map_err(staged(url, Stage::PersistingCore))?;
      let bill_id = bill.value.bill_id;

      // A concurrent populate of the same URL may be here too; every relation
      // write below is idempotent.
      debug!(stage = %Stage::PersistingRelations, "entering stage");
      let mut skipped = self
        .persist_relations(bill_id, &record)
        .await
        .map_err(staged(url, Stage::PersistingRelations))?;

      debug!(stage = %Stage::SchedulingRelatedBills, "entering stage");
      let related = self
        .related_urls(&record, &mut skipped)
        .map_err(staged(url, Stage::SchedulingRelatedBills))?;
      self
        .store
        .mark_bill_ingested(bill_id, Utc::now())
        .await
        .map_err(Error::store)
        .map_err(staged(url, Stage::SchedulingRelatedBills))?;
      for related_url in &related {
        debug!(related = %related_url, "scheduling related bill");
        self.scheduler.submit(
          Chain::new(Task::Populate { url: related_url.clone() }).then(Task::LinkRelatedBill { bill_id }),
        );
      }

      info!(stage = %Stage::Done, %bill_id, related = related.len(), skipped, "bill ingested");
      Ok(bill_id)
    }
    .instrument(info_span!("ingest", url))
    .await
  }

  async fn persist_core(&self, url: &str, record: &Record) -> Result<Upserted<Bill>> {
    let store = &*self.store;

    let origin_chamber_id = match record.opt_text("originChamber")? {
      Some(name) => Some(upsert::require_chamber(store, name).await?),
      None => None,
    };
    let policy_area = upsert::upsert_policy_area(store, record.get("policyArea")).await?;
    let last_modified = record
      .opt_text("updateDate")?
      .map(|ts| parse_date("updateDate", ts, TIMESTAMP_FORMAT))
      .transpose()?;
    let cbo_cost_estimate = record
      .seq("cboCostEstimates")?
      .first()
      .and_then(|estimate| estimate.get("url"))
      .and_then(Value::as_str)
      .map(str::to_owned);

    let bill = store
      .get_or_create_bill(NewBill {
        url: url.to_owned(),
        bill_type: record.text("billType")?.to_owned(),
        number: parse_number("billNumber", record.text("billNumber")?)?,
        title: record.text("title")?.to_owned(),
        congress: parse_number("congress", record.text("congress")?)?,
        introduced_at: parse_date("introducedDate", record.text("introducedDate")?, DATE_FORMAT)?,
        last_modified,
        origin_chamber_id,
        cbo_cost_estimate,
        policy_area_id: policy_area.map(|area| area.value.policy_area_id),
      })
      .await
      .map_err(Error::store)?;
    debug!(bill_id = %bill.value.bill_id, created = bill.created, "bill resolved");
    Ok(bill)
  }

  /// Sponsors, cosponsors, summaries, subjects, committees, then actions
  /// (which may refer to those committees). Returns how many sub-records
  /// were skipped.
  async fn persist_relations(&self, bill_id: Uuid, record: &Record) -> Result<usize> {
    let store = &*self.store;
    let mut skipped = 0;

    for sponsor in record.seq("sponsors")? {
      let legislator = upsert::upsert_legislator(store, sponsor).await;
      if let Some(legislator) = keep("sponsor", legislator, &mut skipped)? {
        store
          .add_sponsor(bill_id, legislator.value.legislator_id)
          .await
          .map_err(Error::store)?;
      }
    }

    for cosponsor in record.seq("cosponsors")? {
      let cosponsorship = upsert::upsert_cosponsorship(store, bill_id, cosponsor).await;
      keep("cosponsorship", cosponsorship, &mut skipped)?;
    }

    let summaries = record.path("summaries", &["billSummaries"]);
    for summary in seq_at(summaries, "summaries.billSummaries")? {
      keep("summary", upsert::upsert_summary(store, bill_id, summary).await, &mut skipped)?;
    }

    let subjects = record.path("subjects", &["billSubjects", "legislativeSubjects"]);
    for subject in seq_at(subjects, "subjects.billSubjects.legislativeSubjects")? {
      let subject = upsert::upsert_subject(store, Some(subject)).await;
      if let Some(Some(subject)) = keep("subject", subject, &mut skipped)? {
        store
          .add_bill_subject(bill_id, subject.value.subject_id)
          .await
          .map_err(Error::store)?;
      }
    }

    let committees = record.path("committees", &["billCommittees"]);
    for committee in seq_at(committees, "committees.billCommittees")? {
      let committee = upsert::upsert_committee(store, committee).await;
      if let Some(committee) = keep("committee", committee, &mut skipped)? {
        store
          .add_bill_committee(bill_id, committee.value.committee_id)
          .await
          .map_err(Error::store)?;
      }
    }

    for action in record.seq("actions")? {
      keep("action", upsert::upsert_action(store, bill_id, action).await, &mut skipped)?;
    }
    Ok(skipped)
  }

  /// Document URLs of every well-formed related-bill reference.
  fn related_urls(&self, record: &Record, skipped: &mut usize) -> Result<Vec<String>> {
    let mut urls = Vec::new();
    for related in record.seq("relatedBills")? {
      let url = Record::new(related.clone(), RELATED_BILL_FIELDS)
        .map_err(Error::from)
        .and_then(|related| {
          Ok(self.locator.document_url(
            parse_number("congress", related.text("congress")?)?,
            related.text("type")?,
            parse_number("number", related.text("number")?)?,
          ))
        });
      urls.extend(keep("related bill", url, skipped)?);
    }
    Ok(urls)
  }
}

//! The `BillStore` trait.
//!
//! The trait is implemented by storage backends (e.g.
//! `billserve-store-sqlite`). The ingestion pipeline depends on this
//! abstraction, not on any concrete backend.
//!
//! Every `get_or_create_*` method looks up the entity's natural key first and
//! only inserts on a miss. Backends must enforce each natural key with a
//! uniqueness constraint and treat a rejected insert as "already exists,
//! re-read", so concurrent first-time writers converge on one row.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  Upserted,
  bill::{
    Action, Bill, BillSummary, Committee, Cosponsorship, LegislativeSubject, NewAction, NewBill,
    NewBillSummary, NewCommittee, NewCosponsorship, PolicyArea,
  },
  legislator::{Chamber, District, Legislator, NewLegislator, Party, State},
  party::SupportSplit,
};

/// Abstraction over a billserve graph backend.
///
/// All methods return `Send` futures so the trait can be used from a
/// multi-threaded worker pool.
pub trait BillStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Reference data ────────────────────────────────────────────────────

  fn find_state(
    &self,
    abbreviation: String,
  ) -> impl Future<Output = Result<Option<State>, Self::Error>> + Send + '_;

  fn find_party(
    &self,
    abbreviation: String,
  ) -> impl Future<Output = Result<Option<Party>, Self::Error>> + Send + '_;

  fn find_chamber(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Option<Chamber>, Self::Error>> + Send + '_;

  fn get_or_create_district(
    &self,
    state_id: Uuid,
    number: u32,
  ) -> impl Future<Output = Result<Upserted<District>, Self::Error>> + Send + '_;

  // ── Legislators ───────────────────────────────────────────────────────

  fn get_or_create_legislator(
    &self,
    input: NewLegislator,
  ) -> impl Future<Output = Result<Upserted<Legislator>, Self::Error>> + Send + '_;

  fn get_legislator(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Legislator>, Self::Error>> + Send + '_;

  // ── Bills ─────────────────────────────────────────────────────────────

  fn get_or_create_bill(
    &self,
    input: NewBill,
  ) -> impl Future<Output = Result<Upserted<Bill>, Self::Error>> + Send + '_;

  fn get_bill(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Bill>, Self::Error>> + Send + '_;

  fn find_bill_by_url(
    &self,
    url: String,
  ) -> impl Future<Output = Result<Option<Bill>, Self::Error>> + Send + '_;

  /// Stamp a bill as fully ingested. The first stamp wins; later calls are
  /// no-ops.
  fn mark_bill_ingested(
    &self,
    bill_id: Uuid,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Attach a sponsor; attaching twice is a no-op.
  fn add_sponsor(
    &self,
    bill_id: Uuid,
    legislator_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn add_bill_subject(
    &self,
    bill_id: Uuid,
    subject_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn add_bill_committee(
    &self,
    bill_id: Uuid,
    committee_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Record that `a` and `b` are related, in both directions.
  fn link_related_bills(
    &self,
    a: Uuid,
    b: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn sponsors(
    &self,
    bill_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Legislator>, Self::Error>> + Send + '_;

  fn cosponsorships(
    &self,
    bill_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Cosponsorship>, Self::Error>> + Send + '_;

  /// One legislator per cosponsorship row of the bill.
  fn cosponsors(
    &self,
    bill_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Legislator>, Self::Error>> + Send + '_;

  fn bill_subjects(
    &self,
    bill_id: Uuid,
  ) -> impl Future<Output = Result<Vec<LegislativeSubject>, Self::Error>> + Send + '_;

  fn bill_committees(
    &self,
    bill_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Committee>, Self::Error>> + Send + '_;

  fn summaries(
    &self,
    bill_id: Uuid,
  ) -> impl Future<Output = Result<Vec<BillSummary>, Self::Error>> + Send + '_;

  fn actions(
    &self,
    bill_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Action>, Self::Error>> + Send + '_;

  fn related_bills(
    &self,
    bill_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Bill>, Self::Error>> + Send + '_;

  // ── Taxonomy ──────────────────────────────────────────────────────────

  fn get_or_create_policy_area(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Upserted<PolicyArea>, Self::Error>> + Send + '_;

  fn get_or_create_subject(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Upserted<LegislativeSubject>, Self::Error>> + Send + '_;

  fn list_subjects(
    &self,
  ) -> impl Future<Output = Result<Vec<LegislativeSubject>, Self::Error>> + Send + '_;

  fn subject_bills(
    &self,
    subject_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Bill>, Self::Error>> + Send + '_;

  /// Keyed by system code; an existing committee has its name, type and
  /// chamber refreshed and is reported as not created.
  fn update_or_create_committee(
    &self,
    input: NewCommittee,
  ) -> impl Future<Output = Result<Upserted<Committee>, Self::Error>> + Send + '_;

  fn find_committee(
    &self,
    system_code: String,
  ) -> impl Future<Output = Result<Option<Committee>, Self::Error>> + Send + '_;

  // ── Per-bill records ──────────────────────────────────────────────────

  fn get_or_create_summary(
    &self,
    input: NewBillSummary,
  ) -> impl Future<Output = Result<Upserted<BillSummary>, Self::Error>> + Send + '_;

  fn get_or_create_action(
    &self,
    input: NewAction,
  ) -> impl Future<Output = Result<Upserted<Action>, Self::Error>> + Send + '_;

  fn get_or_create_cosponsorship(
    &self,
    input: NewCosponsorship,
  ) -> impl Future<Output = Result<Upserted<Cosponsorship>, Self::Error>> + Send + '_;

  // ── Aggregation ───────────────────────────────────────────────────────

  /// Delete every support split and insert `splits`, atomically.
  fn replace_support_splits(
    &self,
    splits: Vec<SupportSplit>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn support_splits(
    &self,
  ) -> impl Future<Output = Result<Vec<SupportSplit>, Self::Error>> + Send + '_;
}

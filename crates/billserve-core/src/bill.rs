//! Bills and everything hanging off them.
//!
//! Bills, policy areas, subjects and committees are created once and then only
//! gain relations. Summaries, actions and cosponsorships are append-only per
//! distinct natural key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Bill ────────────────────────────────────────────────────────────────────

/// A bill, keyed by the URL of its source status document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bill {
  pub bill_id:           Uuid,
  pub url:               String,
  /// Type code as published (`S`, `HR`, `HJRES`, ...).
  pub bill_type:         String,
  pub number:            u32,
  pub title:             String,
  pub congress:          u32,
  pub introduced_at:     DateTime<Utc>,
  pub last_modified:     Option<DateTime<Utc>>,
  pub origin_chamber_id: Option<Uuid>,
  pub cbo_cost_estimate: Option<String>,
  pub policy_area_id:    Option<Uuid>,
  /// When ingestion finished persisting this bill's relations. A bill
  /// without it was interrupted and is resumed by the next populate.
  pub ingested_at:       Option<DateTime<Utc>>,
}

impl Bill {
  pub fn is_ingested(&self) -> bool { self.ingested_at.is_some() }
}

/// Input to [`crate::store::BillStore::get_or_create_bill`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBill {
  pub url:               String,
  pub bill_type:         String,
  pub number:            u32,
  pub title:             String,
  pub congress:          u32,
  pub introduced_at:     DateTime<Utc>,
  pub last_modified:     Option<DateTime<Utc>>,
  pub origin_chamber_id: Option<Uuid>,
  pub cbo_cost_estimate: Option<String>,
  pub policy_area_id:    Option<Uuid>,
}

// ─── Taxonomy ────────────────────────────────────────────────────────────────

/// Keyed by exact, case-sensitive name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyArea {
  pub policy_area_id: Uuid,
  pub name:           String,
}

/// Keyed by exact, case-sensitive name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegislativeSubject {
  pub subject_id: Uuid,
  pub name:       String,
}

/// A committee, keyed by its stable system code. Name, type and chamber are
/// refreshed whenever the code is seen again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Committee {
  pub committee_id:   Uuid,
  pub system_code:    String,
  pub name:           String,
  pub committee_type: Option<String>,
  pub chamber_id:     Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCommittee {
  pub system_code:    String,
  pub name:           String,
  pub committee_type: Option<String>,
  pub chamber_id:     Uuid,
}

// ─── Per-bill records ────────────────────────────────────────────────────────

/// Content-addressed: `(bill, name, action_date, text, action_description)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillSummary {
  pub summary_id:         Uuid,
  pub bill_id:            Uuid,
  pub name:               String,
  pub action_date:        DateTime<Utc>,
  pub text:               String,
  pub action_description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBillSummary {
  pub bill_id:            Uuid,
  pub name:               String,
  pub action_date:        DateTime<Utc>,
  pub text:               String,
  pub action_description: String,
}

/// Keyed by `(bill, committee-or-none, text, type, date)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
  pub action_id:    Uuid,
  pub bill_id:      Uuid,
  pub committee_id: Option<Uuid>,
  pub text:         String,
  pub action_type:  String,
  pub action_date:  DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAction {
  pub bill_id:      Uuid,
  pub committee_id: Option<Uuid>,
  pub text:         String,
  pub action_type:  String,
  pub action_date:  DateTime<Utc>,
}

/// Join of a legislator and a bill they cosponsor.
///
/// Keyed by `(legislator, bill, is_original, cosponsored_at)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cosponsorship {
  pub cosponsorship_id: Uuid,
  pub legislator_id:    Uuid,
  pub bill_id:          Uuid,
  pub is_original:      bool,
  pub cosponsored_at:   DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCosponsorship {
  pub legislator_id:  Uuid,
  pub bill_id:        Uuid,
  pub is_original:    bool,
  pub cosponsored_at: DateTime<Utc>,
}

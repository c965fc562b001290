//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings and UUIDs as hyphenated
//! lowercase strings. Natural-key lookups compare these encodings directly, so
//! every write goes through the same encoders.

use billserve_core::{
  bill::{Action, Bill, BillSummary, Committee, Cosponsorship, LegislativeSubject, PolicyArea},
  legislator::{Chamber, District, Legislator, Party, Seat, State},
  party::SupportSplit,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Secs, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Column lists ────────────────────────────────────────────────────────────

pub const LEGISLATOR_COLUMNS: &str =
  "legislator_id, kind, first_name, last_name, state_id, party_id, district_id, chamber_id";

pub const BILL_COLUMNS: &str = "bill_id, url, bill_type, number, title, congress, introduced_at, \
                                last_modified, origin_chamber_id, cbo_cost_estimate, policy_area_id, \
                                ingested_at";

pub const COMMITTEE_COLUMNS: &str =
  "committee_id, system_code, name, committee_type, chamber_id";

pub const SUMMARY_COLUMNS: &str =
  "summary_id, bill_id, name, action_date, text, action_description";

pub const ACTION_COLUMNS: &str =
  "action_id, bill_id, committee_id, text, action_type, action_date";

pub const COSPONSORSHIP_COLUMNS: &str =
  "cosponsorship_id, legislator_id, bill_id, is_original, cosponsored_at";

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `states` row.
pub struct RawState {
  pub state_id:     String,
  pub abbreviation: String,
  pub name:         Option<String>,
}

impl RawState {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self { state_id: row.get(0)?, abbreviation: row.get(1)?, name: row.get(2)? })
  }

  pub fn into_state(self) -> Result<State> {
    Ok(State {
      state_id:     decode_uuid(&self.state_id)?,
      abbreviation: self.abbreviation,
      name:         self.name,
    })
  }
}

/// Raw values read from a `parties` or `chambers` row; both are
/// `(id, name, abbreviation)`.
pub struct RawNamed {
  pub id:           String,
  pub name:         String,
  pub abbreviation: String,
}

impl RawNamed {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self { id: row.get(0)?, name: row.get(1)?, abbreviation: row.get(2)? })
  }

  pub fn into_party(self) -> Result<Party> {
    Ok(Party {
      party_id:     decode_uuid(&self.id)?,
      name:         self.name,
      abbreviation: self.abbreviation,
    })
  }

  pub fn into_chamber(self) -> Result<Chamber> {
    Ok(Chamber {
      chamber_id:   decode_uuid(&self.id)?,
      name:         self.name,
      abbreviation: self.abbreviation,
    })
  }
}

pub struct RawDistrict {
  pub district_id: String,
  pub state_id:    String,
  pub number:      u32,
}

impl RawDistrict {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self { district_id: row.get(0)?, state_id: row.get(1)?, number: row.get(2)? })
  }

  pub fn into_district(self) -> Result<District> {
    Ok(District {
      district_id: decode_uuid(&self.district_id)?,
      state_id:    decode_uuid(&self.state_id)?,
      number:      self.number,
    })
  }
}

/// Raw values read from a `legislators` row, in [`LEGISLATOR_COLUMNS`] order.
pub struct RawLegislator {
  pub legislator_id: String,
  pub kind:          String,
  pub first_name:    String,
  pub last_name:     String,
  pub state_id:      String,
  pub party_id:      String,
  pub district_id:   Option<String>,
  pub chamber_id:    Option<String>,
}

impl RawLegislator {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      legislator_id: row.get(0)?,
      kind:          row.get(1)?,
      first_name:    row.get(2)?,
      last_name:     row.get(3)?,
      state_id:      row.get(4)?,
      party_id:      row.get(5)?,
      district_id:   row.get(6)?,
      chamber_id:    row.get(7)?,
    })
  }

  pub fn into_legislator(self) -> Result<Legislator> {
    let party_id = decode_uuid(&self.party_id)?;
    let state_id = decode_uuid(&self.state_id)?;
    let chamber_id = decode_opt_uuid(self.chamber_id)?;

    let seat = match (self.kind.as_str(), self.district_id) {
      ("senator", None) => Seat::Senator { party_id, state_id, chamber_id },
      ("representative", Some(district_id)) => Seat::Representative {
        party_id,
        state_id,
        district_id: decode_uuid(&district_id)?,
        chamber_id,
      },
      (other, _) => return Err(Error::UnknownLegislatorKind(other.to_owned())),
    };

    Ok(Legislator {
      legislator_id: decode_uuid(&self.legislator_id)?,
      first_name: self.first_name,
      last_name: self.last_name,
      seat,
    })
  }
}

/// Raw values read from a `bills` row, in [`BILL_COLUMNS`] order.
pub struct RawBill {
  pub bill_id:           String,
  pub url:               String,
  pub bill_type:         String,
  pub number:            u32,
  pub title:             String,
  pub congress:          u32,
  pub introduced_at:     String,
  pub last_modified:     Option<String>,
  pub origin_chamber_id: Option<String>,
  pub cbo_cost_estimate: Option<String>,
  pub policy_area_id:    Option<String>,
  pub ingested_at:       Option<String>,
}

impl RawBill {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      bill_id:           row.get(0)?,
      url:               row.get(1)?,
      bill_type:         row.get(2)?,
      number:            row.get(3)?,
      title:             row.get(4)?,
      congress:          row.get(5)?,
      introduced_at:     row.get(6)?,
      last_modified:     row.get(7)?,
      origin_chamber_id: row.get(8)?,
      cbo_cost_estimate: row.get(9)?,
      policy_area_id:    row.get(10)?,
      ingested_at:       row.get(11)?,
    })
  }

  pub fn into_bill(self) -> Result<Bill> {
    Ok(Bill {
      bill_id:           decode_uuid(&self.bill_id)?,
      url:               self.url,
      bill_type:         self.bill_type,
      number:            self.number,
      title:             self.title,
      congress:          self.congress,
      introduced_at:     decode_dt(&self.introduced_at)?,
      last_modified:     self.last_modified.as_deref().map(decode_dt).transpose()?,
      origin_chamber_id: decode_opt_uuid(self.origin_chamber_id)?,
      cbo_cost_estimate: self.cbo_cost_estimate,
      policy_area_id:    decode_opt_uuid(self.policy_area_id)?,
      ingested_at:       self.ingested_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

/// `(id, name)` rows: policy areas and legislative subjects.
pub struct RawTerm {
  pub id:   String,
  pub name: String,
}

impl RawTerm {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self { id: row.get(0)?, name: row.get(1)? })
  }

  pub fn into_policy_area(self) -> Result<PolicyArea> {
    Ok(PolicyArea { policy_area_id: decode_uuid(&self.id)?, name: self.name })
  }

  pub fn into_subject(self) -> Result<LegislativeSubject> {
    Ok(LegislativeSubject { subject_id: decode_uuid(&self.id)?, name: self.name })
  }
}

pub struct RawCommittee {
  pub committee_id:   String,
  pub system_code:    String,
  pub name:           String,
  pub committee_type: Option<String>,
  pub chamber_id:     String,
}

impl RawCommittee {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      committee_id:   row.get(0)?,
      system_code:    row.get(1)?,
      name:           row.get(2)?,
      committee_type: row.get(3)?,
      chamber_id:     row.get(4)?,
    })
  }

  pub fn into_committee(self) -> Result<Committee> {
    Ok(Committee {
      committee_id:   decode_uuid(&self.committee_id)?,
      system_code:    self.system_code,
      name:           self.name,
      committee_type: self.committee_type,
      chamber_id:     decode_uuid(&self.chamber_id)?,
    })
  }
}

pub struct RawSummary {
  pub summary_id:         String,
  pub bill_id:            String,
  pub name:               String,
  pub action_date:        String,
  pub text:               String,
  pub action_description: String,
}

impl RawSummary {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      summary_id:         row.get(0)?,
      bill_id:            row.get(1)?,
      name:               row.get(2)?,
      action_date:        row.get(3)?,
      text:               row.get(4)?,
      action_description: row.get(5)?,
    })
  }

  pub fn into_summary(self) -> Result<BillSummary> {
    Ok(BillSummary {
      summary_id:         decode_uuid(&self.summary_id)?,
      bill_id:            decode_uuid(&self.bill_id)?,
      name:               self.name,
      action_date:        decode_dt(&self.action_date)?,
      text:               self.text,
      action_description: self.action_description,
    })
  }
}

pub struct RawAction {
  pub action_id:    String,
  pub bill_id:      String,
  pub committee_id: Option<String>,
  pub text:         String,
  pub action_type:  String,
  pub action_date:  String,
}

impl RawAction {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      action_id:    row.get(0)?,
      bill_id:      row.get(1)?,
      committee_id: row.get(2)?,
      text:         row.get(3)?,
      action_type:  row.get(4)?,
      action_date:  row.get(5)?,
    })
  }

  pub fn into_action(self) -> Result<Action> {
    Ok(Action {
      action_id:    decode_uuid(&self.action_id)?,
      bill_id:      decode_uuid(&self.bill_id)?,
      committee_id: decode_opt_uuid(self.committee_id)?,
      text:         self.text,
      action_type:  self.action_type,
      action_date:  decode_dt(&self.action_date)?,
    })
  }
}

pub struct RawCosponsorship {
  pub cosponsorship_id: String,
  pub legislator_id:    String,
  pub bill_id:          String,
  pub is_original:      bool,
  pub cosponsored_at:   String,
}

impl RawCosponsorship {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      cosponsorship_id: row.get(0)?,
      legislator_id:    row.get(1)?,
      bill_id:          row.get(2)?,
      is_original:      row.get(3)?,
      cosponsored_at:   row.get(4)?,
    })
  }

  pub fn into_cosponsorship(self) -> Result<Cosponsorship> {
    Ok(Cosponsorship {
      cosponsorship_id: decode_uuid(&self.cosponsorship_id)?,
      legislator_id:    decode_uuid(&self.legislator_id)?,
      bill_id:          decode_uuid(&self.bill_id)?,
      is_original:      self.is_original,
      cosponsored_at:   decode_dt(&self.cosponsored_at)?,
    })
  }
}

pub struct RawSupportSplit {
  pub subject_id:  String,
  pub red_count:   u32,
  pub blue_count:  u32,
  pub white_count: u32,
}

impl RawSupportSplit {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      subject_id:  row.get(0)?,
      red_count:   row.get(1)?,
      blue_count:  row.get(2)?,
      white_count: row.get(3)?,
    })
  }

  pub fn into_split(self) -> Result<SupportSplit> {
    Ok(SupportSplit {
      subject_id:  decode_uuid(&self.subject_id)?,
      red_count:   self.red_count,
      blue_count:  self.blue_count,
      white_count: self.white_count,
    })
  }
}

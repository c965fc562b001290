//! Legislators and the reference entities they point at.
//!
//! A legislator is either a Senator or a Representative. The variant is
//! carried as an explicit [`Seat`] so every lookup and encoding switches on it
//! rather than inferring it from nullable columns.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Reference data ──────────────────────────────────────────────────────────

/// A US state or territory, keyed by its postal abbreviation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
  pub state_id:     Uuid,
  pub abbreviation: String,
  pub name:         Option<String>,
}

/// A political party, keyed by its abbreviation (`D`, `R`, `I`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
  pub party_id:     Uuid,
  pub name:         String,
  pub abbreviation: String,
}

/// A legislative chamber, keyed by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chamber {
  pub chamber_id:   Uuid,
  pub name:         String,
  pub abbreviation: String,
}

/// A congressional district, keyed by `(state, number)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct District {
  pub district_id: Uuid,
  pub state_id:    Uuid,
  pub number:      u32,
}

// ─── Legislator ──────────────────────────────────────────────────────────────

/// Variant-specific payload of a [`Legislator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Seat {
  Senator {
    party_id:   Uuid,
    state_id:   Uuid,
    chamber_id: Option<Uuid>,
  },
  Representative {
    party_id:    Uuid,
    state_id:    Uuid,
    district_id: Uuid,
    chamber_id:  Option<Uuid>,
  },
}

impl Seat {
  /// The discriminant string stored in the `kind` column.
  pub fn discriminant(&self) -> &'static str {
    match self {
      Self::Senator { .. } => "senator",
      Self::Representative { .. } => "representative",
    }
  }

  pub fn party_id(&self) -> Uuid {
    match self {
      Self::Senator { party_id, .. } | Self::Representative { party_id, .. } => *party_id,
    }
  }

  pub fn state_id(&self) -> Uuid {
    match self {
      Self::Senator { state_id, .. } | Self::Representative { state_id, .. } => *state_id,
    }
  }

  pub fn chamber_id(&self) -> Option<Uuid> {
    match self {
      Self::Senator { chamber_id, .. } | Self::Representative { chamber_id, .. } => *chamber_id,
    }
  }

  pub fn district_id(&self) -> Option<Uuid> {
    match self {
      Self::Senator { .. } => None,
      Self::Representative { district_id, .. } => Some(*district_id),
    }
  }
}

/// A sponsor or cosponsor of bills.
///
/// Natural key: `(first_name, last_name, state, party, district-or-absent)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Legislator {
  pub legislator_id: Uuid,
  pub first_name:    String,
  pub last_name:     String,
  pub seat:          Seat,
}

impl Legislator {
  pub fn full_name(&self) -> String { format!("{} {}", self.first_name, self.last_name) }
}

/// Input to [`crate::store::BillStore::get_or_create_legislator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLegislator {
  pub first_name: String,
  pub last_name:  String,
  pub seat:       Seat,
}

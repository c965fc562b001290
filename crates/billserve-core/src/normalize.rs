//! Structural normalisation of markup-derived trees.
//!
//! Source documents arrive as nested mappings produced from XML. Repeated
//! sibling elements are ambiguous in that shape: a list with one entry looks
//! like a plain nested mapping, while a list with several entries becomes a
//! wrapper holding a sequence under [`REPEATED_KEY`]. [`clean`] resolves the
//! ambiguity so every position is a scalar, a mapping, or a sequence.
//!
//! [`Record`] adds field validation on top: required fields must be present at
//! the top level and declared-optional fields are filled with an explicit
//! absent marker.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::{Error, Result};

/// The reserved key under which repeated sibling elements are collected.
pub const REPEATED_KEY: &str = "item";

// ─── Field declarations ──────────────────────────────────────────────────────

/// Required and optional top-level field names of one record kind.
#[derive(Debug, Clone, Copy)]
pub struct Fields {
  pub required: &'static [&'static str],
  pub optional: &'static [&'static str],
}

pub const BILL_FIELDS: Fields = Fields {
  required: &[
    "billType",
    "subjects",
    "policyArea",
    "committees",
    "introducedDate",
    "actions",
    "title",
    "billNumber",
    "summaries",
    "sponsors",
    "congress",
    "originChamber",
    "cosponsors",
    "relatedBills",
  ],
  optional: &[],
};

pub const LEGISLATOR_FIELDS: Fields = Fields {
  required: &["firstName", "lastName", "state", "party"],
  optional: &["district", "isOriginalCosponsor", "sponsorshipDate"],
};

pub const SUMMARY_FIELDS: Fields = Fields {
  required: &["name", "actionDate", "text", "actionDesc"],
  optional: &[],
};

pub const COMMITTEE_FIELDS: Fields = Fields {
  required: &["name", "type", "chamber", "systemCode"],
  optional: &[],
};

pub const ACTION_FIELDS: Fields = Fields {
  required: &["actionDate", "committee", "text", "type"],
  optional: &[],
};

pub const RELATED_BILL_FIELDS: Fields = Fields {
  required: &["congress", "type", "number"],
  optional: &[],
};

// ─── clean ───────────────────────────────────────────────────────────────────

/// Recursively resolve repeated-sibling wrappers.
///
/// - scalars pass through unchanged;
/// - a mapping holding [`REPEATED_KEY`] is replaced by the sequence found
///   there, a lone value becoming a one-element sequence;
/// - any other mapping keeps its keys and has every value cleaned.
///
/// The output never contains [`REPEATED_KEY`], so `clean(clean(x)) == clean(x)`.
pub fn clean(value: Value) -> Value {
  match value {
    Value::Object(mut map) => match map.remove(REPEATED_KEY) {
      Some(Value::Array(items)) => Value::Array(items.into_iter().map(clean).collect()),
      Some(single) => Value::Array(vec![clean(single)]),
      None => Value::Object(map.into_iter().map(|(k, v)| (k, clean(v))).collect()),
    },
    Value::Array(items) => Value::Array(items.into_iter().map(clean).collect()),
    scalar => scalar,
  }
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// A validated top-level mapping.
///
/// Each field maps to `Some(value)` when the source carried it (possibly as
/// `null`) and to `None` when it is a declared-optional field the source left
/// out.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
  fields: BTreeMap<String, Option<Value>>,
}

impl Record {
  /// Validate `raw` against `fields`.
  ///
  /// Fails with [`Error::MissingFields`] naming every absent required field.
  pub fn new(raw: Value, fields: Fields) -> Result<Self> {
    let Value::Object(map) = raw else {
      return Err(Error::NotAMapping("record".into()));
    };
    Self::from_map(map, fields)
  }

  pub fn from_map(map: Map<String, Value>, fields: Fields) -> Result<Self> {
    let missing: Vec<String> = fields
      .required
      .iter()
      .filter(|name| !map.contains_key(**name))
      .map(|name| (*name).to_owned())
      .collect();
    if !missing.is_empty() {
      return Err(Error::MissingFields(missing));
    }

    let mut record: BTreeMap<String, Option<Value>> =
      map.into_iter().map(|(k, v)| (k, Some(v))).collect();
    for name in fields.optional {
      record.entry((*name).to_owned()).or_insert(None);
    }
    Ok(Self { fields: record })
  }

  /// Apply [`clean`] to every field value.
  pub fn cleaned(self) -> Self {
    let fields = self
      .fields
      .into_iter()
      .map(|(k, v)| (k, v.map(clean)))
      .collect();
    Self { fields }
  }

  /// True if the source document carried `key`, even as `null`.
  pub fn is_present(&self, key: &str) -> bool {
    matches!(self.fields.get(key), Some(Some(_)))
  }

  /// True if `key` is known to this record, present or filled as absent.
  pub fn has_field(&self, key: &str) -> bool { self.fields.contains_key(key) }

  /// The value at `key`, or `None` if it is absent, unknown or `null`.
  pub fn get(&self, key: &str) -> Option<&Value> {
    match self.fields.get(key) {
      Some(Some(Value::Null)) | Some(None) | None => None,
      Some(Some(value)) => Some(value),
    }
  }

  /// Walk nested mappings from `key` through `rest`; `None` as soon as a
  /// step is missing, `null`, or not a mapping.
  pub fn path(&self, key: &str, rest: &[&str]) -> Option<&Value> {
    let mut current = self.get(key)?;
    for step in rest {
      current = match current.get(step)? {
        Value::Null => return None,
        next => next,
      };
    }
    Some(current)
  }

  /// A required text field.
  pub fn text(&self, key: &str) -> Result<&str> {
    self
      .opt_text(key)?
      .ok_or_else(|| Error::MissingFields(vec![key.to_owned()]))
  }

  /// A text field that may be absent or `null`.
  pub fn opt_text(&self, key: &str) -> Result<Option<&str>> {
    match self.get(key) {
      None => Ok(None),
      Some(Value::String(s)) => Ok(Some(s.as_str())),
      Some(_) => Err(Error::UnexpectedType {
        field:    key.to_owned(),
        expected: "text",
      }),
    }
  }

  /// A sequence field; absent or `null` reads as empty.
  pub fn seq(&self, key: &str) -> Result<&[Value]> { seq_at(self.get(key), key) }
}

/// Read `value` as a sequence; `None` and `null` read as empty.
pub fn seq_at<'a>(value: Option<&'a Value>, field: &str) -> Result<&'a [Value]> {
  match value {
    None | Some(Value::Null) => Ok(&[]),
    Some(Value::Array(items)) => Ok(items.as_slice()),
    Some(_) => Err(Error::UnexpectedType {
      field:    field.to_owned(),
      expected: "a sequence",
    }),
  }
}

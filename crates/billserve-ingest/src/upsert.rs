//! Get-or-create of every entity a status document describes.
//!
//! Each routine takes one normalised sub-record (plus the owning bill where
//! there is one) and returns the resolved entity with its created flag.
//! Failures are per record: nothing here rolls back siblings that were
//! already written.

use billserve_core::{
  Upserted,
  bill::{
    Action, BillSummary, Committee, Cosponsorship, LegislativeSubject, NewAction, NewBillSummary,
    NewCommittee, NewCosponsorship, PolicyArea,
  },
  legislator::{Legislator, NewLegislator, Seat},
  normalize::{ACTION_FIELDS, COMMITTEE_FIELDS, LEGISLATOR_FIELDS, Record, SUMMARY_FIELDS},
  store::BillStore,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::{Error, Result};

/// Calendar dates: introduction, sponsorship, summaries, actions.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// The document's last-update timestamp.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

const SENATE: &str = "Senate";
const HOUSE: &str = "House";

// ─── Field coercions ─────────────────────────────────────────────────────────

/// Upper-case the first letter of a name and lower-case the rest.
pub fn fix_name(field: &str, value: Option<&Value>) -> Result<String> {
  let Some(Value::String(name)) = value else {
    return Err(Error::value(field, describe(value)));
  };
  let mut chars = name.chars();
  let Some(first) = chars.next() else {
    return Err(Error::value(field, ""));
  };
  Ok(first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect())
}

/// Parse `value` with `format` as UTC. A date-only format yields midnight.
pub fn parse_date(field: &str, value: &str, format: &str) -> Result<DateTime<Utc>> {
  if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
    return Ok(dt.and_utc());
  }
  NaiveDate::parse_from_str(value, format)
    .ok()
    .and_then(|date| date.and_hms_opt(0, 0, 0))
    .map(|dt| dt.and_utc())
    .ok_or_else(|| Error::value(field, value))
}

/// The source spells booleans `True` / `False`, nothing else.
pub fn parse_original_flag(value: Option<&Value>) -> Result<bool> {
  match value {
    Some(Value::String(s)) if s == "True" => Ok(true),
    Some(Value::String(s)) if s == "False" => Ok(false),
    other => Err(Error::value("isOriginalCosponsor", describe(other))),
  }
}

pub fn parse_number(field: &str, value: &str) -> Result<u32> {
  value.trim().parse().map_err(|_| Error::value(field, value))
}

fn describe(value: Option<&Value>) -> String {
  match value {
    None | Some(Value::Null) => "null".to_owned(),
    Some(Value::String(s)) => s.clone(),
    Some(other) => other.to_string(),
  }
}

// ─── Reference lookups ───────────────────────────────────────────────────────

async fn chamber_id<S: BillStore>(store: &S, name: &str) -> Result<Option<Uuid>> {
  Ok(
    store
      .find_chamber(name.to_owned())
      .await
      .map_err(Error::store)?
      .map(|c| c.chamber_id),
  )
}

/// Resolve a chamber that must exist.
pub async fn require_chamber<S: BillStore>(store: &S, name: &str) -> Result<Uuid> {
  chamber_id(store, name)
    .await?
    .ok_or_else(|| Error::Referential { entity: "chamber", key: name.to_owned() })
}

// ─── Legislators ─────────────────────────────────────────────────────────────

/// Resolve state and party, then create a Representative when a district is
/// given and a Senator otherwise.
pub async fn upsert_legislator<S: BillStore>(store: &S, raw: &Value) -> Result<Upserted<Legislator>> {
  let record = Record::new(raw.clone(), LEGISLATOR_FIELDS)?;
  let first_name = fix_name("firstName", record.get("firstName"))?;
  let last_name = fix_name("lastName", record.get("lastName"))?;

  let state_key = record.text("state")?;
  let state = store
    .find_state(state_key.to_owned())
    .await
    .map_err(Error::store)?
    .ok_or_else(|| Error::Referential { entity: "state", key: state_key.to_owned() })?;

  let party_key = record.text("party")?;
  let party = store
    .find_party(party_key.to_owned())
    .await
    .map_err(Error::store)?
    .ok_or_else(|| Error::Referential { entity: "party", key: party_key.to_owned() })?;

  let seat = match record.opt_text("district")? {
    Some(district) => {
      let number = parse_number("district", district)?;
      let district = store
        .get_or_create_district(state.state_id, number)
        .await
        .map_err(Error::store)?
        .value;
      Seat::Representative {
        party_id:    party.party_id,
        state_id:    state.state_id,
        district_id: district.district_id,
        chamber_id:  chamber_id(store, HOUSE).await?,
      }
    }
    None => Seat::Senator {
      party_id:   party.party_id,
      state_id:   state.state_id,
      chamber_id: chamber_id(store, SENATE).await?,
    },
  };

  let legislator = store
    .get_or_create_legislator(NewLegislator { first_name, last_name, seat })
    .await
    .map_err(Error::store)?;
  debug!(
    legislator = %legislator.value.full_name(),
    kind = legislator.value.seat.discriminant(),
    created = legislator.created,
    "legislator resolved"
  );
  Ok(legislator)
}

/// Resolve the cosponsoring legislator, then the cosponsorship itself.
pub async fn upsert_cosponsorship<S: BillStore>(
  store: &S,
  bill_id: Uuid,
  raw: &Value,
) -> Result<Upserted<Cosponsorship>> {
  let record = Record::new(raw.clone(), LEGISLATOR_FIELDS)?;
  let is_original = parse_original_flag(record.get("isOriginalCosponsor"))?;
  let cosponsored_at = parse_date("sponsorshipDate", record.text("sponsorshipDate")?, DATE_FORMAT)?;
  let legislator = upsert_legislator(store, raw).await?.value;

  let cosponsorship = store
    .get_or_create_cosponsorship(NewCosponsorship {
      legislator_id: legislator.legislator_id,
      bill_id,
      is_original,
      cosponsored_at,
    })
    .await
    .map_err(Error::store)?;
  debug!(created = cosponsorship.created, "cosponsorship resolved");
  Ok(cosponsorship)
}

// ─── Per-bill records ────────────────────────────────────────────────────────

pub async fn upsert_summary<S: BillStore>(
  store: &S,
  bill_id: Uuid,
  raw: &Value,
) -> Result<Upserted<BillSummary>> {
  let record = Record::new(raw.clone(), SUMMARY_FIELDS)?;
  let summary = store
    .get_or_create_summary(NewBillSummary {
      bill_id,
      name: record.text("name")?.to_owned(),
      action_date: parse_date("actionDate", record.text("actionDate")?, DATE_FORMAT)?,
      text: record.text("text")?.to_owned(),
      action_description: record.text("actionDesc")?.to_owned(),
    })
    .await
    .map_err(Error::store)?;
  debug!(created = summary.created, "summary resolved");
  Ok(summary)
}

/// A committee reference on an action must name a known committee.
pub async fn upsert_action<S: BillStore>(
  store: &S,
  bill_id: Uuid,
  raw: &Value,
) -> Result<Upserted<Action>> {
  let record = Record::new(raw.clone(), ACTION_FIELDS)?;

  let committee_id = match record.get("committee") {
    None => None,
    Some(committee) => {
      let code = committee
        .get("systemCode")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::value("committee", describe(Some(committee))))?;
      let found = store
        .find_committee(code.to_owned())
        .await
        .map_err(Error::store)?
        .ok_or_else(|| Error::Referential { entity: "committee", key: code.to_owned() })?;
      Some(found.committee_id)
    }
  };

  let action = store
    .get_or_create_action(NewAction {
      bill_id,
      committee_id,
      text: record.text("text")?.to_owned(),
      action_type: record.text("type")?.to_owned(),
      action_date: parse_date("actionDate", record.text("actionDate")?, DATE_FORMAT)?,
    })
    .await
    .map_err(Error::store)?;
  debug!(created = action.created, "action resolved");
  Ok(action)
}

// ─── Taxonomy ────────────────────────────────────────────────────────────────

/// Keyed by system code; an existing committee is refreshed.
pub async fn upsert_committee<S: BillStore>(store: &S, raw: &Value) -> Result<Upserted<Committee>> {
  let record = Record::new(raw.clone(), COMMITTEE_FIELDS)?;
  let chamber_id = require_chamber(store, record.text("chamber")?).await?;

  let committee = store
    .update_or_create_committee(NewCommittee {
      system_code: record.text("systemCode")?.to_owned(),
      name: record.text("name")?.to_owned(),
      committee_type: record.opt_text("type")?.map(str::to_owned),
      chamber_id,
    })
    .await
    .map_err(Error::store)?;
  debug!(system_code = %committee.value.system_code, created = committee.created, "committee resolved");
  Ok(committee)
}

/// The `name` of a taxonomy record, or `None` when the record is absent or
/// not a mapping with a text name.
fn term_name(raw: Option<&Value>) -> Option<&str> {
  raw?.as_object()?.get("name")?.as_str()
}

/// An absent or malformed policy area is no policy area.
pub async fn upsert_policy_area<S: BillStore>(
  store: &S,
  raw: Option<&Value>,
) -> Result<Option<Upserted<PolicyArea>>> {
  let Some(name) = term_name(raw) else {
    return Ok(None);
  };
  let area = store
    .get_or_create_policy_area(name.to_owned())
    .await
    .map_err(Error::store)?;
  Ok(Some(area))
}

/// An absent or malformed subject is no subject.
pub async fn upsert_subject<S: BillStore>(
  store: &S,
  raw: Option<&Value>,
) -> Result<Option<Upserted<LegislativeSubject>>> {
  let Some(name) = term_name(raw) else {
    return Ok(None);
  };
  let subject = store
    .get_or_create_subject(name.to_owned())
    .await
    .map_err(Error::store)?;
  Ok(Some(subject))
}

#[cfg(test)]
mod tests {
  use billserve_store_sqlite::SqliteStore;
  use chrono::{Datelike, Timelike};
  use serde_json::json;

  use super::*;

  async fn store() -> SqliteStore { SqliteStore::open_in_memory().await.unwrap() }

  fn senator() -> Value {
    json!({ "firstName": "CHARLES", "lastName": "schumer", "state": "NY", "party": "D" })
  }

  #[test]
  fn names_are_capitalised() {
    assert_eq!(fix_name("firstName", Some(&json!("bob"))).unwrap(), "Bob");
    assert_eq!(fix_name("firstName", Some(&json!("BLAIRE"))).unwrap(), "Blaire");
    assert_eq!(fix_name("firstName", Some(&json!("mCdONALD"))).unwrap(), "Mcdonald");
  }

  #[test]
  fn empty_or_non_text_names_fail() {
    assert!(matches!(fix_name("firstName", Some(&json!(""))), Err(Error::ValueDomain { .. })));
    assert!(matches!(fix_name("firstName", Some(&json!(7))), Err(Error::ValueDomain { .. })));
    assert!(matches!(fix_name("firstName", None), Err(Error::ValueDomain { .. })));
  }

  #[test]
  fn dates_parse_as_utc() {
    let date = parse_date("introducedDate", "2017-02-07", DATE_FORMAT).unwrap();
    assert_eq!((date.year(), date.month(), date.day(), date.hour()), (2017, 2, 7, 0));

    let ts = parse_date("updateDate", "2019-01-04T11:41:59Z", TIMESTAMP_FORMAT).unwrap();
    assert_eq!((ts.hour(), ts.minute(), ts.second()), (11, 41, 59));

    assert!(matches!(
      parse_date("introducedDate", "02/07/2017", DATE_FORMAT),
      Err(Error::ValueDomain { .. })
    ));
  }

  #[test]
  fn original_flag_accepts_only_exact_literals() {
    assert!(parse_original_flag(Some(&json!("True"))).unwrap());
    assert!(!parse_original_flag(Some(&json!("False"))).unwrap());
    for bad in [json!("true"), json!("FALSE"), json!("1"), json!(true), Value::Null] {
      assert!(
        matches!(parse_original_flag(Some(&bad)), Err(Error::ValueDomain { .. })),
        "{bad}"
      );
    }
    assert!(parse_original_flag(None).is_err());
  }

  #[tokio::test]
  async fn legislator_upsert_is_idempotent_and_keyed_by_name() {
    let s = store().await;

    let first = upsert_legislator(&s, &senator()).await.unwrap();
    let again = upsert_legislator(&s, &senator()).await.unwrap();
    assert!(first.created);
    assert!(!again.created);
    assert_eq!(first.value.legislator_id, again.value.legislator_id);
    assert_eq!(first.value.full_name(), "Charles Schumer");

    let mut renamed = senator();
    renamed["firstName"] = json!("Chuck");
    let other = upsert_legislator(&s, &renamed).await.unwrap();
    assert!(other.created);
    assert_ne!(other.value.legislator_id, first.value.legislator_id);
    assert!(s.get_legislator(first.value.legislator_id).await.unwrap().is_some());
  }

  #[tokio::test]
  async fn district_selects_representative() {
    let s = store().await;
    let mut raw = senator();
    raw["district"] = json!("9");

    let rep = upsert_legislator(&s, &raw).await.unwrap().value;
    assert_eq!(rep.seat.discriminant(), "representative");
    assert!(rep.seat.district_id().is_some());
    let house = s.find_chamber("House".into()).await.unwrap().unwrap();
    assert_eq!(rep.seat.chamber_id(), Some(house.chamber_id));

    let sen = upsert_legislator(&s, &senator()).await.unwrap().value;
    assert_eq!(sen.seat.discriminant(), "senator");
    assert_ne!(sen.legislator_id, rep.legislator_id);
  }

  #[tokio::test]
  async fn unknown_state_or_party_is_referential() {
    let s = store().await;
    let mut raw = senator();
    raw["state"] = json!("ZZ");
    assert!(matches!(
      upsert_legislator(&s, &raw).await,
      Err(Error::Referential { entity: "state", .. })
    ));

    let mut raw = senator();
    raw["party"] = json!("Whig");
    assert!(matches!(
      upsert_legislator(&s, &raw).await,
      Err(Error::Referential { entity: "party", .. })
    ));
  }

  #[tokio::test]
  async fn legislator_missing_fields_are_malformed() {
    let s = store().await;
    let err = upsert_legislator(&s, &json!({ "firstName": "A" })).await.unwrap_err();
    match err {
      Error::MalformedInput(message) => {
        assert!(message.contains("lastName"));
        assert!(message.contains("party"));
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[tokio::test]
  async fn cosponsorship_rejects_loose_booleans() {
    let s = store().await;
    let bill_id = Uuid::new_v4();
    let mut raw = senator();
    raw["sponsorshipDate"] = json!("2017-02-07");
    raw["isOriginalCosponsor"] = json!("yes");

    let err = upsert_cosponsorship(&s, bill_id, &raw).await.unwrap_err();
    assert!(matches!(err, Error::ValueDomain { ref field, .. } if field == "isOriginalCosponsor"));
  }

  #[tokio::test]
  async fn committee_needs_known_chamber_and_refreshes() {
    let s = store().await;
    let raw = json!({ "name": "Finance", "type": "Standing", "chamber": "Senate", "systemCode": "ssfi00" });
    let first = upsert_committee(&s, &raw).await.unwrap();
    assert!(first.created);

    let renamed = json!({ "name": "Finance Cmte", "type": "Standing", "chamber": "Senate", "systemCode": "ssfi00" });
    let again = upsert_committee(&s, &renamed).await.unwrap();
    assert!(!again.created);
    assert_eq!(again.value.name, "Finance Cmte");

    let orphan = json!({ "name": "X", "type": null, "chamber": "Moon", "systemCode": "x" });
    assert!(matches!(
      upsert_committee(&s, &orphan).await,
      Err(Error::Referential { entity: "chamber", .. })
    ));
  }

  #[tokio::test]
  async fn policy_area_and_subject_absence_is_none() {
    let s = store().await;
    assert!(upsert_policy_area(&s, None).await.unwrap().is_none());
    assert!(upsert_policy_area(&s, Some(&json!("Taxation"))).await.unwrap().is_none());
    assert!(upsert_subject(&s, Some(&json!({ "other": 1 }))).await.unwrap().is_none());

    let area = upsert_policy_area(&s, Some(&json!({ "name": "Taxation" }))).await.unwrap().unwrap();
    assert!(area.created);
    let subject = upsert_subject(&s, Some(&json!({ "name": "Income tax" }))).await.unwrap().unwrap();
    assert_eq!(subject.value.name, "Income tax");
  }
}

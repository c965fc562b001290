//! [`SqliteStore`], the SQLite implementation of [`BillStore`].

use std::path::Path;

use billserve_core::{
  Upserted,
  bill::{
    Action, Bill, BillSummary, Committee, Cosponsorship, LegislativeSubject, NewAction, NewBill,
    NewBillSummary, NewCommittee, NewCosponsorship, PolicyArea,
  },
  legislator::{Chamber, District, Legislator, NewLegislator, Party, State},
  party::SupportSplit,
  store::BillStore,
};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _, Params, Row};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    ACTION_COLUMNS, BILL_COLUMNS, COMMITTEE_COLUMNS, COSPONSORSHIP_COLUMNS, LEGISLATOR_COLUMNS,
    RawAction, RawBill, RawCommittee, RawCosponsorship, RawDistrict, RawLegislator, RawNamed,
    RawState, RawSummary, RawSupportSplit, RawTerm, SUMMARY_COLUMNS, encode_dt, encode_uuid,
  },
  schema::SCHEMA,
};

/// How many times a get-or-create re-reads after losing an insert race.
const MAX_UPSERT_ATTEMPTS: usize = 3;

// ─── Query helpers ───────────────────────────────────────────────────────────

fn query_all<T, P: Params>(
  conn: &Connection,
  sql: &str,
  params: P,
  map: fn(&Row<'_>) -> rusqlite::Result<T>,
) -> rusqlite::Result<Vec<T>> {
  let mut stmt = conn.prepare(sql)?;
  let rows = stmt.query_map(params, map)?.collect::<rusqlite::Result<Vec<T>>>();
  rows
}

/// Look up by natural key; insert on a miss; re-read when the insert was
/// rejected by a uniqueness constraint.
///
/// `insert` must use `ON CONFLICT DO NOTHING` and return the number of rows
/// written. Returns `None` if every attempt lost a race and the row still
/// could not be read back.
fn get_or_insert<T>(
  conn: &Connection,
  entity: &'static str,
  select: impl Fn(&Connection) -> rusqlite::Result<Option<T>>,
  insert: impl Fn(&Connection) -> rusqlite::Result<usize>,
) -> rusqlite::Result<Option<(T, bool)>> {
  for attempt in 0..MAX_UPSERT_ATTEMPTS {
    if let Some(found) = select(conn)? {
      return Ok(Some((found, false)));
    }
    if insert(conn)? == 1 {
      if let Some(created) = select(conn)? {
        return Ok(Some((created, true)));
      }
    }
    tracing::debug!(entity, attempt, "insert conflicted with a concurrent writer; re-reading");
  }
  Ok(None)
}

fn upserted<R, T>(
  found: Option<(R, bool)>,
  entity: &'static str,
  decode: impl FnOnce(R) -> Result<T>,
) -> Result<Upserted<T>> {
  let (raw, created) = found.ok_or(Error::UpsertConflict { entity })?;
  Ok(Upserted { value: decode(raw)?, created })
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A billserve graph backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path`, run schema initialisation and seed
  /// reference data.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Attach `(a, b)` in a two-column join table; a repeat is a no-op.
  async fn relate(&self, table: &'static str, columns: &'static str, a: Uuid, b: Uuid) -> Result<()> {
    let a = encode_uuid(a);
    let b = encode_uuid(b);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!("INSERT OR IGNORE INTO {table} ({columns}) VALUES (?1, ?2)"),
          rusqlite::params![a, b],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn legislators_where(&self, sql: String, bill_id: Uuid) -> Result<Vec<Legislator>> {
    let id = encode_uuid(bill_id);
    let raws = self
      .conn
      .call(move |conn| Ok(query_all(conn, &sql, rusqlite::params![id], RawLegislator::from_row)?))
      .await?;
    raws.into_iter().map(RawLegislator::into_legislator).collect()
  }

  async fn bills_where(&self, sql: String, id: Uuid) -> Result<Vec<Bill>> {
    let id = encode_uuid(id);
    let raws = self
      .conn
      .call(move |conn| Ok(query_all(conn, &sql, rusqlite::params![id], RawBill::from_row)?))
      .await?;
    raws.into_iter().map(RawBill::into_bill).collect()
  }

  async fn get_or_create_term(
    &self,
    table: &'static str,
    id_column: &'static str,
    name: String,
  ) -> Result<Option<(RawTerm, bool)>> {
    let id = encode_uuid(Uuid::new_v4());
    let found = self
      .conn
      .call(move |conn| {
        Ok(get_or_insert(
          conn,
          table,
          |c| {
            c.query_row(
              &format!("SELECT {id_column}, name FROM {table} WHERE name = ?1"),
              rusqlite::params![name],
              RawTerm::from_row,
            )
            .optional()
          },
          |c| {
            c.execute(
              &format!("INSERT INTO {table} ({id_column}, name) VALUES (?1, ?2) ON CONFLICT DO NOTHING"),
              rusqlite::params![id, name],
            )
          },
        )?)
      })
      .await?;
    Ok(found)
  }
}

// ─── BillStore impl ──────────────────────────────────────────────────────────

impl BillStore for SqliteStore {
  type Error = Error;

  // ── Reference data ────────────────────────────────────────────────────────

  async fn find_state(&self, abbreviation: String) -> Result<Option<State>> {
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT state_id, abbreviation, name FROM states WHERE abbreviation = ?1",
              rusqlite::params![abbreviation],
              RawState::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawState::into_state).transpose()
  }

  async fn find_party(&self, abbreviation: String) -> Result<Option<Party>> {
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT party_id, name, abbreviation FROM parties WHERE abbreviation = ?1",
              rusqlite::params![abbreviation],
              RawNamed::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawNamed::into_party).transpose()
  }

  async fn find_chamber(&self, name: String) -> Result<Option<Chamber>> {
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT chamber_id, name, abbreviation FROM chambers WHERE name = ?1",
              rusqlite::params![name],
              RawNamed::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawNamed::into_chamber).transpose()
  }

  async fn get_or_create_district(&self, state_id: Uuid, number: u32) -> Result<Upserted<District>> {
    let id = encode_uuid(Uuid::new_v4());
    let state = encode_uuid(state_id);

    let found = self
      .conn
      .call(move |conn| {
        Ok(get_or_insert(
          conn,
          "district",
          |c| {
            c.query_row(
              "SELECT district_id, state_id, number FROM districts
               WHERE state_id = ?1 AND number = ?2",
              rusqlite::params![state, number],
              RawDistrict::from_row,
            )
            .optional()
          },
          |c| {
            c.execute(
              "INSERT INTO districts (district_id, state_id, number) VALUES (?1, ?2, ?3)
               ON CONFLICT DO NOTHING",
              rusqlite::params![id, state, number],
            )
          },
        )?)
      })
      .await?;

    upserted(found, "district", RawDistrict::into_district)
  }

  // ── Legislators ───────────────────────────────────────────────────────────

  async fn get_or_create_legislator(&self, input: NewLegislator) -> Result<Upserted<Legislator>> {
    let id       = encode_uuid(Uuid::new_v4());
    let kind     = input.seat.discriminant();
    let state    = encode_uuid(input.seat.state_id());
    let party    = encode_uuid(input.seat.party_id());
    let district = input.seat.district_id().map(encode_uuid);
    let chamber  = input.seat.chamber_id().map(encode_uuid);
    let first    = input.first_name;
    let last     = input.last_name;

    let found = self
      .conn
      .call(move |conn| {
        Ok(get_or_insert(
          conn,
          "legislator",
          |c| {
            c.query_row(
              &format!(
                "SELECT {LEGISLATOR_COLUMNS} FROM legislators
                 WHERE first_name = ?1 AND last_name = ?2 AND state_id = ?3
                   AND party_id = ?4 AND district_id IS ?5"
              ),
              rusqlite::params![first, last, state, party, district],
              RawLegislator::from_row,
            )
            .optional()
          },
          |c| {
            c.execute(
              "INSERT INTO legislators (
                 legislator_id, kind, first_name, last_name,
                 state_id, party_id, district_id, chamber_id
               ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
               ON CONFLICT DO NOTHING",
              rusqlite::params![id, kind, first, last, state, party, district, chamber],
            )
          },
        )?)
      })
      .await?;

    upserted(found, "legislator", RawLegislator::into_legislator)
  }

  async fn get_legislator(&self, id: Uuid) -> Result<Option<Legislator>> {
    let id = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {LEGISLATOR_COLUMNS} FROM legislators WHERE legislator_id = ?1"),
              rusqlite::params![id],
              RawLegislator::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawLegislator::into_legislator).transpose()
  }

  // ── Bills ─────────────────────────────────────────────────────────────────

  async fn get_or_create_bill(&self, input: NewBill) -> Result<Upserted<Bill>> {
    let id            = encode_uuid(Uuid::new_v4());
    let introduced_at = encode_dt(input.introduced_at);
    let last_modified = input.last_modified.map(encode_dt);
    let origin        = input.origin_chamber_id.map(encode_uuid);
    let policy_area   = input.policy_area_id.map(encode_uuid);
    let NewBill { url, bill_type, number, title, congress, cbo_cost_estimate, .. } = input;

    let found = self
      .conn
      .call(move |conn| {
        Ok(get_or_insert(
          conn,
          "bill",
          |c| {
            c.query_row(
              &format!("SELECT {BILL_COLUMNS} FROM bills WHERE url = ?1"),
              rusqlite::params![url],
              RawBill::from_row,
            )
            .optional()
          },
          |c| {
            c.execute(
              "INSERT INTO bills (
                 bill_id, url, bill_type, number, title, congress, introduced_at,
                 last_modified, origin_chamber_id, cbo_cost_estimate, policy_area_id
               ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
               ON CONFLICT DO NOTHING",
              rusqlite::params![
                id,
                url,
                bill_type,
                number,
                title,
                congress,
                introduced_at,
                last_modified,
                origin,
                cbo_cost_estimate,
                policy_area,
              ],
            )
          },
        )?)
      })
      .await?;

    upserted(found, "bill", RawBill::into_bill)
  }

  async fn get_bill(&self, id: Uuid) -> Result<Option<Bill>> {
    let id = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {BILL_COLUMNS} FROM bills WHERE bill_id = ?1"),
              rusqlite::params![id],
              RawBill::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawBill::into_bill).transpose()
  }

  async fn find_bill_by_url(&self, url: String) -> Result<Option<Bill>> {
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {BILL_COLUMNS} FROM bills WHERE url = ?1"),
              rusqlite::params![url],
              RawBill::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawBill::into_bill).transpose()
  }

  async fn mark_bill_ingested(&self, bill_id: Uuid, at: DateTime<Utc>) -> Result<()> {
    let id = encode_uuid(bill_id);
    let at = encode_dt(at);
    let updated = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE bills SET ingested_at = ?2 WHERE bill_id = ?1 AND ingested_at IS NULL",
          rusqlite::params![id, at],
        )?)
      })
      .await?;
    if updated == 0 && self.get_bill(bill_id).await?.is_none() {
      return Err(Error::BillNotFound(bill_id));
    }
    Ok(())
  }

  async fn add_sponsor(&self, bill_id: Uuid, legislator_id: Uuid) -> Result<()> {
    self.relate("bill_sponsors", "bill_id, legislator_id", bill_id, legislator_id).await
  }

  async fn add_bill_subject(&self, bill_id: Uuid, subject_id: Uuid) -> Result<()> {
    self.relate("bill_subjects", "bill_id, subject_id", bill_id, subject_id).await
  }

  async fn add_bill_committee(&self, bill_id: Uuid, committee_id: Uuid) -> Result<()> {
    self.relate("bill_committees", "bill_id, committee_id", bill_id, committee_id).await
  }

  async fn link_related_bills(&self, a: Uuid, b: Uuid) -> Result<()> {
    if a == b {
      return Ok(());
    }
    let a_str = encode_uuid(a);
    let b_str = encode_uuid(b);

    let missing: Option<String> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for id in [&a_str, &b_str] {
          let exists = tx
            .query_row("SELECT 1 FROM bills WHERE bill_id = ?1", rusqlite::params![id], |_| Ok(()))
            .optional()?
            .is_some();
          if !exists {
            return Ok(Some(id.clone()));
          }
        }
        tx.execute(
          "INSERT OR IGNORE INTO related_bills (bill_id, related_bill_id) VALUES (?1, ?2), (?2, ?1)",
          rusqlite::params![a_str, b_str],
        )?;
        tx.commit()?;
        Ok(None)
      })
      .await?;

    match missing {
      Some(id) if id == encode_uuid(a) => Err(Error::BillNotFound(a)),
      Some(_) => Err(Error::BillNotFound(b)),
      None => Ok(()),
    }
  }

  async fn sponsors(&self, bill_id: Uuid) -> Result<Vec<Legislator>> {
    self
      .legislators_where(
        format!(
          "SELECT {LEGISLATOR_COLUMNS} FROM legislators
           WHERE legislator_id IN (SELECT legislator_id FROM bill_sponsors WHERE bill_id = ?1)
           ORDER BY last_name, first_name"
        ),
        bill_id,
      )
      .await
  }

  async fn cosponsorships(&self, bill_id: Uuid) -> Result<Vec<Cosponsorship>> {
    let id = encode_uuid(bill_id);
    let raws = self
      .conn
      .call(move |conn| {
        Ok(query_all(
          conn,
          &format!(
            "SELECT {COSPONSORSHIP_COLUMNS} FROM cosponsorships
             WHERE bill_id = ?1 ORDER BY cosponsored_at"
          ),
          rusqlite::params![id],
          RawCosponsorship::from_row,
        )?)
      })
      .await?;
    raws.into_iter().map(RawCosponsorship::into_cosponsorship).collect()
  }

  async fn cosponsors(&self, bill_id: Uuid) -> Result<Vec<Legislator>> {
    self
      .legislators_where(
        "SELECT l.legislator_id, l.kind, l.first_name, l.last_name,
                l.state_id, l.party_id, l.district_id, l.chamber_id
         FROM cosponsorships c
         JOIN legislators l ON l.legislator_id = c.legislator_id
         WHERE c.bill_id = ?1
         ORDER BY c.cosponsored_at"
          .to_owned(),
        bill_id,
      )
      .await
  }

  async fn bill_subjects(&self, bill_id: Uuid) -> Result<Vec<LegislativeSubject>> {
    let id = encode_uuid(bill_id);
    let raws = self
      .conn
      .call(move |conn| {
        Ok(query_all(
          conn,
          "SELECT subject_id, name FROM legislative_subjects
           WHERE subject_id IN (SELECT subject_id FROM bill_subjects WHERE bill_id = ?1)
           ORDER BY name",
          rusqlite::params![id],
          RawTerm::from_row,
        )?)
      })
      .await?;
    raws.into_iter().map(RawTerm::into_subject).collect()
  }

  async fn bill_committees(&self, bill_id: Uuid) -> Result<Vec<Committee>> {
    let id = encode_uuid(bill_id);
    let raws = self
      .conn
      .call(move |conn| {
        Ok(query_all(
          conn,
          &format!(
            "SELECT {COMMITTEE_COLUMNS} FROM committees
             WHERE committee_id IN (SELECT committee_id FROM bill_committees WHERE bill_id = ?1)
             ORDER BY system_code"
          ),
          rusqlite::params![id],
          RawCommittee::from_row,
        )?)
      })
      .await?;
    raws.into_iter().map(RawCommittee::into_committee).collect()
  }

  async fn summaries(&self, bill_id: Uuid) -> Result<Vec<BillSummary>> {
    let id = encode_uuid(bill_id);
    let raws = self
      .conn
      .call(move |conn| {
        Ok(query_all(
          conn,
          &format!(
            "SELECT {SUMMARY_COLUMNS} FROM bill_summaries WHERE bill_id = ?1 ORDER BY action_date"
          ),
          rusqlite::params![id],
          RawSummary::from_row,
        )?)
      })
      .await?;
    raws.into_iter().map(RawSummary::into_summary).collect()
  }

  async fn actions(&self, bill_id: Uuid) -> Result<Vec<Action>> {
    let id = encode_uuid(bill_id);
    let raws = self
      .conn
      .call(move |conn| {
        Ok(query_all(
          conn,
          &format!("SELECT {ACTION_COLUMNS} FROM actions WHERE bill_id = ?1 ORDER BY action_date"),
          rusqlite::params![id],
          RawAction::from_row,
        )?)
      })
      .await?;
    raws.into_iter().map(RawAction::into_action).collect()
  }

  async fn related_bills(&self, bill_id: Uuid) -> Result<Vec<Bill>> {
    self
      .bills_where(
        format!(
          "SELECT {BILL_COLUMNS} FROM bills
           WHERE bill_id IN (SELECT related_bill_id FROM related_bills WHERE bill_id = ?1)
           ORDER BY url"
        ),
        bill_id,
      )
      .await
  }

  // ── Taxonomy ──────────────────────────────────────────────────────────────

  async fn get_or_create_policy_area(&self, name: String) -> Result<Upserted<PolicyArea>> {
    let found = self.get_or_create_term("policy_areas", "policy_area_id", name).await?;
    upserted(found, "policy area", RawTerm::into_policy_area)
  }

  async fn get_or_create_subject(&self, name: String) -> Result<Upserted<LegislativeSubject>> {
    let found = self.get_or_create_term("legislative_subjects", "subject_id", name).await?;
    upserted(found, "legislative subject", RawTerm::into_subject)
  }

  async fn list_subjects(&self) -> Result<Vec<LegislativeSubject>> {
    let raws = self
      .conn
      .call(|conn| {
        Ok(query_all(
          conn,
          "SELECT subject_id, name FROM legislative_subjects ORDER BY name",
          [],
          RawTerm::from_row,
        )?)
      })
      .await?;
    raws.into_iter().map(RawTerm::into_subject).collect()
  }

  async fn subject_bills(&self, subject_id: Uuid) -> Result<Vec<Bill>> {
    self
      .bills_where(
        format!(
          "SELECT {BILL_COLUMNS} FROM bills
           WHERE bill_id IN (SELECT bill_id FROM bill_subjects WHERE subject_id = ?1)
           ORDER BY url"
        ),
        subject_id,
      )
      .await
  }

  async fn update_or_create_committee(&self, input: NewCommittee) -> Result<Upserted<Committee>> {
    let id      = encode_uuid(Uuid::new_v4());
    let chamber = encode_uuid(input.chamber_id);
    let NewCommittee { system_code, name, committee_type, .. } = input;

    let (raw, existed) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let existed = tx
          .query_row(
            "SELECT 1 FROM committees WHERE system_code = ?1",
            rusqlite::params![system_code],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        tx.execute(
          "INSERT INTO committees (committee_id, system_code, name, committee_type, chamber_id)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT (system_code) DO UPDATE SET
             name           = excluded.name,
             committee_type = excluded.committee_type,
             chamber_id     = excluded.chamber_id",
          rusqlite::params![id, system_code, name, committee_type, chamber],
        )?;
        let raw = tx.query_row(
          &format!("SELECT {COMMITTEE_COLUMNS} FROM committees WHERE system_code = ?1"),
          rusqlite::params![system_code],
          RawCommittee::from_row,
        )?;
        tx.commit()?;
        Ok((raw, existed))
      })
      .await?;

    Ok(Upserted { value: raw.into_committee()?, created: !existed })
  }

  async fn find_committee(&self, system_code: String) -> Result<Option<Committee>> {
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {COMMITTEE_COLUMNS} FROM committees WHERE system_code = ?1"),
              rusqlite::params![system_code],
              RawCommittee::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawCommittee::into_committee).transpose()
  }

  // ── Per-bill records ──────────────────────────────────────────────────────

  async fn get_or_create_summary(&self, input: NewBillSummary) -> Result<Upserted<BillSummary>> {
    let id   = encode_uuid(Uuid::new_v4());
    let bill = encode_uuid(input.bill_id);
    let date = encode_dt(input.action_date);
    let NewBillSummary { name, text, action_description, .. } = input;

    let found = self
      .conn
      .call(move |conn| {
        Ok(get_or_insert(
          conn,
          "bill summary",
          |c| {
            c.query_row(
              &format!(
                "SELECT {SUMMARY_COLUMNS} FROM bill_summaries
                 WHERE bill_id = ?1 AND name = ?2 AND action_date = ?3
                   AND text = ?4 AND action_description = ?5"
              ),
              rusqlite::params![bill, name, date, text, action_description],
              RawSummary::from_row,
            )
            .optional()
          },
          |c| {
            c.execute(
              "INSERT INTO bill_summaries (
                 summary_id, bill_id, name, action_date, text, action_description
               ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
               ON CONFLICT DO NOTHING",
              rusqlite::params![id, bill, name, date, text, action_description],
            )
          },
        )?)
      })
      .await?;

    upserted(found, "bill summary", RawSummary::into_summary)
  }

  async fn get_or_create_action(&self, input: NewAction) -> Result<Upserted<Action>> {
    let id        = encode_uuid(Uuid::new_v4());
    let bill      = encode_uuid(input.bill_id);
    let committee = input.committee_id.map(encode_uuid);
    let date      = encode_dt(input.action_date);
    let NewAction { text, action_type, .. } = input;

    let found = self
      .conn
      .call(move |conn| {
        Ok(get_or_insert(
          conn,
          "action",
          |c| {
            c.query_row(
              &format!(
                "SELECT {ACTION_COLUMNS} FROM actions
                 WHERE bill_id = ?1 AND committee_id IS ?2 AND text = ?3
                   AND action_type = ?4 AND action_date = ?5"
              ),
              rusqlite::params![bill, committee, text, action_type, date],
              RawAction::from_row,
            )
            .optional()
          },
          |c| {
            c.execute(
              "INSERT INTO actions (
                 action_id, bill_id, committee_id, text, action_type, action_date
               ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
               ON CONFLICT DO NOTHING",
              rusqlite::params![id, bill, committee, text, action_type, date],
            )
          },
        )?)
      })
      .await?;

    upserted(found, "action", RawAction::into_action)
  }

  async fn get_or_create_cosponsorship(
    &self,
    input: NewCosponsorship,
  ) -> Result<Upserted<Cosponsorship>> {
    let id          = encode_uuid(Uuid::new_v4());
    let legislator  = encode_uuid(input.legislator_id);
    let bill        = encode_uuid(input.bill_id);
    let date        = encode_dt(input.cosponsored_at);
    let is_original = input.is_original;

    let found = self
      .conn
      .call(move |conn| {
        Ok(get_or_insert(
          conn,
          "cosponsorship",
          |c| {
            c.query_row(
              &format!(
                "SELECT {COSPONSORSHIP_COLUMNS} FROM cosponsorships
                 WHERE legislator_id = ?1 AND bill_id = ?2
                   AND is_original = ?3 AND cosponsored_at = ?4"
              ),
              rusqlite::params![legislator, bill, is_original, date],
              RawCosponsorship::from_row,
            )
            .optional()
          },
          |c| {
            c.execute(
              "INSERT INTO cosponsorships (
                 cosponsorship_id, legislator_id, bill_id, is_original, cosponsored_at
               ) VALUES (?1, ?2, ?3, ?4, ?5)
               ON CONFLICT DO NOTHING",
              rusqlite::params![id, legislator, bill, is_original, date],
            )
          },
        )?)
      })
      .await?;

    upserted(found, "cosponsorship", RawCosponsorship::into_cosponsorship)
  }

  // ── Aggregation ───────────────────────────────────────────────────────────

  async fn replace_support_splits(&self, splits: Vec<SupportSplit>) -> Result<()> {
    let rows: Vec<(String, u32, u32, u32)> = splits
      .into_iter()
      .map(|s| (encode_uuid(s.subject_id), s.red_count, s.blue_count, s.white_count))
      .collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM support_splits", [])?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO support_splits (subject_id, red_count, blue_count, white_count)
             VALUES (?1, ?2, ?3, ?4)",
          )?;
          for (subject, red, blue, white) in &rows {
            stmt.execute(rusqlite::params![subject, red, blue, white])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn support_splits(&self) -> Result<Vec<SupportSplit>> {
    let raws = self
      .conn
      .call(|conn| {
        Ok(query_all(
          conn,
          "SELECT s.subject_id, s.red_count, s.blue_count, s.white_count
           FROM support_splits s
           JOIN legislative_subjects t ON t.subject_id = s.subject_id
           ORDER BY t.name",
          [],
          RawSupportSplit::from_row,
        )?)
      })
      .await?;
    raws.into_iter().map(RawSupportSplit::into_split).collect()
  }
}

#[cfg(test)]
mod tests {
  use std::cell::Cell;

  use rusqlite::OptionalExtension as _;

  use super::*;

  fn names_table() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn
      .execute_batch("CREATE TABLE names (name TEXT PRIMARY KEY); INSERT INTO names VALUES ('taken');")
      .unwrap();
    conn
  }

  fn select_name(c: &Connection) -> rusqlite::Result<Option<String>> {
    c.query_row("SELECT name FROM names WHERE name = 'taken'", [], |r| r.get(0)).optional()
  }

  #[test]
  fn lost_insert_race_rereads_the_winner() {
    let conn = names_table();
    // The first read misses, as if the winner committed just after it.
    let reads = Cell::new(0);
    let found = get_or_insert(
      &conn,
      "name",
      |c| {
        reads.set(reads.get() + 1);
        if reads.get() == 1 { Ok(None) } else { select_name(c) }
      },
      |c| c.execute("INSERT INTO names VALUES ('taken') ON CONFLICT DO NOTHING", []),
    )
    .unwrap();

    assert_eq!(found, Some(("taken".to_owned(), false)));
    assert_eq!(reads.get(), 2);
  }

  #[test]
  fn exhausted_attempts_yield_none() {
    let conn = names_table();
    let inserts = Cell::new(0);
    let found = get_or_insert(
      &conn,
      "name",
      |_| Ok(None::<String>),
      |c| {
        inserts.set(inserts.get() + 1);
        c.execute("INSERT INTO names VALUES ('taken') ON CONFLICT DO NOTHING", [])
      },
    )
    .unwrap();

    assert!(found.is_none());
    assert_eq!(inserts.get(), MAX_UPSERT_ATTEMPTS);
    assert!(matches!(
      upserted(found, "name", |n: String| Ok(n)),
      Err(Error::UpsertConflict { entity: "name" })
    ));
  }
}

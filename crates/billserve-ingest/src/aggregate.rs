//! Full recomputation of per-subject support splits.

use std::collections::HashMap;

use billserve_core::{
  party::{Bucket, PartyBuckets, SupportSplit},
  store::BillStore,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{Error, Result};

/// Count every sponsor and cosponsor of every bill of every subject into its
/// party bucket and replace all stored splits with the result.
///
/// The bucket mapping is resolved against stored parties once, up front.
/// Legislators whose party has no bucket are not counted.
pub async fn rebuild<S: BillStore>(store: &S, buckets: &PartyBuckets) -> Result<Vec<SupportSplit>> {
  let mut by_party: HashMap<Uuid, Bucket> = HashMap::new();
  for (abbreviation, bucket) in buckets.iter() {
    match store.find_party(abbreviation.to_owned()).await.map_err(Error::store)? {
      Some(party) => {
        by_party.insert(party.party_id, bucket);
      }
      None => warn!(party = abbreviation, "configured party is not stored; ignoring"),
    }
  }

  let subjects = store.list_subjects().await.map_err(Error::store)?;
  let mut splits = Vec::with_capacity(subjects.len());

  for subject in subjects {
    let mut split = SupportSplit::empty(subject.subject_id);
    for bill in store.subject_bills(subject.subject_id).await.map_err(Error::store)? {
      let sponsors = store.sponsors(bill.bill_id).await.map_err(Error::store)?;
      let cosponsors = store.cosponsors(bill.bill_id).await.map_err(Error::store)?;
      for legislator in sponsors.iter().chain(&cosponsors) {
        if let Some(bucket) = by_party.get(&legislator.seat.party_id()) {
          split.count(*bucket);
        }
      }
    }
    splits.push(split);
  }

  store
    .replace_support_splits(splits.clone())
    .await
    .map_err(Error::store)?;
  info!(subjects = splits.len(), "support splits rebuilt");
  Ok(splits)
}

#[cfg(test)]
mod tests {
  use billserve_core::{
    bill::NewBill,
    legislator::{NewLegislator, Seat},
  };
  use billserve_store_sqlite::SqliteStore;
  use chrono::Utc;

  use super::*;

  async fn tagged_bill(s: &SqliteStore, url: &str, subject: Uuid, parties: &[&str]) {
    let bill = s
      .get_or_create_bill(NewBill {
        url:               url.into(),
        bill_type:         "S".into(),
        number:            1,
        title:             "t".into(),
        congress:          115,
        introduced_at:     Utc::now(),
        last_modified:     None,
        origin_chamber_id: None,
        cbo_cost_estimate: None,
        policy_area_id:    None,
      })
      .await
      .unwrap()
      .value;
    s.add_bill_subject(bill.bill_id, subject).await.unwrap();

    let state = s.find_state("VT".into()).await.unwrap().unwrap();
    for (i, abbreviation) in parties.iter().enumerate() {
      let party = s.find_party((*abbreviation).into()).await.unwrap().unwrap();
      let legislator = s
        .get_or_create_legislator(NewLegislator {
          first_name: format!("Member{i}"),
          last_name:  (*abbreviation).into(),
          seat:       Seat::Senator {
            party_id:   party.party_id,
            state_id:   state.state_id,
            chamber_id: None,
          },
        })
        .await
        .unwrap()
        .value;
      s.add_sponsor(bill.bill_id, legislator.legislator_id).await.unwrap();
    }
  }

  #[tokio::test]
  async fn counts_by_bucket_and_skips_unmapped_parties() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let tax = s.get_or_create_subject("Taxation".into()).await.unwrap().value;
    tagged_bill(&s, "https://x/1.xml", tax.subject_id, &["D", "R", "I"]).await;
    tagged_bill(&s, "https://x/2.xml", tax.subject_id, &["ID", "L"]).await;

    let splits = rebuild(&s, &PartyBuckets::default()).await.unwrap();
    assert_eq!(splits.len(), 1);
    let split = &splits[0];
    assert_eq!((split.red_count, split.blue_count, split.white_count), (1, 1, 2));
  }

  #[tokio::test]
  async fn rebuild_is_idempotent() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let tax = s.get_or_create_subject("Taxation".into()).await.unwrap().value;
    let empty = s.get_or_create_subject("Fisheries".into()).await.unwrap().value;
    tagged_bill(&s, "https://x/1.xml", tax.subject_id, &["D", "R", "R"]).await;

    let first = rebuild(&s, &PartyBuckets::default()).await.unwrap();
    let second = rebuild(&s, &PartyBuckets::default()).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(s.support_splits().await.unwrap(), second);

    let fisheries = second.iter().find(|split| split.subject_id == empty.subject_id).unwrap();
    assert_eq!(fisheries.total(), 0);
  }

  #[tokio::test]
  async fn bucket_mapping_is_configurable() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let tax = s.get_or_create_subject("Taxation".into()).await.unwrap().value;
    tagged_bill(&s, "https://x/1.xml", tax.subject_id, &["L", "D"]).await;

    let buckets = PartyBuckets::new([("L".to_owned(), Bucket::Red), ("Q".to_owned(), Bucket::Blue)]);
    let splits = rebuild(&s, &buckets).await.unwrap();
    assert_eq!((splits[0].red_count, splits[0].blue_count, splits[0].white_count), (1, 0, 0));
  }
}

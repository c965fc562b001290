//! Party classification for the per-subject support split.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One of the three fixed classes a party is counted under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
  /// Republican.
  Red,
  /// Democrat.
  Blue,
  /// Independent.
  White,
}

/// Configured mapping from party abbreviation to [`Bucket`].
///
/// Parties absent from the mapping are not counted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyBuckets(BTreeMap<String, Bucket>);

impl Default for PartyBuckets {
  fn default() -> Self {
    Self(BTreeMap::from([
      ("I".to_owned(), Bucket::White),
      ("ID".to_owned(), Bucket::White),
      ("D".to_owned(), Bucket::Blue),
      ("R".to_owned(), Bucket::Red),
    ]))
  }
}

impl PartyBuckets {
  pub fn new(mapping: impl IntoIterator<Item = (String, Bucket)>) -> Self {
    Self(mapping.into_iter().collect())
  }

  pub fn bucket_for(&self, abbreviation: &str) -> Option<Bucket> {
    self.0.get(abbreviation).copied()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, Bucket)> {
    self.0.iter().map(|(k, v)| (k.as_str(), *v))
  }
}

/// Derived tallies of sponsor/cosponsor involvement for one subject.
///
/// Only ever produced by a full rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportSplit {
  pub subject_id:  Uuid,
  pub red_count:   u32,
  pub blue_count:  u32,
  pub white_count: u32,
}

impl SupportSplit {
  pub fn empty(subject_id: Uuid) -> Self {
    Self { subject_id, red_count: 0, blue_count: 0, white_count: 0 }
  }

  pub fn count(&mut self, bucket: Bucket) {
    match bucket {
      Bucket::Red => self.red_count += 1,
      Bucket::Blue => self.blue_count += 1,
      Bucket::White => self.white_count += 1,
    }
  }

  pub fn total(&self) -> u32 { self.red_count + self.blue_count + self.white_count }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_buckets_cover_the_three_classes() {
    let buckets = PartyBuckets::default();
    assert_eq!(buckets.bucket_for("R"), Some(Bucket::Red));
    assert_eq!(buckets.bucket_for("D"), Some(Bucket::Blue));
    assert_eq!(buckets.bucket_for("I"), Some(Bucket::White));
    assert_eq!(buckets.bucket_for("L"), None);
  }

  #[test]
  fn buckets_deserialize_from_a_plain_map() {
    let buckets: PartyBuckets =
      serde_json::from_str(r#"{"R":"red","D":"blue","L":"white"}"#).unwrap();
    assert_eq!(buckets.bucket_for("L"), Some(Bucket::White));
    assert_eq!(buckets.bucket_for("I"), None);
  }

  #[test]
  fn split_counts_per_bucket() {
    let mut split = SupportSplit::empty(Uuid::new_v4());
    split.count(Bucket::Red);
    split.count(Bucket::Red);
    split.count(Bucket::White);
    assert_eq!((split.red_count, split.blue_count, split.white_count), (2, 0, 1));
    assert_eq!(split.total(), 3);
  }
}

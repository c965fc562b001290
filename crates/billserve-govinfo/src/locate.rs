//! Where documents live.

use serde::Deserialize;

use crate::{DocumentSource, Result};

pub const DEFAULT_BASE_URL: &str = "https://www.govinfo.gov";

/// Builds document URLs from bill coordinates and reads bulk manifests.
#[derive(Debug, Clone)]
pub struct Locator {
  base_url: String,
}

impl Default for Locator {
  fn default() -> Self { Self::new(DEFAULT_BASE_URL) }
}

#[derive(Debug, Deserialize)]
struct Manifest {
  files: Vec<ManifestFile>,
}

#[derive(Debug, Deserialize)]
struct ManifestFile {
  link: String,
}

impl Locator {
  pub fn new(base_url: impl Into<String>) -> Self {
    let base_url = base_url.into().trim_end_matches('/').to_owned();
    Self { base_url }
  }

  /// The status document URL of one bill. `bill_type` is lower-cased.
  pub fn document_url(&self, congress: u32, bill_type: &str, number: u32) -> String {
    let bill_type = bill_type.to_lowercase();
    format!(
      "{}/bulkdata/BILLSTATUS/{congress}/{bill_type}/BILLSTATUS-{congress}{bill_type}{number}.xml",
      self.base_url
    )
  }

  /// Fetch a manifest and return its `files[].link` values in order.
  ///
  /// Duplicates are kept.
  pub async fn discover_documents<S: DocumentSource>(
    &self,
    source: &S,
    manifest_url: &str,
  ) -> Result<Vec<String>> {
    let body = source.fetch(manifest_url.to_owned()).await?;
    let manifest: Manifest = serde_json::from_slice(&body)?;
    tracing::debug!(manifest_url, files = manifest.files.len(), "manifest read");
    Ok(manifest.files.into_iter().map(|f| f.link).collect())
  }
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use super::*;
  use crate::Error;

  struct Fixed(HashMap<String, Vec<u8>>);

  impl DocumentSource for Fixed {
    async fn fetch(&self, url: String) -> Result<Vec<u8>> {
      self.0.get(&url).cloned().ok_or(Error::Transport { url, status: 404 })
    }
  }

  #[test]
  fn document_url_lowercases_type() {
    let locator = Locator::default();
    let url = locator.document_url(115, "HR", 996);
    assert_eq!(
      url,
      "https://www.govinfo.gov/bulkdata/BILLSTATUS/115/hr/BILLSTATUS-115hr996.xml"
    );
    assert!(url.contains("115hr996"));
    assert_eq!(locator.document_url(115, "hr", 996), url);
  }

  #[test]
  fn base_url_trailing_slash_is_ignored() {
    let locator = Locator::new("http://localhost:8080/");
    assert_eq!(
      locator.document_url(116, "SJRES", 3),
      "http://localhost:8080/bulkdata/BILLSTATUS/116/sjres/BILLSTATUS-116sjres3.xml"
    );
  }

  #[tokio::test]
  async fn discover_returns_links_in_order() {
    let manifest = br#"{"files":[{"link":"https://a/1.xml","name":"x"},{"link":"https://a/2.xml"},{"link":"https://a/1.xml"}]}"#;
    let source = Fixed(HashMap::from([("https://m/manifest".to_owned(), manifest.to_vec())]));

    let links = Locator::default()
      .discover_documents(&source, "https://m/manifest")
      .await
      .unwrap();
    assert_eq!(links, vec!["https://a/1.xml", "https://a/2.xml", "https://a/1.xml"]);
  }

  #[tokio::test]
  async fn malformed_manifest_is_rejected() {
    let source = Fixed(HashMap::from([("https://m/manifest".to_owned(), br#"{"entries":[]}"#.to_vec())]));
    let err = Locator::default()
      .discover_documents(&source, "https://m/manifest")
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Manifest(_)));
  }

  #[tokio::test]
  async fn missing_manifest_is_a_transport_error() {
    let source = Fixed(HashMap::new());
    let err = Locator::default()
      .discover_documents(&source, "https://m/manifest")
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Transport { status: 404, .. }));
  }
}

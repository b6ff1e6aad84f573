use std::io::{Cursor, Read};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::histogram;
use reqwest::Client;

use crate::error::IngestError;
use crate::ingest::types::FeedSource;

pub const DEFAULT_INDEX_URL: &str = "http://data.gdeltproject.org/gdeltv2/lastupdate.txt";

/// Index lines naming the events export archive contain this.
pub const EXPORT_ARCHIVE_MARKER: &str = "export.CSV.zip";

/// Archive entry holding the tab-separated export.
pub const EXPORT_ENTRY_SUFFIX: &str = ".export.CSV";

/// Downloads the newest export listed in the remote update index.
///
/// Two requests per fetch (index, then archive), no retries: the next
/// scheduled refresh is the retry.
pub struct GdeltHttpFeed {
    client: Client,
    index_url: String,
}

impl GdeltHttpFeed {
    pub fn new(index_url: impl Into<String>, timeout: Duration) -> Result<Self, IngestError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            index_url: index_url.into(),
        })
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, IngestError> {
        let bytes = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl FeedSource for GdeltHttpFeed {
    async fn fetch_latest(&self) -> Result<Vec<u8>, IngestError> {
        let t0 = Instant::now();

        let index = self.get_bytes(&self.index_url).await?;
        let archive_url = select_artifact_url(&String::from_utf8_lossy(&index))?;
        tracing::debug!(target: "ingest", url = %archive_url, "downloading export archive");

        let archive = self.get_bytes(&archive_url).await?;
        let data = extract_export_entry(&archive)?;

        histogram!("ingest_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        tracing::debug!(target: "ingest", bytes = data.len(), "export extracted");
        Ok(data)
    }

    fn name(&self) -> &'static str {
        "gdelt-http"
    }
}

/// Last whitespace-delimited token of the first line mentioning the export archive.
pub fn select_artifact_url(index: &str) -> Result<String, IngestError> {
    index
        .lines()
        .find(|line| line.contains(EXPORT_ARCHIVE_MARKER))
        .and_then(|line| line.split_whitespace().last())
        .map(str::to_string)
        .ok_or_else(|| IngestError::FeedIndex {
            marker: EXPORT_ARCHIVE_MARKER.to_string(),
        })
}

/// Upper bound on the buffer reserved up front from an entry's declared size.
const MAX_PREALLOC: u64 = 64 << 20;

/// Declared sizes come from the remote archive and are not trusted.
fn prealloc_hint(declared: u64) -> usize {
    declared.min(MAX_PREALLOC) as usize
}

/// Decompressed bytes of the first archive entry ending with the export suffix.
pub fn extract_export_entry(archive: &[u8]) -> Result<Vec<u8>, IngestError> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive))?;
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        if entry.name().ends_with(EXPORT_ENTRY_SUFFIX) {
            let mut out = Vec::with_capacity(prealloc_hint(entry.size()));
            entry.read_to_end(&mut out)?;
            return Ok(out);
        }
    }
    Err(IngestError::ArchiveContent {
        suffix: EXPORT_ENTRY_SUFFIX.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    /// Stored zip64 entry whose central-directory uncompressed size is
    /// rewritten to `u64::MAX`.
    fn zip_with_hostile_size(name: &str, body: &[u8]) -> Vec<u8> {
        let mut w = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let opts = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored)
            .large_file(true);
        w.start_file(name, opts).unwrap();
        w.write_all(body).unwrap();
        let mut bytes = w.finish().unwrap().into_inner();

        let u16_at = |b: &[u8], i: usize| u16::from_le_bytes([b[i], b[i + 1]]) as usize;
        let mut i = 0;
        while i + 46 <= bytes.len() {
            if bytes[i..i + 4] != [0x50, 0x4b, 0x01, 0x02] {
                i += 1;
                continue;
            }
            let name_len = u16_at(&bytes, i + 28);
            let extra_len = u16_at(&bytes, i + 30);
            let mut at = i + 46 + name_len;
            let end = at + extra_len;
            while at + 4 <= end {
                let (id, size) = (u16_at(&bytes, at), u16_at(&bytes, at + 2));
                if id == 0x0001 && size >= 8 {
                    bytes[i + 24..i + 28].copy_from_slice(&[0xff; 4]);
                    bytes[at + 4..at + 12].copy_from_slice(&[0xff; 8]);
                }
                at += 4 + size;
            }
            i = end;
        }
        bytes
    }

    fn zip_with(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut w = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in entries {
            w.start_file(*name, SimpleFileOptions::default()).unwrap();
            w.write_all(body).unwrap();
        }
        w.finish().unwrap().into_inner()
    }

    #[test]
    fn selects_last_token_of_export_line() {
        let index = "\
150383 297a16b493de7cf6ca809a7cc31d0b93 http://data.gdeltproject.org/gdeltv2/20240101120000.export.CSV.zip
318084 bb27f78ba45f69a17ea6ed7755e9f8ff http://data.gdeltproject.org/gdeltv2/20240101120000.mentions.CSV.zip
";
        assert_eq!(
            select_artifact_url(index).unwrap(),
            "http://data.gdeltproject.org/gdeltv2/20240101120000.export.CSV.zip"
        );
    }

    #[test]
    fn two_token_line_picks_the_url() {
        let index = "20240101120000.export.CSV.zip http://host/20240101120000.export.CSV.zip";
        assert_eq!(
            select_artifact_url(index).unwrap(),
            "http://host/20240101120000.export.CSV.zip"
        );
    }

    #[test]
    fn index_without_export_line_is_feed_index_error() {
        let index = "1 abc http://host/20240101120000.mentions.CSV.zip\n";
        assert!(matches!(
            select_artifact_url(index),
            Err(IngestError::FeedIndex { .. })
        ));
        assert!(matches!(select_artifact_url(""), Err(IngestError::FeedIndex { .. })));
    }

    #[test]
    fn extracts_first_matching_entry() {
        let archive = zip_with(&[
            ("README.txt", b"ignore me"),
            ("20240101120000.export.CSV", b"first"),
            ("20240101121500.export.CSV", b"second"),
        ]);
        assert_eq!(extract_export_entry(&archive).unwrap(), b"first".to_vec());
    }

    #[test]
    fn archive_without_export_entry_is_archive_content_error() {
        let archive = zip_with(&[("20240101120000.mentions.CSV", b"x")]);
        assert!(matches!(
            extract_export_entry(&archive),
            Err(IngestError::ArchiveContent { .. })
        ));
    }

    #[test]
    fn declared_size_only_caps_the_reservation() {
        assert_eq!(prealloc_hint(1024), 1024);
        assert_eq!(prealloc_hint(u64::MAX), MAX_PREALLOC as usize);
    }

    #[test]
    fn hostile_declared_size_does_not_panic() {
        let archive = zip_with_hostile_size("20240101120000.export.CSV", b"row");
        let outcome = std::panic::catch_unwind(|| extract_export_entry(&archive));
        assert!(outcome.is_ok(), "extraction panicked on a forged entry size");
    }

    #[test]
    fn garbage_archive_is_archive_error() {
        assert!(matches!(
            extract_export_entry(b"definitely not a zip"),
            Err(IngestError::Archive(_))
        ));
    }
}

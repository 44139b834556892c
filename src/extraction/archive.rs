//! Response archive parsing.
//!
//! The extraction service returns a ZIP archive holding exactly one JSON
//! manifest (located by suffix, not by a fixed name) plus zero or more
//! media entries referenced from the manifest by bare filename.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use crate::models::manifest::ExtractionManifest;
use crate::{AppError, Result};

/// Parsed extraction archive: the manifest plus its media entries.
#[derive(Debug, Clone)]
pub struct ExtractionArchive {
    manifest: ExtractionManifest,
    media: HashMap<String, Vec<u8>>,
}

impl ExtractionArchive {
    /// Parse raw archive bytes.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Format` when the bytes are not a readable ZIP,
    /// when no `.json` entry exists, when more than one exists, or when the
    /// manifest JSON does not parse.
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        let cursor = Cursor::new(raw);
        let mut archive = zip::ZipArchive::new(cursor)
            .map_err(|err| AppError::Format(format!("response is not a ZIP archive: {err}")))?;

        let mut manifest_bytes: Option<(String, Vec<u8>)> = None;
        let mut media: HashMap<String, Vec<u8>> = HashMap::new();

        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|err| AppError::Format(format!("unreadable archive entry: {err}")))?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_owned();
            let mut buf = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
            entry
                .read_to_end(&mut buf)
                .map_err(|err| AppError::Format(format!("failed to read entry {name}: {err}")))?;

            if name.ends_with(".json") {
                if let Some((first, _)) = &manifest_bytes {
                    return Err(AppError::Format(format!(
                        "archive has multiple manifest candidates: {first} and {name}"
                    )));
                }
                manifest_bytes = Some((name, buf));
            } else {
                media.insert(name, buf);
            }
        }

        let (_, raw_manifest) = manifest_bytes
            .ok_or_else(|| AppError::Format("archive contains no manifest entry".into()))?;
        let manifest = ExtractionManifest::from_json_slice(&raw_manifest)?;

        Ok(Self { manifest, media })
    }

    /// The parsed manifest.
    #[must_use]
    pub fn manifest(&self) -> &ExtractionManifest {
        &self.manifest
    }

    /// Look up a media entry by the exact filename the manifest referenced,
    /// falling back to its percent-decoded form — the service occasionally
    /// percent-encodes names on one side only.
    #[must_use]
    pub fn media(&self, file_name: &str) -> Option<&[u8]> {
        if let Some(bytes) = self.media.get(file_name) {
            return Some(bytes.as_slice());
        }
        let decoded = percent_decode(file_name);
        if decoded != file_name {
            return self.media.get(&decoded).map(Vec::as_slice);
        }
        None
    }

    /// Number of media entries in the archive.
    #[must_use]
    pub fn media_count(&self) -> usize {
        self.media.len()
    }
}

/// Decode `%XX` escapes; malformed escapes pass through untouched.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 3 <= bytes.len() {
            if let Some(hex) = bytes.get(i + 1..i + 3) {
                if let Ok(value) = u8::from_str_radix(&String::from_utf8_lossy(hex), 16) {
                    out.push(value);
                    i += 3;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

//! Document loading: raw transcription + optional content manifest.
//!
//! ## Layout
//!
//! The transcription service leaves one directory per corpus index:
//!
//! ```text
//! <raw_dir>/<index>/full.md                    raw Markdown (required)
//! <raw_dir>/<index>/<uuid>_content_list.json   typed element manifest (optional)
//! <raw_dir>/<index>/images/…                   page crops referenced by full.md
//! ```
//!
//! Markdown is read lossily: a stray invalid byte from the OCR service must
//! not fail a whole document. A manifest that does not parse is logged and
//! treated as absent, so the document still gets cleaned; only its tables
//! stay unresolved.

use crate::error::CleanError;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the raw transcription inside each index directory.
pub const MARKDOWN_FILE: &str = "full.md";

/// Suffix identifying the content manifest inside each index directory.
pub const MANIFEST_SUFFIX: &str = "content_list.json";

/// One source document, immutable after load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Stable corpus index.
    pub index: String,
    /// Raw transcribed Markdown.
    pub raw_text: String,
    /// Typed content elements, when the transcription service supplied them.
    pub manifest: Option<Vec<ContentListEntry>>,
}

impl Document {
    pub fn new(
        index: impl Into<String>,
        raw_text: impl Into<String>,
        manifest: Option<Vec<ContentListEntry>>,
    ) -> Self {
        Self {
            index: index.into(),
            raw_text: raw_text.into(),
            manifest,
        }
    }

    /// Manifest entries of kind [`ContentKind::Table`].
    pub fn tables(&self) -> impl Iterator<Item = &ContentListEntry> {
        self.manifest
            .iter()
            .flatten()
            .filter(|e| e.kind == ContentKind::Table)
    }
}

/// Kind of a manifest element. Kinds this engine does not act on
/// (equations, lists, …) are read as [`ContentKind::Text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Image,
    Table,
    #[serde(other)]
    Text,
}

/// A typed element from the transcription manifest.
///
/// Field aliases accept the MinerU `content_list.json` names directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentListEntry {
    #[serde(alias = "type")]
    pub kind: ContentKind,

    /// Row-major cell text; present for tables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_rows: Option<Vec<Vec<String>>>,

    /// Table markup as emitted by the layout service; used to derive
    /// `table_rows` when those are not supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_body: Option<String>,

    #[serde(
        default,
        alias = "table_caption",
        alias = "image_caption",
        deserialize_with = "text_or_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub caption: Option<String>,

    #[serde(
        default,
        alias = "table_footnote",
        alias = "image_footnote",
        deserialize_with = "text_or_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub footnote: Option<String>,

    /// Key linking the element to a placeholder in the raw text, typically
    /// the image path of the table crop.
    #[serde(default, alias = "img_path", skip_serializing_if = "Option::is_none")]
    pub position_hint: Option<String>,
}

impl ContentListEntry {
    /// Table rows, from `table_rows` or parsed out of `table_body`.
    pub fn rows(&self) -> Option<Vec<Vec<String>>> {
        if let Some(ref rows) = self.table_rows {
            return Some(rows.clone());
        }
        self.table_body
            .as_deref()
            .map(super::tables::rows_from_html)
            .filter(|rows| !rows.is_empty())
    }
}

/// Captions arrive either as a string or as a list of fragments.
fn text_or_list<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TextOrList {
        Text(String),
        List(Vec<Option<String>>),
    }

    let joined = match Option::<TextOrList>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(TextOrList::Text(s)) => s.trim().to_string(),
        Some(TextOrList::List(parts)) => parts
            .into_iter()
            .flatten()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
    };
    Ok(if joined.is_empty() { None } else { Some(joined) })
}

/// Parse a manifest from JSON: a bare list, or `{ "content_list": [...] }`.
pub fn parse_manifest(json: &str) -> Result<Vec<ContentListEntry>, serde_json::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ManifestFile {
        List(Vec<ContentListEntry>),
        Wrapped { content_list: Vec<ContentListEntry> },
    }

    Ok(match serde_json::from_str::<ManifestFile>(json)? {
        ManifestFile::List(entries) => entries,
        ManifestFile::Wrapped { content_list } => content_list,
    })
}

/// Directory holding the raw transcription for `index`.
pub fn document_dir(raw_dir: &Path, index: &str) -> PathBuf {
    raw_dir.join(index)
}

/// List the indices available under `raw_dir`, sorted.
///
/// An index is any sub-directory containing `full.md`.
pub async fn discover_indices(raw_dir: &Path) -> Result<Vec<String>, CleanError> {
    if !tokio::fs::try_exists(raw_dir).await.unwrap_or(false) {
        return Err(CleanError::RawDirNotFound {
            path: raw_dir.to_path_buf(),
        });
    }

    let mut entries = tokio::fs::read_dir(raw_dir)
        .await
        .map_err(|e| CleanError::ReadFailed {
            path: raw_dir.to_path_buf(),
            source: e,
        })?;

    let mut indices = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| CleanError::ReadFailed {
            path: raw_dir.to_path_buf(),
            source: e,
        })?
    {
        let path = entry.path();
        if !tokio::fs::try_exists(path.join(MARKDOWN_FILE))
            .await
            .unwrap_or(false)
        {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            indices.push(name.to_string());
        }
    }
    indices.sort();
    debug!("Discovered {} indices under {}", indices.len(), raw_dir.display());
    Ok(indices)
}

/// Load the raw Markdown and manifest for `index`.
pub async fn load_document(raw_dir: &Path, index: &str) -> Result<Document, CleanError> {
    let dir = document_dir(raw_dir, index);
    let md_path = dir.join(MARKDOWN_FILE);

    let bytes = match tokio::fs::read(&md_path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CleanError::MarkdownNotFound {
                index: index.to_string(),
                path: md_path,
            });
        }
        Err(e) => {
            return Err(CleanError::ReadFailed {
                path: md_path,
                source: e,
            });
        }
    };
    let raw_text = String::from_utf8_lossy(&bytes).into_owned();

    let manifest = match find_manifest(&dir).await {
        Some(path) => match load_manifest(&path).await {
            Ok(entries) => {
                debug!("Index {}: manifest with {} entries", index, entries.len());
                Some(entries)
            }
            Err(e) => {
                warn!("Index {}: ignoring manifest: {}", index, e);
                None
            }
        },
        None => None,
    };

    Ok(Document {
        index: index.to_string(),
        raw_text,
        manifest,
    })
}

/// Read and parse a manifest file.
pub async fn load_manifest(path: &Path) -> Result<Vec<ContentListEntry>, CleanError> {
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CleanError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    parse_manifest(&json).map_err(|e| CleanError::ManifestMalformed {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

/// First `*content_list.json` in `dir`, by name order for determinism.
async fn find_manifest(dir: &Path) -> Option<PathBuf> {
    let mut entries = tokio::fs::read_dir(dir).await.ok()?;
    let mut candidates = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let is_manifest = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(MANIFEST_SUFFIX));
        if is_manifest {
            candidates.push(path);
        }
    }
    candidates.sort();
    candidates.into_iter().next()
}

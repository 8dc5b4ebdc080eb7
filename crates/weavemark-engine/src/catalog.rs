//! Read-only catalog of building blocks, keyed by name.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::host::{BlockBody, BlockContent, ControlTemplate};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("building block not found: {0}")]
    NotFound(String),
    #[error("failed to read catalog file at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse catalog file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid block {name}: {reason}")]
    Invalid { name: String, reason: String },
}

/// Read-only lookup of insertable content by block name.
pub trait BlockCatalog {
    fn lookup(&self, name: &str) -> Result<&BlockContent, CatalogError>;

    fn names(&self) -> Vec<String>;
}

/// Catalog held in memory, optionally loaded from a TOML file:
///
/// ```toml
/// [[block]]
/// name = "ItemTemplate"
/// kind = "table"
/// rows = ["Title\tState"]
///
/// [[block.control]]
/// tag = "Title"
/// start = 0
/// end = 5
/// ```
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    blocks: BTreeMap<String, BlockContent>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, block: BlockContent) {
        self.blocks.insert(block.name.clone(), block);
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: CatalogFile =
            toml::from_str(&content).map_err(|source| CatalogError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let mut catalog = Self::new();
        for entry in file.blocks {
            catalog.insert(entry.into_block()?);
        }
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl BlockCatalog for MemoryCatalog {
    fn lookup(&self, name: &str) -> Result<&BlockContent, CatalogError> {
        self.blocks
            .get(name)
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))
    }

    fn names(&self) -> Vec<String> {
        self.blocks.keys().cloned().collect()
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default, rename = "block")]
    blocks: Vec<BlockEntry>,
}

#[derive(Debug, Deserialize)]
struct BlockEntry {
    name: String,
    kind: EntryKind,
    text: Option<String>,
    rows: Option<Vec<String>>,
    #[serde(default, rename = "control")]
    controls: Vec<ControlEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum EntryKind {
    Flow,
    Table,
}

#[derive(Debug, Deserialize)]
struct ControlEntry {
    tag: String,
    start: usize,
    end: usize,
}

impl BlockEntry {
    fn into_block(self) -> Result<BlockContent, CatalogError> {
        let body = match self.kind {
            EntryKind::Flow => {
                let Some(text) = self.text else {
                    return Err(CatalogError::Invalid {
                        name: self.name,
                        reason: "flow blocks need a text field".to_string(),
                    });
                };
                BlockBody::Flow(text)
            }
            EntryKind::Table => {
                let Some(rows) = self.rows else {
                    return Err(CatalogError::Invalid {
                        name: self.name,
                        reason: "table blocks need a rows field".to_string(),
                    });
                };
                if rows.is_empty() {
                    return Err(CatalogError::Invalid {
                        name: self.name,
                        reason: "table blocks need at least one row".to_string(),
                    });
                }
                BlockBody::Table(rows)
            }
        };
        Ok(BlockContent {
            name: self.name,
            body,
            controls: self
                .controls
                .into_iter()
                .map(|control| ControlTemplate {
                    tag: control.tag,
                    start: control.start,
                    end: control.end,
                })
                .collect(),
        })
    }
}

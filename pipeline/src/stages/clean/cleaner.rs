//! Format-specific record cleaners
//!
//! A cleaner turns parsed records into a lazy sequence of fragments, each
//! fragment being the node list for one payload file. Fragments are yielded
//! one at a time so memory stays bounded by fragment size, not source size.

use serde_json::{Map, Value};

use super::html;

/// Rows per Excel fragment
pub const DEFAULT_ROWS_PER_FILE: usize = 100;

/// Records per JSON fragment
pub const DEFAULT_NODES_PER_FILE: usize = 10;

/// Spreadsheet columns assembled into `page_content`
const CONTENT_COLUMNS: [&str; 3] = ["title", "summary", "content"];

/// Spreadsheet columns copied into node metadata
const METADATA_COLUMNS: [&str; 4] = [
    "author",
    "keyWord",
    "contentMentionRegionList",
    "insertDate",
];

/// Raw node data produced by a cleaner, before payload assembly
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSeed {
    pub page_content: String,
    pub metadata: Map<String, Value>,
}

pub trait Cleaner: Send + Sync {
    /// Lazily yield fragments of cleaned node data.
    fn clean(&self, records: Vec<Value>) -> Box<dyn Iterator<Item = Vec<NodeSeed>> + Send>;
}

/// Route a lower-cased extension to a cleaner; unknown formats fall back to
/// [`DefaultCleaner`].
pub fn cleaner_for_extension(ext: &str) -> Box<dyn Cleaner> {
    match ext {
        ".xlsx" | ".xls" => Box::new(ExcelCleaner::new(DEFAULT_ROWS_PER_FILE)),
        ".json" => Box::new(JsonCleaner::new(DEFAULT_NODES_PER_FILE)),
        _ => Box::new(DefaultCleaner),
    }
}

/// Fixed-size batching iterator shared by the row-oriented cleaners
struct Fragments<B> {
    rows: Vec<Value>,
    size: usize,
    index: usize,
    builder: B,
}

impl<B> Iterator for Fragments<B>
where
    B: FnMut(usize, &[Value]) -> Vec<NodeSeed>,
{
    type Item = Vec<NodeSeed>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.index * self.size;
        if start >= self.rows.len() {
            return None;
        }
        let end = (start + self.size).min(self.rows.len());
        let seeds = (self.builder)(self.index, &self.rows[start..end]);
        self.index += 1;
        Some(seeds)
    }
}

/// Excel cleaner: groups rows into fragments of `rows_per_file`, builds
/// `page_content` from the content columns as `"k: v | k: v"` stripped of
/// markup, and copies the configured metadata columns through.
pub struct ExcelCleaner {
    rows_per_file: usize,
}

impl ExcelCleaner {
    pub fn new(rows_per_file: usize) -> Self {
        Self {
            rows_per_file: rows_per_file.max(1),
        }
    }

    fn build_row(fragment_idx: usize, row_idx: usize, row: &Value) -> NodeSeed {
        let mut metadata = Map::new();
        let page_content = match row.as_object() {
            Some(fields) => {
                let raw = fields
                    .iter()
                    .filter(|(k, _)| CONTENT_COLUMNS.contains(&k.as_str()))
                    .map(|(k, v)| format!("{k}: {}", value_to_text(v)))
                    .collect::<Vec<_>>()
                    .join(" | ");
                for column in METADATA_COLUMNS {
                    if let Some(value) = fields.get(column) {
                        metadata.insert(column.to_string(), value.clone());
                    }
                }
                html::extract_text(&raw)
            }
            None => value_to_text(row),
        };
        metadata.insert(
            "internal_id".to_string(),
            Value::String(format!("part{fragment_idx}_{row_idx}")),
        );
        NodeSeed {
            page_content,
            metadata,
        }
    }
}

impl Cleaner for ExcelCleaner {
    fn clean(&self, records: Vec<Value>) -> Box<dyn Iterator<Item = Vec<NodeSeed>> + Send> {
        Box::new(Fragments {
            rows: records,
            size: self.rows_per_file,
            index: 0,
            builder: |fragment_idx, rows: &[Value]| {
                rows.iter()
                    .enumerate()
                    .map(|(j, row)| ExcelCleaner::build_row(fragment_idx, j, row))
                    .collect()
            },
        })
    }
}

/// JSON cleaner: groups list elements into fragments of `nodes_per_file`.
/// Object elements contribute their space-joined values as content and the
/// object itself as metadata; scalars stringify with empty metadata.
pub struct JsonCleaner {
    nodes_per_file: usize,
}

impl JsonCleaner {
    pub fn new(nodes_per_file: usize) -> Self {
        Self {
            nodes_per_file: nodes_per_file.max(1),
        }
    }
}

impl Cleaner for JsonCleaner {
    fn clean(&self, records: Vec<Value>) -> Box<dyn Iterator<Item = Vec<NodeSeed>> + Send> {
        let size = self.nodes_per_file;
        Box::new(Fragments {
            rows: records,
            size,
            index: 0,
            builder: move |fragment_idx, items: &[Value]| {
                items
                    .iter()
                    .enumerate()
                    .map(|(j, item)| {
                        let (page_content, mut metadata) = match item.as_object() {
                            Some(fields) => (
                                fields
                                    .values()
                                    .map(value_to_text)
                                    .collect::<Vec<_>>()
                                    .join(" "),
                                fields.clone(),
                            ),
                            None => (value_to_text(item), Map::new()),
                        };
                        metadata.insert(
                            "original_index".to_string(),
                            Value::from(fragment_idx * size + j),
                        );
                        metadata.insert(
                            "internal_id".to_string(),
                            Value::String(format!("part{fragment_idx}_{j}")),
                        );
                        NodeSeed {
                            page_content,
                            metadata,
                        }
                    })
                    .collect()
            },
        })
    }
}

/// Fallback cleaner: the stringified input as a single node in a single
/// fragment.
pub struct DefaultCleaner;

impl Cleaner for DefaultCleaner {
    fn clean(&self, records: Vec<Value>) -> Box<dyn Iterator<Item = Vec<NodeSeed>> + Send> {
        let text = serde_json::to_string(&Value::Array(records)).unwrap_or_default();
        let mut metadata = Map::new();
        metadata.insert(
            "internal_id".to_string(),
            Value::String("part0_0".to_string()),
        );
        Box::new(std::iter::once(vec![NodeSeed {
            page_content: text.trim().to_string(),
            metadata,
        }]))
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::collections::{BTreeMap, HashSet};
use std::io::Read;
use std::path::Path;

/// Column or key carrying the entity identifier.
pub const ID_FIELD: &str = "id";

/// Candidate record screened against compiled conditions.
///
/// Fields are kept as raw JSON so a malformed value only fails the conditions that read
/// it. `null` means the datum is unavailable, which is distinct from a violated criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl Entity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Absent and `null` fields both count as missing data.
    pub fn is_missing(&self, name: &str) -> bool {
        matches!(self.fields.get(name), None | Some(Value::Null))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EntityLoadError {
    #[error("failed to read entities: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid entity CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid entity JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("entity CSV has no `id` column")]
    MissingIdColumn,
    #[error("entity on row {row} has an empty identifier")]
    EmptyId { row: usize },
    #[error("entity identifier {0} appears more than once")]
    DuplicateId(String),
}

/// Load entities from a `.csv` or `.json` file, chosen by extension.
pub fn load_entities_from_path(path: &Path) -> Result<Vec<Entity>, EntityLoadError> {
    let file = std::fs::File::open(path)?;
    let is_csv = path
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("csv"));

    if is_csv {
        load_entities_csv(file)
    } else {
        load_entities_json(file)
    }
}

/// Load a JSON array of flat entity records.
pub fn load_entities_json<R: Read>(reader: R) -> Result<Vec<Entity>, EntityLoadError> {
    let entities: Vec<Entity> = serde_json::from_reader(reader)?;
    ensure_unique(&entities)?;
    Ok(entities)
}

/// Load entities from CSV with a header row.
///
/// Empty cells become `null`, `true`/`false` become booleans, numeric cells become
/// numbers, and anything else is kept as text.
pub fn load_entities_csv<R: Read>(reader: R) -> Result<Vec<Entity>, EntityLoadError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let id_index = headers
        .iter()
        .position(|header| header == ID_FIELD)
        .ok_or(EntityLoadError::MissingIdColumn)?;

    let mut entities = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        let record = record?;
        let id = record.get(id_index).unwrap_or_default();
        if id.is_empty() {
            return Err(EntityLoadError::EmptyId { row: index + 1 });
        }

        let fields = headers
            .iter()
            .zip(record.iter())
            .enumerate()
            .filter(|(column, _)| *column != id_index)
            .map(|(_, (header, cell))| (header.to_string(), parse_cell(cell)))
            .collect();

        entities.push(Entity {
            id: id.to_string(),
            fields,
        });
    }

    ensure_unique(&entities)?;
    Ok(entities)
}

fn parse_cell(cell: &str) -> Value {
    if cell.is_empty() || cell.eq_ignore_ascii_case("null") {
        return Value::Null;
    }

    match cell.to_ascii_lowercase().as_str() {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }

    cell.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(cell.to_string()))
}

pub(crate) fn ensure_unique(entities: &[Entity]) -> Result<(), EntityLoadError> {
    let mut seen = HashSet::new();
    for entity in entities {
        if !seen.insert(entity.id.as_str()) {
            return Err(EntityLoadError::DuplicateId(entity.id.clone()));
        }
    }
    Ok(())
}

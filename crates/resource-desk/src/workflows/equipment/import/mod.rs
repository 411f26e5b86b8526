mod normalizer;
mod parser;

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use serde::Serialize;

use crate::workflows::equipment::domain::{AssetTag, EquipmentRegistration};

pub(crate) use normalizer::equipment_type_for;

#[derive(Debug)]
pub enum ImportError {
    Io(std::io::Error),
    Csv(csv::Error),
}

impl std::fmt::Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportError::Io(err) => write!(f, "failed to read inventory export: {}", err),
            ImportError::Csv(err) => write!(f, "invalid inventory CSV data: {}", err),
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImportError::Io(err) => Some(err),
            ImportError::Csv(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Row left out of an import and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    /// 1-based data row, header excluded.
    pub row: usize,
    pub asset_tag: String,
    pub reason: String,
}

/// A registration together with the data row it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRegistration {
    pub row: usize,
    pub registration: EquipmentRegistration,
}

/// Registrations parsed from one export, ready to be applied to the register.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportBatch {
    pub registrations: Vec<ParsedRegistration>,
    pub skipped: Vec<SkippedRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub imported: Vec<AssetTag>,
    pub skipped: Vec<SkippedRow>,
}

/// Reads inventory exports with columns `Asset Tag, Type, Brand, Model,
/// Serial Number, Location` and an optional `Department`.
pub struct EquipmentImporter;

impl EquipmentImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<ImportBatch, ImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<ImportBatch, ImportError> {
        let mut batch = ImportBatch::default();
        let mut seen: HashSet<String> = HashSet::new();

        for (index, row) in parser::parse_rows(reader)?.into_iter().enumerate() {
            let row_number = index + 1;
            let asset_tag = row.asset_tag.trim().to_ascii_uppercase();
            let skip = |reason: String| SkippedRow {
                row: row_number,
                asset_tag: asset_tag.clone(),
                reason,
            };

            if asset_tag.is_empty() {
                batch.skipped.push(skip("missing asset tag".to_string()));
                continue;
            }
            let Some(equipment_type) = equipment_type_for(&row.equipment_type) else {
                batch.skipped.push(skip(format!(
                    "unknown equipment type '{}'",
                    row.equipment_type
                )));
                continue;
            };
            if !seen.insert(asset_tag.clone()) {
                batch
                    .skipped
                    .push(skip("asset tag repeated in this file".to_string()));
                continue;
            }

            batch.registrations.push(ParsedRegistration {
                row: row_number,
                registration: EquipmentRegistration {
                    asset_tag: AssetTag(asset_tag),
                    equipment_type,
                    brand: row.brand,
                    model: row.model,
                    serial_number: row.serial_number,
                    location: row.location,
                    department: row.department,
                },
            });
        }

        Ok(batch)
    }
}

use std::io::Read;

use serde::{Deserialize, Deserializer};

/// One inventory export row with blank cells collapsed to `None`.
#[derive(Debug, Deserialize)]
pub(crate) struct InventoryRow {
    #[serde(rename = "Asset Tag")]
    pub(crate) asset_tag: String,
    #[serde(rename = "Type")]
    pub(crate) equipment_type: String,
    #[serde(rename = "Brand", default, deserialize_with = "empty_string_as_none")]
    pub(crate) brand: Option<String>,
    #[serde(rename = "Model", default, deserialize_with = "empty_string_as_none")]
    pub(crate) model: Option<String>,
    #[serde(
        rename = "Serial Number",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub(crate) serial_number: Option<String>,
    #[serde(rename = "Location", default, deserialize_with = "empty_string_as_none")]
    pub(crate) location: Option<String>,
    #[serde(
        rename = "Department",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub(crate) department: Option<String>,
}

pub(crate) fn parse_rows<R: Read>(reader: R) -> Result<Vec<InventoryRow>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    csv_reader
        .deserialize::<InventoryRow>()
        .collect::<Result<Vec<_>, _>>()
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

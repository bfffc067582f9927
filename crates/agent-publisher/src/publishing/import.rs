//! Bulk listing import from spreadsheet exports.

use std::collections::BTreeMap;
use std::io::Read;

use serde::{Deserialize, Deserializer};

use super::domain::PropertyDraft;

#[derive(Debug, thiserror::Error)]
pub enum PropertyImportError {
    #[error("invalid listing CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: {reason}")]
    InvalidRow { row: usize, reason: String },
    #[error("listing CSV contained no rows")]
    Empty,
}

/// Parses `title,description,price,location,bedrooms,bathrooms,area_sqft,property_type,image_url`
/// rows into drafts. Row numbers in errors are 1-based and exclude the header.
pub fn parse_property_rows<R: Read>(reader: R) -> Result<Vec<PropertyDraft>, PropertyImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut drafts = Vec::new();

    for (index, record) in csv_reader.deserialize::<ListingRow>().enumerate() {
        let row = record?;
        let draft = row.into_draft();
        draft
            .validate()
            .map_err(|err| PropertyImportError::InvalidRow {
                row: index + 1,
                reason: err.to_string(),
            })?;
        drafts.push(draft);
    }

    if drafts.is_empty() {
        return Err(PropertyImportError::Empty);
    }
    Ok(drafts)
}

#[derive(Debug, Deserialize)]
struct ListingRow {
    title: String,
    #[serde(default)]
    description: String,
    price: f64,
    #[serde(default)]
    location: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    bedrooms: Option<u8>,
    #[serde(default, deserialize_with = "empty_as_none")]
    bathrooms: Option<f32>,
    #[serde(default, deserialize_with = "empty_as_none")]
    area_sqft: Option<u32>,
    #[serde(default, deserialize_with = "empty_as_none")]
    property_type: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    image_url: Option<String>,
}

impl ListingRow {
    fn into_draft(self) -> PropertyDraft {
        PropertyDraft {
            title: self.title,
            description: self.description,
            price: self.price,
            location: self.location,
            bedrooms: self.bedrooms,
            bathrooms: self.bathrooms,
            area_sqft: self.area_sqft,
            property_type: self.property_type,
            images: self.image_url.into_iter().collect(),
            translations: BTreeMap::new(),
        }
    }
}

fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    match opt.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(serde::de::Error::custom),
    }
}

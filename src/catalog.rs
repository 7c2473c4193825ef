//! Spectral line catalog.
//!
//! The catalog is the read-only input describing candidate lines: a rest
//! wavelength, the emitting ion and optional grouping metadata. It keeps
//! insertion order, which breaks ties between lines of equal wavelength.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpectraFitError};

/// A single catalog record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineEntry {
    /// Rest wavelength in meters
    pub wavelength: f64,

    /// Ion identity, e.g. `"ArXVII"`
    pub ion: String,

    /// Optional grouping key (element + ionization stage, multiplet name, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_key: Option<String>,

    /// Optional coefficient relative to the group's free variable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coefficient: Option<f64>,

    /// Display symbol used in ratio labels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,

    /// Ion mass in kg, needed for temperatures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mass: Option<f64>,

    /// Literature reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl LineEntry {
    /// Create an entry with only the mandatory fields.
    pub fn new(wavelength: f64, ion: &str) -> Self {
        Self {
            wavelength,
            ion: ion.to_string(),
            group_key: None,
            coefficient: None,
            symbol: None,
            mass: None,
            source: None,
        }
    }

    pub fn with_group_key(mut self, key: &str) -> Self {
        self.group_key = Some(key.to_string());
        self
    }

    pub fn with_coefficient(mut self, coefficient: f64) -> Self {
        self.coefficient = Some(coefficient);
        self
    }

    pub fn with_symbol(mut self, symbol: &str) -> Self {
        self.symbol = Some(symbol.to_string());
        self
    }

    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = Some(mass);
        self
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }
}

#[derive(Deserialize, Serialize)]
struct CatalogRecord {
    id: String,
    #[serde(flatten)]
    entry: LineEntry,
}

/// Ordered mapping from line identifier to [`LineEntry`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineCatalog {
    entries: Vec<(String, LineEntry)>,
}

impl LineCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a line. Identifiers must be unique and wavelengths finite and positive.
    pub fn insert(&mut self, id: &str, entry: LineEntry) -> Result<()> {
        if self.contains(id) {
            return Err(SpectraFitError::InvalidInput(format!(
                "duplicate line identifier `{}` in catalog",
                id
            )));
        }
        if !(entry.wavelength.is_finite() && entry.wavelength > 0.0) {
            return Err(SpectraFitError::InvalidInput(format!(
                "line `{}` has invalid wavelength {}",
                id, entry.wavelength
            )));
        }
        self.entries.push((id.to_string(), entry));
        Ok(())
    }

    /// Builder-style variant of [`insert`](Self::insert).
    pub fn with_line(mut self, id: &str, entry: LineEntry) -> Result<Self> {
        self.insert(id, entry)?;
        Ok(self)
    }

    pub fn get(&self, id: &str) -> Option<&LineEntry> {
        self.entries
            .iter()
            .find(|(key, _)| key == id)
            .map(|(_, entry)| entry)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &LineEntry)> {
        self.entries.iter().map(|(id, entry)| (id.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load a catalog from a JSON array of `{"id": ..., "wavelength": ..., "ion": ...}` records.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let records: Vec<CatalogRecord> = serde_json::from_str(json)?;
        let mut catalog = Self::new();
        for record in records {
            catalog.insert(&record.id, record.entry)?;
        }
        Ok(catalog)
    }

    pub fn to_json_string(&self) -> Result<String> {
        let records: Vec<CatalogRecord> = self
            .entries
            .iter()
            .map(|(id, entry)| CatalogRecord {
                id: id.clone(),
                entry: entry.clone(),
            })
            .collect();
        Ok(serde_json::to_string_pretty(&records)?)
    }
}

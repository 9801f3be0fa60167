//! Slide lists: the CSV of slides a feature-extraction run walks over.
//!
//! The file needs a `slide_id` column. A `case_id` column is read when
//! present; other columns are ignored. Both identifiers are kept as text, so
//! ids such as `007` survive unchanged.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::DatasetError;

/// One row of a slide list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SlideEntry {
    /// Patient or case the slide belongs to
    #[serde(default)]
    pub case_id: Option<String>,

    /// Slide identifier, usually the file stem
    pub slide_id: String,
}

/// All rows of a slide list, in file order.
#[derive(Debug, Clone, Default)]
pub struct SlideList {
    records: Vec<SlideEntry>,
}

impl SlideList {
    /// Load a slide list from a CSV file.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::Csv`] if the file cannot be opened, lacks a
    /// `slide_id` column, or has a malformed row.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let reader = csv::Reader::from_path(path)?;
        let list = Self::from_csv(reader)?;
        debug!(path = %path.display(), slides = list.len(), "loaded slide list");
        Ok(list)
    }

    /// Load a slide list from any reader yielding CSV text.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DatasetError> {
        Self::from_csv(csv::Reader::from_reader(reader))
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>) -> Result<Self, DatasetError> {
        let records = reader
            .deserialize()
            .collect::<Result<Vec<SlideEntry>, csv::Error>>()?;
        Ok(SlideList { records })
    }

    /// Number of slides.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Slide id of row `index`.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.records.get(index).map(|entry| entry.slide_id.as_str())
    }

    /// Full row `index`.
    pub fn entry(&self, index: usize) -> Option<&SlideEntry> {
        self.records.get(index)
    }

    /// Iterate over all rows.
    pub fn iter(&self) -> impl Iterator<Item = &SlideEntry> {
        self.records.iter()
    }
}

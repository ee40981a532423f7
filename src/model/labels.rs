use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{Category, ModelError};

/// Per-category code-to-label tables, one fitted independently per category
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelDecoders {
    classes: HashMap<String, Vec<String>>,
}

impl LabelDecoders {
    /// Decoders from explicit class lists
    pub fn new<I>(classes: I) -> Self
    where
        I: IntoIterator<Item = (Category, Vec<String>)>,
    {
        Self {
            classes: classes
                .into_iter()
                .map(|(c, labels)| (c.label().to_string(), labels))
                .collect(),
        }
    }

    /// Load a label decoder artifact, requiring every category
    pub fn from_json_path<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let file = File::open(path)?;
        let decoders: Self = serde_json::from_reader(BufReader::new(file))?;
        for category in Category::ALL {
            decoders.classes(category)?;
        }
        Ok(decoders)
    }

    /// Known labels of a category, indexed by code
    pub fn classes(&self, category: Category) -> Result<&[String], ModelError> {
        self.classes
            .get(category.label())
            .map(Vec::as_slice)
            .ok_or_else(|| ModelError::MissingDecoder(category.label().to_string()))
    }

    /// Label for a predicted code
    pub fn decode(&self, category: Category, code: usize) -> Result<&str, ModelError> {
        self.classes(category)?
            .get(code)
            .map(String::as_str)
            .ok_or_else(|| ModelError::UnknownCode {
                category: category.label().to_string(),
                code,
            })
    }
}

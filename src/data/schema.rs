//! Dataset schema: column names, types, label and sensitive attributes.
//!
//! The built-in preset describes the UCI Adult files (`adult.data` /
//! `adult.test`). Other datasets are described with a JSON file:
//!
//! ```json
//! {
//!   "columns": [{"name": "age", "kind": "numeric"}, {"name": "y", "kind": "categorical"}],
//!   "label": "y",
//!   "sensitive": ["sex"],
//!   "test_skip_rows": 1
//! }
//! ```

use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
    /// Suffix removed from raw values before encoding (Adult test labels end in `.`).
    #[serde(default)]
    pub strip_suffix: Option<String>,
}

impl ColumnSpec {
    fn new(name: &str, kind: ColumnKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            strip_suffix: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSchema {
    /// Columns in file order (the files carry no header).
    pub columns: Vec<ColumnSpec>,
    pub label: String,
    pub sensitive: Vec<String>,
    #[serde(default)]
    pub train_skip_rows: usize,
    #[serde(default)]
    pub test_skip_rows: usize,
}

impl DataSchema {
    /// The UCI Adult census income layout.
    pub fn adult() -> Self {
        use ColumnKind::{Categorical, Numeric};

        let mut columns = vec![
            ColumnSpec::new("Age", Numeric),
            ColumnSpec::new("Workclass", Categorical),
            ColumnSpec::new("fnlwgt", Numeric),
            ColumnSpec::new("Education", Categorical),
            ColumnSpec::new("Education-Num", Numeric),
            ColumnSpec::new("Marital Status", Categorical),
            ColumnSpec::new("Occupation", Categorical),
            ColumnSpec::new("Relationship", Categorical),
            ColumnSpec::new("Race", Categorical),
            ColumnSpec::new("Sex", Categorical),
            ColumnSpec::new("Capital Gain", Numeric),
            ColumnSpec::new("Capital Loss", Numeric),
            ColumnSpec::new("Hours per week", Numeric),
            ColumnSpec::new("Country", Categorical),
            ColumnSpec::new("Target", Categorical),
        ];
        if let Some(target) = columns.last_mut() {
            target.strip_suffix = Some(".".to_string());
        }

        Self {
            columns,
            label: "Target".to_string(),
            sensitive: vec!["Race".to_string(), "Sex".to_string()],
            train_skip_rows: 0,
            test_skip_rows: 1,
        }
    }

    /// Read and validate a JSON schema file.
    pub fn from_json_file(path: &Path) -> Result<Self, AppError> {
        let file = File::open(path)
            .map_err(|e| AppError::new(2, format!("Failed to open schema '{}': {e}", path.display())))?;
        let schema: DataSchema = serde_json::from_reader(file)
            .map_err(|e| AppError::new(2, format!("Invalid schema JSON '{}': {e}", path.display())))?;
        schema.validate()?;
        Ok(schema)
    }

    /// Check that the label and sensitive columns are part of the schema.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.columns.is_empty() {
            return Err(AppError::new(2, "Schema has no columns."));
        }
        let mut seen = HashSet::new();
        for col in &self.columns {
            if !seen.insert(col.name.as_str()) {
                return Err(AppError::new(2, format!("Duplicate column name in schema: `{}`", col.name)));
            }
        }
        if self.index_of(&self.label).is_none() {
            return Err(AppError::new(
                2,
                format!("Label column `{}` is not one of the schema columns.", self.label),
            ));
        }
        if self.sensitive.is_empty() {
            return Err(AppError::new(2, "At least one sensitive attribute column is required."));
        }
        for name in &self.sensitive {
            if self.index_of(name).is_none() {
                return Err(AppError::new(
                    2,
                    format!("Sensitive attribute column `{name}` is not one of the schema columns."),
                ));
            }
        }
        if self.columns.len() < 2 {
            return Err(AppError::new(2, "Schema needs at least one feature column besides the label."));
        }
        Ok(())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

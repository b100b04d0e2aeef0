//! CSV-backed data provider.
//!
//! Both files are read and encoded once, in [`CsvDataProvider::open`], so a
//! missing file or a schema mismatch surfaces before any trial starts.

use std::path::Path;

use nalgebra::DMatrix;
use tracing::info;

use crate::data::DataProvider;
use crate::data::bias::inject_label_bias;
use crate::data::encode::{CategoryMapping, combine_codes, label_encode};
use crate::data::schema::DataSchema;
use crate::domain::Dataset;
use crate::error::AppError;
use crate::io::ingest::{RawColumn, RawTable, read_table};
use crate::models::Classifier;

#[derive(Debug, Clone)]
pub struct CsvDataProvider {
    schema: DataSchema,
    train: Dataset,
    test: Dataset,
    label_mapping: CategoryMapping,
}

impl CsvDataProvider {
    pub fn open(schema: DataSchema, train_path: &Path, test_path: &Path) -> Result<Self, AppError> {
        schema.validate()?;
        for path in [train_path, test_path] {
            if !path.is_file() {
                return Err(AppError::new(
                    2,
                    format!("Data file not found: '{}'.", path.display()),
                ));
            }
        }

        let train_raw = read_table(train_path, &schema, schema.train_skip_rows)?;
        let test_raw = read_table(test_path, &schema, schema.test_skip_rows)?;
        info!(
            train_rows = train_raw.n_rows(),
            test_rows = test_raw.n_rows(),
            train_skipped = train_raw.row_errors.len(),
            test_skipped = test_raw.row_errors.len(),
            "Loaded CSV data"
        );

        let (train, test, label_mapping) = encode_tables(&schema, &train_raw, &test_raw)?;
        Ok(Self {
            schema,
            train,
            test,
            label_mapping,
        })
    }

    pub fn schema(&self) -> &DataSchema {
        &self.schema
    }

    /// Label categories; index 1 is the positive class.
    pub fn label_categories(&self) -> &[String] {
        self.label_mapping.categories()
    }
}

impl DataProvider for CsvDataProvider {
    fn training_data(&self) -> Result<Dataset, AppError> {
        Ok(self.train.clone())
    }

    fn test_data(&self) -> Result<Dataset, AppError> {
        Ok(self.test.clone())
    }

    fn training_data_label_bias(
        &self,
        flip_rate: f64,
        confidence_threshold: f64,
        reference: &dyn Classifier,
        seed: u64,
    ) -> Result<Dataset, AppError> {
        inject_label_bias(&self.train, flip_rate, confidence_threshold, reference, seed)
    }
}

/// Encode both tables consistently: categorical codes and group ids come from
/// the training split, extended by values only the test split has.
fn encode_tables(
    schema: &DataSchema,
    train: &RawTable,
    test: &RawTable,
) -> Result<(Dataset, Dataset, CategoryMapping), AppError> {
    let n_train = train.n_rows();
    let n_test = test.n_rows();

    let mut feature_names = Vec::new();
    let mut train_cols: Vec<Vec<f64>> = Vec::new();
    let mut test_cols: Vec<Vec<f64>> = Vec::new();
    let mut train_codes: Vec<Option<Vec<u32>>> = Vec::new();
    let mut test_codes: Vec<Option<Vec<u32>>> = Vec::new();
    let mut label_mapping = None;

    for (idx, spec) in schema.columns.iter().enumerate() {
        match (&train.columns[idx], &test.columns[idx]) {
            (RawColumn::Numeric(a), RawColumn::Numeric(b)) => {
                train_codes.push(None);
                test_codes.push(None);
                if spec.name != schema.label {
                    feature_names.push(spec.name.clone());
                    train_cols.push(a.clone());
                    test_cols.push(b.clone());
                }
            }
            (RawColumn::Categorical(a), RawColumn::Categorical(b)) => {
                let (a_codes, mapping) = label_encode(a);
                if spec.name == schema.label {
                    label_mapping = Some(mapping.clone());
                }
                let (b_codes, _) = mapping.encode_extending(b);
                if spec.name != schema.label {
                    feature_names.push(spec.name.clone());
                    train_cols.push(a_codes.iter().map(|&c| f64::from(c)).collect());
                    test_cols.push(b_codes.iter().map(|&c| f64::from(c)).collect());
                }
                train_codes.push(Some(a_codes));
                test_codes.push(Some(b_codes));
            }
            _ => return Err(AppError::new(4, format!("Column `{}` has mixed types.", spec.name))),
        }
    }

    let label_idx = column_index(schema, &schema.label)?;
    let (train_labels, test_labels) = match (&train_codes[label_idx], &test_codes[label_idx]) {
        (Some(a), Some(b)) => (a.clone(), b.clone()),
        _ => {
            return Err(AppError::new(
                2,
                format!("Label column `{}` must be categorical.", schema.label),
            ));
        }
    };
    let label_mapping = label_mapping
        .ok_or_else(|| AppError::new(2, format!("Label column `{}` must be categorical.", schema.label)))?;
    if label_mapping.len() != 2 {
        return Err(AppError::new(
            2,
            format!(
                "Label column `{}` must have exactly two classes in the training data, found {:?}.",
                schema.label,
                label_mapping.categories()
            ),
        ));
    }
    if let Some(&bad) = test_labels.iter().find(|&&c| c > 1) {
        return Err(AppError::new(
            2,
            format!("Test labels contain a class unseen in training (code {bad})."),
        ));
    }

    // Group ids over the concatenated splits so both share one numbering.
    let mut sensitive_cols = Vec::with_capacity(schema.sensitive.len());
    for name in &schema.sensitive {
        let idx = column_index(schema, name)?;
        let codes = match (&train_codes[idx], &test_codes[idx], &train.columns[idx], &test.columns[idx]) {
            (Some(a), Some(b), _, _) => a.iter().chain(b).copied().collect(),
            (_, _, RawColumn::Numeric(a), RawColumn::Numeric(b)) => {
                let values: Vec<String> = a.iter().chain(b).map(|v| v.to_string()).collect();
                label_encode(&values).0
            }
            _ => return Err(AppError::new(4, format!("Column `{name}` has mixed types."))),
        };
        sensitive_cols.push(codes);
    }
    let groups = combine_codes(&sensitive_cols);
    let (train_groups, test_groups) = groups.split_at(n_train);

    let train_set = Dataset::new(
        feature_names.clone(),
        column_major(n_train, &train_cols),
        train_labels,
        train_groups.to_vec(),
    )?;
    let test_set = Dataset::new(
        feature_names,
        column_major(n_test, &test_cols),
        test_labels,
        test_groups.to_vec(),
    )?;
    Ok((train_set, test_set, label_mapping))
}

fn column_index(schema: &DataSchema, name: &str) -> Result<usize, AppError> {
    schema
        .index_of(name)
        .ok_or_else(|| AppError::new(2, format!("Column `{name}` is not in the schema.")))
}

fn column_major(n_rows: usize, columns: &[Vec<f64>]) -> DMatrix<f64> {
    DMatrix::from_fn(n_rows, columns.len(), |i, j| columns[j][i])
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::data::schema::{ColumnKind, ColumnSpec};

    fn schema() -> DataSchema {
        let col = |name: &str, kind| ColumnSpec {
            name: name.to_string(),
            kind,
            strip_suffix: None,
        };
        let mut target = col("target", ColumnKind::Categorical);
        target.strip_suffix = Some(".".to_string());
        DataSchema {
            columns: vec![
                col("age", ColumnKind::Numeric),
                col("race", ColumnKind::Categorical),
                col("sex", ColumnKind::Categorical),
                target,
            ],
            label: "target".to_string(),
            sensitive: vec!["race".to_string(), "sex".to_string()],
            train_skip_rows: 0,
            test_skip_rows: 1,
        }
    }

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn open(train: &str, test: &str) -> Result<CsvDataProvider, AppError> {
        let train = write_csv(train);
        let test = write_csv(test);
        CsvDataProvider::open(schema(), train.path(), test.path())
    }

    const TRAIN: &str = "\
39, White, Male, <=50K
50, Black, Female, >50K
28, White, Female, <=50K
45, Black, Male, >50K
";

    #[test]
    fn label_is_binary_and_excluded_from_features() {
        let provider = open(TRAIN, "|header\n33, White, Male, >50K.\n").unwrap();
        let train = provider.training_data().unwrap();
        assert_eq!(train.feature_names, vec!["age", "race", "sex"]);
        assert_eq!(train.labels, vec![0, 1, 0, 1]);
        assert_eq!(provider.label_categories(), &["<=50K".to_string(), ">50K".to_string()]);

        let test = provider.test_data().unwrap();
        assert_eq!(test.labels, vec![1]);
    }

    #[test]
    fn groups_are_shared_between_splits() {
        let provider = open(TRAIN, "|header\n33, White, Male, >50K.\n21, Asian, Male, <=50K.\n").unwrap();
        let train = provider.training_data().unwrap();
        let test = provider.test_data().unwrap();
        // (White, Male) has the same id in both splits.
        assert_eq!(test.sensitive[0], train.sensitive[0]);
        // Asian is unseen in training and gets a fresh id.
        assert!(!train.sensitive.contains(&test.sensitive[1]));
        // Unseen categorical values get codes past the training ones.
        assert_eq!(test.features[(1, 1)], 2.0);
    }

    #[test]
    fn missing_file_fails_fast() {
        let test = write_csv("33, White, Male, >50K.\n");
        let err = CsvDataProvider::open(schema(), Path::new("/no/such/adult.data"), test.path()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn single_class_label_is_rejected() {
        let err = open("39, White, Male, <=50K\n", "|h\n1, White, Male, <=50K.\n").unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn unknown_sensitive_column_is_rejected() {
        let mut bad = schema();
        bad.sensitive = vec!["religion".to_string()];
        let train = write_csv(TRAIN);
        let err = CsvDataProvider::open(bad, train.path(), train.path()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}

//! Parquet to frame reading at the data-acquisition boundary.
//!
//! One parquet file per group. Rows with a null in any declared feature
//! column are skipped and their identifiers collected, mirroring the
//! acquisition layer's per-track skip policy; the orchestrator logs the
//! drop rate instead of the failures disappearing silently.

use std::fs::File;

use arrow_array::{Array, Float64Array, Int32Array, Int64Array, RecordBatch, StringArray};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::{debug, info};

use tastebud_domain::{Column, FeaturesConfig, Frame, GroupConfig, Result, TasteError};

const ID_COLUMN: &str = "id";

/// One group's rows plus the identifiers of rows dropped for nulls.
#[derive(Clone, Debug)]
pub struct GroupFrame {
    pub frame: Frame,
    pub skipped: Vec<String>,
}

enum Values {
    Float(Vec<f64>),
    Int(Vec<i64>),
}

/// Reads one group file into a frame holding the declared categorical
/// columns (as integers), the declared numeric columns (as floats), and
/// the target column. The file's own target values are used when the
/// column exists; otherwise every row is labeled with the group name.
pub fn read_group(features: &FeaturesConfig, group: &GroupConfig) -> Result<GroupFrame> {
    let file = File::open(&group.data_path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|err| TasteError::Schema(format!("parquet open: {}", err)))?
        .build()
        .map_err(|err| TasteError::Schema(format!("parquet read: {}", err)))?;

    let mut categorical: Vec<(String, Vec<i64>)> = features
        .categorical_features
        .iter()
        .map(|name| (name.clone(), Vec::new()))
        .collect();
    let mut numerical: Vec<(String, Vec<f64>)> = features
        .numerical_features
        .iter()
        .map(|name| (name.clone(), Vec::new()))
        .collect();
    let mut targets: Vec<String> = Vec::new();
    let mut skipped: Vec<String> = Vec::new();
    let mut row_counter = 0usize;

    for batch in reader {
        let batch = batch.map_err(|err| TasteError::Schema(format!("parquet batch: {}", err)))?;
        append_batch(
            features,
            group,
            &batch,
            &mut categorical,
            &mut numerical,
            &mut targets,
            &mut skipped,
            &mut row_counter,
        )?;
    }

    let mut frame = Frame::new();
    for (name, values) in categorical {
        frame.push_column(name, Column::Int(values))?;
    }
    for (name, values) in numerical {
        frame.push_column(name, Column::Float(values))?;
    }
    frame.push_column(features.target.clone(), Column::Str(targets))?;

    debug!(
        group = %group.name,
        rows = frame.n_rows(),
        skipped = skipped.len(),
        "read group file"
    );
    Ok(GroupFrame { frame, skipped })
}

#[allow(clippy::too_many_arguments)]
fn append_batch(
    features: &FeaturesConfig,
    group: &GroupConfig,
    batch: &RecordBatch,
    categorical: &mut [(String, Vec<i64>)],
    numerical: &mut [(String, Vec<f64>)],
    targets: &mut Vec<String>,
    skipped: &mut Vec<String>,
    row_counter: &mut usize,
) -> Result<()> {
    let feature_names: Vec<&str> = features
        .categorical_features
        .iter()
        .chain(&features.numerical_features)
        .map(String::as_str)
        .collect();
    let feature_arrays: Vec<&dyn Array> = feature_names
        .iter()
        .map(|&name| {
            batch
                .column_by_name(name)
                .map(|array| array.as_ref())
                .ok_or_else(|| {
                    TasteError::Configuration(format!(
                        "declared column '{}' is absent from {}",
                        name,
                        group.data_path.display()
                    ))
                })
        })
        .collect::<Result<_>>()?;

    let target_array = batch
        .column_by_name(&features.target)
        .map(|array| {
            array
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| {
                    TasteError::Schema(format!(
                        "target column '{}' is not string-typed",
                        features.target
                    ))
                })
        })
        .transpose()?;
    let id_array = batch
        .column_by_name(ID_COLUMN)
        .and_then(|array| array.as_any().downcast_ref::<StringArray>());

    for row in 0..batch.num_rows() {
        let row_label = *row_counter;
        *row_counter += 1;

        let has_null = feature_arrays.iter().any(|array| array.is_null(row))
            || target_array.map(|array| array.is_null(row)).unwrap_or(false);
        if has_null {
            let identifier = id_array
                .filter(|array| !array.is_null(row))
                .map(|array| array.value(row).to_string())
                .unwrap_or_else(|| format!("{}:{}", group.name, row_label));
            skipped.push(identifier);
            continue;
        }

        for (index, (name, values)) in categorical.iter_mut().enumerate() {
            values.push(int_value(feature_arrays[index], row, name)?);
        }
        let offset = categorical.len();
        for (index, (name, values)) in numerical.iter_mut().enumerate() {
            values.push(float_value(feature_arrays[offset + index], row, name)?);
        }
        match target_array {
            Some(array) => targets.push(array.value(row).to_string()),
            None => targets.push(group.name.clone()),
        }
    }
    Ok(())
}

fn int_value(array: &dyn Array, row: usize, name: &str) -> Result<i64> {
    if let Some(values) = array.as_any().downcast_ref::<Int64Array>() {
        return Ok(values.value(row));
    }
    if let Some(values) = array.as_any().downcast_ref::<Int32Array>() {
        return Ok(values.value(row) as i64);
    }
    Err(TasteError::Schema(format!(
        "categorical column '{}' is not integer-typed",
        name
    )))
}

fn float_value(array: &dyn Array, row: usize, name: &str) -> Result<f64> {
    if let Some(values) = array.as_any().downcast_ref::<Float64Array>() {
        return Ok(values.value(row));
    }
    if let Some(values) = array.as_any().downcast_ref::<Int64Array>() {
        return Ok(values.value(row) as f64);
    }
    if let Some(values) = array.as_any().downcast_ref::<Int32Array>() {
        return Ok(values.value(row) as f64);
    }
    Err(TasteError::Schema(format!(
        "numeric column '{}' is not numeric",
        name
    )))
}

/// Reads and concatenates every configured group. Returns the combined
/// frame and all skipped-row identifiers.
pub fn load_dataset(
    features: &FeaturesConfig,
    groups: &[GroupConfig],
) -> Result<(Frame, Vec<String>)> {
    let mut frames = Vec::with_capacity(groups.len());
    let mut skipped = Vec::new();
    for group in groups {
        let group_frame = read_group(features, group)?;
        info!(
            group = %group.name,
            rows = group_frame.frame.n_rows(),
            skipped = group_frame.skipped.len(),
            "loaded group"
        );
        frames.push(group_frame.frame);
        skipped.extend(group_frame.skipped);
    }
    let combined = Frame::concat(&frames)?;
    Ok((combined, skipped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Arc;

    use arrow_array::ArrayRef;
    use arrow_schema::{DataType, Field, Schema};
    use parquet::arrow::ArrowWriter;

    fn features_config() -> FeaturesConfig {
        let mut categorical_labels = HashMap::new();
        categorical_labels.insert("key".to_string(), (0..12).collect());
        FeaturesConfig {
            target: "LABEL".into(),
            categorical_features: vec!["key".into()],
            numerical_features: vec!["energy".into()],
            one_hot_encode_categorical: true,
            normalize_numerical: true,
            categorical_labels,
        }
    }

    fn write_parquet(
        path: &Path,
        ids: Vec<Option<&str>>,
        keys: Vec<Option<i64>>,
        energies: Vec<Option<f64>>,
        labels: Option<Vec<&str>>,
    ) {
        let mut fields = vec![
            Field::new("id", DataType::Utf8, true),
            Field::new("key", DataType::Int64, true),
            Field::new("energy", DataType::Float64, true),
        ];
        let mut columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(Int64Array::from(keys)),
            Arc::new(Float64Array::from(energies)),
        ];
        if let Some(labels) = labels {
            fields.push(Field::new("LABEL", DataType::Utf8, true));
            columns.push(Arc::new(StringArray::from(labels)));
        }
        let schema = Arc::new(Schema::new(fields));
        let batch = RecordBatch::try_new(schema.clone(), columns).unwrap();
        let file = File::create(path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
    }

    #[test]
    fn reads_rows_and_collects_null_skips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alice_songs.parquet");
        write_parquet(
            &path,
            vec![Some("t1"), Some("t2"), Some("t3")],
            vec![Some(0), Some(5), Some(7)],
            vec![Some(0.4), None, Some(0.9)],
            Some(vec!["alice", "alice", "alice"]),
        );
        let group = GroupConfig {
            name: "alice".into(),
            data_path: path,
        };
        let result = read_group(&features_config(), &group).unwrap();
        assert_eq!(result.frame.n_rows(), 2);
        assert_eq!(result.skipped, vec!["t2".to_string()]);
        assert_eq!(
            result.frame.column("key"),
            Some(&Column::Int(vec![0, 7]))
        );
        assert_eq!(
            result.frame.str_column("LABEL").unwrap(),
            &["alice".to_string(), "alice".to_string()]
        );
    }

    #[test]
    fn fills_group_name_when_target_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bob_songs.parquet");
        write_parquet(
            &path,
            vec![Some("t1")],
            vec![Some(3)],
            vec![Some(0.2)],
            None,
        );
        let group = GroupConfig {
            name: "bob".into(),
            data_path: path,
        };
        let result = read_group(&features_config(), &group).unwrap();
        assert_eq!(
            result.frame.str_column("LABEL").unwrap(),
            &["bob".to_string()]
        );
    }

    #[test]
    fn missing_declared_column_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.parquet");
        write_parquet(
            &path,
            vec![Some("t1")],
            vec![Some(3)],
            vec![Some(0.2)],
            Some(vec!["alice"]),
        );
        let mut features = features_config();
        features.numerical_features.push("tempo".into());
        let group = GroupConfig {
            name: "alice".into(),
            data_path: path,
        };
        assert!(matches!(
            read_group(&features, &group),
            Err(TasteError::Configuration(_))
        ));
    }

    #[test]
    fn load_dataset_concatenates_groups() {
        let dir = tempfile::tempdir().unwrap();
        let alice = dir.path().join("alice_songs.parquet");
        let bob = dir.path().join("bob_songs.parquet");
        write_parquet(
            &alice,
            vec![Some("a1"), Some("a2")],
            vec![Some(0), Some(1)],
            vec![Some(0.8), Some(0.7)],
            Some(vec!["alice", "alice"]),
        );
        write_parquet(
            &bob,
            vec![Some("b1")],
            vec![Some(2)],
            vec![Some(0.1)],
            Some(vec!["bob"]),
        );
        let groups = vec![
            GroupConfig {
                name: "alice".into(),
                data_path: alice,
            },
            GroupConfig {
                name: "bob".into(),
                data_path: bob,
            },
        ];
        let (frame, skipped) = load_dataset(&features_config(), &groups).unwrap();
        assert_eq!(frame.n_rows(), 3);
        assert!(skipped.is_empty());
        let labels = frame.str_column("LABEL").unwrap();
        assert_eq!(labels.last().unwrap(), "bob");
    }
}

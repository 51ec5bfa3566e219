use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, UInt64Array};
use arrow::csv::WriterBuilder;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use datafusion::common::{Column, DFSchema};
use datafusion::error::DataFusionError;
use datafusion::prelude::{CsvReadOptions, Expr, JoinType, SessionConfig, SessionContext};

use crate::adapters::bridge;
use crate::handlers::join::{JoinEngine, JoinInputs};

pub const INDEX_COLUMN: &str = "index";

const LEFT_TABLE: &str = "join1";
const RIGHT_TABLE: &str = "join2";

/// Fully materialized join output.
#[derive(Debug, Clone)]
pub struct JoinedTable {
    pub schema: SchemaRef,
    pub batches: Vec<RecordBatch>,
}

impl JoinedTable {
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.schema
            .fields()
            .iter()
            .map(|field| field.name().clone())
            .collect()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DataFusionJoinEngine;

impl JoinEngine for DataFusionJoinEngine {
    fn inner_join(&self, inputs: &JoinInputs<'_>) -> Result<JoinedTable, String> {
        let mut target_partitions = 1usize;
        for path in [inputs.left, inputs.right] {
            let file_len = std::fs::metadata(path)
                .map_err(|error| format!("failed to stat '{}': {error}", path.display()))?
                .len();
            target_partitions =
                target_partitions.max(inputs.partition_size.partitions_for(file_len));
        }

        bridge::block_on(execute_join(inputs, target_partitions))?
            .map_err(|error| format!("join execution failed: {error}"))
    }
}

async fn execute_join(
    inputs: &JoinInputs<'_>,
    target_partitions: usize,
) -> Result<JoinedTable, DataFusionError> {
    let min_partition_bytes = usize::try_from(inputs.partition_size.bytes()).unwrap_or(usize::MAX);
    let config = SessionConfig::new()
        .with_target_partitions(target_partitions)
        .with_repartition_file_scans(true)
        .with_repartition_file_min_size(min_partition_bytes);
    let ctx = SessionContext::new_with_config(config);

    ctx.register_csv(LEFT_TABLE, path_str(inputs.left)?, CsvReadOptions::new())
        .await?;
    ctx.register_csv(RIGHT_TABLE, path_str(inputs.right)?, CsvReadOptions::new())
        .await?;

    let left = ctx.table(LEFT_TABLE).await?;
    let right = ctx.table(RIGHT_TABLE).await?;
    let projection = merged_projection(left.schema(), right.schema(), inputs.key);

    let joined = left
        .join(right, JoinType::Inner, &[inputs.key], &[inputs.key], None)?
        .select(projection)?;
    let schema = Arc::clone(joined.schema().inner());
    let batches = joined.collect().await?;

    Ok(JoinedTable { schema, batches })
}

fn path_str(path: &Path) -> Result<&str, DataFusionError> {
    path.to_str().ok_or_else(|| {
        DataFusionError::Execution(format!("non UTF-8 input path: {}", path.display()))
    })
}

/// Key once, then left columns, then right columns; clashing names get `_x` / `_y`.
fn merged_projection(left: &DFSchema, right: &DFSchema, key: &str) -> Vec<Expr> {
    let mut projection = Vec::with_capacity(left.fields().len() + right.fields().len());

    for (qualifier, field) in left.iter() {
        let name = field.name();
        let column = Expr::Column(Column::new(qualifier.cloned(), name));
        if name != key && right.has_column_with_unqualified_name(name) {
            projection.push(column.alias(format!("{name}_x")));
        } else {
            projection.push(column);
        }
    }

    for (qualifier, field) in right.iter() {
        let name = field.name();
        if name == key {
            continue;
        }
        let column = Expr::Column(Column::new(qualifier.cloned(), name));
        if left.has_column_with_unqualified_name(name) {
            projection.push(column.alias(format!("{name}_y")));
        } else {
            projection.push(column);
        }
    }

    projection
}

/// Prepends a contiguous `index` column numbering rows across all batches.
pub fn reset_row_index(table: JoinedTable) -> Result<JoinedTable, String> {
    if table.schema.column_with_name(INDEX_COLUMN).is_some() {
        return Err(format!(
            "cannot insert '{INDEX_COLUMN}' column, it already exists"
        ));
    }

    let source_schema = table
        .batches
        .first()
        .map(RecordBatch::schema)
        .unwrap_or_else(|| Arc::clone(&table.schema));
    let mut fields = vec![Arc::new(Field::new(INDEX_COLUMN, DataType::UInt64, false))];
    fields.extend(source_schema.fields().iter().cloned());
    let schema = Arc::new(Schema::new(fields));

    let mut next_index = 0u64;
    let mut batches = Vec::with_capacity(table.batches.len());
    for batch in table.batches {
        let rows = batch.num_rows() as u64;
        let mut columns: Vec<ArrayRef> = Vec::with_capacity(batch.num_columns() + 1);
        columns.push(Arc::new(UInt64Array::from_iter_values(
            next_index..next_index + rows,
        )));
        columns.extend(batch.columns().iter().cloned());
        batches.push(
            RecordBatch::try_new(Arc::clone(&schema), columns)
                .map_err(|error| format!("failed to attach row index: {error}"))?,
        );
        next_index += rows;
    }

    Ok(JoinedTable { schema, batches })
}

/// Writes the table as CSV with a header row, also when it has no rows.
pub fn write_csv(table: &JoinedTable, path: &Path) -> Result<(), String> {
    let file = File::create(path)
        .map_err(|error| format!("failed to create '{}': {error}", path.display()))?;
    let mut writer = WriterBuilder::new().with_header(true).build(file);

    if table.batches.is_empty() {
        writer
            .write(&RecordBatch::new_empty(Arc::clone(&table.schema)))
            .map_err(|error| format!("failed to write csv header: {error}"))?;
    }
    for batch in &table.batches {
        writer
            .write(batch)
            .map_err(|error| format!("failed to write csv rows: {error}"))?;
    }
    Ok(())
}

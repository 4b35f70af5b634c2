// src/table.rs

use arrow::{
    array::{ArrayRef, Date32Array, Float64Array, Int64Array, StringArray},
    record_batch::RecordBatch,
};
use chrono::{Datelike, NaiveDate};
use std::sync::Arc;

use crate::error::{IngestError, Result};
use crate::schema::{build_arrow_schema, FamilySchema};
use crate::transform::values::Cell;

/// `NaiveDate::num_days_from_ce` of 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// A typed, canonical table ready for the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    index: Vec<String>,
    batch: RecordBatch,
}

/// A typed row of one family's canonical table.
pub trait CanonicalRow: Sized {
    /// Column arrays for `rows`, in the family schema's field order.
    fn to_arrays(rows: &[Self]) -> Vec<ArrayRef>;
    /// Identity key, used for deduplication and logging.
    fn identity(&self) -> String;
}

impl Table {
    /// Wrap a batch, checking that every identity column exists.
    pub fn new(index: Vec<String>, batch: RecordBatch) -> Result<Self> {
        for name in &index {
            if batch.schema().column_with_name(name).is_none() {
                return Err(IngestError::store(
                    "<table>",
                    format!("identity column `{}` not in table", name),
                ));
            }
        }
        Ok(Self { index, batch })
    }

    pub fn from_rows<R: CanonicalRow>(schema: &FamilySchema, rows: &[R]) -> Result<Self> {
        Self::from_arrays(schema, R::to_arrays(rows))
    }

    pub fn from_arrays(schema: &FamilySchema, arrays: Vec<ArrayRef>) -> Result<Self> {
        let batch = RecordBatch::try_new(build_arrow_schema(schema), arrays)
            .map_err(|e| IngestError::store(schema.family.key(), e))?;
        Self::new(schema.index.clone(), batch)
    }

    pub fn index(&self) -> &[String] {
        &self.index
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }
}

pub fn date_to_days(d: NaiveDate) -> i32 {
    d.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

pub fn date_array(values: impl Iterator<Item = Option<NaiveDate>>) -> ArrayRef {
    Arc::new(Date32Array::from(
        values.map(|d| d.map(date_to_days)).collect::<Vec<_>>(),
    ))
}

pub fn float_array(values: impl Iterator<Item = Option<f64>>) -> ArrayRef {
    Arc::new(Float64Array::from(values.collect::<Vec<_>>()))
}

pub fn int_array(values: impl Iterator<Item = Option<i64>>) -> ArrayRef {
    Arc::new(Int64Array::from(values.collect::<Vec<_>>()))
}

pub fn text_array<'a>(values: impl Iterator<Item = Option<&'a str>>) -> ArrayRef {
    Arc::new(StringArray::from(values.collect::<Vec<_>>()))
}

/// Mixed cells serialized as JSON text.
pub fn mixed_array<'a>(values: impl Iterator<Item = Option<&'a Cell>>) -> ArrayRef {
    let json: Vec<Option<String>> = values
        .map(|c| c.and_then(|c| serde_json::to_string(c).ok()))
        .collect();
    Arc::new(StringArray::from(json))
}

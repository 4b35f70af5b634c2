// src/schema/arrow.rs

use arrow::datatypes::{DataType, Field as ArrowField, Schema as ArrowSchema};
use std::{collections::HashMap, sync::Arc};

use super::types::{FamilySchema, FieldType};

/// Field metadata key marking a column that is stored in a generic encoding.
pub const ENCODING_KEY: &str = "refdata.encoding";
/// Value of [`ENCODING_KEY`] for JSON-serialized cells.
pub const JSON_ENCODING: &str = "json";
/// Schema metadata key holding the comma-separated identity columns.
pub const INDEX_KEY: &str = "refdata.index";

/// Map a canonical field type onto the Arrow type it is stored as.
///
/// - Date    → Date32
/// - Utf8    → Utf8
/// - Float64 → Float64
/// - Int64   → Int64
/// - Mixed   → Utf8 (JSON text, flagged in field metadata)
pub fn map_to_arrow_type(ty: FieldType) -> DataType {
    match ty {
        FieldType::Date => DataType::Date32,
        FieldType::Utf8 | FieldType::Mixed => DataType::Utf8,
        FieldType::Float64 => DataType::Float64,
        FieldType::Int64 => DataType::Int64,
    }
}

/// Build an ArrowSchema (inside an Arc) from a family schema.
///
/// Identity columns are non-nullable; everything else may be null.
pub fn build_arrow_schema(schema: &FamilySchema) -> Arc<ArrowSchema> {
    let fields: Vec<ArrowField> = schema
        .fields
        .iter()
        .map(|spec| {
            let nullable = !schema.index.contains(&spec.name);
            let field = ArrowField::new(&spec.name, map_to_arrow_type(spec.ty), nullable);
            if spec.ty == FieldType::Mixed {
                field.with_metadata(HashMap::from([(
                    ENCODING_KEY.to_string(),
                    JSON_ENCODING.to_string(),
                )]))
            } else {
                field
            }
        })
        .collect();

    Arc::new(ArrowSchema::new(fields))
}

/// True when the field was written with the generic JSON fallback.
pub fn is_serialized_fallback(field: &ArrowField) -> bool {
    field
        .metadata()
        .get(ENCODING_KEY)
        .is_some_and(|v| v == JSON_ENCODING)
}

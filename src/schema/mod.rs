pub mod arrow;
pub mod normalize;
pub mod types;

pub use self::arrow::{build_arrow_schema, is_serialized_fallback, map_to_arrow_type};
pub use normalize::{normalize, normalize_header, NormalizedTable};
pub use types::{Family, FamilySchema, FieldSpec, FieldType};

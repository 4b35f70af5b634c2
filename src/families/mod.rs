// src/families/mod.rs

pub mod equities;
pub mod index;
pub mod instruments;
pub mod macro_assets;
pub mod prices;

use crate::config::Config;
use crate::error::Result;
use crate::schema::{Family, FamilySchema, NormalizedTable};
use crate::transform::Transformed;

/// Canonical schema of `family` under `config`.
///
/// Series-feed families take their column names and header aliases from
/// the configured series.
pub fn schema(family: Family, config: &Config) -> FamilySchema {
    match family {
        Family::WikiPrices => prices::schema(),
        Family::WikiStocks => instruments::schema(),
        Family::IndexPrices => index::level_schema(&config.families.index_prices),
        Family::IndexStocks => index::constituents_schema(),
        Family::Equities => equities::schema(),
        Family::MacroAssets => macro_assets::schema(&config.families.macro_assets),
    }
}

/// Type and clean a normalized table into the family's canonical table.
pub fn transform(schema: &FamilySchema, table: NormalizedTable) -> Result<Transformed> {
    match schema.family {
        Family::WikiPrices => prices::transform(schema, table),
        Family::WikiStocks => instruments::transform(schema, table),
        Family::IndexPrices => index::transform_levels(schema, table),
        Family::IndexStocks => index::transform_constituents(schema, table),
        Family::Equities => equities::transform(schema, table),
        Family::MacroAssets => macro_assets::transform(schema, table),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::build_arrow_schema;

    #[test]
    fn identity_columns_lead_every_schema() {
        let cfg = Config::default();
        for family in Family::ALL {
            let s = schema(family, &cfg);
            assert_eq!(s.family, family);
            let leading: Vec<&str> = s.fields[..s.index.len()]
                .iter()
                .map(|f| f.name.as_str())
                .collect();
            assert_eq!(leading, s.index, "{family}");
            assert!(s.index.iter().all(|i| s.field(i).is_some_and(|f| f.required)));
            let arrow = build_arrow_schema(&s);
            assert_eq!(arrow.fields().len(), s.fields.len());
        }
    }

    #[test]
    fn only_prices_reject_duplicates() {
        let cfg = Config::default();
        let strict: Vec<Family> = Family::ALL
            .into_iter()
            .filter(|f| schema(*f, &cfg).strict_index)
            .collect();
        assert_eq!(strict, vec![Family::WikiPrices]);
    }
}

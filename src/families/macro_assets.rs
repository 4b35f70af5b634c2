// src/families/macro_assets.rs

use tracing::debug;

use crate::config::FeedConfig;
use crate::error::Result;
use crate::schema::{Family, FamilySchema, FieldSpec, FieldType, NormalizedTable};
use crate::table::{date_array, float_array, Table};
use crate::transform::{coerce_rows, resample_business_mean, Transformed};

/// `date` plus one column per configured series, named by its label.
pub fn schema(feed: &FeedConfig) -> FamilySchema {
    let mut fields = vec![FieldSpec::required("date", FieldType::Date)];
    fields.extend(feed.series.iter().map(|s| {
        FieldSpec::optional(s.column(), FieldType::Float64).alias(&s.id)
    }));
    FamilySchema::new(Family::MacroAssets, &["date"], fields)
}

/// Outer-joined series resampled onto business days.
pub fn transform(schema: &FamilySchema, table: NormalizedTable) -> Result<Transformed> {
    let series: Vec<&str> = schema.fields[1..].iter().map(|f| f.name.as_str()).collect();
    let (points, excluded) = coerce_rows(schema.family, &table, |r| {
        let values = series
            .iter()
            .map(|name| r.number(name))
            .collect::<Result<Vec<_>>>()?;
        Ok((r.date("date")?, values))
    });

    let observed = points.len();
    let bins = resample_business_mean(series.len(), points);
    debug!(family = %schema.family, observed, bins = bins.len(), "resampled to business days");

    let mut arrays = Vec::with_capacity(series.len() + 1);
    arrays.push(date_array(bins.iter().map(|(d, _)| Some(*d))));
    for i in 0..series.len() {
        arrays.push(float_array(bins.iter().map(|(_, v)| v[i])));
    }

    Ok(Transformed {
        table: Table::from_arrays(schema, arrays)?,
        excluded: table.excluded + excluded,
    })
}

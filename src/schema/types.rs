// src/schema/types.rs

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The source families the pipeline knows how to ingest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    WikiPrices,
    WikiStocks,
    IndexPrices,
    IndexStocks,
    Equities,
    MacroAssets,
}

impl Family {
    /// Run order of a full pipeline pass.
    pub const ALL: [Family; 6] = [
        Family::WikiPrices,
        Family::WikiStocks,
        Family::IndexPrices,
        Family::IndexStocks,
        Family::Equities,
        Family::MacroAssets,
    ];

    /// Hierarchical store key the family's table lives under.
    pub fn key(&self) -> &'static str {
        match self {
            Family::WikiPrices => "wiki/prices",
            Family::WikiStocks => "wiki/stocks",
            Family::IndexPrices => "index/prices",
            Family::IndexStocks => "index/stocks",
            Family::Equities => "equities/stocks",
            Family::MacroAssets => "macro/assets",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Family::WikiPrices => "wiki_prices",
            Family::WikiStocks => "wiki_stocks",
            Family::IndexPrices => "index_prices",
            Family::IndexStocks => "index_stocks",
            Family::Equities => "equities",
            Family::MacroAssets => "macro_assets",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Family {
    type Err = String;

    /// Accepts either the snake_case name or the store key.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Family::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s) || f.key() == s)
            .ok_or_else(|| format!("unknown family `{}`", s))
    }
}

/// Semantic type of a canonical column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Date,
    Utf8,
    Float64,
    Int64,
    /// Cells of differing kinds (integer, number, text) in one column.
    Mixed,
}

/// One canonical column of a family schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    /// Source header spellings accepted for this column, besides `name`.
    pub aliases: Vec<String>,
    pub ty: FieldType,
    pub required: bool,
}

impl FieldSpec {
    pub fn required(name: &str, ty: FieldType) -> Self {
        Self {
            name: name.to_string(),
            aliases: Vec::new(),
            ty,
            required: true,
        }
    }

    pub fn optional(name: &str, ty: FieldType) -> Self {
        Self {
            required: false,
            ..Self::required(name, ty)
        }
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    /// Canonical name followed by every alias.
    pub fn accepted_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

/// Explicit shape of one family's canonical table.
#[derive(Clone, Debug)]
pub struct FamilySchema {
    pub family: Family,
    /// Columns in canonical order; identity columns come first.
    pub fields: Vec<FieldSpec>,
    /// Identity column names, in key order.
    pub index: Vec<String>,
    /// Source columns that exist only for human navigation.
    pub drop: Vec<String>,
    /// Sort by the identity key and reject duplicates instead of deduplicating.
    pub strict_index: bool,
}

impl FamilySchema {
    pub fn new(family: Family, index: &[&str], fields: Vec<FieldSpec>) -> Self {
        Self {
            family,
            fields,
            index: index.iter().map(|s| s.to_string()).collect(),
            drop: Vec::new(),
            strict_index: false,
        }
    }

    pub fn dropping(mut self, columns: &[&str]) -> Self {
        self.drop.extend(columns.iter().map(|s| s.to_string()));
        self
    }

    pub fn strict(mut self) -> Self {
        self.strict_index = true;
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

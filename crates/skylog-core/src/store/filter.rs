use std::collections::BTreeMap;
use std::str::FromStr;

use rusqlite::params_from_iter;

use crate::error::{Result, SkylogError};
use crate::record::{ImageType, StoredImage};

use super::images::query_images;
use super::Store;

/// A dimension images can be selected by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Facet {
    Night,
    Target,
    /// Telescope and focal length, e.g. "RedCat 51 250mm".
    Telescope,
    Instrument,
    Filter,
}

impl Facet {
    pub const ALL: [Facet; 5] = [
        Facet::Night,
        Facet::Target,
        Facet::Telescope,
        Facet::Instrument,
        Facet::Filter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Night => "night",
            Self::Target => "target",
            Self::Telescope => "telescope",
            Self::Instrument => "instrument",
            Self::Filter => "filter",
        }
    }

    /// Value of this facet for a row of `images`.
    fn sql(&self) -> &'static str {
        match self {
            Self::Night => {
                "(SELECT n.session_date FROM night_session_images n WHERE n.image_id = images.id)"
            }
            Self::Target => "target",
            Self::Telescope => {
                "(CASE WHEN focal_length IS NULL THEN telescope \
                  ELSE telescope || ' ' || printf('%g', focal_length) || 'mm' END)"
            }
            Self::Instrument => "instrument",
            Self::Filter => "filter_name",
        }
    }
}

impl std::fmt::Display for Facet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Facet {
    type Err = SkylogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "night" | "session" => Ok(Self::Night),
            "target" | "object" => Ok(Self::Target),
            "telescope" => Ok(Self::Telescope),
            "instrument" | "camera" => Ok(Self::Instrument),
            "filter" => Ok(Self::Filter),
            other => Err(SkylogError::InvalidFilter(format!("unknown facet {other:?}"))),
        }
    }
}

/// Image selection. Values of one facet are alternatives; different facets
/// must all match. An empty filter selects every image.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImageFilter {
    facets: BTreeMap<Facet, Vec<String>>,
    image_types: Vec<ImageType>,
}

impl ImageFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, facet: Facet, value: impl Into<String>) -> Self {
        self.add(facet, value);
        self
    }

    pub fn add(&mut self, facet: Facet, value: impl Into<String>) {
        let values = self.facets.entry(facet).or_default();
        let value = value.into();
        if !values.contains(&value) {
            values.push(value);
        }
    }

    /// Restrict to these image types.
    pub fn with_types(mut self, types: &[ImageType]) -> Self {
        for t in types {
            if !self.image_types.contains(t) {
                self.image_types.push(*t);
            }
        }
        self
    }

    /// Parse a `facet=value` clause, e.g. `target=M 31`.
    pub fn parse_clause(text: &str) -> Result<(Facet, String)> {
        let (facet, value) = text
            .split_once('=')
            .ok_or_else(|| SkylogError::InvalidFilter(format!("expected facet=value, got {text:?}")))?;
        let value = value.trim();
        if value.is_empty() {
            return Err(SkylogError::InvalidFilter(format!("empty value in {text:?}")));
        }
        Ok((facet.parse()?, value.to_string()))
    }

    pub fn values(&self, facet: Facet) -> &[String] {
        self.facets.get(&facet).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.facets.is_empty() && self.image_types.is_empty()
    }

    /// `WHERE` clause and its positional parameters.
    fn to_sql(&self) -> (String, Vec<String>) {
        let mut clauses = Vec::new();
        let mut params = Vec::new();

        for (facet, values) in &self.facets {
            let marks = vec!["?"; values.len()].join(", ");
            clauses.push(format!("{} IN ({marks})", facet.sql()));
            params.extend(values.iter().cloned());
        }
        if !self.image_types.is_empty() {
            let marks = vec!["?"; self.image_types.len()].join(", ");
            clauses.push(format!("image_type IN ({marks})"));
            params.extend(self.image_types.iter().map(|t| t.as_str().to_string()));
        }

        if clauses.is_empty() {
            (String::new(), params)
        } else {
            (format!("WHERE {}", clauses.join(" AND ")), params)
        }
    }
}

impl Store {
    /// Images matching `filter`, in capture order.
    pub fn filter_images(&self, filter: &ImageFilter) -> Result<Vec<StoredImage>> {
        let (clause, params) = filter.to_sql();
        self.call(move |conn| {
            query_images(
                conn,
                &format!("{clause} ORDER BY create_time, id"),
                params_from_iter(params.iter()),
            )
        })
    }

    /// Distinct values a facet takes across the catalog, sorted.
    pub fn facet_values(&self, facet: Facet) -> Result<Vec<String>> {
        self.call(move |conn| {
            let sql = format!(
                "SELECT DISTINCT {expr} FROM images WHERE {expr} IS NOT NULL ORDER BY 1",
                expr = facet.sql()
            );
            let mut stmt = conn.prepare(&sql)?;
            let values = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(values)
        })
    }
}

//! Domain types used by the retrievers, the reranker and the pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Position of a record in the corpus as loaded. Vector and lexical indexes
/// are addressed by the same offsets.
pub type RowIndex = usize;

/// One movie of the corpus.
///
/// Records are produced by the offline ingestion step and never mutated by the
/// retrieval core. List fields are stored comma-joined (`"Comedy, Drama"`) in
/// the raw table; both that form and JSON arrays deserialize here. Unknown
/// ratings are `0.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieRecord {
    #[serde(default, deserialize_with = "lenient::int")]
    pub id: i64,
    pub title: String,
    #[serde(default, deserialize_with = "lenient::int")]
    pub year: i32,
    #[serde(default, deserialize_with = "lenient::float")]
    pub imdb_rating: f32,
    #[serde(default, deserialize_with = "lenient::float")]
    pub metascore: f32,
    #[serde(default, deserialize_with = "lenient::list")]
    pub genres: Vec<String>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub directors: Vec<String>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub stars: Vec<String>,
    #[serde(default)]
    pub plot: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pg_rating: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl MovieRecord {
    /// Text the lexical index tokenizes. Empty until the offline build has
    /// populated `generated_summary`.
    pub fn summary_text(&self) -> &str {
        self.generated_summary.as_deref().unwrap_or("")
    }

    pub fn has_summary(&self) -> bool {
        self.generated_summary.as_deref().is_some_and(|s| !s.trim().is_empty())
    }

    /// Text embedded into the vector index: genres, stars, directors, summary.
    pub fn embedding_text(&self) -> String {
        format!(
            "{}. {}. {}. {}",
            join(&self.genres),
            join(&self.stars),
            join(&self.directors),
            self.summary_text()
        )
    }
}

/// Comma-join a list field the way the raw table stores it.
pub fn join(items: &[String]) -> String {
    items.join(", ")
}

/// A record projected out of the corpus together with the row it came from.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub row: RowIndex,
    pub record: &'a MovieRecord,
}

/// Indicates which engine produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceKind {
    Vector,
    Text,
}

/// The minimal surface returned by both retrievers.
///
/// `score` is engine-specific but higher is always better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub row: RowIndex,
    pub score: f32,
    pub source: SourceKind,
}

/// A filter field as received from query understanding.
///
/// `Malformed` keeps the reason so the filter stage can report it before
/// skipping itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FilterValue<T> {
    #[default]
    Absent,
    Value(T),
    Malformed(String),
}

impl<T> FilterValue<T> {
    /// `Ok(None)` when absent, `Err(FilterMismatch)` when malformed.
    pub fn get(&self) -> Result<Option<&T>> {
        match self {
            Self::Absent => Ok(None),
            Self::Value(v) => Ok(Some(v)),
            Self::Malformed(reason) => Err(Error::FilterMismatch(reason.clone())),
        }
    }
}

/// Inclusive year range; either bound may be unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct YearRange {
    pub start: Option<i32>,
    pub end: Option<i32>,
}

impl YearRange {
    pub fn new(start: Option<i32>, end: Option<i32>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, year: i32) -> bool {
        self.start.map_or(true, |s| year >= s) && self.end.map_or(true, |e| year <= e)
    }
}

/// Structured preferences extracted from the user's free-text query.
///
/// Wire shape: `{liked_genres, disliked_genres, liked_stars, disliked_stars,
/// liked_directors, disliked_directors, liked_years: [start|false, end|false],
/// liked_rating}`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    #[serde(deserialize_with = "lenient::list")]
    pub liked_genres: Vec<String>,
    #[serde(deserialize_with = "lenient::list")]
    pub disliked_genres: Vec<String>,
    #[serde(deserialize_with = "lenient::list")]
    pub liked_stars: Vec<String>,
    #[serde(deserialize_with = "lenient::list")]
    pub disliked_stars: Vec<String>,
    #[serde(deserialize_with = "lenient::list")]
    pub liked_directors: Vec<String>,
    #[serde(deserialize_with = "lenient::list")]
    pub disliked_directors: Vec<String>,
    #[serde(deserialize_with = "lenient::year_range")]
    pub liked_years: FilterValue<YearRange>,
    #[serde(deserialize_with = "lenient::rating")]
    pub liked_rating: FilterValue<f32>,
}

impl FilterSpec {
    /// Parse query-understanding output. Accepts a bare object or a
    /// one-element array wrapping it.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text.trim())
            .map_err(|e| Error::FilterMismatch(format!("filter spec is not JSON: {e}")))?;
        let object = match value {
            serde_json::Value::Array(mut items) => {
                if items.is_empty() {
                    return Err(Error::FilterMismatch("filter spec array is empty".into()));
                }
                items.swap_remove(0)
            }
            other => other,
        };
        serde_json::from_value(object)
            .map_err(|e| Error::FilterMismatch(format!("filter spec has an unexpected shape: {e}")))
    }
}

/// Which optional filter stages run. Genre stages always run; the others are
/// off unless a deployer turns them on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterPolicy {
    pub stars: bool,
    pub directors: bool,
    pub years: bool,
    pub rating: bool,
}

/// Tolerant deserializers for scraped data and LLM output.
mod lenient {
    use super::{FilterValue, YearRange};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        let items = match Option::<Value>::deserialize(d)? {
            Some(Value::String(s)) => s.split(',').map(str::to_string).collect(),
            Some(Value::Array(values)) => values
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect(),
            _ => Vec::new(),
        };
        Ok(items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect())
    }

    pub fn float<'de, D: Deserializer<'de>>(d: D) -> Result<f32, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        Ok(value.as_ref().and_then(number).map_or(0.0, |n| n as f32))
    }

    pub fn int<'de, D, T>(d: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<i64> + Default,
    {
        let value = Option::<Value>::deserialize(d)?;
        let n = value.as_ref().and_then(number).map_or(0, |n| n as i64);
        Ok(T::try_from(n).unwrap_or_default())
    }

    pub fn year_range<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<FilterValue<YearRange>, D::Error> {
        let value = match Option::<Value>::deserialize(d)? {
            None | Some(Value::Null | Value::Bool(false)) => return Ok(FilterValue::Absent),
            Some(v) => v,
        };
        let Value::Array(bounds) = &value else {
            return Ok(FilterValue::Malformed(format!("liked_years is not a list: {value}")));
        };
        let (start, end) = match bounds.as_slice() {
            [] => return Ok(FilterValue::Absent),
            [start, end] => match (bound(start), bound(end)) {
                (Some(s), Some(e)) => (s, e),
                _ => {
                    return Ok(FilterValue::Malformed(format!(
                        "liked_years bounds must be years or false: {value}"
                    )))
                }
            },
            _ => {
                return Ok(FilterValue::Malformed(format!(
                    "liked_years must have exactly two bounds: {value}"
                )))
            }
        };
        Ok(match (start, end) {
            (None, None) => FilterValue::Absent,
            (Some(s), Some(e)) if s > e => {
                FilterValue::Malformed(format!("liked_years starts after it ends: {s} > {e}"))
            }
            _ => FilterValue::Value(YearRange::new(start, end)),
        })
    }

    pub fn rating<'de, D: Deserializer<'de>>(d: D) -> Result<FilterValue<f32>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            None | Some(Value::Null | Value::Bool(false)) => FilterValue::Absent,
            Some(v) => match number(&v) {
                // A zero threshold excludes nothing.
                Some(n) if n.abs() < f64::EPSILON => FilterValue::Absent,
                Some(n) => FilterValue::Value(n as f32),
                None => FilterValue::Malformed(format!("liked_rating is not a number: {v}")),
            },
        })
    }

    /// Outer `None` when the bound is unusable, inner `None` when unbounded.
    fn bound(v: &Value) -> Option<Option<i32>> {
        match v {
            Value::Null | Value::Bool(false) => Some(None),
            other => number(other).and_then(|n| i32::try_from(n as i64).ok()).map(Some),
        }
    }

    fn number(v: &Value) -> Option<f64> {
        match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok(),
            _ => None,
        }
        .filter(|n| n.is_finite())
    }
}

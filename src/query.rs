//! Filter-to-SQL query builder for the events table.
//!
//! Raw query-string parameters are parsed leniently into an
//! [`EarthquakeQuery`]: anything empty, non-numeric or unparseable is treated
//! as absent and falls back to its default. The query is then lowered to a
//! list of typed predicates which render the WHERE clause text and the
//! positional parameter vector in a single pass, so user values only ever
//! reach Postgres as bound parameters.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Deserialize;

/// Catalog used when the request names none.
pub const DEFAULT_CATALOG_ID: i32 = 1;

/// Row limit used when the request names none.
pub const DEFAULT_LIMIT: i64 = 10_000;

/// Largest row limit a caller may request.
pub const DEFAULT_MAX_LIMIT: i64 = 50_000;

pub const DEFAULT_MIN_DEPTH: f64 = 0.0;
pub const DEFAULT_MAX_DEPTH: f64 = 100.0;

/// Lower end of the magnitude slider; a minimum at or below it means "unset".
pub const MAGNITUDE_FLOOR: f64 = 0.0;

/// Upper end of the magnitude slider; a maximum at or above it means "unset".
pub const MAGNITUDE_CEILING: f64 = 10.0;

/// Uncertainty thresholds at or above this value apply no constraint.
pub const UNCERTAINTY_CEILING: f64 = 100.0;

/// Projection shared by every event query. Casts pin the wire types so row
/// decoding does not depend on the exact column types of a deployment.
const SELECT_EVENTS: &str = "SELECT evid::text AS evid, \
     ST_X(geom)::float8 AS longitude, \
     ST_Y(geom)::float8 AS latitude, \
     depth::float8 AS depth, \
     origin_time::timestamptz AS origin_time, \
     magnitude::float8 AS magnitude, \
     magnitude_type::text AS magnitude_type, \
     nsta::int4 AS nsta, \
     gap::float8 AS gap, \
     horizontal_error_km::float8 AS horizontal_error_km, \
     vertical_error_km::float8 AS vertical_error_km, \
     rms::float8 AS rms, \
     region::text AS region \
     FROM earthquake.events";

/// Raw `/api/earthquakes` query string. Every field is an optional string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EarthquakeParams {
    pub catalog: Option<String>,
    pub limit: Option<String>,
    pub min_depth: Option<String>,
    pub max_depth: Option<String>,
    pub min_magnitude: Option<String>,
    pub max_magnitude: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub min_lat: Option<String>,
    pub max_lat: Option<String>,
    pub min_lon: Option<String>,
    pub max_lon: Option<String>,
    pub max_horizontal_error: Option<String>,
    pub max_vertical_error: Option<String>,
    pub include_missing_uncertainty: Option<String>,
}

/// Result ordering policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Newest events first
    #[default]
    MostRecent,
    /// Unbiased sample when the limit truncates a large catalog
    Random,
}

impl SortOrder {
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::MostRecent => "origin_time DESC",
            Self::Random => "random()",
        }
    }
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "recent" => Ok(Self::MostRecent),
            "random" => Ok(Self::Random),
            _ => Err(format!("unknown order: {s} (expected: recent, random)")),
        }
    }
}

/// How supplied magnitude bounds are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MagnitudeBounds {
    /// A minimum of 0 or a maximum of 10 is the slider default and applies
    /// no constraint.
    #[default]
    Sentinel,
    /// Every supplied bound is applied, including 0 and 10.
    Explicit,
}

/// Server-side query policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryOptions {
    pub order: SortOrder,
    pub magnitude_bounds: MagnitudeBounds,
    pub max_limit: i64,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            order: SortOrder::default(),
            magnitude_bounds: MagnitudeBounds::default(),
            max_limit: DEFAULT_MAX_LIMIT,
        }
    }
}

/// Typed filter request. Absent constraints are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct EarthquakeQuery {
    pub catalog_id: i32,
    pub limit: i64,
    pub min_depth: f64,
    pub max_depth: f64,
    pub min_magnitude: Option<f64>,
    pub max_magnitude: Option<f64>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub min_lat: Option<f64>,
    pub max_lat: Option<f64>,
    pub min_lon: Option<f64>,
    pub max_lon: Option<f64>,
    pub max_horizontal_error: Option<f64>,
    pub max_vertical_error: Option<f64>,
    pub include_missing_uncertainty: bool,
}

impl Default for EarthquakeQuery {
    fn default() -> Self {
        Self {
            catalog_id: DEFAULT_CATALOG_ID,
            limit: DEFAULT_LIMIT,
            min_depth: DEFAULT_MIN_DEPTH,
            max_depth: DEFAULT_MAX_DEPTH,
            min_magnitude: None,
            max_magnitude: None,
            start: None,
            end: None,
            min_lat: None,
            max_lat: None,
            min_lon: None,
            max_lon: None,
            max_horizontal_error: None,
            max_vertical_error: None,
            include_missing_uncertainty: true,
        }
    }
}

impl EarthquakeQuery {
    /// Parse raw parameters, dropping anything that does not parse.
    ///
    /// The limit is capped at `max_limit`; non-positive limits fall back to
    /// the default.
    #[must_use]
    pub fn from_params(params: &EarthquakeParams, max_limit: i64) -> Self {
        let limit = params
            .limit
            .as_deref()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_LIMIT)
            .min(max_limit);

        Self {
            catalog_id: params
                .catalog
                .as_deref()
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(DEFAULT_CATALOG_ID),
            limit,
            min_depth: parse_number(params.min_depth.as_deref()).unwrap_or(DEFAULT_MIN_DEPTH),
            max_depth: parse_number(params.max_depth.as_deref()).unwrap_or(DEFAULT_MAX_DEPTH),
            min_magnitude: parse_number(params.min_magnitude.as_deref()),
            max_magnitude: parse_number(params.max_magnitude.as_deref()),
            start: parse_date_bound(params.start_date.as_deref(), DateBound::Start),
            end: parse_date_bound(params.end_date.as_deref(), DateBound::End),
            min_lat: parse_number(params.min_lat.as_deref()),
            max_lat: parse_number(params.max_lat.as_deref()),
            min_lon: parse_number(params.min_lon.as_deref()),
            max_lon: parse_number(params.max_lon.as_deref()),
            max_horizontal_error: parse_number(params.max_horizontal_error.as_deref()),
            max_vertical_error: parse_number(params.max_vertical_error.as_deref()),
            include_missing_uncertainty: parse_flag(params.include_missing_uncertainty.as_deref())
                .unwrap_or(true),
        }
    }

    /// Lower the request to predicates and render the full statement.
    #[must_use]
    pub fn build(&self, options: &QueryOptions) -> BuiltQuery {
        let mut predicates = PredicateBuilder::default();

        // Catalog and depth always apply.
        predicates
            .compare(Column::CatalogId, Op::Eq, BindValue::Int(self.catalog_id))
            .compare(Column::Depth, Op::Gte, BindValue::Float(self.min_depth))
            .compare(Column::Depth, Op::Lte, BindValue::Float(self.max_depth));

        let (min_mag, max_mag) = match options.magnitude_bounds {
            MagnitudeBounds::Sentinel => (
                self.min_magnitude.filter(|m| *m > MAGNITUDE_FLOOR),
                self.max_magnitude.filter(|m| *m < MAGNITUDE_CEILING),
            ),
            MagnitudeBounds::Explicit => (self.min_magnitude, self.max_magnitude),
        };
        predicates
            .compare_opt(Column::Magnitude, Op::Gte, min_mag.map(BindValue::Float))
            .compare_opt(Column::Magnitude, Op::Lte, max_mag.map(BindValue::Float))
            .compare_opt(Column::OriginTime, Op::Gte, self.start.map(BindValue::Timestamp))
            .compare_opt(Column::OriginTime, Op::Lte, self.end.map(BindValue::Timestamp))
            .compare_opt(Column::Latitude, Op::Gte, self.min_lat.map(BindValue::Float))
            .compare_opt(Column::Latitude, Op::Lte, self.max_lat.map(BindValue::Float))
            .compare_opt(Column::Longitude, Op::Gte, self.min_lon.map(BindValue::Float))
            .compare_opt(Column::Longitude, Op::Lte, self.max_lon.map(BindValue::Float));

        for (column, threshold) in [
            (Column::HorizontalError, self.max_horizontal_error),
            (Column::VerticalError, self.max_vertical_error),
        ] {
            if let Some(threshold) = threshold.filter(|t| *t < UNCERTAINTY_CEILING) {
                predicates.at_most(column, threshold, self.include_missing_uncertainty);
            }
        }

        let (where_clause, mut params) = predicates.render();
        params.push(BindValue::BigInt(self.limit));
        let sql = format!(
            "{SELECT_EVENTS} WHERE {where_clause} ORDER BY {} LIMIT ${}",
            options.order.as_sql(),
            params.len()
        );

        BuiltQuery {
            where_clause,
            sql,
            params,
        }
    }
}

/// A rendered statement and its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub where_clause: String,
    pub sql: String,
    /// `params[i]` binds placeholder `$i+1`
    pub params: Vec<BindValue>,
}

/// A value bound to a positional placeholder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BindValue {
    Int(i32),
    BigInt(i64),
    Float(f64),
    Timestamp(DateTime<Utc>),
}

/// Filterable columns of `earthquake.events`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    CatalogId,
    Depth,
    Magnitude,
    OriginTime,
    Latitude,
    Longitude,
    HorizontalError,
    VerticalError,
}

impl Column {
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::CatalogId => "catalog_id",
            Self::Depth => "depth",
            Self::Magnitude => "magnitude",
            Self::OriginTime => "origin_time",
            Self::Latitude => "ST_Y(geom)",
            Self::Longitude => "ST_X(geom)",
            Self::HorizontalError => "horizontal_error_km",
            Self::VerticalError => "vertical_error_km",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Gte,
    Lte,
}

impl Op {
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Gte => ">=",
            Self::Lte => "<=",
        }
    }
}

/// One AND-ed term of the WHERE clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `column op $n`
    Compare {
        column: Column,
        op: Op,
        value: BindValue,
    },
    /// `column <= $n`, optionally also admitting NULL
    AtMost {
        column: Column,
        threshold: f64,
        include_null: bool,
    },
}

/// Accumulates predicates in construction order.
#[derive(Debug, Clone, Default)]
pub struct PredicateBuilder {
    predicates: Vec<Predicate>,
}

impl PredicateBuilder {
    pub fn compare(&mut self, column: Column, op: Op, value: BindValue) -> &mut Self {
        self.predicates.push(Predicate::Compare { column, op, value });
        self
    }

    pub fn compare_opt(&mut self, column: Column, op: Op, value: Option<BindValue>) -> &mut Self {
        if let Some(value) = value {
            self.compare(column, op, value);
        }
        self
    }

    pub fn at_most(&mut self, column: Column, threshold: f64, include_null: bool) -> &mut Self {
        self.predicates.push(Predicate::AtMost {
            column,
            threshold,
            include_null,
        });
        self
    }

    /// Render the AND-joined clause and the matching parameter list.
    #[must_use]
    pub fn render(&self) -> (String, Vec<BindValue>) {
        let mut params = Vec::with_capacity(self.predicates.len());
        let mut terms = Vec::with_capacity(self.predicates.len());

        for predicate in &self.predicates {
            match *predicate {
                Predicate::Compare { column, op, value } => {
                    params.push(value);
                    terms.push(format!(
                        "{} {} ${}",
                        column.as_sql(),
                        op.as_sql(),
                        params.len()
                    ));
                }
                Predicate::AtMost {
                    column,
                    threshold,
                    include_null,
                } => {
                    params.push(BindValue::Float(threshold));
                    let col = column.as_sql();
                    let n = params.len();
                    // NULL never satisfies `<=`, so the plain form excludes
                    // unrecorded uncertainties.
                    terms.push(if include_null {
                        format!("({col} IS NULL OR {col} <= ${n})")
                    } else {
                        format!("{col} <= ${n}")
                    });
                }
            }
        }

        (terms.join(" AND "), params)
    }
}

/// Parse a finite number, treating blanks and garbage as absent.
#[must_use]
pub fn parse_number(raw: Option<&str>) -> Option<f64> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn parse_flag(raw: Option<&str>) -> Option<bool> {
    match raw.map(|s| s.trim().to_lowercase()).as_deref() {
        Some("true" | "1" | "yes") => Some(true),
        Some("false" | "0" | "no") => Some(false),
        _ => None,
    }
}

/// Which end of a date range a value constrains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBound {
    Start,
    End,
}

/// Parse a calendar date in the formats the date pickers emit.
#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%m/%d/%Y"))
        .ok()
}

/// Parse a date or timestamp into an inclusive bound.
///
/// A bare date covers the whole day: start bounds begin at midnight, end
/// bounds run to the last microsecond of the day.
#[must_use]
pub fn parse_date_bound(raw: Option<&str>, bound: DateBound) -> Option<DateTime<Utc>> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(ts.and_utc());
    }

    let date = parse_date(raw)?;
    let time = match bound {
        DateBound::Start => NaiveTime::MIN,
        DateBound::End => NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999)?,
    };
    Some(date.and_time(time).and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> EarthquakeParams {
        let map: serde_json::Map<String, serde_json::Value> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), serde_json::Value::from(*v)))
            .collect();
        serde_json::from_value(map.into()).expect("valid params")
    }

    fn build(pairs: &[(&str, &str)]) -> BuiltQuery {
        EarthquakeQuery::from_params(&params(pairs), DEFAULT_MAX_LIMIT)
            .build(&QueryOptions::default())
    }

    #[test]
    fn test_base_predicate_without_magnitude() {
        let built = build(&[("catalog", "1"), ("minDepth", "0"), ("maxDepth", "100")]);
        assert_eq!(
            built.where_clause,
            "catalog_id = $1 AND depth >= $2 AND depth <= $3"
        );
        assert_eq!(
            built.params,
            vec![
                BindValue::Int(1),
                BindValue::Float(0.0),
                BindValue::Float(100.0),
                BindValue::BigInt(DEFAULT_LIMIT),
            ]
        );
        assert!(built.sql.ends_with("ORDER BY origin_time DESC LIMIT $4"));
        assert!(!built.sql.contains("magnitude >="));
    }

    #[test]
    fn test_depth_always_present() {
        let built = build(&[]);
        assert_eq!(
            built.where_clause,
            "catalog_id = $1 AND depth >= $2 AND depth <= $3"
        );

        let built = build(&[("minDepth", "12.5"), ("maxDepth", "40")]);
        assert_eq!(built.params[1], BindValue::Float(12.5));
        assert_eq!(built.params[2], BindValue::Float(40.0));
    }

    #[test]
    fn test_magnitude_sentinel_range_is_omitted() {
        let built = build(&[("minMagnitude", "0"), ("maxMagnitude", "10")]);
        assert!(!built.where_clause.contains("magnitude"));
        assert_eq!(built.params.len(), 4);
    }

    #[test]
    fn test_min_magnitude_is_bound() {
        let built = build(&[("catalog", "1"), ("minMagnitude", "2.5")]);
        assert_eq!(
            built.where_clause,
            "catalog_id = $1 AND depth >= $2 AND depth <= $3 AND magnitude >= $4"
        );
        assert_eq!(built.params[3], BindValue::Float(2.5));
        assert_eq!(built.params[4], BindValue::BigInt(DEFAULT_LIMIT));
    }

    #[test]
    fn test_max_magnitude_below_ceiling_is_bound() {
        let built = build(&[("minMagnitude", "0"), ("maxMagnitude", "6.1")]);
        assert!(built.where_clause.ends_with("AND magnitude <= $4"));
        assert_eq!(built.params[3], BindValue::Float(6.1));
    }

    #[test]
    fn test_explicit_magnitude_bounds_bind_sentinels() {
        let query = EarthquakeQuery::from_params(
            &params(&[("minMagnitude", "0"), ("maxMagnitude", "10")]),
            DEFAULT_MAX_LIMIT,
        );
        let built = query.build(&QueryOptions {
            magnitude_bounds: MagnitudeBounds::Explicit,
            ..QueryOptions::default()
        });
        assert!(built.where_clause.contains("magnitude >= $4"));
        assert!(built.where_clause.contains("magnitude <= $5"));
        assert_eq!(built.params[3], BindValue::Float(0.0));
        assert_eq!(built.params[4], BindValue::Float(10.0));
    }

    #[test]
    fn test_uncertainty_including_missing() {
        let built = build(&[
            ("maxHorizontalError", "10"),
            ("includeMissingUncertainty", "true"),
        ]);
        assert!(
            built
                .where_clause
                .ends_with("AND (horizontal_error_km IS NULL OR horizontal_error_km <= $4)")
        );
        assert_eq!(built.params[3], BindValue::Float(10.0));
    }

    #[test]
    fn test_uncertainty_excluding_missing() {
        let built = build(&[
            ("maxVerticalError", "5"),
            ("includeMissingUncertainty", "false"),
        ]);
        assert!(built.where_clause.ends_with("AND vertical_error_km <= $4"));
        assert!(!built.where_clause.contains("IS NULL"));
    }

    #[test]
    fn test_uncertainty_at_ceiling_is_omitted() {
        for value in ["100", "250"] {
            let built = build(&[("maxHorizontalError", value), ("maxVerticalError", value)]);
            assert!(!built.where_clause.contains("error_km"));
        }
    }

    #[test]
    fn test_dates_are_independent_and_inclusive() {
        let built = build(&[("endDate", "2020-12-31")]);
        assert!(built.where_clause.ends_with("AND origin_time <= $4"));
        let expected = NaiveDate::from_ymd_opt(2020, 12, 31)
            .and_then(|d| d.and_hms_micro_opt(23, 59, 59, 999_999))
            .map(|dt| dt.and_utc());
        assert_eq!(built.params[3], BindValue::Timestamp(expected.unwrap()));

        let built = build(&[("startDate", "01/15/2018"), ("endDate", "2019-06-01")]);
        assert!(
            built
                .where_clause
                .ends_with("AND origin_time >= $4 AND origin_time <= $5")
        );
    }

    #[test]
    fn test_spatial_edges_are_independent() {
        let built = build(&[("minLat", "40"), ("maxLon", "-120.5")]);
        assert!(
            built
                .where_clause
                .ends_with("AND ST_Y(geom) >= $4 AND ST_X(geom) <= $5")
        );
        assert_eq!(built.params[3], BindValue::Float(40.0));
        assert_eq!(built.params[4], BindValue::Float(-120.5));
    }

    #[test]
    fn test_zero_coordinate_is_a_real_bound() {
        let built = build(&[("minLat", "0")]);
        assert!(built.where_clause.ends_with("AND ST_Y(geom) >= $4"));
    }

    #[test]
    fn test_placeholders_follow_construction_order() {
        let built = build(&[
            ("catalog", "3"),
            ("minMagnitude", "1"),
            ("maxMagnitude", "5"),
            ("startDate", "2010-01-01"),
            ("minLat", "40"),
            ("maxLat", "50"),
            ("minLon", "-130"),
            ("maxLon", "-116"),
            ("maxHorizontalError", "2"),
            ("maxVerticalError", "4"),
            ("limit", "500"),
        ]);
        let placeholders = built.where_clause.matches('$').count();
        assert_eq!(placeholders, 12);
        assert_eq!(built.params.len(), 13);
        assert_eq!(built.params[0], BindValue::Int(3));
        assert_eq!(built.params[3], BindValue::Float(1.0));
        assert_eq!(built.params[10], BindValue::Float(2.0));
        assert_eq!(built.params[11], BindValue::Float(4.0));
        assert_eq!(built.params[12], BindValue::BigInt(500));
        assert!(built.sql.ends_with("LIMIT $13"));
    }

    #[test]
    fn test_invalid_input_degrades_to_no_constraint() {
        let built = build(&[
            ("catalog", "abc"),
            ("minDepth", "deep"),
            ("minMagnitude", "NaN"),
            ("minLat", "north"),
            ("maxLon", ""),
            ("startDate", "yesterday"),
            ("maxHorizontalError", "inf"),
            ("limit", "-5"),
        ]);
        assert_eq!(
            built.where_clause,
            "catalog_id = $1 AND depth >= $2 AND depth <= $3"
        );
        assert_eq!(built.params[0], BindValue::Int(DEFAULT_CATALOG_ID));
        assert_eq!(built.params[1], BindValue::Float(DEFAULT_MIN_DEPTH));
        assert_eq!(built.params[3], BindValue::BigInt(DEFAULT_LIMIT));
    }

    #[test]
    fn test_limit_is_capped() {
        let query = EarthquakeQuery::from_params(&params(&[("limit", "1000000")]), 50_000);
        assert_eq!(query.limit, 50_000);
    }

    #[test]
    fn test_include_missing_defaults_to_true() {
        let query = EarthquakeQuery::from_params(
            &params(&[("includeMissingUncertainty", "maybe")]),
            DEFAULT_MAX_LIMIT,
        );
        assert!(query.include_missing_uncertainty);
    }

    #[test]
    fn test_random_order() {
        let built = EarthquakeQuery::default().build(&QueryOptions {
            order: SortOrder::Random,
            ..QueryOptions::default()
        });
        assert!(built.sql.ends_with("ORDER BY random() LIMIT $4"));
    }

    #[test]
    fn test_sort_order_parse() {
        assert_eq!("recent".parse::<SortOrder>().unwrap(), SortOrder::MostRecent);
        assert_eq!("RANDOM".parse::<SortOrder>().unwrap(), SortOrder::Random);
        assert!("oldest".parse::<SortOrder>().is_err());
    }
}

/// Geographic listing search
///
/// A search is a polygon (from the geocoder) plus a [`PropertyFilter`]. The
/// filter is parsed from raw query-string values so every rejection carries a
/// message naming the offending parameter. All predicates are ANDed onto a
/// `ST_Intersects` test against the listing's point.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::geo::{Polygon, SRID};
use crate::models::property::{Property, SaleType, PROPERTY_COLUMNS};

/// Rejected search parameters
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("{param} must be an integer")]
    NotAnInteger { param: String },

    #[error("{name}_min can't be greater than {name}_max")]
    InvertedRange { name: &'static str },

    #[error("days_old must be one of 1d, 3d, 7d, 14d, 30d")]
    InvalidListingAge,

    #[error("{0}")]
    InvalidSaleType(String),
}

/// Raw query string of `GET /v1/properties`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    pub address: Option<String>,
    pub sale_type: Option<String>,
    pub property_type: Option<String>,
    pub price_min: Option<String>,
    pub price_max: Option<String>,
    pub bedrooms_min: Option<String>,
    pub bedrooms_max: Option<String>,
    pub bathrooms_min: Option<String>,
    pub bathrooms_max: Option<String>,
    pub days_old: Option<String>,
}

/// Listing-age bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingAge {
    OneDay,
    ThreeDays,
    SevenDays,
    FourteenDays,
    ThirtyDays,
}

impl ListingAge {
    pub fn days(&self) -> i64 {
        match self {
            ListingAge::OneDay => 1,
            ListingAge::ThreeDays => 3,
            ListingAge::SevenDays => 7,
            ListingAge::FourteenDays => 14,
            ListingAge::ThirtyDays => 30,
        }
    }

    /// Oldest `listed_at` still inside the bucket
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(self.days())
    }
}

impl FromStr for ListingAge {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1d" => Ok(ListingAge::OneDay),
            "3d" => Ok(ListingAge::ThreeDays),
            "7d" => Ok(ListingAge::SevenDays),
            "14d" => Ok(ListingAge::FourteenDays),
            "30d" => Ok(ListingAge::ThirtyDays),
            _ => Err(FilterError::InvalidListingAge),
        }
    }
}

/// Inclusive integer range; either end may be open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Range {
    pub min: Option<i32>,
    pub max: Option<i32>,
}

impl Range {
    /// Parses `{name}_min` / `{name}_max`. Blank values count as absent.
    pub fn parse(
        name: &'static str,
        min: Option<&str>,
        max: Option<&str>,
    ) -> Result<Self, FilterError> {
        let range = Range {
            min: parse_bound(name, "min", min)?,
            max: parse_bound(name, "max", max)?,
        };

        if let (Some(min), Some(max)) = (range.min, range.max) {
            if min > max {
                return Err(FilterError::InvertedRange { name });
            }
        }

        Ok(range)
    }

    pub fn is_open(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// Appends ` AND column >= min AND column <= max` for the ends present
    fn push_onto(&self, query: &mut QueryBuilder<'_, Postgres>, column: &str) {
        if let Some(min) = self.min {
            query.push(format!(" AND {column} >= ")).push_bind(min);
        }
        if let Some(max) = self.max {
            query.push(format!(" AND {column} <= ")).push_bind(max);
        }
    }
}

fn parse_bound(
    name: &'static str,
    end: &'static str,
    value: Option<&str>,
) -> Result<Option<i32>, FilterError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => v
            .parse::<i32>()
            .map(Some)
            .map_err(|_| FilterError::NotAnInteger {
                param: format!("{name}_{end}"),
            }),
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Conjunctive listing filter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyFilter {
    pub sale_type: Option<SaleType>,
    pub property_type: Option<String>,
    pub price: Range,
    pub bedrooms: Range,
    pub bathrooms: Range,
    pub listed_within: Option<ListingAge>,
}

impl PropertyFilter {
    /// Validates every filter parameter; `address` is not looked at here
    pub fn from_params(params: &SearchParams) -> Result<Self, FilterError> {
        let sale_type = non_blank(&params.sale_type)
            .map(SaleType::from_str)
            .transpose()
            .map_err(FilterError::InvalidSaleType)?;

        let listed_within = non_blank(&params.days_old)
            .map(ListingAge::from_str)
            .transpose()?;

        Ok(Self {
            sale_type,
            property_type: non_blank(&params.property_type).map(str::to_string),
            price: Range::parse(
                "price",
                params.price_min.as_deref(),
                params.price_max.as_deref(),
            )?,
            bedrooms: Range::parse(
                "bedrooms",
                params.bedrooms_min.as_deref(),
                params.bedrooms_max.as_deref(),
            )?,
            bathrooms: Range::parse(
                "bathrooms",
                params.bathrooms_min.as_deref(),
                params.bathrooms_max.as_deref(),
            )?,
            listed_within,
        })
    }

    /// Appends this filter's predicates to a query that already has a WHERE
    fn push_onto(&self, query: &mut QueryBuilder<'_, Postgres>, now: DateTime<Utc>) {
        if let Some(sale_type) = self.sale_type {
            query.push(" AND sale_type = ").push_bind(sale_type);
        }
        if let Some(property_type) = &self.property_type {
            query
                .push(" AND property_type = ")
                .push_bind(property_type.clone());
        }
        self.price.push_onto(query, "price");
        self.bedrooms.push_onto(query, "bedrooms");
        self.bathrooms.push_onto(query, "bathrooms");
        if let Some(age) = self.listed_within {
            query.push(" AND listed_at >= ").push_bind(age.cutoff(now));
        }
    }
}

fn search_query<'a>(
    polygon: &Polygon,
    filter: &PropertyFilter,
    now: DateTime<Utc>,
) -> QueryBuilder<'a, Postgres> {
    let mut query = QueryBuilder::new(format!("SELECT {PROPERTY_COLUMNS} FROM properties"));
    query
        .push(" WHERE ST_Intersects(coordinates, ST_SetSRID(ST_GeomFromGeoJSON(")
        .push_bind(polygon.to_geojson())
        .push(format!("), {SRID}))"));
    filter.push_onto(&mut query, now);
    query.push(" ORDER BY listed_at DESC, id ASC");
    query
}

/// Listings inside `polygon` matching `filter`, newest first
pub async fn search_within(
    pool: &PgPool,
    polygon: &Polygon,
    filter: &PropertyFilter,
) -> Result<Vec<Property>, sqlx::Error> {
    let mut query = search_query(polygon, filter, Utc::now());
    let properties = query
        .build_query_as::<Property>()
        .fetch_all(pool)
        .await?;

    tracing::debug!(count = properties.len(), "Property search finished");
    Ok(properties)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Polygon {
        Polygon::new(vec![vec![
            [0.0, 0.0],
            [1.0, 0.0],
            [1.0, 1.0],
            [0.0, 1.0],
            [0.0, 0.0],
        ]])
        .unwrap()
    }

    fn params(pairs: &[(&str, &str)]) -> SearchParams {
        let map: serde_json::Map<String, serde_json::Value> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::from(*v)))
            .collect();
        serde_json::from_value(serde_json::Value::Object(map)).unwrap()
    }

    #[test]
    fn test_listing_age_buckets() {
        assert_eq!("1d".parse::<ListingAge>().unwrap().days(), 1);
        assert_eq!("14d".parse::<ListingAge>().unwrap().days(), 14);
        assert_eq!("30d".parse::<ListingAge>().unwrap().days(), 30);
        assert_eq!("2d".parse::<ListingAge>(), Err(FilterError::InvalidListingAge));
        assert_eq!("".parse::<ListingAge>(), Err(FilterError::InvalidListingAge));
    }

    #[test]
    fn test_listing_age_cutoff_is_in_the_past() {
        let now = Utc::now();
        assert_eq!(ListingAge::SevenDays.cutoff(now), now - Duration::days(7));
    }

    #[test]
    fn test_range_parse() {
        assert_eq!(
            Range::parse("price", Some("1000"), None).unwrap(),
            Range { min: Some(1000), max: None }
        );
        assert_eq!(
            Range::parse("price", None, Some("5000")).unwrap(),
            Range { min: None, max: Some(5000) }
        );
        assert!(Range::parse("price", Some(""), Some("  ")).unwrap().is_open());
        assert_eq!(
            Range::parse("price", Some("1000"), Some("1000")).unwrap(),
            Range { min: Some(1000), max: Some(1000) }
        );
    }

    #[test]
    fn test_range_rejections() {
        assert_eq!(
            Range::parse("bedrooms", Some("two"), None),
            Err(FilterError::NotAnInteger { param: "bedrooms_min".to_string() })
        );
        assert_eq!(
            Range::parse("price", Some("5000"), Some("1000")),
            Err(FilterError::InvertedRange { name: "price" })
        );
        assert_eq!(
            FilterError::InvertedRange { name: "price" }.to_string(),
            "price_min can't be greater than price_max"
        );
    }

    #[test]
    fn test_filter_from_params() {
        let filter = PropertyFilter::from_params(&params(&[
            ("address", "London"),
            ("sale_type", "to_rent"),
            ("property_type", "flat"),
            ("price_min", "1000"),
            ("bathrooms_max", "2"),
            ("days_old", "3d"),
        ]))
        .unwrap();

        assert_eq!(filter.sale_type, Some(SaleType::ToRent));
        assert_eq!(filter.property_type.as_deref(), Some("flat"));
        assert_eq!(filter.price, Range { min: Some(1000), max: None });
        assert!(filter.bedrooms.is_open());
        assert_eq!(filter.bathrooms.max, Some(2));
        assert_eq!(filter.listed_within, Some(ListingAge::ThreeDays));
    }

    #[test]
    fn test_filter_rejects_bad_values() {
        assert_eq!(
            PropertyFilter::from_params(&params(&[("days_old", "100d")])),
            Err(FilterError::InvalidListingAge)
        );
        assert!(matches!(
            PropertyFilter::from_params(&params(&[("sale_type", "sold")])),
            Err(FilterError::InvalidSaleType(_))
        ));
        assert!(PropertyFilter::from_params(&params(&[("price_max", "1.5")])).is_err());
    }

    #[test]
    fn test_search_query_without_filters() {
        let query = search_query(&square(), &PropertyFilter::default(), Utc::now());
        let sql = query.sql();

        assert!(sql.contains(
            "FROM properties WHERE ST_Intersects(coordinates, ST_SetSRID(ST_GeomFromGeoJSON($1), 4326))"
        ));
        assert!(sql.ends_with(" ORDER BY listed_at DESC, id ASC"));
        assert!(!sql.contains(" AND "));
    }

    #[test]
    fn test_search_query_with_filters() {
        let filter = PropertyFilter {
            sale_type: Some(SaleType::ForSale),
            property_type: Some("house".to_string()),
            price: Range { min: Some(100_000), max: Some(200_000) },
            bedrooms: Range { min: Some(2), max: None },
            bathrooms: Range::default(),
            listed_within: Some(ListingAge::OneDay),
        };
        let query = search_query(&square(), &filter, Utc::now());
        let sql = query.sql();

        assert!(sql.contains(
            " AND sale_type = $2 AND property_type = $3 AND price >= $4 AND price <= $5 \
             AND bedrooms >= $6 AND listed_at >= $7 ORDER BY"
        ));
        assert!(!sql.contains("bathrooms >="));
    }
}

//! Listing filters and sort options
//!
//! Filters are combined with AND; list-valued filters match any of their
//! values. Everything is bound through [`QueryBuilder`], never spliced.

use keybed_common::catalog::Brand;
use keybed_common::Error;
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite};
use std::str::FromStr;

/// Listing filters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOptions {
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    /// Empty means any brand
    pub brands: Vec<Brand>,
    /// Empty means any release year
    pub release_years: Vec<i32>,
    /// Matches the `sequencer` flag of the specs bag
    pub has_sequencer: Option<bool>,
}

impl FilterOptions {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Append a `WHERE` clause for these filters (nothing if empty)
    pub fn push_where(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        let mut first = true;
        let mut clause = |qb: &mut QueryBuilder<'_, Sqlite>| {
            qb.push(if first { " WHERE " } else { " AND " });
            first = false;
        };

        if let Some(min) = self.min_price {
            clause(qb);
            qb.push("price >= ").push_bind(min);
        }
        if let Some(max) = self.max_price {
            clause(qb);
            qb.push("price <= ").push_bind(max);
        }
        if !self.brands.is_empty() {
            clause(qb);
            qb.push("brand IN (");
            let mut list = qb.separated(", ");
            for brand in &self.brands {
                list.push_bind(brand.as_str());
            }
            list.push_unseparated(")");
        }
        if !self.release_years.is_empty() {
            clause(qb);
            qb.push("release_year IN (");
            let mut list = qb.separated(", ");
            for year in &self.release_years {
                list.push_bind(*year);
            }
            list.push_unseparated(")");
        }
        if let Some(flag) = self.has_sequencer {
            clause(qb);
            qb.push("json_extract(specs, '$.sequencer') = ")
                .push_bind(flag);
        }
    }
}

/// Raw listing query string
///
/// `brands` and `years` are comma-separated lists.
#[derive(Debug, Default, Deserialize)]
pub struct ListingQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    pub sort: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub brands: Option<String>,
    pub years: Option<String>,
    pub has_sequencer: Option<bool>,
}

fn default_page() -> i64 {
    1
}

impl ListingQuery {
    pub fn filters(&self) -> Result<FilterOptions, Error> {
        let brands = split_list(self.brands.as_deref())
            .map(Brand::from_str)
            .collect::<Result<Vec<_>, _>>()?;

        let release_years = split_list(self.years.as_deref())
            .map(|y| {
                y.parse::<i32>()
                    .map_err(|_| Error::InvalidInput(format!("Invalid release year: {}", y)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err(Error::InvalidInput(format!(
                    "min_price {} exceeds max_price {}",
                    min, max
                )));
            }
        }

        Ok(FilterOptions {
            min_price: self.min_price,
            max_price: self.max_price,
            brands,
            release_years,
            has_sequencer: self.has_sequencer,
        })
    }

    pub fn sort(&self) -> Result<Option<SortOption>, Error> {
        self.sort.as_deref().map(SortOption::from_str).transpose()
    }
}

fn split_list(raw: Option<&str>) -> impl Iterator<Item = &str> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Listing sort order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOption {
    PriceLowHigh,
    PriceHighLow,
    Popularity,
    Rating,
    /// Most recent release year first
    Newest,
}

impl SortOption {
    /// `ORDER BY` clause; `None` sorts newest-created first
    pub fn order_by(sort: Option<SortOption>) -> &'static str {
        match sort {
            Some(SortOption::PriceLowHigh) => " ORDER BY price ASC, id ASC",
            Some(SortOption::PriceHighLow) => " ORDER BY price DESC, id ASC",
            Some(SortOption::Popularity) => " ORDER BY popularity_score DESC, id ASC",
            Some(SortOption::Rating) => " ORDER BY rating DESC, id ASC",
            Some(SortOption::Newest) => " ORDER BY release_year DESC, id ASC",
            None => " ORDER BY created_at DESC, id ASC",
        }
    }
}

impl FromStr for SortOption {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "price-low-high" => Ok(SortOption::PriceLowHigh),
            "price-high-low" => Ok(SortOption::PriceHighLow),
            "popularity" => Ok(SortOption::Popularity),
            "rating" => Ok(SortOption::Rating),
            "newest" => Ok(SortOption::Newest),
            other => Err(Error::InvalidInput(format!("Unknown sort option: {}", other))),
        }
    }
}

//! Catalog data model
//!
//! Records are owned by the catalog store and read-only to the comparison
//! subsystem. A record carries a free-form `specs` bag; the optional
//! [`ProductDetails`] carry the categorized [`SpecificationDocument`] plus
//! FAQ entries and purchase links.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Instrument manufacturer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Brand {
    Roland,
    Casio,
    Yamaha,
    Korg,
}

impl Brand {
    pub const ALL: [Brand; 4] = [Brand::Roland, Brand::Casio, Brand::Yamaha, Brand::Korg];

    pub fn as_str(&self) -> &'static str {
        match self {
            Brand::Roland => "Roland",
            Brand::Casio => "Casio",
            Brand::Yamaha => "Yamaha",
            Brand::Korg => "Korg",
        }
    }
}

impl fmt::Display for Brand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Brand {
    type Err = Error;

    /// Brand names match case-insensitively so `/brands/korg` works.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Brand::ALL
            .into_iter()
            .find(|b| b.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidInput(format!("Unknown brand: {}", s)))
    }
}

/// A single specification value
///
/// JSON `null` is not a variant: absent values are modelled as `None` in
/// [`SpecFields`] so that `false` and "missing" can never be confused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpecValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl fmt::Display for SpecValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecValue::Bool(true) => f.write_str("Yes"),
            SpecValue::Bool(false) => f.write_str("No"),
            // 128.0 prints as "128"
            SpecValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            SpecValue::Number(n) => write!(f, "{}", n),
            SpecValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for SpecValue {
    fn from(v: bool) -> Self {
        SpecValue::Bool(v)
    }
}

impl From<f64> for SpecValue {
    fn from(v: f64) -> Self {
        SpecValue::Number(v)
    }
}

impl From<i32> for SpecValue {
    fn from(v: i32) -> Self {
        SpecValue::Number(v as f64)
    }
}

impl From<i64> for SpecValue {
    fn from(v: i64) -> Self {
        SpecValue::Number(v as f64)
    }
}

impl From<&str> for SpecValue {
    fn from(v: &str) -> Self {
        SpecValue::Text(v.to_string())
    }
}

impl From<String> for SpecValue {
    fn from(v: String) -> Self {
        SpecValue::Text(v)
    }
}

/// Ordered field-key → value mapping, document order preserved
pub type SpecFields = IndexMap<String, Option<SpecValue>>;

/// Free-form key-value bag stored on the catalog record itself
pub type SpecBag = IndexMap<String, SpecValue>;

/// Named group of related technical fields (e.g. "Sound Engine")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecificationCategory {
    pub name: String,
    #[serde(rename = "specs", default)]
    pub fields: SpecFields,
}

impl SpecificationCategory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: SpecFields::new(),
        }
    }

    /// Builder-style field insertion, mostly for fixtures
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<SpecValue>) -> Self {
        self.fields.insert(key.into(), Some(value.into()));
        self
    }

    /// Look up a field; `None` when the key is missing or its value is null
    pub fn get(&self, key: &str) -> Option<&SpecValue> {
        self.fields.get(key).and_then(Option::as_ref)
    }
}

/// Ordered list of specification categories for one product
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpecificationDocument {
    pub categories: Vec<SpecificationCategory>,
}

impl SpecificationDocument {
    pub fn new(categories: Vec<SpecificationCategory>) -> Self {
        Self { categories }
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// First category with exactly this name (case-sensitive)
    pub fn category(&self, name: &str) -> Option<&SpecificationCategory> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// Value for `category`/`field`, `None` if any level is absent
    ///
    /// A name repeated within one document is treated as a single category.
    pub fn value(&self, category: &str, field: &str) -> Option<&SpecValue> {
        self.categories
            .iter()
            .filter(|c| c.name == category)
            .find_map(|c| c.get(field))
    }
}

/// Frequently asked question shown on the product page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Faq {
    pub question: String,
    pub answer: String,
}

/// Purchase link for a product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyLink {
    pub store: String,
    pub url: String,
}

/// Extended product data, stored separately from the basic record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductDetails {
    #[serde(default)]
    pub specifications: Option<SpecificationDocument>,
    #[serde(default)]
    pub faq: Vec<Faq>,
    #[serde(default, alias = "buyLinks")]
    pub buy_links: Vec<BuyLink>,
}

/// Basic catalog record for one instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub id: String,
    pub name: String,
    pub brand: Brand,
    pub image: String,
    pub price: f64,
    pub rating: f64,
    pub release_year: i32,
    pub description: String,
    #[serde(default)]
    pub specs: SpecBag,
    #[serde(default)]
    pub compare_count: i64,
    #[serde(default = "default_popularity")]
    pub popularity_score: i64,
}

/// Placeholder image used when a record has none
pub const PLACEHOLDER_IMAGE: &str = "/placeholder.svg";

fn default_popularity() -> i64 {
    50
}

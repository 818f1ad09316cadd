//! Specification reconciliation
//!
//! Merges the specification documents of the compared items into one table.
//! Categories are ordered by first appearance across items (in comparison
//! order, each item's categories in document order); fields within a
//! category likewise. A cell an item cannot fill holds [`ABSENCE_MARKER`].
//!
//! The table is derived fresh on every request and never persisted.

use indexmap::{IndexMap, IndexSet};
use keybed_common::catalog::{
    Brand, CatalogRecord, SpecValue, SpecificationCategory, SpecificationDocument,
};
use serde::{Serialize, Serializer};

use super::resolver::{DocumentState, ResolvedItem};

/// Cell text for a missing category, missing field or null value
pub const ABSENCE_MARKER: &str = "—";

/// Category used for an item that only has a free-form specs bag
pub const FALLBACK_CATEGORY: &str = "Other Specifications";

/// One table cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Value(String),
    Absent,
}

impl Cell {
    pub fn text(&self) -> &str {
        match self {
            Cell::Value(text) => text,
            Cell::Absent => ABSENCE_MARKER,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Cell::Absent)
    }
}

impl From<Option<&SpecValue>> for Cell {
    fn from(value: Option<&SpecValue>) -> Self {
        match value {
            Some(v) => Cell::Value(v.to_string()),
            None => Cell::Absent,
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.text())
    }
}

/// Column header for one compared item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnHeader {
    pub item_id: String,
    pub name: String,
    pub brand: Brand,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRow {
    pub label: String,
    /// One cell per column, in column order
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryGroup {
    pub name: String,
    pub rows: Vec<TableRow>,
}

/// Aligned comparison table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciledComparisonTable {
    pub columns: Vec<ColumnHeader>,
    /// Price, Rating and Year straight from the catalog records
    pub basic_rows: Vec<TableRow>,
    pub categories: Vec<CategoryGroup>,
}

/// Build the comparison table for resolved items, in comparison order
///
/// Returns `None` for an empty input; the caller renders the "no items"
/// state instead.
pub fn reconcile(items: &[ResolvedItem]) -> Option<ReconciledComparisonTable> {
    if items.is_empty() {
        return None;
    }

    let documents: Vec<Option<SpecificationDocument>> =
        items.iter().map(effective_document).collect();

    // category name -> field keys, both in first-seen order
    let mut layout: IndexMap<&str, IndexSet<&str>> = IndexMap::new();
    for doc in documents.iter().flatten() {
        for category in &doc.categories {
            let fields = layout.entry(category.name.as_str()).or_default();
            fields.extend(category.fields.keys().map(String::as_str));
        }
    }

    let categories = layout
        .iter()
        .map(|(category, fields)| CategoryGroup {
            name: category.to_string(),
            rows: fields
                .iter()
                .map(|field| TableRow {
                    label: field.to_string(),
                    cells: documents
                        .iter()
                        .map(|doc| Cell::from(doc.as_ref().and_then(|d| d.value(category, field))))
                        .collect(),
                })
                .collect(),
        })
        .collect();

    Some(ReconciledComparisonTable {
        columns: items.iter().map(|item| column_header(&item.record)).collect(),
        basic_rows: basic_rows(items),
        categories,
    })
}

/// The document used for an item
///
/// A structured document with at least one category wins; otherwise a
/// non-empty specs bag becomes a single fallback category.
fn effective_document(item: &ResolvedItem) -> Option<SpecificationDocument> {
    if let DocumentState::Present(doc) = &item.document {
        if !doc.is_empty() {
            return Some(doc.clone());
        }
    }

    if item.record.specs.is_empty() {
        return None;
    }

    let mut category = SpecificationCategory::new(FALLBACK_CATEGORY);
    for (key, value) in &item.record.specs {
        category.fields.insert(key.clone(), Some(value.clone()));
    }
    Some(SpecificationDocument::new(vec![category]))
}

fn column_header(record: &CatalogRecord) -> ColumnHeader {
    ColumnHeader {
        item_id: record.id.clone(),
        name: record.name.clone(),
        brand: record.brand,
        image: record.image.clone(),
    }
}

fn basic_rows(items: &[ResolvedItem]) -> Vec<TableRow> {
    vec![
        basic_row("Price", items, |r| format_inr(r.price)),
        basic_row("Rating", items, |r| SpecValue::Number(r.rating).to_string()),
        basic_row("Year", items, |r| r.release_year.to_string()),
    ]
}

fn basic_row<F>(label: &str, items: &[ResolvedItem], render: F) -> TableRow
where
    F: Fn(&CatalogRecord) -> String,
{
    TableRow {
        label: label.to_string(),
        cells: items
            .iter()
            .map(|item| Cell::Value(render(&item.record)))
            .collect(),
    }
}

/// Format a rupee amount with Indian digit grouping (`₹1,49,999`)
pub fn format_inr(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let fraction = cents % 100;

    let grouped = if whole.len() <= 3 {
        whole
    } else {
        let (head, last_three) = whole.split_at(whole.len() - 3);
        let mut groups: Vec<&str> = Vec::new();
        let mut end = head.len();
        while end > 0 {
            let start = end.saturating_sub(2);
            groups.push(&head[start..end]);
            end = start;
        }
        groups.reverse();
        format!("{},{}", groups.join(","), last_three)
    };

    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    if fraction == 0 {
        format!("{}₹{}", sign, grouped)
    } else {
        let fraction = format!("{:02}", fraction);
        format!("{}₹{}.{}", sign, grouped, fraction.trim_end_matches('0'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keybed_common::catalog::SpecBag;

    fn record(id: &str) -> CatalogRecord {
        CatalogRecord {
            id: id.to_string(),
            name: format!("Instrument {}", id),
            brand: Brand::Korg,
            image: "/placeholder.svg".to_string(),
            price: 149_999.0,
            rating: 4.5,
            release_year: 2021,
            description: String::new(),
            specs: SpecBag::new(),
            compare_count: 0,
            popularity_score: 50,
        }
    }

    fn item(id: &str, categories: Vec<SpecificationCategory>) -> ResolvedItem {
        ResolvedItem {
            record: record(id),
            document: DocumentState::Present(SpecificationDocument::new(categories)),
        }
    }

    fn bare(id: &str) -> ResolvedItem {
        ResolvedItem {
            record: record(id),
            document: DocumentState::Absent,
        }
    }

    fn row_texts(row: &TableRow) -> Vec<&str> {
        row.cells.iter().map(Cell::text).collect()
    }

    #[test]
    fn test_empty_input_has_no_table() {
        assert!(reconcile(&[]).is_none());
    }

    #[test]
    fn test_missing_category_uses_absence_marker() {
        let a = item(
            "a",
            vec![SpecificationCategory::new("Sound Engine").with_field("polyphony", 128)],
        );
        let b = item("b", vec![SpecificationCategory::new("General").with_field("Keys", 61)]);

        let table = reconcile(&[a, b]).unwrap();
        let engine = &table.categories[0];
        assert_eq!(engine.name, "Sound Engine");
        assert_eq!(engine.rows.len(), 1);
        assert_eq!(engine.rows[0].label, "polyphony");
        assert_eq!(row_texts(&engine.rows[0]), vec!["128", ABSENCE_MARKER]);
    }

    #[test]
    fn test_false_is_not_absent() {
        let a = item("a", vec![SpecificationCategory::new("Sequencer").with_field("Arpeggiator", false)]);
        let b = item("b", vec![SpecificationCategory::new("Sequencer")]);

        let table = reconcile(&[a, b]).unwrap();
        let cells = &table.categories[0].rows[0].cells;
        assert_eq!(cells[0], Cell::Value("No".to_string()));
        assert!(cells[1].is_absent());
        assert_ne!(cells[0].text(), cells[1].text());
    }

    #[test]
    fn test_first_seen_ordering() {
        let a = item(
            "a",
            vec![
                SpecificationCategory::new("General")
                    .with_field("Keys", 37)
                    .with_field("Weight", "2.8 kg"),
                SpecificationCategory::new("Effects").with_field("Reverb", true),
            ],
        );
        let b = item(
            "b",
            vec![
                SpecificationCategory::new("Sound Engine").with_field("Type", "Analog"),
                SpecificationCategory::new("General")
                    .with_field("Display", "OLED")
                    .with_field("Keys", 61),
            ],
        );

        let table = reconcile(&[a, b]).unwrap();
        let names: Vec<&str> = table.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["General", "Effects", "Sound Engine"]);

        let general: Vec<&str> = table.categories[0]
            .rows
            .iter()
            .map(|r| r.label.as_str())
            .collect();
        assert_eq!(general, vec!["Keys", "Weight", "Display"]);
        assert_eq!(row_texts(&table.categories[0].rows[0]), vec!["37", "61"]);
        assert_eq!(
            row_texts(&table.categories[0].rows[2]),
            vec![ABSENCE_MARKER, "OLED"]
        );
    }

    #[test]
    fn test_category_names_are_case_sensitive() {
        let a = item("a", vec![SpecificationCategory::new("General").with_field("Keys", 37)]);
        let b = item("b", vec![SpecificationCategory::new("general").with_field("Keys", 61)]);

        let table = reconcile(&[a, b]).unwrap();
        assert_eq!(table.categories.len(), 2);
        assert_eq!(row_texts(&table.categories[0].rows[0]), vec!["37", ABSENCE_MARKER]);
        assert_eq!(row_texts(&table.categories[1].rows[0]), vec![ABSENCE_MARKER, "61"]);
    }

    #[test]
    fn test_null_value_renders_absent() {
        let mut category = SpecificationCategory::new("Sequencer");
        category.fields.insert("Swing".to_string(), None);
        let table = reconcile(&[item("a", vec![category])]).unwrap();

        assert_eq!(table.categories[0].rows[0].label, "Swing");
        assert!(table.categories[0].rows[0].cells[0].is_absent());
    }

    #[test]
    fn test_reconcile_is_deterministic() {
        let items = vec![
            item("a", vec![SpecificationCategory::new("X").with_field("k1", 1).with_field("k2", "v")]),
            item("b", vec![SpecificationCategory::new("Y").with_field("k3", true)]),
            bare("c"),
        ];
        assert_eq!(reconcile(&items), reconcile(&items));
    }

    #[test]
    fn test_basic_rows_without_documents() {
        let mut cheap = bare("b");
        cheap.record.price = 999.0;
        cheap.record.rating = 4.0;
        cheap.record.release_year = 2019;

        let table = reconcile(&[bare("a"), cheap]).unwrap();
        assert!(table.categories.is_empty());

        let labels: Vec<&str> = table.basic_rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["Price", "Rating", "Year"]);
        assert_eq!(row_texts(&table.basic_rows[0]), vec!["₹1,49,999", "₹999"]);
        assert_eq!(row_texts(&table.basic_rows[1]), vec!["4.5", "4"]);
        assert_eq!(row_texts(&table.basic_rows[2]), vec!["2021", "2019"]);
    }

    #[test]
    fn test_single_item_table() {
        let table = reconcile(&[item(
            "solo",
            vec![SpecificationCategory::new("General").with_field("Keys", 88)],
        )])
        .unwrap();
        assert_eq!(table.columns.len(), 1);
        assert_eq!(table.columns[0].item_id, "solo");
        assert_eq!(table.categories[0].rows[0].cells.len(), 1);
    }

    #[test]
    fn test_specs_bag_fallback() {
        let mut with_bag = bare("a");
        with_bag.record.specs.insert("keys".to_string(), SpecValue::from(61));
        with_bag.record.specs.insert("sequencer".to_string(), SpecValue::from(true));

        // An empty structured document does not hide the bag
        let mut empty_doc = item("b", vec![]);
        empty_doc.record.specs.insert("keys".to_string(), SpecValue::from(88));

        let structured = item("c", vec![SpecificationCategory::new("General").with_field("Keys", 37)]);

        let table = reconcile(&[with_bag, empty_doc, structured]).unwrap();
        let names: Vec<&str> = table.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec![FALLBACK_CATEGORY, "General"]);

        let other = &table.categories[0];
        assert_eq!(row_texts(&other.rows[0]), vec!["61", "88", ABSENCE_MARKER]);
        assert_eq!(row_texts(&other.rows[1]), vec!["Yes", ABSENCE_MARKER, ABSENCE_MARKER]);
    }

    #[test]
    fn test_cells_serialize_as_text() {
        let table = reconcile(&[bare("a")]).unwrap();
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["basic_rows"][0]["cells"][0], "₹1,49,999");
        assert_eq!(json["columns"][0]["brand"], "Korg");
    }

    #[test]
    fn test_format_inr() {
        assert_eq!(format_inr(0.0), "₹0");
        assert_eq!(format_inr(999.0), "₹999");
        assert_eq!(format_inr(1000.0), "₹1,000");
        assert_eq!(format_inr(149_999.0), "₹1,49,999");
        assert_eq!(format_inr(12_345_678.0), "₹1,23,45,678");
        assert_eq!(format_inr(1_234.5), "₹1,234.5");
        assert_eq!(format_inr(1_234.05), "₹1,234.05");
    }
}

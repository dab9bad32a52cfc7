use std::sync::Arc;

use once_cell::sync::Lazy;
use serde_json::{json, Value};

use crate::query::{Card, Field, FieldId, Metadata, Question};

pub const SAMPLE_DATABASE_ID: u64 = 1;
pub const ORDERS_TABLE_ID: u64 = 2;
pub const PRODUCTS_TABLE_ID: u64 = 3;

pub const ORDERS_ID: FieldId = 11;
pub const ORDERS_TOTAL: FieldId = 12;
pub const ORDERS_CREATED_AT: FieldId = 13;
pub const PRODUCTS_CATEGORY: FieldId = 21;
pub const PRODUCTS_CREATED_AT: FieldId = 22;

pub const SAVED_QUESTION_ID: u64 = 1;

static METADATA: Lazy<Arc<Metadata>> = Lazy::new(|| Arc::new(sample_metadata()));

fn field(id: FieldId, name: &str, display_name: &str, base_type: &str) -> Field {
    Field {
        id: Some(id),
        name: name.to_string(),
        display_name: Some(display_name.to_string()),
        base_type: Some(base_type.to_string()),
        effective_type: None,
    }
}

/// Field metadata for the sample ORDERS and PRODUCTS tables.
pub fn sample_metadata() -> Metadata {
    Metadata::from_fields([
        field(ORDERS_ID, "ID", "ID", "type/BigInteger"),
        field(ORDERS_TOTAL, "TOTAL", "Total", "type/Float"),
        field(ORDERS_CREATED_AT, "CREATED_AT", "Created At", "type/DateTime"),
        field(PRODUCTS_CATEGORY, "CATEGORY", "Category", "type/Text"),
        field(PRODUCTS_CREATED_AT, "CREATED_AT", "Created At", "type/DateTime"),
    ])
}

fn question(card: Value) -> Question {
    // Fixture cards are literals; a decode failure is a programming error.
    let card: Card = serde_json::from_value(card).unwrap_or_else(|err| panic!("bad fixture card: {err}"));
    Question::new(card, Arc::clone(&METADATA))
}

fn structured_card(id: Option<u64>, name: &str, query: Value) -> Value {
    let mut card = json!({
        "name": name,
        "display": "line",
        "visualization_settings": {},
        "dataset_query": {
            "type": "query",
            "database": SAMPLE_DATABASE_ID,
            "query": query,
        }
    });
    if let Some(id) = id {
        card["id"] = json!(id);
    }
    card
}

fn orders_by_unit(id: Option<u64>, unit: &str) -> Question {
    question(structured_card(
        id,
        &format!("Orders by {unit}"),
        json!({
            "source-table": ORDERS_TABLE_ID,
            "aggregation": [["count"]],
            "breakout": [["field", ORDERS_CREATED_AT, {"temporal-unit": unit}]],
        }),
    ))
}

/// Saved question: order count grouped by month of creation.
pub fn saved_orders_by_month() -> Question {
    orders_by_unit(Some(SAVED_QUESTION_ID), "month")
}

/// The same query as [`saved_orders_by_month`], never saved.
pub fn unsaved_orders_by_month() -> Question {
    orders_by_unit(None, "month")
}

pub fn unsaved_orders_by_week() -> Question {
    orders_by_unit(None, "week")
}

/// Raw ORDERS table: structured, no breakout.
pub fn orders_question() -> Question {
    question(structured_card(
        None,
        "Orders",
        json!({ "source-table": ORDERS_TABLE_ID }),
    ))
}

/// Saved question grouped by a text column.
pub fn products_by_category_question() -> Question {
    question(structured_card(
        Some(SAVED_QUESTION_ID),
        "Products by category",
        json!({
            "source-table": PRODUCTS_TABLE_ID,
            "aggregation": [["count"]],
            "breakout": [["field", PRODUCTS_CATEGORY, null]],
        }),
    ))
}

pub fn native_question() -> Question {
    question(json!({
        "id": SAVED_QUESTION_ID,
        "name": "Products (SQL)",
        "display": "line",
        "visualization_settings": {},
        "dataset_query": {
            "type": "native",
            "database": SAMPLE_DATABASE_ID,
            "native": {
                "query": "select * from products",
                "template-tags": {}
            }
        }
    }))
}

/// Demo questions offered by the dashboard, keyed by a stable slug.
pub fn sample_questions() -> Vec<(&'static str, Question)> {
    vec![
        ("saved-orders-by-month", saved_orders_by_month()),
        ("adhoc-orders-by-month", unsaved_orders_by_month()),
        ("adhoc-orders-by-week", unsaved_orders_by_week()),
        ("orders", orders_question()),
        ("products-by-category", products_by_category_question()),
        ("products-sql", native_question()),
    ]
}

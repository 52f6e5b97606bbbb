// Ingestion Path.
// Validates a candidate cost record field by field, persists it to the
// ledger, and opportunistically updates (never creates) the matching
// report document. Validation is strict and early: nothing hits the store
// before the request is proven well-formed.

use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use serde_json::Value;

use crate::category::Category;
use crate::db::{self, CostRecord};
use crate::error::Error;

/// A validated cost submission, ready to persist.
#[derive(Debug, Clone)]
pub struct NewCost {
    pub userid: String,
    pub description: String,
    pub category: Category,
    pub sum: f64,
    pub date: NaiveDate,
}

impl NewCost {
    /// Validate a raw JSON request body.
    ///
    /// The body is taken as arbitrary JSON so that every malformed input
    /// maps to a validation failure with a field-level diagnostic rather
    /// than a framework-level decode error. Identifiers may arrive as a
    /// JSON string or number; both normalize to the trimmed string form.
    pub fn from_json(body: &Value) -> Result<NewCost, Error> {
        let userid = match body.get("userid") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(Error::validation("userid is required")),
        };

        let description = match body.get("description").and_then(Value::as_str) {
            Some(d) if !d.is_empty() => d.to_string(),
            _ => return Err(Error::validation("description is required")),
        };

        let category = match body.get("category").and_then(Value::as_str) {
            Some(c) => Category::parse(c)?,
            None => return Err(Error::validation("category is required")),
        };

        let sum = match body.get("sum").and_then(Value::as_f64) {
            Some(s) if s > 0.0 => s,
            _ => return Err(Error::validation("sum must be a positive number")),
        };

        let date = match body.get("date") {
            None | Some(Value::Null) => Utc::now().date_naive(),
            Some(Value::String(s)) => parse_iso_date(s)?,
            Some(_) => {
                return Err(Error::validation("Invalid date format, use YYYY-MM-DD"))
            }
        };

        Ok(NewCost {
            userid,
            description,
            category,
            sum,
            date,
        })
    }
}

fn parse_iso_date(s: &str) -> Result<NaiveDate, Error> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| Error::validation("Invalid date format, use YYYY-MM-DD"))
}

/// Record one expense.
///
/// The owning user must exist before anything is written; orphan ledger
/// entries are not allowed. The ledger write is the source of truth: once
/// it succeeds the call succeeds, and a failure in the best-effort cache
/// append is logged and swallowed.
pub fn add_cost(conn: &Connection, new_cost: NewCost) -> Result<CostRecord, Error> {
    if db::find_user(conn, &new_cost.userid)?.is_none() {
        return Err(Error::user_not_found());
    }

    let record = CostRecord {
        userid: new_cost.userid,
        description: new_cost.description,
        category: new_cost.category,
        sum: new_cost.sum,
        date: new_cost.date,
    };
    db::insert_cost(conn, &record)?;

    // A cold period has no document to update; it stays cold until a
    // report is requested.
    if let Err(err) = db::append_cost_to_report(conn, &record) {
        tracing::warn!(userid = %record.userid, %err, "cache append failed after ledger write");
    }

    Ok(record)
}

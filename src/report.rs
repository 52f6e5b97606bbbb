// Report Resolver.
// Given (user, year, month) this either serves the cached document or
// aggregates the ledger, materializes the result, and serves that. Once a
// period is materialized the document is trusted as-is forever; later
// costs reach it only through the ingestion-time append.

use chrono::{Datelike, NaiveDate};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::db;
use crate::error::Error;

/// One entry inside a report category array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostItem {
    pub sum: f64,
    pub description: String,
    pub day: u32,
}

/// Costs for one calendar month, partitioned into the canonical five
/// category buckets. Categories with no entries stay as empty arrays.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostsByCategory {
    #[serde(default)]
    pub food: Vec<CostItem>,
    #[serde(default)]
    pub health: Vec<CostItem>,
    #[serde(default)]
    pub housing: Vec<CostItem>,
    #[serde(default)]
    pub sport: Vec<CostItem>,
    #[serde(default)]
    pub education: Vec<CostItem>,
}

impl CostsByCategory {
    pub fn push(&mut self, category: Category, item: CostItem) {
        match category {
            Category::Food => self.food.push(item),
            Category::Health => self.health.push(item),
            Category::Housing => self.housing.push(item),
            Category::Sport => self.sport.push(item),
            Category::Education => self.education.push(item),
        }
    }

    pub fn get(&self, category: Category) -> &[CostItem] {
        match category {
            Category::Food => &self.food,
            Category::Health => &self.health,
            Category::Housing => &self.housing,
            Category::Sport => &self.sport,
            Category::Education => &self.education,
        }
    }
}

/// A materialized monthly report, as stored and as returned to clients.
/// Store-internal surrogate identifiers never appear here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyReport {
    pub userid: String,
    pub year: i32,
    pub month: u32,
    pub costs: CostsByCategory,
}

/// Validated report request parameters.
#[derive(Debug, Clone)]
pub struct ReportParams {
    pub userid: String,
    pub year: i32,
    pub month: u32,
}

impl ReportParams {
    /// Validate the raw query parameters. Each failure carries the message
    /// the client needs: a missing id, a non-integer year, or a month
    /// outside [1, 12].
    pub fn parse(
        id: Option<&str>,
        year: Option<&str>,
        month: Option<&str>,
    ) -> Result<ReportParams, Error> {
        let userid = match id.map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => return Err(Error::validation("id is required")),
        };

        let year = year
            .and_then(|y| y.trim().parse::<i32>().ok())
            .ok_or_else(|| Error::validation("year must be an integer"))?;

        let month = month
            .and_then(|m| m.trim().parse::<u32>().ok())
            .filter(|m| (1..=12).contains(m))
            .ok_or_else(|| {
                Error::validation("month must be an integer between 1 and 12")
            })?;

        Ok(ReportParams {
            userid,
            year,
            month,
        })
    }
}

/// Inclusive first and last day of a calendar month, in the reference
/// timezone (UTC). Correct across year boundaries and leap years.
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), Error> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| Error::validation("year is out of range"))?;

    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let last = NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| Error::validation("year is out of range"))?;

    Ok((first, last))
}

/// Resolve the monthly report for one (user, year, month).
///
/// Cache hit: the stored document is returned verbatim with no further
/// computation. Cache miss: the month's ledger entries are aggregated in
/// insertion order, persisted as the period's one document, and returned.
/// If a concurrent request materialized the period first, the store-level
/// uniqueness constraint resolves the race and the winner's document is
/// returned.
pub fn monthly_report(conn: &Connection, params: &ReportParams) -> Result<MonthlyReport, Error> {
    if db::find_user(conn, &params.userid)?.is_none() {
        return Err(Error::user_not_found());
    }

    if let Some(cached) = db::find_report(conn, &params.userid, params.year, params.month)? {
        return Ok(cached);
    }

    let (first, last) = month_bounds(params.year, params.month)?;
    let mut costs = CostsByCategory::default();
    for record in db::costs_in_range(conn, &params.userid, first, last)? {
        costs.push(
            record.category,
            CostItem {
                sum: record.sum,
                description: record.description,
                day: record.date.day(),
            },
        );
    }

    let report = MonthlyReport {
        userid: params.userid.clone(),
        year: params.year,
        month: params.month,
        costs,
    };
    db::insert_report(conn, &report)
}

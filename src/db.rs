// SQLite store layer.
// One connection, opened at startup and shared by every request. The store
// is the sole arbiter of consistency: the single-report-per-period rule is
// a UNIQUE index here, not an application-level check.

use chrono::{Datelike, NaiveDate};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::category::Category;
use crate::error::Error;
use crate::report::{CostItem, CostsByCategory, MonthlyReport};

/// A user directory record. Provisioned externally; read-only for the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birthday: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marital_status: Option<String>,
}

/// One ledger entry, as persisted and as echoed back from ingestion.
/// Append-only: never mutated or deleted once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRecord {
    pub userid: String,
    pub description: String,
    pub category: Category,
    pub sum: f64,
    pub date: NaiveDate,
}

/// Open the store at `path` and ensure the schema exists.
pub fn open_database(path: &Path) -> Result<Connection, Error> {
    let conn = Connection::open(path)?;
    setup_database(&conn)?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<(), Error> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Users Table (externally provisioned identities)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT UNIQUE NOT NULL,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            birthday TEXT,
            marital_status TEXT
        )",
        [],
    )?;

    // ==========================================================================
    // Costs Table (the append-only ledger)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS costs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            userid TEXT NOT NULL,
            description TEXT NOT NULL,
            category TEXT NOT NULL,
            sum REAL NOT NULL,
            date TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Monthly Reports Table (materialized view over the ledger)
    // The costs column holds the per-category JSON document.
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS monthly_reports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            userid TEXT NOT NULL,
            year INTEGER NOT NULL,
            month INTEGER NOT NULL,
            costs TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_costs_user_date ON costs(userid, date)",
        [],
    )?;

    // At most one report document per (user, year, month). Concurrent cold
    // report requests race on the insert; the store rejects the loser.
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_report_period
         ON monthly_reports(userid, year, month)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// Users
// ============================================================================

/// Insert a user record. Duplicate identifiers are rejected by the store.
pub fn insert_user(conn: &Connection, user: &User) -> Result<(), Error> {
    conn.execute(
        "INSERT INTO users (user_id, first_name, last_name, birthday, marital_status)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            user.id,
            user.first_name,
            user.last_name,
            user.birthday.map(|d| d.to_string()),
            user.marital_status,
        ],
    )?;
    Ok(())
}

/// Exact-match lookup by external identifier.
pub fn find_user(conn: &Connection, id: &str) -> Result<Option<User>, Error> {
    let user = conn
        .query_row(
            "SELECT user_id, first_name, last_name, birthday, marital_status
             FROM users
             WHERE user_id = ?1",
            params![id],
            |row| {
                let birthday: Option<String> = row.get(3)?;
                let birthday = birthday
                    .map(|s| {
                        NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|e| {
                            rusqlite::Error::FromSqlConversionFailure(
                                3,
                                rusqlite::types::Type::Text,
                                Box::new(e),
                            )
                        })
                    })
                    .transpose()?;

                Ok(User {
                    id: row.get(0)?,
                    first_name: row.get(1)?,
                    last_name: row.get(2)?,
                    birthday,
                    marital_status: row.get(4)?,
                })
            },
        )
        .optional()?;

    Ok(user)
}

/// Running total of every cost the user has ever logged. Computed live on
/// each call, never cached. 0.0 for a user with no entries.
pub fn sum_costs_for_user(conn: &Connection, id: &str) -> Result<f64, Error> {
    let total: f64 = conn.query_row(
        "SELECT COALESCE(SUM(sum), 0.0) FROM costs WHERE userid = ?1",
        params![id],
        |row| row.get(0),
    )?;

    Ok(total)
}

// ============================================================================
// Costs
// ============================================================================

pub fn insert_cost(conn: &Connection, record: &CostRecord) -> Result<(), Error> {
    conn.execute(
        "INSERT INTO costs (userid, description, category, sum, date)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            record.userid,
            record.description,
            record.category.as_str(),
            record.sum,
            record.date.to_string(),
        ],
    )?;
    Ok(())
}

/// All of a user's cost entries with a date in the inclusive range and a
/// category in the fixed set, in ledger (insertion) order.
pub fn costs_in_range(
    conn: &Connection,
    userid: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<CostRecord>, Error> {
    let mut stmt = conn.prepare(
        "SELECT userid, description, category, sum, date
         FROM costs
         WHERE userid = ?1
           AND date >= ?2 AND date <= ?3
           AND category IN ('food', 'health', 'housing', 'sport', 'education')
         ORDER BY id",
    )?;

    let records = stmt
        .query_map(params![userid, from.to_string(), to.to_string()], |row| {
            let category: String = row.get(2)?;
            let category = Category::parse(&category).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    2,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;

            let date: String = row.get(4)?;
            let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    4,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;

            Ok(CostRecord {
                userid: row.get(0)?,
                description: row.get(1)?,
                category,
                sum: row.get(3)?,
                date,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(records)
}

// ============================================================================
// Monthly reports
// ============================================================================

/// Exact-match cache lookup. The stored document is returned as-is.
pub fn find_report(
    conn: &Connection,
    userid: &str,
    year: i32,
    month: u32,
) -> Result<Option<MonthlyReport>, Error> {
    let costs_json: Option<String> = conn
        .query_row(
            "SELECT costs FROM monthly_reports
             WHERE userid = ?1 AND year = ?2 AND month = ?3",
            params![userid, year, month],
            |row| row.get(0),
        )
        .optional()?;

    let Some(costs_json) = costs_json else {
        return Ok(None);
    };

    let costs: CostsByCategory = serde_json::from_str(&costs_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Some(MonthlyReport {
        userid: userid.to_string(),
        year,
        month,
        costs,
    }))
}

/// Materialize a report document.
///
/// Two concurrent cold requests for the same period both reach this insert;
/// the UNIQUE index lets exactly one win. The loser discards its own
/// aggregate, re-reads the winner's document, and returns that instead.
pub fn insert_report(conn: &Connection, report: &MonthlyReport) -> Result<MonthlyReport, Error> {
    let costs_json = serde_json::to_string(&report.costs)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

    let result = conn.execute(
        "INSERT INTO monthly_reports (userid, year, month, costs)
         VALUES (?1, ?2, ?3, ?4)",
        params![report.userid, report.year, report.month, costs_json],
    );

    match result {
        Ok(_) => Ok(report.clone()),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            find_report(conn, &report.userid, report.year, report.month)?.ok_or_else(|| {
                // Reports are never deleted, so the winning row must exist.
                rusqlite::Error::QueryReturnedNoRows.into()
            })
        }
        Err(e) => Err(e.into()),
    }
}

/// Append one entry to the matching category array of an existing report
/// document. A single atomic UPDATE: it never reads prior contents and it
/// never creates a missing document. Returns whether a document was hit.
pub fn append_cost_to_report(conn: &Connection, record: &CostRecord) -> Result<bool, Error> {
    let item = CostItem {
        sum: record.sum,
        description: record.description.clone(),
        day: record.date.day(),
    };
    let item_json = serde_json::to_string(&item)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

    let updated = conn.execute(
        "UPDATE monthly_reports
         SET costs = json_insert(costs, '$.' || ?1 || '[#]', json(?2))
         WHERE userid = ?3 AND year = ?4 AND month = ?5",
        params![
            record.category.as_str(),
            item_json,
            record.userid,
            record.date.year(),
            record.date.month(),
        ],
    )?;

    Ok(updated > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    fn seed_user(conn: &Connection, id: &str) {
        insert_user(
            conn,
            &User {
                id: id.to_string(),
                first_name: "Dana".to_string(),
                last_name: "Peretz".to_string(),
                birthday: None,
                marital_status: None,
            },
        )
        .unwrap();
    }

    fn cost(userid: &str, description: &str, category: Category, sum: f64, date: &str) -> CostRecord {
        CostRecord {
            userid: userid.to_string(),
            description: description.to_string(),
            category,
            sum,
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        }
    }

    #[test]
    fn test_user_roundtrip() {
        let conn = test_conn();
        insert_user(
            &conn,
            &User {
                id: "123123".to_string(),
                first_name: "Mila".to_string(),
                last_name: "Stern".to_string(),
                birthday: Some(NaiveDate::from_ymd_opt(1990, 5, 4).unwrap()),
                marital_status: Some("single".to_string()),
            },
        )
        .unwrap();

        let user = find_user(&conn, "123123").unwrap().unwrap();
        assert_eq!(user.first_name, "Mila");
        assert_eq!(user.last_name, "Stern");
        assert_eq!(
            user.birthday,
            Some(NaiveDate::from_ymd_opt(1990, 5, 4).unwrap())
        );

        assert!(find_user(&conn, "99999999").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_user_rejected() {
        let conn = test_conn();
        seed_user(&conn, "1");

        let err = insert_user(
            &conn,
            &User {
                id: "1".to_string(),
                first_name: "Other".to_string(),
                last_name: "Person".to_string(),
                birthday: None,
                marital_status: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::Store { .. }));
    }

    #[test]
    fn test_sum_costs_for_user() {
        let conn = test_conn();
        seed_user(&conn, "1");

        assert_eq!(sum_costs_for_user(&conn, "1").unwrap(), 0.0);

        insert_cost(&conn, &cost("1", "rent", Category::Housing, 500.0, "2025-03-01")).unwrap();
        insert_cost(&conn, &cost("1", "pasta", Category::Food, 12.5, "2025-04-02")).unwrap();
        insert_cost(&conn, &cost("2", "gym", Category::Sport, 30.0, "2025-03-05")).unwrap();

        assert_eq!(sum_costs_for_user(&conn, "1").unwrap(), 512.5);
    }

    #[test]
    fn test_costs_in_range_filters_and_orders() {
        let conn = test_conn();

        insert_cost(&conn, &cost("1", "rent", Category::Housing, 500.0, "2025-03-01")).unwrap();
        insert_cost(&conn, &cost("1", "checkup", Category::Health, 80.0, "2025-03-31")).unwrap();
        insert_cost(&conn, &cost("1", "april rent", Category::Housing, 500.0, "2025-04-01")).unwrap();
        insert_cost(&conn, &cost("2", "pasta", Category::Food, 12.0, "2025-03-10")).unwrap();

        let from = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();
        let records = costs_in_range(&conn, "1", from, to).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].description, "rent");
        assert_eq!(records[1].description, "checkup");
    }

    #[test]
    fn test_insert_report_enforces_single_document() {
        let conn = test_conn();

        let mut first = MonthlyReport {
            userid: "1".to_string(),
            year: 2025,
            month: 3,
            costs: CostsByCategory::default(),
        };
        first.costs.housing.push(CostItem {
            sum: 500.0,
            description: "rent".to_string(),
            day: 1,
        });
        insert_report(&conn, &first).unwrap();

        // A second create for the same period loses the race and must come
        // back with the winner's document, not its own.
        let mut second = first.clone();
        second.costs = CostsByCategory::default();
        let resolved = insert_report(&conn, &second).unwrap();
        assert_eq!(resolved.costs.housing.len(), 1);
        assert_eq!(resolved.costs.housing[0].description, "rent");

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM monthly_reports
                 WHERE userid = '1' AND year = 2025 AND month = 3",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_append_requires_existing_document() {
        let conn = test_conn();

        let hit = append_cost_to_report(
            &conn,
            &cost("1", "rent", Category::Housing, 500.0, "2025-03-01"),
        )
        .unwrap();
        assert!(!hit);

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM monthly_reports", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_append_into_existing_document() {
        let conn = test_conn();

        let report = MonthlyReport {
            userid: "1".to_string(),
            year: 2025,
            month: 3,
            costs: CostsByCategory::default(),
        };
        insert_report(&conn, &report).unwrap();

        let hit = append_cost_to_report(
            &conn,
            &cost("1", "pasta", Category::Food, 12.0, "2025-03-15"),
        )
        .unwrap();
        assert!(hit);

        let stored = find_report(&conn, "1", 2025, 3).unwrap().unwrap();
        assert_eq!(stored.costs.food.len(), 1);
        assert_eq!(stored.costs.food[0].description, "pasta");
        assert_eq!(stored.costs.food[0].day, 15);
        assert!(stored.costs.housing.is_empty());
    }
}

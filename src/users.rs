// User Directory lookups.
// Pure queries: a user card with a live running total, and the static
// project roster. No state machine, nothing cached.

use rusqlite::Connection;
use serde::Serialize;

use crate::db;
use crate::error::Error;

/// User card plus the running total of every cost they have logged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub total: f64,
}

/// Look up a user and compute their total across all recorded costs.
/// The total is recomputed from the ledger on every call; a user with no
/// entries gets 0, not an error.
pub fn user_summary(conn: &Connection, id: &str) -> Result<UserSummary, Error> {
    let id = id.trim();
    if id.is_empty() {
        return Err(Error::validation("User ID is required"));
    }

    let user = db::find_user(conn, id)?.ok_or_else(Error::user_not_found)?;
    let total = db::sum_costs_for_user(conn, id)?;

    Ok(UserSummary {
        id: user.id,
        first_name: user.first_name,
        last_name: user.last_name,
        total,
    })
}

/// One entry of the project roster.
#[derive(Debug, Clone, Serialize)]
pub struct TeamMember {
    pub first_name: &'static str,
    pub last_name: &'static str,
}

/// The fixed roster served by the about endpoint.
pub fn about_team() -> Vec<TeamMember> {
    vec![
        TeamMember {
            first_name: "Noa",
            last_name: "Berkovich",
        },
        TeamMember {
            first_name: "Tomer",
            last_name: "Azulay",
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::Category;
    use crate::db::{insert_cost, insert_user, setup_database, CostRecord, User};
    use chrono::NaiveDate;

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

    #[test]
    fn blank_id_is_a_validation_error() {
        let conn = test_conn();
        let err = user_summary(&conn, "   ").unwrap_err();
        assert_eq!(err.to_string(), "User ID is required");
    }

    #[test]
    fn unknown_user_is_not_found() {
        let conn = test_conn();
        let err = user_summary(&conn, "99999999").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn summary_with_no_costs_has_zero_total() {
        let conn = test_conn();
        seed_user(&conn, "123123");

        let summary = user_summary(&conn, "123123").unwrap();
        assert_eq!(summary.first_name, "Dana");
        assert_eq!(summary.total, 0.0);
    }

    #[test]
    fn summary_totals_every_entry_across_periods() {
        let conn = test_conn();
        seed_user(&conn, "1");

        for (description, sum, date) in [
            ("rent", 500.0, "2025-03-01"),
            ("pasta", 12.5, "2025-04-02"),
            ("gym", 30.0, "2024-11-20"),
        ] {
            insert_cost(
                &conn,
                &CostRecord {
                    userid: "1".to_string(),
                    description: description.to_string(),
                    category: Category::Housing,
                    sum,
                    date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
                },
            )
            .unwrap();
        }

        let summary = user_summary(&conn, " 1 ").unwrap();
        assert_eq!(summary.total, 542.5);
    }

    #[test]
    fn roster_has_both_members() {
        let team = about_team();
        assert_eq!(team.len(), 2);
        assert!(team.iter().all(|m| !m.first_name.is_empty()));
    }
}

// Cost Manager - Core Library
// Exposes the store, validation, and report logic for the API server and tests

pub mod category;
pub mod db;
pub mod error;
pub mod ingest;
pub mod report;
pub mod users;

// Re-export commonly used types
pub use category::Category;
pub use db::{open_database, setup_database, CostRecord, User};
pub use error::Error;
pub use ingest::{add_cost, NewCost};
pub use report::{
    month_bounds, monthly_report, CostItem, CostsByCategory, MonthlyReport, ReportParams,
};
pub use users::{about_team, user_summary, TeamMember, UserSummary};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

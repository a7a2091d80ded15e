pub mod api;
pub mod clean;
pub mod config;
pub mod consolidate;
pub mod driver;
pub mod ledger;
pub mod roster_parser;
pub mod school_index;
pub mod schema;
pub mod table;

pub mod database;
pub mod library;

pub use database::Database;

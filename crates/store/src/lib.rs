//! Student and template directory backing the messaging flow.
//!
//! Data is held in DashMap (development); swap to a database for production.

pub mod store;

pub use store::{CreateTemplateRequest, DirectoryStore};

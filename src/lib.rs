//! Metadata-driven CRUD engine for the AgroChoco marketplace.
//!
//! Tables are described once in [`schema`]; [`field`] turns field
//! definitions into widgets and display strings; [`form`] and [`list`] hold
//! the create/edit and listing state; [`gateway`] is the only code that talks
//! to the REST backend.

pub mod account;
pub mod error;
pub mod field;
pub mod form;
pub mod gateway;
pub mod list;
pub mod notifications;
pub mod schema;
pub mod session;

pub use error::{Error, Result};

/// One backend row, keyed by field key.
pub type Record = serde_json::Map<String, serde_json::Value>;

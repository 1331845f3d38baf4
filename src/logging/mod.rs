//! This module contains the client-side logging infrastructure.
//!
//! It includes the in-memory `LogStore` that viewers subscribe to and the
//! helpers used to export its contents.
pub mod export;
pub mod store;

pub use export::{export_file_name, export_json, export_to_dir};
pub use store::{LogStore, Subscription};

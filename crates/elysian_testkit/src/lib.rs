//! # ElysianDB Testkit
//!
//! Test utilities for ElysianDB.
//!
//! This crate provides:
//! - Engines over temporary data folders, with reopen and crash helpers
//! - Property-based generators for documents, names and filters
//! - Concurrent load helpers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use elysian_testkit::prelude::*;
//!
//! #[test]
//! fn writes_are_listed() {
//!     with_temp_engine(|engine| {
//!         let mut book = doc(serde_json::json!({"title": "Dune"}));
//!         engine.write_entity("books", &mut book).unwrap();
//!         assert_eq!(engine.count_entities("books"), 1);
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
    pub use elysian_core::{Engine, ListQuery, NativeEngine, Query};
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;

#![allow(
    dead_code,
    unused_imports,
)]
//! # Docket - Typed Document Mapping
//!
//! Docket is an embedded document-mapping layer: typed document schemas, an
//! index-aware query planner, and pluggable storage backends behind one
//! narrow protocol.
//!
//! ## Key Features
//!
//! - **Typed Schemas**: Declared document types with validated, coerced
//!   properties
//! - **Index-Aware Planning**: Filters resolve positionally to a driving
//!   index; everything else is residual filtering
//! - **Pluggable Backends**: Partitioned, key-value, and hybrid blob
//!   storage strategies behind one protocol
//! - **Index Drift Protection**: Saves retire stale derived index entries
//!   in the same write
//! - **Uniqueness Enforcement**: Unique-flagged properties are probed
//!   through their implicit index before every write
//! - **Clean API**: PIMPL pattern provides stable, encapsulated interfaces
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docket::backend::KeyValueBackend;
//! use docket::docket::Docket;
//! use docket::filter::FilterSpec;
//! use docket::property::Property;
//! use docket::schema::DocumentType;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let docket = Docket::builder()
//!     .with_backend(Arc::new(KeyValueBackend::new("kv")))
//!     .open_or_create()?;
//!
//! let student = DocumentType::builder("Student")
//!     .property("name", Property::char().required().unique())
//!     .property("city", Property::char().global_index())
//!     .property("gpa", Property::float())
//!     .build()?;
//! let students = docket.register_type(student)?;
//!
//! let mut doc = students.new_document();
//! doc.set("name", "Brian")?;
//! doc.set("city", "Durham")?;
//! doc.set("gpa", 3.9)?;
//! students.save(&mut doc)?;
//!
//! let in_durham = students.filter(FilterSpec::new().eq("city", "Durham"))?;
//! for doc in in_durham.documents()? {
//!     println!("{}", doc);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`backend`] - Storage backend protocol and the shipped strategies
//! - [`common`] - Common types, constants, and utilities
//! - [`docket`] - Core database interface
//! - [`docket_builder`] - Database builder for initialization
//! - [`docket_config`] - Runtime configuration
//! - [`document`] - The document entity and write preparation
//! - [`errors`] - Error types and result definitions
//! - [`filter`] - Filter conditions and specifications
//! - [`index`] - The index model and index resolution
//! - [`property`] - Typed property descriptors
//! - [`query`] - Query planning, execution, and query sets
//! - [`schema`] - Document type declarations
//! - [`store`] - The per-type document store surface

pub mod backend;
pub mod common;
pub mod docket;
pub mod docket_builder;
pub mod docket_config;
pub mod document;
pub mod errors;
pub mod filter;
pub mod index;
pub mod property;
pub mod query;
pub mod schema;
pub mod store;

pub use crate::docket::Docket;
pub use crate::docket_builder::DocketBuilder;
pub use crate::docket_config::DocketConfig;
pub use crate::document::Document;
pub use crate::errors::{DocketError, DocketResult, ErrorKind};
pub use crate::filter::FilterSpec;
pub use crate::property::Property;
pub use crate::query::{QueryOptions, QuerySet};
pub use crate::schema::DocumentType;
pub use crate::store::DocumentStore;

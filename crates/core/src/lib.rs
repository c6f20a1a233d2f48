//! DirMigrate core library.
//!
//! This crate provides the building blocks for migrating user and group
//! entries from a source LDAP directory into an IPA-style identity
//! directory: configuration, directory connectors, schema mapping, and the
//! migration engine that ties them together and produces a report.

pub mod config;
pub mod context;
pub mod directory;
pub mod dn;
pub mod engine;
pub mod entry;
pub mod errors;
pub mod filter;
pub mod models;
pub mod report;
pub mod schema;

// Re-exports for convenience.
pub use config::{AppConfig, MigrationOptions};
pub use directory::{LdapDirectory, MemoryDirectory, SourceDirectory, TargetDirectory};
pub use engine::MigrationEngine;
pub use entry::Attributes;
pub use models::RecordType;
pub use report::MigrationReport;

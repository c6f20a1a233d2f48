//! Directory connectors.
//!
//! The engine talks to the source and target directories only through the
//! [`SourceDirectory`] and [`TargetDirectory`] traits. [`ldap::LdapDirectory`]
//! implements both over `ldap3`; [`memory::MemoryDirectory`] is an in-process
//! directory for tests and dry runs.

pub mod ldap;
pub mod memory;

use async_trait::async_trait;

use crate::entry::{Attributes, SearchEntry};
use crate::errors::DirectoryError;

pub use self::ldap::LdapDirectory;
pub use self::memory::MemoryDirectory;

/// Search depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    Base,
    OneLevel,
    Subtree,
}

/// Parameters of a search.
#[derive(Debug, Clone)]
pub struct SearchRequest<'a> {
    pub base: &'a str,
    pub scope: SearchScope,
    pub filter: &'a str,
    pub attributes: &'a [&'a str],
    /// Seconds; 0 means no limit.
    pub time_limit: u32,
    /// Entries; 0 means no limit.
    pub size_limit: u32,
    /// Return search references as entries without a DN.
    pub include_references: bool,
}

impl<'a> SearchRequest<'a> {
    /// Unlimited search of `base` for `filter`, all attributes.
    pub fn new(base: &'a str, scope: SearchScope, filter: &'a str) -> Self {
        Self {
            base,
            scope,
            filter,
            attributes: &["*"],
            time_limit: 0,
            size_limit: 0,
            include_references: false,
        }
    }

    pub fn with_references(mut self) -> Self {
        self.include_references = true;
        self
    }

    pub fn with_attributes(mut self, attributes: &'a [&'a str]) -> Self {
        self.attributes = attributes;
        self
    }
}

/// Entries returned by a search, in server order.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub entries: Vec<SearchEntry>,
    /// The server stopped early because of a size or time limit.
    pub truncated: bool,
}

/// Read-only access to the directory being migrated from.
#[async_trait]
pub trait SourceDirectory: Send {
    /// Fails with [`DirectoryError::NotFound`] if the base does not exist.
    async fn search(&mut self, request: &SearchRequest<'_>) -> Result<SearchOutcome, DirectoryError>;

    /// `namingContexts` advertised by the root DSE.
    async fn naming_contexts(&mut self) -> Result<Vec<String>, DirectoryError>;
}

/// Write access to the directory being migrated into.
#[async_trait]
pub trait TargetDirectory: Send {
    /// Add a new entry. Fails with [`DirectoryError::AlreadyExists`] or
    /// [`DirectoryError::ConstraintViolation`].
    async fn insert(&mut self, dn: &str, attributes: &Attributes) -> Result<(), DirectoryError>;

    /// Read `attributes` of the entry at `dn`.
    async fn lookup(&mut self, dn: &str, attributes: &[&str]) -> Result<Attributes, DirectoryError>;

    /// Add `member_dn` to the `member` attribute of `group_dn`.
    async fn add_member(&mut self, member_dn: &str, group_dn: &str) -> Result<(), DirectoryError>;

    /// Find the first entry of `object_class` whose `attribute` equals
    /// `value`. Fails with [`DirectoryError::NotFound`] when there is none.
    async fn find_by_attribute(
        &mut self,
        attribute: &str,
        value: &str,
        object_class: &str,
        attributes: &[&str],
    ) -> Result<(String, Attributes), DirectoryError>;
}

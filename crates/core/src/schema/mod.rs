//! Per-record-type schema mapping.
//!
//! A [`RecordMigrator`] turns a source entry into a target-ready entry. Each
//! record type has one: [`UserMigrator`] and [`GroupMigrator`]. The engine
//! calls [`RecordMigrator::pre_transform`] before inserting an entry and
//! [`RecordMigrator::post_transform`] after a successful insertion.

pub mod group;
pub mod user;

pub use group::{GroupMigrator, MembershipSchema, SearchBases};
pub use user::UserMigrator;

use crate::context::RunContext;
use crate::directory::TargetDirectory;
use crate::entry::Attributes;
use crate::errors::MigrationError;

/// Unique-id placeholder the target replaces with a generated value.
pub const AUTOGENERATE: &str = "autogenerate";

/// Object classes and attributes that must not be carried over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blacklists {
    pub object_classes: Vec<String>,
    pub attributes: Vec<String>,
}

impl Blacklists {
    /// Strip `fixed` and the configured attributes, then the configured
    /// object classes.
    pub fn apply(&self, fixed: &[&str], attributes: &mut Attributes) {
        attributes.remove_all(fixed);
        attributes.remove_all(&self.attributes);
        attributes.remove_object_classes(&self.object_classes);
    }
}

/// An entry on its way into the target directory.
#[derive(Debug, Clone)]
pub struct PendingEntry {
    /// Lowercased primary key.
    pub pkey: String,
    /// DN the entry will be inserted at.
    pub dn: String,
    pub attributes: Attributes,
}

/// Result of a pre-transform hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreTransform {
    /// Insert the entry at `dn`.
    Proceed { dn: String },
    /// Do not insert the entry. A reason is recorded as a failure.
    Skip { reason: Option<String> },
}

/// Schema mapper for one record type.
#[derive(Debug, Clone)]
pub enum RecordMigrator {
    User(UserMigrator),
    Group(GroupMigrator),
}

impl RecordMigrator {
    /// Transform `entry` in place and decide whether it gets inserted.
    ///
    /// An `Err` is fatal for the whole run.
    pub async fn pre_transform(
        &self,
        target: &mut dyn TargetDirectory,
        entry: &mut PendingEntry,
        ctx: &mut RunContext,
        blacklists: &Blacklists,
    ) -> Result<PreTransform, MigrationError> {
        match self {
            Self::User(m) => m.pre_transform(target, entry, ctx, blacklists).await,
            Self::Group(m) => Ok(m.pre_transform(entry, blacklists)),
        }
    }

    /// Run after a successful insertion. Returns a failure reason to record
    /// against the entry, which stays in the migrated list either way.
    pub async fn post_transform(
        &self,
        target: &mut dyn TargetDirectory,
        entry: &PendingEntry,
        ctx: &RunContext,
    ) -> Result<Option<String>, MigrationError> {
        match self {
            Self::User(m) => m.post_transform(target, entry, ctx).await,
            Self::Group(_) => Ok(None),
        }
    }
}

//! Domain model types shared by the engine, the schema mappers and the
//! report.

use serde::{Deserialize, Serialize};

/// Kind of directory record being migrated.
///
/// The declaration order is the migration order: users first, because group
/// membership refers to users by their new DN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    User,
    Group,
}

/// Fixed migration order.
pub const MIGRATE_ORDER: [RecordType; 2] = [RecordType::User, RecordType::Group];

impl RecordType {
    /// Attribute holding the primary key on both sides.
    pub fn key_attribute(self) -> &'static str {
        match self {
            Self::User => "uid",
            Self::Group => "cn",
        }
    }

    pub fn plural(self) -> &'static str {
        match self {
            Self::User => "users",
            Self::Group => "groups",
        }
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Group => write!(f, "group"),
        }
    }
}

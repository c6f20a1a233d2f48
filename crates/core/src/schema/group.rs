//! Group schema mapping and membership conversion.
//!
//! Two membership encodings are supported:
//!
//! - **RFC2307bis**: `member` / `uniquemember` hold full DNs. Each DN is
//!   classified by the source container it lives in and rebuilt under the
//!   matching target container.
//! - **RFC2307**: `memberuid` holds bare user identifiers, which always refer
//!   to users.
//!
//! Both end up in the target's single `member` attribute. RFC2307 groups
//! keep their `memberuid` values as well.

use std::str::FromStr;

use tracing::{error, info};

use super::{Blacklists, PendingEntry, PreTransform, AUTOGENERATE};
use crate::config::TargetConfig;
use crate::dn;
use crate::entry::Attributes;
use crate::errors::MigrationError;
use crate::models::RecordType;

/// Attributes never copied from a source group.
const GROUP_ATTR_BLACKLIST: &[&str] = &["memberofindirect", "memberindirect"];

const MEMBER: &str = "member";
const UNIQUE_MEMBER: &str = "uniquemember";
const MEMBER_UID: &str = "memberuid";

/// How the source directory encodes group members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipSchema {
    /// Members are full DNs in `member` and `uniquemember`.
    Rfc2307bis,
    /// Members are user identifiers in `memberuid`.
    Rfc2307,
}

impl FromStr for MembershipSchema {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rfc2307bis" => Ok(Self::Rfc2307bis),
            "rfc2307" => Ok(Self::Rfc2307),
            _ => Err(MigrationError::UnsupportedSchema(s.to_string())),
        }
    }
}

impl std::fmt::Display for MembershipSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rfc2307bis => write!(f, "RFC2307bis"),
            Self::Rfc2307 => write!(f, "RFC2307"),
        }
    }
}

/// Source search bases used to classify member DNs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchBases {
    pub user: String,
    pub group: String,
}

impl SearchBases {
    /// `<container>,<base_dn>` for users and groups.
    pub fn new(user_container: &str, group_container: &str, base_dn: &str) -> Self {
        Self {
            user: dn::join(&[user_container, base_dn]),
            group: dn::join(&[group_container, base_dn]),
        }
    }

    pub fn for_type(&self, record_type: RecordType) -> &str {
        match record_type {
            RecordType::User => &self.user,
            RecordType::Group => &self.group,
        }
    }
}

/// Maps source group entries onto the target's group schema.
#[derive(Debug, Clone)]
pub struct GroupMigrator {
    target: TargetConfig,
    schema: MembershipSchema,
    search_bases: SearchBases,
}

impl GroupMigrator {
    pub fn new(target: TargetConfig, schema: MembershipSchema, search_bases: SearchBases) -> Self {
        Self {
            target,
            schema,
            search_bases,
        }
    }

    /// Rebuild one source member DN under the target containers.
    ///
    /// Returns `None` (after logging) for DNs without a usable leaf RDN or
    /// outside both source containers.
    fn convert_member_dn(&self, member: &str) -> Option<String> {
        let Some(value) = dn::leaf_rdn_value(member) else {
            error!(member, "malformed DN has no RDN");
            return None;
        };

        let record_type = if dn::is_within(member, &self.search_bases.user) {
            RecordType::User
        } else if dn::is_within(member, &self.search_bases.group) {
            RecordType::Group
        } else {
            error!(member, "entry does not belong into any known container");
            return None;
        };

        info!(member, %record_type, "migrating member reference");
        Some(dn::normalize(&self.target.entry_dn(record_type, &value)))
    }

    fn convert_member_dns(&self, attrs: &mut Attributes, member_attr: &str) -> Vec<String> {
        attrs
            .remove(member_attr)
            .unwrap_or_default()
            .iter()
            .filter_map(|m| self.convert_member_dn(m))
            .collect()
    }

    /// RFC2307bis: `member` is rebuilt from its own converted values, then
    /// the converted `uniquemember` values are appended.
    fn convert_rfc2307bis(&self, attrs: &mut Attributes) {
        let members = self.convert_member_dns(attrs, MEMBER);
        attrs.set(MEMBER, members);

        let unique = self.convert_member_dns(attrs, UNIQUE_MEMBER);
        attrs.extend(MEMBER, unique);
    }

    /// RFC2307: every `memberuid` value becomes a user DN. `memberuid`
    /// itself is kept for POSIX clients.
    fn convert_rfc2307(&self, attrs: &mut Attributes) {
        let members: Vec<String> = attrs
            .get(MEMBER_UID)
            .unwrap_or_default()
            .iter()
            .map(|uid| dn::normalize(&self.target.entry_dn(RecordType::User, uid)))
            .collect();
        attrs.set(MEMBER, members);
    }

    pub(super) fn pre_transform(
        &self,
        entry: &mut PendingEntry,
        blacklists: &Blacklists,
    ) -> PreTransform {
        let attrs = &mut entry.attributes;
        attrs.set("ipauniqueid", [AUTOGENERATE]);

        match self.schema {
            MembershipSchema::Rfc2307bis => self.convert_rfc2307bis(attrs),
            MembershipSchema::Rfc2307 => self.convert_rfc2307(attrs),
        }
        // LDAP rejects attributes without values.
        if attrs.get(MEMBER).is_some_and(<[String]>::is_empty) {
            attrs.remove(MEMBER);
        }

        blacklists.apply(GROUP_ATTR_BLACKLIST, attrs);

        PreTransform::Proceed {
            dn: entry.dn.clone(),
        }
    }
}

//! User (account) schema mapping.

use tracing::{debug, info, warn};

use super::{Blacklists, PendingEntry, PreTransform, AUTOGENERATE};
use crate::config::TargetConfig;
use crate::context::{DefaultGroup, RunContext};
use crate::directory::TargetDirectory;
use crate::dn;
use crate::errors::{DirectoryError, MigrationError};
use crate::models::RecordType;

/// Attributes never copied from a source user.
const USER_ATTR_BLACKLIST: &[&str] = &["krbprincipalkey", "memberofindirect", "memberindirect"];

const PRINCIPAL_ATTR: &str = "krbprincipalname";
const PRINCIPAL_OBJECT_CLASS: &str = "krbprincipalaux";

pub(crate) fn principal_exists_message(principal: &str) -> String {
    format!(
        "Kerberos principal {principal} already exists. Use 'ipa user-mod' to set it manually."
    )
}

pub(crate) const DEFAULT_GROUP_FAILED_MESSAGE: &str =
    "Failed to add user to the default group. Use 'ipa group-add-member' to add manually.";

/// Maps source user entries onto the target's account schema.
#[derive(Debug, Clone)]
pub struct UserMigrator {
    target: TargetConfig,
}

impl UserMigrator {
    pub fn new(target: TargetConfig) -> Self {
        Self { target }
    }

    /// Resolve the default primary group once per run.
    async fn default_group<'c>(
        &self,
        directory: &mut dyn TargetDirectory,
        ctx: &'c mut RunContext,
    ) -> Result<&'c DefaultGroup, MigrationError> {
        if ctx.default_group().is_none() {
            let dn = self
                .target
                .entry_dn(RecordType::Group, &self.target.default_primary_group);
            debug!(dn = %dn, "resolving default group for new users");

            let attrs = match directory.lookup(&dn, &["gidnumber"]).await {
                Ok(attrs) => attrs,
                Err(DirectoryError::NotFound { .. }) => {
                    return Err(MigrationError::DefaultGroupNotFound { dn });
                }
                Err(e) => return Err(e.into()),
            };
            let gid_number = attrs
                .first("gidnumber")
                .ok_or_else(|| MigrationError::DefaultGroupMissingGid { dn: dn.clone() })?
                .to_string();

            info!(dn = %dn, gid_number = %gid_number, "resolved default group");
            ctx.set_default_group(DefaultGroup { dn, gid_number });
        }
        ctx.default_group()
            .ok_or_else(|| MigrationError::DefaultGroupNotFound {
                dn: self.target.default_primary_group.clone(),
            })
    }

    /// Home directory for `pkey` under the configured homes root, with
    /// repeated separators collapsed and no trailing separator.
    pub fn home_directory(&self, pkey: &str) -> String {
        let raw = format!("{}/{}", self.target.homes_root, pkey);
        let mut home = String::with_capacity(raw.len());
        for c in raw.chars() {
            if c == '/' && home.ends_with('/') {
                continue;
            }
            home.push(c);
        }
        while home.len() > 1 && home.ends_with('/') {
            home.pop();
        }
        home
    }

    pub fn principal(&self, pkey: &str) -> String {
        format!("{}@{}", pkey, self.target.realm)
    }

    pub(super) async fn pre_transform(
        &self,
        directory: &mut dyn TargetDirectory,
        entry: &mut PendingEntry,
        ctx: &mut RunContext,
        blacklists: &Blacklists,
    ) -> Result<PreTransform, MigrationError> {
        let default_gid = self.default_group(directory, ctx).await?.gid_number.clone();

        let attrs = &mut entry.attributes;
        attrs.set("ipauniqueid", [AUTOGENERATE]);
        if !attrs.contains("homedirectory") {
            attrs.set("homedirectory", [self.home_directory(&entry.pkey)]);
        }
        attrs.set_default("gidnumber", default_gid);

        blacklists.apply(USER_ATTR_BLACKLIST, attrs);

        let principal = self.principal(&entry.pkey);
        match directory
            .find_by_attribute(PRINCIPAL_ATTR, &principal, PRINCIPAL_OBJECT_CLASS, &[])
            .await
        {
            // Held by the entry we are about to insert: let the insert report
            // the conflict.
            Ok((existing_dn, _)) if dn::comparison_key(&existing_dn) == dn::comparison_key(&entry.dn) => {
                debug!(pkey = %entry.pkey, "principal belongs to the target entry itself");
                Ok(PreTransform::Proceed {
                    dn: entry.dn.clone(),
                })
            }
            Ok((existing_dn, _)) => {
                warn!(pkey = %entry.pkey, principal = %principal, existing = %existing_dn, "principal already taken");
                Ok(PreTransform::Skip {
                    reason: Some(principal_exists_message(&principal)),
                })
            }
            Err(DirectoryError::NotFound { .. }) => {
                entry.attributes.set(PRINCIPAL_ATTR, [principal]);
                Ok(PreTransform::Proceed {
                    dn: entry.dn.clone(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Add the freshly inserted user to the default group.
    pub(super) async fn post_transform(
        &self,
        directory: &mut dyn TargetDirectory,
        entry: &PendingEntry,
        ctx: &RunContext,
    ) -> Result<Option<String>, MigrationError> {
        let Some(group) = ctx.default_group() else {
            return Ok(Some(DEFAULT_GROUP_FAILED_MESSAGE.to_string()));
        };
        match directory.add_member(&entry.dn, &group.dn).await {
            Ok(()) => Ok(None),
            Err(e) if e.is_entry_error() => {
                warn!(pkey = %entry.pkey, group = %group.dn, error = %e, "failed to add user to default group");
                Ok(Some(DEFAULT_GROUP_FAILED_MESSAGE.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

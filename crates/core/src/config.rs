//! TOML-based configuration system for DirMigrate.
//!
//! Bind passwords are stored as `_env` fields that reference environment
//! variable names. The actual secrets are resolved at runtime via
//! [`AppConfig::resolve_env_vars`].
//!
//! The `[source]` section doubles as the default set of run options; the
//! command line overrides individual fields before the run starts.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::directory::ldap::is_valid_ldap_uri;
use crate::errors::ConfigError;
use crate::models::RecordType;
use crate::schema::group::MembershipSchema;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Migration gate.
    #[serde(default)]
    pub migration: MigrationConfig,

    /// Target identity directory.
    pub target: TargetConfig,

    /// Source directory defaults.
    #[serde(default)]
    pub source: SourceConfig,
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Migration gate
// ---------------------------------------------------------------------------

/// Whether migration is permitted at all. Disabled unless set explicitly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationConfig {
    #[serde(default)]
    pub enabled: bool,
}

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// Target directory connection and layout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// LDAP URI of the target server (e.g. `ldap://ipa.example.com`).
    pub uri: String,

    /// DN used to bind to the target.
    #[serde(default = "default_target_bind_dn")]
    pub bind_dn: String,

    /// Environment variable holding the target bind password.
    pub password_env: String,

    /// Base DN of the target tree (e.g. `dc=example,dc=com`).
    pub base_dn: String,

    /// Kerberos realm used to build user principals.
    pub realm: String,

    /// User container relative to `base_dn`.
    #[serde(default = "default_user_container")]
    pub user_container: String,

    /// Group container relative to `base_dn`.
    #[serde(default = "default_group_container")]
    pub group_container: String,

    /// Group every migrated user is added to.
    #[serde(default = "default_primary_group")]
    pub default_primary_group: String,

    /// Root under which missing home directories are synthesized.
    #[serde(default = "default_homes_root")]
    pub homes_root: String,

    /// Object classes every migrated user receives.
    #[serde(default = "default_user_object_classes")]
    pub user_object_classes: Vec<String>,

    /// Object classes every migrated group receives.
    #[serde(default = "default_group_object_classes")]
    pub group_object_classes: Vec<String>,

    /// Resolved password (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub password: Option<String>,
}

fn default_target_bind_dn() -> String {
    "cn=directory manager".into()
}
fn default_user_container() -> String {
    "cn=users,cn=accounts".into()
}
fn default_group_container() -> String {
    "cn=groups,cn=accounts".into()
}
fn default_primary_group() -> String {
    "ipausers".into()
}
fn default_homes_root() -> String {
    "/home".into()
}
fn default_user_object_classes() -> Vec<String> {
    [
        "top",
        "person",
        "organizationalperson",
        "inetorgperson",
        "inetuser",
        "posixaccount",
        "krbprincipalaux",
        "krbticketpolicyaux",
        "ipaobject",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_group_object_classes() -> Vec<String> {
    ["top", "groupofnames", "nestedgroup", "ipausergroup", "ipaobject", "posixgroup"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl TargetConfig {
    /// Container DN for `record_type` under the target base.
    pub fn container_dn(&self, record_type: RecordType) -> String {
        let container = match record_type {
            RecordType::User => &self.user_container,
            RecordType::Group => &self.group_container,
        };
        crate::dn::join(&[container.as_str(), self.base_dn.as_str()])
    }

    /// DN an entry with primary key `pkey` receives on the target.
    pub fn entry_dn(&self, record_type: RecordType, pkey: &str) -> String {
        crate::dn::child(
            record_type.key_attribute(),
            pkey,
            &self.container_dn(record_type),
        )
    }

    /// Default object classes for `record_type`.
    pub fn object_classes(&self, record_type: RecordType) -> &[String] {
        match record_type {
            RecordType::User => &self.user_object_classes,
            RecordType::Group => &self.group_object_classes,
        }
    }
}

// ---------------------------------------------------------------------------
// Source / run options
// ---------------------------------------------------------------------------

/// Source directory credentials plus the default run options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// DN used to bind to the source directory.
    #[serde(default = "default_source_bind_dn")]
    pub bind_dn: String,

    /// Environment variable holding the source bind password.
    #[serde(default)]
    pub password_env: Option<String>,

    #[serde(flatten)]
    pub options: MigrationOptions,

    /// Resolved password.
    #[serde(skip)]
    pub password: Option<String>,
}

fn default_source_bind_dn() -> String {
    "cn=directory manager".into()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            bind_dn: default_source_bind_dn(),
            password_env: None,
            options: MigrationOptions::default(),
            password: None,
        }
    }
}

/// Options controlling one migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationOptions {
    /// RDN of the user container in the source directory.
    #[serde(default = "default_source_user_container")]
    pub user_container: String,

    /// RDN of the group container in the source directory.
    #[serde(default = "default_source_group_container")]
    pub group_container: String,

    /// Object classes used to search for users.
    #[serde(default = "default_source_user_object_classes")]
    pub user_object_classes: Vec<String>,

    /// Object classes used to search for groups.
    #[serde(default = "default_source_group_object_classes")]
    pub group_object_classes: Vec<String>,

    /// Object classes dropped from migrated users.
    #[serde(default)]
    pub user_ignore_object_classes: Vec<String>,

    /// Attributes dropped from migrated users.
    #[serde(default)]
    pub user_ignore_attributes: Vec<String>,

    /// Object classes dropped from migrated groups.
    #[serde(default)]
    pub group_ignore_object_classes: Vec<String>,

    /// Attributes dropped from migrated groups.
    #[serde(default)]
    pub group_ignore_attributes: Vec<String>,

    /// Membership schema of the source: `RFC2307bis` or `RFC2307`.
    #[serde(default = "default_schema")]
    pub schema: String,

    /// Treat a missing source container as empty instead of aborting.
    #[serde(default)]
    pub continue_on_error: bool,

    /// User primary keys to skip.
    #[serde(default)]
    pub exclude_users: Vec<String>,

    /// Group primary keys to skip.
    #[serde(default)]
    pub exclude_groups: Vec<String>,
}

fn default_source_user_container() -> String {
    "ou=people".into()
}
fn default_source_group_container() -> String {
    "ou=groups".into()
}
fn default_source_user_object_classes() -> Vec<String> {
    vec!["person".into()]
}
fn default_source_group_object_classes() -> Vec<String> {
    vec!["groupOfUniqueNames".into(), "groupOfNames".into()]
}
fn default_schema() -> String {
    MembershipSchema::Rfc2307bis.to_string()
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            user_container: default_source_user_container(),
            group_container: default_source_group_container(),
            user_object_classes: default_source_user_object_classes(),
            group_object_classes: default_source_group_object_classes(),
            user_ignore_object_classes: Vec::new(),
            user_ignore_attributes: Vec::new(),
            group_ignore_object_classes: Vec::new(),
            group_ignore_attributes: Vec::new(),
            schema: default_schema(),
            continue_on_error: false,
            exclude_users: Vec::new(),
            exclude_groups: Vec::new(),
        }
    }
}

/// Options of a single record type, borrowed from [`MigrationOptions`].
#[derive(Debug, Clone, Copy)]
pub struct TypeOptions<'a> {
    pub object_classes: &'a [String],
    pub ignore_object_classes: &'a [String],
    pub ignore_attributes: &'a [String],
    pub exclude: &'a [String],
}

impl MigrationOptions {
    /// Lowercase every list option and drop blank items.
    ///
    /// Exclusions and blacklists are compared against lowercased keys and
    /// attribute names, so they must be lowercase too.
    pub fn normalize(&mut self) {
        for list in [
            &mut self.user_object_classes,
            &mut self.group_object_classes,
            &mut self.user_ignore_object_classes,
            &mut self.user_ignore_attributes,
            &mut self.group_ignore_object_classes,
            &mut self.group_ignore_attributes,
            &mut self.exclude_users,
            &mut self.exclude_groups,
        ] {
            *list = list
                .iter()
                .map(|v| v.trim().to_lowercase())
                .filter(|v| !v.is_empty())
                .collect();
        }
    }

    pub fn for_type(&self, record_type: RecordType) -> TypeOptions<'_> {
        match record_type {
            RecordType::User => TypeOptions {
                object_classes: &self.user_object_classes,
                ignore_object_classes: &self.user_ignore_object_classes,
                ignore_attributes: &self.user_ignore_attributes,
                exclude: &self.exclude_users,
            },
            RecordType::Group => TypeOptions {
                object_classes: &self.group_object_classes,
                ignore_object_classes: &self.group_ignore_object_classes,
                ignore_attributes: &self.group_ignore_attributes,
                exclude: &self.exclude_groups,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let mut config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.source.options.normalize();

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Resolve all `*_env` fields from environment variables.
    ///
    /// Missing variables only log a warning; the caller decides whether a
    /// password is required (the source password can also be prompted for).
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        info!("resolving environment variable references in config");

        self.target.password =
            resolve_optional_env(&self.target.password_env, "target.password_env");

        if let Some(ref env_name) = self.source.password_env {
            self.source.password = resolve_optional_env(env_name, "source.password_env");
        }

        debug!("environment variable resolution complete");
        Ok(())
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_ldap_uri(&self.target.uri) {
            return Err(ConfigError::InvalidValue {
                field: "target.uri".into(),
                detail: format!("'{}' is not an ldap:// or ldaps:// URI", self.target.uri),
            });
        }
        for (field, value) in [
            ("target.base_dn", &self.target.base_dn),
            ("target.realm", &self.target.realm),
            ("target.user_container", &self.target.user_container),
            ("target.group_container", &self.target.group_container),
            ("target.default_primary_group", &self.target.default_primary_group),
            ("source.user_container", &self.source.options.user_container),
            ("source.group_container", &self.source.options.group_container),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: field.into(),
                    detail: "must not be empty".into(),
                });
            }
        }
        if self.source.options.user_object_classes.is_empty()
            || self.source.options.group_object_classes.is_empty()
        {
            return Err(ConfigError::InvalidValue {
                field: "source.*_object_classes".into(),
                detail: "at least one search object class is required".into(),
            });
        }
        if let Err(e) = self.source.options.schema.parse::<MembershipSchema>() {
            return Err(ConfigError::InvalidValue {
                field: "source.schema".into(),
                detail: e.to_string(),
            });
        }

        Ok(())
    }

    /// Convenience: load, resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.resolve_env_vars()?;
        config.validate()?;
        Ok(config)
    }
}

/// Try to read an environment variable by name. Returns `Some(value)` on
/// success; logs a warning and returns `None` if the variable is unset.
fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => {
            warn!(field, env_name, "env var not set");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
[logging]
level = "debug"

[migration]
enabled = true

[target]
uri = "ldap://ipa.example.com"
password_env = "DM_PASSWORD"
base_dn = "dc=example,dc=com"
realm = "EXAMPLE.COM"
homes_root = "/export/home"

[source]
bind_dn = "cn=Directory Manager"
password_env = "DS_PASSWORD"
user_container = "ou=staff"
group_object_classes = ["groupOfNames"]
user_ignore_attributes = ["Mail", " "]
schema = "RFC2307"
continue_on_error = true
exclude_users = ["Admin", "root"]
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config: AppConfig = toml::from_str(sample_toml()).expect("failed to parse toml");
        assert!(config.migration.enabled);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.target.realm, "EXAMPLE.COM");
        assert_eq!(config.target.homes_root, "/export/home");
        assert_eq!(config.source.bind_dn, "cn=Directory Manager");
        assert_eq!(config.source.options.user_container, "ou=staff");
        assert_eq!(config.source.options.schema, "RFC2307");
        assert!(config.source.options.continue_on_error);
    }

    #[test]
    fn test_load_from_file_normalizes_lists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(sample_toml().as_bytes()).unwrap();

        let config = AppConfig::load_from_file(&path).expect("load_from_file failed");
        assert_eq!(config.source.options.exclude_users, vec!["admin", "root"]);
        assert_eq!(config.source.options.user_ignore_attributes, vec!["mail"]);
        assert_eq!(config.source.options.group_object_classes, vec!["groupofnames"]);
    }

    #[test]
    fn test_file_not_found() {
        let result = AppConfig::load_from_file("/nonexistent/config.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_defaults() {
        let minimal = r#"
[target]
uri = "ldaps://ipa.example.com:636"
password_env = "DM_PASSWORD"
base_dn = "dc=example,dc=com"
realm = "EXAMPLE.COM"
"#;
        let config: AppConfig = toml::from_str(minimal).unwrap();
        assert!(!config.migration.enabled);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.target.user_container, "cn=users,cn=accounts");
        assert_eq!(config.target.default_primary_group, "ipausers");
        assert_eq!(config.target.homes_root, "/home");
        assert_eq!(config.source.bind_dn, "cn=directory manager");
        assert_eq!(config.source.options.user_container, "ou=people");
        assert_eq!(config.source.options.group_container, "ou=groups");
        assert_eq!(config.source.options.user_object_classes, vec!["person"]);
        assert_eq!(config.source.options.schema, "RFC2307bis");
        assert!(!config.source.options.continue_on_error);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_uri() {
        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config.target.uri = "http://ipa.example.com".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "target.uri"
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_schema() {
        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config.source.options.schema = "RFC2798".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "source.schema"
        ));
    }

    #[test]
    fn test_resolve_env_vars() {
        std::env::set_var("TEST_DIRMIGRATE_DM_PW", "s3cret");
        std::env::set_var("TEST_DIRMIGRATE_DS_PW", "hunter2");

        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config.target.password_env = "TEST_DIRMIGRATE_DM_PW".into();
        config.source.password_env = Some("TEST_DIRMIGRATE_DS_PW".into());
        config.resolve_env_vars().unwrap();

        assert_eq!(config.target.password.as_deref(), Some("s3cret"));
        assert_eq!(config.source.password.as_deref(), Some("hunter2"));

        std::env::remove_var("TEST_DIRMIGRATE_DM_PW");
        std::env::remove_var("TEST_DIRMIGRATE_DS_PW");
    }

    #[test]
    fn test_target_dns() {
        let config: AppConfig = toml::from_str(sample_toml()).unwrap();
        assert_eq!(
            config.target.entry_dn(RecordType::User, "jdoe"),
            "uid=jdoe,cn=users,cn=accounts,dc=example,dc=com"
        );
        assert_eq!(
            config.target.container_dn(RecordType::Group),
            "cn=groups,cn=accounts,dc=example,dc=com"
        );
    }

    #[test]
    fn test_for_type() {
        let mut options = MigrationOptions {
            exclude_groups: vec!["Admins".into()],
            ..Default::default()
        };
        options.normalize();
        let group = options.for_type(RecordType::Group);
        assert_eq!(group.exclude, ["admins"]);
        assert_eq!(group.object_classes, ["groupofuniquenames", "groupofnames"]);
    }
}

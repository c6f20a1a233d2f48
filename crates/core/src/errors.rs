//! Error types for the DirMigrate core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Migration(#[from] MigrationError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Directory errors
// ---------------------------------------------------------------------------

/// Errors returned by a directory connector.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The entry (or search base) does not exist.
    #[error("entry not found: {dn}")]
    NotFound {
        dn: String,
    },

    /// An entry with the same DN already exists.
    #[error("entry already exists: {dn}")]
    AlreadyExists {
        dn: String,
    },

    /// The server rejected the entry because of a schema or value constraint.
    #[error("constraint violation on {dn}: {detail}")]
    ConstraintViolation {
        dn: String,
        detail: String,
    },

    /// The bind credentials were rejected.
    #[error("authentication failed for '{bind_dn}'")]
    AuthenticationFailed {
        bind_dn: String,
    },

    /// Transport-level failure (connect, TLS, dropped connection).
    #[error("directory connection error: {0}")]
    Connection(String),

    /// Any other non-success LDAP result code.
    #[error("directory operation failed (code {code}): {detail}")]
    Operation {
        code: u32,
        detail: String,
    },
}

impl DirectoryError {
    /// Whether this error concerns a single entry rather than the session.
    ///
    /// Entry-level errors are recorded against the entry being migrated;
    /// anything else aborts the run.
    pub fn is_entry_error(&self) -> bool {
        !matches!(
            self,
            Self::Connection(_) | Self::AuthenticationFailed { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// Migration errors
// ---------------------------------------------------------------------------

/// Fatal errors that abort a whole migration run.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The source container for a record type does not exist.
    #[error("container for {record_type} not found: {base}")]
    ContainerNotFound {
        record_type: String,
        base: String,
    },

    /// The default primary group for new users is missing on the target.
    #[error("default group for new users not found: {dn}")]
    DefaultGroupNotFound {
        dn: String,
    },

    /// The default primary group exists but carries no `gidnumber`.
    #[error("default group {dn} has no gidnumber")]
    DefaultGroupMissingGid {
        dn: String,
    },

    /// The configured membership schema is not supported.
    #[error("schema {0} not supported (expected RFC2307bis or RFC2307)")]
    UnsupportedSchema(String),

    /// The source root DSE did not advertise a naming context.
    #[error("could not determine the base DN of the source directory")]
    BaseDnNotFound,

    /// The LDAP URI is malformed.
    #[error("invalid LDAP URI: {0}")]
    InvalidLdapUri(String),

    /// A directory error that could not be attributed to a single entry.
    #[error("migration directory error: {0}")]
    Directory(#[from] DirectoryError),
}

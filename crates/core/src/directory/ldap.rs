//! `ldap3`-backed directory connector.

use std::collections::HashSet;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use ldap3::{ldap_escape, Ldap, LdapConnAsync, LdapConnSettings, LdapResult, Mod, Scope, SearchOptions};
use regex_lite::Regex;
use tracing::{debug, info, warn};

use super::{SearchOutcome, SearchRequest, SearchScope, SourceDirectory, TargetDirectory};
use crate::entry::{Attributes, SearchEntry};
use crate::errors::DirectoryError;

const CONNECT_TIMEOUT_SECS: u64 = 30;

// LDAP result codes (RFC 4511, appendix A).
const RC_SUCCESS: u32 = 0;
const RC_TIME_LIMIT_EXCEEDED: u32 = 3;
const RC_SIZE_LIMIT_EXCEEDED: u32 = 4;
const RC_UNDEFINED_ATTRIBUTE_TYPE: u32 = 17;
const RC_CONSTRAINT_VIOLATION: u32 = 19;
const RC_ATTRIBUTE_OR_VALUE_EXISTS: u32 = 20;
const RC_INVALID_ATTRIBUTE_SYNTAX: u32 = 21;
const RC_NO_SUCH_OBJECT: u32 = 32;
const RC_INVALID_CREDENTIALS: u32 = 49;
const RC_OBJECT_CLASS_VIOLATION: u32 = 65;
const RC_NOT_ALLOWED_ON_RDN: u32 = 67;
const RC_ENTRY_ALREADY_EXISTS: u32 = 68;
const RC_OBJECT_CLASS_MODS_PROHIBITED: u32 = 69;

/// Whether `uri` is a plain `ldap://host[:port]` or `ldaps://host[:port]`.
pub fn is_valid_ldap_uri(uri: &str) -> bool {
    static LDAP_URI: OnceLock<Regex> = OnceLock::new();
    LDAP_URI
        .get_or_init(|| Regex::new(r"^ldaps?://[-\w.]+(:\d+)?$").expect("valid LDAP URI regex"))
        .is_match(uri)
}

/// Translate an LDAP result into our error type.
fn check_result(result: &LdapResult, dn: &str) -> Result<(), DirectoryError> {
    match result.rc {
        RC_SUCCESS => Ok(()),
        RC_NO_SUCH_OBJECT => Err(DirectoryError::NotFound { dn: dn.to_string() }),
        RC_ENTRY_ALREADY_EXISTS | RC_ATTRIBUTE_OR_VALUE_EXISTS => {
            Err(DirectoryError::AlreadyExists { dn: dn.to_string() })
        }
        RC_UNDEFINED_ATTRIBUTE_TYPE
        | RC_CONSTRAINT_VIOLATION
        | RC_INVALID_ATTRIBUTE_SYNTAX
        | RC_OBJECT_CLASS_VIOLATION
        | RC_NOT_ALLOWED_ON_RDN
        | RC_OBJECT_CLASS_MODS_PROHIBITED => Err(DirectoryError::ConstraintViolation {
            dn: dn.to_string(),
            detail: result.text.clone(),
        }),
        code => Err(DirectoryError::Operation {
            code,
            detail: result.text.clone(),
        }),
    }
}

fn transport_error(context: &str, e: ldap3::LdapError) -> DirectoryError {
    DirectoryError::Connection(format!("{context}: {e}"))
}

fn to_scope(scope: SearchScope) -> Scope {
    match scope {
        SearchScope::Base => Scope::Base,
        SearchScope::OneLevel => Scope::OneLevel,
        SearchScope::Subtree => Scope::Subtree,
    }
}

/// Convert an `ldap3` entry; attribute names are sorted for stable output.
fn to_attributes(entry: ldap3::SearchEntry) -> Attributes {
    if !entry.bin_attrs.is_empty() {
        let names: Vec<&String> = entry.bin_attrs.keys().collect();
        warn!(dn = %entry.dn, attributes = ?names, "skipping binary attributes");
    }
    let mut attrs: Vec<(String, Vec<String>)> = entry.attrs.into_iter().collect();
    attrs.sort_by(|a, b| a.0.to_ascii_lowercase().cmp(&b.0.to_ascii_lowercase()));
    attrs.into_iter().collect()
}

/// An authenticated connection to one LDAP server.
pub struct LdapDirectory {
    ldap: Ldap,
    uri: String,
    search_base: String,
}

impl LdapDirectory {
    /// Connect to `uri` and perform a simple bind.
    pub async fn connect(uri: &str, bind_dn: &str, password: &str) -> Result<Self, DirectoryError> {
        debug!(uri, "connecting to LDAP server");

        let settings =
            LdapConnSettings::new().set_conn_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS));
        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, uri)
            .await
            .map_err(|e| transport_error(&format!("failed to connect to {uri}"), e))?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "LDAP connection driver error");
            }
        });

        debug!(bind_dn, "performing LDAP bind");
        let result = ldap
            .simple_bind(bind_dn, password)
            .await
            .map_err(|e| transport_error(&format!("bind as {bind_dn} failed"), e))?;
        if result.rc == RC_INVALID_CREDENTIALS {
            return Err(DirectoryError::AuthenticationFailed {
                bind_dn: bind_dn.to_string(),
            });
        }
        check_result(&result, bind_dn)?;

        info!(uri, bind_dn, "LDAP connection established");
        Ok(Self {
            ldap,
            uri: uri.to_string(),
            search_base: String::new(),
        })
    }

    /// Base used by [`TargetDirectory::find_by_attribute`].
    pub fn with_search_base(mut self, base: impl Into<String>) -> Self {
        self.search_base = base.into();
        self
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub async fn unbind(mut self) -> Result<(), DirectoryError> {
        self.ldap
            .unbind()
            .await
            .map_err(|e| transport_error("unbind failed", e))
    }
}

#[async_trait]
impl SourceDirectory for LdapDirectory {
    async fn search(&mut self, request: &SearchRequest<'_>) -> Result<SearchOutcome, DirectoryError> {
        debug!(
            base = request.base,
            filter = request.filter,
            scope = ?request.scope,
            "LDAP search"
        );

        let options = SearchOptions::new()
            .timelimit(request.time_limit as i32)
            .sizelimit(request.size_limit as i32);
        let ldap3::SearchResult(raw, result) = self
            .ldap
            .with_search_options(options)
            .search(
                request.base,
                to_scope(request.scope),
                request.filter,
                request.attributes.to_vec(),
            )
            .await
            .map_err(|e| transport_error(&format!("search of {} failed", request.base), e))?;

        let truncated = matches!(result.rc, RC_TIME_LIMIT_EXCEEDED | RC_SIZE_LIMIT_EXCEEDED);
        if !truncated {
            check_result(&result, request.base)?;
        }

        let mut entries = Vec::with_capacity(raw.len());
        for entry in raw {
            if entry.is_intermediate() {
                continue;
            }
            if entry.is_ref() {
                if request.include_references {
                    entries.push(SearchEntry::reference(ldap3::parse_refs(entry.0)));
                }
                continue;
            }
            let entry = ldap3::SearchEntry::construct(entry);
            let dn = entry.dn.clone();
            entries.push(SearchEntry::new(dn, to_attributes(entry)));
        }
        if request.include_references && !result.refs.is_empty() {
            entries.push(SearchEntry::reference(result.refs.clone()));
        }

        Ok(SearchOutcome { entries, truncated })
    }

    async fn naming_contexts(&mut self) -> Result<Vec<String>, DirectoryError> {
        let request = SearchRequest::new("", SearchScope::Base, "(objectClass=*)")
            .with_attributes(&["namingcontexts"]);
        let outcome = self.search(&request).await?;
        Ok(outcome
            .entries
            .into_iter()
            .next()
            .and_then(|e| e.attributes.get("namingcontexts").map(<[String]>::to_vec))
            .unwrap_or_default())
    }
}

#[async_trait]
impl TargetDirectory for LdapDirectory {
    async fn insert(&mut self, dn: &str, attributes: &Attributes) -> Result<(), DirectoryError> {
        let attrs: Vec<(&str, HashSet<&str>)> = attributes
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(name, values)| (name, values.iter().map(String::as_str).collect()))
            .collect();

        let result = self
            .ldap
            .add(dn, attrs)
            .await
            .map_err(|e| transport_error(&format!("add of {dn} failed"), e))?;
        check_result(&result, dn)?;
        debug!(dn, "entry added");
        Ok(())
    }

    async fn lookup(&mut self, dn: &str, attributes: &[&str]) -> Result<Attributes, DirectoryError> {
        let request = SearchRequest::new(dn, SearchScope::Base, "(objectClass=*)")
            .with_attributes(attributes);
        let outcome = self.search(&request).await?;
        outcome
            .entries
            .into_iter()
            .find(|e| !e.is_reference())
            .map(|e| e.attributes)
            .ok_or_else(|| DirectoryError::NotFound { dn: dn.to_string() })
    }

    async fn add_member(&mut self, member_dn: &str, group_dn: &str) -> Result<(), DirectoryError> {
        let mods = vec![Mod::Add("member", HashSet::from([member_dn]))];
        let result = self
            .ldap
            .modify(group_dn, mods)
            .await
            .map_err(|e| transport_error(&format!("modify of {group_dn} failed"), e))?;
        check_result(&result, group_dn)
    }

    async fn find_by_attribute(
        &mut self,
        attribute: &str,
        value: &str,
        object_class: &str,
        attributes: &[&str],
    ) -> Result<(String, Attributes), DirectoryError> {
        let filter = format!(
            "(&({}={})(objectclass={}))",
            attribute,
            ldap_escape(value),
            ldap_escape(object_class)
        );
        let attributes: &[&str] = if attributes.is_empty() { &["1.1"] } else { attributes };
        let base = self.search_base.clone();
        let request = SearchRequest::new(&base, SearchScope::Subtree, &filter)
            .with_attributes(attributes);
        let outcome = self.search(&request).await?;
        outcome
            .entries
            .into_iter()
            .find_map(|e| e.dn.map(|dn| (dn, e.attributes)))
            .ok_or_else(|| DirectoryError::NotFound {
                dn: format!("{attribute}={value}"),
            })
    }
}

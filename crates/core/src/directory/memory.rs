//! In-memory directory.
//!
//! Holds entries in insertion order and answers the connector traits the
//! way an LDAP server would for the operations the migration uses. Search
//! filters are recorded but not evaluated: a search returns every entry in
//! scope, plus any search references registered under the base.

use async_trait::async_trait;
use tracing::debug;

use super::{SearchOutcome, SearchRequest, SearchScope, SourceDirectory, TargetDirectory};
use crate::dn;
use crate::entry::{Attributes, SearchEntry};
use crate::errors::DirectoryError;

#[derive(Debug, Clone)]
struct StoredEntry {
    dn: String,
    attributes: Attributes,
}

/// A directory living entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    entries: Vec<StoredEntry>,
    references: Vec<(String, String)>,
    naming_contexts: Vec<String>,
    size_limit: Option<usize>,
    fail_add_member: bool,
    searches: Vec<String>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advertise `base` as a naming context of the root DSE.
    pub fn with_naming_context(mut self, base: impl Into<String>) -> Self {
        self.naming_contexts.push(base.into());
        self
    }

    /// Store an entry without any checks.
    pub fn add_entry(&mut self, dn: &str, attributes: Attributes) {
        self.entries.push(StoredEntry {
            dn: dn::normalize(dn),
            attributes,
        });
    }

    /// Register a search reference pointing at `url` below `parent`.
    pub fn add_reference(&mut self, parent: &str, url: impl Into<String>) {
        self.references.push((dn::comparison_key(parent), url.into()));
    }

    /// Return at most `limit` entries per search and flag the result truncated.
    pub fn set_size_limit(&mut self, limit: usize) {
        self.size_limit = Some(limit);
    }

    /// Make every [`TargetDirectory::add_member`] call fail.
    pub fn fail_add_member(&mut self, fail: bool) {
        self.fail_add_member = fail;
    }

    /// Filters of every search issued so far.
    pub fn searches(&self) -> &[String] {
        &self.searches
    }

    pub fn entry(&self, dn: &str) -> Option<&Attributes> {
        let key = dn::comparison_key(dn);
        self.entries
            .iter()
            .find(|e| dn::comparison_key(&e.dn) == key)
            .map(|e| &e.attributes)
    }

    fn entry_mut(&mut self, dn: &str) -> Option<&mut Attributes> {
        let key = dn::comparison_key(dn);
        self.entries
            .iter_mut()
            .find(|e| dn::comparison_key(&e.dn) == key)
            .map(|e| &mut e.attributes)
    }

    /// DNs of all entries, in insertion order.
    pub fn dns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.dn.as_str())
    }

    fn in_scope(dn: &str, base: &str, scope: SearchScope) -> bool {
        let dn_key = dn::comparison_key(dn);
        let base_key = dn::comparison_key(base);
        match scope {
            SearchScope::Base => dn_key == base_key,
            SearchScope::OneLevel => {
                dn_key != base_key
                    && dn::is_within(dn, base)
                    && dn::rdns(&dn_key).len() == dn::rdns(&base_key).len() + 1
            }
            SearchScope::Subtree => dn::is_within(dn, base),
        }
    }
}

fn project(attributes: &Attributes, requested: &[&str]) -> Attributes {
    if requested.is_empty() || requested.contains(&"*") {
        return attributes.clone();
    }
    attributes
        .iter()
        .filter(|(name, _)| requested.iter().any(|r| r.eq_ignore_ascii_case(name)))
        .map(|(name, values)| (name, values.to_vec()))
        .collect()
}

#[async_trait]
impl SourceDirectory for MemoryDirectory {
    async fn search(&mut self, request: &SearchRequest<'_>) -> Result<SearchOutcome, DirectoryError> {
        self.searches.push(request.filter.to_string());

        let base_exists = request.base.is_empty()
            || self
                .entry(request.base)
                .is_some()
            || self
                .naming_contexts
                .iter()
                .any(|nc| dn::comparison_key(nc) == dn::comparison_key(request.base));
        if !base_exists {
            return Err(DirectoryError::NotFound {
                dn: request.base.to_string(),
            });
        }

        let mut entries: Vec<SearchEntry> = self
            .entries
            .iter()
            .filter(|e| Self::in_scope(&e.dn, request.base, request.scope))
            .map(|e| SearchEntry::new(e.dn.clone(), project(&e.attributes, request.attributes)))
            .collect();

        let mut truncated = false;
        if let Some(limit) = self.size_limit {
            if entries.len() > limit {
                entries.truncate(limit);
                truncated = true;
            }
        }

        if request.include_references {
            let base_key = dn::comparison_key(request.base);
            entries.extend(
                self.references
                    .iter()
                    .filter(|(parent, _)| *parent == base_key)
                    .map(|(_, url)| SearchEntry::reference(vec![url.clone()])),
            );
        }

        debug!(base = request.base, count = entries.len(), truncated, "memory search");
        Ok(SearchOutcome { entries, truncated })
    }

    async fn naming_contexts(&mut self) -> Result<Vec<String>, DirectoryError> {
        Ok(self.naming_contexts.clone())
    }
}

#[async_trait]
impl TargetDirectory for MemoryDirectory {
    async fn insert(&mut self, dn: &str, attributes: &Attributes) -> Result<(), DirectoryError> {
        if self.entry(dn).is_some() {
            return Err(DirectoryError::AlreadyExists { dn: dn.to_string() });
        }
        self.add_entry(dn, attributes.clone());
        Ok(())
    }

    async fn lookup(&mut self, dn: &str, attributes: &[&str]) -> Result<Attributes, DirectoryError> {
        self.entry(dn)
            .map(|attrs| project(attrs, attributes))
            .ok_or_else(|| DirectoryError::NotFound { dn: dn.to_string() })
    }

    async fn add_member(&mut self, member_dn: &str, group_dn: &str) -> Result<(), DirectoryError> {
        if self.fail_add_member {
            return Err(DirectoryError::ConstraintViolation {
                dn: group_dn.to_string(),
                detail: "member rejected".into(),
            });
        }
        let group = self
            .entry_mut(group_dn)
            .ok_or_else(|| DirectoryError::NotFound {
                dn: group_dn.to_string(),
            })?;
        if group
            .get("member")
            .is_some_and(|members| members.iter().any(|m| dn::comparison_key(m) == dn::comparison_key(member_dn)))
        {
            return Err(DirectoryError::AlreadyExists {
                dn: member_dn.to_string(),
            });
        }
        group.extend("member", [member_dn]);
        Ok(())
    }

    async fn find_by_attribute(
        &mut self,
        attribute: &str,
        value: &str,
        object_class: &str,
        attributes: &[&str],
    ) -> Result<(String, Attributes), DirectoryError> {
        self.entries
            .iter()
            .find(|e| {
                e.attributes.has_object_class(object_class)
                    && e.attributes
                        .get(attribute)
                        .is_some_and(|values| values.iter().any(|v| v.eq_ignore_ascii_case(value)))
            })
            .map(|e| (e.dn.clone(), project(&e.attributes, attributes)))
            .ok_or_else(|| DirectoryError::NotFound {
                dn: format!("{attribute}={value}"),
            })
    }
}

//! Directory entry model.
//!
//! [`Attributes`] is an ordered multimap from attribute name to an ordered
//! list of values. Attribute names are case-insensitive in LDAP, so they are
//! stored lowercased; values are kept exactly as the server returned them.

use serde::{Deserialize, Serialize};

/// Name of the object-class attribute.
pub const OBJECT_CLASS: &str = "objectclass";

/// Ordered attribute-name → values multimap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    entries: Vec<(String, Vec<String>)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// All values of `name`, if present.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.position(name).map(|i| self.entries[i].1.as_slice())
    }

    /// First value of `name`, if present.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Replace all values of `name`, keeping its position if already present.
    pub fn set<I, S>(&mut self, name: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        match self.position(name) {
            Some(i) => self.entries[i].1 = values,
            None => self.entries.push((name.to_ascii_lowercase(), values)),
        }
    }

    /// Set `name` to `value` only when the attribute is absent.
    pub fn set_default(&mut self, name: &str, value: impl Into<String>) {
        if !self.contains(name) {
            self.set(name, [value.into()]);
        }
    }

    /// Append values to `name`, creating the attribute if needed.
    pub fn extend<I, S>(&mut self, name: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let i = match self.position(name) {
            Some(i) => i,
            None => {
                self.entries.push((name.to_ascii_lowercase(), Vec::new()));
                self.entries.len() - 1
            }
        };
        self.entries[i].1.extend(values.into_iter().map(Into::into));
    }

    /// Remove `name` and return its values.
    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.position(name).map(|i| self.entries.remove(i).1)
    }

    /// Drop every attribute whose name appears in `names` (case-insensitive).
    pub fn remove_all<S: AsRef<str>>(&mut self, names: &[S]) {
        self.entries
            .retain(|(n, _)| !names.iter().any(|b| n.eq_ignore_ascii_case(b.as_ref())));
    }

    /// Attribute names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // -----------------------------------------------------------------------
    // Object classes
    // -----------------------------------------------------------------------

    /// Object-class values, or an empty slice.
    pub fn object_classes(&self) -> &[String] {
        self.get(OBJECT_CLASS).unwrap_or(&[])
    }

    /// Whether `class` is among the object classes (case-insensitive).
    pub fn has_object_class(&self, class: &str) -> bool {
        self.object_classes()
            .iter()
            .any(|oc| oc.eq_ignore_ascii_case(class))
    }

    /// Replace the object classes with `defaults` followed by the lowercased
    /// current values, dropping duplicates.
    pub fn merge_object_classes<S: AsRef<str>>(&mut self, defaults: &[S]) {
        let mut merged: Vec<String> = Vec::new();
        let current = self.remove(OBJECT_CLASS).unwrap_or_default();
        let candidates = defaults
            .iter()
            .map(|d| d.as_ref().to_ascii_lowercase())
            .chain(current.into_iter().map(|c| c.to_ascii_lowercase()));
        for class in candidates {
            if !merged.contains(&class) {
                merged.push(class);
            }
        }
        self.set(OBJECT_CLASS, merged);
    }

    /// Remove every object class listed in `blacklist` (case-insensitive).
    pub fn remove_object_classes<S: AsRef<str>>(&mut self, blacklist: &[S]) {
        if let Some(i) = self.position(OBJECT_CLASS) {
            self.entries[i]
                .1
                .retain(|oc| !blacklist.iter().any(|b| oc.eq_ignore_ascii_case(b.as_ref())));
        }
    }
}

impl<N, S> FromIterator<(N, Vec<S>)> for Attributes
where
    N: AsRef<str>,
    S: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (N, Vec<S>)>>(iter: T) -> Self {
        let mut attrs = Attributes::new();
        for (name, values) in iter {
            attrs.extend(name.as_ref(), values);
        }
        attrs
    }
}

/// One result of a source-directory search.
///
/// A search reference has no DN; its referral URLs are kept in `referrals`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchEntry {
    pub dn: Option<String>,
    pub attributes: Attributes,
    pub referrals: Vec<String>,
}

impl SearchEntry {
    pub fn new(dn: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            dn: Some(dn.into()),
            attributes,
            referrals: Vec::new(),
        }
    }

    pub fn reference(referrals: Vec<String>) -> Self {
        Self {
            dn: None,
            attributes: Attributes::new(),
            referrals,
        }
    }

    pub fn is_reference(&self) -> bool {
        self.dn.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Attributes {
        [
            ("objectClass", vec!["top", "Person"]),
            ("uid", vec!["jdoe"]),
            ("cn", vec!["John Doe"]),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_names_are_case_insensitive() {
        let attrs = sample();
        assert_eq!(attrs.first("UID"), Some("jdoe"));
        assert!(attrs.contains("ObjectClass"));
        assert_eq!(attrs.names().collect::<Vec<_>>(), ["objectclass", "uid", "cn"]);
    }

    #[test]
    fn test_set_keeps_position() {
        let mut attrs = sample();
        attrs.set("UID", ["jdoe2"]);
        assert_eq!(attrs.names().nth(1), Some("uid"));
        assert_eq!(attrs.first("uid"), Some("jdoe2"));
    }

    #[test]
    fn test_set_default_only_when_absent() {
        let mut attrs = sample();
        attrs.set_default("cn", "Other");
        attrs.set_default("gidnumber", "1000");
        assert_eq!(attrs.first("cn"), Some("John Doe"));
        assert_eq!(attrs.first("gidnumber"), Some("1000"));
    }

    #[test]
    fn test_merge_object_classes_deduplicates() {
        let mut attrs = sample();
        attrs.merge_object_classes(&["top", "posixAccount"]);
        assert_eq!(attrs.object_classes(), ["top", "posixaccount", "person"]);
    }

    #[test]
    fn test_remove_object_classes_and_attributes() {
        let mut attrs = sample();
        attrs.remove_object_classes(&["PERSON", "absent"]);
        assert_eq!(attrs.object_classes(), ["top"]);

        attrs.remove_all(&["CN", "nothere"]);
        assert!(!attrs.contains("cn"));
        assert_eq!(attrs.len(), 2);
    }

    #[test]
    fn test_search_reference() {
        let entry = SearchEntry::reference(vec!["ldap://other/ou=x".into()]);
        assert!(entry.is_reference());
        assert!(!SearchEntry::new("uid=a", Attributes::new()).is_reference());
    }
}

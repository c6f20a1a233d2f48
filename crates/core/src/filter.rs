//! Search-filter construction for the source directory.

use ldap3::ldap_escape;

use crate::models::RecordType;

/// Placeholder in a filter template replaced by the object-class clauses.
const OBJECT_CLASSES_PLACEHOLDER: &str = "{object_classes}";

/// Filter template for `record_type`.
///
/// The type-identifying clause requires the primary-key attribute; the
/// placeholder receives an OR of the allowed object classes.
pub fn filter_template(record_type: RecordType) -> &'static str {
    match record_type {
        RecordType::User => "(&(|{object_classes})(uid=*))",
        RecordType::Group => "(&(|{object_classes})(cn=*))",
    }
}

/// Substitute one `(objectclass=<oc>)` clause per allowed object class.
pub fn construct_filter<S: AsRef<str>>(template: &str, object_classes: &[S]) -> String {
    let clauses: String = object_classes
        .iter()
        .map(|oc| format!("(objectclass={})", ldap_escape(oc.as_ref())))
        .collect();
    template.replace(OBJECT_CLASSES_PLACEHOLDER, &clauses)
}

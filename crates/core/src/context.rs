//! Per-type scratch state shared between the entries of one migration run.

/// The default primary group new users are attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultGroup {
    /// DN of the group on the target.
    pub dn: String,
    /// Its `gidnumber`, used when a user carries none.
    pub gid_number: String,
}

/// Values resolved once per record type and reused for every entry.
///
/// A fresh context is created for each record type, so nothing leaks from
/// the user pass into the group pass.
#[derive(Debug, Default)]
pub struct RunContext {
    default_group: Option<DefaultGroup>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_group(&self) -> Option<&DefaultGroup> {
        self.default_group.as_ref()
    }

    pub fn set_default_group(&mut self, group: DefaultGroup) -> &DefaultGroup {
        self.default_group.insert(group)
    }
}

//! Migration engine.
//!
//! The [`MigrationEngine`] drives one migration run:
//!
//! 1. Check the migration gate; a disabled gate returns an empty report
//!    without touching the source directory.
//! 2. Discover the source base DN from the root DSE.
//! 3. For each record type, in [`MIGRATE_ORDER`]: search the source
//!    container, then transform and insert every entry one at a time.
//!
//! Failures of a single entry are recorded in the report and the run moves
//! on. Fatal conditions abort the run and discard everything accumulated so
//! far: no partial report is ever returned.

use tracing::{debug, info, warn};

use crate::config::{MigrationOptions, TargetConfig};
use crate::context::RunContext;
use crate::directory::{SearchOutcome, SearchRequest, SearchScope, SourceDirectory, TargetDirectory};
use crate::dn;
use crate::entry::SearchEntry;
use crate::errors::{DirectoryError, MigrationError};
use crate::filter::{construct_filter, filter_template};
use crate::models::{RecordType, MIGRATE_ORDER};
use crate::report::{MigrationReport, TypeReport};
use crate::schema::{
    Blacklists, GroupMigrator, MembershipSchema, PendingEntry, PreTransform, RecordMigrator,
    SearchBases, UserMigrator,
};

pub(crate) const REFERENCE_ERR_MSG: &str = "Migration of LDAP search reference is not supported.";

const TRUNCATED_ERR_MSG: &str = "search results for objects to be migrated have been truncated \
     by the server; migration process might be incomplete";

// ---------------------------------------------------------------------------
// Migration spec
// ---------------------------------------------------------------------------

/// Everything the engine needs to migrate one record type.
#[derive(Debug, Clone)]
pub struct MigrationSpec {
    pub record_type: RecordType,
    /// Filter template with an `{object_classes}` placeholder.
    pub filter_template: &'static str,
    pub migrator: RecordMigrator,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Drives a migration run from a source directory into a target directory.
#[derive(Debug, Clone)]
pub struct MigrationEngine {
    target: TargetConfig,
    options: MigrationOptions,
    enabled: bool,
}

impl MigrationEngine {
    /// Create an engine. List options are normalized to lowercase.
    pub fn new(target: TargetConfig, mut options: MigrationOptions, enabled: bool) -> Self {
        options.normalize();
        Self {
            target,
            options,
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Source search bases for a source tree rooted at `base_dn`.
    pub fn search_bases(&self, base_dn: &str) -> SearchBases {
        SearchBases::new(
            &self.options.user_container,
            &self.options.group_container,
            base_dn,
        )
    }

    /// Specs for every record type, in migration order.
    pub fn specs(&self, base_dn: &str) -> Result<Vec<MigrationSpec>, MigrationError> {
        let schema: MembershipSchema = self.options.schema.parse()?;
        Ok(MIGRATE_ORDER
            .iter()
            .map(|&record_type| {
                let migrator = match record_type {
                    RecordType::User => RecordMigrator::User(UserMigrator::new(self.target.clone())),
                    RecordType::Group => RecordMigrator::Group(GroupMigrator::new(
                        self.target.clone(),
                        schema,
                        self.search_bases(base_dn),
                    )),
                };
                MigrationSpec {
                    record_type,
                    filter_template: filter_template(record_type),
                    migrator,
                }
            })
            .collect())
    }

    /// Full run: gate check, base discovery, migration.
    pub async fn run(
        &self,
        source: &mut dyn SourceDirectory,
        target: &mut dyn TargetDirectory,
    ) -> Result<MigrationReport, MigrationError> {
        if !self.enabled {
            info!("migration mode is disabled");
            return Ok(MigrationReport::disabled());
        }
        let base_dn = discover_base_dn(source).await?;
        self.migrate(source, target, &base_dn).await
    }

    /// Migrate every record type from the source tree rooted at `base_dn`.
    pub async fn migrate(
        &self,
        source: &mut dyn SourceDirectory,
        target: &mut dyn TargetDirectory,
        base_dn: &str,
    ) -> Result<MigrationReport, MigrationError> {
        let specs = self.specs(base_dn)?;
        let search_bases = self.search_bases(base_dn);
        info!(base_dn, schema = %self.options.schema, "starting migration");

        let mut report = MigrationReport::new();
        for spec in &specs {
            let base = search_bases.for_type(spec.record_type);
            let type_report = self.migrate_type(spec, base, source, target).await?;
            info!(
                record_type = %spec.record_type,
                migrated = type_report.migrated.len(),
                failed = type_report.failed.len(),
                "record type complete"
            );
            report.add(spec.record_type, type_report);
        }

        info!(
            migrated = report.total_migrated(),
            failed = report.total_failed(),
            "migration finished"
        );
        Ok(report)
    }

    async fn search_type(
        &self,
        record_type: RecordType,
        filter: &str,
        base: &str,
        source: &mut dyn SourceDirectory,
    ) -> Result<SearchOutcome, MigrationError> {
        let request = SearchRequest::new(base, SearchScope::OneLevel, filter).with_references();
        match source.search(&request).await {
            Ok(outcome) => Ok(outcome),
            Err(DirectoryError::NotFound { .. }) if self.options.continue_on_error => {
                warn!(%record_type, base, "container not found, continuing");
                Ok(SearchOutcome::default())
            }
            Err(DirectoryError::NotFound { .. }) => Err(MigrationError::ContainerNotFound {
                record_type: record_type.to_string(),
                base: base.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn migrate_type(
        &self,
        spec: &MigrationSpec,
        base: &str,
        source: &mut dyn SourceDirectory,
        target: &mut dyn TargetDirectory,
    ) -> Result<TypeReport, MigrationError> {
        let record_type = spec.record_type;
        let opts = self.options.for_type(record_type);
        let filter = construct_filter(spec.filter_template, opts.object_classes);
        debug!(%record_type, base, filter = %filter, "searching source directory");

        let outcome = self.search_type(record_type, &filter, base, source).await?;
        if outcome.truncated {
            warn!(%record_type, "{}", TRUNCATED_ERR_MSG);
        }
        info!(%record_type, count = outcome.entries.len(), "entries found");

        let blacklists = Blacklists {
            object_classes: opts.ignore_object_classes.to_vec(),
            attributes: opts.ignore_attributes.to_vec(),
        };
        let mut ctx = RunContext::new();
        let mut report = TypeReport::default();

        for (index, entry) in outcome.entries.into_iter().enumerate() {
            self.migrate_entry(
                spec,
                index,
                entry,
                opts.exclude,
                &blacklists,
                &mut ctx,
                &mut report,
                target,
            )
            .await?;
        }
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    async fn migrate_entry(
        &self,
        spec: &MigrationSpec,
        index: usize,
        entry: SearchEntry,
        exclude: &[String],
        blacklists: &Blacklists,
        ctx: &mut RunContext,
        report: &mut TypeReport,
        target: &mut dyn TargetDirectory,
    ) -> Result<(), MigrationError> {
        let record_type = spec.record_type;

        let Some(source_dn) = entry.dn else {
            let key = entry
                .referrals
                .first()
                .cloned()
                .unwrap_or_else(|| format!("search-reference-{index}"));
            warn!(%record_type, reference = %key, "skipping search reference");
            report.record_failure(&key, REFERENCE_ERR_MSG);
            return Ok(());
        };

        let key_attribute = record_type.key_attribute();
        let Some(pkey) = entry.attributes.first(key_attribute).map(str::to_lowercase) else {
            warn!(%record_type, dn = %source_dn, "entry has no primary key");
            report.record_failure(
                &source_dn.to_lowercase(),
                format!("entry has no '{key_attribute}' attribute"),
            );
            return Ok(());
        };

        if exclude.contains(&pkey) {
            debug!(%record_type, pkey = %pkey, "excluded");
            return Ok(());
        }

        let mut pending = PendingEntry {
            dn: self.target.entry_dn(record_type, &pkey),
            pkey,
            attributes: entry.attributes,
        };
        pending
            .attributes
            .merge_object_classes(self.target.object_classes(record_type));

        match spec
            .migrator
            .pre_transform(target, &mut pending, ctx, blacklists)
            .await?
        {
            PreTransform::Proceed { dn } => pending.dn = dn,
            PreTransform::Skip { reason } => {
                if let Some(reason) = reason {
                    report.record_failure(&pending.pkey, reason);
                }
                return Ok(());
            }
        }

        match target.insert(&pending.dn, &pending.attributes).await {
            Ok(()) => {}
            Err(e) if e.is_entry_error() => {
                warn!(%record_type, pkey = %pending.pkey, error = %e, "insert failed");
                report.record_failure(&pending.pkey, e.to_string());
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
        debug!(%record_type, pkey = %pending.pkey, dn = %pending.dn, "migrated");
        report.record_success(&pending.pkey);

        if let Some(reason) = spec.migrator.post_transform(target, &pending, ctx).await? {
            report.record_failure(&pending.pkey, reason);
        }
        Ok(())
    }
}

/// First naming context advertised by the source root DSE.
pub async fn discover_base_dn(source: &mut dyn SourceDirectory) -> Result<String, MigrationError> {
    let contexts = source.naming_contexts().await?;
    let base_dn = contexts
        .into_iter()
        .map(|c| dn::normalize(&c))
        .find(|c| !c.is_empty())
        .ok_or(MigrationError::BaseDnNotFound)?;
    info!(base_dn = %base_dn, "discovered source base DN");
    Ok(base_dn)
}

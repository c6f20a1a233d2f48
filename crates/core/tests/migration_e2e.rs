//! End-to-end tests for a full migration run.
//!
//! These tests drive the real `MigrationEngine` against two in-memory
//! directories: a source tree under `dc=source,dc=org` and an IPA-style
//! target under `dc=example,dc=com`. No network I/O.

use dirmigrate_core::config::{MigrationOptions, TargetConfig};
use dirmigrate_core::directory::MemoryDirectory;
use dirmigrate_core::entry::Attributes;
use dirmigrate_core::errors::MigrationError;
use dirmigrate_core::{MigrationEngine, MigrationReport, RecordType};

const SOURCE_BASE: &str = "dc=source,dc=org";
const DEFAULT_GROUP_DN: &str = "cn=ipausers,cn=groups,cn=accounts,dc=example,dc=com";

// ===========================================================================
// Helpers
// ===========================================================================

fn target_config() -> TargetConfig {
    toml::from_str(
        r#"
uri = "ldap://ipa.example.com"
password_env = "DM_PASSWORD"
base_dn = "dc=example,dc=com"
realm = "EXAMPLE.COM"
"#,
    )
    .expect("target config")
}

fn engine_with(options: MigrationOptions) -> MigrationEngine {
    MigrationEngine::new(target_config(), options, true)
}

fn attrs(pairs: &[(&str, &[&str])]) -> Attributes {
    pairs
        .iter()
        .map(|(name, values)| (*name, values.to_vec()))
        .collect()
}

fn user_dn(uid: &str) -> String {
    format!("uid={uid},cn=users,cn=accounts,dc=example,dc=com")
}

fn group_dn(cn: &str) -> String {
    format!("cn={cn},cn=groups,cn=accounts,dc=example,dc=com")
}

/// Source with both containers, two users and a bis-style group.
fn sample_source() -> MemoryDirectory {
    let mut src = MemoryDirectory::new().with_naming_context(SOURCE_BASE);
    src.add_entry("ou=people,dc=source,dc=org", Attributes::new());
    src.add_entry("ou=groups,dc=source,dc=org", Attributes::new());
    add_user(&mut src, "jdoe");
    add_user(&mut src, "alice");
    src.add_entry(
        "cn=staff,ou=groups,dc=source,dc=org",
        attrs(&[
            ("objectClass", &["top", "groupOfNames"]),
            ("cn", &["staff"]),
            ("member", &["uid=jdoe,ou=people,dc=source,dc=org"]),
            ("uniqueMember", &["uid=alice,ou=people,dc=source,dc=org"]),
        ]),
    );
    src
}

fn add_user(src: &mut MemoryDirectory, uid: &str) {
    src.add_entry(
        &format!("uid={uid},ou=people,{SOURCE_BASE}"),
        attrs(&[
            ("objectClass", &["top", "person", "posixAccount"]),
            ("uid", &[uid]),
            ("cn", &[uid]),
            ("sn", &[uid]),
            ("uidNumber", &["2000"]),
        ]),
    );
}

fn sample_target() -> MemoryDirectory {
    let mut dst = MemoryDirectory::new();
    dst.add_entry(
        DEFAULT_GROUP_DN,
        attrs(&[("objectclass", &["top", "groupofnames"]), ("gidnumber", &["1000"])]),
    );
    dst
}

// ===========================================================================
// Tests
// ===========================================================================

#[tokio::test]
async fn test_full_migration_users_then_groups() {
    let engine = engine_with(MigrationOptions::default());
    let mut src = sample_source();
    let mut dst = sample_target();

    let report = engine.run(&mut src, &mut dst).await.expect("migration");

    assert!(report.enabled);
    assert_eq!(report.migrated(RecordType::User), ["jdoe", "alice"]);
    assert_eq!(report.migrated(RecordType::Group), ["staff"]);
    assert_eq!(report.total_failed(), 0);

    // Every account lands before any group.
    let dns: Vec<&str> = dst.dns().collect();
    let last_user = dns.iter().rposition(|d| d.starts_with("uid=")).unwrap();
    let first_group = dns
        .iter()
        .position(|d| *d == group_dn("staff"))
        .unwrap();
    assert!(last_user < first_group);

    // The user search runs before the group search.
    assert!(src.searches()[0].contains("(uid=*)"));
    assert!(src.searches()[1].contains("(cn=*)"));
}

#[tokio::test]
async fn test_user_entry_gets_target_attributes() {
    let engine = engine_with(MigrationOptions::default());
    let mut src = sample_source();
    let mut dst = sample_target();

    engine.run(&mut src, &mut dst).await.expect("migration");

    let user = dst.entry(&user_dn("jdoe")).expect("user migrated");
    assert_eq!(user.first("homedirectory"), Some("/home/jdoe"));
    assert_eq!(user.first("gidnumber"), Some("1000"));
    assert_eq!(user.first("krbprincipalname"), Some("jdoe@EXAMPLE.COM"));
    assert_eq!(user.first("ipauniqueid"), Some("autogenerate"));
    assert!(user.has_object_class("inetorgperson"));
    assert!(user.has_object_class("posixaccount"));
    assert_eq!(user.first("uidnumber"), Some("2000"));

    let group = dst.entry(DEFAULT_GROUP_DN).unwrap();
    assert_eq!(group.get("member").unwrap(), [user_dn("jdoe"), user_dn("alice")]);
}

#[tokio::test]
async fn test_rfc2307bis_group_members() {
    let engine = engine_with(MigrationOptions::default());
    let mut src = sample_source();
    let mut dst = sample_target();

    engine.run(&mut src, &mut dst).await.expect("migration");

    let group = dst.entry(&group_dn("staff")).expect("group migrated");
    assert_eq!(group.get("member").unwrap(), [user_dn("jdoe"), user_dn("alice")]);
    assert!(!group.contains("uniquemember"));
    assert!(group.has_object_class("ipausergroup"));
}

#[tokio::test]
async fn test_rfc2307_memberuid_conversion() {
    let options = MigrationOptions {
        schema: "RFC2307".into(),
        ..Default::default()
    };
    let engine = engine_with(options);
    let mut src = MemoryDirectory::new().with_naming_context(SOURCE_BASE);
    src.add_entry("ou=people,dc=source,dc=org", Attributes::new());
    src.add_entry("ou=groups,dc=source,dc=org", Attributes::new());
    src.add_entry(
        "cn=devs,ou=groups,dc=source,dc=org",
        attrs(&[
            ("objectClass", &["posixGroup", "groupOfNames"]),
            ("cn", &["devs"]),
            ("memberUid", &["jdoe", "alice"]),
        ]),
    );
    let mut dst = sample_target();

    let report = engine.run(&mut src, &mut dst).await.expect("migration");

    assert_eq!(report.migrated(RecordType::Group), ["devs"]);
    let group = dst.entry(&group_dn("devs")).unwrap();
    assert_eq!(group.get("member").unwrap(), [user_dn("jdoe"), user_dn("alice")]);
    assert_eq!(group.get("memberuid").unwrap(), ["jdoe", "alice"]);
}

#[tokio::test]
async fn test_members_outside_known_containers_are_dropped() {
    let engine = engine_with(MigrationOptions::default());
    let mut src = MemoryDirectory::new().with_naming_context(SOURCE_BASE);
    src.add_entry("ou=people,dc=source,dc=org", Attributes::new());
    src.add_entry("ou=groups,dc=source,dc=org", Attributes::new());
    src.add_entry(
        "cn=mixed,ou=groups,dc=source,dc=org",
        attrs(&[
            ("objectClass", &["groupOfUniqueNames"]),
            ("cn", &["mixed"]),
            (
                "uniqueMember",
                &[
                    "uid=bob,ou=people,dc=source,dc=org",
                    "uid=eve,ou=contractors,dc=source,dc=org",
                    "cn=ops,ou=groups,dc=source,dc=org",
                ],
            ),
        ]),
    );
    let mut dst = sample_target();

    engine.run(&mut src, &mut dst).await.expect("migration");

    let group = dst.entry(&group_dn("mixed")).unwrap();
    assert_eq!(group.get("member").unwrap(), [user_dn("bob"), group_dn("ops")]);
}

#[tokio::test]
async fn test_exclusions_and_blacklists() {
    let options = MigrationOptions {
        exclude_users: vec!["Alice".into()],
        exclude_groups: vec!["staff".into()],
        user_ignore_attributes: vec!["uidNumber".into()],
        user_ignore_object_classes: vec!["posixAccount".into()],
        ..Default::default()
    };
    let engine = engine_with(options);
    let mut src = sample_source();
    let mut dst = sample_target();

    let report = engine.run(&mut src, &mut dst).await.expect("migration");

    assert_eq!(report.migrated(RecordType::User), ["jdoe"]);
    assert!(report.migrated(RecordType::Group).is_empty());
    assert!(!report.failed(RecordType::User).unwrap().contains_key("alice"));
    assert!(!report.failed(RecordType::Group).unwrap().contains_key("staff"));
    assert!(dst.entry(&user_dn("alice")).is_none());
    assert!(dst.entry(&group_dn("staff")).is_none());

    let user = dst.entry(&user_dn("jdoe")).unwrap();
    assert!(!user.contains("uidnumber"));
    assert!(!user.has_object_class("posixaccount"));
}

#[tokio::test]
async fn test_rerun_reports_conflicts() {
    let engine = engine_with(MigrationOptions::default());
    let mut src = sample_source();
    let mut dst = sample_target();

    engine.run(&mut src, &mut dst).await.expect("first run");
    let report = engine.run(&mut src, &mut dst).await.expect("second run");

    assert!(report.migrated(RecordType::User).is_empty());
    assert!(report.migrated(RecordType::Group).is_empty());
    for (record_type, pkey) in [
        (RecordType::User, "jdoe"),
        (RecordType::User, "alice"),
        (RecordType::Group, "staff"),
    ] {
        let reason = report
            .failed(record_type)
            .and_then(|f| f.get(pkey))
            .unwrap_or_else(|| panic!("{pkey} should have failed"));
        assert!(reason.contains("already exists"), "unexpected reason: {reason}");
    }
}

#[tokio::test]
async fn test_principal_taken_by_another_entry() {
    let engine = engine_with(MigrationOptions::default());
    let mut src = sample_source();
    let mut dst = sample_target();
    dst.add_entry(
        "uid=john,cn=users,cn=accounts,dc=example,dc=com",
        attrs(&[
            ("objectclass", &["krbprincipalaux"]),
            ("krbprincipalname", &["jdoe@EXAMPLE.COM"]),
        ]),
    );

    let report = engine.run(&mut src, &mut dst).await.expect("migration");

    assert_eq!(report.migrated(RecordType::User), ["alice"]);
    let reason = report.failed(RecordType::User).unwrap().get("jdoe").unwrap();
    assert!(reason.contains("Kerberos principal jdoe@EXAMPLE.COM already exists"));
    assert!(dst.entry(&user_dn("jdoe")).is_none());
}

#[tokio::test]
async fn test_default_group_failure_is_reported_twice() {
    let engine = engine_with(MigrationOptions::default());
    let mut src = sample_source();
    let mut dst = sample_target();
    dst.fail_add_member(true);

    let report = engine.run(&mut src, &mut dst).await.expect("migration");

    assert_eq!(report.migrated(RecordType::User), ["jdoe", "alice"]);
    let failed = report.failed(RecordType::User).unwrap();
    assert!(failed.get("jdoe").unwrap().contains("default group"));
    assert!(failed.get("alice").unwrap().contains("default group"));
}

#[tokio::test]
async fn test_missing_default_group_aborts_without_report() {
    let engine = engine_with(MigrationOptions::default());
    let mut src = sample_source();
    let mut dst = MemoryDirectory::new();

    let result = engine.run(&mut src, &mut dst).await;

    assert!(matches!(
        result,
        Err(MigrationError::DefaultGroupNotFound { ref dn }) if dn == DEFAULT_GROUP_DN
    ));
    assert_eq!(dst.dns().count(), 0);
}

#[tokio::test]
async fn test_disabled_migration_touches_nothing() {
    let engine = MigrationEngine::new(target_config(), MigrationOptions::default(), false);
    let mut src = sample_source();
    let mut dst = sample_target();

    let report = engine.run(&mut src, &mut dst).await.expect("disabled run");

    assert_eq!(report, MigrationReport::disabled());
    assert!(src.searches().is_empty());
    assert_eq!(dst.dns().count(), 1);
}

#[tokio::test]
async fn test_truncated_search_keeps_partial_results() {
    let engine = engine_with(MigrationOptions::default());
    let mut src = sample_source();
    src.set_size_limit(1);
    let mut dst = sample_target();

    let report = engine.run(&mut src, &mut dst).await.expect("migration");

    assert_eq!(report.migrated(RecordType::User), ["jdoe"]);
    assert_eq!(report.migrated(RecordType::Group), ["staff"]);
}

#[tokio::test]
async fn test_search_reference_is_recorded() {
    let engine = engine_with(MigrationOptions::default());
    let mut src = sample_source();
    src.add_reference("ou=groups,dc=source,dc=org", "ldap://replica.source.org/ou=groups");
    let mut dst = sample_target();

    let report = engine.run(&mut src, &mut dst).await.expect("migration");

    let failed = report.failed(RecordType::Group).unwrap();
    assert_eq!(
        failed.get("ldap://replica.source.org/ou=groups").map(String::as_str),
        Some("Migration of LDAP search reference is not supported.")
    );
    assert_eq!(report.migrated(RecordType::Group), ["staff"]);
}

#[tokio::test]
async fn test_missing_group_container() {
    let mut src = MemoryDirectory::new().with_naming_context(SOURCE_BASE);
    src.add_entry("ou=people,dc=source,dc=org", Attributes::new());
    add_user(&mut src, "jdoe");

    let strict = engine_with(MigrationOptions::default());
    let mut dst = sample_target();
    let result = strict.run(&mut src.clone(), &mut dst).await;
    assert!(matches!(
        result,
        Err(MigrationError::ContainerNotFound { ref base, .. }) if base == "ou=groups,dc=source,dc=org"
    ));

    let lenient = engine_with(MigrationOptions {
        continue_on_error: true,
        ..Default::default()
    });
    let mut dst = sample_target();
    let report = lenient.run(&mut src, &mut dst).await.expect("migration");
    assert_eq!(report.migrated(RecordType::User), ["jdoe"]);
    assert!(report.migrated(RecordType::Group).is_empty());
}

#[tokio::test]
async fn test_report_json_shape() {
    let engine = engine_with(MigrationOptions::default());
    let mut src = sample_source();
    let mut dst = sample_target();

    let report = engine.run(&mut src, &mut dst).await.expect("migration");
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["enabled"], true);
    assert_eq!(json["migrated"]["user"], serde_json::json!(["jdoe", "alice"]));
    assert_eq!(json["migrated"]["group"], serde_json::json!(["staff"]));
    assert_eq!(json["failed"]["user"], serde_json::json!({}));
}

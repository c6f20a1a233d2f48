//! DirMigrate command-line tool.
//!
//! Migrates users and groups from an LDAP server into an IPA-style identity
//! directory, and generates / validates the configuration file describing
//! the target.

mod render;
mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dirmigrate_core::config::{AppConfig, MigrationOptions};
use dirmigrate_core::directory::ldap::is_valid_ldap_uri;
use dirmigrate_core::errors::MigrationError;
use dirmigrate_core::schema::MembershipSchema;
use dirmigrate_core::{LdapDirectory, MigrationEngine, MigrationReport};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// DirMigrate command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "dirmigrate",
    version,
    about = "Migrate users and groups from an LDAP server into an IPA directory"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(
        short,
        long,
        global = true,
        default_value = "/etc/dirmigrate/config.toml"
    )]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error). Overrides `[logging] level`.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Migrate users and groups from an LDAP server.
    Migrate(MigrateArgs),

    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./dirmigrate.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,
}

/// Options of `dirmigrate migrate`. Anything left unset falls back to the
/// `[source]` section of the configuration file.
#[derive(Args, Debug)]
struct MigrateArgs {
    /// Source server, e.g. `ldap://ds.example.com:389`.
    #[arg(value_name = "LDAP_URI")]
    ldap_uri: String,

    /// Bind DN for the source server.
    #[arg(long)]
    bind_dn: Option<String>,

    /// Bind password for the source server. Prompted for when absent.
    #[arg(long)]
    password: Option<String>,

    /// RDN of the source user container.
    #[arg(long)]
    user_container: Option<String>,

    /// RDN of the source group container.
    #[arg(long)]
    group_container: Option<String>,

    /// Object classes used to search for users.
    #[arg(long = "user-objectclass", value_delimiter = ',')]
    user_object_classes: Vec<String>,

    /// Object classes used to search for groups.
    #[arg(long = "group-objectclass", value_delimiter = ',')]
    group_object_classes: Vec<String>,

    /// Object classes to drop from users.
    #[arg(long = "user-ignore-objectclass", value_delimiter = ',')]
    user_ignore_object_classes: Vec<String>,

    /// Attributes to drop from users.
    #[arg(long = "user-ignore-attribute", value_delimiter = ',')]
    user_ignore_attributes: Vec<String>,

    /// Object classes to drop from groups.
    #[arg(long = "group-ignore-objectclass", value_delimiter = ',')]
    group_ignore_object_classes: Vec<String>,

    /// Attributes to drop from groups.
    #[arg(long = "group-ignore-attribute", value_delimiter = ',')]
    group_ignore_attributes: Vec<String>,

    /// Membership schema of the source: RFC2307bis or RFC2307.
    #[arg(long)]
    schema: Option<String>,

    /// Continue when a source container does not exist.
    #[arg(long = "continue", overrides_with = "no_continue")]
    continue_on_error: bool,

    /// Abort when a source container does not exist, even if the
    /// configuration sets `continue_on_error`.
    #[arg(long = "no-continue", overrides_with = "continue_on_error")]
    no_continue: bool,

    /// Users to skip.
    #[arg(long, value_delimiter = ',')]
    exclude_users: Vec<String>,

    /// Groups to skip.
    #[arg(long, value_delimiter = ',')]
    exclude_groups: Vec<String>,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

impl MigrateArgs {
    /// Overlay the command-line options on the configured defaults.
    fn apply(&self, options: &mut MigrationOptions) {
        fn replace_list(target: &mut Vec<String>, from: &[String]) {
            if !from.is_empty() {
                *target = from.to_vec();
            }
        }

        if let Some(ref container) = self.user_container {
            options.user_container = container.clone();
        }
        if let Some(ref container) = self.group_container {
            options.group_container = container.clone();
        }
        if let Some(ref schema) = self.schema {
            options.schema = schema.clone();
        }
        if self.continue_on_error {
            options.continue_on_error = true;
        } else if self.no_continue {
            options.continue_on_error = false;
        }

        replace_list(&mut options.user_object_classes, &self.user_object_classes);
        replace_list(&mut options.group_object_classes, &self.group_object_classes);
        replace_list(&mut options.user_ignore_object_classes, &self.user_ignore_object_classes);
        replace_list(&mut options.user_ignore_attributes, &self.user_ignore_attributes);
        replace_list(&mut options.group_ignore_object_classes, &self.group_ignore_object_classes);
        replace_list(&mut options.group_ignore_attributes, &self.group_ignore_attributes);
        replace_list(&mut options.exclude_users, &self.exclude_users);
        replace_list(&mut options.exclude_groups, &self.exclude_groups);

        options.normalize();
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = cli
        .log_level
        .clone()
        .or_else(|| {
            AppConfig::load_from_file(&cli.config)
                .ok()
                .map(|c| c.logging.level)
        })
        .unwrap_or_else(|| "warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Migrate(args) => cmd_migrate(&cli.config, args).await,
        Commands::Init { output } => cmd_init(&output).map(|()| ExitCode::SUCCESS),
        Commands::Validate => cmd_validate(&cli.config).map(|()| ExitCode::SUCCESS),
    }
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn load_config(path: &Path) -> Result<AppConfig> {
    AppConfig::load_and_resolve(path).context("failed to load configuration file")
}

fn set_or_missing(value: &Option<String>) -> &'static str {
    if value.is_some() {
        "set"
    } else {
        "NOT SET"
    }
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

async fn cmd_migrate(config_path: &Path, args: MigrateArgs) -> Result<ExitCode> {
    if !is_valid_ldap_uri(&args.ldap_uri) {
        return Err(MigrationError::InvalidLdapUri(args.ldap_uri).into());
    }

    let config = load_config(config_path)?;
    let mut options = config.source.options.clone();
    args.apply(&mut options);
    options
        .schema
        .parse::<MembershipSchema>()
        .context("invalid --schema")?;

    let engine = MigrationEngine::new(config.target.clone(), options, config.migration.enabled);
    if !engine.is_enabled() {
        if args.json {
            println!("{}", serde_json::to_string_pretty(&MigrationReport::disabled())?);
        } else {
            render::print_report(&MigrationReport::disabled());
        }
        return Ok(ExitCode::FAILURE);
    }

    let bind_dn = args
        .bind_dn
        .clone()
        .unwrap_or_else(|| config.source.bind_dn.clone());
    let source_password = match args.password.clone().or_else(|| config.source.password.clone()) {
        Some(password) => password,
        None => dialoguer::Password::new()
            .with_prompt(format!("Password for {bind_dn}"))
            .interact()
            .context("failed to read source bind password")?,
    };
    let target_password = config.target.password.clone().ok_or_else(|| {
        anyhow!(
            "target bind password not set: export {}",
            config.target.password_env
        )
    })?;

    let mut source = LdapDirectory::connect(&args.ldap_uri, &bind_dn, &source_password)
        .await
        .context("failed to connect to the source directory")?;
    let mut target = LdapDirectory::connect(
        &config.target.uri,
        &config.target.bind_dn,
        &target_password,
    )
    .await
    .context("failed to connect to the target directory")?
    .with_search_base(config.target.base_dn.clone());

    info!(source = %source.uri(), target = %target.uri(), "starting migration");
    let result = engine.run(&mut source, &mut target).await;

    for (name, directory) in [("source", source), ("target", target)] {
        if let Err(e) = directory.unbind().await {
            warn!(directory = name, error = %e, "unbind failed");
        }
    }

    let report = result.context("migration failed")?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        render::print_report(&report);
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_init(output: &Path) -> Result<()> {
    let default_config = r#"# DirMigrate Configuration
# Source bind options can be overridden on the command line.

[logging]
level = "info"

[migration]
# Migration is refused until this is switched on.
enabled = false

[target]
uri = "ldap://ipa.example.com"
bind_dn = "cn=directory manager"
password_env = "DM_PASSWORD"
base_dn = "dc=example,dc=com"
realm = "EXAMPLE.COM"
user_container = "cn=users,cn=accounts"
group_container = "cn=groups,cn=accounts"
default_primary_group = "ipausers"
homes_root = "/home"

[source]
bind_dn = "cn=directory manager"
# password_env = "DS_PASSWORD"
user_container = "ou=people"
group_container = "ou=groups"
user_object_classes = ["person"]
group_object_classes = ["groupOfUniqueNames", "groupOfNames"]
user_ignore_object_classes = []
user_ignore_attributes = []
group_ignore_object_classes = []
group_ignore_attributes = []
schema = "RFC2307bis"
continue_on_error = false
exclude_users = []
exclude_groups = []
"#;

    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, default_config).context("failed to write config file")?;

    println!("Default configuration written to {}", output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit the config file with your target directory details");
    println!("  2. Set the referenced environment variables (DM_PASSWORD, etc.)");
    println!("  3. Set [migration] enabled = true");
    println!(
        "  4. Validate with: dirmigrate validate --config {}",
        output.display()
    );
    println!(
        "  5. Migrate with: dirmigrate migrate --config {} ldap://ds.example.com",
        output.display()
    );

    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let mut config =
        AppConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    config
        .resolve_env_vars()
        .context("failed to resolve environment variables")?;
    println!("  [OK] Environment variable references processed");

    match config.validate() {
        Ok(()) => println!("  [OK] All required fields are valid"),
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    let options = &config.source.options;
    println!();
    println!("Configuration summary:");
    println!("  Target URI       : {}", config.target.uri);
    println!("  Target bind DN   : {}", config.target.bind_dn);
    println!("  Target password  : {}", set_or_missing(&config.target.password));
    println!("  Target base DN   : {}", config.target.base_dn);
    println!("  Realm            : {}", config.target.realm);
    println!("  Default group    : {}", config.target.default_primary_group);
    println!("  Source bind DN   : {}", config.source.bind_dn);
    println!(
        "  Source password  : {}",
        if config.source.password.is_some() {
            "set"
        } else {
            "prompted"
        }
    );
    println!("  User container   : {}", options.user_container);
    println!("  Group container  : {}", options.group_container);
    println!("  Schema           : {}", options.schema);
    println!(
        "  Migration mode   : {}",
        if config.migration.enabled {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!();
    println!("Configuration is valid.");

    Ok(())
}

//! Human-readable rendering of a [`MigrationReport`].

use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};

use dirmigrate_core::models::{RecordType, MIGRATE_ORDER};
use dirmigrate_core::report::FailureMap;
use dirmigrate_core::MigrationReport;

use crate::style;

pub const DISABLED_NOTICE: &str = "Migration mode is disabled. Use 'ipa config-mod' to enable it.";

pub const PASSWORD_NOTICE: &str = "Passwords have been migrated in pre-hashed format. \
IPA is unable to generate Kerberos keys unless provided with clear text passwords. \
All migrated users need to login at https://your.domain/ipa/migration/ before they \
can use their Kerberos accounts.";

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn count_cell(count: usize, color: Color) -> Cell {
    if count == 0 {
        Cell::new(count)
    } else {
        Cell::new(count).fg(color)
    }
}

/// One row per record type with migrated and failed counts.
pub fn summary_table(report: &MigrationReport) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Type", "Migrated", "Failed"]);
    for record_type in MIGRATE_ORDER {
        let failed = report.failed(record_type).map_or(0, FailureMap::len);
        table.add_row(vec![
            Cell::new(record_type.plural()),
            count_cell(report.migrated(record_type).len(), Color::Green),
            count_cell(failed, Color::Red),
        ]);
    }
    table
}

/// Primary key and reason for every failure of one record type.
pub fn failure_table(record_type: RecordType, failures: &FailureMap) -> Table {
    let mut table = new_table();
    table.set_header(vec![record_type.key_attribute(), "Reason"]);
    for (pkey, reason) in failures {
        table.add_row(vec![Cell::new(pkey), Cell::new(reason)]);
    }
    table
}

/// Print the report to stdout.
pub fn print_report(report: &MigrationReport) {
    if !report.enabled {
        println!("{}", style::error(DISABLED_NOTICE));
        return;
    }

    println!();
    println!("{}", style::header("Migration summary"));
    println!("{}", summary_table(report));

    for record_type in MIGRATE_ORDER {
        let migrated = report.migrated(record_type);
        if migrated.is_empty() {
            println!("{}", style::dim(&format!("No {} migrated", record_type.plural())));
        } else {
            println!(
                "{}",
                style::success(&format!(
                    "Migrated {}: {}",
                    record_type.plural(),
                    migrated.join(", ")
                ))
            );
        }
    }

    for record_type in MIGRATE_ORDER {
        let Some(failures) = report.failed(record_type).filter(|f| !f.is_empty()) else {
            continue;
        };
        println!();
        println!(
            "{}",
            style::header(&format!("Failed {}", record_type.plural()))
        );
        println!("{}", failure_table(record_type, failures));
    }

    if report.total_migrated() > 0 {
        println!();
        println!("{}", style::warn(PASSWORD_NOTICE));
    }
}

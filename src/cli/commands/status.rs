//! Status command - list cached entries with sizes and timestamps

use crate::cache::fs::{entry_size, format_bytes};
use crate::cache::CacheState;
use crate::cli::args::{includes, CacheSelection, OutputFormat, StatusArgs};
use crate::cli::context::CommandContext;
use crate::error::ArtcacheResult;
use crate::ui::{self, UiContext};
use chrono::{DateTime, Utc};
use console::style;
use serde::Serialize;
use std::path::PathBuf;

/// One row of the listing
#[derive(Debug, Serialize)]
struct EntryRow {
    cache: &'static str,
    key: String,
    path: PathBuf,
    size_bytes: u64,
    /// `None` for entries without a timestamp
    modified: Option<DateTime<Utc>>,
}

impl EntryRow {
    fn from_state(cache: &'static str, state: &CacheState) -> Vec<Self> {
        state
            .entries()
            .map(|entry| Self {
                cache,
                key: entry.key.clone(),
                path: entry.path.clone(),
                size_bytes: entry_size(&entry.path),
                modified: modified_at(entry.timestamp),
            })
            .collect()
    }
}

/// Zero means the entry carries no timestamp
fn modified_at(millis: i64) -> Option<DateTime<Utc>> {
    if millis == 0 {
        return None;
    }
    DateTime::from_timestamp_millis(millis)
}

/// Execute the status command
pub async fn execute(args: StatusArgs, ctx: &CommandContext) -> ArtcacheResult<()> {
    let caches = ctx.caches(None);
    let mut sections = Vec::new();

    if includes(args.only, CacheSelection::Jars) {
        let state = caches.jars.scan().await?;
        sections.push(("jar", caches.jars.is_enabled(), EntryRow::from_state("jar", &state)));
    }
    if includes(args.only, CacheSelection::Aars) {
        let state = caches.aars.scan().await?;
        sections.push(("aar", caches.aars.is_enabled(), EntryRow::from_state("aar", &state)));
    }

    match args.format {
        OutputFormat::Table => print_table(ctx, &sections),
        OutputFormat::Json => {
            let rows: Vec<&EntryRow> = sections.iter().flat_map(|(_, _, rows)| rows).collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Plain => {
            for (_, _, rows) in &sections {
                for row in rows {
                    println!("{}", row.path.display());
                }
            }
        }
    }

    Ok(())
}

fn print_table(ctx: &CommandContext, sections: &[(&str, bool, Vec<EntryRow>)]) {
    let ui_ctx = UiContext::detect();
    ui::intro(&ui_ctx, "artcache status");
    ui::key_value(&ui_ctx, "Root", &ctx.cache_root().display().to_string());

    for (label, enabled, rows) in sections {
        println!();
        if !enabled {
            ui::step_warn_hint(
                &ui_ctx,
                &format!("{} cache is disabled", label),
                &format!("it is emptied on the next sync; set cache.{}s.enabled = true", label),
            );
        }
        if rows.is_empty() {
            ui::step_info(&ui_ctx, &format!("No cached {} entries", label));
            continue;
        }

        println!(
            "{:<56} {:>10} {:<20}",
            style("KEY").bold(),
            style("SIZE").bold(),
            style("MODIFIED").bold()
        );
        println!("{}", "-".repeat(88));
        for row in rows {
            let modified = row
                .modified
                .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:<56} {:>10} {:<20}",
                row.key,
                format_bytes(row.size_bytes),
                modified
            );
        }

        let total: u64 = rows.iter().map(|row| row.size_bytes).sum();
        println!();
        println!("Total {} size: {} ({} entries)", label, format_bytes(total), rows.len());
    }
}

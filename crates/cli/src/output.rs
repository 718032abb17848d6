use crate::error::CliError;
use engine_config::report::summary::ImportSummary;
use std::fmt::Write;

/// Row errors listed in the table view; the JSON report carries all kept errors.
const TABLE_ERRORS: usize = 10;

pub fn print_summary(summary: &ImportSummary, as_json: bool) -> Result<(), CliError> {
    if as_json {
        println!("{}", summary.to_json()?);
    } else {
        print!("{}", render_table(summary));
    }
    Ok(())
}

fn render_table(summary: &ImportSummary) -> String {
    let task = &summary.task;
    let total = task
        .total
        .map(|t| t.to_string())
        .unwrap_or_else(|| "n/a".to_string());

    let mut out = String::new();
    let _ = writeln!(out, "Import of '{}':", summary.source);
    let _ = writeln!(out, "-----------------------------");
    let _ = writeln!(out, "{:<16} {}", "Task", task.task_id);
    let _ = writeln!(out, "{:<16} {}", "State", task.state);
    let _ = writeln!(out, "{:<16} {}", "Message", task.message);
    let _ = writeln!(out, "{:<16} {}/{}", "Processed", task.processed, total);
    let _ = writeln!(out, "{:<16} {}", "Imported", task.imported);
    let _ = writeln!(out, "{:<16} {}", "Inserted", summary.metrics.inserted);
    let _ = writeln!(out, "{:<16} {}", "Updated", summary.metrics.updated);
    let _ = writeln!(out, "{:<16} {}", "Errors", task.error_count);
    let _ = writeln!(out, "{:<16} {} ms", "Elapsed", summary.elapsed_ms);
    let _ = writeln!(out, "{:<16} {:.1}", "Rows/s", summary.rows_per_second());
    if summary.dry_run {
        let _ = writeln!(out, "{:<16} yes (nothing was written)", "Dry run");
    }

    if !task.errors.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Errors:");
        for err in task.errors.iter().take(TABLE_ERRORS) {
            match err.row {
                Some(row) => {
                    let _ = writeln!(out, "  row {row:<8} {}", err.reason);
                }
                None => {
                    let _ = writeln!(out, "  {:<12} {}", "-", err.reason);
                }
            }
        }
        let hidden = task.error_count.saturating_sub(TABLE_ERRORS as u64);
        if hidden > 0 {
            let _ = writeln!(out, "  ... and {hidden} more");
        }
    }

    out
}

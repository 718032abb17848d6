use engine_core::metrics::MetricsSnapshot;
use model::execution::task::TaskSnapshot;
use serde::Serialize;

/// Final report of one import run, printed by the CLI.
#[derive(Serialize, Debug, Clone)]
pub struct ImportSummary {
    pub source: String,
    pub dry_run: bool,
    pub elapsed_ms: u64,
    pub task: TaskSnapshot,
    pub metrics: MetricsSnapshot,
}

impl ImportSummary {
    pub fn rows_per_second(&self) -> f64 {
        if self.elapsed_ms == 0 {
            return self.task.processed as f64;
        }
        self.task.processed as f64 * 1000.0 / self.elapsed_ms as f64
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use model::{core::identifiers::TaskId, execution::task::ImportState};

    #[test]
    fn json_report_carries_state_and_counters() {
        let now = Utc::now();
        let summary = ImportSummary {
            source: "products.csv".into(),
            dry_run: true,
            elapsed_ms: 2000,
            task: TaskSnapshot {
                task_id: TaskId::from("t"),
                state: ImportState::Success,
                processed: 500,
                total: Some(500),
                imported: 498,
                errors: Vec::new(),
                error_count: 2,
                message: "Import completed! Processed 500 products.".into(),
                created_at: now,
                updated_at: now,
            },
            metrics: MetricsSnapshot::default(),
        };

        assert_eq!(summary.rows_per_second(), 250.0);
        let json: serde_json::Value = serde_json::from_str(&summary.to_json().unwrap()).unwrap();
        assert_eq!(json["task"]["state"], "SUCCESS");
        assert_eq!(json["task"]["imported"], 498);
        assert_eq!(json["dry_run"], true);
    }
}

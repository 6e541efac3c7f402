use serde::Serialize;

use crate::engine::{ScanRun, ScanSummary};
use crate::reporter::Reporter;

#[derive(Serialize)]
struct JsonReport<'a> {
    version: &'static str,
    summary: ScanSummary,
    #[serde(flatten)]
    run: &'a ScanRun,
}

pub struct JsonReporter;

impl JsonReporter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for JsonReporter {
    fn report(&self, run: &ScanRun) -> String {
        let report = JsonReport {
            version: env!("CARGO_PKG_VERSION"),
            summary: run.summary(),
            run,
        };
        serde_json::to_string_pretty(&report)
            .unwrap_or_else(|e| format!(r#"{{"error": "Failed to serialize result: {}"}}"#, e))
    }
}

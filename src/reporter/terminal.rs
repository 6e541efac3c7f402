use colored::Colorize;

use crate::engine::ScanRun;
use crate::reporter::Reporter;
use crate::rules::{ScanFinding, Severity};

pub struct TerminalReporter {
    verbose: bool,
    /// Only list high and critical findings.
    high_signal_only: bool,
}

impl TerminalReporter {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            high_signal_only: false,
        }
    }

    pub fn with_high_signal_only(mut self, enabled: bool) -> Self {
        self.high_signal_only = enabled;
        self
    }

    fn severity_color(&self, severity: &Severity) -> colored::ColoredString {
        let label = format!("[{}]", severity);
        match severity {
            Severity::Critical => label.red().bold(),
            Severity::High => label.yellow().bold(),
            Severity::Medium => label.cyan(),
            Severity::Low => label.white(),
            Severity::Info | Severity::Safe => label.dimmed(),
        }
    }

    /// Lint-style block: location header, snippet with gutter, then notes.
    fn format_finding(&self, finding: &ScanFinding) -> String {
        let mut output = String::new();
        let location = match (&finding.file_path, finding.line_number) {
            (Some(path), Some(line)) => format!("{path}:{line}: "),
            (Some(path), None) => format!("{path}: "),
            _ => String::new(),
        };

        output.push_str(&format!(
            "{}{} {}: {}\n",
            location,
            self.severity_color(&finding.severity),
            finding.rule_id,
            finding.title
        ));

        let gutter_width = finding
            .line_number
            .map(|l| l.to_string().len())
            .unwrap_or(0)
            .max(4);

        if let Some(snippet) = &finding.snippet {
            let line = finding.line_number.map(|l| l.to_string()).unwrap_or_default();
            output.push_str(&format!(
                "{:>width$} {}\n",
                "",
                "|".dimmed(),
                width = gutter_width
            ));
            output.push_str(&format!(
                "{:>width$} {} {}\n",
                line.cyan(),
                "|".dimmed(),
                snippet,
                width = gutter_width
            ));
        }

        output.push_str(&format!(
            "{:>width$} {} {}\n",
            "",
            "=".dimmed(),
            format!("why: {}", finding.description).yellow(),
            width = gutter_width
        ));

        if let Some(remediation) = &finding.remediation {
            output.push_str(&format!(
                "{:>width$} {} {}\n",
                "",
                "=".dimmed(),
                format!("fix: {}", remediation).green(),
                width = gutter_width
            ));
        }

        if self.verbose {
            output.push_str(&format!(
                "{:>width$} {} category: {}, analyzer: {}\n",
                "",
                "=".dimmed(),
                finding.category,
                finding.analyzer,
                width = gutter_width
            ));
            for note in &finding.annotations {
                output.push_str(&format!(
                    "{:>width$} {} {}.{} = {}\n",
                    "",
                    "=".dimmed(),
                    note.stage,
                    note.key,
                    note.value,
                    width = gutter_width
                ));
            }
        }

        output
    }
}

impl Reporter for TerminalReporter {
    fn report(&self, run: &ScanRun) -> String {
        let mut output = String::new();
        let summary = run.summary();

        output.push_str(&format!(
            "{}\n\n",
            format!("skill-audit v{} - Agent Skill Scanner", env!("CARGO_PKG_VERSION")).bold()
        ));
        output.push_str(&format!(
            "Scan {} ({}): {} skill(s) in {:.2}s\n\n",
            run.id, run.trigger, run.skill_count, run.duration_seconds
        ));

        let findings: Vec<&ScanFinding> = if self.high_signal_only {
            run.high_signal_findings().collect()
        } else {
            run.findings.iter().collect()
        };

        if findings.is_empty() {
            output.push_str(&"No security issues found.\n".green().to_string());
        } else {
            for finding in findings {
                output.push_str(&self.format_finding(finding));
                output.push('\n');
            }
        }

        output.push_str(&format!("{}\n", "━".repeat(50)));
        output.push_str(&format!(
            "Summary: {} critical, {} high, {} medium, {} low, {} info (max severity: {})\n",
            summary.critical.to_string().red().bold(),
            summary.high.to_string().yellow().bold(),
            summary.medium.to_string().cyan(),
            summary.low,
            summary.info,
            run.max_severity
        ));

        let result_text = if summary.passed {
            "PASS".green().bold()
        } else {
            "FAIL".red().bold()
        };
        output.push_str(&format!(
            "Result: {} (exit code {})\n",
            result_text,
            if summary.passed { 0 } else { 1 }
        ));

        output
    }
}

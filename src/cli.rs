use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::engine::ScanTrigger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Terminal,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum TriggerArg {
    #[default]
    Manual,
    CatchUp,
    Scheduled,
}

impl From<TriggerArg> for ScanTrigger {
    fn from(arg: TriggerArg) -> Self {
        match arg {
            TriggerArg::Manual => ScanTrigger::Manual,
            TriggerArg::CatchUp => ScanTrigger::CatchUp,
            TriggerArg::Scheduled => ScanTrigger::Scheduled,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "skill-audit",
    version,
    about = "Security scanner for agent skill packages",
    long_about = "skill-audit discovers agent skill packages (directories containing SKILL.md) and scans their instructions and scripts for prompt injection, data exfiltration, command injection and related threats."
)]
pub struct Cli {
    /// Root directories to search for skills
    pub roots: Vec<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Terminal)]
    pub format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Configuration file (.yaml, .yml, .json or .toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Signed rule pack directory
    #[arg(long)]
    pub rule_pack: Option<PathBuf>,

    /// Base64 Ed25519 public key trusted for rule pack signatures (repeatable)
    #[arg(long = "trusted-key")]
    pub trusted_keys: Vec<String>,

    /// Suppressions file (.yaml, .yml or .json)
    #[arg(long)]
    pub suppressions: Option<PathBuf>,

    /// Write 7-day suppressions for every high or critical finding to this file
    #[arg(long)]
    pub write_suppressions: Option<PathBuf>,

    /// Disable the taint-flow analyzer
    #[arg(long)]
    pub no_behavioral: bool,

    /// Disable false-positive filtering
    #[arg(long)]
    pub no_meta: bool,

    /// What started this scan
    #[arg(long, value_enum, default_value_t = TriggerArg::Manual)]
    pub trigger: TriggerArg,

    /// Files larger than this are listed but not read
    #[arg(long)]
    pub max_file_size_mb: Option<u64>,

    /// Only list high and critical findings in terminal output
    #[arg(long)]
    pub high_only: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_basic_args() {
        let cli = Cli::try_parse_from(["skill-audit", "./skills/"]).unwrap();
        assert_eq!(cli.roots.len(), 1);
        assert_eq!(cli.format, OutputFormat::Terminal);
        assert_eq!(cli.trigger, TriggerArg::Manual);
        assert!(!cli.no_behavioral);
        assert!(!cli.no_meta);
        assert!(!cli.high_only);
        assert!(cli.write_suppressions.is_none());
    }

    #[test]
    fn test_parse_no_roots() {
        let cli = Cli::try_parse_from(["skill-audit"]).unwrap();
        assert!(cli.roots.is_empty());
    }

    #[test]
    fn test_parse_multiple_roots() {
        let cli = Cli::try_parse_from(["skill-audit", "./a/", "./b/"]).unwrap();
        assert_eq!(cli.roots.len(), 2);
    }

    #[test]
    fn test_parse_json_format() {
        let cli = Cli::try_parse_from(["skill-audit", "--format", "json", "."]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn test_parse_trigger() {
        let cli = Cli::try_parse_from(["skill-audit", "--trigger", "catch-up", "."]).unwrap();
        assert_eq!(ScanTrigger::from(cli.trigger), ScanTrigger::CatchUp);
    }

    #[test]
    fn test_parse_repeated_trusted_keys() {
        let cli = Cli::try_parse_from([
            "skill-audit",
            "--trusted-key",
            "AAAA",
            "--trusted-key",
            "BBBB",
            ".",
        ])
        .unwrap();
        assert_eq!(cli.trusted_keys, vec!["AAAA", "BBBB"]);
    }

    #[test]
    fn test_parse_toggles() {
        let cli = Cli::try_parse_from([
            "skill-audit",
            "--no-behavioral",
            "--no-meta",
            "--max-file-size-mb",
            "2",
            ".",
        ])
        .unwrap();
        assert!(cli.no_behavioral);
        assert!(cli.no_meta);
        assert_eq!(cli.max_file_size_mb, Some(2));
    }

    #[test]
    fn test_parse_high_only_and_write_suppressions() {
        let cli = Cli::try_parse_from([
            "skill-audit",
            "--high-only",
            "--write-suppressions",
            "accepted.yaml",
            ".",
        ])
        .unwrap();
        assert!(cli.high_only);
        assert_eq!(cli.write_suppressions, Some(PathBuf::from("accepted.yaml")));
    }

    #[test]
    fn test_invalid_format_rejected() {
        assert!(Cli::try_parse_from(["skill-audit", "--format", "sarif", "."]).is_err());
    }
}

pub mod builtin;
pub mod matcher;
pub mod pack;
pub mod pattern;
pub mod signature;
pub mod types;

pub use matcher::{CompiledRule, MatchLocation, RuleSet};
pub use pack::{LoadedRulePack, PackSource, RulePackError, RulePackLoader, TrustedKeys};
pub use pattern::{PatternRule, parse_pattern_rules};
pub use signature::{SignatureRule, parse_signature_rules};
pub use types::*;

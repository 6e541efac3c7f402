//! Rule pack shipped inside the binary. Used whenever no trusted external pack
//! is available.

pub const DEFAULT_PATTERN_RULES: &str = include_str!("default.yaml");

pub const DEFAULT_SIGNATURE_RULES: &str = include_str!("default.yar");

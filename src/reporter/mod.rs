pub mod json;
pub mod terminal;

use crate::engine::ScanRun;

pub use json::JsonReporter;
pub use terminal::TerminalReporter;

pub trait Reporter {
    fn report(&self, run: &ScanRun) -> String;
}

//! Output for the generated plan.
//!
//! - [`plan_file`] - JSON plan document for the engine
//! - [`terminal`] - human readable summary

mod plan_file;
mod terminal;

pub use plan_file::write_plan;
pub use terminal::{format_field, print_summary, summary_lines};

//! Terminal output for the CLI
//!
//! Styled step lines and spinners in an interactive terminal, plain
//! bracketed lines in CI or when output is piped.

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{
    key_value, section, step_error_detail, step_info, step_ok, step_ok_detail, step_warn,
    step_warn_hint,
};
pub use progress::{PhaseProgress, TaskSpinner};

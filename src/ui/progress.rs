//! Progress indicators with CI fallback

use super::context::UiContext;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}  {elapsed:.dim}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
}

/// A task spinner with CI fallback
pub struct TaskSpinner {
    spinner: Option<ProgressBar>,
    interactive: bool,
}

impl TaskSpinner {
    pub fn new(ctx: &UiContext) -> Self {
        Self {
            spinner: None,
            interactive: ctx.use_fancy_output(),
        }
    }

    /// Start the spinner with a message
    pub fn start(&mut self, message: &str) {
        if self.interactive {
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(spinner_style());
            spinner.set_message(message.to_string());
            spinner.enable_steady_tick(Duration::from_millis(120));
            self.spinner = Some(spinner);
        } else {
            println!("{} {}", style("...").dim(), message);
        }
    }

    /// Update the spinner message
    pub fn message(&mut self, message: &str) {
        if let Some(ref spinner) = self.spinner {
            spinner.set_message(message.to_string());
        }
    }

    /// Stop with success message
    pub fn stop(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
            println!("{} {}", style("✓").green(), message);
        } else {
            println!("{} {}", style("[OK]").green(), message);
        }
    }

    /// Stop with error message
    pub fn stop_error(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
            println!("{} {}", style("✗").red(), message);
        } else {
            println!("{} {}", style("[FAIL]").red(), message);
        }
    }
}

/// Progress for a running lifecycle phase.
///
/// The lifecycle announces each step with a `===> STEP` line; the spinner
/// shows the current step and, with `show_output`, echoes every line.
pub struct PhaseProgress {
    bar: Option<ProgressBar>,
    show_output: bool,
}

impl PhaseProgress {
    pub fn new(ctx: &UiContext, show_output: bool) -> Self {
        let bar = ctx.use_fancy_output().then(|| {
            let bar = ProgressBar::new_spinner();
            bar.set_style(spinner_style());
            bar.set_message("Starting lifecycle");
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        });
        Self { bar, show_output }
    }

    /// Process one line of phase output
    pub fn on_line(&self, phase: &str, line: &str) {
        let step = parse_step_line(line);
        match &self.bar {
            Some(bar) => {
                if let Some(step) = step {
                    bar.set_message(format!("[{}] {}", phase, step));
                }
                if self.show_output {
                    bar.println(format!("    [{}] {}", phase, line));
                }
            }
            None => {
                if self.show_output || step.is_some() {
                    println!("    [{}] {}", phase, line);
                }
            }
        }
    }

    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.disable_steady_tick();
            bar.finish_and_clear();
        }
    }
}

/// Parse a lifecycle step line like `===> DETECTING`
fn parse_step_line(line: &str) -> Option<&str> {
    let step = line.trim().strip_prefix("===>")?.trim();
    (!step.is_empty()).then_some(step)
}

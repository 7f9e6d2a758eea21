use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Controls how command progress is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Spinner while a backend call is pending, checkmark when done.
    Normal,
    /// One line per step, with debug logs on stderr in between.
    Verbose,
    /// No spinners; only command output and errors.
    Quiet,
    /// No ANSI, one line per step (for piped/non-TTY).
    Plain,
}

impl OutputMode {
    pub fn resolve(verbose: bool, quiet: bool, is_terminal: bool) -> Self {
        if quiet {
            OutputMode::Quiet
        } else if !is_terminal {
            OutputMode::Plain
        } else if verbose {
            OutputMode::Verbose
        } else {
            OutputMode::Normal
        }
    }

    /// Whether steps draw an indicatif spinner. While one is drawing,
    /// nothing else may write to stderr.
    pub fn uses_spinner(self) -> bool {
        matches!(self, OutputMode::Normal | OutputMode::Quiet)
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn done_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("\u{2713} {msg:.green}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn failed_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("\u{2717} {msg:.red}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Await `fut` behind a spinner labelled `label`.
///
/// The spinner becomes a checkmark on `Ok` and a cross on `Err`; the
/// error itself is left for the caller to report.
pub async fn step<Fut, T, E>(mode: OutputMode, label: &str, fut: Fut) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
{
    if !mode.uses_spinner() {
        println!("{label}...");
        let result = fut.await;
        if result.is_ok() {
            println!("\u{2713} {label}");
        }
        return result;
    }

    let bar = if mode == OutputMode::Quiet {
        ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden())
    } else {
        ProgressBar::new_spinner()
    };
    bar.set_style(spinner_style());
    bar.set_message(label.to_string());
    bar.enable_steady_tick(Duration::from_millis(80));

    let result = fut.await;

    match &result {
        Ok(_) => {
            bar.set_style(done_style());
            bar.finish_with_message(label.to_string());
        }
        Err(_) => {
            bar.set_style(failed_style());
            bar.finish_with_message(label.to_string());
        }
    }
    result
}

//! Progress indicators with plain-line fallback

use super::context::UiContext;
use crate::cache::{Phase, ProgressSink};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A task spinner with plain-line fallback
pub struct TaskSpinner {
    spinner: Option<cliclack::ProgressBar>,
    interactive: bool,
}

impl TaskSpinner {
    pub fn new(ctx: &UiContext) -> Self {
        Self {
            spinner: None,
            interactive: ctx.use_fancy_output(),
        }
    }

    pub fn start(&mut self, message: &str) {
        if self.interactive {
            let spinner = cliclack::spinner();
            spinner.start(message);
            self.spinner = Some(spinner);
        } else {
            println!("{} {}", style("...").dim(), message);
        }
    }

    pub fn stop(&mut self, message: &str) {
        match self.spinner.take() {
            Some(spinner) => spinner.stop(message),
            None => println!("{} {}", style("[OK]").green(), message),
        }
    }

    pub fn stop_error(&mut self, message: &str) {
        match self.spinner.take() {
            Some(spinner) => spinner.error(message),
            None => println!("{} {}", style("[FAIL]").red(), message),
        }
    }
}

/// Per-phase progress of a sync pass
///
/// Interactive terminals get one indicatif bar per phase; otherwise a line
/// is printed when a phase starts and when it ends.
pub struct SyncProgress {
    label: String,
    interactive: bool,
    bar: Mutex<Option<ProgressBar>>,
    failed: AtomicUsize,
}

impl SyncProgress {
    pub fn new(ctx: &UiContext, label: &str) -> Self {
        Self {
            label: label.to_string(),
            interactive: ctx.use_fancy_output(),
            bar: Mutex::new(None),
            failed: AtomicUsize::new(0),
        }
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("  {spinner:.blue} {prefix}  {bar:24.blue/dim} {pos}/{len} {msg:.dim}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
            .progress_chars("━╸─")
    }

    fn with_bar(&self, f: impl FnOnce(&mut Option<ProgressBar>)) {
        if let Ok(mut slot) = self.bar.lock() {
            f(&mut slot);
        }
    }
}

impl ProgressSink for SyncProgress {
    fn phase_started(&self, phase: Phase, total: usize) {
        self.failed.store(0, Ordering::SeqCst);
        if !self.interactive {
            println!("{} {} {} entr{}...", phase, total, self.label, if total == 1 { "y" } else { "ies" });
            return;
        }
        let bar = ProgressBar::new(total as u64);
        bar.set_style(Self::bar_style());
        bar.set_prefix(format!("{} {}", phase, self.label));
        bar.enable_steady_tick(Duration::from_millis(120));
        self.with_bar(|slot| *slot = Some(bar));
    }

    fn unit_finished(&self, _phase: Phase, key: &str, ok: bool) {
        if !ok {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
        self.with_bar(|slot| {
            if let Some(ref bar) = slot {
                bar.set_message(key.to_string());
                bar.inc(1);
            }
        });
    }

    fn phase_finished(&self, phase: Phase) {
        let failed = self.failed.load(Ordering::SeqCst);
        self.with_bar(|slot| {
            if let Some(bar) = slot.take() {
                bar.finish_and_clear();
            }
        });
        if !self.interactive && failed > 0 {
            println!("{} {} {} failed", style("[WARN]").yellow(), phase, failed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spinner_non_interactive() {
        let ctx = UiContext::non_interactive();
        let mut spinner = TaskSpinner::new(&ctx);
        spinner.start("Clearing caches...");
        spinner.stop("Done");
    }

    #[test]
    fn sync_progress_counts_failures_per_phase() {
        let progress = SyncProgress::new(&UiContext::non_interactive(), "jar");
        progress.phase_started(Phase::Populate, 2);
        progress.unit_finished(Phase::Populate, "a_01.jar", true);
        progress.unit_finished(Phase::Populate, "b_02.jar", false);
        assert_eq!(progress.failed.load(Ordering::SeqCst), 1);
        progress.phase_finished(Phase::Populate);

        progress.phase_started(Phase::Merge, 1);
        assert_eq!(progress.failed.load(Ordering::SeqCst), 0);
    }
}

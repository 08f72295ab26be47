use indicatif::{ProgressBar, ProgressStyle};

/// Observes unit-of-work completion during resolution and linking. Backed by
/// `indicatif`'s `ProgressBar`, whose internal counters are already safe to
/// mutate from concurrent tasks, so no extra locking is needed on top.
#[derive(Clone)]
pub struct ProgressTracker {
    bar: ProgressBar,
}

impl ProgressTracker {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0).with_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] {wide_msg}")
                .expect("static template is valid")
                .progress_chars("#>-")
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        bar.enable_steady_tick(std::time::Duration::from_millis(200));

        ProgressTracker { bar }
    }

    /// Register `n` additional units of work.
    pub fn add_work(&self, n: u64) {
        self.bar.inc_length(n);
    }

    /// Mark one unit of work complete.
    pub fn tick(&self, message: impl Into<std::borrow::Cow<'static, str>>) {
        self.bar.set_message(message);
        self.bar.inc(1);
    }

    /// Finalizes the bar. Safe to call on both the success and error path;
    /// called exactly once by the top-level entry point so no partial
    /// progress leaks a dangling render.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

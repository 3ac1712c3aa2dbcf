//! Progress reporting utilities

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress reporter for catalog comparison jobs
#[derive(Debug)]
pub struct ProgressReporter {
    pub connect_pb: Option<ProgressBar>,
    pub tables_pb: Option<ProgressBar>,
    show_progress: bool,
}

impl ProgressReporter {
    /// Create progress reporter for a comparison job
    pub fn new_for_job() -> Self {
        // The tables bar needs the catalog size, known after the first batch
        let connect_pb = create_spinner("Connecting and listing tables...");

        Self {
            connect_pb: Some(connect_pb),
            tables_pb: None,
            show_progress: true,
        }
    }

    /// Create minimal progress reporter (no progress bars)
    pub fn new_minimal() -> Self {
        Self {
            connect_pb: None,
            tables_pb: None,
            show_progress: false,
        }
    }

    /// Record that `processed` of `total` tables are done
    pub fn update_tables(&mut self, processed: usize, total: usize) {
        if let Some(pb) = self.connect_pb.take() {
            pb.finish_and_clear();
        }

        if self.show_progress && self.tables_pb.is_none() {
            self.tables_pb = Some(create_progress_bar(total as u64, "Comparing schemas"));
        }
        if let Some(pb) = &self.tables_pb {
            pb.set_length(total as u64);
            pb.set_position(processed as u64);
        }
    }

    /// Finish all progress bars
    pub fn finish_all(&mut self, message: &str) {
        if let Some(pb) = self.connect_pb.take() {
            pb.finish_and_clear();
        }
        if let Some(pb) = self.tables_pb.take() {
            pb.finish_with_message(message.to_string());
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        if let Some(pb) = self.connect_pb.take() {
            pb.finish_and_clear();
        }
        if let Some(pb) = self.tables_pb.take() {
            pb.finish_and_clear();
        }
    }
}

/// Create a spinner progress bar
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Create a progress bar with known total
fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>5}/{len:5} tables {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}

//! Progress display for running searches (indicatif).

use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::models::RevisionId;
use crate::services::SearchEvent;

const SPINNER_TEMPLATE: &str = "[{elapsed_precise}] {spinner:.green} {msg}";
const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Create a spinner for indeterminate operations
pub fn create_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template(SPINNER_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars(SPINNER_CHARS);
    spinner.set_style(style);
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Running totals shown next to the spinner.
///
/// Cached revisions also produce a `Completed` event; only revisions seen as
/// `Dispatched` count as evaluated.
#[derive(Debug, Default, Clone)]
pub struct ProgressCounts {
    pub cached: usize,
    pub running: usize,
    pub completed: usize,
    in_flight: HashSet<RevisionId>,
}

impl ProgressCounts {
    pub fn apply(&mut self, event: &SearchEvent) {
        match event {
            SearchEvent::Cached { .. } => self.cached += 1,
            SearchEvent::Dispatched { revision } => {
                self.in_flight.insert(revision.id.clone());
            }
            SearchEvent::Completed { revision, .. } => {
                if self.in_flight.remove(&revision.id) {
                    self.completed += 1;
                }
            }
        }
        self.running = self.in_flight.len();
    }

    pub fn message(&self, last: &SearchEvent) -> String {
        let latest = match last {
            SearchEvent::Cached { revision, result } => format!("{revision}: {result} (cached)"),
            SearchEvent::Dispatched { revision } => format!("{revision}: dispatched"),
            SearchEvent::Completed { revision, result } => format!("{revision}: {result}"),
        };
        format!(
            "{} running, {} evaluated, {} cached | {latest}",
            self.running, self.completed, self.cached
        )
    }
}

/// Drive a spinner from search events until the sender side is dropped.
pub fn track_events(mut events: mpsc::UnboundedReceiver<SearchEvent>) -> JoinHandle<ProgressCounts> {
    tokio::spawn(async move {
        let spinner = create_spinner();
        spinner.set_message("resolving first revisions");
        let mut counts = ProgressCounts::default();
        while let Some(event) = events.recv().await {
            counts.apply(&event);
            spinner.set_message(counts.message(&event));
        }
        spinner.finish_and_clear();
        counts
    })
}

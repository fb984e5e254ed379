use std::collections::VecDeque;

use parley_core::utils::FILTER_LABEL_PREFIX;

const FILTERS: [&str; 5] = ["grayscale", "sepia", "noir", "psychedelic", "none"];

/// Round-robin over the visual filters announced to the peer.
#[derive(Debug, Clone)]
pub struct FilterCycle {
    filters: VecDeque<&'static str>,
}

impl Default for FilterCycle {
    fn default() -> Self {
        Self {
            filters: FILTERS.into_iter().collect(),
        }
    }
}

impl FilterCycle {
    /// Advances the cycle and returns the channel label announcing the new filter.
    pub fn next_label(&mut self) -> String {
        let filter = self.filters.pop_front().unwrap_or("none");
        self.filters.push_back(filter);
        format!("{FILTER_LABEL_PREFIX}{filter}")
    }
}

/// The filter name carried by an announcement channel label, if it is one.
pub fn filter_from_label(label: &str) -> Option<&str> {
    label.strip_prefix(FILTER_LABEL_PREFIX)
}

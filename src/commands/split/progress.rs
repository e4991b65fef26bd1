use tracing::{info, warn};

/// Progress indicator for one split run, reported through the log.
#[derive(Debug, Default)]
pub(super) struct ProgressMeter {
    visible: bool,
    failed: bool,
    last_percent: Option<u8>,
}

impl ProgressMeter {
    pub(super) fn new() -> Self {
        Self::default()
    }

    pub(super) fn show(&mut self, label: &str, total: usize) {
        self.visible = true;
        self.last_percent = None;
        info!(label, total, "progress started");
    }

    pub(super) fn update(&mut self, percent: u8) {
        if self.last_percent == Some(percent) {
            return;
        }
        self.last_percent = Some(percent);
        info!(percent, "progress");
    }

    pub(super) fn mark_failed(&mut self) {
        self.failed = true;
        warn!(last_percent = ?self.last_percent, "progress marked failed");
    }

    pub(super) fn hide(&mut self) {
        if !self.visible {
            return;
        }
        self.visible = false;
        info!(failed = self.failed, "progress closed");
    }

    #[cfg(test)]
    pub(super) fn is_visible(&self) -> bool {
        self.visible
    }

    #[cfg(test)]
    pub(super) fn is_failed(&self) -> bool {
        self.failed
    }
}

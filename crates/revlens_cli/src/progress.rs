use revlens::sync::SyncProgress;

/// Turns sync progress events into structured log lines.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: SyncProgress) {
        match event {
            SyncProgress::StatusStarted { status, since } => {
                tracing::info!(status = %status, since = %since.format("%Y-%m-%d"), "Fetching changes");
            }

            SyncProgress::FetchedPage {
                status,
                page,
                count,
                matched,
                total_so_far,
            } => {
                tracing::debug!(status = %status, page, count, matched, total_so_far, "Fetched page");
            }

            SyncProgress::StatusComplete { status, total } => {
                tracing::info!(status = %status, total, "Fetch complete");
            }

            SyncProgress::StatusFailed { status, error } => {
                tracing::warn!(status = %status, error = %error, "Status failed, continuing");
            }

            SyncProgress::Persisted { status, count } => {
                tracing::info!(status = %status, count, "Saved to database");
            }

            SyncProgress::CursorAdvanced { status, position } => {
                tracing::debug!(status = %status, position = %position, "Cursor advanced");
            }

            _ => {}
        }
    }

    /// Wrap this reporter as a library progress callback.
    pub fn into_callback(self) -> revlens::sync::ProgressCallback {
        Box::new(move |event| self.handle(event))
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}

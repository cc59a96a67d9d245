use std::sync::Arc;

use crate::client::ObservationSource;
use crate::error::Result;
use crate::models::RawObservation;

/// Pages through the source collection in natural-key order.
///
/// The only state is the watermark key: the highest key of the last fetched
/// page, used as the exclusive lower bound of the next one. Resuming an
/// interrupted run is re-creating the cursor with the last reported
/// watermark.
pub struct ObservationCursor {
    source: Arc<dyn ObservationSource>,
    watermark: String,
    page_size: usize,
}

impl ObservationCursor {
    pub fn new(source: Arc<dyn ObservationSource>, start_key: &str, page_size: usize) -> Self {
        Self {
            source,
            watermark: start_key.to_string(),
            page_size,
        }
    }

    /// Highest key fetched so far (or the start key before the first page).
    pub fn watermark(&self) -> &str {
        &self.watermark
    }

    /// Fetches the next page and advances the watermark to its last key.
    /// An empty page means the source is exhausted.
    pub async fn next_page(&mut self) -> Result<Vec<RawObservation>> {
        let page = self
            .source
            .page_after(&self.watermark, self.page_size)
            .await?;
        if let Some(last) = page.last() {
            self.watermark = last.key.clone();
        }
        Ok(page)
    }
}

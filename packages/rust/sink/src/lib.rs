//! Delivery of new listings to a spreadsheet.

pub mod auth;
pub mod rows;
pub mod sheets;

use async_trait::async_trait;
use jobflow_shared::{ListingRecord, Result, SheetTarget, SinkStatus};

pub use auth::Credentials;
pub use rows::{AppendPlan, HEADER, hyperlink, plan_append};
pub use sheets::SheetsSink;

/// Destination for the new records of a run.
#[async_trait]
pub trait ListingSink: Send + Sync {
    /// Append `records` to `target`, skipping anything already there.
    async fn append(&self, records: &[ListingRecord], target: &SheetTarget) -> Result<SinkStatus>;

    /// Sink name for tracing.
    fn name(&self) -> &str;
}

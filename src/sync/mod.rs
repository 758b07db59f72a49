pub mod syncer;

use serde::Serialize;

/// Report returned after an account sync completes.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub account_id: String,
    pub ads_synced: u64,
    /// Ads whose id had a matching insights row; the rest synced with
    /// zeroed metrics.
    pub ads_with_insights: u64,
}

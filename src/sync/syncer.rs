use std::collections::HashMap;

use crate::error::Result;
use crate::meta::types::{
    first_action_value, parse_metric, InsightRow, LEAD_ACTION_TYPES, VIDEO_VIEW_ACTION_TYPE,
};
use crate::meta::MetaClient;
use crate::storage::repository::{self, AdRow};
use crate::storage::Database;
use crate::sync::SyncReport;

/// Performance metrics extracted from one insights row.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdMetrics {
    pub spend: f64,
    pub impressions: i64,
    pub clicks: i64,
    pub ctr: f64,
    pub leads: i64,
    pub cpl: f64,
    pub video_views_3s: i64,
    pub video_views_100pct: i64,
}

impl AdMetrics {
    pub fn from_insight(row: &InsightRow) -> Self {
        Self {
            spend: parse_metric(row.spend.as_deref()),
            impressions: parse_metric(row.impressions.as_deref()) as i64,
            clicks: parse_metric(row.clicks.as_deref()) as i64,
            ctr: parse_metric(row.ctr.as_deref()),
            leads: first_action_value(&row.actions, LEAD_ACTION_TYPES) as i64,
            cpl: first_action_value(&row.cost_per_action_type, LEAD_ACTION_TYPES),
            video_views_3s: first_action_value(
                &row.video_p25_watched_actions,
                VIDEO_VIEW_ACTION_TYPE,
            ) as i64,
            video_views_100pct: first_action_value(
                &row.video_thruplay_watched_actions,
                VIDEO_VIEW_ACTION_TYPE,
            ) as i64,
        }
    }
}

/// Share of impressions that turned into a 3-second view, as a percentage.
pub fn hook_rate(video_views_3s: i64, impressions: i64) -> f64 {
    if impressions > 0 {
        video_views_3s as f64 / impressions as f64 * 100.0
    } else {
        0.0
    }
}

/// Share of 3-second viewers that watched to completion, as a percentage.
pub fn hold_rate(video_views_100pct: i64, video_views_3s: i64) -> f64 {
    if video_views_3s > 0 {
        video_views_100pct as f64 / video_views_3s as f64 * 100.0
    } else {
        0.0
    }
}

/// Sync one account's ads for the trailing window: fetch the ad list and the
/// insights feed, join them in memory by ad id, and replace the cached rows.
///
/// The two fetches are sequential; any API error aborts the sync before
/// anything is written. All upserts run in a single transaction so a failed
/// write leaves the previous snapshot visible.
pub async fn sync_account_ads(
    db: &Database,
    client: &MetaClient,
    account_id: &str,
    token: &str,
) -> Result<SyncReport> {
    let ads = client.list_ads(token, account_id).await?;
    let insights = client.list_insights(token, account_id).await?;

    let insights_by_ad: HashMap<String, AdMetrics> = insights
        .iter()
        .map(|row| (row.ad_id.clone(), AdMetrics::from_insight(row)))
        .collect();

    let mut rows: Vec<AdRow> = Vec::with_capacity(ads.len());
    let mut matched: u64 = 0;
    for ad in &ads {
        let metrics = match insights_by_ad.get(&ad.id) {
            Some(m) => {
                matched += 1;
                *m
            }
            None => AdMetrics::default(),
        };
        let thumbnail = ad
            .creative
            .as_ref()
            .and_then(|c| c.thumbnail_url.clone())
            .unwrap_or_default();

        rows.push(AdRow {
            ad_id: ad.id.clone(),
            account_id: account_id.to_string(),
            name: ad.name.clone().unwrap_or_default(),
            status: ad.status.clone().unwrap_or_default(),
            thumbnail_url: thumbnail,
            spend: metrics.spend,
            impressions: metrics.impressions,
            clicks: metrics.clicks,
            ctr: metrics.ctr,
            leads: metrics.leads,
            cpl: metrics.cpl,
            hook_rate: hook_rate(metrics.video_views_3s, metrics.impressions),
            hold_rate: hold_rate(metrics.video_views_100pct, metrics.video_views_3s),
            video_views_3s: metrics.video_views_3s,
            video_views_100pct: metrics.video_views_100pct,
        });
    }

    let synced = rows.len() as u64;
    db.writer()
        .call(move |conn| {
            let tx = conn.transaction()?;
            for row in &rows {
                repository::upsert_ad(&tx, row)?;
            }
            tx.commit()?;
            Ok::<(), rusqlite::Error>(())
        })
        .await?;

    log::info!("Synced {synced} ads for {account_id} ({matched} with insights)");

    Ok(SyncReport {
        account_id: account_id.to_string(),
        ads_synced: synced,
        ads_with_insights: matched,
    })
}

use std::cmp::Ordering;

use chrono::{Duration, Utc};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::llm::{LlmClient, DEFAULT_MODEL};
use crate::settings::Settings;
use crate::storage::repository::{self, AdWithAnalysis};
use crate::storage::Database;

const REPORT_MAX_TOKENS: u32 = 1500;

pub const DEFAULT_REPORT_DAYS: i64 = 30;

/// Aggregates snapshotted into the report row at generation time.
///
/// The winner definition here (cpl > 0 and at/under target, no lead
/// requirement) and the blended average CPL (total spend / total leads)
/// deliberately differ from the analytics summary.
#[derive(Debug, Clone, Serialize)]
pub struct ReportStats {
    pub total_spend: f64,
    pub total_leads: i64,
    pub avg_cpl: f64,
    pub winners: usize,
    pub total: usize,
    pub cpl_target: f64,
    pub top5: Vec<AdWithAnalysis>,
    pub bottom5: Vec<AdWithAnalysis>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedReport {
    pub id: i64,
    pub data: ReportStats,
    pub narrative: String,
}

/// Compute the report aggregates over the spend-filtered ad set.
pub fn compute_report_stats(ads: &[AdWithAnalysis], cpl_target: f64) -> ReportStats {
    let total_spend: f64 = ads.iter().map(|a| a.ad.spend).sum();
    let total_leads: i64 = ads.iter().map(|a| a.ad.leads).sum();
    let winners = ads
        .iter()
        .filter(|a| a.ad.cpl > 0.0 && a.ad.cpl <= cpl_target)
        .count();
    let avg_cpl = if total_leads > 0 {
        total_spend / total_leads as f64
    } else {
        0.0
    };

    let mut top5: Vec<AdWithAnalysis> =
        ads.iter().filter(|a| a.ad.leads > 0).cloned().collect();
    top5.sort_by(|a, b| a.ad.cpl.partial_cmp(&b.ad.cpl).unwrap_or(Ordering::Equal));
    top5.truncate(5);

    let mut bottom5: Vec<AdWithAnalysis> =
        ads.iter().filter(|a| a.ad.spend > 20.0).cloned().collect();
    bottom5.sort_by(|a, b| b.ad.cpl.partial_cmp(&a.ad.cpl).unwrap_or(Ordering::Equal));
    bottom5.truncate(5);

    ReportStats {
        total_spend,
        total_leads,
        avg_cpl,
        winners,
        total: ads.len(),
        cpl_target,
        top5,
        bottom5,
    }
}

fn build_report_prompt(stats: &ReportStats, days: i64) -> String {
    let win_pct = if stats.total > 0 {
        (stats.winners as f64 / stats.total as f64 * 100.0).round() as i64
    } else {
        0
    };

    let top_lines: Vec<String> = stats
        .top5
        .iter()
        .map(|a| {
            format!(
                "- {}: {:.2} CPL, {} leads, {:.0} spend | Angle: {} | Stage: {}",
                a.ad.name,
                a.ad.cpl,
                a.ad.leads,
                a.ad.spend,
                a.messaging_angle.as_deref().unwrap_or("n/a"),
                a.funnel_stage.as_deref().unwrap_or("n/a"),
            )
        })
        .collect();
    let bottom_lines: Vec<String> = stats
        .bottom5
        .iter()
        .map(|a| {
            format!(
                "- {}: {:.2} CPL, {} leads, {:.0} spend | Angle: {}",
                a.ad.name,
                a.ad.cpl,
                a.ad.leads,
                a.ad.spend,
                a.messaging_angle.as_deref().unwrap_or("n/a"),
            )
        })
        .collect();

    format!(
        r#"You are a senior performance marketer specialized in B2C lead generation.

Analyze the performance data for the Meta Ads campaigns of the last {days} days:

SUMMARY:
- Total spend: {total_spend:.2}
- Total leads: {total_leads}
- Average CPL: {avg_cpl:.2} (target: {cpl_target})
- Win rate (CPL <= {cpl_target}): {winners}/{total} ({win_pct}%)

TOP 5 ADS BY CPL:
{top}

BOTTOM 5 ADS (most expensive):
{bottom}

Write a strategic report with:
1. **Executive Summary** (3-4 sentences)
2. **What is working** (with specific data)
3. **Critical problems to fix**
4. **3 priority actions for next week**
5. **Target audience insights** based on the winning angles

Be direct and concrete, use the data. Write like a senior consultant."#,
        days = days,
        total_spend = stats.total_spend,
        total_leads = stats.total_leads,
        avg_cpl = stats.avg_cpl,
        cpl_target = stats.cpl_target,
        winners = stats.winners,
        total = stats.total,
        win_pct = win_pct,
        top = top_lines.join("\n"),
        bottom = bottom_lines.join("\n"),
    )
}

/// Generate and persist a narrative report over the trailing window.
/// An LLM failure fails the whole operation; nothing is persisted.
pub async fn generate_report(
    db: &Database,
    llm: &LlmClient,
    account_id: Option<&str>,
    days: i64,
) -> Result<GeneratedReport> {
    let settings = Settings::load(db).await?;
    let api_key = settings.require_anthropic_key()?.to_string();

    let ads = {
        let account_id = account_id.map(str::to_string);
        db.reader()
            .call(move |conn| repository::list_ads_with_spend(conn, account_id.as_deref()))
            .await
            .map_err(|e| Error::Database(e.to_string()))?
    };

    let stats = compute_report_stats(&ads, settings.cpl_target);
    let prompt = build_report_prompt(&stats, days);
    let narrative = llm
        .complete(&api_key, DEFAULT_MODEL, REPORT_MAX_TOKENS, &prompt)
        .await?;

    let period_end = Utc::now();
    let period_start = period_end - Duration::days(days);
    let data = serde_json::to_string(&stats).map_err(|e| Error::Other(e.to_string()))?;

    let id = {
        let account = account_id.unwrap_or("all").to_string();
        let start = period_start.to_rfc3339();
        let end = period_end.to_rfc3339();
        let narrative = narrative.clone();
        db.writer()
            .call(move |conn| {
                repository::insert_report(conn, &account, &start, &end, &data, &narrative)
            })
            .await
            .map_err(|e| Error::Database(e.to_string()))?
    };

    log::info!(
        "Generated report {id} for {} over {days} days",
        account_id.unwrap_or("all")
    );

    Ok(GeneratedReport {
        id,
        data: stats,
        narrative,
    })
}

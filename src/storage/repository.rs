use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

// ── Settings ───────────────────────────────────────────────────────

pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT value FROM app_settings WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO app_settings (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))",
        params![key, value],
    )?;
    Ok(())
}

pub fn list_settings(conn: &Connection) -> Result<Vec<(String, String)>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT key, value FROM app_settings ORDER BY key")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

// ── Ad Accounts ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct AdAccount {
    pub account_id: String,
    pub name: String,
    pub currency: String,
    pub added_at: String,
}

pub fn upsert_account(
    conn: &Connection,
    account_id: &str,
    name: &str,
    currency: &str,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO dim_ad_accounts (account_id, name, currency, added_at)
         VALUES (?1, ?2, ?3, datetime('now'))
         ON CONFLICT(account_id) DO UPDATE SET
           name = excluded.name, currency = excluded.currency",
        params![account_id, name, currency],
    )?;
    Ok(())
}

pub fn list_accounts(conn: &Connection) -> Result<Vec<AdAccount>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT account_id, name, currency, added_at
         FROM dim_ad_accounts ORDER BY added_at",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(AdAccount {
            account_id: row.get(0)?,
            name: row.get(1)?,
            currency: row.get(2)?,
            added_at: row.get(3)?,
        })
    })?;
    rows.collect()
}

pub fn get_account(
    conn: &Connection,
    account_id: &str,
) -> Result<Option<AdAccount>, rusqlite::Error> {
    conn.query_row(
        "SELECT account_id, name, currency, added_at
         FROM dim_ad_accounts WHERE account_id = ?1",
        params![account_id],
        |row| {
            Ok(AdAccount {
                account_id: row.get(0)?,
                name: row.get(1)?,
                currency: row.get(2)?,
                added_at: row.get(3)?,
            })
        },
    )
    .optional()
}

/// Delete the account row only. Cached ads for the account are retained so
/// historical analytics keep working after removal.
pub fn remove_account(conn: &Connection, account_id: &str) -> Result<bool, rusqlite::Error> {
    let count = conn.execute(
        "DELETE FROM dim_ad_accounts WHERE account_id = ?1",
        params![account_id],
    )?;
    Ok(count > 0)
}

// ── Ads ────────────────────────────────────────────────────────────

/// One synced ad snapshot. Full-row replace on every sync.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AdRow {
    pub ad_id: String,
    pub account_id: String,
    pub name: String,
    pub status: String,
    pub thumbnail_url: String,
    pub spend: f64,
    pub impressions: i64,
    pub clicks: i64,
    pub ctr: f64,
    pub leads: i64,
    pub cpl: f64,
    pub hook_rate: f64,
    pub hold_rate: f64,
    pub video_views_3s: i64,
    pub video_views_100pct: i64,
}

pub fn upsert_ad(conn: &Connection, ad: &AdRow) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO fact_ads (
            ad_id, account_id, name, status, thumbnail_url,
            spend, impressions, clicks, ctr, leads, cpl,
            hook_rate, hold_rate, video_views_3s, video_views_100pct, synced_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, datetime('now'))
        ON CONFLICT(ad_id) DO UPDATE SET
            account_id=excluded.account_id, name=excluded.name, status=excluded.status,
            thumbnail_url=excluded.thumbnail_url, spend=excluded.spend,
            impressions=excluded.impressions, clicks=excluded.clicks, ctr=excluded.ctr,
            leads=excluded.leads, cpl=excluded.cpl, hook_rate=excluded.hook_rate,
            hold_rate=excluded.hold_rate, video_views_3s=excluded.video_views_3s,
            video_views_100pct=excluded.video_views_100pct, synced_at=excluded.synced_at",
        params![
            ad.ad_id,
            ad.account_id,
            ad.name,
            ad.status,
            ad.thumbnail_url,
            ad.spend,
            ad.impressions,
            ad.clicks,
            ad.ctr,
            ad.leads,
            ad.cpl,
            ad.hook_rate,
            ad.hold_rate,
            ad.video_views_3s,
            ad.video_views_100pct,
        ],
    )?;
    Ok(())
}

pub fn get_ad(conn: &Connection, ad_id: &str) -> Result<Option<AdRow>, rusqlite::Error> {
    conn.query_row(
        "SELECT ad_id, account_id, name, status, thumbnail_url,
                spend, impressions, clicks, ctr, leads, cpl,
                hook_rate, hold_rate, video_views_3s, video_views_100pct
         FROM fact_ads WHERE ad_id = ?1",
        params![ad_id],
        ad_row_from,
    )
    .optional()
}

fn ad_row_from(row: &rusqlite::Row<'_>) -> Result<AdRow, rusqlite::Error> {
    Ok(AdRow {
        ad_id: row.get(0)?,
        account_id: row.get(1)?,
        name: row.get(2)?,
        status: row.get(3)?,
        thumbnail_url: row.get(4)?,
        spend: row.get(5)?,
        impressions: row.get(6)?,
        clicks: row.get(7)?,
        ctr: row.get(8)?,
        leads: row.get(9)?,
        cpl: row.get(10)?,
        hook_rate: row.get(11)?,
        hold_rate: row.get(12)?,
        video_views_3s: row.get(13)?,
        video_views_100pct: row.get(14)?,
    })
}

/// An ad joined with its (optional) analysis. List columns stay as the
/// stored JSON strings; the front end decodes them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AdWithAnalysis {
    #[serde(flatten)]
    pub ad: AdRow,
    pub synced_at: Option<String>,
    pub asset_type: Option<String>,
    pub visual_format: Option<String>,
    pub messaging_angle: Option<String>,
    pub hook_tactic: Option<String>,
    pub offer_type: Option<String>,
    pub funnel_stage: Option<String>,
    pub ai_summary: Option<String>,
    pub strengths: Option<String>,
    pub improvements: Option<String>,
    pub iterations: Option<String>,
}

const AD_ANALYSIS_SELECT: &str = "SELECT a.ad_id, a.account_id, a.name, a.status, a.thumbnail_url,
        a.spend, a.impressions, a.clicks, a.ctr, a.leads, a.cpl,
        a.hook_rate, a.hold_rate, a.video_views_3s, a.video_views_100pct, a.synced_at,
        an.asset_type, an.visual_format, an.messaging_angle, an.hook_tactic,
        an.offer_type, an.funnel_stage, an.ai_summary, an.strengths,
        an.improvements, an.iterations
 FROM fact_ads a
 LEFT JOIN fact_ad_analyses an ON an.ad_id = a.ad_id";

fn ad_with_analysis_from(row: &rusqlite::Row<'_>) -> Result<AdWithAnalysis, rusqlite::Error> {
    Ok(AdWithAnalysis {
        ad: AdRow {
            ad_id: row.get(0)?,
            account_id: row.get(1)?,
            name: row.get(2)?,
            status: row.get(3)?,
            thumbnail_url: row.get(4)?,
            spend: row.get(5)?,
            impressions: row.get(6)?,
            clicks: row.get(7)?,
            ctr: row.get(8)?,
            leads: row.get(9)?,
            cpl: row.get(10)?,
            hook_rate: row.get(11)?,
            hold_rate: row.get(12)?,
            video_views_3s: row.get(13)?,
            video_views_100pct: row.get(14)?,
        },
        synced_at: row.get(15)?,
        asset_type: row.get(16)?,
        visual_format: row.get(17)?,
        messaging_angle: row.get(18)?,
        hook_tactic: row.get(19)?,
        offer_type: row.get(20)?,
        funnel_stage: row.get(21)?,
        ai_summary: row.get(22)?,
        strengths: row.get(23)?,
        improvements: row.get(24)?,
        iterations: row.get(25)?,
    })
}

/// All cached ads (optionally account-filtered), analysis joined,
/// ordered by spend descending.
pub fn list_ads(
    conn: &Connection,
    account_id: Option<&str>,
) -> Result<Vec<AdWithAnalysis>, rusqlite::Error> {
    match account_id {
        Some(id) => {
            let sql = format!("{AD_ANALYSIS_SELECT} WHERE a.account_id = ?1 ORDER BY a.spend DESC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![id], ad_with_analysis_from)?;
            rows.collect()
        }
        None => {
            let sql = format!("{AD_ANALYSIS_SELECT} ORDER BY a.spend DESC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], ad_with_analysis_from)?;
            rows.collect()
        }
    }
}

/// Ads that have accrued spend, for the analytics and report paths.
pub fn list_ads_with_spend(
    conn: &Connection,
    account_id: Option<&str>,
) -> Result<Vec<AdWithAnalysis>, rusqlite::Error> {
    match account_id {
        Some(id) => {
            let sql =
                format!("{AD_ANALYSIS_SELECT} WHERE a.account_id = ?1 AND a.spend > 0");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![id], ad_with_analysis_from)?;
            rows.collect()
        }
        None => {
            let sql = format!("{AD_ANALYSIS_SELECT} WHERE a.spend > 0");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], ad_with_analysis_from)?;
            rows.collect()
        }
    }
}

// ── Reports ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub id: i64,
    pub account_id: String,
    pub period_start: String,
    pub period_end: String,
    pub data: String,
    pub narrative: String,
    pub created_at: String,
}

pub fn insert_report(
    conn: &Connection,
    account_id: &str,
    period_start: &str,
    period_end: &str,
    data: &str,
    narrative: &str,
) -> Result<i64, rusqlite::Error> {
    conn.execute(
        "INSERT INTO fact_reports (account_id, period_start, period_end, data, narrative)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![account_id, period_start, period_end, data, narrative],
    )?;
    Ok(conn.last_insert_rowid())
}

/// The newest reports, most recent first.
pub fn list_reports(conn: &Connection, limit: u32) -> Result<Vec<ReportRow>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT id, account_id, period_start, period_end, data, narrative, created_at
         FROM fact_reports ORDER BY created_at DESC, id DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], |row| {
        Ok(ReportRow {
            id: row.get(0)?,
            account_id: row.get(1)?,
            period_start: row.get(2)?,
            period_end: row.get(3)?,
            data: row.get(4)?,
            narrative: row.get(5)?,
            created_at: row.get(6)?,
        })
    })?;
    rows.collect()
}

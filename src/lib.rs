pub mod analytics;
pub mod error;
pub mod llm;
pub mod meta;
pub mod server;
pub mod settings;
pub mod storage;
pub mod sync;

pub use analytics::{AnalyticsReport, RecommendationPolicy};
pub use error::{Error, Result};
pub use llm::agents::creative::CreativeAnalysis;
pub use llm::agents::report::{GeneratedReport, DEFAULT_REPORT_DAYS};
pub use llm::LlmClient;
pub use meta::MetaClient;
pub use settings::{Settings, SettingsUpdate};
pub use storage::Database;
pub use sync::SyncReport;

use std::collections::BTreeMap;

use serde::Serialize;

use meta::types::AccountInfo;
use storage::repository::{self, AdAccount, AdWithAnalysis, ReportRow};

/// Main entry point for the Meta Ads warehouse. The HTTP handlers and the
/// CLI both drive the same operations through this facade.
#[derive(Clone)]
pub struct MetaAdsDW {
    db: Database,
    meta: MetaClient,
    llm: LlmClient,
}

/// Row counts for the `status` command.
#[derive(Debug, Clone, Serialize)]
pub struct WarehouseStatus {
    pub accounts: i64,
    pub ads: i64,
    pub analyses: i64,
    pub reports: i64,
}

impl MetaAdsDW {
    pub fn new(db: Database, meta: MetaClient, llm: LlmClient) -> Self {
        Self { db, meta, llm }
    }

    /// Construct with production API endpoints and a shared HTTP client.
    pub fn with_defaults(db: Database) -> Self {
        let http = reqwest::Client::new();
        Self {
            db,
            meta: MetaClient::new(http.clone()),
            llm: LlmClient::new(http),
        }
    }

    /// Access the database (for direct queries in the CLI).
    pub fn db(&self) -> &Database {
        &self.db
    }

    // ── Settings ───────────────────────────────────────────────────

    /// The known settings keys with their stored values, `""` when unset.
    pub async fn settings(&self) -> Result<BTreeMap<String, String>> {
        self.db
            .reader()
            .call(|conn| {
                let mut out = BTreeMap::new();
                for key in settings::KNOWN_KEYS {
                    let value = repository::get_setting(conn, key)?.unwrap_or_default();
                    out.insert(key.to_string(), value);
                }
                Ok::<BTreeMap<String, String>, rusqlite::Error>(out)
            })
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    /// Persist whichever keys the update carries. Absent keys are untouched.
    pub async fn update_settings(&self, update: SettingsUpdate) -> Result<()> {
        self.db
            .writer()
            .call(move |conn| {
                for (key, value) in update.entries() {
                    repository::set_setting(conn, key, &value)?;
                }
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    pub async fn setting(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.db
            .reader()
            .call(move |conn| repository::get_setting(conn, &key))
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let key = key.to_string();
        let value = value.to_string();
        self.db
            .writer()
            .call(move |conn| repository::set_setting(conn, &key, &value))
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    pub async fn list_settings(&self) -> Result<Vec<(String, String)>> {
        self.db
            .reader()
            .call(|conn| repository::list_settings(conn))
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    // ── Accounts ───────────────────────────────────────────────────

    /// Ad accounts visible to the configured token (Graph API proxy).
    pub async fn list_meta_accounts(&self) -> Result<Vec<AccountInfo>> {
        let settings = Settings::load(&self.db).await?;
        let token = settings.require_meta_token()?;
        self.meta.list_ad_accounts(token).await
    }

    /// Register an account by external id: fetch its canonical name and
    /// currency, persist it, and run an immediate full sync of its ads.
    pub async fn add_account(&self, external_id: &str) -> Result<(AccountInfo, SyncReport)> {
        let settings = Settings::load(&self.db).await?;
        let token = settings.require_meta_token()?.to_string();

        let info = self.meta.get_account(&token, external_id).await?;
        {
            let info = info.clone();
            self.db
                .writer()
                .call(move |conn| {
                    repository::upsert_account(
                        conn,
                        &info.id,
                        &info.name,
                        info.currency.as_deref().unwrap_or(""),
                    )
                })
                .await
                .map_err(|e| Error::Database(e.to_string()))?;
        }

        let report = sync::syncer::sync_account_ads(&self.db, &self.meta, &info.id, &token).await?;
        Ok((info, report))
    }

    pub async fn accounts(&self) -> Result<Vec<AdAccount>> {
        self.db
            .reader()
            .call(|conn| repository::list_accounts(conn))
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    /// Remove the registration only; the account's cached ads are retained.
    pub async fn remove_account(&self, account_id: &str) -> Result<bool> {
        let account_id = account_id.to_string();
        self.db
            .writer()
            .call(move |conn| repository::remove_account(conn, &account_id))
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    // ── Sync ───────────────────────────────────────────────────────

    /// Resync a registered account's ads for the trailing window.
    pub async fn sync_account(&self, account_id: &str) -> Result<SyncReport> {
        let registered = {
            let account_id = account_id.to_string();
            self.db
                .reader()
                .call(move |conn| repository::get_account(conn, &account_id))
                .await
                .map_err(|e| Error::Database(e.to_string()))?
        };
        if registered.is_none() {
            return Err(Error::NotFound(format!("account {account_id}")));
        }

        let settings = Settings::load(&self.db).await?;
        let token = settings.require_meta_token()?;
        sync::syncer::sync_account_ads(&self.db, &self.meta, account_id, token).await
    }

    // ── Ads & analysis ─────────────────────────────────────────────

    /// Cached ads with analysis joined, spend descending.
    pub async fn ads(&self, account_id: Option<&str>) -> Result<Vec<AdWithAnalysis>> {
        let account_id = account_id.map(str::to_string);
        self.db
            .reader()
            .call(move |conn| repository::list_ads(conn, account_id.as_deref()))
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    pub async fn analyze_ad(&self, ad_id: &str) -> Result<CreativeAnalysis> {
        llm::agents::creative::analyze_ad(&self.db, &self.llm, ad_id).await
    }

    /// Ids of ads still waiting for analysis. Query only; no LLM calls.
    pub async fn pending_analyses(&self, account_id: Option<&str>) -> Result<Vec<String>> {
        llm::agents::creative::pending_ad_ids(&self.db, account_id).await
    }

    // ── Analytics & reports ────────────────────────────────────────

    pub async fn analytics(&self, account_id: Option<&str>) -> Result<AnalyticsReport> {
        analytics::compute_analytics(&self.db, account_id).await
    }

    pub async fn generate_report(
        &self,
        account_id: Option<&str>,
        days: i64,
    ) -> Result<GeneratedReport> {
        llm::agents::report::generate_report(&self.db, &self.llm, account_id, days).await
    }

    pub async fn reports(&self) -> Result<Vec<ReportRow>> {
        self.db
            .reader()
            .call(|conn| repository::list_reports(conn, 10))
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    // ── Status ─────────────────────────────────────────────────────

    pub async fn status(&self) -> Result<WarehouseStatus> {
        self.db
            .reader()
            .call(|conn| {
                let count = |table: &str| -> std::result::Result<i64, rusqlite::Error> {
                    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                        row.get(0)
                    })
                };
                Ok::<WarehouseStatus, rusqlite::Error>(WarehouseStatus {
                    accounts: count("dim_ad_accounts")?,
                    ads: count("fact_ads")?,
                    analyses: count("fact_ad_analyses")?,
                    reports: count("fact_reports")?,
                })
            })
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }
}

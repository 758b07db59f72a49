pub mod types;

use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use types::{AccountInfo, AdEntry, InsightRow, Page};

const META_BASE_URL: &str = "https://graph.facebook.com/v19.0";

/// Fixed trailing window for ads and insights fetches.
const DATE_PRESET: &str = "last_90d";

/// First-page item cap. Pagination past the first page is out of scope.
pub const PAGE_LIMIT: &str = "200";

const ADS_FIELDS: &str = "id,name,status,creative{thumbnail_url,video_id}";
const INSIGHTS_FIELDS: &str = "ad_id,spend,impressions,clicks,ctr,actions,\
cost_per_action_type,video_thruplay_watched_actions,video_p25_watched_actions";

/// Read-only client for the Meta Graph API endpoints the warehouse consumes.
/// Holds no token: the bearer token is request data, read from settings at
/// each call site.
#[derive(Clone)]
pub struct MetaClient {
    http: reqwest::Client,
    base_url: String,
}

impl MetaClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: META_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different base URL (for tests).
    pub fn with_base_url(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        log::debug!("GET {url}");

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;

        let body: serde_json::Value = response.json().await?;

        // The Graph API reports failures in the payload; surface its message
        // rather than the transport status.
        if let Some(error) = body.get("error") {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown Graph API error")
                .to_string();
            return Err(Error::MetaApi(message));
        }

        serde_json::from_value(body).map_err(|e| Error::MetaApi(format!("unexpected response: {e}")))
    }

    /// List the ad accounts visible to the token holder.
    pub async fn list_ad_accounts(&self, token: &str) -> Result<Vec<AccountInfo>> {
        let page: Page<AccountInfo> = self
            .get(
                "/me/adaccounts",
                token,
                &[("fields", "id,name,currency,account_status")],
            )
            .await?;
        Ok(page.data)
    }

    /// Fetch the canonical name and currency for a single account.
    pub async fn get_account(&self, token: &str, account_id: &str) -> Result<AccountInfo> {
        let path = format!("/{account_id}");
        self.get(&path, token, &[("fields", "id,name,currency")])
            .await
    }

    /// First page of the account's ads with creative thumbnail references.
    pub async fn list_ads(&self, token: &str, account_id: &str) -> Result<Vec<AdEntry>> {
        let path = format!("/{}/ads", act_id(account_id));
        let page: Page<AdEntry> = self
            .get(
                &path,
                token,
                &[
                    ("fields", ADS_FIELDS),
                    ("date_preset", DATE_PRESET),
                    ("limit", PAGE_LIMIT),
                ],
            )
            .await?;
        Ok(page.data)
    }

    /// First page of ad-level insights for the account.
    pub async fn list_insights(&self, token: &str, account_id: &str) -> Result<Vec<InsightRow>> {
        let path = format!("/{}/insights", act_id(account_id));
        let page: Page<InsightRow> = self
            .get(
                &path,
                token,
                &[
                    ("fields", INSIGHTS_FIELDS),
                    ("date_preset", DATE_PRESET),
                    ("level", "ad"),
                    ("limit", PAGE_LIMIT),
                ],
            )
            .await?;
        Ok(page.data)
    }
}

/// Ad and insights endpoints address accounts as `act_<id>`; account ids may
/// arrive with or without the prefix.
pub(crate) fn act_id(account_id: &str) -> String {
    if account_id.starts_with("act_") {
        account_id.to_string()
    } else {
        format!("act_{account_id}")
    }
}

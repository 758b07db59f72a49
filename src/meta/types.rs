use serde::{Deserialize, Serialize};

/// Graph API list envelope. Paging cursors are ignored: only the first page
/// (up to `PAGE_LIMIT` items) is consumed.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// An ad account as returned by `/me/adaccounts` or `/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_status: Option<i64>,
}

/// An ad with its creative thumbnail reference.
#[derive(Debug, Clone, Deserialize)]
pub struct AdEntry {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub creative: Option<Creative>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Creative {
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub video_id: Option<String>,
}

/// One `{action_type, value}` entry from an action-breakdown array.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionStat {
    #[serde(default)]
    pub action_type: String,
    #[serde(default)]
    pub value: Option<String>,
}

/// Ad-level insights row. The Graph API serializes every numeric metric as
/// a string; values parse with a zero default.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InsightRow {
    #[serde(default)]
    pub ad_id: String,
    #[serde(default)]
    pub spend: Option<String>,
    #[serde(default)]
    pub impressions: Option<String>,
    #[serde(default)]
    pub clicks: Option<String>,
    #[serde(default)]
    pub ctr: Option<String>,
    #[serde(default)]
    pub actions: Vec<ActionStat>,
    #[serde(default)]
    pub cost_per_action_type: Vec<ActionStat>,
    #[serde(default)]
    pub video_thruplay_watched_actions: Vec<ActionStat>,
    #[serde(default)]
    pub video_p25_watched_actions: Vec<ActionStat>,
}

/// Action types counted as a lead conversion.
pub const LEAD_ACTION_TYPES: &[&str] = &["lead", "onsite_conversion.lead_grouped"];

/// Action type carried by the video-view milestone arrays.
pub const VIDEO_VIEW_ACTION_TYPE: &[&str] = &["video_view"];

/// Scan an action-breakdown array for the first entry whose `action_type`
/// matches one of `tags`, in upstream order. Duplicate tags are not
/// deduplicated upstream; the first match wins.
pub fn first_action_value(actions: &[ActionStat], tags: &[&str]) -> f64 {
    actions
        .iter()
        .find(|a| tags.contains(&a.action_type.as_str()))
        .map(|a| parse_metric(a.value.as_deref()))
        .unwrap_or(0.0)
}

/// Parse a string-typed Graph API metric, defaulting to zero when the field
/// is absent or unparseable.
pub fn parse_metric(value: Option<&str>) -> f64 {
    value.and_then(|v| v.parse::<f64>().ok()).unwrap_or(0.0)
}

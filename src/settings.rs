use serde::Deserialize;

use crate::error::{Error, Result};
use crate::storage::{repository, Database};

pub const KEY_META_TOKEN: &str = "meta_token";
pub const KEY_ANTHROPIC_KEY: &str = "anthropic_key";
pub const KEY_CPL_TARGET: &str = "cpl_target";
pub const KEY_WINNER_THRESHOLD_TYPE: &str = "winner_threshold_type";

/// The keys the settings API reads and writes.
pub const KNOWN_KEYS: &[&str] = &[
    KEY_META_TOKEN,
    KEY_ANTHROPIC_KEY,
    KEY_CPL_TARGET,
    KEY_WINNER_THRESHOLD_TYPE,
];

pub const DEFAULT_CPL_TARGET: f64 = 50.0;

/// Snapshot of the persisted settings, loaded once at the request boundary
/// and passed down so no operation reads mutable configuration mid-flight.
#[derive(Debug, Clone)]
pub struct Settings {
    pub meta_token: Option<String>,
    pub anthropic_key: Option<String>,
    pub cpl_target: f64,
    pub winner_threshold_type: Option<String>,
}

impl Settings {
    pub async fn load(db: &Database) -> Result<Self> {
        db.reader()
            .call(|conn| {
                let meta_token = repository::get_setting(conn, KEY_META_TOKEN)?;
                let anthropic_key = repository::get_setting(conn, KEY_ANTHROPIC_KEY)?;
                let cpl_target = repository::get_setting(conn, KEY_CPL_TARGET)?;
                let winner_threshold_type =
                    repository::get_setting(conn, KEY_WINNER_THRESHOLD_TYPE)?;
                Ok::<Settings, rusqlite::Error>(Settings {
                    meta_token: meta_token.filter(|v| !v.is_empty()),
                    anthropic_key: anthropic_key.filter(|v| !v.is_empty()),
                    cpl_target: parse_cpl_target(cpl_target.as_deref()),
                    winner_threshold_type,
                })
            })
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    pub fn require_meta_token(&self) -> Result<&str> {
        self.meta_token
            .as_deref()
            .ok_or_else(|| Error::Config("Meta access token not configured".into()))
    }

    pub fn require_anthropic_key(&self) -> Result<&str> {
        self.anthropic_key
            .as_deref()
            .ok_or_else(|| Error::Config("Anthropic API key not configured".into()))
    }
}

/// Partial settings write: only the keys present in the request are stored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsUpdate {
    pub meta_token: Option<String>,
    pub anthropic_key: Option<String>,
    pub cpl_target: Option<serde_json::Value>,
    pub winner_threshold_type: Option<String>,
}

impl SettingsUpdate {
    /// (key, value) pairs to persist. The target may arrive as a JSON number
    /// or string; either way it is stored as text and parsed at read time.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        if let Some(v) = &self.meta_token {
            out.push((KEY_META_TOKEN, v.clone()));
        }
        if let Some(v) = &self.anthropic_key {
            out.push((KEY_ANTHROPIC_KEY, v.clone()));
        }
        if let Some(v) = &self.cpl_target {
            let value = match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            out.push((KEY_CPL_TARGET, value));
        }
        if let Some(v) = &self.winner_threshold_type {
            out.push((KEY_WINNER_THRESHOLD_TYPE, v.clone()));
        }
        out
    }
}

/// Numeric target parsed at read time; unset or unparseable values fall back
/// to the default.
fn parse_cpl_target(value: Option<&str>) -> f64 {
    value
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(DEFAULT_CPL_TARGET)
}

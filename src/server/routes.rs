use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::Result;
use crate::meta::types::AccountInfo;
use crate::settings::SettingsUpdate;
use crate::storage::repository::{AdAccount, AdWithAnalysis, ReportRow};
use crate::{AnalyticsReport, MetaAdsDW};

#[derive(Debug, Deserialize)]
pub(super) struct AccountQuery {
    account_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct AddAccountBody {
    account_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct AnalyzeAllBody {
    account_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct GenerateReportBody {
    account_id: Option<String>,
    days: Option<i64>,
}

/// `all` (the front end's unfiltered choice) and empty values mean no filter.
fn account_filter(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .filter(|v| !v.is_empty() && *v != "all")
}

pub(super) async fn get_settings(
    State(dw): State<MetaAdsDW>,
) -> Result<Json<BTreeMap<String, String>>> {
    Ok(Json(dw.settings().await?))
}

pub(super) async fn post_settings(
    State(dw): State<MetaAdsDW>,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<Value>> {
    dw.update_settings(update).await?;
    Ok(Json(json!({ "ok": true })))
}

pub(super) async fn list_meta_accounts(
    State(dw): State<MetaAdsDW>,
) -> Result<Json<Vec<AccountInfo>>> {
    Ok(Json(dw.list_meta_accounts().await?))
}

pub(super) async fn add_account(
    State(dw): State<MetaAdsDW>,
    Json(body): Json<AddAccountBody>,
) -> Result<Json<Value>> {
    let (account, report) = dw.add_account(&body.account_id).await?;
    Ok(Json(json!({
        "ok": true,
        "account": account,
        "synced": report.ads_synced,
    })))
}

pub(super) async fn list_accounts(
    State(dw): State<MetaAdsDW>,
) -> Result<Json<Vec<AdAccount>>> {
    Ok(Json(dw.accounts().await?))
}

pub(super) async fn remove_account(
    State(dw): State<MetaAdsDW>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    dw.remove_account(&id).await?;
    Ok(Json(json!({ "ok": true })))
}

pub(super) async fn sync_account(
    State(dw): State<MetaAdsDW>,
    Path(account_id): Path<String>,
) -> Result<Json<Value>> {
    let report = dw.sync_account(&account_id).await?;
    Ok(Json(json!({ "ok": true, "synced": report.ads_synced })))
}

pub(super) async fn list_ads(
    State(dw): State<MetaAdsDW>,
    Query(query): Query<AccountQuery>,
) -> Result<Json<Vec<AdWithAnalysis>>> {
    Ok(Json(dw.ads(account_filter(&query.account_id)).await?))
}

pub(super) async fn analyze_ad(
    State(dw): State<MetaAdsDW>,
    Path(ad_id): Path<String>,
) -> Result<Json<Value>> {
    let analysis = dw.analyze_ad(&ad_id).await?;
    Ok(Json(json!({ "ok": true, "analysis": analysis })))
}

pub(super) async fn analyze_all(
    State(dw): State<MetaAdsDW>,
    Json(body): Json<AnalyzeAllBody>,
) -> Result<Json<Value>> {
    let ids = dw.pending_analyses(account_filter(&body.account_id)).await?;
    Ok(Json(json!({ "queued": ids.len(), "ids": ids })))
}

pub(super) async fn analytics(
    State(dw): State<MetaAdsDW>,
    Query(query): Query<AccountQuery>,
) -> Result<Json<AnalyticsReport>> {
    Ok(Json(dw.analytics(account_filter(&query.account_id)).await?))
}

pub(super) async fn generate_report(
    State(dw): State<MetaAdsDW>,
    Json(body): Json<GenerateReportBody>,
) -> Result<Json<Value>> {
    let days = body.days.unwrap_or(crate::DEFAULT_REPORT_DAYS);
    let report = dw
        .generate_report(account_filter(&body.account_id), days)
        .await?;
    Ok(Json(json!({
        "ok": true,
        "data": report.data,
        "insights": report.narrative,
    })))
}

pub(super) async fn list_reports(
    State(dw): State<MetaAdsDW>,
) -> Result<Json<Vec<ReportRow>>> {
    Ok(Json(dw.reports().await?))
}

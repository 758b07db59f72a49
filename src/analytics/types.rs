use serde::Serialize;

use crate::storage::repository::AdWithAnalysis;

/// Headline numbers over the analyzed ad set.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalyticsSummary {
    pub total: usize,
    pub winners: usize,
    /// Rounded percentage of ads that are winners.
    pub win_rate: i64,
    /// Average CPL over ads with cpl > 0.
    pub avg_cpl: f64,
    pub total_spend: f64,
    pub total_leads: i64,
    pub cpl_target: f64,
}

/// Aggregates for one category value within a breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct GroupBreakdown {
    pub name: String,
    pub count: usize,
    pub winners: usize,
    pub win_rate: i64,
    pub spend: f64,
    pub leads: i64,
    /// Average CPL over members with leads > 0 and cpl > 0.
    pub avg_cpl: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationTag {
    Kill,
    Scale,
    Watch,
}

/// An ad with its kill/scale/watch verdict and the reason behind it.
#[derive(Debug, Clone, Serialize)]
pub struct AdRecommendation {
    #[serde(flatten)]
    pub ad: AdWithAnalysis,
    pub recommendation: RecommendationTag,
    pub reason: String,
}

/// Recommendations bucketed by the funnel stage that drove the rule set.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FunnelRecommendations {
    pub top_of_funnel: Vec<AdRecommendation>,
    pub middle_of_funnel: Vec<AdRecommendation>,
    pub bottom_of_funnel: Vec<AdRecommendation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsReport {
    pub summary: AnalyticsSummary,
    pub by_asset_type: Vec<GroupBreakdown>,
    pub by_messaging_angle: Vec<GroupBreakdown>,
    pub by_hook_tactic: Vec<GroupBreakdown>,
    pub by_funnel_stage: Vec<GroupBreakdown>,
    pub kill_scale_watch: FunnelRecommendations,
    /// High-spend underperformers worth iterating on first, spend descending.
    pub iteration_priority: Vec<AdWithAnalysis>,
}

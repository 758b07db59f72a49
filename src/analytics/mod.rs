pub mod types;

pub use types::*;

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::settings::Settings;
use crate::storage::repository::{self, AdWithAnalysis};
use crate::storage::Database;

/// Bucket label for ads whose analysis has no value for a category.
pub const UNCLASSIFIED: &str = "unclassified";

/// Thresholds driving the kill/scale/watch rules and the iteration-priority
/// filter. The defaults are the production values; they are collected here
/// so a tuning pass touches one place.
#[derive(Debug, Clone)]
pub struct RecommendationPolicy {
    /// Minimum spend before an ad gets a verdict at all.
    pub min_spend: f64,
    /// Cohort-average multiplier under which a metric counts as weak.
    pub below_avg: f64,
    /// Cohort-average multiplier over which a metric counts as strong.
    pub above_avg: f64,
    /// Mid-funnel kill: CPL above target times this.
    pub mof_cpl_over_target: f64,
    /// Bottom-funnel scale: CPL at or below target times this.
    pub bof_cpl_scale_target: f64,
    /// Bottom-funnel kill: CPL above target times this.
    pub bof_cpl_kill_target: f64,
    /// Bottom-funnel kill: spend above which zero leads is fatal.
    pub bof_kill_spend: f64,
    pub iteration_min_spend: f64,
    pub iteration_cpl_over_target: f64,
    pub iteration_no_lead_spend: f64,
    pub iteration_cap: usize,
}

impl Default for RecommendationPolicy {
    fn default() -> Self {
        Self {
            min_spend: 10.0,
            below_avg: 0.7,
            above_avg: 1.2,
            mof_cpl_over_target: 1.5,
            bof_cpl_scale_target: 0.8,
            bof_cpl_kill_target: 1.3,
            bof_kill_spend: 50.0,
            iteration_min_spend: 30.0,
            iteration_cpl_over_target: 1.2,
            iteration_no_lead_spend: 20.0,
            iteration_cap: 10,
        }
    }
}

/// A winner generated at least one lead at or under the target CPL.
/// An ad with cpl = 0 (no cost data) never qualifies, regardless of leads.
pub fn is_winner(leads: i64, cpl: f64, cpl_target: f64) -> bool {
    leads > 0 && cpl > 0.0 && cpl <= cpl_target
}

/// Funnel stage assigned by the analysis job, driving which rule set applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunnelStage {
    Top,
    Middle,
    Bottom,
}

impl FunnelStage {
    fn parse(value: Option<&str>) -> Option<Self> {
        match value {
            Some("Top of Funnel") => Some(Self::Top),
            Some("Middle of Funnel") => Some(Self::Middle),
            Some("Bottom of Funnel") => Some(Self::Bottom),
            _ => None,
        }
    }
}

/// Compute the full analytics report over the cached ads with spend,
/// optionally filtered to one account.
pub async fn compute_analytics(
    db: &Database,
    account_id: Option<&str>,
) -> Result<AnalyticsReport> {
    let settings = Settings::load(db).await?;
    let account_id = account_id.map(str::to_string);
    let ads = db
        .reader()
        .call(move |conn| repository::list_ads_with_spend(conn, account_id.as_deref()))
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

    Ok(compute(
        &ads,
        settings.cpl_target,
        &RecommendationPolicy::default(),
    ))
}

/// Pure aggregation over already-loaded rows. No state, no external calls.
pub fn compute(
    ads: &[AdWithAnalysis],
    cpl_target: f64,
    policy: &RecommendationPolicy,
) -> AnalyticsReport {
    let total = ads.len();
    let winners = ads
        .iter()
        .filter(|a| is_winner(a.ad.leads, a.ad.cpl, cpl_target))
        .count();
    let total_spend: f64 = ads.iter().map(|a| a.ad.spend).sum();
    let total_leads: i64 = ads.iter().map(|a| a.ad.leads).sum();

    let summary = AnalyticsSummary {
        total,
        winners,
        win_rate: win_rate(winners, total),
        avg_cpl: average_positive(ads.iter().map(|a| a.ad.cpl)),
        total_spend,
        total_leads,
        cpl_target,
    };

    let avg_hook_rate = average_positive(ads.iter().map(|a| a.ad.hook_rate));
    let avg_ctr = average_positive(ads.iter().map(|a| a.ad.ctr));

    AnalyticsReport {
        summary,
        by_asset_type: group_by(ads, cpl_target, |a| a.asset_type.as_deref()),
        by_messaging_angle: group_by(ads, cpl_target, |a| a.messaging_angle.as_deref()),
        by_hook_tactic: group_by(ads, cpl_target, |a| a.hook_tactic.as_deref()),
        by_funnel_stage: group_by(ads, cpl_target, |a| a.funnel_stage.as_deref()),
        kill_scale_watch: recommend(ads, cpl_target, policy, avg_hook_rate, avg_ctr),
        iteration_priority: iteration_priority(ads, cpl_target, policy),
    }
}

fn win_rate(winners: usize, total: usize) -> i64 {
    if total > 0 {
        (winners as f64 / total as f64 * 100.0).round() as i64
    } else {
        0
    }
}

/// Mean over the values that are > 0. The denominator floors at 1 so an
/// all-zero cohort yields 0 rather than a division by zero.
fn average_positive(values: impl Iterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for v in values {
        if v > 0.0 {
            sum += v;
            count += 1;
        }
    }
    sum / count.max(1) as f64
}

fn group_by<'a, F>(ads: &'a [AdWithAnalysis], cpl_target: f64, field: F) -> Vec<GroupBreakdown>
where
    F: Fn(&'a AdWithAnalysis) -> Option<&'a str>,
{
    struct Acc {
        count: usize,
        winners: usize,
        spend: f64,
        leads: i64,
        cpls: Vec<f64>,
    }

    let mut groups: BTreeMap<String, Acc> = BTreeMap::new();
    for ad in ads {
        let key = match field(ad) {
            Some(v) if !v.is_empty() => v,
            _ => UNCLASSIFIED,
        };
        let acc = groups.entry(key.to_string()).or_insert(Acc {
            count: 0,
            winners: 0,
            spend: 0.0,
            leads: 0,
            cpls: Vec::new(),
        });
        acc.count += 1;
        acc.spend += ad.ad.spend;
        acc.leads += ad.ad.leads;
        if ad.ad.leads > 0 && ad.ad.cpl > 0.0 {
            acc.cpls.push(ad.ad.cpl);
        }
        if is_winner(ad.ad.leads, ad.ad.cpl, cpl_target) {
            acc.winners += 1;
        }
    }

    let mut breakdowns: Vec<GroupBreakdown> = groups
        .into_iter()
        .map(|(name, acc)| GroupBreakdown {
            name,
            count: acc.count,
            winners: acc.winners,
            win_rate: win_rate(acc.winners, acc.count),
            spend: acc.spend,
            leads: acc.leads,
            avg_cpl: if acc.cpls.is_empty() {
                0.0
            } else {
                acc.cpls.iter().sum::<f64>() / acc.cpls.len() as f64
            },
        })
        .collect();
    breakdowns.sort_by(|a, b| b.spend.partial_cmp(&a.spend).unwrap_or(Ordering::Equal));
    breakdowns
}

fn recommend(
    ads: &[AdWithAnalysis],
    cpl_target: f64,
    policy: &RecommendationPolicy,
    avg_hook_rate: f64,
    avg_ctr: f64,
) -> FunnelRecommendations {
    let mut out = FunnelRecommendations::default();

    for ad in ads {
        let stage = match FunnelStage::parse(ad.funnel_stage.as_deref()) {
            Some(stage) => stage,
            None => continue,
        };
        if ad.ad.spend < policy.min_spend {
            continue;
        }

        let (recommendation, reason) = match stage {
            FunnelStage::Top => recommend_top(&ad.ad, policy, avg_hook_rate, avg_ctr),
            FunnelStage::Middle => recommend_middle(&ad.ad, policy, cpl_target, avg_ctr),
            FunnelStage::Bottom => recommend_bottom(&ad.ad, policy, cpl_target),
        };

        let entry = AdRecommendation {
            ad: ad.clone(),
            recommendation,
            reason,
        };
        match stage {
            FunnelStage::Top => out.top_of_funnel.push(entry),
            FunnelStage::Middle => out.middle_of_funnel.push(entry),
            FunnelStage::Bottom => out.bottom_of_funnel.push(entry),
        }
    }
    out
}

fn recommend_top(
    ad: &repository::AdRow,
    policy: &RecommendationPolicy,
    avg_hook_rate: f64,
    avg_ctr: f64,
) -> (RecommendationTag, String) {
    if ad.hook_rate < avg_hook_rate * policy.below_avg && ad.ctr < avg_ctr * policy.below_avg {
        (
            RecommendationTag::Kill,
            format!(
                "Hook rate {:.1}% and CTR {:.2}% below cohort average",
                ad.hook_rate, ad.ctr
            ),
        )
    } else if ad.hook_rate > avg_hook_rate * policy.above_avg
        || ad.ctr > avg_ctr * policy.above_avg
    {
        (
            RecommendationTag::Scale,
            format!("Hook rate {:.1}% or CTR above cohort average", ad.hook_rate),
        )
    } else {
        (
            RecommendationTag::Watch,
            "Metrics near cohort average, keep monitoring".to_string(),
        )
    }
}

fn recommend_middle(
    ad: &repository::AdRow,
    policy: &RecommendationPolicy,
    cpl_target: f64,
    avg_ctr: f64,
) -> (RecommendationTag, String) {
    if ad.ctr < avg_ctr * policy.below_avg
        && (ad.cpl > cpl_target * policy.mof_cpl_over_target || ad.leads == 0)
    {
        (
            RecommendationTag::Kill,
            format!("Low CTR and CPL {:.0} over target", ad.cpl),
        )
    } else if ad.ctr > avg_ctr * policy.above_avg && ad.cpl > 0.0 && ad.cpl <= cpl_target {
        (
            RecommendationTag::Scale,
            format!("Good CTR and CPL {:.0} under target", ad.cpl),
        )
    } else {
        (RecommendationTag::Watch, "Monitor CTR and CPL".to_string())
    }
}

fn recommend_bottom(
    ad: &repository::AdRow,
    policy: &RecommendationPolicy,
    cpl_target: f64,
) -> (RecommendationTag, String) {
    if ad.leads == 0 && ad.spend > policy.bof_kill_spend {
        (
            RecommendationTag::Kill,
            format!("{:.0} spent, 0 leads generated", ad.spend),
        )
    } else if ad.cpl > 0.0 && ad.cpl <= cpl_target * policy.bof_cpl_scale_target {
        (
            RecommendationTag::Scale,
            format!("Excellent CPL {:.0} (target {:.0})", ad.cpl, cpl_target),
        )
    } else if ad.cpl > cpl_target * policy.bof_cpl_kill_target {
        (
            RecommendationTag::Kill,
            format!("CPL {:.0} too high (target {:.0})", ad.cpl, cpl_target),
        )
    } else {
        (
            RecommendationTag::Watch,
            format!("CPL {:.0} close to target", ad.cpl),
        )
    }
}

/// High-spend ads that are missing the target: worth a creative iteration
/// before anything else. Spend descending, capped.
fn iteration_priority(
    ads: &[AdWithAnalysis],
    cpl_target: f64,
    policy: &RecommendationPolicy,
) -> Vec<AdWithAnalysis> {
    let mut picks: Vec<AdWithAnalysis> = ads
        .iter()
        .filter(|a| {
            a.ad.spend > policy.iteration_min_spend
                && (a.ad.cpl > cpl_target * policy.iteration_cpl_over_target
                    || (a.ad.spend > policy.iteration_no_lead_spend && a.ad.leads == 0))
        })
        .cloned()
        .collect();
    picks.sort_by(|a, b| b.ad.spend.partial_cmp(&a.ad.spend).unwrap_or(Ordering::Equal));
    picks.truncate(policy.iteration_cap);
    picks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::repository::{AdRow, AdWithAnalysis};

    fn ad(id: &str, spend: f64, leads: i64, cpl: f64) -> AdWithAnalysis {
        AdWithAnalysis {
            ad: AdRow {
                ad_id: id.to_string(),
                account_id: "act_1".to_string(),
                spend,
                leads,
                cpl,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn with_stage(mut a: AdWithAnalysis, stage: &str) -> AdWithAnalysis {
        a.funnel_stage = Some(stage.to_string());
        a
    }

    #[test]
    fn test_winner_predicate() {
        assert!(is_winner(1, 40.0, 50.0));
        assert!(is_winner(1, 50.0, 50.0));
        // Raising cpl above the target flips the verdict.
        assert!(!is_winner(1, 50.01, 50.0));
        // cpl = 0 never wins, regardless of leads.
        assert!(!is_winner(10, 0.0, 50.0));
        assert!(!is_winner(0, 40.0, 50.0));
    }

    #[test]
    fn test_summary_two_ads_scenario() {
        // target 50, A (leads=1, cpl=40), B (leads=0, cpl=0)
        let ads = vec![ad("a", 100.0, 1, 40.0), ad("b", 80.0, 0, 0.0)];
        let report = compute(&ads, 50.0, &RecommendationPolicy::default());

        assert_eq!(report.summary.total, 2);
        assert_eq!(report.summary.winners, 1);
        assert_eq!(report.summary.win_rate, 50);
        // avg_cpl excludes the cpl = 0 ad from the denominator.
        assert_eq!(report.summary.avg_cpl, 40.0);
        assert_eq!(report.summary.total_spend, 180.0);
        assert_eq!(report.summary.total_leads, 1);
    }

    #[test]
    fn test_average_positive_floors_denominator() {
        assert_eq!(average_positive([0.0, 0.0].into_iter()), 0.0);
        assert_eq!(average_positive([0.0, 10.0, 20.0].into_iter()), 15.0);
        assert_eq!(average_positive(std::iter::empty()), 0.0);
    }

    #[test]
    fn test_grouping_is_a_partition() {
        let mut a = ad("a", 10.0, 0, 0.0);
        a.asset_type = Some("UGC".to_string());
        let mut b = ad("b", 20.0, 0, 0.0);
        b.asset_type = Some("UGC".to_string());
        let mut c = ad("c", 25.0, 0, 0.0);
        c.asset_type = Some("Static Image".to_string());
        let d = ad("d", 5.0, 0, 0.0); // no analysis
        let mut e = ad("e", 1.0, 0, 0.0);
        e.asset_type = Some(String::new()); // empty value buckets as unclassified

        let ads = vec![a, b, c, d, e];
        let groups = group_by(&ads, 50.0, |x| x.asset_type.as_deref());

        let total: usize = groups.iter().map(|g| g.count).sum();
        assert_eq!(total, ads.len());

        let unclassified = groups.iter().find(|g| g.name == UNCLASSIFIED).unwrap();
        assert_eq!(unclassified.count, 2);

        // Sorted by spend descending.
        assert_eq!(groups[0].name, "UGC");
        assert_eq!(groups[0].spend, 30.0);
        assert_eq!(groups[1].name, "Static Image");
    }

    #[test]
    fn test_group_avg_cpl_excludes_zero_and_leadless() {
        let mut a = ad("a", 10.0, 2, 20.0);
        a.asset_type = Some("UGC".to_string());
        let mut b = ad("b", 10.0, 0, 99.0); // no leads: excluded from avg
        b.asset_type = Some("UGC".to_string());
        let mut c = ad("c", 10.0, 1, 0.0); // zero cpl: excluded
        c.asset_type = Some("UGC".to_string());

        let groups = group_by(&[a, b, c], 50.0, |x| x.asset_type.as_deref());
        assert_eq!(groups[0].avg_cpl, 20.0);
    }

    #[test]
    fn test_recommendations_total_for_qualifying_ads() {
        let stages = ["Top of Funnel", "Middle of Funnel", "Bottom of Funnel"];
        let mut ads = Vec::new();
        for (i, stage) in stages.iter().enumerate() {
            let mut a = ad(&format!("ad{i}"), 25.0, 1, 30.0);
            a.ad.hook_rate = 5.0;
            a.ad.ctr = 1.0;
            ads.push(with_stage(a, stage));
        }
        // Below the spend gate: no verdict.
        ads.push(with_stage(ad("cheap", 9.99, 0, 0.0), "Top of Funnel"));
        // No funnel stage: no verdict.
        ads.push(ad("unstaged", 500.0, 0, 0.0));

        let report = compute(&ads, 50.0, &RecommendationPolicy::default());
        let ksw = &report.kill_scale_watch;
        assert_eq!(ksw.top_of_funnel.len(), 1);
        assert_eq!(ksw.middle_of_funnel.len(), 1);
        assert_eq!(ksw.bottom_of_funnel.len(), 1);
    }

    #[test]
    fn test_top_of_funnel_rules() {
        let policy = RecommendationPolicy::default();
        // Cohort averages: hook 10.0, ctr 2.0
        let mut weak = AdRow {
            spend: 20.0,
            hook_rate: 6.0, // < 7.0
            ctr: 1.0,       // < 1.4
            ..Default::default()
        };
        let (tag, _) = recommend_top(&weak, &policy, 10.0, 2.0);
        assert_eq!(tag, RecommendationTag::Kill);

        weak.hook_rate = 13.0; // > 12.0
        let (tag, _) = recommend_top(&weak, &policy, 10.0, 2.0);
        assert_eq!(tag, RecommendationTag::Scale);

        weak.hook_rate = 9.0;
        weak.ctr = 1.9;
        let (tag, _) = recommend_top(&weak, &policy, 10.0, 2.0);
        assert_eq!(tag, RecommendationTag::Watch);
    }

    #[test]
    fn test_middle_of_funnel_rules() {
        let policy = RecommendationPolicy::default();
        let target = 50.0;
        // avg ctr 2.0
        let base = AdRow {
            spend: 20.0,
            ..Default::default()
        };

        let kill = AdRow {
            ctr: 1.0,  // < 1.4
            cpl: 80.0, // > 75
            leads: 1,
            ..base.clone()
        };
        let (tag, _) = recommend_middle(&kill, &policy, target, 2.0);
        assert_eq!(tag, RecommendationTag::Kill);

        let kill_no_leads = AdRow {
            ctr: 1.0,
            leads: 0,
            ..base.clone()
        };
        let (tag, _) = recommend_middle(&kill_no_leads, &policy, target, 2.0);
        assert_eq!(tag, RecommendationTag::Kill);

        let scale = AdRow {
            ctr: 2.5, // > 2.4
            cpl: 45.0,
            leads: 2,
            ..base.clone()
        };
        let (tag, _) = recommend_middle(&scale, &policy, target, 2.0);
        assert_eq!(tag, RecommendationTag::Scale);

        let watch = AdRow {
            ctr: 2.0,
            cpl: 60.0,
            leads: 1,
            ..base
        };
        let (tag, _) = recommend_middle(&watch, &policy, target, 2.0);
        assert_eq!(tag, RecommendationTag::Watch);
    }

    #[test]
    fn test_bottom_of_funnel_rules() {
        let policy = RecommendationPolicy::default();
        let target = 50.0;

        let burn = AdRow {
            spend: 60.0,
            leads: 0,
            ..Default::default()
        };
        let (tag, _) = recommend_bottom(&burn, &policy, target);
        assert_eq!(tag, RecommendationTag::Kill);

        let cheap = AdRow {
            spend: 30.0,
            leads: 3,
            cpl: 35.0, // <= 40
            ..Default::default()
        };
        let (tag, _) = recommend_bottom(&cheap, &policy, target);
        assert_eq!(tag, RecommendationTag::Scale);

        let expensive = AdRow {
            spend: 30.0,
            leads: 1,
            cpl: 70.0, // > 65
            ..Default::default()
        };
        let (tag, _) = recommend_bottom(&expensive, &policy, target);
        assert_eq!(tag, RecommendationTag::Kill);

        let near = AdRow {
            spend: 30.0,
            leads: 1,
            cpl: 55.0,
            ..Default::default()
        };
        let (tag, _) = recommend_bottom(&near, &policy, target);
        assert_eq!(tag, RecommendationTag::Watch);
    }

    #[test]
    fn test_iteration_priority_filter_sort_cap() {
        let policy = RecommendationPolicy::default();
        let target = 50.0;

        let mut ads = Vec::new();
        // Over-target cpl, qualifying spend.
        ads.push(ad("over", 40.0, 1, 70.0));
        // Zero leads with enough spend.
        ads.push(ad("dry", 35.0, 0, 0.0));
        // Performing fine: excluded.
        ads.push(ad("fine", 100.0, 5, 20.0));
        // Too little spend: excluded even with bad cpl.
        ads.push(ad("small", 25.0, 1, 90.0));
        // Fill past the cap with qualifying ads.
        for i in 0..12 {
            ads.push(ad(&format!("bulk{i}"), 50.0 + i as f64, 0, 0.0));
        }

        let picks = iteration_priority(&ads, target, &policy);
        assert_eq!(picks.len(), policy.iteration_cap);
        assert!(picks.iter().all(|a| a.ad.ad_id != "fine"));
        assert!(picks.iter().all(|a| a.ad.ad_id != "small"));
        // Spend descending.
        for pair in picks.windows(2) {
            assert!(pair[0].ad.spend >= pair[1].ad.spend);
        }
        assert_eq!(picks[0].ad.ad_id, "bulk11");
    }
}

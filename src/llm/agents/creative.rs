use serde::{Deserialize, Serialize};

use crate::analytics::is_winner;
use crate::error::{Error, Result};
use crate::llm::{extract_json_object, LlmClient, DEFAULT_MODEL};
use crate::settings::Settings;
use crate::storage::repository::{self, AdRow};
use crate::storage::Database;

const ANALYSIS_MAX_TOKENS: u32 = 1024;

/// Structured creative classification returned by the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreativeAnalysis {
    pub asset_type: String,
    pub visual_format: String,
    pub messaging_angle: String,
    pub hook_tactic: String,
    pub offer_type: String,
    pub funnel_stage: String,
    pub ai_summary: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
    #[serde(default)]
    pub iterations: Vec<IterationIdea>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationIdea {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub expected_impact: String,
}

/// Classify one cached ad with the LLM and replace its analysis row.
///
/// Malformed LLM output fails the call without a retry; the stale analysis
/// row (if any) is left untouched.
pub async fn analyze_ad(db: &Database, llm: &LlmClient, ad_id: &str) -> Result<CreativeAnalysis> {
    let settings = Settings::load(db).await?;
    let api_key = settings.require_anthropic_key()?.to_string();

    let ad = {
        let ad_id_owned = ad_id.to_string();
        db.reader()
            .call(move |conn| repository::get_ad(conn, &ad_id_owned))
            .await
            .map_err(|e| Error::Database(e.to_string()))?
            .ok_or_else(|| Error::NotFound(format!("ad {ad_id}")))?
    };

    let winner = is_winner(ad.leads, ad.cpl, settings.cpl_target);
    let prompt = build_analysis_prompt(&ad, settings.cpl_target, winner);

    let text = llm
        .complete(&api_key, DEFAULT_MODEL, ANALYSIS_MAX_TOKENS, &prompt)
        .await?;
    let analysis = parse_analysis(&text)?;

    store_analysis(db, ad_id, &analysis).await?;
    log::info!("Analyzed ad {ad_id}: {} / {}", analysis.asset_type, analysis.funnel_stage);
    Ok(analysis)
}

fn build_analysis_prompt(ad: &AdRow, cpl_target: f64, winner: bool) -> String {
    let performance = if winner { "WINNER" } else { "NEEDS OPTIMIZATION" };
    let thumbnail = if ad.thumbnail_url.is_empty() {
        "not available"
    } else {
        ad.thumbnail_url.as_str()
    };

    format!(
        r#"You are a performance marketing expert for lead-generation campaigns.

Analyze this Meta Ads creative:

Name: {name}
Status: {status}
Thumbnail URL: {thumbnail}

METRICS:
- Spend: {spend:.2}
- Impressions: {impressions}
- Clicks: {clicks}
- CTR: {ctr:.2}%
- Leads generated: {leads}
- CPL (cost per lead): {cpl:.2} (target: {cpl_target})
- Hook rate (3s): {hook_rate:.1}%
- Hold rate: {hold_rate:.1}%
- Performance: {performance}

Respond with ONLY a valid JSON object (no text outside the JSON):
{{
  "asset_type": "UGC | AI Avatar Video | Static Image | Carousel | Screen Recording",
  "visual_format": "Talking Head | Testimonial | Demo | Infographic | Lifestyle",
  "messaging_angle": "Fear of loss | Independence | Cost comparison | Authority/Expert | Results | Asset protection | Savings",
  "hook_tactic": "Provocative question | Shock statistic | Personal story | Common problem | Outcome promise | Contradiction",
  "offer_type": "Free webinar | Free consultation | Lead magnet | Demo | No offer",
  "funnel_stage": "Top of Funnel | Middle of Funnel | Bottom of Funnel",
  "ai_summary": "2-3 sentence summary of the ad and why it performs the way it does",
  "strengths": ["strength 1", "strength 2"],
  "improvements": ["improvement area 1", "improvement area 2"],
  "iterations": [
    {{
      "title": "Iteration 1",
      "description": "Concrete description of what to change",
      "expected_impact": "High | Medium | Low"
    }},
    {{
      "title": "Iteration 2",
      "description": "Second variant to test",
      "expected_impact": "High | Medium | Low"
    }}
  ]
}}"#,
        name = ad.name,
        status = ad.status,
        thumbnail = thumbnail,
        spend = ad.spend,
        impressions = ad.impressions,
        clicks = ad.clicks,
        ctr = ad.ctr,
        leads = ad.leads,
        cpl = ad.cpl,
        cpl_target = cpl_target,
        hook_rate = ad.hook_rate,
        hold_rate = ad.hold_rate,
        performance = performance,
    )
}

/// Parse the first JSON object out of the raw LLM text.
fn parse_analysis(text: &str) -> Result<CreativeAnalysis> {
    let json = extract_json_object(text).ok_or_else(|| {
        Error::MalformedAiResponse("no JSON object in LLM response".to_string())
    })?;
    serde_json::from_str(json)
        .map_err(|e| Error::MalformedAiResponse(format!("failed to parse LLM response: {e}")))
}

async fn store_analysis(db: &Database, ad_id: &str, analysis: &CreativeAnalysis) -> Result<()> {
    let ad_id = ad_id.to_string();
    let analysis = analysis.clone();
    let strengths = serde_json::to_string(&analysis.strengths).unwrap_or_default();
    let improvements = serde_json::to_string(&analysis.improvements).unwrap_or_default();
    let iterations = serde_json::to_string(&analysis.iterations).unwrap_or_default();

    db.writer()
        .call(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO fact_ad_analyses
                 (ad_id, asset_type, visual_format, messaging_angle, hook_tactic, offer_type,
                  funnel_stage, ai_summary, strengths, improvements, iterations, analyzed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, datetime('now'))",
                rusqlite::params![
                    ad_id,
                    analysis.asset_type,
                    analysis.visual_format,
                    analysis.messaging_angle,
                    analysis.hook_tactic,
                    analysis.offer_type,
                    analysis.funnel_stage,
                    analysis.ai_summary,
                    strengths,
                    improvements,
                    iterations,
                ],
            )?;
            Ok::<(), rusqlite::Error>(())
        })
        .await
        .map_err(|e| Error::Database(e.to_string()))
}

/// Ids of cached ads with no analysis row yet, optionally account-filtered.
/// A pure query: nothing here talks to the LLM, the caller decides what to
/// analyze and when.
pub async fn pending_ad_ids(db: &Database, account_id: Option<&str>) -> Result<Vec<String>> {
    let account_id = account_id.map(str::to_string);
    db.reader()
        .call(move |conn| {
            let mut sql = "SELECT a.ad_id FROM fact_ads a
                 LEFT JOIN fact_ad_analyses an ON an.ad_id = a.ad_id
                 WHERE an.ad_id IS NULL"
                .to_string();
            match account_id {
                Some(id) => {
                    sql.push_str(" AND a.account_id = ?1");
                    let mut stmt = conn.prepare(&sql)?;
                    let rows = stmt.query_map(rusqlite::params![id], |row| row.get(0))?;
                    rows.collect()
                }
                None => {
                    let mut stmt = conn.prepare(&sql)?;
                    let rows = stmt.query_map([], |row| row.get(0))?;
                    rows.collect()
                }
            }
        })
        .await
        .map_err(|e| Error::Database(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"Here is my analysis:
{
  "asset_type": "UGC",
  "visual_format": "Talking Head",
  "messaging_angle": "Authority/Expert",
  "hook_tactic": "Provocative question",
  "offer_type": "Free webinar",
  "funnel_stage": "Top of Funnel",
  "ai_summary": "Strong hook, weak close.",
  "strengths": ["good hook"],
  "improvements": ["tighten the CTA"],
  "iterations": [
    {"title": "Shorter cut", "description": "Trim to 15s", "expected_impact": "High"}
  ]
}"#;

    #[test]
    fn test_parse_analysis_with_surrounding_text() {
        let analysis = parse_analysis(SAMPLE).unwrap();
        assert_eq!(analysis.asset_type, "UGC");
        assert_eq!(analysis.funnel_stage, "Top of Funnel");
        assert_eq!(analysis.strengths, vec!["good hook"]);
        assert_eq!(analysis.iterations.len(), 1);
        assert_eq!(analysis.iterations[0].expected_impact, "High");
    }

    #[test]
    fn test_parse_analysis_rejects_non_json() {
        let err = parse_analysis("I could not analyze this ad.").unwrap_err();
        assert!(matches!(err, Error::MalformedAiResponse(_)));

        let err = parse_analysis("{\"asset_type\": 42}").unwrap_err();
        assert!(matches!(err, Error::MalformedAiResponse(_)));
    }

    #[test]
    fn test_prompt_embeds_metrics_and_winner_flag() {
        let ad = AdRow {
            ad_id: "ad1".into(),
            name: "Video A".into(),
            status: "ACTIVE".into(),
            spend: 100.0,
            impressions: 1000,
            leads: 4,
            cpl: 25.0,
            hook_rate: 10.0,
            hold_rate: 20.0,
            ..Default::default()
        };
        let prompt = build_analysis_prompt(&ad, 50.0, true);
        assert!(prompt.contains("Name: Video A"));
        assert!(prompt.contains("CPL (cost per lead): 25.00 (target: 50)"));
        assert!(prompt.contains("Performance: WINNER"));
        assert!(prompt.contains("Thumbnail URL: not available"));

        let prompt = build_analysis_prompt(&ad, 10.0, false);
        assert!(prompt.contains("Performance: NEEDS OPTIMIZATION"));
    }

    #[tokio::test]
    async fn test_pending_ad_ids_ignores_analyzed() {
        use crate::storage::Database;

        let db = Database::open_memory().await.unwrap();
        db.writer()
            .call(|conn| {
                for id in ["a1", "a2", "a3"] {
                    repository::upsert_ad(
                        conn,
                        &AdRow {
                            ad_id: id.into(),
                            account_id: "act_1".into(),
                            ..Default::default()
                        },
                    )?;
                }
                repository::upsert_ad(
                    conn,
                    &AdRow {
                        ad_id: "other".into(),
                        account_id: "act_2".into(),
                        ..Default::default()
                    },
                )?;
                conn.execute(
                    "INSERT INTO fact_ad_analyses (ad_id, asset_type) VALUES ('a2', 'UGC')",
                    [],
                )?;
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();

        let pending = pending_ad_ids(&db, Some("act_1")).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert!(pending.contains(&"a1".to_string()));
        assert!(pending.contains(&"a3".to_string()));

        let all = pending_ad_ids(&db, None).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_store_analysis_replaces_prior_row() {
        use crate::storage::Database;

        let db = Database::open_memory().await.unwrap();
        let analysis = parse_analysis(SAMPLE).unwrap();
        store_analysis(&db, "ad1", &analysis).await.unwrap();

        let mut second = analysis.clone();
        second.asset_type = "Carousel".to_string();
        store_analysis(&db, "ad1", &second).await.unwrap();

        let (count, asset_type, strengths): (i64, String, String) = db
            .reader()
            .call(|conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM fact_ad_analyses",
                    [],
                    |row| row.get(0),
                )?;
                let (asset_type, strengths) = conn.query_row(
                    "SELECT asset_type, strengths FROM fact_ad_analyses WHERE ad_id = 'ad1'",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;
                Ok::<(i64, String, String), rusqlite::Error>((count, asset_type, strengths))
            })
            .await
            .unwrap();

        assert_eq!(count, 1);
        assert_eq!(asset_type, "Carousel");
        let parsed: Vec<String> = serde_json::from_str(&strengths).unwrap();
        assert_eq!(parsed, vec!["good hook"]);
    }
}

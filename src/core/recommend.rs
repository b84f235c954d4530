// src/core/recommend.rs — Winner selection and tradeoff summary
//
// Advisory only: the output populates the experiment's recommendation
// fields and never causes a state transition by itself.

use serde_json::json;

use super::types::MetricScore;
use crate::evaluator::{METRIC_EDIT_QUALITY, METRIC_PUBLISH_READY, METRIC_STRUCTURAL_CLARITY};
use crate::infra::config::ScoringConfig;

/// Aggregates within this margin count as tied, so equal-weight integer
/// ties are exact and float noise cannot fake a strict win.
const TIE_EPSILON: f64 = 1e-9;

/// One scored run, as input to recommendation.
#[derive(Debug, Clone)]
pub struct ScoredRun {
    pub model_name: String,
    pub scores: Vec<MetricScore>,
    pub latency_ms: u64,
    pub cost_usd: f64,
}

#[derive(Debug, Clone)]
pub struct Recommendation {
    pub winning_model: String,
    pub reason: String,
    pub tradeoffs: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct RecommendationEngine {
    weights: ScoringConfig,
}

impl RecommendationEngine {
    pub fn new(weights: ScoringConfig) -> Self {
        Self { weights }
    }

    fn weight_for(&self, metric_name: &str) -> f64 {
        match metric_name {
            METRIC_EDIT_QUALITY => self.weights.edit_quality_weight,
            METRIC_STRUCTURAL_CLARITY => self.weights.structural_clarity_weight,
            METRIC_PUBLISH_READY => self.weights.publish_ready_weight,
            _ => 1.0,
        }
    }

    /// Weighted mean of a run's metric scores on the 1–5 scale.
    pub fn aggregate(&self, scores: &[MetricScore]) -> f64 {
        let mut total = 0.0;
        let mut weight_sum = 0.0;
        for s in scores {
            let w = self.weight_for(&s.metric_name);
            total += w * s.score as f64;
            weight_sum += w;
        }
        if weight_sum == 0.0 {
            0.0
        } else {
            total / weight_sum
        }
    }

    /// Pick the winner among scored runs. Ties break by lower cost, then
    /// lower latency, then input order — never randomly.
    pub fn recommend(&self, runs: &[ScoredRun]) -> Option<Recommendation> {
        if runs.is_empty() {
            return None;
        }

        let aggregates: Vec<f64> = runs.iter().map(|r| self.aggregate(&r.scores)).collect();

        let mut winner = 0;
        for idx in 1..runs.len() {
            if beats(aggregates[idx], &runs[idx], aggregates[winner], &runs[winner]) {
                winner = idx;
            }
        }

        let mut runner_up: Option<usize> = None;
        for idx in 0..runs.len() {
            if idx == winner {
                continue;
            }
            match runner_up {
                None => runner_up = Some(idx),
                Some(current) => {
                    if beats(aggregates[idx], &runs[idx], aggregates[current], &runs[current]) {
                        runner_up = Some(idx);
                    }
                }
            }
        }

        let win = &runs[winner];
        let reason = match runner_up {
            None => "Only successful run in the experiment.".to_string(),
            Some(up) => self.build_reason(win, aggregates[winner], &runs[up], aggregates[up]),
        };
        let tradeoffs = match runner_up {
            None => json!({}),
            Some(up) => json!({
                "runner_up": runs[up].model_name,
                "aggregate_delta": round2(aggregates[winner] - aggregates[up]),
                "cost_usd_delta": round6(win.cost_usd - runs[up].cost_usd),
                "latency_ms_delta": win.latency_ms as i64 - runs[up].latency_ms as i64,
            }),
        };

        Some(Recommendation {
            winning_model: win.model_name.clone(),
            reason,
            tradeoffs,
        })
    }

    /// Cite the strongest distinguishing metric, or the tie-break that
    /// decided an equal-aggregate contest.
    fn build_reason(
        &self,
        winner: &ScoredRun,
        winner_agg: f64,
        runner: &ScoredRun,
        runner_agg: f64,
    ) -> String {
        if (winner_agg - runner_agg).abs() > TIE_EPSILON {
            let mut best: Option<(&MetricScore, u8)> = None;
            for score in &winner.scores {
                let other = runner
                    .scores
                    .iter()
                    .find(|s| s.metric_name == score.metric_name)
                    .map(|s| s.score)
                    .unwrap_or(0);
                if score.score > other {
                    let delta = score.score - other;
                    if best.map_or(true, |(b, o)| delta > b.score.saturating_sub(o)) {
                        best = Some((score, other));
                    }
                }
            }
            return match best {
                Some((score, other)) => format!(
                    "Highest weighted aggregate ({:.2}); strongest edge on {} ({} vs {}).",
                    winner_agg, score.metric_name, score.score, other
                ),
                None => format!("Highest weighted aggregate ({winner_agg:.2})."),
            };
        }

        if winner.cost_usd < runner.cost_usd {
            format!("Tied on weighted aggregate ({winner_agg:.2}); preferred for lower cost.")
        } else if winner.latency_ms < runner.latency_ms {
            format!("Tied on weighted aggregate ({winner_agg:.2}); preferred for lower latency.")
        } else {
            format!("Tied on weighted aggregate ({winner_agg:.2}); first-configured model wins.")
        }
    }
}

/// Strict ordering for winner selection: aggregate, then cost, then latency.
/// Returns false on a full tie, so the earlier-configured run is kept.
fn beats(agg_a: f64, a: &ScoredRun, agg_b: f64, b: &ScoredRun) -> bool {
    if (agg_a - agg_b).abs() > TIE_EPSILON {
        return agg_a > agg_b;
    }
    if a.cost_usd != b.cost_usd {
        return a.cost_usd < b.cost_usd;
    }
    if a.latency_ms != b.latency_ms {
        return a.latency_ms < b.latency_ms;
    }
    false
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn round6(x: f64) -> f64 {
    (x * 1e6).round() / 1e6
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scores(edit: u8, structure: u8, publish: u8) -> Vec<MetricScore> {
        vec![
            MetricScore {
                metric_name: METRIC_EDIT_QUALITY.into(),
                score: edit,
                reasoning: "test".into(),
            },
            MetricScore {
                metric_name: METRIC_STRUCTURAL_CLARITY.into(),
                score: structure,
                reasoning: "test".into(),
            },
            MetricScore {
                metric_name: METRIC_PUBLISH_READY.into(),
                score: publish,
                reasoning: "test".into(),
            },
        ]
    }

    fn run(name: &str, s: Vec<MetricScore>, latency_ms: u64, cost_usd: f64) -> ScoredRun {
        ScoredRun {
            model_name: name.into(),
            scores: s,
            latency_ms,
            cost_usd,
        }
    }

    fn engine() -> RecommendationEngine {
        RecommendationEngine::new(ScoringConfig::default())
    }

    #[test]
    fn no_runs_no_recommendation() {
        assert!(engine().recommend(&[]).is_none());
    }

    #[test]
    fn single_run_wins_by_default() {
        let rec = engine()
            .recommend(&[run("solo", scores(3, 3, 3), 100, 0.01)])
            .unwrap();
        assert_eq!(rec.winning_model, "solo");
        assert_eq!(rec.reason, "Only successful run in the experiment.");
        assert_eq!(rec.tradeoffs, serde_json::json!({}));
    }

    #[test]
    fn highest_aggregate_wins_and_reason_cites_strongest_edge() {
        let rec = engine()
            .recommend(&[
                run("weak", scores(3, 5, 4), 50, 0.001),
                run("strong", scores(5, 5, 4), 900, 0.02),
            ])
            .unwrap();
        assert_eq!(rec.winning_model, "strong");
        assert!(rec.reason.contains("edit_quality (5 vs 3)"));
        assert_eq!(rec.tradeoffs["runner_up"], "weak");
        assert_eq!(rec.tradeoffs["aggregate_delta"], 0.67);
        assert_eq!(rec.tradeoffs["latency_ms_delta"], 850);
    }

    #[test]
    fn equal_aggregate_breaks_tie_by_lower_cost() {
        let rec = engine()
            .recommend(&[
                run("pricey", scores(4, 4, 4), 100, 0.05),
                run("cheap", scores(4, 4, 4), 100, 0.01),
            ])
            .unwrap();
        assert_eq!(rec.winning_model, "cheap");
        assert!(rec.reason.contains("lower cost"));
    }

    #[test]
    fn equal_aggregate_and_cost_breaks_tie_by_latency() {
        let rec = engine()
            .recommend(&[
                run("slow", scores(4, 4, 4), 900, 0.01),
                run("fast", scores(4, 4, 4), 100, 0.01),
            ])
            .unwrap();
        assert_eq!(rec.winning_model, "fast");
        assert!(rec.reason.contains("lower latency"));
    }

    #[test]
    fn full_tie_keeps_input_order() {
        let rec = engine()
            .recommend(&[
                run("first", scores(4, 4, 4), 100, 0.01),
                run("second", scores(4, 4, 4), 100, 0.01),
            ])
            .unwrap();
        assert_eq!(rec.winning_model, "first");
        assert!(rec.reason.contains("first-configured"));
    }

    #[test]
    fn weights_change_the_winner() {
        let runs = [
            run("editor", scores(5, 2, 2), 100, 0.01),
            run("stylist", scores(2, 5, 5), 100, 0.01),
        ];

        // Equal weights: stylist's two strong metrics win.
        let rec = engine().recommend(&runs).unwrap();
        assert_eq!(rec.winning_model, "stylist");

        // Heavy edit-quality weighting flips it.
        let weighted = RecommendationEngine::new(ScoringConfig {
            edit_quality_weight: 10.0,
            structural_clarity_weight: 1.0,
            publish_ready_weight: 1.0,
        });
        let rec = weighted.recommend(&runs).unwrap();
        assert_eq!(rec.winning_model, "editor");
    }

    #[test]
    fn aggregate_is_the_weighted_mean() {
        let agg = engine().aggregate(&scores(5, 4, 3));
        assert!((agg - 4.0).abs() < 1e-9);
    }
}

// src/evaluator/mod.rs — Deterministic heuristic scoring
//
// Scores one successful run's output on a 1–5 integer scale across three
// fixed metrics. Identical input text always yields identical scores: no
// randomness, no I/O, no model calls. That is what makes scores comparable
// across models and reproducible in tests.

pub mod diffstat;

use crate::core::types::MetricScore;
use diffstat::diff_stats;

pub const METRIC_EDIT_QUALITY: &str = "edit_quality";
pub const METRIC_STRUCTURAL_CLARITY: &str = "structural_clarity";
pub const METRIC_PUBLISH_READY: &str = "publish_ready";

/// Longest paragraph, in characters, before a block counts as run-on.
const RUN_ON_BLOCK_CHARS: usize = 700;

/// Sentences shorter than this are ignored by the duplicate check.
const DUPLICATE_MIN_CHARS: usize = 20;

#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEvaluator;

impl HeuristicEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Score one output against the source it edited. Metric order is fixed.
    pub fn evaluate(&self, source: &str, output: &str) -> Vec<MetricScore> {
        vec![
            edit_quality(source, output),
            structural_clarity(output),
            publish_ready(output),
        ]
    }
}

fn metric(name: &str, score: u8, reasoning: String) -> MetricScore {
    MetricScore {
        metric_name: name.into(),
        score,
        reasoning,
    }
}

/// Length-normalized difference against the source plus diff density.
/// Shorter, denser edits score higher; unchanged or gutted output scores low.
fn edit_quality(source: &str, output: &str) -> MetricScore {
    if output.trim().is_empty() {
        return metric(METRIC_EDIT_QUALITY, 1, "Output is empty".into());
    }

    let stats = diff_stats(source, output);
    let altered_pct = (stats.diff_density * 100.0).round();
    let length_pct = (stats.length_ratio * 100.0).round();

    let (score, verdict) = if stats.diff_density < 0.05 {
        (2, "essentially unchanged from the source")
    } else if stats.length_ratio < 0.2 {
        (2, "heavily truncated relative to the source")
    } else if stats.length_ratio > 1.5 {
        (3, "expanded well beyond the source")
    } else {
        let tightened = (0.4..=1.1).contains(&stats.length_ratio);
        let measured = (0.15..=0.60).contains(&stats.diff_density);
        match (tightened, measured) {
            (true, true) => (5, "concise, well-measured edit"),
            (true, false) | (false, true) => (4, "solid edit"),
            (false, false) => (3, "outside the preferred density and length bands"),
        }
    };

    metric(
        METRIC_EDIT_QUALITY,
        score,
        format!("{verdict}: {altered_pct:.0}% of content altered, output at {length_pct:.0}% of source length"),
    )
}

/// Formatting signals: paragraph boundaries, no run-on blocks, consistent
/// list markers.
fn structural_clarity(output: &str) -> MetricScore {
    if output.trim().is_empty() {
        return metric(METRIC_STRUCTURAL_CLARITY, 1, "Output is empty".into());
    }

    let paragraphs: Vec<&str> = output
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    let longest = paragraphs
        .iter()
        .map(|p| p.chars().count())
        .max()
        .unwrap_or(0);

    let has_breaks = paragraphs.len() >= 2;
    let no_run_on = longest <= RUN_ON_BLOCK_CHARS;
    let lists_consistent = list_markers_consistent(output);

    let mut score: u8 = 2;
    let mut notes: Vec<String> = Vec::new();

    if has_breaks {
        score += 1;
        notes.push("paragraph breaks present".into());
    } else {
        notes.push("no paragraph breaks".into());
    }
    if no_run_on {
        score += 1;
        notes.push("no run-on blocks".into());
    } else {
        notes.push(format!("run-on block of {longest} chars"));
    }
    if lists_consistent {
        score += 1;
        notes.push("consistent list structure".into());
    } else {
        notes.push("mixed list markers".into());
    }

    metric(METRIC_STRUCTURAL_CLARITY, score, notes.join(", "))
}

/// Bullet lines must not mix `-` and `*` markers. No lists at all counts as
/// consistent.
fn list_markers_consistent(output: &str) -> bool {
    let mut dash = false;
    let mut star = false;
    for line in output.lines() {
        let line = line.trim_start();
        if line.starts_with("- ") {
            dash = true;
        } else if line.starts_with("* ") {
            star = true;
        }
    }
    !(dash && star)
}

/// Completeness and basic grammar: no truncation, no placeholders, sentences
/// terminate, nothing duplicated.
fn publish_ready(output: &str) -> MetricScore {
    if output.trim().is_empty() {
        return metric(METRIC_PUBLISH_READY, 1, "Output is empty".into());
    }

    let mut score: i32 = 5;
    let mut problems: Vec<String> = Vec::new();
    let lower = output.to_lowercase();

    if has_placeholder(&lower) {
        score -= 2;
        problems.push("placeholder text present".into());
    }

    let trimmed = output.trim_end();
    let ends_cleanly = trimmed.ends_with(['.', '!', '?', '"', ')']);
    let marked_truncated = lower.contains("[truncated]") || lower.contains("[cut off]");
    if marked_truncated || !ends_cleanly {
        score -= 2;
        problems.push("appears truncated (no terminal punctuation)".into());
    }

    if !output.contains(['.', '!', '?']) {
        score -= 1;
        problems.push("no sentence terminators".into());
    } else if has_duplicates(&normalized_sentences(output)) {
        score -= 1;
        problems.push("duplicated sentences".into());
    }

    let reasoning = if problems.is_empty() {
        "complete: terminators present, no placeholders or duplication".into()
    } else {
        problems.join(", ")
    };

    metric(METRIC_PUBLISH_READY, score.clamp(1, 5) as u8, reasoning)
}

fn has_placeholder(lower: &str) -> bool {
    if lower.contains("[insert") || lower.contains("[placeholder") || lower.contains("lorem ipsum")
    {
        return true;
    }
    lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| word == "todo" || word == "tbd")
}

fn normalized_sentences(output: &str) -> Vec<String> {
    output
        .split(['.', '!', '?'])
        .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase())
        .filter(|s| s.chars().count() >= DUPLICATE_MIN_CHARS)
        .collect()
}

fn has_duplicates(sentences: &[String]) -> bool {
    let mut seen = std::collections::HashSet::new();
    sentences.iter().any(|s| !seen.insert(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SOURCE: &str = "So, um, what I was trying to say is that the quarterly numbers, \
        you know, they really came in a lot better than we had expected them to come in, \
        and I think that the team deserves a lot of credit for the work that they did on \
        the launch, because honestly the launch is what drove most of the upside here.";

    const GOOD_EDIT: &str = "The quarterly numbers came in well above expectations.\n\n\
        The team deserves credit: the launch drove most of the upside.";

    #[test]
    fn identical_input_yields_identical_scores() {
        let evaluator = HeuristicEvaluator::new();
        let first = evaluator.evaluate(SOURCE, GOOD_EDIT);
        let second = evaluator.evaluate(SOURCE, GOOD_EDIT);
        assert_eq!(first, second);
    }

    #[test]
    fn metric_order_and_bounds_are_fixed() {
        let scores = HeuristicEvaluator::new().evaluate(SOURCE, GOOD_EDIT);
        let names: Vec<&str> = scores.iter().map(|s| s.metric_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                METRIC_EDIT_QUALITY,
                METRIC_STRUCTURAL_CLARITY,
                METRIC_PUBLISH_READY
            ]
        );
        for s in &scores {
            assert!((1..=5).contains(&s.score), "{} out of range", s.metric_name);
            assert!(!s.reasoning.is_empty());
        }
    }

    #[test]
    fn unchanged_output_scores_low_on_edit_quality() {
        let score = edit_quality(SOURCE, SOURCE);
        assert_eq!(score.score, 2);
        assert!(score.reasoning.contains("unchanged"));
    }

    #[test]
    fn gutted_output_scores_low_on_edit_quality() {
        let score = edit_quality(SOURCE, "Numbers good.");
        assert_eq!(score.score, 2);
        assert!(score.reasoning.contains("truncated"));
    }

    #[test]
    fn empty_output_bottoms_out_every_metric() {
        let scores = HeuristicEvaluator::new().evaluate(SOURCE, "   ");
        assert!(scores.iter().all(|s| s.score == 1));
    }

    #[test]
    fn good_edit_beats_sloppy_edit() {
        let evaluator = HeuristicEvaluator::new();
        let good: u32 = evaluator
            .evaluate(SOURCE, GOOD_EDIT)
            .iter()
            .map(|s| s.score as u32)
            .sum();
        let sloppy: u32 = evaluator
            .evaluate(SOURCE, SOURCE)
            .iter()
            .map(|s| s.score as u32)
            .sum();
        assert!(good > sloppy, "good={good} sloppy={sloppy}");
    }

    #[test]
    fn paragraph_breaks_raise_structural_clarity() {
        let multi = structural_clarity("First paragraph here.\n\nSecond paragraph here.");
        let single = structural_clarity(&"word ".repeat(200));
        assert!(multi.score > single.score);
        assert_eq!(multi.score, 5);
    }

    #[test]
    fn mixed_list_markers_are_penalized() {
        let mixed = structural_clarity("Intro line.\n\n- first\n* second");
        let uniform = structural_clarity("Intro line.\n\n- first\n- second");
        assert!(mixed.score < uniform.score);
        assert!(mixed.reasoning.contains("mixed list markers"));
    }

    #[test]
    fn placeholders_and_truncation_sink_publish_ready() {
        let clean = publish_ready("This reads well. It ends properly.");
        assert_eq!(clean.score, 5);

        let placeholder = publish_ready("This has a TODO in it.");
        assert_eq!(placeholder.score, 3);

        let truncated = publish_ready("This sentence just stops mid");
        assert!(truncated.score <= 3);
        assert!(truncated.reasoning.contains("truncated"));
    }

    #[test]
    fn duplicated_sentences_are_penalized() {
        let text = "The launch drove most of the upside. The launch drove most of the upside.";
        let score = publish_ready(text);
        assert_eq!(score.score, 4);
        assert!(score.reasoning.contains("duplicated"));
    }
}

// src/evaluator/diffstat.rs — Text difference statistics
//
// Pure functions of the input strings: same text in, same numbers out.

/// How an output differs from its source, in aggregate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffStats {
    /// Output length as a fraction of source length (whitespace-normalized
    /// characters).
    pub length_ratio: f64,
    /// Fraction of content altered: 1 − Sørensen–Dice bigram similarity.
    pub diff_density: f64,
}

/// Collapse whitespace runs and lowercase, so formatting-only changes do not
/// register as content edits.
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub fn diff_stats(source: &str, output: &str) -> DiffStats {
    let source_norm = normalize(source);
    let output_norm = normalize(output);

    let length_ratio =
        output_norm.chars().count() as f64 / source_norm.chars().count().max(1) as f64;
    let similarity = strsim::sorensen_dice(&source_norm, &output_norm);

    DiffStats {
        length_ratio,
        diff_density: (1.0 - similarity).clamp(0.0, 1.0),
    }
}

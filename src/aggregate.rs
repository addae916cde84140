use crate::error::RecommendError;
use crate::models::RankedRecommendation;

/// Reduce raw window scores to one mean score per target and rank them.
///
/// `raw_scores` must be target-major: every window for target 0, then every
/// window for target 1, and so on. Ties keep target order.
pub fn aggregate(
    raw_scores: &[f64],
    targets: &[String],
    display_names: &[String],
    top_n: Option<usize>,
) -> Result<Vec<RankedRecommendation>, RecommendError> {
    let shape_error = || RecommendError::ScoreShape {
        scores: raw_scores.len(),
        targets: targets.len(),
    };

    if targets.is_empty() || raw_scores.is_empty() || raw_scores.len() % targets.len() != 0 {
        return Err(shape_error());
    }
    if display_names.len() != targets.len() {
        return Err(RecommendError::InvalidProfile(format!(
            "{} targets but {} display names",
            targets.len(),
            display_names.len()
        )));
    }

    if let Some(index) = raw_scores.iter().position(|score| !score.is_finite()) {
        return Err(RecommendError::NonFiniteScore { index });
    }

    let repeat = raw_scores.len() / targets.len();
    let mut ranked: Vec<RankedRecommendation> = raw_scores
        .chunks(repeat)
        .zip(targets.iter().zip(display_names))
        .map(|(group, (code, name))| RankedRecommendation {
            course_code: code.clone(),
            display_name: name.clone(),
            score: group.iter().sum::<f64>() / repeat as f64,
        })
        .collect();

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));

    if let Some(limit) = top_n {
        ranked.truncate(limit);
    }

    tracing::debug!(targets = targets.len(), windows_per_target = repeat, "scores aggregated");
    Ok(ranked)
}

use thiserror::Error;

/// Failures the recommendation pipeline reports to its caller.
#[derive(Debug, Error)]
pub enum RecommendError {
    #[error("Missing item from input: {}", .missing_items.join(", "))]
    IncompleteCourses { missing_items: Vec<String> },

    #[error("no trained model is available for this program")]
    ProgramNotFound { program_code: String },

    #[error("invalid program profile: {0}")]
    InvalidProfile(String),

    #[error("invalid transcript: {0}")]
    InvalidTranscript(String),

    #[error("model returned {scores} scores, which cannot be split across {targets} targets")]
    ScoreShape { scores: usize, targets: usize },

    #[error("model score at position {index} is not a finite number")]
    NonFiniteScore { index: usize },

    #[error("inference failed: {0}")]
    Inference(String),
}

impl RecommendError {
    /// Short machine-readable tag used in error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            RecommendError::IncompleteCourses { .. } => "incomplete_courses",
            RecommendError::ProgramNotFound { .. } => "program_not_found",
            RecommendError::InvalidProfile(_) => "invalid_profile",
            RecommendError::InvalidTranscript(_) => "invalid_transcript",
            RecommendError::ScoreShape { .. } => "score_shape",
            RecommendError::NonFiniteScore { .. } => "non_finite_score",
            RecommendError::Inference(_) => "inference",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_message_lists_items() {
        let err = RecommendError::IncompleteCourses {
            missing_items: vec!["IF101".to_string(), "IF202".to_string()],
        };
        assert_eq!(err.to_string(), "Missing item from input: IF101, IF202");
        assert_eq!(err.kind(), "incomplete_courses");
    }

    #[test]
    fn program_not_found_hides_lookup_details() {
        let err = RecommendError::ProgramNotFound {
            program_code: "515".to_string(),
        };
        assert!(!err.to_string().contains("515"));
    }
}

use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::error::RecommendError;
use crate::models::RankedRecommendation;

pub fn format_line(recommendation: &RankedRecommendation) -> String {
    format!("{} - {}", recommendation.course_code, recommendation.display_name)
}

/// `{"result": ["<code> - <name>", ...]}`
pub fn result_body(recommendations: &[RankedRecommendation]) -> Value {
    let lines: Vec<String> = recommendations.iter().map(format_line).collect();
    json!({ "result": lines })
}

pub fn error_body(error: &RecommendError) -> Value {
    match error {
        RecommendError::IncompleteCourses { missing_items } => json!({
            "error": error.kind(),
            "message": error.to_string(),
            "missing_items": missing_items,
        }),
        _ => json!({
            "error": error.kind(),
            "message": error.to_string(),
        }),
    }
}

pub fn build_report(
    program_code: &str,
    students: &[String],
    generated_at: DateTime<Utc>,
    recommendations: &[RankedRecommendation],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Course Recommendations");
    let _ = writeln!(
        output,
        "Generated for program {} at {}",
        program_code,
        generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Students");

    if students.is_empty() {
        let _ = writeln!(output, "No students in this transcript.");
    } else {
        for student in students {
            let _ = writeln!(output, "- {}", student);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Ranked Courses");

    if recommendations.is_empty() {
        let _ = writeln!(output, "No courses to recommend.");
    } else {
        let _ = writeln!(output, "| Rank | Course | Predicted score |");
        let _ = writeln!(output, "|------|--------|-----------------|");
        for (rank, recommendation) in recommendations.iter().enumerate() {
            let _ = writeln!(
                output,
                "| {} | {} | {:.2} |",
                rank + 1,
                format_line(recommendation),
                recommendation.score
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn recommendation(code: &str, name: &str, score: f64) -> RankedRecommendation {
        RankedRecommendation {
            course_code: code.to_string(),
            display_name: name.to_string(),
            score,
        }
    }

    #[test]
    fn lines_join_code_and_name() {
        assert_eq!(
            format_line(&recommendation("IF301", "Machine Learning", 3.2)),
            "IF301 - Machine Learning"
        );
    }

    #[test]
    fn result_body_keeps_rank_order() {
        let body = result_body(&[
            recommendation("IF302", "Computer Vision", 3.8),
            recommendation("IF301", "Machine Learning", 3.2),
        ]);
        assert_eq!(
            body,
            json!({"result": ["IF302 - Computer Vision", "IF301 - Machine Learning"]})
        );
    }

    #[test]
    fn error_body_lists_missing_items() {
        let body = error_body(&RecommendError::IncompleteCourses {
            missing_items: vec!["IF103".to_string()],
        });
        assert_eq!(body["error"], "incomplete_courses");
        assert_eq!(body["missing_items"], json!(["IF103"]));
    }

    #[test]
    fn report_includes_scores() {
        let generated_at = Utc.with_ymd_and_hms(2026, 2, 2, 9, 30, 0).unwrap();
        let report = build_report(
            "515",
            &["195515200111".to_string()],
            generated_at,
            &[recommendation("IF302", "Computer Vision", 3.758)],
        );
        assert!(report.contains("Generated for program 515 at 2026-02-02 09:30 UTC"));
        assert!(report.contains("- 195515200111"));
        assert!(report.contains("| 1 | IF302 - Computer Vision | 3.76 |"));
    }

    #[test]
    fn empty_report_says_so() {
        let report = build_report("515", &[], Utc::now(), &[]);
        assert!(report.contains("No students in this transcript."));
        assert!(report.contains("No courses to recommend."));
    }
}

use std::collections::{HashMap, HashSet};

use crate::error::RecommendError;
use crate::models::TranscriptRecord;

/// Check that every record is graded and every student took each required
/// course. Runs against raw course codes, before removal or translation.
///
/// Missing items are reported ungraded-first, then not-taken, without
/// duplicates.
pub fn check_completeness(
    records: &[TranscriptRecord],
    required_courses: &[String],
) -> Result<(), RecommendError> {
    let mut missing: Vec<String> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for record in records {
        if record.grade.is_none() && seen.insert(record.course_code.as_str()) {
            missing.push(record.course_code.clone());
        }
    }

    let mut students: Vec<&str> = Vec::new();
    let mut taken: HashMap<&str, HashSet<&str>> = HashMap::new();
    for record in records {
        let courses = taken.entry(record.student_id.as_str()).or_insert_with(|| {
            students.push(record.student_id.as_str());
            HashSet::new()
        });
        courses.insert(record.course_code.as_str());
    }

    for student in &students {
        let courses = &taken[student];
        for course in required_courses {
            if !courses.contains(course.as_str()) && seen.insert(course.as_str()) {
                missing.push(course.clone());
            }
        }
    }

    if records.is_empty() {
        for course in required_courses {
            if seen.insert(course.as_str()) {
                missing.push(course.clone());
            }
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        tracing::info!(missing = missing.len(), "transcript is incomplete");
        Err(RecommendError::IncompleteCourses {
            missing_items: missing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(course: &str, grade: Option<f64>) -> TranscriptRecord {
        TranscriptRecord {
            student_id: "195515200111".to_string(),
            course_code: course.to_string(),
            grade,
        }
    }

    fn required(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|code| code.to_string()).collect()
    }

    fn missing_items(result: Result<(), RecommendError>) -> Vec<String> {
        match result {
            Err(RecommendError::IncompleteCourses { missing_items }) => missing_items,
            other => panic!("expected incomplete courses, got {other:?}"),
        }
    }

    #[test]
    fn complete_transcript_passes() {
        let records = vec![record("A", Some(3.5)), record("B", Some(3.0))];
        assert!(check_completeness(&records, &required(&["A", "B"])).is_ok());
    }

    #[test]
    fn reports_course_not_taken() {
        let records = vec![record("A", Some(3.5)), record("B", Some(3.0))];
        let missing = missing_items(check_completeness(&records, &required(&["A", "B", "C"])));
        assert_eq!(missing, vec!["C"]);
    }

    #[test]
    fn reports_ungraded_course_once() {
        let records = vec![record("A", Some(3.5)), record("B", None)];
        let missing = missing_items(check_completeness(&records, &required(&["A", "B"])));
        assert_eq!(missing, vec!["B"]);
    }

    #[test]
    fn ungraded_items_come_before_not_taken() {
        let records = vec![record("A", Some(3.5)), record("X", None)];
        let missing = missing_items(check_completeness(&records, &required(&["A", "B"])));
        assert_eq!(missing, vec!["X", "B"]);
    }

    #[test]
    fn each_student_is_checked() {
        let mut records = vec![record("A", Some(3.5)), record("B", Some(3.0))];
        records.push(TranscriptRecord {
            student_id: "195515200222".to_string(),
            course_code: "A".to_string(),
            grade: Some(2.0),
        });
        let missing = missing_items(check_completeness(&records, &required(&["A", "B"])));
        assert_eq!(missing, vec!["B"]);
    }

    #[test]
    fn empty_transcript_misses_everything() {
        let missing = missing_items(check_completeness(&[], &required(&["A", "B"])));
        assert_eq!(missing, vec!["A", "B"]);
    }

    #[test]
    fn does_not_mutate_input() {
        let records = vec![record("A", None)];
        let before = records.clone();
        let _ = check_completeness(&records, &required(&["A"]));
        assert_eq!(records, before);
    }
}

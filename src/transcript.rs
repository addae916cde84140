use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use anyhow::Context;

use crate::encode::{FIELD_DELIMITER, ROW_DELIMITER};
use crate::error::RecommendError;
use crate::models::{StudentHistory, TranscriptRecord};
use crate::profile::ProgramProfile;

/// Read `student_id,course_code,grade` lines. A header row is skipped when
/// its grade column is literally `grade`.
pub fn read_records<R: Read>(reader: R) -> anyhow::Result<Vec<TranscriptRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut records = Vec::new();

    for (index, result) in reader.records().enumerate() {
        let row = result.with_context(|| format!("failed to read transcript line {}", index + 1))?;
        if row.iter().all(str::is_empty) {
            continue;
        }
        if index == 0 && row.get(2).is_some_and(|grade| grade.eq_ignore_ascii_case("grade")) {
            continue;
        }

        let student_id = row
            .get(0)
            .filter(|value| !value.is_empty())
            .with_context(|| format!("transcript line {} has no student id", index + 1))?;
        let course_code = row
            .get(1)
            .filter(|value| !value.is_empty())
            .with_context(|| format!("transcript line {} has no course code", index + 1))?;
        check_course_code(course_code)?;

        records.push(TranscriptRecord {
            student_id: student_id.to_string(),
            course_code: course_code.to_string(),
            grade: row.get(2).and_then(parse_grade),
        });
    }

    Ok(records)
}

pub fn read_files(paths: &[impl AsRef<Path>]) -> anyhow::Result<Vec<TranscriptRecord>> {
    let mut records = Vec::new();
    for path in paths {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open transcript {}", path.display()))?;
        let mut batch = read_records(file)
            .with_context(|| format!("failed to parse transcript {}", path.display()))?;
        tracing::debug!(path = %path.display(), records = batch.len(), "transcript loaded");
        records.append(&mut batch);
    }
    Ok(records)
}

/// Course codes are joined with the encoder delimiters, so they may not
/// contain either of them.
pub fn check_course_code(course_code: &str) -> Result<(), RecommendError> {
    if course_code.contains(FIELD_DELIMITER) || course_code.contains(char::from(ROW_DELIMITER)) {
        return Err(RecommendError::InvalidTranscript(format!(
            "course code {course_code:?} contains a reserved delimiter"
        )));
    }
    Ok(())
}

/// Blank or non-numeric grade text means the course has not been scored.
pub fn parse_grade(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|grade| grade.is_finite())
}

/// Drop removed courses, apply code translation, and group by student in
/// first-appearance order. Records must already be validated.
pub fn group_histories(records: &[TranscriptRecord], profile: &ProgramProfile) -> Vec<StudentHistory> {
    let mut order: HashMap<&str, usize> = HashMap::new();
    let mut histories: Vec<StudentHistory> = Vec::new();

    for record in records {
        if profile.is_removed(&record.course_code) {
            continue;
        }
        let Some(grade) = record.grade else {
            continue;
        };

        let slot = *order.entry(record.student_id.as_str()).or_insert_with(|| {
            histories.push(StudentHistory {
                student_id: record.student_id.clone(),
                courses: Vec::new(),
                grades: Vec::new(),
            });
            histories.len() - 1
        });

        let history = &mut histories[slot];
        history
            .courses
            .push(profile.translate(&record.course_code).to_string());
        history.grades.push(grade);
    }

    histories
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::tests::plain_profile;

    fn record(student: &str, course: &str, grade: Option<f64>) -> TranscriptRecord {
        TranscriptRecord {
            student_id: student.to_string(),
            course_code: course.to_string(),
            grade,
        }
    }

    #[test]
    fn reads_records_with_blank_grades() {
        let input = "195515200111,IF101,3.50\n195515200111,IF102,\n195515200111,IF103,T\n";
        let records = read_records(input.as_bytes()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].grade, Some(3.5));
        assert_eq!(records[1].grade, None);
        assert_eq!(records[2].grade, None);
    }

    #[test]
    fn skips_header_row() {
        let input = "student_id,course_code,grade\n195515200111,IF101,4.00\n";
        let records = read_records(input.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].course_code, "IF101");
    }

    #[test]
    fn missing_grade_column_is_ungraded() {
        let records = read_records("195515200111,IF101\n".as_bytes()).unwrap();
        assert_eq!(records[0].grade, None);
    }

    #[test]
    fn rejects_course_code_with_delimiter() {
        let input = "195515200111,IF101,3.50\n195515200111,\"IF,9\",2.00\n";
        let err = read_records(input.as_bytes()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RecommendError>(),
            Some(RecommendError::InvalidTranscript(_))
        ));
        assert!(check_course_code("IF|9").is_err());
        assert!(check_course_code("IF 9").is_ok());
    }

    #[test]
    fn rejects_line_without_course() {
        assert!(read_records("195515200111\n".as_bytes()).is_err());
    }

    #[test]
    fn groups_by_student_preserving_order() {
        let profile = plain_profile();
        let records = vec![
            record("s2", "IF102", Some(3.0)),
            record("s1", "IF101", Some(4.0)),
            record("s2", "UN100", Some(2.0)),
            record("s2", "IF101", Some(3.5)),
        ];

        let histories = group_histories(&records, &profile);
        assert_eq!(histories.len(), 2);
        assert_eq!(histories[0].student_id, "s2");
        assert_eq!(histories[0].courses, vec!["IF102", "IF101"]);
        assert_eq!(histories[0].grades, vec![3.0, 3.5]);
        assert_eq!(histories[1].courses, vec!["IF101"]);
    }

    #[test]
    fn translates_codes_when_active() {
        let settings = "\
MK_TRANSLATE_SOURCE=OLD1
MK_TRANSLATE_TARGET=NEW1
KODE_MK_TARGET=NEW9
KODE_MK_TARGET_REAL=OLD9
MK_TARGET=Capstone
SEQUENCE=2
STEP=1
KODE_MK_TRANSLATED=yes
";
        let profile = ProgramProfile::parse("515", settings).unwrap();
        let histories = group_histories(&[record("s1", "OLD1", Some(3.0))], &profile);
        assert_eq!(histories[0].courses, vec!["NEW1"]);
    }
}

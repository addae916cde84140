use std::io::Write;

use crate::error::RecommendError;
use crate::models::{EncodedRow, Sequence};

/// Separates values inside a serialized sequence.
pub const FIELD_DELIMITER: &str = ",";
/// Separates columns in the row file handed to offline inference.
pub const ROW_DELIMITER: u8 = b'|';

/// One row per sequence, in the order given. The target slot is split off
/// into `target_matkul`; the placeholder grade is dropped.
pub fn encode_rows(sequences: &[Sequence]) -> Vec<EncodedRow> {
    sequences
        .iter()
        .map(|sequence| {
            let history_len = sequence.course_sequence.len().saturating_sub(1);
            EncodedRow {
                student_id: sequence.student_id.clone(),
                seq_matkul: join_courses(&sequence.course_sequence[..history_len]),
                seq_nilai: join_grades(&sequence.grade_sequence[..history_len.min(sequence.grade_sequence.len())]),
                target_matkul: sequence.target_course.clone(),
            }
        })
        .collect()
}

pub fn join_courses(courses: &[String]) -> String {
    courses.join(FIELD_DELIMITER)
}

pub fn join_grades(grades: &[f64]) -> String {
    grades
        .iter()
        .map(|grade| grade.to_string())
        .collect::<Vec<_>>()
        .join(FIELD_DELIMITER)
}

pub fn split_courses(joined: &str) -> Vec<String> {
    if joined.is_empty() {
        return Vec::new();
    }
    joined.split(FIELD_DELIMITER).map(str::to_string).collect()
}

pub fn split_grades(joined: &str) -> Result<Vec<f64>, RecommendError> {
    if joined.is_empty() {
        return Ok(Vec::new());
    }
    joined
        .split(FIELD_DELIMITER)
        .map(|value| {
            value.parse::<f64>().map_err(|_| {
                RecommendError::InvalidTranscript(format!("grade {value:?} is not a number"))
            })
        })
        .collect()
}

/// Write rows as headerless `student|courses|grades`, with the target slot
/// and its placeholder grade included, as the offline model reader expects.
pub fn write_rows<W: Write>(writer: W, rows: &[EncodedRow]) -> anyhow::Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .delimiter(ROW_DELIMITER)
        .from_writer(writer);

    for row in rows {
        let courses = if row.seq_matkul.is_empty() {
            row.target_matkul.clone()
        } else {
            format!("{}{FIELD_DELIMITER}{}", row.seq_matkul, row.target_matkul)
        };
        let placeholder = crate::sequence::PREDICT_PLACEHOLDER.to_string();
        let grades = if row.seq_nilai.is_empty() {
            placeholder
        } else {
            format!("{}{FIELD_DELIMITER}{placeholder}", row.seq_nilai)
        };
        writer.write_record([row.student_id.as_str(), courses.as_str(), grades.as_str()])?;
    }

    writer.flush()?;
    Ok(())
}

use serde::Serialize;

/// One transcript line: a course a student took, with its grade when scored.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptRecord {
    pub student_id: String,
    pub course_code: String,
    pub grade: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudentHistory {
    pub student_id: String,
    pub courses: Vec<String>,
    pub grades: Vec<f64>,
}

/// A single window for one target course. The last course slot holds the
/// target and the last grade slot is the 0.0 placeholder to predict.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    pub student_id: String,
    pub target_course: String,
    pub course_sequence: Vec<String>,
    pub grade_sequence: Vec<f64>,
}

/// Serialized model input row. `seq_matkul`/`seq_nilai` exclude the target slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncodedRow {
    pub student_id: String,
    pub seq_matkul: String,
    pub seq_nilai: String,
    pub target_matkul: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedRecommendation {
    pub course_code: String,
    pub display_name: String,
    pub score: f64,
}

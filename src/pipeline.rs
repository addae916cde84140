use crate::aggregate;
use crate::encode;
use crate::error::RecommendError;
use crate::inference::ModelClient;
use crate::models::{EncodedRow, RankedRecommendation, TranscriptRecord};
use crate::profile::{self, ProgramProfile};
use crate::sequence;
use crate::transcript;
use crate::validate;

/// Number of recommendations returned unless the caller asks for all.
pub const DEFAULT_TOP_N: usize = 3;

/// Model-ready rows for one transcript, target-major across students.
#[derive(Debug, Clone)]
pub struct PreparedBatch {
    pub program_code: String,
    pub students: Vec<String>,
    pub rows: Vec<EncodedRow>,
}

/// Program code for a transcript, taken from its first record.
pub fn program_code(records: &[TranscriptRecord]) -> Result<String, RecommendError> {
    let first = records
        .first()
        .ok_or_else(|| RecommendError::InvalidTranscript("transcript has no records".to_string()))?;
    profile::program_code_from_student_id(&first.student_id)
}

/// Validate, preprocess, window and encode a transcript.
pub fn prepare(records: &[TranscriptRecord], profile: &ProgramProfile) -> Result<PreparedBatch, RecommendError> {
    for record in records {
        transcript::check_course_code(&record.course_code)?;
    }
    validate::check_completeness(records, profile.required_courses())?;

    let histories = transcript::group_histories(records, profile);
    let mut per_student = Vec::with_capacity(histories.len());
    for history in &histories {
        if history.courses.is_empty() {
            return Err(RecommendError::InvalidTranscript(format!(
                "student {} has no graded courses left after removing excluded courses",
                history.student_id
            )));
        }
        let sequences = sequence::build_sequences(
            history,
            profile.window_size,
            profile.step_size,
            &profile.target_courses,
        );
        per_student.push(encode::encode_rows(&sequences));
    }
    if per_student.is_empty() {
        return Err(RecommendError::InvalidTranscript(
            "no graded courses left after removing excluded courses".to_string(),
        ));
    }

    let rows = arrange_target_major(per_student, profile.target_courses.len());
    tracing::info!(
        program = %profile.program_code,
        students = histories.len(),
        rows = rows.len(),
        "model input prepared"
    );

    Ok(PreparedBatch {
        program_code: profile.program_code.clone(),
        students: histories.into_iter().map(|history| history.student_id).collect(),
        rows,
    })
}

/// Interleave per-student rows so that all windows of target 0 come first,
/// then target 1, and so on. Each student's rows are already target-major.
pub fn arrange_target_major(per_student: Vec<Vec<EncodedRow>>, target_count: usize) -> Vec<EncodedRow> {
    if per_student.len() <= 1 || target_count == 0 {
        return per_student.into_iter().flatten().collect();
    }

    let mut groups: Vec<Vec<Vec<EncodedRow>>> = per_student
        .into_iter()
        .map(|rows| {
            let per_target = rows.len() / target_count;
            let mut chunks: Vec<Vec<EncodedRow>> = Vec::with_capacity(target_count);
            let mut rows = rows.into_iter();
            for _ in 0..target_count {
                chunks.push(rows.by_ref().take(per_target).collect());
            }
            chunks
        })
        .collect();

    let mut arranged = Vec::new();
    for target in 0..target_count {
        for student in groups.iter_mut() {
            arranged.append(&mut student[target]);
        }
    }
    arranged
}

/// Rank raw model scores for a profile's targets.
pub fn rank(
    scores: &[f64],
    profile: &ProgramProfile,
    top_n: Option<usize>,
) -> Result<Vec<RankedRecommendation>, RecommendError> {
    aggregate::aggregate(
        scores,
        profile.output_codes(),
        &profile.target_courses_display,
        top_n,
    )
}

/// Outcome of a full request.
#[derive(Debug, Clone)]
pub struct RecommendationRun {
    pub program_code: String,
    pub students: Vec<String>,
    pub recommendations: Vec<RankedRecommendation>,
}

/// Full request: prepare the transcript, score it with the model, rank.
pub async fn recommend(
    records: &[TranscriptRecord],
    profile: &ProgramProfile,
    client: &ModelClient,
    top_n: Option<usize>,
) -> Result<RecommendationRun, RecommendError> {
    let batch = prepare(records, profile)?;
    let scores = client.predict(&batch.program_code, &batch.rows).await?;
    if scores.len() != batch.rows.len() {
        return Err(RecommendError::ScoreShape {
            scores: scores.len(),
            targets: profile.target_courses.len(),
        });
    }
    let recommendations = rank(&scores, profile, top_n)?;
    Ok(RecommendationRun {
        program_code: batch.program_code,
        students: batch.students,
        recommendations,
    })
}

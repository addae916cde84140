use crate::models::{Sequence, StudentHistory};

/// Grade written into the target slot of every grade window.
pub const PREDICT_PLACEHOLDER: f64 = 0.0;

/// Slide a `window_size - 1` history window over `values` once per tail
/// value, appending the tail to each window.
///
/// When fewer than `window_size - 1` values remain, the most recent
/// `window_size - 1` values are used instead, and that padded window is still
/// emitted before the loop stops. Histories shorter than the window are
/// left-padded with their oldest value.
fn slide<T: Clone>(values: &[T], window_size: usize, step_size: usize, tails: &[T]) -> Vec<Vec<T>> {
    let history_len = window_size.saturating_sub(1);
    let mut windows = Vec::new();

    for tail in tails {
        let mut start = 0usize;
        let mut end = 0usize;
        while end < values.len() {
            end = start + history_len;
            let mut window: Vec<T> = if end <= values.len() {
                values[start..end].to_vec()
            } else {
                most_recent(values, history_len)
            };
            window.push(tail.clone());
            windows.push(window);
            start += step_size;
        }
    }

    windows
}

fn most_recent<T: Clone>(values: &[T], count: usize) -> Vec<T> {
    if values.len() >= count {
        return values[values.len() - count..].to_vec();
    }
    let mut padded = Vec::with_capacity(count);
    if let Some(oldest) = values.first() {
        padded.extend(std::iter::repeat(oldest.clone()).take(count - values.len()));
    }
    padded.extend_from_slice(values);
    padded
}

/// Course windows, grouped by target in `targets` order.
pub fn course_windows(
    courses: &[String],
    window_size: usize,
    step_size: usize,
    targets: &[String],
) -> Vec<Vec<String>> {
    slide(courses, window_size, step_size, targets)
}

/// Grade windows aligned with [`course_windows`]; the last slot is always the
/// prediction placeholder.
pub fn grade_windows(
    grades: &[f64],
    window_size: usize,
    step_size: usize,
    target_count: usize,
) -> Vec<Vec<f64>> {
    let tails = vec![PREDICT_PLACEHOLDER; target_count];
    let mut windows = slide(grades, window_size, step_size, &tails);
    for window in windows.iter_mut() {
        if let Some(last) = window.last_mut() {
            *last = PREDICT_PLACEHOLDER;
        }
    }
    windows
}

/// Every (target, window) sequence for one student, target-major.
pub fn build_sequences(
    history: &StudentHistory,
    window_size: usize,
    step_size: usize,
    targets: &[String],
) -> Vec<Sequence> {
    let courses = course_windows(&history.courses, window_size, step_size, targets);
    let grades = grade_windows(&history.grades, window_size, step_size, targets.len());
    let per_target = courses.len() / targets.len().max(1);

    courses
        .into_iter()
        .zip(grades)
        .enumerate()
        .map(|(index, (course_sequence, grade_sequence))| Sequence {
            student_id: history.student_id.clone(),
            target_course: targets[index / per_target.max(1)].clone(),
            course_sequence,
            grade_sequence,
        })
        .collect()
}

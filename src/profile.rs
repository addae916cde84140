use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::encode::{FIELD_DELIMITER, ROW_DELIMITER};
use crate::error::RecommendError;

const KEY_TRANSLATE_SOURCE: &str = "MK_TRANSLATE_SOURCE";
const KEY_TRANSLATE_TARGET: &str = "MK_TRANSLATE_TARGET";
const KEY_TARGET: &str = "KODE_MK_TARGET";
const KEY_TARGET_REAL: &str = "KODE_MK_TARGET_REAL";
const KEY_TARGET_NAMES: &str = "MK_TARGET";
const KEY_SEQUENCE: &str = "SEQUENCE";
const KEY_STEP: &str = "STEP";
const KEY_REMOVED: &str = "REMOVED_MK";
const KEY_TRANSLATED: &str = "KODE_MK_TRANSLATED";

const KNOWN_KEYS: [&str; 9] = [
    KEY_TRANSLATE_SOURCE,
    KEY_TRANSLATE_TARGET,
    KEY_TARGET,
    KEY_TARGET_REAL,
    KEY_TARGET_NAMES,
    KEY_SEQUENCE,
    KEY_STEP,
    KEY_REMOVED,
    KEY_TRANSLATED,
];

/// Per-program model settings, validated once when loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramProfile {
    pub program_code: String,
    pub window_size: usize,
    pub step_size: usize,
    /// Canonical target codes, appended to every window.
    pub target_courses: Vec<String>,
    /// Display-form target codes, used for output when translation is active.
    pub target_courses_real: Vec<String>,
    pub target_courses_display: Vec<String>,
    pub removed_courses: HashSet<String>,
    pub translate_source: Vec<String>,
    pub translate_target: Vec<String>,
    pub translated: bool,
    #[serde(skip)]
    translation: HashMap<String, String>,
}

impl ProgramProfile {
    /// Parse the `KEY=VALUE` settings text shipped with a model bundle.
    pub fn parse(program_code: &str, settings: &str) -> Result<Self, RecommendError> {
        let mut values: HashMap<&str, &str> = HashMap::new();

        for (index, raw_line) in settings.lines().enumerate() {
            let line = raw_line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                RecommendError::InvalidProfile(format!(
                    "line {} is not a KEY=VALUE pair",
                    index + 1
                ))
            })?;
            let key = key.trim();
            if !KNOWN_KEYS.contains(&key) {
                tracing::warn!(program = %program_code, key = %key, "ignoring unknown settings key");
                continue;
            }
            values.insert(key, value);
        }

        let window_size = required_number(&values, KEY_SEQUENCE)?;
        let step_size = required_number(&values, KEY_STEP)?;
        let target_courses = required_list(&values, KEY_TARGET)?;
        let target_courses_display = required_list(&values, KEY_TARGET_NAMES)?;
        let target_courses_real = list(&values, KEY_TARGET_REAL);
        let translate_source = list(&values, KEY_TRANSLATE_SOURCE);
        let translate_target = list(&values, KEY_TRANSLATE_TARGET);
        let removed_courses = list(&values, KEY_REMOVED).into_iter().collect();
        let translated = match values.get(KEY_TRANSLATED) {
            Some(value) => parse_flag(value)?,
            None => false,
        };

        let translation = translate_source
            .iter()
            .cloned()
            .zip(translate_target.iter().cloned())
            .collect();

        let profile = Self {
            program_code: program_code.to_string(),
            window_size,
            step_size,
            target_courses,
            target_courses_real,
            target_courses_display,
            removed_courses,
            translate_source,
            translate_target,
            translated,
            translation,
        };
        profile.validate()?;
        Ok(profile)
    }

    fn validate(&self) -> Result<(), RecommendError> {
        let invalid = |message: String| Err(RecommendError::InvalidProfile(message));

        if self.window_size < 1 {
            return invalid(format!("{KEY_SEQUENCE} must be at least 1"));
        }
        if self.step_size < 1 {
            return invalid(format!("{KEY_STEP} must be at least 1"));
        }
        if self.target_courses.is_empty() {
            return invalid(format!("{KEY_TARGET} must list at least one course"));
        }
        if self.target_courses.len() != self.target_courses_display.len() {
            return invalid(format!(
                "{KEY_TARGET} has {} entries but {KEY_TARGET_NAMES} has {}",
                self.target_courses.len(),
                self.target_courses_display.len()
            ));
        }
        if self.translated && self.target_courses_real.len() != self.target_courses.len() {
            return invalid(format!(
                "{KEY_TARGET_REAL} has {} entries but {KEY_TARGET} has {}",
                self.target_courses_real.len(),
                self.target_courses.len()
            ));
        }
        if self.translate_source.len() != self.translate_target.len() {
            return invalid(format!(
                "{KEY_TRANSLATE_SOURCE} has {} entries but {KEY_TRANSLATE_TARGET} has {}",
                self.translate_source.len(),
                self.translate_target.len()
            ));
        }
        if self.translation.len() != self.translate_source.len() {
            return invalid(format!("{KEY_TRANSLATE_SOURCE} contains duplicate codes"));
        }

        let codes = self
            .target_courses
            .iter()
            .chain(&self.target_courses_real)
            .chain(&self.translate_source)
            .chain(&self.translate_target)
            .chain(&self.removed_courses);
        for code in codes {
            if code.contains(FIELD_DELIMITER) || code.contains(char::from(ROW_DELIMITER)) {
                return invalid(format!("course code {code:?} contains a reserved delimiter"));
            }
        }

        Ok(())
    }

    /// Courses a transcript must contain, in raw (untranslated) form.
    pub fn required_courses(&self) -> &[String] {
        if self.translated {
            &self.translate_source
        } else {
            &self.translate_target
        }
    }

    /// Codes paired with display names in the ranked output.
    pub fn output_codes(&self) -> &[String] {
        if self.translated {
            &self.target_courses_real
        } else {
            &self.target_courses
        }
    }

    pub fn is_removed(&self, course_code: &str) -> bool {
        self.removed_courses.contains(course_code)
    }

    /// Canonical code for a raw course code; identity when translation is off.
    pub fn translate<'a>(&'a self, course_code: &'a str) -> &'a str {
        if !self.translated {
            return course_code;
        }
        self.translation
            .get(course_code)
            .map(String::as_str)
            .unwrap_or(course_code)
    }
}

/// Program code embedded in a student id (characters 3..6).
pub fn program_code_from_student_id(student_id: &str) -> Result<String, RecommendError> {
    student_id
        .get(3..6)
        .filter(|code| is_program_code(code))
        .map(str::to_string)
        .ok_or_else(|| {
            RecommendError::InvalidTranscript(format!(
                "student id {student_id:?} does not carry a program code"
            ))
        })
}

/// Program codes name bundle directories, so only ASCII letters and digits
/// are accepted.
pub fn is_program_code(code: &str) -> bool {
    !code.is_empty() && code.chars().all(|c| c.is_ascii_alphanumeric())
}

fn list(values: &HashMap<&str, &str>, key: &str) -> Vec<String> {
    values
        .get(key)
        .map(|value| {
            value
                .split(';')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn required_list(values: &HashMap<&str, &str>, key: &str) -> Result<Vec<String>, RecommendError> {
    if !values.contains_key(key) {
        return Err(RecommendError::InvalidProfile(format!("missing {key}")));
    }
    Ok(list(values, key))
}

fn required_number(values: &HashMap<&str, &str>, key: &str) -> Result<usize, RecommendError> {
    let raw = values
        .get(key)
        .ok_or_else(|| RecommendError::InvalidProfile(format!("missing {key}")))?;
    raw.trim()
        .parse()
        .map_err(|_| RecommendError::InvalidProfile(format!("{key} is not a whole number: {raw:?}")))
}

fn parse_flag(raw: &str) -> Result<bool, RecommendError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "false" | "0" | "no" => Ok(false),
        "true" | "1" | "yes" => Ok(true),
        other => Err(RecommendError::InvalidProfile(format!(
            "{KEY_TRANSLATED} is not a boolean: {other:?}"
        ))),
    }
}

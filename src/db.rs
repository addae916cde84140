use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::RecommendError;
use crate::profile::{is_program_code, ProgramProfile};

/// Where program profiles are loaded from. Opened once, passed to the
/// commands that need it, and closed before exit.
pub enum ProfileSource {
    Postgres(PgPool),
    Bundles(PathBuf),
}

impl ProfileSource {
    pub async fn open(database_url: Option<&str>, profile_dir: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(url) = database_url {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(url)
                .await
                .context("failed to connect to Postgres")?;
            return Ok(Self::Postgres(pool));
        }
        if let Some(dir) = profile_dir {
            anyhow::ensure!(dir.is_dir(), "profile directory {} does not exist", dir.display());
            return Ok(Self::Bundles(dir.to_path_buf()));
        }
        anyhow::bail!("set DATABASE_URL or PROFILE_DIR to locate program profiles")
    }

    pub async fn load(&self, program_code: &str) -> anyhow::Result<ProgramProfile> {
        let settings = match self {
            Self::Postgres(pool) => fetch_settings(pool, program_code).await?,
            Self::Bundles(dir) => read_bundle_settings(dir, program_code)?,
        };
        let profile = ProgramProfile::parse(program_code, &settings)?;
        tracing::info!(
            program = %program_code,
            targets = profile.target_courses.len(),
            window_size = profile.window_size,
            step_size = profile.step_size,
            translated = profile.translated,
            "program profile loaded"
        );
        Ok(profile)
    }

    pub fn pool(&self) -> Option<&PgPool> {
        match self {
            Self::Postgres(pool) => Some(pool),
            Self::Bundles(_) => None,
        }
    }

    pub async fn close(self) {
        if let Self::Postgres(pool) = self {
            pool.close().await;
        }
    }
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Validate a settings file and store it under `program_code`.
pub async fn import_profile(pool: &PgPool, program_code: &str, settings: &str) -> anyhow::Result<ProgramProfile> {
    let profile = ProgramProfile::parse(program_code, settings)?;

    sqlx::query(
        r#"
        INSERT INTO course_recommender.program_profiles
        (id, program_code, settings, imported_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (program_code) DO UPDATE
        SET settings = EXCLUDED.settings, imported_at = EXCLUDED.imported_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(program_code)
    .bind(settings)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(profile)
}

async fn fetch_settings(pool: &PgPool, program_code: &str) -> anyhow::Result<String> {
    let row = sqlx::query(
        "SELECT settings, imported_at FROM course_recommender.program_profiles WHERE program_code = $1",
    )
    .bind(program_code)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Err(RecommendError::ProgramNotFound {
            program_code: program_code.to_string(),
        }
        .into());
    };

    let imported_at: DateTime<Utc> = row.get("imported_at");
    tracing::debug!(program = %program_code, %imported_at, "profile row found");
    Ok(row.get("settings"))
}

/// Model bundles keep their settings at `<dir>/<program>/assets/settings`.
pub fn bundle_settings_path(dir: &Path, program_code: &str) -> PathBuf {
    dir.join(program_code).join("assets").join("settings")
}

fn read_bundle_settings(dir: &Path, program_code: &str) -> anyhow::Result<String> {
    if !is_program_code(program_code) {
        return Err(RecommendError::ProgramNotFound {
            program_code: program_code.to_string(),
        }
        .into());
    }
    let path = bundle_settings_path(dir, program_code);
    match std::fs::read_to_string(&path) {
        Ok(settings) => Ok(settings),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(RecommendError::ProgramNotFound {
            program_code: program_code.to_string(),
        }
        .into()),
        Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
    }
}

use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand};
use tracing::Instrument;

mod aggregate;
mod config;
mod db;
mod encode;
mod error;
mod inference;
mod models;
mod pipeline;
mod profile;
mod report;
mod sequence;
mod transcript;
mod validate;

use config::{AppConfig, ConfigArgs};
use db::ProfileSource;
use error::RecommendError;
use inference::ModelClient;

#[derive(Parser)]
#[command(name = "course-recommender")]
#[command(about = "Recommend future courses from a student transcript", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Validate a model settings file and store it for a program
    ImportProfile {
        #[arg(long)]
        program: String,
        #[arg(long)]
        settings: PathBuf,
    },
    /// Print the parsed profile of a program
    ShowProfile {
        #[arg(long)]
        program: String,
    },
    /// Score a transcript with the program's model and rank target courses
    #[command(group(
        ArgGroup::new("count")
            .args(["all", "top"])
            .multiple(false)
    ))]
    Recommend {
        #[arg(long, required = true, num_args = 1..)]
        transcript: Vec<PathBuf>,
        #[arg(long)]
        all: bool,
        #[arg(long)]
        top: Option<usize>,
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Write validated model input rows for offline inference
    Encode {
        #[arg(long, required = true, num_args = 1..)]
        transcript: Vec<PathBuf>,
        #[arg(long, default_value = "rows.psv")]
        out: PathBuf,
    },
    /// Rank a file of model scores, one per line, in row order
    #[command(group(
        ArgGroup::new("count")
            .args(["all", "top"])
            .multiple(false)
    ))]
    Aggregate {
        #[arg(long)]
        program: String,
        #[arg(long)]
        scores: PathBuf,
        #[arg(long)]
        all: bool,
        #[arg(long)]
        top: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::resolve(&cli.config)?;

    match run(cli.command, &config).await {
        Ok(()) => Ok(()),
        Err(err) => match err.downcast_ref::<RecommendError>() {
            Some(domain) => {
                tracing::warn!(error = %domain, "request rejected");
                println!("{}", report::error_body(domain));
                std::process::exit(2);
            }
            None => Err(err),
        },
    }
}

async fn run(command: Commands, config: &AppConfig) -> anyhow::Result<()> {
    let source = ProfileSource::open(config.database_url.as_deref(), config.profile_dir.as_deref()).await?;
    let outcome = dispatch(command, config, &source).await;
    source.close().await;
    outcome
}

async fn dispatch(command: Commands, config: &AppConfig, source: &ProfileSource) -> anyhow::Result<()> {
    match command {
        Commands::InitDb => {
            let pool = source.pool().context("init-db needs DATABASE_URL")?;
            db::init_db(pool).await?;
            println!("Schema ready.");
        }
        Commands::ImportProfile { program, settings } => {
            let pool = source.pool().context("import-profile needs DATABASE_URL")?;
            let text = std::fs::read_to_string(&settings)
                .with_context(|| format!("failed to read {}", settings.display()))?;
            let profile = db::import_profile(pool, &program, &text).await?;
            println!(
                "Stored profile for program {} with {} target courses.",
                profile.program_code,
                profile.target_courses.len()
            );
        }
        Commands::ShowProfile { program } => {
            let profile = source.load(&program).await?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        Commands::Recommend {
            transcript,
            all,
            top,
            report,
        } => {
            let records = transcript::read_files(&transcript)?;
            let program_code = pipeline::program_code(&records)?;
            let request_id = uuid::Uuid::new_v4();
            let span = tracing::info_span!("recommend", %request_id, program = %program_code);
            let top_n = selection(all, top, config.top_n);
            recommend(&records, &program_code, top_n, report, config, source)
                .instrument(span)
                .await?;
        }
        Commands::Encode { transcript, out } => {
            let records = transcript::read_files(&transcript)?;
            let program_code = pipeline::program_code(&records)?;
            let profile = source.load(&program_code).await?;
            let batch = pipeline::prepare(&records, &profile)?;

            let file = std::fs::File::create(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            encode::write_rows(file, &batch.rows)?;
            println!("Wrote {} rows for program {} to {}.", batch.rows.len(), program_code, out.display());
        }
        Commands::Aggregate {
            program,
            scores,
            all,
            top,
        } => {
            let profile = source.load(&program).await?;
            let text = std::fs::read_to_string(&scores)
                .with_context(|| format!("failed to read {}", scores.display()))?;
            let values = parse_scores(&text)?;
            let recommendations = pipeline::rank(&values, &profile, selection(all, top, config.top_n))?;
            println!("{}", report::result_body(&recommendations));
        }
    }

    Ok(())
}

async fn recommend(
    records: &[models::TranscriptRecord],
    program_code: &str,
    top_n: Option<usize>,
    report_path: Option<PathBuf>,
    config: &AppConfig,
    source: &ProfileSource,
) -> anyhow::Result<()> {
    let profile = source.load(program_code).await?;
    let client = ModelClient::new(config.model_server_url()?, config.model_timeout, config.batch_size)?;
    let run = pipeline::recommend(records, &profile, &client, top_n).await?;

    if let Some(out) = report_path {
        let markdown = report::build_report(&run.program_code, &run.students, chrono::Utc::now(), &run.recommendations);
        std::fs::write(&out, markdown).with_context(|| format!("failed to write {}", out.display()))?;
        tracing::info!(path = %out.display(), "report written");
    }

    println!("{}", report::result_body(&run.recommendations));
    Ok(())
}

fn selection(all: bool, top: Option<usize>, default_top: usize) -> Option<usize> {
    if all {
        None
    } else {
        Some(top.unwrap_or(default_top))
    }
}

fn parse_scores(text: &str) -> anyhow::Result<Vec<f64>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            line.trim()
                .parse::<f64>()
                .with_context(|| format!("score on line {} is not a number", index + 1))
        })
        .collect()
}

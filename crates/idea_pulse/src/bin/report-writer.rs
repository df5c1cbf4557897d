use std::{path::PathBuf, time::Duration};

use anyhow::Context;
use clap::Parser;
use idea_pulse::{
    openai::OpenAIClient,
    pipeline::RunPolicy,
    report::{
        export_with_font, load_template, report_filename, EmbeddingIndex, ExportFormat, ProjectInfo,
        ReportWriter, Template,
    },
    tracing::init_tracing_subscriber,
    yt::ffmpeg::Ffmpeg,
};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(
    name = "report-writer",
    about = "Fills a report template with a language model"
)]
struct Cli {
    /// Project name; also names the output file
    #[arg(long)]
    project_name: String,

    /// Comma separated team member names
    #[arg(long, default_value = "")]
    team_members: String,

    /// Project topic
    #[arg(long)]
    topic: String,

    /// Custom template (.txt, .md or .docx); the default template is used if
    /// it cannot be loaded
    #[arg(long)]
    template: Option<PathBuf>,

    /// Output format: md, pdf or docx
    #[arg(long, default_value = "md")]
    format: ExportFormat,

    /// Reference documents the sections are grounded on
    #[arg(long = "reference")]
    references: Vec<PathBuf>,

    /// TrueType/OpenType font embedded into PDF output; needed for non-Latin
    /// text, the builtin font only covers Latin
    #[arg(long, env = "REPORT_PDF_FONT")]
    pdf_font: Option<PathBuf>,

    /// Directory the report is written to
    #[arg(long, default_value = "reports")]
    out_dir: PathBuf,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY")]
    openai_key: String,

    /// Chat model used to fill sections
    #[arg(long, env = "OPENAI_CHAT_MODEL", default_value = "gpt-4o-mini")]
    model: String,

    #[arg(long, default_value = "0.7")]
    temperature: f32,

    /// Sections filled at the same time
    #[arg(long, default_value = "1")]
    concurrency: usize,

    /// Extra attempts per stage for transient failures
    #[arg(long, default_value = "1")]
    max_retries: u32,

    /// Delay before a retry, in milliseconds
    #[arg(long, default_value = "0")]
    backoff_ms: u64,

    /// Upper bound for a single stage attempt, in seconds
    #[arg(long)]
    stage_timeout_secs: Option<u64>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let _guard = sentry::init((
        std::env::var("SENTRY_DSN").unwrap_or_default(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some("production".into()),
            ..Default::default()
        },
    ));

    let cli = Cli::parse();
    init_tracing_subscriber()?;

    if cli.openai_key.trim().is_empty() {
        anyhow::bail!("OPENAI_API_KEY not set");
    }

    let template = match &cli.template {
        Some(path) => load_template(path).unwrap_or_else(|| {
            tracing::warn!("Falling back to the default template");
            Template::default()
        }),
        None => Template::default(),
    };

    let references = cli
        .references
        .iter()
        .map(|path| {
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read reference file {}", path.display()))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let openai = OpenAIClient::new(&cli.openai_key, Ffmpeg::default())
        .with_chat_model(&cli.model)
        .with_temperature(Some(cli.temperature));

    let index = EmbeddingIndex::build(openai.clone(), &references)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to index reference files: {e}"))?;

    let cancellation = CancellationToken::new();
    let policy = RunPolicy::default()
        .with_max_retries(cli.max_retries)
        .with_backoff(Duration::from_millis(cli.backoff_ms))
        .with_concurrency(cli.concurrency)
        .with_stage_timeout(cli.stage_timeout_secs.map(Duration::from_secs))
        .with_cancellation(cancellation.clone());

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight sections");
            cancellation.cancel();
        }
    });

    let project = ProjectInfo::new(&cli.project_name, &cli.team_members, &cli.topic);
    let scratch_root = std::env::temp_dir().join("report-writer");
    let writer = ReportWriter::new(&scratch_root, openai, index);

    let report = writer.write(&project, &template, &policy).await;

    for failure in report.batch.failure_report() {
        eprintln!("Section failed: {failure}");
    }

    if report.batch.success_count() == 0 {
        anyhow::bail!("No section could be filled");
    }

    let path = export_with_font(
        &report.content,
        &report_filename(&project.name),
        cli.format,
        &cli.out_dir,
        cli.pdf_font.as_deref(),
    )
    .context("Failed to export report")?;

    println!("Report saved to {}", path.display());

    Ok(())
}

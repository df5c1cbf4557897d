use std::{path::PathBuf, time::Duration};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use idea_datastore::SqliteDataStore;
use idea_pulse::{
    openai::OpenAIClient,
    pipeline::{keys, RunPolicy},
    tracing::init_tracing_subscriber,
    types::VideoDescriptor,
    yt::{
        audio_handler::YtDlp,
        ffmpeg::Ffmpeg,
        scraper::Scraper,
        search::{SearchOptions, SortOrder},
    },
    IdeaOutcome, IdeaProcessorBuilder,
};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(
    name = "idea-pulse",
    about = "Turns YouTube videos into project ideas"
)]
struct Cli {
    /// Database connection URL
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://project_ideas.db")]
    database_url: String,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY")]
    openai_key: Option<String>,

    /// Chat model used to synthesize ideas
    #[arg(long, env = "OPENAI_CHAT_MODEL", default_value = "gpt-3.5-turbo")]
    model: String,

    /// Working directory for downloaded audio
    #[arg(long, env = "IDEA_PULSE_WORKDIR", default_value = "/var/tmp/idea-pulse")]
    workdir: PathBuf,

    /// Maximum search results to offer
    #[arg(long, default_value = "5")]
    limit: usize,

    /// Videos processed at the same time
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

    /// Split audio into chunks of this many seconds before transcribing
    #[arg(long)]
    chunk_duration: Option<u16>,

    /// Path to the yt-dlp binary
    #[arg(long, env = "YTDLP_PATH", default_value = "yt-dlp")]
    yt_dlp: PathBuf,

    /// Path to the ffmpeg binary
    #[arg(long, env = "FFMPEG_PATH", default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    /// Path to yt-dlp cookies file
    #[arg(long, env = "YTDLP_COOKIES_PATH")]
    cookies_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone)]
struct SearchArgs {
    /// Shortest video to offer, in minutes
    #[arg(long, default_value = "0")]
    min_duration: u64,

    /// Longest video to offer, in minutes
    #[arg(long)]
    max_duration: Option<u64>,

    /// Result order: relevance, views, length or recent
    #[arg(long, default_value = "relevance")]
    sort: SortOrder,
}

impl SearchArgs {
    fn options(&self) -> anyhow::Result<SearchOptions> {
        if let Some(max) = self.max_duration.filter(|max| *max < self.min_duration) {
            anyhow::bail!(
                "--max-duration ({max}) must not be below --min-duration ({})",
                self.min_duration
            );
        }

        Ok(SearchOptions::default()
            .with_duration(
                self.min_duration.saturating_mul(60),
                self.max_duration.map(|max| max.saturating_mul(60)),
            )
            .with_sort(self.sort))
    }
}

#[derive(Subcommand)]
enum Command {
    /// Search videos by keyword
    Search {
        keyword: String,

        #[command(flatten)]
        filter: SearchArgs,
    },
    /// Generate a project idea from a selection of videos
    Generate {
        /// Video URLs to use
        urls: Vec<String>,

        /// Search for videos instead of passing URLs
        #[arg(long, conflicts_with = "urls")]
        keyword: Option<String>,

        /// 1-based positions of the search results to use (default: all)
        #[arg(long, value_delimiter = ',', requires = "keyword")]
        select: Vec<usize>,

        #[command(flatten)]
        filter: SearchArgs,
    },
    /// List previously generated ideas, newest first
    Ideas,
}

struct Config {
    db_url: String,
    openai_key: String,
    model: String,
    workdir: PathBuf,
    limit: usize,
    chunk_duration: Option<u16>,
    yt_dlp: YtDlp,
    ffmpeg: Ffmpeg,
    policy: RunPolicy,
}

fn print_videos(videos: &[VideoDescriptor]) {
    for (i, video) in videos.iter().enumerate() {
        println!(
            "{:>2}. {} ({}, {}, {} views)\n    {}",
            i + 1,
            video.title,
            video.author,
            video.duration_str(),
            video.views_str(),
            video.url
        );
    }
}

fn print_outcome(outcome: &IdeaOutcome) {
    for result in outcome.batch.iter() {
        match &result.outcome {
            Ok(context) => println!(
                "ok      {} ({} transcript chars)",
                result.id,
                context.text(keys::TRANSCRIPT).map(str::len).unwrap_or(0)
            ),
            Err(error) => println!("failed  {}: {error}", result.id),
        }
    }

    if let Some(error) = &outcome.synthesis_error {
        println!("\nIdea synthesis failed: {error}");
    }

    if let Some(idea) = &outcome.idea {
        println!("\n{idea}");
    }

    if let Some(record_id) = outcome.record_id {
        println!("\nSaved as idea #{record_id}");
    }
}

/// Picks the `select`ed (1-based) search results, or all of them
fn select_videos(videos: Vec<VideoDescriptor>, select: &[usize]) -> anyhow::Result<Vec<String>> {
    if select.is_empty() {
        return Ok(videos.into_iter().map(|v| v.url).collect());
    }

    select
        .iter()
        .map(|&position| {
            position
                .checked_sub(1)
                .and_then(|i| videos.get(i))
                .map(|v| v.url.clone())
                .with_context(|| {
                    format!("No search result at position {position} (found {})", videos.len())
                })
        })
        .collect()
}

async fn run(config: Config, command: Command) -> anyhow::Result<()> {
    let store = SqliteDataStore::init(&config.db_url)
        .await
        .inspect_err(|e| tracing::error!(error = ?e, "Failed to open database"))?;

    //XXX: handles both transcription and synthesis; hence will need to be cloned
    let openai = OpenAIClient::new(&config.openai_key, config.ffmpeg).with_chat_model(&config.model);

    let mut builder = IdeaProcessorBuilder::new(&config.workdir)
        .store(store)
        .transcriber(openai.clone())
        .synthesizer(openai)
        .audio_handler(config.yt_dlp)
        .searcher(Scraper::default())
        .search_limit(config.limit);

    if let Some(chunk_duration) = config.chunk_duration {
        builder = builder.with_chunking(chunk_duration);
    }

    let processor = builder.build();

    match command {
        Command::Search { keyword, filter } => {
            let videos = processor.search_with(&keyword, &filter.options()?).await?;
            if videos.is_empty() {
                println!("No videos found for '{keyword}'");
            }
            print_videos(&videos);
        }
        Command::Generate {
            urls,
            keyword,
            select,
            filter,
        } => {
            let urls = match keyword {
                Some(keyword) => {
                    let videos = processor.search_with(&keyword, &filter.options()?).await?;
                    print_videos(&videos);
                    select_videos(videos, &select)?
                }
                None => urls,
            };

            let outcome = processor.run(&urls, &config.policy).await?;
            print_outcome(&outcome);
        }
        Command::Ideas => {
            let ideas = processor.list_ideas().await?;
            if ideas.is_empty() {
                println!("No ideas generated yet");
            }
            for record in ideas {
                println!(
                    "#{} [{}] {}\n{}\n",
                    record.id,
                    record.created_at.format("%Y-%m-%d %H:%M:%S"),
                    record.video_urls,
                    record.idea
                );
            }
        }
    }

    Ok(())
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

    let openai_key = cli
        .openai_key
        .filter(|key| !key.trim().is_empty())
        .context("OPENAI_API_KEY not set")?;

    let cancellation = CancellationToken::new();
    let policy = RunPolicy::default()
        .with_max_retries(cli.max_retries)
        .with_backoff(Duration::from_millis(cli.backoff_ms))
        .with_concurrency(cli.concurrency)
        .with_stage_timeout(cli.stage_timeout_secs.map(Duration::from_secs))
        .with_cancellation(cancellation.clone());

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight stages");
            cancellation.cancel();
        }
    });

    let config = Config {
        db_url: cli.database_url,
        openai_key,
        model: cli.model,
        workdir: cli.workdir,
        limit: cli.limit,
        chunk_duration: cli.chunk_duration,
        yt_dlp: YtDlp::new(cli.yt_dlp).with_cookies(cli.cookies_path),
        ffmpeg: Ffmpeg::new(cli.ffmpeg),
        policy,
    };

    run(config, cli.command).await
}

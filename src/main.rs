//! Shiori
//!
//! Command-line driver for the annotation and reading-state engine. Talks to
//! a running reader backend to inspect highlight indexes, context windows and
//! saved reading positions.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shiori_engine::chapter::Chapter;
use shiori_engine::config::Config;
use shiori_engine::context::extract_context_by_id;
use shiori_engine::error::EngineError;
use shiori_engine::highlights::{AnnotationController, HighlightId};
use shiori_engine::services::{AnalysisRequest, AnalysisService, BackendClient, ProgressService};

#[derive(Parser, Debug)]
#[command(name = "shiori")]
#[command(about = "Shiori - annotation and reading-state engine", long_about = None)]
#[command(version)]
struct Cli {
    /// Backend base URL (overrides SHIORI_BACKEND_URL)
    #[arg(long, global = true)]
    backend: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the sentence-aligned context window of a highlight
    Context {
        book_id: String,
        chapter_index: usize,
        highlight_id: i64,

        /// Also send the window to the analysis service
        #[arg(long)]
        analyze: bool,

        /// Question to attach to the analysis request
        #[arg(long, requires = "analyze")]
        prompt: Option<String>,
    },
    /// Print the highlight index of a chapter
    Index { book_id: String, chapter_index: usize },
    /// Print the saved reading position of a book
    Progress { book_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shiori_engine=debug,shiori=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });
    if let Some(backend) = cli.backend {
        config.backend.base_url = backend;
    }

    tracing::debug!("Backend: {}", config.backend.base_url);
    let client = BackendClient::new(&config.backend).context("failed to build HTTP client")?;

    match cli.command {
        Command::Context {
            book_id,
            chapter_index,
            highlight_id,
            analyze,
            prompt,
        } => {
            let (controller, chapter) = load_chapter(&client, &book_id, chapter_index).await?;
            let id = HighlightId(highlight_id);
            let window = extract_context_by_id(id, &controller.confirmed(), &chapter.segments, &config.context)
                .ok_or_else(|| {
                    EngineError::NotFound(format!("highlight {} in chapter {}", id, chapter_index))
                })?;

            println!("{}", serde_json::to_string_pretty(&window)?);

            if analyze {
                let mut request =
                    AnalysisRequest::from_window(&book_id, chapter_index, Some(id), window, &config.analysis);
                if let Some(prompt) = prompt {
                    request = request.with_prompt(prompt);
                }
                let result = client.analyze(&request).await.context("analysis request failed")?;
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
        }
        Command::Index {
            book_id,
            chapter_index,
        } => {
            let (controller, _) = load_chapter(&client, &book_id, chapter_index).await?;

            let index = controller.index();
            for address in index.addresses() {
                if let Some(style) = index.style_at(&address) {
                    println!("{}\t{}", address, style);
                }
            }
            tracing::info!("{} highlighted tokens", index.len());
        }
        Command::Progress { book_id } => {
            match client.get(&book_id).await.context("failed to fetch progress")? {
                Some(position) => println!("{}", serde_json::to_string_pretty(&position)?),
                None => println!("No saved position for {}", book_id),
            }
        }
    }

    Ok(())
}

async fn load_chapter(
    client: &BackendClient,
    book_id: &str,
    chapter_index: usize,
) -> anyhow::Result<(AnnotationController, Chapter)> {
    AnnotationController::load(book_id, chapter_index, client, Arc::new(client.clone()))
        .await
        .with_context(|| format!("failed to load chapter {} of {}", chapter_index, book_id))
}

mod anthropic;
mod cli;
mod collaborators;
mod config;
mod error;
mod jobs;
mod library;
mod logging;
mod orchestrator;
mod pipeline;
mod server;
mod state_machine;
mod stitcher;
mod ui;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;

use cli::{Cli, Command};
use collaborators::Collaborators;
use config::LessonConfig;
use library::LessonCache;
use orchestrator::LessonOrchestrator;
use state_machine::{JobReport, JobStatus, LessonRequest};
use ui::JobProgress;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose, cli.log_format);

    let config = LessonConfig::load(cli.config.as_deref())?;
    config.validate()?;

    match cli.command {
        Command::Serve { listen } => serve(config, listen).await,
        Command::Generate {
            topic_id,
            teacher,
            tone,
            language,
            avatar,
        } => {
            let mut request = LessonRequest::for_topic(topic_id);
            if let Some(teacher) = teacher {
                request.teacher_name = teacher;
            }
            if let Some(tone) = tone {
                request.tone = tone;
            }
            if let Some(language) = language {
                request.language = language;
            }
            request.avatar_id = avatar;
            generate(config, request).await
        }
        Command::Book { source } => book(config, &source).await,
    }
}

async fn build(
    config: &LessonConfig,
) -> Result<(Collaborators, Arc<LessonCache>, Arc<LessonOrchestrator>)> {
    let collaborators =
        Collaborators::from_config(config).context("failed to configure collaborators")?;
    let cache = Arc::new(
        LessonCache::open(&config.cache)
            .await
            .context("failed to open lesson library")?,
    );
    let orchestrator = Arc::new(LessonOrchestrator::from_config(
        config,
        &collaborators,
        cache.clone(),
    )?);
    Ok((collaborators, cache, orchestrator))
}

async fn serve(config: LessonConfig, listen: Option<SocketAddr>) -> Result<()> {
    let (collaborators, cache, orchestrator) = build(&config).await?;
    let state = server::AppState {
        orchestrator,
        cache,
        documents: collaborators.documents.clone(),
        blobs: collaborators.blobs.clone(),
    };
    server::run_server(state, listen.unwrap_or(config.server.listen)).await
}

async fn generate(config: LessonConfig, request: LessonRequest) -> Result<()> {
    let (_, _, orchestrator) = build(&config).await?;

    let progress = JobProgress::start(&request.topic_id);
    let job_id = orchestrator.submit(request).await?;
    let last = orchestrator
        .wait_for_terminal(&job_id, POLL_INTERVAL, |snapshot| progress.update(snapshot))
        .await?;
    progress.complete(&last);

    let job = orchestrator.job(&job_id).await?;
    progress.print_report(&JobReport::from_job(&job));

    if last.status == JobStatus::Failed {
        bail!("job {job_id} failed");
    }
    Ok(())
}

async fn book(config: LessonConfig, source: &str) -> Result<()> {
    let collaborators = Collaborators::from_config(&config)?;
    let cache = LessonCache::open(&config.cache).await?;

    let mut book = collaborators.documents.extract(source).await?;
    for topic in book.topics_mut() {
        topic.is_ready = cache.lookup(&topic.topic_id).await.is_some();
    }
    ui::print_book(&book);
    Ok(())
}

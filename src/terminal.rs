use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::error::InquireError;
use inquire::{Confirm, Select, Text};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

use crate::client::ingest_client::IngestClient;
use crate::config::Config;
use crate::progress::phase::Phase;
use crate::progress::poller::{Poller, ProgressEvent, ProgressView};
use crate::upload::uploader::Uploader;
use crate::views::{self, FAILED_LABEL};

#[derive(Debug, Clone)]
enum Mode {
    Query,
    Upload,
    Documents,
    Quit,
}

impl Display for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// How a progress session ended.
enum Outcome {
    Completed,
    Failed,
    Interrupted,
}

pub async fn terminal(config: Config) -> Result<()> {
    let client = Arc::new(IngestClient::from_config(&config).context("failed to build http client")?);
    info!("[terminal] using service at {}", client.base_url());

    let mut uploader = Uploader::new();

    loop {
        let mode = match Select::new(
            "Select operation:",
            vec![Mode::Query, Mode::Upload, Mode::Documents, Mode::Quit],
        )
        .prompt()
        {
            Ok(m) => m,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => break,
            Err(e) => return Err(e.into()),
        };

        let step = match mode {
            Mode::Query => query(&client).await,
            Mode::Upload => upload(&client, &config, &mut uploader).await,
            Mode::Documents => documents(&client).await,
            Mode::Quit => break,
        };

        match step {
            Ok(()) => {}
            Err(e) if is_cancel(&e) => continue,
            Err(e) => return Err(e),
        }

        if uploader.take_refresh() {
            documents(&client).await?;
        }
    }

    Ok(())
}

fn is_cancel(e: &anyhow::Error) -> bool {
    matches!(
        e.downcast_ref::<InquireError>(),
        Some(InquireError::OperationCanceled | InquireError::OperationInterrupted)
    )
}

async fn query(client: &IngestClient) -> Result<()> {
    let text = Text::new("Ask a question:").prompt()?;
    if text.trim().is_empty() {
        return Ok(());
    }

    let pb = spinner("Querying...")?;
    let result = client.query(text.trim()).await;
    pb.finish_and_clear();

    match result {
        Ok(resp) => println!("{}", views::render_query(&resp)),
        Err(e) => warn!("[query] request failed: {e}"),
    }
    Ok(())
}

async fn documents(client: &IngestClient) -> Result<()> {
    match client.documents().await {
        Ok(docs) => print!("{}", views::render_documents(&docs)),
        Err(e) => warn!("[documents] request failed: {e}"),
    }
    Ok(())
}

async fn upload(client: &Arc<IngestClient>, config: &Config, uploader: &mut Uploader) -> Result<()> {
    if uploader.staged().is_none() {
        let path = Text::new("Path of the file to insert:").prompt()?;
        if let Err(e) = uploader.select(path.trim()) {
            println!("{e}");
            return Ok(());
        }
        if uploader.is_video() {
            println!(
                "Video '{}' will be processed asynchronously after upload.",
                uploader.video_name().unwrap_or_default()
            );
        }
    } else if let Some(err) = uploader.last_error() {
        println!("Previous attempt failed: {err}");
    }

    let Some(staged) = uploader.staged() else {
        return Ok(());
    };
    if !Confirm::new(&format!("Submit {}?", staged.file_name))
        .with_default(true)
        .prompt()?
    {
        uploader.reset();
        return Ok(());
    }

    let pending = uploader.begin_submit()?;
    debug!("[upload] {} as {:?}", pending.file_name(), pending.kind());
    let pb = spinner(&format!("Uploading {}...", pending.file_name()))?;
    let result = pending.send(client).await;
    pb.finish_and_clear();

    match uploader.finish_submit(result) {
        Ok(body) => println!("{}", body.trim()),
        Err(e) => {
            println!("{e}");
            return Ok(());
        }
    }

    if uploader.should_track_progress() {
        let outcome = follow_progress(client, config, uploader).await?;
        match outcome {
            Outcome::Completed => {
                println!("{}", uploader.completion_message());
                Confirm::new("Close?").with_default(true).prompt()?;
                uploader.acknowledge();
            }
            Outcome::Failed => {
                println!("{FAILED_LABEL}");
                Confirm::new("Acknowledge and reset?")
                    .with_default(true)
                    .prompt()?;
                uploader.acknowledge();
            }
            Outcome::Interrupted => {
                println!("Stopped following the upload; the server keeps processing it.");
                uploader.reset();
            }
        }
    }
    Ok(())
}

/// Keeps a poller mounted until the upload finishes, fails, or Ctrl+C.
async fn follow_progress(
    client: &Arc<IngestClient>,
    config: &Config,
    uploader: &mut Uploader,
) -> Result<Outcome> {
    let name = uploader.video_name().unwrap_or_default().to_string();
    let (poller, mut events) = Poller::mount(
        client.clone(),
        name,
        config.poll_interval,
        config.dots_interval,
    );
    info!("[progress] following '{}'", poller.video_name());

    let bar = ProgressBar::new(100);
    bar.set_style(ProgressStyle::with_template("{prefix} [{bar:40}] {msg}")?.progress_chars("=> "));
    bar.set_prefix("[video]");
    draw(&bar, &poller.view());

    let mut updates = WatchStream::new(poller.subscribe());
    let mut interrupt = Box::pin(tokio::signal::ctrl_c());

    let outcome = loop {
        tokio::select! {
            _ = &mut interrupt => break Outcome::Interrupted,
            Some(ev) = events.recv() => match ev {
                ProgressEvent::Finished(done) => {
                    uploader.on_progress(done);
                    if uploader.is_completed() {
                        break Outcome::Completed;
                    }
                }
                ProgressEvent::Phase(Phase::Failed) => break Outcome::Failed,
                ProgressEvent::Phase(_) => {}
            },
            Some(view) = updates.next() => draw(&bar, &view),
        }
    };

    poller.unmount();
    bar.finish_and_clear();
    Ok(outcome)
}

fn draw(bar: &ProgressBar, view: &ProgressView) {
    let position = if view.phase.shows_bar() {
        view.phase.percent()
    } else {
        0
    };
    bar.set_position(u64::from(position));
    bar.set_message(views::progress_label(view));
}

fn spinner(msg: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("{spinner} {wide_msg}")?);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

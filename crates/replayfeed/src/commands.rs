//! Command-line client commands: login, logout, list, export.

use anyhow::{bail, Context, Result};
use clap::Args;
use dialoguer::{Input, Password};
use replayfeed_client::{build_pipeline, list_watchable, ReqwestHttpClient, SnapshotPipeline};
use replayfeed_config::RuntimeConfig;
use replayfeed_core::Credentials;
use replayfeed_prefetch::{CredentialedSource, PrefetchScheduler, SessionSlot};
use std::path::PathBuf;

use crate::credentials::CredentialStore;
use crate::export::{collect_recordings, export_feed, ExportOptions};
use crate::recording_filter;

#[derive(Args)]
pub struct LoginArgs {
    /// Project id (prompted when omitted)
    #[arg(long)]
    pub project_id: Option<String>,

    /// Personal API key (prompted when omitted)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Store the credentials without checking them against the upstream
    #[arg(long)]
    pub skip_verify: bool,
}

#[derive(Args)]
pub struct ListArgs {
    /// Upstream catalog offset
    #[arg(long)]
    pub offset: Option<usize>,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Position in the filtered feed to start from
    #[arg(long, default_value = "0")]
    pub start: usize,

    /// Number of recordings to export
    #[arg(long, default_value = "5")]
    pub count: usize,

    /// Directory receiving one <id>.json per recording
    #[arg(short, long, default_value = "./replayfeed-export")]
    pub output: PathBuf,
}

fn pipeline(config: &RuntimeConfig) -> Result<SnapshotPipeline<ReqwestHttpClient>> {
    build_pipeline(
        &config.upstream.base_url,
        config.upstream.timeout(),
        config.upstream.list_page_size,
        config.snapshot.batch_size,
    )
}

fn stored_credentials(config: &RuntimeConfig) -> Result<Credentials> {
    let store = CredentialStore::new(&config.credentials.path);
    match store.load()? {
        Some(credentials) => Ok(credentials.validated()?),
        None => bail!("Not logged in. Run `replayfeed login` first."),
    }
}

pub async fn login(config: &RuntimeConfig, args: LoginArgs) -> Result<()> {
    let project_id = match args.project_id {
        Some(id) => id,
        None => Input::new().with_prompt("Project ID").interact_text()?,
    };
    let api_key = match args.api_key {
        Some(key) => key,
        None => Password::new().with_prompt("Personal API key").interact()?,
    };

    let credentials = Credentials::new(project_id, api_key).validated()?;

    if !args.skip_verify {
        let pipeline = pipeline(config)?;
        list_watchable(
            pipeline.api(),
            &credentials,
            None,
            &recording_filter(config),
        )
        .await
        .context("Credentials were rejected by the upstream")?;
    }

    let store = CredentialStore::new(&config.credentials.path);
    store.save(&credentials)?;
    println!("Logged in to project {}", credentials.project_id);
    println!("Credentials stored in {}", store.path().display());
    Ok(())
}

pub fn logout(config: &RuntimeConfig) -> Result<()> {
    let store = CredentialStore::new(&config.credentials.path);
    if store.clear()? {
        println!("Logged out");
    } else {
        println!("Not logged in");
    }
    Ok(())
}

pub async fn list(config: &RuntimeConfig, args: ListArgs) -> Result<()> {
    let credentials = stored_credentials(config)?;
    let pipeline = pipeline(config)?;

    let page = list_watchable(
        pipeline.api(),
        &credentials,
        args.offset,
        &recording_filter(config),
    )
    .await?;

    println!("{} watchable recordings", page.count);
    for recording in &page.results {
        println!(
            "{}  {:>7.1}s  {:>4} interactions  {}",
            recording.id,
            recording.duration_secs(),
            recording.interaction_count(),
            recording.start_url.as_deref().unwrap_or("-")
        );
    }
    if page.next.is_some() {
        let offset = args.offset.unwrap_or(0) + config.upstream.list_page_size;
        println!("More available: --offset {}", offset);
    }
    Ok(())
}

pub async fn export(config: &RuntimeConfig, args: ExportArgs) -> Result<()> {
    let credentials = stored_credentials(config)?;
    let pipeline = pipeline(config)?;

    let recordings = collect_recordings(
        pipeline.api(),
        &credentials,
        &recording_filter(config),
        args.start.saturating_add(args.count),
        config.upstream.list_page_size,
    )
    .await?;

    if args.start >= recordings.len() {
        bail!(
            "Feed has {} watchable recordings; nothing at position {}",
            recordings.len(),
            args.start
        );
    }

    let mut slot = SessionSlot::default();
    let session = slot.session_for(&credentials, |credentials| {
        PrefetchScheduler::with_limits(
            CredentialedSource::new(pipeline.clone(), credentials.clone()),
            config.feed.prefetch_window,
            config.feed.max_concurrent_fetches,
        )
    });
    session.load(recordings);

    let options = ExportOptions {
        start: args.start,
        count: args.count,
        output: args.output,
    };
    let summary = export_feed(session, &options).await?;

    println!(
        "Exported {} recordings to {}",
        summary.written.len(),
        options.output.display()
    );
    for (id, reason) in &summary.failed {
        println!("  skipped {}: {}", id, reason);
    }
    Ok(())
}

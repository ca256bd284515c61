use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tubedrop::client::ApiClient;
use tubedrop::ui::{self, SessionProgressView};
use tubedrop::utils::validate_locator;
use tubedrop::{ClientConfig, ClientUpdate, DownloadClient, QualitySelector, SessionStatus};

#[derive(Parser)]
#[command(name = "tubedrop")]
#[command(about = "Download videos through a remote download engine")]
struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Engine origin, overrides the config file
    #[arg(long, global = true)]
    api: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show metadata and available formats
    Info { url: String },

    /// Start a download and follow it to completion
    Download {
        url: String,

        #[arg(long, short, default_value_t = QualitySelector::Best)]
        quality: QualitySelector,

        /// Leave the artifact on the engine instead of fetching it
        #[arg(long)]
        no_fetch: bool,
    },

    /// List artifacts already on the engine
    Files,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tubedrop=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = ClientConfig::load(cli.config.as_deref())?;
    if let Some(api) = cli.api {
        config.api_origin = api;
    }

    match cli.command {
        Commands::Info { url } => info(&config, &url).await,
        Commands::Download {
            url,
            quality,
            no_fetch,
        } => download(&config, &url, quality, !no_fetch).await,
        Commands::Files => files(&config).await,
    }
}

async fn info(config: &ClientConfig, url: &str) -> Result<()> {
    validate_locator(url)?;
    let api = ApiClient::from_config(config)?;

    let spinner = ui::spinner("Fetching video info");
    match api.video_info(url.trim()).await {
        Ok(metadata) => {
            spinner.finish_and_clear();
            println!("{}", ui::describe_metadata(&metadata));
            Ok(())
        }
        Err(e) => {
            if e.is_user_correctable() {
                ui::spinner_error(&spinner, &e.to_string());
            } else {
                ui::spinner_error(&spinner, "Could not fetch video info");
            }
            Err(e.into())
        }
    }
}

async fn files(config: &ClientConfig) -> Result<()> {
    let api = ApiClient::from_config(config)?;
    let files = api
        .list_files()
        .await
        .context("Failed to list engine downloads")?;
    if files.is_empty() {
        println!("No files on the engine");
    }
    for file in files {
        println!("{:<50} {:>10}  {}", file.filename, file.size, file.created);
    }
    Ok(())
}

async fn download(
    config: &ClientConfig,
    url: &str,
    quality: QualitySelector,
    fetch: bool,
) -> Result<()> {
    // fail fast, before a channel is opened
    validate_locator(url)?;

    let mut client = if fetch {
        DownloadClient::connect(config)?
    } else {
        DownloadClient::connect_with_retriever(config, None)?
    };

    let outcome = tokio::select! {
        result = follow_download(&mut client, url, quality, fetch) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted");
            Err(anyhow::anyhow!("Interrupted"))
        }
    };

    client.shutdown().await;
    outcome
}

async fn follow_download(
    client: &mut DownloadClient,
    url: &str,
    quality: QualitySelector,
    fetch: bool,
) -> Result<()> {
    let spinner = ui::spinner("Connecting to engine");
    loop {
        match client.next_update().await {
            Some(ClientUpdate::Connected) => break,
            Some(ClientUpdate::ConnectivityError(e)) => {
                spinner.set_message(format!("Connecting to engine ({}), retrying", e))
            }
            Some(_) => {}
            None => {
                ui::spinner_error(&spinner, "Channel stopped");
                bail!("Channel stopped before it opened");
            }
        }
    }
    ui::spinner_success(&spinner, "Connected");

    // a failed preview is not fatal, the engine may still download
    let id = match client.preview(url).await {
        Ok(metadata) => {
            let title = metadata.title.clone();
            let id = client.start_download_with_preview(url, quality, metadata)?;
            println!("{}", console::style(title).bold());
            id
        }
        Err(e) => {
            tracing::warn!(error = %e, "preview failed");
            client.start_download(url, quality)?
        }
    };

    let view = SessionProgressView::new(quality.as_str());
    let mut terminal = None;
    let mut retrieved = !fetch;

    while terminal.is_none() || !retrieved {
        let Some(update) = client.next_update().await else {
            bail!("Channel stopped");
        };

        match update {
            ClientUpdate::SessionChanged { id: changed, status } if changed == id => {
                if let Some(session) = client.session(&id) {
                    view.update(session);
                }
                if status.is_terminal() {
                    terminal = Some(status);
                    if status == SessionStatus::Error {
                        retrieved = true;
                    }
                }
            }
            ClientUpdate::ArtifactSaved { id: saved, path } if saved == id => {
                view.println(&format!("Saved to {}", path.display()));
                retrieved = true;
            }
            ClientUpdate::ArtifactFailed { id: failed, error } if failed == id => {
                bail!("Download finished but retrieval failed: {}", error);
            }
            ClientUpdate::Disconnected => {
                view.println("Channel dropped, reconnecting");
            }
            ClientUpdate::ServerNotice(message) => {
                view.println(&format!("Engine: {}", message));
            }
            _ => {}
        }
    }

    match terminal {
        Some(SessionStatus::Error) => {
            let message = client
                .session(&id)
                .and_then(|s| s.error_message())
                .unwrap_or("unknown error");
            bail!("Download failed: {}", message)
        }
        _ => Ok(()),
    }
}

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use yt_download_mp3::{
    server, utils, AudioSource, Cli, Commands, Config, StreamPipeline,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "yt_download_mp3=debug,tower_http=debug"
    } else {
        "yt_download_mp3=info,tower_http=info"
    };
    let fmt_layer = if cli.json_logs {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(fmt_layer)
        .init();

    let config = Config::load(cli.config.as_deref())?.with_port(cli.port);

    match cli.command() {
        Commands::Serve => {
            // Missing tools are reported but not fatal: they may appear on PATH later.
            let missing = utils::check_dependencies(&config.tools).await;
            for dep in missing {
                tracing::warn!("dependency check: {} not available", dep);
            }

            server::serve(config).await?;
        }
        Commands::Title { url } => {
            let pipeline = StreamPipeline::from_config(&config);
            let title = match pipeline.fetch_title(&url).await {
                Ok(title) => title,
                Err(e) => {
                    tracing::warn!("could not fetch title for {}: {}", url, e);
                    utils::FALLBACK_TITLE.to_string()
                }
            };
            println!("{}", utils::mp3_filename(&title));
        }
        Commands::Fetch { url } => {
            let pipeline = StreamPipeline::from_config(&config);
            let cancel = CancellationToken::new();

            let on_signal = cancel.clone();
            tokio::spawn(async move {
                server::shutdown_signal().await;
                on_signal.cancel();
            });

            let started = std::time::Instant::now();
            let mut stdout = tokio::io::stdout();
            let written = pipeline
                .run(&url, &mut stdout, cancel)
                .await
                .with_context(|| format!("download failed for {}", url))?;

            tracing::info!(
                "wrote {} in {}",
                utils::format_file_size(written),
                utils::format_duration(started.elapsed())
            );
        }
        Commands::Check => {
            let missing = utils::check_dependencies(&config.tools).await;
            if missing.is_empty() {
                println!("All external tools are available.");
            } else {
                println!("Missing tools:");
                for dep in &missing {
                    println!("  • {}", dep);
                }
            }
            config.display();

            if !missing.is_empty() {
                anyhow::bail!("{} required tool(s) missing", missing.len());
            }
        }
    }

    Ok(())
}

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "yt-download-mp3",
    about = "Stream the audio of a video URL as compact MP3",
    version,
    long_about = "A small HTTP service that runs yt-dlp and ffmpeg as a streaming pipeline and returns mono, 16 kHz, 32 kbit/s MP3 suitable for speech-to-text backends with an upload size limit."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file (YAML)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, global = true, env = "PORT")]
    pub port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the HTTP service (default)
    Serve,

    /// Print the filename a download of URL would be given
    Title {
        #[arg(value_name = "URL")]
        url: String,
    },

    /// Stream the MP3 audio of URL to standard output
    Fetch {
        #[arg(value_name = "URL")]
        url: String,
    },

    /// Check that the external tools are available
    Check,
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Serve)
    }
}

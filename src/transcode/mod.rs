use std::process::Stdio;
use tokio::process::Command;

/// Output profile for speech-to-text backends with a fixed upload limit.
///
/// Mono at 16 kHz and 32 kbit/s CBR comes to roughly 2.4 MB per 10 minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mp3Profile {
    pub channels: u8,
    pub sample_rate: u32,
    pub bitrate_kbps: u32,
}

impl Default for Mp3Profile {
    fn default() -> Self {
        Self {
            channels: 1,
            sample_rate: 16_000,
            bitrate_kbps: 32,
        }
    }
}

/// Transcoder wrapper around ffmpeg reading stdin and writing MP3 to stdout
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    ffmpeg_path: String,
    profile: Mp3Profile,
}

impl Ffmpeg {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            profile: Mp3Profile::default(),
        }
    }

    pub fn program(&self) -> &str {
        &self.ffmpeg_path
    }

    pub fn profile(&self) -> Mp3Profile {
        self.profile
    }

    pub fn command(&self) -> Command {
        let channels = self.profile.channels.to_string();
        let sample_rate = self.profile.sample_rate.to_string();
        let bitrate = format!("{}k", self.profile.bitrate_kbps);

        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.args(["-hide_banner", "-loglevel", "error", "-i", "pipe:0"])
            .args(["-ac", &channels])
            .args(["-ar", &sample_rate])
            .args(["-b:a", &bitrate])
            .args(["-f", "mp3", "pipe:1"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

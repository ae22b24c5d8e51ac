use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,

    /// External tool locations
    pub tools: ToolsConfig,

    /// Deadlines and buffer sizes
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listening port (overridden by `PORT` / `--port`)
    pub port: u16,

    /// Deadline for reading a request head, and separately its body, in seconds
    pub read_timeout_secs: u64,

    /// How long a connection may stay open with no request in flight, in seconds
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Extractor program (yt-dlp compatible)
    pub extractor: String,

    /// Transcoder program (ffmpeg compatible)
    pub transcoder: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Deadline for the title probe, in seconds
    pub title_timeout_secs: u64,

    /// Deadline for a whole download, in seconds
    pub pipeline_timeout_secs: u64,

    /// Size of the staging buffer read before headers are sent
    pub peek_bytes: usize,

    /// Upper bound on captured stderr per child
    pub stderr_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            read_timeout_secs: 15,
            idle_timeout_secs: 60,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            extractor: "yt-dlp".to_string(),
            transcoder: "ffmpeg".to_string(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            title_timeout_secs: 30,
            pipeline_timeout_secs: 10 * 60,
            peek_bytes: 4096,
            stderr_limit_bytes: 64 * 1024,
        }
    }
}

impl Config {
    /// Load configuration from an explicit file, a discovered file, or defaults.
    ///
    /// The file is only ever read; a missing file is not created.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Self::discover(),
        };

        let config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path).context("Failed to read config file")?;

        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Parse configuration from YAML text; absent keys keep their defaults
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// First existing config file: `./config.yaml`, then the user config dir
    fn discover() -> Option<PathBuf> {
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Some(local_config);
        }

        dirs::config_dir()
            .map(|dir| dir.join("yt-download-mp3").join("config.yaml"))
            .filter(|path| path.exists())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.tools.extractor.trim().is_empty() {
            anyhow::bail!("tools.extractor must not be empty");
        }
        if self.tools.transcoder.trim().is_empty() {
            anyhow::bail!("tools.transcoder must not be empty");
        }
        if self.server.read_timeout_secs == 0
            || self.server.idle_timeout_secs == 0
            || self.limits.title_timeout_secs == 0
            || self.limits.pipeline_timeout_secs == 0
        {
            anyhow::bail!("timeouts must be greater than zero");
        }
        if self.limits.peek_bytes == 0 {
            anyhow::bail!("limits.peek_bytes must be greater than zero");
        }

        Ok(())
    }

    /// Override the listening port
    pub fn with_port(mut self, port: Option<u16>) -> Self {
        if let Some(port) = port {
            self.server.port = port;
        }
        self
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Port: {}", self.server.port);
        println!("  Extractor: {}", self.tools.extractor);
        println!("  Transcoder: {}", self.tools.transcoder);
        println!(
            "  Read/idle timeout: {}s/{}s",
            self.server.read_timeout_secs, self.server.idle_timeout_secs
        );
        println!("  Title timeout: {}s", self.limits.title_timeout_secs);
        println!("  Pipeline timeout: {}s", self.limits.pipeline_timeout_secs);
        println!("  Peek buffer: {} bytes", self.limits.peek_bytes);
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.server.read_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.server.idle_timeout_secs)
    }

    pub fn title_timeout(&self) -> Duration {
        Duration::from_secs(self.limits.title_timeout_secs)
    }

    pub fn pipeline_timeout(&self) -> Duration {
        Duration::from_secs(self.limits.pipeline_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.read_timeout(), Duration::from_secs(15));
        assert_eq!(config.idle_timeout(), Duration::from_secs(60));
        assert_eq!(config.tools.extractor, "yt-dlp");
        assert_eq!(config.tools.transcoder, "ffmpeg");
        assert_eq!(config.title_timeout(), Duration::from_secs(30));
        assert_eq!(config.pipeline_timeout(), Duration::from_secs(600));
        assert_eq!(config.limits.peek_bytes, 4096);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = Config::from_yaml(
            "tools:\n  extractor: /opt/bin/yt-dlp\nlimits:\n  pipeline_timeout_secs: 120\n",
        )
        .unwrap();

        assert_eq!(config.tools.extractor, "/opt/bin/yt-dlp");
        assert_eq!(config.tools.transcoder, "ffmpeg");
        assert_eq!(config.pipeline_timeout(), Duration::from_secs(120));
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config = Config::from_yaml("").unwrap();
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.tools.transcoder = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.limits.pipeline_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.idle_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.limits.peek_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_port_override() {
        let config = Config::default().with_port(Some(9000));
        assert_eq!(config.server.port, 9000);

        let config = Config::default().with_port(None);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs_err::write(&path, "server:\n  port: 9191\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.server.port, 9191);
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("nope.yaml"))).is_err());
    }
}

//! Fake extractor/transcoder scripts for end-to-end tests

#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

use yt_download_mp3::{Ffmpeg, StreamPipeline, YtDlp};

/// Prints `Hello / World` in title mode and raw bytes in stream mode
pub const EXTRACTOR_OK: &str = r#"
case "$*" in
  *--print*) echo "Hello / World" ;;
  *) printf 'raw-audio-container' ;;
esac
"#;

/// Fails immediately without producing any bytes
pub const EXTRACTOR_FAIL: &str = r#"
echo "ERROR: Unsupported URL: $*" >&2
exit 1
"#;

/// Title lookup fails; the stream still works
pub const EXTRACTOR_NO_TITLE: &str = r#"
case "$*" in
  *--print*) echo "ERROR: no title" >&2; exit 1 ;;
  *) printf 'raw-audio-container' ;;
esac
"#;

/// Title lookup fails with far more stderr than anyone should keep
pub const EXTRACTOR_NOISY_TITLE: &str = r#"
head -c 200000 /dev/zero | tr '\0' 'e' >&2
exit 1
"#;

/// Records its pid next to the script, then streams until killed
pub const EXTRACTOR_ENDLESS: &str = r#"
case "$*" in
  *--print*) echo "Endless" ;;
  *) echo $$ > "$(dirname "$0")/yt-dlp.pid"; exec yes ;;
esac
"#;

/// Records its pid next to the script, then never writes
pub const EXTRACTOR_SILENT: &str = r#"
case "$*" in
  *--print*) echo "Silent" ;;
  *) echo $$ > "$(dirname "$0")/yt-dlp.pid"; exec sleep 30 ;;
esac
"#;

/// Records its pid next to the script, then copies stdin to stdout
pub const TRANSCODER_PASSTHROUGH: &str = r#"
echo $$ > "$(dirname "$0")/ffmpeg.pid"
exec cat
"#;

/// Consumes stdin, then emits the two MP3 bytes AB CD; fails on empty input
pub const TRANSCODER_OK: &str = r#"
if [ -z "$(head -c 1)" ]; then
  echo "pipe:0: End of file" >&2
  exit 1
fi
cat > /dev/null
printf '\253\315'
"#;

/// Consumes stdin, then fails without output
pub const TRANSCODER_FAIL: &str = r#"
cat > /dev/null
echo "pipe:0: Invalid data found when processing input" >&2
exit 1
"#;

pub struct FakeTools {
    dir: TempDir,
    pub extractor: PathBuf,
    pub transcoder: PathBuf,
}

impl FakeTools {
    pub fn new(extractor: &str, transcoder: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let extractor_path = write_script(dir.path(), "yt-dlp", extractor);
        let transcoder_path = write_script(dir.path(), "ffmpeg", transcoder);

        Self {
            dir,
            extractor: extractor_path,
            transcoder: transcoder_path,
        }
    }

    pub fn pipeline(&self, timeout: Duration) -> StreamPipeline {
        StreamPipeline::new(
            YtDlp::new(self.extractor.to_string_lossy(), Duration::from_secs(5)),
            Ffmpeg::new(self.transcoder.to_string_lossy()),
            timeout,
        )
    }

    /// Pid a script recorded as `<name>.pid`, waiting briefly for it to appear
    pub async fn pid(&self, name: &str) -> u32 {
        let path = self.dir.path().join(format!("{}.pid", name));
        for _ in 0..100 {
            if let Ok(content) = std::fs::read_to_string(&path) {
                if let Ok(pid) = content.trim().parse() {
                    return pid;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("{} never recorded its pid", name);
    }

    /// Files in the scripts directory, to check nothing else was written
    pub fn files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.dir.path())
            .expect("read temp dir")
            .map(|entry| entry.expect("dir entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}", body)).expect("write script");
    let mut perms = std::fs::metadata(&path).expect("script metadata").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod script");
    path
}

/// Whether a process with this pid still exists (zombies included)
pub fn is_alive(pid: u32) -> bool {
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stderr(std::process::Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Wait up to five seconds for a process to be gone
pub async fn wait_gone(pid: u32) -> bool {
    for _ in 0..250 {
        if !is_alive(pid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

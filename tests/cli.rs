use assert_cmd::Command;
use predicates::prelude::*;

fn bin() -> Command {
    let mut cmd = Command::cargo_bin("yt-download-mp3").unwrap();
    cmd.env_remove("PORT").env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_version() {
    bin()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_help_lists_commands() {
    bin()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("fetch"))
        .stdout(predicate::str::contains("check"));
}

#[test]
fn test_title_falls_back_when_extractor_missing() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.yaml");
    std::fs::write(&config, "tools:\n  extractor: /nonexistent/yt-dlp\n").unwrap();

    bin()
        .arg("--config")
        .arg(&config)
        .args(["title", "https://example.com/v"])
        .assert()
        .success()
        .stdout("audio.mp3\n");
}

#[test]
fn test_check_fails_when_tools_missing() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.yaml");
    std::fs::write(
        &config,
        "tools:\n  extractor: /nonexistent/yt-dlp\n  transcoder: /nonexistent/ffmpeg\n",
    )
    .unwrap();

    bin()
        .arg("--config")
        .arg(&config)
        .arg("check")
        .assert()
        .failure()
        .stdout(predicate::str::contains("/nonexistent/yt-dlp"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.yaml");
    std::fs::write(&config, "limits:\n  peek_bytes: 0\n").unwrap();

    bin()
        .arg("--config")
        .arg(&config)
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("peek_bytes"));
}

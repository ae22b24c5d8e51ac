use std::time::Duration;
use unicode_general_category::{get_general_category, GeneralCategory};
use url::Url;

use crate::config::ToolsConfig;

/// Name used when no usable title is available
pub const FALLBACK_TITLE: &str = "audio";

/// Unicode letter (any `L*` category) or decimal digit (`Nd`)
pub fn is_letter_or_digit(c: char) -> bool {
    matches!(
        get_general_category(c),
        GeneralCategory::UppercaseLetter
            | GeneralCategory::LowercaseLetter
            | GeneralCategory::TitlecaseLetter
            | GeneralCategory::ModifierLetter
            | GeneralCategory::OtherLetter
            | GeneralCategory::DecimalNumber
    )
}

/// Map an arbitrary title to a token safe for a Content-Disposition filename.
///
/// Letters, decimal digits and ` -_.()[]` are kept; every other character
/// becomes a single underscore. Never returns an empty string.
pub fn sanitize_filename(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|c| match c {
            c if is_letter_or_digit(c) => c,
            ' ' | '-' | '_' | '.' | '(' | ')' | '[' | ']' => c,
            _ => '_',
        })
        .collect();

    let trimmed = replaced.trim();
    if trimmed.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Suggested attachment name for a title
pub fn mp3_filename(title: &str) -> String {
    format!("{}.mp3", sanitize_filename(title))
}

/// Format byte counts in human-readable form
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

/// Format elapsed time in human-readable form
pub fn format_duration(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let (minutes, secs) = (total / 60, total % 60);

    if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}.{}s", secs, elapsed.subsec_millis() / 100)
    }
}

/// Host part of a URL for log fields, without a leading `www.`
pub fn extract_domain(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_string())
}

/// Check that the configured tools answer a version query.
///
/// Returns one line per missing tool.
pub async fn check_dependencies(tools: &ToolsConfig) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available(&tools.extractor, "--version").await {
        missing.push(format!(
            "{} - required to fetch titles and audio streams",
            tools.extractor
        ));
    }

    if !check_command_available(&tools.transcoder, "-version").await {
        missing.push(format!(
            "{} - required to transcode audio to MP3",
            tools.transcoder
        ));
    }

    missing
}

async fn check_command_available(command: &str, version_flag: &str) -> bool {
    use std::process::Stdio;
    use tokio::process::Command;

    Command::new(command)
        .arg(version_flag)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALLOWED_PUNCT: &[char] = &[' ', '-', '_', '.', '(', ')', '[', ']'];

    fn samples() -> Vec<&'static str> {
        vec![
            "",
            "   ",
            "Hello / World",
            "Ünïcödé 名前 ٣",
            "a\tb\nc",
            "../../etc/passwd",
            "\"quoted\" <tag>",
            "?!?   ",
            "  [Live] (2024) - Track_01.  ",
            "emoji 🎵 title",
            "\u{3000}wide space\u{3000}",
            "x\u{B2}\u{BD}\u{216B}\u{93E}",
            "Ⅻ th ½ ²",
        ]
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Hello World!"), "Hello World_");
        assert_eq!(sanitize_filename("Hello / World"), "Hello _ World");
        assert_eq!(sanitize_filename("test/file?name"), "test_file_name");
        assert_eq!(sanitize_filename("  spaced  "), "spaced");
        assert_eq!(sanitize_filename("a::b"), "a__b");
        assert_eq!(sanitize_filename("Track (1) [HD].v2"), "Track (1) [HD].v2");
    }

    #[test]
    fn test_sanitize_keeps_unicode_letters() {
        assert_eq!(sanitize_filename("Café Übung"), "Café Übung");
        assert_eq!(sanitize_filename("日本語"), "日本語");
    }

    #[test]
    fn test_sanitize_drops_non_decimal_numbers_and_marks() {
        // No: superscript two, vulgar half; Nl: roman numeral twelve; Mc: devanagari sign aa
        assert_eq!(sanitize_filename("x\u{B2}\u{BD}\u{216B}\u{93E}"), "x____");
        assert_eq!(sanitize_filename("track ٣ 7"), "track ٣ 7");
    }

    #[test]
    fn test_letter_or_digit_classes() {
        for c in ['a', 'Z', 'ǅ', 'ʰ', '名', '٣', '7'] {
            assert!(is_letter_or_digit(c), "{:?} should be kept", c);
        }
        for c in ['\u{B2}', '\u{BD}', '\u{216B}', '\u{93E}', '\u{301}', '/', '"', ' '] {
            assert!(!is_letter_or_digit(c), "{:?} should be replaced", c);
        }
    }

    #[test]
    fn test_sanitize_falls_back_when_empty() {
        assert_eq!(sanitize_filename(""), FALLBACK_TITLE);
        assert_eq!(sanitize_filename("    "), FALLBACK_TITLE);
        assert_eq!(sanitize_filename("\u{3000}"), "_");
    }

    #[test]
    fn test_sanitize_output_is_whitelisted_and_non_empty() {
        for input in samples() {
            let out = sanitize_filename(input);
            assert!(!out.is_empty(), "empty output for {:?}", input);
            assert!(
                out.chars()
                    .all(|c| is_letter_or_digit(c) || ALLOWED_PUNCT.contains(&c)),
                "unexpected character in {:?}",
                out
            );
        }
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        for input in samples() {
            let once = sanitize_filename(input);
            assert_eq!(sanitize_filename(&once), once, "input {:?}", input);
        }
    }

    #[test]
    fn test_mp3_filename() {
        assert_eq!(mp3_filename("Hello / World"), "Hello _ World.mp3");
        assert_eq!(mp3_filename(""), "audio.mp3");
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1024), "1.0 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(2_400_000), "2.3 MB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            extract_domain("https://www.youtube.com/watch?v=123"),
            Some("youtube.com".to_string())
        );
        assert_eq!(
            extract_domain("https://vimeo.com/123"),
            Some("vimeo.com".to_string())
        );
        assert_eq!(extract_domain("not a url"), None);
    }
}

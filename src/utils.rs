//! Utility functions for file naming and URL intake

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

/// Longest file name most filesystems accept, in bytes
const MAX_FILE_NAME_BYTES: usize = 255;

/// Name used when sanitizing leaves nothing behind
const FALLBACK_FILE_NAME: &str = "untitled";

/// Device names Windows refuses as file names, regardless of extension
const RESERVED_DEVICE_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

#[allow(clippy::expect_used)]
static URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(?:https?://|www\.)[^\s<>"'`]+"#).expect("URL pattern is valid")
});

#[allow(clippy::expect_used)]
static NUMBERED_PREFIX_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{3,}) - ").expect("prefix pattern is valid"));

/// Turn arbitrary text (a video title, a channel name) into a safe file name
///
/// - `\ / : * ? " < > |` and control characters become `_`
/// - whitespace runs collapse to one space
/// - the result is bounded to 255 bytes, cut on a char boundary
/// - surrounding whitespace and leading/trailing dots are stripped
/// - Windows device names (`CON`, `com1.txt`, ...) get a `_` prefix
/// - an empty result becomes `untitled`
///
/// The function is idempotent: sanitizing a sanitized name returns it unchanged.
///
/// # Examples
///
/// ```
/// use media_dl::utils::sanitize_file_name;
///
/// assert_eq!(sanitize_file_name("AC/DC: Live?"), "AC_DC_ Live_");
/// assert_eq!(sanitize_file_name("con.mp4"), "_con.mp4");
/// assert_eq!(sanitize_file_name(" ... "), "untitled");
/// ```
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let bounded = truncate_on_char_boundary(&collapsed, MAX_FILE_NAME_BYTES);
    let stripped = strip_edges(bounded);

    if stripped.is_empty() {
        return FALLBACK_FILE_NAME.to_string();
    }

    if is_reserved_device_name(stripped) {
        let shortened = strip_edges(truncate_on_char_boundary(
            stripped,
            MAX_FILE_NAME_BYTES - 1,
        ));
        return format!("_{shortened}");
    }

    stripped.to_string()
}

/// Trim whitespace and dots from both ends until nothing changes
fn strip_edges(mut s: &str) -> &str {
    loop {
        let next = s.trim().trim_matches('.');
        if next.len() == s.len() {
            return next;
        }
        s = next;
    }
}

fn truncate_on_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn is_reserved_device_name(name: &str) -> bool {
    let stem = name.split('.').next().unwrap_or(name).trim_end();
    let upper = stem.to_ascii_uppercase();
    RESERVED_DEVICE_NAMES.contains(&upper.as_str())
}

/// Pull every http(s) URL out of free text (one per line, pasted lists, chat logs)
///
/// Bare `www.` links are normalized to `https://www.`. Trailing punctuation that
/// commonly follows a link in prose is dropped, and duplicates are removed while
/// keeping first-seen order.
///
/// # Examples
///
/// ```
/// use media_dl::utils::extract_urls;
///
/// let urls = extract_urls("see www.youtube.com/watch?v=abc, and (https://youtu.be/xyz).");
/// assert_eq!(urls, vec![
///     "https://www.youtube.com/watch?v=abc".to_string(),
///     "https://youtu.be/xyz".to_string(),
/// ]);
/// ```
#[must_use]
pub fn extract_urls(text: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for found in URL_REGEX.find_iter(text) {
        let trimmed = found
            .as_str()
            .trim_end_matches(['.', ',', ';', ':', '!', '?', ')', ']', '}']);
        if trimmed.is_empty() {
            continue;
        }
        let url = normalize_url(trimmed);
        if !urls.contains(&url) {
            urls.push(url);
        }
    }
    urls
}

/// Prefix a bare `www.` host with `https://`; everything else is returned trimmed
#[must_use]
pub fn normalize_url(raw: &str) -> String {
    let raw = raw.trim();
    if raw.len() >= 4 && raw[..4].eq_ignore_ascii_case("www.") {
        format!("https://{raw}")
    } else {
        raw.to_string()
    }
}

/// Read the ordinal of a `"NNN - "` numbered file name
///
/// Returns `None` for names without a numbered prefix.
///
/// ```
/// use media_dl::utils::numbered_prefix;
///
/// assert_eq!(numbered_prefix("007 - Intro.mp4"), Some(7));
/// assert_eq!(numbered_prefix("Intro.mp4"), None);
/// ```
#[must_use]
pub fn numbered_prefix(file_name: &str) -> Option<u32> {
    NUMBERED_PREFIX_REGEX
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Highest `"NNN - "` ordinal among the files directly inside `dir`
///
/// Returns `None` when the directory is missing, unreadable or holds no numbered
/// files.
pub fn max_numbered_prefix(dir: &Path) -> Option<u32> {
    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name();
            numbered_prefix(&name.to_string_lossy())
        })
        .max()
}

/// Ordinal the next file in `dir` should get: highest existing prefix + 1, or 1
pub fn next_ordinal_in(dir: &Path) -> u32 {
    max_numbered_prefix(dir).map_or(1, |max| max.saturating_add(1))
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_characters_are_replaced() {
        assert_eq!(
            sanitize_file_name(r#"a\b/c:d*e?f"g<h>i|j"#),
            "a_b_c_d_e_f_g_h_i_j"
        );
        assert_eq!(sanitize_file_name("tab\there"), "tab_here");
        assert_eq!(sanitize_file_name("nul\0byte"), "nul_byte");
    }

    #[test]
    fn whitespace_is_collapsed_and_trimmed() {
        assert_eq!(
            sanitize_file_name("  Lofi   Beats \u{3000} to study  "),
            "Lofi Beats to study"
        );
    }

    #[test]
    fn leading_and_trailing_dots_are_stripped_until_stable() {
        assert_eq!(sanitize_file_name("..hidden.."), "hidden");
        assert_eq!(sanitize_file_name(". . name . ."), "name");
        assert_eq!(sanitize_file_name("..."), "untitled");
        assert_eq!(sanitize_file_name(""), "untitled");
    }

    #[test]
    fn reserved_device_names_get_prefixed() {
        assert_eq!(sanitize_file_name("CON"), "_CON");
        assert_eq!(sanitize_file_name("con.mp4"), "_con.mp4");
        assert_eq!(sanitize_file_name("Lpt9.tar.gz"), "_Lpt9.tar.gz");
        assert_eq!(sanitize_file_name("CONSOLE.txt"), "CONSOLE.txt");
        assert_eq!(sanitize_file_name("COM0"), "COM0");
    }

    #[test]
    fn long_names_are_cut_on_a_char_boundary() {
        let long = "é".repeat(200); // 400 bytes
        let sanitized = sanitize_file_name(&long);
        assert!(sanitized.len() <= MAX_FILE_NAME_BYTES);
        assert!(sanitized.chars().all(|c| c == 'é'));

        let reserved_long = format!("nul.{}", "a".repeat(300));
        let sanitized = sanitize_file_name(&reserved_long);
        assert!(sanitized.starts_with("_nul."));
        assert_eq!(sanitized.len(), MAX_FILE_NAME_BYTES);
    }

    #[test]
    fn sanitize_is_idempotent() {
        let inputs = [
            "AC/DC: Back In Black (Official Video)",
            "  ..weird.. name..  ",
            "aux.mkv",
            "COM3",
            "日本語のタイトル｜公式",
            "\u{7f}\u{1b}[31mred",
            "a.",
            &"x ".repeat(300),
            &format!("prn.{}", "ü".repeat(200)),
        ];
        for input in inputs {
            let once = sanitize_file_name(input);
            assert_eq!(sanitize_file_name(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn extract_urls_finds_links_in_prose() {
        let text = "Playlist: https://www.youtube.com/playlist?list=PL123\n\
                    also www.youtube.com/@SomeChannel. And again https://www.youtube.com/playlist?list=PL123";
        assert_eq!(
            extract_urls(text),
            vec![
                "https://www.youtube.com/playlist?list=PL123".to_string(),
                "https://www.youtube.com/@SomeChannel".to_string(),
            ]
        );
    }

    #[test]
    fn extract_urls_on_plain_text_is_empty() {
        assert!(extract_urls("nothing to see here").is_empty());
    }

    #[test]
    fn normalize_url_only_touches_bare_www() {
        assert_eq!(normalize_url("WWW.example.com"), "https://WWW.example.com");
        assert_eq!(normalize_url(" https://youtu.be/x "), "https://youtu.be/x");
    }

    #[test]
    fn numbered_prefix_requires_three_digits_and_separator() {
        assert_eq!(numbered_prefix("001 - a.mp3"), Some(1));
        assert_eq!(numbered_prefix("1234 - a.mp3"), Some(1234));
        assert_eq!(numbered_prefix("01 - a.mp3"), None);
        assert_eq!(numbered_prefix("001-a.mp3"), None);
    }

    #[test]
    fn next_ordinal_scans_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(next_ordinal_in(dir.path()), 1);

        std::fs::write(dir.path().join("003 - c.mp4"), b"").unwrap();
        std::fs::write(dir.path().join("010 - j.mp4"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        assert_eq!(max_numbered_prefix(dir.path()), Some(10));
        assert_eq!(next_ordinal_in(dir.path()), 11);
    }

    #[test]
    fn next_ordinal_of_missing_directory_is_one() {
        assert_eq!(next_ordinal_in(Path::new("/definitely/not/here")), 1);
    }
}

use std::borrow::Cow;
use std::io::{ErrorKind, Read};
use std::path::Path;
use tracing::{trace, warn};

use super::matcher::QueryMatcher;
use crate::config::EncodingMode;
use crate::errors::{Result, SearchError};

/// Bytes requested from the reader per read call
pub(crate) const CHUNK_SIZE: usize = 16 * 1024;

/// A matching line inside one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMatch {
    /// 1-based line number
    pub line_number: usize,
    /// Trimmed line, windowed around the match when long
    pub text: String,
}

/// Scans file contents line by line for a query.
///
/// Input is consumed in fixed-size chunks. Lines are split on `\n` at the
/// byte level, so a line (or a multi-byte character) cut in half by a chunk
/// boundary is carried over and completed by the next read; line numbers
/// therefore never depend on the chunk size.
#[derive(Debug, Clone)]
pub struct ContentScanner {
    matcher: QueryMatcher,
    max_matches: usize,
    line_window: usize,
    encoding_mode: EncodingMode,
    chunk_size: usize,
}

impl ContentScanner {
    pub fn new(
        matcher: QueryMatcher,
        max_matches: usize,
        line_window: usize,
        encoding_mode: EncodingMode,
    ) -> Self {
        Self {
            matcher,
            max_matches: max_matches.max(1),
            line_window,
            encoding_mode,
            chunk_size: CHUNK_SIZE,
        }
    }

    /// Overrides the read size; small values exercise boundary handling
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Opens and scans a file on the local filesystem
    pub fn scan_file(&self, path: &Path) -> Result<Vec<LineMatch>> {
        let file = std::fs::File::open(path)?;
        self.scan(path, file, || false)
    }

    /// Scans `reader`, stopping early at the match cap or when `should_stop`
    /// returns true. `path` is only used for diagnostics.
    pub fn scan<R, F>(&self, path: &Path, mut reader: R, should_stop: F) -> Result<Vec<LineMatch>>
    where
        R: Read,
        F: Fn() -> bool,
    {
        trace!("Scanning contents of {}", path.display());

        let mut chunk = vec![0u8; self.chunk_size];
        let mut pending: Vec<u8> = Vec::with_capacity(self.chunk_size * 2);
        let mut matches = Vec::new();
        let mut line_number = 0;
        let mut warned_lossy = false;

        loop {
            if should_stop() {
                return Ok(matches);
            }

            let read = match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(SearchError::IoError(e)),
            };
            pending.extend_from_slice(&chunk[..read]);

            let mut consumed = 0;
            while let Some(offset) = pending[consumed..].iter().position(|&b| b == b'\n') {
                let line = &pending[consumed..consumed + offset];
                consumed += offset + 1;
                line_number += 1;

                self.check_line(path, line, line_number, &mut matches, &mut warned_lossy)?;
                if matches.len() >= self.max_matches || should_stop() {
                    return Ok(matches);
                }
            }
            pending.drain(..consumed);
        }

        // Final line without a terminating newline
        if !pending.is_empty() {
            line_number += 1;
            self.check_line(path, &pending, line_number, &mut matches, &mut warned_lossy)?;
        }

        Ok(matches)
    }

    fn check_line(
        &self,
        path: &Path,
        raw: &[u8],
        line_number: usize,
        matches: &mut Vec<LineMatch>,
        warned_lossy: &mut bool,
    ) -> Result<()> {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let line: Cow<'_, str> = match self.encoding_mode {
            EncodingMode::FailFast => Cow::Borrowed(
                std::str::from_utf8(raw).map_err(|e| SearchError::encoding_error(path, e))?,
            ),
            EncodingMode::Lossy => {
                let decoded = String::from_utf8_lossy(raw);
                if matches!(decoded, Cow::Owned(_)) && !*warned_lossy {
                    warn!("Invalid UTF-8 replaced in file: {}", path.display());
                    *warned_lossy = true;
                }
                decoded
            }
        };

        if !self.matcher.is_match(&line) {
            return Ok(());
        }

        let trimmed = line.trim();
        let text = match self.matcher.find(trimmed) {
            Some((start, _)) => window_line(trimmed, start, self.line_window),
            None => trimmed.to_string(),
        };
        trace!("Match at {}:{}", path.display(), line_number);
        matches.push(LineMatch { line_number, text });
        Ok(())
    }
}

/// Shortens `line` to roughly `window` characters around the match at byte
/// offset `match_start`, marking cut ends with "...".
///
/// A match near the start keeps the head of the line. A match further in
/// gets a window that opens a fifth of `window` before it.
pub fn window_line(line: &str, match_start: usize, window: usize) -> String {
    let total = line.chars().count();
    if total <= window {
        return line.to_string();
    }

    let match_char = line[..match_start].chars().count();
    let lead = window / 5;
    let span = window - lead;

    if match_char > window / 3 {
        let from = match_char - lead;
        let body: String = line.chars().skip(from).take(span).collect();
        if from + span < total {
            format!("...{}...", body)
        } else {
            format!("...{}", body)
        }
    } else {
        let head: String = line.chars().take(window).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn scanner(query: &str) -> ContentScanner {
        ContentScanner::new(QueryMatcher::new(query).unwrap(), 3, 150, EncodingMode::FailFast)
    }

    fn scan_str(scanner: &ContentScanner, content: &str) -> Vec<LineMatch> {
        scanner
            .scan(Path::new("test.txt"), Cursor::new(content.as_bytes().to_vec()), || false)
            .unwrap()
    }

    #[test]
    fn test_single_line_without_newline() {
        let matches = scan_str(&scanner("hello"), "hello world");
        assert_eq!(
            matches,
            vec![LineMatch {
                line_number: 1,
                text: "hello world".to_string()
            }]
        );
    }

    #[test]
    fn test_line_numbers_and_trimming() {
        let content = "first\n  second HELLO line \r\nthird\n\thello again\n";
        let matches = scan_str(&scanner("hello"), content);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].line_number, 2);
        assert_eq!(matches[0].text, "second HELLO line");
        assert_eq!(matches[1].line_number, 4);
        assert_eq!(matches[1].text, "hello again");
    }

    #[test]
    fn test_per_file_cap() {
        let content = "needle\n".repeat(10);
        let matches = scan_str(&scanner("needle"), &content);
        assert_eq!(matches.len(), 3);
        assert_eq!(
            matches.iter().map(|m| m.line_number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_chunk_boundary_handling() {
        let mut content = String::new();
        for i in 0..200 {
            content.push_str(&format!("line {} filler text", i));
            if i % 3 == 0 {
                content.push_str(" with some extra padding");
            }
            content.push('\n');
        }
        content.push_str("the target_marker sits here\n");
        let expected_line = 201;

        for chunk_size in [1, 7, 16, 64, 1000, CHUNK_SIZE] {
            let matches = scan_str(&scanner("TARGET_MARKER").with_chunk_size(chunk_size), &content);
            assert_eq!(matches.len(), 1, "chunk size {}", chunk_size);
            assert_eq!(matches[0].line_number, expected_line, "chunk size {}", chunk_size);
            assert_eq!(matches[0].text, "the target_marker sits here");
        }
    }

    #[test]
    fn test_multibyte_split_across_chunks() {
        let content = "ééééé\nnaïve café\n";
        for chunk_size in 1..8 {
            let matches = scan_str(&scanner("CAFÉ").with_chunk_size(chunk_size), content);
            assert_eq!(matches.len(), 1, "chunk size {}", chunk_size);
            assert_eq!(matches[0].line_number, 2);
            assert_eq!(matches[0].text, "naïve café");
        }
    }

    #[test]
    fn test_invalid_utf8_fails_fast() {
        let bytes = b"hello\n\xff\xfe hello\n".to_vec();
        let result = scanner("hello").scan(Path::new("bin.txt"), Cursor::new(bytes), || false);
        assert!(matches!(result, Err(SearchError::EncodingError { .. })));
    }

    #[test]
    fn test_invalid_utf8_lossy() {
        let bytes = b"\xff\xfe hello\nplain hello\n".to_vec();
        let scanner = ContentScanner::new(
            QueryMatcher::new("hello").unwrap(),
            3,
            150,
            EncodingMode::Lossy,
        );
        let matches = scanner
            .scan(Path::new("bin.txt"), Cursor::new(bytes), || false)
            .unwrap();
        assert_eq!(matches.len(), 2);
        assert!(matches[0].text.contains('\u{FFFD}'));
    }

    #[test]
    fn test_stop_requested() {
        let content = "hello\n".repeat(5);
        let matches = scanner("hello")
            .scan(Path::new("t.txt"), Cursor::new(content.into_bytes()), || true)
            .unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_window_short_line_untouched() {
        assert_eq!(window_line("short line", 0, 150), "short line");
    }

    #[test]
    fn test_window_match_near_start() {
        let line = format!("match {}", "x".repeat(200));
        let windowed = window_line(&line, 0, 150);
        assert_eq!(windowed.chars().count(), 153);
        assert!(windowed.starts_with("match "));
        assert!(windowed.ends_with("..."));
    }

    #[test]
    fn test_window_match_far_in() {
        let line = format!("{}NEEDLE{}", "a".repeat(100), "b".repeat(100));
        let windowed = window_line(&line, 100, 150);
        assert!(windowed.starts_with("..."));
        assert!(windowed.ends_with("..."));
        // 30 characters of lead-in precede the match
        assert_eq!(&windowed[3..33], "a".repeat(30));
        assert_eq!(&windowed[33..39], "NEEDLE");
        assert_eq!(windowed.chars().count(), 3 + 120 + 3);
    }

    #[test]
    fn test_window_match_near_end() {
        let line = format!("{}NEEDLE", "a".repeat(200));
        let windowed = window_line(&line, 200, 150);
        assert!(windowed.starts_with("..."));
        assert!(windowed.ends_with("NEEDLE"));
    }

    #[test]
    fn test_window_multibyte() {
        let line = format!("{}ñeedle{}", "ü".repeat(90), "ö".repeat(90));
        let start = line.find("ñeedle").unwrap();
        let windowed = window_line(&line, start, 150);
        assert!(windowed.contains("ñeedle"));
    }
}

//! Input line parsing

use anyhow::{bail, Result};

/// Parse a `key=value` line
///
/// Blank lines and `#` comments yield `Ok(None)`. Whitespace around key and
/// value is trimmed; the value may be empty and may contain `=`.
pub fn parse_line(line: &str) -> Result<Option<(String, String)>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let Some((key, value)) = line.split_once('=') else {
        bail!("expected key=value, got {:?}", line);
    };

    let key = key.trim();
    if key.is_empty() {
        bail!("empty key in {:?}", line);
    }

    Ok(Some((key.to_string(), value.trim().to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_line("player-1 = 42").unwrap(),
            Some(("player-1".to_string(), "42".to_string()))
        );
    }

    #[test]
    fn test_value_may_contain_separator() {
        assert_eq!(
            parse_line("q=a=b").unwrap(),
            Some(("q".to_string(), "a=b".to_string()))
        );
        assert_eq!(parse_line("k=").unwrap(), Some(("k".to_string(), String::new())));
    }

    #[test]
    fn test_blank_and_comment_lines_skipped() {
        assert_eq!(parse_line("").unwrap(), None);
        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(parse_line("# note").unwrap(), None);
    }

    #[test]
    fn test_malformed_lines_rejected() {
        assert!(parse_line("no separator").is_err());
        assert!(parse_line(" = value").is_err());
    }
}

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

/// Parse a port list into deduplicated TCP ports (1..=65535), keeping the
/// order of first appearance.
///
/// Accepted per token, with tokens separated by commas, whitespace or
/// newlines:
/// - single port number: `80`
/// - inclusive range: `8000-8010`
/// - comments: everything after `#` on a line is ignored
pub fn parse_port_list(s: &str) -> Result<Vec<u16>> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();

    for (idx, raw_line) in s.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.split('#').next().unwrap_or("");
        let tokens = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty());

        for token in tokens {
            let (start, end) = match token.split_once('-') {
                Some((a, b)) => (
                    parse_port(a).with_context(|| {
                        format!("line {line_no}: invalid start in range: {token}")
                    })?,
                    parse_port(b).with_context(|| {
                        format!("line {line_no}: invalid end in range: {token}")
                    })?,
                ),
                None => {
                    let p = parse_port(token)
                        .with_context(|| format!("line {line_no}: invalid port value: {token}"))?;
                    (p, p)
                }
            };
            if start > end {
                bail!("line {line_no}: invalid range {start}-{end} (start > end)");
            }
            out.extend((start..=end).filter(|p| seen.insert(*p)));
        }
    }

    Ok(out)
}

/// Load a port list from a file.
pub fn load_port_list(path: impl AsRef<Path>) -> Result<Vec<u16>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read ports file: {}", path.display()))?;
    parse_port_list(&content)
}

/// A port list given on the command line: either a path to a list file
/// (prefixed with `@`) or the list itself.
pub fn parse_port_arg(arg: &str) -> Result<Vec<u16>> {
    match arg.strip_prefix('@') {
        Some(path) => load_port_list(path),
        None => parse_port_list(arg),
    }
}

fn parse_port(s: &str) -> Result<u16> {
    let val: u32 = s.trim().parse()?;
    if val == 0 || val > 65535 {
        bail!("port out of range: {val}");
    }
    Ok(val as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comma_separated_like_the_settings_field() {
        assert_eq!(parse_port_list("22, 80,443 , 8080").unwrap(), vec![22, 80, 443, 8080]);
    }

    #[test]
    fn ranges_dedup_and_keep_first_order() {
        let ports = parse_port_list("8000-8002\n80\n8001,80").unwrap();
        assert_eq!(ports, vec![8000, 8001, 8002, 80]);
    }

    #[test]
    fn comments_and_blank_lines() {
        let input = r#"
            # web
            80  # http
            443 # https

            9100
        "#;
        assert_eq!(parse_port_list(input).unwrap(), vec![80, 443, 9100]);
    }

    #[test]
    fn invalid_values_error_with_line_context() {
        let err = parse_port_list("80\n70000\n").unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
        assert!(parse_port_list("0").is_err());
        assert!(parse_port_list("90-80").is_err());
        assert!(parse_port_list("http").is_err());
    }

    #[test]
    fn empty_input_is_empty_list() {
        assert!(parse_port_list("").unwrap().is_empty());
        assert!(parse_port_list(" , ,").unwrap().is_empty());
    }
}

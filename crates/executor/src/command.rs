//! Command units and the input loader
//!
//! A command line is tokenised into an explicit program plus arguments.
//! Nothing is passed through a shell: there is no expansion, globbing or
//! piping, only POSIX-like quoting.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConfigError;

/// Program plus arguments parsed from one input line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    /// Tokenise a command line.
    ///
    /// Single quotes are literal, double quotes honour `\"` and `\\`, and a
    /// backslash outside quotes escapes the next character.
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut tokens: Vec<String> = Vec::new();
        let mut current = String::new();
        let mut in_token = false;
        let mut chars = line.chars();

        while let Some(c) = chars.next() {
            match c {
                '\'' => {
                    in_token = true;
                    loop {
                        match chars.next() {
                            Some('\'') => break,
                            Some(ch) => current.push(ch),
                            None => return Err("unterminated single quote".into()),
                        }
                    }
                }
                '"' => {
                    in_token = true;
                    loop {
                        match chars.next() {
                            Some('"') => break,
                            Some('\\') => match chars.next() {
                                Some(esc @ ('"' | '\\')) => current.push(esc),
                                Some(other) => {
                                    current.push('\\');
                                    current.push(other);
                                }
                                None => return Err("unterminated double quote".into()),
                            },
                            Some(ch) => current.push(ch),
                            None => return Err("unterminated double quote".into()),
                        }
                    }
                }
                '\\' => match chars.next() {
                    Some(ch) => {
                        in_token = true;
                        current.push(ch);
                    }
                    None => return Err("trailing backslash".into()),
                },
                c if c.is_whitespace() => {
                    if in_token {
                        tokens.push(std::mem::take(&mut current));
                        in_token = false;
                    }
                }
                c => {
                    in_token = true;
                    current.push(c);
                }
            }
        }
        if in_token {
            tokens.push(current);
        }

        let mut tokens = tokens.into_iter();
        let program = tokens.next().ok_or_else(|| "empty command".to_string())?;
        Ok(Self {
            program,
            args: tokens.collect(),
        })
    }
}

/// One unit of work: the input line text plus its parsed invocation
///
/// Identity is input position + text, so repeated lines are distinct units
/// unless deduplication was requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandUnit {
    /// Zero-based position among the loaded commands
    pub index: usize,
    /// Line text as read (trimmed)
    pub text: String,
    pub invocation: Invocation,
}

impl CommandUnit {
    pub fn new(index: usize, text: impl Into<String>) -> Result<Self, String> {
        let text = text.into();
        let invocation = Invocation::parse(&text)?;
        Ok(Self {
            index,
            text,
            invocation,
        })
    }
}

impl fmt::Display for CommandUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Parse command lines from already-read content.
///
/// Blank lines and `#` comments are skipped and not counted.
pub fn parse_commands(content: &str, dedupe: bool) -> Result<Vec<CommandUnit>, ConfigError> {
    let mut seen = HashSet::new();
    let mut commands = Vec::new();
    let mut duplicates = 0usize;

    for (line_no, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if dedupe && !seen.insert(line.to_string()) {
            duplicates += 1;
            continue;
        }
        let unit = CommandUnit::new(commands.len(), line).map_err(|reason| {
            ConfigError::InvalidCommand {
                line: line_no + 1,
                reason,
            }
        })?;
        commands.push(unit);
    }

    if duplicates > 0 {
        debug!(duplicates, "Dropped duplicate commands");
    }
    Ok(commands)
}

/// Load commands from a newline-delimited file.
///
/// A missing file or one without commands is a configuration error.
pub fn load_commands(path: &Path, dedupe: bool) -> Result<Vec<CommandUnit>, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::InputNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let commands = parse_commands(&content, dedupe)?;
    if commands.is_empty() {
        return Err(ConfigError::EmptyInput(path.to_path_buf()));
    }

    info!(path = %path.display(), count = commands.len(), "Loaded commands");
    Ok(commands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(line: &str) -> Invocation {
        Invocation::parse(line).unwrap()
    }

    #[test]
    fn test_parse_plain_words() {
        let inv = parse("sendevent -E CHANGE_STATUS -s INACTIVE -J WMA_JOB_1");
        assert_eq!(inv.program, "sendevent");
        assert_eq!(
            inv.args,
            vec!["-E", "CHANGE_STATUS", "-s", "INACTIVE", "-J", "WMA_JOB_1"]
        );
    }

    #[test]
    fn test_parse_quotes() {
        let inv = parse(r#"echo 'TEST CMD 1' "a \"b\" c" x\ y"#);
        assert_eq!(inv.program, "echo");
        assert_eq!(inv.args, vec!["TEST CMD 1", r#"a "b" c"#, "x y"]);
    }

    #[test]
    fn test_parse_adjacent_quotes_join() {
        let inv = parse(r#"echo pre'fix'"suf""#);
        assert_eq!(inv.args, vec!["prefixsuf"]);
    }

    #[test]
    fn test_parse_empty_quoted_argument() {
        let inv = parse("printf ''");
        assert_eq!(inv.args, vec![""]);
    }

    #[test]
    fn test_parse_no_shell_semantics() {
        let inv = parse("echo $HOME; rm -rf *");
        assert_eq!(inv.program, "echo");
        assert_eq!(inv.args, vec!["$HOME;", "rm", "-rf", "*"]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(Invocation::parse("echo 'open").is_err());
        assert!(Invocation::parse("echo \"open").is_err());
        assert!(Invocation::parse("echo \\").is_err());
        assert!(Invocation::parse("   ").is_err());
    }

    #[test]
    fn test_parse_commands_skips_blank_and_comments() {
        let content = "a 1\n\n   \n# comment\n  b 2  \nc 3\n";
        let commands = parse_commands(content, false).unwrap();
        assert_eq!(commands.len(), 3);
        assert_eq!(commands[1].text, "b 2");
        assert_eq!(commands[1].index, 1);
        assert_eq!(commands[2].index, 2);
    }

    #[test]
    fn test_parse_commands_dedupe() {
        let content = "a\nb\na\nc\nb\n";
        let kept = parse_commands(content, false).unwrap();
        assert_eq!(kept.len(), 5);

        let deduped = parse_commands(content, true).unwrap();
        let texts: Vec<_> = deduped.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
        assert_eq!(deduped[2].index, 2);
    }

    #[test]
    fn test_parse_commands_reports_line_number() {
        let err = parse_commands("ok\n\nbad 'quote\n", false).unwrap_err();
        match err {
            ConfigError::InvalidCommand { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_commands(&dir.path().join("nope.txt"), false).unwrap_err();
        assert!(matches!(err, ConfigError::InputNotFound(_)));
    }

    #[test]
    fn test_load_empty_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "\n   \n").unwrap();
        let err = load_commands(file.path(), false).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyInput(_)));
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "echo one\necho two").unwrap();
        let commands = load_commands(file.path(), false).unwrap();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].to_string(), "echo one");
    }
}

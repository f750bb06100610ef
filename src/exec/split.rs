// src/exec/split.rs

//! Turning a command string into an argv when no shell is involved.
//!
//! POSIX and Windows disagree on quoting, so each gets its own
//! [`ArgSplitter`]. The one matching the build target is picked once via
//! [`platform_splitter`]; the spawn path never branches on the OS itself.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SplitError {
    #[error("no closing quotation ({0})")]
    UnclosedQuote(char),

    #[error("no escaped character after trailing backslash")]
    TrailingEscape,
}

/// Tokenizer for one platform's command-line conventions.
pub trait ArgSplitter: Send + Sync {
    fn split(&self, line: &str) -> Result<Vec<String>, SplitError>;

    fn name(&self) -> &'static str;
}

/// `sh`-style word splitting (the rules of Python's `shlex.split`).
#[derive(Debug, Default, Clone, Copy)]
pub struct PosixSplitter;

/// Windows `CommandLineToArgvW` rules.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsSplitter;

#[cfg(windows)]
static PLATFORM: WindowsSplitter = WindowsSplitter;

#[cfg(not(windows))]
static PLATFORM: PosixSplitter = PosixSplitter;

/// The splitter for the platform this binary was built for.
pub fn platform_splitter() -> &'static dyn ArgSplitter {
    &PLATFORM
}

impl ArgSplitter for PosixSplitter {
    fn split(&self, line: &str) -> Result<Vec<String>, SplitError> {
        let mut args = Vec::new();
        let mut current = String::new();
        // true once the current word has started, even if it is still empty
        // (so that `''` yields an empty argument)
        let mut in_word = false;
        let mut chars = line.chars();

        while let Some(c) = chars.next() {
            match c {
                c if c.is_whitespace() => {
                    if in_word {
                        args.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                }
                '\'' => {
                    in_word = true;
                    loop {
                        match chars.next() {
                            Some('\'') => break,
                            Some(ch) => current.push(ch),
                            None => return Err(SplitError::UnclosedQuote('\'')),
                        }
                    }
                }
                '"' => {
                    in_word = true;
                    loop {
                        match chars.next() {
                            Some('"') => break,
                            Some('\\') => match chars.next() {
                                // only the quote and the escape itself are
                                // escapable inside double quotes
                                Some(ch @ ('"' | '\\')) => current.push(ch),
                                Some(ch) => {
                                    current.push('\\');
                                    current.push(ch);
                                }
                                None => return Err(SplitError::UnclosedQuote('"')),
                            },
                            Some(ch) => current.push(ch),
                            None => return Err(SplitError::UnclosedQuote('"')),
                        }
                    }
                }
                '\\' => {
                    in_word = true;
                    match chars.next() {
                        Some(ch) => current.push(ch),
                        None => return Err(SplitError::TrailingEscape),
                    }
                }
                c => {
                    in_word = true;
                    current.push(c);
                }
            }
        }

        if in_word {
            args.push(current);
        }
        Ok(args)
    }

    fn name(&self) -> &'static str {
        "posix"
    }
}

impl ArgSplitter for WindowsSplitter {
    fn split(&self, line: &str) -> Result<Vec<String>, SplitError> {
        let chars: Vec<char> = line.chars().collect();
        let mut args = Vec::new();
        let mut i = 0;

        while i < chars.len() && is_win_space(chars[i]) {
            i += 1;
        }
        if i == chars.len() {
            return Ok(args);
        }

        // The program name: quotes toggle, backslashes are literal.
        let mut program = String::new();
        let mut in_quotes = false;
        while i < chars.len() {
            let c = chars[i];
            if c == '"' {
                in_quotes = !in_quotes;
            } else if is_win_space(c) && !in_quotes {
                break;
            } else {
                program.push(c);
            }
            i += 1;
        }
        args.push(program);

        loop {
            while i < chars.len() && is_win_space(chars[i]) {
                i += 1;
            }
            if i == chars.len() {
                break;
            }

            let mut arg = String::new();
            let mut in_quotes = false;
            while i < chars.len() {
                let c = chars[i];
                if c == '\\' {
                    let start = i;
                    while i < chars.len() && chars[i] == '\\' {
                        i += 1;
                    }
                    let count = i - start;
                    if i < chars.len() && chars[i] == '"' {
                        arg.extend(std::iter::repeat_n('\\', count / 2));
                        if count % 2 == 1 {
                            arg.push('"');
                            i += 1;
                        }
                        // even: the quote is handled on the next iteration
                    } else {
                        arg.extend(std::iter::repeat_n('\\', count));
                    }
                    continue;
                }

                if c == '"' {
                    if in_quotes && chars.get(i + 1) == Some(&'"') {
                        arg.push('"');
                        i += 2;
                        continue;
                    }
                    in_quotes = !in_quotes;
                    i += 1;
                    continue;
                }

                if is_win_space(c) && !in_quotes {
                    break;
                }

                arg.push(c);
                i += 1;
            }
            args.push(arg);
        }

        Ok(args)
    }

    fn name(&self) -> &'static str {
        "windows"
    }
}

impl WindowsSplitter {
    /// Split off the program token, returning it and the untouched rest of
    /// the line.
    pub fn split_program(line: &str) -> (String, &str) {
        let line = line.trim_start_matches(is_win_space);
        let mut program = String::new();
        let mut in_quotes = false;
        for (idx, c) in line.char_indices() {
            if c == '"' {
                in_quotes = !in_quotes;
            } else if is_win_space(c) && !in_quotes {
                return (program, line[idx..].trim_start_matches(is_win_space));
            } else {
                program.push(c);
            }
        }
        (program, "")
    }
}

fn is_win_space(c: char) -> bool {
    c == ' ' || c == '\t'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posix(s: &str) -> Vec<String> {
        PosixSplitter.split(s).unwrap()
    }

    fn win(s: &str) -> Vec<String> {
        WindowsSplitter.split(s).unwrap()
    }

    #[test]
    fn posix_splits_on_whitespace() {
        assert_eq!(posix("echo one  two\tthree"), ["echo", "one", "two", "three"]);
        assert!(posix("   ").is_empty());
    }

    #[test]
    fn posix_handles_quotes_and_escapes() {
        assert_eq!(posix(r#"echo 'a b' "c d""#), ["echo", "a b", "c d"]);
        assert_eq!(posix(r#"x"y z"w"#), ["xy zw"]);
        assert_eq!(posix(r#"echo "a\"b" "c\d""#), ["echo", "a\"b", "c\\d"]);
        assert_eq!(posix(r"a\ b 'c\d'"), ["a b", "c\\d"]);
        assert_eq!(posix("echo '' \"\""), ["echo", "", ""]);
        assert_eq!(posix("echo # not a comment"), ["echo", "#", "not", "a", "comment"]);
    }

    #[test]
    fn posix_reports_unbalanced_input() {
        assert_eq!(PosixSplitter.split("echo 'oops"), Err(SplitError::UnclosedQuote('\'')));
        assert_eq!(PosixSplitter.split("echo \"oops"), Err(SplitError::UnclosedQuote('"')));
        assert_eq!(PosixSplitter.split("echo oops\\"), Err(SplitError::TrailingEscape));
    }

    #[test]
    fn windows_program_name_keeps_backslashes() {
        assert_eq!(
            win(r#""C:\Program Files\tool.exe" --flag"#),
            [r"C:\Program Files\tool.exe", "--flag"]
        );
    }

    #[test]
    fn windows_backslash_quote_rules() {
        assert_eq!(win(r#"p a\\\"b"#), ["p", r#"a\"b"#]);
        assert_eq!(win(r#"p "a\\" b"#), ["p", r"a\", "b"]);
        assert_eq!(win(r#"p a\\b"#), ["p", r"a\\b"]);
        assert_eq!(win(r#"p "a b" c"#), ["p", "a b", "c"]);
        assert_eq!(win(r#"p "a""b""#), ["p", "a\"b"]);
        assert_eq!(win(r#"p """#), ["p", ""]);
    }

    #[test]
    fn windows_split_program_leaves_rest_raw() {
        let (program, rest) = WindowsSplitter::split_program(r#"  "C:\my tool.exe"  /x "a b" "#);
        assert_eq!(program, r"C:\my tool.exe");
        assert_eq!(rest, r#"/x "a b" "#);

        assert_eq!(WindowsSplitter::split_program("dir"), ("dir".to_string(), ""));
    }

    #[test]
    fn platform_splitter_matches_target() {
        let expected = if cfg!(windows) { "windows" } else { "posix" };
        assert_eq!(platform_splitter().name(), expected);
    }
}

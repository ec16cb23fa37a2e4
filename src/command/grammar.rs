use std::path::Path;

/// A parsed command line.
///
/// Tokens are whitespace separated. Submission forms are order independent:
/// a token that parses as an integer is a problem number, any other token
/// naming an existing file is the file to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `os <shell text>`
    Os(String),
    /// `bg <command>`: run the rest in background context
    Background(String),
    Help,
    Logout,
    /// Empty line: redisplay state without side effects
    Refresh,
    /// `<n>`: show the compiler message of problem `n`
    ViewMessage(i64),
    /// `<path>`, `<n> <path>`, `<path> <n>` or `-p <n> -f <path>`
    Submit { problem: Option<i64>, file: String },
    Invalid(String),
}

impl Command {
    /// Parse against the local filesystem.
    pub fn parse(text: &str) -> Self {
        Self::parse_with(text, |path| Path::new(path).exists())
    }

    /// Parse with a caller-supplied existence check for file tokens.
    pub fn parse_with(text: &str, exists: impl Fn(&str) -> bool) -> Self {
        let text = text.trim();
        if text.is_empty() {
            return Command::Refresh;
        }

        if let Some(rest) = strip_keyword(text, "os") {
            if rest.is_empty() {
                return Command::Invalid("os needs a shell command".to_string());
            }
            return Command::Os(rest.to_string());
        }
        if let Some(rest) = strip_keyword(text, "bg") {
            return Command::Background(rest.to_string());
        }

        let tokens: Vec<&str> = text.split_whitespace().collect();
        if let [single] = tokens.as_slice() {
            match single.to_lowercase().as_str() {
                "help" => return Command::Help,
                "logout" => return Command::Logout,
                _ => {}
            }
        }

        let mut flag_problem: Option<i64> = None;
        let mut flag_file: Option<String> = None;
        let mut positionals: Vec<&str> = Vec::new();

        let mut iter = tokens.iter();
        while let Some(&token) = iter.next() {
            match token {
                "-p" | "--problem" => match iter.next().and_then(|t| t.parse::<i64>().ok()) {
                    Some(n) => flag_problem = Some(n),
                    None => return Command::Invalid(format!("{} expects a problem number", token)),
                },
                "-f" | "--file" => match iter.next() {
                    Some(path) => flag_file = Some(path.to_string()),
                    None => return Command::Invalid(format!("{} expects a file path", token)),
                },
                _ if token.starts_with('-') && token.parse::<i64>().is_err() => {
                    return Command::Invalid(format!("unknown option {}", token));
                }
                _ => positionals.push(token),
            }
        }

        if positionals.len() > 2 {
            return Command::Invalid("too many arguments".to_string());
        }

        let mut problem = flag_problem;
        let mut file = flag_file;
        for token in positionals {
            if let Ok(n) = token.parse::<i64>() {
                if problem.replace(n).is_some() {
                    return Command::Invalid("more than one problem number".to_string());
                }
            } else if exists(token) {
                if file.replace(token.to_string()).is_some() {
                    return Command::Invalid("more than one file".to_string());
                }
            } else {
                return Command::Invalid(format!("unknown command or missing file {}", token));
            }
        }

        match (problem, file) {
            (problem, Some(file)) => Command::Submit { problem, file },
            (Some(n), None) => Command::ViewMessage(n),
            (None, None) => Command::Refresh,
        }
    }
}

/// Remainder after a leading `keyword` followed by whitespace (or end of line).
fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(keyword)?;
    if rest.is_empty() {
        return Some(rest);
    }
    rest.starts_with(char::is_whitespace).then(|| rest.trim_start())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_keyword_requires_word_boundary() {
        assert_eq!(strip_keyword("os ls -l", "os"), Some("ls -l"));
        assert_eq!(strip_keyword("os", "os"), Some(""));
        assert_eq!(strip_keyword("ostrich.c", "os"), None);
    }

    #[test]
    fn flag_without_value_is_invalid() {
        assert!(matches!(Command::parse_with("-p", |_| true), Command::Invalid(_)));
        assert!(matches!(Command::parse_with("-f", |_| true), Command::Invalid(_)));
        assert!(matches!(Command::parse_with("-p x", |_| true), Command::Invalid(_)));
    }
}

//! Structured representation of external invocations.
//!
//! Builders produce a [`CommandChain`]: an ordered list of [`Invocation`]s
//! joined by "and-then" semantics. Nothing is escaped or concatenated until the
//! chain is serialized at the process-execution boundary, so builders stay pure
//! and can be asserted on without a shell.
//!
//! Secret arguments (passwords) are tracked as [`Arg::Secret`] and rendered as
//! `****` by [`CommandChain::redacted`] and by the `Display` impl. Only
//! [`CommandChain::to_shell_string`] exposes them.

use std::fmt;
use std::path::{Path, PathBuf};

/// Placeholder shown in place of secret arguments.
const REDACTED: &str = "****";

/// A single argv unit.
#[derive(Clone, PartialEq, Eq)]
pub enum Arg {
    /// Ordinary argument, safe to log
    Plain(String),
    /// Sensitive argument, never logged in clear text
    Secret(String),
}

impl Arg {
    /// Creates a plain argument.
    pub fn plain(value: impl Into<String>) -> Self {
        Self::Plain(value.into())
    }

    /// Creates a secret argument.
    pub fn secret(value: impl Into<String>) -> Self {
        Self::Secret(value.into())
    }

    /// Returns the clear-text value regardless of sensitivity.
    pub fn expose(&self) -> &str {
        match self {
            Self::Plain(value) | Self::Secret(value) => value,
        }
    }

    /// Returns the value as it may appear in logs.
    pub fn display_value(&self) -> &str {
        match self {
            Self::Plain(value) => value,
            Self::Secret(_) => REDACTED,
        }
    }

    /// Whether the argument is sensitive.
    pub const fn is_secret(&self) -> bool {
        matches!(self, Self::Secret(_))
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(value) => write!(f, "Plain({value:?})"),
            Self::Secret(_) => write!(f, "Secret({REDACTED})"),
        }
    }
}

/// One external program invocation with optional stdio redirection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<Arg>,
    stdin: Option<PathBuf>,
    stdout: Option<PathBuf>,
}

impl Invocation {
    /// Starts an invocation of `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
            stdout: None,
        }
    }

    /// Appends a plain argument.
    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(Arg::plain(value));
        self
    }

    /// Appends a flag followed by its value as a separate argument.
    pub fn flag_value(self, flag: &str, value: impl Into<String>) -> Self {
        self.arg(flag).arg(value)
    }

    /// Appends already-built arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = Arg>) -> Self {
        self.args.extend(args);
        self
    }

    /// Feeds `path` to the program's standard input.
    pub fn stdin_from(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdin = Some(path.into());
        self
    }

    /// Redirects the program's standard output into `path`.
    pub fn stdout_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout = Some(path.into());
        self
    }

    /// Program name.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments in order.
    pub fn arguments(&self) -> &[Arg] {
        &self.args
    }

    /// Standard input source, if redirected.
    pub fn stdin(&self) -> Option<&Path> {
        self.stdin.as_deref()
    }

    /// Standard output target, if redirected.
    pub fn stdout(&self) -> Option<&Path> {
        self.stdout.as_deref()
    }

    /// Whether `value` appears as a plain argument.
    pub fn has_arg(&self, value: &str) -> bool {
        self.args
            .iter()
            .any(|arg| matches!(arg, Arg::Plain(v) if v == value))
    }

    /// Returns the argument following `flag`, if present.
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|arg| matches!(arg, Arg::Plain(v) if v == flag))
            .and_then(|index| self.args.get(index.saturating_add(1)))
            .map(Arg::expose)
    }

    fn render(&self, reveal: bool) -> String {
        let mut words = vec![shell_quote(&self.program)];
        words.extend(self.args.iter().map(|arg| match arg {
            Arg::Secret(_) if !reveal => arg.display_value().to_string(),
            _ => shell_quote(arg.expose()),
        }));
        if let Some(stdin) = &self.stdin {
            words.push("<".to_string());
            words.push(shell_quote(&stdin.to_string_lossy()));
        }
        if let Some(stdout) = &self.stdout {
            words.push(">".to_string());
            words.push(shell_quote(&stdout.to_string_lossy()));
        }
        words.join(" ")
    }
}

/// Ordered invocations joined by "and-then": each step starts only after the
/// previous one exits with status 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandChain {
    steps: Vec<Invocation>,
}

impl CommandChain {
    /// A chain holding a single invocation.
    pub fn new(first: Invocation) -> Self {
        Self { steps: vec![first] }
    }

    /// Appends `next`, run only if everything before it succeeded.
    pub fn then(mut self, next: Invocation) -> Self {
        self.steps.push(next);
        self
    }

    /// Invocations in execution order.
    pub fn steps(&self) -> &[Invocation] {
        &self.steps
    }

    /// Whether the serialized form is wrapped in a subshell group.
    ///
    /// Multi-step chains are always grouped so a caller can splice them into
    /// a larger compound command.
    pub fn is_grouped(&self) -> bool {
        self.steps.len() > 1
    }

    /// Serializes the chain for `sh -c`, revealing secret arguments.
    pub fn to_shell_string(&self) -> String {
        self.render(true)
    }

    /// Serializes the chain with secret arguments masked.
    pub fn redacted(&self) -> String {
        self.render(false)
    }

    fn render(&self, reveal: bool) -> String {
        let body = self
            .steps
            .iter()
            .map(|step| step.render(reveal))
            .collect::<Vec<_>>()
            .join(" && ");
        if self.is_grouped() {
            format!("({body})")
        } else {
            body
        }
    }
}

impl fmt::Display for CommandChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

/// Quotes a word for a POSIX shell. Words made only of safe characters are
/// left untouched.
pub fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ',' | '=' | ':' | '@' | '%' | '+')
        });
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("--verbose"), "--verbose");
        assert_eq!(shell_quote("a,b,c"), "a,b,c");
        assert_eq!(shell_quote("/backup/shop_20240101_000000"), "/backup/shop_20240101_000000");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("my dir"), "'my dir'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote("$(rm -rf /)"), "'$(rm -rf /)'");
    }

    #[test]
    fn test_single_invocation_not_grouped() {
        let chain = CommandChain::new(Invocation::new("myloader").flag_value("--verbose", "0"));
        assert!(!chain.is_grouped());
        assert_eq!(chain.to_shell_string(), "myloader --verbose 0");
    }

    #[test]
    fn test_chain_grouped_with_redirects() {
        let chain = CommandChain::new(Invocation::new("first").arg("a"))
            .then(Invocation::new("second").arg("b").stdout_to("/tmp/out file"));
        assert!(chain.is_grouped());
        assert_eq!(
            chain.to_shell_string(),
            "(first a && second b > '/tmp/out file')"
        );
    }

    #[test]
    fn test_stdin_redirect() {
        let chain = CommandChain::new(Invocation::new("mysql").stdin_from("/d/schema_sql"));
        assert_eq!(chain.to_shell_string(), "mysql < /d/schema_sql");
    }

    #[test]
    fn test_secrets_redacted_in_display_only() {
        let chain = CommandChain::new(
            Invocation::new("mydumper")
                .arg("--password")
                .args([Arg::secret("hunter2")]),
        );
        assert_eq!(chain.redacted(), "mydumper --password ****");
        assert_eq!(chain.to_string(), "mydumper --password ****");
        assert_eq!(chain.to_shell_string(), "mydumper --password hunter2");
        assert!(!format!("{chain:?}").contains("hunter2"));
    }

    #[test]
    fn test_value_of() {
        let invocation = Invocation::new("mydumper")
            .flag_value("--outputdir", "/backup")
            .flag_value("--tables-list", "a,b");
        assert_eq!(invocation.value_of("--outputdir"), Some("/backup"));
        assert_eq!(invocation.value_of("--tables-list"), Some("a,b"));
        assert_eq!(invocation.value_of("--compress"), None);
        assert!(invocation.has_arg("--outputdir"));
    }
}

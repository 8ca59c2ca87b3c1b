use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use clap::builder::NonEmptyStringValueParser;
use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::{CommandFactory, FromArgMatches, Parser};
use thiserror::Error;

/// Hard cap on the raw argument count, program name included.
pub const MAX_ARGS: usize = 64;

const USAGE: &str = "<path> [-n | --name filename] [--delete] [-e | --exact] [-h | --help]";

#[derive(Parser, Clone, Debug)]
#[clap(
    name = "finder",
    version,
    about = "find all the files in a given path",
    long_about = None,
    args_override_self = true
)]
pub struct Args {
    /// Directory to search recursively
    pub path: String,

    /// Filter list for files that contains filename
    #[clap(
        short,
        long,
        value_name = "FILENAME",
        allow_hyphen_values = true,
        value_parser = NonEmptyStringValueParser::new()
    )]
    pub name: Option<String>,

    /// --name will match filename exactly. If --name is not specified then becomes a no-op
    #[clap(short, long)]
    pub exact: bool,

    /// Delete found files. --name parameter is mandatory
    #[clap(long)]
    pub delete: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("incorrect number of arguments")]
    ArgumentCount,

    #[error("path cannot be empty")]
    EmptyPath,

    #[error("{path} does not exist or insufficient permission")]
    NotFound { path: Utf8PathBuf },

    #[error("{path} is not a directory")]
    NotADirectory { path: Utf8PathBuf },

    #[error("-n (--name) expects a filename")]
    MissingName,

    #[error("invalid operation. delete must have name parameter")]
    DeleteWithoutName,

    #[error(transparent)]
    Usage(clap::Error),
}

impl ConfigError {
    /// Whether the help text should follow the diagnostic.
    pub fn shows_help(&self) -> bool {
        matches!(self, ConfigError::ArgumentCount)
    }
}

/// A validated invocation. Fields are private so a value of this type always
/// points at an existing directory and never asks to delete without a filter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandConfig {
    path: Utf8PathBuf,
    name: Option<String>,
    exact: bool,
    delete: bool,
}

impl CommandConfig {
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn exact(&self) -> bool {
        self.exact
    }

    pub fn delete(&self) -> bool {
        self.delete
    }
}

impl TryFrom<Args> for CommandConfig {
    type Error = ConfigError;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        if args.path.is_empty() {
            return Err(ConfigError::EmptyPath);
        }

        let path = Utf8PathBuf::from(args.path);
        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(_) => return Err(ConfigError::NotFound { path }),
        };
        if !meta.is_dir() {
            return Err(ConfigError::NotADirectory { path });
        }

        // Refuse to wipe a whole subtree unfiltered.
        if args.delete && args.name.is_none() {
            return Err(ConfigError::DeleteWithoutName);
        }

        Ok(CommandConfig {
            path,
            name: args.name,
            exact: args.exact,
            delete: args.delete,
        })
    }
}

#[derive(Debug)]
pub enum Parsed {
    Run(CommandConfig),
    Help,
    Version,
}

/// Base name of `argv[0]`, used in usage lines and diagnostics.
pub fn program_name(argv0: Option<&OsString>) -> String {
    argv0
        .and_then(|arg| Path::new(arg).file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "finder".to_owned())
}

pub fn command(program: &str) -> clap::Command {
    Args::command()
        .bin_name(program.to_owned())
        .override_usage(format!("{program} {USAGE}"))
}

/// Writes the usage and option summary for `program` to `out`.
pub fn write_help<W: Write>(program: &str, out: &mut W) -> io::Result<()> {
    let help = command(program).render_help();
    write!(out, "{help}")
}

/// Parses the raw argument list, program name first.
///
/// # Panics
///
/// Panics when given [`MAX_ARGS`] or more tokens. Callers own that limit; it
/// is not treated as bad user input.
pub fn parse_args<I, T>(args: I) -> Result<Parsed, ConfigError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    assert!(
        args.len() < MAX_ARGS,
        "at most {} arguments are supported, got {}",
        MAX_ARGS - 1,
        args.len()
    );

    if args.len() < 2 {
        return Err(ConfigError::ArgumentCount);
    }

    let program = program_name(args.first());
    let matches = match command(&program).try_get_matches_from(args) {
        Ok(matches) => matches,
        Err(err) => return classify(err),
    };
    let args = Args::from_arg_matches(&matches).map_err(ConfigError::Usage)?;

    CommandConfig::try_from(args).map(Parsed::Run)
}

fn classify(err: clap::Error) -> Result<Parsed, ConfigError> {
    match err.kind() {
        ErrorKind::DisplayHelp => Ok(Parsed::Help),
        ErrorKind::DisplayVersion => Ok(Parsed::Version),
        ErrorKind::InvalidValue if is_name_arg(&err) => Err(ConfigError::MissingName),
        _ => Err(ConfigError::Usage(err)),
    }
}

fn is_name_arg(err: &clap::Error) -> bool {
    match err.get(ContextKind::InvalidArg) {
        Some(ContextValue::String(arg)) => arg.starts_with("--name"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Parsed, ConfigError> {
        parse_args(args.iter().copied())
    }

    fn run_config(args: &[&str]) -> CommandConfig {
        match parse(args) {
            Ok(Parsed::Run(config)) => config,
            other => panic!("expected a config, got {other:?}"),
        }
    }

    fn scratch() -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_str().unwrap().to_owned();
        (dir, path)
    }

    #[test]
    fn program_name_only_is_rejected() {
        assert!(matches!(parse(&["finder"]), Err(ConfigError::ArgumentCount)));
        assert!(matches!(parse(&[]), Err(ConfigError::ArgumentCount)));
    }

    #[test]
    fn help_wins_in_any_position() {
        assert!(matches!(parse(&["finder", "-h"]), Ok(Parsed::Help)));
        assert!(matches!(parse(&["finder", "--help"]), Ok(Parsed::Help)));

        let (_dir, root) = scratch();
        assert!(matches!(
            parse(&["finder", root.as_str(), "--delete", "--help"]),
            Ok(Parsed::Help)
        ));
    }

    #[test]
    fn version_is_reported() {
        assert!(matches!(parse(&["finder", "-V"]), Ok(Parsed::Version)));
    }

    #[test]
    fn empty_path_is_rejected() {
        assert!(matches!(parse(&["finder", ""]), Err(ConfigError::EmptyPath)));
    }

    #[test]
    fn missing_path_is_rejected() {
        let (_dir, root) = scratch();
        let missing = format!("{root}/nope");
        match parse(&["finder", missing.as_str()]) {
            Err(err @ ConfigError::NotFound { .. }) => {
                assert_eq!(
                    err.to_string(),
                    format!("{missing} does not exist or insufficient permission")
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn file_path_is_rejected() {
        let (dir, _root) = scratch();
        let file = dir.path().join("a.txt");
        fs::write(&file, "a").unwrap();
        assert!(matches!(
            parse(&["finder", file.to_str().unwrap()]),
            Err(ConfigError::NotADirectory { .. })
        ));
    }

    #[test]
    fn name_without_value_is_rejected() {
        let (_dir, root) = scratch();
        assert!(matches!(
            parse(&["finder", root.as_str(), "-n"]),
            Err(ConfigError::MissingName)
        ));
        assert!(matches!(
            parse(&["finder", root.as_str(), "--name"]),
            Err(ConfigError::MissingName)
        ));
        assert!(matches!(
            parse(&["finder", root.as_str(), "--name", ""]),
            Err(ConfigError::MissingName)
        ));
    }

    #[test]
    fn delete_requires_name() {
        let (_dir, root) = scratch();
        assert!(matches!(
            parse(&["finder", root.as_str(), "--delete"]),
            Err(ConfigError::DeleteWithoutName)
        ));
        assert!(matches!(
            parse(&["finder", root.as_str(), "--delete", "--exact"]),
            Err(ConfigError::DeleteWithoutName)
        ));
    }

    #[test]
    fn flags_in_any_order() {
        let (_dir, root) = scratch();
        let config = run_config(&["finder", root.as_str(), "--delete", "-e", "-n", "a.txt"]);
        assert_eq!(config.path(), Utf8Path::new(&root));
        assert_eq!(config.name(), Some("a.txt"));
        assert!(config.exact());
        assert!(config.delete());

        let config = run_config(&["finder", root.as_str(), "--exact"]);
        assert!(config.exact());
        assert_eq!(config.name(), None);
        assert!(!config.delete());
    }

    #[test]
    fn last_name_wins() {
        let (_dir, root) = scratch();
        let config = run_config(&["finder", root.as_str(), "-n", "a", "--name", "b"]);
        assert_eq!(config.name(), Some("b"));
    }

    #[test]
    fn name_may_start_with_a_dash() {
        let (_dir, root) = scratch();
        let config = run_config(&["finder", root.as_str(), "-n", "-draft"]);
        assert_eq!(config.name(), Some("-draft"));
    }

    #[test]
    fn unknown_flags_are_rejected() {
        let (_dir, root) = scratch();
        assert!(matches!(
            parse(&["finder", root.as_str(), "--recursive"]),
            Err(ConfigError::Usage(_))
        ));
        assert!(matches!(
            parse(&["finder", root.as_str(), "extra"]),
            Err(ConfigError::Usage(_))
        ));
    }

    #[test]
    #[should_panic(expected = "at most 63 arguments")]
    fn argument_cap_is_a_contract_violation() {
        let args = vec!["finder"; MAX_ARGS];
        let _ = parse_args(args);
    }

    #[test]
    fn help_uses_the_given_program_name() {
        let mut out = Vec::new();
        write_help("ff", &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(&format!("ff {USAGE}")));
        assert!(text.contains("find all the files in a given path"));
        assert!(text.contains("--delete"));
    }

    #[test]
    fn program_name_strips_directories() {
        let argv0 = OsString::from("/usr/local/bin/ff");
        assert_eq!(program_name(Some(&argv0)), "ff");
        assert_eq!(program_name(None), "finder");
    }
}

use std::ffi::OsString;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::commands::{expand_command_abbrev, known_command_names};
use crate::config::Config;
use crate::filter::ViewCategory;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got {raw:?}")),
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "todo",
    version,
    about = "#todo: a small task list kept in local storage",
    disable_help_subcommand = true,
    arg_required_else_help = false
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    /// Setting override, may repeat.
    #[arg(long = "rc", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub rc_overrides: Vec<(String, String)>,

    #[arg(long = "todorc")]
    pub todorc: Option<PathBuf>,

    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub rest: Vec<OsString>,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let level = match (quiet, verbose) {
        (2.., _) => "error",
        (1, _) | (0, 0) => "warn",
        (0, 1) => "info",
        (0, 2) => "debug",
        _ => "trace",
    };

    // RUST_LOG, when set, wins over -v/-q.
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).map_err(|e| anyhow!("bad log filter {level}: {e}"))?,
    };

    if let Err(err) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .try_init()
    {
        debug!(error = %err, "tracing already initialised");
    }
    Ok(())
}

/// Global flags whose value is the following argument.
const VALUE_FLAGS: [&str; 3] = ["--rc", "--todorc", "--data"];

/// Lifts positional `rc.key=value` / `rc.key:value` overrides out of the
/// global part of the command line. Everything from the command word (or a
/// `--`) on is passed through untouched, so task text is never consumed.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut rc_overrides = Vec::new();

    let mut iter = raw.iter();
    cleaned.extend(iter.next().cloned());

    while let Some(arg) = iter.next() {
        let text = arg.to_string_lossy();
        if let Some((key, value)) = text
            .strip_prefix("rc.")
            .and_then(|rest| rest.split_once(['=', ':']))
        {
            debug!(key, value, "positional rc override");
            rc_overrides.push((format!("rc.{key}"), value.to_string()));
            continue;
        }

        cleaned.push(arg.clone());
        if VALUE_FLAGS.contains(&&*text) {
            cleaned.extend(iter.next().cloned());
        } else if text == "--" || !text.starts_with('-') {
            cleaned.extend(iter.by_ref().cloned());
            break;
        }
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: String,
    pub command_args: Vec<String>,
}

impl Invocation {
    #[tracing::instrument(skip(cfg, rest))]
    pub fn parse(cfg: &Config, rest: Vec<OsString>) -> anyhow::Result<Self> {
        let tokens: Vec<String> = rest
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        Self::from_tokens(cfg, &tokens)
    }

    pub fn from_tokens(cfg: &Config, tokens: &[String]) -> anyhow::Result<Self> {
        let Some((first, args)) = tokens.split_first() else {
            let cmd = cfg.get("default.command").unwrap_or("list").to_string();
            debug!(command = %cmd, "no explicit command, using default");
            return Ok(Self {
                command: cmd,
                command_args: vec![],
            });
        };

        if let Some(full) = expand_command_abbrev(first, &known_command_names()) {
            debug!(token = %first, expanded = %full, "resolved command token");
            return Ok(Self {
                command: full.to_string(),
                command_args: args.to_vec(),
            });
        }

        if ViewCategory::parse_known(first).is_some() {
            debug!(token = %first, "bare view name interpreted as list");
            return Ok(Self {
                command: "list".to_string(),
                command_args: tokens.to_vec(),
            });
        }

        Err(anyhow!("unknown command: {first}"))
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use clap::Parser;

    use super::{GlobalCli, Invocation, preprocess_args};
    use crate::config::Config;

    fn tokens(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    fn os_args(raw: &[&str]) -> Vec<OsString> {
        raw.iter().map(OsString::from).collect()
    }

    #[test]
    fn positional_rc_overrides_are_extracted() {
        let raw = os_args(&[
            "todo",
            "rc.notify.seconds:9",
            "--data",
            "rc.dir",
            "rc.storage.key=x",
            "list",
        ]);
        let pre = preprocess_args(&raw).unwrap();
        assert_eq!(pre.cleaned_args, os_args(&["todo", "--data", "rc.dir", "list"]));
        assert_eq!(
            pre.rc_overrides,
            vec![
                ("rc.notify.seconds".to_string(), "9".to_string()),
                ("rc.storage.key".to_string(), "x".to_string()),
            ]
        );
    }

    #[test]
    fn task_text_after_the_command_is_left_alone() {
        let pre = preprocess_args(&os_args(&["todo", "add", "rc.d:cleanup"])).unwrap();
        assert_eq!(pre.cleaned_args, os_args(&["todo", "add", "rc.d:cleanup"]));
        assert!(pre.rc_overrides.is_empty());

        let pre = preprocess_args(&os_args(&["todo", "-v", "--", "rc.a=b"])).unwrap();
        assert_eq!(pre.cleaned_args, os_args(&["todo", "-v", "--", "rc.a=b"]));
        assert!(pre.rc_overrides.is_empty());
    }

    #[test]
    fn rc_flag_collects_pairs() {
        let cli = GlobalCli::try_parse_from([
            "todo",
            "--rc",
            "color=off",
            "--rc",
            "storage.key = home",
            "list",
        ])
        .unwrap();
        assert_eq!(
            cli.rc_overrides,
            vec![
                ("color".to_string(), "off".to_string()),
                ("storage.key".to_string(), "home".to_string()),
            ]
        );
        assert_eq!(cli.rest, vec![OsString::from("list")]);
        assert!(GlobalCli::try_parse_from(["todo", "--rc", "=off"]).is_err());
    }

    #[test]
    fn commands_accept_unique_prefixes() {
        let cfg = Config::default();
        let inv = Invocation::from_tokens(&cfg, &tokens(&["tog", "12"])).unwrap();
        assert_eq!(inv.command, "toggle");
        assert_eq!(inv.command_args, tokens(&["12"]));

        let inv = Invocation::from_tokens(&cfg, &tokens(&["a", "Buy", "milk"])).unwrap();
        assert_eq!(inv.command, "add");
        assert_eq!(inv.command_args, tokens(&["Buy", "milk"]));
    }

    #[test]
    fn empty_invocation_uses_default_command() {
        let cfg = Config::default();
        let inv = Invocation::from_tokens(&cfg, &[]).unwrap();
        assert_eq!(inv.command, "list");
        assert!(inv.command_args.is_empty());
    }

    #[test]
    fn bare_view_name_lists_that_view() {
        let cfg = Config::default();
        let inv = Invocation::from_tokens(&cfg, &tokens(&["completed"])).unwrap();
        assert_eq!(inv.command, "list");
        assert_eq!(inv.command_args, tokens(&["completed"]));
    }

    #[test]
    fn unknown_command_is_an_error() {
        let cfg = Config::default();
        assert!(Invocation::from_tokens(&cfg, &tokens(&["frobnicate"])).is_err());
    }
}

//! CLI command definitions

use clap::{Parser, Subcommand, ValueEnum};
use council_domain::{JobPriority, RunId};
use std::path::PathBuf;

/// Queue priority accepted on the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum PriorityArg {
    #[default]
    Normal,
    High,
}

impl From<PriorityArg> for JobPriority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::Normal => JobPriority::Normal,
            PriorityArg::High => JobPriority::High,
        }
    }
}

/// CLI arguments for council
#[derive(Parser, Debug)]
#[command(name = "council")]
#[command(author, version, about = "Proposal council - weighted persona review of product ideas")]
#[command(long_about = r#"
Council expands a short idea into a structured proposal, has a fixed roster
of reviewer personas score it independently, and folds their reviews into a
weighted approve / revise / reject decision.

Each run goes through three steps:
1. Expand:    the idea becomes a proposal (problem, solution, assumptions, non-goals)
2. Review:    every persona reviews the proposal in parallel
3. Aggregate: reviews are combined into a decision with minority reports

Configuration files are loaded from (in priority order):
1. --config <path>                  Explicit config file
2. ./council.toml                   Project-level config
3. ~/.config/council/config.toml    Global config
Environment variables prefixed with COUNCIL_ override everything
(e.g. COUNCIL_WORKER__MAX_CONCURRENCY=8).

Example:
  council evaluate "Offline mode for the mobile app"
  council revise 6f1c... --notes "Add a rollback plan"
  council diff 6f1c... 9a2b...
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Run store file; runs are kept in memory when omitted
    #[arg(long, global = true, value_name = "PATH")]
    pub store: Option<PathBuf>,

    /// Print results as JSON instead of colored text
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Write rotating log files and a JSONL pipeline event log to this directory
    #[arg(long, global = true, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files (built-in defaults only)
    #[arg(long, global = true)]
    pub no_config: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Expand an idea into a proposal and have the council review it
    Evaluate {
        /// The idea to evaluate
        idea: String,

        /// Queue priority of the run
        #[arg(long, value_enum, default_value_t = PriorityArg::Normal)]
        priority: PriorityArg,

        /// Extra context as KEY=VALUE (repeatable)
        #[arg(short = 'C', long = "context", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        context: Vec<(String, String)>,
    },

    /// Re-review an edited version of a completed run
    Revise {
        /// Parent run ID
        parent: RunId,

        /// JSON file with the edited proposal
        #[arg(long, value_name = "PATH")]
        proposal_file: Option<PathBuf>,

        /// Free-text edit notes applied to the parent proposal
        #[arg(long)]
        notes: Option<String>,

        /// Queue priority of the run
        #[arg(long, value_enum, default_value_t = PriorityArg::Normal)]
        priority: PriorityArg,
    },

    /// Compare two completed runs
    Diff {
        /// Older run
        a: RunId,
        /// Newer run
        b: RunId,
    },

    /// Show a stored run with its proposal, reviews and decision
    Show {
        run: RunId,
    },

    /// Show configuration sources and validation issues
    Config,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

impl Cli {
    /// Extra context pairs of `evaluate` as a JSON object.
    pub fn context_map(pairs: &[(String, String)]) -> serde_json::Map<String, serde_json::Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_evaluate_with_global_flags() {
        let cli = Cli::try_parse_from([
            "council",
            "evaluate",
            "Offline mode",
            "--priority",
            "high",
            "-C",
            "team=mobile",
            "--json",
            "-vv",
        ])
        .unwrap();

        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Evaluate {
                idea,
                priority,
                context,
            } => {
                assert_eq!(idea, "Offline mode");
                assert_eq!(JobPriority::from(priority), JobPriority::High);
                let map = Cli::context_map(&context);
                assert_eq!(map["team"], "mobile");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_revise_parses_run_id() {
        let id = RunId::new();
        let id_arg = id.to_string();
        let cli = Cli::try_parse_from([
            "council",
            "--store",
            "runs.json",
            "revise",
            id_arg.as_str(),
            "--notes",
            "Add a rollback plan",
        ])
        .unwrap();

        assert_eq!(cli.store, Some(PathBuf::from("runs.json")));
        match cli.command {
            Command::Revise { parent, notes, .. } => {
                assert_eq!(parent, id);
                assert_eq!(notes.as_deref(), Some("Add a rollback plan"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(Cli::try_parse_from(["council", "show", "not-a-uuid"]).is_err());
        assert!(Cli::try_parse_from(["council", "evaluate", "x", "-C", "novalue"]).is_err());
    }
}

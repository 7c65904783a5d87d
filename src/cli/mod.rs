//! CLI argument parsing for baton.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Args, Parser, Subcommand};

/// Baton: file-backed coordination for agents sharing one repository.
///
/// Agents lock the files they are about to edit, inspect conflicts before
/// planning, run a preflight gate before finishing, and record a handoff.
#[derive(Parser, Debug)]
#[command(name = "baton")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Agent id acting on the store. Defaults to USER@HOST.
    #[arg(long, global = true, env = "BATON_AGENT")]
    pub agent: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for baton.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the `.baton/` store in the current directory.
    ///
    /// Idempotent; an existing config is kept.
    Init,

    /// Lock management commands.
    Lock(LockCommand),

    /// Show, per path, whether it is free or locked and who focuses on it.
    Inspect(InspectArgs),

    /// Declare or list agent focus areas.
    Context(ContextCommand),

    /// Run the preflight gate.
    ///
    /// Exits 2 when a required suite fails.
    Preflight(PreflightArgs),

    /// Record or list session handoffs.
    Handoff(HandoffCommand),

    /// Summarize locks, contexts and the latest preflight and handoff.
    Status,
}

/// Lock subcommands.
#[derive(Parser, Debug)]
pub struct LockCommand {
    #[command(subcommand)]
    pub action: LockAction,
}

/// Available lock actions.
#[derive(Subcommand, Debug)]
pub enum LockAction {
    /// Acquire the lock on one file.
    Acquire(AcquireArgs),

    /// Acquire several files all-or-nothing.
    Batch(BatchArgs),

    /// Release a lock you hold.
    Release(PathArgs),

    /// Extend the expiry of a lock you hold.
    Renew(RenewArgs),

    /// Release every lock you hold.
    ReleaseAll,

    /// Remove all expired locks.
    Sweep,

    /// List locks, oldest first.
    List(ListArgs),
}

#[derive(Args, Debug)]
pub struct AcquireArgs {
    /// File path to lock (relative to the repository root).
    pub path: String,

    /// Task the lock is taken for.
    #[arg(short, long)]
    pub task: String,

    /// Lock ttl in seconds (defaults to the configured ttl).
    #[arg(long)]
    pub ttl: Option<u64>,
}

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// File paths to lock.
    #[arg(required = true)]
    pub paths: Vec<String>,

    #[arg(short, long)]
    pub task: String,

    #[arg(long)]
    pub ttl: Option<u64>,
}

#[derive(Args, Debug)]
pub struct PathArgs {
    pub path: String,
}

#[derive(Args, Debug)]
pub struct RenewArgs {
    pub path: String,

    /// New ttl in seconds, counted from now.
    #[arg(long)]
    pub ttl: Option<u64>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only locks owned by this agent.
    #[arg(long = "owner")]
    pub owner: Option<String>,

    /// Only locks taken for this task.
    #[arg(long)]
    pub task: Option<String>,

    /// Include expired locks.
    #[arg(long)]
    pub all: bool,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    #[arg(required = true)]
    pub paths: Vec<String>,
}

/// Context subcommands.
#[derive(Parser, Debug)]
pub struct ContextCommand {
    #[command(subcommand)]
    pub action: ContextAction,
}

#[derive(Subcommand, Debug)]
pub enum ContextAction {
    /// Replace your focus area with a task and file set.
    Set(ContextSetArgs),

    /// List declared focus areas with staleness.
    List,
}

#[derive(Args, Debug)]
pub struct ContextSetArgs {
    #[arg(short, long)]
    pub task: String,

    /// Files in focus.
    pub files: Vec<String>,
}

#[derive(Args, Debug)]
pub struct PreflightArgs {
    /// full, quick or handoff-only.
    #[arg(long, default_value = "full")]
    pub mode: String,

    /// Additional suites to run (comma-separated); always required.
    #[arg(long, value_delimiter = ',')]
    pub extra: Vec<String>,

    /// Do not run the handoff self-check.
    #[arg(long)]
    pub skip_handoff: bool,
}

/// Handoff subcommands.
#[derive(Parser, Debug)]
pub struct HandoffCommand {
    #[command(subcommand)]
    pub action: HandoffAction,
}

#[derive(Subcommand, Debug)]
pub enum HandoffAction {
    /// Record the end of your session.
    ///
    /// Exits 5 when blocked by a failed preflight or held locks.
    Record(HandoffRecordArgs),

    /// List recorded handoffs.
    List,
}

#[derive(Args, Debug)]
pub struct HandoffRecordArgs {
    /// Session id (a new one is generated when absent).
    #[arg(long)]
    pub session: Option<String>,

    /// Preflight run to reference (defaults to the agent's latest run).
    #[arg(long)]
    pub run: Option<String>,

    #[arg(long)]
    pub notes: Option<String>,

    /// Record even when blocked; the snapshot is marked forced.
    #[arg(long)]
    pub force: bool,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_debug_assert() {
        // Verifies the CLI arguments configuration is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_init() {
        let cli = Cli::try_parse_from(["baton", "init"]).unwrap();
        assert!(matches!(cli.command, Command::Init));
    }

    #[test]
    fn parse_lock_acquire() {
        let cli = Cli::try_parse_from([
            "baton", "--agent", "a", "lock", "acquire", "src/lib.rs", "--task", "T-1", "--ttl",
            "60",
        ])
        .unwrap();
        assert_eq!(cli.agent.as_deref(), Some("a"));
        match cli.command {
            Command::Lock(LockCommand {
                action: LockAction::Acquire(args),
            }) => {
                assert_eq!(args.path, "src/lib.rs");
                assert_eq!(args.task, "T-1");
                assert_eq!(args.ttl, Some(60));
            }
            other => panic!("Expected lock acquire, got {:?}", other),
        }
    }

    #[test]
    fn parse_lock_batch_requires_paths() {
        assert!(Cli::try_parse_from(["baton", "lock", "batch", "--task", "T"]).is_err());

        let cli = Cli::try_parse_from(["baton", "lock", "batch", "a.rs", "b.rs", "-t", "T"])
            .unwrap();
        match cli.command {
            Command::Lock(LockCommand {
                action: LockAction::Batch(args),
            }) => assert_eq!(args.paths, vec!["a.rs", "b.rs"]),
            other => panic!("Expected lock batch, got {:?}", other),
        }
    }

    #[test]
    fn parse_agent_after_subcommand() {
        let cli = Cli::try_parse_from(["baton", "lock", "release-all", "--agent", "b"]).unwrap();
        assert_eq!(cli.agent.as_deref(), Some("b"));
        assert!(matches!(
            cli.command,
            Command::Lock(LockCommand {
                action: LockAction::ReleaseAll
            })
        ));
    }

    #[test]
    fn parse_preflight_defaults() {
        let cli = Cli::try_parse_from(["baton", "preflight"]).unwrap();
        match cli.command {
            Command::Preflight(args) => {
                assert_eq!(args.mode, "full");
                assert!(args.extra.is_empty());
                assert!(!args.skip_handoff);
            }
            other => panic!("Expected preflight, got {:?}", other),
        }
    }

    #[test]
    fn parse_preflight_extra_list() {
        let cli = Cli::try_parse_from([
            "baton",
            "preflight",
            "--mode",
            "quick",
            "--extra",
            "e2e,docs",
            "--skip-handoff",
        ])
        .unwrap();
        match cli.command {
            Command::Preflight(args) => {
                assert_eq!(args.mode, "quick");
                assert_eq!(args.extra, vec!["e2e", "docs"]);
                assert!(args.skip_handoff);
            }
            other => panic!("Expected preflight, got {:?}", other),
        }
    }

    #[test]
    fn parse_handoff_record() {
        let cli = Cli::try_parse_from([
            "baton", "handoff", "record", "--run", "r-1", "--notes", "done", "--force",
        ])
        .unwrap();
        match cli.command {
            Command::Handoff(HandoffCommand {
                action: HandoffAction::Record(args),
            }) => {
                assert_eq!(args.run.as_deref(), Some("r-1"));
                assert_eq!(args.notes.as_deref(), Some("done"));
                assert!(args.force);
                assert!(args.session.is_none());
            }
            other => panic!("Expected handoff record, got {:?}", other),
        }
    }

    #[test]
    fn parse_context_set() {
        let cli =
            Cli::try_parse_from(["baton", "context", "set", "--task", "T", "a.rs", "b.rs"]).unwrap();
        match cli.command {
            Command::Context(ContextCommand {
                action: ContextAction::Set(args),
            }) => {
                assert_eq!(args.task, "T");
                assert_eq!(args.files, vec!["a.rs", "b.rs"]);
            }
            other => panic!("Expected context set, got {:?}", other),
        }
    }
}

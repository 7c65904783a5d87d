//! Command implementations for baton.
//!
//! Every handler returns the process exit code. Refusals (denied locks,
//! failed gates, blocked handoffs) are printed and mapped to their exit code;
//! only [`crate::error::BatonError`] values propagate as errors.

mod focus;
mod handoff;
mod init;
mod lock;
mod preflight;
mod status;

use crate::Baton;
use crate::cli::{Cli, Command, ContextAction, HandoffAction, LockAction};
use crate::error::Result;
use crate::events::default_actor;

/// Dispatch a parsed command line to its handler.
pub fn dispatch(cli: Cli) -> Result<i32> {
    let agent = cli.agent.unwrap_or_else(default_actor);

    match cli.command {
        Command::Init => init::cmd_init(),
        Command::Lock(lock_cmd) => {
            let baton = Baton::discover()?;
            match lock_cmd.action {
                LockAction::Acquire(args) => lock::cmd_acquire(&baton, &agent, args),
                LockAction::Batch(args) => lock::cmd_batch(&baton, &agent, args),
                LockAction::Release(args) => lock::cmd_release(&baton, &agent, args),
                LockAction::Renew(args) => lock::cmd_renew(&baton, &agent, args),
                LockAction::ReleaseAll => lock::cmd_release_all(&baton, &agent),
                LockAction::Sweep => lock::cmd_sweep(&baton, &agent),
                LockAction::List(args) => lock::cmd_list(&baton, args),
            }
        }
        Command::Inspect(args) => focus::cmd_inspect(&Baton::discover()?, &agent, args),
        Command::Context(context_cmd) => {
            let baton = Baton::discover()?;
            match context_cmd.action {
                ContextAction::Set(args) => focus::cmd_context_set(&baton, &agent, args),
                ContextAction::List => focus::cmd_context_list(&baton),
            }
        }
        Command::Preflight(args) => preflight::cmd_preflight(&Baton::discover()?, &agent, args),
        Command::Handoff(handoff_cmd) => {
            let baton = Baton::discover()?;
            match handoff_cmd.action {
                HandoffAction::Record(args) => handoff::cmd_record(&baton, &agent, args),
                HandoffAction::List => handoff::cmd_list(&baton),
            }
        }
        Command::Status => status::cmd_status(&Baton::discover()?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit_codes;
    use crate::test_support::DirGuard;
    use clap::Parser;
    use serial_test::serial;
    use tempfile::TempDir;

    fn run(args: &[&str]) -> Result<i32> {
        let mut argv = vec!["baton"];
        argv.extend_from_slice(args);
        dispatch(Cli::try_parse_from(argv).unwrap())
    }

    #[test]
    #[serial]
    fn commands_fail_without_store() {
        let temp_dir = TempDir::new().unwrap();
        let _guard = DirGuard::new(temp_dir.path());

        let err = run(&["status"]).unwrap_err();

        assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
        assert!(err.to_string().contains("baton init"));
    }

    #[test]
    #[serial]
    fn lock_lifecycle_exit_codes() {
        let temp_dir = TempDir::new().unwrap();
        let _guard = DirGuard::new(temp_dir.path());

        assert_eq!(run(&["init"]).unwrap(), exit_codes::SUCCESS);
        assert_eq!(
            run(&["--agent", "a", "lock", "acquire", "x.rs", "-t", "T"]).unwrap(),
            exit_codes::SUCCESS
        );
        assert_eq!(
            run(&["--agent", "b", "lock", "acquire", "x.rs", "-t", "T"]).unwrap(),
            exit_codes::LOCK_FAILURE
        );
        assert_eq!(
            run(&["--agent", "b", "lock", "release", "x.rs"]).unwrap(),
            exit_codes::LOCK_FAILURE
        );
        assert_eq!(
            run(&["--agent", "b", "lock", "renew", "x.rs"]).unwrap(),
            exit_codes::LOCK_FAILURE
        );
        assert_eq!(
            run(&["--agent", "b", "lock", "batch", "x.rs", "y.rs", "-t", "T"]).unwrap(),
            exit_codes::LOCK_FAILURE
        );
        assert_eq!(run(&["--agent", "b", "inspect", "x.rs", "y.rs"]).unwrap(), exit_codes::SUCCESS);
        assert_eq!(
            run(&["--agent", "a", "lock", "release", "x.rs"]).unwrap(),
            exit_codes::SUCCESS
        );
        assert_eq!(
            run(&["--agent", "a", "lock", "release", "x.rs"]).unwrap(),
            exit_codes::SUCCESS
        );
        assert_eq!(run(&["lock", "list", "--all"]).unwrap(), exit_codes::SUCCESS);
        assert_eq!(run(&["lock", "sweep"]).unwrap(), exit_codes::SUCCESS);
        assert_eq!(run(&["status"]).unwrap(), exit_codes::SUCCESS);
    }

    #[test]
    #[serial]
    fn invalid_path_is_user_error() {
        let temp_dir = TempDir::new().unwrap();
        let _guard = DirGuard::new(temp_dir.path());
        run(&["init"]).unwrap();

        let err = run(&["--agent", "a", "lock", "acquire", "src/", "-t", "T"]).unwrap_err();

        assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
    }

    #[test]
    #[serial]
    fn handoff_blocked_then_forced() {
        let temp_dir = TempDir::new().unwrap();
        let _guard = DirGuard::new(temp_dir.path());
        run(&["init"]).unwrap();
        run(&["--agent", "a", "lock", "acquire", "x.rs", "-t", "T"]).unwrap();

        assert_eq!(
            run(&["--agent", "a", "preflight", "--mode", "handoff-only"]).unwrap(),
            exit_codes::GATE_FAILURE
        );
        assert_eq!(
            run(&["--agent", "a", "handoff", "record"]).unwrap(),
            exit_codes::HANDOFF_BLOCKED
        );
        assert_eq!(
            run(&["--agent", "a", "handoff", "record", "--force"]).unwrap(),
            exit_codes::SUCCESS
        );
        assert_eq!(run(&["handoff", "list"]).unwrap(), exit_codes::SUCCESS);
    }

    #[test]
    #[serial]
    fn handoff_ignores_other_agents_passing_run() {
        let temp_dir = TempDir::new().unwrap();
        let _guard = DirGuard::new(temp_dir.path());
        run(&["init"]).unwrap();

        assert_eq!(
            run(&["--agent", "b", "preflight", "--mode", "handoff-only"]).unwrap(),
            exit_codes::SUCCESS
        );
        let b_run = Baton::discover().unwrap().latest_preflight().unwrap().unwrap();

        let err = run(&["--agent", "a", "handoff", "record"]).unwrap_err();
        assert_eq!(err.exit_code(), exit_codes::USER_ERROR);

        let err = run(&["--agent", "a", "handoff", "record", "--run", b_run.run_id.as_str()]).unwrap_err();
        assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
        assert!(Baton::discover().unwrap().list_handoffs().unwrap().is_empty());

        // B's own record picks up B's run.
        assert_eq!(
            run(&["--agent", "b", "handoff", "record"]).unwrap(),
            exit_codes::SUCCESS
        );
    }

    #[test]
    #[serial]
    fn handoff_without_preflight_is_user_error() {
        let temp_dir = TempDir::new().unwrap();
        let _guard = DirGuard::new(temp_dir.path());
        run(&["init"]).unwrap();

        let err = run(&["--agent", "a", "handoff", "record"]).unwrap_err();

        assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
    }
}

//! Implementation of the `baton init` command.
//!
//! Creates `.baton/` in the current directory:
//!
//! 1. `locks/`, `contexts/`, `history/` and `history/logs/`
//! 2. `config.yaml` with defaults (if missing)
//! 3. an `init` event in the audit log (first run only)
//!
//! Running it again is harmless.

use crate::Baton;
use crate::context::StoreContext;
use crate::error::{BatonError, Result};
use crate::exit_codes;

pub fn cmd_init() -> Result<i32> {
    let cwd = std::env::current_dir().map_err(|e| {
        BatonError::UserError(format!("failed to get current working directory: {}", e))
    })?;
    let existed = StoreContext::at(&cwd).store_exists();

    let baton = Baton::init(&cwd)?;
    let ctx = baton.context();

    if existed {
        println!("Baton store already initialized at {}", ctx.store_dir.display());
        return Ok(exit_codes::SUCCESS);
    }

    println!("Initialized baton store.");
    println!();
    println!("Store:  {}", ctx.store_dir.display());
    println!("Config: {}", ctx.config_path().display());
    println!();
    println!("Created directories:");
    println!("  .baton/locks/");
    println!("  .baton/contexts/");
    println!("  .baton/history/logs/");
    println!();
    println!("Agents can now lock files with `baton lock acquire <path> --task <id>`.");

    Ok(exit_codes::SUCCESS)
}

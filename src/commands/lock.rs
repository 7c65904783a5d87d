//! `baton lock` subcommands.

use crate::Baton;
use crate::cli::{AcquireArgs, BatchArgs, ListArgs, PathArgs, RenewArgs};
use crate::error::Result;
use crate::exit_codes;
use crate::inspect::LockFilter;
use crate::locks::{AcquireOutcome, BatchOutcome, GrantKind, Lock, ReleaseOutcome, RenewOutcome};

pub fn cmd_acquire(baton: &Baton, agent: &str, args: AcquireArgs) -> Result<i32> {
    match baton.acquire(&args.path, agent, &args.task, args.ttl)? {
        AcquireOutcome::Granted { lock, kind } => {
            match kind {
                GrantKind::New => println!("Locked {}", lock.file_path),
                GrantKind::Reentrant => println!("Already held; ttl refreshed: {}", lock.file_path),
                GrantKind::Reclaimed { previous } => println!(
                    "Locked {} (reclaimed stale lock of {}, task {})",
                    lock.file_path, previous.owner_agent_id, previous.task_id
                ),
            }
            println!("  Expires: {}", lock.expires_at.format("%Y-%m-%d %H:%M:%S UTC"));
            Ok(exit_codes::SUCCESS)
        }
        AcquireOutcome::Denied(denied) => {
            println!("Denied: {}", denied);
            Ok(exit_codes::LOCK_FAILURE)
        }
    }
}

pub fn cmd_batch(baton: &Baton, agent: &str, args: BatchArgs) -> Result<i32> {
    match baton.acquire_batch(&args.paths, agent, &args.task, args.ttl)? {
        BatchOutcome::AllGranted(locks) => {
            println!("Locked {} file(s):", locks.len());
            for lock in &locks {
                println!("  {}", lock.file_path);
            }
            Ok(exit_codes::SUCCESS)
        }
        BatchOutcome::PartialDenial {
            denied,
            granted_paths_already_released,
        } => {
            println!("Batch denied; no locks were kept.");
            for d in &denied {
                println!("  {}", d);
            }
            if !granted_paths_already_released.is_empty() {
                println!("Rolled back: {}", granted_paths_already_released.join(", "));
            }
            Ok(exit_codes::LOCK_FAILURE)
        }
    }
}

pub fn cmd_release(baton: &Baton, agent: &str, args: PathArgs) -> Result<i32> {
    match baton.release(&args.path, agent)? {
        ReleaseOutcome::Released(lock) => {
            println!("Released {}", lock.file_path);
            Ok(exit_codes::SUCCESS)
        }
        ReleaseOutcome::AlreadyFree => {
            println!("Not locked: {}", args.path);
            Ok(exit_codes::SUCCESS)
        }
        ReleaseOutcome::NotOwner(denied) => {
            println!("Not yours to release: {}", denied);
            Ok(exit_codes::LOCK_FAILURE)
        }
    }
}

pub fn cmd_renew(baton: &Baton, agent: &str, args: RenewArgs) -> Result<i32> {
    match baton.renew(&args.path, agent, args.ttl)? {
        RenewOutcome::Renewed(lock) => {
            println!(
                "Renewed {} until {}",
                lock.file_path,
                lock.expires_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            Ok(exit_codes::SUCCESS)
        }
        RenewOutcome::NotOwner(denied) => {
            println!("Not yours to renew: {}", denied);
            Ok(exit_codes::LOCK_FAILURE)
        }
        RenewOutcome::NotFound => {
            println!("No live lock on {}; acquire it again.", args.path);
            Ok(exit_codes::LOCK_FAILURE)
        }
    }
}

pub fn cmd_release_all(baton: &Baton, agent: &str) -> Result<i32> {
    let released = baton.release_all(agent)?;
    if released.is_empty() {
        println!("No locks held by {}.", agent);
    } else {
        println!("Released {} lock(s):", released.len());
        for lock in &released {
            println!("  {}", lock.file_path);
        }
    }
    Ok(exit_codes::SUCCESS)
}

pub fn cmd_sweep(baton: &Baton, agent: &str) -> Result<i32> {
    let reclaimed = baton.sweep_expired(agent)?;
    println!("Reclaimed {} expired lock(s).", reclaimed);
    Ok(exit_codes::SUCCESS)
}

pub fn cmd_list(baton: &Baton, args: ListArgs) -> Result<i32> {
    let filter = LockFilter {
        agent_id: args.owner,
        task_id: args.task,
        include_expired: args.all,
    };
    let locks = baton.list_active(&filter)?;

    if locks.is_empty() {
        println!("No active locks.");
        return Ok(exit_codes::SUCCESS);
    }

    println!("Locks ({}):", locks.len());
    println!();
    for lock in &locks {
        print_lock(lock);
    }

    let stale = locks.iter().filter(|l| l.is_expired()).count();
    if stale > 0 {
        println!(
            "Note: {} lock(s) are stale. Use `baton lock sweep` to reclaim them.",
            stale
        );
    }
    Ok(exit_codes::SUCCESS)
}

fn print_lock(lock: &Lock) {
    let now = chrono::Utc::now();
    println!("  {}:", lock.file_path);
    println!("    Owner:      {}", lock.owner_agent_id);
    println!("    Task:       {}", lock.task_id);
    println!("    Acquired:   {}", lock.acquired_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("    Age:        {}", lock.age_string(now));
    println!("    Expires:    {}", lock.expires_at.format("%Y-%m-%d %H:%M:%S UTC"));
    if lock.is_expired_at(now) {
        println!("    Status:     STALE");
    }
    println!();
}

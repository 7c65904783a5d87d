//! Implementation of the `baton status` command.

use crate::Baton;
use crate::error::Result;
use crate::exit_codes;

/// Number of audit events shown at the bottom of the summary.
const RECENT_EVENTS: usize = 5;

pub fn cmd_status(baton: &Baton) -> Result<i32> {
    let status = baton.status()?;

    println!("Baton Status");
    println!("============");
    println!();
    println!("Store: {}", baton.context().store_dir.display());
    println!();
    println!("  Active locks    {:>4}", status.active_locks);
    println!("  Stale locks     {:>4}", status.stale_locks);
    println!("  Contexts        {:>4}", status.contexts);
    println!("  Stale contexts  {:>4}", status.stale_contexts);
    println!();

    match &status.last_preflight {
        Some(run) => println!(
            "Last preflight: {} ({}, {}) at {}",
            run.run_id,
            run.mode,
            run.verdict,
            run.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        None => println!("Last preflight: none"),
    }
    match &status.last_handoff {
        Some(h) => println!(
            "Last handoff:   {} by {}{}",
            h.session_id,
            h.agent_id,
            if h.forced { " (forced)" } else { "" }
        ),
        None => println!("Last handoff:   none"),
    }

    let events = baton.recent_events(RECENT_EVENTS)?;
    if !events.is_empty() {
        println!();
        println!("Recent events:");
        for event in &events {
            println!(
                "  {}  {:<14} {}{}",
                event.ts.format("%H:%M:%S"),
                event.action,
                event.actor,
                event
                    .path
                    .as_deref()
                    .map(|p| format!("  {}", p))
                    .unwrap_or_default()
            );
        }
    }

    if status.stale_locks > 0 {
        println!();
        println!(
            "Note: {} stale lock(s). Use `baton lock sweep` to reclaim them.",
            status.stale_locks
        );
    }
    Ok(exit_codes::SUCCESS)
}

//! `baton inspect` and `baton context`.

use crate::Baton;
use crate::cli::{ContextSetArgs, InspectArgs};
use crate::error::Result;
use crate::exit_codes;

pub fn cmd_inspect(baton: &Baton, agent: &str, args: InspectArgs) -> Result<i32> {
    let report = baton.inspect(&args.paths, agent)?;

    for entry in report.entries.values() {
        println!("{}: {}", entry.file_path, entry.verdict);
        if !entry.focus_of.is_empty() {
            println!("  also in focus of: {}", entry.focus_of.join(", "));
        }
    }
    if report.has_conflicts() {
        println!();
        println!(
            "{} path(s) locked by other agents.",
            report.conflicting_paths().len()
        );
    }
    Ok(exit_codes::SUCCESS)
}

pub fn cmd_context_set(baton: &Baton, agent: &str, args: ContextSetArgs) -> Result<i32> {
    let update = baton.update_context(agent, &args.task, &args.files)?;
    let context = &update.context;

    println!(
        "Context for {}: task {}, {} file(s), fingerprint {}",
        context.agent_id,
        context.task_id,
        context.focus_files.len(),
        context.short_fingerprint()
    );
    if !update.changed {
        println!("  (unchanged)");
    }
    Ok(exit_codes::SUCCESS)
}

pub fn cmd_context_list(baton: &Baton) -> Result<i32> {
    let views = baton.list_contexts()?;
    if views.is_empty() {
        println!("No contexts declared.");
        return Ok(exit_codes::SUCCESS);
    }

    for view in &views {
        let c = &view.context;
        println!(
            "{} [task {}] {}{}",
            c.agent_id,
            c.task_id,
            c.short_fingerprint(),
            if view.stale { " STALE" } else { "" }
        );
        println!("  Updated: {}", c.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
        for file in &c.focus_files {
            println!("  - {}", file);
        }
    }
    Ok(exit_codes::SUCCESS)
}

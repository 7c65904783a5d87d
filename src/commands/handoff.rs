//! `baton handoff`.

use crate::Baton;
use crate::cli::HandoffRecordArgs;
use crate::error::{BatonError, Result};
use crate::exit_codes;
use crate::handoff::{HandoffOutcome, HandoffRequest};
use uuid::Uuid;

pub fn cmd_record(baton: &Baton, agent: &str, args: HandoffRecordArgs) -> Result<i32> {
    let preflight = match &args.run {
        Some(run_id) => {
            let run = baton.find_preflight(run_id)?.ok_or_else(|| {
                BatonError::UserError(format!("no preflight run with id '{}'", run_id))
            })?;
            if run.agent_id.as_deref() != Some(agent) {
                return Err(BatonError::UserError(format!(
                    "preflight run '{}' was not run by '{}'",
                    run_id, agent
                )));
            }
            run
        }
        None => baton.latest_preflight_for(agent)?.ok_or_else(|| {
            BatonError::UserError(format!(
                "no preflight run recorded for '{}'. Run `baton preflight` first.",
                agent
            ))
        })?,
    };

    let session_id = args
        .session
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let mut request = HandoffRequest::new(session_id, agent, preflight).forced(args.force);
    if let Some(notes) = args.notes {
        request = request.with_notes(notes);
    }

    match baton.record_handoff(&request)? {
        HandoffOutcome::Recorded(snapshot) => {
            println!(
                "Recorded handoff for {} (session {})",
                snapshot.agent_id, snapshot.session_id
            );
            println!(
                "  Preflight: {} {}",
                snapshot.preflight_run_id, snapshot.preflight_verdict
            );
            if snapshot.forced {
                println!("  FORCED past:");
                for reason in &snapshot.override_reasons {
                    println!("    - {}", reason);
                }
            }
            Ok(exit_codes::SUCCESS)
        }
        HandoffOutcome::Blocked(reasons) => {
            println!("Handoff blocked:");
            for reason in &reasons {
                println!("  - {}", reason);
            }
            println!();
            println!("Fix the above, or pass --force to record anyway.");
            Ok(exit_codes::HANDOFF_BLOCKED)
        }
    }
}

pub fn cmd_list(baton: &Baton) -> Result<i32> {
    let snapshots = baton.list_handoffs()?;
    if snapshots.is_empty() {
        println!("No handoffs recorded.");
        return Ok(exit_codes::SUCCESS);
    }

    for s in &snapshots {
        println!(
            "{}  {}  session {}  preflight {} {}{}",
            s.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            s.agent_id,
            s.session_id,
            s.preflight_run_id,
            s.preflight_verdict,
            if s.forced { "  FORCED" } else { "" }
        );
        if let Some(notes) = &s.notes {
            println!("    {}", notes);
        }
    }
    Ok(exit_codes::SUCCESS)
}

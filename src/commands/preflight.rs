//! `baton preflight`.

use crate::Baton;
use crate::cli::PreflightArgs;
use crate::error::Result;
use crate::exit_codes;
use crate::preflight::{PreflightMode, PreflightOptions};

pub fn cmd_preflight(baton: &Baton, agent: &str, args: PreflightArgs) -> Result<i32> {
    let options = PreflightOptions {
        mode: args.mode.parse::<PreflightMode>()?,
        extra_suites: args.extra,
        skip_handoff: args.skip_handoff,
        agent_id: Some(agent.to_string()),
    };

    let result = baton.run_preflight(&options)?;

    println!("Preflight {} ({}): {}", result.run_id, result.mode, result.verdict);
    for outcome in &result.outcomes {
        println!(
            "  {:<12} {} {:>6} ms{}",
            outcome.name,
            if outcome.passed() { "PASS" } else { "FAIL" },
            outcome.duration_ms,
            if outcome.required { "" } else { "  (optional)" }
        );
        if let Some(cause) = &outcome.cause {
            for line in cause.lines().take(3) {
                println!("      {}", line);
            }
        }
    }
    println!();
    println!("Log: {}", baton.preflight_log_path(&result).display());

    if result.passed() {
        Ok(exit_codes::SUCCESS)
    } else {
        Ok(exit_codes::GATE_FAILURE)
    }
}

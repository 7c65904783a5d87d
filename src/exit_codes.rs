//! Exit code constants for the baton CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid config, uninitialized store)
//! - 2: Preflight gate failed
//! - 3: Lock store failure (I/O, guard timeout)
//! - 4: Lock refused (denied, not owner, not found, partial batch denial)
//! - 5: Handoff blocked

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid config, or missing store.
pub const USER_ERROR: i32 = 1;

/// Preflight gate verdict was `failed`.
pub const GATE_FAILURE: i32 = 2;

/// Persistence failure in the lock store or history logs.
pub const STORE_FAILURE: i32 = 3;

/// A lock operation was refused.
pub const LOCK_FAILURE: i32 = 4;

/// Handoff preconditions were not met and the record was not forced.
pub const HANDOFF_BLOCKED: i32 = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            SUCCESS,
            USER_ERROR,
            GATE_FAILURE,
            STORE_FAILURE,
            LOCK_FAILURE,
            HANDOFF_BLOCKED,
        ];
        for (i, &a) in codes.iter().enumerate() {
            for (j, &b) in codes.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "Exit codes must be distinct");
                }
            }
        }
    }

    #[test]
    fn success_is_zero() {
        assert_eq!(SUCCESS, 0);
    }
}

//! HITL (human-in-the-loop) protocol (spec.md §4.5, §6.5, C5).
//!
//! Grounded on the original's `check_hitl_timeout`/`format_timeout_warning`:
//! the literal fallback string is `"timeout_expired"`, and timeouts are
//! only checked on resume, never by a background sweeper (spec.md §9 Open
//! Questions).

use crate::session::HitlState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Literal substituted for a HITL response when the gate's `timeout_at`
/// has passed and no `default_response` was configured (spec.md §4.5
/// point 3).
pub const TIMEOUT_EXPIRED: &str = "timeout_expired";

/// Checks whether a paused HITL gate's deadline has passed. Returns the
/// value to substitute (`default_response` or [`TIMEOUT_EXPIRED`]) if so.
/// Called only when the executor is re-entered for resume — there is no
/// background sweeper (spec.md §9).
pub fn check_timeout(hitl: &HitlState, now: DateTime<Utc>) -> Option<String> {
    if !hitl.active {
        return None;
    }
    let timeout_at = hitl.timeout_at?;
    if now > timeout_at {
        Some(
            hitl.default_response
                .clone()
                .unwrap_or_else(|| TIMEOUT_EXPIRED.to_string()),
        )
    } else {
        None
    }
}

pub fn format_timeout_warning(timeout_at: DateTime<Utc>, default_response: &str) -> String {
    format!(
        "HITL timeout expired at {timeout_at}; substituting default response {default_response:?}"
    )
}

/// The host-supplied function that resolves a paused HITL gate to a
/// response string (spec.md §6.5). Implementations MUST NOT mutate the
/// provided state; they may consult external systems (a chat message, a
/// ticket queue, a terminal prompt).
#[async_trait]
pub trait HitlHandler: Send + Sync {
    async fn resolve(&self, state: &HitlState) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn hitl(active: bool, timeout_at: Option<DateTime<Utc>>, default: Option<&str>) -> HitlState {
        HitlState {
            active,
            task_id: "t".into(),
            prompt: "approve?".into(),
            context_display: "".into(),
            default_response: default.map(str::to_string),
            timeout_at,
        }
    }

    #[test]
    fn inactive_state_never_times_out() {
        let state = hitl(false, Some(Utc::now() - ChronoDuration::hours(1)), None);
        assert!(check_timeout(&state, Utc::now()).is_none());
    }

    #[test]
    fn no_timeout_at_never_times_out() {
        let state = hitl(true, None, None);
        assert!(check_timeout(&state, Utc::now()).is_none());
    }

    #[test]
    fn past_timeout_without_default_substitutes_literal() {
        let state = hitl(true, Some(Utc::now() - ChronoDuration::hours(1)), None);
        assert_eq!(check_timeout(&state, Utc::now()).unwrap(), TIMEOUT_EXPIRED);
    }

    #[test]
    fn past_timeout_with_default_substitutes_default() {
        let state = hitl(true, Some(Utc::now() - ChronoDuration::hours(1)), Some("approved"));
        assert_eq!(check_timeout(&state, Utc::now()).unwrap(), "approved");
    }

    #[test]
    fn future_timeout_does_not_substitute() {
        let state = hitl(true, Some(Utc::now() + ChronoDuration::hours(1)), None);
        assert!(check_timeout(&state, Utc::now()).is_none());
    }
}

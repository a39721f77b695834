// The open/close switch and the deadline of a round.

use crate::smartvote::*;

use chrono::{DateTime, FixedOffset, Utc};

pub fn parse_deadline(value: &str) -> BSvResult<DateTime<FixedOffset>> {
    let d = DateTime::parse_from_rfc3339(value.trim()).context(ParsingDeadlineSnafu { value })?;
    Ok(d)
}

/// Fails when submissions are not accepted at `now`.
///
/// The deadline is checked first: a round past its deadline reports closed
/// even if it was also paused. Submissions at the deadline itself are still
/// accepted.
pub fn check_gate(gate: &VotingGate, now: DateTime<Utc>) -> BSvResult<()> {
    if let Some(deadline) = gate.deadline()? {
        debug!("check_gate: deadline {} now {}", deadline, now);
        ensure!(
            now <= deadline,
            VotingClosedSnafu {
                deadline: deadline.to_rfc3339()
            }
        );
    }
    ensure!(gate.active, VotingPausedSnafu {});
    Ok(())
}

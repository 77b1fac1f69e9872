//! Gift sending: buy a catalog container for another player, unit by unit.

use giftwire_protocol::{status_code, Command, Session, SessionResult, Transport};

use crate::config::{pause, Tuning};
use crate::events::{EngineEvent, EventSink};

/// Outcome of a send run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SendReport {
    /// Purchase commands sent.
    pub sent: u32,
    /// Confirmed with `code="0"`.
    pub succeeded: u32,
    /// Anything else, including no answer.
    pub failed: u32,
}

/// Sends `count` units of `souvenir` to `recipient`.
///
/// Each purchase gets one read; a unit succeeded only if the response
/// carries `code="0"`. Failed units are not retried.
///
/// # Errors
///
/// Only connection failures.
pub fn send_gifts<T: Transport>(
    session: &mut Session<T>,
    tuning: &Tuning,
    events: &EventSink,
    recipient: &str,
    souvenir: &str,
    count: u32,
) -> SessionResult<SendReport> {
    let mut report = SendReport::default();
    let plan = tuning.send.plan();

    for index in 1..=count {
        if index > 1 {
            pause(tuning.send_pacing_ms);
        }
        let capture = session
            .send(&Command::Purchase {
                recipient: recipient.to_string(),
                souvenir: souvenir.to_string(),
            })?
            .receive_until(&plan)?;
        report.sent += 1;

        let code = status_code(&capture.text());
        let succeeded = code == Some(0);
        if succeeded {
            report.succeeded += 1;
        } else {
            report.failed += 1;
            tracing::debug!(index, ?code, "send not confirmed");
        }
        events.emit(EngineEvent::GiftSent {
            index,
            total: count,
            succeeded,
        });
    }

    tracing::info!(
        recipient,
        souvenir,
        sent = report.sent,
        succeeded = report.succeeded,
        failed = report.failed,
        "send finished"
    );
    Ok(report)
}

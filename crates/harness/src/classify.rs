//! Failure classification
//!
//! Pure, deterministic mapping from a raised error to the retry taxonomy.
//! Rules are checked in order; the first match wins. Retrying assertion
//! failures wastes time and hides real bugs, so only recognized timing and
//! network symptoms classify as transient.

use gridrunner_common::{Error, FailureClass};

/// What the classifier decided about an error. Skip signals are not
/// failures at all and short-circuit retry entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Skip,
    Failure(FailureClass),
}

/// Message markers that indicate a transient network or session problem in
/// an otherwise unclassified driver error.
const NETWORK_MARKERS: &[&str] = &[
    "session",
    "connection",
    "timed out",
    "unreachable",
    "not reachable",
    "socket",
    "net::",
    "dns",
];

/// Classify an error. Never raises; only labels.
pub fn classify(error: &Error) -> Disposition {
    match error {
        // 1. Explicit test-expectation failures are never retried.
        Error::Assertion(_) => Disposition::Failure(FailureClass::FatalAssertion),

        // 2. Explicit skip signals are not failures.
        Error::Skip(_) => Disposition::Skip,

        // 3. Known timing/staleness symptoms.
        Error::WaitTimeout { .. }
        | Error::StaleElement(_)
        | Error::NotInteractable(_)
        | Error::ClickIntercepted(_) => Disposition::Failure(FailureClass::TransientUiTiming),

        // 4. Known session/connection loss.
        Error::SessionLost(_) | Error::WindowClosed(_) | Error::Unreachable(_) => {
            Disposition::Failure(FailureClass::TransientNetwork)
        }

        // 5. Generic network failures.
        Error::Connect(_) | Error::SocketTimeout(_) | Error::Dns(_) => {
            Disposition::Failure(FailureClass::TransientNetwork)
        }

        // 6. Unclassified driver errors: scan the message once, here, rather
        //    than re-matching foreign exception names throughout the harness.
        Error::Driver(message) => {
            if message_suggests_network(message) {
                Disposition::Failure(FailureClass::TransientNetwork)
            } else {
                Disposition::Failure(FailureClass::FatalOther)
            }
        }

        // 7. Wrapped errors defer to their cause.
        Error::Step { source, .. } => classify(source),

        // 8. Everything else is a genuine defect.
        _ => Disposition::Failure(FailureClass::FatalOther),
    }
}

/// True when a failure means the underlying session is unrecoverable and the
/// retry must re-acquire a fresh one. All other transient failures reuse the
/// worker's session.
pub fn forces_session_renewal(error: &Error) -> bool {
    match error {
        Error::SessionLost(_) | Error::WindowClosed(_) | Error::Unreachable(_) => true,
        Error::Driver(message) => {
            let m = message.to_ascii_lowercase();
            m.contains("session") || m.contains("unreachable") || m.contains("not reachable")
        }
        Error::Step { source, .. } => forces_session_renewal(source),
        _ => false,
    }
}

fn message_suggests_network(message: &str) -> bool {
    let m = message.to_ascii_lowercase();
    NETWORK_MARKERS.iter().any(|marker| m.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class_of(error: &Error) -> FailureClass {
        match classify(error) {
            Disposition::Failure(class) => class,
            Disposition::Skip => panic!("unexpected skip"),
        }
    }

    #[test]
    fn assertions_are_fatal() {
        let e = Error::Assertion("expected 3 rows, got 2".into());
        assert_eq!(class_of(&e), FailureClass::FatalAssertion);
    }

    #[test]
    fn skips_short_circuit() {
        assert_eq!(classify(&Error::Skip("env not ready".into())), Disposition::Skip);
    }

    #[test]
    fn timing_symptoms_are_transient_ui() {
        let timeout = Error::WaitTimeout {
            description: "modal visible".into(),
            last_seen: None,
        };
        assert_eq!(class_of(&timeout), FailureClass::TransientUiTiming);
        assert_eq!(
            class_of(&Error::StaleElement("#submit".into())),
            FailureClass::TransientUiTiming
        );
        assert_eq!(
            class_of(&Error::ClickIntercepted("#overlay".into())),
            FailureClass::TransientUiTiming
        );
    }

    #[test]
    fn session_and_network_symptoms_are_transient_network() {
        assert_eq!(
            class_of(&Error::SessionLost("tab crashed".into())),
            FailureClass::TransientNetwork
        );
        assert_eq!(
            class_of(&Error::Connect("refused".into())),
            FailureClass::TransientNetwork
        );
        assert_eq!(
            class_of(&Error::Dns("grid.example".into())),
            FailureClass::TransientNetwork
        );
    }

    #[test]
    fn driver_messages_are_scanned_for_markers() {
        let net = Error::Driver("net::ERR_CONNECTION_RESET".into());
        assert_eq!(class_of(&net), FailureClass::TransientNetwork);

        let stale_session = Error::Driver("invalid Session id".into());
        assert_eq!(class_of(&stale_session), FailureClass::TransientNetwork);

        let opaque = Error::Driver("unknown command".into());
        assert_eq!(class_of(&opaque), FailureClass::FatalOther);
    }

    #[test]
    fn wrapped_errors_defer_to_their_cause() {
        let wrapped = Error::Assertion("totals differ".into())
            .context("verify cart")
            .context("checkout flow");
        assert_eq!(class_of(&wrapped), FailureClass::FatalAssertion);

        let wrapped_skip = Error::Skip("flag off".into()).context("precondition");
        assert_eq!(classify(&wrapped_skip), Disposition::Skip);
    }

    #[test]
    fn defaults_to_fatal_other() {
        assert_eq!(
            class_of(&Error::Internal("bookkeeping bug".into())),
            FailureClass::FatalOther
        );
    }

    #[test]
    fn classification_is_deterministic() {
        let e = Error::Driver("connection closed by remote host".into());
        let first = classify(&e);
        for _ in 0..10 {
            assert_eq!(classify(&e), first);
        }
    }

    #[test]
    fn session_renewal_only_for_session_loss() {
        assert!(forces_session_renewal(&Error::SessionLost("gone".into())));
        assert!(forces_session_renewal(&Error::Unreachable("grid down".into())));
        assert!(forces_session_renewal(&Error::Driver(
            "chrome not reachable".into()
        )));
        assert!(!forces_session_renewal(&Error::StaleElement("#id".into())));
        assert!(!forces_session_renewal(&Error::Connect("refused".into())));
        assert!(forces_session_renewal(
            &Error::WindowClosed("main".into()).context("click")
        ));
    }
}

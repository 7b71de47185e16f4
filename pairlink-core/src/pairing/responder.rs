//! Responder pairing session
//!
//! A device in pairing mode answers Requests addressed to its device type
//! and admits the requester once it proves the secret over our challenge.
//! Both the pairing-mode window and the pending confirmation expire lazily.

use pairlink_protocol::{
    Challenge, DeviceType, MacAddress, PairingConfirm, PairingRequest, RejectReason,
    PROTOCOL_VERSION,
};

use crate::config::LinkConfig;
use crate::security::{verify_hmac, PairingSecret};

/// Requester we answered and now expect a Confirm from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PendingConfirm {
    pub requester: MacAddress,
    pub requester_type: DeviceType,
    /// Challenge we issued in our Response
    pub challenge: Challenge,
    pub deadline_ms: u64,
}

/// Outcome of checking a Request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RequestVerdict {
    /// Addressed to another device type, or spoofed; stay silent
    NotForUs,
    /// Answer with a Reject
    Reject(RejectReason),
    /// Answer with a Response
    Accept,
}

/// Outcome of checking a Confirm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfirmVerdict {
    /// No pending requester matches the sender
    Unexpected,
    /// The pending requester answered too late
    Expired,
    /// Requester aborted (success flag clear)
    Declined,
    /// Proof over our challenge is wrong
    HmacFailed,
    /// Requester proved the secret; admit it
    Accepted(PendingConfirm),
}

#[derive(Debug, Clone, Default)]
pub struct ResponderSession {
    window_deadline_ms: Option<u64>,
    pending: Option<PendingConfirm>,
}

impl ResponderSession {
    pub const fn new() -> Self {
        Self {
            window_deadline_ms: None,
            pending: None,
        }
    }

    /// Open (or extend) the pairing-mode window
    pub fn enter(&mut self, now_ms: u64, timeout_ms: u64) {
        self.window_deadline_ms = Some(now_ms.saturating_add(timeout_ms));
    }

    /// Close the window and drop any pending requester
    pub fn exit(&mut self) {
        self.window_deadline_ms = None;
        self.pending = None;
    }

    /// Whether pairing mode is open, closing it if the window elapsed
    pub fn is_open(&mut self, now_ms: u64) -> bool {
        match self.window_deadline_ms {
            Some(deadline) if now_ms < deadline => true,
            Some(_) => {
                self.window_deadline_ms = None;
                false
            }
            None => false,
        }
    }

    pub fn pending(&self) -> Option<&PendingConfirm> {
        self.pending.as_ref()
    }

    /// Check a Request received from `source`
    ///
    /// `capacity_blocked` is true when the peer table is full and does not
    /// already hold the requester.
    pub fn evaluate_request(
        &mut self,
        request: &PairingRequest,
        source: MacAddress,
        config: &LinkConfig,
        capacity_blocked: bool,
        now_ms: u64,
    ) -> RequestVerdict {
        if request.expected_type != config.device_type.as_u8() || request.requester != source {
            return RequestVerdict::NotForUs;
        }
        if !self.is_open(now_ms) {
            return RequestVerdict::Reject(RejectReason::NotInPairingMode);
        }
        if request.version != PROTOCOL_VERSION {
            return RequestVerdict::Reject(RejectReason::ProtocolMismatch);
        }
        if request.requester_type != config.peer_type.as_u8() {
            return RequestVerdict::Reject(RejectReason::WrongDeviceType);
        }
        if capacity_blocked {
            return RequestVerdict::Reject(RejectReason::AlreadyPaired);
        }
        RequestVerdict::Accept
    }

    /// Remember a requester after our Response went out
    ///
    /// Replaces any earlier pending requester.
    pub fn arm(&mut self, pending: PendingConfirm) {
        self.pending = Some(pending);
    }

    /// Check a Confirm received from `source`
    ///
    /// Any verdict other than `Unexpected` consumes the pending requester.
    pub fn evaluate_confirm(
        &mut self,
        confirm: &PairingConfirm,
        source: MacAddress,
        secret: &PairingSecret,
        now_ms: u64,
    ) -> ConfirmVerdict {
        let pending = match self.pending {
            Some(p) if p.requester == source && confirm.confirmer == source => p,
            _ => return ConfirmVerdict::Unexpected,
        };
        self.pending = None;

        if now_ms >= pending.deadline_ms {
            return ConfirmVerdict::Expired;
        }
        if !confirm.success {
            return ConfirmVerdict::Declined;
        }
        if !verify_hmac(secret, &pending.challenge, &confirm.hmac) {
            return ConfirmVerdict::HmacFailed;
        }
        ConfirmVerdict::Accepted(pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::compute_hmac;

    const UNIT: MacAddress = MacAddress([0x02, 0, 0, 0, 0, 0x20]);
    const REMOTE: MacAddress = MacAddress([0x02, 0, 0, 0, 0, 0x30]);
    const OUR_CHALLENGE: Challenge = [8, 7, 6, 5, 4, 3, 2, 1];

    fn secret() -> PairingSecret {
        PairingSecret::new([0x3C; 16]).unwrap()
    }

    fn request() -> PairingRequest {
        PairingRequest {
            requester: REMOTE,
            requester_type: DeviceType::RemoteController.as_u8(),
            expected_type: DeviceType::FatigueTester.as_u8(),
            challenge: [1; 8],
            version: PROTOCOL_VERSION,
        }
    }

    fn pending(deadline_ms: u64) -> PendingConfirm {
        PendingConfirm {
            requester: REMOTE,
            requester_type: DeviceType::RemoteController,
            challenge: OUR_CHALLENGE,
            deadline_ms,
        }
    }

    fn confirm(secret: &PairingSecret) -> PairingConfirm {
        PairingConfirm {
            confirmer: REMOTE,
            hmac: compute_hmac(secret, &OUR_CHALLENGE),
            success: true,
        }
    }

    #[test]
    fn test_window_expires() {
        let mut session = ResponderSession::new();
        assert!(!session.is_open(0));

        session.enter(0, 30_000);
        assert!(session.is_open(29_999));
        assert!(!session.is_open(30_000));
        assert!(!session.is_open(0));
    }

    #[test]
    fn test_request_checks_in_order() {
        let config = LinkConfig::test_unit(UNIT);
        let mut session = ResponderSession::new();

        assert_eq!(
            session.evaluate_request(&request(), REMOTE, &config, false, 0),
            RequestVerdict::Reject(RejectReason::NotInPairingMode)
        );

        session.enter(0, 30_000);
        let mut old = request();
        old.version = 0;
        assert_eq!(
            session.evaluate_request(&old, REMOTE, &config, false, 0),
            RequestVerdict::Reject(RejectReason::ProtocolMismatch)
        );

        let mut wrong = request();
        wrong.requester_type = DeviceType::FatigueTester.as_u8();
        assert_eq!(
            session.evaluate_request(&wrong, REMOTE, &config, false, 0),
            RequestVerdict::Reject(RejectReason::WrongDeviceType)
        );

        assert_eq!(
            session.evaluate_request(&request(), REMOTE, &config, true, 0),
            RequestVerdict::Reject(RejectReason::AlreadyPaired)
        );

        assert_eq!(
            session.evaluate_request(&request(), REMOTE, &config, false, 0),
            RequestVerdict::Accept
        );
    }

    #[test]
    fn test_request_for_other_type_is_silent() {
        let config = LinkConfig::test_unit(UNIT);
        let mut session = ResponderSession::new();
        let mut other = request();
        other.expected_type = DeviceType::Unknown.as_u8();

        assert_eq!(
            session.evaluate_request(&other, REMOTE, &config, false, 0),
            RequestVerdict::NotForUs
        );
        assert_eq!(
            session.evaluate_request(&request(), UNIT, &config, false, 0),
            RequestVerdict::NotForUs
        );
    }

    #[test]
    fn test_confirm_accepted() {
        let mut session = ResponderSession::new();
        session.arm(pending(10_000));

        assert_eq!(
            session.evaluate_confirm(&confirm(&secret()), REMOTE, &secret(), 5_000),
            ConfirmVerdict::Accepted(pending(10_000))
        );
        assert!(session.pending().is_none());
    }

    #[test]
    fn test_confirm_from_stranger_keeps_pending() {
        let mut session = ResponderSession::new();
        session.arm(pending(10_000));

        assert_eq!(
            session.evaluate_confirm(&confirm(&secret()), UNIT, &secret(), 5_000),
            ConfirmVerdict::Unexpected
        );
        assert!(session.pending().is_some());
    }

    #[test]
    fn test_confirm_failures_consume_pending() {
        let mut session = ResponderSession::new();

        session.arm(pending(10_000));
        assert_eq!(
            session.evaluate_confirm(&confirm(&secret()), REMOTE, &secret(), 10_000),
            ConfirmVerdict::Expired
        );

        session.arm(pending(10_000));
        let mut declined = confirm(&secret());
        declined.success = false;
        assert_eq!(
            session.evaluate_confirm(&declined, REMOTE, &secret(), 0),
            ConfirmVerdict::Declined
        );

        session.arm(pending(10_000));
        let other = PairingSecret::new([0x11; 16]).unwrap();
        assert_eq!(
            session.evaluate_confirm(&confirm(&other), REMOTE, &secret(), 0),
            ConfirmVerdict::HmacFailed
        );
        assert!(session.pending().is_none());
    }

    #[test]
    fn test_exit_drops_pending() {
        let mut session = ResponderSession::new();
        session.enter(0, 30_000);
        session.arm(pending(10_000));
        session.exit();
        assert!(!session.is_open(0));
        assert!(session.pending().is_none());
    }
}

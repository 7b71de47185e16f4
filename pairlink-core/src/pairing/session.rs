//! Initiator pairing session
//!
//! Holds the single in-flight attempt: our challenge, the deadline and the
//! responder once admitted. Timeouts are applied lazily whenever the state
//! is read or a response is evaluated.

use pairlink_protocol::{Challenge, DeviceType, MacAddress, PairingResponse, CHALLENGE_SIZE};

use super::machine::{PairingEvent, PairingFailure, PairingState};
use crate::security::{verify_hmac, PairingSecret};

/// Outcome of checking a Response against the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResponseVerdict {
    /// No attempt in flight (or it just timed out)
    NotWaiting,
    /// Payload address differs from the link source
    AddressMismatch,
    /// Responder is not the type we asked for
    WrongDeviceType,
    /// Proof over our challenge is wrong; the session has failed
    HmacMismatch,
    /// Proof verified; caller should confirm and admit
    Accepted,
}

#[derive(Debug, Clone)]
pub struct PairingSession {
    state: PairingState,
    challenge: Challenge,
    responder: Option<MacAddress>,
    deadline_ms: u64,
}

impl Default for PairingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl PairingSession {
    pub const fn new() -> Self {
        Self {
            state: PairingState::Idle,
            challenge: [0; CHALLENGE_SIZE],
            responder: None,
            deadline_ms: 0,
        }
    }

    fn apply(&mut self, event: PairingEvent) {
        self.state = self.state.transition(event);
    }

    fn expire(&mut self, now_ms: u64) {
        if self.state.is_in_flight() && now_ms >= self.deadline_ms {
            self.apply(PairingEvent::DeadlineElapsed);
        }
    }

    /// Current state, after applying any elapsed deadline
    pub fn state(&mut self, now_ms: u64) -> PairingState {
        self.expire(now_ms);
        self.state
    }

    /// True while an unexpired attempt holds the session
    pub fn is_in_flight(&mut self, now_ms: u64) -> bool {
        self.state(now_ms).is_in_flight()
    }

    /// Arm a new attempt once its Request has gone out
    pub fn begin(&mut self, challenge: Challenge, now_ms: u64, timeout_ms: u64) {
        self.challenge = challenge;
        self.responder = None;
        self.deadline_ms = now_ms.saturating_add(timeout_ms);
        self.apply(PairingEvent::Started);
    }

    pub fn cancel(&mut self) {
        self.responder = None;
        self.apply(PairingEvent::Cancel);
    }

    /// Challenge of the current (or last) attempt
    pub fn challenge(&self) -> &Challenge {
        &self.challenge
    }

    pub fn deadline_ms(&self) -> u64 {
        self.deadline_ms
    }

    /// Responder admitted by the last completed attempt
    pub fn responder(&self) -> Option<MacAddress> {
        self.responder
    }

    /// Check a Response received from `source`
    ///
    /// Only an HMAC mismatch changes state; responses from the wrong device
    /// type or with a spoofed address are ignored so a genuine responder can
    /// still complete the attempt.
    pub fn evaluate_response(
        &mut self,
        response: &PairingResponse,
        source: MacAddress,
        expected_type: DeviceType,
        secret: &PairingSecret,
        now_ms: u64,
    ) -> ResponseVerdict {
        if !self.is_in_flight(now_ms) {
            return ResponseVerdict::NotWaiting;
        }
        if response.responder != source {
            return ResponseVerdict::AddressMismatch;
        }
        if response.responder_type != expected_type.as_u8() {
            return ResponseVerdict::WrongDeviceType;
        }
        if !verify_hmac(secret, &self.challenge, &response.hmac) {
            self.apply(PairingEvent::Failure(PairingFailure::HmacMismatch));
            return ResponseVerdict::HmacMismatch;
        }
        ResponseVerdict::Accepted
    }

    /// Record a failure after an accepted response
    pub fn fail(&mut self, reason: PairingFailure) {
        self.apply(PairingEvent::Failure(reason));
    }

    /// Record the admitted responder
    pub fn complete(&mut self, responder: MacAddress) {
        self.responder = Some(responder);
        self.apply(PairingEvent::PeerAdmitted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::compute_hmac;
    use pairlink_protocol::{device_name, HMAC_SIZE};

    const RESPONDER: MacAddress = MacAddress([0x02, 0, 0, 0, 0, 0x10]);
    const CHALLENGE: Challenge = [1, 2, 3, 4, 5, 6, 7, 8];

    fn secret() -> PairingSecret {
        PairingSecret::new([0x3C; 16]).unwrap()
    }

    fn response(device_type: DeviceType, secret: &PairingSecret) -> PairingResponse {
        PairingResponse {
            responder: RESPONDER,
            responder_type: device_type.as_u8(),
            challenge: [9; 8],
            hmac: compute_hmac(secret, &CHALLENGE),
            name: device_name("Rig"),
        }
    }

    fn waiting() -> PairingSession {
        let mut session = PairingSession::new();
        session.begin(CHALLENGE, 1_000, 10_000);
        session
    }

    #[test]
    fn test_begin_arms_deadline() {
        let mut session = waiting();
        assert_eq!(session.state(1_000), PairingState::WaitingForResponse);
        assert_eq!(session.deadline_ms(), 11_000);
        assert_eq!(session.challenge(), &CHALLENGE);
    }

    #[test]
    fn test_lazy_timeout() {
        let mut session = waiting();
        assert!(session.is_in_flight(10_999));
        assert_eq!(
            session.state(11_000),
            PairingState::Failed(PairingFailure::Timeout)
        );
    }

    #[test]
    fn test_accepts_valid_response() {
        let mut session = waiting();
        let verdict = session.evaluate_response(
            &response(DeviceType::FatigueTester, &secret()),
            RESPONDER,
            DeviceType::FatigueTester,
            &secret(),
            2_000,
        );
        assert_eq!(verdict, ResponseVerdict::Accepted);
        assert!(session.is_in_flight(2_000));

        session.complete(RESPONDER);
        assert_eq!(session.state(2_000), PairingState::Complete);
        assert_eq!(session.responder(), Some(RESPONDER));
    }

    #[test]
    fn test_wrong_type_keeps_waiting() {
        let mut session = waiting();
        let verdict = session.evaluate_response(
            &response(DeviceType::RemoteController, &secret()),
            RESPONDER,
            DeviceType::FatigueTester,
            &secret(),
            2_000,
        );
        assert_eq!(verdict, ResponseVerdict::WrongDeviceType);
        assert_eq!(session.state(2_000), PairingState::WaitingForResponse);
    }

    #[test]
    fn test_spoofed_address_ignored() {
        let mut session = waiting();
        let verdict = session.evaluate_response(
            &response(DeviceType::FatigueTester, &secret()),
            MacAddress([0x02, 0, 0, 0, 0, 0x99]),
            DeviceType::FatigueTester,
            &secret(),
            2_000,
        );
        assert_eq!(verdict, ResponseVerdict::AddressMismatch);
        assert!(session.is_in_flight(2_000));
    }

    #[test]
    fn test_bad_hmac_fails() {
        let mut session = waiting();
        let other = PairingSecret::new([0x77; 16]).unwrap();
        let verdict = session.evaluate_response(
            &response(DeviceType::FatigueTester, &other),
            RESPONDER,
            DeviceType::FatigueTester,
            &secret(),
            2_000,
        );
        assert_eq!(verdict, ResponseVerdict::HmacMismatch);
        assert_eq!(
            session.state(2_000),
            PairingState::Failed(PairingFailure::HmacMismatch)
        );
    }

    #[test]
    fn test_late_response_times_out() {
        let mut session = waiting();
        let verdict = session.evaluate_response(
            &response(DeviceType::FatigueTester, &secret()),
            RESPONDER,
            DeviceType::FatigueTester,
            &secret(),
            20_000,
        );
        assert_eq!(verdict, ResponseVerdict::NotWaiting);
        assert_eq!(
            session.state(20_000),
            PairingState::Failed(PairingFailure::Timeout)
        );
    }

    #[test]
    fn test_response_when_idle() {
        let mut session = PairingSession::new();
        let mut resp = response(DeviceType::FatigueTester, &secret());
        resp.hmac = [0; HMAC_SIZE];
        assert_eq!(
            session.evaluate_response(&resp, RESPONDER, DeviceType::FatigueTester, &secret(), 0),
            ResponseVerdict::NotWaiting
        );
        assert_eq!(session.state(0), PairingState::Idle);
    }

    #[test]
    fn test_cancel() {
        let mut session = waiting();
        session.cancel();
        assert_eq!(session.state(1_000), PairingState::Idle);
    }
}

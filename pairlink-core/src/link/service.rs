//! The link service
//!
//! Owns the pairing sessions, the peer store, the radio and the RNG behind
//! async mutexes, so the worker and any number of application tasks can
//! share one `&Link`.
//!
//! Lock order: pairing → responder → peers → rng → radio. No path takes a
//! lock to the left of one it already holds.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;
use heapless::Vec;
use pairlink_hal::{Clock, FlashStorage, RadioTx};
use pairlink_protocol::{
    device_name, frame, Challenge, DeviceType, Frame, FrameError, MacAddress, MsgType,
    PairingConfirm, PairingReject, PairingRequest, PairingResponse, ProtocolEvent, RejectReason,
    Unpair, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE, PROTOCOL_VERSION,
};
use portable_atomic::{AtomicU8, Ordering};
use rand_core::{CryptoRng, RngCore};

use super::event::{LinkError, LinkEvent};
use super::rx::{LinkChannels, RawFrame, RxProducer};
use crate::config::{LinkConfig, MAX_APPROVED_PEERS};
use crate::pairing::{
    ConfirmVerdict, PairingError, PairingFailure, PairingSession, PairingState, PendingConfirm,
    RequestVerdict, ResponderSession, ResponseVerdict,
};
use crate::peers::{ApprovedPeer, PeerStore, PeerStoreError};
use crate::security::{compute_hmac, generate_challenge, PairingSecret};

/// Secure datagram link to paired devices
pub struct Link<'a, M: RawMutex, R, S, C, G> {
    config: LinkConfig,
    secret: PairingSecret,
    clock: C,
    channels: &'a LinkChannels<M>,
    pairing: Mutex<M, PairingSession>,
    responder: Mutex<M, ResponderSession>,
    peers: Mutex<M, PeerStore<S>>,
    rng: Mutex<M, G>,
    radio: Mutex<M, R>,
    sequence: AtomicU8,
}

impl<'a, M, R, S, C, G> Link<'a, M, R, S, C, G>
where
    M: RawMutex,
    R: RadioTx,
    S: FlashStorage,
    C: Clock,
    G: RngCore + CryptoRng,
{
    pub fn new(
        config: LinkConfig,
        secret: PairingSecret,
        peers: PeerStore<S>,
        radio: R,
        clock: C,
        rng: G,
        channels: &'a LinkChannels<M>,
    ) -> Self {
        if secret.is_placeholder() {
            warn!("Pairing secret is the development placeholder; provision a real one");
        }
        info!(
            "Link up as {} ({:?}), pairs with {:?}",
            config.address, config.device_type, config.peer_type
        );

        Self {
            config,
            secret,
            clock,
            channels,
            pairing: Mutex::new(PairingSession::new()),
            responder: Mutex::new(ResponderSession::new()),
            peers: Mutex::new(peers),
            rng: Mutex::new(rng),
            radio: Mutex::new(radio),
            sequence: AtomicU8::new(1),
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Receive callback handle for the radio driver
    pub fn producer(&self) -> RxProducer<'a, M> {
        self.channels.producer()
    }

    fn next_sequence(&self) -> u8 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    async fn send_frame(
        &self,
        dest: &MacAddress,
        device_type: u8,
        msg_type: MsgType,
        payload: &[u8],
    ) -> Result<(), LinkError> {
        let frame = Frame::new(device_type, msg_type, self.next_sequence(), payload)?;
        let mut buffer = [0u8; MAX_FRAME_SIZE];
        let len = frame.encode(&mut buffer)?;

        trace!("TX {:?} to {} ({} bytes)", msg_type, dest, len);
        self.radio.lock().await.transmit(dest, &buffer[..len])?;
        Ok(())
    }

    fn post(&self, event: LinkEvent) {
        if self.channels.events.try_send(event).is_err() {
            warn!("Event queue full, dropping event");
        }
    }

    /// Draw a challenge that differs from `previous`
    async fn fresh_challenge(&self, previous: &Challenge) -> Challenge {
        let mut rng = self.rng.lock().await;
        loop {
            let challenge = generate_challenge(&mut *rng);
            if challenge != *previous {
                return challenge;
            }
        }
    }

    // ---------------------------------------------------------------------
    // Initiator
    // ---------------------------------------------------------------------

    /// Broadcast a pairing Request and wait for a responder
    ///
    /// Fails with [`PairingError::Busy`] while an attempt is in flight; its
    /// challenge and deadline are left untouched.
    ///
    /// A session that ended in `Complete` or `Failed` needs no cancel: calling
    /// this again starts a new attempt with a fresh challenge.
    pub async fn start_pairing(&self) -> Result<(), PairingError> {
        let mut session = self.pairing.lock().await;
        let now = self.clock.now_ms();
        if session.is_in_flight(now) {
            warn!("Pairing already in progress");
            return Err(PairingError::Busy);
        }

        let challenge = self.fresh_challenge(session.challenge()).await;
        let request = PairingRequest {
            requester: self.config.address,
            requester_type: self.config.device_type.as_u8(),
            expected_type: self.config.peer_type.as_u8(),
            challenge,
            version: PROTOCOL_VERSION,
        };

        if let Err(e) = self
            .send_frame(
                &MacAddress::BROADCAST,
                self.config.device_type.as_u8(),
                MsgType::PairingRequest,
                &request.encode(),
            )
            .await
        {
            warn!("Failed to broadcast pairing request: {:?}", e);
            return Err(PairingError::Transmit);
        }

        session.begin(challenge, now, self.config.response_timeout_ms);
        info!("Pairing started, looking for {:?}", self.config.peer_type);
        Ok(())
    }

    /// Abandon the current attempt and return to Idle
    pub async fn cancel_pairing(&self) {
        self.pairing.lock().await.cancel();
        info!("Pairing cancelled");
    }

    /// Current initiator state, with the deadline applied
    pub async fn pairing_state(&self) -> PairingState {
        let now = self.clock.now_ms();
        self.pairing.lock().await.state(now)
    }

    // ---------------------------------------------------------------------
    // Responder
    // ---------------------------------------------------------------------

    /// Accept pairing Requests for the configured window
    pub async fn enter_pairing_mode(&self) {
        let now = self.clock.now_ms();
        self.responder
            .lock()
            .await
            .enter(now, self.config.pairing_mode_timeout_ms);
        info!(
            "Pairing mode for {}ms",
            self.config.pairing_mode_timeout_ms
        );
    }

    pub async fn exit_pairing_mode(&self) {
        self.responder.lock().await.exit();
        info!("Pairing mode closed");
    }

    pub async fn is_pairing_mode(&self) -> bool {
        let now = self.clock.now_ms();
        self.responder.lock().await.is_open(now)
    }

    // ---------------------------------------------------------------------
    // Peers
    // ---------------------------------------------------------------------

    pub async fn is_approved(&self, address: &MacAddress) -> bool {
        self.peers.lock().await.is_approved(address)
    }

    /// Approve a peer without a handshake
    pub async fn add_approved_peer(
        &self,
        address: MacAddress,
        device_type: DeviceType,
        name: &str,
    ) -> Result<(), PeerStoreError> {
        let paired_at = self.clock.now_secs();
        self.peers
            .lock()
            .await
            .add(address, device_type, name, paired_at)
            .await
    }

    pub async fn remove_approved_peer(&self, address: &MacAddress) -> Result<bool, PeerStoreError> {
        self.peers.lock().await.remove(address).await
    }

    /// Forget every paired peer; the preconfigured peer stays approved
    pub async fn clear_approved_peers(&self) -> Result<(), PeerStoreError> {
        self.peers.lock().await.clear_all().await
    }

    /// Address to send traffic for `device_type` to
    pub async fn target_device_mac(&self, device_type: DeviceType) -> Option<MacAddress> {
        self.peers.lock().await.first_of_type(device_type)
    }

    /// Snapshot of the approved peers, preconfigured peer first
    pub async fn approved_peers(&self) -> Vec<ApprovedPeer, { MAX_APPROVED_PEERS + 1 }> {
        let peers = self.peers.lock().await;
        let mut out = Vec::new();
        if let Some(p) = peers.preconfigured() {
            if let Some(peer) = peers.get(&p.address) {
                let _ = out.push(peer);
            }
        }
        for peer in peers.iter() {
            let _ = out.push(peer.clone());
        }
        out
    }

    // ---------------------------------------------------------------------
    // Application traffic
    // ---------------------------------------------------------------------

    /// Send an application message to the first approved peer of a type
    pub async fn send_message(
        &self,
        device_type: DeviceType,
        msg_type: MsgType,
        payload: &[u8],
    ) -> Result<(), LinkError> {
        if msg_type.is_pairing() || msg_type == MsgType::Unpair {
            return Err(LinkError::ReservedType);
        }
        let dest = self
            .target_device_mac(device_type)
            .await
            .ok_or(LinkError::NoPeer)?;
        self.send_frame(&dest, device_type.as_u8(), msg_type, payload)
            .await
    }

    /// Broadcast a discovery probe
    pub async fn send_device_discovery(&self) -> Result<(), LinkError> {
        self.send_frame(
            &MacAddress::BROADCAST,
            DeviceType::Unknown.as_u8(),
            MsgType::DeviceDiscovery,
            &[],
        )
        .await
    }

    pub async fn send_config_request(&self, device_type: DeviceType) -> Result<(), LinkError> {
        self.send_message(device_type, MsgType::ConfigRequest, &[])
            .await
    }

    pub async fn send_config_set(
        &self,
        device_type: DeviceType,
        config: &[u8],
    ) -> Result<(), LinkError> {
        self.send_message(device_type, MsgType::ConfigSet, config)
            .await
    }

    /// Send a command; the payload is prefixed with `command_id`
    pub async fn send_command(
        &self,
        device_type: DeviceType,
        command_id: u8,
        payload: &[u8],
    ) -> Result<(), LinkError> {
        if payload.len() >= MAX_PAYLOAD_SIZE {
            return Err(FrameError::PayloadTooLarge.into());
        }
        let mut body = [0u8; MAX_PAYLOAD_SIZE];
        body[0] = command_id;
        body[1..=payload.len()].copy_from_slice(payload);
        let body = &body[..=payload.len()];
        self.send_message(device_type, MsgType::Command, body)
            .await
    }

    /// Forget a peer and tell it so
    ///
    /// The notice is best effort; the local entry is removed either way.
    pub async fn unpair(&self, address: &MacAddress) -> Result<bool, LinkError> {
        let notice = Unpair {
            sender: self.config.address,
        };
        if let Err(e) = self
            .send_frame(
                address,
                self.config.device_type.as_u8(),
                MsgType::Unpair,
                &notice.encode(),
            )
            .await
        {
            warn!("Could not notify {} of unpairing: {:?}", address, e);
        }
        Ok(self.peers.lock().await.remove(address).await?)
    }

    // ---------------------------------------------------------------------
    // Worker
    // ---------------------------------------------------------------------

    /// Worker loop: drain the raw queue forever
    pub async fn run(&self) -> ! {
        info!("Link worker started");
        loop {
            let raw = self.channels.raw.receive().await;
            self.handle_raw(&raw).await;
        }
    }

    /// Handle everything currently queued, for poll-driven hosts
    ///
    /// Returns the number of datagrams processed.
    pub async fn process_pending(&self) -> usize {
        let mut count = 0;
        while let Ok(raw) = self.channels.raw.try_receive() {
            self.handle_raw(&raw).await;
            count += 1;
        }
        count
    }

    /// Validate, gate and dispatch one datagram
    pub async fn handle_raw(&self, raw: &RawFrame) {
        let source = raw.source;
        let (header, payload) = match frame::decode(raw.bytes()) {
            Ok(parts) => parts,
            Err(e) => {
                warn!("Dropping frame from {}: {:?}", source, e);
                return;
            }
        };

        let Some(msg_type) = MsgType::from_u8(header.msg_type) else {
            debug!("Unknown message type {} from {}", header.msg_type, source);
            return;
        };

        if msg_type.is_pairing() {
            self.handle_pairing(msg_type, source, payload).await;
            return;
        }

        // Security gate: everything else needs an approved sender
        if !self.is_approved(&source).await {
            trace!("Dropping {:?} from unapproved {}", msg_type, source);
            return;
        }

        if msg_type == MsgType::Unpair {
            self.handle_unpair(source, payload).await;
            return;
        }

        if let Some(event) = ProtocolEvent::from_parts(&header, payload, source) {
            debug!("{:?} from {} ({} bytes)", msg_type, source, payload.len());
            self.post(LinkEvent::Message(event));
        }
    }

    async fn handle_pairing(&self, msg_type: MsgType, source: MacAddress, payload: &[u8]) {
        match msg_type {
            MsgType::PairingRequest => self.handle_request(source, payload).await,
            MsgType::PairingResponse => self.handle_response(source, payload).await,
            MsgType::PairingConfirm => self.handle_confirm(source, payload).await,
            MsgType::PairingReject => match PairingReject::decode(payload) {
                Ok(reject) => warn!(
                    "Pairing rejected by {}: {:?}",
                    reject.rejecter, reject.reason
                ),
                Err(e) => warn!("Malformed reject from {}: {:?}", source, e),
            },
            _ => {}
        }
    }

    async fn handle_response(&self, source: MacAddress, payload: &[u8]) {
        let response = match PairingResponse::decode(payload) {
            Ok(response) => response,
            Err(e) => {
                warn!("Malformed pairing response from {}: {:?}", source, e);
                return;
            }
        };

        let mut session = self.pairing.lock().await;
        let now = self.clock.now_ms();
        match session.evaluate_response(
            &response,
            source,
            self.config.peer_type,
            &self.secret,
            now,
        ) {
            ResponseVerdict::Accepted => {}
            ResponseVerdict::NotWaiting => {
                debug!("Unsolicited pairing response from {}", source);
                return;
            }
            ResponseVerdict::AddressMismatch => {
                warn!(
                    "Pairing response from {} claims {}",
                    source, response.responder
                );
                return;
            }
            ResponseVerdict::WrongDeviceType => {
                warn!(
                    "Ignoring pairing response from {}: device type {}",
                    source, response.responder_type
                );
                return;
            }
            ResponseVerdict::HmacMismatch => {
                warn!("Pairing response from {} failed HMAC check", source);
                return;
            }
        }

        let confirm = PairingConfirm {
            confirmer: self.config.address,
            hmac: compute_hmac(&self.secret, &response.challenge),
            success: true,
        };
        if let Err(e) = self
            .send_frame(
                &source,
                self.config.device_type.as_u8(),
                MsgType::PairingConfirm,
                &confirm.encode(),
            )
            .await
        {
            warn!("Failed to send pairing confirm: {:?}", e);
            session.fail(PairingFailure::Transmit);
            return;
        }

        let device_type = self.config.peer_type;
        let name = if response.name.is_empty() {
            device_type.default_name()
        } else {
            response.name.as_str()
        };
        let paired_at = self.clock.now_secs();
        let admitted = self
            .peers
            .lock()
            .await
            .add(source, device_type, name, paired_at)
            .await;

        match admitted {
            Ok(()) => {
                session.complete(source);
                info!("Paired with {} '{}'", source, name);
                self.post(LinkEvent::PairingComplete {
                    address: source,
                    device_type,
                    name: device_name(name),
                });
            }
            Err(PeerStoreError::Full) => {
                error!("Peer table full, cannot admit {}", source);
                session.fail(PairingFailure::PeerTableFull);
            }
            Err(e) => {
                error!("Failed to store peer {}: {:?}", source, e);
                session.fail(PairingFailure::Storage);
            }
        }
    }

    async fn send_reject(&self, dest: &MacAddress, reason: RejectReason) {
        let reject = PairingReject {
            rejecter: self.config.address,
            reason,
        };
        if let Err(e) = self
            .send_frame(
                dest,
                self.config.device_type.as_u8(),
                MsgType::PairingReject,
                &reject.encode(),
            )
            .await
        {
            warn!("Failed to send reject to {}: {:?}", dest, e);
        }
    }

    async fn handle_request(&self, source: MacAddress, payload: &[u8]) {
        let request = match PairingRequest::decode(payload) {
            Ok(request) => request,
            Err(e) => {
                warn!("Malformed pairing request from {}: {:?}", source, e);
                return;
            }
        };

        let mut responder = self.responder.lock().await;
        let now = self.clock.now_ms();
        let capacity_blocked = {
            let peers = self.peers.lock().await;
            peers.is_full() && peers.get(&request.requester).is_none()
        };

        match responder.evaluate_request(&request, source, &self.config, capacity_blocked, now) {
            RequestVerdict::Accept => {}
            RequestVerdict::NotForUs => {
                trace!("Pairing request from {} not for us", source);
                return;
            }
            RequestVerdict::Reject(reason) => {
                info!("Rejecting pairing request from {}: {:?}", source, reason);
                self.send_reject(&source, reason).await;
                return;
            }
        }

        let previous = responder.pending().map(|p| p.challenge).unwrap_or_default();
        let challenge = self.fresh_challenge(&previous).await;
        let response = PairingResponse {
            responder: self.config.address,
            responder_type: self.config.device_type.as_u8(),
            challenge,
            hmac: compute_hmac(&self.secret, &request.challenge),
            name: self.config.device_name.clone(),
        };

        match self
            .send_frame(
                &source,
                self.config.device_type.as_u8(),
                MsgType::PairingResponse,
                &response.encode(),
            )
            .await
        {
            Ok(()) => {
                info!("Answered pairing request from {}", source);
                responder.arm(PendingConfirm {
                    requester: source,
                    requester_type: self.config.peer_type,
                    challenge,
                    deadline_ms: now.saturating_add(self.config.response_timeout_ms),
                });
            }
            Err(e) => warn!("Failed to send pairing response: {:?}", e),
        }
    }

    async fn handle_confirm(&self, source: MacAddress, payload: &[u8]) {
        let confirm = match PairingConfirm::decode(payload) {
            Ok(confirm) => confirm,
            Err(e) => {
                warn!("Malformed pairing confirm from {}: {:?}", source, e);
                return;
            }
        };

        let mut responder = self.responder.lock().await;
        let now = self.clock.now_ms();
        let pending = match responder.evaluate_confirm(&confirm, source, &self.secret, now) {
            ConfirmVerdict::Accepted(pending) => pending,
            ConfirmVerdict::Unexpected => {
                debug!("Unexpected pairing confirm from {}", source);
                return;
            }
            ConfirmVerdict::Expired => {
                warn!("Pairing confirm from {} arrived too late", source);
                return;
            }
            ConfirmVerdict::Declined => {
                info!("{} declined pairing", source);
                return;
            }
            ConfirmVerdict::HmacFailed => {
                warn!("Pairing confirm from {} failed HMAC check", source);
                self.send_reject(&source, RejectReason::HmacFailed).await;
                return;
            }
        };

        let device_type = pending.requester_type;
        let name = device_type.default_name();
        let paired_at = self.clock.now_secs();
        let admitted = self
            .peers
            .lock()
            .await
            .add(source, device_type, name, paired_at)
            .await;

        match admitted {
            Ok(()) => {
                responder.exit();
                info!("Paired with {}", source);
                self.post(LinkEvent::PairingComplete {
                    address: source,
                    device_type,
                    name: device_name(name),
                });
            }
            Err(PeerStoreError::Full) => {
                error!("Peer table full, cannot admit {}", source);
                self.send_reject(&source, RejectReason::AlreadyPaired).await;
            }
            Err(e) => error!("Failed to store peer {}: {:?}", source, e),
        }
    }

    async fn handle_unpair(&self, source: MacAddress, payload: &[u8]) {
        match Unpair::decode(payload) {
            Ok(notice) if notice.sender == source => {}
            _ => {
                warn!("Malformed unpair from {}", source);
                return;
            }
        }

        match self.peers.lock().await.remove(&source).await {
            Ok(true) => {
                info!("{} unpaired", source);
                self.post(LinkEvent::PeerRemoved { address: source });
            }
            Ok(false) => debug!("Unpair from {} left no entry to remove", source),
            Err(e) => error!("Failed to remove {}: {:?}", source, e),
        }
    }
}

//! Host-side radio doubles for tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::vec::Vec;

use embassy_sync::blocking_mutex::raw::RawMutex;
use pairlink_hal::{RadioError, RadioTx};
use pairlink_protocol::{Frame, MacAddress, MsgType};

use crate::link::RxProducer;

/// Records every transmitted frame
#[derive(Default)]
pub struct RecordingRadio {
    sent: Mutex<Vec<(MacAddress, Vec<u8>)>>,
    fail: AtomicBool,
}

impl RecordingRadio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(MacAddress, Vec<u8>)> {
        self.sent.lock().unwrap().clone()
    }

    /// Decoded frames of one type, with their destinations
    pub fn sent_of(&self, msg_type: MsgType) -> Vec<(MacAddress, Frame)> {
        self.sent()
            .into_iter()
            .filter_map(|(dest, bytes)| Frame::decode(&bytes).ok().map(|f| (dest, f)))
            .filter(|(_, f)| f.msg_type() == Some(msg_type))
            .collect()
    }
}

impl RadioTx for &RecordingRadio {
    fn transmit(&mut self, dest: &MacAddress, frame: &[u8]) -> Result<(), RadioError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RadioError::Driver);
        }
        self.sent.lock().unwrap().push((*dest, frame.to_vec()));
        Ok(())
    }
}

/// Shared air between stations; frames land in the receivers' raw queues
pub struct Air<'a, M: RawMutex> {
    stations: Mutex<Vec<(MacAddress, RxProducer<'a, M>)>>,
}

impl<'a, M: RawMutex> Air<'a, M> {
    pub fn new() -> Self {
        Self {
            stations: Mutex::new(Vec::new()),
        }
    }

    pub fn join(&self, address: MacAddress, rx: RxProducer<'a, M>) {
        self.stations.lock().unwrap().push((address, rx));
    }

    pub fn radio(&self, address: MacAddress) -> AirRadio<'_, 'a, M> {
        AirRadio { air: self, address }
    }
}

/// One station's transmitter on the shared air
pub struct AirRadio<'r, 'a, M: RawMutex> {
    air: &'r Air<'a, M>,
    address: MacAddress,
}

impl<M: RawMutex> RadioTx for AirRadio<'_, '_, M> {
    fn transmit(&mut self, dest: &MacAddress, frame: &[u8]) -> Result<(), RadioError> {
        for (address, rx) in self.air.stations.lock().unwrap().iter() {
            if *address != self.address && (dest.is_broadcast() || dest == address) {
                rx.on_receive(self.address, frame);
            }
        }
        Ok(())
    }
}

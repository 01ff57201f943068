use super::{detect, Contact};
use crate::math::Rect;
use crate::util::Interval;
use crate::VehicleId;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::{trace, warn};
use std::thread::JoinHandle;
use std::time::Duration;

/// A collision check to be run off the simulation thread.
#[derive(Clone, Debug)]
pub struct CollisionRequest {
    /// The vehicle being checked.
    pub vehicle: VehicleId,
    /// The vehicle's epoch when the request was made.
    pub epoch: u64,
    /// The request's sequence number within the epoch.
    pub seq: u64,
    /// The vehicle's footprint.
    pub footprint: Rect,
    /// The extent of the road.
    pub bounds: Interval<f64>,
    /// Footprints of the other vehicles.
    pub neighbours: Vec<Rect>,
    /// Footprints of the static obstacles.
    pub obstacles: Vec<Rect>,
}

/// The result of a [`CollisionRequest`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CollisionResponse {
    pub vehicle: VehicleId,
    pub epoch: u64,
    pub seq: u64,
    pub contact: Option<Contact>,
}

/// A background thread that answers collision requests.
///
/// Responses arrive in the order the requests were submitted, but the
/// simulation may have moved on by then; use a [`CollisionGate`] to discard
/// results that no longer apply.
pub struct CollisionWorker {
    request_tx: Option<Sender<CollisionRequest>>,
    response_rx: Receiver<CollisionResponse>,
    handle: Option<JoinHandle<()>>,
}

impl CollisionWorker {
    /// Spawns the worker thread.
    pub fn spawn() -> Self {
        let (request_tx, request_rx) = unbounded::<CollisionRequest>();
        let (response_tx, response_rx) = unbounded::<CollisionResponse>();

        let handle = std::thread::spawn(move || {
            for request in request_rx.iter() {
                let contact = detect(
                    &request.footprint,
                    request.bounds,
                    &request.neighbours,
                    &request.obstacles,
                );
                let response = CollisionResponse {
                    vehicle: request.vehicle,
                    epoch: request.epoch,
                    seq: request.seq,
                    contact,
                };
                if response_tx.send(response).is_err() {
                    break;
                }
            }
        });

        Self {
            request_tx: Some(request_tx),
            response_rx,
            handle: Some(handle),
        }
    }

    /// Queues a request. Returns false if the worker has gone away.
    pub fn submit(&self, request: CollisionRequest) -> bool {
        let Some(tx) = &self.request_tx else {
            return false;
        };
        trace!("collision request {:?} #{}", request.vehicle, request.seq);
        if tx.send(request).is_err() {
            warn!("collision worker channel closed; request dropped");
            return false;
        }
        true
    }

    /// Takes every response that is ready without blocking.
    pub fn drain(&self) -> impl Iterator<Item = CollisionResponse> + '_ {
        self.response_rx.try_iter()
    }

    /// Waits up to `timeout` for the next response.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<CollisionResponse> {
        match self.response_rx.recv_timeout(timeout) {
            Ok(response) => Some(response),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                warn!("collision worker disconnected");
                None
            }
        }
    }
}

impl Drop for CollisionWorker {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop
        self.request_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("collision worker panicked");
            }
        }
    }
}

/// Decides whether an offloaded collision result still applies to a vehicle.
///
/// Each request gets a fresh sequence number. Resetting the vehicle starts a
/// new epoch, which invalidates every request still in flight.
#[derive(Clone, Copy, Debug, Default)]
pub struct CollisionGate {
    epoch: u64,
    next_seq: u64,
    applied: Option<u64>,
}

impl CollisionGate {
    /// The current epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Returns the `(epoch, seq)` pair to tag the next request with.
    pub fn next_request(&mut self) -> (u64, u64) {
        let seq = self.next_seq;
        self.next_seq += 1;
        (self.epoch, seq)
    }

    /// Invalidates every outstanding request.
    pub fn invalidate(&mut self) {
        self.epoch += 1;
        self.applied = None;
    }

    /// Returns true if the response is current and newer than anything
    /// applied so far, and records it as applied.
    pub fn accept(&mut self, response: &CollisionResponse) -> bool {
        if response.epoch != self.epoch {
            return false;
        }
        if self.applied.map_or(false, |seq| response.seq <= seq) {
            return false;
        }
        self.applied = Some(response.seq);
        true
    }
}

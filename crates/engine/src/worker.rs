//! The worker thread and its fixed-frequency scheduler.
//!
//! One cooperative loop wakes on whichever comes first: the next tick
//! deadline or an incoming message. Messages are handled to completion
//! between ticks; a tick that overruns its deadline reschedules the next
//! one immediately, with no deficit carried beyond that.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use stride_locomotion::LocomotionConfig;
use stride_protocol::{EnginePacket, HostPacket};

use crate::state::EngineState;

/// Host-side handle to a running locomotion worker.
///
/// Dropping the handle closes the command channel; the worker loop exits on
/// disconnect and is joined. The engine is a plain value: spawn as many as
/// needed, nothing is process-global.
#[derive(Debug)]
pub struct Engine {
    sender: Option<Sender<HostPacket>>,
    receiver: Receiver<EnginePacket>,
    worker: Option<JoinHandle<()>>,
}

impl Engine {
    /// Start a worker thread with the given configuration.
    pub fn spawn(config: LocomotionConfig) -> std::io::Result<Self> {
        let (host_sender, worker_receiver) = mpsc::channel();
        let (worker_sender, host_receiver) = mpsc::channel();

        let worker = thread::Builder::new()
            .name("stride-locomotion".into())
            .spawn(move || run_worker(EngineState::new(config), worker_receiver, worker_sender))?;

        Ok(Self {
            sender: Some(host_sender),
            receiver: host_receiver,
            worker: Some(worker),
        })
    }

    /// Send one packet to the worker. Returns false once the worker is gone.
    pub fn send(&self, packet: HostPacket) -> bool {
        match &self.sender {
            Some(sender) => sender.send(packet).is_ok(),
            None => false,
        }
    }

    /// Pull the next engine update without blocking.
    pub fn try_recv(&self) -> Option<EnginePacket> {
        self.receiver.try_recv().ok()
    }

    /// Wait up to `timeout` for the next engine update.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<EnginePacket> {
        self.receiver.recv_timeout(timeout).ok()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        // Disconnect first so the worker's next receive returns, then join.
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_worker(
    mut state: EngineState,
    incoming: Receiver<HostPacket>,
    outgoing: Sender<EnginePacket>,
) {
    let mut next_tick = Instant::now() + state.tick_period();

    loop {
        let now = Instant::now();
        if now < next_tick {
            // Sleep until the deadline, waking early for messages.
            match incoming.recv_timeout(next_tick - now) {
                Ok(packet) => {
                    if let Some(response) = state.handle_packet(&packet) {
                        if outgoing.send(response).is_err() {
                            return;
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return,
            }
            continue;
        }

        // Tick boundary: drain whatever arrived, then integrate once.
        loop {
            match incoming.try_recv() {
                Ok(packet) => {
                    if let Some(response) = state.handle_packet(&packet) {
                        if outgoing.send(response).is_err() {
                            return;
                        }
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return,
            }
        }

        if let Some(update) = state.tick() {
            if outgoing.send(update).is_err() {
                return;
            }
        }

        next_tick += state.tick_period();
        let after = Instant::now();
        if next_tick < after {
            // Overrun: schedule the next tick immediately, no further
            // catch-up.
            next_tick = after;
        }
    }
}

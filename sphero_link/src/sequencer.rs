//! Outbound write sequencing.
//!
//! At most one write is in flight per link. Writes wait in FIFO order and
//! the next one is submitted only when the transport reports the previous
//! write's outcome. Failed writes are logged and never retried.

use sphero_common::consts::ROBOT_LOG_TARGET;
use sphero_common::protocol::consts::APIV2_CHARACTERISTIC;
use sphero_common::protocol::{Request, SequenceCounter};
use sphero_common::transport::CharacteristicWriter;
use std::collections::VecDeque;
use tracing::{trace, warn};

/// One pending characteristic write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub characteristic: &'static str,
    pub bytes: Vec<u8>,
    /// Request carried by the write, if it is a command frame.
    pub request: Option<Request>,
}

/// FIFO of outbound writes with a single in-flight slot.
#[derive(Debug)]
pub struct Sequencer {
    robot: usize,
    queue: VecDeque<Outbound>,
    in_flight: Option<Outbound>,
    sequence: SequenceCounter,
}

impl Sequencer {
    pub fn new(robot: usize) -> Self {
        Self {
            robot,
            queue: VecDeque::new(),
            in_flight: None,
            sequence: SequenceCounter::new(),
        }
    }

    /// Encode `request` with the next sequence number and queue it on the
    /// command characteristic.
    pub fn enqueue(&mut self, request: Request) {
        let frame = request.into_message(self.sequence.next()).encode();
        self.queue.push_back(Outbound {
            characteristic: APIV2_CHARACTERISTIC,
            bytes: frame,
            request: Some(request),
        });
    }

    /// Queue a raw write (e.g. the wake signal).
    pub fn enqueue_raw(&mut self, characteristic: &'static str, bytes: &[u8]) {
        self.queue.push_back(Outbound {
            characteristic,
            bytes: bytes.to_vec(),
            request: None,
        });
    }

    /// Submit the next queued write if nothing is in flight.
    ///
    /// A write rejected synchronously is dropped and the following one is
    /// tried immediately.
    pub fn pump<W: CharacteristicWriter + ?Sized>(&mut self, writer: &mut W) {
        while self.in_flight.is_none() {
            let Some(next) = self.queue.pop_front() else {
                return;
            };
            match writer.write_value(next.characteristic, &next.bytes) {
                Ok(()) => {
                    trace!(target: ROBOT_LOG_TARGET, robot = self.robot, request = ?next.request, "write submitted");
                    self.in_flight = Some(next);
                }
                Err(e) => {
                    warn!(target: ROBOT_LOG_TARGET, robot = self.robot, request = ?next.request, error = %e, "write rejected");
                }
            }
        }
    }

    /// The in-flight write completed (successfully or not).
    pub fn release(&mut self) -> Option<Outbound> {
        self.in_flight.take()
    }

    /// Drop every queued and in-flight write.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.in_flight = None;
    }

    pub fn in_flight(&self) -> Option<&Outbound> {
        self.in_flight.as_ref()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

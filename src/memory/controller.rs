use log::trace;

use crate::memory::device::Memory;

/// What a consumer presents on its request port for the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerRequest<W> {
    pub address: u8,
    /// `Some(data)` for a write, `None` for a read.
    pub write_data: Option<W>,
}

impl<W> ConsumerRequest<W> {
    pub fn read(address: u8) -> Self {
        ConsumerRequest { address, write_data: None }
    }

    pub fn write(address: u8, data: W) -> Self {
        ConsumerRequest { address, write_data: Some(data) }
    }

    pub fn is_write(&self) -> bool {
        self.write_data.is_some()
    }
}

/// A request resident in a channel, from acceptance to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRequest<W> {
    pub consumer_id: usize,
    pub address: u8,
    pub is_write: bool,
    pub write_data: W,
    pub remaining_latency: u32,
}

/// One-tick pulse delivered to the consumer whose request completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response<W> {
    Read(W),
    Write,
}

#[derive(Debug, Clone, Default)]
pub struct Channel<W> {
    pub request: Option<MemoryRequest<W>>,
}

impl<W> Channel<W> {
    pub fn busy(&self) -> bool {
        self.request.is_some()
    }
}

/// Result of evaluating one tick; `next` replaces the controller at commit
/// and `writes` are applied to the device at commit.
#[derive(Debug)]
pub struct ControllerStep<W> {
    pub next: MemoryController<W>,
    pub granted: Vec<bool>,
    pub writes: Vec<(u8, W)>,
}

/// Round-robin arbiter between `num_consumers` request ports and a smaller
/// set of physical channels. Reads and writes keep separate cursors; when
/// both are pending, grants alternate between them.
#[derive(Debug, Clone)]
pub struct MemoryController<W> {
    pub name: String,
    pub num_consumers: usize,
    pub write_enabled: bool,
    channels: Vec<Channel<W>>,
    last_read_grant: usize,
    last_write_grant: usize,
    prefer_write: bool,
    responses: Vec<Option<Response<W>>>,
}

impl<W: Copy + Default> MemoryController<W> {
    pub fn new(name: &str, num_consumers: usize, num_channels: usize, write_enabled: bool) -> Self {
        MemoryController {
            name: name.to_string(),
            num_consumers,
            write_enabled,
            channels: vec![Channel { request: None }; num_channels],
            last_read_grant: num_consumers - 1,
            last_write_grant: num_consumers - 1,
            prefer_write: false,
            responses: vec![None; num_consumers],
        }
    }

    pub fn reset(&mut self) {
        self.channels.iter_mut().for_each(|c| c.request = None);
        self.last_read_grant = self.num_consumers - 1;
        self.last_write_grant = self.num_consumers - 1;
        self.prefer_write = false;
        self.responses.iter_mut().for_each(|r| *r = None);
    }

    pub fn channels(&self) -> &[Channel<W>] {
        &self.channels
    }

    pub fn busy_channels(&self) -> usize {
        self.channels.iter().filter(|c| c.busy()).count()
    }

    /// Response pulse visible to `consumer` during this tick.
    pub fn response(&self, consumer: usize) -> Option<Response<W>> {
        self.responses[consumer]
    }

    fn serving(&self, consumer: usize) -> bool {
        self.channels
            .iter()
            .filter_map(|c| c.request.as_ref())
            .any(|r| r.consumer_id == consumer)
    }

    fn scan(&self, last: usize, pending: impl Fn(usize) -> bool) -> Option<usize> {
        (1..=self.num_consumers)
            .map(|k| (last + k) % self.num_consumers)
            .find(|&i| pending(i))
    }

    /// Finish `req` on channel `idx`: queue the write or sample the read,
    /// raise the consumer's pulse for the next tick and free the channel.
    fn complete(
        &self,
        idx: usize,
        req: MemoryRequest<W>,
        memory: &Memory<W>,
        next: &mut MemoryController<W>,
        writes: &mut Vec<(u8, W)>,
    ) {
        let response = if req.is_write {
            writes.push((req.address, req.write_data));
            Response::Write
        } else {
            Response::Read(memory.read(req.address))
        };
        trace!(
            "{}: channel {} completes {} for consumer {} at {:#04x}",
            self.name,
            idx,
            if req.is_write { "write" } else { "read" },
            req.consumer_id,
            req.address
        );
        next.responses[req.consumer_id] = Some(response);
        next.channels[idx].request = None;
    }

    /// A request accepted on tick `t` with latency `L` completes on tick
    /// `t + L - 1`, so its consumer sees the pulse on tick `t + L` and the
    /// channel accepts again on that same tick.
    pub fn evaluate(
        &self,
        requests: &[Option<ConsumerRequest<W>>],
        memory: &Memory<W>,
    ) -> ControllerStep<W> {
        assert_eq!(
            requests.len(),
            self.num_consumers,
            "{}: request vector does not match consumer count",
            self.name
        );
        let mut next = self.clone();
        next.responses = vec![None; self.num_consumers];
        let mut granted = vec![false; self.num_consumers];
        let mut writes = Vec::new();

        // Channels that held a request at the start of the tick count down;
        // the one reaching zero completes and is free after commit.
        for (idx, channel) in self.channels.iter().enumerate() {
            let Some(req) = channel.request else { continue };
            let remaining = req.remaining_latency.saturating_sub(1);
            if remaining > 0 {
                next.channels[idx].request = Some(MemoryRequest { remaining_latency: remaining, ..req });
            } else {
                self.complete(idx, req, memory, &mut next, &mut writes);
            }
        }

        // Only channels free in the snapshot accept new requests.
        for idx in 0..self.channels.len() {
            if self.channels[idx].busy() {
                continue;
            }
            let pending = |i: usize, want_write: bool| {
                !granted[i]
                    && !self.serving(i)
                    && matches!(requests[i], Some(r) if r.is_write() == want_write)
            };
            let pick_read = || self.scan(next.last_read_grant, |i| pending(i, false)).map(|i| (i, false));
            let pick_write = || {
                if self.write_enabled {
                    self.scan(next.last_write_grant, |i| pending(i, true)).map(|i| (i, true))
                } else {
                    None
                }
            };
            let pick = if next.prefer_write {
                pick_write().or_else(pick_read)
            } else {
                pick_read().or_else(pick_write)
            };
            let Some((consumer, is_write)) = pick else { break };

            let Some(req) = requests[consumer] else { break };
            let latency = if is_write { memory.write_latency } else { memory.read_latency };
            // the acceptance tick is the first tick of latency
            let accepted = MemoryRequest {
                consumer_id: consumer,
                address: req.address,
                is_write,
                write_data: req.write_data.unwrap_or_default(),
                remaining_latency: latency.saturating_sub(1),
            };
            if accepted.remaining_latency > 0 {
                next.channels[idx].request = Some(accepted);
            } else {
                self.complete(idx, accepted, memory, &mut next, &mut writes);
            }
            if is_write {
                next.last_write_grant = consumer;
            } else {
                next.last_read_grant = consumer;
            }
            next.prefer_write = !is_write;
            granted[consumer] = true;
            trace!(
                "{}: channel {} accepts {} from consumer {} at {:#04x}",
                self.name,
                idx,
                if is_write { "write" } else { "read" },
                consumer,
                req.address
            );
        }

        ControllerStep { next, granted, writes }
    }
}

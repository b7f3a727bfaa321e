use log::{debug, info, warn};

use crate::util::ceil_div_usize;

/// Parameters handed to a core when a thread-block starts on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub id: u8,
    pub thread_count: usize,
}

#[derive(Debug)]
pub struct DispatchStep {
    pub next: Dispatcher,
    pub assignments: Vec<Option<Block>>,
}

/// Hands thread-blocks to idle cores and reports whole-kernel completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatcher {
    pub threads_per_block: usize,
    pub thread_count: usize,
    pub total_blocks: usize,
    pub next_block_id: usize,
    pub active: Vec<bool>,
    pub done: bool,
    running: bool,
    prev_start: bool,
}

impl Dispatcher {
    pub fn new(num_cores: usize, threads_per_block: usize) -> Self {
        Dispatcher {
            threads_per_block,
            thread_count: 0,
            total_blocks: 0,
            next_block_id: 0,
            active: vec![false; num_cores],
            done: false,
            running: false,
            prev_start: false,
        }
    }

    pub fn reset(&mut self) {
        *self = Dispatcher::new(self.active.len(), self.threads_per_block);
    }

    pub fn total_blocks(thread_count: usize, threads_per_block: usize) -> usize {
        ceil_div_usize(thread_count, threads_per_block)
    }

    /// Threads in `block_id`; only the final block can be partial.
    pub fn block_thread_count(&self, block_id: usize) -> usize {
        let remainder = self.thread_count % self.threads_per_block;
        if block_id + 1 == self.total_blocks && remainder != 0 {
            remainder
        } else {
            self.threads_per_block
        }
    }

    pub fn num_active(&self) -> usize {
        self.active.iter().filter(|a| **a).count()
    }

    /// `start` is the host's level signal; a rising edge launches a kernel of
    /// `thread_count` threads. An edge seen while a kernel is still in flight
    /// is ignored. `core_done` is each core's done output.
    pub fn evaluate(&self, start: bool, thread_count: u8, core_done: &[bool]) -> DispatchStep {
        let num_cores = self.active.len();
        let mut next = self.clone();
        let mut assignments = vec![None; num_cores];

        next.prev_start = start;
        let edge = start && !self.prev_start;
        if edge && self.running && !self.done {
            warn!(
                "start ignored: kernel still running ({} of {} blocks dispatched, {} active)",
                self.next_block_id,
                self.total_blocks,
                self.num_active()
            );
        } else if edge {
            next.thread_count = thread_count as usize;
            next.total_blocks = Self::total_blocks(next.thread_count, self.threads_per_block);
            next.next_block_id = 0;
            next.active.iter_mut().for_each(|a| *a = false);
            next.done = false;
            next.running = true;
            info!(
                "kernel start: {} threads in {} blocks of {}",
                next.thread_count, next.total_blocks, self.threads_per_block
            );
        }
        if !next.running {
            return DispatchStep { next, assignments };
        }

        for core in 0..num_cores {
            if next.active[core] && core_done[core] {
                next.active[core] = false;
            }
        }
        for core in 0..num_cores {
            if next.active[core] || next.next_block_id >= next.total_blocks {
                continue;
            }
            let block = Block {
                id: next.next_block_id as u8,
                thread_count: next.block_thread_count(next.next_block_id),
            };
            debug!(
                "dispatch block {} ({} threads) to core {}",
                block.id, block.thread_count, core
            );
            assignments[core] = Some(block);
            next.active[core] = true;
            next.next_block_id += 1;
        }

        let finished = next.next_block_id == next.total_blocks && next.num_active() == 0;
        if finished && !self.done {
            info!("kernel done: {} blocks", next.total_blocks);
        }
        next.done = finished;
        DispatchStep { next, assignments }
    }
}

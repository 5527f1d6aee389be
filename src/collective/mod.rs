//! Collective all-reduce boundary for distributed (column-split) training.
//!
//! The core only depends on the contract: an all-reduce over fixed-size
//! byte buffers with bitwise OR/AND semantics. The production transport is
//! an external collaborator; this module ships the trait, the trivial
//! single-worker implementation, and an in-process implementation used to
//! exercise the column-split path across worker threads in tests.

use crate::core::error::{HistError, Result};
use std::sync::{Arc, Barrier, Mutex};

/// Reduction operator for byte-buffer all-reduce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    /// Bitwise OR across workers.
    BitwiseOr,
    /// Bitwise AND across workers.
    BitwiseAnd,
}

/// Collective communication facility.
///
/// `allreduce_bits` leaves every worker's buffer holding the bitwise
/// aggregate of all workers' input buffers.
pub trait Collective: Send + Sync {
    /// This worker's rank in `[0, world_size)`.
    fn rank(&self) -> usize;

    /// Total number of workers.
    fn world_size(&self) -> usize;

    /// All-reduces `buf` in place across all workers.
    fn allreduce_bits(&self, buf: &mut [u8], op: ReduceOp) -> Result<()>;
}

/// Single-worker collective: every all-reduce is the identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleWorker;

impl Collective for SingleWorker {
    fn rank(&self) -> usize {
        0
    }

    fn world_size(&self) -> usize {
        1
    }

    fn allreduce_bits(&self, _buf: &mut [u8], _op: ReduceOp) -> Result<()> {
        Ok(())
    }
}

struct Shared {
    barrier: Barrier,
    slots: Mutex<Vec<Vec<u8>>>,
    result: Mutex<Vec<u8>>,
}

/// In-process collective over `world_size` worker threads.
///
/// Each participating thread holds one handle; `allreduce_bits` blocks
/// until all workers of the group arrive.
pub struct InProcessCollective {
    shared: Arc<Shared>,
    rank: usize,
    world_size: usize,
}

impl InProcessCollective {
    /// Creates one connected handle per worker.
    pub fn create(world_size: usize) -> Vec<InProcessCollective> {
        let shared = Arc::new(Shared {
            barrier: Barrier::new(world_size),
            slots: Mutex::new(vec![Vec::new(); world_size]),
            result: Mutex::new(Vec::new()),
        });
        (0..world_size)
            .map(|rank| InProcessCollective {
                shared: Arc::clone(&shared),
                rank,
                world_size,
            })
            .collect()
    }
}

impl Collective for InProcessCollective {
    fn rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.world_size
    }

    fn allreduce_bits(&self, buf: &mut [u8], op: ReduceOp) -> Result<()> {
        // Publish this worker's contribution.
        {
            let mut slots = self
                .shared
                .slots
                .lock()
                .map_err(|_| HistError::collective("poisoned slot lock"))?;
            slots[self.rank] = buf.to_vec();
        }
        let leader = self.shared.barrier.wait().is_leader();

        // One worker folds all contributions.
        if leader {
            let slots = self
                .shared
                .slots
                .lock()
                .map_err(|_| HistError::collective("poisoned slot lock"))?;
            let mut acc = slots[0].clone();
            for slot in slots.iter().skip(1) {
                if slot.len() != acc.len() {
                    return Err(HistError::collective(format!(
                        "buffer size mismatch across workers: {} vs {}",
                        acc.len(),
                        slot.len()
                    )));
                }
                for (a, b) in acc.iter_mut().zip(slot.iter()) {
                    match op {
                        ReduceOp::BitwiseOr => *a |= *b,
                        ReduceOp::BitwiseAnd => *a &= *b,
                    }
                }
            }
            let mut result = self
                .shared
                .result
                .lock()
                .map_err(|_| HistError::collective("poisoned result lock"))?;
            *result = acc;
        }
        self.shared.barrier.wait();

        // Everyone reads the aggregate.
        {
            let result = self
                .shared
                .result
                .lock()
                .map_err(|_| HistError::collective("poisoned result lock"))?;
            if result.len() != buf.len() {
                return Err(HistError::collective(format!(
                    "aggregate size {} does not match local buffer {}",
                    result.len(),
                    buf.len()
                )));
            }
            buf.copy_from_slice(&result);
        }
        // Keep rounds from overlapping.
        self.shared.barrier.wait();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_single_worker_identity() {
        let c = SingleWorker;
        let mut buf = vec![0b1010u8, 0b0001];
        c.allreduce_bits(&mut buf, ReduceOp::BitwiseOr).unwrap();
        assert_eq!(buf, vec![0b1010, 0b0001]);
    }

    #[test]
    fn test_in_process_or_and() {
        let handles = InProcessCollective::create(3);
        let inputs = [vec![0b0011u8], vec![0b0101u8], vec![0b1001u8]];

        let joins: Vec<_> = handles
            .into_iter()
            .zip(inputs.iter().cloned())
            .map(|(c, input)| {
                thread::spawn(move || {
                    let mut or_buf = input.clone();
                    c.allreduce_bits(&mut or_buf, ReduceOp::BitwiseOr).unwrap();
                    let mut and_buf = input;
                    c.allreduce_bits(&mut and_buf, ReduceOp::BitwiseAnd).unwrap();
                    (or_buf, and_buf)
                })
            })
            .collect();

        for j in joins {
            let (or_buf, and_buf) = j.join().unwrap();
            assert_eq!(or_buf, vec![0b1111]);
            assert_eq!(and_buf, vec![0b0001]);
        }
    }
}

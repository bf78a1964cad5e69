use std::collections::VecDeque;
use std::ops::{Range, RangeInclusive};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Result, SearchError};
use crate::matcher::PreparedLength;
use crate::repeat::IndexSide;

/// A unit of scan work handed to a single worker
#[derive(Debug, Clone)]
pub enum WorkUnit {
    /// Every probe offset of every length in the range; the worker builds its own
    /// index for each length
    Lengths {
        side: IndexSide,
        lengths: RangeInclusive<usize>,
    },
    /// A slice of probe offsets for one length, scanned against a shared index
    Offsets {
        side: IndexSide,
        prepared: Arc<PreparedLength>,
        offsets: Range<usize>,
    },
}

impl WorkUnit {
    #[must_use]
    pub fn side(&self) -> IndexSide {
        match self {
            Self::Lengths { side, .. } | Self::Offsets { side, .. } => *side,
        }
    }
}

/// Splits `range` into at most `parts` contiguous, disjoint, non-empty pieces
#[must_use]
pub fn split_range(range: Range<usize>, parts: usize) -> Vec<Range<usize>> {
    if range.is_empty() {
        return Vec::new();
    }
    let per_part = range.len().div_ceil(parts.max(1));
    range
        .clone()
        .step_by(per_part)
        .map(|start| start..(start + per_part).min(range.end))
        .collect()
}

/// Length-partitioned work: each direction's `[min_length, max_length]` split into
/// one contiguous block per worker
#[must_use]
pub fn length_units(
    sides: &[IndexSide],
    min_length: usize,
    max_length: usize,
    num_workers: usize,
) -> Vec<WorkUnit> {
    let mut units = Vec::new();
    for &side in sides {
        for block in split_range(min_length..max_length + 1, num_workers) {
            units.push(WorkUnit::Lengths {
                side,
                lengths: block.start..=block.end - 1,
            });
        }
    }
    units
}

/// Offset-partitioned work for one prepared length
#[must_use]
pub fn offset_units(
    side: IndexSide,
    prepared: &Arc<PreparedLength>,
    num_workers: usize,
) -> Vec<WorkUnit> {
    split_range(0..prepared.limit(), num_workers)
        .into_iter()
        .map(|offsets| WorkUnit::Offsets {
            side,
            prepared: Arc::clone(prepared),
            offsets,
        })
        .collect()
}

/// Shared queue workers dequeue their next unit from
#[derive(Debug, Default)]
pub struct WorkQueue {
    units: Mutex<VecDeque<WorkUnit>>,
}

impl WorkQueue {
    #[must_use]
    pub fn new(units: Vec<WorkUnit>) -> Self {
        Self {
            units: Mutex::new(units.into()),
        }
    }

    pub fn pop(&self) -> Option<WorkUnit> {
        self.units.lock().pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.units.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Trait for types that can process work units in parallel.
pub trait ParallelProcessor: Send + Clone {
    /// Process a single work unit
    fn process_unit(&mut self, unit: &WorkUnit) -> Result<()>;

    /// Called when a thread finishes processing its batch
    /// Default implementation does nothing
    fn on_batch_complete(&mut self) -> Result<()> {
        Ok(())
    }

    /// Set the thread ID for this processor
    ///
    /// Each thread should call this method with its own unique ID.
    fn set_tid(&mut self, _tid: usize) {
        // Default implementation does nothing
    }

    /// Get the thread ID for this processor
    fn get_tid(&self) -> Option<usize> {
        None
    }
}

/// Resolves a requested thread count: 0 means all cores, anything else is
/// clamped to the number of cores
#[must_use]
pub fn resolve_threads(num_threads: usize) -> usize {
    if num_threads == 0 {
        num_cpus::get()
    } else {
        num_threads.min(num_cpus::get())
    }
}

/// Runs every unit through a clone of `processor` on up to `num_threads` threads
///
/// Workers dequeue units until the queue is empty or `stop` is raised. A worker
/// that fails raises `stop` so the others finish promptly; the first error (by
/// thread id) is returned once every thread has been joined.
pub fn process_parallel<P: ParallelProcessor + 'static>(
    units: Vec<WorkUnit>,
    processor: P,
    num_threads: usize,
    stop: &Arc<AtomicBool>,
) -> Result<()> {
    if units.is_empty() {
        return Ok(());
    }
    let num_threads = num_threads.clamp(1, units.len());
    let queue = Arc::new(WorkQueue::new(units));

    let mut handles = Vec::with_capacity(num_threads);
    for tid in 0..num_threads {
        let mut processor = processor.clone();
        let queue = Arc::clone(&queue);
        let stop = Arc::clone(stop);
        processor.set_tid(tid);

        let handle = std::thread::spawn(move || -> Result<()> {
            while !stop.load(Ordering::Relaxed) {
                let Some(unit) = queue.pop() else {
                    break;
                };
                if let Err(err) = processor
                    .process_unit(&unit)
                    .and_then(|()| processor.on_batch_complete())
                {
                    stop.store(true, Ordering::Relaxed);
                    return Err(err);
                }
            }
            processor.on_batch_complete()
        });
        handles.push(handle);
    }

    let mut first_error = None;
    for (tid, handle) in handles.into_iter().enumerate() {
        let outcome = match handle.join() {
            Ok(outcome) => outcome,
            Err(_) => {
                stop.store(true, Ordering::Relaxed);
                Err(SearchError::WorkerPanicked(tid).into())
            }
        };
        if let Err(err) = outcome {
            log::debug!("worker {tid} failed: {err}");
            first_error.get_or_insert(err);
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

//! Blocking collectives between the processes of a grid.
//!
//! Every process of a communicator must call the same collective, in the same order. A process
//! that panics poisons the exchanges of its grid, and its peers panic with [`CollectiveAborted`]
//! instead of waiting forever.

use crate::ComplexField;
use std::{
    any::Any,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
};

/// Panic payload of a process whose collective was interrupted by a peer's panic.
#[derive(Copy, Clone, Debug)]
pub struct CollectiveAborted;

type Slot = Option<Box<dyn Any + Send>>;

struct ExchangeState {
    arrived: usize,
    generation: u64,
    poisoned: bool,
    slots: Vec<Slot>,
}

/// Rendezvous point shared by the members of one communicator.
pub(crate) struct Exchange {
    size: usize,
    state: Mutex<ExchangeState>,
    cvar: Condvar,
}

impl Exchange {
    pub(crate) fn new(size: usize) -> Arc<Self> {
        Arc::new(Self {
            size,
            state: Mutex::new(ExchangeState {
                arrived: 0,
                generation: 0,
                poisoned: false,
                slots: (0..size).map(|_| None).collect(),
            }),
            cvar: Condvar::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, ExchangeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn poison(&self) {
        let mut state = self.lock();
        state.poisoned = true;
        self.cvar.notify_all();
    }

    // blocks until every member arrived, the lock is held on return
    fn wait<'a>(&'a self, state: MutexGuard<'a, ExchangeState>) -> MutexGuard<'a, ExchangeState> {
        let mut state = state;
        if state.poisoned {
            drop(state);
            std::panic::panic_any(CollectiveAborted);
        }

        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.size {
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            self.cvar.notify_all();
        } else {
            while state.generation == generation && !state.poisoned {
                state = self
                    .cvar
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        }

        if state.poisoned {
            drop(state);
            std::panic::panic_any(CollectiveAborted);
        }
        state
    }
}

/// Communicator over a subset of the processes of a grid.
///
/// Ranks are numbered from `0` to `size - 1`. The numbering depends on the communicator, see
/// [`crate::Grid`].
#[derive(Clone)]
pub struct Comm {
    rank: usize,
    size: usize,
    exchange: Arc<Exchange>,
}

impl core::fmt::Debug for Comm {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Comm")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .finish()
    }
}

impl Comm {
    pub(crate) fn new(rank: usize, size: usize, exchange: Arc<Exchange>) -> Self {
        debug_assert!(rank < size);
        debug_assert!(exchange.size == size);
        Self {
            rank,
            size,
            exchange,
        }
    }

    /// Returns the rank of the calling process inside the communicator.
    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Returns the number of processes of the communicator.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Blocks until every member of the communicator called `barrier`.
    pub fn barrier(&self) {
        let state = self.exchange.lock();
        let _state = self.exchange.wait(state);
    }

    /// Sends `send[q]` to the process of rank `q`, and returns the buffers received from every
    /// process, indexed by the rank of the sender.
    ///
    /// # Panics
    ///
    /// Panics if `send.len()` is not the size of the communicator, or if the members of the
    /// communicator did not all call `all_to_all` with the same element type.
    #[track_caller]
    pub fn all_to_all<T: Send + 'static>(&self, send: Vec<Vec<T>>) -> Vec<Vec<T>> {
        assert!(send.len() == self.size);
        log::trace!(
            target: "gridla::comm",
            "all_to_all: rank {}/{} sends {} elements",
            self.rank,
            self.size,
            send.iter().map(Vec::len).sum::<usize>(),
        );

        let mut state = self.exchange.lock();
        let outgoing: Vec<Option<Vec<T>>> = send.into_iter().map(Some).collect();
        state.slots[self.rank] = Some(Box::new(outgoing));
        let mut state = self.exchange.wait(state);

        let mut recv = Vec::with_capacity(self.size);
        for src in 0..self.size {
            let incoming = state.slots[src]
                .as_mut()
                .and_then(|slot| slot.downcast_mut::<Vec<Option<Vec<T>>>>());
            let Some(incoming) = incoming else {
                drop(state);
                panic!("mismatched collective: process {src} sent a different payload");
            };
            recv.push(incoming[self.rank].take().unwrap_or_default());
        }

        let _state = self.exchange.wait(state);
        recv
    }

    /// Returns the buffers of every process, indexed by rank.
    ///
    /// # Panics
    ///
    /// Panics if the members of the communicator did not all call `all_gather` with the same
    /// element type.
    #[track_caller]
    pub fn all_gather<T: Clone + Send + 'static>(&self, local: Vec<T>) -> Vec<Vec<T>> {
        log::trace!(
            target: "gridla::comm",
            "all_gather: rank {}/{} contributes {} elements",
            self.rank,
            self.size,
            local.len(),
        );

        let mut state = self.exchange.lock();
        state.slots[self.rank] = Some(Box::new(local));
        let state = self.exchange.wait(state);

        let mut recv = Vec::with_capacity(self.size);
        for src in 0..self.size {
            let incoming = state.slots[src]
                .as_ref()
                .and_then(|slot| slot.downcast_ref::<Vec<T>>());
            let Some(incoming) = incoming else {
                drop(state);
                panic!("mismatched collective: process {src} sent a different payload");
            };
            recv.push(incoming.clone());
        }

        let _state = self.exchange.wait(state);
        recv
    }

    /// Replaces `buf` with the elementwise sum of the buffers of every process.
    ///
    /// The contributions are added in rank order, so every process obtains bitwise identical
    /// results.
    ///
    /// # Panics
    ///
    /// Panics if the buffers do not all have the same length.
    #[track_caller]
    pub fn all_reduce_sum<T: ComplexField>(&self, buf: &mut [T]) {
        let all = self.all_gather(buf.to_vec());
        for contribution in &all {
            assert!(contribution.len() == buf.len());
        }
        for (idx, dst) in buf.iter_mut().enumerate() {
            let mut acc = T::zero();
            for contribution in &all {
                acc = acc + contribution[idx];
            }
            *dst = acc;
        }
    }
}

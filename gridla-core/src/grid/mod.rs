//! Two-dimensional process grids.
//!
//! A grid of `height × width` processes is simulated by one thread per process. [`Grid::run`]
//! executes the same closure on every process, each one receiving its own [`Grid`] handle that
//! knows the coordinates of the calling process and owns the communicators used by the
//! redistribution operators.
//!
//! Processes are numbered in two ways:
//! - column-major (`VC` rank): `row + col * height`,
//! - row-major (`VR` rank): `row * width + col`.

use crate::error::{Error, Result};
use std::{any::Any, sync::Arc};

mod comm;

pub use comm::{CollectiveAborted, Comm};
use comm::Exchange;

struct GridShared {
    height: usize,
    width: usize,
}

/// Handle to the process grid, as seen by one of its processes.
///
/// Two handles compare equal if and only if they belong to the same grid.
#[derive(Clone)]
pub struct Grid {
    shared: Arc<GridShared>,
    row: usize,
    col: usize,
    vc: Comm,
    vr: Comm,
    mc: Comm,
    mr: Comm,
}

impl PartialEq for Grid {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for Grid {}

impl core::fmt::Debug for Grid {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Grid")
            .field("height", &self.height())
            .field("width", &self.width())
            .field("row", &self.row)
            .field("col", &self.col)
            .finish()
    }
}

// poisons every exchange of the grid if the owning process unwinds
struct PoisonOnPanic(Vec<Arc<Exchange>>);

impl Drop for PoisonOnPanic {
    fn drop(&mut self) {
        if std::thread::panicking() {
            for exchange in &self.0 {
                exchange.poison();
            }
        }
    }
}

fn is_aborted(payload: &(dyn Any + Send)) -> bool {
    payload.downcast_ref::<CollectiveAborted>().is_some()
}

impl Grid {
    /// Runs `f` on every process of a `height × width` grid, and returns the results indexed by
    /// the `VC` rank of the process that produced them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidGrid`] if one of the dimensions is zero.
    ///
    /// # Panics
    ///
    /// If any process panics, its peers are released from the collectives they are blocked in,
    /// and the panic is propagated to the caller once every process has stopped.
    pub fn run<R, F>(height: usize, width: usize, f: F) -> Result<Vec<R>>
    where
        R: Send,
        F: Fn(&Grid) -> R + Sync,
    {
        if height == 0 || width == 0 {
            return Err(Error::InvalidGrid { height, width });
        }

        let size = height * width;
        log::debug!(target: "gridla::comm", "starting a {height}×{width} process grid");

        let shared = Arc::new(GridShared { height, width });
        let vc = Exchange::new(size);
        let vr = Exchange::new(size);
        // one exchange per grid column, and one per grid row
        let mc: Vec<_> = (0..width).map(|_| Exchange::new(height)).collect();
        let mr: Vec<_> = (0..height).map(|_| Exchange::new(width)).collect();

        let mut all = vec![vc.clone(), vr.clone()];
        all.extend(mc.iter().cloned());
        all.extend(mr.iter().cloned());

        let f = &f;
        let results: Vec<std::thread::Result<R>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..size)
                .map(|rank| {
                    let row = rank % height;
                    let col = rank / height;
                    let grid = Grid {
                        shared: shared.clone(),
                        row,
                        col,
                        vc: Comm::new(rank, size, vc.clone()),
                        vr: Comm::new(row * width + col, size, vr.clone()),
                        mc: Comm::new(row, height, mc[col].clone()),
                        mr: Comm::new(col, width, mr[row].clone()),
                    };
                    let guard = PoisonOnPanic(all.clone());
                    s.spawn(move || {
                        let _guard = guard;
                        f(&grid)
                    })
                })
                .collect();
            handles.into_iter().map(|handle| handle.join()).collect()
        });

        let mut first_panic: Option<Box<dyn Any + Send>> = None;
        let mut outputs = Vec::with_capacity(size);
        for result in results {
            match result {
                Ok(output) => outputs.push(output),
                Err(payload) => {
                    // prefer the panic that caused the others
                    let replace = match &first_panic {
                        None => true,
                        Some(prev) => is_aborted(&**prev) && !is_aborted(&*payload),
                    };
                    if replace {
                        first_panic = Some(payload);
                    }
                }
            }
        }
        if let Some(payload) = first_panic {
            std::panic::resume_unwind(payload);
        }
        Ok(outputs)
    }

    /// Runs `f` on every process of a grid of `size` processes, whose height is the largest
    /// divisor of `size` not exceeding its square root.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidGrid`] if `size` is zero.
    pub fn run_with_size<R, F>(size: usize, f: F) -> Result<Vec<R>>
    where
        R: Send,
        F: Fn(&Grid) -> R + Sync,
    {
        if size == 0 {
            return Err(Error::InvalidGrid {
                height: 0,
                width: 0,
            });
        }
        let height = Self::default_height(size);
        Self::run(height, size / height, f)
    }

    /// Returns the height of the most square grid of `size` processes.
    pub fn default_height(size: usize) -> usize {
        let mut height = 1;
        let mut candidate = 1;
        while candidate * candidate <= size {
            if size % candidate == 0 {
                height = candidate;
            }
            candidate += 1;
        }
        height
    }

    /// Returns the number of process rows.
    #[inline]
    pub fn height(&self) -> usize {
        self.shared.height
    }

    /// Returns the number of process columns.
    #[inline]
    pub fn width(&self) -> usize {
        self.shared.width
    }

    /// Returns the number of processes.
    #[inline]
    pub fn size(&self) -> usize {
        self.shared.height * self.shared.width
    }

    /// Returns the grid row of the calling process.
    #[inline]
    pub fn row(&self) -> usize {
        self.row
    }

    /// Returns the grid column of the calling process.
    #[inline]
    pub fn col(&self) -> usize {
        self.col
    }

    /// Returns the column-major rank of the calling process.
    #[inline]
    pub fn vc_rank(&self) -> usize {
        self.row + self.col * self.height()
    }

    /// Returns the row-major rank of the calling process.
    #[inline]
    pub fn vr_rank(&self) -> usize {
        self.row * self.width() + self.col
    }

    /// Returns the column-major rank of the process at grid coordinates `(row, col)`.
    #[inline]
    pub fn vc_rank_of(&self, row: usize, col: usize) -> usize {
        row + col * self.height()
    }

    /// Communicator over every process, ranked in column-major order.
    #[inline]
    pub fn vc_comm(&self) -> &Comm {
        &self.vc
    }

    /// Communicator over every process, ranked in row-major order.
    #[inline]
    pub fn vr_comm(&self) -> &Comm {
        &self.vr
    }

    /// Communicator over the processes sharing the grid column of the calling process, ranked by
    /// grid row.
    #[inline]
    pub fn mc_comm(&self) -> &Comm {
        &self.mc
    }

    /// Communicator over the processes sharing the grid row of the calling process, ranked by
    /// grid column.
    #[inline]
    pub fn mr_comm(&self) -> &Comm {
        &self.mr
    }

    /// Returns an error if `self` and `other` are not handles to the same grid.
    #[inline]
    pub fn check_same(&self, other: &Grid) -> Result<()> {
        if self == other {
            Ok(())
        } else {
            Err(Error::GridMismatch)
        }
    }

    /// Collective check that every process passed the same `values`.
    ///
    /// All processes return the same result, so a failing check never leaves some processes
    /// waiting inside a later collective.
    pub fn check_consistent<V>(&self, what: &'static str, values: &[V]) -> Result<()>
    where
        V: Clone + PartialEq + Send + 'static,
    {
        let all = self.vc.all_gather(values.to_vec());
        if all.iter().all(|other| *other == all[0]) {
            Ok(())
        } else {
            Err(Error::InconsistentArguments { what })
        }
    }
}

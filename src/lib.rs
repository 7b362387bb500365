//! `gridla` provides blocked dense factorization kernels that run over a 2-D grid of processes.
//!
//! Every process of an `r × c` [`Grid`] runs the same code on its own thread, and owns the
//! elements of each [`DistMatrix`] that its distribution [`Format`] assigns to it. The
//! factorizations process one panel at a time: the panel is gathered, factored redundantly, then
//! redistributed to update the trailing part of the matrix.
//!
//! Two factorizations are provided:
//! - the regularized $LDL^H$ decomposition of a Hermitian matrix, in [`ldl`],
//! - the application of packed Householder reflectors in compact-WY form, in [`householder`].
//!
//! Both come in an unblocked version, a blocked version on local buffers, and a blocked
//! distributed version.
//!
//! # Example
//!
//! ```
//! use gridla::{ldl::*, DistMatrix, FactorParams, Format, Grid};
//!
//! let n = 6;
//! let counts = Grid::run(2, 2, |grid| {
//!     let mut a =
//!         DistMatrix::from_fn(grid, Format::MC_MR, n, n, |i, j| (i + j) as f64).unwrap();
//!     let signs = DistMatrix::from_fn(grid, Format::MC_STAR, n, 1, |_, _| 1i8).unwrap();
//!     let mut reg = DistMatrix::<f64>::zeros(grid, Format::MC_STAR, n, 1).unwrap();
//!
//!     let info = ldl_regularized_dist_in_place(
//!         a.as_mut(),
//!         signs.as_ref(),
//!         reg.as_mut(),
//!         LdlRegularization {
//!             pivot_tolerance: 1e-12,
//!             regularization_magnitude: 1e-8,
//!         },
//!         FactorParams::default().with_block_size(2),
//!     )
//!     .unwrap();
//!     info.regularization_count
//! })
//! .unwrap();
//!
//! // every process returns the same count
//! assert!(counts.iter().all(|&count| count == counts[0]));
//! assert!(counts[0] > 0);
//! ```

#![warn(rust_2018_idioms)]

pub use gridla_core::{
    c32, c64, dist, grid, mat, mul, norm, solve, ComplexField, Conj, Dist, DistMatMut, DistMatRef,
    DistMatrix, Entity, Error, FactorParams, Format, Grid, Mat, MatMut, MatRef, PanelState,
    Parallelism, RealField, Result, Side,
};

/// Regularized $LDL^H$ factorization.
pub mod ldl {
    pub use gridla_cholesky::ldl_regularized::{compute::*, reconstruct::*};
}

/// Packed Householder reflectors.
pub mod householder {
    pub use gridla_householder::packed::{compute::*, reference::*};
}

//! Regularized $LDL^H$ factorization of Hermitian matrices, on local buffers and over a process
//! grid.

#![warn(rust_2018_idioms)]
#![allow(clippy::too_many_arguments)]

pub mod ldl_regularized;

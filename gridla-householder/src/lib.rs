//! Application of packed Householder reflectors in compact-WY form, on local buffers and over a
//! process grid.

#![warn(rust_2018_idioms)]
#![allow(clippy::too_many_arguments)]

pub mod packed;

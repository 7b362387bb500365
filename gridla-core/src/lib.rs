//! `gridla` core module.
//!
//! This module contains:
//! - the scalar traits ([`ComplexField`], [`RealField`], [`Entity`]),
//! - definitions of matrix structures ([`Mat`], [`MatRef`], [`MatMut`]),
//! - local matrix multiplication and triangular solve routines,
//! - the process grid ([`Grid`]) and its communicators,
//! - distributed matrices ([`DistMatrix`]), their views and redistribution operators.

#![warn(rust_2018_idioms)]
#![allow(clippy::too_many_arguments)]

use assert2::{assert as fancy_assert, debug_assert as fancy_debug_assert};
use core::{
    fmt::Debug,
    marker::PhantomData,
    ops::{Add, Div, Index, IndexMut, Mul, Neg, Sub},
    ptr::NonNull,
};
use reborrow::*;

/// Complex floating point number type, where the real and imaginary parts each occupy 32 bits.
pub use num_complex::Complex32 as c32;
/// Complex floating point number type, where the real and imaginary parts each occupy 64 bits.
pub use num_complex::Complex64 as c64;

pub mod dist;
pub mod error;
pub mod grid;
pub mod mul;
pub mod norm;
pub mod panel;
pub mod params;
pub mod solve;

pub use dist::{Dist, DistMatMut, DistMatRef, DistMatrix, Format};
pub use error::{Error, Result};
pub use grid::{Comm, Grid};
pub use panel::PanelState;
pub use params::FactorParams;

/// Indicates whether the corresponding operand should be conjugated or not.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Conj {
    /// Do not conjugate
    No,
    /// Do conjugate
    Yes,
}

impl Conj {
    /// Combine `self` and `other` to create a new conjugation object.
    #[inline]
    pub fn compose(self, other: Conj) -> Conj {
        if self == other {
            Conj::No
        } else {
            Conj::Yes
        }
    }

    /// Conjugates `value` if `self` is [`Conj::Yes`].
    #[inline(always)]
    pub fn apply<T: ComplexField>(self, value: T) -> T {
        match self {
            Conj::No => value,
            Conj::Yes => value.conj(),
        }
    }
}

/// Specifies whether the lower or upper triangular part of a matrix should be accessed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Side {
    /// Lower half should be accessed.
    Lower,
    /// Upper half should be accessed.
    Upper,
}

/// Parallelism strategy that can be passed to most of the routines in the library.
///
/// This only governs the threads used by local kernels of a single process. The processes of a
/// [`Grid`] always run concurrently.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Parallelism {
    /// No parallelism.
    ///
    /// The code is executed sequentially on the same thread that calls a function
    /// and passes this argument.
    None,
    /// Rayon parallelism.
    ///
    /// The code is possibly executed in parallel on the current thread, as well as the currently
    /// active rayon thread pool.
    ///
    /// The contained value represents a hint about the number of threads an implementation should
    /// use, but there is no way to guarantee how many or which threads will be used.
    ///
    /// A value of `0` treated as equivalent to `rayon::current_num_threads()`.
    Rayon(usize),
}

/// Values that can be stored in a matrix and sent between grid processes.
pub trait Entity: Copy + Default + Send + Sync + Debug + 'static {}
impl<T: Copy + Default + Send + Sync + Debug + 'static> Entity for T {}

/// Trait that describes a complex number field.
///
/// Real numbers can also be seen as complex numbers, where the imaginary part is always zero.
pub trait ComplexField:
    Entity
    + PartialEq
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    type Real: RealField;

    /// Returns a complex number whose real part is equal to `real`, and a zero imaginary part.
    fn from_real(real: Self::Real) -> Self;
    /// Returns the real and imaginary part.
    fn into_real_imag(self) -> (Self::Real, Self::Real);
    /// Returns the real part.
    #[inline(always)]
    fn real(self) -> Self::Real {
        self.into_real_imag().0
    }
    /// Returns the imaginary part.
    #[inline(always)]
    fn imag(self) -> Self::Real {
        self.into_real_imag().1
    }

    /// Returns the value representing `0.0`.
    fn zero() -> Self;
    /// Returns the value representing `1.0`.
    fn one() -> Self;

    /// Returns the inverse of the number.
    fn inv(self) -> Self;
    /// Returns the conjugate of the number.
    fn conj(self) -> Self;
    /// Returns the square root of the number.
    fn sqrt(self) -> Self;
    /// Returns the input, scaled by `factor`.
    #[inline(always)]
    fn scale(self, factor: Self::Real) -> Self {
        self * Self::from_real(factor)
    }

    /// Returns the absolute value of the number.
    #[inline(always)]
    fn abs(self) -> Self::Real {
        (self * self.conj()).real().sqrt()
    }
}

/// Trait that describes a real number field.
pub trait RealField: ComplexField<Real = Self> + PartialOrd {}

macro_rules! impl_real_field {
    ($real: ty) => {
        impl RealField for $real {}
        impl ComplexField for $real {
            type Real = $real;

            #[inline(always)]
            fn from_real(real: Self::Real) -> Self {
                real
            }

            #[inline(always)]
            fn into_real_imag(self) -> (Self::Real, Self::Real) {
                (self, 0.0)
            }

            #[inline(always)]
            fn zero() -> Self {
                0.0
            }

            #[inline(always)]
            fn one() -> Self {
                1.0
            }

            #[inline(always)]
            fn inv(self) -> Self {
                1.0 / self
            }

            #[inline(always)]
            fn conj(self) -> Self {
                self
            }

            #[inline(always)]
            fn sqrt(self) -> Self {
                <$real>::sqrt(self)
            }

            #[inline(always)]
            fn abs(self) -> Self::Real {
                <$real>::abs(self)
            }
        }
    };
}

macro_rules! impl_complex_field {
    ($cplx: ty, $real: ty) => {
        impl ComplexField for $cplx {
            type Real = $real;

            #[inline(always)]
            fn from_real(real: Self::Real) -> Self {
                <$cplx>::new(real, 0.0)
            }

            #[inline(always)]
            fn into_real_imag(self) -> (Self::Real, Self::Real) {
                (self.re, self.im)
            }

            #[inline(always)]
            fn zero() -> Self {
                <$cplx>::new(0.0, 0.0)
            }

            #[inline(always)]
            fn one() -> Self {
                <$cplx>::new(1.0, 0.0)
            }

            #[inline(always)]
            fn inv(self) -> Self {
                <$cplx>::new(1.0, 0.0) / self
            }

            #[inline(always)]
            fn conj(self) -> Self {
                <$cplx>::new(self.re, -self.im)
            }

            #[inline(always)]
            fn sqrt(self) -> Self {
                <$cplx>::sqrt(self)
            }

            #[inline(always)]
            fn abs(self) -> Self::Real {
                self.re.hypot(self.im)
            }
        }
    };
}

impl_real_field!(f32);
impl_real_field!(f64);
impl_complex_field!(c32, f32);
impl_complex_field!(c64, f64);

#[inline]
#[doc(hidden)]
pub fn join_raw(
    op_a: impl Send + FnOnce(Parallelism),
    op_b: impl Send + FnOnce(Parallelism),
    parallelism: Parallelism,
) {
    match parallelism {
        Parallelism::None => (op_a(parallelism), op_b(parallelism)),
        Parallelism::Rayon(n_threads) => {
            if n_threads == 1 {
                (op_a(Parallelism::None), op_b(Parallelism::None))
            } else {
                let n_threads = if n_threads > 0 {
                    n_threads
                } else {
                    rayon::current_num_threads()
                };
                let parallelism = Parallelism::Rayon(n_threads - n_threads / 2);
                rayon::join(|| op_a(parallelism), || op_b(parallelism))
            }
        }
    };
}

#[inline]
#[doc(hidden)]
pub fn parallelism_degree(parallelism: Parallelism) -> usize {
    match parallelism {
        Parallelism::None => 1,
        Parallelism::Rayon(0) => rayon::current_num_threads(),
        Parallelism::Rayon(n_threads) => n_threads,
    }
}

struct MatrixSliceBase<T> {
    ptr: NonNull<T>,
    nrows: usize,
    ncols: usize,
    row_stride: isize,
    col_stride: isize,
}

impl<T> Copy for MatrixSliceBase<T> {}
impl<T> Clone for MatrixSliceBase<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

/// Matrix view with general row and column strides.
///
/// A view does not own its elements and cannot outlive the matrix it was created from.
pub struct MatRef<'a, T> {
    base: MatrixSliceBase<T>,
    _marker: PhantomData<&'a T>,
}

/// Mutable matrix view with general row and column strides.
///
/// For usage examples, see [`MatRef`].
pub struct MatMut<'a, T> {
    base: MatrixSliceBase<T>,
    _marker: PhantomData<&'a mut T>,
}

unsafe impl<'a, T: Sync> Sync for MatRef<'a, T> {}
unsafe impl<'a, T: Sync> Send for MatRef<'a, T> {}
unsafe impl<'a, T: Sync> Sync for MatMut<'a, T> {}
unsafe impl<'a, T: Send> Send for MatMut<'a, T> {}

impl<'a, T> Copy for MatRef<'a, T> {}
impl<'a, T> Clone for MatRef<'a, T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<'b, 'a, T> Reborrow<'b> for MatRef<'a, T> {
    type Target = MatRef<'b, T>;
    #[inline]
    fn rb(&'b self) -> Self::Target {
        *self
    }
}
impl<'b, 'a, T> ReborrowMut<'b> for MatRef<'a, T> {
    type Target = MatRef<'b, T>;
    #[inline]
    fn rb_mut(&'b mut self) -> Self::Target {
        *self
    }
}

impl<'b, 'a, T> Reborrow<'b> for MatMut<'a, T> {
    type Target = MatRef<'b, T>;
    #[inline]
    fn rb(&'b self) -> Self::Target {
        MatRef {
            base: self.base,
            _marker: PhantomData,
        }
    }
}
impl<'b, 'a, T> ReborrowMut<'b> for MatMut<'a, T> {
    type Target = MatMut<'b, T>;
    #[inline]
    fn rb_mut(&'b mut self) -> Self::Target {
        MatMut {
            base: self.base,
            _marker: PhantomData,
        }
    }
}

impl<'a, T> IntoConst for MatRef<'a, T> {
    type Target = MatRef<'a, T>;
    #[inline]
    fn into_const(self) -> Self::Target {
        self
    }
}
impl<'a, T> IntoConst for MatMut<'a, T> {
    type Target = MatRef<'a, T>;
    #[inline]
    fn into_const(self) -> Self::Target {
        MatRef {
            base: self.base,
            _marker: PhantomData,
        }
    }
}

impl<'a, T> MatRef<'a, T> {
    /// Returns a matrix slice from the given arguments.
    /// `ptr`: pointer to the first element of the matrix.
    /// `nrows`: number of rows of the matrix.
    /// `ncols`: number of columns of the matrix.
    /// `row_stride`: offset between the first elements of two successive rows in the matrix.
    /// `col_stride`: offset between the first elements of two successive columns in the matrix.
    ///
    /// # Safety
    ///
    /// `ptr` must be non null and properly aligned for type `T`.
    /// For each `i < nrows` and `j < ncols`,
    /// `ptr.offset(i as isize * row_stride + j as isize * col_stride)` must point to a valid
    /// initialized object of type `T`, unless memory pointing to that address is never accessed.
    /// The referenced memory must not be mutated during the lifetime `'a`.
    #[inline]
    pub unsafe fn from_raw_parts(
        ptr: *const T,
        nrows: usize,
        ncols: usize,
        row_stride: isize,
        col_stride: isize,
    ) -> Self {
        Self {
            base: MatrixSliceBase::<T> {
                ptr: NonNull::new_unchecked(ptr as *mut T),
                nrows,
                ncols,
                row_stride,
                col_stride,
            },
            _marker: PhantomData,
        }
    }

    /// Returns a pointer to the first (top left) element of the matrix.
    #[inline]
    pub fn as_ptr(self) -> *const T {
        self.base.ptr.as_ptr()
    }

    /// Returns the number of rows of the matrix.
    #[inline]
    pub fn nrows(&self) -> usize {
        self.base.nrows
    }

    /// Returns the number of columns of the matrix.
    #[inline]
    pub fn ncols(&self) -> usize {
        self.base.ncols
    }

    /// Returns the offset between the first elements of two successive rows in the matrix.
    #[inline]
    pub fn row_stride(&self) -> isize {
        self.base.row_stride
    }

    /// Returns the offset between the first elements of two successive columns in the matrix.
    #[inline]
    pub fn col_stride(&self) -> isize {
        self.base.col_stride
    }

    /// Returns a pointer to the element at position (i, j) in the matrix.
    #[inline]
    pub fn ptr_at(self, i: usize, j: usize) -> *const T {
        self.base
            .ptr
            .as_ptr()
            .wrapping_offset(i as isize * self.row_stride())
            .wrapping_offset(j as isize * self.col_stride())
    }

    /// Returns a reference to the element at position (i, j), with no bound checks.
    ///
    /// # Safety
    ///
    /// Requires that `i < self.nrows()` and `j < self.ncols()`.
    #[track_caller]
    #[inline(always)]
    pub unsafe fn get_unchecked(self, i: usize, j: usize) -> &'a T {
        fancy_debug_assert!(i < self.nrows());
        fancy_debug_assert!(j < self.ncols());
        &*self.ptr_at(i, j)
    }

    /// Returns a reference to the element at position (i, j).
    ///
    /// # Panics
    ///
    /// Panics if `i >= self.nrows()` or `j >= self.ncols()`.
    #[track_caller]
    #[inline(always)]
    pub fn get(self, i: usize, j: usize) -> &'a T {
        fancy_assert!(i < self.nrows());
        fancy_assert!(j < self.ncols());
        // SAFETY: bounds have been checked
        unsafe { self.get_unchecked(i, j) }
    }

    /// Reads the value of the element at position (i, j).
    ///
    /// # Panics
    ///
    /// Panics if `i >= self.nrows()` or `j >= self.ncols()`.
    #[track_caller]
    #[inline(always)]
    pub fn read(&self, i: usize, j: usize) -> T
    where
        T: Copy,
    {
        *self.get(i, j)
    }

    /// Splits the matrix into four corner parts in the following order: top left, top right,
    /// bottom left, bottom right.
    ///
    /// # Panics
    ///
    /// Requires that
    /// - `i <= self.nrows()`,
    /// - `j <= self.ncols()`.
    ///
    /// Otherwise, it panics.
    #[track_caller]
    #[inline]
    pub fn split_at(self, i: usize, j: usize) -> (Self, Self, Self, Self) {
        fancy_assert!(i <= self.nrows());
        fancy_assert!(j <= self.ncols());
        let ptr = self.base.ptr.as_ptr() as *const T;
        let cs = self.col_stride();
        let rs = self.row_stride();
        let m = self.nrows();
        let n = self.ncols();
        // SAFETY: bounds have been checked, and the four parts are disjoint
        unsafe {
            (
                Self::from_raw_parts(ptr, i, j, rs, cs),
                Self::from_raw_parts(ptr.wrapping_offset(j as isize * cs), i, n - j, rs, cs),
                Self::from_raw_parts(ptr.wrapping_offset(i as isize * rs), m - i, j, rs, cs),
                Self::from_raw_parts(
                    ptr.wrapping_offset(i as isize * rs)
                        .wrapping_offset(j as isize * cs),
                    m - i,
                    n - j,
                    rs,
                    cs,
                ),
            )
        }
    }

    /// Splits the matrix horizontally into two parts in the following order: top, bottom.
    #[track_caller]
    #[inline]
    pub fn split_at_row(self, i: usize) -> (Self, Self) {
        let (_, top, _, bottom) = self.split_at(i, 0);
        (top, bottom)
    }

    /// Splits the matrix vertically into two parts in the following order: left, right.
    #[track_caller]
    #[inline]
    pub fn split_at_col(self, j: usize) -> (Self, Self) {
        let (_, _, left, right) = self.split_at(0, j);
        (left, right)
    }

    /// Returns a view over the submatrix starting at position `(i, j)`, with dimensions
    /// `(nrows, ncols)`.
    ///
    /// # Panics
    ///
    /// Panics if the submatrix does not fit inside `self`.
    #[track_caller]
    #[inline]
    pub fn submatrix(self, i: usize, j: usize, nrows: usize, ncols: usize) -> Self {
        fancy_assert!(i <= self.nrows());
        fancy_assert!(j <= self.ncols());
        fancy_assert!(nrows <= self.nrows() - i);
        fancy_assert!(ncols <= self.ncols() - j);
        // SAFETY: bounds have been checked
        unsafe {
            Self::from_raw_parts(
                self.ptr_at(i, j),
                nrows,
                ncols,
                self.row_stride(),
                self.col_stride(),
            )
        }
    }

    /// Returns the `j`-th column as an `nrows × 1` view.
    #[track_caller]
    #[inline]
    pub fn col(self, j: usize) -> Self {
        self.submatrix(0, j, self.nrows(), 1)
    }

    /// Returns the `i`-th row as a `1 × ncols` view.
    #[track_caller]
    #[inline]
    pub fn row(self, i: usize) -> Self {
        self.submatrix(i, 0, 1, self.ncols())
    }

    /// Returns the main diagonal as a `min(nrows, ncols) × 1` view.
    #[inline]
    pub fn diagonal(self) -> Self {
        let size = self.nrows().min(self.ncols());
        // SAFETY: each element of the diagonal is in bounds
        unsafe {
            Self::from_raw_parts(
                self.as_ptr(),
                size,
                1,
                self.row_stride() + self.col_stride(),
                0,
            )
        }
    }

    /// Returns the transpose of `self`.
    #[inline]
    pub fn transpose(self) -> Self {
        // SAFETY: the strides are swapped together with the dimensions
        unsafe {
            Self::from_raw_parts(
                self.as_ptr(),
                self.ncols(),
                self.nrows(),
                self.col_stride(),
                self.row_stride(),
            )
        }
    }

    /// Returns an owned copy of the viewed elements.
    #[inline]
    pub fn to_owned(self) -> Mat<T>
    where
        T: Entity,
    {
        Mat::from_fn(self.nrows(), self.ncols(), |i, j| self.read(i, j))
    }
}

impl<'a, T> MatMut<'a, T> {
    /// Returns a mutable matrix slice from the given arguments.
    ///
    /// # Safety
    ///
    /// Same as [`MatRef::from_raw_parts`], with the additional requirement that no two in bounds
    /// positions alias, and that the memory is not accessed through any other pointer during the
    /// lifetime `'a`.
    #[inline]
    pub unsafe fn from_raw_parts(
        ptr: *mut T,
        nrows: usize,
        ncols: usize,
        row_stride: isize,
        col_stride: isize,
    ) -> Self {
        Self {
            base: MatrixSliceBase::<T> {
                ptr: NonNull::new_unchecked(ptr),
                nrows,
                ncols,
                row_stride,
                col_stride,
            },
            _marker: PhantomData,
        }
    }

    /// Returns a mutable pointer to the first (top left) element of the matrix.
    #[inline]
    pub fn as_ptr(self) -> *mut T {
        self.base.ptr.as_ptr()
    }

    /// Returns the number of rows of the matrix.
    #[inline]
    pub fn nrows(&self) -> usize {
        self.base.nrows
    }

    /// Returns the number of columns of the matrix.
    #[inline]
    pub fn ncols(&self) -> usize {
        self.base.ncols
    }

    /// Returns the offset between the first elements of two successive rows in the matrix.
    #[inline]
    pub fn row_stride(&self) -> isize {
        self.base.row_stride
    }

    /// Returns the offset between the first elements of two successive columns in the matrix.
    #[inline]
    pub fn col_stride(&self) -> isize {
        self.base.col_stride
    }

    /// Returns a mutable pointer to the element at position (i, j) in the matrix.
    #[inline]
    pub fn ptr_at(self, i: usize, j: usize) -> *mut T {
        self.base
            .ptr
            .as_ptr()
            .wrapping_offset(i as isize * self.row_stride())
            .wrapping_offset(j as isize * self.col_stride())
    }

    /// Returns a mutable reference to the element at position (i, j), with no bound checks.
    ///
    /// # Safety
    ///
    /// Requires that `i < self.nrows()` and `j < self.ncols()`.
    #[track_caller]
    #[inline(always)]
    pub unsafe fn get_unchecked(self, i: usize, j: usize) -> &'a mut T {
        fancy_debug_assert!(i < self.nrows());
        fancy_debug_assert!(j < self.ncols());
        &mut *self.ptr_at(i, j)
    }

    /// Returns a mutable reference to the element at position (i, j).
    ///
    /// # Panics
    ///
    /// Panics if `i >= self.nrows()` or `j >= self.ncols()`.
    #[track_caller]
    #[inline(always)]
    pub fn get(self, i: usize, j: usize) -> &'a mut T {
        fancy_assert!(i < self.nrows());
        fancy_assert!(j < self.ncols());
        // SAFETY: bounds have been checked
        unsafe { self.get_unchecked(i, j) }
    }

    /// Reads the value of the element at position (i, j).
    #[track_caller]
    #[inline(always)]
    pub fn read(&self, i: usize, j: usize) -> T
    where
        T: Copy,
    {
        self.rb().read(i, j)
    }

    /// Writes `value` to the element at position (i, j).
    #[track_caller]
    #[inline(always)]
    pub fn write(&mut self, i: usize, j: usize, value: T) {
        *self.rb_mut().get(i, j) = value;
    }

    /// Splits the matrix into four corner parts in the following order: top left, top right,
    /// bottom left, bottom right.
    ///
    /// # Panics
    ///
    /// Requires that
    /// - `i <= self.nrows()`,
    /// - `j <= self.ncols()`.
    ///
    /// Otherwise, it panics.
    #[track_caller]
    #[inline]
    pub fn split_at(self, i: usize, j: usize) -> (Self, Self, Self, Self) {
        let (tl, tr, bl, br) = self.into_const().split_at(i, j);
        // SAFETY: the four parts are disjoint, and we had unique access to all of them
        unsafe {
            (
                tl.const_cast(),
                tr.const_cast(),
                bl.const_cast(),
                br.const_cast(),
            )
        }
    }

    /// Splits the matrix horizontally into two parts in the following order: top, bottom.
    #[track_caller]
    #[inline]
    pub fn split_at_row(self, i: usize) -> (Self, Self) {
        let (_, top, _, bottom) = self.split_at(i, 0);
        (top, bottom)
    }

    /// Splits the matrix vertically into two parts in the following order: left, right.
    #[track_caller]
    #[inline]
    pub fn split_at_col(self, j: usize) -> (Self, Self) {
        let (_, _, left, right) = self.split_at(0, j);
        (left, right)
    }

    /// Returns a mutable view over the submatrix starting at position `(i, j)`, with dimensions
    /// `(nrows, ncols)`.
    #[track_caller]
    #[inline]
    pub fn submatrix(self, i: usize, j: usize, nrows: usize, ncols: usize) -> Self {
        // SAFETY: we had unique access to the whole matrix
        unsafe { self.into_const().submatrix(i, j, nrows, ncols).const_cast() }
    }

    /// Returns the `j`-th column as an `nrows × 1` view.
    #[track_caller]
    #[inline]
    pub fn col(self, j: usize) -> Self {
        let nrows = self.nrows();
        self.submatrix(0, j, nrows, 1)
    }

    /// Returns the `i`-th row as a `1 × ncols` view.
    #[track_caller]
    #[inline]
    pub fn row(self, i: usize) -> Self {
        let ncols = self.ncols();
        self.submatrix(i, 0, 1, ncols)
    }

    /// Returns the main diagonal as a `min(nrows, ncols) × 1` view.
    #[inline]
    pub fn diagonal(self) -> Self {
        // SAFETY: the diagonal elements are distinct
        unsafe { self.into_const().diagonal().const_cast() }
    }

    /// Returns the transpose of `self`.
    #[inline]
    pub fn transpose(self) -> Self {
        // SAFETY: the strides are swapped together with the dimensions
        unsafe { self.into_const().transpose().const_cast() }
    }

    /// Copies the values of `src` into `self`.
    ///
    /// # Panics
    ///
    /// Panics if the dimensions do not match.
    #[track_caller]
    pub fn copy_from(&mut self, src: MatRef<'_, T>)
    where
        T: Copy,
    {
        fancy_assert!((self.nrows(), self.ncols()) == (src.nrows(), src.ncols()));
        for j in 0..self.ncols() {
            for i in 0..self.nrows() {
                self.write(i, j, src.read(i, j));
            }
        }
    }

    /// Sets every element of `self` to `value`.
    pub fn fill(&mut self, value: T)
    where
        T: Copy,
    {
        for j in 0..self.ncols() {
            for i in 0..self.nrows() {
                self.write(i, j, value);
            }
        }
    }

    /// Sets every element of `self` to zero.
    pub fn fill_zeros(&mut self)
    where
        T: ComplexField,
    {
        self.fill(T::zero());
    }
}

impl<'a, T> MatRef<'a, T> {
    #[inline(always)]
    unsafe fn const_cast(self) -> MatMut<'a, T> {
        MatMut {
            base: self.base,
            _marker: PhantomData,
        }
    }
}

impl<'a, T> Index<(usize, usize)> for MatRef<'a, T> {
    type Output = T;

    #[track_caller]
    #[inline]
    fn index(&self, (i, j): (usize, usize)) -> &Self::Output {
        self.get(i, j)
    }
}

impl<'a, T> Index<(usize, usize)> for MatMut<'a, T> {
    type Output = T;

    #[track_caller]
    #[inline]
    fn index(&self, (i, j): (usize, usize)) -> &Self::Output {
        self.rb().get(i, j)
    }
}

impl<'a, T> IndexMut<(usize, usize)> for MatMut<'a, T> {
    #[track_caller]
    #[inline]
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut Self::Output {
        self.rb_mut().get(i, j)
    }
}

impl<'a, T: Debug> Debug for MatRef<'a, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        struct DebugRow<'a, T>(MatRef<'a, T>);

        impl<'a, T: Debug> Debug for DebugRow<'a, T> {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.debug_list()
                    .entries((0..self.0.ncols()).map(|j| self.0.get(0, j)))
                    .finish()
            }
        }

        writeln!(f, "[")?;
        for i in 0..self.nrows() {
            writeln!(f, "{:?},", DebugRow(self.row(i)))?;
        }
        write!(f, "]")
    }
}

impl<'a, T: Debug> Debug for MatMut<'a, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.rb().fmt(f)
    }
}

/// Heap allocated resizable matrix, similar to a 2D [`Vec`].
///
/// The elements are stored in column-major order, with no padding between the columns.
#[derive(Clone)]
pub struct Mat<T> {
    data: Vec<T>,
    nrows: usize,
    ncols: usize,
}

impl<T: Entity> Default for Mat<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> Mat<T> {
    /// Returns an empty matrix of dimension `0×0`.
    #[inline]
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            nrows: 0,
            ncols: 0,
        }
    }

    /// Returns a matrix of dimension `nrows × ncols` filled with the default value of `T`, which
    /// is zero for every numeric type.
    #[inline]
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self {
            data: vec![T::default(); nrows * ncols],
            nrows,
            ncols,
        }
    }

    /// Returns a matrix of dimension `nrows × ncols` where the element at position `(i, j)` is
    /// `f(i, j)`.
    pub fn from_fn(nrows: usize, ncols: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(nrows * ncols);
        for j in 0..ncols {
            for i in 0..nrows {
                data.push(f(i, j));
            }
        }
        Self { data, nrows, ncols }
    }

    /// Returns the number of rows of the matrix.
    #[inline]
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Returns the number of columns of the matrix.
    #[inline]
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Returns a view over the matrix.
    #[inline]
    pub fn as_ref(&self) -> MatRef<'_, T> {
        // SAFETY: the storage is column-major with leading dimension `nrows`
        unsafe {
            MatRef::from_raw_parts(
                self.data.as_ptr(),
                self.nrows,
                self.ncols,
                1,
                self.nrows as isize,
            )
        }
    }

    /// Returns a mutable view over the matrix.
    #[inline]
    pub fn as_mut(&mut self) -> MatMut<'_, T> {
        // SAFETY: the storage is column-major with leading dimension `nrows`
        unsafe {
            MatMut::from_raw_parts(
                self.data.as_mut_ptr(),
                self.nrows,
                self.ncols,
                1,
                self.nrows as isize,
            )
        }
    }

    /// Reads the value of the element at position (i, j).
    #[track_caller]
    #[inline]
    pub fn read(&self, i: usize, j: usize) -> T {
        self.as_ref().read(i, j)
    }

    /// Writes `value` to the element at position (i, j).
    #[track_caller]
    #[inline]
    pub fn write(&mut self, i: usize, j: usize, value: T) {
        self.as_mut().write(i, j, value)
    }

    /// Returns the `j`-th column as a contiguous slice.
    #[track_caller]
    #[inline]
    pub fn col_as_slice(&self, j: usize) -> &[T] {
        fancy_assert!(j < self.ncols);
        &self.data[j * self.nrows..(j + 1) * self.nrows]
    }

    /// Returns the `j`-th column as a contiguous mutable slice.
    #[track_caller]
    #[inline]
    pub fn col_as_slice_mut(&mut self, j: usize) -> &mut [T] {
        fancy_assert!(j < self.ncols);
        &mut self.data[j * self.nrows..(j + 1) * self.nrows]
    }

    /// Returns the elements in column-major order.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Returns a view over the transpose of `self`.
    #[inline]
    pub fn transpose(&self) -> MatRef<'_, T> {
        self.as_ref().transpose()
    }
}

impl<T: ComplexField> Mat<T> {
    /// Returns a matrix of dimension `nrows × ncols` with ones on the diagonal and zeros elsewhere.
    pub fn identity(nrows: usize, ncols: usize) -> Self {
        Self::from_fn(nrows, ncols, |i, j| if i == j { T::one() } else { T::zero() })
    }
}

impl<T: Entity> Index<(usize, usize)> for Mat<T> {
    type Output = T;

    #[track_caller]
    #[inline]
    fn index(&self, (i, j): (usize, usize)) -> &Self::Output {
        self.as_ref().get(i, j)
    }
}

impl<T: Entity> IndexMut<(usize, usize)> for Mat<T> {
    #[track_caller]
    #[inline]
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut Self::Output {
        self.as_mut().get(i, j)
    }
}

impl<T: PartialEq> PartialEq for Mat<T> {
    fn eq(&self, other: &Self) -> bool {
        self.nrows == other.nrows && self.ncols == other.ncols && self.data == other.data
    }
}

impl<T: Debug> Debug for Mat<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        // SAFETY: the storage is column-major with leading dimension `nrows`
        let view = unsafe {
            MatRef::from_raw_parts(
                self.data.as_ptr(),
                self.nrows,
                self.ncols,
                1,
                self.nrows as isize,
            )
        };
        view.fmt(f)
    }
}

/// Creates a [`Mat`] containing the arguments.
///
/// ```
/// use gridla_core::mat;
///
/// let m = mat![
///     [1.0, 5.0, 9.0],
///     [2.0, 6.0, 10.0],
///     [3.0, 7.0, 11.0],
///     [4.0, 8.0, 12.0f64],
/// ];
///
/// assert_eq!(m.read(0, 0), 1.0);
/// assert_eq!(m.read(1, 0), 2.0);
/// assert_eq!(m.read(2, 0), 3.0);
/// assert_eq!(m.read(3, 0), 4.0);
///
/// assert_eq!(m.read(0, 1), 5.0);
/// assert_eq!(m.read(3, 2), 12.0);
/// ```
#[macro_export]
macro_rules! mat {
    () => {
        {
            compile_error!("number of columns in the matrix is ambiguous");
        }
    };

    ($([$($v:expr),* $(,)?] ),+ $(,)?) => {
        {
            let data = [$([$($v),*]),+];
            let nrows = data.len();
            let ncols = data[0].len();
            $crate::Mat::from_fn(nrows, ncols, |i, j| data[i][j])
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_slice() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let slice = unsafe { MatRef::from_raw_parts(data.as_ptr(), 2, 3, 3, 1) };

        fancy_assert!(slice.get(0, 0) == &1.0);
        fancy_assert!(slice.get(0, 1) == &2.0);
        fancy_assert!(slice.get(0, 2) == &3.0);

        fancy_assert!(slice.get(1, 0) == &4.0);
        fancy_assert!(slice.get(1, 1) == &5.0);
        fancy_assert!(slice.get(1, 2) == &6.0);
    }

    #[test]
    fn split_and_transpose() {
        let mut m = mat![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0f64]];
        {
            let (tl, tr, bl, br) = m.as_mut().split_at(1, 2);
            fancy_assert!((tl.nrows(), tl.ncols()) == (1, 2));
            fancy_assert!((tr.nrows(), tr.ncols()) == (1, 1));
            fancy_assert!((bl.nrows(), bl.ncols()) == (2, 2));
            fancy_assert!((br.nrows(), br.ncols()) == (2, 1));
            fancy_assert!(tr.read(0, 0) == 3.0);
            fancy_assert!(bl.read(1, 1) == 8.0);
            let mut br = br;
            br.write(1, 0, -9.0);
        }
        fancy_assert!(m.read(2, 2) == -9.0);

        let t = m.transpose();
        fancy_assert!(t.read(0, 1) == 4.0);
        fancy_assert!(t.read(2, 0) == 3.0);

        let d = m.as_ref().diagonal();
        fancy_assert!(d.nrows() == 3);
        fancy_assert!(d.read(1, 0) == 5.0);
        fancy_assert!(d.read(2, 0) == -9.0);
    }

    #[test]
    fn submatrix_views() {
        let m = Mat::from_fn(5, 4, |i, j| (i + 10 * j) as f64);
        let s = m.as_ref().submatrix(1, 2, 3, 2);
        fancy_assert!((s.nrows(), s.ncols()) == (3, 2));
        fancy_assert!(s.read(0, 0) == 21.0);
        fancy_assert!(s.read(2, 1) == 33.0);
        fancy_assert!(s.to_owned() == Mat::from_fn(3, 2, |i, j| (i + 1 + 10 * (j + 2)) as f64));

        let col = m.as_ref().col(3);
        fancy_assert!(col.read(4, 0) == 34.0);
        let row = m.as_ref().row(2);
        fancy_assert!(row.read(0, 1) == 12.0);
    }

    #[test]
    fn complex_field_basics() {
        let z = c64::new(3.0, 4.0);
        fancy_assert!(z.abs() == 5.0);
        fancy_assert!(z.conj() == c64::new(3.0, -4.0));
        fancy_assert!(z.real() == 3.0);
        fancy_assert!(ComplexField::abs(-2.0f64) == 2.0);
        fancy_assert!(Conj::Yes.apply(z) == z.conj());
        fancy_assert!(Conj::Yes.compose(Conj::Yes) == Conj::No);
    }
}

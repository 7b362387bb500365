//! Packed Householder reflectors stored as the rows of a matrix $H$, applied from the left in
//! forward order ("LLHF").
//!
//! The reflector $k$ is the row vector $v_k$, with an implicit one at the column where it meets
//! the selected diagonal of $H$ and implicit zeros to its right. Applying the reflectors $k$ to
//! $k + b - 1$ one after the other is the same as applying
//! $$(I - \tilde\tau_{k+b-1} v_{k+b-1}^H v_{k+b-1}) \cdots (I - \tilde\tau_k v_k^H v_k)
//! = I - H_1^H S H_1,$$
//! where $H_1$ is the panel holding the $b$ reflectors, and $S$ is a lower triangular matrix whose
//! inverse is cheap to form:
//! $$\text{tril}(S^{-1}) = \text{tril}(H_1 H_1^H),\quad \text{diag}(S^{-1}) = 1/\tilde\tau.$$
//!
//! The blocked drivers apply one panel at a time, to the leading rows of the target matrix that
//! the panel touches.

/// Applying the reflectors.
pub mod compute;
/// Reference implementation, one reflector at a time.
pub mod reference;

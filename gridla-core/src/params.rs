use crate::{Error, Parallelism, Result};

/// Tuning and validation parameters shared by the blocked drivers.
///
/// The block size only affects performance, never the computed result up to rounding.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FactorParams {
    /// Width of the panels processed by one step of a blocked driver.
    pub block_size: usize,
    /// Parallelism used by the local kernels of each process.
    pub parallelism: Parallelism,
    /// Whether to run the checks that only matter for a multi-process run: operands sharing the
    /// same grid, and every process passing the same arguments to a distributed driver.
    ///
    /// Shape, sign and alignment checks are always performed.
    pub validate: bool,
}

impl Default for FactorParams {
    #[inline]
    fn default() -> Self {
        Self {
            block_size: 128,
            parallelism: Parallelism::None,
            validate: cfg!(debug_assertions),
        }
    }
}

impl FactorParams {
    /// Returns a copy of `self` with the given block size.
    #[inline]
    pub fn with_block_size(self, block_size: usize) -> Self {
        Self { block_size, ..self }
    }

    /// Returns a copy of `self` with the given parallelism.
    #[inline]
    pub fn with_parallelism(self, parallelism: Parallelism) -> Self {
        Self {
            parallelism,
            ..self
        }
    }

    /// Returns a copy of `self` with the validation layer enabled or disabled.
    #[inline]
    pub fn with_validation(self, validate: bool) -> Self {
        Self { validate, ..self }
    }

    /// Checks the parameters themselves.
    pub fn check(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(Error::InvalidBlockSize);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_and_check() {
        let params = FactorParams::default()
            .with_block_size(16)
            .with_parallelism(Parallelism::Rayon(2))
            .with_validation(true);
        assert_eq!(params.block_size, 16);
        assert_eq!(params.parallelism, Parallelism::Rayon(2));
        assert!(params.validate);
        assert!(params.check().is_ok());
        assert_eq!(
            params.with_block_size(0).check(),
            Err(Error::InvalidBlockSize)
        );
    }
}

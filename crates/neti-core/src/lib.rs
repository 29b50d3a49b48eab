//! Core data structures for the NETI integrator.
//!
//! This crate provides:
//! - [`NetiScalar`], the scalar trait both precision variants implement
//! - [`CsrMatrix`], the compressed-row sparse matrix the integrator consumes
//! - The error type for matrix construction

pub mod csr;
pub mod error;
pub mod scalar;

pub use csr::CsrMatrix;
pub use error::{Error, Result};
pub use scalar::{NetiScalar, Precision};

//! Workspace sizing and the scratch arena.
//!
//! The integrator never allocates. Callers size three buffers with
//! [`WorkspaceSizes::compute`], keep them in a [`Workspace`], and pass the
//! same workspace to every step. Each step carves the buffers into named views
//! with a [`ScratchArena`], in the same order as the sizing formula:
//!
//! ```text
//! int:    pivots (m)
//! device: basis (d*m) | lu (m*m) | coords (m) | xc (d) | xphi (d) | drive (d)
//! host:   hessenberg (m*m) | eigvecs (m*m) | eig_re (m) | eig_im (m) | eig_work ((2+2nb)*m)
//! ```

use neti_core::NetiScalar;

use crate::error::{NetiError, Result};

/// Element counts of the three workspace buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkspaceSizes {
    /// Integer buffer (pivot indices).
    pub int_len: usize,
    /// Device scalar buffer.
    pub device_len: usize,
    /// Host scalar buffer.
    pub host_len: usize,
}

impl WorkspaceSizes {
    /// Sizes for `ndof` degrees of freedom, Krylov dimension `krylov_dim`,
    /// and eigendecomposition blocking factor `eig_block_size` (>= 1).
    pub fn compute(ndof: usize, krylov_dim: usize, eig_block_size: usize) -> Self {
        let d = ndof;
        let m = krylov_dim;
        let nb = eig_block_size.max(1);

        Self {
            int_len: m,
            device_len: d * m + m * m + m + 3 * d,
            host_len: 2 * m * m + 2 * m + (2 + 2 * nb) * m,
        }
    }

    /// Check that buffers of these sizes can hold `required`.
    pub fn covers(&self, required: &WorkspaceSizes) -> Result<()> {
        let checks = [
            ("int", self.int_len, required.int_len),
            ("device", self.device_len, required.device_len),
            ("host", self.host_len, required.host_len),
        ];
        for (region, available, needed) in checks {
            if available < needed {
                return Err(NetiError::WorkspaceTooSmall {
                    region,
                    view: "total",
                    required: needed,
                    available,
                });
            }
        }
        Ok(())
    }
}

/// Caller-owned scratch buffers, reused verbatim across steps.
#[derive(Debug, Clone)]
pub struct Workspace<T> {
    pivots: Vec<usize>,
    device: Vec<T>,
    host: Vec<T>,
}

impl<T: NetiScalar> Workspace<T> {
    /// Allocate zero-filled buffers of the given sizes.
    pub fn allocate(sizes: &WorkspaceSizes) -> Self {
        Self {
            pivots: vec![0; sizes.int_len],
            device: vec![T::zero(); sizes.device_len],
            host: vec![T::zero(); sizes.host_len],
        }
    }

    /// Wrap existing buffers. Their lengths are checked at each step.
    pub fn from_buffers(pivots: Vec<usize>, device: Vec<T>, host: Vec<T>) -> Self {
        Self {
            pivots,
            device,
            host,
        }
    }

    /// Actual lengths of the held buffers.
    pub fn sizes(&self) -> WorkspaceSizes {
        WorkspaceSizes {
            int_len: self.pivots.len(),
            device_len: self.device.len(),
            host_len: self.host.len(),
        }
    }

    /// Give the buffers back to the caller.
    pub fn into_buffers(self) -> (Vec<usize>, Vec<T>, Vec<T>) {
        (self.pivots, self.device, self.host)
    }

    /// Carve the views the spectral evaluator needs.
    pub fn spectral_buffers(
        &mut self,
        ndof: usize,
        krylov_dim: usize,
        eig_block_size: usize,
    ) -> Result<SpectralBuffers<'_, T>> {
        Ok(self.carve(ndof, krylov_dim, eig_block_size)?.spectral)
    }

    /// Carve every named view used by one step.
    pub(crate) fn carve(
        &mut self,
        ndof: usize,
        krylov_dim: usize,
        eig_block_size: usize,
    ) -> Result<StepScratch<'_, T>> {
        let (d, m) = (ndof, krylov_dim);
        let nb = eig_block_size.max(1);

        let mut int = ScratchArena::new("int", &mut self.pivots);
        let mut device = ScratchArena::new("device", &mut self.device);
        let mut host = ScratchArena::new("host", &mut self.host);

        let pivots = int.take("pivots", m)?;

        let basis = device.take("basis", d * m)?;
        let lu = device.take("lu", m * m)?;
        let coords = device.take("coords", m)?;
        let xc = device.take("xc", d)?;
        let xphi = device.take("xphi", d)?;
        let drive = device.take("drive", d)?;

        let hessenberg = host.take("hessenberg", m * m)?;
        let eigvecs = host.take("eigvecs", m * m)?;
        let eig_re = host.take("eig_re", m)?;
        let eig_im = host.take("eig_im", m)?;
        let eig_work = host.take("eig_work", (2 + 2 * nb) * m)?;

        Ok(StepScratch {
            spectral: SpectralBuffers {
                basis,
                hessenberg,
                pivots,
                lu,
                coords,
                eigvecs,
                eig_re,
                eig_im,
                eig_work,
            },
            xc,
            xphi,
            drive,
        })
    }
}

/// Bounds-checked carving of named views from one buffer.
#[derive(Debug)]
pub struct ScratchArena<'a, E> {
    region: &'static str,
    rest: &'a mut [E],
}

impl<'a, E> ScratchArena<'a, E> {
    /// Start carving `buffer`, reporting failures against `region`.
    pub fn new(region: &'static str, buffer: &'a mut [E]) -> Self {
        Self {
            region,
            rest: buffer,
        }
    }

    /// Take the next `len` elements as the view named `view`.
    pub fn take(&mut self, view: &'static str, len: usize) -> Result<&'a mut [E]> {
        let available = self.rest.len();
        if len > available {
            return Err(NetiError::WorkspaceTooSmall {
                region: self.region,
                view,
                required: len,
                available,
            });
        }
        let rest = std::mem::take(&mut self.rest);
        let (head, tail) = rest.split_at_mut(len);
        self.rest = tail;
        Ok(head)
    }

    /// Elements not yet handed out.
    pub fn remaining(&self) -> usize {
        self.rest.len()
    }
}

/// Views used by the Krylov builder and the spectral evaluator.
#[derive(Debug)]
pub struct SpectralBuffers<'a, T> {
    /// Orthonormal basis, `d` x `m` column-major.
    pub basis: &'a mut [T],
    /// Hessenberg matrix, `m` x `m` column-major.
    pub hessenberg: &'a mut [T],
    /// Pivot indices of the reduced solve.
    pub pivots: &'a mut [usize],
    /// LU factors of the eigenvector matrix.
    pub lu: &'a mut [T],
    /// Reduced coordinate vector.
    pub coords: &'a mut [T],
    /// Right eigenvectors of the Hessenberg matrix.
    pub eigvecs: &'a mut [T],
    pub eig_re: &'a mut [T],
    pub eig_im: &'a mut [T],
    /// Eigendecomposition work region; its head also holds `X * f(B) * y`.
    pub eig_work: &'a mut [T],
}

/// Every view of one step.
pub(crate) struct StepScratch<'a, T> {
    pub spectral: SpectralBuffers<'a, T>,
    pub xc: &'a mut [T],
    pub xphi: &'a mut [T],
    pub drive: &'a mut [T],
}

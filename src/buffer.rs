//! Sprite pixel memory
//!
//! A [`SurfaceBuffer`] is the memory behind a sprite. It is either owned
//! (obtained from a [`MemoryPool`]) or borrowed from the caller. Owned memory
//! is released exactly once, when the buffer is replaced, released or
//! dropped. Borrowed memory is never freed by the sprite.
//!
//! ## Allocation Sources
//!
//! | Source         | Fallback                          |
//! |----------------|-----------------------------------|
//! | `Normal`       | none                              |
//! | `Dma`          | none                              |
//! | `ExternalRam`  | retried from `Dma` before failing |
//!
//! ## Example
//!
//! ```
//! use surfblit::buffer::{AllocationSource, SurfaceBuffer, SystemHeap};
//!
//! let buffer = SurfaceBuffer::allocate(&mut SystemHeap, 64, AllocationSource::Dma)
//!     .unwrap_or_default();
//! assert_eq!(buffer.len(), 64);
//!
//! let mut memory = [0u8; 16];
//! let borrowed = SurfaceBuffer::borrowed(&mut memory);
//! assert!(borrowed.source().is_none());
//! ```

use alloc::vec::Vec;
use log::warn;

use crate::error::Error;

/// Where sprite memory should come from
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AllocationSource {
    /// General-purpose heap
    Normal,
    /// Heap region reachable by the DMA engine
    #[default]
    Dma,
    /// External (PSRAM-style) memory
    ExternalRam,
}

/// Provider of zeroed byte buffers
///
/// Implement this for platform heaps that distinguish DMA-capable or external
/// memory. [`SystemHeap`] serves every source from the global allocator.
pub trait MemoryPool {
    /// Allocate `len` zeroed bytes from `source`, `None` when exhausted
    fn allocate(&mut self, len: usize, source: AllocationSource) -> Option<Vec<u8>>;
}

/// Global allocator, for every source
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemHeap;

impl MemoryPool for SystemHeap {
    fn allocate(&mut self, len: usize, _source: AllocationSource) -> Option<Vec<u8>> {
        let mut data = Vec::new();
        data.try_reserve_exact(len).ok()?;
        data.resize(len, 0);
        Some(data)
    }
}

/// Backing memory of a sprite
#[derive(Debug, Default)]
pub enum SurfaceBuffer<'a> {
    /// No memory
    #[default]
    Empty,
    /// Memory owned by the sprite
    Owned {
        /// Pixel bytes
        data: Vec<u8>,
        /// Source the memory actually came from
        source: AllocationSource,
    },
    /// Caller-supplied memory
    Borrowed(&'a mut [u8]),
}

impl<'a> SurfaceBuffer<'a> {
    /// Allocate `len` bytes from `source`
    ///
    /// An [`AllocationSource::ExternalRam`] request that cannot be served is
    /// retried from [`AllocationSource::Dma`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::AllocationFailed`] when no source could serve the request.
    pub fn allocate<P: MemoryPool + ?Sized>(
        pool: &mut P,
        len: usize,
        source: AllocationSource,
    ) -> Result<Self, Error> {
        if let Some(data) = pool.allocate(len, source) {
            return Ok(Self::Owned { data, source });
        }
        if source == AllocationSource::ExternalRam {
            warn!("external RAM exhausted ({len} bytes), falling back to DMA-capable heap");
            if let Some(data) = pool.allocate(len, AllocationSource::Dma) {
                return Ok(Self::Owned {
                    data,
                    source: AllocationSource::Dma,
                });
            }
        }
        warn!("allocation of {len} bytes from {source:?} failed");
        Err(Error::AllocationFailed {
            requested: len,
            source,
        })
    }

    /// Wrap caller-supplied memory
    pub fn borrowed(data: &'a mut [u8]) -> Self {
        Self::Borrowed(data)
    }

    /// Size in bytes
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Whether there is no memory
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Source of owned memory, `None` when borrowed or empty
    pub fn source(&self) -> Option<AllocationSource> {
        match self {
            Self::Owned { source, .. } => Some(*source),
            Self::Empty | Self::Borrowed(_) => None,
        }
    }

    /// Pixel bytes
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Self::Empty => &[],
            Self::Owned { data, .. } => data,
            Self::Borrowed(data) => data,
        }
    }

    /// Mutable pixel bytes
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match self {
            Self::Empty => &mut [],
            Self::Owned { data, .. } => data,
            Self::Borrowed(data) => data,
        }
    }

    /// Free owned memory (or forget borrowed memory), leaving the buffer empty
    pub fn release(&mut self) {
        *self = Self::Empty;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    /// Pool that only serves the listed sources and records every request
    struct TestPool {
        available: Vec<AllocationSource>,
        requests: Vec<AllocationSource>,
    }

    impl MemoryPool for TestPool {
        fn allocate(&mut self, len: usize, source: AllocationSource) -> Option<Vec<u8>> {
            self.requests.push(source);
            self.available.contains(&source).then(|| vec![0; len])
        }
    }

    #[test]
    fn test_system_heap_zeroes() {
        let buffer = SurfaceBuffer::allocate(&mut SystemHeap, 32, AllocationSource::Normal).unwrap();
        assert_eq!(buffer.len(), 32);
        assert!(buffer.as_slice().iter().all(|&b| b == 0));
        assert_eq!(buffer.source(), Some(AllocationSource::Normal));
    }

    #[test]
    fn test_external_ram_falls_back_to_dma() {
        let mut pool = TestPool {
            available: vec![AllocationSource::Dma],
            requests: Vec::new(),
        };
        let buffer = SurfaceBuffer::allocate(&mut pool, 8, AllocationSource::ExternalRam).unwrap();
        assert_eq!(buffer.source(), Some(AllocationSource::Dma));
        assert_eq!(
            pool.requests,
            [AllocationSource::ExternalRam, AllocationSource::Dma]
        );
    }

    #[test]
    fn test_no_fallback_for_normal() {
        let mut pool = TestPool {
            available: vec![AllocationSource::Dma],
            requests: Vec::new(),
        };
        let result = SurfaceBuffer::allocate(&mut pool, 8, AllocationSource::Normal);
        assert!(matches!(
            result,
            Err(Error::AllocationFailed {
                requested: 8,
                source: AllocationSource::Normal
            })
        ));
        assert_eq!(pool.requests.len(), 1);
    }

    #[test]
    fn test_borrowed_release_keeps_caller_memory() {
        let mut memory = [7u8; 4];
        {
            let mut buffer = SurfaceBuffer::borrowed(&mut memory);
            buffer.as_mut_slice()[0] = 1;
            buffer.release();
            assert!(buffer.is_empty());
        }
        assert_eq!(memory, [1, 7, 7, 7]);
    }
}

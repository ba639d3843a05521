//! Shared memory bridge buffers
//!
//! Physically contiguous buffers the secure world can read by physical
//! address. Ownership of a region belongs to exactly one `ShmBuffer`,
//! which scrubs and frees it when dropped.

use zeroize::Zeroize;

use crate::error::{Errno, IceError, Result};

/// Address the secure world reads the buffer from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct PhysAddr(u64);

impl PhysAddr {
    pub const fn new(addr: u64) -> Self {
        PhysAddr(addr)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Kernel mapping of a bridge region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct VirtAddr(u64);

impl VirtAddr {
    pub const fn new(addr: u64) -> Self {
        VirtAddr(addr)
    }

    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.0 as usize as *mut u8
    }
}

/// Region handed out by the bridge
#[derive(Debug, PartialEq, Eq)]
pub struct ShmRegion {
    pub vaddr: VirtAddr,
    pub paddr: PhysAddr,
    pub size: usize,
}

/// Allocator for secure-world shared memory
///
/// # Safety
///
/// A region returned by `allocate` must be mapped at `vaddr`, writable for
/// `size` bytes, and not aliased by anyone else until it is passed back to
/// `free`.
pub unsafe trait ShmBridge: Send + Sync {
    fn allocate(&self, size: usize) -> core::result::Result<ShmRegion, Errno>;

    fn free(&self, region: ShmRegion);

    /// Clean the data cache over the region so the secure world sees it
    fn flush_dcache(&self, region: &ShmRegion);
}

/// Scoped ownership of one bridge region
pub struct ShmBuffer<'a> {
    bridge: &'a dyn ShmBridge,
    region: Option<ShmRegion>,
}

impl<'a> ShmBuffer<'a> {
    pub fn allocate(bridge: &'a dyn ShmBridge, size: usize) -> Result<Self> {
        let region = bridge.allocate(size).map_err(|status| {
            log::error!("ICE: shm bridge allocation of {} bytes failed: {}", size, status);
            IceError::OutOfMemory
        })?;

        if region.size < size {
            log::error!("ICE: shm bridge returned {} bytes, wanted {}", region.size, size);
            bridge.free(region);
            return Err(IceError::OutOfMemory);
        }

        Ok(Self {
            bridge,
            region: Some(region),
        })
    }

    pub fn phys_addr(&self) -> PhysAddr {
        self.region.as_ref().map_or(PhysAddr::new(0), |r| r.paddr)
    }

    pub fn size(&self) -> usize {
        self.region.as_ref().map_or(0, |r| r.size)
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        match self.region.as_ref() {
            // SAFETY: the ShmBridge contract guarantees the region is mapped,
            // writable and exclusively ours until free().
            Some(r) => unsafe { core::slice::from_raw_parts_mut(r.vaddr.as_mut_ptr(), r.size) },
            None => &mut [],
        }
    }

    /// Copy `data` to the start of the buffer and flush it out of the cache
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        let slice = self.as_mut_slice();
        if data.len() > slice.len() {
            return Err(IceError::InvalidArgument("payload larger than shm buffer"));
        }
        slice[..data.len()].copy_from_slice(data);

        if let Some(region) = self.region.as_ref() {
            self.bridge.flush_dcache(region);
        }
        Ok(())
    }
}

impl Drop for ShmBuffer<'_> {
    fn drop(&mut self) {
        self.as_mut_slice().zeroize();
        if let Some(region) = self.region.take() {
            self.bridge.flush_dcache(&region);
            self.bridge.free(region);
        }
    }
}

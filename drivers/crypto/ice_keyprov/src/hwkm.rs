//! Hardware Key Manager (HWKM) interface
//!
//! Programs wrapped key material straight into engine-managed key
//! registers. Used for material larger than the SCM payload buffer.

use crate::device::IceDevice;
use crate::error::Errno;

pub trait HwKeyManager: Send + Sync {
    fn program_key(
        &self,
        index: u32,
        key: &[u8],
        device: &IceDevice,
        data_unit: u32,
    ) -> Result<(), Errno>;

    fn invalidate_key(&self, device: &IceDevice, index: u32) -> Result<(), Errno>;
}

/// Platforms without a key manager
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHwKeyManager;

impl HwKeyManager for NoHwKeyManager {
    fn program_key(&self, _: u32, _: &[u8], device: &IceDevice, _: u32) -> Result<(), Errno> {
        log::error!("ICE: {} has no hardware key manager", device.instance());
        Err(Errno::OPNOTSUPP)
    }

    fn invalidate_key(&self, device: &IceDevice, _: u32) -> Result<(), Errno> {
        log::error!("ICE: {} has no hardware key manager", device.instance());
        Err(Errno::OPNOTSUPP)
    }
}

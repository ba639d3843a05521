//! ICE clock domain sequencing
//!
//! The engine registers are only reachable while its clocks are on, so
//! every provisioning call is bracketed by `enable` / `disable`.

use crate::device::IceDevice;
use crate::error::Errno;

pub trait IceClocks: Send + Sync {
    /// Turn on the clocks feeding the engine (may block on ramp-up)
    fn enable(&self, device: &IceDevice) -> Result<(), Errno>;

    fn disable(&self, device: &IceDevice) -> Result<(), Errno>;
}

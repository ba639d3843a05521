//! ICE instances
//!
//! Each inline crypto engine sits in front of one storage controller. The
//! secure world identifies the controller by a channel id.

use core::fmt;
use core::str::FromStr;

use crate::error::IceError;

/// Storage controller owning an ICE key slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StorageInstance {
    /// Primary embedded storage
    Ufs,
    /// Removable card storage
    Sdcc,
    /// Secondary peripheral storage
    UfsCard,
}

impl StorageInstance {
    /// Channel id passed to the secure world with every key call
    pub const fn channel_id(self) -> u32 {
        match self {
            StorageInstance::Ufs => 10,
            StorageInstance::Sdcc => 20,
            StorageInstance::UfsCard => 30,
        }
    }

    /// Instance-type string used by the platform description
    pub const fn as_str(self) -> &'static str {
        match self {
            StorageInstance::Ufs => "ufs",
            StorageInstance::Sdcc => "sdcc",
            StorageInstance::UfsCard => "ufscard",
        }
    }

    /// Removable card storage tolerates no provisioning failure at all
    pub const fn is_removable_card(self) -> bool {
        matches!(self, StorageInstance::Sdcc)
    }
}

impl FromStr for StorageInstance {
    type Err = IceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ufs" => Ok(StorageInstance::Ufs),
            "sdcc" => Ok(StorageInstance::Sdcc),
            "ufscard" => Ok(StorageInstance::UfsCard),
            _ => {
                log::error!("ICE: unknown instance type '{}'", s);
                Err(IceError::UnknownInstance)
            }
        }
    }
}

impl fmt::Display for StorageInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ICE engine handle passed to every provisioning call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IceDevice {
    instance: StorageInstance,
    hwkm_supported: bool,
}

impl IceDevice {
    pub const fn new(instance: StorageInstance, hwkm_supported: bool) -> Self {
        Self {
            instance,
            hwkm_supported,
        }
    }

    /// Build a device from the platform's instance-type string
    pub fn from_instance_type(instance_type: &str, hwkm_supported: bool) -> Result<Self, IceError> {
        Ok(Self::new(instance_type.parse()?, hwkm_supported))
    }

    pub fn instance(&self) -> StorageInstance {
        self.instance
    }

    pub fn hwkm_supported(&self) -> bool {
        self.hwkm_supported
    }
}

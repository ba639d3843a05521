//! # Provisionnement des clés ICE
//!
//! Installe et invalide les clés des slots du moteur de chiffrement en ligne
//! (ICE) placé devant les contrôleurs de stockage.
//!
//! Deux backends mutuellement exclusifs :
//! - **SCM** : appel TrustZone, clé XTS-256 passée par un buffer SHM de 64 octets
//! - **HWKM** : gestionnaire de clés matériel, pour les clés > 64 octets
//!
//! Chaque échec SCM passe par un disjoncteur (`FailureTelemetry`) qui
//! signale à l'hôte quand l'état des slots ne peut plus être garanti.
//!
//! Transport SCM, SHM bridge, horloges et HWKM sont fournis par la
//! plateforme via les traits de ce crate.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod clock;
pub mod config;
pub mod device;
pub mod error;
pub mod hwkm;
pub mod legacy;
pub mod provision;
pub mod scm;
pub mod shm;
pub mod telemetry;

#[cfg(test)]
mod mock;

// Réexportations
pub use clock::IceClocks;
pub use config::{IceConfig, MAX_ICE_KEY_INDEX, MIN_ICE_KEY_INDEX};
pub use device::{IceDevice, StorageInstance};
pub use error::{Errno, IceError, Result};
pub use hwkm::{HwKeyManager, NoHwKeyManager};
pub use legacy::LegacyScmBackend;
pub use provision::{IceKeyManager, ProvisioningBackend};
pub use scm::{ScmDesc, SecureCallTransport, SmcId};
pub use shm::{PhysAddr, ShmBridge, ShmRegion, VirtAddr};
pub use telemetry::{escalate, FailureTelemetry, FatalFault, TripReason};

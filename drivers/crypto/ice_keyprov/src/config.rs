// drivers/crypto/ice_keyprov/src/config.rs
//! Paramètres du provisionnement ICE.
//!
//! Les constantes reprennent la table de slots du moteur ICE ; `IceConfig`
//! permet à une plateforme de restreindre la plage sans toucher au code.

use crate::error::{IceError, Result};

/// Slots 0 et 1 réservés au FDE (full-disk encryption)
pub const MIN_ICE_KEY_INDEX: u32 = 2;

/// Dernier slot adressable de la table ICE
pub const MAX_ICE_KEY_INDEX: u32 = 31;

/// Buffer SHM du chemin SCM : deux moitiés XTS de 32 octets
pub const ICE_BUFFER_SIZE: usize = 64;

/// Au-delà de cette taille, le matériel de clé passe obligatoirement par le
/// HWKM : le buffer SCM ne peut pas le porter. Non configurable.
pub const HWKM_KEY_SIZE_THRESHOLD: usize = ICE_BUFFER_SIZE;

/// Total d'échecs (set + invalidate) au-delà duquel tout échec est fatal
pub const FATAL_FAILURE_THRESHOLD: u32 = 10;

/// Configuration d'une instance de `IceKeyManager`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IceConfig {
    /// Premier index de slot accepté
    pub min_key_index: u32,
    /// Dernier index de slot accepté
    pub max_key_index: u32,
    /// Seuil du disjoncteur (total des deux compteurs)
    pub fatal_failure_threshold: u32,
}

impl IceConfig {
    pub const fn new() -> Self {
        Self {
            min_key_index: MIN_ICE_KEY_INDEX,
            max_key_index: MAX_ICE_KEY_INDEX,
            fatal_failure_threshold: FATAL_FAILURE_THRESHOLD,
        }
    }

    /// Vérifie la cohérence de la configuration
    pub fn validate(&self) -> Result<()> {
        if self.min_key_index < MIN_ICE_KEY_INDEX {
            return Err(IceError::InvalidArgument("key index range overlaps FDE slots"));
        }
        if self.min_key_index > self.max_key_index {
            return Err(IceError::InvalidArgument("empty key index range"));
        }
        Ok(())
    }

    /// Vrai si l'index désigne un slot géré par ce module
    pub fn accepts_index(&self, index: u32) -> bool {
        (self.min_key_index..=self.max_key_index).contains(&index)
    }
}

impl Default for IceConfig {
    fn default() -> Self {
        Self::new()
    }
}

// drivers/crypto/ice_keyprov/src/error.rs
use core::fmt;

use crate::telemetry::FatalFault;

/// Type de résultat standard du provisionnement ICE
pub type Result<T> = core::result::Result<T, IceError>;

/// Code de retour brut d'un collaborateur (SCM, SHM bridge, horloges, HWKM).
///
/// Convention noyau : valeur négative = `-errno`. Les appels SCM peuvent
/// aussi remonter des codes TZ positifs, conservés tels quels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Errno(pub i32);

impl Errno {
    pub const IO: Self = Self(-5);
    pub const NOMEM: Self = Self(-12);
    pub const BUSY: Self = Self(-16);
    pub const NODEV: Self = Self(-19);
    pub const INVAL: Self = Self(-22);
    pub const OPNOTSUPP: Self = Self(-95);

    pub const fn raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#x})", self.0, self.0)
    }
}

/// Erreurs du provisionnement de clés ICE
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IceError {
    /// Index hors plage, clé absente ou configuration incohérente
    InvalidArgument(&'static str),

    /// Allocation du buffer SHM impossible
    OutOfMemory,

    /// Contention transitoire côté monde sécurisé
    BackendBusy,

    /// Tout autre échec SCM ou HWKM (statut brut conservé)
    BackendFault(Errno),

    /// Échec d'activation des horloges de l'ICE
    ClockSequencingFailed(Errno),

    /// Type d'instance de stockage inconnu
    UnknownInstance,

    /// Le disjoncteur a déclenché : l'hôte doit arrêter de servir des E/S
    Fatal(FatalFault),
}

impl IceError {
    /// Classe un statut d'échec remonté par un backend
    pub fn from_backend(status: Errno) -> Self {
        if status == Errno::BUSY {
            IceError::BackendBusy
        } else {
            IceError::BackendFault(status)
        }
    }

    /// Vrai si le statut sous-jacent est `-EBUSY`, y compris dans un défaut fatal
    pub fn is_busy(&self) -> bool {
        match self {
            IceError::BackendBusy => true,
            IceError::Fatal(fault) => fault.status == Errno::BUSY,
            _ => false,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, IceError::Fatal(_))
    }

    /// Code `-errno` à rendre à un appelant C
    pub fn errno(&self) -> i32 {
        match self {
            IceError::InvalidArgument(_) | IceError::UnknownInstance => Errno::INVAL.raw(),
            IceError::OutOfMemory => Errno::NOMEM.raw(),
            IceError::BackendBusy => Errno::BUSY.raw(),
            IceError::BackendFault(status) | IceError::ClockSequencingFailed(status) => {
                status.raw()
            }
            IceError::Fatal(fault) => fault.status.raw(),
        }
    }
}

impl fmt::Display for IceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IceError::InvalidArgument(what) => write!(f, "Invalid argument: {}", what),
            IceError::OutOfMemory => write!(f, "Out of memory"),
            IceError::BackendBusy => write!(f, "Key backend busy"),
            IceError::BackendFault(status) => write!(f, "Key backend fault: {}", status),
            IceError::ClockSequencingFailed(status) => {
                write!(f, "ICE clock sequencing failed: {}", status)
            }
            IceError::UnknownInstance => write!(f, "Unknown ICE instance type"),
            IceError::Fatal(fault) => write!(f, "Fatal key provisioning fault: {}", fault),
        }
    }
}

impl From<FatalFault> for IceError {
    fn from(fault: FatalFault) -> Self {
        IceError::Fatal(fault)
    }
}

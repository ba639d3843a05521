//! Key provisioning failure telemetry and circuit breaker
//!
//! A key slot that cannot be trusted to hold the key callers expect is
//! worse than a crash. Every secure-call outcome is recorded here; the
//! verdict tells the caller whether the host must stop serving I/O.

use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};
use spin::Once;

use crate::config::{IceConfig, FATAL_FAILURE_THRESHOLD};
use crate::device::StorageInstance;
use crate::error::Errno;
use crate::scm::SmcId;

/// Secure-call operation kinds that are counted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOp {
    SetKey,
    InvalidateKey,
}

impl KeyOp {
    pub fn from_smc_id(id: SmcId) -> Option<Self> {
        if id == SmcId::SET_ICE_KEY {
            Some(KeyOp::SetKey)
        } else if id == SmcId::INVALIDATE_ICE_KEY {
            Some(KeyOp::InvalidateKey)
        } else {
            None
        }
    }
}

/// Why the breaker tripped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripReason {
    /// Any status other than busy
    NonBusyStatus,
    /// Busy on removable card storage
    RemovableCardFailure,
    /// Combined failure count over the threshold
    ThresholdExceeded,
}

/// Snapshot of both failure counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FailureCounts {
    pub set_key: u32,
    pub invalidate_key: u32,
}

impl FailureCounts {
    pub fn total(&self) -> u32 {
        self.set_key.saturating_add(self.invalidate_key)
    }
}

/// Fatal verdict; the host decides how to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatalFault {
    pub op: KeyOp,
    pub instance: StorageInstance,
    /// Raw status of the failing call
    pub status: Errno,
    pub reason: TripReason,
    pub counts: FailureCounts,
}

impl fmt::Display for FatalFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} on {} failed with {} ({:?}, set={} invalidate={})",
            self.op,
            self.instance,
            self.status,
            self.reason,
            self.counts.set_key,
            self.counts.invalidate_key
        )
    }
}

/// Failure counters shared by every provisioning call
pub struct FailureTelemetry {
    set_key_failures: AtomicU32,
    invalidate_key_failures: AtomicU32,
    threshold: u32,
    tripped: Once<FatalFault>,
}

impl FailureTelemetry {
    pub const fn new(threshold: u32) -> Self {
        Self {
            set_key_failures: AtomicU32::new(0),
            invalidate_key_failures: AtomicU32::new(0),
            threshold,
            tripped: Once::new(),
        }
    }

    pub fn with_config(config: &IceConfig) -> Self {
        Self::new(config.fatal_failure_threshold)
    }

    /// Record the outcome of one secure call
    pub fn record(
        &self,
        smc_id: SmcId,
        instance: StorageInstance,
        outcome: Result<(), Errno>,
    ) -> Result<(), FatalFault> {
        let status = match outcome {
            Ok(()) => return Ok(()),
            Err(status) => status,
        };

        let op = match KeyOp::from_smc_id(smc_id) {
            Some(op) => op,
            None => {
                log::warn!("ICE: unsupported scm id {}", smc_id);
                return Ok(());
            }
        };

        let counts = match op {
            KeyOp::SetKey => FailureCounts {
                set_key: self.set_key_failures.fetch_add(1, Ordering::AcqRel) + 1,
                invalidate_key: self.invalidate_key_failures.load(Ordering::Acquire),
            },
            KeyOp::InvalidateKey => FailureCounts {
                set_key: self.set_key_failures.load(Ordering::Acquire),
                invalidate_key: self.invalidate_key_failures.fetch_add(1, Ordering::AcqRel) + 1,
            },
        };

        log::warn!(
            "ICE: failed to call scm {} ({} {})",
            smc_id,
            counts.set_key,
            counts.invalidate_key
        );

        let reason = if status != Errno::BUSY {
            Some(TripReason::NonBusyStatus)
        } else if instance.is_removable_card() {
            Some(TripReason::RemovableCardFailure)
        } else if counts.total() > self.threshold {
            Some(TripReason::ThresholdExceeded)
        } else {
            None
        };

        match reason {
            None => Ok(()),
            Some(reason) => {
                let fault = FatalFault {
                    op,
                    instance,
                    status,
                    reason,
                    counts,
                };
                log::error!("ICE: key provisioning circuit breaker tripped: {}", fault);
                self.tripped.call_once(|| fault);
                Err(fault)
            }
        }
    }

    pub fn counts(&self) -> FailureCounts {
        FailureCounts {
            set_key: self.set_key_failures.load(Ordering::Acquire),
            invalidate_key: self.invalidate_key_failures.load(Ordering::Acquire),
        }
    }

    /// First fault recorded, if the breaker has tripped
    pub fn tripped(&self) -> Option<&FatalFault> {
        self.tripped.get()
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

impl Default for FailureTelemetry {
    fn default() -> Self {
        Self::new(FATAL_FAILURE_THRESHOLD)
    }
}

/// Halt on a fatal provisioning fault
pub fn escalate(fault: &FatalFault) -> ! {
    log::error!("ICE: halting, key slot state cannot be trusted: {}", fault);
    panic!("ICE key provisioning fault: {}", fault)
}

//! ICE key provisioning
//!
//! Entry points used by the block-layer crypto setup path. Each call
//! validates its arguments, powers the engine, picks a backend, cleans up
//! after a partial failure and powers the engine back down.

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use spin::Mutex;

use crate::clock::IceClocks;
use crate::config::{IceConfig, HWKM_KEY_SIZE_THRESHOLD};
use crate::device::{IceDevice, StorageInstance};
use crate::error::{IceError, Result};
use crate::hwkm::HwKeyManager;
use crate::legacy::LegacyScmBackend;

/// Backend that programmed a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningBackend {
    LegacySecureCall,
    HardwareKeyManager,
}

impl ProvisioningBackend {
    /// Selection rule for a key of `key_size` bytes
    ///
    /// Anything over the SCM buffer must go through the key manager.
    pub fn select(device: &IceDevice, key_size: usize) -> Self {
        if device.hwkm_supported() && key_size > HWKM_KEY_SIZE_THRESHOLD {
            ProvisioningBackend::HardwareKeyManager
        } else {
            ProvisioningBackend::LegacySecureCall
        }
    }
}

type SlotKey = (StorageInstance, u32);

pub struct IceKeyManager {
    clocks: Arc<dyn IceClocks>,
    hwkm: Arc<dyn HwKeyManager>,
    legacy: LegacyScmBackend,
    /// Backend of the last successful set, per slot
    slots: Mutex<BTreeMap<SlotKey, ProvisioningBackend>>,
    config: IceConfig,
}

impl IceKeyManager {
    pub fn new(
        clocks: Arc<dyn IceClocks>,
        hwkm: Arc<dyn HwKeyManager>,
        legacy: LegacyScmBackend,
    ) -> Self {
        Self {
            clocks,
            hwkm,
            legacy,
            slots: Mutex::new(BTreeMap::new()),
            config: IceConfig::new(),
        }
    }

    pub fn with_config(
        clocks: Arc<dyn IceClocks>,
        hwkm: Arc<dyn HwKeyManager>,
        legacy: LegacyScmBackend,
        config: IceConfig,
    ) -> Result<Self> {
        config.validate()?;
        // Le disjoncteur appartient au backend SCM : les deux seuils doivent concorder
        if legacy.telemetry().threshold() != config.fatal_failure_threshold {
            log::error!(
                "ICE: telemetry threshold {} differs from configured {}",
                legacy.telemetry().threshold(),
                config.fatal_failure_threshold
            );
            return Err(IceError::InvalidArgument("breaker threshold mismatch"));
        }
        Ok(Self {
            config,
            ..Self::new(clocks, hwkm, legacy)
        })
    }

    pub fn config(&self) -> &IceConfig {
        &self.config
    }

    /// Backend recorded for a slot, if its last set succeeded
    pub fn active_backend(&self, instance: StorageInstance, index: u32) -> Option<ProvisioningBackend> {
        self.slots.lock().get(&(instance, index)).copied()
    }

    /// Install `key` into slot `index`
    pub fn set_key(
        &self,
        index: u32,
        key: &[u8],
        salt: Option<&[u8]>,
        device: &IceDevice,
        data_unit: u32,
        key_size: usize,
    ) -> Result<()> {
        self.check_index(index)?;
        if key.is_empty() {
            log::error!("ICE set_key: invalid key/salt");
            return Err(IceError::InvalidArgument("missing key"));
        }
        self.check_breaker()?;
        self.enable_clocks(device)?;

        let ret = match ProvisioningBackend::select(device, key_size) {
            ProvisioningBackend::HardwareKeyManager => {
                log::debug!("ICE set_key: slot {} through hwkm", index);
                self.program_hwkm(index, key, device, data_unit)
            }
            ProvisioningBackend::LegacySecureCall => {
                log::debug!("ICE set_key: slot {} through scm", index);
                match self.legacy.set_key(index, key, salt, data_unit, device) {
                    Ok(()) => {
                        self.remember(device, index, ProvisioningBackend::LegacySecureCall);
                        Ok(())
                    }
                    Err(err) if err.is_busy() => {
                        // Slot keeps its previous state; no second call into a busy backend
                        log::error!("ICE set_key: slot {} busy: {}", index, err);
                        self.disable_clocks(device);
                        return Err(err);
                    }
                    Err(err) => {
                        log::error!("ICE set_key: slot {} set key error: {}", index, err);
                        // Invalidate the slot to keep ICE in a known state
                        if let Err(cleanup) = self.legacy.clear_key(index, device) {
                            log::error!("ICE set_key: invalidate key error: {}", cleanup);
                        }
                        self.forget(device, index);
                        Err(err)
                    }
                }
            }
        };

        self.disable_clocks(device);
        ret
    }

    /// Invalidate slot `index`
    pub fn invalidate_key(&self, index: u32, device: &IceDevice) -> Result<()> {
        self.check_index(index)?;
        self.check_breaker()?;
        self.enable_clocks(device)?;

        let via_hwkm = device.hwkm_supported()
            && self.active_backend(device.instance(), index)
                == Some(ProvisioningBackend::HardwareKeyManager);

        let ret = if via_hwkm {
            let ret = self
                .hwkm
                .invalidate_key(device, index)
                .map_err(IceError::from_backend);
            if let Err(err) = &ret {
                log::error!("ICE invalidate_key: hwkm invalidate of slot {} failed: {}", index, err);
            }
            ret
        } else {
            let ret = self.legacy.clear_key(index, device);
            if let Err(err) = &ret {
                log::error!("ICE invalidate_key: slot {} invalidate error: {}", index, err);
            }
            ret
        };

        if ret.is_ok() {
            self.forget(device, index);
        }

        self.disable_clocks(device);
        ret
    }

    fn program_hwkm(&self, index: u32, key: &[u8], device: &IceDevice, data_unit: u32) -> Result<()> {
        match self.hwkm.program_key(index, key, device, data_unit) {
            Ok(()) => {
                self.remember(device, index, ProvisioningBackend::HardwareKeyManager);
                Ok(())
            }
            Err(status) => {
                log::error!("ICE set_key: hwkm key programming failed with error {}", status);
                if let Err(cleanup) = self.hwkm.invalidate_key(device, index) {
                    log::error!("ICE set_key: hwkm key invalidate failed error {}", cleanup);
                }
                self.forget(device, index);
                Err(IceError::from_backend(status))
            }
        }
    }

    fn check_index(&self, index: u32) -> Result<()> {
        if self.config.accepts_index(index) {
            Ok(())
        } else {
            log::error!("ICE: invalid key index {}", index);
            Err(IceError::InvalidArgument("key index out of range"))
        }
    }

    fn check_breaker(&self) -> Result<()> {
        match self.legacy.telemetry().tripped() {
            Some(fault) => {
                log::error!("ICE: refusing key operation after fatal fault: {}", fault);
                Err(IceError::Fatal(*fault))
            }
            None => Ok(()),
        }
    }

    fn enable_clocks(&self, device: &IceDevice) -> Result<()> {
        self.clocks.enable(device).map_err(|status| {
            log::error!("ICE: could not enable clocks for {}: {}", device.instance(), status);
            IceError::ClockSequencingFailed(status)
        })
    }

    /// A disable failure never changes the operation's result
    fn disable_clocks(&self, device: &IceDevice) {
        if let Err(status) = self.clocks.disable(device) {
            log::error!("ICE: could not disable clocks for {}: {}", device.instance(), status);
        }
    }

    fn remember(&self, device: &IceDevice, index: u32, backend: ProvisioningBackend) {
        self.slots.lock().insert((device.instance(), index), backend);
    }

    fn forget(&self, device: &IceDevice, index: u32) {
        self.slots.lock().remove(&(device.instance(), index));
    }
}

//! Legacy SCM key backend
//!
//! Programs and clears ICE key slots through TrustZone calls. The key is
//! handed over in a 64-byte shared memory buffer holding the two XTS-256
//! halves.

use alloc::sync::Arc;
use zerocopy::{AsBytes, FromBytes, FromZeroes};
use zeroize::Zeroize;

use crate::config::ICE_BUFFER_SIZE;
use crate::device::IceDevice;
use crate::error::{IceError, Result};
use crate::scm::{IceCipherMode, ParamId, ScmDesc, SecureCallTransport, SmcId};
use crate::shm::{ShmBridge, ShmBuffer};
use crate::telemetry::FailureTelemetry;

/// One XTS half (AES-256 key)
pub const XTS_HALF_KEY_SIZE: usize = ICE_BUFFER_SIZE / 2;

/// Buffer layout expected by the key-config service
#[derive(AsBytes, FromZeroes, FromBytes)]
#[repr(C)]
pub(crate) struct XtsKeyPayload {
    data_key: [u8; XTS_HALF_KEY_SIZE],
    tweak_key: [u8; XTS_HALF_KEY_SIZE],
}

impl XtsKeyPayload {
    /// Split `key` into its two halves; missing bytes stay zero
    pub(crate) fn from_key(key: &[u8]) -> Self {
        let mut payload = Self::new_zeroed();

        let first = &key[..key.len().min(XTS_HALF_KEY_SIZE)];
        payload.data_key[..first.len()].copy_from_slice(first);

        if key.len() > XTS_HALF_KEY_SIZE {
            let second = &key[XTS_HALF_KEY_SIZE..key.len().min(ICE_BUFFER_SIZE)];
            payload.tweak_key[..second.len()].copy_from_slice(second);
        }
        payload
    }
}

impl Drop for XtsKeyPayload {
    fn drop(&mut self) {
        self.data_key.zeroize();
        self.tweak_key.zeroize();
    }
}

pub struct LegacyScmBackend {
    transport: Arc<dyn SecureCallTransport>,
    shm: Arc<dyn ShmBridge>,
    telemetry: Arc<FailureTelemetry>,
}

impl LegacyScmBackend {
    pub fn new(
        transport: Arc<dyn SecureCallTransport>,
        shm: Arc<dyn ShmBridge>,
        telemetry: Arc<FailureTelemetry>,
    ) -> Self {
        Self {
            transport,
            shm,
            telemetry,
        }
    }

    pub fn telemetry(&self) -> &FailureTelemetry {
        &self.telemetry
    }

    /// Program `key` into slot `index`
    ///
    /// Only `key` is transported: in XTS mode both halves live in the key
    /// itself and `salt` is not part of the payload.
    pub fn set_key(
        &self,
        index: u32,
        key: &[u8],
        _salt: Option<&[u8]>,
        data_unit: u32,
        device: &IceDevice,
    ) -> Result<()> {
        let mut shm = ShmBuffer::allocate(&*self.shm, ICE_BUFFER_SIZE)?;

        if key.len() < ICE_BUFFER_SIZE {
            log::warn!(
                "ICE: {}-byte key zero-padded to {} bytes",
                key.len(),
                ICE_BUFFER_SIZE
            );
        }
        let payload = XtsKeyPayload::from_key(key);
        shm.write(payload.as_bytes())?;
        drop(payload);

        let mut desc = ScmDesc::new(ParamId::SET_ICE_KEY);
        desc.arg(u64::from(index))
            .arg(shm.phys_addr().as_u64())
            .arg(shm.size() as u64)
            .arg(IceCipherMode::Xts256 as u64)
            .arg(u64::from(data_unit))
            .arg(u64::from(device.instance().channel_id()));

        let status = self.transport.call(SmcId::SET_ICE_KEY, &desc);
        if let Err(err) = status {
            log::error!("ICE set_key: SCM call error {}", err);
        }

        self.telemetry
            .record(SmcId::SET_ICE_KEY, device.instance(), status)?;
        status.map_err(IceError::from_backend)
    }

    /// Invalidate slot `index`
    pub fn clear_key(&self, index: u32, device: &IceDevice) -> Result<()> {
        let mut desc = ScmDesc::new(ParamId::INVALIDATE_ICE_KEY);
        desc.arg(u64::from(index))
            .arg(u64::from(device.instance().channel_id()));

        let status = self.transport.call(SmcId::INVALIDATE_ICE_KEY, &desc);
        if let Err(err) = status {
            log::error!("ICE clear_key: SCM call error {}", err);
        }

        self.telemetry
            .record(SmcId::INVALIDATE_ICE_KEY, device.instance(), status)?;
        status.map_err(IceError::from_backend)
    }
}

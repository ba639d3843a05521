//! Secure Channel Manager (SCM) call encoding
//!
//! Builds the call ids and argument descriptors for the TrustZone
//! "ES" service calls that program and clear ICE keys. The transport
//! that actually traps into the secure world is platform-provided.

use core::fmt;

use crate::error::Errno;

/// Maximum number of arguments a parameter schema can describe
pub const MAX_SCM_ARGS: usize = 10;

/// TrustZone owner: silicon implementation
pub const TZ_OWNER_SIP: u32 = 2;
/// TrustZone service: encryption services
pub const TZ_SVC_ES: u32 = 16;

/// ES function: program an ICE key slot
pub const TZ_ES_CONFIG_SET_ICE_KEY_CE_TYPE: u32 = 0x5;
/// ES function: invalidate an ICE key slot
pub const TZ_ES_INVALIDATE_ICE_KEY_CE_TYPE: u32 = 0x6;

/// Secure monitor call id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct SmcId(u32);

impl SmcId {
    pub const SET_ICE_KEY: Self = Self::new(TZ_OWNER_SIP, TZ_SVC_ES, TZ_ES_CONFIG_SET_ICE_KEY_CE_TYPE);
    pub const INVALIDATE_ICE_KEY: Self =
        Self::new(TZ_OWNER_SIP, TZ_SVC_ES, TZ_ES_INVALIDATE_ICE_KEY_CE_TYPE);

    pub const fn new(owner: u32, service: u32, function: u32) -> Self {
        Self(((owner & 0x3f) << 24) | ((service & 0xff) << 8) | (function & 0xff))
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SmcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// How the secure world must interpret one argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ParamType {
    /// Plain value
    Val = 0x0,
    /// Physical address of a read-only buffer
    BufRo = 0x1,
    /// Physical address of a read/write buffer
    BufRw = 0x2,
}

/// Packed parameter schema (`arginfo`)
///
/// Bits 0..4 hold the argument count, then two bits per argument type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct ParamId(u32);

impl ParamId {
    /// Set key: index, buffer, buffer size, cipher mode, data unit, channel
    pub const SET_ICE_KEY: Self = Self::create(&[
        ParamType::Val,
        ParamType::BufRw,
        ParamType::Val,
        ParamType::Val,
        ParamType::Val,
        ParamType::Val,
    ]);

    /// Invalidate key: index, channel
    pub const INVALIDATE_ICE_KEY: Self = Self::create(&[ParamType::Val, ParamType::Val]);

    pub const fn create(types: &[ParamType]) -> Self {
        assert!(types.len() <= MAX_SCM_ARGS);
        let mut packed = (types.len() as u32) & 0xf;
        let mut i = 0;
        while i < types.len() {
            packed |= ((types[i] as u32) & 0x3) << (4 + 2 * i);
            i += 1;
        }
        Self(packed)
    }

    pub const fn nargs(self) -> usize {
        (self.0 & 0xf) as usize
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Cipher modes understood by the ICE key-config service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum IceCipherMode {
    Xts128 = 0,
    Cbc128 = 1,
    Xts256 = 3,
    Cbc256 = 4,
}

/// Argument descriptor handed to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScmDesc {
    arginfo: ParamId,
    args: [u64; MAX_SCM_ARGS],
    len: usize,
}

impl ScmDesc {
    pub fn new(arginfo: ParamId) -> Self {
        Self {
            arginfo,
            args: [0; MAX_SCM_ARGS],
            len: 0,
        }
    }

    /// Append the next argument
    ///
    /// # Panics
    ///
    /// Panics past the count declared by `arginfo` or past `MAX_SCM_ARGS`.
    pub fn arg(&mut self, value: u64) -> &mut Self {
        assert!(
            self.len < self.arginfo.nargs() && self.len < MAX_SCM_ARGS,
            "scm arg {} exceeds arginfo {:#x}",
            self.len,
            self.arginfo.raw()
        );
        self.args[self.len] = value;
        self.len += 1;
        self
    }

    pub fn arginfo(&self) -> ParamId {
        self.arginfo
    }

    /// Arguments filled so far
    pub fn args(&self) -> &[u64] {
        &self.args[..self.len]
    }

    /// Full register image, unused slots zeroed
    pub fn raw_args(&self) -> &[u64; MAX_SCM_ARGS] {
        &self.args
    }
}

/// Blocking call into the secure world (no retry on busy)
pub trait SecureCallTransport: Send + Sync {
    fn call(&self, smc_id: SmcId, desc: &ScmDesc) -> Result<(), Errno>;
}

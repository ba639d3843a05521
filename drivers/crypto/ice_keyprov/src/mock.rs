//! Plateforme simulée pour les tests : SCM, SHM bridge, horloges et HWKM.
//!
//! Chaque appel est consigné dans un journal ordonné d'événements ; les
//! statuts de retour sont injectables par type d'appel.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use spin::Mutex;

use crate::device::IceDevice;
use crate::error::Errno;
use crate::hwkm::HwKeyManager;
use crate::clock::IceClocks;
use crate::legacy::LegacyScmBackend;
use crate::provision::IceKeyManager;
use crate::scm::{ParamId, ScmDesc, SecureCallTransport, SmcId};
use crate::shm::{PhysAddr, ShmBridge, ShmRegion, VirtAddr};
use crate::telemetry::FailureTelemetry;

/// Base des adresses physiques simulées
const FAKE_PADDR_BASE: u64 = 0x8_0000_0000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    ClockEnable,
    ClockDisable,
    ShmAlloc,
    ShmFlush,
    ShmFree,
    ScmSet {
        index: u64,
        paddr: u64,
        size: u64,
        mode: u64,
        data_unit: u64,
        channel: u64,
    },
    ScmInvalidate {
        index: u64,
        channel: u64,
    },
    HwkmProgram {
        index: u32,
        key_len: usize,
        data_unit: u32,
    },
    HwkmInvalidate {
        index: u32,
    },
}

impl Event {
    /// Appel vers un backend de clés (SCM ou HWKM)
    pub fn is_backend_call(&self) -> bool {
        matches!(
            self,
            Event::ScmSet { .. }
                | Event::ScmInvalidate { .. }
                | Event::HwkmProgram { .. }
                | Event::HwkmInvalidate { .. }
        )
    }
}

pub struct MockPlatform {
    events: Mutex<Vec<Event>>,
    flushed: Mutex<Vec<Vec<u8>>>,
    freed: Mutex<Vec<Vec<u8>>>,
    last_arginfo: Mutex<Option<ParamId>>,
    last_paddr: Mutex<Option<u64>>,

    scm_set_status: Mutex<Result<(), Errno>>,
    scm_invalidate_status: Mutex<Result<(), Errno>>,
    hwkm_program_status: Mutex<Result<(), Errno>>,
    hwkm_invalidate_status: Mutex<Result<(), Errno>>,
    clock_enable_status: Mutex<Result<(), Errno>>,
    clock_disable_status: Mutex<Result<(), Errno>>,

    shm_alloc_fails: AtomicBool,
    next_frame: AtomicU64,
    live: AtomicUsize,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            flushed: Mutex::new(Vec::new()),
            freed: Mutex::new(Vec::new()),
            last_arginfo: Mutex::new(None),
            last_paddr: Mutex::new(None),
            scm_set_status: Mutex::new(Ok(())),
            scm_invalidate_status: Mutex::new(Ok(())),
            hwkm_program_status: Mutex::new(Ok(())),
            hwkm_invalidate_status: Mutex::new(Ok(())),
            clock_enable_status: Mutex::new(Ok(())),
            clock_disable_status: Mutex::new(Ok(())),
            shm_alloc_fails: AtomicBool::new(false),
            next_frame: AtomicU64::new(0),
            live: AtomicUsize::new(0),
        }
    }

    pub fn set_scm_set_status(&self, status: Result<(), Errno>) {
        *self.scm_set_status.lock() = status;
    }

    pub fn set_scm_invalidate_status(&self, status: Result<(), Errno>) {
        *self.scm_invalidate_status.lock() = status;
    }

    pub fn set_hwkm_program_status(&self, status: Result<(), Errno>) {
        *self.hwkm_program_status.lock() = status;
    }

    pub fn set_hwkm_invalidate_status(&self, status: Result<(), Errno>) {
        *self.hwkm_invalidate_status.lock() = status;
    }

    pub fn set_clock_enable_status(&self, status: Result<(), Errno>) {
        *self.clock_enable_status.lock() = status;
    }

    pub fn set_clock_disable_status(&self, status: Result<(), Errno>) {
        *self.clock_disable_status.lock() = status;
    }

    pub fn fail_shm_alloc(&self, fail: bool) {
        self.shm_alloc_fails.store(fail, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }

    /// Contenu du buffer SHM à chaque flush
    pub fn flushed_payloads(&self) -> Vec<Vec<u8>> {
        self.flushed.lock().clone()
    }

    /// Contenu du buffer SHM au moment de sa libération
    pub fn freed_payloads(&self) -> Vec<Vec<u8>> {
        self.freed.lock().clone()
    }

    pub fn live_regions(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn last_shm_paddr(&self) -> Option<u64> {
        *self.last_paddr.lock()
    }

    pub fn last_scm_arginfo(&self) -> Option<ParamId> {
        *self.last_arginfo.lock()
    }

    fn push(&self, event: Event) {
        self.events.lock().push(event);
    }

    fn region_bytes(region: &ShmRegion) -> Vec<u8> {
        // SAFETY: regions are boxed slices we handed out in allocate()
        unsafe { core::slice::from_raw_parts(region.vaddr.as_mut_ptr(), region.size) }.to_vec()
    }
}

impl SecureCallTransport for MockPlatform {
    fn call(&self, smc_id: SmcId, desc: &ScmDesc) -> Result<(), Errno> {
        *self.last_arginfo.lock() = Some(desc.arginfo());
        let args = desc.raw_args();

        if smc_id == SmcId::SET_ICE_KEY {
            self.push(Event::ScmSet {
                index: args[0],
                paddr: args[1],
                size: args[2],
                mode: args[3],
                data_unit: args[4],
                channel: args[5],
            });
            *self.scm_set_status.lock()
        } else if smc_id == SmcId::INVALIDATE_ICE_KEY {
            self.push(Event::ScmInvalidate {
                index: args[0],
                channel: args[1],
            });
            *self.scm_invalidate_status.lock()
        } else {
            Err(Errno::INVAL)
        }
    }
}

// SAFETY: every region is a leaked boxed slice owned by the caller until free().
unsafe impl ShmBridge for MockPlatform {
    fn allocate(&self, size: usize) -> Result<ShmRegion, Errno> {
        if self.shm_alloc_fails.load(Ordering::SeqCst) {
            return Err(Errno::NOMEM);
        }

        let buf: Box<[u8]> = vec![0u8; size].into_boxed_slice();
        let vaddr = Box::into_raw(buf) as *mut u8 as usize as u64;
        let frame = self.next_frame.fetch_add(1, Ordering::SeqCst);
        let paddr = FAKE_PADDR_BASE + frame * 0x1000;

        self.live.fetch_add(1, Ordering::SeqCst);
        *self.last_paddr.lock() = Some(paddr);
        self.push(Event::ShmAlloc);

        Ok(ShmRegion {
            vaddr: VirtAddr::new(vaddr),
            paddr: PhysAddr::new(paddr),
            size,
        })
    }

    fn free(&self, region: ShmRegion) {
        self.freed.lock().push(Self::region_bytes(&region));
        // SAFETY: reconstitutes the box leaked in allocate()
        drop(unsafe {
            Box::from_raw(core::ptr::slice_from_raw_parts_mut(
                region.vaddr.as_mut_ptr(),
                region.size,
            ))
        });
        self.live.fetch_sub(1, Ordering::SeqCst);
        self.push(Event::ShmFree);
    }

    fn flush_dcache(&self, region: &ShmRegion) {
        self.flushed.lock().push(Self::region_bytes(region));
        self.push(Event::ShmFlush);
    }
}

impl IceClocks for MockPlatform {
    fn enable(&self, _device: &IceDevice) -> Result<(), Errno> {
        self.push(Event::ClockEnable);
        *self.clock_enable_status.lock()
    }

    fn disable(&self, _device: &IceDevice) -> Result<(), Errno> {
        self.push(Event::ClockDisable);
        *self.clock_disable_status.lock()
    }
}

impl HwKeyManager for MockPlatform {
    fn program_key(
        &self,
        index: u32,
        key: &[u8],
        _device: &IceDevice,
        data_unit: u32,
    ) -> Result<(), Errno> {
        self.push(Event::HwkmProgram {
            index,
            key_len: key.len(),
            data_unit,
        });
        *self.hwkm_program_status.lock()
    }

    fn invalidate_key(&self, _device: &IceDevice, index: u32) -> Result<(), Errno> {
        self.push(Event::HwkmInvalidate { index });
        *self.hwkm_invalidate_status.lock()
    }
}

/// Gestionnaire complet branché sur la plateforme simulée
pub fn manager(platform: &Arc<MockPlatform>) -> (IceKeyManager, Arc<FailureTelemetry>) {
    let telemetry = Arc::new(FailureTelemetry::default());
    let legacy = LegacyScmBackend::new(platform.clone(), platform.clone(), telemetry.clone());
    (
        IceKeyManager::new(platform.clone(), platform.clone(), legacy),
        telemetry,
    )
}

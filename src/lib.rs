//! Bare-metal driver for the xHCI Debug Capability (DbC).
//!
//! The DbC is a debug transport some xHCI host controllers expose independently of the normal USB
//! stack: a register block tucked into the controller's extended capabilities, two fixed bulk
//! endpoints (host-to-target and target-to-host), and an event ring. Platform code (firmware, a
//! hypervisor) can bring the link up without any OS-level USB driver by programming a handful of
//! DMA-visible structures and flipping one enable bit.
//!
//! This crate owns the controller lifecycle and protocol logic:
//! - [`Dbc::init`] builds every structure the hardware reads (TRB rings, event ring segment
//!   table, device context, string descriptors) and programs the register block in the order the
//!   xHCI specification mandates (section 7.6.4.1). The enable bit is written strictly last; the
//!   controller may act on everything else the instant it is set.
//! - [`Dbc::state`] decodes the control/port registers into a [`regs::DbcState`].
//! - [`Dbc::event`] polls for a pending event TRB on the event ring.
//!
//! The driver is single-threaded and polling-only: every operation is a bounded, non-blocking
//! register access. Nothing here waits on hardware. Callers that need multi-threaded access must
//! serialize it externally; the register decode in [`Dbc::state`] is not atomic across its reads.
//!
//! Platform services (hardware discovery, virtual-to-physical translation) come in through the
//! [`DbcSystem`] trait, so the whole driver runs against a fake register block in tests.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod context;
pub mod dbc;
pub mod erst;
pub mod regs;
pub mod ring;
pub mod strings;
pub mod trb;


pub use dbc::{Dbc, DbcConfig};
pub use regs::{DbcRegisterBlock, DbcState};

use alloc::boxed::Box;
use core::fmt;
use core::ops::{Deref, DerefMut};

/// Size of one TRB ring page. Ring storage is allocated and described to hardware in these units.
pub const PAGE_SIZE: usize = 4096;

/// Platform services the driver needs from its host environment.
///
/// On real hardware `find_dbc` walks the xHCI extended capability list for the Debug Capability
/// register block and `virt_to_phys` consults the page tables; in tests both are trivial fakes.
pub trait DbcSystem {
    /// The register block type this platform hands out (MMIO-backed on real hardware).
    type Regs: DbcRegisterBlock;

    /// Locate the DbC register block, if the controller has one.
    fn find_dbc(&mut self) -> Option<Self::Regs>;

    /// Translate a virtual address inside driver-owned memory to the physical address hardware
    /// must be given. Returns `None` if the address has no physical mapping.
    fn virt_to_phys(&self, virt: usize) -> Option<u64>;
}

/// An owned, DMA-visible buffer with its physical base address recorded at construction.
///
/// Alignment comes from `T`'s `#[repr(align)]`, which `Box` honors. The platform allocator must
/// back `Box` allocations with physically contiguous memory for any `T` handed to hardware; a
/// single base address describes the whole buffer to the controller.
pub struct DmaBox<T: ?Sized> {
    inner: Box<T>,
    phys: u64,
}

impl<T: ?Sized> DmaBox<T> {
    /// Wrap `inner`, recording its physical base address.
    pub fn new(sys: &impl DbcSystem, inner: Box<T>) -> Result<Self, InitError> {
        let virt = (&*inner as *const T).cast::<u8>() as usize;
        let phys = sys
            .virt_to_phys(virt)
            .ok_or(InitError::AddressTranslation)?;
        Ok(Self { inner, phys })
    }

    /// Physical base address of the buffer.
    pub fn phys(&self) -> u64 {
        self.phys
    }

    /// Physical address of a byte at `offset` from the buffer base.
    ///
    /// Valid because the backing memory is physically contiguous (see the type docs).
    pub fn phys_at(&self, offset: usize) -> u64 {
        self.phys + offset as u64
    }
}

impl<T: ?Sized> Deref for DmaBox<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T: ?Sized> DerefMut for DmaBox<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

/// Why [`Dbc::init`] refused to bring the controller up.
///
/// Every variant is fatal to initialization and leaves hardware untouched past the point of
/// failure; in particular the enable bit is never set on any error path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitError {
    /// The controller has no Debug Capability register block.
    HardwareNotFound,
    /// The requested event ring segment count exceeds what the hardware advertises (`ERSTMAX`)
    /// or what this driver supports.
    CapabilityMismatch { requested: u16, supported: u32 },
    /// A required buffer has no physical address.
    AddressTranslation,
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitError::HardwareNotFound => write!(f, "no DbC register block found"),
            InitError::CapabilityMismatch {
                requested,
                supported,
            } => write!(
                f,
                "requested {requested} event ring segments, hardware supports {supported}"
            ),
            InitError::AddressTranslation => write!(f, "buffer has no physical address"),
        }
    }
}

impl core::error::Error for InitError {}

//! DbC register block: layout, field decoding, and the link state machine.
//!
//! The Debug Capability register block (xHCI section 7.6.8) is a fixed 0x40-byte layout inside
//! the controller's extended capability space. All of it is live hardware state: reads may
//! reflect asynchronous link changes, and the controller may act on a write before the store
//! returns. The MMIO implementation therefore goes through `volatile` accessors so the compiler
//! can neither elide nor reorder the accesses.
//!
//! [`DbcRegisterBlock`] is the seam between the driver core and the hardware: raw register
//! reads/writes plus named decoders for every bit/field the driver consults. Tests implement it
//! with a plain in-memory fake.

use core::fmt;
use core::ptr::NonNull;

use volatile::{ReadOnly, Volatile};

/// DCID bits 20:16: ERST Max. The hardware supports `2^ERSTMAX` event ring segments.
pub const ID_ERSTMAX_MASK: u32 = 0x1F_0000;
pub const ID_ERSTMAX_SHIFT: u32 = 16;

/// DCCTRL bit 0: DbC Run. Set by hardware once the debug host has configured the device; the
/// strongest state the decoder reports.
pub const CTRL_DCR: u32 = 1 << 0;
/// DCCTRL bits 23:16: Max Burst Size supported by the controller (read-only).
pub const CTRL_MBS_MASK: u32 = 0xFF_0000;
pub const CTRL_MBS_SHIFT: u32 = 16;
/// DCCTRL bit 31: Debug Capability Enable.
pub const CTRL_DCE: u32 = 1 << 31;

/// DCST bit 0: Event Ring Not Empty.
pub const ST_ERNE: u32 = 1 << 0;

/// DCPORTSC bit 0: Current Connect Status.
pub const PORTSC_CCS: u32 = 1 << 0;
/// DCPORTSC bit 1: Port Enabled/Disabled.
pub const PORTSC_PED: u32 = 1 << 1;
/// DCPORTSC bit 4: Port Reset.
pub const PORTSC_PR: u32 = 1 << 4;
/// DCPORTSC bits 8:5: Port Link State.
pub const PORTSC_PLS_MASK: u32 = 0xF << 5;
pub const PORTSC_PLS_SHIFT: u32 = 5;

/// PLS encoding: link disabled.
pub const PLS_DISABLED: u32 = 4;
/// PLS encoding: link inactive (error state).
pub const PLS_INACTIVE: u32 = 6;

/// Raw register access plus named field decoders for the DbC register block.
///
/// The provided methods are the only place register bit arithmetic lives; the driver core reads
/// as a sequence of named predicates.
pub trait DbcRegisterBlock {
    /// Debug Capability ID register (DCID).
    fn id(&self) -> u32;
    /// Doorbell register (DCDB).
    fn db(&self) -> u32;
    fn set_db(&mut self, value: u32);
    /// Event Ring Segment Table Size register (DCERSTSZ).
    fn erstsz(&self) -> u32;
    fn set_erstsz(&mut self, value: u32);
    /// Event Ring Segment Table Base Address register (DCERSTBA).
    fn erstba(&self) -> u64;
    fn set_erstba(&mut self, value: u64);
    /// Event Ring Dequeue Pointer register (DCERDP).
    fn erdp(&self) -> u64;
    fn set_erdp(&mut self, value: u64);
    /// Control register (DCCTRL).
    fn ctrl(&self) -> u32;
    fn set_ctrl(&mut self, value: u32);
    /// Status register (DCST, read-only).
    fn st(&self) -> u32;
    /// Port Status and Control register (DCPORTSC).
    fn portsc(&self) -> u32;
    fn set_portsc(&mut self, value: u32);
    /// Debug Capability Context Pointer register (DCCP).
    fn cp(&self) -> u64;
    fn set_cp(&mut self, value: u64);
    /// Device Descriptor Info register 1 (DCDDI1, read-only).
    fn ddi1(&self) -> u32;
    /// Device Descriptor Info register 2 (DCDDI2, read-only).
    fn ddi2(&self) -> u32;

    /// `ERSTMAX`: the hardware supports `2^erst_max()` event ring segments.
    fn erst_max(&self) -> u32 {
        (self.id() & ID_ERSTMAX_MASK) >> ID_ERSTMAX_SHIFT
    }

    /// Max Burst Size the controller supports on the bulk endpoints.
    fn max_burst_size(&self) -> u32 {
        (self.ctrl() & CTRL_MBS_MASK) >> CTRL_MBS_SHIFT
    }

    /// DCE: whether the Debug Capability is enabled.
    fn dbc_enabled(&self) -> bool {
        self.ctrl() & CTRL_DCE != 0
    }

    fn set_dbc_enable(&mut self, enable: bool) {
        let ctrl = self.ctrl();
        if enable {
            self.set_ctrl(ctrl | CTRL_DCE);
        } else {
            self.set_ctrl(ctrl & !CTRL_DCE);
        }
    }

    /// DCR: whether the debug host has configured the device.
    fn dbc_running(&self) -> bool {
        self.ctrl() & CTRL_DCR != 0
    }

    /// ERNE: whether the event ring holds at least one unconsumed event TRB.
    fn event_ring_not_empty(&self) -> bool {
        self.st() & ST_ERNE != 0
    }

    /// CCS: whether a debug host is connected to the port.
    fn connected(&self) -> bool {
        self.portsc() & PORTSC_CCS != 0
    }

    /// PR: whether the port is mid-reset.
    fn port_in_reset(&self) -> bool {
        self.portsc() & PORTSC_PR != 0
    }

    /// PED: whether the port is enabled.
    fn port_enabled(&self) -> bool {
        self.portsc() & PORTSC_PED != 0
    }

    /// PLS: the 4-bit port link state field.
    fn port_link_state(&self) -> u32 {
        (self.portsc() & PORTSC_PLS_MASK) >> PORTSC_PLS_SHIFT
    }
}

/// The DbC register block as laid out in MMIO space (xHCI section 7.6.8, offsets 0x00..0x40).
#[repr(C)]
pub struct DbcRegisterLayout {
    id: ReadOnly<u32>,
    db: Volatile<u32>,
    erstsz: Volatile<u32>,
    _rsvd0: ReadOnly<u32>,
    erstba: Volatile<u64>,
    erdp: Volatile<u64>,
    ctrl: Volatile<u32>,
    st: ReadOnly<u32>,
    portsc: Volatile<u32>,
    _rsvd1: ReadOnly<u32>,
    cp: Volatile<u64>,
    ddi1: ReadOnly<u32>,
    ddi2: ReadOnly<u32>,
}

/// [`DbcRegisterBlock`] over a mapped hardware register block.
pub struct MmioRegisterBlock {
    regs: NonNull<DbcRegisterLayout>,
}

impl MmioRegisterBlock {
    /// Wrap a mapped DbC register block.
    ///
    /// # Safety
    ///
    /// `regs` must point at the Debug Capability register block of an xHCI controller, mapped
    /// uncached and valid for reads and writes for the lifetime of the returned value, and no
    /// other code may access the block while this value exists.
    pub unsafe fn new(regs: NonNull<DbcRegisterLayout>) -> Self {
        Self { regs }
    }

    fn layout(&self) -> &DbcRegisterLayout {
        // Safety: validity and exclusivity guaranteed by the `new` contract.
        unsafe { self.regs.as_ref() }
    }

    fn layout_mut(&mut self) -> &mut DbcRegisterLayout {
        // Safety: validity and exclusivity guaranteed by the `new` contract.
        unsafe { self.regs.as_mut() }
    }
}

impl DbcRegisterBlock for MmioRegisterBlock {
    fn id(&self) -> u32 {
        self.layout().id.read()
    }

    fn db(&self) -> u32 {
        self.layout().db.read()
    }

    fn set_db(&mut self, value: u32) {
        self.layout_mut().db.write(value);
    }

    fn erstsz(&self) -> u32 {
        self.layout().erstsz.read()
    }

    fn set_erstsz(&mut self, value: u32) {
        self.layout_mut().erstsz.write(value);
    }

    fn erstba(&self) -> u64 {
        self.layout().erstba.read()
    }

    fn set_erstba(&mut self, value: u64) {
        self.layout_mut().erstba.write(value);
    }

    fn erdp(&self) -> u64 {
        self.layout().erdp.read()
    }

    fn set_erdp(&mut self, value: u64) {
        self.layout_mut().erdp.write(value);
    }

    fn ctrl(&self) -> u32 {
        self.layout().ctrl.read()
    }

    fn set_ctrl(&mut self, value: u32) {
        self.layout_mut().ctrl.write(value);
    }

    fn st(&self) -> u32 {
        self.layout().st.read()
    }

    fn portsc(&self) -> u32 {
        self.layout().portsc.read()
    }

    fn set_portsc(&mut self, value: u32) {
        self.layout_mut().portsc.write(value);
    }

    fn cp(&self) -> u64 {
        self.layout().cp.read()
    }

    fn set_cp(&mut self, value: u64) {
        self.layout_mut().cp.write(value);
    }

    fn ddi1(&self) -> u32 {
        self.layout().ddi1.read()
    }

    fn ddi2(&self) -> u32 {
        self.layout().ddi2.read()
    }
}

/// Controller/link state reported by [`decode_state`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DbcState {
    /// The capability is not enabled.
    Off,
    /// Enabled, but no debug host is connected.
    Disconnected,
    /// The port is mid-reset.
    Resetting,
    /// The port link is in the disabled state.
    Disabled,
    /// Connected and link up (or in transition), not yet configured.
    Enabled,
    /// The debug host has configured the device; the transport is live.
    Configured,
    /// The port link is in the inactive (error) state.
    Error,
}

impl fmt::Display for DbcState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DbcState::Off => "off",
            DbcState::Disconnected => "disconnected",
            DbcState::Resetting => "resetting",
            DbcState::Disabled => "disabled",
            DbcState::Enabled => "enabled",
            DbcState::Configured => "configured",
            DbcState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Decode the controller/link state from raw DCCTRL and DCPORTSC values.
///
/// The precedence is part of the contract, not just the individual bit meanings: a configured
/// controller reports [`DbcState::Configured`] no matter what the port bits say, and a disabled
/// controller reports [`DbcState::Off`] no matter what the link is doing.
pub fn decode_state(ctrl: u32, portsc: u32) -> DbcState {
    if ctrl & CTRL_DCR != 0 {
        return DbcState::Configured;
    }
    if ctrl & CTRL_DCE == 0 {
        return DbcState::Off;
    }
    if portsc & PORTSC_CCS == 0 {
        return DbcState::Disconnected;
    }
    if portsc & PORTSC_PR != 0 {
        return DbcState::Resetting;
    }

    let pls = (portsc & PORTSC_PLS_MASK) >> PORTSC_PLS_SHIFT;
    if portsc & PORTSC_PED != 0 {
        if pls == PLS_INACTIVE {
            DbcState::Error
        } else {
            DbcState::Enabled
        }
    } else if pls == PLS_DISABLED {
        DbcState::Disabled
    } else {
        DbcState::Enabled
    }
}

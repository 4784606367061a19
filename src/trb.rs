//! Transfer Request Blocks.
//!
//! A TRB is a fixed 16-byte record: a 64-bit parameter, a 32-bit status word, and a 32-bit
//! control word whose bits 15:10 carry the type tag that decides how the rest is interpreted.
//! The DbC traffics in four of them (Normal and Link TRBs on the bulk rings, Transfer Event and
//! Port Status Change Event TRBs on the event ring). Everything else degrades to
//! [`TrbType::Unknown`]; an unrecognized tag is reported, never an error.

use core::fmt;

/// Size of one TRB in bytes.
pub const TRB_LEN: usize = 16;

const CONTROL_CYCLE: u32 = 1 << 0;
const CONTROL_TYPE_SHIFT: u32 = 10;
const CONTROL_TYPE_MASK: u32 = 0x3F << CONTROL_TYPE_SHIFT;

/// Link TRB control bit 1: Toggle Cycle.
const LINK_TOGGLE_CYCLE: u32 = 1 << 1;

/// TRB type tags used by the DbC, plus a fallback for everything else.
///
/// The tag space is open-ended; new hardware may produce values this driver has never seen.
/// Dispatch is a closed `match` over this enum so adding a variant is a compile-checked change,
/// and unknown tags carry their raw value through [`TrbType::Unknown`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrbType {
    Normal,
    Link,
    TransferEvent,
    PortStatusChangeEvent,
    Unknown(u8),
}

impl TrbType {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            1 => TrbType::Normal,
            6 => TrbType::Link,
            32 => TrbType::TransferEvent,
            34 => TrbType::PortStatusChangeEvent,
            other => TrbType::Unknown(other),
        }
    }

    pub fn raw(&self) -> u8 {
        match self {
            TrbType::Normal => 1,
            TrbType::Link => 6,
            TrbType::TransferEvent => 32,
            TrbType::PortStatusChangeEvent => 34,
            TrbType::Unknown(raw) => *raw,
        }
    }
}

/// One 16-byte TRB slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(C, align(16))]
pub struct Trb {
    pub parameter: u64,
    pub status: u32,
    pub control: u32,
}

impl Trb {
    pub const fn zeroed() -> Self {
        Self {
            parameter: 0,
            status: 0,
            control: 0,
        }
    }

    pub fn new(parameter: u64, status: u32, control: u32) -> Self {
        Self {
            parameter,
            status,
            control,
        }
    }

    pub fn from_bytes(bytes: [u8; TRB_LEN]) -> Self {
        Self {
            parameter: u64::from_le_bytes(bytes[0..8].try_into().unwrap()),
            status: u32::from_le_bytes(bytes[8..12].try_into().unwrap()),
            control: u32::from_le_bytes(bytes[12..16].try_into().unwrap()),
        }
    }

    pub fn to_bytes(&self) -> [u8; TRB_LEN] {
        let mut out = [0u8; TRB_LEN];
        out[0..8].copy_from_slice(&self.parameter.to_le_bytes());
        out[8..12].copy_from_slice(&self.status.to_le_bytes());
        out[12..16].copy_from_slice(&self.control.to_le_bytes());
        out
    }

    pub fn cycle(&self) -> bool {
        self.control & CONTROL_CYCLE != 0
    }

    pub fn set_cycle(&mut self, cycle: bool) {
        if cycle {
            self.control |= CONTROL_CYCLE;
        } else {
            self.control &= !CONTROL_CYCLE;
        }
    }

    pub fn trb_type_raw(&self) -> u8 {
        ((self.control & CONTROL_TYPE_MASK) >> CONTROL_TYPE_SHIFT) as u8
    }

    pub fn trb_type(&self) -> TrbType {
        TrbType::from_raw(self.trb_type_raw())
    }

    pub fn set_trb_type(&mut self, ty: TrbType) {
        self.set_trb_type_raw(ty.raw());
    }

    pub fn set_trb_type_raw(&mut self, raw: u8) {
        self.control = (self.control & !CONTROL_TYPE_MASK)
            | (((raw as u32) << CONTROL_TYPE_SHIFT) & CONTROL_TYPE_MASK);
    }

    // Normal TRB fields.

    /// Data buffer physical address of a Normal TRB.
    pub fn data_buffer(&self) -> u64 {
        self.parameter
    }

    /// Transfer length (status bits 16:0) of a Normal TRB.
    pub fn transfer_length(&self) -> u32 {
        self.status & 0x1_FFFF
    }

    // Link TRB fields.

    /// Ring segment pointer of a Link TRB (low 4 bits are reserved).
    pub fn link_target(&self) -> u64 {
        self.parameter & !0x0F
    }

    pub fn link_toggle_cycle(&self) -> bool {
        self.control & LINK_TOGGLE_CYCLE != 0
    }

    pub fn set_link_toggle_cycle(&mut self, toggle: bool) {
        if toggle {
            self.control |= LINK_TOGGLE_CYCLE;
        } else {
            self.control &= !LINK_TOGGLE_CYCLE;
        }
    }

    // Event TRB fields.

    /// Completion code (status bits 31:24) of an event TRB.
    pub fn completion_code(&self) -> u8 {
        (self.status >> 24) as u8
    }

    /// TRB pointer of a Transfer Event TRB: the physical address of the transfer TRB that
    /// completed.
    pub fn event_trb_pointer(&self) -> u64 {
        self.parameter
    }

    /// Transferred byte count (status bits 23:0) of a Transfer Event TRB.
    pub fn event_transfer_length(&self) -> u32 {
        self.status & 0xFF_FFFF
    }

    /// Endpoint ID (control bits 20:16) of a Transfer Event TRB.
    pub fn endpoint_id(&self) -> u8 {
        ((self.control >> 16) & 0x1F) as u8
    }

    /// Port ID (parameter bits 31:24) of a Port Status Change Event TRB.
    pub fn port_id(&self) -> u8 {
        ((self.parameter >> 24) & 0xFF) as u8
    }
}

/// Human-readable TRB dump, dispatched on the type tag.
///
/// Diagnostic output only; not a stable machine interface.
impl fmt::Display for Trb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.trb_type() {
            TrbType::Normal => write!(
                f,
                "normal TRB: buf=0x{:x} len={} cycle={}",
                self.data_buffer(),
                self.transfer_length(),
                self.cycle() as u32
            ),
            TrbType::Link => write!(
                f,
                "link TRB: target=0x{:x} tc={} cycle={}",
                self.link_target(),
                self.link_toggle_cycle() as u32,
                self.cycle() as u32
            ),
            TrbType::TransferEvent => write!(
                f,
                "transfer event TRB: trb=0x{:x} cc={} len={} ep={}",
                self.event_trb_pointer(),
                self.completion_code(),
                self.event_transfer_length(),
                self.endpoint_id()
            ),
            TrbType::PortStatusChangeEvent => write!(
                f,
                "port status change event TRB: port={} cc={}",
                self.port_id(),
                self.completion_code()
            ),
            TrbType::Unknown(raw) => write!(f, "unknown TRB type: {raw}"),
        }
    }
}

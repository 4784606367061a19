//! DbC device context structures.
//!
//! The Debug Capability Context (xHCI section 7.6.9.1) is three consecutive 64-byte contexts:
//! the info context (string descriptor addresses and lengths), the bulk OUT endpoint context,
//! and the bulk IN endpoint context. The driver fills it once during initialization, points
//! DCCP at it, and treats it as hardware-owned from then on.

/// Dwords per context. The DbC always uses 64-byte contexts, independent of `HCCPARAMS1.CSZ`.
pub const CONTEXT_DWORDS: usize = 16;

/// Endpoint type field encodings (endpoint context dword 1, bits 5:3).
const EP_TYPE_BULK_OUT: u32 = 2;
const EP_TYPE_BULK_IN: u32 = 6;

/// The DbC's bulk endpoints always use a 1024-byte max packet size (SuperSpeed bulk).
const MAX_PACKET_SIZE: u32 = 1024;

/// Average TRB length hint for the controller's bandwidth bookkeeping.
const AVG_TRB_LENGTH: u32 = 1024;

/// Dequeue Cycle State bit of the TR Dequeue Pointer field.
const TR_DEQUEUE_DCS: u64 = 1;

/// Transfer direction of a bulk endpoint, from the debug target's point of view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EpDirection {
    /// Host-to-target.
    Out,
    /// Target-to-host.
    In,
}

/// One 64-byte endpoint context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(C)]
pub struct EndpointContext {
    dwords: [u32; CONTEXT_DWORDS],
}

impl EndpointContext {
    pub const fn zeroed() -> Self {
        Self {
            dwords: [0; CONTEXT_DWORDS],
        }
    }

    /// Program a bulk endpoint: type, max packet size, burst size, and the transfer ring base
    /// (with DCS set; the ring producer starts with cycle state 1).
    pub fn init_bulk(&mut self, direction: EpDirection, max_burst: u32, ring_base: u64) {
        let ep_type = match direction {
            EpDirection::Out => EP_TYPE_BULK_OUT,
            EpDirection::In => EP_TYPE_BULK_IN,
        };
        let deq = (ring_base & !0x0F) | TR_DEQUEUE_DCS;

        self.dwords[1] = (MAX_PACKET_SIZE << 16) | ((max_burst & 0xFF) << 8) | (ep_type << 3);
        self.dwords[2] = deq as u32;
        self.dwords[3] = (deq >> 32) as u32;
        self.dwords[4] = AVG_TRB_LENGTH;
    }

    pub fn endpoint_type(&self) -> u32 {
        (self.dwords[1] >> 3) & 0x7
    }

    pub fn max_burst_size(&self) -> u32 {
        (self.dwords[1] >> 8) & 0xFF
    }

    pub fn max_packet_size(&self) -> u32 {
        self.dwords[1] >> 16
    }

    /// TR Dequeue Pointer with the DCS bit masked off.
    pub fn tr_dequeue_pointer(&self) -> u64 {
        let raw = (self.dwords[2] as u64) | ((self.dwords[3] as u64) << 32);
        raw & !0x0F
    }

    pub fn dequeue_cycle_state(&self) -> bool {
        self.dwords[2] & TR_DEQUEUE_DCS as u32 != 0
    }
}

/// The DbC Info Context: physical addresses and lengths of the string descriptors the debug
/// host reads during enumeration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(C)]
pub struct InfoContext {
    dwords: [u32; CONTEXT_DWORDS],
}

impl InfoContext {
    pub const fn zeroed() -> Self {
        Self {
            dwords: [0; CONTEXT_DWORDS],
        }
    }

    /// Fill the descriptor address fields (dwords 0-5) and the packed length word (dword 8:
    /// product length in bits 23:16, manufacturer in 15:8, string 0 in 7:0).
    pub fn init(
        &mut self,
        string0: (u64, u8),
        manufacturer: (u64, u8),
        product: (u64, u8),
    ) {
        self.set_addr(0, string0.0);
        self.set_addr(2, manufacturer.0);
        self.set_addr(4, product.0);
        self.dwords[8] = ((product.1 as u32) << 16)
            | ((manufacturer.1 as u32) << 8)
            | string0.1 as u32;
    }

    fn set_addr(&mut self, dword: usize, addr: u64) {
        self.dwords[dword] = addr as u32;
        self.dwords[dword + 1] = (addr >> 32) as u32;
    }

    fn addr(&self, dword: usize) -> u64 {
        (self.dwords[dword] as u64) | ((self.dwords[dword + 1] as u64) << 32)
    }

    pub fn string0_address(&self) -> u64 {
        self.addr(0)
    }

    pub fn manufacturer_address(&self) -> u64 {
        self.addr(2)
    }

    pub fn product_address(&self) -> u64 {
        self.addr(4)
    }

    /// `(string0, manufacturer, product)` descriptor lengths from the packed length word.
    pub fn descriptor_lengths(&self) -> (u8, u8, u8) {
        let packed = self.dwords[8];
        (packed as u8, (packed >> 8) as u8, (packed >> 16) as u8)
    }
}

/// The full Debug Capability Context pointed at by DCCP.
#[derive(Clone, Copy)]
#[repr(C, align(64))]
pub struct DbcContext {
    pub info: InfoContext,
    pub ep_out: EndpointContext,
    pub ep_in: EndpointContext,
}

impl DbcContext {
    pub const fn zeroed() -> Self {
        Self {
            info: InfoContext::zeroed(),
            ep_out: EndpointContext::zeroed(),
            ep_in: EndpointContext::zeroed(),
        }
    }
}

const _: () = assert!(core::mem::size_of::<DbcContext>() == 192);

//! DbC controller lifecycle and protocol logic.
//!
//! [`Dbc::init`] is the only place hardware gets configured, and the order of its steps is a
//! hard invariant (xHCI section 7.6.4.1): every DMA structure the controller reads must be fully
//! built and its address programmed before the enable bit is set, because the controller may
//! begin acting on all of it the instant DCE goes high. Past initialization the driver is a
//! passive poller: it samples register state once per call and never waits on hardware.

use log::{debug, info};

use crate::context::{DbcContext, EpDirection};
use crate::erst::{ErstEntry, ErstTable, MAX_ERST_SEGMENTS};
use crate::regs::{decode_state, DbcRegisterBlock, DbcState};
use crate::ring::{TrbRing, TRBS_PER_PAGE};
use crate::strings::StringDescriptors;
use crate::trb::Trb;
use crate::{DbcSystem, DmaBox, InitError};

/// Driver configuration. The defaults match the smallest useful setup: a one-page event ring
/// described by a single ERST segment.
#[derive(Clone, Copy, Debug)]
pub struct DbcConfig {
    /// Event ring segments to allocate and describe to hardware, one page (256 TRBs) each.
    /// Bounded by the hardware's `ERSTMAX` and by [`MAX_ERST_SEGMENTS`].
    pub segments: u16,
}

impl Default for DbcConfig {
    fn default() -> Self {
        Self { segments: 1 }
    }
}

/// An initialized Debug Capability controller.
///
/// Owns the register block handle and every DMA structure hardware was pointed at: the three TRB
/// rings (event, bulk OUT, bulk IN), the event ring segment table, the device context, and the
/// string descriptors. There is no global state; constructing a second driver instance is just a
/// second call to [`Dbc::init`] with its own platform handle.
pub struct Dbc<S: DbcSystem> {
    pub(crate) sys: S,
    pub(crate) regs: S::Regs,
    /// Event ring: hardware produces, driver consumes.
    pub(crate) ering: TrbRing,
    /// Bulk OUT transfer ring (host-to-target).
    pub(crate) oring: TrbRing,
    /// Bulk IN transfer ring (target-to-host).
    pub(crate) iring: TrbRing,
    pub(crate) erst: DmaBox<ErstTable>,
    pub(crate) ctx: DmaBox<DbcContext>,
    pub(crate) strings: DmaBox<StringDescriptors>,
}

impl<S: DbcSystem> core::fmt::Debug for Dbc<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Dbc").finish_non_exhaustive()
    }
}

impl<S: DbcSystem> Dbc<S> {
    /// Bring the Debug Capability up with the default configuration.
    pub fn init(sys: S) -> Result<Self, InitError> {
        Self::init_with_config(sys, DbcConfig::default())
    }

    /// Bring the Debug Capability up.
    ///
    /// On any error the controller is left untouched past the point of failure; in particular
    /// DCE is never set. The step order below is load-bearing; see the module docs.
    pub fn init_with_config(mut sys: S, config: DbcConfig) -> Result<Self, InitError> {
        let regs = sys.find_dbc().ok_or(InitError::HardwareNotFound)?;

        let supported = (1u32 << regs.erst_max().min(31)).min(MAX_ERST_SEGMENTS as u32);
        if config.segments == 0 || u32::from(config.segments) > supported {
            return Err(InitError::CapabilityMismatch {
                requested: config.segments,
                supported,
            });
        }
        let segments = usize::from(config.segments);
        debug!("DbC found, erstmax={}, using {segments} segment(s)", regs.erst_max());

        // TRB rings. The event ring spans one page per ERST segment; the transfer rings are one
        // page each.
        let ering = TrbRing::consumer(&sys, segments)?;
        let oring = TrbRing::producer(&sys, 1)?;
        let iring = TrbRing::producer(&sys, 1)?;

        // Event ring segment table: entry i describes page i of the event ring storage.
        let mut erst = ErstTable::zeroed();
        for seg in 0..segments {
            erst.set_entry(
                seg,
                ErstEntry::new(ering.page_phys(seg), TRBS_PER_PAGE as u32),
            );
        }
        let erst = DmaBox::new(&sys, alloc::boxed::Box::new(erst))?;

        // String descriptors, then the device context that points at them.
        let strings = DmaBox::new(&sys, alloc::boxed::Box::new(StringDescriptors::new()))?;

        let mut ctx = DbcContext::zeroed();
        let max_burst = regs.max_burst_size();
        ctx.ep_out
            .init_bulk(EpDirection::Out, max_burst, oring.base_phys());
        ctx.ep_in
            .init_bulk(EpDirection::In, max_burst, iring.base_phys());
        ctx.info.init(
            (
                strings.phys_at(StringDescriptors::string0_offset()),
                strings.string0.len() as u8,
            ),
            (
                strings.phys_at(StringDescriptors::manufacturer_offset()),
                strings.manufacturer.len() as u8,
            ),
            (
                strings.phys_at(StringDescriptors::product_offset()),
                strings.product.len() as u8,
            ),
        );
        let ctx = DmaBox::new(&sys, alloc::boxed::Box::new(ctx))?;

        let mut dbc = Self {
            sys,
            regs,
            ering,
            oring,
            iring,
            erst,
            ctx,
            strings,
        };

        // Hardware registers, in this order, with the enable bit strictly last: the controller
        // may read any of these structures as soon as DCE is set.
        dbc.regs.set_erstsz(config.segments as u32);
        dbc.regs.set_erstba(dbc.erst.phys());
        dbc.regs.set_erdp(dbc.ering.base_phys());
        dbc.regs.set_cp(dbc.ctx.phys());

        dbc.enable();
        debug!("DbC enabled, ctx=0x{:x}", dbc.ctx.phys());
        Ok(dbc)
    }

    /// Set DCE. Idempotent.
    pub fn enable(&mut self) {
        self.regs.set_dbc_enable(true);
    }

    /// Clear DCE. Idempotent.
    pub fn disable(&mut self) {
        self.regs.set_dbc_enable(false);
    }

    /// Whether DCE is currently set.
    pub fn is_enabled(&self) -> bool {
        self.regs.dbc_enabled()
    }

    /// Decode the current controller/link state from the control and port registers.
    ///
    /// The two register reads are not atomic as a pair; callers needing a consistent
    /// multi-threaded view must serialize access externally.
    pub fn state(&self) -> DbcState {
        decode_state(self.regs.ctrl(), self.regs.portsc())
    }

    /// The oldest unconsumed event TRB, if the controller reports the event ring not-empty.
    ///
    /// The returned TRB is a borrowed view into the ring; the dequeue cursor is not advanced and
    /// ERNE is not acknowledged here.
    pub fn event(&self) -> Option<&Trb> {
        if self.regs.event_ring_not_empty() {
            Some(self.ering.dequeue_slot())
        } else {
            None
        }
    }

    /// Diagnostic stub for the transmit path.
    ///
    /// Inspects (logs) the currently pending event TRB, if any. `data` is **not** transmitted or
    /// enqueued on the bulk IN ring; the byte-stream layer above the raw rings is not wired up
    /// yet. [`TrbRing::enqueue`] on the bulk IN ring is where a real transmit path starts.
    pub fn write(&mut self, data: &[u8]) {
        let _ = data;
        if let Some(trb) = self.event() {
            debug!("pending event: {trb}");
        }
    }

    /// Borrow the platform handle the driver was constructed with.
    pub fn system(&self) -> &S {
        &self.sys
    }

    /// Borrow the register block, e.g. for platform-specific diagnostics.
    pub fn regs(&self) -> &S::Regs {
        &self.regs
    }

    /// Mutably borrow the register block. Escape hatch for platform code that needs register
    /// access the driver does not wrap; misprogramming the block can wedge the transport.
    pub fn regs_mut(&mut self) -> &mut S::Regs {
        &mut self.regs
    }

    /// Log every register of the DbC block.
    pub fn dump_regs(&self) {
        info!("DbC registers:");
        info!("    - id: 0x{:x}", self.regs.id());
        info!("    - db: 0x{:x}", self.regs.db());
        info!("    - erstsz: 0x{:x}", self.regs.erstsz());
        info!("    - erstba: 0x{:x}", self.regs.erstba());
        info!("    - erdp: 0x{:x}", self.regs.erdp());
        info!("    - ctrl: 0x{:x}", self.regs.ctrl());
        info!("    - st: 0x{:x}", self.regs.st());
        info!("    - portsc: 0x{:x}", self.regs.portsc());
        info!("    - cp: 0x{:x}", self.regs.cp());
        info!("    - ddi1: 0x{:x}", self.regs.ddi1());
        info!("    - ddi2: 0x{:x}", self.regs.ddi2());
    }

    /// Log the status, control and port registers.
    pub fn dump_status(&self) {
        info!("ST: 0x{:x}", self.regs.st());
        info!("CTRL: 0x{:x}", self.regs.ctrl());
        info!("PORTSC: 0x{:x}", self.regs.portsc());
    }
}

//! TRB ring storage and cursor management.
//!
//! The driver owns the ring memory; the controller is the peer. A ring is a physically
//! contiguous, page-aligned array of TRB slots plus one cursor:
//!
//! - **Producer** rings (the bulk OUT/IN transfer rings): the driver writes payload TRBs at the
//!   enqueue cursor and the controller consumes them. The last slot permanently holds a Link TRB
//!   back to the ring base with Toggle Cycle set, installed at construction; crossing it wraps
//!   the cursor and toggles the producer cycle state.
//! - **Consumer** rings (the event ring): the controller writes event TRBs and the driver reads
//!   them at the dequeue cursor.
//!
//! Cycle-bit ownership follows xHCI: a slot belongs to the consumer side when its cycle bit
//! matches the ring's cycle state.

use alloc::vec;

use crate::trb::{Trb, TrbType};
use crate::{DbcSystem, DmaBox, InitError, PAGE_SIZE};

/// TRB slots per ring page.
pub const TRBS_PER_PAGE: usize = PAGE_SIZE / crate::trb::TRB_LEN;

/// One page of TRB slots. Page alignment is what lets a single physical base address describe
/// the storage to hardware.
#[derive(Clone, Copy)]
#[repr(C, align(4096))]
pub struct TrbPage(pub [Trb; TRBS_PER_PAGE]);

impl TrbPage {
    pub const fn zeroed() -> Self {
        Self([Trb::zeroed(); TRBS_PER_PAGE])
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RingKind {
    Producer,
    Consumer,
}

/// A TRB ring over driver-owned, page-aligned storage.
pub struct TrbRing {
    storage: DmaBox<[TrbPage]>,
    kind: RingKind,
    enq: usize,
    deq: usize,
    cycle: bool,
}

impl TrbRing {
    /// Build a consumer ring (hardware produces, driver consumes) over `pages` zeroed pages.
    pub fn consumer(sys: &impl DbcSystem, pages: usize) -> Result<Self, InitError> {
        Self::with_kind(sys, pages, RingKind::Consumer)
    }

    /// Build a producer ring (driver produces, hardware consumes) over `pages` zeroed pages,
    /// with the wrap Link TRB installed in the last slot.
    pub fn producer(sys: &impl DbcSystem, pages: usize) -> Result<Self, InitError> {
        let mut ring = Self::with_kind(sys, pages, RingKind::Producer)?;

        let mut link = Trb::zeroed();
        link.parameter = ring.base_phys();
        link.set_trb_type(TrbType::Link);
        link.set_link_toggle_cycle(true);
        // Cycle stays clear until the producer reaches the slot; the controller will not consume
        // a link whose cycle bit mismatches its consumer cycle state.
        let last = ring.slot_count() - 1;
        *ring.slot_mut(last) = link;

        Ok(ring)
    }

    fn with_kind(sys: &impl DbcSystem, pages: usize, kind: RingKind) -> Result<Self, InitError> {
        debug_assert!(pages > 0);
        let storage = DmaBox::new(sys, vec![TrbPage::zeroed(); pages].into_boxed_slice())?;
        Ok(Self {
            storage,
            kind,
            enq: 0,
            deq: 0,
            cycle: true,
        })
    }

    /// Physical base address of the ring storage.
    pub fn base_phys(&self) -> u64 {
        self.storage.phys()
    }

    /// Physical base address of page `page` of the ring storage.
    pub fn page_phys(&self, page: usize) -> u64 {
        self.storage.phys_at(page * PAGE_SIZE)
    }

    /// Number of pages backing the ring.
    pub fn pages(&self) -> usize {
        self.storage.len()
    }

    /// Total TRB slots in the storage, including a producer ring's link slot.
    pub fn slot_count(&self) -> usize {
        self.pages() * TRBS_PER_PAGE
    }

    /// Slots available for payload TRBs.
    pub fn capacity(&self) -> usize {
        match self.kind {
            RingKind::Consumer => self.slot_count(),
            // The last slot is the wrap link.
            RingKind::Producer => self.slot_count() - 1,
        }
    }

    /// Current cycle state of the ring's cursor.
    pub fn cycle_state(&self) -> bool {
        self.cycle
    }

    /// Current enqueue index (producer rings).
    pub fn enqueue_index(&self) -> usize {
        self.enq
    }

    /// Current dequeue index (consumer rings).
    pub fn dequeue_index(&self) -> usize {
        self.deq
    }

    pub fn slot(&self, index: usize) -> &Trb {
        &self.storage[index / TRBS_PER_PAGE].0[index % TRBS_PER_PAGE]
    }

    pub fn slot_mut(&mut self, index: usize) -> &mut Trb {
        &mut self.storage[index / TRBS_PER_PAGE].0[index % TRBS_PER_PAGE]
    }

    /// The TRB at the dequeue cursor. On the event ring this is the oldest unconsumed event once
    /// the controller reports the ring not-empty.
    pub fn dequeue_slot(&self) -> &Trb {
        self.slot(self.deq)
    }

    /// Retire the TRB at the dequeue cursor, wrapping and toggling the consumer cycle state at
    /// the end of the storage. Consumer rings only.
    pub fn advance_dequeue(&mut self) {
        debug_assert_eq!(self.kind, RingKind::Consumer);
        self.deq += 1;
        if self.deq == self.slot_count() {
            self.deq = 0;
            self.cycle = !self.cycle;
        }
    }

    /// Write `trb` at the enqueue cursor with the ring's current cycle bit and advance. Crossing
    /// into the link slot hands the link to the controller (sets its cycle bit), wraps the
    /// cursor, and toggles the producer cycle state. Producer rings only.
    pub fn enqueue(&mut self, mut trb: Trb) {
        debug_assert_eq!(self.kind, RingKind::Producer);
        trb.set_cycle(self.cycle);
        let enq = self.enq;
        *self.slot_mut(enq) = trb;

        self.enq += 1;
        if self.enq == self.slot_count() - 1 {
            let cycle = self.cycle;
            let link = self.slot_count() - 1;
            self.slot_mut(link).set_cycle(cycle);
            self.enq = 0;
            self.cycle = !self.cycle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DbcRegisterBlock;

    /// Identity-mapped test system; the register block is never requested here.
    struct IdentitySystem;

    struct NoRegs;

    impl DbcRegisterBlock for NoRegs {
        fn id(&self) -> u32 {
            0
        }
        fn db(&self) -> u32 {
            0
        }
        fn set_db(&mut self, _value: u32) {}
        fn erstsz(&self) -> u32 {
            0
        }
        fn set_erstsz(&mut self, _value: u32) {}
        fn erstba(&self) -> u64 {
            0
        }
        fn set_erstba(&mut self, _value: u64) {}
        fn erdp(&self) -> u64 {
            0
        }
        fn set_erdp(&mut self, _value: u64) {}
        fn ctrl(&self) -> u32 {
            0
        }
        fn set_ctrl(&mut self, _value: u32) {}
        fn st(&self) -> u32 {
            0
        }
        fn portsc(&self) -> u32 {
            0
        }
        fn set_portsc(&mut self, _value: u32) {}
        fn cp(&self) -> u64 {
            0
        }
        fn set_cp(&mut self, _value: u64) {}
        fn ddi1(&self) -> u32 {
            0
        }
        fn ddi2(&self) -> u32 {
            0
        }
    }

    impl DbcSystem for IdentitySystem {
        type Regs = NoRegs;

        fn find_dbc(&mut self) -> Option<NoRegs> {
            None
        }

        fn virt_to_phys(&self, virt: usize) -> Option<u64> {
            Some(virt as u64)
        }
    }

    #[test]
    fn storage_is_page_aligned() {
        let ring = TrbRing::consumer(&IdentitySystem, 2).unwrap();
        assert_eq!(ring.base_phys() % PAGE_SIZE as u64, 0);
        assert_eq!(ring.page_phys(1), ring.base_phys() + PAGE_SIZE as u64);
        assert_eq!(ring.slot_count(), 2 * TRBS_PER_PAGE);
    }

    #[test]
    fn producer_installs_wrap_link() {
        let ring = TrbRing::producer(&IdentitySystem, 1).unwrap();
        let link = ring.slot(ring.slot_count() - 1);
        assert_eq!(link.trb_type(), TrbType::Link);
        assert_eq!(link.link_target(), ring.base_phys());
        assert!(link.link_toggle_cycle());
        assert!(!link.cycle());
        assert_eq!(ring.capacity(), TRBS_PER_PAGE - 1);
    }

    #[test]
    fn producer_enqueue_wraps_and_toggles_cycle() {
        let mut ring = TrbRing::producer(&IdentitySystem, 1).unwrap();
        assert!(ring.cycle_state());

        for i in 0..ring.capacity() {
            let mut trb = Trb::zeroed();
            trb.parameter = i as u64;
            trb.set_trb_type(TrbType::Normal);
            ring.enqueue(trb);
        }

        // Every payload slot carries the first-lap cycle bit.
        for i in 0..ring.capacity() {
            assert!(ring.slot(i).cycle(), "slot {i}");
            assert_eq!(ring.slot(i).parameter, i as u64);
        }

        // The lap handed the link TRB to the controller and toggled the producer cycle.
        let link = *ring.slot(ring.slot_count() - 1);
        assert_eq!(link.trb_type(), TrbType::Link);
        assert!(link.cycle());
        assert_eq!(ring.enqueue_index(), 0);
        assert!(!ring.cycle_state());

        // Second-lap TRBs are written with the toggled cycle bit.
        let mut trb = Trb::zeroed();
        trb.set_trb_type(TrbType::Normal);
        ring.enqueue(trb);
        assert!(!ring.slot(0).cycle());
        assert_eq!(ring.enqueue_index(), 1);
    }

    #[test]
    fn consumer_advance_wraps_and_toggles_cycle() {
        let mut ring = TrbRing::consumer(&IdentitySystem, 1).unwrap();
        assert!(ring.cycle_state());

        for _ in 0..ring.slot_count() - 1 {
            ring.advance_dequeue();
        }
        assert_eq!(ring.dequeue_index(), ring.slot_count() - 1);
        assert!(ring.cycle_state());

        ring.advance_dequeue();
        assert_eq!(ring.dequeue_index(), 0);
        assert!(!ring.cycle_state());
    }
}

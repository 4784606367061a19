//! Shared fakes for driving the DbC driver without hardware.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use xhci_dbc::{DbcRegisterBlock, DbcSystem};

/// Raw register values of a fake DbC register block.
#[derive(Clone, Copy, Debug)]
pub struct RegFile {
    pub id: u32,
    pub db: u32,
    pub erstsz: u32,
    pub erstba: u64,
    pub erdp: u64,
    pub ctrl: u32,
    pub st: u32,
    pub portsc: u32,
    pub cp: u64,
    pub ddi1: u32,
    pub ddi2: u32,
}

impl Default for RegFile {
    fn default() -> Self {
        Self {
            // ERSTMAX = 2: up to 4 event ring segments.
            id: 2 << 16,
            db: 0,
            erstsz: 0,
            erstba: 0,
            erdp: 0,
            // Max burst size 15.
            ctrl: 15 << 16,
            st: 0,
            portsc: 0,
            cp: 0,
            ddi1: 0,
            ddi2: 0,
        }
    }
}

/// In-memory register block. State is behind an `Rc` so a test can keep a handle and observe or
/// mutate registers after handing the block to the driver; every setter call is appended to the
/// write log by register name.
#[derive(Clone, Default)]
pub struct FakeRegisterBlock {
    state: Rc<RefCell<RegFile>>,
    log: Rc<RefCell<Vec<&'static str>>>,
}

impl FakeRegisterBlock {
    pub fn new(regs: RegFile) -> Self {
        Self {
            state: Rc::new(RefCell::new(regs)),
            log: Rc::default(),
        }
    }

    /// A second handle onto the same registers and write log.
    pub fn handle(&self) -> Self {
        self.clone()
    }

    pub fn state(&self) -> RegFile {
        *self.state.borrow()
    }

    /// Mutate the raw registers directly, as hardware would.
    pub fn hw_update(&self, f: impl FnOnce(&mut RegFile)) {
        f(&mut self.state.borrow_mut());
    }

    /// Names of every register written through the driver-facing setters, in call order.
    pub fn writes(&self) -> Vec<&'static str> {
        self.log.borrow().clone()
    }

    fn record(&self, name: &'static str) {
        self.log.borrow_mut().push(name);
    }
}

impl DbcRegisterBlock for FakeRegisterBlock {
    fn id(&self) -> u32 {
        self.state.borrow().id
    }

    fn db(&self) -> u32 {
        self.state.borrow().db
    }

    fn set_db(&mut self, value: u32) {
        self.record("db");
        self.state.borrow_mut().db = value;
    }

    fn erstsz(&self) -> u32 {
        self.state.borrow().erstsz
    }

    fn set_erstsz(&mut self, value: u32) {
        self.record("erstsz");
        self.state.borrow_mut().erstsz = value;
    }

    fn erstba(&self) -> u64 {
        self.state.borrow().erstba
    }

    fn set_erstba(&mut self, value: u64) {
        self.record("erstba");
        self.state.borrow_mut().erstba = value;
    }

    fn erdp(&self) -> u64 {
        self.state.borrow().erdp
    }

    fn set_erdp(&mut self, value: u64) {
        self.record("erdp");
        self.state.borrow_mut().erdp = value;
    }

    fn ctrl(&self) -> u32 {
        self.state.borrow().ctrl
    }

    fn set_ctrl(&mut self, value: u32) {
        self.record("ctrl");
        self.state.borrow_mut().ctrl = value;
    }

    fn st(&self) -> u32 {
        self.state.borrow().st
    }

    fn portsc(&self) -> u32 {
        self.state.borrow().portsc
    }

    fn set_portsc(&mut self, value: u32) {
        self.record("portsc");
        self.state.borrow_mut().portsc = value;
    }

    fn cp(&self) -> u64 {
        self.state.borrow().cp
    }

    fn set_cp(&mut self, value: u64) {
        self.record("cp");
        self.state.borrow_mut().cp = value;
    }

    fn ddi1(&self) -> u32 {
        self.state.borrow().ddi1
    }

    fn ddi2(&self) -> u32 {
        self.state.borrow().ddi2
    }
}

/// Fake platform: identity-mapped memory and an optional register block to discover.
pub struct TestSystem {
    regs: Option<FakeRegisterBlock>,
    translate: bool,
}

impl TestSystem {
    /// A platform whose controller exposes a DbC with default register values.
    pub fn new() -> (Self, FakeRegisterBlock) {
        Self::with_regs(FakeRegisterBlock::new(RegFile::default()))
    }

    /// A platform exposing `regs`; the returned handle shares state with the block the driver
    /// will discover.
    pub fn with_regs(regs: FakeRegisterBlock) -> (Self, FakeRegisterBlock) {
        let handle = regs.handle();
        (
            Self {
                regs: Some(regs),
                translate: true,
            },
            handle,
        )
    }

    /// A platform whose controller has no Debug Capability.
    pub fn missing_hardware() -> Self {
        Self {
            regs: None,
            translate: true,
        }
    }

    /// A platform whose address translation always fails.
    pub fn without_translation() -> (Self, FakeRegisterBlock) {
        let regs = FakeRegisterBlock::new(RegFile::default());
        let handle = regs.handle();
        (
            Self {
                regs: Some(regs),
                translate: false,
            },
            handle,
        )
    }
}

impl DbcSystem for TestSystem {
    type Regs = FakeRegisterBlock;

    fn find_dbc(&mut self) -> Option<FakeRegisterBlock> {
        self.regs.take()
    }

    fn virt_to_phys(&self, virt: usize) -> Option<u64> {
        self.translate.then_some(virt as u64)
    }
}

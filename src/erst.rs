//! Event Ring Segment Table.
//!
//! The ERST is a hardware-read table of `{physical base, TRB count}` pairs describing the
//! segments backing the event ring. The DbC points DCERSTBA at it and DCERSTSZ at the number of
//! valid entries. Entries are 16 bytes; the table base must be 64-byte aligned.

/// Most segments this driver will describe. The hardware limit is `2^ERSTMAX` and is checked at
/// initialization.
pub const MAX_ERST_SEGMENTS: usize = 16;

/// One ERST entry: segment base (low 4 bits reserved) and segment size in TRBs (low 16 bits).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(C)]
pub struct ErstEntry {
    base: u64,
    size: u32,
    _rsvd: u32,
}

impl ErstEntry {
    pub fn new(base: u64, size_trbs: u32) -> Self {
        Self {
            base: base & !0x0F,
            size: size_trbs & 0xFFFF,
            _rsvd: 0,
        }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn size_trbs(&self) -> u32 {
        self.size
    }
}

/// The segment table handed to hardware via DCERSTBA.
#[derive(Clone, Copy)]
#[repr(C, align(64))]
pub struct ErstTable {
    entries: [ErstEntry; MAX_ERST_SEGMENTS],
}

impl ErstTable {
    pub const fn zeroed() -> Self {
        Self {
            entries: [ErstEntry {
                base: 0,
                size: 0,
                _rsvd: 0,
            }; MAX_ERST_SEGMENTS],
        }
    }

    pub fn entry(&self, index: usize) -> ErstEntry {
        self.entries[index]
    }

    pub fn set_entry(&mut self, index: usize, entry: ErstEntry) {
        self.entries[index] = entry;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_masks_reserved_bits() {
        let entry = ErstEntry::new(0x1234_5678_9ABC_DEFF, 0x1_0100);
        assert_eq!(entry.base(), 0x1234_5678_9ABC_DEF0);
        assert_eq!(entry.size_trbs(), 0x0100);
    }

    #[test]
    fn table_layout_matches_hardware() {
        assert_eq!(core::mem::size_of::<ErstEntry>(), 16);
        assert_eq!(core::mem::align_of::<ErstTable>(), 64);
        assert_eq!(
            core::mem::size_of::<ErstTable>(),
            16 * MAX_ERST_SEGMENTS
        );
    }
}

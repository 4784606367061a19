//! USB string descriptors served over the debug transport.
//!
//! Content is fixed at build time and laid out exactly as it goes on the wire:
//! `[bLength, bDescriptorType = 3, UTF-16LE code units...]`. The info context embeds the
//! physical address and length of each descriptor, so at initialization the tables are copied
//! into a DMA-visible [`StringDescriptors`] block.

use core::mem::offset_of;

/// String descriptor zero: the supported-language table (US English).
pub const STRING0: [u8; 6] = [6, 3, 9, 0, 4, 0];

/// Manufacturer string descriptor: "AIS".
pub const MANUFACTURER: [u8; 8] = [8, 3, b'A', 0, b'I', 0, b'S', 0];

/// Product string descriptor: "xHCI DbC Driver".
#[rustfmt::skip]
pub const PRODUCT: [u8; 32] = [
    32, 3,
    b'x', 0, b'H', 0, b'C', 0, b'I', 0, b' ', 0,
    b'D', 0, b'b', 0, b'C', 0, b' ', 0,
    b'D', 0, b'r', 0, b'i', 0, b'v', 0, b'e', 0, b'r', 0,
];

/// The three descriptors in one DMA-visible block.
#[derive(Clone, Copy)]
#[repr(C, align(64))]
pub struct StringDescriptors {
    pub string0: [u8; STRING0.len()],
    pub manufacturer: [u8; MANUFACTURER.len()],
    pub product: [u8; PRODUCT.len()],
}

impl StringDescriptors {
    pub const fn new() -> Self {
        Self {
            string0: STRING0,
            manufacturer: MANUFACTURER,
            product: PRODUCT,
        }
    }

    pub const fn string0_offset() -> usize {
        offset_of!(StringDescriptors, string0)
    }

    pub const fn manufacturer_offset() -> usize {
        offset_of!(StringDescriptors, manufacturer)
    }

    pub const fn product_offset() -> usize {
        offset_of!(StringDescriptors, product)
    }
}

impl Default for StringDescriptors {
    fn default() -> Self {
        Self::new()
    }
}

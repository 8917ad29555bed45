//! # `AArch64` Header Branches
//!
//! The first instruction slots of an arm64 boot image hold a plain `B` to the
//! kernel's real entry point. We only ever need to recognize and re-target
//! that one instruction, so it is modeled as a 24-bit displacement (in
//! instruction slots) under the fixed opcode byte `0x14`.
//!
//! ```text
//!  31        24 23                                 0
//! ┌────────────┬────────────────────────────────────┐
//! │ 0x14 (B)   │ displacement (slots, mod 2^24)      │
//! └────────────┴────────────────────────────────────┘
//! ```

use bitfield_struct::bitfield;
use core::fmt;

/// Top byte of an unconditional `B` whose displacement fits the low 24 bits.
pub const BRANCH_OPCODE: u8 = 0x14;

/// Width of one instruction slot in bytes.
pub const SLOT_SIZE: usize = 4;

/// Raw little-endian instruction word of a header branch.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct BranchWord {
    /// Bits 0–23: displacement in instruction slots.
    #[bits(24)]
    pub displacement: u32,
    /// Bits 24–31: opcode byte.
    #[bits(8)]
    pub opcode: u8,
}

/// An unconditional branch as it appears in an instruction slot.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Branch {
    word: BranchWord,
}

impl Branch {
    /// Mask of the displacement field.
    pub const DISPLACEMENT_MASK: u32 = (1 << 24) - 1;

    /// Builds a branch jumping `displacement` slots ahead.
    ///
    /// Bits above the 24-bit field are dropped.
    #[must_use]
    pub const fn new(displacement: u32) -> Self {
        Self {
            word: BranchWord::new()
                .with_displacement(displacement & Self::DISPLACEMENT_MASK)
                .with_opcode(BRANCH_OPCODE),
        }
    }

    /// Recognizes a branch by its opcode byte; anything else yields `None`.
    #[must_use]
    pub const fn decode(slot: [u8; SLOT_SIZE]) -> Option<Self> {
        let word = BranchWord::from_bits(u32::from_le_bytes(slot));
        if word.opcode() != BRANCH_OPCODE {
            return None;
        }
        Some(Self { word })
    }

    /// Encodes the branch back into slot bytes.
    #[must_use]
    pub const fn encode(self) -> [u8; SLOT_SIZE] {
        self.word.into_bits().to_le_bytes()
    }

    /// Displacement in instruction slots.
    #[must_use]
    pub const fn displacement(self) -> u32 {
        self.word.displacement()
    }

    /// Same target, seen from an instruction `slots` further along.
    ///
    /// Wraps modulo 2^24 like the encoding itself.
    #[must_use]
    pub const fn relocated_forward(self, slots: u32) -> Self {
        Self::new(self.displacement().wrapping_sub(slots))
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "b +{:#x} ({} slots)",
            u64::from(self.displacement()) * SLOT_SIZE as u64,
            self.displacement()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_requires_opcode_byte() {
        assert!(Branch::decode([0x10, 0x00, 0x00, 0x14]).is_some());
        assert!(Branch::decode([0x10, 0x00, 0x00, 0x15]).is_none());
        // `MZ` signature of an EFI-stub kernel is not a branch
        assert!(Branch::decode([0x4D, 0x5A, 0x00, 0x91]).is_none());
    }

    #[test]
    fn displacement_is_low_24_bits_le() {
        let b = Branch::decode([0x56, 0x34, 0x12, 0x14]).unwrap();
        assert_eq!(b.displacement(), 0x0012_3456);
        assert_eq!(b.encode(), [0x56, 0x34, 0x12, 0x14]);
    }

    #[test]
    fn new_truncates_to_field() {
        let b = Branch::new(0xAB12_3456);
        assert_eq!(b.displacement(), 0x0012_3456);
        assert_eq!(b.encode()[3], BRANCH_OPCODE);
    }

    #[test]
    fn relocation_subtracts_slots() {
        let b = Branch::new(0x10).relocated_forward(1);
        assert_eq!(b.displacement(), 0x0F);
        assert_eq!(b.encode(), [0x0F, 0x00, 0x00, 0x14]);
    }

    #[test]
    fn relocation_wraps_mod_2_24() {
        let b = Branch::new(0).relocated_forward(1);
        assert_eq!(b.displacement(), 0x00FF_FFFF);
        assert_eq!(b.encode(), [0xFF, 0xFF, 0xFF, 0x14]);
    }
}

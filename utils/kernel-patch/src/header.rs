//! Fixed layout of the patched arm64 image header.
//!
//! ```text
//! 0x00  slot 0   b  → STUB_OFFSET          (dispatch branch)
//! 0x04  slot 1   b  → kernel entry         (relocated original branch)
//! 0x08           text_offset, image_size, flags (left untouched)
//! 0x20  u64      firmware stack base
//! 0x28  u64      firmware stack size
//! 0x30  u64      firmware launch offset (= original kernel length)
//! 0x38  [u8; 4]  "ARM\x64" magic (left untouched)
//! 0x40  ...      dispatch stub
//! ```

#![allow(clippy::missing_errors_doc)]

use crate::arm64::{Branch, SLOT_SIZE};

/// Slot holding the branch into the dispatch stub.
pub const DISPATCH_SLOT: usize = 0;

/// Slot holding the kernel's own entry branch after patching.
pub const KERNEL_BRANCH_SLOT: usize = 1;

/// Slot at which the dispatch stub starts.
pub const STUB_SLOT: usize = 0x10;

/// Byte offset of the dispatch stub.
pub const STUB_OFFSET: usize = STUB_SLOT * SLOT_SIZE;

/// Byte offset of the firmware stack base field.
pub const STACK_BASE_OFFSET: usize = 0x20;

/// Byte offset of the firmware stack size field.
pub const STACK_SIZE_OFFSET: usize = 0x28;

/// Byte offset of the firmware launch offset field.
pub const LAUNCH_OFFSET_OFFSET: usize = 0x30;

/// Byte offset of the arm64 image magic.
pub const ARM64_MAGIC_OFFSET: usize = 0x38;

/// Linux arm64 image magic (`ARM\x64`).
pub const ARM64_MAGIC: [u8; 4] = *b"ARM\x64";

/// The dispatch branch written into [`DISPATCH_SLOT`].
#[allow(clippy::cast_possible_truncation)]
pub const DISPATCH_BRANCH: Branch = Branch::new((STUB_SLOT - DISPATCH_SLOT) as u32);

/// A header access fell outside the buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
#[error("header access at {offset:#x}+{len} exceeds buffer of {available} bytes")]
pub struct OutOfBounds {
    pub offset: usize,
    pub len: usize,
    pub available: usize,
}

#[inline]
fn range(buf_len: usize, offset: usize, len: usize) -> Result<core::ops::Range<usize>, OutOfBounds> {
    let err = OutOfBounds {
        offset,
        len,
        available: buf_len,
    };
    let end = offset.checked_add(len).ok_or(err)?;
    if end > buf_len {
        return Err(err);
    }
    Ok(offset..end)
}

/// Reads instruction slot `slot`.
#[inline]
pub fn read_slot(buf: &[u8], slot: usize) -> Result<[u8; SLOT_SIZE], OutOfBounds> {
    let offset = slot.saturating_mul(SLOT_SIZE);
    let s = &buf[range(buf.len(), offset, SLOT_SIZE)?];
    Ok([s[0], s[1], s[2], s[3]])
}

/// Overwrites instruction slot `slot`.
#[inline]
pub fn write_slot(buf: &mut [u8], slot: usize, bytes: [u8; SLOT_SIZE]) -> Result<(), OutOfBounds> {
    let offset = slot.saturating_mul(SLOT_SIZE);
    let r = range(buf.len(), offset, SLOT_SIZE)?;
    buf[r].copy_from_slice(&bytes);
    Ok(())
}

#[inline]
pub fn read_u64_le(buf: &[u8], offset: usize) -> Result<u64, OutOfBounds> {
    let s = &buf[range(buf.len(), offset, 8)?];
    Ok(u64::from_le_bytes([
        s[0], s[1], s[2], s[3], s[4], s[5], s[6], s[7],
    ]))
}

#[inline]
pub fn write_u64_le(buf: &mut [u8], offset: usize, value: u64) -> Result<(), OutOfBounds> {
    let r = range(buf.len(), offset, 8)?;
    buf[r].copy_from_slice(&value.to_le_bytes());
    Ok(())
}

/// Copies `bytes` verbatim to `offset`.
#[inline]
pub fn write_bytes(buf: &mut [u8], offset: usize, bytes: &[u8]) -> Result<(), OutOfBounds> {
    let r = range(buf.len(), offset, bytes.len())?;
    buf[r].copy_from_slice(bytes);
    Ok(())
}

/// Whether the buffer carries the arm64 image magic at its usual place.
#[must_use]
pub fn has_arm64_magic(buf: &[u8]) -> bool {
    buf.get(ARM64_MAGIC_OFFSET..ARM64_MAGIC_OFFSET + ARM64_MAGIC.len()) == Some(&ARM64_MAGIC[..])
}

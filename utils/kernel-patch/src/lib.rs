//! # Dual Boot Kernel Image Patching
//!
//! Combines an `AArch64` kernel boot image and a UEFI firmware volume into one
//! blob that a boot chain with a single kernel slot will happily load. The
//! kernel header is rewritten so that the first instruction jumps into a small
//! dispatch stub which decides, at boot, whether to continue into the kernel
//! or to start the firmware appended behind it.
//!
//! ## Layout
//!
//! ```text
//! 0                        len(kernel)                 len(kernel) + len(firmware)
//! ├────────────────────────┼───────────────────────────┤
//! │ kernel (header patched)│ firmware (verbatim)        │
//! └────────────────────────┴───────────────────────────┘
//! ```
//!
//! The header itself is described in [`header`]. Patching runs three stages
//! against the same output buffer:
//!
//! 1. [`KernelPatcher::normalize_entry_branch`] moves the kernel's entry
//!    branch from slot 0 to slot 1 (or accepts it already being there),
//! 2. [`KernelPatcher::write_header_fields`] points slot 0 at the stub and
//!    fills in stack base, stack size and firmware launch offset,
//! 3. [`KernelPatcher::inject_dispatch_stub`] copies the product's stub to
//!    [`header::STUB_OFFSET`].
//!
//! ## Example
//!
//! ```
//! use kernel_patch::{ProductVariant, patch};
//!
//! let mut kernel = vec![0u8; 0x200];
//! kernel[..4].copy_from_slice(&[0x80, 0x00, 0x00, 0x14]); // b +0x200
//! let firmware = [0xAA; 16];
//!
//! let image = patch(&kernel, &firmware, ProductVariant::Zeta).unwrap();
//! assert_eq!(image.len(), kernel.len() + firmware.len());
//! assert_eq!(&image[4..8], &[0x7F, 0x00, 0x00, 0x14]);
//! assert_eq!(&image[kernel.len()..], &firmware);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

pub mod arm64;
mod error;
pub mod header;
#[cfg(feature = "inspect")]
pub mod inspect;
pub mod stub;
pub mod variant;

pub use arm64::Branch;
pub use error::PatchError;
pub use variant::{ParseProductError, ProductVariant, VariantProfile};

use alloc::vec::Vec;
use header::{
    DISPATCH_BRANCH, DISPATCH_SLOT, KERNEL_BRANCH_SLOT, LAUNCH_OFFSET_OFFSET, STACK_BASE_OFFSET,
    STACK_SIZE_OFFSET, STUB_OFFSET, read_slot, write_bytes, write_slot, write_u64_le,
};
use log::{debug, info, trace, warn};

/// Patches `kernel` for `variant` and appends `firmware`.
///
/// # Errors
/// See [`KernelPatcher::patch`].
pub fn patch(
    kernel: &[u8],
    firmware: &[u8],
    variant: ProductVariant,
) -> Result<Vec<u8>, PatchError> {
    KernelPatcher::new(variant).patch(kernel, firmware)
}

/// Like [`patch`], but takes the raw product selector.
///
/// # Errors
/// [`PatchError::UnknownProductVariant`] if `selector` names no product,
/// otherwise see [`KernelPatcher::patch`].
pub fn patch_with_selector(
    kernel: &[u8],
    firmware: &[u8],
    selector: u32,
) -> Result<Vec<u8>, PatchError> {
    let variant = ProductVariant::try_from(selector)?;
    patch(kernel, firmware, variant)
}

/// Whether slot 0 or slot 1 of `kernel` holds a branch.
fn has_entry_branch(kernel: &[u8]) -> bool {
    [DISPATCH_SLOT, KERNEL_BRANCH_SLOT]
        .into_iter()
        .any(|slot| read_slot(kernel, slot).ok().and_then(Branch::decode).is_some())
}

/// Header patcher for one target product.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct KernelPatcher {
    variant: ProductVariant,
}

impl KernelPatcher {
    #[must_use]
    pub const fn new(variant: ProductVariant) -> Self {
        Self { variant }
    }

    #[must_use]
    pub const fn variant(&self) -> ProductVariant {
        self.variant
    }

    /// Smallest kernel image the header patch fits into.
    #[must_use]
    pub fn min_kernel_len(&self) -> usize {
        STUB_OFFSET + self.variant.profile().stub.len()
    }

    /// Builds the combined image.
    ///
    /// The returned buffer is `kernel.len() + firmware.len()` bytes long; the
    /// firmware part is an exact copy of `firmware`.
    ///
    /// # Errors
    /// - [`PatchError::InvalidKernelImage`] if neither slot 0 nor slot 1 holds
    ///   a branch,
    /// - [`PatchError::KernelTooSmall`] if the header region does not fit,
    /// - [`PatchError::KernelTooLarge`] if the launch offset exceeds 32 bits.
    pub fn patch(&self, kernel: &[u8], firmware: &[u8]) -> Result<Vec<u8>, PatchError> {
        if !has_entry_branch(kernel) {
            return Err(PatchError::InvalidKernelImage);
        }

        let required = self.min_kernel_len();
        if kernel.len() < required {
            return Err(PatchError::KernelTooSmall {
                len: kernel.len(),
                required,
            });
        }

        let launch_offset =
            u32::try_from(kernel.len()).map_err(|_| PatchError::KernelTooLarge(kernel.len()))?;

        if !header::has_arm64_magic(kernel) {
            warn!(
                "kernel image has no arm64 magic at {:#x}, patching anyway",
                header::ARM64_MAGIC_OFFSET
            );
        }

        let mut image = Vec::with_capacity(kernel.len() + firmware.len());
        image.extend_from_slice(kernel);
        image.extend_from_slice(firmware);

        let header = &mut image[..kernel.len()];
        let entry = Self::normalize_entry_branch(header)?;
        self.write_header_fields(header, launch_offset)?;
        self.inject_dispatch_stub(header)?;

        info!(
            "patched {} byte kernel for {} (entry {entry}), firmware of {} bytes at {launch_offset:#x}",
            kernel.len(),
            self.variant,
            firmware.len(),
        );
        Ok(image)
    }

    /// Ensures slot 1 holds the kernel's entry branch, freeing slot 0.
    ///
    /// A branch in slot 0 is moved to slot 1 with its displacement reduced by
    /// one slot so it keeps its target. A branch already in slot 1 is trusted
    /// as-is and not re-adjusted. Returns the branch now in slot 1.
    ///
    /// # Errors
    /// [`PatchError::InvalidKernelImage`] if neither slot holds a branch.
    pub fn normalize_entry_branch(header: &mut [u8]) -> Result<Branch, PatchError> {
        if let Some(entry) = Branch::decode(read_slot(header, DISPATCH_SLOT)?) {
            #[allow(clippy::cast_possible_truncation)]
            let relocated = entry.relocated_forward((KERNEL_BRANCH_SLOT - DISPATCH_SLOT) as u32);
            debug!("moving entry branch from slot {DISPATCH_SLOT} to slot {KERNEL_BRANCH_SLOT}: {entry} -> {relocated}");
            write_slot(header, KERNEL_BRANCH_SLOT, relocated.encode())?;
            return Ok(relocated);
        }

        if let Some(entry) = Branch::decode(read_slot(header, KERNEL_BRANCH_SLOT)?) {
            debug!("entry branch already in slot {KERNEL_BRANCH_SLOT}: {entry}");
            return Ok(entry);
        }

        Err(PatchError::InvalidKernelImage)
    }

    /// Writes the dispatch branch and the product's firmware parameters.
    ///
    /// # Errors
    /// [`PatchError::Header`] if `header` is shorter than the fixed fields.
    pub fn write_header_fields(&self, header: &mut [u8], launch_offset: u32) -> Result<(), PatchError> {
        let profile = self.variant.profile();

        write_slot(header, DISPATCH_SLOT, DISPATCH_BRANCH.encode())?;
        write_u64_le(header, STACK_BASE_OFFSET, profile.stack_base)?;
        write_u64_le(header, STACK_SIZE_OFFSET, profile.stack_size)?;
        write_u64_le(header, LAUNCH_OFFSET_OFFSET, u64::from(launch_offset))?;

        trace!(
            "header: stack base {:#x}, stack size {:#x}, launch offset {launch_offset:#x}",
            profile.stack_base, profile.stack_size
        );
        Ok(())
    }

    /// Copies the product's dispatch stub to [`STUB_OFFSET`].
    ///
    /// # Errors
    /// [`PatchError::Header`] if the stub does not fit into `header`.
    pub fn inject_dispatch_stub(&self, header: &mut [u8]) -> Result<(), PatchError> {
        let stub = self.variant.profile().stub;
        write_bytes(header, STUB_OFFSET, stub)?;
        trace!(
            "dispatch stub: {} bytes at {STUB_OFFSET:#x}..{:#x}",
            stub.len(),
            STUB_OFFSET + stub.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::EPSILON_STUB;

    fn header_with(slot0: [u8; 4], slot1: [u8; 4]) -> [u8; 0x40] {
        let mut h = [0u8; 0x40];
        h[..4].copy_from_slice(&slot0);
        h[4..8].copy_from_slice(&slot1);
        h
    }

    #[test]
    fn normalize_moves_slot0_branch() {
        let mut h = header_with([0x34, 0x12, 0x00, 0x14], [0xAA; 4]);
        let b = KernelPatcher::normalize_entry_branch(&mut h).unwrap();
        assert_eq!(b.displacement(), 0x1233);
        assert_eq!(&h[4..8], &[0x33, 0x12, 0x00, 0x14]);
        // slot 0 is left for the header writer
        assert_eq!(&h[..4], &[0x34, 0x12, 0x00, 0x14]);
    }

    #[test]
    fn normalize_keeps_slot1_branch() {
        let mut h = header_with([0x4D, 0x5A, 0x00, 0x91], [0x34, 0x12, 0x00, 0x14]);
        let b = KernelPatcher::normalize_entry_branch(&mut h).unwrap();
        assert_eq!(b.displacement(), 0x1234);
        assert_eq!(&h[4..8], &[0x34, 0x12, 0x00, 0x14]);
    }

    #[test]
    fn normalize_rejects_missing_branch() {
        let mut h = header_with([0; 4], [0; 4]);
        assert_eq!(
            KernelPatcher::normalize_entry_branch(&mut h),
            Err(PatchError::InvalidKernelImage)
        );
    }

    #[test]
    fn normalize_needs_room_for_slot1() {
        // slot 0 decodes as a branch but slot 1 is cut short
        assert_eq!(
            KernelPatcher::normalize_entry_branch(&mut [0x14; 6]),
            Err(PatchError::Header(header::OutOfBounds {
                offset: 4,
                len: 4,
                available: 6
            }))
        );
    }

    #[test]
    fn header_fields_for_epsilon() {
        let mut h = [0u8; 0x40];
        KernelPatcher::new(ProductVariant::Epsilon)
            .write_header_fields(&mut h, 0x0123_4567)
            .unwrap();
        assert_eq!(&h[..4], &[0x10, 0x00, 0x00, 0x14]);
        assert_eq!(&h[0x20..0x28], &[0x00, 0x00, 0xC0, 0x9F, 0, 0, 0, 0]);
        assert_eq!(&h[0x28..0x30], &[0x00, 0x00, 0x30, 0x00, 0, 0, 0, 0]);
        assert_eq!(&h[0x30..0x38], &[0x67, 0x45, 0x23, 0x01, 0, 0, 0, 0]);
    }

    #[test]
    fn header_fields_for_zeta() {
        let mut h = [0u8; 0x40];
        KernelPatcher::new(ProductVariant::Zeta)
            .write_header_fields(&mut h, 0x100)
            .unwrap();
        assert_eq!(&h[0x20..0x28], &[0x00, 0x10, 0xC4, 0x9F, 0, 0, 0, 0]);
        assert_eq!(&h[0x28..0x30], &[0x00, 0xF0, 0x2B, 0x00, 0, 0, 0, 0]);
    }

    #[test]
    fn stub_lands_after_header() {
        let mut buf = [0u8; 0x100];
        KernelPatcher::new(ProductVariant::Epsilon)
            .inject_dispatch_stub(&mut buf)
            .unwrap();
        assert!(buf[..0x40].iter().all(|&b| b == 0));
        assert_eq!(&buf[0x40..0xA0], &EPSILON_STUB);
        assert!(buf[0xA0..].iter().all(|&b| b == 0));
    }

    #[test]
    fn stub_that_does_not_fit_is_an_error() {
        let mut buf = [0u8; 0x80];
        assert!(matches!(
            KernelPatcher::new(ProductVariant::Zeta).inject_dispatch_stub(&mut buf),
            Err(PatchError::Header(_))
        ));
    }
}

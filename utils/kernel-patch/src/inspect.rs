//! Reading back the parameters of an already patched image.

use crate::arm64::Branch;
use crate::header::{
    DISPATCH_BRANCH, DISPATCH_SLOT, KERNEL_BRANCH_SLOT, LAUNCH_OFFSET_OFFSET, STACK_BASE_OFFSET,
    STACK_SIZE_OFFSET, STUB_OFFSET, read_slot, read_u64_le,
};
use crate::variant::ProductVariant;

/// Parsed view over a patched image.
#[derive(Debug, Copy, Clone)]
pub struct PatchedImage<'a> {
    blob: &'a [u8],
    variant: ProductVariant,
    kernel_branch: Branch,
    stack_base: u64,
    stack_size: u64,
    launch_offset: usize,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum InspectError {
    #[error("image too short for a patched header")]
    TooShort,
    #[error("slot 0 does not branch to the dispatch stub")]
    MissingDispatchBranch,
    #[error("slot 1 holds no kernel entry branch")]
    MissingKernelBranch,
    #[error("launch offset {0:#x} lies outside the image")]
    LaunchOffsetOutOfBounds(u64),
    #[error("no known dispatch stub at the stub offset")]
    UnknownStub,
}

impl<'a> PatchedImage<'a> {
    /// Parse and validate a patched image.
    ///
    /// # Errors
    /// The first [`InspectError`] check that fails.
    pub fn parse(blob: &'a [u8]) -> Result<Self, InspectError> {
        use InspectError::{
            LaunchOffsetOutOfBounds, MissingDispatchBranch, MissingKernelBranch, TooShort, UnknownStub,
        };
        // Need at least the fixed header fields.
        if blob.len() < STUB_OFFSET {
            return Err(TooShort);
        }

        let dispatch = read_slot(blob, DISPATCH_SLOT).map_err(|_| TooShort)?;
        if Branch::decode(dispatch) != Some(DISPATCH_BRANCH) {
            return Err(MissingDispatchBranch);
        }

        let kernel_branch = read_slot(blob, KERNEL_BRANCH_SLOT)
            .ok()
            .and_then(Branch::decode)
            .ok_or(MissingKernelBranch)?;

        let variant = ProductVariant::from_stub(&blob[STUB_OFFSET..]).ok_or(UnknownStub)?;

        let stack_base = read_u64_le(blob, STACK_BASE_OFFSET).map_err(|_| TooShort)?;
        let stack_size = read_u64_le(blob, STACK_SIZE_OFFSET).map_err(|_| TooShort)?;
        let raw_launch = read_u64_le(blob, LAUNCH_OFFSET_OFFSET).map_err(|_| TooShort)?;

        // The stub must sit inside the kernel part.
        let launch_offset = usize::try_from(raw_launch)
            .ok()
            .filter(|&off| off >= STUB_OFFSET + variant.profile().stub.len() && off <= blob.len())
            .ok_or(LaunchOffsetOutOfBounds(raw_launch))?;

        Ok(Self {
            blob,
            variant,
            kernel_branch,
            stack_base,
            stack_size,
            launch_offset,
        })
    }

    /// Product the stub was built for.
    #[must_use]
    pub const fn variant(&self) -> ProductVariant {
        self.variant
    }

    /// The kernel's entry branch in slot 1.
    #[must_use]
    pub const fn kernel_branch(&self) -> Branch {
        self.kernel_branch
    }

    #[must_use]
    pub const fn stack_base(&self) -> u64 {
        self.stack_base
    }

    #[must_use]
    pub const fn stack_size(&self) -> u64 {
        self.stack_size
    }

    /// Where the firmware starts, which is also the kernel length.
    #[must_use]
    pub const fn launch_offset(&self) -> usize {
        self.launch_offset
    }

    /// Whether the stack parameters are the ones the stub's product expects.
    #[must_use]
    pub fn matches_profile(&self) -> bool {
        let p = self.variant.profile();
        p.stack_base == self.stack_base && p.stack_size == self.stack_size
    }

    /// The (patched) kernel part.
    #[must_use]
    pub fn kernel(&self) -> &'a [u8] {
        &self.blob[..self.launch_offset]
    }

    /// The appended firmware.
    #[must_use]
    pub fn firmware(&self) -> &'a [u8] {
        &self.blob[self.launch_offset..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch;

    fn kernel() -> [u8; 0x100] {
        let mut k = [0u8; 0x100];
        k[..4].copy_from_slice(&[0x40, 0x00, 0x00, 0x14]);
        k
    }

    #[test]
    fn reads_back_what_patch_wrote() {
        let k = kernel();
        let image = patch(&k, b"firmware", ProductVariant::Epsilon).unwrap();
        let p = PatchedImage::parse(&image).unwrap();
        assert_eq!(p.variant(), ProductVariant::Epsilon);
        assert_eq!(p.launch_offset(), k.len());
        assert_eq!(p.kernel_branch().displacement(), 0x3F);
        assert_eq!(p.firmware(), b"firmware");
        assert_eq!(p.kernel().len(), k.len());
        assert!(p.matches_profile());
    }

    #[test]
    fn unpatched_kernel_is_rejected() {
        assert_eq!(
            PatchedImage::parse(&kernel()).unwrap_err(),
            InspectError::MissingDispatchBranch
        );
        assert_eq!(PatchedImage::parse(&[0u8; 8]).unwrap_err(), InspectError::TooShort);
    }

    #[test]
    fn launch_offset_must_be_in_bounds() {
        let mut image = patch(&kernel(), &[], ProductVariant::Zeta).unwrap();
        image[0x30..0x38].copy_from_slice(&0x1000u64.to_le_bytes());
        assert_eq!(
            PatchedImage::parse(&image).unwrap_err(),
            InspectError::LaunchOffsetOutOfBounds(0x1000)
        );
    }

    #[test]
    fn foreign_stub_is_rejected() {
        let mut image = patch(&kernel(), &[1, 2, 3], ProductVariant::Zeta).unwrap();
        image[0x40] ^= 0xFF;
        assert_eq!(
            PatchedImage::parse(&image).unwrap_err(),
            InspectError::UnknownStub
        );
    }
}

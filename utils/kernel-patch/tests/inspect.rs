#![cfg(feature = "inspect")]

use kernel_patch::inspect::{InspectError, PatchedImage};
use kernel_patch::{ProductVariant, patch};

#[test]
fn round_trip_for_every_variant() {
    let mut kernel = vec![0u8; 0x800];
    kernel[4..8].copy_from_slice(&[0x00, 0x02, 0x00, 0x14]);
    let firmware = b"UEFI firmware volume".repeat(17);

    for v in ProductVariant::ALL {
        let image = patch(&kernel, &firmware, v).unwrap();
        let parsed = PatchedImage::parse(&image).unwrap();

        assert_eq!(parsed.variant(), v);
        assert_eq!(parsed.launch_offset(), kernel.len());
        assert_eq!(parsed.firmware(), firmware.as_slice());
        assert_eq!(parsed.kernel_branch().displacement(), 0x200);
        assert_eq!(parsed.stack_base(), v.profile().stack_base);
        assert_eq!(parsed.stack_size(), v.profile().stack_size);
        assert!(parsed.matches_profile());
    }
}

#[test]
fn tampered_stack_fields_are_reported() {
    let mut kernel = vec![0u8; 0x200];
    kernel[3] = 0x14;
    let mut image = patch(&kernel, &[], ProductVariant::Epsilon).unwrap();
    image[0x28..0x30].copy_from_slice(&0x1000u64.to_le_bytes());

    let parsed = PatchedImage::parse(&image).unwrap();
    assert_eq!(parsed.stack_size(), 0x1000);
    assert!(!parsed.matches_profile());
}

#[test]
fn truncated_image_is_rejected() {
    let mut kernel = vec![0u8; 0x200];
    kernel[3] = 0x14;
    let image = patch(&kernel, &[], ProductVariant::Zeta).unwrap();

    // cut into the stub
    assert_eq!(
        PatchedImage::parse(&image[..0x60]).unwrap_err(),
        InspectError::UnknownStub
    );
    assert_eq!(
        PatchedImage::parse(&image[..0x20]).unwrap_err(),
        InspectError::TooShort
    );
}

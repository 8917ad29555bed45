//! Supported target products and their firmware parameters.

use crate::PatchError;
use crate::stub::{EPSILON_STUB, ZETA_STUB};
use alloc::string::{String, ToString};
use core::fmt;
use core::str::FromStr;

/// Target product the image is patched for.
///
/// The discriminant is the selector accepted on the command line.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ProductVariant {
    /// Surface Duo.
    Epsilon = 0,
    /// Surface Duo 2.
    Zeta = 1,
}

/// Per-product constants written into the header.
#[derive(Debug)]
pub struct VariantProfile {
    pub name: &'static str,
    /// Address the firmware is copied to and started from.
    pub stack_base: u64,
    /// Size of the firmware region at [`stack_base`](Self::stack_base).
    pub stack_size: u64,
    /// Dispatch stub placed at [`STUB_OFFSET`](crate::header::STUB_OFFSET).
    pub stub: &'static [u8],
}

/// Indexed by [`ProductVariant`] discriminant.
static PROFILES: [VariantProfile; 2] = [
    VariantProfile {
        name: "Epsilon",
        stack_base: 0x0000_0000_9FC0_0000,
        stack_size: 0x0000_0000_0030_0000,
        stub: &EPSILON_STUB,
    },
    VariantProfile {
        name: "Zeta",
        stack_base: 0x0000_0000_9FC4_1000,
        stack_size: 0x0000_0000_002B_F000,
        stub: &ZETA_STUB,
    },
];

impl ProductVariant {
    pub const ALL: [Self; 2] = [Self::Epsilon, Self::Zeta];

    #[must_use]
    pub const fn selector(self) -> u32 {
        self as u32
    }

    #[must_use]
    pub fn profile(self) -> &'static VariantProfile {
        &PROFILES[self as usize]
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        self.profile().name
    }

    /// Finds the product whose stub starts `bytes`.
    #[must_use]
    pub fn from_stub(bytes: &[u8]) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|v| bytes.starts_with(v.profile().stub))
    }
}

impl TryFrom<u32> for ProductVariant {
    type Error = PatchError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Epsilon),
            1 => Ok(Self::Zeta),
            other => Err(PatchError::UnknownProductVariant(other)),
        }
    }
}

/// A product given by name or selector was not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown product `{0}` (expected 0/epsilon or 1/zeta)")]
pub struct ParseProductError(String);

impl FromStr for ProductVariant {
    type Err = ParseProductError;

    /// Accepts the numeric selector or the product name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(selector) = s.parse::<u32>() {
            return Self::try_from(selector).map_err(|_| ParseProductError(s.to_string()));
        }

        Self::ALL
            .into_iter()
            .find(|v| v.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseProductError(s.to_string()))
    }
}

impl fmt::Display for ProductVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

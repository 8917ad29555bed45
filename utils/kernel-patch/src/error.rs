use crate::header::OutOfBounds;

/// Failure of [`patch`](crate::patch).
///
/// No output buffer is produced on any of these.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    #[error("invalid kernel image: branch instruction not found within first two instruction slots")]
    InvalidKernelImage,
    #[error("unknown product variant {0} (expected 0: Epsilon, 1: Zeta)")]
    UnknownProductVariant(u32),
    #[error("kernel image too small: {len} bytes, header patch needs at least {required}")]
    KernelTooSmall { len: usize, required: usize },
    #[error("kernel image too large: {0} bytes do not fit a 32-bit launch offset")]
    KernelTooLarge(usize),
    #[error("header write out of bounds: {0}")]
    Header(#[from] OutOfBounds),
}

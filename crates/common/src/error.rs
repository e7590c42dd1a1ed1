use crate::GuestPtr;
use crate::Len;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// Enum of all the ways the sandbox memory can fault.
///
/// every fault is recoverable at the memory boundary
/// the memory itself never panics on bad guest input, it hands one of these back to the host
/// and the host decides whether the current guest invocation survives
/// typically `OutOfBounds` means the guest broke its sandbox contract and must be aborted while
/// `InvalidPointer` may just mean a sloppy double free
#[derive(Error, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MemoryError {
    /// deallocate was handed an address that is not a live allocation
    /// a double free, a pointer we never handed out, or a pointer into the middle of a chunk
    /// nothing is mutated when this comes back, the tables are exactly as they were
    #[error("invalid pointer: {0} is not a live allocation")]
    InvalidPointer(GuestPtr),

    /// an access at `ptr` of `len` bytes does not fit inside a memory of `size` bytes
    /// guest controlled addresses are the attack surface here so the access is rejected
    /// outright, never clamped or wrapped
    #[error("out of bounds: {len} bytes at {ptr} exceeds memory size {size}")]
    OutOfBounds { ptr: GuestPtr, len: Len, size: Len },

    /// the allocation cannot ever be satisfied because the growth it needs does not fit in the
    /// 32 bit address space
    /// failing here is deliberate, wrapping the frontier would alias live allocations
    #[error("allocation exhausts the 32 bit sandbox address space")]
    ExhaustedAddressSpace,

    /// allocating zero bytes is always a bug on the caller side
    /// a zero sized chunk has no bytes to own so reuse and disjointness stop meaning anything
    #[error("zero sized allocation")]
    ZeroSizedAllocation,
}

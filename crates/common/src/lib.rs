pub mod error;
pub mod ptr_len;

pub use error::*;
pub use ptr_len::*;

/// something like usize for the sandbox
/// the sandbox is a 32 bit address space so offsets and lengths fit in u32
///
/// the host needs to hand addresses back and forward with the guest so we need a predictable
/// number of bytes to represent offsets and lengths
/// a u64 offset or length would add no value to a memory that is capped at 4GB anyway, and it
/// would double the bytes shuffled across the boundary for every fat pointer
pub type MemSize = u32;

pub type Len = MemSize;
pub type GuestPtr = MemSize;

//! host side of the sandbox: a flat, growable, byte addressable memory that untrusted guest
//! code allocates from and the host marshals values through
//!
//! guest "pointers" are plain offsets into a buffer owned exclusively by [`memory::Memory`],
//! never live references into host memory, so every address coming from the guest can be
//! bounds checked before a single byte moves

pub mod allocation;
pub mod env;
pub mod memory;
pub mod prelude;

pub use sandbox_memory_common::*;

pub use crate::env::Env;
pub use crate::memory::Memory;
pub use crate::memory::PAGE_SIZE;
pub use sandbox_memory_common::*;

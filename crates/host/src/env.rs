use crate::memory::Memory;
use sandbox_memory_common::merge_ptr_len;
use sandbox_memory_common::split_ptr_len;
use sandbox_memory_common::Len;
use sandbox_memory_common::MemoryError;
use sandbox_memory_common::PtrLen;

/// per execution context view of the sandbox for the host
///
/// owns exactly one [`Memory`] for the lifetime of one guest invocation, or a serial run of
/// invocations sharing a sandbox instance
/// payloads cross the boundary as a packed [`PtrLen`] so a whole fat pointer travels as one
/// scalar
#[derive(Debug, Default)]
pub struct Env {
    memory: Memory,
}

impl Env {
    pub fn new() -> Env {
        Env::default()
    }

    /// wrap an existing memory, e.g. one built with an explicit initial size
    pub fn with_memory(memory: Memory) -> Env {
        Env { memory }
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    /// move a byte payload into sandbox memory
    ///
    /// allocates, copies, and hands back the packed pointer/length for the guest
    /// an empty payload faults as a zero sized allocation, there is nothing to point at
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<PtrLen, MemoryError> {
        let len: Len = bytes
            .len()
            .try_into()
            .map_err(|_| MemoryError::ExhaustedAddressSpace)?;
        let ptr = self.memory.allocate(len)?;
        self.memory.write_bytes(ptr, bytes)?;
        Ok(merge_ptr_len(ptr, len))
    }

    /// copy a payload out of sandbox memory, leaving the allocation live
    pub fn read_bytes(&self, ptr_len: PtrLen) -> Result<Vec<u8>, MemoryError> {
        let (ptr, len) = split_ptr_len(ptr_len);
        Ok(self.memory.read_bytes(ptr, len)?.to_vec())
    }

    /// copy a payload out of sandbox memory and release its allocation
    /// for one shot return values the guest hands back and never touches again
    pub fn consume_bytes(&mut self, ptr_len: PtrLen) -> Result<Vec<u8>, MemoryError> {
        let (ptr, len) = split_ptr_len(ptr_len);
        let bytes = self.memory.read_bytes(ptr, len)?.to_vec();
        self.memory.deallocate(ptr)?;
        Ok(bytes)
    }
}

use sandbox_memory_common::GuestPtr;
use sandbox_memory_common::Len;
use sandbox_memory_common::MemoryError;
use std::collections::BTreeMap;

/// size of one page of sandbox memory
pub const PAGE_SIZE: Len = 4096;

/// largest buffer the 32 bit address space can hold as whole pages
pub(crate) const MAX_MEMORY_SIZE: Len = Len::MAX - (PAGE_SIZE - 1);

/// a flat, growable, byte addressable memory for untrusted guest code
///
/// the buffer is the sole backing store for every guest address, exclusively owned, never
/// aliased outside this struct
/// a guest pointer is an index into the buffer, not a host pointer, so growing or shrinking
/// the buffer can never dangle anything on the host side
///
/// the memory is single owner by contract
/// exactly one execution context drives it for the lifetime of one guest invocation, so there
/// is no locking here, a host running guests concurrently gives each its own `Memory`
#[derive(Debug)]
pub struct Memory {
    /// every guest address lands in here
    /// always at least one page and always a whole number of pages
    data: Vec<u8>,
    /// the frontier: the first byte never handed out by bump allocation
    /// everything below it belongs to a live allocation or a free chunk
    pub(crate) offset: GuestPtr,
    /// live allocations, address to size, ranges disjoint
    pub(crate) allocated: BTreeMap<GuestPtr, Len>,
    /// reclaimed chunks available for reuse, address to size, disjoint from each other and
    /// from everything live
    pub(crate) deallocated: BTreeMap<GuestPtr, Len>,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

/// round `size` up to the next whole page
/// `None` when the rounded size does not fit the 32 bit address space
pub(crate) fn page_align(size: u64) -> Option<Len> {
    let pages = size.div_ceil(u64::from(PAGE_SIZE));
    Len::try_from(pages * u64::from(PAGE_SIZE)).ok()
}

impl Memory {
    /// a fresh one page memory with nothing allocated
    pub fn new() -> Memory {
        Memory::with_size(PAGE_SIZE)
    }

    /// a fresh memory of at least `size` bytes, rounded up to a whole number of pages
    ///
    /// saturates at the largest whole page buffer rather than failing, a host asking for more
    /// than 4GB of sandbox gets everything the address space can represent
    pub fn with_size(size: Len) -> Memory {
        let size = page_align(u64::from(size))
            .unwrap_or(MAX_MEMORY_SIZE)
            .max(PAGE_SIZE);
        Memory {
            data: vec![0; size as usize],
            offset: 0,
            allocated: BTreeMap::new(),
            deallocated: BTreeMap::new(),
        }
    }

    /// current buffer size in bytes
    pub fn size(&self) -> Len {
        self.data.len() as Len
    }

    /// current buffer size in whole pages
    pub fn pages(&self) -> Len {
        self.size() / PAGE_SIZE
    }

    /// set the buffer to `new_size` bytes, with a floor of one page
    ///
    /// growth zero fills the new tail and preserves every existing byte and address
    /// shrinking discards the tail, the caller is responsible for not truncating below a live
    /// allocation, nothing here defends against that
    /// allocation driven growth always page aligns before calling so the buffer stays a whole
    /// number of pages
    pub fn resize(&mut self, new_size: Len) {
        let new_size = new_size.max(PAGE_SIZE);
        if new_size > self.size() {
            tracing::trace!(old = self.size(), new = new_size, "growing sandbox memory");
        }
        self.data.resize(new_size as usize, 0);
    }

    /// every access funnels through here before touching the buffer
    /// computed in u64 so a hostile `ptr` near the top of the address space cannot wrap
    fn check_bounds(&self, ptr: GuestPtr, len: u64) -> Result<(), MemoryError> {
        if u64::from(ptr) + len > self.data.len() as u64 {
            return Err(MemoryError::OutOfBounds {
                ptr,
                len: len.try_into().unwrap_or(Len::MAX),
                size: self.size(),
            });
        }
        Ok(())
    }

    /// a bounds checked view of `len` bytes at `ptr`
    pub fn read_bytes(&self, ptr: GuestPtr, len: Len) -> Result<&[u8], MemoryError> {
        self.check_bounds(ptr, u64::from(len))?;
        Ok(&self.data[ptr as usize..ptr as usize + len as usize])
    }

    /// a bounds checked copy of `bytes` into the buffer at `ptr`
    pub fn write_bytes(&mut self, ptr: GuestPtr, bytes: &[u8]) -> Result<(), MemoryError> {
        self.check_bounds(ptr, bytes.len() as u64)?;
        self.data[ptr as usize..ptr as usize + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// a bounds checked fixed width copy out of the buffer
    /// feeds the `from_le_bytes` calls below, which is what commits every width to little
    /// endian no matter what the host machine is
    fn load_array<const N: usize>(&self, ptr: GuestPtr) -> Result<[u8; N], MemoryError> {
        self.check_bounds(ptr, N as u64)?;
        let mut bytes = [0; N];
        bytes.copy_from_slice(&self.data[ptr as usize..ptr as usize + N]);
        Ok(bytes)
    }

    pub fn load8s(&self, ptr: GuestPtr) -> Result<i8, MemoryError> {
        Ok(i8::from_le_bytes(self.load_array(ptr)?))
    }

    pub fn load8u(&self, ptr: GuestPtr) -> Result<u8, MemoryError> {
        Ok(u8::from_le_bytes(self.load_array(ptr)?))
    }

    pub fn load16s(&self, ptr: GuestPtr) -> Result<i16, MemoryError> {
        Ok(i16::from_le_bytes(self.load_array(ptr)?))
    }

    pub fn load16u(&self, ptr: GuestPtr) -> Result<u16, MemoryError> {
        Ok(u16::from_le_bytes(self.load_array(ptr)?))
    }

    pub fn load32s(&self, ptr: GuestPtr) -> Result<i32, MemoryError> {
        Ok(i32::from_le_bytes(self.load_array(ptr)?))
    }

    pub fn load32u(&self, ptr: GuestPtr) -> Result<u32, MemoryError> {
        Ok(u32::from_le_bytes(self.load_array(ptr)?))
    }

    pub fn load64s(&self, ptr: GuestPtr) -> Result<i64, MemoryError> {
        Ok(i64::from_le_bytes(self.load_array(ptr)?))
    }

    pub fn load64u(&self, ptr: GuestPtr) -> Result<u64, MemoryError> {
        Ok(u64::from_le_bytes(self.load_array(ptr)?))
    }

    /// 16 bytes read verbatim, no arithmetic interpretation and so no byte order either
    pub fn load128(&self, ptr: GuestPtr) -> Result<[u8; 16], MemoryError> {
        self.load_array(ptr)
    }

    pub fn store8(&mut self, ptr: GuestPtr, value: i8) -> Result<(), MemoryError> {
        self.write_bytes(ptr, &value.to_le_bytes())
    }

    pub fn store16(&mut self, ptr: GuestPtr, value: i16) -> Result<(), MemoryError> {
        self.write_bytes(ptr, &value.to_le_bytes())
    }

    pub fn store32(&mut self, ptr: GuestPtr, value: i32) -> Result<(), MemoryError> {
        self.write_bytes(ptr, &value.to_le_bytes())
    }

    pub fn store64(&mut self, ptr: GuestPtr, value: i64) -> Result<(), MemoryError> {
        self.write_bytes(ptr, &value.to_le_bytes())
    }

    /// 16 bytes written verbatim
    pub fn store128(&mut self, ptr: GuestPtr, value: &[u8; 16]) -> Result<(), MemoryError> {
        self.write_bytes(ptr, value)
    }
}

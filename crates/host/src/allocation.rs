use crate::memory::page_align;
use crate::memory::Memory;
use sandbox_memory_common::GuestPtr;
use sandbox_memory_common::Len;
use sandbox_memory_common::MemoryError;

impl Memory {
    /// carve `size` bytes out of the sandbox and hand back their address
    ///
    /// reclaimed chunks are reused before the frontier advances, best fit first so small
    /// requests stop eating the big chunks that big requests will want later
    /// when nothing reclaimed fits, the allocation is bumped at the frontier and the buffer
    /// grows to the next whole page if it has to
    ///
    /// the returned range is disjoint from every other live allocation and every free chunk
    pub fn allocate(&mut self, size: Len) -> Result<GuestPtr, MemoryError> {
        if size == 0 {
            return Err(MemoryError::ZeroSizedAllocation);
        }
        match self.find_containing(size) {
            Some((ptr, chunk_size)) => Ok(self.free_alloc(ptr, chunk_size, size)),
            None => self.grow_alloc(size),
        }
    }

    /// release the allocation at `ptr`, returning how many bytes it held
    ///
    /// anything that is not a live allocation address comes back as `InvalidPointer` with the
    /// tables untouched, a double free is indistinguishable from a pointer we never handed out
    pub fn deallocate(&mut self, ptr: GuestPtr) -> Result<Len, MemoryError> {
        let size = match self.allocated.remove(&ptr) {
            Some(size) => size,
            None => {
                tracing::debug!(ptr, "rejected deallocation of a pointer that is not live");
                return Err(MemoryError::InvalidPointer(ptr));
            }
        };
        self.insert_free(ptr, size);
        Ok(size)
    }

    /// best fit scan of the free table for a chunk of at least `size` bytes
    ///
    /// the map iterates in address order and only a strictly smaller chunk displaces the
    /// current candidate, so size ties resolve to the lowest address for free
    fn find_containing(&self, size: Len) -> Option<(GuestPtr, Len)> {
        let mut best: Option<(GuestPtr, Len)> = None;
        for (&ptr, &chunk_size) in &self.deallocated {
            if chunk_size >= size && best.map_or(true, |(_, best_size)| chunk_size < best_size) {
                best = Some((ptr, chunk_size));
            }
        }
        best
    }

    /// take `size` bytes from the front of the free chunk at `ptr`
    /// a nonzero tail goes back to the free table, a zero tail is discarded
    fn free_alloc(&mut self, ptr: GuestPtr, chunk_size: Len, size: Len) -> GuestPtr {
        self.deallocated.remove(&ptr);
        let remainder = chunk_size - size;
        if remainder > 0 {
            self.deallocated.insert(ptr + size, remainder);
        }
        self.allocated.insert(ptr, size);
        ptr
    }

    /// bump allocate at the frontier, growing the buffer to the next whole page when the
    /// request overshoots it
    fn grow_alloc(&mut self, size: Len) -> Result<GuestPtr, MemoryError> {
        let ptr = self.offset;
        let end = u64::from(ptr) + u64::from(size);
        if end > u64::from(self.size()) {
            let new_size = page_align(end).ok_or(MemoryError::ExhaustedAddressSpace)?;
            self.resize(new_size);
        }
        self.allocated.insert(ptr, size);
        self.offset = end as GuestPtr;
        Ok(ptr)
    }

    /// return a chunk to the free table, coalescing with address contiguous neighbours
    ///
    /// coalescing only ever replaces adjacent free entries with their union so it cannot
    /// introduce an overlap, at worst skipping it would fragment reuse
    fn insert_free(&mut self, ptr: GuestPtr, size: Len) {
        let mut ptr = ptr;
        let mut size = size;
        if let Some((&prev_ptr, &prev_size)) = self.deallocated.range(..ptr).next_back() {
            if prev_ptr + prev_size == ptr {
                self.deallocated.remove(&prev_ptr);
                ptr = prev_ptr;
                size += prev_size;
            }
        }
        if let Some(&next_size) = self.deallocated.get(&(ptr + size)) {
            self.deallocated.remove(&(ptr + size));
            size += next_size;
        }
        self.deallocated.insert(ptr, size);
    }

    /// verify every structural invariant of the memory, for tests to run after mutation
    ///
    /// checks that the buffer is whole pages of at least one page, the frontier is inside the
    /// buffer, every table entry ends at or below the frontier, and no two entries across the
    /// allocation and free tables overlap
    pub fn check_invariants(&self) -> Result<(), String> {
        use crate::memory::PAGE_SIZE;

        if self.size() < PAGE_SIZE {
            return Err(format!("buffer is {} bytes, smaller than a page", self.size()));
        }
        if self.size() % PAGE_SIZE != 0 {
            return Err(format!("buffer is {} bytes, not whole pages", self.size()));
        }
        if self.offset > self.size() {
            return Err(format!(
                "frontier {} is past the end of the {} byte buffer",
                self.offset,
                self.size()
            ));
        }

        let mut entries: Vec<(GuestPtr, Len, &str)> = self
            .allocated
            .iter()
            .map(|(&ptr, &size)| (ptr, size, "allocated"))
            .chain(
                self.deallocated
                    .iter()
                    .map(|(&ptr, &size)| (ptr, size, "deallocated")),
            )
            .collect();
        entries.sort_unstable();

        let mut last_end: u64 = 0;
        for (ptr, size, table) in entries {
            let end = u64::from(ptr) + u64::from(size);
            if u64::from(ptr) < last_end {
                return Err(format!("{table} chunk at {ptr} overlaps the chunk before it"));
            }
            if end > u64::from(self.offset) {
                return Err(format!(
                    "{table} chunk at {ptr} ends at {end}, past the frontier {}",
                    self.offset
                ));
            }
            last_end = end;
        }
        Ok(())
    }
}

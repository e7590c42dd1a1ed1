use crate::GuestPtr;
use crate::Len;

/// a guest pointer and a length packed into a single u64 scalar
///
/// the low half is the pointer, the high half is the length
/// exists so the host can return a whole fat pointer across the guest boundary as one value
/// without relying on compiler or allocator specific layout of slices or tuples
pub type PtrLen = u64;

/// pack a pointer and a length into a [`PtrLen`]
pub fn merge_ptr_len(ptr: GuestPtr, len: Len) -> PtrLen {
    PtrLen::from(ptr) | (PtrLen::from(len) << 32)
}

/// split a [`PtrLen`] back into its pointer and length
pub fn split_ptr_len(ptr_len: PtrLen) -> (GuestPtr, Len) {
    (ptr_len as GuestPtr, (ptr_len >> 32) as Len)
}

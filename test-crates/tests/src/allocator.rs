use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use sandbox_memory_host::prelude::*;

/// the exact lifecycle a host walks a fresh sandbox through: default construction, a small
/// allocation, a growth forcing allocation, then reuse of reclaimed space
#[test]
fn fresh_sandbox_walkthrough() {
    let mut memory = Memory::new();
    assert_eq!(PAGE_SIZE, memory.size());

    let first = memory.allocate(10).unwrap();
    assert_eq!(0, first);

    // 10 + 4090 = 4100 does not fit one page, the buffer grows to two
    let second = memory.allocate(4090).unwrap();
    assert_eq!(10, second);
    assert_eq!(2 * PAGE_SIZE, memory.size());

    memory.deallocate(first).unwrap();
    // the freed 10 bytes at 0 are reused rather than bumping at 4100
    assert_eq!(first, memory.allocate(5).unwrap());

    memory.check_invariants().unwrap();
}

/// growing for a big allocation never disturbs bytes already written through earlier
/// allocations
#[test]
fn growth_is_invisible_to_existing_allocations() {
    let mut memory = Memory::new();
    let mut written = vec![];
    for i in 0..8 {
        let ptr = memory.allocate(64).unwrap();
        let value = i64::from(i) * 0x0101_0101_0101_0101;
        memory.store64(ptr, value).unwrap();
        written.push((ptr, value));
    }

    memory.allocate(16 * PAGE_SIZE).unwrap();

    for (ptr, value) in written {
        assert_eq!(value, memory.load64s(ptr).unwrap());
    }
    memory.check_invariants().unwrap();
}

/// a long arbitrary allocate/deallocate/store interleaving never lets two live ranges alias
/// each other, checked by writing a distinct fill through every live allocation and reading
/// them all back
#[test]
fn live_allocations_never_alias() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut memory = Memory::new();
    let mut live: Vec<(GuestPtr, Len, u8)> = vec![];

    for round in 0..500 {
        if live.is_empty() || rng.gen_bool(0.55) {
            let len = rng.gen_range(1..256);
            let ptr = memory.allocate(len).unwrap();
            let fill = (round % 251) as u8;
            memory.write_bytes(ptr, &vec![fill; len as usize]).unwrap();
            live.push((ptr, len, fill));
        } else {
            let (ptr, _, _) = live.swap_remove(rng.gen_range(0..live.len()));
            memory.deallocate(ptr).unwrap();
        }

        for &(ptr, len, fill) in &live {
            assert_eq!(
                vec![fill; len as usize],
                memory.read_bytes(ptr, len).unwrap(),
                "allocation at {ptr} was clobbered"
            );
        }
        memory.check_invariants().unwrap();
    }
}

/// churn the same sandbox hard and confirm coalescing keeps reclaimed space usable: after
/// everything is freed, one allocation spanning all of it fits without growing the buffer
#[test]
fn full_churn_leaves_one_reusable_region() {
    let mut memory = Memory::new();
    let ptrs: Vec<GuestPtr> = (0..16).map(|_| memory.allocate(256).unwrap()).collect();
    let size_before = memory.size();

    // free in an order that exercises both coalescing directions
    for ptr in ptrs.iter().rev().chain(ptrs.iter()) {
        let _ = memory.deallocate(*ptr);
    }

    assert_eq!(0, memory.allocate(16 * 256).unwrap());
    assert_eq!(size_before, memory.size());
    memory.check_invariants().unwrap();
}

/// explicit host driven growth through resize behaves like allocation driven growth
#[test]
fn host_driven_resize() {
    let mut memory = Memory::with_size(PAGE_SIZE);
    memory.store8(100, 42).unwrap();
    memory.resize(4 * PAGE_SIZE);
    assert_eq!(4, memory.pages());
    assert_eq!(42, memory.load8s(100).unwrap());
    memory.check_invariants().unwrap();
}

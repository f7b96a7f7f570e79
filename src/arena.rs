// Copyright 2022 Matthew Ingwersen.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! Implementation of the [`Arena`] bump allocator.

use std::ffi::CStr;
use std::mem;
use std::os::raw::c_char;
use std::slice;

/// The alignment of every non-empty allocation: the size of a pointer.
pub const ALIGNMENT: usize = mem::size_of::<*mut c_char>();

/// A bump allocator over a caller-supplied buffer.
///
/// Name-service modules are handed a buffer by the resolving process
/// and must build their results inside it; they may not allocate from
/// the heap. An `Arena` hands out consecutive, non-overlapping,
/// zero-filled pieces of such a buffer. It never grows and never frees
/// individual allocations: everything it hands out lives exactly as
/// long as the underlying buffer borrow `'a`.
///
/// Every non-empty allocation starts at a pointer-aligned address. The
/// padding needed to realign the cursor after an allocation is skipped
/// and never reused, so at most [`ALIGNMENT`]` - 1` bytes are wasted
/// per allocation.
///
/// Running out of space is the only failure mode. It is reported by
/// returning [`None`] and leaves the arena and all previous allocations
/// untouched.
#[derive(Debug)]
pub struct Arena<'a> {
    remaining: &'a mut [u8],
    capacity: usize,
}

impl<'a> Arena<'a> {
    /// Creates an arena over `buffer`. The cursor starts at the first
    /// pointer-aligned address in the buffer; if there is none, the
    /// arena starts out exhausted.
    pub fn new(buffer: &'a mut [u8]) -> Self {
        let capacity = buffer.len();
        let padding = padding_for(buffer);
        Self {
            remaining: &mut buffer[padding..],
            capacity,
        }
    }

    /// Returns the length of the underlying buffer.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of bytes still available for allocation.
    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }

    /// Returns the number of bytes consumed so far, including alignment
    /// padding.
    pub fn used(&self) -> usize {
        self.capacity - self.remaining.len()
    }

    /// Allocates `size` zeroed bytes.
    ///
    /// A zero-size request always succeeds, even when the arena is
    /// exhausted, and returns an empty slice that consumes no space.
    pub fn alloc(&mut self, size: usize) -> Option<&'a mut [u8]> {
        if size == 0 {
            return Some(&mut []);
        }
        if size > self.remaining.len() {
            log::trace!(
                "arena exhausted: requested {} bytes, {} remaining",
                size,
                self.remaining.len(),
            );
            return None;
        }

        let remaining = mem::take(&mut self.remaining);
        let (allocation, rest) = remaining.split_at_mut(size);
        let padding = padding_for(rest);
        self.remaining = &mut rest[padding..];
        allocation.fill(0);
        Some(allocation)
    }

    /// Allocates an array of `len` null C string pointers.
    pub fn alloc_pointers(&mut self, len: usize) -> Option<&'a mut [*mut c_char]> {
        if len == 0 {
            return Some(&mut []);
        }
        let size = len.checked_mul(mem::size_of::<*mut c_char>())?;
        let bytes = self.alloc(size)?;

        // SAFETY: non-empty allocations start pointer-aligned, the
        // length is exactly len pointers, and all-zero bytes are a
        // valid (null) pointer. The byte slice is consumed here, so the
        // returned slice is the only reference to the memory.
        Some(unsafe { slice::from_raw_parts_mut(bytes.as_mut_ptr().cast(), len) })
    }

    /// Copies `s` into the arena as a NUL-terminated C string.
    ///
    /// Like C's `strdup`, the copy stops at the first NUL byte in `s`,
    /// if any. Since the terminator is always included, this never
    /// makes a zero-size allocation.
    pub fn strdup(&mut self, s: &str) -> Option<&'a CStr> {
        let bytes = s.as_bytes();
        let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        let copy = self.alloc(len + 1)?;
        copy[..len].copy_from_slice(&bytes[..len]);
        let copy: &'a [u8] = copy;
        CStr::from_bytes_with_nul(copy).ok()
    }
}

/// Returns how many bytes must be skipped from the start of `bytes` to
/// reach a pointer-aligned address, capped at the length of `bytes`.
fn padding_for(bytes: &[u8]) -> usize {
    bytes.as_ptr().align_offset(ALIGNMENT).min(bytes.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A pointer-aligned backing store for tests that care about exact
    /// capacities.
    #[repr(C, align(16))]
    struct Aligned<const N: usize>([u8; N]);

    fn is_aligned(bytes: &[u8]) -> bool {
        bytes.as_ptr() as usize % ALIGNMENT == 0
    }

    #[test]
    fn allocations_are_aligned_disjoint_and_zeroed() {
        let mut storage = Aligned([0xaa; 256]);
        let base = storage.0.as_ptr() as usize;
        let mut arena = Arena::new(&mut storage.0);

        let mut ranges = Vec::new();
        for size in [1, 3, ALIGNMENT, 13, 2 * ALIGNMENT + 1] {
            let allocation = arena.alloc(size).unwrap();
            assert_eq!(allocation.len(), size);
            assert!(is_aligned(allocation));
            assert!(allocation.iter().all(|&b| b == 0));
            let start = allocation.as_ptr() as usize - base;
            ranges.push((start, start + size));
            allocation.fill(0xff);
        }

        for (i, a) in ranges.iter().enumerate() {
            assert!(a.1 <= 256);
            for b in &ranges[i + 1..] {
                assert!(a.1 <= b.0 || b.1 <= a.0, "{:?} overlaps {:?}", a, b);
            }
        }
    }

    #[test]
    fn padding_is_skipped_after_unaligned_sizes() {
        let mut storage = Aligned([0; 64]);
        let mut arena = Arena::new(&mut storage.0);
        arena.alloc(1).unwrap();
        assert_eq!(arena.used(), ALIGNMENT);
        arena.alloc(ALIGNMENT).unwrap();
        assert_eq!(arena.used(), 2 * ALIGNMENT);
    }

    #[test]
    fn exhaustion_fails_without_side_effects() {
        let mut storage = Aligned([0; 32]);
        let mut arena = Arena::new(&mut storage.0);

        let first = arena.alloc(16).unwrap();
        first.copy_from_slice(b"0123456789abcdef");
        let remaining = arena.remaining();
        assert_eq!(remaining, 16);

        assert!(arena.alloc(17).is_none());
        assert_eq!(arena.remaining(), remaining);
        assert_eq!(first, b"0123456789abcdef");

        // The rest of the buffer is still usable.
        assert_eq!(arena.alloc(16).unwrap().len(), 16);
        assert!(arena.alloc(1).is_none());
    }

    #[test]
    fn zero_size_allocations_always_succeed() {
        let mut storage = Aligned([0; 8]);
        let mut arena = Arena::new(&mut storage.0);
        assert!(arena.alloc(0).is_some());
        arena.alloc(8).unwrap();
        assert_eq!(arena.remaining(), 0);
        assert!(arena.alloc(0).is_some());
        assert!(arena.alloc_pointers(0).is_some());

        let mut empty: [u8; 0] = [];
        let mut arena = Arena::new(&mut empty);
        assert!(arena.alloc(0).is_some());
        assert!(arena.alloc(1).is_none());
    }

    #[test]
    fn unaligned_buffer_start_is_skipped() {
        let mut storage = Aligned([0; 64]);
        let mut arena = Arena::new(&mut storage.0[1..]);
        assert_eq!(arena.capacity(), 63);
        assert_eq!(arena.used(), ALIGNMENT - 1);
        let allocation = arena.alloc(1).unwrap();
        assert!(is_aligned(allocation));
    }

    #[test]
    fn tiny_unaligned_buffer_starts_exhausted() {
        let mut storage = Aligned([0; 16]);
        let mut arena = Arena::new(&mut storage.0[1..ALIGNMENT - 1]);
        assert_eq!(arena.remaining(), 0);
        assert!(arena.alloc(1).is_none());
    }

    #[test]
    fn pointer_arrays_are_null() {
        let mut storage = Aligned([0xff; 64]);
        let mut arena = Arena::new(&mut storage.0);
        let pointers = arena.alloc_pointers(3).unwrap();
        assert_eq!(pointers.len(), 3);
        assert!(pointers.iter().all(|p| p.is_null()));
        assert_eq!(arena.used(), 3 * ALIGNMENT);
    }

    #[test]
    fn pointer_array_size_overflow_fails() {
        let mut storage = Aligned([0; 16]);
        let mut arena = Arena::new(&mut storage.0);
        assert!(arena.alloc_pointers(usize::MAX).is_none());
    }

    #[test]
    fn strdup_includes_terminator() {
        let mut storage = Aligned([0xff; 32]);
        let mut arena = Arena::new(&mut storage.0);
        let copy = arena.strdup("foo.local").unwrap();
        assert_eq!(copy.to_bytes_with_nul(), b"foo.local\0");
        assert_eq!(arena.used(), (10 + ALIGNMENT - 1) / ALIGNMENT * ALIGNMENT);

        let empty = arena.strdup("").unwrap();
        assert_eq!(empty.to_bytes_with_nul(), b"\0");
    }

    #[test]
    fn strdup_stops_at_interior_nul() {
        let mut storage = Aligned([0; 32]);
        let mut arena = Arena::new(&mut storage.0);
        let copy = arena.strdup("foo\0bar").unwrap();
        assert_eq!(copy.to_bytes(), b"foo");
    }

    #[test]
    fn strdup_propagates_exhaustion() {
        let mut storage = Aligned([0; 16]);
        let mut arena = Arena::new(&mut storage.0);
        assert!(arena.strdup("a-name-that-does-not-fit").is_none());
        assert_eq!(arena.used(), 0);
    }
}

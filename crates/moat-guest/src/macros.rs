//! Declarative macros for MOAT guests.
//!
//! Provides `moat_allocator!` to export the `allocate`/`deallocate` pair
//! the host calls to move buffers into the guest.

/// Declares a static [`MemoryArena`](crate::MemoryArena) and exports the
/// boundary allocator functions backed by it.
///
/// This macro creates:
/// - A `LazyLock<MemoryArena>` static with the given name
/// - `extern "C" fn allocate(size: u32) -> u32`
/// - `extern "C" fn deallocate(ptr: u32, size: u32)`
///
/// A failed allocation aborts the guest, which traps the current invocation.
/// Unwinding out of an `extern "C"` function is never attempted.
///
/// # Usage
///
/// ```ignore
/// use moat_guest::moat_allocator;
///
/// moat_allocator!(ARENA);
/// // or with an explicit budget in bytes:
/// // moat_allocator!(ARENA, 16 * 1024 * 1024);
///
/// #[no_mangle]
/// pub extern "C" fn handle(packed: u64) -> u64 {
///     let input = ARENA.bytes_from_packed(packed).unwrap_or_default();
///     ARENA.packed_from_bytes(&input).unwrap_or(0)
/// }
/// ```
#[macro_export]
macro_rules! moat_allocator {
    ($arena:ident) => {
        $crate::moat_allocator!($arena, $crate::DEFAULT_MAX_ALLOCATION_BYTES);
    };
    ($arena:ident, $max_bytes:expr $(,)?) => {
        static $arena: ::std::sync::LazyLock<$crate::MemoryArena> =
            ::std::sync::LazyLock::new(|| {
                $crate::MemoryArena::new($crate::ArenaConfig {
                    max_bytes: $max_bytes,
                })
            });

        /// Host entry point: allocate `size` bytes in guest memory.
        #[no_mangle]
        pub extern "C" fn allocate(size: u32) -> u32 {
            $arena.allocate_or_abort(size)
        }

        /// Host entry point: release a buffer returned by `allocate`.
        #[no_mangle]
        pub extern "C" fn deallocate(ptr: u32, size: u32) {
            $arena.deallocate(ptr, size);
        }
    };
}

//! # moat-guest
//!
//! Guest side of MOAT's cross-boundary memory protocol.
//!
//! Host and guest exchange byte buffers using only integers: a buffer is a
//! `u64` holding its pointer and length. This crate provides:
//! - **Packing**: `pack` / `unpack` with corruption checks
//! - **`MemoryArena`**: tracked, budgeted buffers pinned until released
//! - **`recover`**: panic containment that resets the arena
//! - **`moat_allocator!` macro**: the exported `allocate`/`deallocate` pair
//!
//! # Quick Start
//!
//! ```ignore
//! use moat_guest::moat_allocator;
//!
//! moat_allocator!(ARENA);
//!
//! #[no_mangle]
//! pub extern "C" fn run(packed: u64) -> u64 {
//!     moat_guest::recover(&ARENA, || {
//!         let input = ARENA.bytes_from_packed(packed)?;
//!         ARENA.packed_from_bytes(&input)
//!     })
//!     .and_then(|r| r)
//!     .unwrap_or(0)
//! }
//! ```

pub mod abi;
pub mod arena;
pub mod error;
pub mod macros;
pub mod recover;

pub use abi::{pack, read_json, unpack, write_json};
pub use arena::{ArenaConfig, MemoryArena, DEFAULT_MAX_ALLOCATION_BYTES};
pub use error::AbiError;
pub use recover::recover;

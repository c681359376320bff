//! Tracked allocations for buffers shared with the host.
//!
//! Every buffer handed across the boundary is pinned in the arena until the
//! other side deallocates it, so nothing the host still references can be
//! freed from under it. A global byte budget bounds the total; exceeding it
//! is treated as runaway or adversarial behaviour and fails the call.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::abi::{pack, unpack};
use crate::error::AbiError;

/// Default allocation budget: 100 MiB.
pub const DEFAULT_MAX_ALLOCATION_BYTES: u64 = 100 * 1024 * 1024;

/// Pointer alignment on targets without a 32-bit address space.
#[cfg(not(target_pointer_width = "32"))]
const ALIGN: u32 = 8;

/// Arena settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Upper bound on the sum of live allocation sizes.
    pub max_bytes: u64,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_ALLOCATION_BYTES,
        }
    }
}

struct ArenaState {
    buffers: BTreeMap<u32, Vec<u8>>,
    total: u64,
    limit: u64,
}

impl ArenaState {
    /// On 32-bit targets (wasm32) the buffer's own address is the pointer
    /// the host reads through linear memory.
    #[cfg(target_pointer_width = "32")]
    fn assign_ptr(&mut self, buffer: &[u8], _size: u32) -> Result<u32, AbiError> {
        Ok(buffer.as_ptr() as usize as u32)
    }

    /// Elsewhere pointers are synthetic: non-zero and aligned, placed in
    /// the first gap between live buffers that fits, so freed ranges are
    /// handed out again.
    #[cfg(not(target_pointer_width = "32"))]
    fn assign_ptr(&mut self, _buffer: &[u8], size: u32) -> Result<u32, AbiError> {
        let size = u64::from(size);
        let mut candidate = u64::from(ALIGN);
        for (&base, buffer) in &self.buffers {
            if candidate + size <= u64::from(base) {
                break;
            }
            candidate = candidate.max(align_up(u64::from(base) + buffer.len() as u64));
        }
        if candidate + size > u64::from(u32::MAX) {
            return Err(AbiError::AddressSpaceExhausted { requested: size });
        }
        Ok(candidate as u32)
    }

    /// Finds the buffer containing `ptr` and checks `len` bytes fit.
    ///
    /// Returns the buffer's base pointer and the offset of `ptr` in it.
    fn locate(&self, ptr: u32, len: usize) -> Result<(u32, usize), AbiError> {
        let (&base, buffer) = self
            .buffers
            .range(..=ptr)
            .next_back()
            .ok_or(AbiError::UnknownPointer { ptr })?;
        let offset = (ptr - base) as usize;
        if offset >= buffer.len() {
            return Err(AbiError::UnknownPointer { ptr });
        }
        let available = buffer.len() - offset;
        if len > available {
            return Err(AbiError::OutOfBounds {
                ptr,
                len: len as u64,
                capacity: available,
            });
        }
        Ok((base, offset))
    }
}

#[cfg(not(target_pointer_width = "32"))]
fn align_up(offset: u64) -> u64 {
    offset.next_multiple_of(u64::from(ALIGN))
}

/// Mutex-guarded allocation tracker for one guest instance.
pub struct MemoryArena {
    state: Mutex<ArenaState>,
}

impl fmt::Debug for MemoryArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("MemoryArena")
            .field("allocations", &state.buffers.len())
            .field("allocated_bytes", &state.total)
            .field("limit", &state.limit)
            .finish()
    }
}

impl Default for MemoryArena {
    fn default() -> Self {
        Self::new(ArenaConfig::default())
    }
}

impl MemoryArena {
    pub fn new(config: ArenaConfig) -> Self {
        Self {
            state: Mutex::new(ArenaState {
                buffers: BTreeMap::new(),
                total: 0,
                limit: config.max_bytes,
            }),
        }
    }

    /// Allocates a zeroed buffer of `size` bytes and returns its pointer.
    ///
    /// A zero-sized request returns the null pointer and tracks nothing.
    ///
    /// # Errors
    ///
    /// Returns [`AbiError::BudgetExceeded`] if the allocation would push
    /// the tracked total past the limit. Existing allocations are kept.
    pub fn allocate(&self, size: u32) -> Result<u32, AbiError> {
        if size == 0 {
            return Ok(0);
        }
        let requested = u64::from(size);
        let mut state = self.lock();
        if state.total.saturating_add(requested) > state.limit {
            tracing::warn!(
                requested,
                current = state.total,
                limit = state.limit,
                "allocation budget exceeded"
            );
            return Err(AbiError::BudgetExceeded {
                requested,
                current: state.total,
                limit: state.limit,
            });
        }
        let buffer = vec![0u8; size as usize];
        let ptr = state.assign_ptr(&buffer, size)?;
        state.buffers.insert(ptr, buffer);
        state.total += requested;
        tracing::trace!(ptr, size, "buffer allocated");
        Ok(ptr)
    }

    /// Like [`allocate`](Self::allocate), but logs the error and aborts the
    /// process on failure. Used by exported entry points, which have no
    /// error channel back to the host.
    pub fn allocate_or_abort(&self, size: u32) -> u32 {
        match self.allocate(size) {
            Ok(ptr) => ptr,
            Err(e) => {
                tracing::error!(size, error = %e, "boundary allocation failed, aborting");
                std::process::abort()
            }
        }
    }

    /// Releases the buffer at `ptr`.
    ///
    /// The tracked total is reduced by the stored length; `size` is only
    /// compared against it. Untracked pointers are ignored.
    pub fn deallocate(&self, ptr: u32, size: u32) {
        let mut state = self.lock();
        match state.buffers.remove(&ptr) {
            Some(buffer) => {
                let actual = buffer.len() as u64;
                state.total = state.total.saturating_sub(actual);
                if actual != u64::from(size) {
                    tracing::debug!(ptr, size, actual, "deallocate size mismatch, using tracked length");
                }
                tracing::trace!(ptr, actual, "buffer released");
            }
            None => tracing::trace!(ptr, "deallocate of untracked pointer ignored"),
        }
    }

    /// Drops every tracked buffer.
    pub fn release_all(&self) {
        let mut state = self.lock();
        let released = state.buffers.len();
        state.buffers.clear();
        state.total = 0;
        tracing::debug!(released, "arena released");
    }

    pub fn allocation_count(&self) -> usize {
        self.lock().buffers.len()
    }

    pub fn allocated_bytes(&self) -> u64 {
        self.lock().total
    }

    pub fn limit(&self) -> u64 {
        self.lock().limit
    }

    /// Changes the budget. Live allocations above a lowered limit are kept;
    /// only new allocations are refused.
    pub fn set_limit(&self, max_bytes: u64) {
        self.lock().limit = max_bytes;
    }

    /// Copies `len` bytes out of the buffer a packed value points at.
    ///
    /// # Errors
    ///
    /// Returns [`AbiError::InvalidPacked`] for corrupt packed values and
    /// [`AbiError::UnknownPointer`] / [`AbiError::OutOfBounds`] when the
    /// range is not inside a tracked buffer.
    pub fn bytes_from_packed(&self, packed: u64) -> Result<Vec<u8>, AbiError> {
        let (ptr, len) = unpack(packed)?;
        if len == 0 {
            return Ok(Vec::new());
        }
        let len = len as usize;
        let state = self.lock();
        let (base, offset) = state.locate(ptr, len)?;
        state
            .buffers
            .get(&base)
            .map(|buffer| buffer[offset..offset + len].to_vec())
            .ok_or(AbiError::UnknownPointer { ptr })
    }

    /// Allocates a buffer holding a copy of `bytes` and returns it packed.
    ///
    /// # Errors
    ///
    /// Returns [`AbiError::BudgetExceeded`] if the copy does not fit.
    pub fn packed_from_bytes(&self, bytes: &[u8]) -> Result<u64, AbiError> {
        if bytes.is_empty() {
            return Ok(0);
        }
        let size = u32::try_from(bytes.len()).map_err(|_| AbiError::BudgetExceeded {
            requested: bytes.len() as u64,
            current: self.allocated_bytes(),
            limit: self.limit(),
        })?;
        let ptr = self.allocate(size)?;
        self.write(ptr, bytes)?;
        pack(ptr, size)
    }

    /// Releases the buffer a packed value points at.
    ///
    /// # Errors
    ///
    /// Returns [`AbiError::InvalidPacked`] for corrupt packed values.
    pub fn deallocate_packed(&self, packed: u64) -> Result<(), AbiError> {
        let (ptr, len) = unpack(packed)?;
        self.deallocate(ptr, len);
        Ok(())
    }

    /// Copies `bytes` into tracked memory starting at `ptr`.
    ///
    /// # Errors
    ///
    /// Returns [`AbiError::UnknownPointer`] / [`AbiError::OutOfBounds`]
    /// if the destination range is not inside a tracked buffer.
    pub fn write(&self, ptr: u32, bytes: &[u8]) -> Result<(), AbiError> {
        if bytes.is_empty() {
            return Ok(());
        }
        let mut state = self.lock();
        let (base, offset) = state.locate(ptr, bytes.len())?;
        let buffer = state
            .buffers
            .get_mut(&base)
            .ok_or(AbiError::UnknownPointer { ptr })?;
        buffer[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, ArenaState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

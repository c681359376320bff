//! Pointer/length packing for values that cross the guest boundary.
//!
//! A buffer is described by a single `u64`: the pointer in the high 32
//! bits and the length in the low 32 bits. The packed value `0` is the
//! empty buffer. A null pointer with a non-zero length can only come from
//! corruption and is rejected on both sides.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::arena::MemoryArena;
use crate::error::AbiError;

/// Packs a pointer and length into one `u64`.
///
/// # Errors
///
/// Returns [`AbiError::InvalidPacked`] if `ptr == 0` and `len > 0`.
pub fn pack(ptr: u32, len: u32) -> Result<u64, AbiError> {
    if ptr == 0 && len > 0 {
        return Err(AbiError::InvalidPacked { len });
    }
    Ok((u64::from(ptr) << 32) | u64::from(len))
}

/// Splits a packed value into `(ptr, len)`.
///
/// # Errors
///
/// Returns [`AbiError::InvalidPacked`] for a null pointer with a non-zero
/// length.
pub fn unpack(packed: u64) -> Result<(u32, u32), AbiError> {
    let ptr = (packed >> 32) as u32;
    let len = packed as u32;
    if ptr == 0 && len > 0 {
        return Err(AbiError::InvalidPacked { len });
    }
    Ok((ptr, len))
}

/// Deserializes a JSON payload from a packed buffer.
///
/// # Errors
///
/// Propagates arena errors, and returns [`AbiError::Payload`] if the bytes
/// are not valid JSON for `T`.
pub fn read_json<T: DeserializeOwned>(arena: &MemoryArena, packed: u64) -> Result<T, AbiError> {
    let bytes = arena.bytes_from_packed(packed)?;
    serde_json::from_slice(&bytes).map_err(|e| AbiError::Payload {
        reason: e.to_string(),
    })
}

/// Serializes `value` as JSON into a freshly allocated buffer.
///
/// # Errors
///
/// Returns [`AbiError::Payload`] if serialization fails, or an allocation
/// error from the arena.
pub fn write_json<T: Serialize>(arena: &MemoryArena, value: &T) -> Result<u64, AbiError> {
    let bytes = serde_json::to_vec(value).map_err(|e| AbiError::Payload {
        reason: e.to_string(),
    })?;
    arena.packed_from_bytes(&bytes)
}

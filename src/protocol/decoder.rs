//! # Telemetry Decoder
//!
//! Decodes fixed-layout little-endian response payloads into typed
//! telemetry records.
//!
//! Transport strips the frame terminator before payloads reach this
//! module; everything here operates on bare frame bodies and never
//! performs I/O.

use crate::error::{BenchError, Result};

use super::wire::{
    AltimeterReading, ImuReading, LoadCellReading, ShockReading, StorageUpdate, WireRecord,
};

/// Decode a response frame body as a fixed-layout record
///
/// Fails with [`BenchError::Decode`] if the payload is shorter than the
/// record's declared width. Trailing bytes are ignored.
pub fn decode_record<T: WireRecord>(bytes: &[u8]) -> Result<T> {
    T::decode(bytes)
}

/// Extract the acknowledgment byte from a response frame body
///
/// The boards echo the opcode of the command they just performed as the
/// first byte of the response.
pub fn decode_ack(bytes: &[u8]) -> Result<u8> {
    bytes.first().copied().ok_or(BenchError::Decode {
        expected: 1,
        actual: 0,
    })
}

fn check_len(bytes: &[u8], expected: usize) -> Result<()> {
    if bytes.len() < expected {
        return Err(BenchError::Decode {
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

// Field readers; callers check the payload length first.
fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
}

fn i32_at(bytes: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
}

fn f32_at(bytes: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
}

impl WireRecord for u32 {
    const WIRE_SIZE: usize = 4;

    fn decode(bytes: &[u8]) -> Result<Self> {
        check_len(bytes, Self::WIRE_SIZE)?;
        Ok(u32_at(bytes, 0))
    }
}

impl WireRecord for StorageUpdate {
    const WIRE_SIZE: usize = 8;

    fn decode(bytes: &[u8]) -> Result<Self> {
        check_len(bytes, Self::WIRE_SIZE)?;
        Ok(Self {
            file_size: u32_at(bytes, 0),
            last_timestamp: u32_at(bytes, 4),
        })
    }
}

impl WireRecord for LoadCellReading {
    const WIRE_SIZE: usize = 4;

    fn decode(bytes: &[u8]) -> Result<Self> {
        check_len(bytes, Self::WIRE_SIZE)?;
        Ok(Self {
            raw: f32_at(bytes, 0),
        })
    }
}

impl WireRecord for ShockReading {
    const WIRE_SIZE: usize = 16;

    fn decode(bytes: &[u8]) -> Result<Self> {
        check_len(bytes, Self::WIRE_SIZE)?;
        Ok(Self {
            acc_x: f32_at(bytes, 0),
            acc_y: f32_at(bytes, 4),
            acc_z: f32_at(bytes, 8),
            timestamp: u32_at(bytes, 12),
        })
    }
}

impl WireRecord for ImuReading {
    const WIRE_SIZE: usize = 28;

    fn decode(bytes: &[u8]) -> Result<Self> {
        check_len(bytes, Self::WIRE_SIZE)?;
        Ok(Self {
            acc_x: f32_at(bytes, 0),
            acc_y: f32_at(bytes, 4),
            acc_z: f32_at(bytes, 8),
            gyro_x: f32_at(bytes, 12),
            gyro_y: f32_at(bytes, 16),
            gyro_z: f32_at(bytes, 20),
            timestamp: u32_at(bytes, 24),
        })
    }
}

impl WireRecord for AltimeterReading {
    const WIRE_SIZE: usize = 12;

    fn decode(bytes: &[u8]) -> Result<Self> {
        check_len(bytes, Self::WIRE_SIZE)?;
        Ok(Self {
            temp_centi: i32_at(bytes, 0),
            pressure_centi: i32_at(bytes, 4),
            timestamp: u32_at(bytes, 8),
        })
    }
}

//! Fixed-width record codec
//!
//! Layout (little-endian): `high:f32 | low:f32 | close:f32 | volume:f32 | close_time:u32`.
//! Floats are stored by their IEEE-754 bit pattern, so NaN and infinities pass
//! through unchanged.

use crate::Candle;
use bytes::{Buf, BufMut};

/// Size of one encoded candle (5 fields of 4 bytes)
pub const CANDLE_BYTE_SIZE: usize = 5 * 4;

/// Encode one candle into its 20-byte record
pub fn encode(candle: &Candle) -> [u8; CANDLE_BYTE_SIZE] {
    let mut record = [0u8; CANDLE_BYTE_SIZE];
    let mut buf = &mut record[..];
    buf.put_f32_le(candle.high);
    buf.put_f32_le(candle.low);
    buf.put_f32_le(candle.close);
    buf.put_f32_le(candle.volume);
    buf.put_u32_le(candle.close_time);
    record
}

/// Decode one candle from a 20-byte record
pub fn decode(record: &[u8; CANDLE_BYTE_SIZE]) -> Candle {
    let mut buf = &record[..];
    Candle {
        high: buf.get_f32_le(),
        low: buf.get_f32_le(),
        close: buf.get_f32_le(),
        volume: buf.get_f32_le(),
        close_time: buf.get_u32_le(),
    }
}

/// Decode a buffer holding a whole number of records.
///
/// Callers check alignment first; a trailing partial record is ignored here.
pub(crate) fn decode_all(bytes: &[u8], dst: &mut Vec<Candle>) {
    dst.extend(bytes.chunks_exact(CANDLE_BYTE_SIZE).map(|chunk| {
        let mut record = [0u8; CANDLE_BYTE_SIZE];
        record.copy_from_slice(chunk);
        decode(&record)
    }));
}

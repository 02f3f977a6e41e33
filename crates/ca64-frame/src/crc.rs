//! CRC-16/CCITT-FALSE (poly 0x1021, init 0xFFFF, no reflection, no xorout).

/// Initial register value.
pub const CRC_INIT: u16 = 0xFFFF;

const POLY: u16 = 0x1021;

/// Compute the checksum of `data` from the standard initial value.
pub fn crc16(data: &[u8]) -> u16 {
    crc16_update(CRC_INIT, data)
}

/// Continue a checksum over another span.
///
/// `crc16_update(crc16(a), b) == crc16(a ++ b)`.
pub fn crc16_update(mut crc: u16, data: &[u8]) -> u16 {
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ POLY;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

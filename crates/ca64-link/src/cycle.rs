//! Solicited I2C cycle packets from the sensor MCU.
//!
//! Each of the 16 scan cycles is requested with a 3-byte write and
//! answered by either a 22-byte packet (four elements) or a 10-byte packet
//! (one element). There is no framing to recover: one request, one answer.

use std::io;

use ca64_frame::VALUE_COUNT;
use tracing::trace;

use crate::error::{LinkError, Result};

/// 7-bit address of the sensor MCU.
pub const I2C_ADDR: u8 = 0x0A;
/// Request opcode for a cycle packet.
pub const CMD_CYCLE_PACKET: u8 = 0x01;
/// Cycles per full scan.
pub const CYCLES_PER_SCAN: u8 = 16;
/// Answer carrying four elements.
pub const FULL_PACKET_LEN: usize = 22;
/// Answer carrying one element.
pub const SHORT_PACKET_LEN: usize = 10;

/// Raw element counts from one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePacket {
    Full([u16; 4]),
    Short(u16),
}

impl CyclePacket {
    /// Parse an answer by its length. Any length other than 22 or 10 is
    /// an error.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        match buf.len() {
            FULL_PACKET_LEN => {
                let mut elements = [0u16; 4];
                for (k, element) in elements.iter_mut().enumerate() {
                    let at = 6 + 4 * k + 2;
                    *element = u16::from_le_bytes([buf[at], buf[at + 1]]);
                }
                Ok(CyclePacket::Full(elements))
            }
            SHORT_PACKET_LEN => Ok(CyclePacket::Short(u16::from_le_bytes([buf[8], buf[9]]))),
            len => Err(LinkError::CyclePacket { len }),
        }
    }

    /// Element counts in element order.
    pub fn elements(&self) -> &[u16] {
        match self {
            CyclePacket::Full(elements) => elements,
            CyclePacket::Short(element) => std::slice::from_ref(element),
        }
    }
}

/// Matrix cell for element `k` of `cycle`.
pub fn element_index(cycle: u8, k: usize) -> usize {
    let cycle = cycle as usize;
    8 * (cycle >> 1) + 2 * k + (cycle & 1)
}

/// The 3-byte request for one cycle.
pub fn cycle_request(sensor_id: u8, cycle: u8) -> [u8; 3] {
    [CMD_CYCLE_PACKET, sensor_id, cycle]
}

/// Minimal I2C master used to poll cycle packets.
pub trait CycleBus {
    fn write(&mut self, addr: u8, bytes: &[u8]) -> io::Result<()>;

    /// Read up to `buf.len()` bytes and return how many the device sent.
    fn read(&mut self, addr: u8, buf: &mut [u8]) -> io::Result<usize>;
}

/// Request and parse one cycle.
pub fn read_cycle<B: CycleBus>(bus: &mut B, sensor_id: u8, cycle: u8) -> Result<CyclePacket> {
    bus.write(I2C_ADDR, &cycle_request(sensor_id, cycle))?;
    let mut buf = [0u8; FULL_PACKET_LEN];
    let n = bus.read(I2C_ADDR, &mut buf)?;
    let packet = CyclePacket::parse(&buf[..n.min(FULL_PACKET_LEN)])?;
    trace!(cycle, ?packet, "cycle packet");
    Ok(packet)
}

/// Poll all cycles and assemble one matrix.
pub fn read_scan<B: CycleBus>(bus: &mut B, sensor_id: u8) -> Result<[u16; VALUE_COUNT]> {
    let mut scan = ScanAssembler::new();
    for cycle in 0..CYCLES_PER_SCAN {
        let packet = read_cycle(bus, sensor_id, cycle)?;
        scan.apply(cycle, &packet)?;
    }
    Ok(scan.finish())
}

/// Places cycle packets into a 64-cell matrix. Cells never reported stay 0.
#[derive(Debug, Clone)]
pub struct ScanAssembler {
    values: [u16; VALUE_COUNT],
    seen: u16,
}

impl ScanAssembler {
    pub fn new() -> Self {
        Self {
            values: [0; VALUE_COUNT],
            seen: 0,
        }
    }

    pub fn apply(&mut self, cycle: u8, packet: &CyclePacket) -> Result<()> {
        if cycle >= CYCLES_PER_SCAN {
            return Err(LinkError::CycleOutOfRange { cycle });
        }
        for (k, &raw) in packet.elements().iter().enumerate() {
            self.values[element_index(cycle, k)] = raw;
        }
        self.seen |= 1 << cycle;
        Ok(())
    }

    /// Whether every cycle has been applied at least once.
    pub fn is_complete(&self) -> bool {
        self.seen == u16::MAX
    }

    pub fn finish(self) -> [u16; VALUE_COUNT] {
        self.values
    }
}

impl Default for ScanAssembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_packet(elements: [u16; 4]) -> Vec<u8> {
        let mut buf = vec![0xEEu8; FULL_PACKET_LEN];
        for (k, raw) in elements.iter().enumerate() {
            let at = 6 + 4 * k + 2;
            buf[at..at + 2].copy_from_slice(&raw.to_le_bytes());
        }
        buf
    }

    #[test]
    fn parses_both_packet_lengths() {
        let full = CyclePacket::parse(&full_packet([1, 2, 300, 0xBEEF])).unwrap();
        assert_eq!(full, CyclePacket::Full([1, 2, 300, 0xBEEF]));
        assert_eq!(full.elements(), &[1, 2, 300, 0xBEEF]);

        let mut short = vec![0u8; SHORT_PACKET_LEN];
        short[8] = 0x34;
        short[9] = 0x12;
        let short = CyclePacket::parse(&short).unwrap();
        assert_eq!(short.elements(), &[0x1234]);
    }

    #[test]
    fn rejects_other_lengths() {
        for len in [0usize, 9, 11, 21, 23] {
            assert!(matches!(
                CyclePacket::parse(&vec![0; len]),
                Err(LinkError::CyclePacket { len: got }) if got == len
            ));
        }
    }

    #[test]
    fn element_index_covers_matrix_once() {
        let mut hits = [0u8; VALUE_COUNT];
        for cycle in 0..CYCLES_PER_SCAN {
            for k in 0..4 {
                hits[element_index(cycle, k)] += 1;
            }
        }
        assert!(hits.iter().all(|&h| h == 1));
        assert_eq!(element_index(0, 0), 0);
        assert_eq!(element_index(1, 0), 1);
        assert_eq!(element_index(2, 3), 14);
        assert_eq!(element_index(15, 3), 63);
    }

    #[test]
    fn assembler_tracks_completion() {
        let mut scan = ScanAssembler::new();
        for cycle in 0..CYCLES_PER_SCAN - 1 {
            scan.apply(cycle, &CyclePacket::Short(cycle as u16 + 1)).unwrap();
        }
        assert!(!scan.is_complete());
        scan.apply(15, &CyclePacket::Full([7, 8, 9, 10])).unwrap();
        assert!(scan.is_complete());

        let values = scan.finish();
        assert_eq!(values[element_index(2, 0)], 3);
        assert_eq!(values[element_index(2, 1)], 0);
        assert_eq!(values[element_index(15, 3)], 10);
    }

    #[test]
    fn assembler_rejects_cycle_past_scan() {
        let mut scan = ScanAssembler::new();
        assert!(matches!(
            scan.apply(16, &CyclePacket::Short(1)),
            Err(LinkError::CycleOutOfRange { cycle: 16 })
        ));
    }

    #[test]
    fn scan_from_mock_bus() {
        let mut bus = MockBus::default();
        let values = read_scan(&mut bus, 3).unwrap();

        assert_eq!(bus.requests.len(), CYCLES_PER_SCAN as usize);
        assert_eq!(bus.requests[5], [CMD_CYCLE_PACKET, 3, 5]);
        for cycle in 0..CYCLES_PER_SCAN {
            for k in 0..4 {
                let expected = if cycle == 7 && k > 0 {
                    0
                } else {
                    cycle as u16 * 10 + k as u16
                };
                assert_eq!(values[element_index(cycle, k)], expected);
            }
        }
    }

    #[test]
    fn bus_error_propagates() {
        let mut bus = MockBus {
            fail_at: Some(2),
            ..MockBus::default()
        };
        assert!(matches!(read_scan(&mut bus, 0), Err(LinkError::Io(_))));
    }

    /// Answers every cycle with a full packet except cycle 7, which is short.
    #[derive(Default)]
    struct MockBus {
        requests: Vec<[u8; 3]>,
        fail_at: Option<u8>,
    }

    impl CycleBus for MockBus {
        fn write(&mut self, addr: u8, bytes: &[u8]) -> io::Result<()> {
            assert_eq!(addr, I2C_ADDR);
            self.requests.push([bytes[0], bytes[1], bytes[2]]);
            Ok(())
        }

        fn read(&mut self, _addr: u8, buf: &mut [u8]) -> io::Result<usize> {
            let cycle = self.requests.last().map_or(0, |r| r[2]);
            if self.fail_at == Some(cycle) {
                return Err(io::Error::other("nack"));
            }
            let base = cycle as u16 * 10;
            if cycle == 7 {
                buf[..SHORT_PACKET_LEN].fill(0);
                buf[8..10].copy_from_slice(&base.to_le_bytes());
                return Ok(SHORT_PACKET_LEN);
            }
            let packet = full_packet([base, base + 1, base + 2, base + 3]);
            buf[..FULL_PACKET_LEN].copy_from_slice(&packet);
            Ok(FULL_PACKET_LEN)
        }
    }
}

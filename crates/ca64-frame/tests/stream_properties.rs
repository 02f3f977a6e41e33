use bytes::BytesMut;
use ca64_frame::{
    crc16, encode_frame, DecodeEvent, StreamDecoder, DEFAULT_HIGH_WATER, DEFAULT_LOW_WATER,
    FRAME_SIZE, MARKER, VALUE_COUNT,
};

/// Deterministic byte noise that never spells the marker or a newline.
struct Noise(u32);

impl Noise {
    fn byte(&mut self) -> u8 {
        self.0 = self.0.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        match (self.0 >> 16) as u8 {
            b'C' => b'c',
            b'\n' => b'.',
            b => b,
        }
    }

    fn bytes(&mut self, n: usize) -> Vec<u8> {
        (0..n).map(|_| self.byte()).collect()
    }

    fn values(&mut self) -> [u16; VALUE_COUNT] {
        let mut values = [0u16; VALUE_COUNT];
        for v in values.iter_mut() {
            *v = u16::from_le_bytes([self.byte(), self.byte()]);
        }
        values
    }
}

fn frame_bytes(sequence: u8, values: &[u16; VALUE_COUNT]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    encode_frame(sequence, values, &mut buf);
    buf.to_vec()
}

fn frames(events: &[DecodeEvent]) -> Vec<&ca64_frame::SensorFrame> {
    events.iter().filter_map(DecodeEvent::as_frame).collect()
}

#[test]
fn crc_reference_vector() {
    assert_eq!(crc16(b"123456789"), 0x29B1);
}

#[test]
fn frames_round_trip() {
    let mut noise = Noise(7);
    for sequence in [0u8, 1, 127, 128, 254, 255] {
        let values = noise.values();
        let events = StreamDecoder::new().feed(&frame_bytes(sequence, &values));

        assert_eq!(events.len(), 1);
        let frame = events[0].as_frame().expect("frame event");
        assert!(frame.is_valid());
        assert_eq!(frame.sequence, sequence);
        assert_eq!(frame.values, values);
    }

    let extremes = [[0u16; VALUE_COUNT], [u16::MAX; VALUE_COUNT]];
    for values in extremes {
        let events = StreamDecoder::new().feed(&frame_bytes(42, &values));
        assert_eq!(events[0].as_frame().expect("frame event").values, values);
    }
}

#[test]
fn false_marker_in_blob_is_skipped() {
    let mut noise = Noise(99);
    let mut blob = noise.bytes(200);
    blob[60..64].copy_from_slice(&MARKER);
    blob[64] = 0xFF;
    blob[65] = 0xFF;

    let values = noise.values();
    let mut stream = blob.clone();
    stream.extend_from_slice(&frame_bytes(17, &values));

    let mut decoder = StreamDecoder::new();
    let events = decoder.feed(&stream);
    let decoded = frames(&events);

    assert_eq!(decoded.len(), 1);
    assert!(decoded[0].is_valid());
    assert_eq!(decoded[0].sequence, 17);
    assert_eq!(decoded[0].values, values);
    assert_eq!(decoder.stats().resyncs, 1);

    let mut chunked = StreamDecoder::new();
    let mut events = Vec::new();
    for chunk in stream.chunks(13) {
        chunked.feed_into(chunk, &mut events);
    }
    assert_eq!(frames(&events).len(), 1);
    assert_eq!(frames(&events)[0].values, values);
}

#[test]
fn marker_split_across_reads() {
    let values = Noise(3).values();
    let wire = frame_bytes(200, &values);

    let whole = StreamDecoder::new().feed(&wire);

    let mut decoder = StreamDecoder::new();
    assert!(decoder.feed(&wire[..2]).is_empty());
    let split = decoder.feed(&wire[2..]);

    assert_eq!(split.len(), 1);
    assert_eq!(split, whole);
}

#[test]
fn marker_free_noise_stays_bounded() {
    let mut noise = Noise(1234);
    let data = noise.bytes(10_000);

    let mut decoder = StreamDecoder::new();
    let mut offset = 0usize;
    let mut size = 1usize;
    while offset < data.len() {
        let end = (offset + size).min(data.len());
        assert!(decoder.feed(&data[offset..end]).is_empty());
        assert!(decoder.buffered() <= DEFAULT_HIGH_WATER);
        offset = end;
        size = size % 311 + 37;
    }
    assert!(decoder.stats().truncations >= 1);

    let mut single = StreamDecoder::new();
    single.feed(&data);
    assert!(single.buffered() <= DEFAULT_LOW_WATER);
}

#[test]
fn chunked_noise_settles_between_watermarks() {
    let data = Noise(99).bytes(10_000);
    let mut decoder = StreamDecoder::new();
    for chunk in data.chunks(1000) {
        decoder.feed(chunk);
    }
    // Truncations after chunks 5 and 9 leave 1024 bytes, plus the last chunk.
    assert_eq!(decoder.stats().truncations, 2);
    assert_eq!(decoder.buffered(), DEFAULT_LOW_WATER + 1000);
}

#[test]
fn marker_free_text_noise_drains_to_low_water() {
    let mut noise = Noise(55);
    let mut data = Vec::with_capacity(10_000);
    while data.len() < 10_000 {
        data.extend_from_slice(&noise.bytes(70));
        data.push(b'\n');
    }

    let mut decoder = StreamDecoder::new();
    for chunk in data.chunks(97) {
        decoder.feed(chunk);
        assert!(decoder.buffered() <= DEFAULT_LOW_WATER);
    }
    assert_eq!(decoder.stats().frames(), 0);
}

#[test]
fn lines_and_frames_interleave_in_order() {
    let values = Noise(8).values();
    let mut stream = b"#OK CONNECT\n".to_vec();
    stream.extend_from_slice(&frame_bytes(1, &values));
    stream.extend_from_slice(b"#OK DISCONNECT\n");

    let events = StreamDecoder::new().feed(&stream);

    assert_eq!(events.len(), 3);
    assert_eq!(events[0].as_line().expect("line").text, "#OK CONNECT");
    let frame = events[1].as_frame().expect("frame");
    assert!(frame.is_valid());
    assert_eq!(frame.values, values);
    assert_eq!(events[2].as_line().expect("line").text, "#OK DISCONNECT");
}

#[test]
fn payload_containing_marker_and_newlines() {
    let mut values = [0x0A0Au16; VALUE_COUNT];
    values[3] = u16::from_le_bytes([b'C', b'A']);
    values[4] = u16::from_le_bytes([b'6', b'4']);

    let mut stream = frame_bytes(9, &values);
    stream.extend_from_slice(b"#after\n");

    let events = StreamDecoder::new().feed(&stream);

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].as_frame().expect("frame").values, values);
    assert_eq!(events[1].as_line().expect("line").text, "#after");
}

#[test]
fn corrupted_frame_then_clean_frame() {
    let good = Noise(21).values();
    let mut corrupted = frame_bytes(1, &good);
    corrupted[50] ^= 0x10;

    let mut stream = corrupted;
    stream.extend_from_slice(&frame_bytes(2, &good));

    let mut decoder = StreamDecoder::new();
    let events = decoder.feed(&stream);
    let decoded = frames(&events);

    assert_eq!(decoded.len(), 2);
    assert!(!decoded[0].is_valid());
    assert!(decoded[1].is_valid());
    assert_eq!(decoder.stats().frames_crc_failed, 1);
    assert_eq!(decoder.buffered(), 0);
}

#[test]
fn frame_recovered_after_guard_truncation() {
    let values = Noise(4).values();
    let wire = frame_bytes(77, &values);

    let mut stream = Noise(5).bytes(6000);
    stream.extend_from_slice(&wire[..2]);

    let mut decoder = StreamDecoder::new();
    decoder.feed(&stream);
    assert_eq!(decoder.buffered(), DEFAULT_LOW_WATER);

    let events = decoder.feed(&wire[2..]);
    assert_eq!(frames(&events).len(), 1);
    assert_eq!(frames(&events)[0].sequence, 77);
    assert!(decoder.buffered() < FRAME_SIZE);
}

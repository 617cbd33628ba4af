//! Busylight wire protocol: fixed-layout vendor output reports.
//!
//! Every command is a 65-byte write buffer: a zero report id followed by
//! the 64-byte output report. Color command layout (buffer offsets):
//!
//!   - `[0]`       report id, always 0x00
//!   - `[1..=2]`   0x10 0x01 command header
//!   - `[3..=5]`   red, green, blue channel values
//!   - `[6..=8]`   0x01 0x00 0x80
//!   - `[9..=56]`  zero padding
//!   - `[57..=62]` 0x06 0x04 0x55 0xFF 0xFF 0xFF tail block
//!   - `[63..=64]` 0x04 0x52 close
//!
//! Only offsets 3..=5 vary; the device accepts the same close bytes for
//! every color. The keep-alive is a distinct fixed report (0x8F header,
//! 0x03 0xEB close) that must reach the device at least every 30 seconds,
//! otherwise it resets itself and goes dark.

use crate::color::Rgb;

/// Write buffer length: report id byte plus 64-byte report.
pub const PACKET_LEN: usize = 65;

/// One fully encoded command, ready for the wire.
pub type Packet = [u8; PACKET_LEN];

/// Buffer offset of the red channel.
pub const OFFSET_RED: usize = 3;
/// Buffer offset of the green channel.
pub const OFFSET_GREEN: usize = 4;
/// Buffer offset of the blue channel.
pub const OFFSET_BLUE: usize = 5;

/// Encode a color command. Infallible: every `Rgb` is encodable, and the
/// fixed bytes never depend on the channel values.
pub const fn encode(rgb: Rgb) -> Packet {
    let mut buf = [0u8; PACKET_LEN];
    buf[1] = 0x10;
    buf[2] = 0x01;
    buf[OFFSET_RED] = rgb.r;
    buf[OFFSET_GREEN] = rgb.g;
    buf[OFFSET_BLUE] = rgb.b;
    buf[6] = 0x01;
    buf[8] = 0x80;
    buf[57] = 0x06;
    buf[58] = 0x04;
    buf[59] = 0x55;
    buf[60] = 0xFF;
    buf[61] = 0xFF;
    buf[62] = 0xFF;
    buf[63] = 0x04;
    buf[64] = 0x52;
    buf
}

const fn keep_alive() -> Packet {
    let mut buf = [0u8; PACKET_LEN];
    buf[1] = 0x8F;
    buf[57] = 0x06;
    buf[58] = 0x04;
    buf[59] = 0x55;
    buf[60] = 0xFF;
    buf[61] = 0xFF;
    buf[62] = 0xFF;
    buf[63] = 0x03;
    buf[64] = 0xEB;
    buf
}

/// Pre-encoded all-channels-zero color command.
pub const OFF: Packet = encode(Rgb::OFF);

/// Pre-encoded keep-alive report.
pub const KEEP_ALIVE: Packet = keep_alive();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_matches_reference_packet() {
        let packet = encode(Rgb::new(10, 20, 30));
        let expected: Packet = [
            0x00, 0x10, 0x01, 10, 20, 30, 0x01, 0x00, //
            0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
            0x00, 0x06, 0x04, 0x55, 0xFF, 0xFF, 0xFF, 0x04, //
            0x52,
        ];
        assert_eq!(packet, expected);
    }

    #[test]
    fn encode_places_channels() {
        let packet = encode(Rgb::new(255, 0, 128));
        assert_eq!(packet[OFFSET_RED], 255);
        assert_eq!(packet[OFFSET_GREEN], 0);
        assert_eq!(packet[OFFSET_BLUE], 128);
    }

    #[test]
    fn fixed_bytes_do_not_depend_on_color() {
        let colors = [
            Rgb::OFF,
            Rgb::WHITE,
            Rgb::new(1, 2, 3),
            Rgb::new(100, 0, 0),
            Rgb::new(0, 55, 45),
        ];
        for rgb in colors {
            let packet = encode(rgb);
            assert_eq!(packet[0], 0x00);
            assert_eq!(packet[1], 0x10);
            assert_eq!(packet[2], 0x01);
            assert_eq!(packet[6], 0x01);
            assert_eq!(packet[7], 0x00);
            assert_eq!(packet[8], 0x80);
            for (i, byte) in packet.iter().enumerate().take(57).skip(9) {
                assert_eq!(*byte, 0x00, "offset {i} for {rgb}");
            }
            assert_eq!(packet[57..], [0x06, 0x04, 0x55, 0xFF, 0xFF, 0xFF, 0x04, 0x52]);
        }
    }

    #[test]
    fn off_is_encoded_black() {
        assert_eq!(OFF, encode(Rgb::new(0, 0, 0)));
        assert_eq!(OFF[OFFSET_RED], 0);
        assert_eq!(OFF[OFFSET_GREEN], 0);
        assert_eq!(OFF[OFFSET_BLUE], 0);
    }

    #[test]
    fn keep_alive_layout() {
        assert_eq!(KEEP_ALIVE.len(), PACKET_LEN);
        assert_eq!(KEEP_ALIVE[0], 0x00);
        assert_eq!(KEEP_ALIVE[1], 0x8F);
        for (i, byte) in KEEP_ALIVE.iter().enumerate().take(57).skip(2) {
            assert_eq!(*byte, 0x00, "offset {i}");
        }
        assert_eq!(KEEP_ALIVE[57..], [0x06, 0x04, 0x55, 0xFF, 0xFF, 0xFF, 0x03, 0xEB]);
    }

    #[test]
    fn keep_alive_is_not_a_color_command() {
        assert_ne!(KEEP_ALIVE[1], 0x10);
        assert_ne!(KEEP_ALIVE, OFF);
    }
}

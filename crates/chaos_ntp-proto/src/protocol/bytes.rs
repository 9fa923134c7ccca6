use byteorder::{BE, ByteOrder};

use crate::error::ParseError;

use super::{
    ConstPackedSizeBytes, FromBytes, LeapIndicator, Mode, PACKET_SIZE, Packet, ReferenceId,
    ShortFormat, Stratum, TimestampFormat, ToBytes, Version,
};

fn ensure_len(buf: &[u8], needed: usize) -> Result<(), ParseError> {
    if buf.len() < needed {
        return Err(ParseError::BufferTooShort {
            needed,
            available: buf.len(),
        });
    }
    Ok(())
}

impl FromBytes for ShortFormat {
    fn from_bytes(buf: &[u8]) -> Result<(Self, usize), ParseError> {
        ensure_len(buf, Self::PACKED_SIZE_BYTES)?;
        let seconds = BE::read_u16(&buf[0..2]);
        let fraction = BE::read_u16(&buf[2..4]);
        Ok((ShortFormat { seconds, fraction }, Self::PACKED_SIZE_BYTES))
    }
}

impl FromBytes for TimestampFormat {
    fn from_bytes(buf: &[u8]) -> Result<(Self, usize), ParseError> {
        ensure_len(buf, Self::PACKED_SIZE_BYTES)?;
        Ok((
            TimestampFormat::from_u64(BE::read_u64(&buf[..8])),
            Self::PACKED_SIZE_BYTES,
        ))
    }
}

impl FromBytes for Stratum {
    fn from_bytes(buf: &[u8]) -> Result<(Self, usize), ParseError> {
        ensure_len(buf, 1)?;
        Ok((Stratum(buf[0]), 1))
    }
}

impl FromBytes for ReferenceId {
    fn from_bytes(buf: &[u8]) -> Result<(Self, usize), ParseError> {
        ensure_len(buf, Self::PACKED_SIZE_BYTES)?;
        Ok((
            ReferenceId([buf[0], buf[1], buf[2], buf[3]]),
            Self::PACKED_SIZE_BYTES,
        ))
    }
}

impl FromBytes for (LeapIndicator, Version, Mode) {
    fn from_bytes(buf: &[u8]) -> Result<(Self, usize), ParseError> {
        ensure_len(buf, 1)?;
        let li_vn_mode = buf[0];
        let li = LeapIndicator::from_bits(li_vn_mode >> 6);
        let vn = Version((li_vn_mode >> 3) & 0b111);
        let mode = Mode::from_bits(li_vn_mode);
        Ok(((li, vn, mode), 1))
    }
}

impl FromBytes for Packet {
    fn from_bytes(buf: &[u8]) -> Result<(Self, usize), ParseError> {
        ensure_len(buf, Self::PACKED_SIZE_BYTES)?;

        let mut offset = 0;

        let ((leap_indicator, version, mode), n) =
            <(LeapIndicator, Version, Mode)>::from_bytes(&buf[offset..])?;
        offset += n;

        let (stratum, n) = Stratum::from_bytes(&buf[offset..])?;
        offset += n;

        let poll = buf[offset] as i8;
        offset += 1;

        let precision = buf[offset] as i8;
        offset += 1;

        let (root_delay, n) = ShortFormat::from_bytes(&buf[offset..])?;
        offset += n;

        let (root_dispersion, n) = ShortFormat::from_bytes(&buf[offset..])?;
        offset += n;

        let (reference_id, n) = ReferenceId::from_bytes(&buf[offset..])?;
        offset += n;

        let (reference_timestamp, n) = TimestampFormat::from_bytes(&buf[offset..])?;
        offset += n;

        let (origin_timestamp, n) = TimestampFormat::from_bytes(&buf[offset..])?;
        offset += n;

        let (receive_timestamp, n) = TimestampFormat::from_bytes(&buf[offset..])?;
        offset += n;

        let (transmit_timestamp, n) = TimestampFormat::from_bytes(&buf[offset..])?;
        offset += n;

        Ok((
            Packet {
                leap_indicator,
                version,
                mode,
                stratum,
                poll,
                precision,
                root_delay,
                root_dispersion,
                reference_id,
                reference_timestamp,
                origin_timestamp,
                receive_timestamp,
                transmit_timestamp,
            },
            offset,
        ))
    }
}

// Writers.

impl ToBytes for ShortFormat {
    fn to_bytes(&self, buf: &mut [u8]) -> Result<usize, ParseError> {
        ensure_len(buf, Self::PACKED_SIZE_BYTES)?;
        BE::write_u16(&mut buf[..2], self.seconds);
        BE::write_u16(&mut buf[2..4], self.fraction);
        Ok(Self::PACKED_SIZE_BYTES)
    }
}

impl ToBytes for TimestampFormat {
    fn to_bytes(&self, buf: &mut [u8]) -> Result<usize, ParseError> {
        ensure_len(buf, Self::PACKED_SIZE_BYTES)?;
        BE::write_u64(&mut buf[..8], self.to_u64());
        Ok(Self::PACKED_SIZE_BYTES)
    }
}

impl ToBytes for Stratum {
    fn to_bytes(&self, buf: &mut [u8]) -> Result<usize, ParseError> {
        ensure_len(buf, 1)?;
        buf[0] = self.0;
        Ok(1)
    }
}

impl ToBytes for (LeapIndicator, Version, Mode) {
    fn to_bytes(&self, buf: &mut [u8]) -> Result<usize, ParseError> {
        ensure_len(buf, 1)?;
        buf[0] = pack_li_vn_mode(*self);
        Ok(1)
    }
}

impl ToBytes for ReferenceId {
    fn to_bytes(&self, buf: &mut [u8]) -> Result<usize, ParseError> {
        ensure_len(buf, Self::PACKED_SIZE_BYTES)?;
        buf[..4].copy_from_slice(&self.0);
        Ok(Self::PACKED_SIZE_BYTES)
    }
}

impl ToBytes for Packet {
    fn to_bytes(&self, buf: &mut [u8]) -> Result<usize, ParseError> {
        ensure_len(buf, Self::PACKED_SIZE_BYTES)?;
        let mut fixed = [0u8; PACKET_SIZE];
        self.write_fixed(&mut fixed);
        buf[..PACKET_SIZE].copy_from_slice(&fixed);
        Ok(Self::PACKED_SIZE_BYTES)
    }
}

fn pack_li_vn_mode((li, vn, mode): (LeapIndicator, Version, Mode)) -> u8 {
    ((li as u8) << 6) | ((vn.0 & 0b111) << 3) | mode as u8
}

impl Packet {
    /// Write the packet into an exactly-sized buffer. Cannot fail.
    pub(super) fn write_fixed(&self, buf: &mut [u8; PACKET_SIZE]) {
        buf[0] = pack_li_vn_mode((self.leap_indicator, self.version, self.mode));
        buf[1] = self.stratum.0;
        buf[2] = self.poll as u8;
        buf[3] = self.precision as u8;
        BE::write_u16(&mut buf[4..6], self.root_delay.seconds);
        BE::write_u16(&mut buf[6..8], self.root_delay.fraction);
        BE::write_u16(&mut buf[8..10], self.root_dispersion.seconds);
        BE::write_u16(&mut buf[10..12], self.root_dispersion.fraction);
        buf[12..16].copy_from_slice(&self.reference_id.0);
        let timestamps = [
            self.reference_timestamp,
            self.origin_timestamp,
            self.receive_timestamp,
            self.transmit_timestamp,
        ];
        for (i, ts) in timestamps.iter().enumerate() {
            let start = 16 + i * TimestampFormat::PACKED_SIZE_BYTES;
            BE::write_u64(&mut buf[start..start + 8], ts.to_u64());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_format_rejects_short_buffer() {
        assert_eq!(
            ShortFormat::from_bytes(&[0u8; 3]),
            Err(ParseError::BufferTooShort {
                needed: 4,
                available: 3
            })
        );
    }

    #[test]
    fn test_to_bytes_rejects_short_output() {
        let mut buf = [0u8; 47];
        assert!(Packet::default().to_bytes(&mut buf).is_err());
    }

    #[test]
    fn test_first_byte_bit_layout() {
        let (fields, n) = <(LeapIndicator, Version, Mode)>::from_bytes(&[0b11_100_011]).unwrap();
        assert_eq!(n, 1);
        assert_eq!(fields.0, LeapIndicator::Unknown);
        assert_eq!(fields.1.value(), 4);
        assert_eq!(fields.2, Mode::Client);
        assert_eq!(pack_li_vn_mode(fields), 0b11_100_011);
    }

    #[test]
    fn test_packet_field_offsets() {
        let mut buf = [0u8; PACKET_SIZE];
        for (i, b) in buf.iter_mut().enumerate() {
            *b = i as u8;
        }
        let (pkt, _) = Packet::from_bytes(&buf).unwrap();
        assert_eq!(pkt.stratum, Stratum(1));
        assert_eq!(pkt.poll, 2);
        assert_eq!(pkt.precision, 3);
        assert_eq!(pkt.root_delay.seconds, 0x0405);
        assert_eq!(pkt.root_dispersion.fraction, 0x0A0B);
        assert_eq!(pkt.reference_id.0, [12, 13, 14, 15]);
        assert_eq!(pkt.reference_timestamp.seconds, 0x1011_1213);
        assert_eq!(pkt.origin_timestamp.seconds, 0x1819_1A1B);
        assert_eq!(pkt.receive_timestamp.fraction, 0x2425_2627);
        assert_eq!(pkt.transmit_timestamp.to_u64(), 0x2829_2A2B_2C2D_2E2F);
    }

    #[test]
    fn test_multi_byte_fields_written_big_endian() {
        let pkt = Packet {
            root_delay: ShortFormat {
                seconds: 0x0102,
                fraction: 0x0304,
            },
            root_dispersion: ShortFormat {
                seconds: 0x0506,
                fraction: 0x0708,
            },
            origin_timestamp: TimestampFormat {
                seconds: 0x1122_3344,
                fraction: 0x5566_7788,
            },
            transmit_timestamp: TimestampFormat::from_u64(0xDEAD_BEEF_0BAD_F00D),
            ..Packet::default()
        };
        let mut buf = [0u8; PACKET_SIZE];
        assert_eq!(pkt.to_bytes(&mut buf).unwrap(), PACKET_SIZE);
        assert_eq!(buf[4..12], [1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(
            buf[24..32],
            [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88]
        );
        assert_eq!(
            buf[40..48],
            [0xDE, 0xAD, 0xBE, 0xEF, 0x0B, 0xAD, 0xF0, 0x0D]
        );

        let mut ts = [0u8; 8];
        pkt.origin_timestamp.to_bytes(&mut ts).unwrap();
        assert_eq!(ts, buf[24..32]);
        let (back, _) = TimestampFormat::from_bytes(&ts).unwrap();
        assert_eq!(back, pkt.origin_timestamp);
    }

    #[test]
    fn test_signed_poll_and_precision() {
        let mut buf = [0u8; PACKET_SIZE];
        buf[2] = 0xFA;
        buf[3] = 0xEC;
        let (pkt, _) = Packet::from_bytes(&buf).unwrap();
        assert_eq!(pkt.poll, -6);
        assert_eq!(pkt.precision, -20);
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Wire layout of Surestar data packets.
//!
//! ```text
//! +---------+---------+-----+----------+---------------+-------------+--------------+
//! | block 0 | block 1 | ... | block N-1| gps_timestamp | status_type | status_value |
//! | 100 B   | 100 B   |     | 100 B    | u32 LE        | u8          | u8           |
//! +---------+---------+-----+----------+---------------+-------------+--------------+
//! ```
//!
//! Each block is `bank: u16 LE`, `rotation: u16 LE` followed by 32 samples of
//! `distance: u16 LE, intensity: u8`. The variant, and so `N`, is a property
//! of the configured device and is never guessed from the packet contents.

use crate::{
    block::{BlockSlice, RawBlock, BLOCK_SIZE},
    error::Error,
};
use std::fmt;

/// Size of the trailer following the blocks.
pub const PACKET_STATUS_SIZE: usize = 6;
/// Blocks in a standard packet.
pub const BLOCKS_PER_PACKET: usize = 12;
/// Blocks in an extended packet.
pub const EXTENDED_BLOCKS_PER_PACKET: usize = 24;
/// Standard packet size in bytes/octets.
pub const PACKET_SIZE: usize = BLOCKS_PER_PACKET * BLOCK_SIZE + PACKET_STATUS_SIZE;
/// Extended packet size in bytes/octets.
pub const EXTENDED_PACKET_SIZE: usize =
    EXTENDED_BLOCKS_PER_PACKET * BLOCK_SIZE + PACKET_STATUS_SIZE;

/// Firmware packet size variant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PacketVariant {
    /// 12 blocks, 1206 bytes.
    #[default]
    Standard,
    /// 24 blocks, 2406 bytes, used by higher resolution devices.
    Extended,
}

impl PacketVariant {
    /// Number of blocks in one packet.
    #[inline]
    pub const fn blocks(self) -> usize {
        match self {
            PacketVariant::Standard => BLOCKS_PER_PACKET,
            PacketVariant::Extended => EXTENDED_BLOCKS_PER_PACKET,
        }
    }

    /// Total packet length in bytes.
    #[inline]
    pub const fn len(self) -> usize {
        self.blocks() * BLOCK_SIZE + PACKET_STATUS_SIZE
    }

    /// Offset of the GPS timestamp, directly after the last block.
    #[inline]
    pub const fn status_offset(self) -> usize {
        self.blocks() * BLOCK_SIZE
    }
}

impl fmt::Display for PacketVariant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PacketVariant::Standard => write!(f, "standard"),
            PacketVariant::Extended => write!(f, "extended"),
        }
    }
}

/// Status tag carried in each packet trailer. The packet stream cycles
/// through the tags so a full time stamp takes several packets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatusType {
    /// 'H'
    Hours = 72,
    /// 'M'
    Minutes = 77,
    /// 'S'
    Seconds = 83,
    /// 'D', day of month
    Date = 68,
    /// 'N'
    Month = 78,
    /// 'Y', years since 2000
    Year = 89,
    /// 'G'
    GpsStatus = 71,
}

impl TryFrom<u8> for StatusType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            72 => Ok(StatusType::Hours),
            77 => Ok(StatusType::Minutes),
            83 => Ok(StatusType::Seconds),
            68 => Ok(StatusType::Date),
            78 => Ok(StatusType::Month),
            89 => Ok(StatusType::Year),
            71 => Ok(StatusType::GpsStatus),
            other => Err(other),
        }
    }
}

/// Status tag and value pair of one packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Status {
    /// Raw tag byte, see [`Status::kind`].
    pub raw_type: u8,
    /// Value whose meaning depends on the tag.
    pub value: u8,
}

impl Status {
    /// Returns the decoded tag or `None` for vendor tags we do not know.
    pub fn kind(&self) -> Option<StatusType> {
        StatusType::try_from(self.raw_type).ok()
    }
}

/// Owned copy of one packet, used for synthesis and inspection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawPacket {
    /// Blocks in wire order.
    pub blocks: Vec<RawBlock>,
    /// Device clock in microseconds.
    pub gps_timestamp: u32,
    /// Trailer status.
    pub status: Status,
}

impl RawPacket {
    /// Encode the packet for `variant`. Fails when the block count does not
    /// match the variant.
    pub fn to_bytes(&self, variant: PacketVariant) -> Result<Vec<u8>, Error> {
        if self.blocks.len() != variant.blocks() {
            return Err(Error::MalformedPacket {
                len: self.blocks.len() * BLOCK_SIZE + PACKET_STATUS_SIZE,
                expected: variant.len(),
            });
        }

        let mut data = vec![0u8; variant.len()];
        for (chunk, block) in data.chunks_exact_mut(BLOCK_SIZE).zip(self.blocks.iter()) {
            block.write(chunk)?;
        }

        let offset = variant.status_offset();
        data[offset..offset + 4].copy_from_slice(&self.gps_timestamp.to_le_bytes());
        data[offset + 4] = self.status.raw_type;
        data[offset + 5] = self.status.value;

        Ok(data)
    }
}

/// A slice containing one complete Surestar packet.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PacketSlice<'a> {
    slice: &'a [u8],
    variant: PacketVariant,
}

impl<'a> PacketSlice<'a> {
    /// Validate the length of `slice` against `variant`.
    pub fn from_slice(slice: &'a [u8], variant: PacketVariant) -> Result<PacketSlice<'a>, Error> {
        if slice.len() != variant.len() {
            return Err(Error::MalformedPacket {
                len: slice.len(),
                expected: variant.len(),
            });
        }

        Ok(PacketSlice { slice, variant })
    }

    /// Returns the configured variant.
    #[inline]
    pub fn variant(&self) -> PacketVariant {
        self.variant
    }

    /// Returns the number of blocks.
    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.variant.blocks()
    }

    /// Returns the block at `index` or `None` past the last block.
    #[inline]
    pub fn block(&self, index: usize) -> Option<BlockSlice<'a>> {
        if index >= self.num_blocks() {
            return None;
        }

        let slice: &'a [u8] = self.slice;
        let begin = index * BLOCK_SIZE;
        BlockSlice::from_slice(&slice[begin..begin + BLOCK_SIZE]).ok()
    }

    /// Iterates the blocks in wire order.
    pub fn blocks(&self) -> impl Iterator<Item = BlockSlice<'a>> + 'a {
        let slice: &'a [u8] = self.slice;
        slice[..self.variant.status_offset()]
            .chunks_exact(BLOCK_SIZE)
            .filter_map(|chunk| BlockSlice::from_slice(chunk).ok())
    }

    /// Returns the GPS timestamp in device microseconds.
    #[inline]
    pub fn gps_timestamp(&self) -> u32 {
        let offset = self.variant.status_offset();
        u32::from_le_bytes([
            self.slice[offset],
            self.slice[offset + 1],
            self.slice[offset + 2],
            self.slice[offset + 3],
        ])
    }

    /// Returns the trailer status tag and value.
    #[inline]
    pub fn status(&self) -> Status {
        let offset = self.variant.status_offset();
        Status {
            raw_type: self.slice[offset + 4],
            value: self.slice[offset + 5],
        }
    }

    /// Materialise the packet, failing on the first block with an invalid
    /// rotation.
    pub fn to_packet(&self) -> Result<RawPacket, Error> {
        let blocks = self
            .blocks()
            .enumerate()
            .map(|(index, block)| block.to_block(index))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RawPacket {
            blocks,
            gps_timestamp: self.gps_timestamp(),
            status: self.status(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Bank, SCANS_PER_BLOCK};

    fn synthetic(variant: PacketVariant) -> RawPacket {
        let blocks = (0..variant.blocks())
            .map(|i| {
                let mut pairs = [(0u16, 0u8); SCANS_PER_BLOCK];
                for (c, pair) in pairs.iter_mut().enumerate() {
                    *pair = ((i * 100 + c) as u16, (i + c) as u8);
                }
                let bank = if i % 4 == 3 { Bank::Lower } else { Bank::Upper };
                RawBlock::new(bank, (i * 20) as u16, pairs)
            })
            .collect();

        RawPacket {
            blocks,
            gps_timestamp: 0x0102_0304,
            status: Status {
                raw_type: StatusType::Year as u8,
                value: 24,
            },
        }
    }

    #[test]
    fn sizes() {
        assert_eq!(PACKET_SIZE, 1206);
        assert_eq!(PacketVariant::Standard.len(), 1206);
        assert_eq!(PacketVariant::Standard.status_offset(), 1200);
        assert_eq!(EXTENDED_PACKET_SIZE, 2406);
        assert_eq!(PacketVariant::Extended.len(), EXTENDED_PACKET_SIZE);
    }

    #[test]
    fn wrong_length() {
        for len in [0, 1205, 1207, EXTENDED_PACKET_SIZE] {
            let data = vec![0u8; len];
            assert!(matches!(
                PacketSlice::from_slice(&data, PacketVariant::Standard),
                Err(Error::MalformedPacket { expected: 1206, .. })
            ));
        }

        // A standard length buffer is never accepted as a truncated extended
        // packet.
        let data = vec![0u8; PACKET_SIZE];
        assert!(PacketSlice::from_slice(&data, PacketVariant::Extended).is_err());
    }

    #[test]
    fn trailer() {
        let packet = synthetic(PacketVariant::Standard);
        let data = packet.to_bytes(PacketVariant::Standard).unwrap();
        assert_eq!(&data[1200..1206], &[0x04, 0x03, 0x02, 0x01, 89, 24]);

        let slice = PacketSlice::from_slice(&data, PacketVariant::Standard).unwrap();
        assert_eq!(slice.gps_timestamp(), 0x0102_0304);
        assert_eq!(slice.status().kind(), Some(StatusType::Year));
        assert_eq!(slice.status().value, 24);
    }

    #[test]
    fn encode_decode() {
        for variant in [PacketVariant::Standard, PacketVariant::Extended] {
            let packet = synthetic(variant);
            let data = packet.to_bytes(variant).unwrap();
            let slice = PacketSlice::from_slice(&data, variant).unwrap();
            assert_eq!(slice.blocks().count(), variant.blocks());
            assert_eq!(slice.block(3).unwrap().bank(3).unwrap(), Bank::Lower);
            assert!(slice.block(variant.blocks()).is_none());
            assert_eq!(slice.to_packet().unwrap(), packet);
        }
    }

    #[test]
    fn block_count_mismatch() {
        let packet = synthetic(PacketVariant::Standard);
        assert!(packet.to_bytes(PacketVariant::Extended).is_err());
    }

    #[test]
    fn unknown_status() {
        let status = Status {
            raw_type: b'Z',
            value: 0,
        };
        assert_eq!(status.kind(), None);
        assert_eq!(StatusType::try_from(b'G'), Ok(StatusType::GpsStatus));
        assert_eq!(StatusType::try_from(b'N'), Ok(StatusType::Month));
    }
}

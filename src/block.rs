// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::error::Error;
use std::fmt;

/// Bytes per channel sample (2 distance + 1 intensity).
pub const RAW_SCAN_SIZE: usize = 3;
/// Channel samples carried by every block.
pub const SCANS_PER_BLOCK: usize = 32;
/// Size of the sample area of a block.
pub const BLOCK_DATA_SIZE: usize = SCANS_PER_BLOCK * RAW_SCAN_SIZE;
/// Bank and rotation fields, also the offset of the first channel sample.
pub const BLOCK_HEADER_SIZE: usize = 4;
/// Size of one block on the wire in bytes/octets.
pub const BLOCK_SIZE: usize = BLOCK_HEADER_SIZE + BLOCK_DATA_SIZE;

/// Largest valid rotation in hundredths of a degree, inclusive.
pub const ROTATION_MAX: u16 = 36000;

/// Upper bank sentinel, wire bytes `FF EE`.
pub const UPPER_BANK: u16 = 0xEEFF;
/// Lower bank sentinel, wire bytes `FF DD`.
pub const LOWER_BANK: u16 = 0xDDFF;

/// Physical laser group a block was fired from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Bank {
    /// Upper laser group, sentinel 0xEEFF.
    Upper,
    /// Lower laser group, sentinel 0xDDFF.
    Lower,
}

impl Bank {
    /// Wire sentinel for this bank.
    pub fn sentinel(self) -> u16 {
        match self {
            Bank::Upper => UPPER_BANK,
            Bank::Lower => LOWER_BANK,
        }
    }
}

impl TryFrom<u16> for Bank {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            UPPER_BANK => Ok(Bank::Upper),
            LOWER_BANK => Ok(Bank::Lower),
            other => Err(other),
        }
    }
}

impl fmt::Display for Bank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Bank::Upper => write!(f, "upper"),
            Bank::Lower => write!(f, "lower"),
        }
    }
}

/// Bank of a decoded block, keeping unrecognised sentinels so the samples
/// can be flagged as untrusted instead of discarded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BankId {
    /// Recognised sentinel.
    Known(Bank),
    /// Unrecognised raw value.
    Unknown(u16),
}

impl BankId {
    /// Returns the bank when the sentinel was recognised.
    pub fn bank(self) -> Option<Bank> {
        match self {
            BankId::Known(bank) => Some(bank),
            BankId::Unknown(_) => None,
        }
    }

    /// Returns false for blocks whose bank sentinel was not recognised.
    pub fn is_trusted(self) -> bool {
        matches!(self, BankId::Known(_))
    }

    /// Raw 16-bit value as read from the wire.
    pub fn raw(self) -> u16 {
        match self {
            BankId::Known(bank) => bank.sentinel(),
            BankId::Unknown(raw) => raw,
        }
    }
}

impl From<u16> for BankId {
    fn from(value: u16) -> Self {
        match Bank::try_from(value) {
            Ok(bank) => BankId::Known(bank),
            Err(raw) => BankId::Unknown(raw),
        }
    }
}

impl From<Bank> for BankId {
    fn from(bank: Bank) -> Self {
        BankId::Known(bank)
    }
}

/// One raw (distance, intensity) pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelSample {
    /// Distance in units of 4 mm, 0 means no return.
    pub raw_distance: u16,
    /// Raw reflectivity byte.
    pub raw_intensity: u8,
    /// Position of the sample inside its block, 0..31.
    pub channel: u8,
}

impl ChannelSample {
    /// Returns true when the laser saw no echo.
    #[inline]
    pub fn is_no_return(&self) -> bool {
        self.raw_distance == 0
    }
}

/// Owned copy of one block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawBlock {
    /// Bank sentinel of the block.
    pub bank: BankId,
    /// Start of block azimuth in hundredths of a degree.
    pub rotation: u16,
    /// Samples in firing order.
    pub samples: [ChannelSample; SCANS_PER_BLOCK],
}

impl RawBlock {
    /// Builds a block from (distance, intensity) pairs, channel indices are
    /// assigned in order.
    pub fn new(
        bank: impl Into<BankId>,
        rotation: u16,
        samples: [(u16, u8); SCANS_PER_BLOCK],
    ) -> Self {
        let mut out = [ChannelSample::default(); SCANS_PER_BLOCK];
        for (channel, (sample, (distance, intensity))) in
            out.iter_mut().zip(samples.iter()).enumerate()
        {
            *sample = ChannelSample {
                raw_distance: *distance,
                raw_intensity: *intensity,
                channel: channel as u8,
            };
        }

        RawBlock {
            bank: bank.into(),
            rotation,
            samples: out,
        }
    }

    /// Returns the bank or `UnknownBank` when the sentinel was not recognised.
    pub fn bank(&self, block: usize) -> Result<Bank, Error> {
        self.bank.bank().ok_or(Error::UnknownBank {
            block,
            bank: self.bank.raw(),
        })
    }

    /// Write the block in wire format into `out`, which must hold at least
    /// [`BLOCK_SIZE`] bytes.
    pub fn write(&self, out: &mut [u8]) -> Result<(), Error> {
        if out.len() < BLOCK_SIZE {
            return Err(Error::UnexpectedEndOfSlice(out.len()));
        }

        out[0..2].copy_from_slice(&self.bank.raw().to_le_bytes());
        out[2..4].copy_from_slice(&self.rotation.to_le_bytes());
        for (chunk, sample) in out[BLOCK_HEADER_SIZE..BLOCK_SIZE]
            .chunks_exact_mut(RAW_SCAN_SIZE)
            .zip(self.samples.iter())
        {
            chunk[0..2].copy_from_slice(&sample.raw_distance.to_le_bytes());
            chunk[2] = sample.raw_intensity;
        }

        Ok(())
    }
}

/// A slice containing one Surestar data block.
///
/// Fields are read byte by byte as little-endian regardless of host order;
/// the block is never reinterpreted in place.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BlockSlice<'a> {
    slice: &'a [u8],
}

impl<'a> BlockSlice<'a> {
    /// Wrap the first [`BLOCK_SIZE`] bytes of `slice`.
    pub fn from_slice(slice: &'a [u8]) -> Result<BlockSlice<'a>, Error> {
        if slice.len() < BLOCK_SIZE {
            return Err(Error::UnexpectedEndOfSlice(slice.len()));
        }

        Ok(BlockSlice {
            slice: &slice[..BLOCK_SIZE],
        })
    }

    /// Returns the raw bank field.
    #[inline]
    pub fn raw_bank(&self) -> u16 {
        u16::from_le_bytes([self.slice[0], self.slice[1]])
    }

    /// Returns the raw rotation field without range checking.
    #[inline]
    pub fn raw_rotation(&self) -> u16 {
        u16::from_le_bytes([self.slice[2], self.slice[3]])
    }

    /// Returns the bank id, unknown sentinels included.
    #[inline]
    pub fn bank_id(&self) -> BankId {
        BankId::from(self.raw_bank())
    }

    /// Returns the bank or `UnknownBank` for an unrecognised sentinel.
    #[inline]
    pub fn bank(&self, block: usize) -> Result<Bank, Error> {
        Bank::try_from(self.raw_bank()).map_err(|bank| Error::UnknownBank { block, bank })
    }

    /// Returns the rotation or `InvalidRotation` when above 36000.
    #[inline]
    pub fn rotation(&self, block: usize) -> Result<u16, Error> {
        match self.raw_rotation() {
            rotation if rotation <= ROTATION_MAX => Ok(rotation),
            rotation => Err(Error::InvalidRotation { block, rotation }),
        }
    }

    /// Returns the sample for `channel`, which must be below 32.
    #[inline]
    pub fn sample(&self, channel: usize) -> ChannelSample {
        let offset = BLOCK_HEADER_SIZE + channel * RAW_SCAN_SIZE;
        ChannelSample {
            raw_distance: u16::from_le_bytes([self.slice[offset], self.slice[offset + 1]]),
            raw_intensity: self.slice[offset + 2],
            channel: channel as u8,
        }
    }

    /// Iterates the 32 samples in wire order.
    pub fn samples(&self) -> impl Iterator<Item = ChannelSample> + 'a {
        let slice: &'a [u8] = self.slice;
        slice[BLOCK_HEADER_SIZE..]
            .chunks_exact(RAW_SCAN_SIZE)
            .enumerate()
            .map(|(channel, chunk)| ChannelSample {
                raw_distance: u16::from_le_bytes([chunk[0], chunk[1]]),
                raw_intensity: chunk[2],
                channel: channel as u8,
            })
    }

    /// Decode the block into an owned value.
    ///
    /// Fails only with `InvalidRotation`; an unknown bank is kept as
    /// [`BankId::Unknown`] and the samples are still decoded.
    pub fn to_block(&self, block: usize) -> Result<RawBlock, Error> {
        let rotation = self.rotation(block)?;
        let mut samples = [ChannelSample::default(); SCANS_PER_BLOCK];
        for (dst, src) in samples.iter_mut().zip(self.samples()) {
            *dst = src;
        }

        Ok(RawBlock {
            bank: self.bank_id(),
            rotation,
            samples,
        })
    }
}

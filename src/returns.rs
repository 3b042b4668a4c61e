// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{block::ChannelSample, error::Error, layout::PacketSlice};
use clap::ValueEnum;
use std::fmt;

/// Echo selection configured on the device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, ValueEnum)]
pub enum ReturnMode {
    /// One block per firing carrying the strongest echo.
    #[default]
    Strongest,
    /// One block per firing carrying the last echo.
    Last,
    /// Two consecutive blocks per firing sharing rotation and bank.
    Dual,
}

impl fmt::Display for ReturnMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ReturnMode::Strongest => write!(f, "strongest"),
            ReturnMode::Last => write!(f, "last"),
            ReturnMode::Dual => write!(f, "dual"),
        }
    }
}

/// Semantic of one emitted measurement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReturnKind {
    /// Strongest echo selected by the hardware.
    Strongest,
    /// Last echo selected by the hardware.
    Last,
    /// First block of a dual return pair.
    First,
    /// Second block of a dual return pair.
    Second,
    /// Dual return block whose partner did not match, emitted on its own.
    Unpaired,
}

/// Tags blocks with their return semantic and pairs dual return blocks.
///
/// Blocks `2k` and `2k + 1` form a pair in dual mode. The pair is only
/// trusted when both blocks carry the same raw rotation and bank fields.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReturnResolver {
    mode: ReturnMode,
}

impl ReturnResolver {
    /// Create a resolver for `mode`.
    pub fn new(mode: ReturnMode) -> Self {
        ReturnResolver { mode }
    }

    /// Returns the configured mode.
    pub fn mode(&self) -> ReturnMode {
        self.mode
    }

    /// Return kind of `block`.
    ///
    /// In dual mode a broken pair fails with `DualReturnPairingError` for
    /// both of its blocks, the caller emits them as [`ReturnKind::Unpaired`].
    pub fn classify(&self, packet: &PacketSlice, block: usize) -> Result<ReturnKind, Error> {
        match self.mode {
            ReturnMode::Strongest => Ok(ReturnKind::Strongest),
            ReturnMode::Last => Ok(ReturnKind::Last),
            ReturnMode::Dual => {
                let first = block & !1;
                let err = Error::DualReturnPairingError { block: first };
                let (a, b) = match (packet.block(first), packet.block(first + 1)) {
                    (Some(a), Some(b)) => (a, b),
                    _ => return Err(err),
                };

                if a.raw_rotation() != b.raw_rotation() || a.raw_bank() != b.raw_bank() {
                    return Err(err);
                }

                if block == first {
                    Ok(ReturnKind::First)
                } else {
                    Ok(ReturnKind::Second)
                }
            }
        }
    }

    /// Returns true when a second return repeats its first return and must
    /// not be emitted twice.
    #[inline]
    pub fn is_duplicate(first: &ChannelSample, second: &ChannelSample) -> bool {
        first.raw_distance == second.raw_distance && first.raw_intensity == second.raw_intensity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        block::{Bank, RawBlock, SCANS_PER_BLOCK},
        layout::{PacketVariant, RawPacket, Status},
    };

    fn packet(rotations: &[(Bank, u16)]) -> Vec<u8> {
        let blocks = rotations
            .iter()
            .map(|(bank, rotation)| RawBlock::new(*bank, *rotation, [(100, 1); SCANS_PER_BLOCK]))
            .collect();
        RawPacket {
            blocks,
            gps_timestamp: 0,
            status: Status {
                raw_type: 0,
                value: 0,
            },
        }
        .to_bytes(PacketVariant::Standard)
        .unwrap()
    }

    fn paired() -> Vec<(Bank, u16)> {
        (0..12).map(|i| (Bank::Upper, (i / 2) * 20)).collect()
    }

    #[test]
    fn single_modes() {
        let data = packet(&paired());
        let slice = PacketSlice::from_slice(&data, PacketVariant::Standard).unwrap();

        let strongest = ReturnResolver::new(ReturnMode::Strongest);
        assert_eq!(strongest.classify(&slice, 5).unwrap(), ReturnKind::Strongest);

        let last = ReturnResolver::new(ReturnMode::Last);
        assert_eq!(last.classify(&slice, 0).unwrap(), ReturnKind::Last);
    }

    #[test]
    fn dual_pairs() {
        let data = packet(&paired());
        let slice = PacketSlice::from_slice(&data, PacketVariant::Standard).unwrap();
        let dual = ReturnResolver::new(ReturnMode::Dual);

        assert_eq!(dual.classify(&slice, 0).unwrap(), ReturnKind::First);
        assert_eq!(dual.classify(&slice, 1).unwrap(), ReturnKind::Second);
        assert_eq!(dual.classify(&slice, 10).unwrap(), ReturnKind::First);
        assert_eq!(dual.classify(&slice, 11).unwrap(), ReturnKind::Second);
    }

    #[test]
    fn dual_mismatch() {
        let mut blocks = paired();
        blocks[3].1 += 1;
        blocks[5].0 = Bank::Lower;
        let data = packet(&blocks);
        let slice = PacketSlice::from_slice(&data, PacketVariant::Standard).unwrap();
        let dual = ReturnResolver::new(ReturnMode::Dual);

        for block in [2, 3] {
            assert!(matches!(
                dual.classify(&slice, block),
                Err(Error::DualReturnPairingError { block: 2 })
            ));
        }
        assert!(matches!(
            dual.classify(&slice, 4),
            Err(Error::DualReturnPairingError { block: 4 })
        ));
        assert_eq!(dual.classify(&slice, 6).unwrap(), ReturnKind::First);
    }

    #[test]
    fn duplicate_second() {
        let a = ChannelSample {
            raw_distance: 10,
            raw_intensity: 3,
            channel: 0,
        };
        let mut b = a;
        assert!(ReturnResolver::is_duplicate(&a, &b));
        b.raw_distance = 11;
        assert!(!ReturnResolver::is_duplicate(&a, &b));
    }
}

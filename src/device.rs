// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    block::{Bank, SCANS_PER_BLOCK},
    layout::PacketVariant,
};
use clap::ValueEnum;
use std::fmt;

/// RFans-16 block duration in microseconds.
pub const RFANS16_BLOCK_TDURATION: f32 = 110.592;
/// RFans-16 delay between consecutive lasers of one firing.
pub const RFANS16_DSR_TOFFSET: f32 = 2.304;
/// RFans-16 delay between the two firings of a block.
pub const RFANS16_FIRING_TOFFSET: f32 = 55.296;
/// RFans-16 lasers per firing.
pub const RFANS16_SCANS_PER_FIRING: usize = 16;

/// Nominal rotation rate of the scanner in revolutions per second.
pub const DEFAULT_ROTATION_HZ: f32 = 10.0;

/// RFans-32 block duration in microseconds.
pub const RFANS32_BLOCK_TDURATION: f32 = 55.296;
/// RFans-32 delay between consecutive lasers.
pub const RFANS32_DSR_TOFFSET: f32 = 1.728;

/// Supported Surestar devices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, ValueEnum)]
pub enum DeviceModel {
    /// 16 lasers, two firings per block, standard packets.
    #[default]
    Rfans16,
    /// 32 lasers, one firing per block, standard packets.
    Rfans32,
    /// 32 lasers with the extended 24 block packet firmware.
    Rfans32Extended,
}

impl DeviceModel {
    /// Packet size variant produced by this device's firmware.
    pub fn variant(self) -> PacketVariant {
        match self {
            DeviceModel::Rfans16 | DeviceModel::Rfans32 => PacketVariant::Standard,
            DeviceModel::Rfans32Extended => PacketVariant::Extended,
        }
    }

    /// Firing schedule of this device.
    pub fn firing_schedule(self) -> FiringSchedule {
        match self {
            DeviceModel::Rfans16 => FiringSchedule::rfans16(),
            DeviceModel::Rfans32 | DeviceModel::Rfans32Extended => FiringSchedule::rfans32(),
        }
    }

    /// Packets sent during one revolution at `rotation_hz`, rounded up.
    ///
    /// Assumes one block per firing, dual return doubles the count. Zero
    /// when the rate is not positive.
    pub fn packets_per_revolution(self, rotation_hz: f32) -> u64 {
        if rotation_hz.is_nan() || rotation_hz <= 0.0 {
            return 0;
        }
        let packet_duration =
            self.variant().blocks() as f64 * self.firing_schedule().block_duration as f64;
        (1e6 / (rotation_hz as f64 * packet_duration)).ceil() as u64
    }

    /// Number of physical lasers.
    pub fn lasers(self) -> usize {
        match self {
            DeviceModel::Rfans16 => RFANS16_SCANS_PER_FIRING,
            DeviceModel::Rfans32 | DeviceModel::Rfans32Extended => SCANS_PER_BLOCK,
        }
    }
}

impl fmt::Display for DeviceModel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DeviceModel::Rfans16 => write!(f, "rfans16"),
            DeviceModel::Rfans32 => write!(f, "rfans32"),
            DeviceModel::Rfans32Extended => write!(f, "rfans32-extended"),
        }
    }
}

/// Fixed per-device firing schedule.
///
/// Offsets are microseconds from the start of the block. Upper and lower
/// bank channels fire in different sub-orders, so each bank has its own
/// table. Every offset is strictly below `block_duration`.
#[derive(Clone, Debug, PartialEq)]
pub struct FiringSchedule {
    /// Time between two firing groups in microseconds.
    pub block_duration: f32,
    /// Upper bank channel offsets.
    pub upper: [f32; SCANS_PER_BLOCK],
    /// Lower bank channel offsets.
    pub lower: [f32; SCANS_PER_BLOCK],
}

impl FiringSchedule {
    /// Two firings of 16 lasers per block, identical for both banks.
    pub fn rfans16() -> Self {
        let mut offsets = [0.0; SCANS_PER_BLOCK];
        for (channel, offset) in offsets.iter_mut().enumerate() {
            let firing = channel / RFANS16_SCANS_PER_FIRING;
            let dsr = channel % RFANS16_SCANS_PER_FIRING;
            *offset = dsr as f32 * RFANS16_DSR_TOFFSET + firing as f32 * RFANS16_FIRING_TOFFSET;
        }

        FiringSchedule {
            block_duration: RFANS16_BLOCK_TDURATION,
            upper: offsets,
            lower: offsets,
        }
    }

    /// Upper bank fires in channel order, lower bank in reverse channel order.
    pub fn rfans32() -> Self {
        let mut upper = [0.0; SCANS_PER_BLOCK];
        let mut lower = [0.0; SCANS_PER_BLOCK];
        for channel in 0..SCANS_PER_BLOCK {
            upper[channel] = channel as f32 * RFANS32_DSR_TOFFSET;
            lower[channel] = (SCANS_PER_BLOCK - 1 - channel) as f32 * RFANS32_DSR_TOFFSET;
        }

        FiringSchedule {
            block_duration: RFANS32_BLOCK_TDURATION,
            upper,
            lower,
        }
    }

    /// Firing offset in microseconds for `channel` of a block from `bank`.
    /// Blocks with an unknown bank use the upper table.
    #[inline]
    pub fn offset(&self, bank: Option<Bank>, channel: usize) -> f32 {
        match bank {
            Some(Bank::Lower) => self.lower[channel],
            Some(Bank::Upper) | None => self.upper[channel],
        }
    }

    /// Fraction of the block duration elapsed when `channel` fires, in [0, 1).
    #[inline]
    pub fn fraction(&self, bank: Option<Bank>, channel: usize) -> f32 {
        self.offset(bank, channel) / self.block_duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfans16_offsets() {
        let schedule = FiringSchedule::rfans16();
        assert_eq!(schedule.offset(Some(Bank::Upper), 0), 0.0);
        assert!((schedule.offset(Some(Bank::Upper), 1) - 2.304).abs() < 1e-4);
        assert!((schedule.offset(Some(Bank::Upper), 16) - 55.296).abs() < 1e-4);
        assert!((schedule.fraction(Some(Bank::Lower), 16) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn fractions_below_one() {
        for model in [
            DeviceModel::Rfans16,
            DeviceModel::Rfans32,
            DeviceModel::Rfans32Extended,
        ] {
            let schedule = model.firing_schedule();
            for channel in 0..SCANS_PER_BLOCK {
                for bank in [Some(Bank::Upper), Some(Bank::Lower), None] {
                    let fraction = schedule.fraction(bank, channel);
                    assert!((0.0..1.0).contains(&fraction), "{} {}", model, channel);
                }
            }
        }
    }

    #[test]
    fn rfans32_bank_orders_differ() {
        let schedule = FiringSchedule::rfans32();
        assert_eq!(schedule.offset(Some(Bank::Upper), 0), 0.0);
        assert_eq!(schedule.offset(Some(Bank::Lower), 31), 0.0);
        assert!(schedule.offset(Some(Bank::Lower), 0) > schedule.offset(Some(Bank::Lower), 1));
        assert_eq!(schedule.offset(None, 5), schedule.offset(Some(Bank::Upper), 5));
    }

    #[test]
    fn packets_per_revolution() {
        assert_eq!(DeviceModel::Rfans16.packets_per_revolution(DEFAULT_ROTATION_HZ), 76);
        assert_eq!(DeviceModel::Rfans32.packets_per_revolution(DEFAULT_ROTATION_HZ), 151);
        assert_eq!(
            DeviceModel::Rfans32Extended.packets_per_revolution(DEFAULT_ROTATION_HZ),
            76
        );
        assert_eq!(DeviceModel::Rfans16.packets_per_revolution(5.0), 151);
        assert_eq!(DeviceModel::Rfans16.packets_per_revolution(0.0), 0);
        assert_eq!(DeviceModel::Rfans16.packets_per_revolution(f32::NAN), 0);
    }

    #[test]
    fn variants() {
        assert_eq!(DeviceModel::Rfans16.variant(), PacketVariant::Standard);
        assert_eq!(DeviceModel::Rfans32Extended.variant(), PacketVariant::Extended);
        assert_eq!(DeviceModel::Rfans16.lasers(), 16);
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Per-channel calibration consumed by the packet decoder.
//!
//! The decoder only needs a lookup from (bank, channel) to a vertical angle
//! and optional distance/intensity corrections. [`CalibrationTable`] covers
//! the common case and can be loaded from JSON:
//!
//! ```json
//! {
//!   "upper": [{ "vertical_angle": -15.0 }, { "vertical_angle": -13.0 }],
//!   "lower": [{ "vertical_angle": -15.0, "distance": [0.02, 1.0, 0.0] }]
//! }
//! ```

use crate::{block::Bank, device::DeviceModel, error::Error};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Quadratic correction `c0 + c1 * x + c2 * x^2`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Polynomial(pub [f32; 3]);

impl Polynomial {
    /// Identity correction.
    pub const IDENTITY: Polynomial = Polynomial([0.0, 1.0, 0.0]);

    /// Evaluate the polynomial at `x`.
    #[inline]
    pub fn apply(&self, x: f32) -> f32 {
        let [c0, c1, c2] = self.0;
        c0 + x * (c1 + x * c2)
    }
}

impl Default for Polynomial {
    fn default() -> Self {
        Polynomial::IDENTITY
    }
}

/// Correction for one laser channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelCorrection {
    /// Elevation of the laser in degrees, positive up.
    pub vertical_angle: f32,
    /// Applied to the distance in meters before clamping.
    #[serde(default)]
    pub distance: Polynomial,
    /// Applied to the raw intensity before clamping to 0..=255.
    #[serde(default)]
    pub intensity: Polynomial,
}

/// Calibration lookup for a single device.
///
/// Implementations must be cheap to query, the decoder calls them once per
/// measurement.
pub trait Calibration: Send + Sync {
    /// Correction for `channel` (0..31 within its block) of `bank`. `None`
    /// is passed for blocks whose bank sentinel was not recognised.
    fn correction(&self, bank: Option<Bank>, channel: usize) -> ChannelCorrection;
}

/// Zero vertical angle and no corrections.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityCalibration;

impl Calibration for IdentityCalibration {
    fn correction(&self, _bank: Option<Bank>, _channel: usize) -> ChannelCorrection {
        ChannelCorrection::default()
    }
}

/// Table based calibration, one entry per channel and bank.
///
/// Channels without an entry fall back to [`ChannelCorrection::default`].
/// An empty lower table reuses the upper table.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationTable {
    /// Upper bank corrections indexed by channel.
    pub upper: Vec<ChannelCorrection>,
    /// Lower bank corrections indexed by channel.
    #[serde(default)]
    pub lower: Vec<ChannelCorrection>,
}

impl CalibrationTable {
    /// Parse a JSON calibration table.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let table: CalibrationTable = serde_json::from_str(json)?;
        if table.upper.is_empty() {
            return Err(Error::Calibration("upper table is empty".to_string()));
        }
        Ok(table)
    }

    /// Load a JSON calibration table from `path`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Evenly spaced vertical angles, `lasers` entries repeated to fill a
    /// 32 channel block.
    pub fn linear(lasers: usize, first: f32, step: f32) -> Self {
        let upper = (0..32)
            .map(|channel| ChannelCorrection {
                vertical_angle: first + (channel % lasers.max(1)) as f32 * step,
                ..Default::default()
            })
            .collect();

        CalibrationTable {
            upper,
            lower: Vec::new(),
        }
    }

    /// Nominal table for `model`.
    pub fn nominal(model: DeviceModel) -> Self {
        match model {
            // -15..=15 degrees in 2 degree steps, both firings of a block.
            DeviceModel::Rfans16 => Self::linear(16, -15.0, 2.0),
            // -25..=6 degrees in 1 degree steps.
            DeviceModel::Rfans32 | DeviceModel::Rfans32Extended => Self::linear(32, -25.0, 1.0),
        }
    }
}

impl Calibration for CalibrationTable {
    fn correction(&self, bank: Option<Bank>, channel: usize) -> ChannelCorrection {
        let table = match bank {
            Some(Bank::Lower) if !self.lower.is_empty() => &self.lower,
            _ => &self.upper,
        };
        table.get(channel).copied().unwrap_or_default()
    }
}

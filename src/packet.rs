// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Packet decoding and measurement extraction.
//!
//! [`PacketDecoder::decode`] validates a buffer against the configured
//! variant and returns a [`Packet`] borrowing it. The measurements are
//! produced lazily by [`Packet::measurements`], one pass per decode, with
//! block level diagnostics interleaved as `Err` items so a caller can count
//! them without losing the rest of the packet.

use crate::{
    block::{BankId, BlockSlice, RawBlock, SCANS_PER_BLOCK},
    calibration::{Calibration, CalibrationTable},
    device::{DeviceModel, FiringSchedule},
    error::Error,
    layout::{PacketSlice, PacketVariant, Status},
    returns::{ReturnKind, ReturnMode, ReturnResolver},
};
use log::{debug, warn};
use std::{collections::VecDeque, sync::Arc};
use tracing::instrument;

/// Degrees per rotation unit.
pub const ROTATION_RESOLUTION: f32 = 0.01;
/// Meters per distance unit.
pub const DISTANCE_RESOLUTION: f32 = 0.004;
/// Distances are clamped to this range in meters.
pub const DISTANCE_MAX: f32 = 130.0;
/// Rotation units in a full turn, 36000 and 0 are the same angle.
pub const ROTATION_UNITS: i32 = 36000;
/// Largest block to block rotation step used for interpolation, in rotation
/// units. Larger steps mean a gap or a corrupt neighbour.
pub const MAX_BLOCK_DELTA: f32 = 1000.0;

/// Decoder configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Device model, selects packet variant and firing schedule.
    pub model: DeviceModel,
    /// Echo selection configured on the device.
    pub return_mode: ReturnMode,
}

/// One calibrated measurement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Measurement {
    /// Range in meters, always positive.
    pub distance: f32,
    /// Interpolated azimuth in degrees, [0, 360).
    pub azimuth: f32,
    /// Laser elevation in degrees from the calibration.
    pub vertical_angle: f32,
    /// Intensity after calibration.
    pub intensity: u8,
    /// Channel index inside the block, 0..31.
    pub channel: u8,
    /// Block index inside the packet.
    pub block: u8,
    /// Bank of the block, `Unknown` marks untrusted samples.
    pub bank: BankId,
    /// Return semantic.
    pub return_kind: ReturnKind,
    /// Capture time estimate in device microseconds.
    pub timestamp: f64,
}

impl Measurement {
    /// Cartesian coordinates in the sensor frame, x forward, y left, z up.
    /// The sensor azimuth increases clockwise seen from above.
    pub fn xyz(&self) -> [f32; 3] {
        let azi = self.azimuth.to_radians();
        let ele = self.vertical_angle.to_radians();
        let x = self.distance * ele.cos() * azi.cos();
        let y = -self.distance * ele.cos() * azi.sin();
        let z = self.distance * ele.sin();
        [x, y, z]
    }
}

/// Owned result of draining a [`Packet`].
#[derive(Debug)]
pub struct DecodedPacket {
    /// Device clock in microseconds.
    pub gps_timestamp: u32,
    /// Trailer status.
    pub status: Status,
    /// Measurements in wire order.
    pub measurements: Vec<Measurement>,
    /// Block level diagnostics in wire order.
    pub errors: Vec<Error>,
}

/// Stateless packet decoder. Safe to share between threads; every call to
/// [`PacketDecoder::decode`] is independent.
#[derive(Clone)]
pub struct PacketDecoder {
    config: DecoderConfig,
    schedule: FiringSchedule,
    resolver: ReturnResolver,
    calibration: Arc<dyn Calibration>,
}

impl PacketDecoder {
    /// Create a decoder using the nominal calibration of the model.
    pub fn new(config: DecoderConfig) -> Self {
        let calibration = Arc::new(CalibrationTable::nominal(config.model));
        Self::with_calibration(config, calibration)
    }

    /// Create a decoder with an injected calibration.
    pub fn with_calibration(config: DecoderConfig, calibration: Arc<dyn Calibration>) -> Self {
        PacketDecoder {
            config,
            schedule: config.model.firing_schedule(),
            resolver: ReturnResolver::new(config.return_mode),
            calibration,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> DecoderConfig {
        self.config
    }

    /// Returns the packet variant expected from the configured model.
    pub fn variant(&self) -> PacketVariant {
        self.config.model.variant()
    }

    /// Validate `data` and wrap it for decoding.
    ///
    /// Fails with `MalformedPacket` when the length does not match the
    /// configured variant, in which case no measurements are produced.
    #[instrument(skip_all, level = "trace")]
    pub fn decode<'a>(&'a self, data: &'a [u8]) -> Result<Packet<'a>, Error> {
        let slice = PacketSlice::from_slice(data, self.variant())?;
        Ok(Packet {
            decoder: self,
            slice,
        })
    }
}

/// A validated packet borrowed for the duration of one decode.
pub struct Packet<'a> {
    decoder: &'a PacketDecoder,
    slice: PacketSlice<'a>,
}

impl<'a> Packet<'a> {
    /// Returns the GPS timestamp in device microseconds.
    pub fn gps_timestamp(&self) -> u32 {
        self.slice.gps_timestamp()
    }

    /// Returns the trailer status.
    pub fn status(&self) -> Status {
        self.slice.status()
    }

    /// Returns the underlying packet slice.
    pub fn slice(&self) -> PacketSlice<'a> {
        self.slice
    }

    /// Decode every block into raw channel samples, without calibration or
    /// filtering. Blocks with an invalid rotation yield `Err`.
    pub fn blocks(&self) -> impl Iterator<Item = Result<RawBlock, Error>> + 'a {
        self.slice
            .blocks()
            .enumerate()
            .map(|(index, block)| block.to_block(index))
    }

    /// Consume the packet into its lazy measurement sequence.
    pub fn measurements(self) -> Measurements<'a> {
        Measurements {
            decoder: self.decoder,
            slice: self.slice,
            next_block: 0,
            channel: 0,
            current: None,
            pending: VecDeque::new(),
        }
    }

    /// Drain all measurements and diagnostics into owned storage.
    pub fn into_decoded(self) -> DecodedPacket {
        let gps_timestamp = self.gps_timestamp();
        let status = self.status();
        let mut measurements = Vec::with_capacity(self.slice.num_blocks() * SCANS_PER_BLOCK);
        let mut errors = Vec::new();

        for item in self.measurements() {
            match item {
                Ok(measurement) => measurements.push(measurement),
                Err(err) => errors.push(err),
            }
        }

        DecodedPacket {
            gps_timestamp,
            status,
            measurements,
            errors,
        }
    }
}

/// Per block values resolved once before its channels are emitted.
#[derive(Clone, Copy)]
struct BlockState<'a> {
    index: usize,
    slice: BlockSlice<'a>,
    bank: BankId,
    rotation: u16,
    /// Rotation units covered by one block duration.
    delta: f32,
    kind: ReturnKind,
    /// First block of the pair, set for dual second returns.
    partner: Option<BlockSlice<'a>>,
    /// Start of the firing group in device microseconds.
    start_time: f64,
}

/// Lazy, one pass sequence of measurements of a single packet.
///
/// Yields `Err` for block level diagnostics (`InvalidRotation`,
/// `UnknownBank`, `DualReturnPairingError`) ahead of the block's
/// measurements. A fresh pass requires decoding the bytes again.
pub struct Measurements<'a> {
    decoder: &'a PacketDecoder,
    slice: PacketSlice<'a>,
    next_block: usize,
    channel: usize,
    current: Option<BlockState<'a>>,
    pending: VecDeque<Error>,
}

impl<'a> Measurements<'a> {
    fn start_block(&mut self, index: usize) -> Option<BlockState<'a>> {
        let block = self.slice.block(index)?;
        let resolver = &self.decoder.resolver;

        // Pairing is judged from the raw fields so it is reported once per
        // pair even when one of its blocks is dropped below.
        let kind = match resolver.classify(&self.slice, index) {
            Ok(kind) => Ok(kind),
            Err(err) => Err((index % 2 == 0).then_some(err)),
        };

        let rotation = match block.rotation(index) {
            Ok(rotation) => rotation,
            Err(err) => {
                debug!("dropping block: {}", err);
                self.pending.push_back(err);
                if let Err(Some(err)) = kind {
                    self.pending.push_back(err);
                }
                return None;
            }
        };

        let bank = block.bank_id();
        if let Err(err) = block.bank(index) {
            debug!("untrusted block: {}", err);
            self.pending.push_back(err);
        }

        let kind = match kind {
            Ok(kind) => kind,
            Err(err) => {
                if let Some(err) = err {
                    warn!("{}, emitting single returns", err);
                    self.pending.push_back(err);
                }
                ReturnKind::Unpaired
            }
        };

        let partner = match kind {
            ReturnKind::Second => self.slice.block(index - 1),
            _ => None,
        };

        let group = firing_group(&self.slice, index, rotation) as f64;
        let start_time =
            self.slice.gps_timestamp() as f64 + group * self.decoder.schedule.block_duration as f64;

        Some(BlockState {
            index,
            slice: block,
            bank,
            rotation,
            delta: rotation_delta(&self.slice, index, rotation),
            kind,
            partner,
            start_time,
        })
    }

    fn measure(&self, state: &BlockState<'a>, channel: usize) -> Option<Measurement> {
        let sample = state.slice.sample(channel);
        if sample.is_no_return() {
            return None;
        }

        if let Some(partner) = &state.partner {
            if ReturnResolver::is_duplicate(&partner.sample(channel), &sample) {
                return None;
            }
        }

        let bank = state.bank.bank();
        let correction = self.decoder.calibration.correction(bank, channel);

        let distance = correction
            .distance
            .apply(sample.raw_distance as f32 * DISTANCE_RESOLUTION)
            .min(DISTANCE_MAX);
        if distance <= 0.0 || !distance.is_finite() {
            return None;
        }

        let intensity = correction
            .intensity
            .apply(sample.raw_intensity as f32)
            .round()
            .clamp(0.0, 255.0) as u8;

        let fraction = self.decoder.schedule.fraction(bank, channel);
        let azimuth = interpolate_azimuth(state.rotation, state.delta, fraction);
        let timestamp = state.start_time + self.decoder.schedule.offset(bank, channel) as f64;

        Some(Measurement {
            distance,
            azimuth,
            vertical_angle: correction.vertical_angle,
            intensity,
            channel: channel as u8,
            block: state.index as u8,
            bank: state.bank,
            return_kind: state.kind,
            timestamp,
        })
    }
}

impl Iterator for Measurements<'_> {
    type Item = Result<Measurement, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(err) = self.pending.pop_front() {
                return Some(Err(err));
            }

            if let Some(state) = self.current {
                while self.channel < SCANS_PER_BLOCK {
                    let channel = self.channel;
                    self.channel += 1;
                    if let Some(measurement) = self.measure(&state, channel) {
                        return Some(Ok(measurement));
                    }
                }
                self.current = None;
            }

            if self.next_block >= self.slice.num_blocks() {
                return None;
            }

            let index = self.next_block;
            self.next_block += 1;
            self.channel = 0;
            self.current = self.start_block(index);
        }
    }
}

/// Valid rotation of block `index`, 36000 folded onto 0.
fn valid_rotation(slice: &PacketSlice, index: usize) -> Option<i32> {
    let rotation = slice.block(index)?.rotation(index).ok()?;
    Some(rotation as i32 % ROTATION_UNITS)
}

/// Index of the firing group of block `index` with `rotation`.
///
/// A new group starts whenever the valid rotation changes, so dual return
/// pairs and upper/lower blocks fired together share one capture time.
/// Blocks with an invalid rotation are skipped.
fn firing_group(slice: &PacketSlice, index: usize, rotation: u16) -> usize {
    let rotation = rotation as i32 % ROTATION_UNITS;
    let mut previous = None;
    let mut group = 0;

    for r in (0..index)
        .filter_map(|i| valid_rotation(slice, i))
        .chain(std::iter::once(rotation))
    {
        if previous.is_some_and(|p| p != r) {
            group += 1;
        }
        previous = Some(r);
    }

    group
}

/// Forward angular distance from `from` to `to` across the 0/36000 seam.
#[inline]
fn forward_delta(from: i32, to: i32) -> f32 {
    (to - from).rem_euclid(ROTATION_UNITS) as f32
}

/// Rotation units swept during one block for block `index`.
///
/// Uses the next block with a different rotation, blocks sharing a rotation
/// fire together. The last firing group extrapolates from the previous
/// distinct rotation. Steps above [`MAX_BLOCK_DELTA`] disable interpolation.
fn rotation_delta(slice: &PacketSlice, index: usize, rotation: u16) -> f32 {
    let rotation = rotation as i32 % ROTATION_UNITS;

    let next = (index + 1..slice.num_blocks())
        .filter_map(|i| valid_rotation(slice, i))
        .find(|&r| r != rotation);

    let delta = match next {
        Some(next) => forward_delta(rotation, next),
        None => (0..index)
            .rev()
            .filter_map(|i| valid_rotation(slice, i))
            .find(|&r| r != rotation)
            .map(|prev| forward_delta(prev, rotation))
            .unwrap_or(0.0),
    };

    if delta > MAX_BLOCK_DELTA {
        0.0
    } else {
        delta
    }
}

/// Azimuth in degrees of a channel firing `fraction` of a block after
/// `rotation`, wrapped into [0, 360).
#[inline]
pub fn interpolate_azimuth(rotation: u16, delta: f32, fraction: f32) -> f32 {
    let units = (rotation as f32 + delta * fraction).rem_euclid(ROTATION_UNITS as f32);
    let azimuth = units * ROTATION_RESOLUTION;
    if azimuth >= 360.0 {
        azimuth - 360.0
    } else {
        azimuth
    }
}

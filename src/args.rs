// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use std::{net::SocketAddr, path::PathBuf};
use surestar::{
    calibration::CalibrationTable,
    device::DeviceModel,
    error::Error,
    packet::DecoderConfig,
    returns::ReturnMode,
};
use tracing::level_filters::LevelFilter;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// The Surestar device model, selects packet size and firing timing.
    #[arg(long, env, value_enum, default_value = "rfans16")]
    pub model: DeviceModel,

    /// The echo selection configured on the device.
    #[arg(long, env, value_enum, default_value = "strongest")]
    pub return_mode: ReturnMode,

    /// Local address receiving the LiDAR data stream.
    #[arg(long, env, default_value = "0.0.0.0:2014")]
    pub bind: SocketAddr,

    /// JSON calibration table, the nominal table of the model is used when
    /// omitted.
    #[arg(long, env)]
    pub calibration: Option<PathBuf>,

    /// Kernel receive buffer size in bytes.
    #[arg(long, env, default_value = "2097152")]
    pub socket_bufsize: usize,

    /// Receiver to decoder channel capacity in packets.
    #[arg(long, env, default_value = "1024")]
    pub queue: usize,

    /// Azimuth drop in degrees that starts a new revolution.
    #[arg(long, env, default_value = "180")]
    pub revolution_threshold: f32,

    /// Scanner rotation rate in revolutions per second, sets the expected
    /// packet count of a revolution.
    #[arg(long, env, default_value = "10")]
    pub rotation_hz: f32,

    /// Replay packets from a pcap capture instead of the network, requires
    /// the pcap feature.
    #[arg(long, env)]
    pub pcap: Option<PathBuf>,

    /// Application log level
    #[arg(long, env, default_value = "info")]
    pub rust_log: LevelFilter,

    /// Enable Tracy profiler broadcast
    #[arg(long, env)]
    pub tracy: bool,
}

impl Args {
    /// Load the calibration table or fall back to the model's nominal one.
    pub fn calibration(&self) -> Result<CalibrationTable, Error> {
        match &self.calibration {
            Some(path) => CalibrationTable::from_path(path),
            None => Ok(CalibrationTable::nominal(self.model)),
        }
    }

    /// Packets expected in one revolution for the configured device.
    pub fn expected_packets(&self) -> u64 {
        let packets = self.model.packets_per_revolution(self.rotation_hz);
        match self.return_mode {
            ReturnMode::Dual => packets * 2,
            ReturnMode::Strongest | ReturnMode::Last => packets,
        }
    }
}

impl From<&Args> for DecoderConfig {
    fn from(args: &Args) -> Self {
        DecoderConfig {
            model: args.model,
            return_mode: args.return_mode,
        }
    }
}

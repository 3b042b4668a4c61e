// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Surestar Library
//!
//! This library decodes the UDP data packets of Surestar RFans spinning
//! LiDAR sensors into calibrated range measurements.
//!
//! # Features
//!
//! - **Wire Layout** - Checked little-endian accessors over borrowed packets
//! - **Packet Decoder** - Lazy measurement iterator with azimuth
//!   interpolation, dual return pairing and per-block diagnostics
//! - **Calibration** - Pluggable per-channel corrections, JSON tables
//! - **NMEA Time** - Wall clock time assembled from packet trailers
//! - **UDP Receiver** - Bulk `recvmmsg` acquisition on Linux
//!
//! # Example
//!
//! ```no_run
//! use surestar::packet::{DecoderConfig, PacketDecoder};
//!
//! let decoder = PacketDecoder::new(DecoderConfig::default());
//! let data = std::fs::read("packet.bin").unwrap();
//! for measurement in decoder.decode(&data).unwrap().measurements().flatten() {
//!     println!("{:?}", measurement.xyz());
//! }
//! ```

#![warn(missing_docs)]

/// Block level wire format and bank identifiers
pub mod block;

/// Per-channel calibration
pub mod calibration;

/// Common socket and scheduler utilities
pub mod common;

/// Device models and firing schedules
pub mod device;

/// Error types and decode statistics
pub mod error;

/// Packet level wire format
pub mod layout;

/// Network utilities for UDP communication
pub mod net;

/// NMEA time accumulation
pub mod nmea;

/// Packet decoder
pub mod packet;

/// Capture file replay
#[cfg(feature = "pcap")]
pub mod pcap;

/// Return mode handling
pub mod returns;

/// Revolution boundary detection
pub mod revolution;

pub use error::{DecodeStats, Error};
pub use packet::{DecodedPacket, DecoderConfig, Measurement, Packet, PacketDecoder};

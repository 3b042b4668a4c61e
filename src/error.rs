// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use std::{fmt, io};

/// Surestar decoding error types.
///
/// Packet level errors (`MalformedPacket`, `UnexpectedEndOfSlice`) reject the
/// whole frame. Block level errors are diagnostics: the decoder reports them
/// and keeps going with the rest of the packet.
#[derive(Debug)]
pub enum Error {
    /// I/O error from socket or file operations
    Io(io::Error),
    /// Packet length does not match the configured firmware variant
    MalformedPacket {
        /// Length of the received buffer.
        len: usize,
        /// Length expected for the configured variant.
        expected: usize,
    },
    /// Slice too short for the structure being read
    UnexpectedEndOfSlice(usize),
    /// Block carries a bank identifier other than the two sentinels
    UnknownBank {
        /// Block index within the packet.
        block: usize,
        /// Raw 16-bit bank field.
        bank: u16,
    },
    /// Block rotation is outside 0..=36000
    InvalidRotation {
        /// Block index within the packet.
        block: usize,
        /// Raw rotation field in hundredths of a degree.
        rotation: u16,
    },
    /// Dual return blocks do not share rotation and bank
    DualReturnPairingError {
        /// Index of the first block of the pair.
        block: usize,
    },
    /// Calibration table could not be loaded
    Calibration(String),
}

impl Error {
    /// Returns true for block level diagnostics after which decoding of the
    /// packet continues.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::UnknownBank { .. }
                | Error::InvalidRotation { .. }
                | Error::DualReturnPairingError { .. }
        )
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::Calibration(err.to_string())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "io error: {}", err),
            Error::MalformedPacket { len, expected } => {
                write!(f, "malformed packet: {} bytes, expected {}", len, expected)
            }
            Error::UnexpectedEndOfSlice(len) => write!(f, "unexpected end of slice: {}", len),
            Error::UnknownBank { block, bank } => {
                write!(f, "unknown bank 0x{:04X} in block {}", bank, block)
            }
            Error::InvalidRotation { block, rotation } => {
                write!(f, "invalid rotation {} in block {}", rotation, block)
            }
            Error::DualReturnPairingError { block } => {
                write!(f, "dual return pairing error at blocks {}-{}", block, block + 1)
            }
            Error::Calibration(msg) => write!(f, "calibration error: {}", msg),
        }
    }
}

/// Running counters for decode health reporting.
///
/// Callers feed every packet result and every block diagnostic through
/// [`DecodeStats::record_error`] so malformed-packet rates can be reported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecodeStats {
    /// Packets handed to the decoder.
    pub packets: u64,
    /// Measurements emitted.
    pub measurements: u64,
    /// Packets rejected for their length.
    pub malformed_packets: u64,
    /// Blocks with an unrecognised bank sentinel.
    pub unknown_banks: u64,
    /// Blocks dropped for an out of range rotation.
    pub invalid_rotations: u64,
    /// Dual return pairs that fell back to single returns.
    pub pairing_errors: u64,
}

impl DecodeStats {
    /// Count one error against its kind.
    pub fn record_error(&mut self, err: &Error) {
        match err {
            Error::MalformedPacket { .. } | Error::UnexpectedEndOfSlice(_) => {
                self.malformed_packets += 1
            }
            Error::UnknownBank { .. } => self.unknown_banks += 1,
            Error::InvalidRotation { .. } => self.invalid_rotations += 1,
            Error::DualReturnPairingError { .. } => self.pairing_errors += 1,
            Error::Io(_) | Error::Calibration(_) => (),
        }
    }

    /// Fraction of packets rejected as malformed, 0.0 when nothing was seen.
    pub fn malformed_rate(&self) -> f64 {
        if self.packets == 0 {
            0.0
        } else {
            self.malformed_packets as f64 / self.packets as f64
        }
    }

    /// Total block level diagnostics.
    pub fn block_errors(&self) -> u64 {
        self.unknown_banks + self.invalid_rotations + self.pairing_errors
    }
}

impl fmt::Display for DecodeStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "packets={} measurements={} malformed={} unknown_bank={} invalid_rotation={} pairing={}",
            self.packets,
            self.measurements,
            self.malformed_packets,
            self.unknown_banks,
            self.invalid_rotations,
            self.pairing_errors
        )
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Absolute time assembled from packet trailers.
//!
//! Each packet carries one status tag and value, so a complete wall clock
//! time is only known after the device cycled through every time tag. The
//! accumulator is single-writer; share it behind a `Mutex` when packets are
//! decoded on several threads.

use crate::layout::{Status, StatusType};
use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;

const YEAR: u8 = 1 << 0;
const MONTH: u8 = 1 << 1;
const DAY: u8 = 1 << 2;
const HOUR: u8 = 1 << 3;
const MINUTE: u8 = 1 << 4;
const SECOND: u8 = 1 << 5;
const COMPLETE: u8 = YEAR | MONTH | DAY | HOUR | MINUTE | SECOND;

/// Wall clock time reported by the device GPS.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct NmeaTime {
    /// Full year, 2000 + the reported value.
    pub year: u16,
    /// Month, 1..=12.
    pub mon: u8,
    /// Day of month, 1..=31.
    pub day: u8,
    /// Hour, 0..=23.
    pub hour: u8,
    /// Minute, 0..=59.
    pub min: u8,
    /// Second, 0..=59.
    pub sec: u8,
}

impl NmeaTime {
    /// Convert to a UTC date time, `None` when the fields do not form a
    /// valid calendar date.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        NaiveDate::from_ymd_opt(self.year as i32, self.mon as u32, self.day as u32)?
            .and_hms_opt(self.hour as u32, self.min as u32, self.sec as u32)
            .map(|time| time.and_utc())
    }
}

impl fmt::Display for NmeaTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
            self.year, self.mon, self.day, self.hour, self.min, self.sec
        )
    }
}

/// Collects time fields from consecutive packet trailers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NmeaTimeAccumulator {
    time: NmeaTime,
    seen: u8,
    gps_status: Option<u8>,
}

impl NmeaTimeAccumulator {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the status of one packet. Unknown tags are ignored.
    pub fn update(&mut self, status: Status) {
        let value = status.value;
        match status.kind() {
            Some(StatusType::Year) => {
                self.time.year = 2000 + value as u16;
                self.seen |= YEAR;
            }
            Some(StatusType::Month) => {
                self.time.mon = value;
                self.seen |= MONTH;
            }
            Some(StatusType::Date) => {
                self.time.day = value;
                self.seen |= DAY;
            }
            Some(StatusType::Hours) => {
                self.time.hour = value;
                self.seen |= HOUR;
            }
            Some(StatusType::Minutes) => {
                self.time.min = value;
                self.seen |= MINUTE;
            }
            Some(StatusType::Seconds) => {
                self.time.sec = value;
                self.seen |= SECOND;
            }
            Some(StatusType::GpsStatus) => self.gps_status = Some(value),
            None => (),
        }
    }

    /// Returns true once every time field was seen at least once.
    pub fn is_complete(&self) -> bool {
        self.seen == COMPLETE
    }

    /// Returns the latest time, `None` until it is complete.
    pub fn time(&self) -> Option<NmeaTime> {
        self.is_complete().then_some(self.time)
    }

    /// Returns the last GPS status byte.
    pub fn gps_status(&self) -> Option<u8> {
        self.gps_status
    }

    /// Forget everything seen so far.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

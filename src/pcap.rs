// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Offline replay of captured LiDAR traffic.

use etherparse::{SlicedPacket, TransportSlice};
use log::{debug, error};
use std::io::Read;

/// UDP payloads of a pcapng capture in file order.
///
/// Only datagrams sent to `port` are kept when a port is given. Frames that
/// are not Ethernet/IP/UDP are skipped, a read error ends the iteration.
pub fn udp_payloads<R: Read>(reader: R, port: Option<u16>) -> impl Iterator<Item = Vec<u8>> {
    pcarp::Capture::new(reader)
        .map_while(|cap| match cap {
            Ok(cap) => Some(cap),
            Err(err) => {
                error!("pcap error: {:?}", err);
                None
            }
        })
        .filter_map(move |cap| match SlicedPacket::from_ethernet(&cap.data) {
            Err(err) => {
                debug!("skipping frame: {:?}", err);
                None
            }
            Ok(pkt) => match pkt.transport {
                Some(TransportSlice::Udp(udp))
                    if port.map_or(true, |port| udp.destination_port() == port) =>
                {
                    Some(udp.payload().to_vec())
                }
                _ => None,
            },
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        block::{Bank, RawBlock, SCANS_PER_BLOCK},
        layout::{RawPacket, Status, PACKET_SIZE},
        packet::{DecoderConfig, PacketDecoder},
    };
    use etherparse::PacketBuilder;
    use std::io::Cursor;

    const SRC_MAC: [u8; 6] = [0x00, 0x1b, 0x21, 0x00, 0x00, 0x01];
    const DST_MAC: [u8; 6] = [0x00, 0x1b, 0x21, 0x00, 0x00, 0x02];
    const SRC_IP: [u8; 4] = [192, 168, 0, 3];
    const DST_IP: [u8; 4] = [192, 168, 0, 102];

    fn block(kind: u32, body: &[u8]) -> Vec<u8> {
        let padded = body.len().div_ceil(4) * 4;
        let len = (12 + padded) as u32;
        let mut out = Vec::with_capacity(len as usize);
        out.extend_from_slice(&kind.to_le_bytes());
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(body);
        out.resize(8 + padded, 0);
        out.extend_from_slice(&len.to_le_bytes());
        out
    }

    /// Section header and one Ethernet interface.
    fn header() -> Vec<u8> {
        let mut shb = Vec::new();
        shb.extend_from_slice(&0x1a2b_3c4du32.to_le_bytes());
        shb.extend_from_slice(&1u16.to_le_bytes());
        shb.extend_from_slice(&0u16.to_le_bytes());
        shb.extend_from_slice(&(-1i64).to_le_bytes());

        let mut idb = Vec::new();
        idb.extend_from_slice(&1u16.to_le_bytes());
        idb.extend_from_slice(&0u16.to_le_bytes());
        idb.extend_from_slice(&65535u32.to_le_bytes());

        let mut out = block(0x0a0d_0d0a, &shb);
        out.extend(block(1, &idb));
        out
    }

    fn enhanced(frame: &[u8], ts: u32) -> Vec<u8> {
        let mut epb = Vec::new();
        epb.extend_from_slice(&0u32.to_le_bytes());
        epb.extend_from_slice(&0u32.to_le_bytes());
        epb.extend_from_slice(&ts.to_le_bytes());
        epb.extend_from_slice(&(frame.len() as u32).to_le_bytes());
        epb.extend_from_slice(&(frame.len() as u32).to_le_bytes());
        epb.extend_from_slice(frame);
        block(6, &epb)
    }

    fn udp(dst_port: u16, payload: &[u8]) -> Vec<u8> {
        let builder = PacketBuilder::ethernet2(SRC_MAC, DST_MAC)
            .ipv4(SRC_IP, DST_IP, 64)
            .udp(2368, dst_port);
        let mut frame = Vec::with_capacity(builder.size(payload.len()));
        builder.write(&mut frame, payload).unwrap();
        frame
    }

    fn tcp(dst_port: u16, payload: &[u8]) -> Vec<u8> {
        let builder = PacketBuilder::ethernet2(SRC_MAC, DST_MAC)
            .ipv4(SRC_IP, DST_IP, 64)
            .tcp(40000, dst_port, 1, 1024);
        let mut frame = Vec::with_capacity(builder.size(payload.len()));
        builder.write(&mut frame, payload).unwrap();
        frame
    }

    fn lidar_packet(gps_timestamp: u32) -> Vec<u8> {
        let blocks = (0..12u16)
            .map(|i| RawBlock::new(Bank::Upper, i * 20, [(1000, 10); SCANS_PER_BLOCK]))
            .collect();
        RawPacket {
            blocks,
            gps_timestamp,
            status: Status {
                raw_type: 0,
                value: 0,
            },
        }
        .to_bytes(DecoderConfig::default().model.variant())
        .unwrap()
    }

    /// Two LiDAR datagrams on the data port mixed with traffic that must be
    /// skipped.
    fn capture() -> Vec<u8> {
        let mut out = header();
        out.extend(enhanced(&udp(2014, &lidar_packet(100)), 1));
        out.extend(enhanced(&udp(2015, &lidar_packet(200)), 2));
        out.extend(enhanced(&tcp(2014, &lidar_packet(300)), 3));
        out.extend(enhanced(&udp(2014, &lidar_packet(400)), 4));
        out
    }

    #[test]
    fn test_pcap() {
        let _ = env_logger::builder().is_test(true).try_init();

        let decoder = PacketDecoder::new(DecoderConfig::default());
        let payloads: Vec<_> = udp_payloads(Cursor::new(capture()), Some(2014)).collect();
        assert_eq!(payloads.len(), 2);

        let stamps: Vec<_> = payloads
            .iter()
            .map(|payload| {
                assert_eq!(payload.len(), PACKET_SIZE);
                let decoded = decoder.decode(payload).unwrap().into_decoded();
                assert!(decoded.errors.is_empty());
                assert_eq!(decoded.measurements.len(), 384);
                decoded.gps_timestamp
            })
            .collect();
        assert_eq!(stamps, [100, 400]);
    }

    #[test]
    fn any_port() {
        let payloads: Vec<_> = udp_payloads(Cursor::new(capture()), None).collect();
        assert_eq!(payloads.len(), 3);
    }

    #[test]
    fn corrupt_tail() {
        let mut data = capture();
        // Block length below the 12 byte minimum.
        data.extend_from_slice(&6u32.to_le_bytes());
        data.extend_from_slice(&4u32.to_le_bytes());
        data.extend_from_slice(&[0xff; 16]);

        let payloads: Vec<_> = udp_payloads(Cursor::new(data), Some(2014)).collect();
        assert_eq!(payloads.len(), 2);
    }
}

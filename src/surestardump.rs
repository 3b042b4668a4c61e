// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

mod args;

use args::Args;
use clap::Parser;
use kanal::{AsyncReceiver, AsyncSender};
use std::{sync::Arc, thread};
use surestar::{
    net,
    nmea::NmeaTimeAccumulator,
    revolution::RevolutionDetector,
    DecodeStats, PacketDecoder,
};
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{layer::SubscriberExt as _, Layer as _, Registry};
use tracy_client::{frame_mark, plot};

#[cfg(feature = "profiling")]
#[global_allocator]
static GLOBAL: tracy_client::ProfiledAllocator<std::alloc::System> =
    tracy_client::ProfiledAllocator::new(std::alloc::System, 100);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    args.tracy.then(tracy_client::Client::start);

    let stdout_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_filter(args.rust_log);

    let journald = match tracing_journald::layer() {
        Ok(journald) => Some(journald.with_filter(args.rust_log)),
        Err(_) => None,
    };

    let tracy = match args.tracy {
        true => Some(tracing_tracy::TracyLayer::default().with_filter(args.rust_log)),
        false => None,
    };

    let subscriber = Registry::default()
        .with(stdout_log)
        .with(journald)
        .with(tracy);
    tracing::subscriber::set_global_default(subscriber)?;
    tracing_log::LogTracer::init()?;

    let calibration = Arc::new(args.calibration()?);
    let decoder = PacketDecoder::with_calibration((&args).into(), calibration);
    info!(
        "decoder: model={} return_mode={} variant={} packet_size={}",
        args.model,
        args.return_mode,
        decoder.variant(),
        decoder.variant().len()
    );

    let (tx, rx) = kanal::bounded_async(args.queue);
    spawn_source(&args, tx)?;

    let mut monitor = Monitor::new(&args);
    monitor.run(&decoder, rx).await;
    info!("stream closed: {}", monitor.stats);

    Ok(())
}

/// Feed packets from the network, or from a capture when one is given.
fn spawn_source(args: &Args, tx: AsyncSender<Vec<u8>>) -> Result<(), std::io::Error> {
    #[cfg(feature = "pcap")]
    if let Some(path) = args.pcap.clone() {
        let file = std::fs::File::open(&path)?;
        let port = args.bind.port();
        info!("replaying {} port {}", path.display(), port);

        thread::Builder::new()
            .name("pcap".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!("pcap runtime error: {:?}", e);
                        return;
                    }
                };
                runtime.block_on(async move {
                    for payload in surestar::pcap::udp_payloads(file, Some(port)) {
                        if tx.send(payload).await.is_err() {
                            break;
                        }
                    }
                });
            })?;

        return Ok(());
    }

    #[cfg(not(feature = "pcap"))]
    if args.pcap.is_some() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "pcap replay requires the pcap feature",
        ));
    }

    let addr = args.bind;
    let bufsize = args.socket_bufsize;
    info!("listening on {}", addr);

    thread::Builder::new()
        .name("udp".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!("udp runtime error: {:?}", e);
                    return;
                }
            };
            if let Err(e) = runtime.block_on(net::recv_packets(addr, bufsize, tx)) {
                error!("udp receiver error: {:?}", e);
            }
        })?;

    Ok(())
}

/// Per-revolution health reporting of the decoded stream.
struct Monitor {
    stats: DecodeStats,
    nmea: NmeaTimeAccumulator,
    detector: RevolutionDetector,
    tracy: bool,
    expected: u64,
    points: u64,
    packets: u64,
}

impl Monitor {
    fn new(args: &Args) -> Self {
        Monitor {
            stats: DecodeStats::default(),
            nmea: NmeaTimeAccumulator::new(),
            detector: RevolutionDetector::new(args.revolution_threshold),
            tracy: args.tracy,
            expected: args.expected_packets(),
            points: 0,
            packets: 0,
        }
    }

    async fn run(&mut self, decoder: &PacketDecoder, rx: AsyncReceiver<Vec<u8>>) {
        while let Ok(msg) = rx.recv().await {
            self.packet(decoder, &msg);
        }
    }

    #[instrument(skip_all, level = "trace")]
    fn packet(&mut self, decoder: &PacketDecoder, msg: &[u8]) {
        self.stats.packets += 1;
        self.packets += 1;

        let packet = match decoder.decode(msg) {
            Ok(packet) => packet,
            Err(err) => {
                debug!("{}", err);
                self.stats.record_error(&err);
                return;
            }
        };

        self.nmea.update(packet.status());

        for item in packet.measurements() {
            match item {
                Ok(measurement) => {
                    if self.detector.observe(measurement.azimuth) {
                        self.revolution();
                    }
                    self.stats.measurements += 1;
                    self.points += 1;
                }
                Err(err) => self.stats.record_error(&err),
            }
        }
    }

    fn revolution(&mut self) {
        let dropped = self.expected.saturating_sub(self.packets);
        match self.nmea.time() {
            Some(time) => info!(
                "revolution {} at {}: packets={}/{} dropped={} points={} {}",
                self.detector.revolutions(),
                time,
                self.packets,
                self.expected,
                dropped,
                self.points,
                self.stats
            ),
            None => info!(
                "revolution {}: packets={}/{} dropped={} points={} {}",
                self.detector.revolutions(),
                self.packets,
                self.expected,
                dropped,
                self.points,
                self.stats
            ),
        }

        if self.tracy {
            plot!("points", self.points as f64);
            plot!("packets", self.packets as f64);
            plot!("dropped packets", dropped as f64);
            plot!("malformed rate", self.stats.malformed_rate());
            plot!("block errors", self.stats.block_errors() as f64);
            frame_mark();
        }

        self.points = 0;
        self.packets = 0;
    }
}

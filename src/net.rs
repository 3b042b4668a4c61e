// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! UDP acquisition of Surestar data packets.
//!
//! Every datagram is forwarded as its own buffer, trimmed to the received
//! length, so the decoder sees short and oversized frames and can count them
//! as malformed instead of silently realigning the stream.

use kanal::AsyncSender;
use std::{io, net::SocketAddr};
use tokio::net::UdpSocket;
use tracing::error;

/// Receive slot size, large enough for either packet variant plus slack so
/// oversized frames keep their real length.
pub const MAX_DATAGRAM_SIZE: usize = 4096;

/// Default Surestar data port.
pub const DEFAULT_DATA_PORT: u16 = 2014;

/// The Linux implementation uses the recvmmsg system call to enable bulk
/// reads of UDP packets. This is not available on other platforms.
#[cfg(target_os = "linux")]
pub async fn recv_packets(
    addr: SocketAddr,
    bufsize: usize,
    tx: AsyncSender<Vec<u8>>,
) -> Result<(), io::Error> {
    use std::{os::fd::AsRawFd, thread, time::Duration};

    use crate::common::{set_process_priority, set_socket_bufsize};

    const VLEN: usize = 64;
    const RETRY_TIME: Duration = Duration::from_micros(250);

    let mut mmsgs = vec![
        libc::mmsghdr {
            msg_hdr: libc::msghdr {
                msg_name: std::ptr::null_mut(),
                msg_namelen: 0,
                msg_iov: std::ptr::null_mut(),
                msg_iovlen: 0,
                msg_control: std::ptr::null_mut(),
                msg_controllen: 0,
                msg_flags: 0,
            },
            msg_len: 0,
        };
        VLEN
    ];
    let mut iovecs = vec![
        libc::iovec {
            iov_base: std::ptr::null_mut(),
            iov_len: 0,
        };
        VLEN
    ];
    let mut buf = vec![0; VLEN * MAX_DATAGRAM_SIZE];

    set_process_priority();
    let sock = std::net::UdpSocket::bind(addr)?;
    sock.set_nonblocking(true)?;
    let sock = UdpSocket::from_std(set_socket_bufsize(sock, bufsize))?;

    loop {
        for i in 0..VLEN {
            iovecs[i].iov_base = buf[i * MAX_DATAGRAM_SIZE..].as_mut_ptr() as *mut libc::c_void;
            iovecs[i].iov_len = MAX_DATAGRAM_SIZE;
            mmsgs[i].msg_hdr.msg_iov = &mut iovecs[i];
            mmsgs[i].msg_hdr.msg_iovlen = 1;
            mmsgs[i].msg_hdr.msg_name = std::ptr::null_mut();
            mmsgs[i].msg_hdr.msg_namelen = 0;
            mmsgs[i].msg_hdr.msg_control = std::ptr::null_mut();
            mmsgs[i].msg_hdr.msg_controllen = 0;
            mmsgs[i].msg_hdr.msg_flags = 0;
            mmsgs[i].msg_len = 0;
        }

        match unsafe {
            libc::recvmmsg(
                sock.as_raw_fd(),
                mmsgs.as_mut_ptr(),
                VLEN as u32,
                0,
                std::ptr::null_mut(),
            )
        } {
            -1 => {
                let err = io::Error::last_os_error();
                match err.kind() {
                    io::ErrorKind::Interrupted => (),
                    io::ErrorKind::WouldBlock => thread::sleep(RETRY_TIME),
                    _ => error!("recvmmsg error: {:?}", err),
                }
            }
            n => {
                for (i, mmsg) in mmsgs.iter().enumerate().take(n as usize) {
                    let begin = i * MAX_DATAGRAM_SIZE;
                    let len = (mmsg.msg_len as usize).min(MAX_DATAGRAM_SIZE);
                    if tx.send(buf[begin..begin + len].to_vec()).await.is_err() {
                        // Decoder is gone, nothing left to feed.
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Portable receiver reading one datagram at a time.
#[cfg(not(target_os = "linux"))]
pub async fn recv_packets(
    addr: SocketAddr,
    bufsize: usize,
    tx: AsyncSender<Vec<u8>>,
) -> Result<(), io::Error> {
    use crate::common::set_socket_bufsize;

    let sock = std::net::UdpSocket::bind(addr)?;
    sock.set_nonblocking(true)?;
    let sock = UdpSocket::from_std(set_socket_bufsize(sock, bufsize))?;
    let mut buf = [0; MAX_DATAGRAM_SIZE];

    loop {
        match sock.recv_from(&mut buf).await {
            Ok((n, _)) => {
                if tx.send(buf[..n].to_vec()).await.is_err() {
                    return Ok(());
                }
            }
            Err(e) => error!("recv error: {:?}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{thread, time::Duration};

    #[test]
    fn forwards_datagrams() {
        let probe = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = probe.local_addr().unwrap();
        drop(probe);

        let (tx, rx) = kanal::bounded_async(16);
        thread::spawn(move || {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap()
                .block_on(recv_packets(addr, 1 << 20, tx))
        });

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let sender = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();

        // The receiver binds asynchronously, resend until it is up.
        let msg = rt.block_on(async {
            for _ in 0..100 {
                let _ = sender.send_to(&[7u8; 1205], addr);
                if let Ok(Ok(msg)) = tokio::time::timeout(Duration::from_millis(20), rx.recv()).await
                {
                    return Some(msg);
                }
            }
            None
        });

        let msg = msg.unwrap();
        assert_eq!(msg.len(), 1205);
        assert!(msg.iter().all(|&b| b == 7));
    }
}

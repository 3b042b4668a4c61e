// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use log::warn;
use std::net::UdpSocket;

/// Move the calling thread to the real-time FIFO scheduler so bursts from the
/// LiDAR are drained before the kernel buffer overflows.
#[cfg(target_os = "linux")]
pub fn set_process_priority() {
    let mut param = libc::sched_param { sched_priority: 10 };
    let pid = unsafe { libc::pthread_self() };
    let err = unsafe {
        libc::pthread_setschedparam(pid, libc::SCHED_FIFO, &mut param as *mut libc::sched_param)
    };
    if err != 0 {
        let err = std::io::Error::last_os_error();
        warn!("unable to set receiver real-time fifo scheduler: {}", err);
    }
}

/// Scheduler priority is only raised on Linux.
#[cfg(not(target_os = "linux"))]
pub fn set_process_priority() {}

/// Request a kernel receive buffer of `size` bytes. Failures are logged, the
/// socket is returned either way.
#[cfg(target_os = "linux")]
pub fn set_socket_bufsize(socket: UdpSocket, size: usize) -> UdpSocket {
    use std::os::fd::AsRawFd;

    let size = size as libc::c_int;
    let err = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_RCVBUF,
            &size as *const _ as *const libc::c_void,
            std::mem::size_of_val(&size) as libc::socklen_t,
        )
    };
    if err != 0 {
        warn!(
            "setsockopt SO_RCVBUF failed: {}",
            std::io::Error::last_os_error()
        );
    }
    socket
}

/// Receive buffer sizing is only applied on Linux.
#[cfg(not(target_os = "linux"))]
pub fn set_socket_bufsize(socket: UdpSocket, _size: usize) -> UdpSocket {
    socket
}

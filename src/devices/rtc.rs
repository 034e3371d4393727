//! Virtualized RTC.
//!
//! The chip runs at one fixed base rate; each process sees its own rate by
//! getting flagged every `base / rate` base ticks.

use crate::config::{MAX_PROCESSES, RTC_BASE_HZ, RTC_DEFAULT_HZ, RTC_MIN_HZ};
use crate::error::{SysError, SysResult};
use crate::process::Pid;

/// Accepts powers of two in `RTC_MIN_HZ..=RTC_BASE_HZ`.
pub fn validate_rate(hz: u32) -> SysResult<u32> {
    if hz.is_power_of_two() && (RTC_MIN_HZ..=RTC_BASE_HZ).contains(&hz) {
        Ok(hz)
    } else {
        Err(SysError::InvalidArgument)
    }
}

#[derive(Debug, Clone, Copy)]
struct Client {
    interval: u64,
    ready: bool,
}

pub struct RtcState {
    counter: u64,
    clients: [Option<Client>; MAX_PROCESSES],
}

impl RtcState {
    pub fn new() -> Self {
        Self { counter: 0, clients: [None; MAX_PROCESSES] }
    }

    /// Registers `pid` at the default rate.
    pub fn open(&mut self, pid: Pid) {
        self.clients[pid.index()] =
            Some(Client { interval: u64::from(RTC_BASE_HZ / RTC_DEFAULT_HZ), ready: false });
    }

    pub fn set_rate(&mut self, pid: Pid, hz: u32) -> SysResult<()> {
        let hz = validate_rate(hz)?;
        let client = self.clients[pid.index()].as_mut().ok_or(SysError::InvalidArgument)?;
        client.interval = u64::from(RTC_BASE_HZ / hz);
        Ok(())
    }

    pub fn close(&mut self, pid: Pid) {
        self.clients[pid.index()] = None;
    }

    /// One base-rate interrupt.
    pub fn tick(&mut self) {
        self.counter = self.counter.wrapping_add(1);
        let counter = self.counter;
        for client in self.clients.iter_mut().flatten() {
            if counter % client.interval == 0 {
                client.ready = true;
            }
        }
    }

    /// Consumes `pid`'s wake-up flag.
    pub fn take_ready(&mut self, pid: Pid) -> bool {
        match &mut self.clients[pid.index()] {
            Some(client) => core::mem::take(&mut client.ready),
            None => false,
        }
    }
}

impl Default for RtcState {
    fn default() -> Self {
        Self::new()
    }
}

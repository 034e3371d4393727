//! A three-terminal x86_64 teaching kernel.
//!
//! Everything outside [`arch`] is plain `no_std` logic written against the
//! traits in [`hw`], so it runs under `cargo test` on the host.

#![cfg_attr(not(test), no_std)]
#![cfg_attr(all(target_arch = "x86_64", target_os = "none"), feature(abi_x86_interrupt))]

pub mod config;
pub mod devices;
pub mod error;
pub mod fd;
pub mod fs;
pub mod hw;
pub mod kernel;
pub mod memory;
pub mod process;
pub mod syscalls;
pub mod terminal;

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub mod arch;

#[cfg(test)]
mod testing;

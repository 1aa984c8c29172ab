#[macro_use]
extern crate cfg_if;
extern crate crossbeam_ebr;
extern crate crossbeam_utils;

pub mod config;
pub mod ds_impl;

pub use self::ds_impl::ebr::{ConcurrentSet, List, LockFreeSet, MarkableRef};

cfg_if! {
    if #[cfg(target_os = "linux")] {
        extern crate tikv_jemalloc_ctl;

        /// Reads the number of bytes allocated through jemalloc.
        pub struct MemSampler {
            epoch_mib: tikv_jemalloc_ctl::epoch_mib,
            allocated_mib: tikv_jemalloc_ctl::stats::allocated_mib,
        }

        impl MemSampler {
            pub fn new() -> anyhow::Result<Self> {
                Ok(MemSampler {
                    epoch_mib: tikv_jemalloc_ctl::epoch::mib()?,
                    allocated_mib: tikv_jemalloc_ctl::stats::allocated::mib()?,
                })
            }

            pub fn sample(&self) -> usize {
                match self.epoch_mib.advance().and_then(|_| self.allocated_mib.read()) {
                    Ok(allocated) => allocated,
                    Err(e) => {
                        tracing::warn!("failed to sample jemalloc stats: {e}");
                        0
                    }
                }
            }
        }
    } else {
        pub struct MemSampler {}

        impl MemSampler {
            pub fn new() -> anyhow::Result<Self> {
                tracing::info!("memory usage benchmark is supported only for linux");
                Ok(MemSampler {})
            }

            pub fn sample(&self) -> usize {
                0
            }
        }
    }
}

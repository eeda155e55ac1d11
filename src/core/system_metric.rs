//! Background collectors of the system signals read by the adaptive system slot.
//! Each collector is a thread started once that refreshes its value every interval.
//! The values are kept as atomic bit patterns, so the slot reads them without a lock.

use crate::{logging, utils};
use lazy_static::lazy_static;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, Once};
use sysinfo::{get_current_pid, ProcessExt, System, SystemExt};

lazy_static! {
    static ref SYSTEM: Mutex<System> = Mutex::new(System::new());
}

static CURRENT_LOAD: AtomicU64 = AtomicU64::new(0);
static CURRENT_CPU: AtomicU32 = AtomicU32::new(0);

static LOAD_ONCE: Once = Once::new();
static CPU_ONCE: Once = Once::new();

fn spawn_collector(once: &'static Once, interval_ms: u32, collect: fn()) {
    if interval_ms == 0 {
        return;
    }
    once.call_once(move || {
        std::thread::spawn(move || loop {
            collect();
            utils::sleep_for_ms(interval_ms as u64);
        });
    });
}

/// starts refreshing the CPU usage of the current process, a zero interval disables it
pub fn init_cpu_collector(cpu_interval_ms: u32) {
    spawn_collector(&CPU_ONCE, cpu_interval_ms, || {
        set_cpu_usage(process_cpu_usage())
    });
}

/// starts refreshing the load1 of the machine, a zero interval disables it
pub fn init_load_collector(load_interval_ms: u32) {
    spawn_collector(&LOAD_ONCE, load_interval_ms, || {
        set_system_load(SYSTEM.lock().unwrap().load_average().one)
    });
}

fn process_cpu_usage() -> f32 {
    let pid = match get_current_pid() {
        Ok(pid) => pid,
        Err(err) => {
            logging::FREQUENT_ERROR_ONCE.call_once(|| {
                logging::error!(
                    "[SystemMetric] Failed to get the current pid, error: {:?}",
                    err
                )
            });
            return 0.0;
        }
    };
    let mut system = SYSTEM.lock().unwrap();
    system.refresh_process(pid);
    system
        .process(pid)
        .map(|process| process.cpu_usage())
        .unwrap_or_default()
}

#[inline]
pub fn current_load() -> f64 {
    f64::from_bits(CURRENT_LOAD.load(Ordering::Relaxed))
}

/// overrides the collected load1 until the next refresh
#[inline]
pub fn set_system_load(load: f64) {
    CURRENT_LOAD.store(load.to_bits(), Ordering::Relaxed);
}

/// CPU usage of the current process in percent
#[inline]
pub fn current_cpu_usage() -> f32 {
    f32::from_bits(CURRENT_CPU.load(Ordering::Relaxed))
}

/// overrides the collected CPU usage until the next refresh
#[inline]
pub fn set_cpu_usage(usage: f32) {
    CURRENT_CPU.store(usage.to_bits(), Ordering::Relaxed);
}

//! Backpressure for the store's streaming loops. Monthly collections run to
//! millions of records; when available RAM falls under a floor, scans yield
//! briefly instead of racing the OS into swap. Readings are cached so the
//! check is cheap enough to sit inside a per-record loop.

use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};
use sysinfo::{System, SystemExt};

const SAMPLE_INTERVAL: Duration = Duration::from_millis(500);
const PAUSE: Duration = Duration::from_millis(25);

struct Sampler {
    sys: System,
    sampled_at: Option<Instant>,
    free_frac: f64, // available / total, 0.0..=1.0
}

static SAMPLER: OnceLock<Mutex<Sampler>> = OnceLock::new();

fn free_fraction() -> f64 {
    let sampler = SAMPLER.get_or_init(|| {
        Mutex::new(Sampler { sys: System::new(), sampled_at: None, free_frac: 1.0 })
    });
    let mut s = sampler.lock().unwrap();
    let stale = match s.sampled_at {
        None => true,
        Some(at) => at.elapsed() >= SAMPLE_INTERVAL,
    };
    if stale {
        s.sys.refresh_memory();
        let total = s.sys.total_memory() as f64;
        s.free_frac = if total > 0.0 {
            (s.sys.available_memory() as f64 / total).clamp(0.0, 1.0)
        } else {
            1.0
        };
        s.sampled_at = Some(Instant::now());
    }
    s.free_frac
}

/// Yield briefly when the free-memory fraction is under `floor`.
pub fn throttle_if_low_memory(floor: f64) {
    if free_fraction() < floor {
        std::thread::sleep(PAUSE);
    }
}

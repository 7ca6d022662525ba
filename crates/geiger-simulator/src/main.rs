//! Headless desktop simulator for the geiger-rs radiation monitor.
//!
//! Runs the same task split as the firmware on two OS threads:
//!
//! - **acquisition** polls an interrupt-style edge counter every 100 ms
//!   (simulated) and forwards one-second buckets over `BUCKET_CHANNEL`
//! - **main** runs the measurement core, the alarm and the "presentation"
//!   side at 20 Hz, logging the `/api/data` JSON payload once per simulated
//!   second
//!
//! Configuration comes from environment variables; see [`config`].

mod config;
mod source;

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use serde::Serialize;

use geiger_core::acquisition::{IsrEdgeCounter, PulseAcquisition};
use geiger_core::alarm::{AlarmEvaluator, AlarmThresholds, Buzzer};
use geiger_core::app_state::{
    BUCKET_CHANNEL, BucketForwarder, HISTORY_CHANNEL, PUBLISHED, THRESHOLDS, drain_buckets,
    publish_history,
};
use geiger_core::config::{AlarmCadence, MeasurementConfig};
use geiger_core::history::HistoryResolution;
use geiger_core::{MeasurementCore, Snapshot, settings};

use config::SimConfig;
use source::GeigerSource;

// ---------------------------------------------------------------------------
// Timing constants
// ---------------------------------------------------------------------------

/// Minimum accepted spacing between two edges, as configured on hardware
const EDGE_MIN_WIDTH_US: u32 = 50;

/// Presentation / alarm loop period (20 Hz)
const PRESENTATION_PERIOD_MS: u64 = 50;

/// Interval between JSON payload dumps, in simulated milliseconds
const REPORT_INTERVAL_MS: u64 = 1000;

/// Stand-in for the GPIO interrupt's edge counter
static EDGES: IsrEdgeCounter = IsrEdgeCounter::new(EDGE_MIN_WIDTH_US);

// ---------------------------------------------------------------------------
// Simulated clock
// ---------------------------------------------------------------------------

/// Wall clock scaled by the speed-up factor
#[derive(Clone, Copy)]
struct SimClock {
    start: Instant,
    speedup: f64,
}

impl SimClock {
    fn new(speedup: f64) -> Self {
        Self {
            start: Instant::now(),
            speedup,
        }
    }

    fn now_us(&self) -> u64 {
        (self.start.elapsed().as_secs_f64() * self.speedup * 1e6) as u64
    }

    fn now_ms(&self) -> u64 {
        self.now_us() / 1000
    }

    /// Real time to sleep for `sim_ms` of simulated time
    fn real_duration(&self, sim_ms: u64) -> Duration {
        Duration::from_secs_f64(sim_ms as f64 / 1000.0 / self.speedup)
    }
}

// ---------------------------------------------------------------------------
// Buzzer
// ---------------------------------------------------------------------------

/// Logs tone changes instead of driving a piezo
#[derive(Default)]
struct LogBuzzer {
    playing: Option<u32>,
}

impl Buzzer for LogBuzzer {
    fn play(&mut self, frequency_hz: u32) {
        if self.playing != Some(frequency_hz) {
            debug!("Buzzer: {} Hz", frequency_hz);
        }
        self.playing = Some(frequency_hz);
    }

    fn silence(&mut self) {
        if self.playing.take().is_some() {
            debug!("Buzzer: silent");
        }
    }
}

// ---------------------------------------------------------------------------
// Network payload
// ---------------------------------------------------------------------------

/// Body of the device's `/api/data` endpoint
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiData<'a> {
    #[serde(flatten)]
    snapshot: &'a Snapshot,
    level: &'static str,
    alarm_active: bool,
}

// ---------------------------------------------------------------------------
// Alarm settings
// ---------------------------------------------------------------------------

/// Resolve thresholds from the environment or the settings file.
///
/// Thresholds given in the environment are written back to the file.
fn load_thresholds(config: &SimConfig) -> Option<AlarmThresholds> {
    if let Some(thresholds) = config.alarm_override {
        match settings::encode(&thresholds) {
            Ok(record) => {
                if let Err(e) = std::fs::write(&config.settings_path, record) {
                    warn!(
                        "Could not save alarm settings to {}: {}",
                        config.settings_path.display(),
                        e
                    );
                }
            }
            Err(e) => warn!("Could not encode alarm settings: {}", e),
        }
        return Some(thresholds);
    }

    match std::fs::read(&config.settings_path) {
        Ok(bytes) => settings::load_or_disabled(&bytes),
        Err(_) => {
            info!("No stored alarm settings, alarm disabled");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Acquisition thread
// ---------------------------------------------------------------------------

fn run_acquisition(
    clock: SimClock,
    config: MeasurementConfig,
    sim: SimConfig,
    running: Arc<AtomicBool>,
) {
    let mut source = GeigerSource::new(sim.source_cpm, sim.seed);
    let mut acquisition = PulseAcquisition::new(&EDGES, clock.now_ms());
    let mut forwarder = BucketForwarder::new(&BUCKET_CHANNEL);
    let poll = clock.real_duration(config.poll_interval_ms as u64);

    while running.load(Ordering::Relaxed) {
        let now_us = clock.now_us();

        if let Some((cpm, at_secs)) = sim.hotspot {
            if now_us >= at_secs * 1_000_000 && source.cpm() != cpm {
                info!("Source moved into hotspot: {} CPM", cpm);
                source.set_cpm(cpm, now_us);
            }
        }

        // Edges "arrive" up to now, then the poll reads the counter
        source.run_until(now_us, &EDGES);
        if let Some(bucket) = acquisition.tick(now_us / 1000) {
            forwarder.forward(bucket);
        }

        thread::sleep(poll);
    }

    info!(
        "Acquisition stopped: {} pulses emitted, {} counted, {} edges filtered, {} counter anomalies",
        source.emitted(),
        acquisition.total_pulses(),
        EDGES.rejected(),
        acquisition.anomalies()
    );
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    env_logger::init();
    info!("Starting geiger-rs simulator");

    let sim = match SimConfig::from_env() {
        Ok(sim) => sim,
        Err(e) => {
            error!("Invalid simulator configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!(
        "Source: {} CPM, speed-up {}x, duration {}",
        sim.source_cpm,
        sim.speedup,
        sim.duration_secs
            .map(|s| format!("{} s", s))
            .unwrap_or_else(|| "unbounded".into())
    );

    let config = MeasurementConfig::default();
    let mut core = match MeasurementCore::new(config) {
        Ok(core) => core,
        Err(e) => {
            error!("Invalid measurement configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    THRESHOLDS.store(load_thresholds(&sim));
    match THRESHOLDS.load() {
        Some(t) if t.enabled => info!(
            "Alarm armed: {} uSv/h or {} mSv",
            t.current_rate_limit, t.cumulative_dose_limit
        ),
        _ => info!("Alarm disabled"),
    }

    let clock = SimClock::new(sim.speedup);
    let running = Arc::new(AtomicBool::new(true));

    let acquisition = {
        let running = running.clone();
        let sim = sim.clone();
        thread::Builder::new()
            .name("acquisition".into())
            .spawn(move || run_acquisition(clock, config, sim, running))
    };
    let acquisition = match acquisition {
        Ok(handle) => handle,
        Err(e) => {
            error!("Failed to start acquisition thread: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let receiver = BUCKET_CHANNEL.receiver();
    let history_publisher = HISTORY_CHANNEL.immediate_publisher();
    let mut chart_events = HISTORY_CHANNEL.subscriber().ok();

    let mut alarm = AlarmEvaluator::new(AlarmCadence::default());
    let mut buzzer = LogBuzzer::default();

    let frame = clock.real_duration(PRESENTATION_PERIOD_MS);
    let mut last_update_ms = clock.now_ms();
    let mut last_report_ms = last_update_ms;

    // -----------------------------------------------------------------------
    // Main loop
    // -----------------------------------------------------------------------
    loop {
        let frame_start = Instant::now();
        let now_ms = clock.now_ms();

        // --- Measurement ----------------------------------------------------
        drain_buckets(&receiver, &mut core);
        let dt_secs = now_ms.saturating_sub(last_update_ms) as f32 / 1000.0;
        last_update_ms = now_ms;

        let events = core.update(dt_secs);
        PUBLISHED.store(core.snapshot());
        publish_history(&history_publisher, events);

        // --- Presentation ---------------------------------------------------
        let snapshot = PUBLISHED.load();
        let thresholds = THRESHOLDS.load();
        alarm
            .evaluate(
                snapshot.current_rate,
                snapshot.cumulative_dose as f64,
                thresholds.as_ref(),
                now_ms,
            )
            .apply(&mut buzzer);

        if let Some(subscriber) = chart_events.as_mut() {
            while let Some(message) = subscriber.try_next_message_pure() {
                let series = match message.resolution {
                    HistoryResolution::ShortTerm => &snapshot.short_term_history[..],
                    HistoryResolution::LongTerm => &snapshot.long_term_history[..],
                };
                let max = series.iter().copied().fold(0.0, f32::max);
                info!(
                    "{} chart redraw: latest {:.3} uSv/h, axis 0..{}",
                    message.resolution.label(),
                    message.mean_rate,
                    geiger_core::history::axis_ceiling(max)
                );
            }
        }

        if now_ms.saturating_sub(last_report_ms) >= REPORT_INTERVAL_MS {
            last_report_ms = now_ms;
            let payload = ApiData {
                snapshot: &snapshot,
                level: snapshot.level().label(),
                alarm_active: alarm.is_sounding(),
            };
            match serde_json::to_string(&payload) {
                Ok(json) => info!("/api/data {}", json),
                Err(e) => warn!("Failed to serialize snapshot: {}", e),
            }
        }

        if sim
            .duration_secs
            .is_some_and(|secs| now_ms >= secs * 1000)
        {
            break;
        }

        // --- Frame pacing ---------------------------------------------------
        let elapsed = frame_start.elapsed();
        if elapsed < frame {
            thread::sleep(frame - elapsed);
        }
    }

    running.store(false, Ordering::Relaxed);
    if acquisition.join().is_err() {
        error!("Acquisition thread panicked");
    }
    buzzer.silence();

    let snapshot = core.snapshot();
    info!(
        "Simulator exiting: {} pulses, {:.6} mSv cumulative, max {:.3} uSv/h ({} outliers ignored)",
        snapshot.total_pulses,
        snapshot.cumulative_dose,
        snapshot.max_rate,
        core.rejected_outliers()
    );

    ExitCode::SUCCESS
}

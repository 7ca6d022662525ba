#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use embassy_executor::Spawner;
use embassy_futures::select::{Either, select};
use embassy_time::{Duration, Instant, Ticker, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::pcnt::Pcnt;
use esp_hal::peripherals::Peripherals;
use esp_hal::timer::timg::TimerGroup;
use log::{error, info, warn};

use geiger_core::MeasurementCore;
use geiger_core::acquisition::PulseAcquisition;
use geiger_core::alarm::AlarmEvaluator;
use geiger_core::app_state::{
    BUCKET_CHANNEL, BucketForwarder, HISTORY_CHANNEL, PUBLISHED, SharedCell, THRESHOLDS,
    drain_buckets, publish_history,
};
use geiger_firmware::buzzer::LedcBuzzer;
use geiger_firmware::config::{
    self, ALARM_TICK_MS, DISPLAY_REFRESH_MS, MEASUREMENT_TICK_MS,
};
use geiger_firmware::display::{chart_areas, draw_readout, draw_trend};
use geiger_firmware::error::AppError;
use geiger_firmware::hardware::{self, Lcd};
use geiger_firmware::pulse_counter::PcntCounter;

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

/// Whether the siren is currently sounding, for the readout
static ALARM_ACTIVE: SharedCell<bool> = SharedCell::new(false);

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Polls the PCNT unit and forwards completed seconds
#[embassy_executor::task]
async fn acquisition_task(counter: PcntCounter, poll_interval_ms: u64) {
    let mut acquisition = PulseAcquisition::new(counter, Instant::now().as_millis());
    let mut forwarder = BucketForwarder::new(&BUCKET_CHANNEL);
    let mut ticker = Ticker::every(Duration::from_millis(poll_interval_ms));

    loop {
        ticker.next().await;
        if let Some(bucket) = acquisition.tick(Instant::now().as_millis()) {
            forwarder.forward(bucket);
        }
    }
}

/// Sole owner of the measurement core
#[embassy_executor::task]
async fn measurement_task(mut core: MeasurementCore) {
    let receiver = BUCKET_CHANNEL.receiver();
    let history = HISTORY_CHANNEL.immediate_publisher();
    let mut ticker = Ticker::every(Duration::from_millis(MEASUREMENT_TICK_MS));
    let mut last_update = Instant::now();

    loop {
        match select(receiver.receive(), ticker.next()).await {
            Either::First(bucket) => core.record_second(bucket),
            Either::Second(()) => {
                drain_buckets(&receiver, &mut core);

                let now = Instant::now();
                let dt_secs = (now - last_update).as_micros() as f32 / 1_000_000.0;
                last_update = now;

                let events = core.update(dt_secs);
                PUBLISHED.store(core.snapshot());
                publish_history(&history, events);
            }
        }
    }
}

#[embassy_executor::task]
async fn alarm_task(mut buzzer: LedcBuzzer) {
    let mut alarm = AlarmEvaluator::new(config::alarm_cadence());
    let mut ticker = Ticker::every(Duration::from_millis(ALARM_TICK_MS));

    loop {
        ticker.next().await;

        let snapshot = PUBLISHED.load();
        let thresholds = THRESHOLDS.load();
        alarm
            .evaluate(
                snapshot.current_rate,
                snapshot.cumulative_dose as f64,
                thresholds.as_ref(),
                Instant::now().as_millis(),
            )
            .apply(&mut buzzer);
        ALARM_ACTIVE.store(alarm.is_sounding());
    }
}

#[embassy_executor::task]
async fn display_task(mut display: Lcd) {
    let mut history_events = match HISTORY_CHANNEL.subscriber() {
        Ok(subscriber) => Some(subscriber),
        Err(_) => {
            warn!("No history subscriber slot, charts redraw every frame");
            None
        }
    };
    let (short_area, long_area) = chart_areas();
    let mut ticker = Ticker::every(Duration::from_millis(DISPLAY_REFRESH_MS));
    let mut charts_stale = true;

    loop {
        ticker.next().await;
        let snapshot = PUBLISHED.load();

        if let Err(e) = draw_readout(&mut display, &snapshot, ALARM_ACTIVE.load()) {
            warn!("Readout draw failed: {:?}", e);
        }

        match history_events.as_mut() {
            Some(subscriber) => {
                while subscriber.try_next_message_pure().is_some() {
                    charts_stale = true;
                }
            }
            None => charts_stale = true,
        }

        if charts_stale {
            let drawn = draw_trend(&mut display, short_area, "1h", &snapshot.short_term_history)
                .and_then(|_| draw_trend(&mut display, long_area, "24h", &snapshot.long_term_history));
            if let Err(e) = drawn {
                warn!("Trend draw failed: {:?}", e);
            }
            charts_stale = false;
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Bring up the hardware and spawn every task
async fn start(spawner: Spawner, peripherals: Peripherals) -> Result<(), AppError> {
    let measurement = config::measurement_config();
    let core = MeasurementCore::new(measurement)?;

    THRESHOLDS.store(config::default_thresholds());
    match THRESHOLDS.load() {
        Some(t) if t.enabled => info!(
            "Alarm armed: {} uSv/h or {} mSv",
            t.current_rate_limit, t.cumulative_dose_limit
        ),
        _ => info!("Alarm disabled"),
    }

    let i2c = hardware::create_i2c_bus(peripherals.I2C0, peripherals.GPIO12, peripherals.GPIO11)?;
    hardware::init_power(i2c).await?;

    let display = hardware::init_display(
        peripherals.SPI2,
        peripherals.GPIO36,
        peripherals.GPIO37,
        peripherals.GPIO35,
        peripherals.GPIO34,
    )?;

    let pcnt = Pcnt::new(peripherals.PCNT);
    let counter = PcntCounter::new(pcnt.unit0, peripherals.GPIO9)?;
    info!("Pulse counter armed on GPIO9");

    let buzzer = LedcBuzzer::new(peripherals.LEDC, peripherals.GPIO8, &config::alarm_cadence())?;

    spawner.spawn(
        acquisition_task(counter, measurement.poll_interval_ms as u64)
            .map_err(|_| AppError::Spawn("acquisition"))?,
    );
    spawner.spawn(measurement_task(core).map_err(|_| AppError::Spawn("measurement"))?);
    spawner.spawn(alarm_task(buzzer).map_err(|_| AppError::Spawn("alarm"))?);
    spawner.spawn(display_task(display).map_err(|_| AppError::Spawn("display"))?);

    Ok(())
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("Embassy initialized!");

    match start(spawner, peripherals).await {
        Ok(()) => info!("geiger-rs running"),
        Err(e) => error!("Startup failed: {}", e),
    }

    loop {
        Timer::after(Duration::from_secs(60)).await;
    }
}

//! The touch device handle shared by the interrupt path, the periodic
//! watchdog and the deferred workers.
//!
//! Slot table, device status and health counters live in one coarse lock
//! ([`DeviceCore`]). Gesture telemetry sits behind its own narrow lock so
//! [`TouchDevice::gesture_status`] never waits on a reset in progress.

mod irq;
mod lifecycle;
mod supervisor;

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, mutex::Mutex};

use crate::{
    bus::{GuardedBus, SessionGate, TouchBus},
    config::{TouchConfig, CALIB_WORDS, EVENT_TIMER_INTERVAL_MS, FAST_RECHECK_MS},
    decoder::FrameDecoder,
    error::{Error, ErrorKind},
    events::InputSink,
    gesture::{GestureStatus, GestureTelemetry},
    health::{HealthAction, HealthCounters, HealthEvent, HealthOutput, HealthSupervisor},
    platform::TouchPlatform,
    power::{LowPowerFeatures, PowerController, SysMode, TouchFeatures},
    protocol::CmcsKind,
    slots::SlotTable,
    work::DeferredWork,
};

pub use irq::IrqOutcome;
pub use supervisor::{IdleCheckOutcome, RecoveryOutcome, TickOutcome};

/// Collaborators that own the controller for exclusive procedures.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Maintenance {
    pub firmware_update: bool,
    pub calibrating: bool,
    pub miscalibrating: bool,
}

impl Maintenance {
    pub fn any(&self) -> bool {
        self.firmware_update || self.calibrating || self.miscalibrating
    }

    fn label(&self) -> &'static str {
        if self.firmware_update {
            "firmware_update"
        } else if self.calibrating {
            "calibrating"
        } else if self.miscalibrating {
            "miscalibrating"
        } else {
            "none"
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceStatus {
    pub sys_mode: SysMode,
    pub initialized: bool,
    pub irq_enabled: bool,
    pub event_mode: bool,
    pub recording: bool,
    pub noise_check_enabled: bool,
    pub maintenance: Maintenance,
    pub features: TouchFeatures,
    pub low_power: LowPowerFeatures,
    pub hover: u8,
    pub pocket: bool,
    pub force_pocket_event: bool,
    pub prox_power_off: bool,
    pub miscalib_result: Option<u16>,
    pub calib_result: Option<[u32; CALIB_WORDS]>,
    pub cmcs_result: Option<(CmcsKind, u16)>,
    pub last_exception: Option<u8>,
    pub glitch_count: u32,
}

impl DeviceStatus {
    const fn new() -> Self {
        Self {
            sys_mode: SysMode::PowerOff,
            initialized: false,
            irq_enabled: false,
            event_mode: false,
            recording: false,
            noise_check_enabled: true,
            maintenance: Maintenance {
                firmware_update: false,
                calibrating: false,
                miscalibrating: false,
            },
            features: TouchFeatures {
                charger: false,
                call: false,
                cover: false,
                glove: false,
                edge: false,
                sensitivity: false,
                touchable: false,
                pocket: false,
                half_aod: false,
                reject_zone: None,
                power: false,
            },
            low_power: LowPowerFeatures {
                aod: false,
                double_tap_wake: false,
                single_tap: false,
                swipe_up: false,
                fod: false,
                ear_detect: false,
            },
            hover: 0,
            pocket: false,
            force_pocket_event: false,
            prox_power_off: false,
            miscalib_result: None,
            calib_result: None,
            cmcs_result: None,
            last_exception: None,
            glitch_count: 0,
        }
    }
}

struct DeviceCore<B, P, S> {
    bus: B,
    platform: P,
    sink: S,
    decoder: FrameDecoder,
    status: DeviceStatus,
    health: HealthSupervisor,
    power: PowerController,
}

impl<B: TouchBus, P: TouchPlatform, S: InputSink> DeviceCore<B, P, S> {
    fn bus<'a>(&'a mut self, gate: &'a SessionGate) -> GuardedBus<'a, B, P> {
        GuardedBus::new(&mut self.bus, &mut self.platform, gate)
    }

    fn mode(&self) -> SysMode {
        self.power.mode()
    }

    fn enable_irq(&mut self) {
        self.platform.set_irq_enabled(true);
        self.status.irq_enabled = true;
        self.status.event_mode = true;
    }

    fn disable_irq(&mut self) {
        self.platform.set_irq_enabled(false);
        self.status.irq_enabled = false;
        self.status.event_mode = false;
    }

    fn clear_input(&mut self) -> u8 {
        self.decoder.force_release_all(&mut self.sink)
    }
}

pub struct TouchDevice<B, P, S> {
    config: TouchConfig,
    core: Mutex<CriticalSectionRawMutex, DeviceCore<B, P, S>>,
    gesture: GestureTelemetry,
    gate: SessionGate,
    irq_working: AtomicBool,
    // Low 32 bits of the last interrupt time; compared with wrapping_sub.
    last_event_ms: AtomicU32,
    event_timer: DeferredWork,
    idle_check: DeferredWork,
    reset_work: DeferredWork,
    status_report: DeferredWork,
}

impl<B: TouchBus, P: TouchPlatform, S: InputSink> TouchDevice<B, P, S> {
    pub fn new(config: TouchConfig, bus: B, platform: P, sink: S) -> Self {
        Self {
            config,
            core: Mutex::new(DeviceCore {
                bus,
                platform,
                sink,
                decoder: FrameDecoder::new(),
                status: DeviceStatus::new(),
                health: HealthSupervisor::new(config.max_scan_retry, config.max_irq_err_cnt),
                power: PowerController::new(),
            }),
            gesture: GestureTelemetry::new(),
            gate: SessionGate::new(),
            irq_working: AtomicBool::new(false),
            last_event_ms: AtomicU32::new(0),
            event_timer: DeferredWork::new("event_timer"),
            idle_check: DeferredWork::new("idle_check"),
            reset_work: DeferredWork::new("reset"),
            status_report: DeferredWork::new("status_report"),
        }
    }

    pub fn config(&self) -> &TouchConfig {
        &self.config
    }

    pub fn event_timer(&self) -> &DeferredWork {
        &self.event_timer
    }

    pub fn idle_check(&self) -> &DeferredWork {
        &self.idle_check
    }

    pub fn reset_work(&self) -> &DeferredWork {
        &self.reset_work
    }

    pub fn status_report(&self) -> &DeferredWork {
        &self.status_report
    }

    /// Latest gesture fields; never blocks behind the device lock.
    pub fn gesture_status(&self) -> GestureStatus {
        self.gesture.snapshot()
    }

    pub fn is_session_locked(&self) -> bool {
        self.gate.is_locked()
    }

    pub async fn status(&self) -> DeviceStatus {
        let core = self.core.lock().await;
        let mut status = core.status;
        status.sys_mode = core.mode();
        status
    }

    pub async fn health_counters(&self) -> HealthCounters {
        self.core.lock().await.health.counters()
    }

    pub async fn slots(&self) -> SlotTable {
        *self.core.lock().await.decoder.table()
    }

    fn record_failure(&self, core: &mut DeviceCore<B, P, S>, kind: ErrorKind, now_ms: u64) {
        let output = core.health.handle(HealthEvent::Failure(kind));
        self.apply_health(output, now_ms);
    }

    fn apply_health(&self, output: HealthOutput, now_ms: u64) {
        for action in output.iter() {
            match action {
                HealthAction::RearmFast => {
                    self.event_timer.rearm(now_ms, FAST_RECHECK_MS);
                }
                HealthAction::ScheduleReset(kind) => {
                    if self.reset_work.schedule(now_ms, 0) {
                        log::info!("touch: reset_queued kind={}", kind.label());
                    }
                }
            }
        }
    }

    /// Writes the scan configuration and starts scanning.
    fn start(&self, core: &mut DeviceCore<B, P, S>, now_ms: u64) -> Result<(), Error<B::Error>> {
        use crate::protocol::{reg, REC_MODE_ENABLE, START_SCAN};

        if core.status.initialized {
            let output = core.health.handle(HealthEvent::Restarted);
            self.apply_health(output, now_ms);
        }
        if self.supervising(core) {
            self.event_timer.rearm(now_ms, EVENT_TIMER_INTERVAL_MS);
        }

        let features = core.status.features;
        let recording = core.status.recording;
        let config = self.config;
        let mut bus = core.bus(&self.gate);

        bus.write_word(reg::SET_MODE_SPECIAL, features.to_bits())?;
        if let Some(zone) = features.reject_zone {
            bus.write_word(reg::SET_REJECTZONE_TOP, zone.top as u32)?;
            bus.write_word(reg::SET_REJECTZONE_BOTTOM, zone.bottom as u32)?;
            log::info!("touch: reject_zone top={} bottom={}", zone.top, zone.bottom);
        }
        if let Some(rate) = config.report_rate_us {
            bus.write_word(reg::SET_TIME_ACTIVE, rate)?;
        }
        if let Some(rate) = config.idle_rate_us {
            bus.write_word(reg::SET_TIME_IDLE, rate)?;
        }
        if recording {
            bus.write_word(reg::SET_REC_MODE, REC_MODE_ENABLE)?;
        }
        bus.write_word(reg::CMD_START_SCAN, START_SCAN)?;

        log::info!(
            "touch: scan_started features=0x{:04x} recording={}",
            features.to_bits(),
            recording
        );
        Ok(())
    }

    /// Power-cycles the controller and waits for it to settle.
    fn hardware_reset(core: &mut DeviceCore<B, P, S>) {
        use crate::config::{POWER_SETTLE_MS, RESET_SETTLE_MS};

        core.platform.set_power(false);
        core.platform.delay_ms(POWER_SETTLE_MS);
        core.platform.set_power(true);
        core.platform.delay_ms(RESET_SETTLE_MS);
    }

    /// The watchdog runs only while scanning in PowerOn with the gate open.
    fn supervising(&self, core: &DeviceCore<B, P, S>) -> bool {
        core.status.initialized && core.mode() == SysMode::PowerOn && !self.gate.is_locked()
    }

    fn note_event(&self, now_ms: u64) {
        self.last_event_ms.store(now_ms as u32, Ordering::Release);
    }

    fn quiet_for(&self, now_ms: u64) -> u32 {
        (now_ms as u32).wrapping_sub(self.last_event_ms.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests;

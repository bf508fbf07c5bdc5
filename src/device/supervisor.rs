use core::sync::atomic::Ordering;

use super::{DeviceCore, TouchDevice};
use crate::{
    bus::TouchBus,
    config::{EVENT_TIMER_INTERVAL_MS, QUIET_THRESHOLD_MS, STATUS_REPORT_PERIOD_MS},
    error::{Error, ErrorKind},
    events::InputSink,
    health::HealthEvent,
    platform::TouchPlatform,
    power::SysMode,
    protocol::{reg, ScanStatus},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// The interrupt path or another task holds the device.
    Busy,
    Skipped,
    Quiet,
    IdleCheckQueued,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdleCheckOutcome {
    Skipped,
    Advanced,
    Stalled,
    ResetScheduled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecoveryOutcome {
    Recovered,
    Dropped,
    Failed,
}

impl<B: TouchBus, P: TouchPlatform, S: InputSink> TouchDevice<B, P, S> {
    /// Periodic watchdog tick. Never waits; always re-arms the timer.
    pub fn on_timer_tick(&self, now_ms: u64) -> TickOutcome {
        let outcome = self.tick_inner(now_ms);
        self.event_timer.rearm(now_ms, EVENT_TIMER_INTERVAL_MS);
        outcome
    }

    fn tick_inner(&self, now_ms: u64) -> TickOutcome {
        if self.irq_working.load(Ordering::Acquire) {
            return TickOutcome::Busy;
        }
        let Ok(mut guard) = self.core.try_lock() else {
            return TickOutcome::Busy;
        };
        let core = &mut *guard;
        let status = core.status;

        if !status.initialized || status.recording || !status.event_mode {
            return TickOutcome::Skipped;
        }
        if core.mode() != SysMode::PowerOn || status.maintenance.any() {
            return TickOutcome::Skipped;
        }
        if !status.noise_check_enabled || self.quiet_for(now_ms) <= QUIET_THRESHOLD_MS {
            return TickOutcome::Quiet;
        }

        if self.idle_check.schedule(now_ms, 0) {
            let output = core.health.handle(HealthEvent::CheckScheduled);
            self.apply_health(output, now_ms);
        }
        TickOutcome::IdleCheckQueued
    }

    /// Deferred idle/noise check against the controller scan counter.
    pub async fn run_idle_check(&self, now_ms: u64) -> IdleCheckOutcome {
        if self.gate.is_locked() {
            log::debug!("touch: idle_check_skipped reason=secure");
            return IdleCheckOutcome::Skipped;
        }

        let mut guard = self.core.lock().await;
        let core = &mut *guard;
        if !core.status.initialized || core.mode() != SysMode::PowerOn {
            return IdleCheckOutcome::Skipped;
        }

        let read = core.bus(&self.gate).read_word(reg::TOUCH_STATUS);
        let scan_count = match read {
            Ok(word) => match ScanStatus::parse(word) {
                Ok(scan) => {
                    if !scan.finger_enable && core.decoder.pressed() > 0 {
                        core.clear_input();
                    }
                    Some(scan.scan_count)
                }
                Err(err) => {
                    log::warn!("touch: scan_status_invalid err={:?}", err);
                    None
                }
            },
            Err(Error::SessionLocked) => return IdleCheckOutcome::Skipped,
            Err(err) => {
                log::warn!("touch: scan_status_read_failed err={}", err.label());
                None
            }
        };

        let before = core.health.counters().scan_count;
        let output = core.health.handle(HealthEvent::ScanRead { scan_count });
        self.apply_health(output, now_ms);
        let after = core.health.counters().scan_count;

        if output.reset_requested().is_some() {
            IdleCheckOutcome::ResetScheduled
        } else if scan_count.is_some_and(|count| count != before && count == after) {
            IdleCheckOutcome::Advanced
        } else {
            IdleCheckOutcome::Stalled
        }
    }

    /// Deferred reset: disable, power-cycle, clear, re-enable, restart.
    pub async fn run_reset_recovery(&self, now_ms: u64) -> RecoveryOutcome {
        let mut guard = self.core.lock().await;
        let core = &mut *guard;

        if let Some(reason) = self.recovery_blocker(core) {
            log::warn!("touch: reset_dropped reason={}", reason);
            let output = core.health.handle(HealthEvent::RecoveryDropped);
            self.apply_health(output, now_ms);
            return RecoveryOutcome::Dropped;
        }

        let kind = core.health.escalation();
        log::info!(
            "touch: reset_start kind={}",
            kind.map_or("request", ErrorKind::label)
        );

        core.disable_irq();
        Self::hardware_reset(core);
        core.clear_input();
        core.enable_irq();

        let mut restarted = self.start(core, now_ms);
        if restarted.is_ok() && core.mode() == SysMode::LowPowerMonitor {
            restarted = self.enter_gesture_mode(core);
        }

        match restarted {
            Ok(()) => {
                let output = core.health.handle(HealthEvent::RecoveryFinished);
                self.apply_health(output, now_ms);
                RecoveryOutcome::Recovered
            }
            Err(err) => {
                log::error!("touch: reset_failed err={}", err.label());
                let output = core.health.handle(HealthEvent::RecoveryDropped);
                self.apply_health(output, now_ms);
                RecoveryOutcome::Failed
            }
        }
    }

    fn recovery_blocker(&self, core: &DeviceCore<B, P, S>) -> Option<&'static str> {
        if self.gate.is_locked() {
            return Some("secure");
        }
        if !core.status.initialized {
            return Some("uninitialized");
        }
        if core.mode() == SysMode::PowerOff {
            return Some("power_off");
        }
        if core.status.maintenance.any() {
            return Some(core.status.maintenance.label());
        }
        None
    }

    /// Periodic status line; reschedules itself.
    pub async fn run_status_report(&self, now_ms: u64) {
        {
            let core = self.core.lock().await;
            let table = core.decoder.table();
            if core.mode() == SysMode::PowerOn && table.pressed == 0 {
                let counters = core.health.counters();
                let gesture = self.gesture.snapshot();
                log::info!(
                    "touch: status mode={} health={} features=0x{:04x} fingers={} multi={} scan={} retry={} irq_err={} spay={} aod={} singletap={} glitches={}",
                    core.mode().label(),
                    core.health.phase().label(),
                    core.status.features.to_bits(),
                    table.all_finger_count,
                    table.all_multi_finger_count,
                    counters.scan_count,
                    counters.scan_retry,
                    counters.irq_err_cnt,
                    gesture.spay_count,
                    gesture.aod_count,
                    gesture.singletap_count,
                    core.status.glitch_count
                );
            }
        }
        self.status_report.schedule(now_ms, STATUS_REPORT_PERIOD_MS);
    }
}

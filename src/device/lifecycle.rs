use super::{DeviceCore, Maintenance, TouchDevice};
use crate::{
    bus::TouchBus,
    config::EVENT_TIMER_INTERVAL_MS,
    error::Error,
    events::{InputEvent, InputSink, Key, ProximityEvent},
    health::{HealthEvent, HealthPhase},
    platform::TouchPlatform,
    power::{Feature, LowPowerFeatures, PowerCommand, PowerPlan, RejectZone, SysMode},
    protocol::{reg, REC_MODE_ENABLE},
};

impl<B: TouchBus, P: TouchPlatform, S: InputSink> TouchDevice<B, P, S> {
    /// Powers the controller, starts scanning and arms the supervisory work.
    pub async fn probe(&self, now_ms: u64) -> Result<(), Error<B::Error>> {
        {
            let mut guard = self.core.lock().await;
            let core = &mut *guard;
            if core.status.initialized {
                return Err(Error::InvalidTransition);
            }

            core.power.apply(PowerCommand::Resume);
            core.platform.set_power(true);
            Self::hardware_reset(core);
            core.enable_irq();
            core.status.initialized = true;
            core.status.features.power = true;

            if let Err(err) = self.start(core, now_ms) {
                log::error!("touch: probe_failed err={}", err.label());
                core.power.apply(PowerCommand::PowerOff);
                core.disable_irq();
                core.platform.set_power(false);
                core.status.initialized = false;
                core.status.features.power = false;
                self.event_timer.disarm();
                return Err(err);
            }
        }

        self.note_event(now_ms);
        self.status_report.schedule(now_ms, 0);
        log::info!("touch: probed");
        Ok(())
    }

    /// Leaves PowerOn for LowPowerMonitor when any low-power feature is
    /// latched, otherwise cuts power.
    pub async fn suspend(&self) -> PowerPlan {
        self.cancel_supervision().await;

        let plan = {
            let mut guard = self.core.lock().await;
            let core = &mut *guard;
            let low_power = core.status.low_power.any_gesture()
                || core.status.low_power.ear_detect
                || core.status.features.pocket;

            let plan = core.power.apply(PowerCommand::Suspend { low_power });
            match plan {
                PowerPlan::EnterLowPower => {
                    if let Err(err) = self.enter_gesture_mode(core) {
                        log::warn!("touch: lpm_enter_failed err={}", err.label());
                    }
                }
                PowerPlan::EnterPowerOff => {
                    core.disable_irq();
                    core.platform.set_power(false);
                    core.status.features.power = false;
                }
                _ => return plan,
            }

            self.release_on_suspend(core);
            plan
        };

        self.status_report.cancel_sync().await;
        plan
    }

    /// Returns to PowerOn; a cold start re-runs the full scan setup.
    ///
    /// A failed wake leaves the controller powered off so the next resume
    /// starts cold.
    pub async fn resume(&self, now_ms: u64) -> Result<PowerPlan, Error<B::Error>> {
        let plan = {
            let mut guard = self.core.lock().await;
            let core = &mut *guard;
            if !core.status.initialized {
                return Err(Error::NotInitialized);
            }
            if self.gate.is_locked() {
                return Err(Error::SessionLocked);
            }

            let plan = core.power.apply(PowerCommand::Resume);
            let woke = match plan {
                PowerPlan::WakeFromLowPower => self.wake_from_low_power(core, now_ms),
                PowerPlan::ColdStart => self.cold_start(core, now_ms),
                _ => return Ok(plan),
            };
            if let Err(err) = woke {
                log::error!("touch: resume_failed plan={:?} err={}", plan, err.label());
                core.power.apply(PowerCommand::PowerOff);
                Self::cut_power(core);
                self.event_timer.disarm();
                return Err(err);
            }
            plan
        };

        self.note_event(now_ms);
        self.status_report.schedule(now_ms, 0);
        Ok(plan)
    }

    /// Cuts power from either powered mode; the device stays initialized.
    pub async fn power_off(&self) -> PowerPlan {
        self.cancel_supervision().await;
        self.status_report.cancel_sync().await;

        let mut guard = self.core.lock().await;
        let core = &mut *guard;
        let plan = core.power.apply(PowerCommand::PowerOff);
        if plan == PowerPlan::EnterPowerOff {
            Self::cut_power(core);
        }
        plan
    }

    /// Final teardown: nothing runs against the controller afterwards.
    pub async fn shutdown(&self) {
        self.cancel_supervision().await;
        self.status_report.cancel_sync().await;

        let mut guard = self.core.lock().await;
        let core = &mut *guard;
        if core.power.apply(PowerCommand::PowerOff) == PowerPlan::EnterPowerOff {
            Self::cut_power(core);
        } else {
            core.disable_irq();
            core.clear_input();
        }
        core.status.initialized = false;
        log::info!("touch: shutdown");
    }

    /// Updates one scan feature. Written at once while scanning, latched otherwise.
    ///
    /// Returns whether the stored value changed.
    pub async fn set_feature(&self, feature: Feature, enabled: bool) -> Result<bool, Error<B::Error>> {
        let mut guard = self.core.lock().await;
        let core = &mut *guard;
        let changed = core.status.features.set(feature, enabled);
        log::info!("touch: feature name={:?} enabled={}", feature, enabled);
        if changed {
            self.apply_features(core)?;
        }
        Ok(changed)
    }

    pub async fn set_reject_zone(&self, zone: Option<RejectZone>) -> Result<(), Error<B::Error>> {
        let mut guard = self.core.lock().await;
        let core = &mut *guard;
        core.status.features.reject_zone = zone;
        if !Self::scanning(core) {
            return Ok(());
        }
        let bits = core.status.features.to_bits();
        let mut bus = core.bus(&self.gate);
        if let Some(zone) = zone {
            bus.write_word(reg::SET_REJECTZONE_TOP, zone.top as u32)?;
            bus.write_word(reg::SET_REJECTZONE_BOTTOM, zone.bottom as u32)?;
        }
        bus.write_word(reg::SET_MODE_SPECIAL, bits)?;
        Ok(())
    }

    /// Latches the gesture features used by the next suspend; refreshes the
    /// controller if it is already monitoring.
    pub async fn set_low_power_features(
        &self,
        features: LowPowerFeatures,
    ) -> Result<(), Error<B::Error>> {
        let mut guard = self.core.lock().await;
        let core = &mut *guard;
        core.status.low_power = features;
        if core.status.initialized && core.mode() == SysMode::LowPowerMonitor {
            let bits = features.sponge_bits(core.status.prox_power_off);
            core.bus(&self.gate).write_word(reg::SPONGE_FEATURE, bits)?;
        }
        Ok(())
    }

    /// Proximity sensor reports the panel covered; consumed by the next suspend.
    pub async fn set_prox_power_off(&self, enabled: bool) {
        self.core.lock().await.status.prox_power_off = enabled;
    }

    pub async fn set_maintenance(&self, maintenance: Maintenance) {
        let mut core = self.core.lock().await;
        if core.status.maintenance != maintenance {
            log::info!("touch: maintenance owner={}", maintenance.label());
        }
        core.status.maintenance = maintenance;
    }

    pub async fn set_recording(&self, enabled: bool) -> Result<(), Error<B::Error>> {
        let mut guard = self.core.lock().await;
        let core = &mut *guard;
        core.status.recording = enabled;
        if Self::scanning(core) {
            let value = if enabled { REC_MODE_ENABLE } else { 0 };
            core.bus(&self.gate).write_word(reg::SET_REC_MODE, value)?;
        }
        log::info!("touch: recording enabled={}", enabled);
        Ok(())
    }

    /// Hands the controller to a secure session owner.
    pub async fn enter_secure_session(&self) {
        self.cancel_supervision().await;
        {
            let mut guard = self.core.lock().await;
            let core = &mut *guard;
            core.clear_input();
            core.status.noise_check_enabled = false;
        }
        self.gate.lock();
        log::info!("touch: secure_session entered");
    }

    pub async fn exit_secure_session(&self, now_ms: u64) {
        self.gate.unlock();
        let mut core = self.core.lock().await;
        core.status.noise_check_enabled = true;
        if self.supervising(&core) {
            self.event_timer.rearm(now_ms, EVENT_TIMER_INTERVAL_MS);
        }
        log::info!("touch: secure_session exited");
    }

    /// Enables controller-side gesture detection and interrupt wake.
    pub(super) fn enter_gesture_mode(
        &self,
        core: &mut DeviceCore<B, P, S>,
    ) -> Result<(), Error<B::Error>> {
        let sponge = core
            .status
            .low_power
            .sponge_bits(core.status.prox_power_off);
        let mut bus = core.bus(&self.gate);
        bus.write_word(reg::SPONGE_FEATURE, sponge)?;
        bus.write_word(reg::GESTURE_EN, 1)?;
        core.platform.set_irq_wake(true);
        log::info!("touch: lpm_entered sponge=0x{:02x}", sponge);
        Ok(())
    }

    async fn cancel_supervision(&self) {
        self.event_timer.cancel_sync().await;
        self.idle_check.cancel_sync().await;
        self.reset_work.cancel_sync().await;

        // A cancelled reset never reports back.
        let mut core = self.core.lock().await;
        if core.health.phase() == HealthPhase::Escalated {
            log::warn!("touch: reset_dropped reason=cancelled");
            core.health.handle(HealthEvent::RecoveryDropped);
        }
    }

    fn wake_from_low_power(
        &self,
        core: &mut DeviceCore<B, P, S>,
        now_ms: u64,
    ) -> Result<(), Error<B::Error>> {
        core.platform.set_irq_wake(false);
        core.enable_irq();
        let features = core.status.features.to_bits();
        let mut bus = core.bus(&self.gate);
        bus.write_word(reg::GESTURE_EN, 0)?;
        bus.write_word(reg::SET_MODE_SPECIAL, features)?;
        if self.supervising(core) {
            self.event_timer.rearm(now_ms, EVENT_TIMER_INTERVAL_MS);
        }
        Ok(())
    }

    fn cold_start(&self, core: &mut DeviceCore<B, P, S>, now_ms: u64) -> Result<(), Error<B::Error>> {
        core.status.features.power = true;
        core.platform.set_power(true);
        Self::hardware_reset(core);
        core.enable_irq();
        self.start(core, now_ms)
    }

    fn release_on_suspend(&self, core: &mut DeviceCore<B, P, S>) {
        core.clear_input();
        if core.status.hover != 0 {
            core.status.hover = 0;
            core.sink
                .emit(InputEvent::Proximity(ProximityEvent::Hover(0)));
        }
        if core.status.features.pocket {
            core.status.force_pocket_event = true;
        }
        if core.status.prox_power_off || core.status.pocket {
            core.sink.key_pair(Key::InterruptCancel);
            core.status.prox_power_off = false;
            log::info!("touch: interrupt_cancel");
        }
    }

    fn cut_power(core: &mut DeviceCore<B, P, S>) {
        core.disable_irq();
        core.platform.set_irq_wake(false);
        core.platform.set_power(false);
        core.status.features.power = false;
        core.clear_input();
    }

    fn apply_features(&self, core: &mut DeviceCore<B, P, S>) -> Result<(), Error<B::Error>> {
        if !Self::scanning(core) {
            log::debug!("touch: feature_latched");
            return Ok(());
        }
        let bits = core.status.features.to_bits();
        core.bus(&self.gate).write_word(reg::SET_MODE_SPECIAL, bits)?;
        Ok(())
    }

    fn scanning(core: &DeviceCore<B, P, S>) -> bool {
        core.status.initialized && core.mode() == SysMode::PowerOn
    }
}

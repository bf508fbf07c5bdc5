use embedded_hal::{delay::DelayNs, digital::OutputPin};

pub trait DelayOps {
    fn delay_ms(&mut self, millis: u32);
}

/// Board-level control lines around the touch controller.
pub trait TouchPlatform: DelayOps {
    fn set_power(&mut self, on: bool);
    fn set_irq_enabled(&mut self, enabled: bool);
    fn set_irq_wake(&mut self, enabled: bool);
}

/// Platform backed by a supply-enable pin and a blocking delay.
///
/// Interrupt masking is done by the device in software; the pin itself
/// stays configured as an input.
pub struct PinPlatform<P, D> {
    power: P,
    delay: D,
}

impl<P: OutputPin, D: DelayNs> PinPlatform<P, D> {
    pub fn new(power: P, delay: D) -> Self {
        Self { power, delay }
    }
}

impl<P: OutputPin, D: DelayNs> DelayOps for PinPlatform<P, D> {
    fn delay_ms(&mut self, millis: u32) {
        self.delay.delay_ms(millis);
    }
}

impl<P: OutputPin, D: DelayNs> TouchPlatform for PinPlatform<P, D> {
    fn set_power(&mut self, on: bool) {
        let result = if on {
            self.power.set_high()
        } else {
            self.power.set_low()
        };
        if result.is_err() {
            log::warn!("touch: power_pin_failed on={}", on);
        }
    }

    fn set_irq_enabled(&mut self, enabled: bool) {
        log::debug!("touch: irq enabled={}", enabled);
    }

    fn set_irq_wake(&mut self, enabled: bool) {
        log::debug!("touch: irq_wake enabled={}", enabled);
    }
}

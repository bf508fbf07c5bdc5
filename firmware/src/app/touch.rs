use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::{Duration, Instant, Timer};
use esp_hal::{
    delay::Delay,
    gpio::{Input, Output},
    i2c::master::I2c,
    Blocking,
};
use tsp_runtime::{
    bus::I2cTouchBus,
    config::EVENT_QUEUE_DEPTH,
    device::TouchDevice,
    events::{ChannelSink, InputEvent},
    platform::PinPlatform,
    runtime,
};

use super::config::TOUCH_EVENTS;

const TOUCH_PROBE_RETRY_MS: u64 = 2_000;

pub(crate) type Touch = TouchDevice<
    I2cTouchBus<I2c<'static, Blocking>>,
    PinPlatform<Output<'static>, Delay>,
    ChannelSink<'static, CriticalSectionRawMutex, EVENT_QUEUE_DEPTH>,
>;

#[embassy_executor::task]
pub(crate) async fn touch_irq_task(device: &'static Touch, touch_irq: Input<'static>) {
    runtime::interrupt_loop(device, touch_irq).await
}

#[embassy_executor::task]
pub(crate) async fn touch_timer_task(device: &'static Touch) {
    runtime::event_timer_loop(device).await
}

#[embassy_executor::task]
pub(crate) async fn touch_idle_check_task(device: &'static Touch) {
    runtime::idle_check_loop(device).await
}

#[embassy_executor::task]
pub(crate) async fn touch_reset_task(device: &'static Touch) {
    runtime::reset_loop(device).await
}

#[embassy_executor::task]
pub(crate) async fn touch_status_task(device: &'static Touch) {
    runtime::status_report_loop(device).await
}

#[embassy_executor::task]
pub(crate) async fn touch_probe_task(device: &'static Touch) {
    loop {
        match device.probe(Instant::now().as_millis()).await {
            Ok(()) => return,
            Err(err) => {
                log::warn!("touch: probe_retry err={}", err.label());
                Timer::after(Duration::from_millis(TOUCH_PROBE_RETRY_MS)).await;
            }
        }
    }
}

#[embassy_executor::task]
pub(crate) async fn input_event_task() {
    loop {
        match TOUCH_EVENTS.receive().await {
            InputEvent::Press { slot, contact } => {
                log::info!("input: press slot={} x={} y={}", slot, contact.x, contact.y)
            }
            InputEvent::Release { slot } => log::info!("input: release slot={}", slot),
            InputEvent::Move { .. } => {}
            other => log::info!("input: {:?}", other),
        }
    }
}

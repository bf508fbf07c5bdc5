//! Task bodies that drive a [`TouchDevice`] from an embassy executor.
//!
//! Each loop owns one piece of deferred work. The executor wraps them in
//! `#[embassy_executor::task]` functions for its concrete device type.

use embassy_time::Instant;
use embedded_hal_async::digital::Wait;

use crate::{
    bus::TouchBus, device::TouchDevice, events::InputSink, platform::TouchPlatform,
    work::DeferredWork,
};

fn now_ms() -> u64 {
    Instant::now().as_millis()
}

async fn claim(work: &DeferredWork) -> u64 {
    loop {
        work.wait_due().await;
        let now = now_ms();
        if work.begin(now) {
            return now;
        }
    }
}

pub async fn event_timer_loop<B, P, S>(device: &TouchDevice<B, P, S>) -> !
where
    B: TouchBus,
    P: TouchPlatform,
    S: InputSink,
{
    let work = device.event_timer();
    loop {
        let now = claim(work).await;
        device.on_timer_tick(now);
        work.finish();
    }
}

pub async fn idle_check_loop<B, P, S>(device: &TouchDevice<B, P, S>) -> !
where
    B: TouchBus,
    P: TouchPlatform,
    S: InputSink,
{
    let work = device.idle_check();
    loop {
        let now = claim(work).await;
        let outcome = device.run_idle_check(now).await;
        log::debug!("touch: idle_check outcome={:?}", outcome);
        work.finish();
    }
}

pub async fn reset_loop<B, P, S>(device: &TouchDevice<B, P, S>) -> !
where
    B: TouchBus,
    P: TouchPlatform,
    S: InputSink,
{
    let work = device.reset_work();
    loop {
        let now = claim(work).await;
        let outcome = device.run_reset_recovery(now).await;
        log::info!("touch: reset_done outcome={:?}", outcome);
        work.finish();
    }
}

pub async fn status_report_loop<B, P, S>(device: &TouchDevice<B, P, S>) -> !
where
    B: TouchBus,
    P: TouchPlatform,
    S: InputSink,
{
    let work = device.status_report();
    loop {
        let now = claim(work).await;
        device.run_status_report(now).await;
        work.finish();
    }
}

/// Serves the active-low interrupt line. Invocations never overlap.
pub async fn interrupt_loop<B, P, S, I>(device: &TouchDevice<B, P, S>, mut irq: I) -> !
where
    B: TouchBus,
    P: TouchPlatform,
    S: InputSink,
    I: Wait,
{
    loop {
        if irq.wait_for_falling_edge().await.is_err() {
            log::warn!("touch: irq_wait_failed");
            continue;
        }
        let outcome = device.handle_interrupt(now_ms()).await;
        log::debug!("touch: irq outcome={:?}", outcome);
    }
}

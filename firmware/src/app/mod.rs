mod config;
mod touch;

use esp_hal::{
    delay::Delay,
    gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull},
    i2c::master::{Config as I2cConfig, I2c, SoftwareTimeout},
    time::{Duration as HalDuration, Rate},
    timer::timg::TimerGroup,
};
use static_cell::StaticCell;
use tsp_runtime::{bus::I2cTouchBus, device::TouchDevice, events::ChannelSink, platform::PinPlatform};

use self::{
    config::{TOUCH_CONFIG, TOUCH_EVENTS, TOUCH_I2C_ADDRESS, TOUCH_I2C_KHZ, TOUCH_I2C_TIMEOUT_MS},
    touch::Touch,
};

static TOUCH_DEVICE: StaticCell<Touch> = StaticCell::new();

pub(crate) fn run() -> ! {
    esp_println::logger::init_logger_from_env();

    let peripherals = esp_hal::init(esp_hal::Config::default());
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    let i2c_cfg = I2cConfig::default()
        .with_frequency(Rate::from_khz(TOUCH_I2C_KHZ))
        .with_software_timeout(SoftwareTimeout::Transaction(HalDuration::from_millis(
            TOUCH_I2C_TIMEOUT_MS,
        )));
    let i2c = match I2c::new(peripherals.I2C0, i2c_cfg) {
        Ok(i2c) => i2c
            .with_sda(peripherals.GPIO21)
            .with_scl(peripherals.GPIO22),
        Err(_) => halt_forever(),
    };

    let touch_power = Output::new(peripherals.GPIO4, Level::Low, OutputConfig::default());
    let touch_irq = Input::new(
        peripherals.GPIO36,
        InputConfig::default().with_pull(Pull::None),
    );

    let device: &'static Touch = TOUCH_DEVICE.init(TouchDevice::new(
        TOUCH_CONFIG,
        I2cTouchBus::new(i2c, TOUCH_I2C_ADDRESS),
        PinPlatform::new(touch_power, Delay::new()),
        ChannelSink::new(TOUCH_EVENTS.sender()),
    ));

    let mut executor = esp_rtos::embassy::Executor::new();
    let executor = unsafe { make_static(&mut executor) };
    executor.run(move |spawner| {
        spawner.must_spawn(touch::touch_irq_task(device, touch_irq));
        spawner.must_spawn(touch::touch_timer_task(device));
        spawner.must_spawn(touch::touch_idle_check_task(device));
        spawner.must_spawn(touch::touch_reset_task(device));
        spawner.must_spawn(touch::touch_status_task(device));
        spawner.must_spawn(touch::touch_probe_task(device));
        spawner.must_spawn(touch::input_event_task());
    });
}

unsafe fn make_static<T>(value: &mut T) -> &'static mut T {
    unsafe { core::mem::transmute(value) }
}

fn halt_forever() -> ! {
    loop {
        core::hint::spin_loop();
    }
}

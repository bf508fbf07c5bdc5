use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};
use tsp_runtime::{
    bus::DEFAULT_I2C_ADDRESS,
    config::{TouchConfig, EVENT_QUEUE_DEPTH},
    events::InputEvent,
};

pub(crate) const TOUCH_I2C_ADDRESS: u8 = DEFAULT_I2C_ADDRESS;
pub(crate) const TOUCH_I2C_KHZ: u32 = 400;
pub(crate) const TOUCH_I2C_TIMEOUT_MS: u64 = 40;
pub(crate) const PANEL_WIDTH: u16 = 1080;
pub(crate) const PANEL_HEIGHT: u16 = 2400;

pub(crate) const TOUCH_CONFIG: TouchConfig = TouchConfig::DEFAULT.with_panel(PANEL_WIDTH, PANEL_HEIGHT);

pub(crate) static TOUCH_EVENTS: Channel<CriticalSectionRawMutex, InputEvent, EVENT_QUEUE_DEPTH> =
    Channel::new();

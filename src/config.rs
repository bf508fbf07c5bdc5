pub const MAX_FINGERS: usize = 10;
pub const RECORDS_PER_TRANSFER: usize = 5;
pub const RECORD_LEN: usize = 8;
pub const GESTURE_MSG_LEN: usize = 8;
pub const EXCEPTION_PAYLOAD_LEN: usize = 8;
pub const CALIB_WORDS: usize = 3;

pub const EVENT_TIMER_INTERVAL_MS: u32 = 1_000;
pub const FAST_RECHECK_MS: u32 = EVENT_TIMER_INTERVAL_MS / 10;
// Idle check only runs once the line has been quiet this long.
pub const QUIET_THRESHOLD_MS: u32 = 100;
pub const MAX_SCAN_RETRY: u8 = 2;
pub const MAX_IRQ_ERR_CNT: u8 = 5;

pub const BUS_RETRY_ATTEMPTS: u8 = 3;
pub const BUS_RETRY_DELAY_MS: u32 = 2;
pub const RESET_SETTLE_MS: u32 = 50;
pub const POWER_SETTLE_MS: u32 = 10;

pub const STATUS_REPORT_PERIOD_MS: u32 = 30_000;
pub const EVENT_QUEUE_DEPTH: usize = 32;

pub const CONTROLLER_EXTENT: u16 = 4096;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TouchConfig {
    pub panel_width: u16,
    pub panel_height: u16,
    /// Native coordinate range reported by the controller on both axes.
    pub controller_extent: u16,
    pub area_edge: u16,
    pub area_indicator: u16,
    pub area_navigation: u16,
    pub force_release: bool,
    pub max_scan_retry: u8,
    pub max_irq_err_cnt: u8,
    /// Active scan period in microseconds; `None` keeps the firmware default.
    pub report_rate_us: Option<u32>,
    pub idle_rate_us: Option<u32>,
}

impl Default for TouchConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TouchConfig {
    /// Native resolution panel with the stock zone sizes and thresholds.
    pub const DEFAULT: Self = Self {
        panel_width: CONTROLLER_EXTENT,
        panel_height: CONTROLLER_EXTENT,
        controller_extent: CONTROLLER_EXTENT,
        area_edge: 60,
        area_indicator: 133,
        area_navigation: 266,
        force_release: true,
        max_scan_retry: MAX_SCAN_RETRY,
        max_irq_err_cnt: MAX_IRQ_ERR_CNT,
        report_rate_us: None,
        idle_rate_us: None,
    };

    pub const fn with_panel(mut self, width: u16, height: u16) -> Self {
        self.panel_width = width;
        self.panel_height = height;
        self
    }

    pub fn scale_x(&self, raw: u16) -> u16 {
        scale_axis(raw, self.controller_extent, self.panel_width)
    }

    pub fn scale_y(&self, raw: u16) -> u16 {
        scale_axis(raw, self.controller_extent, self.panel_height)
    }
}

fn scale_axis(raw: u16, extent: u16, panel: u16) -> u16 {
    if extent == 0 || panel == 0 {
        return 0;
    }
    if extent == panel {
        return raw.min(panel.saturating_sub(1));
    }
    let scaled = (raw as u32).saturating_mul(panel as u32) / extent as u32;
    scaled.min(panel.saturating_sub(1) as u32) as u16
}

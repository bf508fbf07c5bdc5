use core::cell::Cell;

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex as BlockingMutex};

use crate::{
    config::GESTURE_MSG_LEN,
    events::{InputEvent, InputSink, Key, ProximityEvent},
};

pub const EID_GESTURE: u8 = 2;

pub const G_TYPE_SWIPE: u8 = 0;
pub const G_TYPE_DOUBLETAP: u8 = 1;
pub const G_TYPE_PRESSURE: u8 = 2;
pub const G_TYPE_PRESS: u8 = 3;
pub const G_TYPE_SINGLETAP: u8 = 4;

pub const G_ID_SWIPE_UP: u8 = 0;
pub const G_ID_AOD_DOUBLETAP: u8 = 0;
pub const G_ID_DOUBLETAP_WAKEUP: u8 = 1;
pub const G_ID_SINGLETAP: u8 = 0;
pub const G_ID_FOD_LONG: u8 = 0;
pub const G_ID_FOD_NORMAL: u8 = 1;
pub const G_ID_FOD_RELEASE: u8 = 2;
pub const G_ID_FOD_OUT: u8 = 3;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GestureMessage {
    pub eid: u8,
    pub gtype: u8,
    pub gid: u8,
    pub gdata: [u8; GESTURE_MSG_LEN - 3],
}

impl GestureMessage {
    pub fn parse(bytes: &[u8; GESTURE_MSG_LEN]) -> Self {
        let mut gdata = [0u8; GESTURE_MSG_LEN - 3];
        gdata.copy_from_slice(&bytes[3..]);
        Self {
            eid: bytes[0],
            gtype: bytes[1],
            gid: bytes[2],
            gdata,
        }
    }

    pub fn encode(&self) -> [u8; GESTURE_MSG_LEN] {
        let mut bytes = [0u8; GESTURE_MSG_LEN];
        bytes[0] = self.eid;
        bytes[1] = self.gtype;
        bytes[2] = self.gid;
        bytes[3..].copy_from_slice(&self.gdata);
        bytes
    }

    /// 12-bit point packed as `b0` high X, `b1` high Y, `b2` low nibbles.
    pub fn packed_point(&self) -> (u16, u16) {
        let [b0, b1, b2, ..] = self.gdata;
        let x = ((b0 as u16) << 4) | ((b2 >> 4) & 0x0F) as u16;
        let y = ((b1 as u16) << 4) | (b2 & 0x0F) as u16;
        (x, y)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GestureEvent {
    SwipeUp,
    AodDoubleTap { x: u16, y: u16 },
    DoubleTapWakeup,
    SingleTap { x: u16, y: u16 },
    FodPress { long: bool },
    FodRelease,
    FodOut,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GestureReject {
    NotGesture { eid: u8 },
    UnsupportedType { gtype: u8 },
    UnsupportedId { gtype: u8, gid: u8 },
    UnsupportedCommand { command: u8 },
}

pub fn classify(message: &GestureMessage) -> Result<GestureEvent, GestureReject> {
    if message.eid != EID_GESTURE {
        return Err(GestureReject::NotGesture { eid: message.eid });
    }
    let unsupported = GestureReject::UnsupportedId {
        gtype: message.gtype,
        gid: message.gid,
    };
    match (message.gtype, message.gid) {
        (G_TYPE_SWIPE, G_ID_SWIPE_UP) => Ok(GestureEvent::SwipeUp),
        (G_TYPE_DOUBLETAP, G_ID_AOD_DOUBLETAP) => {
            let (x, y) = message.packed_point();
            Ok(GestureEvent::AodDoubleTap { x, y })
        }
        (G_TYPE_DOUBLETAP, G_ID_DOUBLETAP_WAKEUP) => Ok(GestureEvent::DoubleTapWakeup),
        (G_TYPE_SINGLETAP, G_ID_SINGLETAP) => {
            let (x, y) = message.packed_point();
            Ok(GestureEvent::SingleTap { x, y })
        }
        (G_TYPE_PRESS, G_ID_FOD_LONG) => Ok(GestureEvent::FodPress { long: true }),
        (G_TYPE_PRESS, G_ID_FOD_NORMAL) => Ok(GestureEvent::FodPress { long: false }),
        (G_TYPE_PRESS, G_ID_FOD_RELEASE) => Ok(GestureEvent::FodRelease),
        (G_TYPE_PRESS, G_ID_FOD_OUT) => Ok(GestureEvent::FodOut),
        (G_TYPE_SWIPE | G_TYPE_DOUBLETAP | G_TYPE_SINGLETAP | G_TYPE_PRESS, _) => {
            Err(unsupported)
        }
        (G_TYPE_PRESSURE, _) => Err(unsupported),
        (gtype, _) => Err(GestureReject::UnsupportedType { gtype }),
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScrubId {
    #[default]
    None,
    Spay,
    AodDoubleTap,
    SingleTap,
    Fod,
    FodRelease,
    FodOut,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GestureStatus {
    pub scrub_id: ScrubId,
    pub scrub_x: u16,
    pub scrub_y: u16,
    pub spay_count: u32,
    pub aod_count: u32,
    pub singletap_count: u32,
    pub last_gesture: Option<GestureEvent>,
}

/// Gesture fields behind their own lock so status queries never wait on the device.
pub struct GestureTelemetry {
    status: BlockingMutex<CriticalSectionRawMutex, Cell<GestureStatus>>,
}

impl Default for GestureTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl GestureTelemetry {
    pub const fn new() -> Self {
        Self {
            status: BlockingMutex::new(Cell::new(GestureStatus {
                scrub_id: ScrubId::None,
                scrub_x: 0,
                scrub_y: 0,
                spay_count: 0,
                aod_count: 0,
                singletap_count: 0,
                last_gesture: None,
            })),
        }
    }

    pub fn snapshot(&self) -> GestureStatus {
        self.status.lock(Cell::get)
    }

    fn record(&self, event: GestureEvent) {
        self.status.lock(|cell| {
            let mut status = cell.get();
            status.last_gesture = Some(event);
            match event {
                GestureEvent::SwipeUp => {
                    status.scrub_id = ScrubId::Spay;
                    status.scrub_x = 0;
                    status.scrub_y = 0;
                    status.spay_count = status.spay_count.saturating_add(1);
                }
                GestureEvent::AodDoubleTap { x, y } => {
                    status.scrub_id = ScrubId::AodDoubleTap;
                    status.scrub_x = x;
                    status.scrub_y = y;
                    status.aod_count = status.aod_count.saturating_add(1);
                }
                GestureEvent::SingleTap { x, y } => {
                    status.scrub_id = ScrubId::SingleTap;
                    status.scrub_x = x;
                    status.scrub_y = y;
                    status.singletap_count = status.singletap_count.saturating_add(1);
                }
                GestureEvent::FodPress { .. } => status.scrub_id = ScrubId::Fod,
                GestureEvent::FodRelease => status.scrub_id = ScrubId::FodRelease,
                GestureEvent::FodOut => status.scrub_id = ScrubId::FodOut,
                GestureEvent::DoubleTapWakeup => {}
            }
            cell.set(status);
        });
    }
}

/// Emits the key traffic for a recognised gesture and updates telemetry.
pub fn dispatch<S: InputSink>(event: GestureEvent, telemetry: &GestureTelemetry, sink: &mut S) {
    match event {
        GestureEvent::DoubleTapWakeup => {
            log::info!("touch: gesture kind=double_tap_wakeup");
            sink.key_pair(Key::Wakeup);
            sink.emit(InputEvent::Proximity(ProximityEvent::WakePulse(true)));
            sink.emit(InputEvent::Proximity(ProximityEvent::WakePulse(false)));
        }
        GestureEvent::AodDoubleTap { x, y } | GestureEvent::SingleTap { x, y } => {
            log::info!("touch: gesture kind={:?} x={} y={}", event, x, y);
            sink.key_pair(Key::Gesture);
        }
        _ => {
            log::info!("touch: gesture kind={:?}", event);
            sink.key_pair(Key::Gesture);
        }
    }
    telemetry.record(event);
}

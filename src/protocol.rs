//! Register addresses and the wire layout of controller messages.
//!
//! Every interrupt starts with a 32-bit status word read from
//! [`reg::INTR_MSG`]. [`classify`] turns that word into an [`IrqMessage`];
//! touch frames then carry [`RECORD_LEN`]-byte records per finger.

use crate::{
    config::{MAX_FINGERS, RECORD_LEN},
    error::ProtocolError,
};

pub mod reg {
    pub const INTR_MSG: u16 = 0x0100;
    pub const TOUCH_STATUS: u16 = 0x0104;
    pub const COORD: u16 = 0x0110;
    pub const EXT_COORD: u16 = 0x0180;
    pub const GESTURE_MSG: u16 = 0x01C0;

    pub const CMD_START_SCAN: u16 = 0x0200;
    pub const SET_MODE_SPECIAL: u16 = 0x0204;
    pub const SET_REJECTZONE_TOP: u16 = 0x0208;
    pub const SET_REJECTZONE_BOTTOM: u16 = 0x020C;
    pub const SET_TIME_ACTIVE: u16 = 0x0210;
    pub const SET_TIME_IDLE: u16 = 0x0214;
    pub const SET_REC_MODE: u16 = 0x0218;
    pub const GESTURE_EN: u16 = 0x021C;
    pub const SPONGE_FEATURE: u16 = 0x0220;
}

pub const READY_SENTINEL: u32 = 0x5A5A_A5A5;
pub const RECORDING_SENTINEL: u32 = 0x0C0C_0C0C;

const EXCEPT_MASK: u32 = 0xFFFF_FF00;
const EXCEPT_VALUE: u32 = 0xE11C_E900;

const RESULT_MASK: u32 = 0xFFF0_0000;
const CALIB_VALUE: u32 = 0xCA10_0000;
const MISCALIB_VALUE: u32 = 0xCA20_0000;
const CM_VALUE: u32 = 0xC010_0000;
const CS_VALUE: u32 = 0xC020_0000;
const CM_JITTER_VALUE: u32 = 0xC030_0000;
const CR_JITTER_VALUE: u32 = 0xC040_0000;

const SPECIAL_MASK: u32 = 0xFFFF_0000;
const SPECIAL_MAGIC: u32 = 0xE11E_0000;

const TOUCH_SIG_SHIFT: u32 = 24;
pub const TOUCH_SIG: u32 = 0x7A;
const TOUCH_ZERO_PREVENTION: u32 = 1 << 23;
const TOUCH_HOVER_SHIFT: u32 = 16;
const TOUCH_HOVER_MASK: u32 = 0x0F;
const TOUCH_POCKET: u32 = 1 << 15;
const TOUCH_COUNT_MASK: u32 = 0x1F;

const SCAN_MAGIC_MASK: u32 = 0xFFF0_0000;
pub const SCAN_MAGIC: u32 = 0x5CA0_0000;
const SCAN_FINGER_ENABLE: u32 = 1 << 16;
const SCAN_COUNT_MASK: u32 = 0xFFFF;

pub const START_SCAN: u32 = 0x0000_0001;
pub const REC_MODE_ENABLE: u32 = 0x0000_0001;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmcsKind {
    Cm,
    Cs,
    CmJitter,
    CrJitter,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TouchHeader {
    pub count: u8,
    pub hover: u8,
    pub pocket: bool,
}

impl TouchHeader {
    pub const fn to_word(self) -> u32 {
        let mut word = (TOUCH_SIG << TOUCH_SIG_SHIFT) | TOUCH_ZERO_PREVENTION;
        word |= ((self.hover as u32) & TOUCH_HOVER_MASK) << TOUCH_HOVER_SHIFT;
        if self.pocket {
            word |= TOUCH_POCKET;
        }
        word | ((self.count as u32) & TOUCH_COUNT_MASK)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IrqMessage {
    Ready,
    Recording,
    Exception { code: u8 },
    MisCalibration { result: u16 },
    Calibration,
    Cmcs { kind: CmcsKind, result: u16 },
    Gesture { command: u8 },
    Touch(TouchHeader),
    Glitch(ProtocolError),
}

pub const fn exception_word(code: u8) -> u32 {
    EXCEPT_VALUE | code as u32
}

pub const fn gesture_word(command: u8) -> u32 {
    SPECIAL_MAGIC | command as u32
}

pub const fn calibration_word() -> u32 {
    CALIB_VALUE
}

pub const fn miscalibration_word(result: u16) -> u32 {
    MISCALIB_VALUE | (result as u32 & 0xFFFF)
}

/// Classifies an interrupt status word in priority order.
pub fn classify(word: u32) -> IrqMessage {
    if word == READY_SENTINEL {
        return IrqMessage::Ready;
    }
    if word == RECORDING_SENTINEL {
        return IrqMessage::Recording;
    }
    if word & EXCEPT_MASK == EXCEPT_VALUE {
        return IrqMessage::Exception {
            code: (word & 0xFF) as u8,
        };
    }
    if word == 0 || word == u32::MAX {
        return IrqMessage::Glitch(ProtocolError::UnknownStatus(word));
    }

    let result = (word & 0xFFFF) as u16;
    match word & RESULT_MASK {
        MISCALIB_VALUE => return IrqMessage::MisCalibration { result },
        CALIB_VALUE => return IrqMessage::Calibration,
        CM_VALUE => {
            return IrqMessage::Cmcs {
                kind: CmcsKind::Cm,
                result,
            }
        }
        CS_VALUE => {
            return IrqMessage::Cmcs {
                kind: CmcsKind::Cs,
                result,
            }
        }
        CM_JITTER_VALUE => {
            return IrqMessage::Cmcs {
                kind: CmcsKind::CmJitter,
                result,
            }
        }
        CR_JITTER_VALUE => {
            return IrqMessage::Cmcs {
                kind: CmcsKind::CrJitter,
                result,
            }
        }
        _ => {}
    }

    if word & SPECIAL_MASK == SPECIAL_MAGIC {
        return IrqMessage::Gesture {
            command: (word & 0xFF) as u8,
        };
    }

    if (word >> TOUCH_SIG_SHIFT) != TOUCH_SIG || word & TOUCH_ZERO_PREVENTION == 0 {
        return IrqMessage::Glitch(ProtocolError::BadSignature(word));
    }

    let count = (word & TOUCH_COUNT_MASK) as u8;
    if count as usize > MAX_FINGERS {
        return IrqMessage::Glitch(ProtocolError::CountOutOfRange(count));
    }

    IrqMessage::Touch(TouchHeader {
        count,
        hover: ((word >> TOUCH_HOVER_SHIFT) & TOUCH_HOVER_MASK) as u8,
        pocket: word & TOUCH_POCKET != 0,
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordStatus {
    Press,
    Move,
    Release,
}

impl RecordStatus {
    const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            1 => Some(Self::Press),
            2 => Some(Self::Move),
            3 => Some(Self::Release),
            _ => None,
        }
    }

    const fn bits(self) -> u8 {
        match self {
            Self::Press => 1,
            Self::Move => 2,
            Self::Release => 3,
        }
    }
}

pub const TAG_COORDINATE: u8 = 1;
pub const TOUCH_TYPE_PALM: u8 = 5;

/// One per-finger record as carried on the wire.
///
/// Byte layout: `b0` = tag\[7:6\] id\[5:2\] status\[1:0\], `b1` = X\[11:4\],
/// `b2` = Y\[11:4\], `b3` = X\[3:0\] Y\[3:0\], `b4` major, `b5` minor,
/// `b6` pressure, `b7` = type\[7:4\] noise\[3:0\]. Ids are one-based.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RawRecord {
    pub tag: u8,
    pub id: u8,
    pub status_bits: u8,
    pub x: u16,
    pub y: u16,
    pub major: u8,
    pub minor: u8,
    pub pressure: u8,
    pub touch_type: u8,
    pub noise: u8,
}

impl RawRecord {
    pub fn parse(bytes: &[u8; RECORD_LEN]) -> Self {
        Self {
            tag: bytes[0] >> 6,
            id: (bytes[0] >> 2) & 0x0F,
            status_bits: bytes[0] & 0x03,
            x: ((bytes[1] as u16) << 4) | (bytes[3] >> 4) as u16,
            y: ((bytes[2] as u16) << 4) | (bytes[3] & 0x0F) as u16,
            major: bytes[4],
            minor: bytes[5],
            pressure: bytes[6],
            touch_type: bytes[7] >> 4,
            noise: bytes[7] & 0x0F,
        }
    }

    pub fn coordinate(id: u8, status: RecordStatus, x: u16, y: u16) -> Self {
        Self {
            tag: TAG_COORDINATE,
            id,
            status_bits: status.bits(),
            x: x & 0x0FFF,
            y: y & 0x0FFF,
            major: 4,
            minor: 3,
            pressure: 40,
            touch_type: 0,
            noise: 0,
        }
    }

    pub fn encode(&self) -> [u8; RECORD_LEN] {
        [
            (self.tag << 6) | ((self.id & 0x0F) << 2) | (self.status_bits & 0x03),
            (self.x >> 4) as u8,
            (self.y >> 4) as u8,
            (((self.x & 0x0F) as u8) << 4) | (self.y & 0x0F) as u8,
            self.major,
            self.minor,
            self.pressure,
            (self.touch_type << 4) | (self.noise & 0x0F),
        ]
    }

    pub fn is_coordinate(&self) -> bool {
        self.tag == TAG_COORDINATE
    }

    pub fn status(&self) -> Option<RecordStatus> {
        RecordStatus::from_bits(self.status_bits)
    }

    /// Zero-based slot index, if the id is in range.
    pub fn slot(&self) -> Option<usize> {
        let id = self.id as usize;
        (1..=MAX_FINGERS).contains(&id).then(|| id - 1)
    }

    pub fn is_palm(&self) -> bool {
        self.touch_type == TOUCH_TYPE_PALM
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanStatus {
    pub finger_enable: bool,
    pub scan_count: u16,
}

impl ScanStatus {
    pub fn parse(word: u32) -> Result<Self, ProtocolError> {
        if word & SCAN_MAGIC_MASK != SCAN_MAGIC {
            return Err(ProtocolError::BadScanMagic(word));
        }
        Ok(Self {
            finger_enable: word & SCAN_FINGER_ENABLE != 0,
            scan_count: (word & SCAN_COUNT_MASK) as u16,
        })
    }

    pub const fn to_word(self) -> u32 {
        let mut word = SCAN_MAGIC | self.scan_count as u32;
        if self.finger_enable {
            word |= SCAN_FINGER_ENABLE;
        }
        word
    }
}

use core::sync::atomic::Ordering;

use heapless::Vec;

use super::{DeviceCore, TouchDevice};
use crate::{
    bus::TouchBus,
    config::{
        CALIB_WORDS, EVENT_TIMER_INTERVAL_MS, EXCEPTION_PAYLOAD_LEN, GESTURE_MSG_LEN,
        MAX_FINGERS, RECORDS_PER_TRANSFER, RECORD_LEN,
    },
    error::{Error, ErrorKind},
    events::{InputEvent, InputSink, ProximityEvent},
    gesture::{self, GestureMessage},
    health::HealthEvent,
    platform::TouchPlatform,
    power::SysMode,
    protocol::{classify, reg, IrqMessage, RawRecord, TouchHeader},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IrqOutcome {
    Ignored,
    SessionLocked,
    Ready,
    Recording,
    Exception { code: u8 },
    ResultStored,
    Gesture,
    GestureDropped,
    Touch { pressed: u8 },
    Glitch,
    TransportFailed,
}

impl<B: TouchBus, P: TouchPlatform, S: InputSink> TouchDevice<B, P, S> {
    /// Handles one asserted interrupt. Callers must not overlap invocations.
    pub async fn handle_interrupt(&self, now_ms: u64) -> IrqOutcome {
        self.irq_working.store(true, Ordering::Release);
        let outcome = {
            let mut guard = self.core.lock().await;
            let core = &mut *guard;
            let outcome = self.process_interrupt(core, now_ms);
            if self.supervising(core) {
                self.event_timer.rearm(now_ms, EVENT_TIMER_INTERVAL_MS);
            }
            outcome
        };
        self.note_event(now_ms);
        self.irq_working.store(false, Ordering::Release);
        outcome
    }

    fn process_interrupt(&self, core: &mut DeviceCore<B, P, S>, now_ms: u64) -> IrqOutcome {
        if !core.status.irq_enabled || core.mode() == SysMode::PowerOff {
            return IrqOutcome::Ignored;
        }

        let read = core.bus(&self.gate).read_word(reg::INTR_MSG);
        let word = match read {
            Ok(word) => word,
            Err(err) => return self.bus_failed(core, err, now_ms),
        };
        log::debug!("touch: intr_msg word=0x{:08x}", word);

        match classify(word) {
            IrqMessage::Ready => {
                log::info!("touch: ready");
                IrqOutcome::Ready
            }
            IrqMessage::Recording => IrqOutcome::Recording,
            IrqMessage::Exception { code } => {
                self.handle_exception(core, code, now_ms);
                IrqOutcome::Exception { code }
            }
            IrqMessage::MisCalibration { result } => {
                core.status.miscalib_result = Some(result);
                log::info!("touch: miscalibration_done result=0x{:04x}", result);
                IrqOutcome::ResultStored
            }
            IrqMessage::Calibration => self.read_calibration(core, now_ms),
            IrqMessage::Cmcs { kind, result } => {
                core.status.cmcs_result = Some((kind, result));
                log::info!("touch: cmcs_notify kind={:?} result=0x{:04x}", kind, result);
                IrqOutcome::ResultStored
            }
            IrqMessage::Gesture { command } => self.handle_gesture(core, command, now_ms),
            IrqMessage::Touch(header) => self.handle_touch(core, header, now_ms),
            IrqMessage::Glitch(err) => {
                core.status.glitch_count = core.status.glitch_count.saturating_add(1);
                log::warn!("touch: glitch word=0x{:08x} err={:?}", word, err);
                self.record_failure(core, ErrorKind::Protocol, now_ms);
                IrqOutcome::Glitch
            }
        }
    }

    fn bus_failed(
        &self,
        core: &mut DeviceCore<B, P, S>,
        err: Error<B::Error>,
        now_ms: u64,
    ) -> IrqOutcome {
        if matches!(err, Error::SessionLocked) {
            return IrqOutcome::SessionLocked;
        }
        log::warn!("touch: irq_read_failed err={}", err.label());
        self.record_failure(core, err.kind(), now_ms);
        IrqOutcome::TransportFailed
    }

    fn handle_exception(&self, core: &mut DeviceCore<B, P, S>, code: u8, now_ms: u64) {
        let mut payload = [0u8; EXCEPTION_PAYLOAD_LEN];
        let read = core.bus(&self.gate).burst_read(reg::COORD, &mut payload);
        match read {
            Ok(()) => log::error!(
                "touch: exception code=0x{:02x} payload={:02x?}",
                code,
                payload
            ),
            Err(_) => log::error!("touch: exception code=0x{:02x} payload=unreadable", code),
        }
        core.status.last_exception = Some(code);
        self.record_failure(core, ErrorKind::DeviceException { code }, now_ms);
    }

    fn read_calibration(&self, core: &mut DeviceCore<B, P, S>, now_ms: u64) -> IrqOutcome {
        let mut raw = [0u8; CALIB_WORDS * 4];
        let read = core.bus(&self.gate).burst_read(reg::INTR_MSG, &mut raw);
        if let Err(err) = read {
            return self.bus_failed(core, err, now_ms);
        }
        let mut words = [0u32; CALIB_WORDS];
        for (word, chunk) in words.iter_mut().zip(raw.chunks_exact(4)) {
            *word = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        core.status.calib_result = Some(words);
        log::info!(
            "touch: calibration_done slf=0x{:08x} mtl=0x{:08x} max_ch=0x{:08x}",
            words[0],
            words[1],
            words[2]
        );
        IrqOutcome::ResultStored
    }

    fn handle_gesture(&self, core: &mut DeviceCore<B, P, S>, command: u8, now_ms: u64) -> IrqOutcome {
        if command != 0 {
            log::warn!("touch: gesture_cmd_unsupported cmd=0x{:02x}", command);
            return IrqOutcome::GestureDropped;
        }

        let mut raw = [0u8; GESTURE_MSG_LEN];
        let read = core.bus(&self.gate).burst_read(reg::GESTURE_MSG, &mut raw);
        if let Err(err) = read {
            return self.bus_failed(core, err, now_ms);
        }
        let message = GestureMessage::parse(&raw);
        log::debug!(
            "touch: gesture_msg eid={} type={} id={}",
            message.eid,
            message.gtype,
            message.gid
        );

        match gesture::classify(&message) {
            Ok(event) => {
                gesture::dispatch(event, &self.gesture, &mut core.sink);
                IrqOutcome::Gesture
            }
            Err(reject) => {
                log::warn!("touch: gesture_dropped reason={:?}", reject);
                IrqOutcome::GestureDropped
            }
        }
    }

    fn handle_touch(
        &self,
        core: &mut DeviceCore<B, P, S>,
        header: TouchHeader,
        now_ms: u64,
    ) -> IrqOutcome {
        let count = header.count as usize;
        let mut raw = [0u8; MAX_FINGERS * RECORD_LEN];

        // Both transfers complete before any slot or proximity state changes.
        if count > 0 {
            let first = count.min(RECORDS_PER_TRANSFER);
            let mut bus = core.bus(&self.gate);
            let mut result = bus.burst_read(reg::COORD, &mut raw[..first * RECORD_LEN]);
            if result.is_ok() && count > first {
                result = bus.burst_read(
                    reg::EXT_COORD,
                    &mut raw[first * RECORD_LEN..count * RECORD_LEN],
                );
            }
            if let Err(err) = result {
                return self.bus_failed(core, err, now_ms);
            }
        }

        self.report_proximity(core, header);

        let records: Vec<RawRecord, MAX_FINGERS> = raw
            .chunks_exact(RECORD_LEN)
            .take(count)
            .map(|chunk| {
                let mut bytes = [0u8; RECORD_LEN];
                bytes.copy_from_slice(chunk);
                RawRecord::parse(&bytes)
            })
            .collect();

        let summary = core
            .decoder
            .decode(&self.config, &records, &mut core.sink);
        if summary.skipped_records > 0 {
            log::warn!("touch: frame_records_skipped count={}", summary.skipped_records);
        }
        let output = core.health.handle(HealthEvent::DecodeOk);
        self.apply_health(output, now_ms);

        IrqOutcome::Touch {
            pressed: summary.pressed,
        }
    }

    fn report_proximity(&self, core: &mut DeviceCore<B, P, S>, header: TouchHeader) {
        if core.status.hover != header.hover {
            core.status.hover = header.hover;
            core.sink
                .emit(InputEvent::Proximity(ProximityEvent::Hover(header.hover)));
            log::info!("touch: hover level={}", header.hover);
        }
        if core.status.pocket != header.pocket || core.status.force_pocket_event {
            core.status.pocket = header.pocket;
            core.status.force_pocket_event = false;
            core.sink
                .emit(InputEvent::Proximity(ProximityEvent::Pocket(header.pocket)));
            log::info!("touch: pocket detected={}", header.pocket);
        }
    }
}

use crate::{
    config::{TouchConfig, MAX_FINGERS},
    events::{Contact, InputEvent, InputSink, Key},
    protocol::{RawRecord, RecordStatus},
    slots::{Location, SlotTable},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameSummary {
    pub pressed: u8,
    pub skipped_records: u8,
}

/// Turns per-frame records into slot mutations and pointer events.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameDecoder {
    table: SlotTable,
}

impl FrameDecoder {
    pub const fn new() -> Self {
        Self {
            table: SlotTable::new(),
        }
    }

    pub fn table(&self) -> &SlotTable {
        &self.table
    }

    pub fn pressed(&self) -> u8 {
        self.table.pressed
    }

    pub fn decode<S: InputSink>(
        &mut self,
        config: &TouchConfig,
        records: &[RawRecord],
        sink: &mut S,
    ) -> FrameSummary {
        let mut summary = FrameSummary::default();
        let mut seen: [Option<usize>; MAX_FINGERS] = [None; MAX_FINGERS];

        for (index, record) in records.iter().enumerate() {
            if !record.is_coordinate() {
                log::debug!("touch: record_skipped index={} tag={}", index, record.tag);
                continue;
            }
            match record.slot() {
                Some(slot) => seen[slot] = Some(index),
                None => {
                    summary.skipped_records = summary.skipped_records.saturating_add(1);
                    log::warn!("touch: record_invalid index={} id={}", index, record.id);
                }
            }
        }

        for (slot, entry) in seen.iter().enumerate() {
            match entry {
                Some(index) => {
                    if !self.apply_record(config, slot, &records[*index], sink) {
                        summary.skipped_records = summary.skipped_records.saturating_add(1);
                    }
                }
                None if config.force_release && self.table.slots[slot].touched => {
                    log::info!(
                        "touch: [R] forced id={} loc={}",
                        slot,
                        self.location_code(config, slot)
                    );
                    self.release_slot(slot, sink);
                }
                None => {}
            }
        }

        self.update_keys(sink);
        summary.pressed = self.table.pressed;
        summary
    }

    /// Releases every touched slot once and drops the touch key.
    pub fn force_release_all<S: InputSink>(&mut self, sink: &mut S) -> u8 {
        let mut released = 0u8;
        for slot in 0..MAX_FINGERS {
            if self.table.slots[slot].touched {
                self.release_slot(slot, sink);
                released = released.saturating_add(1);
            }
        }
        self.table.pressed = 0;
        self.table.check_multi = false;
        if self.table.touch_key_down {
            self.table.touch_key_down = false;
            sink.emit(InputEvent::KeyUp(Key::Touch));
        }
        if released > 0 {
            log::info!("touch: clear_input released={}", released);
        }
        released
    }

    fn apply_record<S: InputSink>(
        &mut self,
        config: &TouchConfig,
        slot: usize,
        record: &RawRecord,
        sink: &mut S,
    ) -> bool {
        let Some(status) = record.status() else {
            log::warn!("touch: record_invalid id={} status={}", slot, record.status_bits);
            return false;
        };

        if self.table.noise != record.noise {
            self.table.noise = record.noise;
            log::info!("touch: noise_level level={}", record.noise);
        }

        let contact = Contact {
            x: config.scale_x(record.x),
            y: config.scale_y(record.y),
            major: record.major,
            minor: record.minor,
            pressure: record.pressure,
            palm: record.is_palm(),
        };
        let slot_id = slot as u8;
        let entry = &mut self.table.slots[slot];
        if entry.prev_type != record.touch_type {
            log::debug!(
                "touch: type_change id={} from={} to={}",
                slot,
                entry.prev_type,
                record.touch_type
            );
            entry.prev_type = record.touch_type;
        }
        entry.status = Some(status);

        match status {
            RecordStatus::Press | RecordStatus::Move => {
                entry.x = contact.x;
                entry.y = contact.y;
                entry.major = contact.major;
                entry.minor = contact.minor;
                entry.pressure = contact.pressure;
                entry.palm = contact.palm;
                entry.last_x = contact.x;
                entry.last_y = contact.y;
                entry.move_count = entry.move_count.saturating_add(1);

                if entry.touched {
                    sink.emit(InputEvent::Move {
                        slot: slot_id,
                        contact,
                    });
                    log::debug!("touch: [M] id={} x={} y={}", slot, contact.x, contact.y);
                } else {
                    entry.touched = true;
                    entry.press_x = contact.x;
                    entry.press_y = contact.y;
                    self.table.pressed = self.table.pressed.saturating_add(1);
                    self.table.all_finger_count = self.table.all_finger_count.saturating_add(1);
                    sink.emit(InputEvent::Press {
                        slot: slot_id,
                        contact,
                    });
                    log::info!(
                        "touch: [P] id={} x={} y={} z={} loc={} major={} minor={} tc={}",
                        slot,
                        contact.x,
                        contact.y,
                        contact.pressure,
                        Location::detect(config, contact.x, contact.y).code(),
                        contact.major,
                        contact.minor,
                        self.table.pressed
                    );
                }
            }
            RecordStatus::Release => {
                if entry.touched {
                    entry.last_x = contact.x;
                    entry.last_y = contact.y;
                    log::info!(
                        "touch: [R] id={} loc={} dd={},{} mc={}",
                        slot,
                        Location::detect(config, contact.x, contact.y).code(),
                        contact.x as i32 - entry.press_x as i32,
                        contact.y as i32 - entry.press_y as i32,
                        entry.move_count
                    );
                    self.release_slot(slot, sink);
                }
            }
        }
        true
    }

    fn release_slot<S: InputSink>(&mut self, slot: usize, sink: &mut S) {
        let entry = &mut self.table.slots[slot];
        entry.touched = false;
        entry.move_count = 0;
        entry.status = Some(RecordStatus::Release);
        self.table.pressed = self.table.pressed.saturating_sub(1);
        sink.emit(InputEvent::Release { slot: slot as u8 });
    }

    fn update_keys<S: InputSink>(&mut self, sink: &mut S) {
        let pressed = self.table.pressed;
        if pressed > 0 && !self.table.touch_key_down {
            self.table.touch_key_down = true;
            sink.emit(InputEvent::KeyDown(Key::Touch));
        } else if pressed == 0 && self.table.touch_key_down {
            self.table.touch_key_down = false;
            sink.emit(InputEvent::KeyUp(Key::Touch));
        }

        if pressed >= 2 {
            if !self.table.check_multi {
                self.table.check_multi = true;
                self.table.all_multi_finger_count =
                    self.table.all_multi_finger_count.saturating_add(1);
                log::debug!("touch: multi_touch fingers={}", pressed);
            }
        } else {
            self.table.check_multi = false;
        }
    }

    fn location_code(&self, config: &TouchConfig, slot: usize) -> &'static str {
        let entry = &self.table.slots[slot];
        Location::detect(config, entry.last_x, entry.last_y).code()
    }
}

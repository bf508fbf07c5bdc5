use embassy_sync::{blocking_mutex::raw::RawMutex, channel::Sender};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    /// Asserted while at least one finger is down.
    Touch,
    Gesture,
    Wakeup,
    InterruptCancel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProximityEvent {
    Hover(u8),
    Pocket(bool),
    WakePulse(bool),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Contact {
    pub x: u16,
    pub y: u16,
    pub major: u8,
    pub minor: u8,
    pub pressure: u8,
    pub palm: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputEvent {
    Press { slot: u8, contact: Contact },
    Move { slot: u8, contact: Contact },
    Release { slot: u8 },
    KeyDown(Key),
    KeyUp(Key),
    Proximity(ProximityEvent),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputEventKind {
    Press(u8),
    Move(u8),
    Release(u8),
    KeyDown(Key),
    KeyUp(Key),
    Proximity(ProximityEvent),
}

impl InputEvent {
    pub fn kind(&self) -> InputEventKind {
        match *self {
            Self::Press { slot, .. } => InputEventKind::Press(slot),
            Self::Move { slot, .. } => InputEventKind::Move(slot),
            Self::Release { slot } => InputEventKind::Release(slot),
            Self::KeyDown(key) => InputEventKind::KeyDown(key),
            Self::KeyUp(key) => InputEventKind::KeyUp(key),
            Self::Proximity(event) => InputEventKind::Proximity(event),
        }
    }
}

/// Upstream consumer of decoded input. Delivery is fire-and-forget.
pub trait InputSink {
    fn emit(&mut self, event: InputEvent);

    fn key_pair(&mut self, key: Key) {
        self.emit(InputEvent::KeyDown(key));
        self.emit(InputEvent::KeyUp(key));
    }
}

impl<const N: usize> InputSink for heapless::Vec<InputEvent, N> {
    fn emit(&mut self, event: InputEvent) {
        if self.push(event).is_err() {
            log::warn!("touch: event_dropped reason=sink_full");
        }
    }
}

#[cfg(test)]
impl InputSink for std::vec::Vec<InputEvent> {
    fn emit(&mut self, event: InputEvent) {
        self.push(event);
    }
}

/// Forwards events into an embassy channel without waiting for room.
pub struct ChannelSink<'a, M: RawMutex, const N: usize> {
    sender: Sender<'a, M, InputEvent, N>,
    dropped: u32,
}

impl<'a, M: RawMutex, const N: usize> ChannelSink<'a, M, N> {
    pub fn new(sender: Sender<'a, M, InputEvent, N>) -> Self {
        Self { sender, dropped: 0 }
    }

    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

impl<M: RawMutex, const N: usize> InputSink for ChannelSink<'_, M, N> {
    fn emit(&mut self, event: InputEvent) {
        if self.sender.try_send(event).is_err() {
            self.dropped = self.dropped.saturating_add(1);
        }
    }
}

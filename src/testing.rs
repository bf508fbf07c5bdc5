//! Scripted hardware for host tests.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    vec::Vec,
};

use crate::{
    bus::TouchBus,
    events::{InputEvent, InputEventKind, InputSink},
    platform::{DelayOps, TouchPlatform},
    protocol::{reg, RawRecord},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FakeBusError;

#[derive(Debug, Default)]
struct BusState {
    memory: HashMap<u16, Vec<u8>>,
    status_queue: VecDeque<u32>,
    reads: Vec<(u16, usize)>,
    writes: Vec<(u16, Vec<u8>)>,
    fail_next: u32,
    fail_always: bool,
    fail_at: Option<u16>,
}

impl BusState {
    fn fail(&mut self, addr: u16) -> bool {
        if self.fail_always || self.fail_at == Some(addr) {
            return true;
        }
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return true;
        }
        false
    }
}

/// Register file backed by a map. Clones share state.
#[derive(Clone, Debug, Default)]
pub struct FakeBus {
    state: Arc<Mutex<BusState>>,
}

impl FakeBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut BusState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn set_word(&self, addr: u16, value: u32) {
        self.set_bytes(addr, &value.to_be_bytes());
    }

    pub fn set_bytes(&self, addr: u16, bytes: &[u8]) {
        self.with(|state| state.memory.insert(addr, bytes.to_vec()));
    }

    /// Queues interrupt status words; each 4-byte read of the message
    /// register pops one.
    pub fn push_status(&self, word: u32) {
        self.with(|state| state.status_queue.push_back(word));
    }

    pub fn set_records(&self, addr: u16, records: &[RawRecord]) {
        let bytes: Vec<u8> = records.iter().flat_map(|record| record.encode()).collect();
        self.set_bytes(addr, &bytes);
    }

    pub fn fail_next(&self, count: u32) {
        self.with(|state| state.fail_next = count);
    }

    pub fn fail_always(&self, enabled: bool) {
        self.with(|state| state.fail_always = enabled);
    }

    /// Every access to `addr` fails until cleared.
    pub fn fail_at(&self, addr: Option<u16>) {
        self.with(|state| state.fail_at = addr);
    }

    pub fn reads(&self) -> Vec<(u16, usize)> {
        self.with(|state| state.reads.clone())
    }

    pub fn writes(&self) -> Vec<(u16, Vec<u8>)> {
        self.with(|state| state.writes.clone())
    }

    pub fn written_words(&self, addr: u16) -> Vec<u32> {
        self.writes()
            .into_iter()
            .filter(|(at, bytes)| *at == addr && bytes.len() == 4)
            .map(|(_, bytes)| u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            .collect()
    }

    pub fn op_count(&self) -> usize {
        self.with(|state| state.reads.len() + state.writes.len())
    }

    pub fn clear_log(&self) {
        self.with(|state| {
            state.reads.clear();
            state.writes.clear();
        });
    }
}

impl TouchBus for FakeBus {
    type Error = FakeBusError;

    fn read(&mut self, addr: u16) -> Result<u8, Self::Error> {
        let mut buffer = [0u8; 1];
        self.burst_read(addr, &mut buffer)?;
        Ok(buffer[0])
    }

    fn burst_read(&mut self, addr: u16, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.with(|state| {
            state.reads.push((addr, buffer.len()));
            if state.fail(addr) {
                return Err(FakeBusError);
            }
            if addr == reg::INTR_MSG && buffer.len() == 4 {
                if let Some(word) = state.status_queue.pop_front() {
                    buffer.copy_from_slice(&word.to_be_bytes());
                    return Ok(());
                }
            }
            buffer.fill(0);
            if let Some(bytes) = state.memory.get(&addr) {
                let len = bytes.len().min(buffer.len());
                buffer[..len].copy_from_slice(&bytes[..len]);
            }
            Ok(())
        })
    }

    fn write(&mut self, addr: u16, value: u8) -> Result<(), Self::Error> {
        self.burst_write(addr, &[value])
    }

    fn burst_write(&mut self, addr: u16, bytes: &[u8]) -> Result<(), Self::Error> {
        self.with(|state| {
            state.writes.push((addr, bytes.to_vec()));
            if state.fail(addr) {
                return Err(FakeBusError);
            }
            state.memory.insert(addr, bytes.to_vec());
            Ok(())
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlatformCall {
    Power(bool),
    Irq(bool),
    Wake(bool),
    Delay(u32),
}

#[derive(Clone, Debug, Default)]
pub struct FakePlatform {
    calls: Arc<Mutex<Vec<PlatformCall>>>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls other than delays.
    pub fn control_calls(&self) -> Vec<PlatformCall> {
        self.calls()
            .into_iter()
            .filter(|call| !matches!(call, PlatformCall::Delay(_)))
            .collect()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn push(&self, call: PlatformCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl DelayOps for FakePlatform {
    fn delay_ms(&mut self, millis: u32) {
        self.push(PlatformCall::Delay(millis));
    }
}

impl TouchPlatform for FakePlatform {
    fn set_power(&mut self, on: bool) {
        self.push(PlatformCall::Power(on));
    }

    fn set_irq_enabled(&mut self, enabled: bool) {
        self.push(PlatformCall::Irq(enabled));
    }

    fn set_irq_wake(&mut self, enabled: bool) {
        self.push(PlatformCall::Wake(enabled));
    }
}

#[derive(Clone, Debug, Default)]
pub struct SharedSink {
    events: Arc<Mutex<Vec<InputEvent>>>,
}

impl SharedSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<InputEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }

    pub fn take_kinds(&self) -> Vec<InputEventKind> {
        self.take().iter().map(InputEvent::kind).collect()
    }
}

impl InputSink for SharedSink {
    fn emit(&mut self, event: InputEvent) {
        self.events.lock().unwrap().push(event);
    }
}

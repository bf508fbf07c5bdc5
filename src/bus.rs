use core::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::i2c::{I2c, Operation};

use crate::{
    config::{BUS_RETRY_ATTEMPTS, BUS_RETRY_DELAY_MS},
    error::Error,
    platform::DelayOps,
};

/// Register-addressed access to the touch controller.
pub trait TouchBus {
    type Error;

    fn read(&mut self, addr: u16) -> Result<u8, Self::Error>;
    fn burst_read(&mut self, addr: u16, buffer: &mut [u8]) -> Result<(), Self::Error>;
    fn write(&mut self, addr: u16, value: u8) -> Result<(), Self::Error>;
    fn burst_write(&mut self, addr: u16, bytes: &[u8]) -> Result<(), Self::Error>;

    fn read_word(&mut self, addr: u16) -> Result<u32, Self::Error> {
        let mut buffer = [0u8; 4];
        self.burst_read(addr, &mut buffer)?;
        Ok(u32::from_be_bytes(buffer))
    }

    fn write_word(&mut self, addr: u16, value: u32) -> Result<(), Self::Error> {
        self.burst_write(addr, &value.to_be_bytes())
    }
}

pub const DEFAULT_I2C_ADDRESS: u8 = 0x50;

pub struct I2cTouchBus<I> {
    i2c: I,
    address: u8,
}

impl<I: I2c> I2cTouchBus<I> {
    pub fn new(i2c: I, address: u8) -> Self {
        Self { i2c, address }
    }

    pub fn release(self) -> I {
        self.i2c
    }
}

impl<I: I2c> TouchBus for I2cTouchBus<I> {
    type Error = I::Error;

    fn read(&mut self, addr: u16) -> Result<u8, Self::Error> {
        let mut buffer = [0u8; 1];
        self.i2c
            .write_read(self.address, &addr.to_be_bytes(), &mut buffer)?;
        Ok(buffer[0])
    }

    fn burst_read(&mut self, addr: u16, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.i2c.write_read(self.address, &addr.to_be_bytes(), buffer)
    }

    fn write(&mut self, addr: u16, value: u8) -> Result<(), Self::Error> {
        let [hi, lo] = addr.to_be_bytes();
        self.i2c.write(self.address, &[hi, lo, value])
    }

    fn burst_write(&mut self, addr: u16, bytes: &[u8]) -> Result<(), Self::Error> {
        let header = addr.to_be_bytes();
        self.i2c.transaction(
            self.address,
            &mut [Operation::Write(&header), Operation::Write(bytes)],
        )
    }
}

/// Closed while a secure session owns the controller.
#[derive(Debug, Default)]
pub struct SessionGate {
    locked: AtomicBool,
}

impl SessionGate {
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    pub fn lock(&self) {
        self.locked.store(true, Ordering::Release);
    }

    pub fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }
}

/// Bus view that fails fast behind a closed gate and retries transport errors.
pub struct GuardedBus<'a, B, D> {
    bus: &'a mut B,
    delay: &'a mut D,
    gate: &'a SessionGate,
}

impl<'a, B: TouchBus, D: DelayOps> GuardedBus<'a, B, D> {
    pub fn new(bus: &'a mut B, delay: &'a mut D, gate: &'a SessionGate) -> Self {
        Self { bus, delay, gate }
    }

    pub fn read_word(&mut self, addr: u16) -> Result<u32, Error<B::Error>> {
        self.with_retry(|bus| bus.read_word(addr))
    }

    pub fn burst_read(&mut self, addr: u16, buffer: &mut [u8]) -> Result<(), Error<B::Error>> {
        self.with_retry(|bus| bus.burst_read(addr, buffer))
    }

    pub fn write_word(&mut self, addr: u16, value: u32) -> Result<(), Error<B::Error>> {
        self.with_retry(|bus| bus.write_word(addr, value))
    }

    fn with_retry<T>(
        &mut self,
        mut op: impl FnMut(&mut B) -> Result<T, B::Error>,
    ) -> Result<T, Error<B::Error>> {
        let mut attempt = 0u8;
        loop {
            if self.gate.is_locked() {
                return Err(Error::SessionLocked);
            }
            match op(&mut *self.bus) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt = attempt.saturating_add(1);
                    if attempt >= BUS_RETRY_ATTEMPTS {
                        return Err(Error::Transport(err));
                    }
                    self.delay.delay_ms(BUS_RETRY_DELAY_MS);
                }
            }
        }
    }
}

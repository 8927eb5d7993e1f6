//! Recording SPI bus, pins and delay for driver tests

use std::cell::RefCell;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType as PinErrorType, OutputPin};
use embedded_hal::spi::{ErrorType as SpiErrorType, SpiBus};
use scanline_core::traits::cmd;

use super::interface::{Interface, SpiClock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Cs(bool),
    Reset(bool),
    Clock(u32),
    Command(u8),
    Data(Vec<u8>),
}

#[derive(Default)]
struct State {
    ops: Vec<Op>,
    dc_high: bool,
    last_command: u8,
    registers: Vec<(u8, u8)>,
    scanline_raw: u8,
    delay_ns: u64,
}

impl State {
    fn response(&self, len: usize) -> Vec<u8> {
        if self.last_command == cmd::GSCAN {
            let mut out = vec![0u8; len];
            if let Some(b) = out.get_mut(1) {
                *b = self.scanline_raw;
            }
            return out;
        }
        let value = self
            .registers
            .iter()
            .find(|(c, _)| *c == self.last_command)
            .map(|&(_, v)| v)
            .unwrap_or(0);
        vec![value; len]
    }
}

#[derive(Clone, Default)]
pub struct Mock {
    state: Rc<RefCell<State>>,
}

impl Mock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interface(&self) -> Interface<MockSpi, MockPin, MockPin> {
        Interface::new(
            MockSpi { mock: self.clone() },
            MockPin {
                mock: self.clone(),
                kind: PinKind::Dc,
            },
            MockPin {
                mock: self.clone(),
                kind: PinKind::Cs,
            },
        )
    }

    pub fn reset_pin(&self) -> MockPin {
        MockPin {
            mock: self.clone(),
            kind: PinKind::Reset,
        }
    }

    pub fn delay(&self) -> MockDelay {
        MockDelay { mock: self.clone() }
    }

    pub fn set_register(&self, command: u8, value: u8) {
        self.state.borrow_mut().registers.push((command, value));
    }

    pub fn set_scanline_raw(&self, raw: u8) {
        self.state.borrow_mut().scanline_raw = raw;
    }

    pub fn ops(&self) -> Vec<Op> {
        self.state.borrow().ops.clone()
    }

    pub fn commands(&self) -> Vec<u8> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Command(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    pub fn clocks(&self) -> Vec<u32> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Clock(hz) => Some(hz),
                _ => None,
            })
            .collect()
    }

    /// Data bytes following the first `command`, up to the next command
    pub fn data_after(&self, command: u8) -> Vec<u8> {
        self.ops()
            .into_iter()
            .skip_while(|op| *op != Op::Command(command))
            .skip(1)
            .take_while(|op| !matches!(op, Op::Command(_)))
            .filter_map(|op| match op {
                Op::Data(bytes) => Some(bytes),
                _ => None,
            })
            .flatten()
            .collect()
    }

    pub fn delayed_ms(&self) -> u64 {
        self.state.borrow().delay_ns / 1_000_000
    }
}

pub struct MockSpi {
    mock: Mock,
}

impl SpiErrorType for MockSpi {
    type Error = Infallible;
}

impl SpiBus<u8> for MockSpi {
    fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        let response = self.mock.state.borrow().response(words.len());
        words.copy_from_slice(&response);
        Ok(())
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        let mut s = self.mock.state.borrow_mut();
        if s.dc_high {
            s.ops.push(Op::Data(words.to_vec()));
        } else {
            for &c in words {
                s.last_command = c;
                s.ops.push(Op::Command(c));
            }
        }
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        self.write(write)?;
        self.read(read)
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        let out = words.to_vec();
        self.transfer(words, &out)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl SpiClock for MockSpi {
    fn set_clock_hz(&mut self, hz: u32) {
        self.mock.state.borrow_mut().ops.push(Op::Clock(hz));
    }
}

#[derive(Clone, Copy)]
enum PinKind {
    Dc,
    Cs,
    Reset,
}

pub struct MockPin {
    mock: Mock,
    kind: PinKind,
}

impl MockPin {
    fn set(&mut self, high: bool) {
        let mut s = self.mock.state.borrow_mut();
        match self.kind {
            PinKind::Dc => s.dc_high = high,
            PinKind::Cs => s.ops.push(Op::Cs(high)),
            PinKind::Reset => s.ops.push(Op::Reset(high)),
        }
    }
}

impl PinErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set(true);
        Ok(())
    }
}

pub struct MockDelay {
    mock: Mock,
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.mock.state.borrow_mut().delay_ns += ns as u64;
    }
}

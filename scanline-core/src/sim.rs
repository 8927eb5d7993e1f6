//! Deterministic panel, bus and runtime for host tests
//!
//! All three handles share one simulated microsecond clock. Time only moves
//! when something costs time (a scanline query, a blocking pixel write, a
//! delay) or when the runtime is polled while every pending event lies in
//! the future, in which case the clock jumps to the earliest one.

use std::cell::RefCell;
use std::rc::Rc;

use crate::framebuffer::{Rotation, PANEL_HEIGHT, PANEL_PIXELS, PANEL_WIDTH, SCANLINES};
use crate::registry::Slot;
use crate::state::SchedulerEvent;
use crate::traits::{cmd, EventSource, PanelBus, PanelControl, PanelError, Timebase};
use crate::vsync::FRMCTR1;

/// Cost of one scanline query (µs)
pub const READ_COST_US: u64 = 10;

struct SimState {
    now: u64,
    mode0_period: u32,
    period: u32,
    frozen: bool,
    timer: Option<u64>,
    bus_done: Option<u64>,
    ns_per_pixel: u64,
    gram: Vec<u16>,
    window: (usize, usize, usize, usize),
    cursor: (usize, usize),
    command: u8,
    params: Vec<u16>,
    commands: Vec<u8>,
    registers: Vec<(u8, Vec<u8>)>,
    span_starts: Vec<(u16, u64)>,
    snapshots: Vec<Vec<u16>>,
    pixels_written: u64,
    begun: u32,
    ended: u32,
    sleeping: bool,
}

impl SimState {
    fn scanline(&self) -> u16 {
        ((self.now * SCANLINES as u64 / self.period as u64) % SCANLINES as u64) as u16
    }

    fn write_pixels(&mut self, pixels: &[u16]) {
        let (x0, x1, y0, y1) = self.window;
        for &p in pixels {
            let (x, y) = self.cursor;
            self.gram[y * PANEL_WIDTH + x] = p;
            self.cursor = if x < x1 {
                (x + 1, y)
            } else if y < y1 {
                (x0, y + 1)
            } else {
                (x0, y0)
            };
        }
        self.pixels_written += pixels.len() as u64;
    }

    fn pixel_cost(&self, count: usize) -> u64 {
        (count as u64 * self.ns_per_pixel / 1000).max(1)
    }
}

/// Owner of the simulated world
#[derive(Clone)]
pub struct Sim {
    state: Rc<RefCell<SimState>>,
}

impl Sim {
    /// Panel refreshing every `period_us` in mode 0, on a bus sending one
    /// pixel every 50 ns
    pub fn new(period_us: u32) -> Self {
        Self {
            state: Rc::new(RefCell::new(SimState {
                now: 0,
                mode0_period: period_us,
                period: period_us,
                frozen: false,
                timer: None,
                bus_done: None,
                ns_per_pixel: 50,
                gram: vec![0; PANEL_PIXELS],
                window: (0, PANEL_WIDTH - 1, 0, PANEL_HEIGHT - 1),
                cursor: (0, 0),
                command: cmd::NOP,
                params: Vec::new(),
                commands: Vec::new(),
                registers: Vec::new(),
                span_starts: Vec::new(),
                snapshots: Vec::new(),
                pixels_written: 0,
                begun: 0,
                ended: 0,
                sleeping: false,
            })),
        }
    }

    pub fn bus(&self) -> SimBus {
        SimBus { sim: self.clone() }
    }

    pub fn panel(&self) -> SimPanel {
        SimPanel { sim: self.clone() }
    }

    pub fn runtime(&self) -> SimRuntime {
        SimRuntime { sim: self.clone() }
    }

    pub fn now(&self) -> u64 {
        self.state.borrow().now
    }

    pub fn period(&self) -> u32 {
        self.state.borrow().period
    }

    /// Armed one-shot deadline (µs)
    pub fn timer(&self) -> Option<u64> {
        self.state.borrow().timer
    }

    /// Scanlines since time zero, not wrapped
    pub fn absolute_scanline(&self, at_us: u64) -> u64 {
        at_us * SCANLINES as u64 / self.state.borrow().period as u64
    }

    /// Stop the scanline register from moving
    pub fn freeze_scanline(&self, frozen: bool) {
        self.state.borrow_mut().frozen = frozen;
    }

    pub fn set_ns_per_pixel(&self, ns: u64) {
        self.state.borrow_mut().ns_per_pixel = ns;
    }

    /// Panel memory, native layout
    pub fn gram(&self) -> Vec<u16> {
        self.state.borrow().gram.clone()
    }

    /// Panel memory at the end of each bus transaction
    pub fn snapshots(&self) -> Vec<Vec<u16>> {
        self.state.borrow().snapshots.clone()
    }

    pub fn commands(&self) -> Vec<u8> {
        self.state.borrow().commands.clone()
    }

    pub fn registers(&self) -> Vec<(u8, Vec<u8>)> {
        self.state.borrow().registers.clone()
    }

    /// (row, time) of every background pixel transfer
    pub fn span_starts(&self) -> Vec<(u16, u64)> {
        self.state.borrow().span_starts.clone()
    }

    pub fn pixels_written(&self) -> u64 {
        self.state.borrow().pixels_written
    }

    /// Bus transactions (begun, ended)
    pub fn transactions(&self) -> (u32, u32) {
        let s = self.state.borrow();
        (s.begun, s.ended)
    }

    pub fn sleeping(&self) -> bool {
        self.state.borrow().sleeping
    }
}

/// Same picture as a native buffer, in user layout
pub fn to_user(native: &[u16], rotation: Rotation) -> Vec<u16> {
    let (w, h) = rotation.user_size();
    let mut out = vec![0u16; w * h];
    for uy in 0..h {
        for ux in 0..w {
            let (x, y) = rotation.user_to_native(ux, uy);
            out[uy * w + ux] = native[y * PANEL_WIDTH + x];
        }
    }
    out
}

pub struct SimBus {
    sim: Sim,
}

impl PanelBus for SimBus {
    fn begin_transaction(&mut self, _clock_hz: u32) {
        self.sim.state.borrow_mut().begun += 1;
    }

    fn end_transaction(&mut self) {
        let mut s = self.sim.state.borrow_mut();
        s.ended += 1;
        let snapshot = s.gram.clone();
        s.snapshots.push(snapshot);
    }

    fn write_command(&mut self, command: u8) {
        let mut s = self.sim.state.borrow_mut();
        s.command = command;
        s.params.clear();
        s.commands.push(command);
        if command == cmd::RAMWR {
            s.cursor = (s.window.0, s.window.2);
        }
    }

    fn write_data16(&mut self, word: u16) {
        let mut s = self.sim.state.borrow_mut();
        s.params.push(word);
        if s.params.len() == 2 {
            let (a, b) = (s.params[0] as usize, s.params[1] as usize);
            match s.command {
                cmd::CASET => {
                    s.window.0 = a;
                    s.window.1 = b;
                }
                cmd::PASET => {
                    s.window.2 = a;
                    s.window.3 = b;
                }
                _ => {}
            }
        }
    }

    fn write_pixels(&mut self, pixels: &[u16]) {
        let mut s = self.sim.state.borrow_mut();
        s.write_pixels(pixels);
        let cost = s.pixel_cost(pixels.len());
        s.now += cost;
    }

    fn start_pixels(&mut self, pixels: &[u16]) {
        let mut s = self.sim.state.borrow_mut();
        assert!(s.bus_done.is_none(), "pixel transfer started while one is in flight");
        let (row, now) = (s.cursor.1 as u16, s.now);
        s.span_starts.push((row, now));
        s.write_pixels(pixels);
        let done = now + s.pixel_cost(pixels.len());
        s.bus_done = Some(done);
    }
}

pub struct SimPanel {
    sim: Sim,
}

impl PanelControl for SimPanel {
    fn init(&mut self) -> Result<(), PanelError> {
        Ok(())
    }

    fn sleep(&mut self, enable: bool) -> Result<(), PanelError> {
        self.sim.state.borrow_mut().sleeping = enable;
        Ok(())
    }

    fn set_rotation(&mut self, _rotation: Rotation) -> Result<(), PanelError> {
        Ok(())
    }

    fn write_register(&mut self, command: u8, data: &[u8]) -> Result<(), PanelError> {
        let mut s = self.sim.state.borrow_mut();
        s.registers.push((command, data.to_vec()));
        if command == FRMCTR1 && data.len() == 2 {
            let mode = (data[1].saturating_sub(0x10) & 0x0F) as u64;
            let div = if data[0] & 1 == 1 { 2 } else { 1 };
            s.period = (s.mode0_period as u64 * (16 + mode) * div / 16) as u32;
        }
        Ok(())
    }

    fn read_register(&mut self, _command: u8, _index: u8) -> Result<u8, PanelError> {
        Ok(0)
    }

    fn read_scanline(&mut self) -> Result<u16, PanelError> {
        let mut s = self.sim.state.borrow_mut();
        s.now += READ_COST_US;
        if s.frozen {
            return Ok(123);
        }
        Ok(s.scanline())
    }
}

pub struct SimRuntime {
    sim: Sim,
}

impl Timebase for SimRuntime {
    fn now_us(&mut self) -> u64 {
        self.sim.state.borrow().now
    }

    fn arm_timer(&mut self, deadline_us: u64) {
        self.sim.state.borrow_mut().timer = Some(deadline_us);
    }

    fn cancel_timer(&mut self) {
        self.sim.state.borrow_mut().timer = None;
    }

    fn delay_us(&mut self, us: u32) {
        self.sim.state.borrow_mut().now += us as u64;
    }
}

impl EventSource for SimRuntime {
    fn poll_event(&mut self, _slot: Slot) -> Option<SchedulerEvent> {
        let mut s = self.sim.state.borrow_mut();
        let (at, event) = match (s.bus_done, s.timer) {
            (Some(b), Some(t)) if t < b => (t, SchedulerEvent::TimerExpired),
            (Some(b), _) => (b, SchedulerEvent::TransferComplete),
            (None, Some(t)) => (t, SchedulerEvent::TimerExpired),
            (None, None) => return None,
        };
        match event {
            SchedulerEvent::TimerExpired => s.timer = None,
            SchedulerEvent::TransferComplete => s.bus_done = None,
        }
        s.now = s.now.max(at);
        Some(event)
    }
}

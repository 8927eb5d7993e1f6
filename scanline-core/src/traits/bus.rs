//! Pixel bus engine

/// Panel command codes used on the pixel path
pub mod cmd {
    pub const NOP: u8 = 0x00;
    pub const SLPIN: u8 = 0x10;
    pub const SLPOUT: u8 = 0x11;
    pub const DISPOFF: u8 = 0x28;
    pub const DISPON: u8 = 0x29;
    /// Column address set
    pub const CASET: u8 = 0x2A;
    /// Page (row) address set
    pub const PASET: u8 = 0x2B;
    /// Memory write
    pub const RAMWR: u8 = 0x2C;
    pub const MADCTL: u8 = 0x36;
    /// Read current scanline
    pub const GSCAN: u8 = 0x45;
}

/// Write side of the panel bus
///
/// Nothing here reports errors: once the panel is initialized, writes are
/// fire-and-forget.
pub trait PanelBus {
    /// Claim the bus at `clock_hz`
    fn begin_transaction(&mut self, clock_hz: u32);

    /// Release the bus
    fn end_transaction(&mut self);

    /// Send a command byte
    fn write_command(&mut self, command: u8);

    /// Send one 16-bit data word, MSB first
    fn write_data16(&mut self, word: u16);

    /// Send pixels, returning once they are on the wire
    fn write_pixels(&mut self, pixels: &[u16]);

    /// Start sending pixels in the background
    ///
    /// Completion is signalled as a `TransferComplete` event for the
    /// driver's slot. The pixels stay untouched until then.
    fn start_pixels(&mut self, pixels: &[u16]);

    /// Address window and memory write for the rectangle
    /// `(x0..=x1) x (y0..=y1)`, in native coordinates
    fn set_window(&mut self, x0: u16, x1: u16, y0: u16, y1: u16) {
        self.write_command(cmd::CASET);
        self.write_data16(x0);
        self.write_data16(x1);
        self.write_command(cmd::PASET);
        self.write_data16(y0);
        self.write_data16(y1);
        self.write_command(cmd::RAMWR);
    }
}

/// Receives the end of a background pixel transfer
pub trait CompletionSink {
    fn transfer_complete(&mut self);
}

impl<F: FnMut()> CompletionSink for F {
    fn transfer_complete(&mut self) {
        self()
    }
}

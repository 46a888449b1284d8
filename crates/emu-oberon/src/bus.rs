//! The Oberon memory map and MMIO dispatch.
//!
//! Address space as seen by the CPU:
//!
//! | range                        | maps to                              |
//! |------------------------------|--------------------------------------|
//! | `[0, display_start)`         | RAM                                  |
//! | `[display_start, mem_size)`  | RAM, framebuffer window (damage)     |
//! | `0xFFFFF800 + 2 KiB`         | boot ROM (fetch only)                |
//! | `0xFFFFFB00 + 1 KiB`         | palette                              |
//! | `0xFFFFFFC0 …`               | device registers                     |
//!
//! Reads of unconfigured devices return 0 (the SPI data register idles at
//! 255); writes to them are dropped. The bus also owns the progress
//! counter: reading the millisecond timer, or polling the keyboard status
//! with an empty scancode queue, spends progress, and `Oberon::run` yields
//! early when it runs out.

use std::collections::VecDeque;

use cpu_risc5::{Bus, ROM_START, ROM_WORDS};

use crate::device::{Clipboard, HostFs, HostTransfer, Led, Serial, Spi};
use crate::hwenum::HwEnum;
use crate::video::VideoState;

/// Base byte address of the device registers.
pub const IO_START: u32 = 0xFFFF_FFC0;

/// Base byte address of the palette.
pub const PALETTE_START: u32 = 0xFFFF_FB00;

/// FPGA-compatible default memory geometry.
pub(crate) const DEFAULT_MEM_SIZE: u32 = 0x0010_0000;
pub(crate) const DEFAULT_DISPLAY_START: u32 = 0x000E_7F00;

/// Scancode queue depth.
const KEY_BUF_LEN: usize = 16;

/// Bytes the debug console buffers before a forced flush.
const DEBUG_BUF_LEN: usize = 512;

pub struct OberonBus {
    pub(crate) ram: Vec<u32>,
    pub(crate) rom: [u32; ROM_WORDS],
    palette: [u32; 256],
    pub(crate) mem_size: u32,
    pub(crate) display_start: u32,

    pub(crate) video: VideoState,
    pub(crate) hwenum: HwEnum,

    /// Busy-wait budget for the current `run` call.
    pub(crate) progress: u32,
    /// Milliseconds since emulator start, provided by the host.
    pub(crate) current_tick: u32,
    /// Packed x/y/buttons mouse register.
    pub(crate) mouse: u32,
    key_buf: VecDeque<u8>,
    pub(crate) switches: u32,

    pub(crate) spi: [Option<Box<dyn Spi>>; 4],
    spi_selected: usize,
    pub(crate) leds: Option<Box<dyn Led>>,
    pub(crate) serial: Option<Box<dyn Serial>>,
    pub(crate) clipboard: Option<Box<dyn Clipboard>>,
    pub(crate) hostfs: Option<Box<dyn HostFs>>,
    pub(crate) hosttransfer: Option<Box<dyn HostTransfer>>,

    /// Advertise the `vRTC` capability.
    pub(crate) rtc_enabled: bool,
    /// Wall-clock snapshot taken at construction, packed for the guest.
    pub(crate) initial_clock: u32,

    debug_buf: Vec<u8>,
}

impl OberonBus {
    pub(crate) fn new(rom: [u32; ROM_WORDS], initial_clock: u32) -> Self {
        Self {
            ram: vec![0; (DEFAULT_MEM_SIZE / 4) as usize],
            rom,
            palette: [0; 256],
            mem_size: DEFAULT_MEM_SIZE,
            display_start: DEFAULT_DISPLAY_START,
            video: VideoState::new(),
            hwenum: HwEnum::new(),
            progress: 0,
            current_tick: 0,
            mouse: 0,
            key_buf: VecDeque::with_capacity(KEY_BUF_LEN),
            switches: 0,
            spi: [None, None, None, None],
            spi_selected: 0,
            leds: None,
            serial: None,
            clipboard: None,
            hostfs: None,
            hosttransfer: None,
            rtc_enabled: false,
            initial_clock,
            debug_buf: Vec::with_capacity(DEBUG_BUF_LEN),
        }
    }

    /// Whole guest RAM as words.
    #[must_use]
    pub fn ram(&self) -> &[u32] {
        &self.ram
    }

    pub fn ram_mut(&mut self) -> &mut [u32] {
        &mut self.ram
    }

    /// The framebuffer window `[display_start, mem_size)`.
    #[must_use]
    pub fn framebuffer(&self) -> &[u32] {
        &self.ram[(self.display_start / 4) as usize..]
    }

    #[must_use]
    pub fn palette(&self) -> &[u32; 256] {
        &self.palette
    }

    #[must_use]
    pub fn display_start(&self) -> u32 {
        self.display_start
    }

    #[must_use]
    pub fn mem_size(&self) -> u32 {
        self.mem_size
    }

    /// Remaining busy-wait budget of the current `run` call.
    #[must_use]
    pub fn progress(&self) -> u32 {
        self.progress
    }

    pub(crate) fn set_palette(&mut self, index: usize, color: u32) {
        self.palette[index] = color;
    }

    /// Queue PS/2 scancodes for the guest. A batch that does not fit is
    /// dropped wholesale.
    pub(crate) fn queue_scancodes(&mut self, scancodes: &[u8]) {
        if KEY_BUF_LEN - self.key_buf.len() >= scancodes.len() {
            self.key_buf.extend(scancodes);
        }
    }

    pub(crate) fn mouse_moved(&mut self, x: i32, y: i32) {
        if (0..4096).contains(&x) {
            self.mouse = (self.mouse & !0x0000_0FFF) | x as u32;
        }
        if (0..4096).contains(&y) {
            self.mouse = (self.mouse & !0x00FF_F000) | ((y as u32) << 12);
        }
    }

    pub(crate) fn mouse_button(&mut self, button: u8, down: bool) {
        if (1..4).contains(&button) {
            let bit = 1u32 << (27 - button);
            if down {
                self.mouse |= bit;
            } else {
                self.mouse &= !bit;
            }
        }
    }

    fn load_io(&mut self, address: u32) -> u32 {
        if (PALETTE_START..PALETTE_START + 0x400).contains(&address) {
            return self.palette[((address - PALETTE_START) / 4) as usize];
        }
        match address.wrapping_sub(IO_START) {
            0 => {
                // Millisecond counter. Polling it spends progress.
                self.progress = self.progress.saturating_sub(1);
                self.current_tick
            }
            4 => self.switches,
            8 => match &mut self.serial {
                Some(serial) => serial.read_data(),
                None => 0,
            },
            12 => match &mut self.serial {
                Some(serial) => serial.read_status(),
                None => 0,
            },
            16 => match &mut self.spi[self.spi_selected] {
                Some(spi) => spi.read_data(),
                None => 255,
            },
            20 => {
                // SPI status: bit 0 = rx ready, always.
                1
            }
            24 => {
                // Mouse word; bit 28 doubles as keyboard-ready. An empty
                // queue counts as busy-waiting.
                let mut mouse = self.mouse;
                if self.key_buf.is_empty() {
                    self.progress = self.progress.saturating_sub(1);
                } else {
                    mouse |= 0x1000_0000;
                }
                mouse
            }
            28 => match self.key_buf.pop_front() {
                Some(scancode) => u32::from(scancode),
                None => 0,
            },
            40 => match &mut self.clipboard {
                Some(clipboard) => clipboard.read_control(),
                None => 0,
            },
            44 => match &mut self.clipboard {
                Some(clipboard) => clipboard.read_data(),
                None => 0,
            },
            48 => self.video.current.index,
            60 => self.hwenum.read_next(),
            _ => 0,
        }
    }

    fn store_io(&mut self, address: u32, value: u32) {
        if (PALETTE_START..PALETTE_START + 0x400).contains(&address) {
            self.palette[((address - PALETTE_START) / 4) as usize] = value;
            self.video.full_damage();
            return;
        }
        match address.wrapping_sub(IO_START) {
            4 => {
                if let Some(leds) = &mut self.leds {
                    leds.write(value);
                }
            }
            8 => {
                if let Some(serial) = &mut self.serial {
                    serial.write_data(value);
                }
            }
            16 => {
                if let Some(spi) = &mut self.spi[self.spi_selected] {
                    spi.write_data(value);
                }
            }
            20 => {
                // Bits 0-1 slave select; bit 2 (fast) and bit 3 (network
                // enable) have no effect here.
                self.spi_selected = (value & 3) as usize;
            }
            32 => {
                if let Some(hostfs) = &mut self.hostfs {
                    hostfs.write(value, &mut self.ram);
                }
                if let Some(hosttransfer) = &mut self.hosttransfer {
                    hosttransfer.write(value, &mut self.ram);
                }
            }
            36 => {
                if let Some(spi) = &mut self.spi[1] {
                    if spi.has_paravirtual() {
                        spi.paravirtual_write(value, &mut self.ram);
                    }
                }
            }
            40 => {
                if let Some(clipboard) = &mut self.clipboard {
                    clipboard.write_control(value);
                }
            }
            44 => {
                if let Some(clipboard) = &mut self.clipboard {
                    clipboard.write_data(value);
                }
            }
            48 => self.video.switch_mode(value),
            52 => self.debug_putc(value),
            60 => self.hwenum_query(value),
            _ => {}
        }
    }

    /// Debug console: bytes accumulate until a NUL (or a full buffer)
    /// flushes the line to stdout. Carriage returns become newlines.
    fn debug_putc(&mut self, value: u32) {
        if value == 0 || self.debug_buf.len() == DEBUG_BUF_LEN - 1 {
            print!("{}", String::from_utf8_lossy(&self.debug_buf));
            self.debug_buf.clear();
        }
        if value != 0 {
            let byte = if value == u32::from(b'\r') {
                b'\n'
            } else {
                value as u8
            };
            self.debug_buf.push(byte);
        }
    }
}

impl Bus for OberonBus {
    fn fetch(&mut self, pc: u32) -> Option<u32> {
        if pc < self.mem_size / 4 {
            Some(self.ram[pc as usize])
        } else if (ROM_START / 4..ROM_START / 4 + ROM_WORDS as u32).contains(&pc) {
            Some(self.rom[(pc - ROM_START / 4) as usize])
        } else {
            None
        }
    }

    fn load_word(&mut self, address: u32) -> u32 {
        if address < self.mem_size {
            self.ram[(address / 4) as usize]
        } else {
            self.load_io(address)
        }
    }

    fn load_byte(&mut self, address: u32) -> u8 {
        (self.load_word(address) >> (address % 4 * 8)) as u8
    }

    fn store_word(&mut self, address: u32, value: u32) {
        if address < self.display_start {
            self.ram[(address / 4) as usize] = value;
        } else if address < self.mem_size {
            self.ram[(address / 4) as usize] = value;
            self.video
                .update_damage(address / 4 - self.display_start / 4);
        } else {
            self.store_io(address, value);
        }
    }

    fn store_byte(&mut self, address: u32, value: u8) {
        if address < self.mem_size {
            let word = self.load_word(address);
            let shift = (address & 3) * 8;
            let patched = (word & !(0xFF << shift)) | (u32::from(value) << shift);
            self.store_word(address, patched);
        } else {
            self.store_io(address, u32::from(value));
        }
    }
}

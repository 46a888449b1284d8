//! Top-level Oberon workstation.
//!
//! One [`Oberon`] owns the CPU and the bus. The host drives it frame by
//! frame:
//!
//! 1. feed input events (`mouse_moved`, `mouse_button`, `keyboard_input`),
//! 2. publish the millisecond tick (`set_time`),
//! 3. execute a slice of instructions (`run`),
//! 4. repaint from the framebuffer guided by `take_damage`,
//! 5. optionally raise the frame interrupt (`trigger_interrupt`).
//!
//! `run` returns early when the guest is found spinning on the timer or an
//! empty keyboard queue, so an idle system costs almost nothing.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use chrono::{Datelike, Timelike};
use cpu_risc5::Risc5;

use crate::bootrom;
use crate::bus::OberonBus;
use crate::device::{Clipboard, HostFs, HostTransfer, Led, Serial, Spi};
use crate::video::{Damage, DisplayMode};

/// Nominal CPU clock of the FPGA system.
pub const CPU_HZ: u32 = 25_000_000;

/// Display refresh rate the drivers pace against.
pub const FPS: u32 = 60;

/// First 16 palette entries after `configure_memory` with a color mode.
const DEFAULT_PALETTE: [u32; 16] = [
    0xFFFFFF, 0xFF0000, 0x00FF00, 0x0000FF, 0xFF00FF, 0xFFFF00, 0x00FFFF, 0xAA0000,
    0x009A00, 0x00009A, 0x0ACBF3, 0x008282, 0x8A8A8A, 0xBEBEBE, 0xDFDFDF, 0x000000,
];

/// The machine.
pub struct Oberon {
    cpu: Risc5,
    bus: OberonBus,
}

impl Oberon {
    /// A machine in the FPGA-compatible default configuration: 1 MiB of
    /// RAM with a 1024×768 monochrome framebuffer near the top.
    #[must_use]
    pub fn new() -> Self {
        let now = chrono::Local::now();
        let clock = ((now.year() as u32 % 100) * 16 + now.month()) * 32 + now.day();
        let clock = ((clock * 32 + now.hour()) * 64 + now.minute()) * 64 + now.second();

        Self {
            cpu: Risc5::new(),
            bus: OberonBus::new(bootrom::boot_rom(), clock),
        }
    }

    /// Reconfigure RAM size and display modes. RAM is reallocated (and
    /// cleared), the boot ROM is patched with the new memory limit and
    /// stack origin, and the machine resets.
    ///
    /// # Panics
    ///
    /// Panics if `modes` is empty.
    pub fn configure_memory(&mut self, megabytes_ram: i32, modes: &[DisplayMode], dynsize: bool) {
        assert!(!modes.is_empty(), "at least one display mode is required");
        let megabytes = megabytes_ram.clamp(1, 64) as u32;

        self.bus.display_start = megabytes << 20;
        let mut framebuffer_size = if dynsize { 2048 * 2048 } else { 0 };
        let mut max_depth = 1;
        for mode in modes {
            framebuffer_size = framebuffer_size.max(mode.width * mode.height / (8 / mode.depth));
            max_depth = max_depth.max(mode.depth);
        }
        self.bus.mem_size = self.bus.display_start + framebuffer_size;

        if max_depth > 1 {
            for (i, &color) in DEFAULT_PALETTE.iter().enumerate() {
                self.bus.set_palette(i, color);
            }
            if max_depth == 8 {
                // Grey ramp, then the 6x6x6 color cube.
                for i in 16..40 {
                    self.bus.set_palette(i, (i as u32 - 15) * 10 * 0x01_0101);
                }
                let mut pos = 40;
                for r in 0..6 {
                    for g in 0..6 {
                        for b in 0..6 {
                            self.bus
                                .set_palette(pos, r * 0x33_0000 + g * 0x3300 + b * 0x33);
                            pos += 1;
                        }
                    }
                }
            }
        }

        self.bus.video.set_modes(modes.to_vec(), dynsize);
        self.bus.ram = vec![0; (self.bus.mem_size / 4) as usize];

        // Patch the boot loader's memory constants.
        let mem_lim = self.bus.display_start - 16;
        self.bus.rom[372] = 0x6100_0000 + (mem_lim >> 16);
        self.bus.rom[373] = 0x4116_0000 + (mem_lim & 0x0000_FFFF);
        let stack_org = self.bus.display_start / 2;
        self.bus.rom[376] = 0x6100_0000 + (stack_org >> 16);

        self.reset();
    }

    /// Soft reset: the CPU restarts at the boot ROM. RAM, palette and
    /// devices keep their state.
    pub fn reset(&mut self) {
        self.cpu.reset();
    }

    /// Raise the frame interrupt; the CPU takes it at the top of its next
    /// step (if enabled and not already handling one).
    pub fn trigger_interrupt(&mut self) {
        self.cpu.trigger_interrupt();
    }

    /// Execute up to `cycles` instructions. Returns early when the guest
    /// has spent its busy-wait budget polling the timer or an empty
    /// keyboard queue.
    pub fn run(&mut self, cycles: u32) {
        self.bus.progress = 20;
        let mut executed = 0;
        while executed < cycles && self.bus.progress > 0 {
            self.cpu.step(&mut self.bus);
            executed += 1;
        }
    }

    /// Publish the host's millisecond tick (read by the guest at MMIO 0).
    pub fn set_time(&mut self, tick: u32) {
        self.bus.current_tick = tick;
    }

    pub fn mouse_moved(&mut self, x: i32, y: i32) {
        self.bus.mouse_moved(x, y);
    }

    /// Buttons are numbered 1 (left) to 3 (right).
    pub fn mouse_button(&mut self, button: u8, down: bool) {
        self.bus.mouse_button(button, down);
    }

    /// Queue PS/2 scancodes; a batch that would overflow the 16-byte
    /// queue is dropped.
    pub fn keyboard_input(&mut self, scancodes: &[u8]) {
        self.bus.queue_scancodes(scancodes);
    }

    /// Tell the guest how big the host window is; consumed by seamless
    /// display-mode switches.
    pub fn size_hint(&mut self, width: u32, height: u32) {
        self.bus.video.size_hint(width, height);
    }

    // --- Device slots -----------------------------------------------------

    pub fn set_leds(&mut self, leds: Box<dyn Led>) {
        self.bus.leds = Some(leds);
    }

    pub fn set_serial(&mut self, serial: Box<dyn Serial>) {
        self.bus.serial = Some(serial);
    }

    /// Attach an SPI device. Only slots 1 (disk) and 2 (network) exist on
    /// the board; other indices are ignored.
    pub fn set_spi(&mut self, index: usize, spi: Box<dyn Spi>) {
        if index == 1 || index == 2 {
            self.bus.spi[index] = Some(spi);
        }
    }

    pub fn set_clipboard(&mut self, clipboard: Box<dyn Clipboard>) {
        self.bus.clipboard = Some(clipboard);
    }

    pub fn set_host_fs(&mut self, hostfs: Box<dyn HostFs>) {
        self.bus.hostfs = Some(hostfs);
    }

    pub fn set_host_transfer(&mut self, hosttransfer: Box<dyn HostTransfer>) {
        self.bus.hosttransfer = Some(hosttransfer);
    }

    pub fn set_switches(&mut self, switches: u32) {
        self.bus.switches = switches;
    }

    /// Advertise the real-time-clock capability to the guest.
    pub fn set_rtc(&mut self, enabled: bool) {
        self.bus.rtc_enabled = enabled;
    }

    // --- Host repaint surface ---------------------------------------------

    /// The framebuffer window of RAM.
    #[must_use]
    pub fn framebuffer(&self) -> &[u32] {
        self.bus.framebuffer()
    }

    #[must_use]
    pub fn palette(&self) -> &[u32; 256] {
        self.bus.palette()
    }

    /// Current display mode and whether it tracks the host window size.
    #[must_use]
    pub fn display_mode(&self) -> (DisplayMode, bool) {
        (self.bus.video.current, self.bus.video.seamless)
    }

    /// Damage accumulated since the last call; resets to clean.
    pub fn take_damage(&mut self) -> Damage {
        self.bus.video.take_damage()
    }

    // --- Introspection ----------------------------------------------------

    #[must_use]
    pub fn cpu(&self) -> &Risc5 {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Risc5 {
        &mut self.cpu
    }

    #[must_use]
    pub fn bus(&self) -> &OberonBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut OberonBus {
        &mut self.bus
    }
}

impl Default for Oberon {
    fn default() -> Self {
        Self::new()
    }
}

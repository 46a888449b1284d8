//! Project Oberon workstation emulator binary.
//!
//! Drives an [`Oberon`] machine in a winit window with a pixels
//! framebuffer: 60 frames per second, a 25 MHz instruction budget per
//! frame, a synthetic interrupt at each frame end, and damage-rectangle
//! repaints in between.
//!
//! Driver hotkeys: F12 resets the machine, F11 (or Alt+Enter) toggles
//! fullscreen, Alt+F4 quits, and the left Alt key doubles as the middle
//! mouse button (Oberon wants three of them).

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]

use std::path::PathBuf;
use std::process;
use std::time::{Duration, Instant};

use emu_oberon::device::{HostTransfer, Led};
use emu_oberon::serial::FileSerial;
use emu_oberon::{
    keymap, Disk, DisplayMode, HostDir, Oberon, CPU_HZ, FPS, FRAMEBUFFER_HEIGHT,
    FRAMEBUFFER_WIDTH,
};
use pixels::{Pixels, SurfaceTexture};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Fullscreen, Window, WindowAttributes, WindowId};

/// Screen colors for 1-bit modes (the classic paper-white theme).
const BLACK: u32 = 0x0065_7B83;
const WHITE: u32 = 0x00FD_F6E3;

const FRAME_DURATION: Duration = Duration::from_micros(1_000_000 / FPS as u64);

// ---------------------------------------------------------------------------
// CLI argument parsing
// ---------------------------------------------------------------------------

struct CliArgs {
    fullscreen: bool,
    mem: i32,
    rtc: bool,
    modes: Vec<DisplayMode>,
    dynsize: bool,
    hostfs: Option<PathBuf>,
    hosttransfer: bool,
    leds: bool,
    boot_from_serial: bool,
    serial_in: Option<PathBuf>,
    serial_out: Option<PathBuf>,
    disk_image: Option<PathBuf>,
}

fn usage() -> ! {
    eprintln!("Usage: emu-oberon [OPTIONS...] DISK-IMAGE");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --fullscreen          Start the emulator in full screen mode");
    eprintln!("  --mem MEGS            Set memory size");
    eprintln!("  --size WIDTHxHEIGHT[xDEPTH][,...]");
    eprintln!("                        Set framebuffer size or multiple resolutions.");
    eprintln!("                        DEPTH has to be 1, 4 or 8, and multiple modes'");
    eprintln!("                        depths must be in ascending order.");
    eprintln!("  --dynsize             Allow dynamic screen resize from guest");
    eprintln!("  --rtc                 Advertise the real-time clock to the guest");
    eprintln!("  --leds                Log LED state on stdout");
    eprintln!("  --boot-from-serial    Boot from serial line (disk image not required)");
    eprintln!("  --serial-in FILE      Read serial input from FILE");
    eprintln!("  --serial-out FILE     Write serial output to FILE");
    eprintln!("  --hostfs DIRECTORY    Use DIRECTORY as HostFS directory");
    eprintln!("  --hosttransfer        Enable the host transfer bridge");
    process::exit(1);
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        fullscreen: false,
        mem: 0,
        rtc: false,
        modes: Vec::new(),
        dynsize: false,
        hostfs: None,
        hosttransfer: false,
        leds: false,
        boot_from_serial: false,
        serial_in: None,
        serial_out: None,
        disk_image: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--fullscreen" => cli.fullscreen = true,
            "--mem" => {
                i += 1;
                match args.get(i).and_then(|s| s.parse().ok()) {
                    Some(megs) => cli.mem = megs,
                    None => usage(),
                }
            }
            "--size" => {
                i += 1;
                match args.get(i).and_then(|s| parse_modes(s)) {
                    Some(modes) => cli.modes = modes,
                    None => usage(),
                }
            }
            "--dynsize" => cli.dynsize = true,
            "--rtc" => cli.rtc = true,
            "--leds" => cli.leds = true,
            "--boot-from-serial" => cli.boot_from_serial = true,
            "--serial-in" => {
                i += 1;
                cli.serial_in = args.get(i).map(PathBuf::from);
            }
            "--serial-out" => {
                i += 1;
                cli.serial_out = args.get(i).map(PathBuf::from);
            }
            "--hostfs" => {
                i += 1;
                match args.get(i) {
                    Some(dir) => cli.hostfs = Some(PathBuf::from(dir)),
                    None => usage(),
                }
            }
            "--hosttransfer" => cli.hosttransfer = true,
            "--help" | "-h" => usage(),
            other if other.starts_with('-') => usage(),
            other => {
                if cli.disk_image.is_some() {
                    usage();
                }
                cli.disk_image = Some(PathBuf::from(other));
            }
        }
        i += 1;
    }

    if cli.disk_image.is_none() && !cli.boot_from_serial {
        usage();
    }
    cli
}

/// Parse `WxH[xD]` entries separated by commas. Widths snap down to a
/// multiple of 32; depths must be 1, 4 or 8 in ascending order.
fn parse_modes(arg: &str) -> Option<Vec<DisplayMode>> {
    let mut modes = Vec::new();
    let mut last_depth = 1;
    for part in arg.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let fields: Vec<&str> = part.split('x').collect();
        if fields.len() < 2 || fields.len() > 3 {
            return None;
        }
        let width: u32 = fields[0].parse().ok()?;
        let height: u32 = fields[1].parse().ok()?;
        let depth: u32 = match fields.get(2) {
            Some(s) => s.parse().ok()?,
            None => 1,
        };
        if depth < last_depth || !matches!(depth, 1 | 4 | 8) {
            return None;
        }
        modes.push(DisplayMode {
            index: modes.len() as u32,
            width: width.clamp(32, 2048) & !31,
            height: height.clamp(32, 2048),
            depth,
        });
        last_depth = depth;
    }
    if modes.is_empty() {
        None
    } else {
        Some(modes)
    }
}

// ---------------------------------------------------------------------------
// Host-side devices
// ---------------------------------------------------------------------------

/// `--leds`: print the LED bank like a row of lamps, lit digits and dashes.
struct ConsoleLeds;

impl Led for ConsoleLeds {
    fn write(&mut self, value: u32) {
        let mut line = String::from("LEDs: ");
        for i in (0..8).rev() {
            if value & (1 << i) != 0 {
                line.push(char::from(b'0' + i));
            } else {
                line.push('-');
            }
        }
        println!("{line}");
    }
}

/// `--hosttransfer`: advertises the capability and accepts command blocks.
// TODO: implement the transfer command protocol; for now only the
// capability (and the MMIO dispatch path) is exercised.
struct HostTransferStub;

impl HostTransfer for HostTransferStub {
    fn write(&mut self, _cmd_addr: u32, _ram: &mut [u32]) {}
}

fn make_machine(cli: &CliArgs) -> Oberon {
    let mut machine = Oberon::new();
    machine.set_rtc(cli.rtc);
    if cli.leds {
        machine.set_leds(Box::new(ConsoleLeds));
    }

    if cli.mem != 0 || !cli.modes.is_empty() || cli.dynsize {
        let modes = if cli.modes.is_empty() {
            vec![DisplayMode {
                index: 0,
                width: FRAMEBUFFER_WIDTH,
                height: FRAMEBUFFER_HEIGHT,
                depth: 1,
            }]
        } else {
            cli.modes.clone()
        };
        machine.configure_memory(cli.mem, &modes, cli.dynsize);
        if cli.dynsize {
            machine.size_hint(modes[0].width, modes[0].height);
        }
    }

    if cli.boot_from_serial {
        machine.set_switches(1);
    }

    match Disk::open(cli.disk_image.as_deref()) {
        Ok(disk) => machine.set_spi(1, Box::new(disk)),
        Err(e) => {
            let name = cli.disk_image.clone().unwrap_or_default();
            eprintln!("Can't open file \"{}\": {e}", name.display());
            process::exit(1);
        }
    }

    if cli.serial_in.is_some() || cli.serial_out.is_some() {
        match FileSerial::open(cli.serial_in.as_deref(), cli.serial_out.as_deref()) {
            Ok(serial) => machine.set_serial(Box::new(serial)),
            Err(e) => {
                eprintln!("Can't open serial file: {e}");
                process::exit(1);
            }
        }
    }

    if let Some(dir) = &cli.hostfs {
        match HostDir::open(dir) {
            Ok(hostfs) => machine.set_host_fs(Box::new(hostfs)),
            Err(e) => {
                eprintln!("Can't open directory \"{}\": {e}", dir.display());
                process::exit(1);
            }
        }
    }

    if cli.hosttransfer {
        machine.set_host_transfer(Box::new(HostTransferStub));
    }

    machine
}

// ---------------------------------------------------------------------------
// Windowed driver (winit + pixels)
// ---------------------------------------------------------------------------

struct App {
    machine: Oberon,
    window: Option<&'static Window>,
    pixels: Option<Pixels<'static>>,
    start: Instant,
    last_frame: Instant,
    mode: DisplayMode,
    fullscreen: bool,
    dynsize: bool,
    resizable: bool,
    alt_down: bool,
}

impl App {
    fn new(machine: Oberon, fullscreen: bool, dynsize: bool) -> Self {
        let (mode, _) = machine.display_mode();
        Self {
            machine,
            window: None,
            pixels: None,
            start: Instant::now(),
            last_frame: Instant::now(),
            mode,
            fullscreen,
            dynsize,
            resizable: false,
            alt_down: false,
        }
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, keycode: KeyCode, pressed: bool) {
        match keycode {
            KeyCode::AltLeft => {
                // Left Alt stands in for the middle mouse button.
                self.alt_down = pressed;
                self.machine.mouse_button(2, pressed);
            }
            KeyCode::AltRight => self.alt_down = pressed,
            KeyCode::F12 if pressed => self.machine.reset(),
            KeyCode::F11 if pressed => self.toggle_fullscreen(),
            KeyCode::Enter if pressed && self.alt_down => self.toggle_fullscreen(),
            KeyCode::F4 if pressed && self.alt_down => event_loop.exit(),
            _ => {
                if let Some(bytes) = keymap::encode(keycode, pressed) {
                    self.machine.keyboard_input(&bytes);
                }
            }
        }
    }

    fn toggle_fullscreen(&mut self) {
        let Some(window) = self.window else {
            return;
        };
        self.fullscreen = !self.fullscreen;
        if self.fullscreen {
            window.set_fullscreen(Some(Fullscreen::Borderless(None)));
        } else {
            window.set_fullscreen(None);
        }
    }

    /// Run one frame's worth of guest time.
    fn run_frame(&mut self) {
        self.machine
            .set_time(self.start.elapsed().as_millis() as u32);
        self.machine.run(CPU_HZ / FPS);
        self.machine.trigger_interrupt();
    }

    /// React to a guest-side display-mode switch.
    fn sync_display_mode(&mut self, seamless: bool) {
        let (mode, _) = self.machine.display_mode();
        if mode != self.mode {
            if (mode.width, mode.height) != (self.mode.width, self.mode.height) {
                if let Some(pixels) = self.pixels.as_mut() {
                    if let Err(e) = pixels.resize_buffer(mode.width, mode.height) {
                        eprintln!("Failed to resize framebuffer: {e}");
                        return;
                    }
                }
                if let Some(window) = self.window {
                    let _ = window.request_inner_size(LogicalSize::new(mode.width, mode.height));
                }
            }
            self.mode = mode;
        }
        if seamless && !self.resizable {
            if let Some(window) = self.window {
                window.set_resizable(true);
                self.resizable = true;
            }
        }
    }

    /// Expand the damaged framebuffer region into the RGBA surface.
    /// Guest scanline 0 is the bottom of the screen.
    fn update_pixels(&mut self) {
        let damage = self.machine.take_damage();
        if damage.is_clean() {
            return;
        }
        let Some(pixels) = self.pixels.as_mut() else {
            return;
        };
        let mode = self.mode;
        let fb = self.machine.framebuffer();
        let palette = self.machine.palette();
        let frame = pixels.frame_mut();

        let span = mode.span() as usize;
        let width = mode.width as usize;
        let pixels_per_word = (32 / mode.depth) as usize;
        for row in damage.y1..=damage.y2 {
            let line_start = row as usize * span;
            let out_row = (mode.height - 1 - row) as usize;
            for col in damage.x1 as usize..=damage.x2 as usize {
                let mut word = fb[line_start + col];
                let base = out_row * width + col * pixels_per_word;
                for px in 0..pixels_per_word {
                    let color = match mode.depth {
                        1 => {
                            if word & 1 != 0 {
                                WHITE
                            } else {
                                BLACK
                            }
                        }
                        4 => palette[(word & 0xF) as usize],
                        _ => palette[(word & 0xFF) as usize],
                    };
                    word >>= mode.depth;
                    let idx = (base + px) * 4;
                    frame[idx] = (color >> 16) as u8;
                    frame[idx + 1] = (color >> 8) as u8;
                    frame[idx + 2] = color as u8;
                    frame[idx + 3] = 0xFF;
                }
            }
        }
    }

    fn mouse_moved(&mut self, x: f32, y: f32) {
        let Some(pixels) = self.pixels.as_ref() else {
            return;
        };
        let (px, py) = pixels
            .window_pos_to_pixel((x, y))
            .unwrap_or_else(|pos| pixels.clamp_pixel_pos(pos));
        // Guest y runs bottom-up.
        let flipped = self.mode.height as i32 - 1 - py as i32;
        self.machine.mouse_moved(px as i32, flipped);
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let size = LogicalSize::new(self.mode.width, self.mode.height);
        let mut attrs = WindowAttributes::default()
            .with_title("Project Oberon")
            .with_inner_size(size)
            .with_resizable(false);
        if self.fullscreen {
            attrs = attrs.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }

        match event_loop.create_window(attrs) {
            Ok(window) => {
                // Leak the window for a 'static borrow; it lives until
                // process exit anyway.
                let window: &'static Window = Box::leak(Box::new(window));
                let inner = window.inner_size();
                let surface = SurfaceTexture::new(inner.width, inner.height, window);
                match Pixels::new(self.mode.width, self.mode.height, surface) {
                    Ok(pixels) => self.pixels = Some(pixels),
                    Err(e) => {
                        eprintln!("Failed to create pixel surface: {e}");
                        event_loop.exit();
                        return;
                    }
                }
                self.window = Some(window);
                // First frame paints everything.
                self.machine.size_hint(inner.width, inner.height);
            }
            Err(e) => {
                eprintln!("Failed to create window: {e}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if size.width == 0 || size.height == 0 {
                    return; // minimized
                }
                if let Some(pixels) = self.pixels.as_mut() {
                    if let Err(e) = pixels.resize_surface(size.width, size.height) {
                        eprintln!("Failed to resize surface: {e}");
                        event_loop.exit();
                        return;
                    }
                }
                if self.dynsize {
                    self.machine.size_hint(size.width, size.height);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(keycode) = event.physical_key {
                    self.handle_key(event_loop, keycode, event.state == ElementState::Pressed);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.mouse_moved(position.x as f32, position.y as f32);
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let button = match button {
                    MouseButton::Left => 1,
                    MouseButton::Middle => 2,
                    MouseButton::Right => 3,
                    _ => return,
                };
                self.machine
                    .mouse_button(button, state == ElementState::Pressed);
            }
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                if now.duration_since(self.last_frame) >= FRAME_DURATION {
                    self.last_frame = now;
                    self.run_frame();
                    let (_, seamless) = self.machine.display_mode();
                    self.sync_display_mode(seamless);
                    self.update_pixels();
                }
                if let Some(pixels) = self.pixels.as_ref() {
                    if let Err(e) = pixels.render() {
                        eprintln!("Render error: {e}");
                        event_loop.exit();
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window {
            window.request_redraw();
        }
    }
}

fn main() {
    let cli = parse_args();
    let machine = make_machine(&cli);

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            eprintln!("Failed to create event loop: {e}");
            process::exit(1);
        }
    };

    let mut app = App::new(machine, cli.fullscreen, cli.dynsize);
    if let Err(e) = event_loop.run_app(&mut app) {
        eprintln!("Event loop error: {e}");
        process::exit(1);
    }
}

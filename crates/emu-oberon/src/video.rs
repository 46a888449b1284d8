//! Display modes and framebuffer damage tracking.
//!
//! The guest draws into a framebuffer window at the top of RAM; the host
//! repaints from it once per frame. To keep that cheap, every store into
//! the window widens a damage rectangle, which the driver fetches (and
//! thereby resets) before each repaint.
//!
//! Damage units are *word columns* by *pixel rows*: one word holds 32, 8 or
//! 4 pixels depending on depth, and a scanline is `width / (32 / depth)`
//! words (the mode span).

/// Default framebuffer geometry, matching the FPGA system.
pub const FRAMEBUFFER_WIDTH: u32 = 1024;
pub const FRAMEBUFFER_HEIGHT: u32 = 768;

/// One display mode. `index` is what the guest reads back from the mode
/// register; for dynamic modes it is the packed switch value itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayMode {
    pub index: u32,
    pub width: u32,
    pub height: u32,
    /// Bits per pixel: 1, 4 or 8.
    pub depth: u32,
}

impl DisplayMode {
    /// Words per scanline.
    #[must_use]
    pub fn span(&self) -> u32 {
        self.width / (32 / self.depth)
    }
}

/// Damage rectangle in word-column × pixel-row units, inclusive on all
/// sides. `x1 > x2` is the clean sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Damage {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl Damage {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.x1 > self.x2
    }
}

/// Mode table, current mode and damage state.
pub(crate) struct VideoState {
    /// Configured static modes.
    modes: Vec<DisplayMode>,
    /// Static mode counts per depth (1, 4, 8), for the hardware enumerator.
    pub(crate) modes_by_depth: [u32; 3],
    /// The mode the guest currently drives.
    pub(crate) current: DisplayMode,
    /// Words per scanline of the current mode.
    pub(crate) span: u32,
    /// Dynamic resize allowed.
    pub(crate) dynsize: bool,
    /// Guest adopted the host's size hint.
    pub(crate) seamless: bool,
    /// Host window size hint, consumed by seamless switches.
    size_hint: (u32, u32),
    damage: Damage,
}

impl VideoState {
    pub(crate) fn new() -> Self {
        let mode = DisplayMode {
            index: 0,
            width: FRAMEBUFFER_WIDTH,
            height: FRAMEBUFFER_HEIGHT,
            depth: 1,
        };
        let mut video = Self {
            modes: vec![mode],
            modes_by_depth: [0; 3],
            current: mode,
            span: mode.span(),
            dynsize: false,
            seamless: false,
            size_hint: (0, 0),
            damage: Damage {
                x1: 0,
                y1: 0,
                x2: 0,
                y2: 0,
            },
        };
        video.full_damage();
        video
    }

    /// Install a new mode table (from `configure_memory`). The first entry
    /// becomes current.
    pub(crate) fn set_modes(&mut self, modes: Vec<DisplayMode>, dynsize: bool) {
        self.modes_by_depth = [0; 3];
        for mode in &modes {
            match mode.depth {
                1 => self.modes_by_depth[0] += 1,
                4 => self.modes_by_depth[1] += 1,
                8 => self.modes_by_depth[2] += 1,
                _ => {}
            }
        }
        self.current = modes[0];
        self.span = self.current.span();
        self.modes = modes;
        self.dynsize = dynsize;
        self.seamless = false;
        self.full_damage();
    }

    pub(crate) fn modes(&self) -> &[DisplayMode] {
        &self.modes
    }

    pub(crate) fn size_hint(&mut self, width: u32, height: u32) {
        if self.dynsize {
            self.size_hint = (width, height);
        }
    }

    /// Handle a write to the mode-switch register.
    ///
    /// A value matching a configured mode index switches statically.
    /// Otherwise, with dynamic sizing enabled, the value decodes as
    /// `mode << 30 | width << 15 | height` (mode 1 = 1 bpp, 2 = 8 bpp,
    /// 3 = 4 bpp); a zero size means "seamless": adopt the host's hint,
    /// width rounded down to a multiple of 32, both axes clamped.
    pub(crate) fn switch_mode(&mut self, mut value: u32) {
        for mode in &self.modes {
            if mode.index == value {
                self.current = *mode;
                self.span = mode.span();
                self.seamless = false;
                self.full_damage();
                return;
            }
        }
        self.seamless = false;
        if !self.dynsize {
            return;
        }

        let mode = value >> 30;
        let mut width = (value >> 15) & 0x7FFF;
        let mut height = value & 0x7FFF;
        if width == 0 && height == 0 {
            self.seamless = true;
            width = (self.size_hint.0 / 32 * 32).clamp(64, 2048);
            height = self.size_hint.1.clamp(64, 2048);
            value = (mode << 30) | (width << 15) | height;
        }
        if width <= 2048 && width % 32 == 0 && height <= 2045 && (1..=3).contains(&mode) {
            let depth = match mode {
                1 => 1,
                2 => 8,
                _ => 4,
            };
            self.current = DisplayMode {
                index: value,
                width,
                height,
                depth,
            };
            self.span = self.current.span();
            self.full_damage();
        }
    }

    /// Note a store to framebuffer word `w` (relative to the window base).
    pub(crate) fn update_damage(&mut self, w: u32) {
        let row = w / self.span;
        let col = w % self.span;
        if row < self.current.height {
            if col < self.damage.x1 {
                self.damage.x1 = col;
            }
            if col > self.damage.x2 {
                self.damage.x2 = col;
            }
            if row < self.damage.y1 {
                self.damage.y1 = row;
            }
            if row > self.damage.y2 {
                self.damage.y2 = row;
            }
        }
    }

    /// Mark the whole viewport dirty.
    pub(crate) fn full_damage(&mut self) {
        self.damage = Damage {
            x1: 0,
            y1: 0,
            x2: self.span - 1,
            y2: self.current.height - 1,
        };
    }

    /// Return the accumulated damage and reset to the clean sentinel.
    pub(crate) fn take_damage(&mut self) -> Damage {
        let damage = self.damage;
        self.damage = Damage {
            x1: self.span,
            y1: self.current.height,
            x2: 0,
            y2: 0,
        };
        damage
    }
}

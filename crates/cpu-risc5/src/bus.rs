//! Memory bus interface.
//!
//! RISC-5 is a word machine: the program counter is a word index and every
//! fetch moves 32 bits. Data accesses use byte addresses; byte loads and
//! stores are resolved by the bus (the hardware reads the containing word
//! and extracts or patches one byte).

/// Memory and I/O access as seen from the CPU.
///
/// The bus decides what lives where: RAM, boot ROM, framebuffer, palette,
/// device registers. The CPU only distinguishes "fetch", "load" and "store".
pub trait Bus {
    /// Fetch the instruction word at word address `pc`.
    ///
    /// Returns `None` if `pc` maps to neither RAM nor ROM; the CPU treats
    /// that as a branch into the void and soft-resets.
    fn fetch(&mut self, pc: u32) -> Option<u32>;

    /// Load the word containing byte address `address`.
    fn load_word(&mut self, address: u32) -> u32;

    /// Load one byte from byte address `address`.
    fn load_byte(&mut self, address: u32) -> u8;

    /// Store a word at byte address `address`.
    fn store_word(&mut self, address: u32, value: u32);

    /// Store one byte at byte address `address`.
    fn store_byte(&mut self, address: u32, value: u8);
}

/// A flat 64 KiB-word RAM starting at address 0, for tests.
///
/// No ROM, no I/O: fetches beyond the array return `None`.
pub struct SimpleBus {
    /// Backing words, index = byte address / 4.
    pub ram: Vec<u32>,
}

impl SimpleBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ram: vec![0; 0x10000],
        }
    }

    /// Place instruction words starting at word address `pc`.
    pub fn load(&mut self, pc: u32, words: &[u32]) {
        let start = pc as usize;
        self.ram[start..start + words.len()].copy_from_slice(words);
    }
}

impl Default for SimpleBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for SimpleBus {
    fn fetch(&mut self, pc: u32) -> Option<u32> {
        self.ram.get(pc as usize).copied()
    }

    fn load_word(&mut self, address: u32) -> u32 {
        self.ram
            .get(address as usize / 4)
            .copied()
            .unwrap_or(0)
    }

    fn load_byte(&mut self, address: u32) -> u8 {
        (self.load_word(address) >> (address % 4 * 8)) as u8
    }

    fn store_word(&mut self, address: u32, value: u32) {
        let idx = address as usize / 4;
        if idx < self.ram.len() {
            self.ram[idx] = value;
        }
    }

    fn store_byte(&mut self, address: u32, value: u8) {
        let word = self.load_word(address);
        let shift = (address & 3) * 8;
        let patched = (word & !(0xFF << shift)) | (u32::from(value) << shift);
        self.store_word(address, patched);
    }
}

//! The embedded boot ROM image.
//!
//! 512 little-endian words mapped read-only at `ROM_START`. The image
//! shipped here is a stub that parks the machine in a timer-polling loop
//! (which the progress heuristic turns into one-frame naps); a compiled
//! Oberon boot loader is a drop-in replacement for `roms/boot.rom`.
//!
//! `configure_memory` patches words 372, 373 and 376 with the memory limit
//! and stack origin, whatever the image contents.

use cpu_risc5::ROM_WORDS;

static BOOT_IMAGE: &[u8] = include_bytes!("../roms/boot.rom");

/// Decode the embedded image into ROM words.
#[must_use]
pub fn boot_rom() -> [u32; ROM_WORDS] {
    let mut rom = [0u32; ROM_WORDS];
    for (word, bytes) in rom.iter_mut().zip(BOOT_IMAGE.chunks_exact(4)) {
        *word = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    }
    rom
}

//! Project Oberon workstation emulation.
//!
//! The machine pairs a [`cpu_risc5::Risc5`] core with the Oberon memory map:
//! RAM with a framebuffer window at the top, a 512-word boot ROM at
//! `0xFFFFF800`, a 256-entry palette, and a bank of memory-mapped device
//! registers at `0xFFFFFFC0`. Peripherals hang off narrow traits
//! ([`device`]) so the core never names a concrete host implementation.
//!
//! A host driver runs the machine frame by frame: feed input, set the
//! millisecond tick, call [`Oberon::run`], then repaint whatever the damage
//! rectangle says changed.

pub mod bootrom;
mod bus;
pub mod device;
pub mod disk;
pub mod hostfs;
mod hwenum;
pub mod keymap;
mod machine;
pub mod serial;
mod video;

pub use bus::{OberonBus, IO_START, PALETTE_START};
pub use disk::Disk;
pub use hostfs::HostDir;
pub use machine::{Oberon, CPU_HZ, FPS};
pub use video::{Damage, DisplayMode, FRAMEBUFFER_HEIGHT, FRAMEBUFFER_WIDTH};

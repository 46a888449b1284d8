//! File-backed RS-232 device for `--serial-in` / `--serial-out`.
//!
//! Input bytes come from a file read once into memory (so a guest polling
//! the data register can never block the emulation thread); output bytes
//! append to the output file as they arrive. Status bit 0 reports receive
//! data available, bit 1 that transmit is always possible.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::device::Serial;

const RX_READY: u32 = 1;
const TX_READY: u32 = 2;

pub struct FileSerial {
    input: Vec<u8>,
    cursor: usize,
    output: Option<File>,
}

impl FileSerial {
    /// `input`/`output` may each be absent; a missing input reads as
    /// never-ready, a missing output swallows writes.
    pub fn open(input: Option<&Path>, output: Option<&Path>) -> std::io::Result<Self> {
        let input = match input {
            Some(path) => fs::read(path)?,
            None => Vec::new(),
        };
        let output = match output {
            Some(path) => Some(File::create(path)?),
            None => None,
        };
        Ok(Self {
            input,
            cursor: 0,
            output,
        })
    }
}

impl Serial for FileSerial {
    fn read_status(&mut self) -> u32 {
        if self.cursor < self.input.len() {
            TX_READY | RX_READY
        } else {
            TX_READY
        }
    }

    fn read_data(&mut self) -> u32 {
        match self.input.get(self.cursor) {
            Some(&byte) => {
                self.cursor += 1;
                u32::from(byte)
            }
            None => 0,
        }
    }

    fn write_data(&mut self, value: u32) {
        if let Some(output) = &mut self.output {
            let _ = output.write_all(&[value as u8]);
        }
    }
}

//! The hardware enumerator.
//!
//! Writing a FourCC to the enumerator register rebuilds a response buffer,
//! which the guest then drains word by word from the same register (reads
//! past the end return 0). Query 0 answers with the version and the root
//! capability set; querying a FourCC yields that capability's descriptor.
//! Absent capabilities produce an empty buffer, so the first read returns
//! 0 and the guest moves on.
//!
//! Descriptor layouts are fixed wire format: the guest hard-codes them.
//! Device register entries are byte offsets relative to the *end* of the
//! address space, hence the small negative numbers.

use cpu_risc5::ROM_START;

use crate::bus::{OberonBus, PALETTE_START};

/// Pack four ASCII bytes into a capability tag.
const fn fourcc(tag: &[u8; 4]) -> u32 {
    ((tag[0] as u32) << 24) | ((tag[1] as u32) << 16) | ((tag[2] as u32) << 8) | tag[3] as u32
}

const M_VID: u32 = fourcc(b"mVid");
const M_DYN: u32 = fourcc(b"mDyn");
const C16_VID: u32 = fourcc(b"16cV");
const C16_DYN: u32 = fourcc(b"16cD");
const C8_VID: u32 = fourcc(b"8bcV");
const C8_DYN: u32 = fourcc(b"8bcD");
const TIMER: u32 = fourcc(b"Timr");
const SWITCHES: u32 = fourcc(b"Swtc");
const LEDS: u32 = fourcc(b"LEDs");
const SERIAL_PORT: u32 = fourcc(b"SPrt");
const SPI_FLASH: u32 = fourcc(b"SPIf");
const SD_CARD: u32 = fourcc(b"SDCr");
const WIRELESS: u32 = fourcc(b"wNet");
const MOUSE_KEYBOARD: u32 = fourcc(b"MsKb");
const CLIPBOARD: u32 = fourcc(b"vClp");
const PARAVIRT_DISK: u32 = fourcc(b"vDsk");
const HOST_FS: u32 = fourcc(b"HsFs");
const HOST_TRANSFER: u32 = fourcc(b"vHTx");
const DEBUG_CONSOLE: u32 = fourcc(b"DbgC");
const RESET: u32 = fourcc(b"Rset");
const RTC: u32 = fourcc(b"vRTC");

/// Response buffer with read cursor.
pub(crate) struct HwEnum {
    buf: Vec<i32>,
    idx: usize,
}

impl HwEnum {
    pub(crate) fn new() -> Self {
        Self {
            buf: Vec::with_capacity(24),
            idx: 0,
        }
    }

    /// Next response word, or 0 once drained.
    pub(crate) fn read_next(&mut self) -> u32 {
        match self.buf.get(self.idx) {
            Some(&word) => {
                self.idx += 1;
                word as u32
            }
            None => 0,
        }
    }

    fn reset(&mut self) {
        self.buf.clear();
        self.idx = 0;
    }

    fn push(&mut self, word: i32) {
        self.buf.push(word);
    }
}

impl OberonBus {
    /// Answer an enumerator query.
    pub(crate) fn hwenum_query(&mut self, value: u32) {
        self.hwenum.reset();
        let display_start = self.display_start as i32;
        let [mono, color16, color256] = self.video.modes_by_depth;
        let dynsize = self.video.dynsize;

        match value {
            0 => {
                self.hwenum.push(1); // enumerator version
                if mono > 0 {
                    self.hwenum.push(M_VID as i32);
                    if dynsize {
                        self.hwenum.push(M_DYN as i32);
                    }
                }
                if color16 > 0 {
                    self.hwenum.push(C16_VID as i32);
                    if dynsize {
                        self.hwenum.push(C16_DYN as i32);
                    }
                }
                if color256 > 0 {
                    self.hwenum.push(C8_VID as i32);
                    if dynsize {
                        self.hwenum.push(C8_DYN as i32);
                    }
                }
                self.hwenum.push(TIMER as i32);
                self.hwenum.push(SWITCHES as i32);
                self.hwenum.push(SPI_FLASH as i32);
                self.hwenum.push(MOUSE_KEYBOARD as i32);
                self.hwenum.push(RESET as i32);
                if self.rtc_enabled {
                    self.hwenum.push(RTC as i32);
                }
                self.hwenum.push(DEBUG_CONSOLE as i32);
                if self.leds.is_some() {
                    self.hwenum.push(LEDS as i32);
                }
                if self.serial.is_some() {
                    self.hwenum.push(SERIAL_PORT as i32);
                }
                if self.clipboard.is_some() {
                    self.hwenum.push(CLIPBOARD as i32);
                }
                if self.hostfs.is_some() {
                    self.hwenum.push(HOST_FS as i32);
                }
                if self.hosttransfer.is_some() {
                    self.hwenum.push(HOST_TRANSFER as i32);
                }
                if let Some(spi) = &self.spi[1] {
                    if spi.has_paravirtual() {
                        self.hwenum.push(PARAVIRT_DISK as i32);
                    }
                }
            }
            _ if value == M_VID => {
                if mono > 0 {
                    self.hwenum.push(mono as i32);
                    self.hwenum.push(-16); // mode switch register
                    for mode in self.video.modes() {
                        if mode.depth == 1 {
                            self.hwenum.push(mode.width as i32);
                            self.hwenum.push(mode.height as i32);
                            self.hwenum.push((mode.width / 8) as i32);
                            self.hwenum.push(display_start);
                        }
                    }
                }
            }
            _ if value == M_DYN => {
                if mono > 0 && dynsize {
                    self.push_dynamic_descriptor(display_start, false);
                }
            }
            _ if value == C16_VID => {
                if color16 > 0 {
                    self.hwenum.push(color16 as i32);
                    self.hwenum.push(mono as i32); // index of the first 4-bit mode
                    self.hwenum.push(-16);
                    self.hwenum.push(PALETTE_START as i32);
                    for mode in self.video.modes() {
                        if mode.depth == 4 {
                            self.hwenum.push(mode.width as i32);
                            self.hwenum.push(mode.height as i32);
                            self.hwenum.push((mode.width / 2) as i32);
                            self.hwenum.push(display_start);
                        }
                    }
                }
            }
            _ if value == C16_DYN => {
                if color16 > 0 && dynsize {
                    self.push_dynamic_descriptor(display_start, true);
                }
            }
            _ if value == C8_VID => {
                if color256 > 0 {
                    self.hwenum.push(color256 as i32);
                    self.hwenum.push((mono + color16) as i32);
                    self.hwenum.push(-16);
                    self.hwenum.push(PALETTE_START as i32);
                    for mode in self.video.modes() {
                        if mode.depth == 8 {
                            self.hwenum.push(mode.width as i32);
                            self.hwenum.push(mode.height as i32);
                            self.hwenum.push(mode.width as i32);
                            self.hwenum.push(display_start);
                        }
                    }
                }
            }
            _ if value == C8_DYN => {
                if color256 > 0 && dynsize {
                    self.push_dynamic_descriptor(display_start, true);
                }
            }
            _ if value == TIMER => {
                self.hwenum.push(-64);
            }
            _ if value == SWITCHES => {
                self.hwenum.push(1); // one switch bank
                self.hwenum.push(-60);
            }
            _ if value == LEDS => {
                if self.leds.is_some() {
                    self.hwenum.push(8); // eight LEDs
                    self.hwenum.push(-60);
                }
            }
            _ if value == SERIAL_PORT => {
                if self.serial.is_some() {
                    self.hwenum.push(1); // one port
                    self.hwenum.push(-52); // status
                    self.hwenum.push(-56); // data
                }
            }
            _ if value == SPI_FLASH => {
                self.hwenum.push(-44); // control
                self.hwenum.push(-48); // status
                if self.spi[1].is_some() {
                    self.hwenum.push(SD_CARD as i32);
                }
                if self.spi[2].is_some() {
                    self.hwenum.push(WIRELESS as i32);
                }
            }
            _ if value == MOUSE_KEYBOARD => {
                self.hwenum.push(-40); // mouse word / keyboard status
                self.hwenum.push(-36); // keyboard data
            }
            _ if value == CLIPBOARD => {
                if self.clipboard.is_some() {
                    self.hwenum.push(-24); // control
                    self.hwenum.push(-20); // data
                }
            }
            _ if value == PARAVIRT_DISK => {
                if let Some(spi) = &self.spi[1] {
                    if spi.has_paravirtual() {
                        self.hwenum.push(-28);
                    }
                }
            }
            _ if value == HOST_FS => {
                if self.hostfs.is_some() {
                    self.hwenum.push(-32);
                }
            }
            _ if value == HOST_TRANSFER => {
                if self.hosttransfer.is_some() {
                    self.hwenum.push(-32);
                }
            }
            _ if value == DEBUG_CONSOLE => {
                self.hwenum.push(-12);
            }
            _ if value == RESET => {
                self.hwenum.push(ROM_START as i32);
            }
            _ if value == RTC => {
                if self.rtc_enabled {
                    self.hwenum.push(0); // tick counter starts at zero
                    self.hwenum.push(self.initial_clock as i32);
                }
            }
            _ => {}
        }
    }

    /// Shared tail of the dynamic-mode descriptors.
    fn push_dynamic_descriptor(&mut self, display_start: i32, with_palette: bool) {
        self.hwenum.push(-16); // mode switch register
        if with_palette {
            self.hwenum.push(PALETTE_START as i32);
        }
        self.hwenum.push(2048); // maximum width
        self.hwenum.push(2048); // maximum height
        self.hwenum.push(32); // width increment
        self.hwenum.push(1); // height increment
        self.hwenum.push(-1); // span is dynamic
        self.hwenum.push(display_start);
        self.hwenum.push(1); // seamless resize supported
    }
}

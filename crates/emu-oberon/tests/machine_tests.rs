//! Machine-level tests: memory map, MMIO registers, damage tracking,
//! display modes and the hardware enumerator, driven through the public
//! machine API (programs execute from guest RAM where the scenario needs
//! the CPU).

use cpu_risc5::{Bus, ROM_START};
use emu_oberon::{DisplayMode, Oberon, IO_START, PALETTE_START};

fn mono_mode() -> DisplayMode {
    DisplayMode {
        index: 0,
        width: 1024,
        height: 768,
        depth: 1,
    }
}

/// MOV Ra, #im (zero-extended immediate).
fn mov_imm(a: u32, im: u32) -> u32 {
    0x4000_0000 | (a << 24) | (im & 0xFFFF)
}

/// ADD Ra, Rb, Rc.
fn add_reg(a: u32, b: u32, c: u32) -> u32 {
    (a << 24) | (b << 20) | (8 << 16) | c
}

#[test]
fn reset_executes_from_rom() {
    let mut machine = Oberon::new();
    assert_eq!(machine.cpu().pc, ROM_START / 4);

    machine.run(1);
    assert_eq!(machine.cpu().pc, ROM_START / 4 + 1);

    machine.reset();
    machine.run(1);
    assert_eq!(machine.cpu().pc, ROM_START / 4 + 1);
}

#[test]
fn idle_rom_loop_exhausts_progress() {
    // The boot stub spins on the millisecond counter; `run` gives up after
    // its busy-wait budget instead of burning the whole cycle budget.
    let mut machine = Oberon::new();
    machine.run(1_000_000);
    assert_eq!(machine.bus().progress(), 0);
}

#[test]
fn run_respects_cycle_budget() {
    let mut machine = Oberon::new();
    let program = [mov_imm(0, 1), mov_imm(1, 2), mov_imm(2, 3), mov_imm(3, 4)];
    machine.bus_mut().ram_mut()[0x40..0x44].copy_from_slice(&program);
    machine.cpu_mut().pc = 0x40;

    machine.run(3);
    assert_eq!(machine.cpu().pc, 0x43);
    assert_eq!(machine.cpu().r[2], 3);
    assert_eq!(machine.cpu().r[3], 0);
}

#[test]
fn mov_add_sequence_leaves_flags_clear() {
    let mut machine = Oberon::new();
    let program = [mov_imm(0, 1), add_reg(1, 0, 0)];
    machine.bus_mut().ram_mut()[0x40..0x42].copy_from_slice(&program);
    machine.cpu_mut().pc = 0x40;

    machine.run(2);
    let cpu = machine.cpu();
    assert_eq!(cpu.r[1], 2);
    assert!(!cpu.z);
    assert!(!cpu.n);
    assert!(!cpu.c);
    assert!(!cpu.v);
}

#[test]
fn timer_and_switches_registers() {
    let mut machine = Oberon::new();
    machine.set_time(1234);
    machine.set_switches(7);
    assert_eq!(machine.bus_mut().load_word(IO_START), 1234);
    assert_eq!(machine.bus_mut().load_word(IO_START + 4), 7);
}

#[test]
fn scancode_fifo_drains_in_order() {
    let mut machine = Oberon::new();
    machine.mouse_moved(10, 20);
    machine.keyboard_input(&[0xAA, 0xBB]);

    let mouse = machine.bus_mut().load_word(IO_START + 24);
    assert_eq!(mouse & 0x1000_0000, 0x1000_0000, "keyboard-ready bit");
    assert_eq!(machine.bus_mut().load_word(IO_START + 28), 0xAA);
    assert_eq!(machine.bus_mut().load_word(IO_START + 28), 0xBB);

    let mouse = machine.bus_mut().load_word(IO_START + 24);
    assert_eq!(mouse & 0x1000_0000, 0, "queue empty again");
    assert_eq!(machine.bus_mut().load_word(IO_START + 28), 0);
}

#[test]
fn overfull_scancode_batch_dropped_wholesale() {
    let mut machine = Oberon::new();
    machine.keyboard_input(&[1; 15]);
    machine.keyboard_input(&[2, 3]); // 17 bytes total: dropped
    machine.keyboard_input(&[4]); // still fits

    for expected in std::iter::repeat(1u32).take(15).chain([4u32]) {
        assert_eq!(machine.bus_mut().load_word(IO_START + 28), expected);
    }
    assert_eq!(machine.bus_mut().load_word(IO_START + 28), 0);
}

#[test]
fn mouse_register_packing() {
    let mut machine = Oberon::new();
    machine.mouse_moved(100, 200);
    machine.mouse_button(1, true);
    machine.mouse_button(3, true);

    let mouse = machine.bus_mut().load_word(IO_START + 24);
    assert_eq!(mouse & 0xFFF, 100);
    assert_eq!((mouse >> 12) & 0xFFF, 200);
    assert_eq!(mouse & (1 << 26), 1 << 26, "button 1");
    assert_eq!(mouse & (1 << 24), 1 << 24, "button 3");

    machine.mouse_button(1, false);
    let mouse = machine.bus_mut().load_word(IO_START + 24);
    assert_eq!(mouse & (1 << 26), 0);

    // Out-of-range coordinates leave the register alone.
    machine.mouse_moved(-1, 5000);
    let unchanged = machine.bus_mut().load_word(IO_START + 24);
    assert_eq!(unchanged & 0xFFF, 100);
    assert_eq!((unchanged >> 12) & 0xFFF, 200);
}

#[test]
fn framebuffer_store_damages_first_cell() {
    let mut machine = Oberon::new();
    machine.configure_memory(2, &[mono_mode()], false);
    machine.take_damage(); // drop the configure-time full damage

    let display_start = machine.bus().display_start();
    assert_eq!(display_start, 2 << 20);
    machine.bus_mut().store_word(display_start, 0xDEAD_BEEF);

    let damage = machine.take_damage();
    assert_eq!((damage.x1, damage.y1, damage.x2, damage.y2), (0, 0, 0, 0));
    assert!(machine.take_damage().is_clean(), "damage resets after read");
    assert_eq!(machine.framebuffer()[0], 0xDEAD_BEEF);
}

#[test]
fn stores_below_framebuffer_stay_clean() {
    let mut machine = Oberon::new();
    machine.configure_memory(2, &[mono_mode()], false);
    machine.take_damage();

    machine.bus_mut().store_word(0x1000, 42);
    assert!(machine.take_damage().is_clean());
}

#[test]
fn byte_store_read_modify_writes_containing_word() {
    let mut machine = Oberon::new();
    machine.bus_mut().store_word(0x100, 0x1122_3344);
    machine.bus_mut().store_byte(0x101, 0xAB);
    assert_eq!(machine.bus_mut().load_word(0x100), 0x1122_AB44);
    assert_eq!(machine.bus_mut().load_byte(0x101), 0xAB);
    assert_eq!(machine.bus_mut().load_byte(0x100), 0x44);
}

#[test]
fn palette_roundtrip_marks_full_damage() {
    let mut machine = Oberon::new();
    let color_mode = DisplayMode {
        index: 0,
        width: 1024,
        height: 768,
        depth: 4,
    };
    machine.configure_memory(1, &[color_mode], false);
    assert_eq!(machine.palette()[1], 0xFF_0000, "default palette loaded");

    machine.take_damage();
    machine.bus_mut().store_word(PALETTE_START + 8, 0x12_3456);
    assert_eq!(machine.bus_mut().load_word(PALETTE_START + 8), 0x12_3456);
    assert_eq!(machine.palette()[2], 0x12_3456);

    let damage = machine.take_damage();
    let span = color_mode.span();
    assert_eq!(
        (damage.x1, damage.y1, damage.x2, damage.y2),
        (0, 0, span - 1, 767),
        "palette write repaints everything"
    );
}

#[test]
fn eight_bit_configure_builds_grey_ramp_and_cube() {
    let mut machine = Oberon::new();
    let mode = DisplayMode {
        index: 0,
        width: 1024,
        height: 768,
        depth: 8,
    };
    machine.configure_memory(1, &[mode], false);
    assert_eq!(machine.palette()[16], 10 * 0x01_0101);
    assert_eq!(machine.palette()[39], 240 * 0x01_0101);
    assert_eq!(machine.palette()[40], 0); // cube origin
    assert_eq!(machine.palette()[40 + 5], 5 * 0x33); // pure blue corner
    assert_eq!(machine.palette()[40 + 5 * 36], 5 * 0x33_0000); // pure red
}

#[test]
fn static_mode_switch_updates_span_and_damage() {
    let mut machine = Oberon::new();
    let modes = [
        mono_mode(),
        DisplayMode {
            index: 1,
            width: 800,
            height: 600,
            depth: 4,
        },
    ];
    machine.configure_memory(1, &modes, false);
    machine.take_damage();

    machine.bus_mut().store_word(IO_START + 48, 1);
    let (mode, seamless) = machine.display_mode();
    assert_eq!(mode.index, 1);
    assert_eq!(mode.width, 800);
    assert_eq!(mode.depth, 4);
    assert!(!seamless);
    assert_eq!(machine.bus_mut().load_word(IO_START + 48), 1);

    let damage = machine.take_damage();
    assert_eq!(
        (damage.x1, damage.y1, damage.x2, damage.y2),
        (0, 0, 99, 599),
        "mode switch repaints the new viewport"
    );
}

#[test]
fn seamless_switch_adopts_host_hint() {
    let mut machine = Oberon::new();
    machine.configure_memory(1, &[mono_mode()], true);
    machine.size_hint(1280, 720);

    machine.bus_mut().store_word(IO_START + 48, 1 << 30);
    let (mode, seamless) = machine.display_mode();
    assert!(seamless);
    assert_eq!(mode.width, 1280);
    assert_eq!(mode.height, 720);
    assert_eq!(mode.depth, 1);

    let packed = (1 << 30) | (1280 << 15) | 720;
    assert_eq!(mode.index, packed);
    assert_eq!(machine.bus_mut().load_word(IO_START + 48), packed);
}

#[test]
fn unconfigured_devices_read_idle_values() {
    let mut machine = Oberon::new();
    assert_eq!(machine.bus_mut().load_word(IO_START + 8), 0); // serial data
    assert_eq!(machine.bus_mut().load_word(IO_START + 12), 0); // serial status
    assert_eq!(machine.bus_mut().load_word(IO_START + 16), 255); // SPI data
    assert_eq!(machine.bus_mut().load_word(IO_START + 20), 1); // SPI status
    assert_eq!(machine.bus_mut().load_word(IO_START + 40), 0); // clipboard
    assert_eq!(machine.bus_mut().load_word(IO_START + 56), 0); // unused slot

    // Writes to unconfigured devices are no-ops, not faults.
    machine.bus_mut().store_word(IO_START + 4, 0xFF); // LEDs
    machine.bus_mut().store_word(IO_START + 32, 0x100); // HostFS
    machine.bus_mut().store_word(IO_START + 36, 0x100); // paravirtual disk
}

const fn fourcc(tag: &[u8; 4]) -> u32 {
    ((tag[0] as u32) << 24) | ((tag[1] as u32) << 16) | ((tag[2] as u32) << 8) | tag[3] as u32
}

fn query(machine: &mut Oberon, id: u32) -> Vec<u32> {
    machine.bus_mut().store_word(IO_START + 60, id);
    let mut words = Vec::new();
    loop {
        let word = machine.bus_mut().load_word(IO_START + 60);
        if word == 0 {
            break;
        }
        words.push(word);
        assert!(words.len() < 64, "descriptor never drained");
    }
    words
}

#[test]
fn hardware_enumerator_root_set() {
    let mut machine = Oberon::new();
    machine.configure_memory(1, &[mono_mode()], true);

    let root = query(&mut machine, 0);
    assert_eq!(root[0], 1, "enumerator version");
    assert!(root.contains(&fourcc(b"mVid")));
    assert!(root.contains(&fourcc(b"mDyn")));
    assert!(root.contains(&fourcc(b"Timr")));
    assert!(root.contains(&fourcc(b"SPIf")));
    assert!(root.contains(&fourcc(b"MsKb")));
    assert!(root.contains(&fourcc(b"Rset")));
    assert!(root.contains(&fourcc(b"DbgC")));
    assert!(!root.contains(&fourcc(b"vRTC")), "RTC not enabled");
    assert!(!root.contains(&fourcc(b"LEDs")), "no LED sink installed");
    assert!(!root.contains(&fourcc(b"16cV")), "no 4-bit modes");

    machine.set_rtc(true);
    let root = query(&mut machine, 0);
    assert!(root.contains(&fourcc(b"vRTC")));
}

#[test]
fn hardware_enumerator_descriptors() {
    let mut machine = Oberon::new();
    machine.configure_memory(1, &[mono_mode()], true);

    let mvid = query(&mut machine, fourcc(b"mVid"));
    assert_eq!(
        mvid,
        vec![1, (-16i32) as u32, 1024, 768, 128, 1 << 20],
        "one mono mode: count, switch reg, w, h, line span, base"
    );

    let mdyn = query(&mut machine, fourcc(b"mDyn"));
    assert_eq!(
        mdyn,
        vec![
            (-16i32) as u32,
            2048,
            2048,
            32,
            1,
            (-1i32) as u32,
            1 << 20,
            1
        ]
    );

    let timer = query(&mut machine, fourcc(b"Timr"));
    assert_eq!(timer, vec![(-64i32) as u32]);

    let reset = query(&mut machine, fourcc(b"Rset"));
    assert_eq!(reset, vec![ROM_START]);

    // Absent capability: empty buffer, first read already returns 0.
    let clipboard = query(&mut machine, fourcc(b"vClp"));
    assert!(clipboard.is_empty());

    // Unknown FourCC behaves the same.
    assert!(query(&mut machine, 0xDEAD_BEEF).is_empty());
}

#[test]
fn rom_patching_encodes_memory_limits() {
    let mut machine = Oberon::new();
    machine.configure_memory(4, &[mono_mode()], false);

    let mem_lim: u32 = (4 << 20) - 16;
    let stack_org: u32 = (4 << 20) / 2;
    let w372 = machine.bus_mut().fetch(ROM_START / 4 + 372).unwrap();
    let w373 = machine.bus_mut().fetch(ROM_START / 4 + 373).unwrap();
    let w376 = machine.bus_mut().fetch(ROM_START / 4 + 376).unwrap();
    assert_eq!(w372, 0x6100_0000 + (mem_lim >> 16));
    assert_eq!(w373, 0x4116_0000 + (mem_lim & 0xFFFF));
    assert_eq!(w376, 0x6100_0000 + (stack_org >> 16));
}

//! Banking behavior driven through executed Z80 code.
use spectron::core::memory::PageId;
use spectron::core::ports::PortFlags;
use spectron::machine::Machine;
use spectron::Model;

/// Places a program in RAM at 0x8000 and points PC at it.
fn load_program(machine: &mut Machine, program: &[u8]) {
    machine.write_memory(0x8000, program);
    machine.cpu.pc = 0x8000;
    machine.cpu.sp = 0x7FF0;
    // keep the frame interrupt out of the way
    machine.cpu.iff1 = false;
    machine.cpu.iff2 = false;
}

fn run_instructions(machine: &mut Machine, count: usize) {
    for _ in 0..count {
        machine.step_instruction();
    }
}

#[test]
fn out_7ffd_remaps_and_lock_sticks() {
    let mut machine = Machine::new(Model::Spectrum128, 44100);
    // LD BC, 0x7FFD; LD A, 0x10; OUT (C), A
    load_program(&mut machine, &[0x01, 0xFD, 0x7F, 0x3E, 0x10, 0xED, 0x79]);
    run_instructions(&mut machine, 3);
    assert_eq!(machine.board.memory.window(3).page, PageId::ram(0));
    assert_eq!(machine.board.memory.window(0).page, PageId::rom(1));

    // set the lock, then try to switch to RAM 7: must be ignored
    load_program(&mut machine, &[
        0x01, 0xFD, 0x7F, // LD BC, 0x7FFD
        0x3E, 0x30,       // LD A, 0x30 (lock | ROM 1)
        0xED, 0x79,       // OUT (C), A
        0x3E, 0x27,       // LD A, 0x27 (RAM 7 + ROM select)
        0xED, 0x79,       // OUT (C), A
    ]);
    run_instructions(&mut machine, 5);
    assert_eq!(machine.board.memory.window(3).page, PageId::ram(0));
    assert_eq!(machine.board.memory.window(0).page, PageId::rom(1));
    assert!(machine.board.latches.is_128_locked());
}

#[test]
fn writes_through_switched_banks_land_in_the_right_page() {
    let mut machine = Machine::new(Model::Spectrum128, 44100);
    // map RAM 1 at W3, write a marker, then map RAM 3 and read
    load_program(&mut machine, &[
        0x01, 0xFD, 0x7F, // LD BC, 0x7FFD
        0x3E, 0x01,       // LD A, 1
        0xED, 0x79,       // OUT (C), A
        0x3E, 0x5A,       // LD A, 0x5A
        0x32, 0x00, 0xC0, // LD (0xC000), A
        0x3E, 0x03,       // LD A, 3
        0xED, 0x79,       // OUT (C), A
    ]);
    run_instructions(&mut machine, 7);
    assert_eq!(machine.board.memory.ram_bank(1)[0], 0x5A);
    assert_eq!(machine.board.memory.ram_bank(3)[0], 0x00);
    assert_eq!(machine.board.memory.window(3).page, PageId::ram(3));
}

#[test]
fn rom_window_swallows_writes() {
    let mut machine = Machine::new(Model::Spectrum128, 44100);
    load_program(&mut machine, &[
        0x3E, 0xA5,       // LD A, 0xA5
        0x32, 0x34, 0x12, // LD (0x1234), A
        0x3A, 0x34, 0x12, // LD A, (0x1234)
    ]);
    run_instructions(&mut machine, 3);
    assert_eq!(machine.cpu.a, 0x00, "the ROM byte must read back unchanged");
}

#[test]
fn trdos_entry_by_execution_address() {
    let mut machine = Machine::new(Model::Pentagon, 44100);
    // select the 48 BASIC ROM so the DOS gate arms
    machine.board.latches.p_7ffd = 0x10;
    machine.board.rebank();
    let dos_bank = machine.board.memory.rom_set().dos.unwrap();

    machine.cpu.pc = 0x3D00;
    machine.cpu.iff1 = false;
    machine.step_instruction();
    assert!(machine.board.flags.contains(PortFlags::TRDOS_ROM));
    assert_eq!(machine.board.memory.window(0).page, PageId::rom(dos_bank));

    // one M1 fetch above 0x3FFF leaves TR-DOS again
    machine.cpu.pc = 0x8000;
    machine.step_instruction();
    assert!(!machine.board.flags.contains(PortFlags::TRDOS_ROM));
    assert_ne!(machine.board.memory.window(0).page, PageId::rom(dos_bank));
}

#[test]
fn identical_latch_histories_give_identical_maps() {
    let mut a = Machine::new(Model::Plus3, 44100);
    let mut b = Machine::new(Model::Plus3, 44100);
    // a long detour on machine a, then the same final state as b
    for value in [0x05u8, 0x11, 0x1F, 0x08] {
        load_program(&mut a, &[0x01, 0xFD, 0x7F, 0x3E, value, 0xED, 0x79]);
        run_instructions(&mut a, 3);
    }
    load_program(&mut a, &[0x01, 0xFD, 0x7F, 0x3E, 0x0A, 0xED, 0x79]);
    run_instructions(&mut a, 3);
    load_program(&mut b, &[0x01, 0xFD, 0x7F, 0x3E, 0x0A, 0xED, 0x79]);
    run_instructions(&mut b, 3);
    assert_eq!(a.board.memory.map(), b.board.memory.map());
}

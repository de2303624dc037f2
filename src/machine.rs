/*
    Copyright (C) 2024-2026  Spectron Developers

    This file is part of SPECTRON, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! A runnable machine: CPU plus board.
//!
//! The [Board] owns memory, latches, video, audio and peripherals, and
//! resolves every bus access of the Z80. Two bus facades exist: the fast
//! one goes straight to the dispatch code, the debug one additionally
//! consults breakpoints and feeds the call trace.
use spectron_audio::{mix_saturating, AyChip, Beeper, StereoPan};
use spectron_core::banking::{is_7ffd_locked, rebank, Model};
use spectron_core::clock::{contention_delay, FrameClock, FrameTimings, FTs};
use spectron_core::debug::{
    decode_control_flow, is_cf_opcode, BreakKind, Breakpoints, CallTrace, CallTraceEntry,
};
use spectron_core::dma::{TsDma, WORDS_PER_LINE};
use spectron_core::memory::{Memory, MemoryError};
use spectron_core::ports::{
    dos_m1_transition, tsreg, ExecSource, PortFlags, PortLatches, TsExtRegs, PORT_1F,
    PORT_1FFD, PORT_7FFD, PORT_ATM_FF7, PORT_BFFD, PORT_DFFD, PORT_EFF7, PORT_FE, PORT_FF77,
    PORT_FFFD, PORT_QUORUM_00, PORT_QUORUM_80FD, PORT_TRDOS_CMD, PORT_TRDOS_SYS, PORT_TS_AF,
};
use spectron_core::video::tsconf::TsVideoState;
use spectron_core::video::{
    floating_bus_offset, render_standard_frame, BorderTrail, Framebuffer,
};
use spectron_core::z80::{Bus, Z80};
use spectron_peripherals::ide::AtaReg;
use spectron_peripherals::mouse::{PORT_BUTTONS, PORT_X, PORT_Y};
use spectron_peripherals::{IdeBus, KempstonMouse, Keyboard, TapeDeck, Wd1793};

/// The byte an unhandled port returns.
const IDLE_BUS: u8 = 0xFF;

/// How one executed frame ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Completed,
    /// A breakpoint fired; execution parked at an instruction boundary.
    Paused,
}

/// Everything on the bus side of the CPU.
pub struct Board {
    pub model: Model,
    pub timings: FrameTimings,
    pub memory: Memory,
    pub latches: PortLatches,
    pub flags: PortFlags,
    pub ts_regs: TsExtRegs,
    pub ts_video: TsVideoState,
    pub dma: TsDma,
    pub trail: BorderTrail,
    pub clock: FrameClock,
    pub ay: AyChip,
    pub beeper: Beeper,
    pub keyboard: Keyboard,
    pub tape: TapeDeck,
    pub fdc: Wd1793,
    pub ide: IdeBus,
    pub mouse: KempstonMouse,
    pub joystick: u8,
    pub breakpoints: Breakpoints,
    pub call_trace: CallTrace,
    /// Whether the call trace records control flow (debug bus only).
    pub trace_enabled: bool,
    /// Set by the debug bus when a breakpoint matches.
    break_pending: bool,
    /// IDE high-byte latch of the Nemo-style interface.
    ide_data_latch: u8,
    sound_enabled: bool,
}

impl Board {
    fn new(model: Model, sample_rate: u32) -> Self {
        let timings = model.timings();
        let ay_clock = timings.cpu_hz / 2;
        let mut board = Board {
            model,
            timings,
            memory: Memory::new(),
            latches: PortLatches::default(),
            flags: model.initial_flags(),
            ts_regs: TsExtRegs::default(),
            ts_video: TsVideoState::default(),
            dma: TsDma::new(),
            trail: BorderTrail::default(),
            clock: FrameClock::default(),
            ay: AyChip::new(ay_clock, sample_rate, StereoPan::Abc),
            beeper: Beeper::new(),
            keyboard: Keyboard::new(),
            tape: TapeDeck::new(),
            fdc: Wd1793::new(),
            ide: IdeBus::new(),
            mouse: KempstonMouse::new(),
            joystick: 0,
            breakpoints: Breakpoints::new(),
            call_trace: CallTrace::default(),
            trace_enabled: false,
            break_pending: false,
            ide_data_latch: 0,
            sound_enabled: true,
        };
        board.memory.set_rom_set(model.rom_set());
        board.rebank();
        board
    }

    /// Recomputes the window mapping from the latched state and applies
    /// it. An out-of-arena result is logged and dropped.
    pub fn rebank(&mut self) {
        let map = rebank(
            self.model,
            &self.latches,
            self.flags,
            &self.ts_regs,
            self.memory.rom_set(),
        );
        match self.memory.apply_map(map) {
            Ok(()) => {}
            Err(MemoryError::InvalidPageIndex) => {
                log::error!("banking request outside the page arena dropped");
            }
            Err(err) => log::error!("banking failed: {}", err),
        }
    }

    pub fn set_sound_enabled(&mut self, enabled: bool) {
        self.sound_enabled = enabled;
    }

    /// Global monotonic timestamp of a frame-local `ts`.
    #[inline]
    fn global_ts(&self, ts: FTs) -> i64 {
        self.clock.total_ts + ts as i64
    }

    /// Whether the ROM currently visible in W0 can trigger TR-DOS entry.
    fn dos_capable_rom_mapped(&self) -> bool {
        let rom = self.memory.rom_set();
        let window = self.memory.window(0);
        if !rom.has_dos() {
            return false;
        }
        window.page == spectron_core::memory::PageId::rom(rom.sos)
            || self.flags.contains(PortFlags::TRDOS_ROM)
    }

    fn fetch_m1_raw(&mut self, addr: u16, _ts: FTs) -> u8 {
        let source = if self.memory.is_rom_at(addr) {
            ExecSource::Rom
        }
        else {
            ExecSource::Ram
        };
        let dos_capable = self.dos_capable_rom_mapped();
        if dos_m1_transition(&mut self.flags, addr, source, dos_capable) {
            self.rebank();
        }
        self.memory.read(addr)
    }

    fn read_raw(&mut self, addr: u16, _ts: FTs) -> u8 {
        self.memory.read(addr)
    }

    fn write_raw(&mut self, addr: u16, data: u8, _ts: FTs) {
        if self.model == Model::TsConf && self.fmaps_write(addr, data) {
            return;
        }
        self.memory.write(addr, data);
    }

    /// TSConf FMAPS window: CRAM and the sprite file are written through
    /// low memory while FMADDR bit 4 is set.
    fn fmaps_write(&mut self, addr: u16, data: u8) -> bool {
        let fmaddr = self.ts_regs.get(tsreg::FMADDR);
        if fmaddr & 0x10 == 0 {
            return false;
        }
        let base = ((fmaddr & 0x0F) as u16) << 12;
        let offset = addr.wrapping_sub(base);
        if offset >= 0x1000 {
            return false;
        }
        if offset < 0x200 {
            // CRAM: 256 little-endian words
            let index = (offset >> 1) as u8;
            let current = self.ts_video.cram[index as usize];
            let value = if offset & 1 == 0 {
                (current & 0xFF00) | data as u16
            }
            else {
                (current & 0x00FF) | ((data as u16) << 8)
            };
            self.ts_video.write_cram(index, value);
        }
        else if offset < 0x400 {
            let word = ((offset - 0x200) >> 1) as usize;
            let current = self.ts_video.sfile.get(word).copied().unwrap_or(0);
            let value = if offset & 1 == 0 {
                (current & 0xFF00) | data as u16
            }
            else {
                (current & 0x00FF) | ((data as u16) << 8)
            };
            self.ts_video.write_sfile(word, value);
        }
        true
    }

    fn port_in_raw(&mut self, port: u16, ts: FTs) -> u8 {
        // fully decoded ports first
        match port {
            PORT_BUTTONS => return self.mouse.read_buttons(),
            PORT_X => return self.mouse.read_x(),
            PORT_Y => return self.mouse.read_y(),
            _ => {}
        }
        if self.model == Model::TsConf && PORT_TS_AF.matches(port) {
            let reg = (port >> 8) as usize;
            if reg == tsreg::DMACTR {
                return self.dma.status();
            }
            return self.ts_regs.get(reg);
        }
        if self.flags.contains(PortFlags::DOS_PORTS) {
            if PORT_TRDOS_CMD.matches(port) {
                return match (port >> 5) & 3 {
                    0 => self.fdc.read_status(),
                    1 => self.fdc.read_track_reg(),
                    2 => self.fdc.read_sector_reg(),
                    _ => self.fdc.read_data(),
                };
            }
            if PORT_TRDOS_SYS.matches(port) {
                return self.fdc.read_system();
            }
        }
        // the IDE register decode wins over the ULA on its ports
        if let Some(value) = self.ide_port_in(port) {
            return value;
        }
        if PORT_FE.matches(port) {
            let ear = self.tape.ear_in(self.global_ts(ts));
            let mut value = self.keyboard.port_value((port >> 8) as u8) & 0xBF;
            if ear {
                value |= 0x40;
            }
            return value;
        }
        if self.model != Model::Spectrum48 && PORT_FFFD.matches(port) {
            return self.ay.read_data();
        }
        if PORT_1F.matches(port) && !self.flags.contains(PortFlags::DOS_PORTS) {
            // Kempston joystick, on 0x1F and its partial-decode mirrors
            return self.joystick;
        }
        // unhandled: floating bus on the models that exhibit it
        if self.model.has_floating_bus() {
            if let Some(offset) = floating_bus_offset(&self.timings, ts) {
                let bank = self.model.screen_bank(&self.latches);
                return self.memory.read_screen(bank, offset);
            }
        }
        IDLE_BUS
    }

    fn port_out_raw(&mut self, port: u16, data: u8, ts: FTs) {
        // the IDE register decode wins over the ULA on its ports
        if self.ide_port_out(port, data) {
            return;
        }
        if PORT_FE.matches(port) {
            self.latches.p_fe = data;
            self.trail.record(ts, data & 7);
            self.beeper.write_port(ts, data);
            return;
        }
        if self.model == Model::TsConf && PORT_TS_AF.matches(port) {
            let reg = (port >> 8) as usize;
            self.ts_regs.set(reg, data);
            if reg == tsreg::DMACTR {
                self.dma.start(&self.ts_regs);
            }
            self.rebank();
            return;
        }
        if self.flags.contains(PortFlags::DOS_PORTS) {
            if PORT_TRDOS_CMD.matches(port) {
                match (port >> 5) & 3 {
                    0 => self.fdc.write_command(data),
                    1 => self.fdc.write_track_reg(data),
                    2 => self.fdc.write_sector_reg(data),
                    _ => self.fdc.write_data(data),
                }
                return;
            }
            if PORT_TRDOS_SYS.matches(port) {
                self.fdc.write_system(data);
                return;
            }
        }
        if self.model != Model::Spectrum48 {
            if PORT_FFFD.matches(port) {
                self.ay.select_reg(data);
                return;
            }
            if PORT_BFFD.matches(port) {
                self.ay.write_data(data);
                return;
            }
        }
        let mut remap = false;
        match self.model {
            Model::Spectrum48 => {}
            Model::Plus3 | Model::Scorpion256 | Model::ScorpionProf => {
                if PORT_7FFD.matches(port) && !is_7ffd_locked(self.model, &self.latches) {
                    self.latches.p_7ffd = data;
                    remap = true;
                }
                else if PORT_1FFD.matches(port) {
                    self.latches.p_1ffd = data;
                    remap = true;
                }
            }
            Model::Profi | Model::Lsy256 => {
                if PORT_7FFD.matches(port) && !is_7ffd_locked(self.model, &self.latches) {
                    self.latches.p_7ffd = data;
                    remap = true;
                }
                else if PORT_DFFD.matches(port) {
                    self.latches.p_dffd = data;
                    remap = true;
                }
            }
            Model::Pentagon1024 => {
                if PORT_EFF7.matches(port) {
                    self.latches.p_eff7 = data;
                    remap = true;
                }
                else if PORT_7FFD.matches(port)
                    && !is_7ffd_locked(self.model, &self.latches)
                {
                    self.latches.p_7ffd = data;
                    remap = true;
                }
            }
            Model::Atm710 | Model::Atm3 => {
                if PORT_FF77.matches(port) {
                    self.latches.p_ff77 = data;
                    remap = true;
                }
                else if PORT_ATM_FF7.matches(port) && self.latches.p_ff77 & 0x01 != 0 {
                    let window = (port >> 14) as usize;
                    self.latches.atm_pages[window] = data;
                    remap = true;
                }
                else if PORT_7FFD.matches(port)
                    && !is_7ffd_locked(self.model, &self.latches)
                {
                    self.latches.p_7ffd = data;
                    remap = true;
                }
            }
            Model::Quorum => {
                if PORT_QUORUM_00.matches(port) {
                    self.latches.p_00 = data;
                    remap = true;
                }
                else if PORT_QUORUM_80FD.matches(port) {
                    self.latches.p_80fd = data;
                    remap = true;
                }
                else if PORT_7FFD.matches(port)
                    && !is_7ffd_locked(self.model, &self.latches)
                {
                    self.latches.p_7ffd = data;
                    remap = true;
                }
            }
            _ => {
                // the plain 128-compatible family
                if PORT_7FFD.matches(port) && !is_7ffd_locked(self.model, &self.latches) {
                    self.latches.p_7ffd = data;
                    remap = true;
                }
            }
        }
        if remap {
            self.rebank();
        }
        // writes to anything else are dropped
    }

    /// Nemo-style IDE decode: the low byte selects the register, the
    /// data port is 16 bits wide through a high-byte latch at 0x11.
    fn ide_port_in(&mut self, port: u16) -> Option<u8> {
        match port & 0xFF {
            0x10 => {
                let word = self.ide.read_data16();
                self.ide_data_latch = (word >> 8) as u8;
                Some(word as u8)
            }
            0x11 => Some(self.ide_data_latch),
            0x30 | 0x50 | 0x70 | 0x90 | 0xB0 | 0xD0 | 0xF0 => {
                let reg = AtaReg::from_offset(((port & 0xFF) >> 5) as u8);
                Some(self.ide.read(reg))
            }
            _ => None,
        }
    }

    fn ide_port_out(&mut self, port: u16, data: u8) -> bool {
        match port & 0xFF {
            0x10 => {
                let word = u16::from_le_bytes([data, self.ide_data_latch]);
                self.ide.write_data16(word);
                true
            }
            0x11 => {
                self.ide_data_latch = data;
                true
            }
            0x30 | 0x50 | 0x70 | 0x90 | 0xB0 | 0xD0 | 0xF0 => {
                let reg = AtaReg::from_offset(((port & 0xFF) >> 5) as u8);
                self.ide.write(reg, data);
                true
            }
            _ => false,
        }
    }

    #[inline]
    fn contention_raw(&self, addr: u16, ts: FTs) -> FTs {
        let window = self.memory.window((addr >> 14) as usize);
        if window.page.kind() == spectron_core::memory::PageKind::Ram
            && self.model.is_contended_page(window.page.bank())
        {
            contention_delay(&self.timings, ts)
        }
        else {
            0
        }
    }

    #[inline]
    fn io_contention_raw(&self, port: u16, ts: FTs) -> FTs {
        // ULA-decoded ports contend like screen memory
        if port & 1 == 0 && self.model.has_floating_bus() {
            contention_delay(&self.timings, ts)
        }
        else {
            0
        }
    }

    #[inline]
    fn irq_raw(&self, ts: FTs) -> bool {
        if self.timings.is_int_active(ts) {
            return true;
        }
        if self.model == Model::TsConf && self.ts_regs.get(tsreg::INTMASK) & 0x02 != 0 {
            // line interrupt at the start of every scan line
            return ts % self.timings.ts_per_line < 32;
        }
        false
    }
}

/// The fast bus: dispatch only, no instrumentation.
pub struct FastBus<'a>(pub &'a mut Board);

impl<'a> Bus for FastBus<'a> {
    #[inline]
    fn fetch_m1(&mut self, addr: u16, ts: FTs) -> u8 {
        self.0.fetch_m1_raw(addr, ts)
    }

    #[inline]
    fn read(&mut self, addr: u16, ts: FTs) -> u8 {
        self.0.read_raw(addr, ts)
    }

    #[inline]
    fn write(&mut self, addr: u16, data: u8, ts: FTs) {
        self.0.write_raw(addr, data, ts)
    }

    #[inline]
    fn port_in(&mut self, port: u16, ts: FTs) -> u8 {
        self.0.port_in_raw(port, ts)
    }

    #[inline]
    fn port_out(&mut self, port: u16, data: u8, ts: FTs) {
        self.0.port_out_raw(port, data, ts)
    }

    #[inline]
    fn contention(&self, addr: u16, ts: FTs) -> FTs {
        self.0.contention_raw(addr, ts)
    }

    #[inline]
    fn io_contention(&self, port: u16, ts: FTs) -> FTs {
        self.0.io_contention_raw(port, ts)
    }

    #[inline]
    fn irq(&self, ts: FTs) -> bool {
        self.0.irq_raw(ts)
    }
}

/// The debug bus: breakpoints on every access kind plus call tracing.
pub struct DebugBus<'a> {
    pub board: &'a mut Board,
    /// Register file snapshot for control-flow resolution.
    pub cpu: Z80,
}

impl<'a> DebugBus<'a> {
    fn trace_control_flow(&mut self, addr: u16) {
        if !self.board.trace_enabled {
            return;
        }
        let first = self.board.memory.read(addr);
        if !is_cf_opcode(first) {
            return;
        }
        let bytes = [
            first,
            self.board.memory.read(addr.wrapping_add(1)),
            self.board.memory.read(addr.wrapping_add(2)),
            self.board.memory.read(addr.wrapping_add(3)),
        ];
        let memory = &self.board.memory;
        let decoded = decode_control_flow(
            &bytes,
            addr,
            self.cpu.f,
            self.cpu.b,
            self.cpu.sp,
            self.cpu.hl(),
            self.cpu.ix,
            self.cpu.iy,
            |a| memory.read(a),
        );
        if let Some(cf) = decoded {
            self.board.call_trace.push(CallTraceEntry {
                pc: addr,
                bytes,
                cf_type: cf.cf_type,
                target: cf.target,
                taken: cf.taken,
                len: cf.len,
            });
        }
    }
}

impl<'a> Bus for DebugBus<'a> {
    fn fetch_m1(&mut self, addr: u16, ts: FTs) -> u8 {
        if self.board.breakpoints.check(BreakKind::Exec, addr, 0) {
            self.board.break_pending = true;
        }
        self.trace_control_flow(addr);
        self.board.fetch_m1_raw(addr, ts)
    }

    fn read(&mut self, addr: u16, ts: FTs) -> u8 {
        let data = self.board.read_raw(addr, ts);
        if self.board.breakpoints.check(BreakKind::Read, addr, data) {
            self.board.break_pending = true;
        }
        data
    }

    fn write(&mut self, addr: u16, data: u8, ts: FTs) {
        if self.board.breakpoints.check(BreakKind::Write, addr, data) {
            self.board.break_pending = true;
        }
        self.board.write_raw(addr, data, ts)
    }

    fn port_in(&mut self, port: u16, ts: FTs) -> u8 {
        let data = self.board.port_in_raw(port, ts);
        if self.board.breakpoints.check(BreakKind::PortIn, port, data) {
            self.board.break_pending = true;
        }
        data
    }

    fn port_out(&mut self, port: u16, data: u8, ts: FTs) {
        if self.board.breakpoints.check(BreakKind::PortOut, port, data) {
            self.board.break_pending = true;
        }
        self.board.port_out_raw(port, data, ts)
    }

    fn contention(&self, addr: u16, ts: FTs) -> FTs {
        self.board.contention_raw(addr, ts)
    }

    fn io_contention(&self, port: u16, ts: FTs) -> FTs {
        self.board.io_contention_raw(port, ts)
    }

    fn irq(&self, ts: FTs) -> bool {
        self.board.irq_raw(ts)
    }
}

/// A complete machine of one model.
pub struct Machine {
    pub cpu: Z80,
    pub board: Board,
    pub framebuffer: Framebuffer,
    sample_rate: u32,
    /// Scratch buffers reused across frames.
    ay_left: Vec<i16>,
    ay_right: Vec<i16>,
    beeper_buf: Vec<i16>,
    /// Whether the debug bus is in use.
    pub debug_enabled: bool,
    /// Line the per-scanline events ran up to this frame.
    line_cursor: u16,
}

impl Machine {
    pub fn new(model: Model, sample_rate: u32) -> Self {
        let board = Board::new(model, sample_rate);
        let samples = board.timings.samples_per_frame(sample_rate);
        let mut cpu = Z80::new();
        cpu.reset();
        Machine {
            cpu,
            board,
            framebuffer: Framebuffer::default(),
            sample_rate,
            ay_left: vec![0; samples],
            ay_right: vec![0; samples],
            beeper_buf: vec![0; samples],
            debug_enabled: false,
            line_cursor: 0,
        }
    }

    pub fn model(&self) -> Model {
        self.board.model
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Stereo sample pairs one frame produces.
    pub fn samples_per_frame(&self) -> usize {
        self.board.timings.samples_per_frame(self.sample_rate)
    }

    /// A full system reset: CPU, latches, flags and banking.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.board.latches.reset();
        self.board.flags = self.board.model.initial_flags();
        self.board.ts_regs = TsExtRegs::default();
        self.board.ay.reset();
        self.board.fdc.reset();
        self.board.rebank();
    }

    /// Executes a single instruction; returns the T-states consumed.
    pub fn step_instruction(&mut self) -> FTs {
        self.run_line_events();
        if self.debug_enabled {
            let cpu_shadow = self.cpu.clone();
            let mut bus = DebugBus { board: &mut self.board, cpu: cpu_shadow };
            self.cpu.step(&mut bus)
        }
        else {
            self.cpu.step(&mut FastBus(&mut self.board))
        }
    }

    /// Runs the CPU to the end of the frame budget, firing per-scanline
    /// events along the way. Does not render or advance the frame
    /// counter; the caller does that after consuming the frame.
    pub fn run_frame(&mut self) -> FrameOutcome {
        let budget = self.board.timings.ts_per_frame;
        while self.cpu.t < budget {
            self.step_instruction();
            if self.board.break_pending {
                self.board.break_pending = false;
                return FrameOutcome::Paused;
            }
        }
        FrameOutcome::Completed
    }

    /// Runs per-scanline hardware events up to the current T-state.
    fn run_line_events(&mut self) {
        let line = self.board.timings.line_of(self.cpu.t.max(0));
        while self.line_cursor <= line {
            if self.board.model == Model::TsConf {
                let cursor = self.line_cursor;
                let regs = self.board.ts_regs;
                self.board.ts_video.start_line(cursor, &regs);
                self.board.dma.tick(&mut self.board.memory, WORDS_PER_LINE);
            }
            self.line_cursor += 1;
        }
    }

    /// Renders the video frame into the owned framebuffer.
    pub fn render_video(&mut self) {
        let flash = self.board.clock.flash_state();
        if self.board.model == Model::TsConf {
            self.board.ts_video.render_frame(
                &self.board.memory,
                &self.board.ts_regs,
                &self.board.trail,
                flash,
                &self.board.timings,
                &mut self.framebuffer,
            );
        }
        else {
            let bank = self.board.model.screen_bank(&self.board.latches);
            render_standard_frame(
                &self.board.memory,
                bank,
                &self.board.trail,
                flash,
                &self.board.timings,
                &mut self.framebuffer,
            );
        }
    }

    /// Synthesizes and mixes one frame of interleaved stereo PCM16.
    pub fn render_audio(&mut self, out: &mut Vec<i16>) {
        let samples = self.samples_per_frame();
        out.clear();
        if !self.board.sound_enabled {
            out.resize(samples * 2, 0);
            return;
        }
        self.ay_left.resize(samples, 0);
        self.ay_right.resize(samples, 0);
        self.beeper_buf.resize(samples, 0);
        if self.board.model != Model::Spectrum48 {
            self.board.ay.render_frame(&mut self.ay_left, &mut self.ay_right);
        }
        else {
            for sample in self.ay_left.iter_mut() {
                *sample = 0;
            }
            for sample in self.ay_right.iter_mut() {
                *sample = 0;
            }
        }
        self.board
            .beeper
            .render_frame(self.board.timings.ts_per_frame, &mut self.beeper_buf);
        // beeper is mono: fold it into both channels with saturation
        let mut left = vec![0i16; samples];
        let mut right = vec![0i16; samples];
        mix_saturating(&self.ay_left, &self.beeper_buf, &mut left);
        mix_saturating(&self.ay_right, &self.beeper_buf, &mut right);
        out.reserve(samples * 2);
        for (l, r) in left.iter().zip(right.iter()) {
            out.push(*l);
            out.push(*r);
        }
    }

    /// Closes the frame: wraps the CPU clock, advances counters and
    /// clears the per-frame trails.
    pub fn finish_frame(&mut self) {
        let budget = self.board.timings.ts_per_frame;
        self.board.clock.end_frame(budget);
        self.cpu.wrap_frame(budget);
        self.board.trail.clear();
        self.board.fdc.advance(budget as i64);
        self.line_cursor = 0;
    }

    /// Reads memory through the current mapping without side effects.
    pub fn read_memory(&self, addr: u16, out: &mut [u8]) {
        for (n, byte) in out.iter_mut().enumerate() {
            *byte = self.board.memory.read(addr.wrapping_add(n as u16));
        }
    }

    /// Writes memory through the current mapping (ROM protected).
    pub fn write_memory(&mut self, addr: u16, data: &[u8]) {
        for (n, byte) in data.iter().enumerate() {
            self.board.memory.write(addr.wrapping_add(n as u16), *byte);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectron_core::memory::PageId;

    fn machine_128() -> Machine {
        Machine::new(Model::Spectrum128, 44100)
    }

    #[test]
    fn bank_switch_via_port_7ffd() {
        let mut m = machine_128();
        // OUT (0x7FFD), 0x10: RAM 0 at W3, ROM 1 at W0
        let mut bus = FastBus(&mut m.board);
        bus.port_out(0x7FFD, 0x10, 0);
        assert_eq!(m.board.memory.window(3).page, PageId::ram(0));
        assert_eq!(m.board.memory.window(0).page, PageId::rom(1));
        // with bit 5 locked a further write is ignored
        let mut bus = FastBus(&mut m.board);
        bus.port_out(0x7FFD, 0x20 | 0x10, 0);
        bus.port_out(0x7FFD, 0x07, 0);
        assert_eq!(m.board.memory.window(3).page, PageId::ram(0));
        assert_eq!(m.board.memory.window(0).page, PageId::rom(1));
    }

    #[test]
    fn border_writes_feed_trail_and_beeper() {
        let mut m = machine_128();
        let mut bus = FastBus(&mut m.board);
        bus.port_out(0x00FE, 0x05, 1000);
        assert_eq!(m.board.trail.color_at(1500), 5);
        assert_eq!(m.board.latches.p_fe, 0x05);
    }

    #[test]
    fn keyboard_read_via_fe() {
        let mut m = machine_128();
        m.board.keyboard.key_event(spectron_peripherals::ZxKey::A, true);
        let mut bus = FastBus(&mut m.board);
        let value = bus.port_in(0xFDFE, 100);
        assert_eq!(value & 0x1F, 0x1E);
    }

    #[test]
    fn ay_register_roundtrip_via_ports() {
        let mut m = machine_128();
        let mut bus = FastBus(&mut m.board);
        bus.port_out(0xFFFD, 7, 0);
        bus.port_out(0xBFFD, 0x2A, 0);
        assert_eq!(bus.port_in(0xFFFD, 0), 0x2A);
    }

    #[test]
    fn rom_is_write_protected_through_bus() {
        let mut m = machine_128();
        let mut bus = FastBus(&mut m.board);
        bus.write(0x0100, 0xAA, 0);
        assert_eq!(bus.read(0x0100, 0), 0x00);
        bus.write(0x8100, 0xAA, 0);
        assert_eq!(bus.read(0x8100, 0), 0xAA);
    }

    #[test]
    fn frame_interrupt_window() {
        let m = machine_128();
        assert!(m.board.irq_raw(0));
        assert!(m.board.irq_raw(m.board.timings.int_length - 1));
        assert!(!m.board.irq_raw(m.board.timings.int_length));
    }

    #[test]
    fn run_frame_reaches_budget_and_wraps() {
        let mut m = machine_128();
        assert_eq!(m.run_frame(), FrameOutcome::Completed);
        assert!(m.cpu.t >= m.board.timings.ts_per_frame);
        m.finish_frame();
        assert!(m.cpu.t < 100);
        assert_eq!(m.board.clock.frames, 1);
    }

    #[test]
    fn exec_breakpoint_pauses_frame() {
        let mut m = machine_128();
        m.debug_enabled = true;
        m.board.breakpoints.add(spectron_core::debug::Breakpoint {
            addr: 0x0000,
            kind: BreakKind::Exec,
            value: None,
        });
        assert_eq!(m.run_frame(), FrameOutcome::Paused);
    }

    #[test]
    fn call_trace_records_rst_of_interrupt() {
        let mut m = machine_128();
        m.debug_enabled = true;
        m.board.trace_enabled = true;
        // the ROM is zeroed: PC executes NOPs, no control flow recorded
        for _ in 0..100 {
            m.step_instruction();
        }
        assert!(m.board.call_trace.is_empty());
    }

    #[test]
    fn audio_frame_has_expected_length() {
        let mut m = machine_128();
        let mut out = Vec::new();
        m.render_audio(&mut out);
        assert_eq!(out.len(), m.samples_per_frame() * 2);
    }

    #[test]
    fn memory_peek_poke() {
        let mut m = machine_128();
        m.write_memory(0x8000, &[1, 2, 3]);
        let mut buf = [0u8; 3];
        m.read_memory(0x8000, &mut buf);
        assert_eq!(buf, [1, 2, 3]);
    }

    #[test]
    fn trdos_ports_hidden_until_dos_mode() {
        let mut m = Machine::new(Model::Pentagon, 44100);
        let mut bus = FastBus(&mut m.board);
        // without DOS mode 0x1F reads the joystick
        assert_eq!(bus.port_in(0x001F, 0), 0x00);
        m.board.flags.insert(PortFlags::DOS_PORTS);
        let mut bus = FastBus(&mut m.board);
        let status = bus.port_in(0x001F, 0);
        // no disk inserted: the controller reports not ready
        assert!(status & 0x80 != 0);
    }

    #[test]
    fn kempston_answers_on_mirror_ports() {
        let mut m = Machine::new(Model::Pentagon, 44100);
        m.board.joystick = 0x10; // fire
        let mut bus = FastBus(&mut m.board);
        // the partial decode covers 0x1F and every bit-5-clear mirror
        assert_eq!(bus.port_in(0x001F, 0), 0x10);
        assert_eq!(bus.port_in(0x005F, 0), 0x10);
        assert_eq!(bus.port_in(0x009F, 0), 0x10);
        assert_eq!(bus.port_in(0x00DF, 0), 0x10);
        // address bit 5 set is not a Kempston port
        assert_eq!(bus.port_in(0x003F, 0), 0xFF);
        // TR-DOS mode takes the overlapping ports back
        m.board.flags.insert(PortFlags::DOS_PORTS);
        let mut bus = FastBus(&mut m.board);
        assert_ne!(bus.port_in(0x005F, 0), 0x10); // FDC sector register
    }
}

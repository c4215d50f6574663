use crate::font::{FONT, FONT_END_ADDRESS, FONT_START_ADDRESS};
use crate::opcode::Opcode;
use crate::types::{Chip8Error, CycleResult, DISPLAY_X, DISPLAY_Y, Display};
use crate::u4;

const PROGRAM_START_ADDRESS: usize = 0x200;
pub(crate) const MEMORY_SIZE: usize = 4096;
pub(crate) const STACK_DEPTH: usize = 16;

/// CHIP-8 virtual machine state.
///
/// Everything here is reinitialized atomically by `reset`; the font table is
/// the only memory content that survives a reset untouched in value.
pub struct Chip8 {
    /// 4KB of flat addressable memory.
    pub(crate) memory: [u8; MEMORY_SIZE],
    /// 64x32 monochrome framebuffer.
    pub(crate) display: Display<bool>,
    /// Set whenever the framebuffer changes, cleared when the snapshot is taken.
    pub(crate) display_dirty: bool,

    /// Program counter: address of the next instruction.
    pub(crate) pc: u16,
    /// Index register, used by the memory-referencing instructions.
    pub(crate) i: u16,
    /// General-purpose registers V0-VF; VF doubles as the flag register.
    pub(crate) v: [u8; 16],
    /// Fixed-depth call stack with an explicit pointer.
    pub(crate) stack: [u16; STACK_DEPTH],
    pub(crate) sp: usize,

    /// Decremented at the timer clock rate until zero.
    pub(crate) delay_timer: u8,
    pub(crate) sound_timer: u8,

    /// Key whose release the Fx0A instruction is waiting for.
    pub(crate) wait_release_key: Option<u8>,
    /// Keypad snapshot: 16 keys, true = held.
    pub(crate) keypad: [bool; 16],
}

impl Chip8 {
    pub fn new() -> Self {
        let mut chip8 = Chip8 {
            memory: [0; MEMORY_SIZE],
            display: [[false; DISPLAY_X]; DISPLAY_Y],
            display_dirty: false,
            pc: PROGRAM_START_ADDRESS as u16,
            i: 0,
            v: [0; 16],
            stack: [0; STACK_DEPTH],
            sp: 0,
            delay_timer: 0,
            sound_timer: 0,
            wait_release_key: None,
            keypad: [false; 16],
        };
        chip8.reset();
        chip8
    }

    /// Restores the power-on state: clears memory, registers, stack, timers
    /// and the framebuffer, then re-seeds the font table.
    pub fn reset(&mut self) {
        self.memory = [0; MEMORY_SIZE];
        self.memory[FONT_START_ADDRESS..FONT_END_ADDRESS].copy_from_slice(&FONT);

        self.display = [[false; DISPLAY_X]; DISPLAY_Y];
        self.display_dirty = false;
        self.pc = PROGRAM_START_ADDRESS as u16;
        self.i = 0;
        self.v = [0; 16];
        self.stack = [0; STACK_DEPTH];
        self.sp = 0;
        self.delay_timer = 0;
        self.sound_timer = 0;
        self.wait_release_key = None;
        self.keypad = [false; 16];
    }

    /// Resets the machine and copies a program into memory at 0x200.
    ///
    /// A program larger than the available memory is rejected without
    /// copying anything.
    pub fn load(&mut self, program: &[u8]) -> Result<(), Chip8Error> {
        let max_size = MEMORY_SIZE - PROGRAM_START_ADDRESS;
        if program.len() > max_size {
            return Err(Chip8Error::ProgramTooLarge {
                size: program.len(),
                max_size,
            });
        }

        self.reset();
        self.memory[PROGRAM_START_ADDRESS..PROGRAM_START_ADDRESS + program.len()]
            .copy_from_slice(program);

        Ok(())
    }

    /// Executes a single fetch-decode-execute cycle.
    pub fn cpu_cycle(&mut self) -> Result<CycleResult, Chip8Error> {
        let word = self.fetch()?;
        let opcode = Opcode::decode(word);
        self.execute(opcode)
    }

    /// Decrements the delay and sound timers, saturating at zero.
    /// Driven by the timer clock, never by instruction count.
    pub fn timers_cycle(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
    }

    /// True while the sound timer is nonzero.
    pub fn should_beep(&self) -> bool {
        self.sound_timer > 0
    }

    /// Replaces the whole keypad snapshot for the next cycle.
    pub fn set_keypad(&mut self, keys: [bool; 16]) {
        self.keypad = keys;
    }

    /// Sets the state of a single key.
    pub fn set_key(&mut self, key: u4, pressed: bool) {
        self.keypad[key] = pressed;
    }

    /// Read-only snapshot of the framebuffer.
    pub fn display(&self) -> &Display<bool> {
        &self.display
    }

    pub fn pixel(&self, y: usize, x: usize) -> bool {
        self.display[y][x]
    }

    /// Returns whether the framebuffer changed since the last call, and
    /// clears the flag. Lets the renderer skip redundant redraws.
    pub fn take_display_dirty(&mut self) -> bool {
        std::mem::take(&mut self.display_dirty)
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    /// Fetches the 16-bit word at PC, big-endian.
    fn fetch(&mut self) -> Result<u16, Chip8Error> {
        let high = self.mem_read(self.pc)?;
        let low = self.mem_read(self.pc.wrapping_add(1))?;

        Ok(u16::from_be_bytes([high, low]))
    }

    pub(crate) fn mem_read(&self, addr: u16) -> Result<u8, Chip8Error> {
        self.memory
            .get(addr as usize)
            .copied()
            .ok_or(Chip8Error::MemoryOutOfBounds { address: addr })
    }

    pub(crate) fn mem_write(&mut self, addr: u16, value: u8) -> Result<(), Chip8Error> {
        *self
            .memory
            .get_mut(addr as usize)
            .ok_or(Chip8Error::MemoryOutOfBounds { address: addr })? = value;
        Ok(())
    }

    pub(crate) fn stack_push(&mut self, addr: u16) -> Result<(), Chip8Error> {
        if self.sp >= STACK_DEPTH {
            return Err(Chip8Error::StackOverflow);
        }
        self.stack[self.sp] = addr;
        self.sp += 1;
        Ok(())
    }

    pub(crate) fn stack_pop(&mut self) -> Result<u16, Chip8Error> {
        if self.sp == 0 {
            return Err(Chip8Error::StackUnderflow);
        }
        self.sp -= 1;
        Ok(self.stack[self.sp])
    }
}

impl Default for Chip8 {
    fn default() -> Self {
        Self::new()
    }
}

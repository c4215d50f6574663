pub const DISPLAY_X: usize = 64;
pub const DISPLAY_Y: usize = 32;

/// A type alias for the 64x32 monochrome framebuffer.
pub type Display<T> = [[T; DISPLAY_X]; DISPLAY_Y];

/// Outcome of a single fetch-decode-execute cycle.
#[derive(Debug)]
pub enum CycleResult {
    /// Keep executing instructions within the current time slice.
    Continue,
    /// Stop executing until the next frame (the framebuffer changed,
    /// or the machine is parked on a key-wait instruction).
    WaitForNextFrame,
}

/// Error conditions surfaced by the interpreter.
#[derive(Debug, thiserror::Error)]
pub enum Chip8Error {
    #[error("program is too large ({size} bytes), max size is {max_size} bytes")]
    ProgramTooLarge { size: usize, max_size: usize },

    #[error("memory access out of bounds at address {address:#06X}")]
    MemoryOutOfBounds { address: u16 },

    #[error("stack overflow: call depth exceeds 16 nested subroutines")]
    StackOverflow,

    #[error("stack underflow: return with no subroutine call in progress")]
    StackUnderflow,

    #[error("unknown opcode {opcode:#06X} at address {address:#05X}")]
    UnknownOpcode { opcode: u16, address: u16 },
}

impl Chip8Error {
    /// Whether this error must halt the interpreter. Unknown opcodes are
    /// reported but the machine stays live; everything else is fatal.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Chip8Error::UnknownOpcode { .. })
    }
}

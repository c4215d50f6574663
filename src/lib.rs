mod chip8;
mod execute;
mod font;
mod nibble;
mod opcode;
mod runner;
mod types;

pub use chip8::Chip8;
pub use nibble::u4;
pub use opcode::Opcode;
pub use runner::{ClockConfig, Runner};
pub use types::{Chip8Error, CycleResult, DISPLAY_X, DISPLAY_Y, Display};

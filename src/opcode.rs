use crate::u4;

/// A decoded CHIP-8 instruction.
///
/// One variant per instruction in the base set, carrying the operand fields
/// encoded in the 16-bit word: `x`/`y` register indices, `n` nibble,
/// `nn` immediate byte and `nnn` 12-bit address.
#[derive(Debug, PartialEq, Eq)]
pub enum Opcode {
    /// 00E0 - Clear the display.
    ClearDisplay,
    /// 00EE - Return from a subroutine.
    Return,
    /// 1nnn - Jump to address nnn.
    Jump { nnn: u16 },
    /// 2nnn - Call subroutine at nnn.
    Call { nnn: u16 },
    /// 3xnn - Skip next instruction if Vx == nn.
    SkipEqImm { x: u4, nn: u8 },
    /// 4xnn - Skip next instruction if Vx != nn.
    SkipNeImm { x: u4, nn: u8 },
    /// 5xy0 - Skip next instruction if Vx == Vy.
    SkipEqReg { x: u4, y: u4 },
    /// 6xnn - Set Vx = nn.
    LoadImm { x: u4, nn: u8 },
    /// 7xnn - Set Vx = Vx + nn (no carry flag).
    AddImm { x: u4, nn: u8 },
    /// 8xy0 - Set Vx = Vy.
    LoadReg { x: u4, y: u4 },
    /// 8xy1 - Set Vx = Vx OR Vy.
    Or { x: u4, y: u4 },
    /// 8xy2 - Set Vx = Vx AND Vy.
    And { x: u4, y: u4 },
    /// 8xy3 - Set Vx = Vx XOR Vy.
    Xor { x: u4, y: u4 },
    /// 8xy4 - Set Vx = Vx + Vy, VF = carry.
    AddReg { x: u4, y: u4 },
    /// 8xy5 - Set Vx = Vx - Vy, VF = NOT borrow.
    SubReg { x: u4, y: u4 },
    /// 8xy6 - Set Vx = Vx >> 1, VF = shifted-out bit.
    ShiftRight { x: u4 },
    /// 8xy7 - Set Vx = Vy - Vx, VF = NOT borrow.
    SubFrom { x: u4, y: u4 },
    /// 8xyE - Set Vx = Vx << 1, VF = old bit 7.
    ShiftLeft { x: u4 },
    /// 9xy0 - Skip next instruction if Vx != Vy.
    SkipNeReg { x: u4, y: u4 },
    /// Annn - Set I = nnn.
    LoadIndex { nnn: u16 },
    /// Bnnn - Jump to address nnn + V0.
    JumpOffset { nnn: u16 },
    /// Cxnn - Set Vx = random byte AND nn.
    Random { x: u4, nn: u8 },
    /// Dxyn - Draw an 8-wide, n-tall sprite from I at (Vx, Vy), VF = collision.
    Draw { x: u4, y: u4, n: u4 },
    /// Ex9E - Skip next instruction if the key in Vx is pressed.
    SkipKeyPressed { x: u4 },
    /// ExA1 - Skip next instruction if the key in Vx is not pressed.
    SkipKeyNotPressed { x: u4 },
    /// Fx07 - Set Vx = delay timer.
    ReadDelayTimer { x: u4 },
    /// Fx0A - Block until a key press is observed, store the key in Vx.
    WaitForKey { x: u4 },
    /// Fx15 - Set delay timer = Vx.
    SetDelayTimer { x: u4 },
    /// Fx18 - Set sound timer = Vx.
    SetSoundTimer { x: u4 },
    /// Fx1E - Set I = I + Vx.
    AddIndex { x: u4 },
    /// Fx29 - Set I = font glyph address for the digit in Vx.
    FontGlyph { x: u4 },
    /// Fx33 - Store Vx as three decimal digits at I, I+1, I+2.
    StoreBcd { x: u4 },
    /// Fx55 - Store V0..=Vx into memory starting at I.
    StoreRegs { x: u4 },
    /// Fx65 - Load V0..=Vx from memory starting at I.
    LoadRegs { x: u4 },

    /// An opcode matching no known pattern.
    Unknown(u16),
}

impl Opcode {
    /// Decodes a 16-bit instruction word into an `Opcode` variant.
    ///
    /// Pure and total: the highest nibble selects the instruction family,
    /// and the overloaded families (0x0, 0x8, 0xE, 0xF) are discriminated
    /// on the low nibble or low byte. Unmatched words decode to `Unknown`.
    pub fn decode(word: u16) -> Self {
        let high = ((word & 0xF000) >> 12) as u8;
        let x = u4::from_low((word >> 8) as u8);
        let y = u4::from_low((word >> 4) as u8);
        let n = u4::from_low(word as u8);
        let nn = (word & 0x00FF) as u8;
        let nnn = word & 0x0FFF;

        match high {
            0x0 => match nnn {
                0x0E0 => Opcode::ClearDisplay,
                0x0EE => Opcode::Return,
                _ => Opcode::Unknown(word),
            },
            0x1 => Opcode::Jump { nnn },
            0x2 => Opcode::Call { nnn },
            0x3 => Opcode::SkipEqImm { x, nn },
            0x4 => Opcode::SkipNeImm { x, nn },
            0x5 if n == u4::new(0x0) => Opcode::SkipEqReg { x, y },
            0x6 => Opcode::LoadImm { x, nn },
            0x7 => Opcode::AddImm { x, nn },
            0x8 => match n.value() {
                0x0 => Opcode::LoadReg { x, y },
                0x1 => Opcode::Or { x, y },
                0x2 => Opcode::And { x, y },
                0x3 => Opcode::Xor { x, y },
                0x4 => Opcode::AddReg { x, y },
                0x5 => Opcode::SubReg { x, y },
                0x6 => Opcode::ShiftRight { x },
                0x7 => Opcode::SubFrom { x, y },
                0xE => Opcode::ShiftLeft { x },
                _ => Opcode::Unknown(word),
            },
            0x9 if n == u4::new(0x0) => Opcode::SkipNeReg { x, y },
            0xA => Opcode::LoadIndex { nnn },
            0xB => Opcode::JumpOffset { nnn },
            0xC => Opcode::Random { x, nn },
            0xD => Opcode::Draw { x, y, n },
            0xE => match nn {
                0x9E => Opcode::SkipKeyPressed { x },
                0xA1 => Opcode::SkipKeyNotPressed { x },
                _ => Opcode::Unknown(word),
            },
            0xF => match nn {
                0x07 => Opcode::ReadDelayTimer { x },
                0x0A => Opcode::WaitForKey { x },
                0x15 => Opcode::SetDelayTimer { x },
                0x18 => Opcode::SetSoundTimer { x },
                0x1E => Opcode::AddIndex { x },
                0x29 => Opcode::FontGlyph { x },
                0x33 => Opcode::StoreBcd { x },
                0x55 => Opcode::StoreRegs { x },
                0x65 => Opcode::LoadRegs { x },
                _ => Opcode::Unknown(word),
            },
            _ => Opcode::Unknown(word),
        }
    }
}

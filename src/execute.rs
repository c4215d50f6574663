use crate::font::{FONT_START_ADDRESS, GLYPH_SIZE};
use crate::types::{Chip8Error, CycleResult, DISPLAY_X, DISPLAY_Y};
use crate::{Chip8, Opcode, u4};

impl Chip8 {
    /// Applies one decoded instruction to the machine state.
    ///
    /// PC is advanced by 2 up front, so skip instructions add another 2 and
    /// control-flow instructions overwrite it. An unknown opcode leaves the
    /// advanced PC in place and reports the word and its address, keeping
    /// the machine live.
    pub(crate) fn execute(&mut self, opcode: Opcode) -> Result<CycleResult, Chip8Error> {
        self.pc = self.pc.wrapping_add(2);

        match opcode {
            Opcode::ClearDisplay => {
                self.display = [[false; DISPLAY_X]; DISPLAY_Y];
                self.display_dirty = true;
            }
            Opcode::Return => {
                self.pc = self.stack_pop()?;
            }
            Opcode::Jump { nnn } => {
                self.pc = nnn;
            }
            Opcode::Call { nnn } => {
                self.stack_push(self.pc)?;
                self.pc = nnn;
            }
            Opcode::SkipEqImm { x, nn } => {
                if self.v[x] == nn {
                    self.pc = self.pc.wrapping_add(2);
                }
            }
            Opcode::SkipNeImm { x, nn } => {
                if self.v[x] != nn {
                    self.pc = self.pc.wrapping_add(2);
                }
            }
            Opcode::SkipEqReg { x, y } => {
                if self.v[x] == self.v[y] {
                    self.pc = self.pc.wrapping_add(2);
                }
            }
            Opcode::SkipNeReg { x, y } => {
                if self.v[x] != self.v[y] {
                    self.pc = self.pc.wrapping_add(2);
                }
            }
            Opcode::LoadImm { x, nn } => {
                self.v[x] = nn;
            }
            Opcode::AddImm { x, nn } => {
                self.v[x] = self.v[x].wrapping_add(nn);
            }
            Opcode::LoadReg { x, y } => {
                self.v[x] = self.v[y];
            }
            Opcode::Or { x, y } => {
                self.v[x] |= self.v[y];
            }
            Opcode::And { x, y } => {
                self.v[x] &= self.v[y];
            }
            Opcode::Xor { x, y } => {
                self.v[x] ^= self.v[y];
            }
            Opcode::AddReg { x, y } => {
                let (res, carry) = self.v[x].overflowing_add(self.v[y]);
                self.v[x] = res;
                self.v[0xF] = carry as u8;
            }
            Opcode::SubReg { x, y } => {
                let (res, borrow) = self.v[x].overflowing_sub(self.v[y]);
                self.v[x] = res;
                // Inverted polarity: VF = 1 means no borrow occurred
                self.v[0xF] = !borrow as u8;
            }
            Opcode::SubFrom { x, y } => {
                let (res, borrow) = self.v[y].overflowing_sub(self.v[x]);
                self.v[x] = res;
                self.v[0xF] = !borrow as u8;
            }
            Opcode::ShiftRight { x } => {
                let lsb = self.v[x] & 1;
                self.v[x] >>= 1;
                self.v[0xF] = lsb;
            }
            Opcode::ShiftLeft { x } => {
                let msb = self.v[x] >> 7;
                self.v[x] <<= 1;
                self.v[0xF] = msb;
            }
            Opcode::LoadIndex { nnn } => {
                self.i = nnn;
            }
            Opcode::JumpOffset { nnn } => {
                self.pc = nnn.wrapping_add(self.v[0].into());
            }
            Opcode::Random { x, nn } => {
                let byte: u8 = rand::random();
                self.v[x] = byte & nn;
            }
            Opcode::Draw { x, y, n } => {
                return self.execute_draw(x, y, n);
            }
            Opcode::SkipKeyPressed { x } => {
                if self.keypad[(self.v[x] & 0x0F) as usize] {
                    self.pc = self.pc.wrapping_add(2);
                }
            }
            Opcode::SkipKeyNotPressed { x } => {
                if !self.keypad[(self.v[x] & 0x0F) as usize] {
                    self.pc = self.pc.wrapping_add(2);
                }
            }
            Opcode::ReadDelayTimer { x } => {
                self.v[x] = self.delay_timer;
            }
            Opcode::WaitForKey { x } => {
                return Ok(self.execute_wait_for_key(x));
            }
            Opcode::SetDelayTimer { x } => {
                self.delay_timer = self.v[x];
            }
            Opcode::SetSoundTimer { x } => {
                self.sound_timer = self.v[x];
            }
            Opcode::AddIndex { x } => {
                // Keep I a valid address instead of wrapping silently
                self.i = self.i.wrapping_add(self.v[x].into()) & 0x0FFF;
            }
            Opcode::FontGlyph { x } => {
                let digit = self.v[x] & 0x0F;
                self.i = (FONT_START_ADDRESS + digit as usize * GLYPH_SIZE) as u16;
            }
            Opcode::StoreBcd { x } => {
                let value = self.v[x];
                self.mem_write(self.i, value / 100)?;
                self.mem_write(self.i.wrapping_add(1), (value / 10) % 10)?;
                self.mem_write(self.i.wrapping_add(2), value % 10)?;
            }
            Opcode::StoreRegs { x } => {
                for idx in 0..=usize::from(x) {
                    self.mem_write(self.i.wrapping_add(idx as u16), self.v[idx])?;
                }
            }
            Opcode::LoadRegs { x } => {
                for idx in 0..=usize::from(x) {
                    self.v[idx] = self.mem_read(self.i.wrapping_add(idx as u16))?;
                }
            }
            Opcode::Unknown(word) => {
                return Err(Chip8Error::UnknownOpcode {
                    opcode: word,
                    address: self.pc.wrapping_sub(2),
                });
            }
        };

        Ok(CycleResult::Continue)
    }

    /// Dxyn: XOR an 8-wide, n-tall sprite read from I onto the framebuffer.
    ///
    /// The starting coordinates wrap modulo the display size; rows and
    /// columns that would run past the right or bottom edge are clipped.
    /// VF is set to 1 iff any pixel was erased by the XOR.
    fn execute_draw(&mut self, x: u4, y: u4, n: u4) -> Result<CycleResult, Chip8Error> {
        let x_start = self.v[x] as usize % DISPLAY_X;
        let y_start = self.v[y] as usize % DISPLAY_Y;

        let rows = usize::from(n).min(DISPLAY_Y - y_start);
        let cols = 8.min(DISPLAY_X - x_start);

        let mut collision = false;
        for row in 0..rows {
            let sprite_byte = self.mem_read(self.i.wrapping_add(row as u16))?;

            for col in 0..cols {
                if sprite_byte & (0x80 >> col) != 0 {
                    let pixel = &mut self.display[y_start + row][x_start + col];
                    *pixel ^= true;

                    if !*pixel {
                        collision = true;
                    }
                }
            }
        }

        self.v[0xF] = collision as u8;
        self.display_dirty = true;
        Ok(CycleResult::WaitForNextFrame)
    }

    /// Fx0A: park the instruction clock on this instruction until a key is
    /// pressed and then released, storing the released key's code in Vx.
    /// The timer clock is unaffected because it is driven separately.
    fn execute_wait_for_key(&mut self, x: u4) -> CycleResult {
        if let Some(key) = self.wait_release_key
            && !self.keypad[key as usize]
        {
            self.v[x] = key;
            self.wait_release_key = None;
            return CycleResult::Continue;
        }

        if self.wait_release_key.is_none() {
            for key in 0..16 {
                if self.keypad[key as usize] {
                    self.wait_release_key = Some(key as u8);
                    break;
                }
            }
        }

        // Rewind so the instruction repeats next cycle
        self.pc = self.pc.wrapping_sub(2);
        CycleResult::WaitForNextFrame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exec(chip8: &mut Chip8, word: u16) -> Result<CycleResult, Chip8Error> {
        chip8.execute(Opcode::decode(word))
    }

    #[test]
    fn add_with_carry_matches_modular_sum_for_all_pairs() {
        let mut chip8 = Chip8::new();
        for a in 0..=255u16 {
            for b in 0..=255u16 {
                chip8.v[0x1] = a as u8;
                chip8.v[0x2] = b as u8;
                exec(&mut chip8, 0x8124).unwrap();
                assert_eq!(chip8.v[0x1], (a + b) as u8);
                assert_eq!(chip8.v[0xF], (a + b > 255) as u8);
            }
        }
    }

    #[test]
    fn subtract_sets_no_borrow_flag_for_all_pairs() {
        let mut chip8 = Chip8::new();
        for a in 0..=255u8 {
            for b in 0..=255u8 {
                chip8.v[0x1] = a;
                chip8.v[0x2] = b;
                exec(&mut chip8, 0x8125).unwrap();
                assert_eq!(chip8.v[0x1], a.wrapping_sub(b));
                assert_eq!(chip8.v[0xF], (a >= b) as u8);
            }
        }
    }

    #[test]
    fn subtract_reversed_sets_no_borrow_flag() {
        let mut chip8 = Chip8::new();
        chip8.v[0x1] = 0x11;
        chip8.v[0x2] = 0x33;
        exec(&mut chip8, 0x8127).unwrap();
        assert_eq!(chip8.v[0x1], 0x22);
        assert_eq!(chip8.v[0xF], 1);

        chip8.v[0x1] = 0x12;
        chip8.v[0x2] = 0x11;
        exec(&mut chip8, 0x8127).unwrap();
        assert_eq!(chip8.v[0x1], 0xFF);
        assert_eq!(chip8.v[0xF], 0);
    }

    #[test]
    fn shift_right_captures_low_bit() {
        let mut chip8 = Chip8::new();
        chip8.v[0x1] = 0x05;
        exec(&mut chip8, 0x8106).unwrap();
        assert_eq!(chip8.v[0x1], 0x02);
        assert_eq!(chip8.v[0xF], 1);

        chip8.v[0x1] = 0x04;
        exec(&mut chip8, 0x8106).unwrap();
        assert_eq!(chip8.v[0x1], 0x02);
        assert_eq!(chip8.v[0xF], 0);
    }

    #[test]
    fn shift_left_captures_high_bit() {
        let mut chip8 = Chip8::new();
        chip8.v[0x1] = 0xFF;
        exec(&mut chip8, 0x810E).unwrap();
        assert_eq!(chip8.v[0x1], 0xFE);
        assert_eq!(chip8.v[0xF], 1);

        chip8.v[0x1] = 0x04;
        exec(&mut chip8, 0x810E).unwrap();
        assert_eq!(chip8.v[0x1], 0x08);
        assert_eq!(chip8.v[0xF], 0);
    }

    #[test]
    fn bitwise_ops_leave_flag_register_alone() {
        let mut chip8 = Chip8::new();
        chip8.v[0x1] = 0x6;
        chip8.v[0x2] = 0x3;
        chip8.v[0xF] = 0x77;
        exec(&mut chip8, 0x8121).unwrap();
        assert_eq!(chip8.v[0x1], 0x7);
        exec(&mut chip8, 0x8122).unwrap();
        exec(&mut chip8, 0x8123).unwrap();
        assert_eq!(chip8.v[0xF], 0x77);
    }

    #[test]
    fn skip_instructions_advance_pc_by_4_or_2() {
        let mut chip8 = Chip8::new();
        chip8.v[0x1] = 0x42;

        let pc = chip8.pc;
        exec(&mut chip8, 0x3142).unwrap(); // Vx == nn, taken
        assert_eq!(chip8.pc, pc + 4);

        let pc = chip8.pc;
        exec(&mut chip8, 0x3100).unwrap(); // Vx != nn, not taken
        assert_eq!(chip8.pc, pc + 2);

        chip8.v[0x2] = 0x42;
        let pc = chip8.pc;
        exec(&mut chip8, 0x5120).unwrap(); // Vx == Vy, taken
        assert_eq!(chip8.pc, pc + 4);

        let pc = chip8.pc;
        exec(&mut chip8, 0x9120).unwrap(); // Vx != Vy, not taken
        assert_eq!(chip8.pc, pc + 2);
    }

    #[test]
    fn jump_and_jump_with_offset() {
        let mut chip8 = Chip8::new();
        exec(&mut chip8, 0x1ABC).unwrap();
        assert_eq!(chip8.pc, 0xABC);

        chip8.v[0x0] = 0x02;
        exec(&mut chip8, 0xBABC).unwrap();
        assert_eq!(chip8.pc, 0xABE);
    }

    #[test]
    fn call_then_return_resumes_after_call_site() {
        let mut chip8 = Chip8::new();
        chip8.pc = 0x300;
        exec(&mut chip8, 0x2400).unwrap();
        assert_eq!(chip8.pc, 0x400);
        assert_eq!(chip8.sp, 1);

        exec(&mut chip8, 0x00EE).unwrap();
        assert_eq!(chip8.pc, 0x302);
        assert_eq!(chip8.sp, 0);
    }

    #[test]
    fn seventeen_nested_calls_overflow_the_stack() {
        let mut chip8 = Chip8::new();
        for _ in 0..16 {
            exec(&mut chip8, 0x2300).unwrap();
        }
        assert!(matches!(
            exec(&mut chip8, 0x2300),
            Err(Chip8Error::StackOverflow)
        ));
    }

    #[test]
    fn return_with_empty_stack_underflows() {
        let mut chip8 = Chip8::new();
        assert!(matches!(
            exec(&mut chip8, 0x00EE),
            Err(Chip8Error::StackUnderflow)
        ));
    }

    #[test]
    fn random_is_masked_by_immediate() {
        let mut chip8 = Chip8::new();
        chip8.v[0x1] = 0xFF;
        exec(&mut chip8, 0xC100).unwrap();
        assert_eq!(chip8.v[0x1], 0x00);

        exec(&mut chip8, 0xC20F).unwrap();
        assert_eq!(chip8.v[0x2] & 0xF0, 0x00);
    }

    #[test]
    fn bcd_stores_decimal_digits() {
        let mut chip8 = Chip8::new();
        chip8.v[0x1] = 157;
        chip8.i = 0x300;
        exec(&mut chip8, 0xF133).unwrap();
        assert_eq!(chip8.memory[0x300..0x303], [1, 5, 7]);
    }

    #[test]
    fn store_and_load_registers_leave_index_unchanged() {
        let mut chip8 = Chip8::new();
        chip8.i = 0x300;
        chip8.v[0x0..0x4].copy_from_slice(&[0x1, 0x2, 0x3, 0x4]);
        exec(&mut chip8, 0xF355).unwrap();
        assert_eq!(chip8.memory[0x300..0x304], [0x1, 0x2, 0x3, 0x4]);
        assert_eq!(chip8.i, 0x300);

        chip8.v = [0; 16];
        exec(&mut chip8, 0xF365).unwrap();
        assert_eq!(chip8.v[0x0..0x4], [0x1, 0x2, 0x3, 0x4]);
        assert_eq!(chip8.i, 0x300);
    }

    #[test]
    fn add_index_masks_to_valid_address_range() {
        let mut chip8 = Chip8::new();
        chip8.i = 0xFFF;
        chip8.v[0x1] = 0x02;
        exec(&mut chip8, 0xF11E).unwrap();
        assert_eq!(chip8.i, 0x001);
    }

    #[test]
    fn font_glyph_address_reproduces_glyph_bytes() {
        let mut chip8 = Chip8::new();
        chip8.v[0x1] = 0x0;
        exec(&mut chip8, 0xF129).unwrap();
        assert_eq!(chip8.i, 0x000);
        assert_eq!(
            chip8.memory[chip8.i as usize..chip8.i as usize + 5],
            [0xF0, 0x90, 0x90, 0x90, 0xF0]
        );

        chip8.v[0x1] = 0xA;
        exec(&mut chip8, 0xF129).unwrap();
        assert_eq!(chip8.i, 0xA * 5);
    }

    #[test]
    fn draw_sets_pixel_then_collides_on_redraw() {
        let mut chip8 = Chip8::new();
        chip8.i = 0x300;
        chip8.memory[0x300] = 0x80; // single top-left bit

        exec(&mut chip8, 0xD001).unwrap();
        assert!(chip8.display[0][0]);
        assert_eq!(chip8.v[0xF], 0);
        assert!(chip8.take_display_dirty());

        exec(&mut chip8, 0xD001).unwrap();
        assert!(!chip8.display[0][0]);
        assert_eq!(chip8.v[0xF], 1);
        assert!(chip8.take_display_dirty());
    }

    #[test]
    fn draw_wraps_start_coordinates() {
        let mut chip8 = Chip8::new();
        chip8.i = 0x300;
        chip8.memory[0x300] = 0x80;
        chip8.v[0x1] = 64; // wraps to column 0
        chip8.v[0x2] = 33; // wraps to row 1

        exec(&mut chip8, 0xD121).unwrap();
        assert!(chip8.display[1][0]);
    }

    #[test]
    fn draw_clips_at_right_and_bottom_edges() {
        let mut chip8 = Chip8::new();
        chip8.i = 0x300;
        chip8.memory[0x300..0x302].copy_from_slice(&[0xFF, 0xFF]);
        chip8.v[0x1] = 62;
        chip8.v[0x2] = 31;

        exec(&mut chip8, 0xD122).unwrap();
        // Only the two rightmost columns of the last row are drawn
        assert!(chip8.display[31][62]);
        assert!(chip8.display[31][63]);
        assert!(!chip8.display[31][0]);
        assert!(!chip8.display[0][62]);
        assert_eq!(chip8.v[0xF], 0);
    }

    #[test]
    fn clear_display_marks_framebuffer_dirty() {
        let mut chip8 = Chip8::new();
        chip8.display[5][5] = true;
        exec(&mut chip8, 0x00E0).unwrap();
        assert!(!chip8.display[5][5]);
        assert!(chip8.take_display_dirty());
        assert!(!chip8.take_display_dirty());
    }

    #[test]
    fn key_skips_follow_keypad_snapshot() {
        let mut chip8 = Chip8::new();
        chip8.v[0x1] = 0xE;
        let mut keys = [false; 16];
        keys[0xE] = true;
        chip8.set_keypad(keys);

        let pc = chip8.pc;
        exec(&mut chip8, 0xE19E).unwrap();
        assert_eq!(chip8.pc, pc + 4);

        let pc = chip8.pc;
        exec(&mut chip8, 0xE1A1).unwrap();
        assert_eq!(chip8.pc, pc + 2);
    }

    #[test]
    fn wait_for_key_repeats_until_press_and_release() {
        let mut chip8 = Chip8::new();
        let pc = chip8.pc;

        // No key held: the instruction repeats in place
        exec(&mut chip8, 0xF10A).unwrap();
        assert_eq!(chip8.pc, pc);

        // Key goes down: still waiting for the release
        chip8.set_key(u4::new(0x5), true);
        exec(&mut chip8, 0xF10A).unwrap();
        assert_eq!(chip8.pc, pc);
        assert_eq!(chip8.wait_release_key, Some(0x5));

        // Key released: the code lands in Vx and execution moves on
        chip8.set_key(u4::new(0x5), false);
        exec(&mut chip8, 0xF10A).unwrap();
        assert_eq!(chip8.pc, pc + 2);
        assert_eq!(chip8.v[0x1], 0x5);
        assert_eq!(chip8.wait_release_key, None);
    }

    #[test]
    fn timers_are_readable_and_writable_through_registers() {
        let mut chip8 = Chip8::new();
        chip8.v[0x1] = 0x30;
        exec(&mut chip8, 0xF115).unwrap();
        assert_eq!(chip8.delay_timer, 0x30);

        exec(&mut chip8, 0xF118).unwrap();
        assert_eq!(chip8.sound_timer, 0x30);

        exec(&mut chip8, 0xF207).unwrap();
        assert_eq!(chip8.v[0x2], 0x30);
    }

    #[test]
    fn unknown_opcode_reports_address_and_advances_pc() {
        let mut chip8 = Chip8::new();
        chip8.pc = 0x250;
        let err = exec(&mut chip8, 0xFFFF).unwrap_err();
        assert!(matches!(
            err,
            Chip8Error::UnknownOpcode {
                opcode: 0xFFFF,
                address: 0x250
            }
        ));
        assert!(!err.is_fatal());
        assert_eq!(chip8.pc, 0x252);
    }

    #[test]
    fn draw_out_of_bounds_sprite_read_is_fatal() {
        let mut chip8 = Chip8::new();
        chip8.i = 0xFFF;
        let err = exec(&mut chip8, 0xD002).unwrap_err();
        assert!(matches!(err, Chip8Error::MemoryOutOfBounds { .. }));
        assert!(err.is_fatal());
    }
}

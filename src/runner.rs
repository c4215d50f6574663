use crate::types::{Chip8Error, CycleResult};
use crate::{Chip8, u4};

/// Clock rates for the two periodic schedules driving the machine.
///
/// The instruction clock and the timer clock are independent: neither is
/// derived from the other or from the render frame rate.
#[derive(Clone, Copy, Debug)]
pub struct ClockConfig {
    /// Instruction fetch-decode-execute rate.
    pub cpu_hz: f32,
    /// Delay/sound timer decrement rate.
    pub timer_hz: f32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            cpu_hz: 700.0,
            timer_hz: 60.0,
        }
    }
}

/// Tolerance for the accumulator comparisons, so that feeding exactly one
/// second of delta time yields exactly `timer_hz` ticks despite the time
/// steps not being representable in binary.
const TICK_EPSILON: f64 = 1e-9;

/// Drives a `Chip8` from elapsed wall-clock time.
///
/// `update` accumulates delta time and runs however many timer ticks and CPU
/// cycles are due, so instruction throughput never affects the timer rate.
pub struct Runner {
    chip8: Chip8,
    cpu_time_step: f64,
    timer_time_step: f64,
    cpu_dt_accumulator: f64,
    timer_dt_accumulator: f64,
}

impl Runner {
    pub fn new(chip8: Chip8, config: ClockConfig) -> Self {
        Self {
            chip8,
            cpu_time_step: 1.0 / config.cpu_hz as f64,
            timer_time_step: 1.0 / config.timer_hz as f64,
            cpu_dt_accumulator: 0.0,
            timer_dt_accumulator: 0.0,
        }
    }

    /// Advances the machine by `dt` seconds of wall-clock time.
    ///
    /// Unknown opcodes are logged and skipped (PC has already moved past
    /// them); fatal errors halt the batch and propagate to the caller.
    /// A draw instruction ends the batch early and drops any backlog so the
    /// machine does not burst to catch up on the next frame.
    pub fn update(&mut self, dt: f32) -> Result<(), Chip8Error> {
        self.cpu_dt_accumulator += dt as f64;
        self.timer_dt_accumulator += dt as f64;

        while self.timer_dt_accumulator + TICK_EPSILON >= self.timer_time_step {
            self.timer_dt_accumulator -= self.timer_time_step;
            self.chip8.timers_cycle();
        }

        while self.cpu_dt_accumulator + TICK_EPSILON >= self.cpu_time_step {
            self.cpu_dt_accumulator -= self.cpu_time_step;

            match self.chip8.cpu_cycle() {
                Ok(CycleResult::Continue) => {}
                Ok(CycleResult::WaitForNextFrame) => {
                    self.cpu_dt_accumulator = 0.0;
                    break;
                }
                Err(err @ Chip8Error::UnknownOpcode { .. }) => {
                    log::warn!("{err}");
                }
                Err(err) => {
                    self.cpu_dt_accumulator = 0.0;
                    return Err(err);
                }
            }
        }

        Ok(())
    }

    /// True while the sound timer is active.
    pub fn should_beep(&self) -> bool {
        self.chip8.should_beep()
    }

    /// Set the state of a single keypad key.
    pub fn set_key(&mut self, key: u4, pressed: bool) {
        self.chip8.set_key(key, pressed)
    }

    /// Replace the whole keypad snapshot.
    pub fn set_keypad(&mut self, keys: [bool; 16]) {
        self.chip8.set_keypad(keys)
    }

    /// Whether the framebuffer changed since the last call; clears the flag.
    pub fn take_display_dirty(&mut self) -> bool {
        self.chip8.take_display_dirty()
    }

    pub fn pixel(&self, y: usize, x: usize) -> bool {
        self.chip8.pixel(y, x)
    }

    pub fn chip8(&self) -> &Chip8 {
        &self.chip8
    }

    pub fn chip8_mut(&mut self) -> &mut Chip8 {
        &mut self.chip8
    }
}

use std::{path::PathBuf, sync::Arc, time::Instant};

use anyhow::Context;
use clap::Parser;
use pixels::{Pixels, SurfaceTexture};
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key, KeyCode, NamedKey},
    window::{Window, WindowId},
};

use chip8_vm::{Chip8, ClockConfig, DISPLAY_X, DISPLAY_Y, Runner, u4};

const WINDOW_SCALE: u32 = 10;

const PIXEL_ON: [u8; 4] = [0x00, 0xFF, 0x00, 0xFF];
const PIXEL_OFF: [u8; 4] = [0x00, 0x00, 0x00, 0xFF];

/// Mapping from physical keyboard keys to the hex keypad (0x0-0xF).
const KEY_MAP: [KeyCode; 16] = [
    KeyCode::KeyX,   // 0x00
    KeyCode::Digit1, // 0x01
    KeyCode::Digit2, // 0x02
    KeyCode::Digit3, // 0x03
    KeyCode::KeyQ,   // 0x04
    KeyCode::KeyW,   // 0x05
    KeyCode::KeyE,   // 0x06
    KeyCode::KeyA,   // 0x07
    KeyCode::KeyS,   // 0x08
    KeyCode::KeyD,   // 0x09
    KeyCode::KeyZ,   // 0x0A
    KeyCode::KeyC,   // 0x0B
    KeyCode::Digit4, // 0x0C
    KeyCode::KeyR,   // 0x0D
    KeyCode::KeyF,   // 0x0E
    KeyCode::KeyV,   // 0x0F
];

struct App {
    pixels: Option<Pixels<'static>>,
    window: Option<Arc<Window>>,

    runner: Runner,
    /// Used for delta time calculation.
    last_frame_instant: Instant,

    /// Stores the result of the application to be returned from main.
    exit_result: anyhow::Result<()>,
}

impl App {
    fn new(program: &[u8], clocks: ClockConfig) -> anyhow::Result<Self> {
        let mut chip8 = Chip8::default();
        chip8
            .load(program)
            .context("Failed to load program into memory")?;

        Ok(Self {
            pixels: None,
            window: None,
            runner: Runner::new(chip8, clocks),
            last_frame_instant: Instant::now(),
            exit_result: Ok(()),
        })
    }

    /// Copies the framebuffer snapshot into the pixel surface.
    fn blit_display(&mut self) {
        let frame = self.pixels.as_mut().unwrap().frame_mut();

        for (i, pixel) in frame.chunks_exact_mut(4).enumerate() {
            let x = i % DISPLAY_X;
            let y = i / DISPLAY_X;

            let rgba = if self.runner.pixel(y, x) {
                PIXEL_ON
            } else {
                PIXEL_OFF
            };
            pixel.copy_from_slice(&rgba);
        }
    }

    fn try_resumed(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let window = {
            let size = LogicalSize::new(
                DISPLAY_X as u32 * WINDOW_SCALE,
                DISPLAY_Y as u32 * WINDOW_SCALE,
            );
            let min_size = LogicalSize::new(DISPLAY_X as u32, DISPLAY_Y as u32);

            Arc::new(
                event_loop
                    .create_window(
                        Window::default_attributes()
                            .with_title("chip8-vm")
                            .with_inner_size(size)
                            .with_min_inner_size(min_size),
                    )
                    .context("Failed to create window")?,
            )
        };

        self.window = Some(window.clone());
        self.pixels = {
            let window_size = window.inner_size();
            let surface_texture =
                SurfaceTexture::new(window_size.width, window_size.height, window.clone());

            let pixels = Pixels::new(DISPLAY_X as u32, DISPLAY_Y as u32, surface_texture)
                .context("Failed to create pixels surface")?;

            window.request_redraw();
            Some(pixels)
        };

        // Avoid a large dt on the first frame
        self.last_frame_instant = Instant::now();
        Ok(())
    }

    fn try_window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        event: WindowEvent,
    ) -> anyhow::Result<()> {
        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::Escape),
                        ..
                    },
                ..
            } => {
                // Stops the machine cleanly between cycles
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                self.pixels
                    .as_mut()
                    .unwrap()
                    .resize_surface(size.width, size.height)
                    .context("Failed to resize pixels surface")?;
            }

            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let dt = (now - self.last_frame_instant).as_secs_f32();
                self.last_frame_instant = now;

                self.runner.update(dt).context("Execution error")?;

                // Only repaint the surface when the framebuffer changed
                if self.runner.take_display_dirty() {
                    self.blit_display();
                }

                self.pixels
                    .as_ref()
                    .unwrap()
                    .render()
                    .context("Pixels render error")?;

                self.window.as_ref().unwrap().request_redraw();
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if let Some(key) = KEY_MAP.iter().position(|&k| k == event.physical_key) {
                    let pressed = event.state == ElementState::Pressed;
                    self.runner.set_key(u4::new(key as u8), pressed);
                }
            }

            _ => (),
        }
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let Err(e) = self.try_resumed(event_loop) {
            self.exit_result = Err(e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if let Err(e) = self.try_window_event(event_loop, event) {
            self.exit_result = Err(e);
            event_loop.exit();
        }
    }
}

/// CHIP-8 virtual machine.
///
/// Keys 1-4, Q-R, A-F, Z-V map to the hex keypad.
/// Escape exits the emulator.
#[derive(Parser, Debug)]
#[command(about)]
struct Args {
    /// Path to the CHIP-8 program file
    program_path: PathBuf,

    /// Instruction clock rate in Hz
    #[arg(long, default_value_t = 700.0)]
    cpu_hz: f32,

    /// Timer clock rate in Hz
    #[arg(long, default_value_t = 60.0)]
    timer_hz: f32,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();

    let program = std::fs::read(&args.program_path).context("Failed to read program file")?;

    let clocks = ClockConfig {
        cpu_hz: args.cpu_hz,
        timer_hz: args.timer_hz,
    };

    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(&program, clocks).context("Failed to initialize application")?;
    event_loop
        .run_app(&mut app)
        .context("Error occurred during event loop execution")?;

    // Return the result captured during the event loop
    app.exit_result
}

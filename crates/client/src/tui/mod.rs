mod screens;

use std::io;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, Event, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
    PushKeyboardEnhancementFlags,
};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use rally::Transport;

use crate::app::SyncEngine;
use crate::debug::DebugStats;
use crate::game::{KeyCommand, KeyboardInput};
use crate::net::Intent;

pub struct Tui {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    keyboard: KeyboardInput,
    stats: DebugStats,
    enhanced_keys: bool,
    should_quit: bool,
}

impl Tui {
    pub fn new() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, cursor::Hide)?;

        // Release events need the kitty keyboard protocol.
        let enhanced_keys = terminal::supports_keyboard_enhancement().unwrap_or(false);
        if enhanced_keys {
            execute!(
                stdout,
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
        }
        log::info!("Key release reporting: {}", enhanced_keys);

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(Self {
            terminal,
            keyboard: KeyboardInput::new(enhanced_keys),
            stats: DebugStats::new(),
            enhanced_keys,
            should_quit: false,
        })
    }

    /// Runs the frame loop until the player quits.
    pub fn run<T: Transport>(&mut self, engine: &mut SyncEngine<T>) -> io::Result<()> {
        let frame_interval = engine.config().frame_interval();
        let mut last_frame = Instant::now();

        while !self.should_quit {
            let frame_start = Instant::now();

            while event::poll(Duration::ZERO)? {
                if let Event::Key(key) = event::read()? {
                    if let Some(command) = self.keyboard.handle_key(key, frame_start) {
                        self.handle_command(command, engine);
                    }
                }
            }

            engine.tick(frame_start, self.keyboard.input_state(frame_start));

            self.stats
                .record_frame(frame_start.saturating_duration_since(last_frame).as_secs_f32());
            self.stats
                .observe_snapshots(engine.snapshots_applied(), frame_start);
            last_frame = frame_start;

            self.draw(engine, frame_start)?;

            let spent = frame_start.elapsed();
            if spent < frame_interval {
                std::thread::sleep(frame_interval - spent);
            }
        }

        engine.shutdown();
        Ok(())
    }

    fn handle_command<T: Transport>(&mut self, command: KeyCommand, engine: &mut SyncEngine<T>) {
        let intent = match command {
            KeyCommand::Quit => {
                self.should_quit = true;
                return;
            }
            KeyCommand::RestartOrRetry if engine.is_failed() => {
                if let Err(e) = engine.retry() {
                    log::error!("Retry failed: {}", e);
                }
                return;
            }
            KeyCommand::RestartOrRetry => Intent::RestartGame,
            KeyCommand::StartOrPause => engine.primary_intent(),
            KeyCommand::NextMatch => Intent::NextMatch,
        };

        if let Err(e) = engine.request(intent) {
            log::debug!("Ignored key: {}", e);
        }
    }

    fn draw<T: Transport>(&mut self, engine: &SyncEngine<T>, now: Instant) -> io::Result<()> {
        let stats = &self.stats;
        self.terminal.draw(|frame| {
            screens::render(frame, engine, stats, now);
        })?;
        Ok(())
    }

    pub fn restore_terminal(&mut self) -> io::Result<()> {
        if self.enhanced_keys {
            execute!(self.terminal.backend_mut(), PopKeyboardEnhancementFlags)?;
            self.enhanced_keys = false;
        }
        terminal::disable_raw_mode()?;
        execute!(
            self.terminal.backend_mut(),
            LeaveAlternateScreen,
            cursor::Show
        )?;
        Ok(())
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        let _ = self.restore_terminal();
    }
}

pub fn run<T: Transport>(engine: &mut SyncEngine<T>) -> io::Result<()> {
    let mut tui = Tui::new()?;
    let result = tui.run(engine);
    tui.restore_terminal()?;
    result
}

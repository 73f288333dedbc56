//! Interactive terminal renderer and its headless test harness.

use std::{
    env,
    fs::{self, File},
    io::{self, Stdout},
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::{CrosstermBackend, TestBackend},
    widgets::Paragraph,
};
use serde::Serialize;
use slugsim_core::{TickEvents, World};
use tracing::{debug, info};

const DEFAULT_HEADLESS_FRAMES: usize = 64;
const MAX_HEADLESS_FRAMES: usize = 4096;
const HEADLESS_WIDTH: u16 = 80;
const HEADLESS_HEIGHT: u16 = 24;

/// Interactive terminal front end driving a [`World`].
///
/// Signals reach the world strictly in arrival order: a resize that lands
/// between two ticks takes effect before the next culling pass, and a quit
/// key stops the loop once the current signal finishes.
pub struct TerminalRenderer {
    tick_interval: Duration,
}

impl TerminalRenderer {
    /// Build a renderer beating at the given tick interval.
    #[must_use]
    pub fn new(tick_interval: Duration) -> Self {
        Self { tick_interval }
    }

    /// Launch the renderer; blocks until the session completes.
    ///
    /// With `SLUGSIM_TERMINAL_HEADLESS` set, the session runs a bounded
    /// number of frames against an in-memory backend instead of the TTY.
    pub fn run(&self, world: World) -> Result<()> {
        if env::var_os("SLUGSIM_TERMINAL_HEADLESS").is_some() {
            let report = self.run_headless(world)?;
            info!(
                frames = report.summary.frame_count,
                final_tick = report.summary.final_tick,
                final_entities = report.summary.final_entity_count,
                total_spawned = report.summary.total_spawned,
                total_culled = report.summary.total_culled,
                "terminal headless run completed"
            );
            return Ok(());
        }

        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enable raw mode")?;
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to build terminal backend")?;
        terminal.hide_cursor().ok();

        let result = self.run_event_loop(&mut terminal, world);

        terminal.show_cursor().ok();
        if let Err(err) = disable_raw_mode() {
            tracing::error!(?err, "failed to disable raw mode");
        }
        if let Err(err) = execute!(terminal.backend_mut(), LeaveAlternateScreen) {
            tracing::error!(?err, "failed to leave alternate screen");
        }

        result
    }

    fn run_event_loop(
        &self,
        terminal: &mut Terminal<CrosstermBackend<Stdout>>,
        world: World,
    ) -> Result<()> {
        let mut app = TerminalApp::new(world);

        // The first extent arrives before the first tick, mirroring the
        // resize event a windowing host would deliver on startup.
        let size = terminal.size().context("failed to query terminal size")?;
        app.resize(size.width, size.height);

        let mut next_tick = Instant::now() + self.tick_interval;
        loop {
            terminal.draw(|frame| app.draw(frame))?;

            let timeout = next_tick.saturating_duration_since(Instant::now());
            if event::poll(timeout)? {
                match event::read()? {
                    Event::Key(key) => {
                        if app.handle_key(key) {
                            break;
                        }
                    }
                    Event::Resize(width, height) => app.resize(width, height),
                    other => debug!(event = ?other, "ignoring terminal event"),
                }
            } else {
                app.tick();
                next_tick = Instant::now() + self.tick_interval;
            }
        }

        Ok(())
    }

    fn run_headless(&self, world: World) -> Result<HeadlessReport> {
        let backend = TestBackend::new(HEADLESS_WIDTH, HEADLESS_HEIGHT);
        let mut terminal = Terminal::new(backend).context("failed to build test backend")?;
        let mut app = TerminalApp::new(world);

        let size = terminal.size()?;
        app.resize(size.width, size.height);

        let mut report = HeadlessReport::new(&app);
        for _ in 0..headless_frame_budget() {
            let events = app.step_world();
            report.record(&app, events);
            terminal.draw(|frame| app.draw(frame))?;
        }
        report.finalize();

        if let Some(path) = report_file_path_from_env() {
            report
                .write_json(&path)
                .with_context(|| format!("failed to write headless report to {}", path.display()))?;
        }

        Ok(report)
    }
}

fn headless_frame_budget() -> usize {
    env::var("SLUGSIM_TERMINAL_HEADLESS_FRAMES")
        .ok()
        .and_then(|raw| raw.trim().parse::<usize>().ok())
        .filter(|value| *value > 0)
        .map(|value| value.min(MAX_HEADLESS_FRAMES))
        .unwrap_or(DEFAULT_HEADLESS_FRAMES)
}

fn report_file_path_from_env() -> Option<PathBuf> {
    env::var_os("SLUGSIM_TERMINAL_HEADLESS_REPORT").map(PathBuf::from)
}

struct TerminalApp {
    world: World,
    paused: bool,
}

impl TerminalApp {
    fn new(world: World) -> Self {
        Self {
            world,
            paused: false,
        }
    }

    fn resize(&mut self, width: u16, height: u16) {
        debug!(width, height, "terminal resized");
        self.world.resize(u32::from(width), u32::from(height));
    }

    fn tick(&mut self) {
        if self.paused {
            return;
        }
        self.step_world();
    }

    fn step_world(&mut self) -> TickEvents {
        let events = self.world.step();
        if events.spawned || events.culled > 0 {
            debug!(
                tick = events.tick.0,
                spawned = events.spawned,
                culled = events.culled,
                entities = self.world.entity_count(),
                "population changed"
            );
        }
        events
    }

    /// Returns true when the session should end.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        match (key.code, key.modifiers) {
            (KeyCode::Esc, _)
            | (KeyCode::Char('q') | KeyCode::Char('Q'), _)
            | (KeyCode::Char('c'), KeyModifiers::CONTROL) => return true,
            (KeyCode::Char(' '), _) => {
                self.paused = !self.paused;
                info!(paused = self.paused, "pause toggled");
            }
            (KeyCode::Char('s'), _) => {
                self.step_world();
                self.paused = true;
            }
            _ => debug!(key = ?key.code, "unhandled key"),
        }
        false
    }

    fn draw(&self, frame: &mut Frame<'_>) {
        frame.render_widget(Paragraph::new(self.world.snapshot()), frame.area());
    }
}

#[derive(Debug, Clone, Serialize)]
struct FrameStats {
    tick: u64,
    entity_count: usize,
    spawned: bool,
    culled: usize,
}

impl FrameStats {
    fn capture(app: &TerminalApp, events: TickEvents) -> Self {
        Self {
            tick: events.tick.0,
            entity_count: app.world.entity_count(),
            spawned: events.spawned,
            culled: events.culled,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
struct ReportSummary {
    frame_count: usize,
    final_tick: u64,
    final_entity_count: usize,
    total_spawned: usize,
    total_culled: usize,
}

impl ReportSummary {
    fn from_frames(frames: &[FrameStats]) -> Self {
        let last = frames.last();
        Self {
            frame_count: frames.len(),
            final_tick: last.map_or(0, |f| f.tick),
            final_entity_count: last.map_or(0, |f| f.entity_count),
            total_spawned: frames.iter().filter(|f| f.spawned).count(),
            total_culled: frames.iter().map(|f| f.culled).sum(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct HeadlessReport {
    initial_entity_count: usize,
    frames: Vec<FrameStats>,
    summary: ReportSummary,
}

impl HeadlessReport {
    fn new(app: &TerminalApp) -> Self {
        Self {
            initial_entity_count: app.world.entity_count(),
            frames: Vec::new(),
            summary: ReportSummary::default(),
        }
    }

    fn record(&mut self, app: &TerminalApp, events: TickEvents) {
        self.frames.push(FrameStats::capture(app, events));
    }

    fn finalize(&mut self) {
        self.summary = ReportSummary::from_frames(&self.frames);
    }

    fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self).context("failed to serialize headless report")?;
        Ok(())
    }
}

mod demo;
mod logging;
mod status;

use std::io::{self, BufWriter, Stdout, Write};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::style::ResetColor;
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use tracing::info;

use conframe_core::{CrosstermSurface, FrameBuffer, FrameDumpExtension};

use crate::status::StatusLine;

#[derive(Parser)]
#[command(name = "conframe-view", about = "Draw a bitmap or an animated demo in the terminal")]
struct Cli {
    /// Bitmap to display (runs the built-in demo when omitted)
    image: Option<PathBuf>,

    /// Frame limit handed to the engine; the cycle floor is 1000 / (fps - 1) ms
    #[arg(long, default_value_t = 61)]
    fps: u32,

    /// Draw as fast as possible
    #[arg(long)]
    no_limit: bool,

    /// Quit after this many seconds
    #[arg(long)]
    seconds: Option<u64>,

    /// Overlay fps and frame stats on the bottom row
    #[arg(long)]
    status: bool,

    /// Dump frames as JSON into this directory
    #[arg(long)]
    dump_dir: Option<PathBuf>,

    /// Dump only every N-th frame
    #[arg(long, default_value_t = 60)]
    dump_every: u64,

    /// Write logs to this file (filter with CONFRAME_LOG)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_file.as_deref())?;

    let surface = CrosstermSurface::stdout().context("failed to query terminal size")?;
    let (term_cols, term_rows) = surface.size();

    let mut fb = match &cli.image {
        Some(path) => FrameBuffer::from_file(path, surface)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => FrameBuffer::with_size(surface, term_cols, term_rows),
    };

    if fb.width() > term_cols || fb.height() > term_rows {
        eprintln!(
            "Warning: terminal is {}x{} but the image needs {}x{}. Cells outside the terminal are skipped.",
            term_cols,
            term_rows,
            fb.width(),
            fb.height()
        );
    }

    fb.set_frame_limit(cli.fps)?;
    fb.set_use_frame_limiter(!cli.no_limit);

    if let Some(dir) = &cli.dump_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        fb.add_draw_extension(Box::new(FrameDumpExtension::new(dir).every(cli.dump_every)));
    }
    if cli.status {
        fb.add_draw_extension(Box::new(StatusLine::default()));
    }

    // Set up panic hook for terminal cleanup
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        cleanup_terminal();
        original_hook(info);
    }));

    terminal::enable_raw_mode().context("enable raw mode")?;
    crossterm::execute!(io::stdout(), EnterAlternateScreen, Clear(ClearType::All))
        .context("enter alt screen")?;

    let result = run_session(&mut fb, &cli);
    cleanup_terminal();
    result
}

type TermFrameBuffer = FrameBuffer<CrosstermSurface<BufWriter<Stdout>>>;

fn run_session(fb: &mut TermFrameBuffer, cli: &Cli) -> anyhow::Result<()> {
    let stop = Arc::new(AtomicBool::new(false));
    let painter = if cli.image.is_none() {
        let handle = demo::spawn(fb.grid_handle(), Arc::clone(&stop))
            .context("failed to spawn demo thread")?;
        Some(handle)
    } else {
        None
    };

    let result = fb
        .run()
        .map_err(anyhow::Error::from)
        .and_then(|()| {
            info!(width = fb.width(), height = fb.height(), "drawing");
            wait_for_quit(cli.seconds)
        });

    if let Some(handle) = painter {
        demo::finish(&stop, handle);
    }
    fb.dispose();
    info!(frames = fb.drawn_frames(), fps = fb.draw_fps(), "stopped");
    result
}

/// Block until `q`, `Esc`, Ctrl-C, or the optional timeout.
fn wait_for_quit(seconds: Option<u64>) -> anyhow::Result<()> {
    let deadline = seconds.map(|s| Instant::now() + Duration::from_secs(s));
    loop {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Ok(());
        }
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(KeyEvent { code, modifiers, .. }) = event::read()? {
                match code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                    KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                        return Ok(())
                    }
                    _ => {}
                }
            }
        }
    }
}

fn cleanup_terminal() {
    let mut stdout = io::stdout();
    let _ = crossterm::execute!(
        stdout,
        ResetColor,
        crossterm::cursor::Show,
        LeaveAlternateScreen
    );
    let _ = stdout.flush();
    let _ = terminal::disable_raw_mode();
}

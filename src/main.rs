use std::fs::File;
use std::io::{stdout, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossterm::{
    event::{DisableFocusChange, EnableFocusChange, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode},
};
use log::info;
use simplelog::{Config, LevelFilter, WriteLogger};

use readroom::config::ViewerConfig;
use readroom::engine::MupdfEngine;
use readroom::input::{EventSource, TerminalEventSource};
use readroom::panic_handler;
use readroom::render::ViewportSize;
use readroom::sync::{HttpProgressClient, LocalProgressCache, ProgressError};
use readroom::Viewer;

// Rough pixel size of one terminal cell, good enough for fit-scale math
const CELL_WIDTH_PX: u32 = 8;
const CELL_HEIGHT_PX: u32 = 16;

#[derive(Parser, Debug)]
#[command(name = "readroom", about = "Reading-session demo viewer")]
struct Cli {
    /// Local PDF file to open
    file: Option<PathBuf>,

    /// Book id to fetch from the server instead of a local file
    #[arg(long, conflicts_with = "file")]
    book_id: Option<String>,

    /// Persistence API base URL (overrides config)
    #[arg(long)]
    server: Option<String>,

    /// Bearer credential (overrides config); without one, session tracking
    /// stays off
    #[arg(long)]
    token: Option<String>,

    /// Log file path
    #[arg(long, default_value = "readroom.log")]
    log_file: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    panic_handler::initialize_panic_handler();
    WriteLogger::init(
        LevelFilter::Debug,
        Config::default(),
        File::create(&cli.log_file)?,
    )?;
    info!("starting readroom viewer");

    let mut config = ViewerConfig::load();
    if let Some(server) = cli.server.clone() {
        config.server_url = server;
    }
    if let Some(token) = cli.token.clone() {
        config.token = Some(token);
    }

    let book_id = match (&cli.file, &cli.book_id) {
        (Some(path), _) => path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "local".to_string()),
        (None, Some(id)) => id.clone(),
        (None, None) => bail!("pass a PDF file or --book-id"),
    };

    let store = match &config.token {
        Some(token) => Some(HttpProgressClient::new(&config.server_url, token)?),
        None => None,
    };

    let bytes = match &cli.file {
        Some(path) => std::fs::read(path).with_context(|| format!("reading {}", path.display()))?,
        None => {
            let client = store
                .as_ref()
                .context("--book-id requires a token for the document fetch")?;
            match client.fetch_document(&book_id) {
                Ok(bytes) => bytes,
                Err(ProgressError::Unauthorized { return_path }) => {
                    bail!("session expired, sign in and return to {return_path}");
                }
                Err(e) => return Err(e.into()),
            }
        }
    };

    let local = LocalProgressCache::load_or_ephemeral(config.progress_cache_file().as_deref());

    let (cols, rows) = crossterm::terminal::size()?;
    let viewport = ViewportSize::new(u32::from(cols) * CELL_WIDTH_PX, u32::from(rows) * CELL_HEIGHT_PX);

    let now = Instant::now();
    let mut viewer = Viewer::open(
        book_id,
        MupdfEngine::new(),
        bytes,
        viewport,
        store,
        local,
        &config,
        now,
    );

    enable_raw_mode()?;
    execute!(stdout(), EnableFocusChange)?;
    let result = run_loop(&mut viewer, &mut TerminalEventSource);
    execute!(stdout(), DisableFocusChange)?;
    disable_raw_mode()?;

    viewer.close(Instant::now());
    if viewer.take_progress_refresh() {
        let telemetry = viewer.telemetry();
        println!(
            "\nsession over: page {}/{}, {} pages read, {}s total",
            telemetry.page,
            telemetry.page_count,
            telemetry.session.totals.total_pages_read,
            telemetry.session.totals.total_reading_time,
        );
    }

    result
}

fn run_loop<S: EventSource>(
    viewer: &mut Viewer<HttpProgressClient>,
    events: &mut S,
) -> Result<()> {
    loop {
        if events.poll(Duration::from_millis(100))? {
            let now = Instant::now();
            match events.read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    viewer.handle_key(key.code, now);
                }
                Event::Resize(cols, rows) => {
                    viewer.on_resize(
                        ViewportSize::new(
                            u32::from(cols) * CELL_WIDTH_PX,
                            u32::from(rows) * CELL_HEIGHT_PX,
                        ),
                        now,
                    );
                }
                Event::FocusGained => viewer.on_focus_gained(now),
                Event::FocusLost => viewer.on_focus_lost(now),
                _ => {}
            }
        }

        let now = Instant::now();
        viewer.pump(now);

        if let Some(error) = viewer.load_error() {
            bail!("could not open document: {error}");
        }
        if let Some(return_path) = viewer.auth_return_path() {
            bail!("session expired, sign in and return to {return_path}");
        }
        if viewer.is_closed() {
            return Ok(());
        }

        draw_status(viewer)?;
    }
}

fn draw_status(viewer: &Viewer<HttpProgressClient>) -> Result<()> {
    let telemetry = viewer.telemetry();
    let session = if telemetry.session.status == readroom::session::SessionStatus::Active {
        format!(
            "reading {}s (+{} pages)",
            telemetry.session.session_seconds, telemetry.session.totals.total_pages_read
        )
    } else {
        "paused".to_string()
    };
    let notice = viewer
        .notices()
        .current()
        .map(|n| format!("  [{}]", n.message))
        .unwrap_or_default();

    let mut out = stdout();
    write!(
        out,
        "\r\x1b[2Kpage {}/{}  zoom {}%  {}{}",
        telemetry.page, telemetry.page_count, telemetry.zoom_percent, session, notice
    )?;
    out.flush()?;
    Ok(())
}

//! REPL – Read-Eval-Print Loop over a simulated AR session.
//!
//! Supported slash-commands:
//!   /host               – request a room code and start hosting
//!   /resolve [room]     – resolve every anchor from `room` down to the floor
//!   /rooms              – ask the server for the highest room in use
//!   /tap <x> <y>        – place an anchor at a screen point (HOSTING only)
//!   /frames <n>         – advance the session by `n` frames
//!   /camera <state>     – set the simulated camera to tracking/paused/stopped
//!   /capture            – capture the next tracked frame and classify it
//!   /status             – print mode, room, anchors and render variant
//!   /reset              – return to NONE, keeping resolved anchors
//!   /quit | /exit       – exit the CLI

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anchorsight_kernel::host_resolve::TapEvent;
use anchorsight_middleware::bus::{EventBus, Topic, TopicReceiver};
use anchorsight_middleware::collaborator::ArFrame;
use anchorsight_middleware::sim::{SimArSession, SimCloudAnchorService, SimRoomDirectory};
use anchorsight_perception::motion::SensorEvent;
use anchorsight_runtime::capture::{CaptureConfig, CapturePayload};
use anchorsight_runtime::classifier::ClassifierClient;
use anchorsight_runtime::room_chain::ROOM_FLOOR;
use anchorsight_runtime::session::{ArSession, FrameOutput};
use anchorsight_types::{EventPayload, NoticeLevel, TrackingState};
use tokio::sync::broadcast::error::TryRecvError;
use tracing::warn;

use crate::config::Config;

/// Simulated display size handed to the projector.
const SCREEN: (u32, u32) = (1080, 1920);

/// Whether the REPL keeps reading after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Everything one interactive session owns.
pub struct Shell {
    ar: SimArSession,
    rooms: Arc<SimRoomDirectory>,
    session: ArSession,
    classifier: Option<ClassifierClient>,
    runtime: tokio::runtime::Runtime,
    notices: TopicReceiver,
}

impl Shell {
    pub fn new(cfg: &Config, bus: EventBus) -> Result<Self, String> {
        let classifier = match ClassifierClient::new(&cfg.classifier_url, &cfg.rooms_url) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!(error = %e, "classifier client unavailable, captures stay local");
                None
            }
        };
        Self::build(cfg.capture, classifier, bus)
    }

    fn build(
        capture: CaptureConfig,
        classifier: Option<ClassifierClient>,
        bus: EventBus,
    ) -> Result<Self, String> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| format!("Failed to start async runtime: {}", e))?;
        let ar = SimArSession::new();
        let rooms = Arc::new(SimRoomDirectory::new().with_last_room_code(ROOM_FLOOR));
        let cloud = Arc::new(SimCloudAnchorService::new(ar.clone()));
        let notices = bus.subscribe_to(Topic::Notices);
        let mut session = ArSession::new(capture, cloud, rooms.clone(), bus);
        session.on_surface_changed(SCREEN.0, SCREEN.1);
        Ok(Self {
            ar,
            rooms,
            session,
            classifier,
            runtime,
            notices,
        })
    }

    pub fn session(&self) -> &ArSession {
        &self.session
    }

    /// Run one command line.
    pub fn execute(&mut self, line: &str) -> Flow {
        let mut words = line.split_whitespace();
        let Some(cmd) = words.next() else {
            return Flow::Continue;
        };
        let args: Vec<&str> = words.collect();

        match cmd {
            "/help" => cmd_help(),
            "/host" => self.cmd_host(),
            "/resolve" => self.cmd_resolve(&args),
            "/rooms" => {
                self.highest_room();
            }
            "/tap" => self.cmd_tap(&args),
            "/frames" => self.cmd_frames(&args),
            "/camera" => self.cmd_camera(&args),
            "/capture" => self.cmd_capture(),
            "/status" => self.cmd_status(),
            "/reset" => {
                let left = self.session.reset();
                println!("  Mode {:?} → {}", left, "NONE".bold());
            }
            "/quit" | "/exit" => {
                println!("{}", "Goodbye.".green());
                return Flow::Quit;
            }
            other => {
                println!(
                    "{} '{}'. Type {} for available commands.",
                    "Unknown command:".red(),
                    other.yellow(),
                    "/help".bold()
                );
            }
        }
        self.drain_notices();
        Flow::Continue
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Command handlers
    // ─────────────────────────────────────────────────────────────────────────

    fn cmd_host(&mut self) {
        match self.session.begin_hosting() {
            Ok(()) => match self.session.room_code() {
                Some(room) => println!(
                    "  {} Hosting in room {}. Use {} to place an anchor.",
                    "✓".green().bold(),
                    room.to_string().bold(),
                    "/tap <x> <y>".cyan()
                ),
                None => println!("  Waiting for a room code …"),
            },
            Err(e) => println!("{}: {}", "Cannot host".red(), e),
        }
    }

    fn cmd_resolve(&mut self, args: &[&str]) {
        let room = match args.first() {
            Some(raw) => match raw.parse::<u64>() {
                Ok(room) => room,
                Err(_) => {
                    println!("{} '{}'", "Not a room number:".red(), raw.yellow());
                    return;
                }
            },
            None => self.highest_room(),
        };
        match self.session.resolve_room(room) {
            Ok(chain) => println!(
                "  {} Listening on {} room(s): {:?}",
                "✓".green().bold(),
                chain.len(),
                chain
            ),
            Err(e) => println!("{}: {}", "Cannot resolve".red(), e),
        }
    }

    fn cmd_tap(&mut self, args: &[&str]) {
        let coords: Option<(f32, f32)> = match args {
            [x, y] => x.parse().ok().zip(y.parse().ok()),
            _ => None,
        };
        let Some((x, y)) = coords else {
            println!("  Usage: {}", "/tap <x> <y>".cyan());
            return;
        };
        if !self.session.on_single_tap(TapEvent::new(x, y)) {
            println!("  {} taps are only accepted while HOSTING", "Ignored:".yellow());
            return;
        }
        let before = self.session.store().len();
        let out = self.step();
        if self.session.store().len() > before {
            println!("  {} Anchor placed and hosted", "✓".green().bold());
        } else {
            println!("  {} no anchor placed", "✗".red());
        }
        self.report(out);
    }

    fn cmd_frames(&mut self, args: &[&str]) {
        let n = match args.first().map(|raw| raw.parse::<u32>()) {
            None => 1,
            Some(Ok(n)) => n,
            Some(Err(_)) => {
                println!("  Usage: {}", "/frames <n>".cyan());
                return;
            }
        };
        let mut last = None;
        for _ in 0..n {
            let out = self.step();
            if out.payload.is_some() {
                self.report(out);
                last = None;
            } else {
                last = Some(out);
            }
        }
        if let Some(out) = last {
            self.report(out);
        }
    }

    fn cmd_camera(&mut self, args: &[&str]) {
        let state = match args.first().map(|s| s.to_ascii_lowercase()) {
            Some(s) if s == "tracking" => TrackingState::Tracking,
            Some(s) if s == "paused" => TrackingState::Paused,
            Some(s) if s == "stopped" => TrackingState::Stopped,
            _ => {
                println!("  Usage: {}", "/camera <tracking|paused|stopped>".cyan());
                return;
            }
        };
        self.ar.set_camera_tracking(state);
        println!("  Camera {:?}", state);
    }

    fn cmd_capture(&mut self) {
        self.session.request_capture();
        let out = self.step();
        if out.payload.is_none() {
            println!(
                "  {} camera is {:?}; capture runs on the next tracked frame",
                "Deferred:".yellow(),
                out.camera
            );
        }
        self.report(out);
    }

    fn cmd_status(&self) {
        println!("{}", "Session".bold().underline());
        println!("  Mode      : {:?}", self.session.current_mode());
        match self.session.room_code() {
            Some(room) => println!("  Room      : {}", room),
            None => println!("  Room      : {}", "-".dimmed()),
        }
        println!("  Anchors   : {}", self.session.store().len());
        println!("  Visible   : {:?}", self.session.snapshot_visible_anchor_ids());
        println!("  Frames    : {}", self.session.frames().len());
        let variant = self.session.variant();
        println!("  Model     : {} ({})", variant.label, variant.model_path.dimmed());
        match &self.classifier {
            Some(c) => println!("  Classifier: {}", c.classify_url()),
            None => println!("  Classifier: {}", "offline".yellow()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// Advance the simulation by one frame with synthetic motion around it.
    fn step(&mut self) -> FrameOutput {
        let frame = self.ar.update();
        let ts = frame.timestamp_ns();
        self.session
            .record_sensor(SensorEvent::gyroscope(ts, [0.01, 0.02, 0.0]));
        self.session
            .record_sensor(SensorEvent::accelerometer(ts, [0.0, 9.81, 0.2]));
        self.session.on_draw_frame(&frame)
    }

    fn report(&mut self, out: FrameOutput) {
        println!(
            "  Camera {:?}: {} visible, {} drawn",
            out.camera,
            out.visible_ids.len(),
            out.draws.len()
        );
        for draw in &out.draws {
            let m = draw.render_matrix();
            println!(
                "    {} at ({:.2}, {:.2}, {:.2}) x{}",
                draw.anchor_id.dimmed(),
                m.at(0, 3),
                m.at(1, 3),
                m.at(2, 3),
                m.at(0, 0)
            );
        }
        if let Some(payload) = out.payload {
            self.classify(payload);
        }
    }

    fn classify(&mut self, payload: CapturePayload) {
        println!(
            "  Capture at {} ns with {} field(s)",
            payload.frame_timestamp_ns,
            payload.len()
        );
        let Some(client) = &self.classifier else {
            println!("  {}", "Classifier offline; payload not sent.".dimmed());
            return;
        };
        match self
            .runtime
            .block_on(self.session.submit_capture(client, &payload))
        {
            Ok(true) => println!(
                "  {} Model switched to {}",
                "✓".green().bold(),
                self.session.variant().label.to_string().bold()
            ),
            Ok(false) => println!("  Model unchanged"),
            Err(e) => println!("  {}: {}", "Classification failed".red(), e),
        }
    }

    /// Highest room from the server, falling back to the local directory.
    fn highest_room(&mut self) -> u64 {
        let local = self.rooms.last_room_code();
        let Some(client) = &self.classifier else {
            println!("  Highest room: {} (local)", local.to_string().bold());
            return local;
        };
        match self.runtime.block_on(client.fetch_highest_room()) {
            Ok(room) => {
                println!("  Highest room: {}", room.to_string().bold());
                room
            }
            Err(e) => {
                println!("  {} {} – using local {}", "Rooms lookup failed:".yellow(), e, local);
                local
            }
        }
    }

    fn drain_notices(&mut self) {
        loop {
            match self.notices.try_recv() {
                Ok(event) => {
                    if let EventPayload::Notice { level, message } = event.payload {
                        let tag = match level {
                            NoticeLevel::Info => "ℹ".cyan(),
                            NoticeLevel::Error => "!".red().bold(),
                        };
                        for line in message.lines() {
                            println!("  {} {}", tag, line);
                        }
                    }
                }
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    }
}

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(mut shell: Shell, shutdown: Arc<AtomicBool>) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        let mode = format!("{:?}", shell.session().current_mode()).to_lowercase();
        print!("{} ", format!("anchorsight[{}]>", mode).bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        if shell.execute(line.trim()) == Flow::Quit {
            shutdown.store(true, Ordering::SeqCst);
            break;
        }
    }
}

fn cmd_help() {
    println!();
    println!("{}", "AnchorSight Commands".bold().underline());
    println!("  {}            – request a room and start hosting", "/host".bold().cyan());
    println!("  {}  – resolve anchors from a room downwards", "/resolve [room]".bold().cyan());
    println!("  {}           – highest room in use", "/rooms".bold().cyan());
    println!("  {}     – place an anchor (HOSTING)", "/tap <x> <y>".bold().cyan());
    println!("  {}      – advance the simulation", "/frames <n>".bold().cyan());
    println!("  {}  – tracking / paused / stopped", "/camera <state>".bold().cyan());
    println!("  {}         – capture and classify", "/capture".bold().cyan());
    println!("  {}          – session summary", "/status".bold().cyan());
    println!("  {}           – back to NONE", "/reset".bold().cyan());
    println!("  {}     – exit the CLI", "/quit  /exit".bold().cyan());
    println!();
}

//! `anchorsight-cli` – AnchorSight command line interface.
//!
//! This binary drives a complete anchor session against in-process
//! collaborators.  It:
//!
//! 1. Checks for `~/.anchorsight/config.toml`; runs a **First-Run Wizard**
//!    when the file is absent.
//! 2. Builds a simulated AR session, cloud-anchor service and room
//!    directory, wired to the classifier endpoints from the config.
//! 3. Drops the user into an **interactive REPL** with slash-commands
//!    (`/host`, `/resolve`, `/tap`, `/frames`, `/capture`, `/help`, …).
//! 4. Intercepts **Ctrl-C** to post a notice and exit the REPL.

mod config;
mod repl;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

use anchorsight_middleware::EventBus;
use anchorsight_types::NoticeLevel;

fn main() {
    // Set ANCHORSIGHT_LOG_FORMAT=json for newline-delimited JSON logs.
    // User-facing output still goes through println!.
    let _guard = anchorsight_runtime::init_tracing("anchorsight");

    print_banner();

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    let bus = EventBus::default();
    let bus_ctrlc = bus.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
        bus_ctrlc.notice("anchorsight-cli", NoticeLevel::Info, "operator Ctrl-C");
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    let cfg = match config::load() {
        Ok(None) => run_first_run_wizard(),
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    };

    println!("  Classifier : {}", cfg.classifier_url.dimmed());
    println!("  Rooms      : {}", cfg.rooms_url.dimmed());
    println!(
        "  Users      : {}",
        if cfg.capture.multi_user { "multi" } else { "single" }
    );

    let shell = match repl::Shell::new(&cfg, bus) {
        Ok(shell) => shell,
        Err(e) => {
            println!("{}: {}", "Startup failed".red(), e);
            std::process::exit(1);
        }
    };

    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    repl::run(shell, shutdown);
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() -> config::Config {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║     AnchorSight First-Run Wizard     ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's set up AnchorSight.\n");

    let mut cfg = config::Config::default();

    cfg.classifier_url = prompt_line(
        &format!("  Classifier URL [{}]: ", cfg.classifier_url),
        &cfg.classifier_url,
    );
    cfg.rooms_url = prompt_line(
        &format!("  Rooms URL [{}]: ", cfg.rooms_url),
        &cfg.rooms_url,
    );

    println!("  Will several devices share each room?");
    println!("    1) Single user (default)");
    println!("    2) Multi user");
    let choice = prompt_line("  Enter choice [1]: ", "1");
    cfg.capture.multi_user = choice.trim() == "2";

    let frames = prompt_line("  Upload the whole frame history with each capture? [y/N]: ", "n");
    cfg.capture.previous_frames = frames.trim().eq_ignore_ascii_case("y");

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"    ___               __               _____ _       __    __ "#.bold().cyan());
    println!("{}", r#"   /   |  ____  _____/ /_  ____  _____/ ___/(_)___ _/ /_  / /_"#.bold().cyan());
    println!("{}", r#"  / /| | / __ \/ ___/ __ \/ __ \/ ___/\__ \/ / __ `/ __ \/ __/"#.bold().cyan());
    println!("{}", r#" / ___ |/ / / / /__/ / / / /_/ / /   ___/ / / /_/ / / / / /_  "#.bold().cyan());
    println!("{}", r#"/_/  |_/_/ /_/\___/_/ /_/\____/_/   /____/_/\__, /_/ /_/\__/  "#.bold().cyan());
    println!("{}", r#"                                           /____/             "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "AnchorSight".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Shared cloud anchors with on-device capture");
    println!();
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn prompt_line(msg: &str, default: &str) -> String {
    use std::io::{BufRead, Write};
    print!("{}", msg);
    std::io::stdout().flush().ok();
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let t = line.trim().to_string();
            if t.is_empty() { default.to_string() } else { t }
        }
        Err(_) => default.to_string(),
    }
}

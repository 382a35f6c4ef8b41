//! `burro-sim` – Scripted end-to-end run of the onboard pipeline
//!
//! This binary drives the full stack against a canned world.  It:
//!
//! 1. Initialises structured logging (`BURRO_LOG`, `BURRO_LOG_FORMAT=json`).
//! 2. Loads `~/.burro/config.toml`, falling back to defaults.
//! 3. Wires scripted sensors and a recording servo bank into a
//!    [`ControlLoop`] and hands it the demo route.
//! 4. Ticks at the configured rate, printing a status line once a second,
//!    until the route completes or **Ctrl-C** arrives.
//! 5. Parks the servos at neutral on the way out.

mod world;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tracing::{error, info, warn};

use burro_decision::arbiter::Verdict;
use burro_hal::servo::ServoChannel;
use burro_runtime::config;
use burro_runtime::control_loop::{ControlLoop, TickReport};
use burro_runtime::telemetry;

fn main() {
    // ── Structured logging ────────────────────────────────────────────────
    // Terminal output below stays on println! for UX consistency; everything
    // the pipeline itself reports goes through tracing.
    telemetry::init_tracing();

    print_banner();

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::RuntimeConfig::default()
        }
    };
    info!(tick_hz = cfg.tick_hz, "configuration loaded");

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – parking servos …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    // ── Control loop ──────────────────────────────────────────────────────
    let mut control = ControlLoop::new(&cfg, world::devices(&cfg));
    control.set_route(Some(world::demo_route()));
    if let Err(e) = control.neutralize() {
        error!(error = %e, "failed to park servos at startup");
    }

    let status_every = u64::from(cfg.tick_hz.max(1));
    let mut ticks: u64 = 0;
    while !shutdown.load(Ordering::SeqCst) {
        match control.tick() {
            Ok(report) => {
                ticks += 1;
                if ticks % status_every == 0 {
                    print_status(&control, &report);
                }
                if control.route().is_some_and(|r| r.is_complete()) {
                    println!();
                    println!("{}", "  ✓ Route complete.".green().bold());
                    break;
                }
            }
            Err(e) => {
                error!(error = %e, "tick failed");
                break;
            }
        }
        thread::sleep(cfg.tick_interval());
    }

    if let Err(e) = control.neutralize() {
        error!(error = %e, "failed to park servos on shutdown");
    }
    println!("{}", "  ✓ Servos parked at neutral. Goodbye.".green());
}

// ─────────────────────────────────────────────────────────────────────────────
// Status line
// ─────────────────────────────────────────────────────────────────────────────

fn print_status(control: &ControlLoop, report: &TickReport) {
    let pose = &control.body().estimated;
    let fix = if control.body().has_fix {
        "fix".green()
    } else {
        "no-fix".yellow()
    };
    let verdict = match report.verdict {
        Verdict::Idle => "idle".dimmed(),
        Verdict::Acted { utility, .. } => format!("acting (u={utility:.2})").cyan(),
    };
    println!(
        "  t={:6.1}s  pos=({:6.2}, {:6.2})  {fix}  regions={}  hdg={:6.1}°  steer={:5.1}  {verdict}",
        report.now,
        pose.position.x,
        pose.position.y,
        control.regions().len(),
        pose.heading_angle.to_degrees(),
        control.servos().position(ServoChannel::Steering),
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║      burro-sim · scripted world      ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Burro".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Perception-to-action pipeline on a scripted course");
    println!();
}

//! maskwatchd - mask-detection pipeline daemon
//!
//! Wires the full pipeline (device → dispatcher → detector → aggregator) and
//! logs every status change. With the default stub source it runs entirely on
//! synthetic frames; build with `--features device-v4l2` and set the camera
//! source to "v4l2" for a real local camera.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;

use maskwatch::{
    detector_from_config, host_from_config, FrameDispatcher, MaskwatchConfig, SessionController,
    StatusAggregator, StatusObserver,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Run duration in seconds (0 = run until interrupted).
    #[arg(long, default_value_t = 10)]
    seconds: u64,
    /// Switch between front and back camera every N seconds.
    #[arg(long)]
    switch_every: Option<u64>,
    /// Start as if camera access had been denied (exercises the denial path).
    #[arg(long, default_value_t = false)]
    deny_access: bool,
}

struct LogObserver;

impl StatusObserver for LogObserver {
    fn on_status_changed(&self, text: &str) {
        log::info!("status: {}", text);
    }

    fn on_access_denied(&self) {
        log::warn!("no camera access");
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let cfg = MaskwatchConfig::load()?;
    log::info!(
        "camera source={} position={} detector={} debounce={}ms",
        cfg.camera.source,
        cfg.camera.initial_position,
        cfg.detector.backend,
        cfg.debounce.as_millis()
    );

    let host = host_from_config(&cfg.camera)?;
    let detector = detector_from_config(&cfg.detector)?;
    let observer: Arc<dyn StatusObserver> = Arc::new(LogObserver);
    let aggregator = Arc::new(StatusAggregator::new(observer.clone(), cfg.debounce));
    let generation = Arc::new(AtomicU64::new(0));
    let dispatcher = FrameDispatcher::new(detector, aggregator.clone(), generation.clone());
    let controller = SessionController::spawn(
        host,
        dispatcher,
        aggregator,
        observer,
        generation,
        cfg.camera.initial_position,
    );

    controller.configure(!args.deny_access);

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = interrupted.clone();
        ctrlc::set_handler(move || interrupted.store(true, Ordering::SeqCst))?;
    }

    let started = Instant::now();
    let mut last_switch = Instant::now();
    while !interrupted.load(Ordering::SeqCst) {
        if args.seconds > 0 && started.elapsed() >= Duration::from_secs(args.seconds) {
            break;
        }
        if controller.state() == maskwatch::SessionState::Stopped {
            break;
        }
        if let Some(every) = args.switch_every {
            if last_switch.elapsed() >= Duration::from_secs(every)
                && controller.state() == maskwatch::SessionState::Running
            {
                log::info!("switching camera (currently {})", controller.active_position());
                controller.switch_camera();
                last_switch = Instant::now();
            }
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    controller.stop();
    controller.shutdown()?;
    log::info!("maskwatchd exiting");
    Ok(())
}

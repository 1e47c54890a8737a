//! fallwatch - run the fall alert pipeline over a frame source
//!
//! This binary:
//! 1. Reads frames from a local JPEG directory or a `stub://` synthetic source
//! 2. Runs the configured detector backend on each frame
//! 3. Debounces fall detections per session and logs alert transitions
//! 4. Writes the annotated frames as JPEGs to the output directory

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fallwatch::{
    encode_jpeg, open_source, AlertTransition, BackendRegistry, FallwatchConfig, Frame,
    NoSignalPolicy, ScriptedBackend, SessionRegistry,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Frame source: a local directory of JPEGs or stub://<name>.
    #[arg(long, env = "FALLWATCH_SOURCE")]
    source: Option<String>,
    /// Output directory for annotated frames.
    #[arg(long)]
    out: Option<PathBuf>,
    /// JSON-lines detection script replayed one line per frame.
    #[arg(long)]
    script: Option<PathBuf>,
    /// ONNX model for the tract backend (requires the backend-tract feature).
    #[arg(long)]
    model: Option<PathBuf>,
    /// TrueType font for the warning text and labels.
    #[arg(long)]
    font: Option<PathBuf>,
    /// Session identifier used in logs.
    #[arg(long, default_value = "default")]
    session: String,
    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,
    /// What to do on frames that fail to decode or detect: hold or reset.
    #[arg(long)]
    no_signal: Option<NoSignalPolicy>,
    /// Do not write annotated frames.
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = FallwatchConfig::load()?;
    if let Some(source) = args.source {
        cfg.source.url = source;
    }
    if let Some(out) = args.out {
        cfg.output.dir = out;
    }
    if let Some(script) = args.script {
        cfg.detector.script_path = Some(script);
    }
    if let Some(model) = args.model {
        cfg.detector.model_path = Some(model);
    }
    if let Some(policy) = args.no_signal {
        cfg.render.no_signal = policy;
    }
    if let Some(font) = args.font {
        cfg.font_path = Some(font);
        cfg.render.font = cfg.load_font()?;
    }

    let detectors = build_detectors(&cfg)?;
    detectors.warm_up_all()?;
    log::info!("detector backends: {:?}", detectors.list());

    let mut source = open_source(&cfg.source.url, cfg.source.target_fps)?;
    source.connect()?;

    if !args.dry_run {
        std::fs::create_dir_all(&cfg.output.dir).with_context(|| {
            format!(
                "failed to create output directory {}",
                cfg.output.dir.display()
            )
        })?;
    }

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
            .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;
    }

    let mut sessions = SessionRegistry::new(cfg.render.clone(), cfg.blink_period);
    let session = sessions.open(&args.session)?;

    log::info!(
        "fallwatch running. source={}, threshold={:.2}s, classes={:?}, no_signal={:?}",
        cfg.source.url,
        cfg.render.persistence_threshold.as_secs_f64(),
        cfg.render.qualifying_classes.sorted(),
        cfg.render.no_signal
    );

    let mut written = 0u64;
    while !stop.load(Ordering::SeqCst) {
        if args
            .max_frames
            .is_some_and(|max| source.stats().frames_captured >= max)
        {
            break;
        }
        let Some(encoded) = source.next_frame()? else {
            log::info!("source exhausted");
            break;
        };

        let outcome = {
            let mut guard = session
                .lock()
                .map_err(|_| anyhow!("session lock poisoned"))?;
            guard.process(Frame::decode(&encoded, cfg.source.max_width), &detectors)
        };

        match outcome.transition {
            Some(AlertTransition::Raised { elapsed }) => log::warn!(
                "FALL DETECTED at {:.2}s (persisted {:.2}s)",
                encoded.captured_at.as_secs_f64(),
                elapsed.as_secs_f64()
            ),
            Some(AlertTransition::Cleared) => log::info!(
                "alert cleared at {:.2}s",
                encoded.captured_at.as_secs_f64()
            ),
            None => {}
        }

        if let Some(frame) = outcome.frame {
            if !args.dry_run {
                let bytes = encode_jpeg(&frame, cfg.output.jpeg_quality)?;
                let path = cfg.output.dir.join(output_name(&encoded.label));
                std::fs::write(&path, bytes)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                written += 1;
            }
        }
    }

    let stats = session
        .lock()
        .map_err(|_| anyhow!("session lock poisoned"))?
        .stats()
        .clone();
    sessions.close(&args.session);
    log::info!(
        "processed {} ticks ({} without signal), {} alerts raised, {} frames written",
        stats.ticks,
        stats.no_signal_ticks,
        stats.alerts_raised,
        written
    );
    Ok(())
}

fn build_detectors(cfg: &FallwatchConfig) -> Result<BackendRegistry> {
    let mut registry = BackendRegistry::new();
    if let Some(model) = &cfg.detector.model_path {
        #[cfg(feature = "backend-tract")]
        {
            registry.register(fallwatch::detect::TractBackend::new(
                model,
                cfg.detector.class_names.clone(),
            )?);
        }
        #[cfg(not(feature = "backend-tract"))]
        {
            return Err(anyhow!(
                "model {} requires the backend-tract feature",
                model.display()
            ));
        }
    }
    if let Some(script) = &cfg.detector.script_path {
        registry.register(ScriptedBackend::from_path(script)?);
    }
    if registry.list().is_empty() {
        log::warn!("no detector configured; every frame will be treated as no signal");
    }
    Ok(registry)
}

fn output_name(label: &str) -> String {
    let stem = label
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(label);
    format!("{}_alert.jpg", stem)
}

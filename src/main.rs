use anyhow::{Context, Result};
use serde_json::json;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;
use vfx_core::{Animation, Engine, MemorySurface, SharedSurface, ThreadHost, VfxConfig, chain};

fn main() -> Result<()> {
    let _ = env_logger::try_init();

    let config = VfxConfig::load();
    let engine = Engine::new(&config)?;
    let host = ThreadHost::spawn(config.host.interval())?;
    let scheduler = engine.scheduler(host.clone());

    let panel = Arc::new(
        MemorySurface::new("panel")
            .with_property("width", "100px")
            .with_property("opacity", "0"),
    );
    let targets = [panel.clone() as SharedSurface];

    let frames = chain(
        &engine,
        &targets,
        &[
            Animation::new(400)
                .reverse(true)
                .animate("width", json!({ "value": 320, "easing": "ease-out-back" }))
                .animate("opacity", json!({ "value": 1 })),
            Animation::new(300)
                .animate("background-color", json!({ "value": "#3366ff" }))
                .animate("rotate", json!({ "value": 90 })),
        ],
    )?;

    let last = frames.last().context("empty chain")?;
    let (tx, rx) = mpsc::channel();
    last.on_end(move |status| {
        let _ = tx.send(status.frame_id);
    });

    let first = frames.first().context("empty chain")?;
    first.on_progress({
        let panel = Arc::clone(&panel);
        move |status| {
            log::debug!(
                "{} cycle {} width {:?}",
                status.frame_id,
                status.cycle,
                panel.value("width")
            );
        }
    });

    scheduler.start(Arc::clone(first))?;
    let ended = rx
        .recv_timeout(Duration::from_secs(10))
        .context("animation did not finish")?;
    log::info!("{ended} finished");
    host.stop();

    for property in ["width", "opacity", "background-color", "transform"] {
        println!("{property}: {}", panel.value(property).unwrap_or_default());
    }
    Ok(())
}

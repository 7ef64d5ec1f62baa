use std::{env, f64::consts::TAU, path::PathBuf, time::Duration};

use anyhow::{anyhow, bail, Context as _, Result};
use easel::{
    logger, Canvas, CanvasConfig, Color, Draw, FrameScheduler, HeadlessProbe,
    HeadlessWindowSystem, Point, Style,
};
use log::LevelFilter;

const WIDTH: u32 = 320;
const HEIGHT: u32 = 240;

fn draw_scene(canvas: &Canvas) -> Result<()> {
    let mut frame = canvas.frame();
    let (w, h) = (WIDTH as i32, HEIGHT as i32);
    let axis = Color::gray_scale(160);
    frame.draw_line(Point::new(0, h / 2), Point::new(w - 1, h / 2), axis)?;
    frame.draw_line(Point::new(w / 2, 0), Point::new(w / 2, h - 1), axis)?;

    let amplitude = f64::from(h) / 3.0;
    let curve: Vec<Point> = (0..w)
        .map(|x| {
            let phase = f64::from(x) / f64::from(w) * TAU;
            Point::new(x, h / 2 - (phase.sin() * amplitude).round() as i32)
        })
        .collect();
    for pair in curve.windows(2) {
        frame.draw_line_with_width(pair[0], pair[1], Color::BLUE, 2)?;
    }

    frame.draw_rect(
        20,
        20,
        60,
        40,
        Style::fill_and_stroke(Color::rgba(255, 0, 0, 128), Color::RED),
    )?;
    frame.draw_ellipse(240, 150, 60, 60, Style::fill(Color::GREEN))?;
    frame.draw_polygon(
        &[Point::new(150, 200), Point::new(190, 230), Point::new(110, 230)],
        Style::stroke(Color::BLACK).set_stroke_width(3),
    )?;
    frame.draw_text_scaled("sin(x)", 8, h - 8, Color::BLACK, 2)?;
    Ok(())
}

fn main() -> Result<()> {
    let level = logger::level_from_name(env::var("EASEL_LOG").ok().as_deref(), LevelFilter::Info);
    logger::initialize(level).map_err(|e| anyhow!("Unable to install logger: {e}"))?;
    let output = env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("easel-demo.png"));

    let canvas = Canvas::new(CanvasConfig::new(WIDTH, HEIGHT).set_title("easel demo"))?;
    let probe = HeadlessProbe::default();
    let scheduler = FrameScheduler::new(&canvas);
    let backend_probe = probe.clone();
    scheduler.start(canvas.target_fps(), move || {
        HeadlessWindowSystem::with_probe(backend_probe)
    })?;

    draw_scene(&canvas)?;
    let presented = probe.blit_count() + 2;
    if !probe.wait_for_blits(presented, Duration::from_secs(2)) {
        bail!("Scene was not presented in time");
    }
    canvas
        .save_frame(&output)
        .with_context(|| format!("Unable to save frame to {}", output.display()))?;
    log::info!("Wrote {}", output.display());

    probe.request_close();
    if !scheduler.wait_until_stopped(Duration::from_secs(2)) {
        log::warn!("Window did not close in time; stopping");
    }
    scheduler.stop();
    for event in canvas.events().drain() {
        log::debug!("Unhandled event {:?}", event.kind);
    }
    let stats = scheduler.stats();
    log::info!(
        "Presented {} frames in {} ticks, {} late",
        stats.frames(),
        stats.ticks(),
        stats.missed_deadlines()
    );
    Ok(())
}

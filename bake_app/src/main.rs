//! Box room bake demo
//!
//! Bakes lightmaps and light probes of a closed room lit by its ceiling and a point
//! light. Baking runs on a worker thread while the main thread reports progress.
//!
//! Usage: `bake_room [settings.toml|settings.ron] [output directory]`

use std::error::Error;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use light_baker::prelude::*;
use light_baker::scene::procedural::box_room;

fn build_scene() -> StaticSceneCollector {
    let mut collector = StaticSceneCollector::new().with_scene_file_name("bake_output/box_room.scene");
    for wall in box_room(6.0, Vec3::new(1.5, 1.4, 1.2)) {
        collector.add_geometry(wall);
    }
    collector.add_light(BakedLight::point(Vec3::new(1.5, 2.0, 0.5), Vec3::new(4.0, 3.5, 3.0), 8.0));

    let probes = (0..3)
        .flat_map(|x| (0..3).map(move |z| Vec3::new(x as f32 * 2.0 - 2.0, 0.0, z as f32 * 2.0 - 2.0)))
        .chain([Vec3::new(0.0, 2.0, 0.0)])
        .collect();
    collector.add_light_probe_group(LightProbeGroup::new("room", Mat4::identity(), probes));
    collector
}

fn load_settings(path: Option<&str>) -> Result<LightBakingSettings, Box<dyn Error>> {
    match path {
        Some(path) => {
            log::info!("Loading bake settings from {}", path);
            Ok(LightBakingSettings::load_from_file(path)?)
        }
        None => Ok(LightBakingSettings::new()
            .with_chunk_size(Vec3::new(4.0, 4.0, 4.0))
            .with_lightmap_size(64)),
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    let mut settings = load_settings(args.get(1).map(String::as_str))?;
    if let Some(output) = args.get(2) {
        settings.incremental.output_directory = Some(output.clone());
    }

    let mut collector = build_scene();
    let start = Instant::now();
    let mut baker = IncrementalLightBaker::initialize(
        settings,
        &mut collector,
        Arc::new(BakedLightMemoryCache::new()),
        Arc::new(SoftwareGeometryBufferBaker::new()),
    )?;
    log::info!("Writing results to {}", baker.output_directory().display());

    baker.process_scene(&mut collector);
    log::info!("Scene processed: {} lightmaps in {:.2?}", baker.num_lightmaps(), start.elapsed());

    let status = baker.status();
    let stop_token = StopToken::new();
    let worker_token = stop_token.clone();
    let worker = thread::spawn(move || {
        let finished = baker.bake(&worker_token);
        (baker, finished)
    });

    let mut last_report = String::new();
    while !worker.is_finished() {
        let report = status.to_string();
        if report != last_report {
            log::info!("{}", report);
            last_report = report;
        }
        thread::sleep(Duration::from_millis(100));
    }

    let (mut baker, finished) = worker.join().map_err(|_| "baking thread panicked")?;
    if !finished {
        log::warn!("Baking stopped before completion");
        return Ok(());
    }

    baker.commit_scene(&mut collector);
    for (index, path) in collector.lightmaps() {
        log::info!("Lightmap {}: {}", index, path);
    }
    log::info!("Bake finished in {:.2?}", start.elapsed());
    Ok(())
}

fn main() {
    if let Err(e) = light_baker::foundation::logging::init_with_level(log::LevelFilter::Info) {
        eprintln!("Logger already installed: {}", e);
    }

    if let Err(e) = run() {
        log::error!("Bake failed: {}", e);
        std::process::exit(1);
    }
}

use std::{
    env, fs,
    process::ExitCode,
    sync::Arc,
    thread,
    time::Instant,
};

use env_logger::Env;
use log::{error, info, warn};
use tokio::runtime::Runtime;
use viewer_asset::{
    config::ViewerConfig, fetch::FsFetcher, scene::ModelScene, texture::TextureCache,
};

fn read_config() -> Result<ViewerConfig, String> {
    let Some(path) = env::args().nth(1) else {
        return Ok(ViewerConfig::default());
    };
    let data = fs::read(&path).map_err(|err| format!("Failed to read {}: {}", path, err))?;
    serde_json::from_slice(&data).map_err(|err| format!("Failed to parse {}: {}", path, err))
}

fn main() -> ExitCode {
    let config = read_config();
    let debug_log = config.as_ref().map_or(true, |config| config.debug_log);
    env_logger::Builder::from_env(Env::default().default_filter_or(if debug_log {
        "debug"
    } else {
        "info"
    }))
    .init();

    let config = match config {
        Ok(config) => config,
        Err(err) => {
            error!("{}", err);
            return ExitCode::FAILURE;
        }
    };
    let runtime = match Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("Failed to create runtime: {:?}", err);
            return ExitCode::FAILURE;
        }
    };

    let frame_interval = config.frame_interval;
    let load_timeout = config.load_timeout;
    let textures = Arc::new(TextureCache::new());
    let mut scene = ModelScene::new(
        config,
        runtime.handle().clone(),
        Arc::new(FsFetcher::new(".")),
        textures.clone(),
    );

    for _ in 0..scene.scene_count() {
        if let Err(err) = scene.next_scene() {
            error!("Failed to change scene: {}", err);
            return ExitCode::FAILURE;
        }

        let started = Instant::now();
        while !scene.tick() {
            if let Some(failure) = scene.loader().and_then(|loader| loader.failure()) {
                warn!("Scene {} failed: {}", scene.scene_index(), failure);
                break;
            }
            if started.elapsed() > load_timeout {
                warn!("Scene {} not ready after {:?}", scene.scene_index(), load_timeout);
                break;
            }
            thread::sleep(frame_interval);
        }

        if let Some(model) = scene.model() {
            let failed = scene
                .loader()
                .map_or(0, |loader| loader.orchestrator().failed_slots().len());
            info!(
                "Scene {} ready in {:?}: {} expressions, {} motions, {} textures, {} failed slots",
                scene.scene_index(),
                started.elapsed(),
                model.expression_count(),
                model.total_motion_count(),
                model.texture_count(),
                failed
            );
        }
    }

    scene.release_all();
    info!("Released {} cached textures", textures.release_all());
    ExitCode::SUCCESS
}

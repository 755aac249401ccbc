use std::process::ExitCode;
use std::time::Duration;

use particle_flow::prelude::*;

const FPS_INTERVAL: Duration = Duration::from_millis(200);

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings_path = std::env::args_os().nth(1);
    let settings = match &settings_path {
        Some(path) => match SettingsStore::load(path) {
            Ok(store) => store,
            Err(e) => {
                log::error!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => SettingsStore::default(),
    };

    // Keep the watcher alive for the whole run.
    let _watcher = settings_path.as_ref().and_then(|path| match settings.watch(path) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            log::warn!("Settings will not hot-reload: {}", e);
            None
        }
    });

    let counter = FrameCounter::new();
    let fps_settings = settings.clone();
    let mut sampler = FpsSampler::new(counter.clone());
    std::thread::spawn(move || loop {
        std::thread::sleep(FPS_INTERVAL);
        let fps = sampler.sample();
        if fps_settings.snapshot().show_fps {
            log::info!("{:.1} fps", fps);
        } else {
            log::debug!("{:.1} fps", fps);
        }
    });

    let result = ParticleFlow::new()
        .with_settings(settings)
        .with_frame_counter(counter)
        .run();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

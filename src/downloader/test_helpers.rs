//! Shared test helpers for creating TubeTap instances backed by shell-script workers.

use crate::config::{Config, WorkerProgram};
use crate::downloader::TubeTap;
use crate::event_bus::Subscription;
use crate::types::ProgressEvent;
use std::path::Path;
use std::time::Duration;
use tempfile::{TempDir, tempdir};

/// A worker program that runs `script` with `/bin/sh`
///
/// The job's URL and quality parameter arrive as `$1` and `$2`.
pub(crate) fn sh_worker(script: &str) -> WorkerProgram {
    WorkerProgram {
        program: "/bin/sh".into(),
        args: vec!["-c".into(), script.into(), "worker".into()],
    }
}

/// Fast-ticking configuration rooted in `root`
pub(crate) fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.storage.video_dir = root.join("Videos");
    config.storage.audio_dir = root.join("Audios");
    config.progress.subscriber_capacity = 256;
    config.progress.synthetic_interval = Duration::from_millis(10);
    config.progress.completion_delay = Duration::from_millis(10);
    config.worker.search_path = false;
    config
}

/// Helper to create a TubeTap whose specialized workers run the given scripts.
///
/// The scripts are formatted with `{videos}` / `{audios}` replaced by the
/// artifact directories. Returns the instance and the tempdir (which must be
/// kept alive).
pub(crate) async fn create_test_tubetap(video_script: &str, audio_script: &str) -> (TubeTap, TempDir) {
    let temp_dir = tempdir().unwrap();
    let mut config = test_config(temp_dir.path());

    let videos = config.storage.video_dir.display().to_string();
    let audios = config.storage.audio_dir.display().to_string();
    let fill = |script: &str| script.replace("{videos}", &videos).replace("{audios}", &audios);
    config.worker.video_program = sh_worker(&fill(video_script));
    config.worker.audio_program = sh_worker(&fill(audio_script));

    let tubetap = TubeTap::new(config).await.unwrap();
    (tubetap, temp_dir)
}

/// Read events until the first terminal one (inclusive)
pub(crate) async fn collect_job(sub: &mut Subscription) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    loop {
        let payload = tokio::time::timeout(Duration::from_secs(10), sub.recv())
            .await
            .expect("timed out waiting for a progress event")
            .expect("observer was dropped from the bus");
        let event: ProgressEvent = serde_json::from_str(&payload).unwrap();
        let terminal = event.is_terminal();
        events.push(event);
        if terminal {
            return events;
        }
    }
}

/// Progress values of the `downloading` events, in order
pub(crate) fn progress_values(events: &[ProgressEvent]) -> Vec<u8> {
    events.iter().filter_map(ProgressEvent::progress).collect()
}

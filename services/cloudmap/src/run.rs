//! One end-to-end compositing run: synchronize, acquire, composite, write.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::info;

use acquisition::{Acquirer, HttpRemote, RemoteImageSource, TimeSynchronizer};
use compositor::{CompositeJob, Compositor, Diagnostics, Projector};
use projection::GridResampler;

use crate::config::CloudmapConfig;
use crate::output::OutputWriter;

/// Command-line switches that shape a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Composite even if the output is newer than every input.
    pub force: bool,
    /// Save intermediate rasters into the cache directory.
    pub debug: bool,
    /// Overrides `processing.workers`.
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Written {
        timestamp: DateTime<Utc>,
        modified: DateTime<Utc>,
    },
    UpToDate {
        timestamp: DateTime<Utc>,
    },
}

/// Run against the real image providers.
pub async fn run(config: &CloudmapConfig, options: RunOptions, now: DateTime<Utc>) -> Result<RunOutcome> {
    let remote = HttpRemote::new(Duration::from_secs(config.download.timeout_secs))
        .context("Failed to create HTTP client")?;
    run_with_remote(config, options, Arc::new(remote), now).await
}

pub async fn run_with_remote(
    config: &CloudmapConfig,
    options: RunOptions,
    remote: Arc<dyn RemoteImageSource>,
    now: DateTime<Utc>,
) -> Result<RunOutcome> {
    let sources = config.sources();
    let acquirer = Acquirer::new(remote, &config.download.cache_dir)
        .with_credentials(config.credentials());

    let synchronizer = TimeSynchronizer::new(&acquirer, config.sync_policy(&sources));
    let mut outcome = synchronizer
        .find_latest(&sources, now)
        .await
        .context("No common image time for all satellites")?;
    info!(
        timestamp = %outcome.timestamp.format("%Y-%m-%d %H:00 UTC"),
        attempts = outcome.attempts,
        "Download image date/time"
    );

    let latest_input = acquirer
        .download_all(&sources, &mut outcome.states, config.download.purge)
        .await
        .context("Failed to download satellite images")?;

    let writer = OutputWriter::new(&config.output.dir, &config.output.file);
    if !options.force && writer.is_up_to_date(latest_input) {
        info!(
            path = %writer.path().display(),
            latest_input = %latest_input,
            "Cloud map is newer than all satellite images, skipping"
        );
        return Ok(RunOutcome::UpToDate {
            timestamp: outcome.timestamp,
        });
    }

    let jobs: Vec<CompositeJob> = sources
        .into_iter()
        .zip(&outcome.states)
        .map(|(source, state)| CompositeJob::new(source, &state.cache_path))
        .collect();

    let resampler = Arc::new(GridResampler::new(config.processing.interpolation));
    let projector = Projector::with_resampler(config.projection_options()?, resampler);
    let diagnostics = options
        .debug
        .then(|| Diagnostics::new(config.download.cache_dir.join("debug")));
    let compositor = Compositor::new(
        config.grid()?,
        options.workers.unwrap_or(config.processing.workers),
    )
    .with_diagnostics(diagnostics);

    tokio::task::spawn_blocking(move || -> Result<()> {
        let composite = compositor
            .run(&jobs, &projector)
            .context("Compositing failed")?;
        writer.write(&composite.raster, latest_input)?;
        Ok(())
    })
    .await
    .context("Compositing task panicked")??;

    Ok(RunOutcome::Written {
        timestamp: outcome.timestamp,
        modified: latest_input,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use acquisition::{resolve_name, MemoryRemote};
    use cloudmap_common::ResolutionTier;
    use test_utils::{dundee_satellites, encode_png, reference_time};

    fn test_config(root: &std::path::Path) -> CloudmapConfig {
        let mut config = CloudmapConfig::from_yaml("{}").unwrap();
        config.output.width = 90;
        config.output.height = 45;
        config.output.dir = root.join("out");
        config.output.file = "clouds.jpg".to_string();
        config.download.cache_dir = root.join("cache");
        config.download.resolution = ResolutionTier::Low;
        config.download.username = Some("user".to_string());
        config.download.password = Some("secret".to_string());
        config.satellites = dundee_satellites();
        config.validate().unwrap();
        config
    }

    /// Publish every source at `timestamp` on an in-memory remote.
    fn publish(config: &CloudmapConfig, timestamp: DateTime<Utc>) -> Arc<MemoryRemote> {
        let remote = Arc::new(MemoryRemote::new());
        for (i, source) in config.sources().iter().enumerate() {
            let url = resolve_name(source, source.cadence().truncate(timestamp)).url;
            remote.insert(url, encode_png(48, 48, 60 + 30 * i as u8));
        }
        remote
    }

    #[tokio::test]
    async fn test_run_writes_then_skips_until_forced() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let remote = publish(&config, reference_time());

        let first = run_with_remote(&config, RunOptions::default(), remote.clone(), reference_time())
            .await
            .unwrap();
        let RunOutcome::Written { modified, .. } = first else {
            panic!("expected a written map, got {:?}", first);
        };

        let writer = OutputWriter::new(&config.output.dir, &config.output.file);
        assert_eq!(writer.modified(), Some(modified));
        let img = image::open(writer.path()).unwrap();
        assert_eq!((img.width(), img.height()), (90, 45));

        let second = run_with_remote(&config, RunOptions::default(), remote.clone(), reference_time())
            .await
            .unwrap();
        assert!(matches!(second, RunOutcome::UpToDate { .. }));

        let forced = RunOptions {
            force: true,
            ..RunOptions::default()
        };
        let third = run_with_remote(&config, forced, remote, reference_time())
            .await
            .unwrap();
        assert!(matches!(third, RunOutcome::Written { .. }));
    }

    #[tokio::test]
    async fn test_run_steps_back_to_published_time() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let published = reference_time() - chrono::Duration::hours(3);
        let remote = publish(&config, published);

        let options = RunOptions {
            workers: Some(3),
            debug: true,
            ..RunOptions::default()
        };
        let outcome = run_with_remote(&config, options, remote, reference_time())
            .await
            .unwrap();

        match outcome {
            RunOutcome::Written { timestamp, .. } => {
                assert_eq!(timestamp, config.satellites[0].cadence().truncate(published))
            }
            other => panic!("expected a written map, got {:?}", other),
        }
        assert!(config.download.cache_dir.join("debug").join("weight_sum.jpeg").exists());
    }

    #[tokio::test]
    async fn test_run_fails_without_images() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.processing.sync.max_tries = Some(2);

        let err = run_with_remote(
            &config,
            RunOptions::default(),
            Arc::new(MemoryRemote::new()),
            reference_time(),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("No common image time"));
        assert!(!config.output_path().exists());
    }
}

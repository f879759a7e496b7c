//! Backward search for the newest timestamp every source can serve.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use cloudmap_common::{Cadence, CloudmapError, Result, SourceConfig};

use crate::acquirer::{AcquisitionState, Acquirer};

/// Step size and budget of the backward search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPolicy {
    pub step: Cadence,
    pub max_tries: u32,
}

impl SyncPolicy {
    pub fn new(step: Cadence, max_tries: u32) -> Self {
        Self { step, max_tries }
    }

    /// Default policy for a source set: step by the coarsest cadence;
    /// 10 tries for 3-hourly sets, 200 for hourly ones.
    pub fn for_sources(sources: &[SourceConfig]) -> Self {
        let step = sources
            .iter()
            .map(|s| s.cadence())
            .max_by_key(|c| c.hours())
            .unwrap_or_default();
        let max_tries = if step.hours() == 1 { 200 } else { 10 };
        Self { step, max_tries }
    }
}

/// Result of a successful search.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// Timestamp resolved for the first source.
    pub timestamp: DateTime<Utc>,
    /// Number of candidate timestamps tried, including the successful one.
    pub attempts: u32,
    /// Resolved state of every source, in source order.
    pub states: Vec<AcquisitionState>,
}

pub struct TimeSynchronizer<'a> {
    acquirer: &'a Acquirer,
    policy: SyncPolicy,
}

impl<'a> TimeSynchronizer<'a> {
    pub fn new(acquirer: &'a Acquirer, policy: SyncPolicy) -> Self {
        Self { acquirer, policy }
    }

    /// Find the newest candidate at or before `now` for which every source
    /// has an image, stepping back by the policy step.
    ///
    /// Candidates are aligned to the step boundary so that sources with a
    /// finer cadence resolve to the same instant as the coarsest one.
    pub async fn find_latest(
        &self,
        sources: &[SourceConfig],
        now: DateTime<Utc>,
    ) -> Result<SyncOutcome> {
        if sources.is_empty() {
            return Err(CloudmapError::config("no satellite sources configured"));
        }

        info!(
            from = %now,
            step = %self.policy.step,
            max_tries = self.policy.max_tries,
            "Searching backward for images"
        );

        let step = self.policy.step.as_duration();
        let mut candidate = self.policy.step.truncate(now);
        let mut oldest = candidate;

        for attempt in 1..=self.policy.max_tries {
            let states: Vec<AcquisitionState> = sources
                .iter()
                .map(|s| self.acquirer.resolve(s, candidate))
                .collect();
            oldest = states.iter().map(|s| s.timestamp).min().unwrap_or(candidate);

            if self.all_available(sources, &states).await {
                let timestamp = states[0].timestamp;
                info!(%timestamp, attempts = attempt, "Found images for all satellites");
                return Ok(SyncOutcome {
                    timestamp,
                    attempts: attempt,
                    states,
                });
            }

            candidate = candidate - step;
        }

        Err(CloudmapError::SynchronizationExhausted {
            tries: self.policy.max_tries,
            oldest,
        })
    }

    async fn all_available(&self, sources: &[SourceConfig], states: &[AcquisitionState]) -> bool {
        for (source, state) in sources.iter().zip(states) {
            match self.acquirer.exists(source, state).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(satellite = %source.name, timestamp = %state.timestamp, "Image not available");
                    return false;
                }
                Err(e) => {
                    debug!(satellite = %source.name, error = %e, "Availability probe failed");
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemote;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;
    use async_trait::async_trait;
    use bytes::Bytes;
    use test_utils::{dundee_source, encode_png, jma_source};

    use crate::remote::{Credentials, RemoteError, RemoteImageSource};

    /// Serves from an in-memory remote but fails every existence check of one URL.
    struct FailingHead {
        inner: MemoryRemote,
        failing: String,
    }

    #[async_trait]
    impl RemoteImageSource for FailingHead {
        async fn exists(
            &self,
            url: &str,
            credentials: Option<&Credentials>,
        ) -> std::result::Result<bool, RemoteError> {
            if url == self.failing {
                return Err(RemoteError::Status {
                    url: url.to_string(),
                    status: 503,
                });
            }
            self.inner.exists(url, credentials).await
        }

        async fn fetch(
            &self,
            url: &str,
            credentials: Option<&Credentials>,
        ) -> std::result::Result<Bytes, RemoteError> {
            self.inner.fetch(url, credentials).await
        }
    }

    fn setup(dir: &std::path::Path) -> (MemoryRemote, Acquirer) {
        let remote = MemoryRemote::new();
        let acquirer = Acquirer::new(Arc::new(remote.clone()), dir);
        (remote, acquirer)
    }

    fn publish(remote: &MemoryRemote, acquirer: &Acquirer, source: &SourceConfig, at: DateTime<Utc>) {
        remote.insert(acquirer.resolve(source, at).url, encode_png(2, 2, 1));
    }

    #[tokio::test]
    async fn test_steps_back_until_all_available() {
        let dir = tempfile::tempdir().unwrap();
        let (remote, acquirer) = setup(dir.path());
        let a = dundee_source("A", 0.0);
        let b = dundee_source("B", 90.0);

        let now = Utc.with_ymd_and_hms(2013, 11, 19, 12, 0, 0).unwrap();
        let earlier = now - Duration::hours(3);
        publish(&remote, &acquirer, &a, earlier);
        publish(&remote, &acquirer, &b, now);
        publish(&remote, &acquirer, &b, earlier);

        let sync = TimeSynchronizer::new(&acquirer, SyncPolicy::new(Cadence::THREE_HOURLY, 10));
        let outcome = sync.find_latest(&[a, b], now).await.unwrap();

        assert_eq!(outcome.timestamp, earlier);
        assert_eq!(outcome.attempts, 2);
        assert!(outcome.states.iter().all(|s| s.timestamp == earlier));
    }

    #[tokio::test]
    async fn test_idempotent_for_fixed_availability() {
        let dir = tempfile::tempdir().unwrap();
        let (remote, acquirer) = setup(dir.path());
        let a = dundee_source("A", 0.0);
        let now = Utc.with_ymd_and_hms(2013, 11, 19, 13, 30, 0).unwrap();
        publish(&remote, &acquirer, &a, now - Duration::hours(6));

        let sync = TimeSynchronizer::new(&acquirer, SyncPolicy::for_sources(std::slice::from_ref(&a)));
        let first = sync.find_latest(std::slice::from_ref(&a), now).await.unwrap();
        let second = sync.find_latest(std::slice::from_ref(&a), now).await.unwrap();

        assert_eq!(first.timestamp, second.timestamp);
        assert_eq!(first.timestamp, Utc.with_ymd_and_hms(2013, 11, 19, 6, 0, 0).unwrap());
        assert_eq!(first.attempts, 3);
    }

    #[tokio::test]
    async fn test_mixed_cadence_finds_newest_common_hour() {
        let dir = tempfile::tempdir().unwrap();
        let (remote, acquirer) = setup(dir.path());
        let msg = dundee_source("MSG3", 0.0);
        let h8 = jma_source("H8", 140.7);

        let day = |h| Utc.with_ymd_and_hms(2013, 11, 19, h, 0, 0).unwrap();
        for hour in [6, 9, 12] {
            publish(&remote, &acquirer, &msg, day(hour));
        }
        for hour in 5..=12 {
            publish(&remote, &acquirer, &h8, day(hour));
        }

        let sources = vec![msg, h8];
        let sync = TimeSynchronizer::new(&acquirer, SyncPolicy::for_sources(&sources));
        let now = Utc.with_ymd_and_hms(2013, 11, 19, 13, 30, 0).unwrap();
        let outcome = sync.find_latest(&sources, now).await.unwrap();

        assert_eq!(outcome.timestamp, day(12));
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.states.iter().all(|s| s.timestamp == day(12)));
    }

    #[tokio::test]
    async fn test_failed_existence_check_counts_as_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let inner = MemoryRemote::new();
        let a = dundee_source("A", 0.0);
        let now = Utc.with_ymd_and_hms(2013, 11, 19, 12, 0, 0).unwrap();
        let earlier = now - Duration::hours(3);

        let resolver = Acquirer::new(Arc::new(inner.clone()), dir.path());
        let failing = resolver.resolve(&a, now).url;
        publish(&inner, &resolver, &a, now);
        publish(&inner, &resolver, &a, earlier);

        let acquirer = Acquirer::new(Arc::new(FailingHead { inner, failing }), dir.path());
        let sync = TimeSynchronizer::new(&acquirer, SyncPolicy::new(Cadence::THREE_HOURLY, 5));
        let outcome = sync.find_latest(&[a], now).await.unwrap();

        assert_eq!(outcome.timestamp, earlier);
        assert_eq!(outcome.attempts, 2);
    }

    #[tokio::test]
    async fn test_cache_counts_as_available() {
        let dir = tempfile::tempdir().unwrap();
        let (remote, acquirer) = setup(dir.path());
        let a = dundee_source("A", 0.0);
        let now = Utc.with_ymd_and_hms(2013, 11, 19, 9, 0, 0).unwrap();

        let state = acquirer.resolve(&a, now);
        std::fs::write(&state.cache_path, b"cached").unwrap();

        let sync = TimeSynchronizer::new(&acquirer, SyncPolicy::new(Cadence::THREE_HOURLY, 1));
        let outcome = sync.find_latest(&[a], now).await.unwrap();
        assert_eq!(outcome.timestamp, now);
        assert!(remote.requests().is_empty());
    }

    #[tokio::test]
    async fn test_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let (_remote, acquirer) = setup(dir.path());
        let now = Utc.with_ymd_and_hms(2013, 11, 19, 12, 0, 0).unwrap();

        let sync = TimeSynchronizer::new(&acquirer, SyncPolicy::new(Cadence::THREE_HOURLY, 4));
        let err = sync.find_latest(&[dundee_source("A", 0.0)], now).await.unwrap_err();

        match err {
            CloudmapError::SynchronizationExhausted { tries, oldest } => {
                assert_eq!(tries, 4);
                assert_eq!(oldest, now - Duration::hours(9));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_default_policy() {
        let dundee = SyncPolicy::for_sources(&[dundee_source("A", 0.0)]);
        assert_eq!(dundee, SyncPolicy::new(Cadence::THREE_HOURLY, 10));

        let jma = SyncPolicy::for_sources(&[jma_source("H8", 140.7)]);
        assert_eq!(jma, SyncPolicy::new(Cadence::HOURLY, 200));

        let mixed = SyncPolicy::for_sources(&[jma_source("H8", 140.7), dundee_source("A", 0.0)]);
        assert_eq!(mixed.step, Cadence::THREE_HOURLY);
        assert_eq!(mixed.step.as_duration(), Duration::hours(3));
    }
}

//! Download-completion detection.
//!
//! A browser grows a download in place and usually keeps it open (and, on
//! Windows, locked) until it is done. The detector samples the file's size
//! and tries to read a byte from it once per interval. A file counts as
//! complete once `threshold` consecutive samples saw the same size and a
//! successful read; it is given up on after `max_rounds` samples.
//!
//! This is a heuristic. A download that pauses for longer than the timeout
//! is abandoned, and a writer that stalls for exactly the sampling window
//! without holding a lock would be moved too early.

use crate::candidate::CandidateFile;
use blamite_config::StabilityConfig;
use blamite_storage::BackendHandle;
use blamite_storage::error::ErrorKind as StorageErrorKind;
use std::path::Path;
use std::time::Duration;

/// Timing of the detector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StabilityPolicy {
    pub interval: Duration,
    pub threshold: u32,
    pub max_rounds: u32,
}
impl Default for StabilityPolicy {
    fn default() -> Self {
        Self::from(&StabilityConfig::default())
    }
}
impl From<&StabilityConfig> for StabilityPolicy {
    fn from(config: &StabilityConfig) -> Self {
        Self {
            interval: config.interval(),
            threshold: config.threshold,
            max_rounds: config.max_rounds,
        }
    }
}

/// What one sampling round saw.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sample {
    /// Nothing (or no longer a regular file) at the path.
    Missing,
    /// The file exists but could not be stat'ed or read, most likely because
    /// the writer still holds it.
    Inaccessible,
    /// The file has this size and one byte could be read from it.
    Readable(u64),
}

/// Terminal result of waiting for a file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Ready,
    Vanished,
    TimedOut,
}

impl CandidateFile {
    /// Folds one sample into the observation state, returning a verdict once
    /// one is reached.
    pub fn observe(&mut self, sample: Sample, threshold: u32) -> Option<Verdict> {
        match sample {
            Sample::Missing => Some(Verdict::Vanished),
            Sample::Inaccessible => {
                self.stable_observation_count = 0;
                None
            },
            Sample::Readable(size) if self.last_observed_size == Some(size) => {
                self.stable_observation_count += 1;
                (self.stable_observation_count >= threshold).then_some(Verdict::Ready)
            },
            Sample::Readable(size) => {
                self.last_observed_size = Some(size);
                self.stable_observation_count = 0;
                None
            },
        }
    }
}

/// Polls a candidate until it is complete, gone, or out of time.
pub struct StabilityDetector<'a> {
    backend: &'a BackendHandle,
    policy: StabilityPolicy,
}

impl<'a> StabilityDetector<'a> {
    pub fn new(backend: &'a BackendHandle, policy: StabilityPolicy) -> Self {
        Self { backend, policy }
    }

    /// Samples `candidate` once per interval, starting immediately.
    ///
    /// The wait between rounds is a timer, never a blocking sleep, so any
    /// number of files can be verified concurrently on one runtime.
    pub async fn await_stable(&self, candidate: &mut CandidateFile) -> Verdict {
        for round in 1..=self.policy.max_rounds {
            if round > 1 {
                tokio::time::sleep(self.policy.interval).await;
            }
            let sample = self.sample(&candidate.path).await;
            let verdict = candidate.observe(sample, self.policy.threshold);
            tracing::debug!(
                path = %candidate.path.display(),
                round,
                ?sample,
                stable = candidate.stable_observation_count,
                "Sampled download",
            );
            if let Some(verdict) = verdict {
                return verdict;
            }
        }
        Verdict::TimedOut
    }

    async fn sample(&self, path: &Path) -> Sample {
        let size = match self.backend.stat(path).await {
            Ok(info) => info.size,
            Err(e) if matches!(&*e, StorageErrorKind::NotFound(_) | StorageErrorKind::NotAFile(_)) => {
                return Sample::Missing;
            },
            Err(e) => {
                tracing::trace!(path = %path.display(), error = ?e, "Stat failed");
                return Sample::Inaccessible;
            },
        };
        match self.backend.probe(path).await {
            Ok(()) => Sample::Readable(size),
            Err(e) if e.is_not_found() => Sample::Missing,
            Err(e) => {
                tracing::trace!(path = %path.display(), error = ?e, "Probe failed");
                Sample::Inaccessible
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Category;
    use blamite_storage::backend::{MockBackend, Step};
    use rstest::rstest;
    use std::sync::Arc;
    use tokio::time::Instant;

    const PATH: &str = "/downloads/movie.mp4";

    fn candidate() -> CandidateFile {
        let category = Category { folder: "Video_Files".to_string(), description: "Video File".to_string() };
        CandidateFile::new(PATH, "mp4", category)
    }

    fn policy() -> StabilityPolicy {
        StabilityPolicy { interval: Duration::from_secs(1), threshold: 3, max_rounds: 60 }
    }

    fn backend(steps: impl IntoIterator<Item = Step>) -> (Arc<MockBackend>, BackendHandle) {
        let mock = Arc::new(MockBackend::with_files([(PATH, 0)]));
        mock.script(PATH, steps);
        let handle: BackendHandle = mock.clone();
        (mock, handle)
    }

    #[rstest]
    #[case(&[Sample::Readable(5), Sample::Readable(5), Sample::Readable(5)], None)]
    #[case(&[Sample::Readable(5), Sample::Readable(5), Sample::Readable(5), Sample::Readable(5)], Some(Verdict::Ready))]
    #[case(&[Sample::Readable(5), Sample::Readable(5), Sample::Readable(6), Sample::Readable(6)], None)]
    #[case(&[Sample::Readable(5), Sample::Readable(5), Sample::Inaccessible, Sample::Readable(5)], None)]
    #[case(&[Sample::Readable(5), Sample::Missing], Some(Verdict::Vanished))]
    #[case(
        &[Sample::Inaccessible, Sample::Readable(1), Sample::Readable(1), Sample::Readable(1), Sample::Readable(1)],
        Some(Verdict::Ready)
    )]
    fn test_observe(#[case] samples: &[Sample], #[case] expected: Option<Verdict>) {
        let mut candidate = candidate();
        let mut verdict = None;
        for sample in samples {
            verdict = candidate.observe(*sample, 3);
            if verdict.is_some() {
                break;
            }
        }
        assert_eq!(verdict, expected);
    }

    #[test]
    fn test_observe_keeps_size_through_lock() {
        let mut candidate = candidate();
        candidate.observe(Sample::Readable(10), 3);
        candidate.observe(Sample::Readable(10), 3);
        assert_eq!(candidate.stable_observation_count, 1);
        candidate.observe(Sample::Inaccessible, 3);
        assert_eq!(candidate.stable_observation_count, 0);
        assert_eq!(candidate.last_observed_size, Some(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_constant_file_is_ready_after_threshold() {
        let (mock, backend) = backend([]);
        let start = Instant::now();
        let verdict = StabilityDetector::new(&backend, policy()).await_stable(&mut candidate()).await;
        assert_eq!(verdict, Verdict::Ready);
        assert_eq!(mock.stat_count(PATH), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_three_rounds_after_growth_stops() {
        let (mock, backend) =
            backend([Step::Size(100), Step::Size(200), Step::Size(300), Step::Size(400), Step::Size(500)]);
        let start = Instant::now();
        let mut candidate = candidate();
        let verdict = StabilityDetector::new(&backend, policy()).await_stable(&mut candidate).await;
        assert_eq!(verdict, Verdict::Ready);
        // Growth stops at round 5, so rounds 6, 7 and 8 are the stable ones.
        assert_eq!(mock.stat_count(PATH), 8);
        assert_eq!(start.elapsed(), Duration::from_secs(7));
        assert_eq!(candidate.last_observed_size, Some(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_locked_samples_do_not_count() {
        let (mock, backend) =
            backend([Step::Locked(10), Step::Locked(10), Step::Locked(10), Step::Locked(10), Step::Size(10)]);
        let verdict = StabilityDetector::new(&backend, policy()).await_stable(&mut candidate()).await;
        assert_eq!(verdict, Verdict::Ready);
        assert_eq!(mock.stat_count(PATH), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_stable_times_out() {
        let (mock, backend) = backend((1..=100).map(Step::Size));
        let start = Instant::now();
        let verdict = StabilityDetector::new(&backend, policy()).await_stable(&mut candidate()).await;
        assert_eq!(verdict, Verdict::TimedOut);
        assert_eq!(mock.stat_count(PATH), 60);
        assert_eq!(start.elapsed(), Duration::from_secs(59));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanently_locked_times_out() {
        let (mock, backend) = backend([]);
        mock.set_locked(PATH, true);
        let policy = StabilityPolicy { max_rounds: 5, ..policy() };
        let verdict = StabilityDetector::new(&backend, policy).await_stable(&mut candidate()).await;
        assert_eq!(verdict, Verdict::TimedOut);
        assert_eq!(mock.stat_count(PATH), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deleted_mid_poll_vanishes() {
        let (mock, backend) = backend([Step::Size(10), Step::Size(20), Step::Remove]);
        let start = Instant::now();
        let verdict = StabilityDetector::new(&backend, policy()).await_stable(&mut candidate()).await;
        assert_eq!(verdict, Verdict::Vanished);
        assert_eq!(mock.stat_count(PATH), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_from_the_start_vanishes() {
        let mock = Arc::new(MockBackend::default());
        let backend: BackendHandle = mock.clone();
        let verdict = StabilityDetector::new(&backend, policy()).await_stable(&mut candidate()).await;
        assert_eq!(verdict, Verdict::Vanished);
        assert_eq!(mock.stat_count(PATH), 1);
    }

    #[tokio::test]
    async fn test_real_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("notes.txt");
        tokio::fs::write(&path, b"finished").await.unwrap();
        let backend: BackendHandle = Arc::new(blamite_storage::backend::LocalBackend::default());
        let policy = StabilityPolicy { interval: Duration::from_millis(5), ..policy() };
        let mut candidate = CandidateFile { path, ..candidate() };
        let verdict = StabilityDetector::new(&backend, policy).await_stable(&mut candidate).await;
        assert_eq!(verdict, Verdict::Ready);
        assert_eq!(candidate.last_observed_size, Some(8));
    }
}

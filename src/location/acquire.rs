use async_trait::async_trait;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Stop sampling as soon as a reading is at least this precise.
pub const ACCURACY_GOAL_M: f64 = 50.0;
/// Hard cap on sensor samples per acquisition.
pub const MAX_SAMPLES: usize = 3;
/// Per-sample sensor timeout for the one-shot, high-accuracy mode.
pub const SAMPLE_TIMEOUT: Duration = Duration::from_secs(20);
/// Gap between consecutive samples of one acquisition.
pub const SAMPLE_GAP: Duration = Duration::from_secs(1);

/// Watch mode polls less aggressively and tolerates cached fixes.
pub const WATCH_TIMEOUT: Duration = Duration::from_secs(30);
pub const WATCH_INTERVAL: Duration = Duration::from_secs(10);

/// One GPS fix with its provenance. Ephemeral; only the best sample of an
/// acquisition ever leaves this module.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_m: f64,
    pub captured_at_ms: i64,
}

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("positioning unavailable: {0}")]
    Unavailable(String),
    #[error("position read timed out")]
    Timeout,
}

#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("could not obtain a position fix: {0}")]
    NoFix(String),
}

/// Tuning for a single sensor read.
#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    /// Maximum age of a cached fix the sensor may hand back. Zero forbids
    /// stale results.
    pub max_age: Duration,
}

impl ReadOptions {
    pub fn one_shot() -> Self {
        Self {
            high_accuracy: true,
            timeout: SAMPLE_TIMEOUT,
            max_age: Duration::ZERO,
        }
    }

    pub fn watch() -> Self {
        Self {
            high_accuracy: false,
            timeout: WATCH_TIMEOUT,
            max_age: Duration::from_secs(60),
        }
    }
}

/// Abstraction over the device positioning capability. Implementations wrap
/// whatever the host platform offers (gpsd, a field device bridge, a fake in
/// tests).
#[async_trait]
pub trait PositionSensor: Send + Sync {
    async fn read_position(&self, opts: ReadOptions) -> Result<LocationSample, SensorError>;
}

fn best_reading(readings: Vec<LocationSample>) -> Option<LocationSample> {
    readings.into_iter().min_by(|a, b| {
        a.accuracy_m
            .partial_cmp(&b.accuracy_m)
            .unwrap_or(Ordering::Equal)
    })
}

/// Multi-sample acquisition: keep reading until a sample beats
/// [`ACCURACY_GOAL_M`] or [`MAX_SAMPLES`] readings are collected, then return
/// the most precise reading seen. A sensor error after at least one good
/// reading degrades to that reading instead of failing.
pub async fn acquire_location(sensor: &dyn PositionSensor) -> Result<LocationSample, AcquireError> {
    let mut readings: Vec<LocationSample> = Vec::with_capacity(MAX_SAMPLES);

    loop {
        match sensor.read_position(ReadOptions::one_shot()).await {
            Ok(sample) => {
                debug!(
                    accuracy_m = sample.accuracy_m,
                    n = readings.len() + 1,
                    "position sample"
                );
                let good_enough = sample.accuracy_m < ACCURACY_GOAL_M;
                readings.push(sample);
                if good_enough || readings.len() >= MAX_SAMPLES {
                    break;
                }
            }
            Err(e) => {
                if readings.is_empty() {
                    return Err(AcquireError::NoFix(e.to_string()));
                }
                warn!(error = %e, collected = readings.len(), "sensor failed mid-acquisition, keeping best reading so far");
                break;
            }
        }
        tokio::time::sleep(SAMPLE_GAP).await;
    }

    best_reading(readings).ok_or_else(|| AcquireError::NoFix("no readings collected".into()))
}

/// Continuous tracking handle. The subscription keeps polling until
/// [`LocationWatcher::stop`] is called or the handle is dropped; callers must
/// stop it on teardown or the polling task leaks.
pub struct LocationWatcher {
    handle: tokio::task::JoinHandle<()>,
}

pub fn start_watching<F>(sensor: Arc<dyn PositionSensor>, on_fix: F) -> LocationWatcher
where
    F: Fn(LocationSample) + Send + Sync + 'static,
{
    let handle = tokio::spawn(async move {
        loop {
            match sensor.read_position(ReadOptions::watch()).await {
                Ok(sample) => on_fix(sample),
                Err(e) => warn!(error = %e, "watch read failed"),
            }
            tokio::time::sleep(WATCH_INTERVAL).await;
        }
    });
    LocationWatcher { handle }
}

impl LocationWatcher {
    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for LocationWatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    /// Scripted sensor: yields the queued results in order, counts reads.
    struct ScriptedSensor {
        script: Mutex<Vec<Result<LocationSample, SensorError>>>,
        reads: AtomicUsize,
    }

    impl ScriptedSensor {
        fn new(script: Vec<Result<LocationSample, SensorError>>) -> Self {
            let mut script = script;
            script.reverse();
            Self {
                script: Mutex::new(script),
                reads: AtomicUsize::new(0),
            }
        }

        fn read_count(&self) -> usize {
            self.reads.load(AtomicOrdering::SeqCst)
        }
    }

    #[async_trait]
    impl PositionSensor for ScriptedSensor {
        async fn read_position(&self, _opts: ReadOptions) -> Result<LocationSample, SensorError> {
            self.reads.fetch_add(1, AtomicOrdering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(SensorError::Unavailable("script exhausted".into())))
        }
    }

    fn sample(accuracy_m: f64) -> LocationSample {
        LocationSample {
            latitude: 12.9716,
            longitude: 77.5946,
            accuracy_m,
            captured_at_ms: 0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_the_most_precise_reading() {
        let sensor = ScriptedSensor::new(vec![Ok(sample(80.0)), Ok(sample(45.0)), Ok(sample(30.0))]);
        let fix = acquire_location(&sensor).await.unwrap();
        // 45 m beats the goal, so sampling stops before the 30 m reading
        assert_eq!(fix.accuracy_m, 45.0);
        assert_eq!(sensor.read_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_after_the_sample_cap_and_picks_the_best() {
        let sensor = ScriptedSensor::new(vec![
            Ok(sample(80.0)),
            Ok(sample(65.0)),
            Ok(sample(95.0)),
            Ok(sample(20.0)),
        ]);
        let fix = acquire_location(&sensor).await.unwrap();
        assert_eq!(fix.accuracy_m, 65.0);
        assert_eq!(sensor.read_count(), MAX_SAMPLES);
    }

    #[tokio::test(start_paused = true)]
    async fn degrades_to_the_last_good_reading_on_sensor_error() {
        let sensor = ScriptedSensor::new(vec![
            Ok(sample(60.0)),
            Err(SensorError::Unavailable("gps went away".into())),
        ]);
        let fix = acquire_location(&sensor).await.unwrap();
        assert_eq!(fix.accuracy_m, 60.0);
    }

    #[tokio::test(start_paused = true)]
    async fn fails_with_a_descriptive_error_when_no_reading_arrives() {
        let sensor = ScriptedSensor::new(vec![Err(SensorError::Timeout)]);
        let err = acquire_location(&sensor).await.unwrap_err();
        assert!(!err.to_string().is_empty());
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn watcher_stops_polling_once_dropped() {
        struct CountingSensor(AtomicUsize);

        #[async_trait]
        impl PositionSensor for CountingSensor {
            async fn read_position(&self, _opts: ReadOptions) -> Result<LocationSample, SensorError> {
                self.0.fetch_add(1, AtomicOrdering::SeqCst);
                Ok(LocationSample {
                    latitude: 0.0,
                    longitude: 0.0,
                    accuracy_m: 100.0,
                    captured_at_ms: 0,
                })
            }
        }

        let sensor = Arc::new(CountingSensor(AtomicUsize::new(0)));
        let watcher = start_watching(sensor.clone(), |_| {});
        tokio::time::sleep(WATCH_INTERVAL * 2).await;
        watcher.stop();
        let reads_at_stop = sensor.0.load(AtomicOrdering::SeqCst);
        tokio::time::sleep(WATCH_INTERVAL * 5).await;
        assert_eq!(sensor.0.load(AtomicOrdering::SeqCst), reads_at_stop);
    }
}

/// Tick-driven sampling and reporting loop
use log::{error, info, warn};
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;
use tokio::sync::oneshot;
use tokio::time::{sleep, Duration};

use crate::api::{Reporter, Transport};
use crate::config::ConfigStore;
use crate::error::{ReportError, SensorError};
use crate::sensors::Sampler;
use crate::utils::format_datetime;
use crate::window::Window;

const SAMPLING_PERIOD_TICKS: u64 = 6;
const REPORTING_PERIOD_TICKS: u64 = 60;
const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub sampling_period: u64,
    pub reporting_period: u64,
    pub tick: Duration,
}

impl Default for Cadence {
    fn default() -> Self {
        Cadence {
            sampling_period: SAMPLING_PERIOD_TICKS,
            reporting_period: REPORTING_PERIOD_TICKS,
            tick: TICK,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    Added,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    Sent,
    /// Empty window, nothing sent
    NoData,
    Rejected(u16),
    Failed,
}

/// What one tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    pub tick: u64,
    pub sample: Option<SampleOutcome>,
    pub report: Option<ReportOutcome>,
    pub baseline_saved: Option<bool>,
}

pub struct Scheduler<T: Transport> {
    sampler: Arc<Mutex<Sampler>>,
    window: Window,
    reporter: Reporter<T>,
    store: ConfigStore,
    cadence: Cadence,
    counter: u64,
}

impl<T: Transport> Scheduler<T> {
    pub fn new(
        sampler: Sampler,
        reporter: Reporter<T>,
        store: ConfigStore,
        cadence: Cadence,
    ) -> Self {
        Scheduler {
            sampler: Arc::new(Mutex::new(sampler)),
            window: Window::new(),
            reporter,
            store,
            cadence,
            counter: 0,
        }
    }

    #[cfg(test)]
    pub fn counter(&self) -> u64 {
        self.counter
    }

    #[cfg(test)]
    pub fn window(&self) -> &Window {
        &self.window
    }

    #[cfg(test)]
    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Run sensor I/O on tokio's blocking pool
    async fn with_sampler<R, F>(&self, work: F) -> Result<R, SensorError>
    where
        F: FnOnce(&mut Sampler) -> Result<R, SensorError> + Send + 'static,
        R: Send + 'static,
    {
        let sampler = Arc::clone(&self.sampler);
        tokio::task::spawn_blocking(move || {
            let mut sampler = sampler
                .lock()
                .map_err(|_| SensorError::Worker("sampler lock poisoned".to_string()))?;
            work(&mut sampler)
        })
        .await
        .map_err(|e| SensorError::Worker(e.to_string()))?
    }

    /// Run the work due at the current counter value, then advance it
    pub async fn tick(&mut self) -> TickSummary {
        let tick = self.counter;
        let mut summary = TickSummary {
            tick,
            sample: None,
            report: None,
            baseline_saved: None,
        };

        if tick % self.cadence.sampling_period == 0 {
            summary.sample = Some(self.sample().await);
        }

        if tick % self.cadence.reporting_period == 0 {
            summary.report = Some(self.report().await);
            summary.baseline_saved = Some(self.persist_baseline().await);
        }

        self.counter += 1;
        summary
    }

    async fn sample(&mut self) -> SampleOutcome {
        let calibration = self.store.calibration();
        match self
            .with_sampler(move |sampler| sampler.sample(&calibration))
            .await
        {
            Ok(sample) => {
                self.window.add(&sample);
                SampleOutcome::Added
            }
            Err(e) => {
                error!("Sensor reading error: {}", e);
                SampleOutcome::Failed
            }
        }
    }

    async fn report(&mut self) -> ReportOutcome {
        let Some(medians) = self.window.flush_median() else {
            warn!("No data collected during this reporting window!");
            return ReportOutcome::NoData;
        };

        let config = self.store.config();
        let credentials = self.store.credentials();
        match self
            .reporter
            .send(&medians, &config.api_url, &credentials)
            .await
        {
            Ok(()) => ReportOutcome::Sent,
            Err(ReportError::Rejected { status, body }) => {
                warn!("Request not successful ({}): {}", status, body);
                ReportOutcome::Rejected(status)
            }
            Err(e) => {
                error!("Connection error: {}", e);
                ReportOutcome::Failed
            }
        }
    }

    async fn persist_baseline(&mut self) -> bool {
        let baseline = match self.with_sampler(Sampler::current_baseline).await {
            Ok(baseline) => baseline,
            Err(e) => {
                warn!("Could not read baseline: {}", e);
                return false;
            }
        };

        match self.store.set_baseline(baseline) {
            Ok(()) => true,
            Err(e) => {
                warn!("Could not save baseline: {}", e);
                false
            }
        }
    }

    /// Tick until `shutdown` fires or its sender is dropped
    pub async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        info!(
            "Starting sampling loop at {}: sample every {} ticks, report every {} ticks",
            format_datetime(&OffsetDateTime::now_utc()),
            self.cadence.sampling_period,
            self.cadence.reporting_period
        );

        loop {
            self.tick().await;

            tokio::select! {
                _ = sleep(self.cadence.tick) => {}
                _ = &mut shutdown => {
                    info!("Shutdown requested after {} ticks", self.counter);
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transport::mock::ScriptedTransport;
    use crate::api::transport::TransportResponse;
    use crate::models::{Baseline, ClimateReading, GasReading};
    use crate::sensors::mock::{MockClimate, MockGas};
    use tempfile::TempDir;

    const LEARNED: Baseline = Baseline {
        eco2: 0x9000,
        tvoc: 0x9100,
    };

    struct Rig {
        scheduler: Scheduler<ScriptedTransport>,
        gas: MockGas,
        climate: MockClimate,
        transport: ScriptedTransport,
        _dir: TempDir,
    }

    fn rig(transport: ScriptedTransport) -> Rig {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::load(dir.path().join("apiConf.json")).unwrap();

        let gas = MockGas::new(GasReading {
            eco2: 420,
            tvoc: 5,
        });
        let climate = MockClimate::new(ClimateReading {
            temperature: 21.0,
            humidity: 45.0,
        });
        let mut sampler = Sampler::new(
            Box::new(gas.clone()),
            Box::new(climate.clone()),
            store.baseline(),
        );
        sampler.initialize(store.baseline()).unwrap();
        gas.with(|s| s.baseline = Some(LEARNED));

        let reporter = Reporter::new(transport.clone()).with_retry_delay(Duration::ZERO);
        let scheduler = Scheduler::new(sampler, reporter, store, Cadence::default());

        Rig {
            scheduler,
            gas,
            climate,
            transport,
            _dir: dir,
        }
    }

    async fn advance_to(scheduler: &mut Scheduler<ScriptedTransport>, tick: u64) {
        while scheduler.counter() < tick {
            scheduler.tick().await;
        }
    }

    #[tokio::test]
    async fn first_tick_samples_and_reports() {
        let mut rig = rig(ScriptedTransport::always_ok());

        let summary = rig.scheduler.tick().await;

        assert_eq!(summary.sample, Some(SampleOutcome::Added));
        assert_eq!(summary.report, Some(ReportOutcome::Sent));
        assert_eq!(summary.baseline_saved, Some(true));
        assert!(rig.scheduler.window().is_empty());
        assert_eq!(rig.transport.attempts(), 1);
    }

    #[tokio::test]
    async fn samples_only_on_multiples_of_six() {
        let mut rig = rig(ScriptedTransport::always_ok());
        advance_to(&mut rig.scheduler, 1).await;
        let reads_before = rig.climate.with(|s| s.reads);

        for _ in 1..6 {
            let summary = rig.scheduler.tick().await;
            assert_eq!(summary.sample, None);
            assert_eq!(summary.report, None);
        }
        assert_eq!(rig.climate.with(|s| s.reads), reads_before);

        let summary = rig.scheduler.tick().await;
        assert_eq!(summary.tick, 6);
        assert_eq!(summary.sample, Some(SampleOutcome::Added));
        assert_eq!(rig.climate.with(|s| s.reads), reads_before + 1);
        assert_eq!(rig.scheduler.window().len(), 1);
    }

    #[tokio::test]
    async fn reporting_tick_flushes_sends_and_persists_once() {
        let mut rig = rig(ScriptedTransport::always_ok());
        advance_to(&mut rig.scheduler, 60).await;

        // Ticks 6, 12, ..., 54 were sampled since the report at tick 0
        assert_eq!(rig.scheduler.window().len(), 9);
        let posts_before = rig.transport.attempts();
        let baseline_reads_before = rig.gas.with(|s| s.baseline_reads);

        let summary = rig.scheduler.tick().await;

        assert_eq!(summary.tick, 60);
        assert_eq!(summary.sample, Some(SampleOutcome::Added));
        assert_eq!(summary.report, Some(ReportOutcome::Sent));
        assert_eq!(summary.baseline_saved, Some(true));
        assert_eq!(rig.transport.attempts(), posts_before + 1);
        assert_eq!(rig.gas.with(|s| s.baseline_reads), baseline_reads_before + 1);
        assert!(rig.scheduler.window().is_empty());
        assert_eq!(rig.scheduler.store().baseline(), LEARNED);

        let body: serde_json::Value = serde_json::from_str(
            &rig.transport.requests.lock().unwrap().last().unwrap().body,
        )
        .unwrap();
        assert_eq!(body["eCO2"], serde_json::json!(420.0));
        assert_eq!(body["temperature"], serde_json::json!(21.0));
        assert_eq!(body["humidity"], serde_json::json!(45.0));
    }

    #[tokio::test]
    async fn empty_window_skips_send_but_persists_baseline() {
        let mut rig = rig(ScriptedTransport::always_ok());
        rig.climate.with(|s| s.fail = true);

        let summary = rig.scheduler.tick().await;

        assert_eq!(summary.sample, Some(SampleOutcome::Failed));
        assert_eq!(summary.report, Some(ReportOutcome::NoData));
        assert_eq!(summary.baseline_saved, Some(true));
        assert_eq!(rig.transport.attempts(), 0);
    }

    #[tokio::test]
    async fn rejected_report_is_dropped() {
        let transport = ScriptedTransport::new(vec![Ok(TransportResponse {
            status: 500,
            body: "oops".to_string(),
        })]);
        let mut rig = rig(transport);

        let summary = rig.scheduler.tick().await;

        assert_eq!(summary.report, Some(ReportOutcome::Rejected(500)));
        assert!(rig.scheduler.window().is_empty());
        assert_eq!(rig.transport.attempts(), 1);
    }

    #[tokio::test]
    async fn transport_failure_does_not_stop_the_loop() {
        let mut rig = rig(ScriptedTransport::new(vec![]));

        let summary = rig.scheduler.tick().await;
        assert_eq!(summary.report, Some(ReportOutcome::Failed));
        assert_eq!(rig.transport.attempts(), 3);

        let summary = rig.scheduler.tick().await;
        assert_eq!(summary.tick, 1);
    }

    #[tokio::test]
    async fn baseline_read_failure_is_not_persisted() {
        let mut rig = rig(ScriptedTransport::always_ok());
        rig.gas.with(|s| s.fail_baseline = true);
        let before = rig.scheduler.store().baseline();

        let summary = rig.scheduler.tick().await;

        assert_eq!(summary.report, Some(ReportOutcome::Sent));
        assert_eq!(summary.baseline_saved, Some(false));
        assert_eq!(rig.scheduler.store().baseline(), before);
    }

    #[tokio::test]
    async fn slow_sensor_read_leaves_runtime_free() {
        let mut rig = rig(ScriptedTransport::always_ok());
        rig.climate.with(|s| s.delay = Duration::from_millis(400));
        let climate = rig.climate.clone();

        let started = std::time::Instant::now();
        let ticking = tokio::spawn(async move { rig.scheduler.tick().await });
        sleep(Duration::from_millis(20)).await;

        assert!(started.elapsed() < Duration::from_millis(200));
        assert!(!ticking.is_finished());

        let summary = ticking.await.unwrap();
        assert_eq!(summary.sample, Some(SampleOutcome::Added));
        assert_eq!(climate.with(|s| s.reads), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_shutdown() {
        let rig = rig(ScriptedTransport::always_ok());
        let transport = rig.transport.clone();
        let (tx, rx) = oneshot::channel();

        let handle = tokio::spawn(rig.scheduler.run(rx));
        tokio::time::sleep(Duration::from_millis(2500)).await;
        tx.send(()).unwrap();
        handle.await.unwrap();

        assert_eq!(transport.attempts(), 1);
    }
}

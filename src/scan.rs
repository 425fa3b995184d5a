//! Scan orchestration
//!
//! Fans channel tasks out over a bounded pool of spawned tasks. Each task
//! runs probe → decode check → metadata for one channel; reports are yielded
//! in completion order, so a fast channel listed late can print before a
//! slow one listed early.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use futures::stream::{self, Stream, StreamExt};
use reqwest::Client;
use serde::Serialize;
use tokio::task::{JoinError, JoinHandle};
use tracing::{info, warn};

use crate::config::ScanConfig;
use crate::error::Result;
use crate::http_client::build_client;
use crate::inspect::{AudioInfo, MediaInspector, MetadataExtractor, VideoInfo};
use crate::playlist::ChannelTask;
use crate::probe::{AvailabilityProber, ProbeStatus};

/// Outcome of one channel, ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelReport {
    pub index: usize,
    pub total: usize,
    pub name: String,
    pub url: String,
    pub status: ProbeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioInfo>,
}

impl ChannelReport {
    fn dead(task: &ChannelTask, total: usize) -> Self {
        Self {
            index: task.index,
            total,
            name: task.name.clone(),
            url: task.url.clone(),
            status: ProbeStatus::Dead,
            video: None,
            audio: None,
        }
    }
}

/// Counts for a finished scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanSummary {
    pub total: usize,
    pub alive: usize,
    pub dead: usize,
    pub elapsed: Duration,
}

/// One scan's worth of shared state: configuration, the prober (with its
/// cache and admission gate), and the metadata extractor. Build a fresh
/// scanner per scan.
#[derive(Debug)]
pub struct Scanner {
    config: Arc<ScanConfig>,
    prober: Arc<AvailabilityProber>,
    extractor: MetadataExtractor,
}

impl Scanner {
    /// Validate `config` and build the HTTP client.
    pub fn new(config: ScanConfig, inspector: Arc<dyn MediaInspector>) -> Result<Self> {
        config.validate()?;
        let client = build_client(&config)?;
        Ok(Self::with_client(config, client, inspector))
    }

    pub fn with_client(
        config: ScanConfig,
        client: Client,
        inspector: Arc<dyn MediaInspector>,
    ) -> Self {
        let config = Arc::new(config);
        let extractor = MetadataExtractor::new(Arc::clone(&inspector), config.metadata_timeout);
        let prober = Arc::new(AvailabilityProber::new(client, Arc::clone(&config), inspector));
        Self {
            config,
            prober,
            extractor,
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn prober(&self) -> &AvailabilityProber {
        &self.prober
    }

    /// Run the full pipeline for a single channel.
    pub async fn check_channel(&self, task: ChannelTask, total: usize) -> ChannelReport {
        process_channel(
            Arc::clone(&self.prober),
            self.config.extract_metadata.then(|| self.extractor.clone()),
            task,
            total,
        )
        .await
    }

    /// Reports in completion order. At most `max_workers` channels are in
    /// progress at once; dropping the stream aborts the ones in flight.
    pub fn scan(
        &self,
        tasks: Vec<ChannelTask>,
    ) -> impl Stream<Item = ChannelReport> + Send + 'static {
        let total = tasks.len();
        let prober = Arc::clone(&self.prober);
        let extractor = self.config.extract_metadata.then(|| self.extractor.clone());

        stream::iter(tasks)
            .map(move |task| {
                let fallback = ChannelReport::dead(&task, total);
                let worker = AbortOnDrop(tokio::spawn(process_channel(
                    Arc::clone(&prober),
                    extractor.clone(),
                    task,
                    total,
                )));
                async move {
                    match worker.await {
                        Ok(report) => report,
                        Err(e) => {
                            warn!(
                                index = fallback.index,
                                name = %fallback.name,
                                error = %e,
                                "channel worker failed"
                            );
                            fallback
                        }
                    }
                }
            })
            .buffer_unordered(self.config.max_workers)
    }

    /// Drive a whole scan, handing each report to `on_report` as it lands.
    pub async fn run<F>(&self, tasks: Vec<ChannelTask>, mut on_report: F) -> ScanSummary
    where
        F: FnMut(&ChannelReport),
    {
        let started = Instant::now();
        let mut summary = ScanSummary {
            total: tasks.len(),
            ..ScanSummary::default()
        };

        info!(
            channels = summary.total,
            workers = self.config.max_workers,
            connections = self.config.max_connections,
            "starting scan"
        );

        let mut reports = Box::pin(self.scan(tasks));
        while let Some(report) = reports.next().await {
            if report.status.is_alive() {
                summary.alive += 1;
            } else {
                summary.dead += 1;
            }
            on_report(&report);
        }

        summary.elapsed = started.elapsed();
        info!(
            alive = summary.alive,
            dead = summary.dead,
            elapsed = ?summary.elapsed,
            "scan finished"
        );
        summary
    }
}

async fn process_channel(
    prober: Arc<AvailabilityProber>,
    extractor: Option<MetadataExtractor>,
    task: ChannelTask,
    total: usize,
) -> ChannelReport {
    let status = prober.probe(&task.url, task.timeout, task.extended_timeout).await;

    let (video, audio) = match (status, extractor) {
        (ProbeStatus::Alive, Some(extractor)) => {
            let (video, audio) = extractor.extract(&task.url).await;
            (Some(video), Some(audio))
        }
        _ => (None, None),
    };

    ChannelReport {
        index: task.index,
        total,
        name: task.name,
        url: task.url,
        status,
        video,
        audio,
    }
}

/// Join handle that aborts its task when dropped unfinished.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Future for AbortOnDrop<T> {
    type Output = std::result::Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx)
    }
}

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::inspect::fake::FakeInspector;
    use crate::inspect::metadata::Resolution;
    use crate::inspect::StreamKind;
    use crate::playlist::build_tasks;

    fn test_config() -> ScanConfig {
        ScanConfig {
            timeout: Duration::from_secs(2),
            retry_count: 2,
            backoff_unit: Duration::from_millis(10),
            max_workers: 4,
            ..ScanConfig::default()
        }
    }

    fn video(len: usize) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("content-type", "video/mp2t")
            .set_body_bytes(vec![0x47u8; len])
    }

    fn playlist(server: &MockServer, paths: &[(&str, &str)]) -> String {
        let mut out = String::from("#EXTM3U\n");
        for (name, p) in paths {
            out.push_str(&format!("#EXTINF:-1 group-title=\"Test\",{name}\n{}{p}\n", server.uri()));
        }
        out
    }

    fn inspector() -> Arc<FakeInspector> {
        Arc::new(
            FakeInspector::decoding(true)
                .with_output(StreamKind::Video, "codec_name=h264\nwidth=1920\nr_frame_rate=25/1")
                .with_output(StreamKind::Audio, "codec_name=aac\nbit_rate=128000"),
        )
    }

    #[tokio::test]
    async fn mixed_playlist_reports_every_channel() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/alive.ts"))
            .respond_with(video(600_000))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/dead.ts"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let content = playlist(&server, &[("Alive", "/alive.ts"), ("Dead", "/dead.ts")]);
        let tasks = build_tasks(&content, None, Duration::from_secs(2), None);

        let scanner = Scanner::new(test_config(), inspector()).unwrap();
        let mut reports = Vec::new();
        let summary = scanner.run(tasks, |r| reports.push(r.clone())).await;

        assert_eq!(summary.total, 2);
        assert_eq!(summary.alive, 1);
        assert_eq!(summary.dead, 1);
        reports.sort_by_key(|r| r.index);

        let alive = &reports[0];
        assert_eq!(alive.status, ProbeStatus::Alive);
        assert_eq!(alive.total, 2);
        let video = alive.video.as_ref().unwrap();
        assert_eq!(video.resolution, Some(Resolution::FullHd));
        assert_eq!(alive.audio.as_ref().unwrap().bitrate_kbps, Some(128));

        let dead = &reports[1];
        assert_eq!(dead.status, ProbeStatus::Dead);
        assert!(dead.video.is_none() && dead.audio.is_none());
    }

    #[tokio::test]
    async fn reports_arrive_in_completion_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow.ts"))
            .respond_with(video(600_000).set_delay(Duration::from_millis(300)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/fast.ts"))
            .respond_with(video(600_000))
            .mount(&server)
            .await;

        let content = playlist(&server, &[("Slow", "/slow.ts"), ("Fast", "/fast.ts")]);
        let tasks = build_tasks(&content, None, Duration::from_secs(2), None);

        let scanner = Scanner::new(test_config(), inspector()).unwrap();
        let order: Vec<usize> = scanner.scan(tasks).map(|r| r.index).collect().await;
        assert_eq!(order, [2, 1]);
    }

    #[tokio::test]
    async fn dropping_the_scan_aborts_channels_in_flight() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(video(600_000).set_delay(Duration::from_secs(30)))
            .mount(&server)
            .await;

        let content = playlist(&server, &[("Stuck A", "/a.ts"), ("Stuck B", "/b.ts")]);
        let tasks = build_tasks(&content, None, Duration::from_secs(10), None);

        let fake = inspector();
        let scanner = Scanner::new(test_config(), fake.clone()).unwrap();
        let mut reports = Box::pin(scanner.scan(tasks));

        // Let the workers start and take their connection slots.
        let pending = tokio::time::timeout(Duration::from_millis(200), reports.next()).await;
        assert!(pending.is_err());
        assert_eq!(scanner.prober().admission().in_flight(), 2);

        drop(reports);

        let released = tokio::time::timeout(Duration::from_secs(2), async {
            while scanner.prober().admission().in_flight() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(released.is_ok(), "workers kept their slots after the scan was dropped");
        assert_eq!(fake.decode_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert!(scanner.prober().cache().is_empty());
    }

    #[tokio::test]
    async fn duplicate_urls_are_probed_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/shared.ts"))
            .respond_with(video(600_000))
            .expect(1)
            .mount(&server)
            .await;

        let content = playlist(&server, &[("One", "/shared.ts"), ("Two", "/shared.ts")]);
        let tasks = build_tasks(&content, None, Duration::from_secs(2), None);

        let config = ScanConfig {
            max_workers: 1,
            ..test_config()
        };
        let fake = inspector();
        let scanner = Scanner::new(config, fake.clone()).unwrap();
        let summary = scanner.run(tasks, |_| {}).await;

        assert_eq!(summary.alive, 2);
        assert_eq!(fake.decode_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn metadata_extraction_can_be_disabled() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(video(600_000))
            .mount(&server)
            .await;

        let config = ScanConfig {
            extract_metadata: false,
            ..test_config()
        };
        let fake = inspector();
        let scanner = Scanner::new(config, fake.clone()).unwrap();
        let task = ChannelTask {
            index: 1,
            name: "Only".into(),
            url: format!("{}/only.ts", server.uri()),
            timeout: Duration::from_secs(2),
            extended_timeout: None,
        };

        let report = scanner.check_channel(task, 1).await;
        assert_eq!(report.status, ProbeStatus::Alive);
        assert!(report.video.is_none());
        assert_eq!(fake.probe_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    struct PanickingInspector;

    #[async_trait]
    impl MediaInspector for PanickingInspector {
        async fn run_decode_check(
            &self,
            _url: &str,
            _duration: Duration,
            _timeout: Duration,
        ) -> bool {
            true
        }

        async fn run_stream_probe(
            &self,
            _url: &str,
            _kind: StreamKind,
            _timeout: Duration,
        ) -> HashMap<String, String> {
            panic!("inspector blew up");
        }
    }

    #[tokio::test]
    async fn a_failing_channel_does_not_abort_the_scan() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/boom.ts"))
            .respond_with(video(600_000))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gone.ts"))
            .respond_with(ResponseTemplate::new(410))
            .mount(&server)
            .await;

        let content = playlist(&server, &[("Boom", "/boom.ts"), ("Gone", "/gone.ts")]);
        let tasks = build_tasks(&content, None, Duration::from_secs(2), None);

        let scanner = Scanner::new(test_config(), Arc::new(PanickingInspector)).unwrap();
        let mut reports = Vec::new();
        let summary = scanner.run(tasks, |r| reports.push(r.clone())).await;

        assert_eq!(summary.total, 2);
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.status == ProbeStatus::Dead));
    }

    #[test]
    fn invalid_config_is_rejected_before_dispatch() {
        let config = ScanConfig {
            max_workers: 0,
            ..ScanConfig::default()
        };
        assert!(Scanner::new(config, inspector()).is_err());
    }
}

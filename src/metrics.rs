use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::aws::{MetricQuery, MetricsApi};
use crate::fetch::ProgressFn;
use crate::model::Cluster;

/// GetMetricData accepts up to 500 queries per call.
pub const MAX_QUERIES_PER_CALL: usize = 500;

const SERVICE_NAMESPACE: &str = "AWS/ECS";
const INSIGHTS_NAMESPACE: &str = "ECS/ContainerInsights";
/// Trailing window for point-in-time utilization values.
const QUERY_WINDOW: Duration = Duration::from_secs(2 * 60);
/// Wider window for the Container Insights availability probe.
const PROBE_WINDOW: Duration = Duration::from_secs(10 * 60);

/// Makes a string usable as a CloudWatch metric id: lowercase letters,
/// digits and underscores, starting with a letter. Idempotent.
pub fn sanitize_metric_id(raw: &str) -> String {
    let mut sanitized = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect::<String>();
    if let Some(first) = sanitized.chars().next()
        && !first.is_ascii_alphabetic()
    {
        sanitized.insert_str(0, "m_");
    }
    sanitized
}

/// Fetches CPU/memory utilization from CloudWatch and attaches it onto a
/// topology snapshot. Service-level metrics come from the always-available
/// AWS/ECS namespace; per-container metrics only exist when Container
/// Insights is enabled for the cluster.
///
/// Everything in here is degraded-on-failure: a metrics outage dims the
/// display, it never aborts a refresh cycle.
pub struct MetricsFetcher<M> {
    api: M,
    /// Insights availability, cached per selected cluster name. Re-probed
    /// only when the selection moves to a different cluster.
    insights: Option<(String, bool)>,
    progress: Option<ProgressFn>,
}

impl<M: MetricsApi> MetricsFetcher<M> {
    pub fn new(api: M) -> Self {
        Self {
            api,
            insights: None,
            progress: None,
        }
    }

    pub fn set_progress(&mut self, progress: Option<ProgressFn>) {
        self.progress = progress;
    }

    fn report(&self, message: &str) {
        if let Some(progress) = &self.progress {
            progress(message);
        }
    }

    /// Probes whether Container Insights reports data for the cluster. Any
    /// query failure counts as "not enabled"; the refresh must survive a
    /// metrics outage.
    pub async fn check_insights(&mut self, cluster_name: &str) -> bool {
        if let Some((cached_name, enabled)) = &self.insights
            && cached_name == cluster_name
        {
            return *enabled;
        }

        self.report("Checking Container Insights status…");
        let dimensions = [("ClusterName".to_string(), cluster_name.to_string())];
        let enabled = match self
            .api
            .statistic_sample_count(INSIGHTS_NAMESPACE, "CpuUtilized", &dimensions, PROBE_WINDOW, 300)
            .await
        {
            Ok(count) => count > 0,
            Err(error) => {
                warn!(cluster_name, "failed to check Container Insights: {error:#}");
                false
            }
        };
        info!(cluster_name, enabled, "Container Insights probe");
        self.insights = Some((cluster_name.to_string(), enabled));
        enabled
    }

    /// Attaches utilization onto the snapshot in place. Usage fields are
    /// replaced wholesale: an entity with no datapoint this cycle ends up
    /// with `None`, never a stale prior value.
    pub async fn attach_metrics(&mut self, cluster: &mut Cluster) {
        self.attach_service_metrics(cluster).await;
        if self.check_insights(&cluster.name).await {
            self.attach_container_metrics(cluster).await;
        } else {
            debug!("Container Insights not enabled, skipping container metrics");
        }
    }

    async fn attach_service_metrics(&self, cluster: &mut Cluster) {
        if cluster.services.is_empty() {
            return;
        }
        self.report(&format!(
            "Fetching metrics for {} services…",
            cluster.services.len()
        ));

        let mut queries = Vec::with_capacity(cluster.services.len() * 2);
        for service in &cluster.services {
            queries.push(MetricQuery {
                id: sanitize_metric_id(&format!("svc_cpu_{}", service.name)),
                namespace: SERVICE_NAMESPACE,
                metric_name: "CPUUtilization",
                dimensions: vec![
                    ("ClusterName".to_string(), cluster.name.clone()),
                    ("ServiceName".to_string(), service.name.clone()),
                ],
            });
            queries.push(MetricQuery {
                id: sanitize_metric_id(&format!("svc_mem_{}", service.name)),
                namespace: SERVICE_NAMESPACE,
                metric_name: "MemoryUtilization",
                dimensions: vec![
                    ("ClusterName".to_string(), cluster.name.clone()),
                    ("ServiceName".to_string(), service.name.clone()),
                ],
            });
        }

        let results = self.fetch_batched(&queries).await;
        for service in &mut cluster.services {
            let cpu_id = sanitize_metric_id(&format!("svc_cpu_{}", service.name));
            let mem_id = sanitize_metric_id(&format!("svc_mem_{}", service.name));
            service.cpu_used = results.get(&cpu_id).copied().flatten();
            service.memory_used = results.get(&mem_id).copied().flatten();
        }
    }

    async fn attach_container_metrics(&self, cluster: &mut Cluster) {
        // (task id, task short id, container name) for containers of
        // RUNNING service tasks; only those have Insights series.
        let mut targets = Vec::new();
        for service in &cluster.services {
            for task in &service.tasks {
                if task.status != "RUNNING" {
                    continue;
                }
                for container in &task.containers {
                    targets.push((
                        task.id.clone(),
                        task.short_id().to_string(),
                        container.name.clone(),
                    ));
                }
            }
        }
        if targets.is_empty() {
            debug!("no running containers to fetch metrics for");
            return;
        }
        self.report(&format!("Fetching metrics for {} containers…", targets.len()));

        let mut queries = Vec::with_capacity(targets.len() * 2);
        for (task_id, short_id, container_name) in &targets {
            queries.push(MetricQuery {
                id: sanitize_metric_id(&format!("cpu_{short_id}_{container_name}")),
                namespace: INSIGHTS_NAMESPACE,
                metric_name: "CpuUtilized",
                dimensions: vec![
                    ("ClusterName".to_string(), cluster.name.clone()),
                    ("TaskId".to_string(), task_id.clone()),
                    ("ContainerName".to_string(), container_name.clone()),
                ],
            });
            queries.push(MetricQuery {
                id: sanitize_metric_id(&format!("mem_{short_id}_{container_name}")),
                namespace: INSIGHTS_NAMESPACE,
                metric_name: "MemoryUtilized",
                dimensions: vec![
                    ("ClusterName".to_string(), cluster.name.clone()),
                    ("TaskId".to_string(), task_id.clone()),
                    ("ContainerName".to_string(), container_name.clone()),
                ],
            });
        }

        let results = self.fetch_batched(&queries).await;
        for service in &mut cluster.services {
            for task in &mut service.tasks {
                if task.status != "RUNNING" {
                    continue;
                }
                let short_id = task.short_id().to_string();
                for container in &mut task.containers {
                    let cpu_id =
                        sanitize_metric_id(&format!("cpu_{short_id}_{}", container.name));
                    let mem_id =
                        sanitize_metric_id(&format!("mem_{short_id}_{}", container.name));
                    // CPU keeps fractional vCPU-percent precision; memory
                    // arrives in MiB and is rounded to whole units.
                    container.cpu_used = results.get(&cpu_id).copied().flatten();
                    container.memory_used = results
                        .get(&mem_id)
                        .copied()
                        .flatten()
                        .map(|mib| mib.round().max(0.0) as u64);
                }
            }
        }
    }

    /// Splits queries at the per-call cap and merges results. A failed
    /// batch resolves every id in that batch to "no data".
    async fn fetch_batched(&self, queries: &[MetricQuery]) -> HashMap<String, Option<f64>> {
        let mut results = HashMap::with_capacity(queries.len());
        for batch in queries.chunks(MAX_QUERIES_PER_CALL) {
            match self.api.fetch_time_series(batch, QUERY_WINDOW).await {
                Ok(batch_results) => results.extend(batch_results),
                Err(error) => {
                    warn!("failed to fetch metrics batch: {error:#}");
                    for query in batch {
                        results.insert(query.id.clone(), None);
                    }
                }
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Container, Service, Task};
    use anyhow::{Result, bail};
    use std::sync::Mutex;

    struct FakeMetrics {
        probe_datapoints: Result<usize, String>,
        series: HashMap<String, Option<f64>>,
        fail_series: bool,
        probe_calls: Mutex<usize>,
        series_batches: Mutex<Vec<usize>>,
    }

    impl Default for FakeMetrics {
        fn default() -> Self {
            Self {
                probe_datapoints: Ok(0),
                series: HashMap::new(),
                fail_series: false,
                probe_calls: Mutex::new(0),
                series_batches: Mutex::new(Vec::new()),
            }
        }
    }

    impl MetricsApi for FakeMetrics {
        async fn statistic_sample_count(
            &self,
            _namespace: &str,
            _metric_name: &str,
            _dimensions: &[(String, String)],
            _window: Duration,
            _period_secs: i32,
        ) -> Result<usize> {
            *self.probe_calls.lock().expect("lock") += 1;
            match &self.probe_datapoints {
                Ok(count) => Ok(*count),
                Err(message) => bail!("{message}"),
            }
        }

        async fn fetch_time_series(
            &self,
            queries: &[MetricQuery],
            _window: Duration,
        ) -> Result<HashMap<String, Option<f64>>> {
            self.series_batches
                .lock()
                .expect("lock")
                .push(queries.len());
            if self.fail_series {
                bail!("throttled");
            }
            Ok(queries
                .iter()
                .map(|query| {
                    (
                        query.id.clone(),
                        self.series.get(&query.id).copied().flatten(),
                    )
                })
                .collect())
        }
    }

    fn cluster_with_service(task_status: &str) -> Cluster {
        Cluster {
            name: "prod".to_string(),
            services: vec![Service {
                name: "api".to_string(),
                tasks: vec![Task {
                    id: "abc123def456xyz".to_string(),
                    status: task_status.to_string(),
                    containers: vec![Container {
                        name: "app".to_string(),
                        ..Container::default()
                    }],
                    ..Task::default()
                }],
                ..Service::default()
            }],
            ..Cluster::default()
        }
    }

    #[test]
    fn sanitize_replaces_and_lowercases() {
        assert_eq!(sanitize_metric_id("My-Service.Name:v1"), "my_service_name_v1");
    }

    #[test]
    fn sanitize_prefixes_leading_non_letter() {
        assert_eq!(sanitize_metric_id("123svc"), "m_123svc");
        assert_eq!(sanitize_metric_id("_x"), "m__x");
    }

    #[test]
    fn sanitize_is_idempotent_and_handles_empty() {
        assert_eq!(sanitize_metric_id(""), "");
        let once = sanitize_metric_id("My-Service.Name:v1");
        assert_eq!(sanitize_metric_id(&once), once);
    }

    #[tokio::test]
    async fn check_insights_false_on_zero_datapoints() {
        let mut fetcher = MetricsFetcher::new(FakeMetrics::default());
        assert!(!fetcher.check_insights("prod").await);
    }

    #[tokio::test]
    async fn check_insights_swallows_probe_failure() {
        let mut fetcher = MetricsFetcher::new(FakeMetrics {
            probe_datapoints: Err("access denied".to_string()),
            ..FakeMetrics::default()
        });
        assert!(!fetcher.check_insights("prod").await);
    }

    #[tokio::test]
    async fn check_insights_is_cached_per_cluster() {
        let mut fetcher = MetricsFetcher::new(FakeMetrics {
            probe_datapoints: Ok(3),
            ..FakeMetrics::default()
        });
        assert!(fetcher.check_insights("prod").await);
        assert!(fetcher.check_insights("prod").await);
        assert_eq!(*fetcher.api.probe_calls.lock().expect("lock"), 1);

        // A different cluster re-probes.
        fetcher.check_insights("staging").await;
        assert_eq!(*fetcher.api.probe_calls.lock().expect("lock"), 2);
    }

    #[tokio::test]
    async fn attach_metrics_sets_service_values() {
        let mut series = HashMap::new();
        series.insert("svc_cpu_api".to_string(), Some(42.5));
        series.insert("svc_mem_api".to_string(), Some(61.2));
        let mut fetcher = MetricsFetcher::new(FakeMetrics {
            series,
            ..FakeMetrics::default()
        });

        let mut cluster = cluster_with_service("RUNNING");
        fetcher.attach_metrics(&mut cluster).await;

        assert_eq!(cluster.services[0].cpu_used, Some(42.5));
        assert_eq!(cluster.services[0].memory_used, Some(61.2));
    }

    #[tokio::test]
    async fn no_container_queries_without_running_tasks() {
        let mut fetcher = MetricsFetcher::new(FakeMetrics {
            probe_datapoints: Ok(1),
            ..FakeMetrics::default()
        });

        let mut cluster = cluster_with_service("STOPPED");
        fetcher.attach_metrics(&mut cluster).await;

        // Only the one service-level batch went out.
        let batches = fetcher.api.series_batches.lock().expect("lock");
        assert_eq!(batches.as_slice(), &[2]);
    }

    #[tokio::test]
    async fn container_metrics_round_memory_keep_cpu_fraction() {
        let mut series = HashMap::new();
        series.insert("cpu_abc123def456_app".to_string(), Some(12.75));
        series.insert("mem_abc123def456_app".to_string(), Some(127.6));
        let mut fetcher = MetricsFetcher::new(FakeMetrics {
            probe_datapoints: Ok(1),
            series,
            ..FakeMetrics::default()
        });

        let mut cluster = cluster_with_service("RUNNING");
        fetcher.attach_metrics(&mut cluster).await;

        let container = &cluster.services[0].tasks[0].containers[0];
        assert_eq!(container.cpu_used, Some(12.75));
        assert_eq!(container.memory_used, Some(128));
    }

    #[tokio::test]
    async fn failed_batch_yields_no_data_not_error() {
        let mut fetcher = MetricsFetcher::new(FakeMetrics {
            fail_series: true,
            ..FakeMetrics::default()
        });

        let mut cluster = cluster_with_service("RUNNING");
        cluster.services[0].cpu_used = Some(99.0);
        cluster.services[0].memory_used = Some(99.0);
        fetcher.attach_metrics(&mut cluster).await;

        // Stale values are replaced with explicit "no data".
        assert_eq!(cluster.services[0].cpu_used, None);
        assert_eq!(cluster.services[0].memory_used, None);
    }

    #[tokio::test]
    async fn batches_split_at_query_cap() {
        let fetcher = MetricsFetcher::new(FakeMetrics::default());
        let queries = (0..MAX_QUERIES_PER_CALL + 2)
            .map(|index| MetricQuery {
                id: format!("q{index}"),
                namespace: SERVICE_NAMESPACE,
                metric_name: "CPUUtilization",
                dimensions: Vec::new(),
            })
            .collect::<Vec<_>>();

        let results = fetcher.fetch_batched(&queries).await;

        assert_eq!(results.len(), MAX_QUERIES_PER_CALL + 2);
        let batches = fetcher.api.series_batches.lock().expect("lock");
        assert_eq!(batches.as_slice(), &[MAX_QUERIES_PER_CALL, 2]);
    }
}

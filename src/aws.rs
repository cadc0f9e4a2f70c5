use anyhow::{Context, Result};
use aws_sdk_cloudwatch::primitives::DateTime as CwDateTime;
use aws_sdk_cloudwatch::types::{Dimension, Metric, MetricDataQuery, MetricStat, ScanBy, Statistic};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::Config;

/// Plain, provider-shaped records handed from the API boundary to the
/// topology fetcher. Keeping these free of SDK types lets the fetchers be
/// exercised against in-memory fakes.
#[derive(Debug, Clone, Default)]
pub struct ClusterDetail {
    pub name: String,
    pub arn: String,
    pub status: String,
    pub active_services_count: i32,
    pub running_tasks_count: i32,
    pub pending_tasks_count: i32,
    pub registered_container_instances_count: i32,
}

#[derive(Debug, Clone, Default)]
pub struct ServiceDetail {
    pub name: String,
    pub arn: String,
    pub status: String,
    pub desired_count: i32,
    pub running_count: i32,
    pub pending_count: i32,
    pub task_definition_arn: String,
    pub deployments: Vec<DeploymentDetail>,
}

#[derive(Debug, Clone, Default)]
pub struct DeploymentDetail {
    pub id: String,
    pub status: String,
    pub desired_count: i32,
    pub running_count: i32,
    pub pending_count: i32,
    pub task_definition_arn: String,
    pub rollout_state: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskDetail {
    pub arn: String,
    pub task_definition_arn: String,
    pub last_status: String,
    pub health_status: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub group: Option<String>,
    pub containers: Vec<ContainerDetail>,
}

#[derive(Debug, Clone, Default)]
pub struct ContainerDetail {
    pub name: String,
    pub last_status: String,
    pub health_status: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskDefinition {
    pub containers: Vec<ContainerDefinition>,
}

#[derive(Debug, Clone, Default)]
pub struct ContainerDefinition {
    pub name: String,
    pub cpu: Option<i32>,
    pub memory: Option<i32>,
}

/// One entry in a batched time-series request. The id must already be a
/// valid CloudWatch metric id (see `metrics::sanitize_metric_id`).
#[derive(Debug, Clone)]
pub struct MetricQuery {
    pub id: String,
    pub namespace: &'static str,
    pub metric_name: &'static str,
    pub dimensions: Vec<(String, String)>,
}

/// The orchestration side of the provider. Listing operations paginate
/// internally and return the full identifier set; describe operations take
/// pre-chunked identifier slices (the fetcher owns batching).
pub trait OrchestrationApi {
    async fn list_cluster_arns(&self) -> Result<Vec<String>>;
    async fn describe_clusters(&self, arns: &[String]) -> Result<Vec<ClusterDetail>>;
    async fn list_service_arns(&self, cluster: &str) -> Result<Vec<String>>;
    async fn describe_services(&self, cluster: &str, arns: &[String])
    -> Result<Vec<ServiceDetail>>;
    async fn list_task_arns(&self, cluster: &str, service: &str) -> Result<Vec<String>>;
    async fn describe_tasks(&self, cluster: &str, arns: &[String]) -> Result<Vec<TaskDetail>>;
    async fn describe_task_definition(&self, arn: &str) -> Result<TaskDefinition>;
}

/// The metrics side of the provider.
pub trait MetricsApi {
    /// Number of datapoints a single statistics query returns over the
    /// trailing window. Used to probe Container Insights availability.
    async fn statistic_sample_count(
        &self,
        namespace: &str,
        metric_name: &str,
        dimensions: &[(String, String)],
        window: Duration,
        period_secs: i32,
    ) -> Result<usize>;

    /// Issues one batched time-series call over the trailing window and
    /// returns the most recent value per query id. An id with zero
    /// datapoints maps to `None`. Callers must keep batches within the
    /// provider's per-call query cap.
    async fn fetch_time_series(
        &self,
        queries: &[MetricQuery],
        window: Duration,
    ) -> Result<HashMap<String, Option<f64>>>;
}

/// AWS SDK-backed gateway implementing both provider traits. Retry and
/// timeout policy live in the SDK's default adaptive retry layer, below
/// this boundary.
#[derive(Clone)]
pub struct AwsGateway {
    ecs: aws_sdk_ecs::Client,
    cloudwatch: aws_sdk_cloudwatch::Client,
    region: String,
}

impl AwsGateway {
    pub async fn new(config: &Config) -> Result<Self> {
        let mut loader = aws_config::from_env();
        if let Some(region) = &config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        if let Some(profile) = &config.profile {
            loader = loader.profile_name(profile);
        }
        let sdk_config = loader.load().await;
        let region = sdk_config
            .region()
            .map(|region| region.to_string())
            .context("no AWS region configured; pass --region or set AWS_REGION")?;

        Ok(Self {
            ecs: aws_sdk_ecs::Client::new(&sdk_config),
            cloudwatch: aws_sdk_cloudwatch::Client::new(&sdk_config),
            region,
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

impl OrchestrationApi for AwsGateway {
    async fn list_cluster_arns(&self) -> Result<Vec<String>> {
        let mut arns = Vec::new();
        let mut pages = self.ecs.list_clusters().into_paginator().send();
        while let Some(page) = pages.next().await {
            let page = page.context("failed to list clusters")?;
            arns.extend(page.cluster_arns().iter().cloned());
        }
        Ok(arns)
    }

    async fn describe_clusters(&self, arns: &[String]) -> Result<Vec<ClusterDetail>> {
        let response = self
            .ecs
            .describe_clusters()
            .set_clusters(Some(arns.to_vec()))
            .send()
            .await
            .context("failed to describe clusters")?;

        Ok(response
            .clusters()
            .iter()
            .map(|cluster| ClusterDetail {
                name: cluster.cluster_name().unwrap_or_default().to_string(),
                arn: cluster.cluster_arn().unwrap_or_default().to_string(),
                status: cluster.status().unwrap_or("UNKNOWN").to_string(),
                active_services_count: cluster.active_services_count(),
                running_tasks_count: cluster.running_tasks_count(),
                pending_tasks_count: cluster.pending_tasks_count(),
                registered_container_instances_count: cluster
                    .registered_container_instances_count(),
            })
            .collect())
    }

    async fn list_service_arns(&self, cluster: &str) -> Result<Vec<String>> {
        let mut arns = Vec::new();
        let mut pages = self
            .ecs
            .list_services()
            .cluster(cluster)
            .into_paginator()
            .send();
        while let Some(page) = pages.next().await {
            let page = page.with_context(|| format!("failed to list services in {cluster}"))?;
            arns.extend(page.service_arns().iter().cloned());
        }
        Ok(arns)
    }

    async fn describe_services(
        &self,
        cluster: &str,
        arns: &[String],
    ) -> Result<Vec<ServiceDetail>> {
        let response = self
            .ecs
            .describe_services()
            .cluster(cluster)
            .set_services(Some(arns.to_vec()))
            .send()
            .await
            .with_context(|| format!("failed to describe services in {cluster}"))?;

        Ok(response
            .services()
            .iter()
            .map(|service| ServiceDetail {
                name: service.service_name().unwrap_or_default().to_string(),
                arn: service.service_arn().unwrap_or_default().to_string(),
                status: service.status().unwrap_or("UNKNOWN").to_string(),
                desired_count: service.desired_count(),
                running_count: service.running_count(),
                pending_count: service.pending_count(),
                task_definition_arn: service.task_definition().unwrap_or_default().to_string(),
                deployments: service
                    .deployments()
                    .iter()
                    .map(|deployment| DeploymentDetail {
                        id: deployment.id().unwrap_or_default().to_string(),
                        status: deployment.status().unwrap_or_default().to_string(),
                        desired_count: deployment.desired_count(),
                        running_count: deployment.running_count(),
                        pending_count: deployment.pending_count(),
                        task_definition_arn: deployment
                            .task_definition()
                            .unwrap_or_default()
                            .to_string(),
                        rollout_state: deployment
                            .rollout_state()
                            .map(|state| state.as_str().to_string()),
                    })
                    .collect(),
            })
            .collect())
    }

    async fn list_task_arns(&self, cluster: &str, service: &str) -> Result<Vec<String>> {
        let mut arns = Vec::new();
        let mut pages = self
            .ecs
            .list_tasks()
            .cluster(cluster)
            .service_name(service)
            .into_paginator()
            .send();
        while let Some(page) = pages.next().await {
            let page = page
                .with_context(|| format!("failed to list tasks for {service} in {cluster}"))?;
            arns.extend(page.task_arns().iter().cloned());
        }
        Ok(arns)
    }

    async fn describe_tasks(&self, cluster: &str, arns: &[String]) -> Result<Vec<TaskDetail>> {
        let response = self
            .ecs
            .describe_tasks()
            .cluster(cluster)
            .set_tasks(Some(arns.to_vec()))
            .send()
            .await
            .with_context(|| format!("failed to describe tasks in {cluster}"))?;

        Ok(response
            .tasks()
            .iter()
            .map(|task| TaskDetail {
                arn: task.task_arn().unwrap_or_default().to_string(),
                task_definition_arn: task.task_definition_arn().unwrap_or_default().to_string(),
                last_status: task.last_status().unwrap_or("UNKNOWN").to_string(),
                health_status: task.health_status().map(|health| health.as_str().to_string()),
                started_at: task
                    .started_at()
                    .and_then(|at| DateTime::from_timestamp(at.secs(), at.subsec_nanos())),
                group: task.group().map(str::to_string),
                containers: task
                    .containers()
                    .iter()
                    .map(|container| ContainerDetail {
                        name: container.name().unwrap_or_default().to_string(),
                        last_status: container.last_status().unwrap_or("UNKNOWN").to_string(),
                        health_status: container
                            .health_status()
                            .map(|health| health.as_str().to_string()),
                    })
                    .collect(),
            })
            .collect())
    }

    async fn describe_task_definition(&self, arn: &str) -> Result<TaskDefinition> {
        let response = self
            .ecs
            .describe_task_definition()
            .task_definition(arn)
            .send()
            .await
            .with_context(|| format!("failed to describe task definition {arn}"))?;

        let definition = response
            .task_definition()
            .with_context(|| format!("empty response describing task definition {arn}"))?;

        Ok(TaskDefinition {
            containers: definition
                .container_definitions()
                .iter()
                .map(|container| ContainerDefinition {
                    name: container.name().unwrap_or_default().to_string(),
                    cpu: (container.cpu() != 0).then(|| container.cpu()),
                    memory: container.memory(),
                })
                .collect(),
        })
    }
}

impl MetricsApi for AwsGateway {
    async fn statistic_sample_count(
        &self,
        namespace: &str,
        metric_name: &str,
        dimensions: &[(String, String)],
        window: Duration,
        period_secs: i32,
    ) -> Result<usize> {
        let (start, end) = trailing_window(window)?;
        let mut request = self
            .cloudwatch
            .get_metric_statistics()
            .namespace(namespace)
            .metric_name(metric_name)
            .start_time(start)
            .end_time(end)
            .period(period_secs)
            .statistics(Statistic::Average);
        for (name, value) in dimensions {
            request = request.dimensions(dimension(name, value));
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("failed to query {namespace}/{metric_name} statistics"))?;
        Ok(response.datapoints().len())
    }

    async fn fetch_time_series(
        &self,
        queries: &[MetricQuery],
        window: Duration,
    ) -> Result<HashMap<String, Option<f64>>> {
        let (start, end) = trailing_window(window)?;
        let data_queries = queries
            .iter()
            .map(|query| {
                let mut metric = Metric::builder()
                    .namespace(query.namespace)
                    .metric_name(query.metric_name);
                for (name, value) in &query.dimensions {
                    metric = metric.dimensions(dimension(name, value));
                }
                MetricDataQuery::builder()
                    .id(&query.id)
                    .metric_stat(
                        MetricStat::builder()
                            .metric(metric.build())
                            .period(60)
                            .stat("Average")
                            .build(),
                    )
                    .return_data(true)
                    .build()
            })
            .collect::<Vec<_>>();

        let response = self
            .cloudwatch
            .get_metric_data()
            .set_metric_data_queries(Some(data_queries))
            .start_time(start)
            .end_time(end)
            .scan_by(ScanBy::TimestampDescending)
            .send()
            .await
            .context("failed to fetch metric data batch")?;

        let mut results = HashMap::with_capacity(queries.len());
        for result in response.metric_data_results() {
            let Some(id) = result.id() else { continue };
            // Newest first under TimestampDescending.
            results.insert(id.to_string(), result.values().first().copied());
        }
        Ok(results)
    }
}

fn dimension(name: &str, value: &str) -> Dimension {
    Dimension::builder().name(name).value(value).build()
}

fn trailing_window(window: Duration) -> Result<(CwDateTime, CwDateTime)> {
    let end = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock before unix epoch")?
        .as_secs() as i64;
    let start = end - window.as_secs() as i64;
    Ok((CwDateTime::from_secs(start), CwDateTime::from_secs(end)))
}

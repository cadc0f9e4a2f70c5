use anyhow::{Result, bail};
use chrono::Utc;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::aws::{OrchestrationApi, ServiceDetail, TaskDefinition, TaskDetail};
use crate::cache::TtlCache;
use crate::model::{
    Cluster, Container, Deployment, HealthStatus, Service, Task, name_from_arn,
    service_from_group, task_definition_label,
};

/// DescribeClusters accepts up to 100 ARNs per call.
pub const DESCRIBE_CLUSTERS_BATCH: usize = 100;
/// DescribeServices enforces a much lower cap of 10 ARNs per call.
pub const DESCRIBE_SERVICES_BATCH: usize = 10;
/// DescribeTasks accepts up to 100 ARNs per call.
pub const DESCRIBE_TASKS_BATCH: usize = 100;

/// Coarse-milestone progress reporting. The sink must not block; whatever
/// it does has no bearing on the fetch itself.
pub type ProgressFn = Box<dyn Fn(&str) + Send + Sync>;

/// Pulls cluster topology from the orchestration API and assembles the
/// nested Cluster → Service → Task → Container snapshot. Task definitions
/// are immutable by ARN, so their container limits come out of a TTL cache
/// instead of one describe call per task per cycle.
pub struct TopologyFetcher<A> {
    api: A,
    region: String,
    task_definitions: TtlCache<TaskDefinition>,
    progress: Option<ProgressFn>,
}

impl<A: OrchestrationApi> TopologyFetcher<A> {
    pub fn new(api: A, region: impl Into<String>, task_definition_ttl: Duration) -> Self {
        Self {
            api,
            region: region.into(),
            task_definitions: TtlCache::new(task_definition_ttl),
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

    /// Lists every cluster in the region with its counts populated and an
    /// empty service list. Zero clusters is a valid empty result.
    pub async fn list_clusters(&mut self) -> Result<Vec<Cluster>> {
        self.report("Listing clusters…");
        let arns = self.api.list_cluster_arns().await?;
        if arns.is_empty() {
            return Ok(Vec::new());
        }

        let mut details = Vec::with_capacity(arns.len());
        for chunk in arns.chunks(DESCRIBE_CLUSTERS_BATCH) {
            details.extend(self.api.describe_clusters(chunk).await?);
        }

        let mut clusters = details
            .into_iter()
            .map(|detail| Cluster {
                name: detail.name,
                arn: detail.arn,
                status: detail.status,
                region: self.region.clone(),
                active_services_count: detail.active_services_count,
                running_tasks_count: detail.running_tasks_count,
                pending_tasks_count: detail.pending_tasks_count,
                registered_container_instances_count: detail
                    .registered_container_instances_count,
                services: Vec::new(),
                last_updated: Some(Utc::now()),
                insights_enabled: false,
            })
            .collect::<Vec<_>>();
        clusters.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(clusters)
    }

    /// Describes the named cluster and builds its full nested state. A
    /// failing cluster describe is fatal to the refresh cycle; empty
    /// service or task listings are valid zero-length results.
    pub async fn fetch_cluster_state(&mut self, cluster_name: &str) -> Result<Cluster> {
        self.report(&format!("Fetching cluster {cluster_name}…"));
        let details = self
            .api
            .describe_clusters(&[cluster_name.to_string()])
            .await?;
        let Some(detail) = details.into_iter().next() else {
            bail!("cluster {cluster_name} not found");
        };

        let service_arns = self.api.list_service_arns(cluster_name).await?;
        self.report(&format!("Fetching {} services…", service_arns.len()));
        let service_details = self
            .describe_services_batched(cluster_name, &service_arns)
            .await?;

        let mut services = Vec::with_capacity(service_details.len());
        for service_detail in service_details {
            let task_arns = self
                .api
                .list_task_arns(cluster_name, &service_detail.name)
                .await?;
            let task_details = self.describe_tasks_batched(cluster_name, &task_arns).await?;

            let mut definitions = HashMap::new();
            for task_detail in &task_details {
                self.resolve_task_definition(&task_detail.task_definition_arn, &mut definitions)
                    .await;
            }

            // The task listing is already scoped to the service, but the
            // group label is authoritative for assignment.
            let tasks = task_details
                .into_iter()
                .filter(|task_detail| {
                    service_from_group(task_detail.group.as_deref())
                        .is_none_or(|assigned| assigned == service_detail.name)
                })
                .map(|task_detail| build_task(task_detail, &definitions))
                .collect();
            services.push(build_service(service_detail, tasks));
        }
        services.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Cluster {
            name: detail.name,
            arn: detail.arn,
            status: detail.status,
            region: self.region.clone(),
            active_services_count: detail.active_services_count,
            running_tasks_count: detail.running_tasks_count,
            pending_tasks_count: detail.pending_tasks_count,
            registered_container_instances_count: detail.registered_container_instances_count,
            services,
            last_updated: Some(Utc::now()),
            insights_enabled: false,
        })
    }

    async fn describe_services_batched(
        &self,
        cluster_name: &str,
        arns: &[String],
    ) -> Result<Vec<ServiceDetail>> {
        let mut details = Vec::with_capacity(arns.len());
        for chunk in arns.chunks(DESCRIBE_SERVICES_BATCH) {
            details.extend(self.api.describe_services(cluster_name, chunk).await?);
        }
        Ok(details)
    }

    async fn describe_tasks_batched(
        &self,
        cluster_name: &str,
        arns: &[String],
    ) -> Result<Vec<TaskDetail>> {
        let mut details = Vec::with_capacity(arns.len());
        for chunk in arns.chunks(DESCRIBE_TASKS_BATCH) {
            details.extend(self.api.describe_tasks(cluster_name, chunk).await?);
        }
        Ok(details)
    }

    /// Resolves a task definition through the TTL cache, describing it on a
    /// miss. Container limits are display data, so a failed describe
    /// degrades to missing limits rather than failing the cycle.
    async fn resolve_task_definition(
        &mut self,
        arn: &str,
        definitions: &mut HashMap<String, TaskDefinition>,
    ) {
        if arn.is_empty() || definitions.contains_key(arn) {
            return;
        }
        if let Some(definition) = self.task_definitions.get(arn) {
            definitions.insert(arn.to_string(), definition.clone());
            return;
        }
        match self.api.describe_task_definition(arn).await {
            Ok(definition) => {
                debug!(arn, "cached task definition");
                self.task_definitions.set(arn, definition.clone());
                definitions.insert(arn.to_string(), definition);
            }
            Err(error) => {
                warn!(arn, "failed to describe task definition: {error:#}");
            }
        }
    }
}

fn build_service(detail: ServiceDetail, tasks: Vec<Task>) -> Service {
    Service {
        name: detail.name,
        arn: detail.arn,
        status: detail.status,
        desired_count: detail.desired_count,
        running_count: detail.running_count,
        pending_count: detail.pending_count,
        task_definition: task_definition_label(&detail.task_definition_arn).to_string(),
        deployments: detail
            .deployments
            .into_iter()
            .map(|deployment| Deployment {
                id: deployment.id,
                status: deployment.status,
                desired_count: deployment.desired_count,
                running_count: deployment.running_count,
                pending_count: deployment.pending_count,
                task_definition: task_definition_label(&deployment.task_definition_arn)
                    .to_string(),
                rollout_state: deployment.rollout_state,
            })
            .collect(),
        tasks,
        cpu_used: None,
        memory_used: None,
    }
}

fn build_task(detail: TaskDetail, definitions: &HashMap<String, TaskDefinition>) -> Task {
    let definition = definitions.get(&detail.task_definition_arn);
    let containers = detail
        .containers
        .into_iter()
        .map(|container| {
            let limits = definition.and_then(|definition| {
                definition
                    .containers
                    .iter()
                    .find(|candidate| candidate.name == container.name)
            });
            Container {
                name: container.name,
                status: container.last_status,
                health_status: HealthStatus::from_api(container.health_status.as_deref()),
                cpu_limit: limits.and_then(|limit| limit.cpu),
                memory_limit: limits.and_then(|limit| limit.memory),
                cpu_used: None,
                memory_used: None,
            }
        })
        .collect();

    Task {
        id: name_from_arn(&detail.arn).to_string(),
        arn: detail.arn.clone(),
        status: detail.last_status,
        health_status: HealthStatus::from_api(detail.health_status.as_deref()),
        task_definition_arn: detail.task_definition_arn,
        started_at: detail.started_at,
        containers,
    }
}

use chrono::{DateTime, Utc};
use std::fmt::{Display, Formatter};

/// Health as reported by ECS for tasks/containers, or derived for services.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Warning,
    Unknown,
}

impl HealthStatus {
    pub fn from_api(value: Option<&str>) -> Self {
        match value.map(str::to_ascii_uppercase).as_deref() {
            Some("HEALTHY") => Self::Healthy,
            Some("UNHEALTHY") => Self::Unhealthy,
            Some("WARNING") => Self::Warning,
            _ => Self::Unknown,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Healthy => "●",
            Self::Unhealthy => "✗",
            Self::Warning => "▲",
            Self::Unknown => "○",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Healthy => "HEALTHY",
            Self::Unhealthy => "UNHEALTHY",
            Self::Warning => "WARNING",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl Display for HealthStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One ECS cluster. Rebuilt wholesale on every refresh cycle; nothing in
/// here is ever merged across cycles.
#[derive(Debug, Clone, Default)]
pub struct Cluster {
    pub name: String,
    pub arn: String,
    pub status: String,
    pub region: String,
    pub active_services_count: i32,
    pub running_tasks_count: i32,
    pub pending_tasks_count: i32,
    pub registered_container_instances_count: i32,
    pub services: Vec<Service>,
    pub last_updated: Option<DateTime<Utc>>,
    pub insights_enabled: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Service {
    pub name: String,
    pub arn: String,
    pub status: String,
    pub desired_count: i32,
    pub running_count: i32,
    pub pending_count: i32,
    /// Task definition as `family:revision`, resolved from the ARN.
    pub task_definition: String,
    pub deployments: Vec<Deployment>,
    pub tasks: Vec<Task>,
    /// Service-level CPU utilization percentage. `None` means CloudWatch
    /// returned no datapoints, which is distinct from 0.0.
    pub cpu_used: Option<f64>,
    pub memory_used: Option<f64>,
}

impl Service {
    /// Derives service health from its counts and the health of its tasks.
    pub fn health(&self) -> HealthStatus {
        if self
            .tasks
            .iter()
            .any(|task| task.health_status == HealthStatus::Unhealthy)
        {
            return HealthStatus::Unhealthy;
        }
        if self.running_count < self.desired_count
            || self
                .tasks
                .iter()
                .any(|task| task.health_status == HealthStatus::Warning)
        {
            return HealthStatus::Warning;
        }
        if self.desired_count == 0 && self.tasks.is_empty() {
            return HealthStatus::Unknown;
        }
        HealthStatus::Healthy
    }

    /// The PRIMARY deployment's rollout state, when the API reports one.
    pub fn rollout_state(&self) -> Option<&str> {
        self.deployments
            .iter()
            .find(|deployment| deployment.status == "PRIMARY")
            .and_then(|deployment| deployment.rollout_state.as_deref())
    }

    pub fn tasks_display(&self) -> String {
        format!("{}/{}", self.running_count, self.desired_count)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Deployment {
    pub id: String,
    pub status: String,
    pub desired_count: i32,
    pub running_count: i32,
    pub pending_count: i32,
    pub task_definition: String,
    pub rollout_state: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Task {
    /// Final path segment of the task ARN; stable for a running task.
    pub id: String,
    pub arn: String,
    pub status: String,
    pub health_status: HealthStatus,
    pub task_definition_arn: String,
    pub started_at: Option<DateTime<Utc>>,
    pub containers: Vec<Container>,
}

impl Task {
    /// Truncated task id used in table rows and metric query ids.
    pub fn short_id(&self) -> &str {
        if self.id.len() > 12 {
            &self.id[..12]
        } else {
            &self.id
        }
    }

    pub fn started_ago(&self, now: DateTime<Utc>) -> String {
        let Some(started_at) = self.started_at else {
            return "-".to_string();
        };
        let elapsed = now.signed_duration_since(started_at);
        let seconds = elapsed.num_seconds().max(0);
        if seconds < 60 {
            format!("{seconds}s ago")
        } else if seconds < 3_600 {
            format!("{}m ago", seconds / 60)
        } else if seconds < 86_400 {
            format!("{}h ago", seconds / 3_600)
        } else {
            format!("{}d ago", seconds / 86_400)
        }
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

#[derive(Debug, Clone, Default)]
pub struct Container {
    pub name: String,
    pub status: String,
    pub health_status: HealthStatus,
    /// Static limits from the task definition, in CPU units and MiB.
    pub cpu_limit: Option<i32>,
    pub memory_limit: Option<i32>,
    /// Point-in-time usage from Container Insights. Replaced wholesale on
    /// every refresh; `None` means no datapoint this cycle.
    pub cpu_used: Option<f64>,
    pub memory_used: Option<u64>,
}

impl Container {
    pub fn cpu_display(&self) -> String {
        match (self.cpu_used, self.cpu_limit) {
            (Some(used), Some(limit)) => format!("{used:.1}/{limit}"),
            (Some(used), None) => format!("{used:.1}"),
            (None, Some(limit)) => format!("-/{limit}"),
            (None, None) => "-".to_string(),
        }
    }

    pub fn memory_display(&self) -> String {
        match (self.memory_used, self.memory_limit) {
            (Some(used), Some(limit)) => format!("{used}/{limit}M"),
            (Some(used), None) => format!("{used}M"),
            (None, Some(limit)) => format!("-/{limit}M"),
            (None, None) => "-".to_string(),
        }
    }
}

/// Formats an optional utilization percentage for table cells.
pub fn percent_display(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{value:.1}%"),
        None => "-".to_string(),
    }
}

/// Last path segment of an ARN: cluster name, task id, and so on.
pub fn name_from_arn(arn: &str) -> &str {
    arn.rsplit('/').next().unwrap_or(arn)
}

/// `family:revision` label for a task definition ARN.
pub fn task_definition_label(arn: &str) -> &str {
    name_from_arn(arn)
}

/// Service name a task belongs to, inferred from its group label
/// (`service:<name>`). Tasks started outside a service have no group or a
/// `family:` group and are unassigned.
pub fn service_from_group(group: Option<&str>) -> Option<&str> {
    group.and_then(|group| group.strip_prefix("service:"))
}

//! AWS web-console URLs for the currently addressed entity.

pub fn cluster_url(cluster_name: &str, region: &str) -> String {
    format!("https://console.aws.amazon.com/ecs/v2/clusters/{cluster_name}?region={region}")
}

pub fn service_url(cluster_name: &str, service_name: &str, region: &str) -> String {
    format!(
        "https://console.aws.amazon.com/ecs/v2/clusters/{cluster_name}/services/{service_name}?region={region}"
    )
}

pub fn task_url(cluster_name: &str, task_id: &str, region: &str) -> String {
    format!(
        "https://console.aws.amazon.com/ecs/v2/clusters/{cluster_name}/tasks/{task_id}?region={region}"
    )
}

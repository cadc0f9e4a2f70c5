use clap::Parser;

#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "ecstop",
    version,
    about = "A terminal dashboard for Amazon ECS clusters, services, and tasks."
)]
pub struct CliArgs {
    /// AWS region (falls back to the config file, then the AWS environment)
    #[arg(long)]
    pub region: Option<String>,

    /// AWS credential profile name
    #[arg(long)]
    pub profile: Option<String>,

    /// Select this cluster on startup
    #[arg(short, long)]
    pub cluster: Option<String>,

    /// Refresh interval in seconds (floor: 5)
    #[arg(long)]
    pub refresh_secs: Option<u64>,

    /// Task definition cache TTL in seconds (floor: 60)
    #[arg(long)]
    pub task_def_ttl_secs: Option<u64>,

    /// tracing filter (for example: info,debug,trace)
    #[arg(long, default_value = "info")]
    pub log_filter: String,
}

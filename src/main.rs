mod app;
mod aws;
mod cache;
mod cli;
mod config;
mod console;
mod fetch;
mod input;
mod metrics;
mod model;
mod ui;

use anyhow::{Context, Result};
use app::{App, AppCommand, RefreshRequest, Snapshot};
use aws::{AwsGateway, MetricsApi, OrchestrationApi};
use clap::Parser;
use cli::CliArgs;
use config::Config;
use crossterm::event::{Event, EventStream, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use fetch::TopologyFetcher;
use futures::StreamExt;
use metrics::MetricsFetcher;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io::{self, Stdout};
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};
use tracing::debug;
use tracing_subscriber::EnvFilter;

type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;

/// Messages the refresh worker sends back to the event loop.
enum WorkerMsg {
    Progress(String),
    Done(Result<Snapshot, String>),
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(&args.log_filter)?;

    let config = Config::resolve(&args)?;
    let gateway = AwsGateway::new(&config).await?;

    let mut app = App::new(gateway.region().to_string(), config.cluster.clone());

    run(&mut app, gateway, &config).await
}

fn init_tracing(level_filter: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level_filter)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to initialize tracing filter")?;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .with_writer(std::io::sink)
        .try_init();

    Ok(())
}

async fn run(app: &mut App, gateway: AwsGateway, config: &Config) -> Result<()> {
    let mut terminal = init_terminal()?;
    let run_result = run_loop(&mut terminal, app, gateway, config).await;
    let restore_result = restore_terminal(&mut terminal);

    match (run_result, restore_result) {
        (Err(run_error), Err(restore_error)) => Err(anyhow::anyhow!(
            "{run_error:#}\nterminal restore error: {restore_error:#}"
        )),
        (Err(error), _) => Err(error),
        (_, Err(error)) => Err(error),
        (Ok(()), Ok(())) => Ok(()),
    }
}

fn init_terminal() -> Result<TuiTerminal> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;
    terminal.clear().context("failed to clear terminal")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut TuiTerminal) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;
    Ok(())
}

async fn run_loop(
    terminal: &mut TuiTerminal,
    app: &mut App,
    gateway: AwsGateway,
    config: &Config,
) -> Result<()> {
    let (request_tx, request_rx) = mpsc::unbounded_channel::<RefreshRequest>();
    let (worker_tx, mut worker_rx) = mpsc::unbounded_channel::<WorkerMsg>();
    let worker = tokio::spawn(refresh_worker(
        gateway,
        config.task_definition_ttl,
        request_rx,
        worker_tx,
    ));

    dispatch_refresh(app, &request_tx);

    let mut reader = EventStream::new();
    let mut ticker = interval(config.refresh_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        terminal
            .draw(|frame| ui::render(frame, app))
            .context("failed to render terminal frame")?;

        if !app.running() {
            break;
        }

        tokio::select! {
            maybe_event = reader.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        if let Some(action) = input::map_key(key) {
                            debug!("action={action:?}");
                            if app.apply_action(action) == AppCommand::Refresh {
                                dispatch_refresh(app, &request_tx);
                            }
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        app.set_status(format!("terminal event error: {error}"));
                    }
                    None => {
                        app.set_status("terminal event stream closed");
                        break;
                    }
                }
            }
            _ = ticker.tick() => {
                dispatch_refresh(app, &request_tx);
            }
            maybe_msg = worker_rx.recv() => {
                match maybe_msg {
                    Some(WorkerMsg::Progress(message)) => app.set_status(message),
                    Some(WorkerMsg::Done(outcome)) => {
                        app.finish_refresh(outcome);
                        // A selection made during the last cycle has no
                        // detail yet; follow up immediately.
                        if app.needs_detail_fetch() {
                            dispatch_refresh(app, &request_tx);
                        }
                    }
                    None => {
                        app.set_status("refresh worker stopped");
                        break;
                    }
                }
            }
        }
    }

    drop(request_tx);
    worker.abort();
    Ok(())
}

fn dispatch_refresh(app: &mut App, request_tx: &mpsc::UnboundedSender<RefreshRequest>) {
    let Some(request) = app.begin_refresh() else {
        return;
    };
    if request_tx.send(request).is_err() {
        app.finish_refresh(Err("refresh worker stopped".to_string()));
    }
}

/// Owns the fetchers (and their caches) for the lifetime of the program and
/// turns refresh requests into snapshots, one cycle at a time.
async fn refresh_worker(
    gateway: AwsGateway,
    task_definition_ttl: std::time::Duration,
    mut request_rx: mpsc::UnboundedReceiver<RefreshRequest>,
    worker_tx: mpsc::UnboundedSender<WorkerMsg>,
) {
    let region = gateway.region().to_string();
    let mut topology = TopologyFetcher::new(gateway.clone(), region, task_definition_ttl);
    let mut metrics = MetricsFetcher::new(gateway);

    let progress_tx = worker_tx.clone();
    topology.set_progress(Some(Box::new(move |message: &str| {
        let _ = progress_tx.send(WorkerMsg::Progress(message.to_string()));
    })));
    let progress_tx = worker_tx.clone();
    metrics.set_progress(Some(Box::new(move |message: &str| {
        let _ = progress_tx.send(WorkerMsg::Progress(message.to_string()));
    })));

    while let Some(request) = request_rx.recv().await {
        let outcome = run_cycle(&mut topology, &mut metrics, &request)
            .await
            .map_err(|error| format!("{error:#}"));
        if worker_tx.send(WorkerMsg::Done(outcome)).is_err() {
            break;
        }
    }
}

/// One full refresh cycle: the cluster listing is authoritative and its
/// failure fails the cycle, as does a failing detail fetch. Metrics degrade
/// to missing values instead.
async fn run_cycle<A: OrchestrationApi, M: MetricsApi>(
    topology: &mut TopologyFetcher<A>,
    metrics: &mut MetricsFetcher<M>,
    request: &RefreshRequest,
) -> Result<Snapshot> {
    let clusters = topology.list_clusters().await?;

    let Some(cluster_name) = &request.cluster else {
        return Ok(Snapshot {
            clusters,
            detail: None,
            insights_enabled: false,
        });
    };

    // A selected cluster missing from the listing has been deleted. The
    // cycle still succeeds with the fresh listing and no detail, so the
    // reconciler can clear the selection instead of looping on a fetch
    // error against stale data.
    if !clusters.iter().any(|cluster| cluster.name == *cluster_name) {
        return Ok(Snapshot {
            clusters,
            detail: None,
            insights_enabled: false,
        });
    }

    let insights_enabled = metrics.check_insights(cluster_name).await;
    let mut detail = topology.fetch_cluster_state(cluster_name).await?;
    detail.insights_enabled = insights_enabled;
    metrics.attach_metrics(&mut detail).await;

    Ok(Snapshot {
        clusters,
        detail: Some(detail),
        insights_enabled,
    })
}

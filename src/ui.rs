use chrono::Utc;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap};

use crate::app::{App, DetailRow, Focus, RefreshPhase};
use crate::model::{Cluster, Container, HealthStatus, Service, Task, percent_display};

const BG: Color = Color::Rgb(9, 15, 25);
const PANEL: Color = Color::Rgb(16, 27, 44);
const ACCENT: Color = Color::Rgb(52, 211, 153);
const MUTED: Color = Color::Rgb(140, 156, 178);
const WARN: Color = Color::Rgb(251, 191, 36);
const ERROR: Color = Color::Rgb(248, 113, 113);

pub fn render(frame: &mut Frame, app: &App) {
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(6),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_header(frame, root[0], app);
    if app.loading() {
        render_loading(frame, root[1], app);
    } else {
        render_body(frame, root[1], app);
    }
    render_footer(frame, root[2], app);

    if app.show_help() {
        render_help_modal(frame);
    }
}

fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![
        Span::styled(
            " ecstop ",
            Style::default().fg(BG).bg(ACCENT).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(app.region().to_string(), Style::default().fg(MUTED)),
    ];
    if let Some(cluster) = app.selected_cluster() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            cluster.to_string(),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ));
        let insights = if app.insights_enabled() {
            Span::styled("  insights:on", Style::default().fg(ACCENT))
        } else {
            Span::styled("  insights:off", Style::default().fg(MUTED))
        };
        spans.push(insights);
    }
    if app.phase() == RefreshPhase::Fetching {
        spans.push(Span::styled("  ⟳", Style::default().fg(WARN)));
    }
    if let Some(at) = app.last_refresh() {
        spans.push(Span::styled(
            format!("  updated {}", at.format("%H:%M:%S")),
            Style::default().fg(MUTED),
        ));
    }

    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
        area,
    );
}

fn render_loading(frame: &mut Frame, area: Rect, app: &App) {
    let message = match (app.last_error(), app.status()) {
        (Some(error), _) => format!("Error: {error}"),
        (None, Some(status)) => status.to_string(),
        (None, None) => "Loading ECS data…".to_string(),
    };
    let style = if app.last_error().is_some() {
        Style::default().fg(ERROR)
    } else {
        Style::default().fg(MUTED)
    };
    let lines = vec![
        Line::default(),
        Line::from(Span::styled(message, style)),
    ];
    frame.render_widget(
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .style(Style::default().bg(BG)),
        area,
    );
}

fn render_body(frame: &mut Frame, area: Rect, app: &App) {
    let cluster_rows = app.clusters().len() as u16;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length((cluster_rows + 3).clamp(4, 10)),
            Constraint::Min(4),
        ])
        .split(area);

    render_clusters_panel(frame, chunks[0], app);
    render_detail_panel(frame, chunks[1], app);
}

fn render_clusters_panel(frame: &mut Frame, area: Rect, app: &App) {
    let focused = app.focus() == Focus::Clusters;
    let rows = app
        .clusters()
        .iter()
        .map(|cluster| cluster_row(cluster, app.selected_cluster()))
        .collect::<Vec<_>>();

    let header = Row::new(vec!["NAME", "STATUS", "SERVICES", "TASKS (R/P)", "INSTANCES", "REGION"])
        .style(Style::default().fg(MUTED).add_modifier(Modifier::BOLD));

    let table = Table::new(
        rows,
        [
            Constraint::Min(24),
            Constraint::Length(14),
            Constraint::Length(8),
            Constraint::Length(12),
            Constraint::Length(9),
            Constraint::Length(12),
        ],
    )
    .header(header)
    .block(panel_block("Clusters", focused))
    .style(Style::default().bg(PANEL))
    .row_highlight_style(highlight_style(focused));

    let mut state = TableState::default();
    if !app.clusters().is_empty() {
        state.select(Some(app.cluster_cursor()));
    }
    frame.render_stateful_widget(table, area, &mut state);
}

fn cluster_row<'a>(cluster: &'a Cluster, selected: Option<&str>) -> Row<'a> {
    let marker = if selected == Some(cluster.name.as_str()) {
        "▶ "
    } else {
        "  "
    };
    Row::new(vec![
        Cell::from(format!("{marker}{}", cluster.name)),
        Cell::from(Span::styled(
            cluster.status.clone(),
            status_style(&cluster.status),
        )),
        Cell::from(cluster.active_services_count.to_string()),
        Cell::from(format!(
            "{}/{}",
            cluster.running_tasks_count, cluster.pending_tasks_count
        )),
        Cell::from(cluster.registered_container_instances_count.to_string()),
        Cell::from(cluster.region.clone()),
    ])
}

fn render_detail_panel(frame: &mut Frame, area: Rect, app: &App) {
    let focused = matches!(app.focus(), Focus::Services | Focus::Tasks);
    let mut title = match app.detail() {
        Some(cluster) => format!("Services & Tasks: {}", cluster.name),
        None => "Services & Tasks".to_string(),
    };
    if let Some(rollout) = selected_rollout_state(app) {
        title.push_str(&format!(" [{rollout}]"));
    }

    let Some(cluster) = app.detail() else {
        let hint = if app.selected_cluster().is_some() {
            "Fetching cluster state…"
        } else {
            "Select a cluster to view its services"
        };
        frame.render_widget(
            Paragraph::new(Span::styled(hint, Style::default().fg(MUTED)))
                .block(panel_block(&title, focused))
                .style(Style::default().bg(PANEL)),
            area,
        );
        return;
    };

    let now = Utc::now();
    let rows = app
        .detail_rows()
        .into_iter()
        .filter_map(|row| detail_row(app, cluster, row, now))
        .collect::<Vec<_>>();

    let header = Row::new(vec!["NAME", "STATUS", "HEALTH", "TASKS", "CPU", "MEM", "TASKDEF", "STARTED"])
        .style(Style::default().fg(MUTED).add_modifier(Modifier::BOLD));

    let table = Table::new(
        rows,
        [
            Constraint::Min(28),
            Constraint::Length(12),
            Constraint::Length(10),
            Constraint::Length(7),
            Constraint::Length(11),
            Constraint::Length(11),
            Constraint::Length(18),
            Constraint::Length(10),
        ],
    )
    .header(header)
    .block(panel_block(&title, focused))
    .style(Style::default().bg(PANEL))
    .row_highlight_style(highlight_style(focused));

    let mut state = TableState::default();
    if !app.detail_rows().is_empty() {
        state.select(Some(app.detail_cursor()));
    }
    frame.render_stateful_widget(table, area, &mut state);
}

/// Rollout state of the selected service's PRIMARY deployment, if any.
fn selected_rollout_state(app: &App) -> Option<&str> {
    let cluster = app.detail()?;
    let selected = app.selected_service()?;
    cluster
        .services
        .iter()
        .find(|service| service.name == selected)?
        .rollout_state()
}

fn detail_row<'a>(
    app: &App,
    cluster: &'a Cluster,
    row: DetailRow,
    now: chrono::DateTime<Utc>,
) -> Option<Row<'a>> {
    match row {
        DetailRow::Service(name) => {
            let service = cluster.services.iter().find(|s| s.name == name)?;
            Some(service_row(service, app.is_folded(&name)))
        }
        DetailRow::Task { service, task } => {
            let service = cluster.services.iter().find(|s| s.name == service)?;
            let task = service.tasks.iter().find(|t| t.id == task)?;
            Some(task_row(task, now))
        }
        DetailRow::Container {
            service,
            task,
            container,
        } => {
            let service = cluster.services.iter().find(|s| s.name == service)?;
            let task = service.tasks.iter().find(|t| t.id == task)?;
            let container = task.containers.iter().find(|c| c.name == container)?;
            Some(container_row(container))
        }
    }
}

fn service_row(service: &Service, folded: bool) -> Row<'_> {
    let fold_marker = if folded { "▸" } else { "▾" };
    let health = service.health();
    Row::new(vec![
        Cell::from(Span::styled(
            format!("{fold_marker} ■ {}", service.name),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Cell::from(Span::styled(
            service.status.clone(),
            status_style(&service.status),
        )),
        Cell::from(Span::styled(health.label(), health_style(health))),
        Cell::from(service.tasks_display()),
        Cell::from(percent_display(service.cpu_used)),
        Cell::from(percent_display(service.memory_used)),
        Cell::from(service.task_definition.clone()),
        Cell::from(""),
    ])
}

fn task_row(task: &Task, now: chrono::DateTime<Utc>) -> Row<'_> {
    // Single-container tasks show that container's usage inline.
    let (cpu, mem) = if task.containers.len() == 1 {
        let container = &task.containers[0];
        (container.cpu_display(), container.memory_display())
    } else {
        ("-".to_string(), "-".to_string())
    };
    Row::new(vec![
        Cell::from(format!("  └─ {}", task.short_id())),
        Cell::from(Span::styled(task.status.clone(), status_style(&task.status))),
        Cell::from(Span::styled(
            task.health_status.symbol(),
            health_style(task.health_status),
        )),
        Cell::from(""),
        Cell::from(cpu),
        Cell::from(mem),
        Cell::from(""),
        Cell::from(task.started_ago(now)),
    ])
}

fn container_row(container: &Container) -> Row<'_> {
    Row::new(vec![
        Cell::from(format!("      └─ {}", container.name)),
        Cell::from(Span::styled(
            container.status.clone(),
            status_style(&container.status),
        )),
        Cell::from(Span::styled(
            container.health_status.symbol(),
            health_style(container.health_status),
        )),
        Cell::from(""),
        Cell::from(container.cpu_display()),
        Cell::from(container.memory_display()),
        Cell::from(""),
        Cell::from(""),
    ])
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
    let line = if let Some(error) = app.last_error() {
        Line::from(Span::styled(
            format!(" {error}"),
            Style::default().fg(ERROR),
        ))
    } else if let Some(status) = app.status() {
        Line::from(Span::styled(
            format!(" {status}"),
            Style::default().fg(WARN),
        ))
    } else {
        Line::from(vec![
            key_hint("↑↓", "move"),
            key_hint("enter", "select"),
            key_hint("esc", "back"),
            key_hint("f", "fold"),
            key_hint("r", "refresh"),
            key_hint("o", "console"),
            key_hint("?", "help"),
            key_hint("q", "quit"),
        ])
    };
    frame.render_widget(Paragraph::new(line).style(Style::default().bg(BG)), area);
}

fn key_hint(key: &'static str, label: &'static str) -> Span<'static> {
    Span::styled(
        format!(" {key}:{label} "),
        Style::default().fg(MUTED),
    )
}

fn render_help_modal(frame: &mut Frame) {
    let area = centered_rect(46, 14, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(Span::styled(
            "Keys",
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        )),
        Line::default(),
        help_line("j/k, ↑/↓", "move cursor"),
        help_line("enter", "select cluster / service / task"),
        help_line("esc", "deselect, back up one level"),
        help_line("f, space", "fold/unfold a service"),
        help_line("tab", "jump between panels"),
        help_line("r, F5", "refresh now"),
        help_line("o", "show AWS console URL"),
        help_line("g/G", "top / bottom"),
        help_line("q", "quit"),
    ];
    frame.render_widget(
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(ACCENT))
                    .title(" help "),
            )
            .style(Style::default().bg(PANEL)),
        area,
    );
}

fn help_line(keys: &'static str, action: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {keys:<12}"), Style::default().fg(Color::White)),
        Span::styled(action, Style::default().fg(MUTED)),
    ])
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn panel_block(title: &str, focused: bool) -> Block<'static> {
    let border = if focused {
        Style::default().fg(ACCENT)
    } else {
        Style::default().fg(MUTED)
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(border)
        .title(format!(" {title} "))
}

fn highlight_style(focused: bool) -> Style {
    if focused {
        Style::default()
            .bg(Color::Rgb(31, 52, 80))
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    }
}

fn status_style(status: &str) -> Style {
    match status {
        "ACTIVE" | "RUNNING" => Style::default().fg(ACCENT),
        "PROVISIONING" | "DEPROVISIONING" | "PENDING" => Style::default().fg(WARN),
        "STOPPED" | "INACTIVE" | "DRAINING" => Style::default().fg(ERROR),
        _ => Style::default().fg(MUTED),
    }
}

fn health_style(health: HealthStatus) -> Style {
    match health {
        HealthStatus::Healthy => Style::default().fg(ACCENT),
        HealthStatus::Unhealthy => Style::default().fg(ERROR),
        HealthStatus::Warning => Style::default().fg(WARN),
        HealthStatus::Unknown => Style::default().fg(MUTED),
    }
}

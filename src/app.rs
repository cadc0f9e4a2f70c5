use chrono::{DateTime, Local};
use std::collections::HashSet;

use crate::input::Action;
use crate::model::Cluster;

/// Which panel/level owns input focus.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Focus {
    Clusters,
    Services,
    Tasks,
}

impl Focus {
    fn parent(self) -> Self {
        match self {
            Self::Clusters => Self::Clusters,
            Self::Services => Self::Clusters,
            Self::Tasks => Self::Services,
        }
    }
}

/// Refresh cycle state. A request while `Fetching` is a no-op; the next
/// timer tick retries.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RefreshPhase {
    Idle,
    Fetching,
}

/// Complete result of one refresh cycle, built off the interactive loop
/// and handed over atomically.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub clusters: Vec<Cluster>,
    pub detail: Option<Cluster>,
    pub insights_enabled: bool,
}

/// What the refresh worker is asked to fetch.
#[derive(Debug, Clone)]
pub struct RefreshRequest {
    pub cluster: Option<String>,
}

/// Navigation events carrying minimal identity payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavEvent {
    SelectCluster(String),
    SelectService(String),
    SelectTask {
        service: String,
        task: String,
    },
    SelectContainer {
        service: String,
        task: String,
        container: String,
    },
    Deselect,
    ToggleFold(String),
}

/// Side effect an action asks the event loop to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    None,
    Refresh,
}

/// One row of the flattened detail table: services with their tasks nested
/// beneath, and container rows only for multi-container tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailRow {
    Service(String),
    Task {
        service: String,
        task: String,
    },
    Container {
        service: String,
        task: String,
        container: String,
    },
}

const PAGE_STEP: usize = 10;

/// Interactive state: the latest reconciled snapshot plus the hierarchical
/// selection/focus/fold state that survives it. Owned by the event-loop
/// task; refresh workers never touch it.
pub struct App {
    region: String,
    clusters: Vec<Cluster>,
    detail: Option<Cluster>,
    selected_cluster: Option<String>,
    selected_service: Option<String>,
    selected_task: Option<String>,
    selected_container: Option<String>,
    focus: Focus,
    folded: HashSet<String>,
    phase: RefreshPhase,
    loading: bool,
    last_error: Option<String>,
    status: Option<String>,
    insights_enabled: bool,
    last_refresh: Option<DateTime<Local>>,
    configured_cluster: Option<String>,
    cluster_cursor: usize,
    detail_cursor: usize,
    show_help: bool,
    running: bool,
}

impl App {
    pub fn new(region: String, configured_cluster: Option<String>) -> Self {
        Self {
            region,
            clusters: Vec::new(),
            detail: None,
            selected_cluster: None,
            selected_service: None,
            selected_task: None,
            selected_container: None,
            focus: Focus::Clusters,
            folded: HashSet::new(),
            phase: RefreshPhase::Idle,
            loading: true,
            last_error: None,
            status: None,
            insights_enabled: false,
            last_refresh: None,
            configured_cluster,
            cluster_cursor: 0,
            detail_cursor: 0,
            show_help: false,
            running: true,
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn phase(&self) -> RefreshPhase {
        self.phase
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn detail(&self) -> Option<&Cluster> {
        self.detail.as_ref()
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn selected_cluster(&self) -> Option<&str> {
        self.selected_cluster.as_deref()
    }

    pub fn selected_service(&self) -> Option<&str> {
        self.selected_service.as_deref()
    }

    pub fn selected_task(&self) -> Option<&str> {
        self.selected_task.as_deref()
    }

    pub fn selected_container(&self) -> Option<&str> {
        self.selected_container.as_deref()
    }

    pub fn is_folded(&self, service: &str) -> bool {
        self.folded.contains(service)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn last_refresh(&self) -> Option<DateTime<Local>> {
        self.last_refresh
    }

    pub fn insights_enabled(&self) -> bool {
        self.insights_enabled
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = Some(message.into());
    }

    pub fn show_help(&self) -> bool {
        self.show_help
    }

    pub fn cluster_cursor(&self) -> usize {
        self.cluster_cursor
    }

    pub fn detail_cursor(&self) -> usize {
        self.detail_cursor
    }

    // ---- refresh orchestration -------------------------------------------

    /// Gate for both manual and scheduled refreshes. Returns the request to
    /// dispatch, or `None` when a cycle is already in flight.
    pub fn begin_refresh(&mut self) -> Option<RefreshRequest> {
        if self.phase == RefreshPhase::Fetching {
            return None;
        }
        self.phase = RefreshPhase::Fetching;
        Some(RefreshRequest {
            cluster: self.selected_cluster.clone(),
        })
    }

    /// Delivery point for a completed cycle. Success reconciles the new
    /// snapshot; failure keeps the prior snapshot untouched and surfaces
    /// the error. Either way the orchestrator returns to idle.
    pub fn finish_refresh(&mut self, outcome: Result<Snapshot, String>) {
        self.phase = RefreshPhase::Idle;
        match outcome {
            Ok(snapshot) => self.reconcile(snapshot),
            Err(error) => {
                self.last_error = Some(error.clone());
                self.status = Some(format!("Refresh failed: {error}"));
            }
        }
    }

    /// True when a cluster is selected but its detail has not been fetched
    /// yet (fresh selection, or the last cycle predated it).
    pub fn needs_detail_fetch(&self) -> bool {
        match &self.selected_cluster {
            Some(name) => self.detail.as_ref().map(|detail| detail.name.as_str()) != Some(name),
            None => false,
        }
    }

    // ---- reconciliation --------------------------------------------------

    /// Re-derives selection/focus against a fresh snapshot. Pure with
    /// respect to the snapshot and prior state; reconciling the same
    /// snapshot twice is a fixpoint.
    fn reconcile(&mut self, snapshot: Snapshot) {
        let initial_load = self.loading;
        self.loading = false;
        self.last_error = None;
        self.status = None;
        self.insights_enabled = snapshot.insights_enabled;
        self.last_refresh = Some(Local::now());
        self.clusters = snapshot.clusters;

        if let Some(name) = self.selected_cluster.clone() {
            if !self.clusters.iter().any(|cluster| cluster.name == name) {
                // Selected cluster disappeared from the listing.
                self.clear_cluster_selection();
            } else if let Some(fresh) = snapshot.detail
                && fresh.name == name
            {
                self.reconcile_detail(fresh);
            }
        } else if initial_load {
            self.auto_select_initial();
        }

        self.clamp_cursors();
    }

    fn reconcile_detail(&mut self, fresh: Cluster) {
        if let Some(service) = self.selected_service.clone() {
            if !fresh.services.iter().any(|candidate| candidate.name == service) {
                self.selected_service = None;
                self.selected_task = None;
                self.selected_container = None;
                self.focus = self.focus.parent();
            } else if let Some(task) = self.selected_task.clone() {
                let task_present = fresh
                    .services
                    .iter()
                    .find(|candidate| candidate.name == service)
                    .is_some_and(|service| {
                        service.tasks.iter().any(|candidate| candidate.id == task)
                    });
                if !task_present {
                    self.selected_task = None;
                    self.selected_container = None;
                }
            }
        }
        // Never hold a stale cluster object once a newer one exists.
        self.detail = Some(fresh);
    }

    fn auto_select_initial(&mut self) {
        if let Some(configured) = self.configured_cluster.clone() {
            if self.clusters.iter().any(|cluster| cluster.name == configured) {
                self.apply_nav(NavEvent::SelectCluster(configured));
                return;
            }
        } else if self.clusters.len() == 1 {
            let only = self.clusters[0].name.clone();
            self.apply_nav(NavEvent::SelectCluster(only));
            return;
        }
        self.focus = Focus::Clusters;
    }

    fn clear_cluster_selection(&mut self) {
        self.selected_cluster = None;
        self.selected_service = None;
        self.selected_task = None;
        self.selected_container = None;
        self.folded.clear();
        self.detail = None;
        self.detail_cursor = 0;
        self.focus = Focus::Clusters;
    }

    fn clamp_cursors(&mut self) {
        self.cluster_cursor = self
            .cluster_cursor
            .min(self.clusters.len().saturating_sub(1));
        self.detail_cursor = self
            .detail_cursor
            .min(self.detail_rows().len().saturating_sub(1));
    }

    // ---- navigation --------------------------------------------------------

    pub fn apply_nav(&mut self, event: NavEvent) {
        match event {
            NavEvent::SelectCluster(name) => {
                if self.selected_cluster.as_deref() != Some(name.as_str()) {
                    // Switching displayed clusters drops UI-local state.
                    self.folded.clear();
                    self.detail = None;
                    self.detail_cursor = 0;
                }
                self.selected_cluster = Some(name);
                self.selected_service = None;
                self.selected_task = None;
                self.selected_container = None;
                self.focus = Focus::Services;
            }
            NavEvent::SelectService(name) => {
                if self.selected_cluster.is_none() {
                    return;
                }
                self.selected_service = Some(name);
                self.selected_task = None;
                self.selected_container = None;
                self.focus = Focus::Tasks;
            }
            NavEvent::SelectTask { service, task } => {
                if self.selected_cluster.is_none() {
                    return;
                }
                self.selected_service = Some(service);
                self.selected_task = Some(task);
                self.selected_container = None;
                self.focus = Focus::Tasks;
            }
            NavEvent::SelectContainer {
                service,
                task,
                container,
            } => {
                if self.selected_cluster.is_none() {
                    return;
                }
                self.selected_service = Some(service);
                self.selected_task = Some(task);
                self.selected_container = Some(container);
                self.focus = Focus::Tasks;
            }
            NavEvent::Deselect => self.deselect(),
            NavEvent::ToggleFold(service) => {
                if !self.folded.remove(&service) {
                    self.folded.insert(service);
                }
                self.clamp_cursors();
            }
        }
    }

    /// Clears the most specific selection and moves focus to the parent
    /// level. With nothing selected this is a no-op.
    fn deselect(&mut self) {
        if self.selected_container.is_some() {
            self.selected_container = None;
            self.focus = Focus::Tasks;
        } else if self.selected_task.is_some() {
            self.selected_task = None;
            self.focus = Focus::Tasks.parent();
        } else if self.selected_service.is_some() {
            self.selected_service = None;
            self.focus = Focus::Services.parent();
        } else if self.selected_cluster.is_some() {
            self.clear_cluster_selection();
        }
    }

    // ---- actions -----------------------------------------------------------

    pub fn apply_action(&mut self, action: Action) -> AppCommand {
        match action {
            Action::Quit => {
                self.running = false;
                AppCommand::None
            }
            Action::Down => {
                self.move_cursor(1);
                AppCommand::None
            }
            Action::Up => {
                self.move_cursor(-1);
                AppCommand::None
            }
            Action::PageDown => {
                self.move_cursor(PAGE_STEP as isize);
                AppCommand::None
            }
            Action::PageUp => {
                self.move_cursor(-(PAGE_STEP as isize));
                AppCommand::None
            }
            Action::Top => {
                self.set_cursor(0);
                AppCommand::None
            }
            Action::Bottom => {
                self.set_cursor(usize::MAX);
                AppCommand::None
            }
            Action::Select => self.select_under_cursor(),
            Action::Back => {
                self.apply_nav(NavEvent::Deselect);
                AppCommand::None
            }
            Action::ToggleFold => {
                if let Some(service) = self.service_under_cursor() {
                    self.apply_nav(NavEvent::ToggleFold(service));
                }
                AppCommand::None
            }
            Action::ToggleFocus => {
                self.focus = match self.focus {
                    Focus::Clusters if self.detail.is_some() => Focus::Services,
                    Focus::Clusters => Focus::Clusters,
                    _ => Focus::Clusters,
                };
                AppCommand::None
            }
            Action::Refresh => {
                self.set_status("Refreshing…");
                AppCommand::Refresh
            }
            Action::OpenConsole => {
                self.show_console_url();
                AppCommand::None
            }
            Action::ToggleHelp => {
                self.show_help = !self.show_help;
                AppCommand::None
            }
        }
    }

    fn move_cursor(&mut self, delta: isize) {
        let (cursor, len) = match self.focus {
            Focus::Clusters => (&mut self.cluster_cursor, self.clusters.len()),
            Focus::Services | Focus::Tasks => {
                let len = self.detail_rows().len();
                (&mut self.detail_cursor, len)
            }
        };
        if len == 0 {
            *cursor = 0;
            return;
        }
        let next = cursor.saturating_add_signed(delta);
        *cursor = next.min(len - 1);
    }

    fn set_cursor(&mut self, position: usize) {
        let (cursor, len) = match self.focus {
            Focus::Clusters => (&mut self.cluster_cursor, self.clusters.len()),
            Focus::Services | Focus::Tasks => {
                let len = self.detail_rows().len();
                (&mut self.detail_cursor, len)
            }
        };
        *cursor = position.min(len.saturating_sub(1));
    }

    fn select_under_cursor(&mut self) -> AppCommand {
        match self.focus {
            Focus::Clusters => {
                let Some(cluster) = self.clusters.get(self.cluster_cursor) else {
                    return AppCommand::None;
                };
                let name = cluster.name.clone();
                let already_detailed = !self.needs_detail_fetch()
                    && self.selected_cluster.as_deref() == Some(name.as_str());
                self.apply_nav(NavEvent::SelectCluster(name));
                if already_detailed {
                    AppCommand::None
                } else {
                    AppCommand::Refresh
                }
            }
            Focus::Services | Focus::Tasks => {
                let Some(row) = self.detail_rows().get(self.detail_cursor).cloned() else {
                    return AppCommand::None;
                };
                match row {
                    DetailRow::Service(service) => {
                        self.apply_nav(NavEvent::SelectService(service));
                    }
                    DetailRow::Task { service, task } => {
                        self.apply_nav(NavEvent::SelectTask { service, task });
                    }
                    DetailRow::Container {
                        service,
                        task,
                        container,
                    } => {
                        self.apply_nav(NavEvent::SelectContainer {
                            service,
                            task,
                            container,
                        });
                    }
                }
                AppCommand::None
            }
        }
    }

    /// Service the detail cursor currently addresses, directly or through
    /// one of its nested rows.
    fn service_under_cursor(&self) -> Option<String> {
        match self.detail_rows().get(self.detail_cursor)? {
            DetailRow::Service(service) => Some(service.clone()),
            DetailRow::Task { service, .. } => Some(service.clone()),
            DetailRow::Container { service, .. } => Some(service.clone()),
        }
    }

    fn show_console_url(&mut self) {
        let Some(cluster) = self.selected_cluster.as_deref() else {
            return;
        };
        let url = match (self.selected_service.as_deref(), self.selected_task.as_deref()) {
            (_, Some(task)) => crate::console::task_url(cluster, task, &self.region),
            (Some(service), None) => crate::console::service_url(cluster, service, &self.region),
            (None, None) => crate::console::cluster_url(cluster, &self.region),
        };
        self.set_status(format!("Console: {url}"));
    }

    /// Flattens the detail cluster into table rows, honoring folds.
    /// Container rows appear only for multi-container tasks; a single
    /// container's usage is shown inline on its task row.
    pub fn detail_rows(&self) -> Vec<DetailRow> {
        let Some(cluster) = &self.detail else {
            return Vec::new();
        };
        let mut rows = Vec::new();
        for service in &cluster.services {
            rows.push(DetailRow::Service(service.name.clone()));
            if self.folded.contains(&service.name) {
                continue;
            }
            for task in &service.tasks {
                rows.push(DetailRow::Task {
                    service: service.name.clone(),
                    task: task.id.clone(),
                });
                if task.containers.len() > 1 {
                    for container in &task.containers {
                        rows.push(DetailRow::Container {
                            service: service.name.clone(),
                            task: task.id.clone(),
                            container: container.name.clone(),
                        });
                    }
                }
            }
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Container, Service, Task};

    fn cluster(name: &str) -> Cluster {
        Cluster {
            name: name.to_string(),
            status: "ACTIVE".to_string(),
            region: "eu-west-1".to_string(),
            ..Cluster::default()
        }
    }

    fn detail_cluster(name: &str, services: &[&str]) -> Cluster {
        let mut cluster = cluster(name);
        cluster.services = services
            .iter()
            .map(|service| Service {
                name: service.to_string(),
                tasks: vec![Task {
                    id: format!("{service}-task-1"),
                    status: "RUNNING".to_string(),
                    containers: vec![Container::default()],
                    ..Task::default()
                }],
                ..Service::default()
            })
            .collect();
        cluster
    }

    fn snapshot_with_detail(names: &[&str], detail: Option<Cluster>) -> Snapshot {
        Snapshot {
            clusters: names.iter().map(|name| cluster(name)).collect(),
            detail,
            insights_enabled: false,
        }
    }

    fn app() -> App {
        App::new("eu-west-1".to_string(), None)
    }

    #[test]
    fn refresh_request_while_fetching_is_noop() {
        let mut app = app();
        assert!(app.begin_refresh().is_some());
        assert_eq!(app.phase(), RefreshPhase::Fetching);
        assert!(app.begin_refresh().is_none());
        assert_eq!(app.phase(), RefreshPhase::Fetching);

        app.finish_refresh(Ok(snapshot_with_detail(&["a"], None)));
        assert_eq!(app.phase(), RefreshPhase::Idle);
        assert!(app.begin_refresh().is_some());
    }

    #[test]
    fn failed_refresh_keeps_prior_snapshot() {
        let mut app = app();
        app.finish_refresh(Ok(snapshot_with_detail(&["a", "b"], None)));
        assert_eq!(app.clusters().len(), 2);

        app.begin_refresh();
        app.finish_refresh(Err("throttled".to_string()));

        assert_eq!(app.clusters().len(), 2);
        assert_eq!(app.last_error(), Some("throttled"));
        assert_eq!(app.phase(), RefreshPhase::Idle);
    }

    #[test]
    fn first_load_failure_stays_loading() {
        let mut app = app();
        app.begin_refresh();
        app.finish_refresh(Err("no credentials".to_string()));
        assert!(app.loading());
        assert_eq!(app.last_error(), Some("no credentials"));
    }

    #[test]
    fn vanished_cluster_clears_selection_and_focus() {
        let mut app = app();
        app.finish_refresh(Ok(snapshot_with_detail(&["a", "b"], None)));
        app.apply_nav(NavEvent::SelectCluster("b".to_string()));
        app.apply_nav(NavEvent::SelectService("svc".to_string()));
        assert_eq!(app.focus(), Focus::Tasks);

        app.finish_refresh(Ok(snapshot_with_detail(&["a"], None)));

        assert_eq!(app.selected_cluster(), None);
        assert_eq!(app.selected_service(), None);
        assert_eq!(app.selected_task(), None);
        assert_eq!(app.focus(), Focus::Clusters);
    }

    #[test]
    fn vanished_service_moves_focus_up_one_level() {
        let mut app = app();
        app.apply_nav(NavEvent::SelectCluster("prod".to_string()));
        app.apply_nav(NavEvent::SelectService("old".to_string()));
        assert_eq!(app.focus(), Focus::Tasks);

        let detail = detail_cluster("prod", &["new"]);
        app.finish_refresh(Ok(snapshot_with_detail(&["prod"], Some(detail))));

        assert_eq!(app.selected_cluster(), Some("prod"));
        assert_eq!(app.selected_service(), None);
        assert_eq!(app.focus(), Focus::Services);
    }

    #[test]
    fn surviving_selection_gets_fresh_object() {
        let mut app = app();
        app.apply_nav(NavEvent::SelectCluster("prod".to_string()));
        let mut detail = detail_cluster("prod", &["api"]);
        detail.running_tasks_count = 1;
        app.finish_refresh(Ok(snapshot_with_detail(&["prod"], Some(detail))));

        app.apply_nav(NavEvent::SelectService("api".to_string()));

        let mut newer = detail_cluster("prod", &["api"]);
        newer.running_tasks_count = 7;
        app.finish_refresh(Ok(snapshot_with_detail(&["prod"], Some(newer))));

        assert_eq!(app.selected_service(), Some("api"));
        assert_eq!(app.detail().expect("detail").running_tasks_count, 7);
    }

    #[test]
    fn vanished_task_clears_task_but_keeps_service() {
        let mut app = app();
        app.apply_nav(NavEvent::SelectCluster("prod".to_string()));
        app.finish_refresh(Ok(snapshot_with_detail(
            &["prod"],
            Some(detail_cluster("prod", &["api"])),
        )));
        app.apply_nav(NavEvent::SelectTask {
            service: "api".to_string(),
            task: "api-task-1".to_string(),
        });

        let mut newer = detail_cluster("prod", &["api"]);
        newer.services[0].tasks[0].id = "api-task-2".to_string();
        app.finish_refresh(Ok(snapshot_with_detail(&["prod"], Some(newer))));

        assert_eq!(app.selected_service(), Some("api"));
        assert_eq!(app.selected_task(), None);
    }

    #[test]
    fn reconcile_is_idempotent() {
        let mut app = app();
        app.apply_nav(NavEvent::SelectCluster("prod".to_string()));
        app.apply_nav(NavEvent::SelectService("api".to_string()));

        let make = || snapshot_with_detail(&["prod"], Some(detail_cluster("prod", &["api"])));
        app.finish_refresh(Ok(make()));
        let first = (
            app.selected_cluster().map(str::to_string),
            app.selected_service().map(str::to_string),
            app.selected_task().map(str::to_string),
            app.focus(),
        );

        app.finish_refresh(Ok(make()));
        let second = (
            app.selected_cluster().map(str::to_string),
            app.selected_service().map(str::to_string),
            app.selected_task().map(str::to_string),
            app.focus(),
        );

        assert_eq!(first, second);
    }

    #[test]
    fn folds_survive_refresh_but_not_cluster_switch() {
        let mut app = app();
        app.apply_nav(NavEvent::SelectCluster("prod".to_string()));
        app.apply_nav(NavEvent::ToggleFold("api".to_string()));
        assert!(app.is_folded("api"));

        app.finish_refresh(Ok(snapshot_with_detail(
            &["prod", "staging"],
            Some(detail_cluster("prod", &["api"])),
        )));
        assert!(app.is_folded("api"));

        app.apply_nav(NavEvent::SelectCluster("staging".to_string()));
        assert!(!app.is_folded("api"));
    }

    #[test]
    fn deselect_walks_up_the_hierarchy() {
        let mut app = app();
        app.apply_nav(NavEvent::SelectCluster("prod".to_string()));
        app.apply_nav(NavEvent::SelectContainer {
            service: "api".to_string(),
            task: "t1".to_string(),
            container: "app".to_string(),
        });

        app.apply_nav(NavEvent::Deselect);
        assert_eq!(app.selected_container(), None);
        assert_eq!(app.selected_task(), Some("t1"));
        assert_eq!(app.focus(), Focus::Tasks);

        app.apply_nav(NavEvent::Deselect);
        assert_eq!(app.selected_task(), None);
        assert_eq!(app.selected_service(), Some("api"));
        assert_eq!(app.focus(), Focus::Services);

        app.apply_nav(NavEvent::Deselect);
        assert_eq!(app.selected_service(), None);
        assert_eq!(app.focus(), Focus::Clusters);

        app.apply_nav(NavEvent::Deselect);
        assert_eq!(app.selected_cluster(), None);
        assert_eq!(app.focus(), Focus::Clusters);

        // Top level: deselect with nothing selected is a no-op.
        app.apply_nav(NavEvent::Deselect);
        assert_eq!(app.focus(), Focus::Clusters);
    }

    #[test]
    fn lone_cluster_is_auto_selected_on_first_load() {
        let mut app = app();
        app.finish_refresh(Ok(snapshot_with_detail(&["only"], None)));
        assert_eq!(app.selected_cluster(), Some("only"));
        assert!(app.needs_detail_fetch());
        assert_eq!(app.focus(), Focus::Services);
    }

    #[test]
    fn configured_cluster_is_auto_selected_on_first_load() {
        let mut app = App::new("eu-west-1".to_string(), Some("prod".to_string()));
        app.finish_refresh(Ok(snapshot_with_detail(&["other", "prod"], None)));
        assert_eq!(app.selected_cluster(), Some("prod"));
    }

    #[test]
    fn multiple_clusters_focus_list_on_first_load() {
        let mut app = app();
        app.finish_refresh(Ok(snapshot_with_detail(&["a", "b"], None)));
        assert_eq!(app.selected_cluster(), None);
        assert_eq!(app.focus(), Focus::Clusters);
    }

    #[test]
    fn detail_rows_fold_hides_tasks() {
        let mut app = app();
        app.apply_nav(NavEvent::SelectCluster("prod".to_string()));
        app.finish_refresh(Ok(snapshot_with_detail(
            &["prod"],
            Some(detail_cluster("prod", &["api", "worker"])),
        )));

        assert_eq!(app.detail_rows().len(), 4);

        app.apply_nav(NavEvent::ToggleFold("api".to_string()));
        let rows = app.detail_rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], DetailRow::Service("api".to_string()));
        assert_eq!(rows[1], DetailRow::Service("worker".to_string()));
    }

    #[test]
    fn detail_rows_expand_multi_container_tasks() {
        let mut app = app();
        app.apply_nav(NavEvent::SelectCluster("prod".to_string()));
        let mut detail = detail_cluster("prod", &["api"]);
        detail.services[0].tasks[0].containers = vec![
            Container {
                name: "app".to_string(),
                ..Container::default()
            },
            Container {
                name: "sidecar".to_string(),
                ..Container::default()
            },
        ];
        app.finish_refresh(Ok(snapshot_with_detail(&["prod"], Some(detail))));

        let rows = app.detail_rows();
        assert_eq!(rows.len(), 4);
        assert!(matches!(rows[2], DetailRow::Container { .. }));
    }

    #[test]
    fn select_cluster_under_cursor_requests_refresh() {
        let mut app = app();
        app.finish_refresh(Ok(snapshot_with_detail(&["a", "b"], None)));
        app.apply_action(Action::Down);
        let command = app.apply_action(Action::Select);
        assert_eq!(command, AppCommand::Refresh);
        assert_eq!(app.selected_cluster(), Some("b"));
    }

    #[test]
    fn quit_stops_the_loop() {
        let mut app = app();
        assert!(app.running());
        app.apply_action(Action::Quit);
        assert!(!app.running());
    }
}

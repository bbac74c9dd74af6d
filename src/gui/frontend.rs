use std::future::Future;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

use eframe::egui::{self, Color32, RichText};
use tokio::runtime::Runtime;

use crate::api::auth::token_source_from_settings;
use crate::api::{ApiError, ClickOutcome, FeedPage, PaperApiClient, PaperDetail, TokenSource, TsneLayout};
use crate::graph_utils::graph::NodeRole;
use crate::gui::canvas::CanvasFactory;
use crate::persistence::settings::{AppSettings, EnvOverrides};
use crate::render::{LoadCycle, LoadState, RenderLifecycle, TooltipOverlay, load_layout};
use crate::upload::{SelectedFile, UploadError, UploadFlow, submit_upload};

// Results of background tasks, applied on the UI thread
enum AppEvent {
    Layout { cycle: LoadCycle, result: Result<TsneLayout, ApiError> },
    Feed(Result<FeedPage, ApiError>),
    Detail { id: String, result: Result<PaperDetail, ApiError> },
    // None when no token was available and the click was not sent
    Click(Option<Result<ClickOutcome, ApiError>>),
    Upload(Result<(), UploadError>),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Tab {
    Map,
    Feed,
}

enum DetailState {
    Nothing,
    Loading(String),
    Loaded(PaperDetail),
    Failed(String),
}

pub struct PaperApp {
    // What the settings file holds; edited by the preferences window and saved
    stored: AppSettings,
    overrides: EnvOverrides,
    // stored plus env overrides; what the app runs with
    settings: AppSettings,
    settings_draft: AppSettings,
    show_prefs_window: bool,
    config_error: Option<String>,
    runtime: Runtime,
    api: Arc<PaperApiClient>,
    tokens: Arc<dyn TokenSource>,
    events_tx: Sender<AppEvent>,
    events_rx: Receiver<AppEvent>,
    tab: Tab,
    lifecycle: RenderLifecycle<CanvasFactory>,
    overlay: TooltipOverlay,
    selected_node: Option<String>,
    feed: Option<FeedPage>,
    feed_loading: bool,
    feed_error: Option<String>,
    detail: DetailState,
    last_history: Option<Vec<String>>,
    upload: UploadFlow,
}

impl PaperApp {
    pub fn new(stored: AppSettings, overrides: EnvOverrides) -> anyhow::Result<Self> {
        let settings = stored.effective(&overrides);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?;
        let (api, config_error) = Self::build_client(&settings)?;
        let tokens = token_source_from_settings(&settings);
        let (overlay, overlay_tx) = TooltipOverlay::channel();
        let factory = CanvasFactory {
            lod_enabled: settings.lod_enabled,
            lod_label_min_zoom: settings.lod_label_min_zoom,
        };
        let (events_tx, events_rx) = mpsc::channel();
        Ok(Self {
            settings_draft: stored.clone(),
            stored,
            overrides,
            settings,
            show_prefs_window: false,
            config_error,
            runtime,
            api,
            tokens,
            events_tx,
            events_rx,
            tab: Tab::Map,
            lifecycle: RenderLifecycle::new(factory, overlay_tx),
            overlay,
            selected_node: None,
            feed: None,
            feed_loading: false,
            feed_error: None,
            detail: DetailState::Nothing,
            last_history: None,
            upload: UploadFlow::new(),
        })
    }

    // An unusable base URL falls back to the default so the window still opens.
    fn build_client(settings: &AppSettings) -> anyhow::Result<(Arc<PaperApiClient>, Option<String>)> {
        match PaperApiClient::new(&settings.api_base_url, settings.request_timeout()) {
            Ok(c) => Ok((Arc::new(c), None)),
            Err(e) => {
                log::warn!("{}; falling back to {}", e, AppSettings::default_base_url());
                let c = PaperApiClient::new(&AppSettings::default_base_url(), settings.request_timeout())?;
                Ok((Arc::new(c), Some(e.to_string())))
            }
        }
    }

    fn spawn<F>(&self, ctx: &egui::Context, fut: F)
    where
        F: Future<Output = AppEvent> + Send + 'static,
    {
        let tx = self.events_tx.clone();
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            let event = fut.await;
            // Receiver only disappears when the app is shutting down
            let _ = tx.send(event);
            ctx.request_repaint();
        });
    }

    fn spawn_layout(&self, ctx: &egui::Context, cycle: LoadCycle) {
        let api = Arc::clone(&self.api);
        let tokens = Arc::clone(&self.tokens);
        self.spawn(ctx, async move {
            let result = load_layout(&api, tokens.as_ref()).await;
            AppEvent::Layout { cycle, result }
        });
    }

    fn mount_map(&mut self, ctx: &egui::Context) {
        let cycle = self.lifecycle.start();
        self.spawn_layout(ctx, cycle);
    }

    fn retry_map(&mut self, ctx: &egui::Context) {
        if let Some(cycle) = self.lifecycle.retry() {
            self.spawn_layout(ctx, cycle);
        }
    }

    fn unmount_map(&mut self) {
        self.lifecycle.teardown();
        self.overlay.pointer_left();
        self.selected_node = None;
    }

    fn refresh_feed(&mut self, ctx: &egui::Context) {
        self.feed_loading = true;
        self.feed_error = None;
        let api = Arc::clone(&self.api);
        let count = self.settings.feed_count;
        self.spawn(ctx, async move { AppEvent::Feed(api.fetch_feed(count).await) });
    }

    fn open_paper(&mut self, ctx: &egui::Context, id: &str) {
        self.detail = DetailState::Loading(id.to_string());
        let api = Arc::clone(&self.api);
        let owned = id.to_string();
        self.spawn(ctx, async move {
            let result = api.fetch_paper_detail(&owned).await;
            AppEvent::Detail { id: owned, result }
        });

        let api = Arc::clone(&self.api);
        let tokens = Arc::clone(&self.tokens);
        let mag_id = id.to_string();
        self.spawn(ctx, async move {
            let outcome = match tokens.try_get_token().await {
                Some(token) => Some(api.register_click(&mag_id, Some(token.as_str())).await),
                None => None,
            };
            AppEvent::Click(outcome)
        });
    }

    fn start_upload(&mut self, ctx: &egui::Context) {
        let file = match self.upload.begin() {
            Ok(f) => f,
            Err(e) => {
                log::debug!("upload not started: {}", e);
                return;
            }
        };
        let api = Arc::clone(&self.api);
        let tokens = Arc::clone(&self.tokens);
        self.spawn(ctx, async move { AppEvent::Upload(submit_upload(&api, tokens.as_ref(), file).await) });
    }

    fn pick_pdf(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .set_title("Choose a paper")
            .add_filter("PDF", &["pdf"])
            .pick_file()
        else {
            return;
        };
        match SelectedFile::from_path(&path) {
            Ok(file) => {
                self.upload.select(Some(file));
            }
            Err(e) => self.upload.reject_selection(&e),
        }
    }

    fn apply_settings(&mut self, ctx: &egui::Context) {
        let stored = self.settings_draft.clone();
        if let Err(e) = stored.save() {
            log::warn!("failed to save settings: {}", e);
        }
        let next = stored.effective(&self.overrides);
        self.stored = stored;
        match Self::build_client(&next) {
            Ok((api, err)) => {
                self.api = api;
                self.config_error = err;
            }
            Err(e) => self.config_error = Some(e.to_string()),
        }
        self.tokens = token_source_from_settings(&next);
        let factory = self.lifecycle.factory_mut();
        factory.lod_enabled = next.lod_enabled;
        factory.lod_label_min_zoom = next.lod_label_min_zoom;
        if let Some(session) = self.lifecycle.session_mut() {
            session.renderer_mut().set_lod(next.lod_enabled, next.lod_label_min_zoom);
        }
        self.settings = next;
        if self.tab == Tab::Map {
            self.retry_map(ctx);
        }
    }

    fn drain_events(&mut self, ctx: &egui::Context) {
        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                AppEvent::Layout { cycle, result } => {
                    let outcome = self.lifecycle.complete(cycle, result);
                    log::debug!("load cycle {} -> {:?}", cycle.id(), outcome);
                    self.selected_node = None;
                }
                AppEvent::Feed(result) => {
                    self.feed_loading = false;
                    match result {
                        Ok(page) => self.feed = Some(page),
                        Err(e) => {
                            log::warn!("feed request failed: {}", e);
                            self.feed_error = Some("Failed to fetch For You papers".to_string());
                        }
                    }
                }
                AppEvent::Detail { id, result } => {
                    // Ignore answers for a paper that is no longer selected
                    if !matches!(&self.detail, DetailState::Loading(want) if *want == id) {
                        continue;
                    }
                    self.detail = match result {
                        Ok(d) => DetailState::Loaded(d),
                        Err(e) if e.is_not_found() => DetailState::Failed("Paper not found".to_string()),
                        Err(e) => {
                            log::warn!("paper-info for {} failed: {}", id, e);
                            DetailState::Failed("Failed to fetch paper info".to_string())
                        }
                    };
                }
                AppEvent::Click(None) => {}
                AppEvent::Click(Some(Ok(outcome))) => {
                    if outcome.ok {
                        self.last_history = Some(outcome.history);
                        if self.lifecycle.is_mounted() {
                            self.retry_map(ctx);
                        }
                    } else {
                        log::info!("click not recorded: {}", outcome.error.unwrap_or_default());
                    }
                }
                AppEvent::Click(Some(Err(e))) => log::warn!("click registration failed: {}", e),
                AppEvent::Upload(result) => self.upload.finish(result),
            }
        }
    }

    fn top_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Ariadne");
                ui.separator();
                let before = self.tab;
                ui.selectable_value(&mut self.tab, Tab::Map, "Paper Map");
                ui.selectable_value(&mut self.tab, Tab::Feed, "For You");
                if before != self.tab {
                    match self.tab {
                        Tab::Map => self.mount_map(ctx),
                        Tab::Feed => {
                            self.unmount_map();
                            if self.feed.is_none() && !self.feed_loading {
                                self.refresh_feed(ctx);
                            }
                        }
                    }
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("Preferences").clicked() {
                        self.settings_draft = self.stored.clone();
                        self.show_prefs_window = true;
                    }
                    ui.label(RichText::new(self.api.base_url().as_str()).small().weak());
                });
            });
            if let Some(err) = &self.config_error {
                ui.colored_label(Color32::from_rgb(255, 120, 120), format!("Configuration problem: {}", err));
            }
        });
    }

    fn side_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::right("details").resizable(true).default_width(300.0).show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                self.detail_section(ui);
                ui.separator();
                self.node_section(ui);
                ui.separator();
                self.upload_section(ctx, ui);
            });
        });
    }

    fn detail_section(&mut self, ui: &mut egui::Ui) {
        ui.label(RichText::new("Paper").strong());
        match &self.detail {
            DetailState::Nothing => {
                ui.label(RichText::new("Select a paper from the For You feed.").weak());
            }
            DetailState::Loading(id) => {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label(format!("Loading {}", id));
                });
            }
            DetailState::Failed(msg) => {
                ui.colored_label(Color32::from_rgb(255, 120, 120), msg.as_str());
            }
            DetailState::Loaded(d) => {
                ui.label(RichText::new(d.title.as_deref().unwrap_or("—")).heading());
                ui.small(d.id.as_str());
                if let Some(link) = &d.external_link_url {
                    ui.hyperlink_to("Open DOI", link);
                }
                ui.add_space(4.0);
                ui.label(d.abstract_text.as_deref().unwrap_or("—"));
            }
        }
        if let Some(history) = &self.last_history {
            ui.small(format!("Recent history: {}", history.join(", ")));
        }
    }

    fn node_section(&self, ui: &mut egui::Ui) {
        ui.label(RichText::new("Selected node").strong());
        let node = self
            .selected_node
            .as_deref()
            .and_then(|id| self.lifecycle.model().and_then(|m| m.get_node(id)));
        match node {
            None => {
                ui.label(RichText::new("Click a node on the map.").weak());
            }
            Some(n) => {
                let role = match n.role {
                    NodeRole::History => "history",
                    NodeRole::Current => "current",
                    NodeRole::Recommendation => "recommendation",
                };
                ui.label(n.hover_title().unwrap_or("(untitled)"));
                ui.small(format!("{} · {}", n.id, role));
                ui.small(format!("x = {:.3}, y = {:.3}", n.x, n.y));
            }
        }
    }

    fn upload_section(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        ui.label(RichText::new("Upload Paper").strong());
        ui.label(RichText::new("Submit a PDF to add it to the processing queue").small());
        ui.horizontal(|ui| {
            if ui.add_enabled(!self.upload.is_uploading(), egui::Button::new("Choose PDF…")).clicked() {
                self.pick_pdf();
            }
            let label = if self.upload.is_uploading() { "Uploading…" } else { "Upload PDF" };
            if ui.add_enabled(self.upload.can_submit(), egui::Button::new(label)).clicked() {
                self.start_upload(ctx);
            }
            if ui.add_enabled(!self.upload.is_uploading(), egui::Button::new("Clear")).clicked() {
                self.upload.clear();
            }
        });
        if let Some(file) = self.upload.file() {
            ui.small(format!("{} ({} KiB)", file.name, file.size().div_ceil(1024)));
        }
        if let Some(status) = self.upload.status_text() {
            ui.label(status);
        }
        if let Some(at) = self.upload.finished_text() {
            ui.small(format!("Last attempt finished {} UTC", at));
        }
    }

    fn feed_view(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading("For You");
            if ui.add_enabled(!self.feed_loading, egui::Button::new("Refresh")).clicked() {
                self.refresh_feed(ctx);
            }
            if self.feed_loading {
                ui.spinner();
            }
        });
        if let Some(err) = &self.feed_error {
            ui.colored_label(Color32::from_rgb(255, 120, 120), err.as_str());
        }
        let Some(page) = &self.feed else { return };
        ui.small(format!("{} papers", page.count));
        let mut open: Option<String> = None;
        egui::ScrollArea::vertical().show(ui, |ui| {
            for paper in &page.papers {
                if ui.link(paper.title.as_str()).clicked() {
                    open = Some(paper.id.clone());
                }
            }
        });
        if let Some(id) = open {
            self.open_paper(ctx, &id);
        }
    }

    fn map_view(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let loading = self.lifecycle.is_loading();
            if ui.add_enabled(!loading, egui::Button::new("Reload")).clicked() {
                self.retry_map(ctx);
            }
            if loading {
                ui.spinner();
                ui.label("Loading map…");
            }
            if let Some(session) = self.lifecycle.session_mut() {
                if ui.button("Reset view").clicked() {
                    session.renderer_mut().reset_view();
                }
                let m = session.model();
                ui.small(format!("{} nodes · {} edges", m.node_count(), m.edge_count()));
            }
        });

        match self.lifecycle.state() {
            LoadState::Failed => {
                let msg = self.lifecycle.error().unwrap_or("Failed to load graph").to_string();
                ui.colored_label(Color32::from_rgb(255, 120, 120), msg);
                if ui.button("Retry").clicked() {
                    self.retry_map(ctx);
                }
                return;
            }
            LoadState::Empty => {
                ui.label("No papers to show yet. Open a few from the For You feed.");
                return;
            }
            _ => {}
        }

        let Some(session) = self.lifecycle.session_mut() else { return };
        let out = session.renderer_mut().show(ui);
        if let Some(id) = out.clicked {
            self.selected_node = Some(id);
        }
        // Pointer tracking feeds the tooltip overlay
        match out.response.hover_pos() {
            Some(p) => self.overlay.pointer_moved(p.x, p.y),
            None => self.overlay.pointer_left(),
        }
    }

    fn tooltip(&mut self, ctx: &egui::Context) {
        self.overlay.pump();
        let Some(tip) = self.overlay.tooltip() else { return };
        let pos = egui::pos2(tip.x + 14.0, tip.y + 14.0);
        let title = tip.title.to_string();
        egui::Area::new(egui::Id::new("node_tooltip"))
            .order(egui::Order::Tooltip)
            .fixed_pos(pos)
            .interactable(false)
            .show(ctx, |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    ui.set_max_width(320.0);
                    ui.label(title);
                });
            });
    }

    fn prefs_window(&mut self, ctx: &egui::Context) {
        if !self.show_prefs_window {
            return;
        }
        let mut open = true;
        let mut apply = false;
        egui::Window::new("Preferences")
            .open(&mut open)
            .resizable(true)
            .collapsible(false)
            .show(ctx, |ui| {
                let d = &mut self.settings_draft;
                ui.label("API base URL");
                ui.text_edit_singleline(&mut d.api_base_url);
                ui.horizontal(|ui| {
                    ui.label("Feed size");
                    ui.add(egui::DragValue::new(&mut d.feed_count).range(1..=500));
                });
                let mut token = d.api_token.clone().unwrap_or_default();
                ui.label("Bearer token");
                if ui.add(egui::TextEdit::singleline(&mut token).password(true)).changed() {
                    d.api_token = Some(token).filter(|t| !t.trim().is_empty());
                }
                ui.checkbox(&mut d.lod_enabled, "Hide labels when zoomed out");
                ui.add(egui::Slider::new(&mut d.lod_label_min_zoom, 0.1..=10.0).text("label zoom"));
                if self.overrides != EnvOverrides::default() {
                    ui.small("Environment overrides are active and are not saved to the settings file.");
                }
                ui.small(format!("Settings file: {}", AppSettings::settings_path().display()));
                if ui.button("Save").clicked() {
                    apply = true;
                }
            });
        if apply {
            self.apply_settings(ctx);
            open = false;
        }
        self.show_prefs_window = open;
    }
}

impl eframe::App for PaperApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // First frame mounts the map tab
        if self.tab == Tab::Map && !self.lifecycle.is_mounted() {
            self.mount_map(ctx);
        }
        self.drain_events(ctx);

        self.top_bar(ctx);
        self.side_panel(ctx);
        egui::CentralPanel::default().show(ctx, |ui| match self.tab {
            Tab::Map => self.map_view(ctx, ui),
            Tab::Feed => self.feed_view(ctx, ui),
        });
        self.tooltip(ctx);
        self.prefs_window(ctx);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.unmount_map();
        log::info!("shutting down");
    }
}

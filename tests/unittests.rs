use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ariadne::api::types::{LayoutPoint, PaperDetail, TsneLayout};
use ariadne::api::ApiError;
use ariadne::graph_utils::graph::{EdgeKind, GraphModel, NodeRole, build_graph_model};
use ariadne::gui::canvas::{CanvasFactory, GraphCanvas};
use ariadne::persistence::settings::{AppSettings, EnvOverrides, resolve_base_url};
use ariadne::render::{
    CycleOutcome, HoverBinding, LoadState, RenderError, RenderLifecycle, Renderer, RendererFactory, TooltipOverlay,
};
use ariadne::upload::{SelectedFile, UploadError, UploadFlow, UploadStatus};
use eframe::egui::{self, Pos2, Rect, pos2, vec2};

fn pt(id: &str, title: Option<&str>, x: f64, y: f64) -> LayoutPoint {
    LayoutPoint::new(id, title, x, y)
}

fn path_of(ids: &[&str]) -> Vec<LayoutPoint> {
    ids.iter().enumerate().map(|(i, id)| pt(id, Some(id), i as f64, i as f64)).collect()
}

// ---------------------------------------------------------------------------
// Graph model builder

#[test]
fn graph_example_history_wins_collision() {
    let history = vec![pt("A", Some("t0"), 0.0, 0.0), pt("B", Some("t1"), 1.0, 1.0)];
    let recs = vec![pt("C", Some("title-c"), 2.0, 2.0), pt("A", Some("other"), 9.0, 9.0)];
    let model = build_graph_model(&history, &recs);

    assert_eq!(model.node_count(), 3);
    let a = model.get_node("A").expect("A present");
    assert_eq!(a.role, NodeRole::History);
    assert_eq!(a.title.as_deref(), Some("t0"));
    assert_eq!((a.x, a.y), (0.0, 0.0));

    let path: Vec<_> = model.edges_of_kind(EdgeKind::Path).collect();
    assert_eq!(path.len(), 1);
    assert_eq!((path[0].from_node.as_str(), path[0].to_node.as_str()), ("A", "B"));

    let recs: Vec<_> = model.edges_of_kind(EdgeKind::Recommendation).collect();
    assert_eq!(recs.len(), 1);
    assert_eq!((recs[0].from_node.as_str(), recs[0].to_node.as_str()), ("B", "C"));
}

#[test]
fn graph_without_history_has_no_current_and_no_edges() {
    let model = build_graph_model(&[], &[pt("X", Some("x"), 3.0, 4.0)]);
    assert_eq!(model.node_count(), 1);
    assert_eq!(model.edge_count(), 0);
    assert!(model.current().is_none());
    assert_eq!(model.get_node("X").map(|n| n.role), Some(NodeRole::Recommendation));
}

#[test]
fn graph_path_edges_follow_history_order() {
    for n in 0..7usize {
        let ids: Vec<String> = (0..n).map(|i| format!("p{}", i)).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let model = build_graph_model(&path_of(&refs), &[]);
        let path: Vec<_> = model.edges_of_kind(EdgeKind::Path).collect();
        assert_eq!(path.len(), n.saturating_sub(1), "history of length {}", n);
        for (i, e) in path.iter().enumerate() {
            assert_eq!(e.from_node, ids[i]);
            assert_eq!(e.to_node, ids[i + 1]);
        }
    }
}

#[test]
fn graph_current_is_always_last_history_entry() {
    for n in 1..6 {
        let ids: Vec<String> = (0..n).map(|i| format!("h{}", i)).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let model = build_graph_model(&path_of(&refs), &path_of(&["r1", "r2"]));
        let currents: Vec<_> = model.nodes_with_role(NodeRole::Current).collect();
        assert_eq!(currents.len(), 1);
        assert_eq!(currents[0].id, ids[n - 1]);
        assert!(currents[0].show_label);
        assert!(currents[0].size > NodeRole::History.size());
        assert_ne!(currents[0].color, NodeRole::History.color());
    }
}

#[test]
fn graph_recommendation_edges_only_reach_surviving_recommendations() {
    let history = path_of(&["a", "b"]);
    let recs = vec![
        pt("r1", None, 5.0, 5.0),
        pt("r1", Some("dup"), 6.0, 6.0),
        pt("b", None, 7.0, 7.0),
        pt("r2", Some(""), 8.0, 8.0),
    ];
    let model = build_graph_model(&history, &recs);
    assert_eq!(model.node_count(), 4);
    let targets: Vec<&str> = model
        .edges_of_kind(EdgeKind::Recommendation)
        .map(|e| {
            assert_eq!(e.from_node, "b");
            e.to_node.as_str()
        })
        .collect();
    assert_eq!(targets, vec!["r1", "r2"]);
    // first insertion wins and absent titles stay absent
    assert_eq!(model.get_node("r1").and_then(|n| n.title.clone()), None);
    assert_eq!(model.get_node("r2").and_then(|n| n.hover_title()), None);
}

#[test]
fn graph_repeated_history_id_keeps_single_current() {
    let model = build_graph_model(&path_of(&["a", "b", "a"]), &[pt("r", None, 0.0, 0.0)]);
    assert_eq!(model.node_count(), 3);
    assert_eq!(model.current().map(|n| n.id.as_str()), Some("a"));
    assert_eq!(model.nodes_with_role(NodeRole::Current).count(), 1);
    assert_eq!(model.edges_of_kind(EdgeKind::Path).count(), 2);
    assert_eq!(model.edges_of_kind(EdgeKind::Recommendation).next().map(|e| e.from_node.as_str()), Some("a"));
}

#[test]
fn graph_consecutive_duplicate_does_not_self_loop() {
    let model = build_graph_model(&path_of(&["a", "a", "b"]), &[]);
    let path: Vec<_> = model.edges_of_kind(EdgeKind::Path).map(|e| (e.from_node.clone(), e.to_node.clone())).collect();
    assert_eq!(path, vec![("a".to_string(), "b".to_string())]);
}

#[test]
fn graph_build_is_idempotent() {
    let history = path_of(&["a", "b", "c"]);
    let recs = vec![pt("x", Some("X"), -1.5, 2.25), pt("y", None, 0.125, 7.0)];
    assert_eq!(build_graph_model(&history, &recs), build_graph_model(&history, &recs));
}

#[test]
fn graph_edge_to_missing_node_is_skipped() {
    let mut model = build_graph_model(&path_of(&["a"]), &[]);
    assert!(model.add_edge("dangling".into(), "a", "nope", EdgeKind::Path).is_none());
    assert_eq!(model.edge_count(), 0);
    assert!(GraphModel::new().bounds().is_none());
    let b = build_graph_model(&[pt("a", None, -2.0, 1.0), pt("b", None, 4.0, 3.0)], &[])
        .bounds()
        .expect("bounds");
    assert_eq!((b.min_x, b.max_x, b.min_y, b.max_y), (-2.0, 4.0, 1.0, 3.0));
}

// ---------------------------------------------------------------------------
// Render lifecycle

#[derive(Default, Clone)]
struct Counters {
    live: Arc<AtomicUsize>,
    mounts: Arc<AtomicUsize>,
    destroys: Arc<AtomicUsize>,
    last_model: Arc<Mutex<Option<Arc<GraphModel>>>>,
    last_hover: Arc<Mutex<Option<HoverBinding>>>,
}

struct FakeRenderer {
    live: Arc<AtomicUsize>,
    destroys: Arc<AtomicUsize>,
    fail_destroy: bool,
}

impl Renderer for FakeRenderer {
    fn destroy(&mut self) -> Result<(), RenderError> {
        self.live.fetch_sub(1, Ordering::SeqCst);
        self.destroys.fetch_add(1, Ordering::SeqCst);
        if self.fail_destroy {
            return Err(RenderError::Destroy("context lost".into()));
        }
        Ok(())
    }
}

struct FakeFactory {
    counters: Counters,
    fail_mount: bool,
    fail_destroy: bool,
}

impl RendererFactory for FakeFactory {
    type Output = FakeRenderer;

    fn mount(&mut self, model: Arc<GraphModel>, hover: HoverBinding) -> Result<FakeRenderer, RenderError> {
        if self.fail_mount {
            return Err(RenderError::Mount("no surface".into()));
        }
        self.counters.live.fetch_add(1, Ordering::SeqCst);
        self.counters.mounts.fetch_add(1, Ordering::SeqCst);
        *self.counters.last_model.lock().unwrap() = Some(model);
        *self.counters.last_hover.lock().unwrap() = Some(hover);
        Ok(FakeRenderer {
            live: Arc::clone(&self.counters.live),
            destroys: Arc::clone(&self.counters.destroys),
            fail_destroy: self.fail_destroy,
        })
    }
}

fn lifecycle(fail_mount: bool, fail_destroy: bool) -> (RenderLifecycle<FakeFactory>, TooltipOverlay, Counters) {
    let counters = Counters::default();
    let (overlay, tx) = TooltipOverlay::channel();
    let factory = FakeFactory { counters: counters.clone(), fail_mount, fail_destroy };
    (RenderLifecycle::new(factory, tx), overlay, counters)
}

fn layout(history: &[&str], recs: &[&str]) -> TsneLayout {
    TsneLayout { history: path_of(history), recommendations: path_of(recs) }
}

fn server_error() -> ApiError {
    ApiError::NotOk { status: 500, body: "boom".into() }
}

#[test]
fn lifecycle_renders_after_successful_load() {
    let (mut lc, _overlay, counters) = lifecycle(false, false);
    assert_eq!(lc.state(), LoadState::Idle);
    let cycle = lc.start();
    assert_eq!(lc.state(), LoadState::Loading);
    assert!(lc.is_loading());

    let outcome = lc.complete(cycle, Ok(layout(&["a", "b"], &["c"])));
    assert!(matches!(outcome, CycleOutcome::Rendered { .. }));
    assert_eq!(lc.state(), LoadState::Rendered);
    assert!(!lc.is_loading());
    assert_eq!(counters.live.load(Ordering::SeqCst), 1);
    assert_eq!(lc.model().map(|m| m.node_count()), Some(3));
}

#[test]
fn lifecycle_overlapping_loads_keep_one_renderer_with_latest_data() {
    let (mut lc, _overlay, counters) = lifecycle(false, false);
    let first = lc.start();
    let second = lc.retry().expect("mounted");
    assert!(lc.is_loading());

    lc.complete(second, Ok(layout(&["b1", "b2"], &[])));
    assert!(lc.is_loading());
    assert_eq!(counters.live.load(Ordering::SeqCst), 1);

    // the older request resolves last and wins
    lc.complete(first, Ok(layout(&["a1"], &["a2"])));
    assert!(!lc.is_loading());
    assert_eq!(counters.live.load(Ordering::SeqCst), 1);
    assert_eq!(counters.mounts.load(Ordering::SeqCst), 2);
    assert_eq!(lc.model().and_then(|m| m.current()).map(|n| n.id.clone()), Some("a1".to_string()));
}

#[test]
fn lifecycle_load_resolving_after_teardown_is_ignored() {
    let (mut lc, _overlay, counters) = lifecycle(false, false);
    let cycle = lc.start();
    lc.teardown();
    assert_eq!(lc.complete(cycle, Ok(layout(&["a"], &[]))), CycleOutcome::Abandoned);
    assert_eq!(counters.mounts.load(Ordering::SeqCst), 0);
    assert_eq!(lc.state(), LoadState::Idle);
    assert!(lc.session().is_none());
    assert!(lc.retry().is_none());
}

#[test]
fn lifecycle_stale_cycle_from_previous_mount_is_ignored() {
    let (mut lc, _overlay, counters) = lifecycle(false, false);
    let old = lc.start();
    lc.teardown();
    let fresh = lc.start();
    assert_eq!(lc.complete(old, Ok(layout(&["old"], &[]))), CycleOutcome::Abandoned);
    assert!(matches!(lc.complete(fresh, Ok(layout(&["new"], &[]))), CycleOutcome::Rendered { .. }));
    assert_eq!(counters.live.load(Ordering::SeqCst), 1);
    assert_eq!(lc.model().and_then(|m| m.current()).map(|n| n.id.clone()), Some("new".to_string()));
}

#[test]
fn lifecycle_failure_clears_renderer_and_retry_resets_error() {
    let (mut lc, _overlay, counters) = lifecycle(false, false);
    let c1 = lc.start();
    lc.complete(c1, Ok(layout(&["a"], &[])));
    let c2 = lc.retry().expect("mounted");
    assert_eq!(lc.complete(c2, Err(server_error())), CycleOutcome::Failed);
    assert_eq!(lc.state(), LoadState::Failed);
    assert!(lc.error().unwrap_or_default().contains("500"));
    assert!(lc.model().is_none());
    assert_eq!(counters.live.load(Ordering::SeqCst), 0);

    let c3 = lc.retry().expect("mounted");
    assert_eq!(lc.state(), LoadState::Loading);
    assert!(lc.error().is_none());
    lc.complete(c3, Ok(layout(&["a"], &["b"])));
    assert_eq!(lc.state(), LoadState::Rendered);
}

#[test]
fn lifecycle_empty_layout_mounts_nothing() {
    let (mut lc, _overlay, counters) = lifecycle(false, false);
    let c1 = lc.start();
    lc.complete(c1, Ok(layout(&["a"], &[])));
    let c2 = lc.retry().expect("mounted");
    assert_eq!(lc.complete(c2, Ok(TsneLayout::default())), CycleOutcome::Empty);
    assert_eq!(lc.state(), LoadState::Empty);
    assert_eq!(counters.live.load(Ordering::SeqCst), 0);
    assert_eq!(counters.mounts.load(Ordering::SeqCst), 1);
}

#[test]
fn lifecycle_tolerates_destroy_errors() {
    let (mut lc, _overlay, counters) = lifecycle(false, true);
    let c1 = lc.start();
    lc.complete(c1, Ok(layout(&["a"], &[])));
    let c2 = lc.retry().expect("mounted");
    assert!(matches!(lc.complete(c2, Ok(layout(&["b"], &[]))), CycleOutcome::Rendered { .. }));
    assert_eq!(counters.destroys.load(Ordering::SeqCst), 1);
    lc.teardown();
    assert_eq!(counters.destroys.load(Ordering::SeqCst), 2);
    assert_eq!(counters.live.load(Ordering::SeqCst), 0);
}

#[test]
fn lifecycle_mount_failure_is_reported() {
    let (mut lc, _overlay, _counters) = lifecycle(true, false);
    let c = lc.start();
    assert_eq!(lc.complete(c, Ok(layout(&["a"], &[]))), CycleOutcome::Failed);
    assert!(lc.error().unwrap_or_default().starts_with("Failed to render graph"));
}

#[test]
fn lifecycle_drop_destroys_live_renderer() {
    let (mut lc, _overlay, counters) = lifecycle(false, false);
    let c = lc.start();
    lc.complete(c, Ok(layout(&["a"], &[])));
    drop(lc);
    assert_eq!(counters.live.load(Ordering::SeqCst), 0);
}

// ---------------------------------------------------------------------------
// Tooltip overlay

#[test]
fn hover_binding_publishes_titles_to_overlay() {
    let (mut lc, mut overlay, counters) = lifecycle(false, false);
    let c = lc.start();
    let mut data = layout(&["a"], &[]);
    data.recommendations.push(pt("quiet", None, 1.0, 1.0));
    lc.complete(c, Ok(data));
    let hover = counters.last_hover.lock().unwrap().clone().expect("bound");

    overlay.pointer_moved(10.0, 20.0);
    hover.node_entered("a");
    overlay.pump();
    let tip = overlay.tooltip().expect("tooltip");
    assert_eq!((tip.title, tip.x, tip.y), ("a", 10.0, 20.0));

    overlay.pointer_moved(15.0, 25.0);
    assert_eq!(overlay.tooltip().map(|t| (t.x, t.y)), Some((15.0, 25.0)));

    hover.node_left();
    overlay.pump();
    assert!(overlay.tooltip().is_none());

    // untitled nodes never show a tooltip
    hover.node_entered("quiet");
    overlay.pump();
    assert!(overlay.tooltip().is_none());
}

#[test]
fn overlay_clears_on_pointer_leave_and_teardown() {
    let (mut lc, mut overlay, counters) = lifecycle(false, false);
    let c = lc.start();
    lc.complete(c, Ok(layout(&["a"], &[])));
    let hover = counters.last_hover.lock().unwrap().clone().expect("bound");

    overlay.pointer_moved(1.0, 1.0);
    hover.node_entered("a");
    overlay.pump();
    overlay.pointer_left();
    assert!(overlay.tooltip().is_none());

    overlay.pointer_moved(2.0, 2.0);
    hover.node_entered("a");
    overlay.pump();
    assert!(overlay.tooltip().is_some());
    lc.teardown();
    overlay.pump();
    assert!(overlay.tooltip().is_none());
}

// ---------------------------------------------------------------------------
// Graph canvas

// "a" (history) at world (0,0), "b" (current) at world (10,0)
fn two_node_canvas() -> (GraphCanvas, TooltipOverlay) {
    let model = Arc::new(build_graph_model(
        &[pt("a", Some("Alpha"), 0.0, 0.0), pt("b", Some("Beta"), 10.0, 0.0)],
        &[],
    ));
    let (overlay, tx) = TooltipOverlay::channel();
    let hover = HoverBinding::new(Arc::clone(&model), tx);
    let canvas = CanvasFactory { lod_enabled: true, lod_label_min_zoom: 1.5 }
        .mount(model, hover)
        .expect("mount");
    (canvas, overlay)
}

fn screen() -> Rect {
    Rect::from_min_size(Pos2::ZERO, vec2(800.0, 600.0))
}

fn close(a: Pos2, b: Pos2) -> bool {
    (a - b).length() < 0.01
}

#[test]
fn canvas_fits_layout_into_rect() {
    let (mut canvas, _overlay) = two_node_canvas();
    // width 10 world units -> 800 px * 0.85, centred on the bounds midpoint
    let a = canvas.node_screen_pos(screen(), "a").expect("a");
    let b = canvas.node_screen_pos(screen(), "b").expect("b");
    assert!(close(a, pos2(60.0, 300.0)), "a at {:?}", a);
    assert!(close(b, pos2(740.0, 300.0)), "b at {:?}", b);
    assert!(canvas.node_screen_pos(screen(), "nope").is_none());
}

#[test]
fn canvas_hover_enters_and_leaves_nodes() {
    let (mut canvas, mut overlay) = two_node_canvas();
    let rect = screen();

    canvas.update_hover(rect, Some(pos2(62.0, 301.0)));
    assert_eq!(canvas.hovered(), Some("a"));
    overlay.pointer_moved(62.0, 301.0);
    overlay.pump();
    assert_eq!(overlay.tooltip().map(|t| t.title), Some("Alpha"));

    canvas.update_hover(rect, Some(pos2(400.0, 300.0)));
    assert_eq!(canvas.hovered(), None);
    overlay.pump();
    assert!(overlay.tooltip().is_none());

    // the current node is drawn larger, so a wider miss still hits it
    canvas.update_hover(rect, Some(pos2(752.0, 300.0)));
    assert_eq!(canvas.hovered(), Some("b"));
    overlay.pump();
    assert_eq!(overlay.tooltip().map(|t| t.title), Some("Beta"));

    canvas.update_hover(rect, None);
    assert_eq!(canvas.hovered(), None);
    overlay.pump();
    assert!(overlay.tooltip().is_none());
}

#[test]
fn canvas_zoom_is_clamped_and_anchored() {
    let (mut canvas, _overlay) = two_node_canvas();
    let rect = screen();
    let anchor = canvas.node_screen_pos(rect, "a").expect("a");

    canvas.zoom_at(rect, anchor, 500.0);
    assert!(canvas.zoom() > 1.0);
    let after = canvas.node_screen_pos(rect, "a").expect("a");
    assert!(close(anchor, after), "anchor drifted to {:?}", after);

    for _ in 0..200 {
        canvas.zoom_at(rect, rect.center(), 1000.0);
    }
    assert_eq!(canvas.zoom(), 10.0);
    for _ in 0..400 {
        canvas.zoom_at(rect, rect.center(), -1000.0);
    }
    assert_eq!(canvas.zoom(), 0.1);

    canvas.reset_view();
    assert_eq!(canvas.zoom(), 1.0);
}

#[test]
fn canvas_second_destroy_fails_and_hover_is_cleared() {
    let (mut canvas, mut overlay) = two_node_canvas();
    canvas.update_hover(screen(), Some(pos2(60.0, 300.0)));
    overlay.pointer_moved(60.0, 300.0);
    overlay.pump();
    assert!(overlay.tooltip().is_some());

    assert!(canvas.destroy().is_ok());
    overlay.pump();
    assert!(overlay.tooltip().is_none());
    assert!(matches!(canvas.destroy(), Err(RenderError::Destroy(_))));
}

#[test]
fn canvas_refuses_non_finite_coordinates() {
    let model = Arc::new(build_graph_model(&[pt("a", None, f64::NAN, 0.0)], &[]));
    let (_overlay, tx) = TooltipOverlay::channel();
    let hover = HoverBinding::new(Arc::clone(&model), tx);
    let res = CanvasFactory { lod_enabled: true, lod_label_min_zoom: 1.5 }.mount(model, hover);
    assert!(matches!(res, Err(RenderError::Mount(_))));
}

fn run_frame(ctx: &egui::Context, canvas: &mut GraphCanvas, events: Vec<egui::Event>) -> Rect {
    let input = egui::RawInput { screen_rect: Some(screen()), events, ..Default::default() };
    let mut rect = Rect::NOTHING;
    let _ = ctx.run(input, |ctx| {
        egui::CentralPanel::default().show(ctx, |ui| {
            rect = canvas.show(ui).response.rect;
        });
    });
    rect
}

#[test]
fn canvas_tracks_pointer_in_a_headless_frame() {
    let (mut canvas, mut overlay) = two_node_canvas();
    let ctx = egui::Context::default();

    let rect = run_frame(&ctx, &mut canvas, Vec::new());
    assert!(rect.width() > 0.0 && rect.height() > 0.0);
    let target = canvas.node_screen_pos(rect, "a").expect("a");

    for _ in 0..3 {
        run_frame(&ctx, &mut canvas, vec![egui::Event::PointerMoved(target)]);
    }
    assert_eq!(canvas.hovered(), Some("a"));
    overlay.pointer_moved(target.x, target.y);
    overlay.pump();
    assert_eq!(overlay.tooltip().map(|t| t.title), Some("Alpha"));

    for _ in 0..2 {
        run_frame(&ctx, &mut canvas, vec![egui::Event::PointerGone]);
    }
    assert_eq!(canvas.hovered(), None);
    overlay.pump();
    assert!(overlay.tooltip().is_none());
}

// ---------------------------------------------------------------------------
// Upload flow

fn pdf() -> SelectedFile {
    SelectedFile::new("paper.pdf", b"%PDF-1.7".to_vec())
}

#[test]
fn upload_requires_a_file_and_one_attempt_at_a_time() {
    let mut flow = UploadFlow::new();
    assert!(!flow.can_submit());
    assert!(matches!(flow.begin(), Err(UploadError::NoFile)));

    assert!(flow.select(Some(pdf())));
    assert!(flow.can_submit());
    let sent = flow.begin().expect("started");
    assert_eq!(sent.name, "paper.pdf");
    assert_eq!(flow.status(), &UploadStatus::Uploading);
    assert_eq!(flow.status_text().as_deref(), Some("Uploading..."));
    assert!(!flow.can_submit());
    assert!(matches!(flow.begin(), Err(UploadError::InProgress)));
    assert!(!flow.clear());
    assert!(!flow.select(None));
}

#[test]
fn upload_rejection_keeps_the_selection() {
    let mut flow = UploadFlow::new();
    flow.select(Some(pdf()));
    flow.begin().expect("started");
    flow.finish(Err(UploadError::Rejected { status: 500, body: "disk full".into() }));
    assert_eq!(flow.status_text().as_deref(), Some("Upload failed: 500 disk full"));
    assert!(flow.file().is_some());
    assert!(flow.can_submit());
}

#[test]
fn upload_success_clears_selection_and_clear_resets_status() {
    let mut flow = UploadFlow::new();
    flow.select(Some(pdf()));
    flow.begin().expect("started");
    flow.finish(Ok(()));
    assert_eq!(flow.status(), &UploadStatus::Success);
    assert!(flow.file().is_none());
    assert!(flow.finished_at().is_some());
    let at = flow.finished_text().expect("finish time");
    assert_eq!((at.len(), at.matches(':').count()), (8, 2));
    assert!(flow.clear());
    assert_eq!(flow.finished_text(), None);
    assert_eq!(flow.status_text(), None);
}

#[test]
fn upload_transport_error_is_reported() {
    let mut flow = UploadFlow::new();
    flow.select(Some(pdf()));
    flow.begin().expect("started");
    flow.finish(Err(UploadError::Transport("connection refused".into())));
    assert_eq!(flow.status_text().as_deref(), Some("Upload error: connection refused"));
}

#[test]
fn selected_file_accepts_only_pdfs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let good = dir.path().join("Paper.PDF");
    std::fs::write(&good, b"%PDF-1.4").expect("write");
    let file = SelectedFile::from_path(&good).expect("pdf accepted");
    assert_eq!((file.name.as_str(), file.size()), ("Paper.PDF", 8));

    let bad = dir.path().join("notes.txt");
    std::fs::write(&bad, b"hello").expect("write");
    let err = SelectedFile::from_path(&bad).expect_err("txt rejected");
    assert!(matches!(err, UploadError::NotPdf(_)));

    let mut flow = UploadFlow::new();
    flow.reject_selection(&err);
    assert_eq!(flow.status_text().as_deref(), Some("notes.txt is not a PDF"));
}

// ---------------------------------------------------------------------------
// Settings and wire types

#[test]
fn settings_env_base_url_wins_when_set() {
    assert_eq!(resolve_base_url("http://localhost:8000", None), "http://localhost:8000");
    assert_eq!(resolve_base_url("http://localhost:8000/", Some("  ")), "http://localhost:8000");
    assert_eq!(resolve_base_url("http://localhost:8000", Some("https://api.example.org/")), "https://api.example.org");
}

#[test]
fn settings_roundtrip_and_partial_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("settings.json");
    assert_eq!(AppSettings::load_from(&path).expect("missing ok"), AppSettings::default());

    let mut s = AppSettings::default();
    s.feed_count = 12;
    s.api_token = Some("tok".into());
    s.save_to(&path).expect("save");
    assert_eq!(AppSettings::load_from(&path).expect("load"), s);

    std::fs::write(&path, r#"{"api_base_url":"http://papers.internal:9000"}"#).expect("write");
    let partial = AppSettings::load_from(&path).expect("partial");
    assert_eq!(partial.api_base_url, "http://papers.internal:9000");
    assert_eq!(partial.feed_count, 50);
    assert!(partial.lod_enabled);
}

#[test]
fn settings_env_overrides_stay_out_of_the_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("settings.json");
    let stored = AppSettings::default();
    let env = EnvOverrides {
        api_base_url: Some("https://papers.example.org/".into()),
        api_token: Some("env-secret".into()),
        token_file: None,
    };

    let effective = stored.effective(&env);
    assert_eq!(effective.api_base_url, "https://papers.example.org");
    assert_eq!(effective.api_token.as_deref(), Some("env-secret"));
    assert_eq!(stored.api_token, None);

    stored.save_to(&path).expect("save");
    let raw = std::fs::read_to_string(&path).expect("read");
    assert!(!raw.contains("env-secret"));
    assert_eq!(AppSettings::load_from(&path).expect("load").api_token, None);

    let mut with_token = AppSettings::default();
    with_token.api_token = Some("saved".into());
    let blank = EnvOverrides { api_token: Some("  ".into()), ..Default::default() };
    assert_eq!(with_token.effective(&blank).api_token.as_deref(), Some("saved"));
}

#[test]
fn settings_unreadable_file_still_takes_env_overrides() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("settings.json");
    std::fs::write(&path, "{ not json").expect("write");
    assert!(AppSettings::load_from(&path).is_err());

    let mut settings = AppSettings::load_from_or_default(&path);
    assert_eq!(settings, AppSettings::default());
    settings.apply_overrides(&EnvOverrides { api_base_url: Some("http://papers.internal:9000".into()), ..Default::default() });
    assert_eq!(settings.api_base_url, "http://papers.internal:9000");
}

#[test]
fn wire_types_tolerate_numeric_ids_and_nulls() {
    let layout: TsneLayout = serde_json::from_str(
        r#"{"history":[{"node_id":17,"title":"Seen","x":0.5,"y":-1.0}],
            "recommendations":[{"node_id":"42","title":null,"x":1,"y":2}]}"#,
    )
    .expect("layout");
    assert_eq!(layout.history[0].node_id, "17");
    assert_eq!(layout.recommendations[0].title, None);
    assert_eq!(layout.recommendations[0].x, 1.0);

    let detail: PaperDetail =
        serde_json::from_str(r#"{"mag_id":"W1","title":null,"doi_url":null,"abstract":"text"}"#).expect("detail");
    assert_eq!(detail.title, None);
    assert_eq!(detail.external_link_url, None);
    assert_eq!(detail.abstract_text.as_deref(), Some("text"));
}

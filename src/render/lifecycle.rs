use std::collections::BTreeSet;
use std::sync::Arc;

use uuid::Uuid;

use super::overlay::OverlaySender;
use super::{HoverBinding, Renderer, RendererFactory};
use crate::api::{ApiError, PaperApiClient, TokenSource, TsneLayout};
use crate::graph_utils::graph::{GraphModel, build_graph_model};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Rendered,
    Empty,
    Failed,
}

/// Ticket for one load started by [`RenderLifecycle::start`] or
/// [`RenderLifecycle::retry`]; pass it back to [`RenderLifecycle::complete`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LoadCycle {
    id: u64,
    mount: u64,
}

impl LoadCycle {
    pub fn id(&self) -> u64 {
        self.id
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The canvas this cycle was started for is no longer mounted.
    Abandoned,
    Empty,
    Rendered { session: Uuid },
    Failed,
}

/// One renderer instance bound to the canvas together with the model it draws.
pub struct RenderSession<R> {
    id: Uuid,
    model: Arc<GraphModel>,
    renderer: R,
}

impl<R> RenderSession<R> {
    pub fn id(&self) -> Uuid { self.id }
    pub fn model(&self) -> &GraphModel { &self.model }
    pub fn renderer(&self) -> &R { &self.renderer }
    pub fn renderer_mut(&mut self) -> &mut R { &mut self.renderer }
}

/// Owns the load, build, mount and teardown cycle for the graph canvas.
///
/// There is never more than one live renderer: every completing cycle
/// destroys the previous instance before it builds, and a cycle whose canvas
/// has been unmounted (or remounted since) completes as a no-op. Among
/// overlapping cycles on the same mount the one that completes last wins.
pub struct RenderLifecycle<F: RendererFactory> {
    factory: F,
    overlay: OverlaySender,
    state: LoadState,
    error: Option<String>,
    session: Option<RenderSession<F::Output>>,
    pending: BTreeSet<u64>,
    mounted: bool,
    mount_epoch: u64,
    next_cycle: u64,
}

impl<F: RendererFactory> RenderLifecycle<F> {
    pub fn new(factory: F, overlay: OverlaySender) -> Self {
        Self {
            factory,
            overlay,
            state: LoadState::Idle,
            error: None,
            session: None,
            pending: BTreeSet::new(),
            mounted: false,
            mount_epoch: 0,
            next_cycle: 1,
        }
    }

    pub fn state(&self) -> LoadState { self.state }
    pub fn error(&self) -> Option<&str> { self.error.as_deref() }
    pub fn is_loading(&self) -> bool { !self.pending.is_empty() }
    pub fn is_mounted(&self) -> bool { self.mounted }
    pub fn session(&self) -> Option<&RenderSession<F::Output>> { self.session.as_ref() }
    pub fn session_mut(&mut self) -> Option<&mut RenderSession<F::Output>> { self.session.as_mut() }
    pub fn model(&self) -> Option<&GraphModel> { self.session.as_ref().map(|s| s.model()) }
    pub fn factory(&self) -> &F { &self.factory }
    pub fn factory_mut(&mut self) -> &mut F { &mut self.factory }

    /// Mount the canvas and begin the first load.
    pub fn start(&mut self) -> LoadCycle {
        if !self.mounted {
            self.mounted = true;
            self.mount_epoch += 1;
        }
        self.begin()
    }

    /// Begin another load on the mounted canvas. `None` when nothing is mounted.
    pub fn retry(&mut self) -> Option<LoadCycle> {
        if !self.mounted {
            return None;
        }
        Some(self.begin())
    }

    fn begin(&mut self) -> LoadCycle {
        let cycle = LoadCycle { id: self.next_cycle, mount: self.mount_epoch };
        self.next_cycle += 1;
        self.pending.insert(cycle.id);
        self.error = None;
        self.state = LoadState::Loading;
        log::debug!("load cycle {} started", cycle.id);
        cycle
    }

    /// Apply the result of a fetch started for `cycle`.
    pub fn complete(&mut self, cycle: LoadCycle, result: Result<TsneLayout, ApiError>) -> CycleOutcome {
        if !self.mounted || cycle.mount != self.mount_epoch {
            log::debug!("load cycle {} resolved after its canvas was unmounted; ignoring", cycle.id);
            return CycleOutcome::Abandoned;
        }
        self.pending.remove(&cycle.id);
        self.destroy_session();

        let layout = match result {
            Ok(layout) => layout,
            Err(e) => {
                log::warn!("load cycle {} failed: {}", cycle.id, e);
                self.error = Some(format!("Failed to load graph: {}", e));
                self.state = LoadState::Failed;
                return CycleOutcome::Failed;
            }
        };

        if layout.node_count() == 0 {
            self.state = LoadState::Empty;
            return CycleOutcome::Empty;
        }

        let model = Arc::new(build_graph_model(&layout.history, &layout.recommendations));
        let hover = HoverBinding::new(Arc::clone(&model), self.overlay.clone());
        match self.factory.mount(Arc::clone(&model), hover) {
            Ok(renderer) => {
                let id = Uuid::now_v7();
                log::info!(
                    "render session {} mounted: {} nodes, {} edges",
                    id,
                    model.node_count(),
                    model.edge_count()
                );
                self.session = Some(RenderSession { id, model, renderer });
                self.state = LoadState::Rendered;
                CycleOutcome::Rendered { session: id }
            }
            Err(e) => {
                log::warn!("load cycle {} could not mount a renderer: {}", cycle.id, e);
                self.error = Some(format!("Failed to render graph: {}", e));
                self.state = LoadState::Failed;
                CycleOutcome::Failed
            }
        }
    }

    /// Unmount the canvas. Destroys any live renderer and neutralises every
    /// cycle still in flight.
    pub fn teardown(&mut self) {
        self.destroy_session();
        self.mounted = false;
        self.pending.clear();
        self.error = None;
        self.state = LoadState::Idle;
    }

    fn destroy_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.renderer.destroy() {
                log::warn!("render session {}: {}", session.id, e);
            }
            log::info!("render session {} destroyed", session.id);
            self.overlay.hide();
        }
    }
}

impl<F: RendererFactory> Drop for RenderLifecycle<F> {
    fn drop(&mut self) {
        self.destroy_session();
    }
}

/// Fetch the layout for one load cycle. A missing or failing token source
/// downgrades to an unauthenticated request.
pub async fn load_layout(api: &PaperApiClient, tokens: &dyn TokenSource) -> Result<TsneLayout, ApiError> {
    let token = tokens.try_get_token().await;
    api.fetch_tsne_coordinates(token.as_deref()).await
}

//! Render capability seams plus the controller that owns renderer instances.
//!
//! A renderer is anything that can take a built [`GraphModel`] with explicit
//! coordinates, draw it, and report pointer hover over nodes. The crate's own
//! egui canvas is one implementation; tests use counting fakes.

pub mod lifecycle;
pub mod overlay;

use std::sync::Arc;

use thiserror::Error;

use crate::graph_utils::graph::{GraphModel, NodeId};
use overlay::OverlaySender;

pub use lifecycle::{CycleOutcome, LoadCycle, LoadState, RenderLifecycle, RenderSession, load_layout};
pub use overlay::{OverlayMessage, Tooltip, TooltipOverlay};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to mount renderer: {0}")]
    Mount(String),
    #[error("failed to destroy renderer: {0}")]
    Destroy(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HoverEvent {
    Enter(NodeId),
    Leave,
}

/// Hover subscription handed to a renderer at mount time. The renderer only
/// reports which node the pointer is over; the binding resolves the stored
/// title and forwards it to the tooltip overlay as a message.
#[derive(Clone)]
pub struct HoverBinding {
    model: Arc<GraphModel>,
    overlay: OverlaySender,
}

impl HoverBinding {
    pub fn new(model: Arc<GraphModel>, overlay: OverlaySender) -> Self {
        Self { model, overlay }
    }

    pub fn emit(&self, event: HoverEvent) {
        match event {
            HoverEvent::Enter(id) => {
                if let Some(title) = self.model.get_node(&id).and_then(|n| n.hover_title()) {
                    self.overlay.show(title);
                }
            }
            HoverEvent::Leave => self.overlay.hide(),
        }
    }

    pub fn node_entered(&self, id: &str) {
        self.emit(HoverEvent::Enter(id.to_string()));
    }

    pub fn node_left(&self) {
        self.emit(HoverEvent::Leave);
    }
}

pub trait Renderer {
    /// Release the instance. Called at most once per instance by the controller.
    fn destroy(&mut self) -> Result<(), RenderError>;
}

pub trait RendererFactory {
    type Output: Renderer;

    fn mount(&mut self, model: Arc<GraphModel>, hover: HoverBinding) -> Result<Self::Output, RenderError>;
}

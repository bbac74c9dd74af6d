use std::sync::Arc;

use eframe::egui::{self, Color32, Pos2, Rect, Sense, Shape, Stroke, Vec2};

use crate::graph_utils::graph::{GraphModel, GraphNode, NodeId, Rgba};
use crate::render::{HoverBinding, RenderError, Renderer, RendererFactory};

const MIN_ZOOM: f32 = 0.1;
const MAX_ZOOM: f32 = 10.0;
// Share of the canvas the fitted layout may occupy
const FIT_MARGIN: f64 = 0.85;

fn color32(c: Rgba) -> Color32 {
    Color32::from_rgba_unmultiplied(c.0, c.1, c.2, c.3)
}

#[derive(Copy, Clone, Debug)]
struct Fit {
    scale: f64,
    center: (f64, f64),
}

pub struct CanvasResponse {
    pub response: egui::Response,
    pub clicked: Option<NodeId>,
}

/// Painter-backed renderer for one graph model: fitted camera, drag to pan,
/// scroll to zoom and nearest-node hover hit testing.
pub struct GraphCanvas {
    model: Arc<GraphModel>,
    hover: HoverBinding,
    fit: Option<Fit>,
    pan: Vec2,
    zoom: f32,
    hovered: Option<NodeId>,
    selected: Option<NodeId>,
    lod_enabled: bool,
    lod_label_min_zoom: f32,
    destroyed: bool,
}

impl GraphCanvas {
    pub fn new(model: Arc<GraphModel>, hover: HoverBinding, lod_enabled: bool, lod_label_min_zoom: f32) -> Self {
        Self {
            model,
            hover,
            fit: None,
            pan: Vec2::ZERO,
            zoom: 1.0,
            hovered: None,
            selected: None,
            lod_enabled,
            lod_label_min_zoom,
            destroyed: false,
        }
    }

    pub fn model(&self) -> &GraphModel { &self.model }
    pub fn zoom(&self) -> f32 { self.zoom }
    pub fn hovered(&self) -> Option<&str> { self.hovered.as_deref() }
    pub fn selected(&self) -> Option<&str> { self.selected.as_deref() }

    pub fn reset_view(&mut self) {
        self.pan = Vec2::ZERO;
        self.zoom = 1.0;
        self.fit = None;
    }

    pub fn set_lod(&mut self, enabled: bool, min_zoom: f32) {
        self.lod_enabled = enabled;
        self.lod_label_min_zoom = min_zoom;
    }

    fn fit_for(&self, rect: Rect) -> Fit {
        let Some(bounds) = self.model.bounds() else {
            return Fit { scale: 1.0, center: (0.0, 0.0) };
        };
        let (w, h) = (bounds.width(), bounds.height());
        let sx = if w > f64::EPSILON { rect.width() as f64 / w } else { f64::INFINITY };
        let sy = if h > f64::EPSILON { rect.height() as f64 / h } else { f64::INFINITY };
        let scale = sx.min(sy);
        let scale = if scale.is_finite() { scale * FIT_MARGIN } else { 1.0 };
        Fit { scale, center: bounds.center() }
    }

    // World y grows upwards, screen y downwards.
    fn to_screen(&self, rect: Rect, fit: Fit, x: f64, y: f64) -> Pos2 {
        let s = fit.scale * self.zoom as f64;
        let dx = ((x - fit.center.0) * s) as f32;
        let dy = (-(y - fit.center.1) * s) as f32;
        rect.center() + Vec2::new(dx, dy) + self.pan
    }

    fn node_radius(&self, node: &GraphNode) -> f32 {
        node.size * self.zoom.sqrt().clamp(0.6, 2.5)
    }

    fn label_visible(&self, node: &GraphNode) -> bool {
        if node.show_label || !self.lod_enabled {
            return true;
        }
        let is_hover = self.hovered.as_deref() == Some(node.id.as_str());
        let is_sel = self.selected.as_deref() == Some(node.id.as_str());
        is_hover || is_sel || self.zoom >= self.lod_label_min_zoom
    }

    fn set_hovered(&mut self, next: Option<NodeId>) {
        if next == self.hovered {
            return;
        }
        if self.hovered.take().is_some() {
            self.hover.node_left();
        }
        if let Some(id) = &next {
            self.hover.node_entered(id);
        }
        self.hovered = next;
    }

    fn ensure_fit(&mut self, rect: Rect) -> Fit {
        match self.fit {
            Some(fit) => fit,
            None => {
                let fit = self.fit_for(rect);
                self.fit = Some(fit);
                fit
            }
        }
    }

    /// Screen position of a node inside `rect` under the current camera.
    pub fn node_screen_pos(&mut self, rect: Rect, id: &str) -> Option<Pos2> {
        let fit = self.ensure_fit(rect);
        let node = self.model.get_node(id)?;
        Some(self.to_screen(rect, fit, node.x, node.y))
    }

    /// Zoom by a scroll amount, keeping the world point under `pointer` fixed.
    pub fn zoom_at(&mut self, rect: Rect, pointer: Pos2, scroll: f32) {
        if scroll == 0.0 {
            return;
        }
        let factor = (1.0 + scroll * 0.001).clamp(0.9, 1.1);
        let next = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        let applied = next / self.zoom;
        let anchor = pointer - rect.center();
        self.pan = (self.pan - anchor) * applied + anchor;
        self.zoom = next;
    }

    /// Hover the nearest node whose painted radius contains the pointer.
    pub fn update_hover(&mut self, rect: Rect, pointer: Option<Pos2>) {
        let fit = self.ensure_fit(rect);
        let mut hover_node: Option<NodeId> = None;
        if let Some(mouse_pos) = pointer {
            let mut best_d2 = f32::INFINITY;
            for node in self.model.nodes() {
                let ps = self.to_screen(rect, fit, node.x, node.y);
                let r = self.node_radius(node) + 2.0;
                let d2 = (ps - mouse_pos).length_sq();
                if d2 <= r * r && d2 < best_d2 {
                    best_d2 = d2;
                    hover_node = Some(node.id.clone());
                }
            }
        }
        self.set_hovered(hover_node);
    }

    pub fn show(&mut self, ui: &mut egui::Ui) -> CanvasResponse {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let fit = self.ensure_fit(rect);

        // Panning: background drag moves the camera
        if response.dragged() {
            self.pan += response.drag_delta();
        }

        // Zoom with scroll only when pointer is over the canvas area
        if let Some(pointer) = response.hover_pos() {
            let scroll = ui.input(|i| i.raw_scroll_delta.y);
            self.zoom_at(rect, pointer, scroll);
        }

        self.update_hover(rect, response.hover_pos());

        let mut clicked = None;
        if response.clicked() {
            if let Some(id) = self.hovered.clone() {
                self.selected = Some(id.clone());
                clicked = Some(id);
            } else {
                self.selected = None;
            }
        }

        let painter = ui.painter_at(rect);
        self.paint_edges(&painter, rect, fit);
        self.paint_nodes(&painter, rect, fit);

        CanvasResponse { response, clicked }
    }

    fn paint_edges(&self, painter: &egui::Painter, rect: Rect, fit: Fit) {
        for edge in self.model.edges() {
            let (Some(from), Some(to)) = (self.model.get_node(&edge.from_node), self.model.get_node(&edge.to_node)) else {
                continue;
            };
            let a = self.to_screen(rect, fit, from.x, from.y);
            let b = self.to_screen(rect, fit, to.x, to.y);
            let incident_hover = self
                .hovered
                .as_deref()
                .map(|h| h == edge.from_node || h == edge.to_node)
                .unwrap_or(false);
            let mut color = color32(edge.kind.color());
            // Dim edges when hovering another node
            if self.hovered.is_some() && !incident_hover {
                color = color.gamma_multiply(0.4);
            }
            let width = if incident_hover { edge.kind.width() * 1.5 } else { edge.kind.width() };
            let stroke = Stroke::new(width, color);

            if !edge.kind.is_arrow() {
                painter.line_segment([a, b], stroke);
                continue;
            }
            let dir = b - a;
            let len = dir.length();
            if len <= f32::EPSILON {
                continue;
            }
            let unit = dir / len;
            // Stop the shaft at the target's rim so the head stays visible
            let tip = b - unit * self.node_radius(to);
            let head = (6.0 * self.zoom.sqrt()).clamp(4.0, 12.0);
            let base = tip - unit * head;
            let normal = Vec2::new(-unit.y, unit.x) * head * 0.5;
            painter.line_segment([a, base], stroke);
            painter.add(Shape::convex_polygon(vec![tip, base + normal, base - normal], color, Stroke::NONE));
        }
    }

    fn paint_nodes(&self, painter: &egui::Painter, rect: Rect, fit: Fit) {
        for node in self.model.nodes() {
            let pos = self.to_screen(rect, fit, node.x, node.y);
            let r = self.node_radius(node);
            painter.circle_filled(pos, r, color32(node.color));

            let is_hover = self.hovered.as_deref() == Some(node.id.as_str());
            let is_sel = self.selected.as_deref() == Some(node.id.as_str());
            if is_sel {
                painter.circle_stroke(pos, r + 3.0, Stroke::new(2.0, Color32::WHITE));
            } else if is_hover {
                painter.circle_stroke(pos, r + 2.0, Stroke::new(1.5, Color32::from_rgb(120, 220, 255)));
            }

            if self.label_visible(node) {
                let text = node.hover_title().unwrap_or(node.id.as_str());
                let font = egui::FontId::proportional((12.0 * self.zoom.sqrt()).clamp(10.0, 20.0));
                let pos_text = pos + Vec2::new(0.0, -r - 4.0);
                // halo for readability
                painter.text(pos_text + Vec2::new(1.0, 1.0), egui::Align2::CENTER_BOTTOM, text, font.clone(), Color32::BLACK);
                painter.text(pos_text, egui::Align2::CENTER_BOTTOM, text, font, Color32::from_gray(235));
            }
        }
    }
}

impl Renderer for GraphCanvas {
    fn destroy(&mut self) -> Result<(), RenderError> {
        if self.destroyed {
            return Err(RenderError::Destroy("canvas already destroyed".to_string()));
        }
        self.set_hovered(None);
        self.destroyed = true;
        Ok(())
    }
}

/// Builds canvases with the current LOD preferences.
pub struct CanvasFactory {
    pub lod_enabled: bool,
    pub lod_label_min_zoom: f32,
}

impl RendererFactory for CanvasFactory {
    type Output = GraphCanvas;

    fn mount(&mut self, model: Arc<GraphModel>, hover: HoverBinding) -> Result<GraphCanvas, RenderError> {
        if let Some(bad) = model.nodes().iter().find(|n| !n.x.is_finite() || !n.y.is_finite()) {
            return Err(RenderError::Mount(format!("node {} has non-finite coordinates", bad.id)));
        }
        Ok(GraphCanvas::new(model, hover, self.lod_enabled, self.lod_label_min_zoom))
    }
}

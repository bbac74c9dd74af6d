use std::sync::mpsc::{self, Receiver, Sender};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OverlayMessage {
    Show { title: String },
    Hide,
}

/// Write side of the tooltip channel, held by hover bindings and the lifecycle controller.
#[derive(Clone, Debug)]
pub struct OverlaySender(Sender<OverlayMessage>);

impl OverlaySender {
    pub fn show(&self, title: &str) {
        // The overlay may already be gone during shutdown; nothing to report then.
        let _ = self.0.send(OverlayMessage::Show { title: title.to_string() });
    }

    pub fn hide(&self) {
        let _ = self.0.send(OverlayMessage::Hide);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Tooltip<'a> {
    pub title: &'a str,
    pub x: f32,
    pub y: f32,
}

/// Single hover tooltip that follows the pointer while it is over the graph.
pub struct TooltipOverlay {
    rx: Receiver<OverlayMessage>,
    pointer: Option<(f32, f32)>,
    title: Option<String>,
}

impl TooltipOverlay {
    pub fn channel() -> (Self, OverlaySender) {
        let (tx, rx) = mpsc::channel();
        let overlay = TooltipOverlay { rx, pointer: None, title: None };
        (overlay, OverlaySender(tx))
    }

    /// Apply every queued show/hide message; returns how many were applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(msg) = self.rx.try_recv() {
            match msg {
                OverlayMessage::Show { title } if !title.trim().is_empty() => self.title = Some(title),
                OverlayMessage::Show { .. } => {}
                OverlayMessage::Hide => self.title = None,
            }
            applied += 1;
        }
        applied
    }

    pub fn pointer_moved(&mut self, x: f32, y: f32) {
        self.pointer = Some((x, y));
    }

    pub fn pointer_left(&mut self) {
        self.pointer = None;
        self.title = None;
    }

    pub fn pointer(&self) -> Option<(f32, f32)> {
        self.pointer
    }

    /// The tooltip to draw, anchored at the latest pointer position.
    pub fn tooltip(&self) -> Option<Tooltip<'_>> {
        let title = self.title.as_deref()?;
        let (x, y) = self.pointer?;
        Some(Tooltip { title, x, y })
    }
}

//! Grid-Span Resize - Pointer Drag To Column Span
//!
//! ```text
//! Idle -> Dragging -> Idle
//! ```
//!
//! Pointer-down on a resize handle starts a drag, every move maps the
//! pointer onto a clamped span and emits a resize intent, pointer-up ends it.
//! The machine never touches a layout; the host applies the intents.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::layout::{CardConfig, CardId, Span};
use crate::registry::{CardDescriptor, SpanRange};

/// Rendered position of the card being resized, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardGeometry {
    pub left: f64,
    pub width: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
}

/// Shrinks the reachable maximum width while the pointer hugs the right
/// edge of the viewport, so the largest span stays reachable on narrow
/// screens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeDamping {
    /// Portion of the viewport width, measured from the right edge.
    #[serde(default = "default_edge_fraction")]
    pub edge_fraction: f64,
    #[serde(default = "default_damping_factor")]
    pub factor: f64,
}

fn default_edge_fraction() -> f64 { 0.05 }
fn default_damping_factor() -> f64 { 0.9 }

impl Default for EdgeDamping {
    fn default() -> Self {
        Self {
            edge_fraction: default_edge_fraction(),
            factor: default_damping_factor(),
        }
    }
}

impl EdgeDamping {
    pub fn multiplier(&self, pointer_x: f64, viewport: Viewport) -> f64 {
        if viewport.width > 0.0 && pointer_x >= viewport.width * (1.0 - self.edge_fraction) {
            self.factor
        } else {
            1.0
        }
    }
}

/// Host-side pointer listener registration.
///
/// `attach` is called once when a drag starts and `detach` once when it
/// ends; the two are always paired.
pub trait PointerCapture {
    fn attach(&mut self);
    fn detach(&mut self);
}

/// Span change requested for one card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizeIntent {
    pub card_id: CardId,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    card_id: CardId,
    start_span: Span,
    range: SpanRange,
    /// `(min, max)` pixel widths, computed on the first move.
    widths: Option<(f64, f64)>,
    last_span: Option<Span>,
}

impl DragSession {
    pub fn card_id(&self) -> &CardId {
        &self.card_id
    }

    pub fn cached_widths(&self) -> Option<(f64, f64)> {
        self.widths
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ResizeState {
    #[default]
    Idle,
    Dragging(DragSession),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeNoopReason {
    NotDragging,
    AlreadyDragging,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum ResizeEffect {
    Started { card_id: CardId },
    Resized { intent: ResizeIntent },
    Finished { card_id: CardId, span: Option<Span> },
    Noop { reason: ResizeNoopReason },
}

/// Drag lifecycle for one resize handle at a time.
#[derive(Debug, Clone, Default)]
pub struct ResizeMachine {
    state: ResizeState,
    damping: EdgeDamping,
}

impl ResizeMachine {
    pub fn new(damping: EdgeDamping) -> Self {
        Self {
            state: ResizeState::Idle,
            damping,
        }
    }

    pub fn state(&self) -> &ResizeState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, ResizeState::Dragging(_))
    }

    pub fn pointer_down(
        &mut self,
        card: &CardConfig,
        descriptor: &CardDescriptor,
        capture: &mut dyn PointerCapture,
    ) -> ResizeEffect {
        if self.is_dragging() {
            return ResizeEffect::Noop { reason: ResizeNoopReason::AlreadyDragging };
        }

        capture.attach();
        self.state = ResizeState::Dragging(DragSession {
            card_id: card.id.clone(),
            start_span: card.span,
            range: descriptor.span,
            widths: None,
            last_span: None,
        });
        debug!(card_id = %card.id, span = %card.span, "resize drag started");

        ResizeEffect::Started { card_id: card.id.clone() }
    }

    pub fn pointer_move(
        &mut self,
        pointer_x: f64,
        geometry: CardGeometry,
        viewport: Viewport,
    ) -> ResizeEffect {
        let ResizeState::Dragging(session) = &mut self.state else {
            return ResizeEffect::Noop { reason: ResizeNoopReason::NotDragging };
        };

        let (min_width, max_width) = match session.widths {
            Some(widths) => widths,
            None => {
                let widths = pixel_widths(geometry.width, session.start_span, &session.range);
                session.widths = Some(widths);
                widths
            }
        };

        let min_right = geometry.left + min_width;
        let max_right = geometry.left + max_width * self.damping.multiplier(pointer_x, viewport);
        let span = map_pointer_to_span(pointer_x, min_right, max_right, &session.range);
        session.last_span = Some(span);

        ResizeEffect::Resized {
            intent: ResizeIntent {
                card_id: session.card_id.clone(),
                span,
            },
        }
    }

    pub fn pointer_up(&mut self, capture: &mut dyn PointerCapture) -> ResizeEffect {
        match std::mem::take(&mut self.state) {
            ResizeState::Idle => ResizeEffect::Noop { reason: ResizeNoopReason::NotDragging },
            ResizeState::Dragging(session) => {
                capture.detach();
                debug!(card_id = %session.card_id, span = ?session.last_span, "resize drag finished");
                ResizeEffect::Finished {
                    card_id: session.card_id,
                    span: session.last_span,
                }
            }
        }
    }
}

/// Project the card's pixels-per-column onto the span extremes.
pub fn pixel_widths(card_width: f64, span: Span, range: &SpanRange) -> (f64, f64) {
    let per_column = card_width / span.get().max(1) as f64;
    (
        range.minimum.get() as f64 * per_column,
        range.maximum.get() as f64 * per_column,
    )
}

/// Linear map of `pointer_x` from `[min_right, max_right]` onto the span
/// range, rounded to the nearest column and clamped.
pub fn map_pointer_to_span(pointer_x: f64, min_right: f64, max_right: f64, range: &SpanRange) -> Span {
    let low = range.minimum.get() as f64;
    let high = range.maximum.get() as f64;

    let raw = if max_right > min_right {
        low + (pointer_x - min_right) * (high - low) / (max_right - min_right)
    } else if pointer_x < max_right {
        low
    } else {
        high
    };

    if !raw.is_finite() {
        return range.minimum;
    }
    range.clamp(Span::clamped(raw.round() as i64))
}

/// Additive resize: step the span by `delta` columns within the range.
pub fn nudge_span(current: Span, delta: i32, range: &SpanRange) -> Span {
    range.clamp(Span::clamped(current.get() as i64 + delta as i64))
}

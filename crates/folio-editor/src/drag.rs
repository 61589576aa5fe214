//! Drag-and-drop reorder gestures.
//!
//! [`DragController`] turns pointer and keyboard input into at most one
//! [`DropPlan`]; it never mutates anything itself. The plan is applied to a
//! [`DropTarget`]: a [`BlockCollection`] (one section) or a
//! [`ContentBoard`](crate::board::ContentBoard) (featured / all grids).
//!
//! ```text
//!   Idle ──pointer_down──▶ Pressed ──moved ≥ activation──▶ Dragging
//!     ▲                       │                              │
//!     │                  drop: Ignored          drop: Dropped(plan) | Cancelled
//!     └──────────────────────────────────────────────────────┘
//!   Idle ──keyboard_pickup──▶ Dragging
//! ```
//!
//! Indices in a plan are destination positions in the post-drop list, as
//! [`BlockCollection::reorder`] expects.

use std::fmt::Debug;

use folio_types::BlockId;

use crate::collection::BlockCollection;
use crate::EditorError;

// ============================================================================
// Geometry
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn distance_sq(self, other: Point) -> f32 {
        let (dx, dy) = (self.x - other.x, self.y - other.y);
        dx * dx + dy * dy
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// A position within a section.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slot<S> {
    pub section: S,
    pub index: usize,
}

impl<S> Slot<S> {
    pub fn new(section: S, index: usize) -> Self {
        Self { section, index }
    }
}

/// Laid-out bounds of one sibling, as the renderer last drew it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HitBox<S> {
    pub slot: Slot<S>,
    pub bounds: Rect,
}

impl<S> HitBox<S> {
    pub fn new(section: S, index: usize, bounds: Rect) -> Self {
        Self {
            slot: Slot::new(section, index),
            bounds,
        }
    }
}

/// Hit-box whose centre is closest to `at`. Equidistant boxes resolve to
/// the lower index.
pub fn nearest_center<S: Copy>(at: Point, hitboxes: &[HitBox<S>]) -> Option<Slot<S>> {
    let mut best: Option<(f32, Slot<S>)> = None;
    for hb in hitboxes {
        let d = at.distance_sq(hb.bounds.center());
        let better = match best {
            None => true,
            Some((bd, slot)) => d < bd || (d == bd && hb.slot.index < slot.index),
        };
        if better {
            best = Some((d, hb.slot));
        }
    }
    best.map(|(_, slot)| slot)
}

// ============================================================================
// Plans and targets
// ============================================================================

/// A completed gesture: move `item` from `from` to `to`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DropPlan<I, S> {
    pub item: I,
    pub from: Slot<S>,
    pub to: Slot<S>,
}

impl<I, S: PartialEq> DropPlan<I, S> {
    pub fn is_cross_section(&self) -> bool {
        self.from.section != self.to.section
    }

    pub fn is_noop(&self) -> bool {
        !self.is_cross_section() && self.from.index == self.to.index
    }
}

impl<I, S: Copy + PartialEq> DropPlan<I, S> {
    /// Apply to a target: reorder within a section, or move across.
    pub fn apply<T>(&self, target: &mut T) -> Result<T::Outcome, T::Error>
    where
        T: DropTarget<I, S>,
    {
        if self.is_cross_section() {
            target.move_across(&self.item, self.from.section, self.to.section, self.to.index)
        } else {
            target.move_within(&self.item, self.to.section, self.to.index)
        }
    }
}

/// Something a [`DropPlan`] can be applied to.
pub trait DropTarget<I, S> {
    type Outcome;
    type Error;

    fn move_within(&mut self, item: &I, section: S, to_index: usize) -> Result<Self::Outcome, Self::Error>;

    /// A drop into another section. Side effects of crossing (such as the
    /// board's featured flag) belong here, not to the drag.
    fn move_across(&mut self, item: &I, from: S, to: S, to_index: usize)
    -> Result<Self::Outcome, Self::Error>;
}

/// A block collection is a single section.
impl DropTarget<BlockId, ()> for BlockCollection {
    /// Whether the order changed.
    type Outcome = bool;
    type Error = EditorError;

    fn move_within(&mut self, item: &BlockId, _section: (), to_index: usize) -> Result<bool, EditorError> {
        self.reorder(item, to_index)
    }

    fn move_across(&mut self, item: &BlockId, _from: (), _to: (), to_index: usize) -> Result<bool, EditorError> {
        self.reorder(item, to_index)
    }
}

// ============================================================================
// DragController
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DragState<I, S> {
    Idle,
    /// Pointer is down but has not travelled far enough to start a drag.
    Pressed { item: I, source: Slot<S>, origin: Point },
    Dragging {
        item: I,
        source: Slot<S>,
        /// Presentation-only feedback; nothing moves until drop.
        candidate: Option<Slot<S>>,
        keyboard: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragOutcome<I, S> {
    Dropped(DropPlan<I, S>),
    Cancelled,
    /// No drag was active (a click, or nothing at all).
    Ignored,
}

type CanDrop<I, S> = Box<dyn Fn(&DropPlan<I, S>) -> bool + Send + Sync>;

/// Gesture state machine for one list or board.
pub struct DragController<I, S = ()> {
    state: DragState<I, S>,
    activation_distance: f32,
    can_drop: Option<CanDrop<I, S>>,
}

impl<I, S> DragController<I, S>
where
    I: Copy + PartialEq + Debug,
    S: Copy + PartialEq + Debug,
{
    pub fn new(activation_distance: f32) -> Self {
        Self {
            state: DragState::Idle,
            activation_distance: activation_distance.max(0.0),
            can_drop: None,
        }
    }

    /// Veto drops; a vetoed drop is reported as cancelled.
    pub fn with_can_drop(mut self, f: impl Fn(&DropPlan<I, S>) -> bool + Send + Sync + 'static) -> Self {
        self.can_drop = Some(Box::new(f));
        self
    }

    pub fn state(&self) -> &DragState<I, S> {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// The dragged item, once the gesture has activated.
    pub fn dragged(&self) -> Option<I> {
        match self.state {
            DragState::Dragging { item, .. } => Some(item),
            _ => None,
        }
    }

    pub fn candidate(&self) -> Option<Slot<S>> {
        match self.state {
            DragState::Dragging { candidate, .. } => candidate,
            _ => None,
        }
    }

    /// Press on an item. Restarts any unfinished gesture.
    pub fn pointer_down(&mut self, item: I, source: Slot<S>, at: Point) {
        self.state = DragState::Pressed { item, source, origin: at };
    }

    /// Track the pointer. Activates a pressed gesture past the activation
    /// distance and refreshes the candidate while dragging.
    pub fn pointer_move(&mut self, at: Point, hitboxes: &[HitBox<S>]) -> Option<Slot<S>> {
        match self.state {
            DragState::Idle => None,
            DragState::Pressed { item, source, origin } => {
                let threshold = self.activation_distance * self.activation_distance;
                if at.distance_sq(origin) < threshold {
                    return None;
                }
                let candidate = nearest_center(at, hitboxes);
                tracing::trace!(?item, ?candidate, "drag activated");
                self.state = DragState::Dragging { item, source, candidate, keyboard: false };
                candidate
            }
            DragState::Dragging { item, source, keyboard, .. } => {
                let candidate = nearest_center(at, hitboxes);
                self.state = DragState::Dragging { item, source, candidate, keyboard };
                candidate
            }
        }
    }

    /// Keyboard pickup: activates immediately with the origin as candidate.
    pub fn keyboard_pickup(&mut self, item: I, source: Slot<S>) {
        self.state = DragState::Dragging {
            item,
            source,
            candidate: Some(source),
            keyboard: true,
        };
    }

    /// Step the candidate by `delta`, clamped to the valid positions of its
    /// section. `section_len` is the section's current item count.
    pub fn keyboard_move(&mut self, delta: isize, section_len: usize) -> Option<Slot<S>> {
        let DragState::Dragging { item, source, candidate, keyboard } = self.state else {
            return None;
        };
        let current = candidate.unwrap_or(source);
        let max = Self::max_index(source, current.section, section_len);
        let index = current.index.saturating_add_signed(delta).min(max);
        let next = Slot::new(current.section, index);
        self.state = DragState::Dragging { item, source, candidate: Some(next), keyboard };
        Some(next)
    }

    /// Move the candidate into `section`, keeping the index where possible.
    pub fn keyboard_move_to_section(&mut self, section: S, section_len: usize) -> Option<Slot<S>> {
        let DragState::Dragging { item, source, candidate, keyboard } = self.state else {
            return None;
        };
        let current = candidate.unwrap_or(source);
        let max = Self::max_index(source, section, section_len);
        let next = Slot::new(section, current.index.min(max));
        self.state = DragState::Dragging { item, source, candidate: Some(next), keyboard };
        Some(next)
    }

    /// Release. Returns to `Idle` whatever the outcome.
    pub fn drop(&mut self) -> DragOutcome<I, S> {
        let state = std::mem::replace(&mut self.state, DragState::Idle);
        match state {
            DragState::Idle | DragState::Pressed { .. } => DragOutcome::Ignored,
            DragState::Dragging { candidate: None, .. } => DragOutcome::Cancelled,
            DragState::Dragging { item, source, candidate: Some(to), .. } => {
                let plan = DropPlan { item, from: source, to };
                if self.can_drop.as_ref().is_some_and(|f| !f(&plan)) {
                    tracing::debug!(?plan, "drop vetoed");
                    return DragOutcome::Cancelled;
                }
                DragOutcome::Dropped(plan)
            }
        }
    }

    /// Escape: abandon the gesture without mutation.
    pub fn cancel(&mut self) -> DragOutcome<I, S> {
        match std::mem::replace(&mut self.state, DragState::Idle) {
            DragState::Idle => DragOutcome::Ignored,
            _ => DragOutcome::Cancelled,
        }
    }

    /// Same section: the item is already counted, so `len - 1`.
    /// Another section: it may be appended, so `len`.
    fn max_index(source: Slot<S>, section: S, section_len: usize) -> usize {
        if section == source.section {
            section_len.saturating_sub(1)
        } else {
            section_len
        }
    }
}

impl<I: Debug, S: Debug> Debug for DragController<I, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DragController")
            .field("state", &self.state)
            .field("activation_distance", &self.activation_distance)
            .field("can_drop", &self.can_drop.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use folio_types::{BlockData, BlockType, DocumentId};

    /// Vertical list of 40px rows.
    fn rows(n: usize) -> Vec<HitBox<()>> {
        (0..n)
            .map(|i| HitBox::new((), i, Rect::new(0.0, i as f32 * 40.0, 200.0, 40.0)))
            .collect()
    }

    fn collection(n: usize) -> (BlockCollection, Vec<BlockId>) {
        let mut c = BlockCollection::new(DocumentId::new());
        let ids = (0..n)
            .map(|i| {
                c.add_block(BlockType::Paragraph, Some(BlockData::paragraph(format!("{i}"))))
                    .unwrap()
                    .id
            })
            .collect();
        (c, ids)
    }

    #[test]
    fn test_nearest_center_tie_goes_to_lower_index() {
        let boxes = rows(3);
        // Midpoint between row 0 (centre y=20) and row 1 (centre y=60).
        assert_eq!(nearest_center(Point::new(100.0, 40.0), &boxes), Some(Slot::new((), 0)));
        assert_eq!(nearest_center(Point::new(100.0, 41.0), &boxes), Some(Slot::new((), 1)));
        assert_eq!(nearest_center::<()>(Point::new(0.0, 0.0), &[]), None);
    }

    #[test]
    fn test_click_without_travel_is_ignored() {
        let mut drag: DragController<u32> = DragController::new(8.0);
        drag.pointer_down(7, Slot::new((), 0), Point::new(10.0, 10.0));
        assert_eq!(drag.pointer_move(Point::new(13.0, 14.0), &rows(3)), None);
        assert!(!drag.is_dragging());
        assert_eq!(drag.drop(), DragOutcome::Ignored);
        assert_eq!(*drag.state(), DragState::Idle);
    }

    #[test]
    fn test_pointer_drag_reorders_on_drop_only() {
        let (mut c, ids) = collection(5);
        let before = c.clone();
        let mut drag = DragController::new(8.0);

        drag.pointer_down(ids[4], Slot::new((), 4), Point::new(100.0, 180.0));
        drag.pointer_move(Point::new(100.0, 100.0), &rows(5));
        assert!(drag.is_dragging());
        assert_eq!(drag.pointer_move(Point::new(100.0, 5.0), &rows(5)), Some(Slot::new((), 0)));
        assert_eq!(c, before);

        let DragOutcome::Dropped(plan) = drag.drop() else {
            panic!("expected a drop");
        };
        assert!(plan.apply(&mut c).unwrap());
        assert_eq!(c.ids(), vec![ids[4], ids[0], ids[1], ids[2], ids[3]]);
        assert_eq!(*drag.state(), DragState::Idle);
    }

    #[test]
    fn test_drop_without_candidate_or_escape_cancels() {
        let (c, ids) = collection(2);
        let before = c.clone();
        let mut drag = DragController::new(0.0);

        drag.pointer_down(ids[0], Slot::new((), 0), Point::default());
        drag.pointer_move(Point::new(1.0, 1.0), &[]);
        assert_eq!(drag.drop(), DragOutcome::Cancelled);

        drag.keyboard_pickup(ids[0], Slot::new((), 0));
        drag.keyboard_move(1, 2);
        assert_eq!(drag.cancel(), DragOutcome::Cancelled);
        assert_eq!(drag.cancel(), DragOutcome::Ignored);
        assert_eq!(c, before);
    }

    #[test]
    fn test_pointer_cancel_after_crossing_rows_changes_nothing() {
        let (c, ids) = collection(4);
        let before = c.clone();
        let boxes = rows(4);
        let mut drag = DragController::new(8.0);

        drag.pointer_down(ids[0], Slot::new((), 0), Point::new(100.0, 20.0));
        assert_eq!(drag.pointer_move(Point::new(100.0, 60.0), &boxes), Some(Slot::new((), 1)));
        assert_eq!(drag.pointer_move(Point::new(100.0, 100.0), &boxes), Some(Slot::new((), 2)));
        assert_eq!(drag.pointer_move(Point::new(100.0, 140.0), &boxes), Some(Slot::new((), 3)));
        assert_eq!(drag.candidate(), Some(Slot::new((), 3)));

        assert_eq!(drag.cancel(), DragOutcome::Cancelled);
        assert_eq!(*drag.state(), DragState::Idle);
        assert_eq!(drag.candidate(), None);
        assert_eq!(drag.drop(), DragOutcome::Ignored);
        assert_eq!(c, before);
        assert_eq!(c.ids(), ids);
    }

    #[test]
    fn test_keyboard_drag_clamps_within_section() {
        let (mut c, ids) = collection(3);
        let mut drag = DragController::new(8.0);

        drag.keyboard_pickup(ids[0], Slot::new((), 0));
        assert_eq!(drag.keyboard_move(-1, 3), Some(Slot::new((), 0)));
        assert_eq!(drag.keyboard_move(5, 3), Some(Slot::new((), 2)));

        let DragOutcome::Dropped(plan) = drag.drop() else {
            panic!("expected a drop");
        };
        plan.apply(&mut c).unwrap();
        assert_eq!(c.ids(), vec![ids[1], ids[2], ids[0]]);
    }

    #[test]
    fn test_keyboard_move_to_other_section_allows_append() {
        #[derive(Clone, Copy, Debug, PartialEq, Eq)]
        enum Grid {
            Left,
            Right,
        }

        let mut drag: DragController<u8, Grid> = DragController::new(8.0);
        drag.keyboard_pickup(1, Slot::new(Grid::Left, 3));
        assert_eq!(drag.keyboard_move_to_section(Grid::Right, 2), Some(Slot::new(Grid::Right, 2)));

        let DragOutcome::Dropped(plan) = drag.drop() else {
            panic!("expected a drop");
        };
        assert!(plan.is_cross_section());
        assert!(!plan.is_noop());
    }

    #[test]
    fn test_vetoed_drop_is_cancelled() {
        let mut drag: DragController<u8> = DragController::new(0.0).with_can_drop(|plan| plan.to.index != 0);
        drag.keyboard_pickup(1, Slot::new((), 1));
        drag.keyboard_move(-1, 3);
        assert_eq!(drag.drop(), DragOutcome::Cancelled);
    }

    #[test]
    fn test_noop_drop_leaves_collection_untouched() {
        let (mut c, ids) = collection(3);
        let before = c.clone();
        let mut drag = DragController::new(8.0);
        drag.keyboard_pickup(ids[1], Slot::new((), 1));

        let DragOutcome::Dropped(plan) = drag.drop() else {
            panic!("expected a drop");
        };
        assert!(plan.is_noop());
        assert!(!plan.apply(&mut c).unwrap());
        assert_eq!(c, before);
    }
}

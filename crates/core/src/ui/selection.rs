//! Drag handling for the region selector.

use eframe::egui;

/// Minimum drag distance (in logical pixels) for a selection to count.
pub const MIN_SELECTION_DISTANCE: f32 = 10.0;

/// A drag long enough to be intentional rather than a stray click.
pub fn is_valid_selection(start: egui::Pos2, end: egui::Pos2) -> bool {
    start.distance(end) > MIN_SELECTION_DISTANCE
}

/// What a frame's pointer input did to the selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionEvent {
    Started,
    Dragging,
    /// Drag released with a valid selection.
    Completed,
    /// Drag released too short; the selection was reset.
    Discarded,
    /// Click without a drag.
    Cancelled,
    None,
}

impl SelectionEvent {
    /// Whether the selector should close without a selection.
    pub fn cancels(self) -> bool {
        matches!(self, SelectionEvent::Discarded | SelectionEvent::Cancelled)
    }
}

/// Updates the drag endpoints from `response` and reports the transition.
pub fn process_drag_event(
    response: &egui::Response,
    start: &mut Option<egui::Pos2>,
    current: &mut Option<egui::Pos2>,
) -> SelectionEvent {
    if response.clicked() {
        return cancel(start, current);
    }

    if response.drag_started() {
        *start = response.interact_pointer_pos();
        *current = response.interact_pointer_pos();
        return SelectionEvent::Started;
    }

    if response.dragged() {
        *current = response.interact_pointer_pos();
        return SelectionEvent::Dragging;
    }

    if response.drag_stopped() {
        if let (Some(s), Some(e)) = (*start, *current) {
            return finish_drag(s, e, start, current);
        }
    }

    SelectionEvent::None
}

fn finish_drag(
    s: egui::Pos2,
    e: egui::Pos2,
    start: &mut Option<egui::Pos2>,
    current: &mut Option<egui::Pos2>,
) -> SelectionEvent {
    if is_valid_selection(s, e) {
        SelectionEvent::Completed
    } else {
        *start = None;
        *current = None;
        SelectionEvent::Discarded
    }
}

fn cancel(start: &mut Option<egui::Pos2>, current: &mut Option<egui::Pos2>) -> SelectionEvent {
    *start = None;
    *current = None;
    SelectionEvent::Cancelled
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_drags_are_discarded() {
        let mut start = Some(egui::pos2(100.0, 100.0));
        let mut current = Some(egui::pos2(104.0, 103.0));

        let event = finish_drag(start.unwrap(), current.unwrap(), &mut start, &mut current);
        assert_eq!(event, SelectionEvent::Discarded);
        assert_eq!((start, current), (None, None));
        assert!(event.cancels());
    }

    #[test]
    fn click_without_drag_cancels() {
        let mut start = Some(egui::pos2(50.0, 50.0));
        let mut current = None;

        let event = cancel(&mut start, &mut current);
        assert_eq!(event, SelectionEvent::Cancelled);
        assert_eq!((start, current), (None, None));
        assert!(event.cancels());
    }

    #[test]
    fn drag_progress_keeps_selector_open() {
        for event in [
            SelectionEvent::Started,
            SelectionEvent::Dragging,
            SelectionEvent::Completed,
            SelectionEvent::None,
        ] {
            assert!(!event.cancels(), "{event:?}");
        }
    }

    #[test]
    fn long_drags_complete_in_any_direction() {
        let mut start = Some(egui::pos2(300.0, 200.0));
        let mut current = Some(egui::pos2(120.0, 40.0));

        let event = finish_drag(start.unwrap(), current.unwrap(), &mut start, &mut current);
        assert_eq!(event, SelectionEvent::Completed);
        assert!(start.is_some() && current.is_some());
        assert!(is_valid_selection(egui::pos2(0.0, 0.0), egui::pos2(0.0, 11.0)));
    }
}

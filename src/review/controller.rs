//! Review panel state machine.
//!
//! Owns the live batch, the selection, the countdown and the pin flag. Every
//! input is an explicit [`ReviewEvent`]; the caller applies the returned
//! [`Effect`]s in order (timer sources, HTTP submission, widget rebuilds) and
//! then re-projects [`ReviewController::view`] onto the widgets.

use tracing::{debug, info};

use super::countdown::{Countdown, Tick};
use super::selection::SelectionState;
use crate::models::{ReviewBatch, ReviewResponse};

const BASE_TITLE: &str = "NF Preview Selector";

#[derive(Debug, Clone)]
pub enum ReviewEvent {
    /// The host asked for a review.
    Show(ReviewBatch),
    Toggle(usize),
    Confirm,
    Cancel,
    /// One second elapsed on the countdown timer.
    Tick,
    /// A new job is about to run on the host.
    QueueInterrupt,
    TogglePin,
    /// The operator closed the panel through its window chrome.
    CloseRequested,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    StopTimer,
    StartTimer,
    Submit(ReviewResponse),
    /// Tear down any existing panel and build a fresh one.
    OpenDialog,
    /// Rebuild the grid for the live batch inside the existing panel.
    RenderBatch,
    /// Pinned and idle: clear the grid and show the waiting message.
    ShowWaiting,
    CloseDialog,
}

/// Display strings derived from the controller state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewView {
    pub title: String,
    pub selection_info: String,
    pub confirm_label: String,
    pub confirm_enabled: bool,
    pub countdown_label: String,
    pub pinned: bool,
    pub pin_tooltip: &'static str,
    pub waiting: bool,
}

#[derive(Debug, Default)]
pub struct ReviewController {
    batch: Option<ReviewBatch>,
    selection: SelectionState,
    countdown: Countdown,
    pinned: bool,
    visible: bool,
}

impl ReviewController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch(&self) -> Option<&ReviewBatch> {
        self.batch.as_ref()
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn handle(&mut self, event: ReviewEvent) -> Vec<Effect> {
        match event {
            ReviewEvent::Show(batch) => self.show(batch),
            ReviewEvent::Toggle(index) => {
                if self.batch.is_some() {
                    self.selection.toggle(index);
                }
                Vec::new()
            }
            ReviewEvent::Confirm => self.confirm(),
            ReviewEvent::Cancel => self.cancel(),
            ReviewEvent::Tick => self.tick(),
            ReviewEvent::QueueInterrupt => {
                if !self.visible {
                    return Vec::new();
                }
                info!("queue started while review is open, cancelling");
                self.cancel()
            }
            ReviewEvent::TogglePin => {
                self.pinned = !self.pinned;
                Vec::new()
            }
            ReviewEvent::CloseRequested => self.close_requested(),
        }
    }

    fn show(&mut self, batch: ReviewBatch) -> Vec<Effect> {
        if self.visible
            && self
                .batch
                .as_ref()
                .is_some_and(|live| live.review_id == batch.review_id)
        {
            debug!("ignoring duplicate review {}", batch.review_id);
            return Vec::new();
        }

        info!(
            "showing review {} with {} images, timeout {}s",
            batch.review_id,
            batch.len(),
            batch.timeout_secs
        );

        let in_place = self.pinned && self.visible;
        self.selection.reset(batch.len());
        self.countdown.start(batch.timeout_secs);
        self.batch = Some(batch);
        self.visible = true;

        if in_place {
            vec![Effect::StopTimer, Effect::RenderBatch, Effect::StartTimer]
        } else {
            vec![
                Effect::StopTimer,
                Effect::OpenDialog,
                Effect::RenderBatch,
                Effect::StartTimer,
            ]
        }
    }

    fn confirm(&mut self) -> Vec<Effect> {
        let Some(batch) = self.batch.as_ref() else {
            return Vec::new();
        };
        let Some(selection) = self.selection.confirmable() else {
            return Vec::new();
        };
        info!("review {} confirmed: {:?}", batch.review_id, selection);
        let response = ReviewResponse::confirmed(batch, selection);
        self.countdown.confirm();
        self.resolve(response)
    }

    /// A visible panel always answers a cancel, even while waiting with no batch.
    fn cancel(&mut self) -> Vec<Effect> {
        self.countdown.cancel();
        if !self.visible {
            return vec![Effect::StopTimer];
        }
        let response = self.cancel_response();
        self.resolve(response)
    }

    fn cancel_response(&self) -> ReviewResponse {
        match self.batch.as_ref() {
            Some(batch) => {
                info!("review {} cancelled", batch.review_id);
                ReviewResponse::cancelled(batch)
            }
            None => {
                debug!("cancel while waiting, sending response without ids");
                ReviewResponse::cancelled_without_batch()
            }
        }
    }

    fn tick(&mut self) -> Vec<Effect> {
        match self.countdown.tick() {
            Tick::Expired => {
                let Some(batch) = self.batch.as_ref() else {
                    return vec![Effect::StopTimer];
                };
                info!("review {} timed out", batch.review_id);
                let response = ReviewResponse::timed_out(batch);
                self.resolve(response)
            }
            Tick::Remaining(_) => Vec::new(),
            Tick::Inactive => vec![Effect::StopTimer],
        }
    }

    fn close_requested(&mut self) -> Vec<Effect> {
        let mut effects = vec![Effect::StopTimer];
        if self.visible {
            effects.push(Effect::Submit(self.cancel_response()));
        }
        self.countdown.cancel();
        self.hide();
        effects.push(Effect::CloseDialog);
        effects
    }

    fn resolve(&mut self, response: ReviewResponse) -> Vec<Effect> {
        let mut effects = vec![Effect::StopTimer, Effect::Submit(response)];
        effects.extend(self.finish());
        effects
    }

    /// Either re-arm for the next batch (pinned) or close.
    fn finish(&mut self) -> Vec<Effect> {
        if !self.visible {
            return Vec::new();
        }
        if self.pinned {
            self.selection.reset(0);
            self.batch = None;
            self.countdown.reset();
            vec![Effect::ShowWaiting]
        } else {
            self.hide();
            vec![Effect::CloseDialog]
        }
    }

    fn hide(&mut self) {
        self.visible = false;
        self.batch = None;
        self.selection.reset(0);
    }

    pub fn view(&self) -> ReviewView {
        let count = self.selection.count();
        let total = self.batch.as_ref().map_or(0, ReviewBatch::len);
        let waiting = self.visible && self.batch.is_none();

        let title = if self.pinned {
            format!("{} (Pinned)", BASE_TITLE)
        } else {
            BASE_TITLE.to_string()
        };
        let confirm_label = if count > 0 {
            format!("Confirm ({} selected)", count)
        } else {
            "Select at least one image".to_string()
        };
        let countdown_label = if waiting {
            "Pinned - waiting for next request".to_string()
        } else {
            self.countdown.label()
        };
        let pin_tooltip = if self.pinned {
            "Unpin dialog (will close on new generations)"
        } else {
            "Pin dialog to keep open during new generations"
        };

        ReviewView {
            title,
            selection_info: format!("Selected: {} of {}", count, total),
            confirm_label,
            confirm_enabled: self.batch.is_some() && count > 0,
            countdown_label,
            pinned: self.pinned,
            pin_tooltip,
            waiting,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ImageKind, ImageRef, OpaqueId};

    fn batch(id: &str, count: usize, timeout: u32) -> ReviewBatch {
        let images = (0..count)
            .map(|i| ImageRef::new(format!("NFPreview_{:05}_.png", i), ImageKind::Temp, ""))
            .collect();
        ReviewBatch::new(OpaqueId::new(id), OpaqueId::new("9"), images, timeout)
    }

    fn submitted(effects: &[Effect]) -> Vec<&ReviewResponse> {
        effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::Submit(response) => Some(response),
                _ => None,
            })
            .collect()
    }

    fn shown(id: &str, count: usize) -> ReviewController {
        let mut controller = ReviewController::new();
        controller.handle(ReviewEvent::Show(batch(id, count, 60)));
        controller
    }

    #[test]
    fn show_opens_fresh_dialog_and_starts_timer() {
        let mut controller = ReviewController::new();
        let effects = controller.handle(ReviewEvent::Show(batch("a", 4, 60)));
        assert_eq!(
            effects,
            vec![
                Effect::StopTimer,
                Effect::OpenDialog,
                Effect::RenderBatch,
                Effect::StartTimer
            ]
        );
        assert!(controller.is_visible());
        assert_eq!(controller.view().countdown_label, "Time remaining: 1:00");
    }

    #[test]
    fn duplicate_review_id_is_ignored() {
        let mut controller = shown("a", 4);
        controller.handle(ReviewEvent::Toggle(1));
        let effects = controller.handle(ReviewEvent::Show(batch("a", 4, 60)));
        assert!(effects.is_empty());
        assert!(controller.selection().contains(1));
    }

    #[test]
    fn new_batch_replaces_old_one() {
        let mut controller = shown("a", 4);
        controller.handle(ReviewEvent::Toggle(1));
        let effects = controller.handle(ReviewEvent::Show(batch("b", 2, 60)));
        assert!(effects.contains(&Effect::OpenDialog));
        assert!(controller.selection().is_empty());
        assert_eq!(controller.batch().map(ReviewBatch::len), Some(2));
    }

    #[test]
    fn confirm_sends_sorted_selection_and_closes() {
        let mut controller = shown("a", 5);
        for index in [3, 0, 2] {
            controller.handle(ReviewEvent::Toggle(index));
        }
        let effects = controller.handle(ReviewEvent::Confirm);
        let sent = submitted(&effects);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].selection, vec![0, 2, 3]);
        assert!(!sent[0].cancelled);
        assert_eq!(effects.first(), Some(&Effect::StopTimer));
        assert_eq!(effects.last(), Some(&Effect::CloseDialog));
        assert!(!controller.is_visible());
    }

    #[test]
    fn confirm_with_empty_selection_is_prevented() {
        let mut controller = shown("a", 3);
        assert!(!controller.view().confirm_enabled);
        assert!(controller.handle(ReviewEvent::Confirm).is_empty());
        assert!(controller.is_visible());
    }

    #[test]
    fn cancel_ignores_current_selection() {
        let mut controller = shown("a", 3);
        controller.handle(ReviewEvent::Toggle(2));
        let effects = controller.handle(ReviewEvent::Cancel);
        let sent = submitted(&effects);
        assert!(sent[0].selection.is_empty());
        assert!(sent[0].cancelled);
    }

    #[test]
    fn timeout_sends_empty_uncancelled() {
        let mut controller = ReviewController::new();
        controller.handle(ReviewEvent::Show(batch("a", 3, 3)));
        assert!(controller.handle(ReviewEvent::Tick).is_empty());
        assert!(controller.handle(ReviewEvent::Tick).is_empty());
        let effects = controller.handle(ReviewEvent::Tick);
        let sent = submitted(&effects);
        assert_eq!(sent.len(), 1);
        assert!(sent[0].selection.is_empty());
        assert!(!sent[0].cancelled);
        assert!(effects.contains(&Effect::CloseDialog));
    }

    #[test]
    fn stale_tick_only_stops_timer() {
        let mut controller = shown("a", 1);
        controller.handle(ReviewEvent::Cancel);
        assert_eq!(controller.handle(ReviewEvent::Tick), vec![Effect::StopTimer]);
    }

    #[test]
    fn pinned_confirm_waits_instead_of_closing() {
        let mut controller = shown("a", 2);
        controller.handle(ReviewEvent::TogglePin);
        controller.handle(ReviewEvent::Toggle(0));
        let effects = controller.handle(ReviewEvent::Confirm);
        assert_eq!(effects.last(), Some(&Effect::ShowWaiting));
        assert!(!effects.contains(&Effect::CloseDialog));
        assert!(controller.is_visible());
        assert!(controller.batch().is_none());

        let view = controller.view();
        assert!(view.waiting);
        assert_eq!(view.title, "NF Preview Selector (Pinned)");
        assert_eq!(view.countdown_label, "Pinned - waiting for next request");
        assert_eq!(view.selection_info, "Selected: 0 of 0");
    }

    #[test]
    fn pinned_visible_dialog_updates_in_place() {
        let mut controller = shown("a", 2);
        controller.handle(ReviewEvent::TogglePin);
        controller.handle(ReviewEvent::Toggle(1));
        let effects = controller.handle(ReviewEvent::Show(batch("b", 3, 30)));
        assert_eq!(
            effects,
            vec![Effect::StopTimer, Effect::RenderBatch, Effect::StartTimer]
        );
        assert!(controller.selection().is_empty());
        assert_eq!(controller.view().countdown_label, "Time remaining: 0:30");
    }

    #[test]
    fn queue_interrupt_cancels_before_close() {
        let mut controller = shown("a", 2);
        controller.handle(ReviewEvent::Toggle(0));
        let effects = controller.handle(ReviewEvent::QueueInterrupt);
        let submit_at = effects
            .iter()
            .position(|e| matches!(e, Effect::Submit(r) if r.cancelled && r.selection.is_empty()))
            .unwrap();
        let close_at = effects
            .iter()
            .position(|e| *e == Effect::CloseDialog)
            .unwrap();
        assert!(submit_at < close_at);
    }

    #[test]
    fn queue_interrupt_pinned_resets_after_cancel() {
        let mut controller = shown("a", 2);
        controller.handle(ReviewEvent::TogglePin);
        let effects = controller.handle(ReviewEvent::QueueInterrupt);
        let submit_at = effects
            .iter()
            .position(|e| matches!(e, Effect::Submit(_)))
            .unwrap();
        let waiting_at = effects
            .iter()
            .position(|e| *e == Effect::ShowWaiting)
            .unwrap();
        assert!(submit_at < waiting_at);
    }

    #[test]
    fn queue_interrupt_while_hidden_is_ignored() {
        let mut controller = ReviewController::new();
        assert!(controller.handle(ReviewEvent::QueueInterrupt).is_empty());
    }

    #[test]
    fn waiting_dialog_interrupt_still_responds() {
        let mut controller = shown("a", 1);
        controller.handle(ReviewEvent::TogglePin);
        controller.handle(ReviewEvent::Toggle(0));
        controller.handle(ReviewEvent::Confirm);

        let effects = controller.handle(ReviewEvent::QueueInterrupt);
        let sent = submitted(&effects);
        assert_eq!(sent.len(), 1);
        assert_eq!(*sent[0], ReviewResponse::cancelled_without_batch());
        assert_eq!(effects.first(), Some(&Effect::StopTimer));
        assert_eq!(effects.last(), Some(&Effect::ShowWaiting));
        assert!(controller.is_visible());
        assert!(controller.handle(ReviewEvent::Confirm).is_empty());
    }

    #[test]
    fn cancel_while_hidden_sends_nothing() {
        let mut controller = ReviewController::new();
        assert_eq!(
            controller.handle(ReviewEvent::Cancel),
            vec![Effect::StopTimer]
        );
    }

    #[test]
    fn close_request_cancels_and_closes_even_when_pinned() {
        let mut controller = shown("a", 2);
        controller.handle(ReviewEvent::TogglePin);
        let effects = controller.handle(ReviewEvent::CloseRequested);
        assert!(submitted(&effects)[0].cancelled);
        assert_eq!(effects.last(), Some(&Effect::CloseDialog));
        assert!(!controller.is_visible());
        assert!(controller.pinned);
    }

    #[test]
    fn close_request_while_waiting_sends_response_without_ids() {
        let mut controller = shown("a", 1);
        controller.handle(ReviewEvent::TogglePin);
        controller.handle(ReviewEvent::Cancel);

        let effects = controller.handle(ReviewEvent::CloseRequested);
        assert_eq!(
            submitted(&effects),
            vec![&ReviewResponse::cancelled_without_batch()]
        );
        assert_eq!(effects.last(), Some(&Effect::CloseDialog));
        assert!(submitted(&controller.handle(ReviewEvent::CloseRequested)).is_empty());
    }

    #[test]
    fn same_id_after_close_is_shown_again() {
        let mut controller = shown("a", 2);
        controller.handle(ReviewEvent::Cancel);
        let effects = controller.handle(ReviewEvent::Show(batch("a", 2, 60)));
        assert!(effects.contains(&Effect::OpenDialog));
    }

    #[test]
    fn view_reflects_selection() {
        let mut controller = shown("a", 4);
        controller.handle(ReviewEvent::Toggle(1));
        controller.handle(ReviewEvent::Toggle(9));
        let view = controller.view();
        assert_eq!(view.selection_info, "Selected: 1 of 4");
        assert_eq!(view.confirm_label, "Confirm (1 selected)");
        assert!(view.confirm_enabled);
        assert_eq!(view.title, "NF Preview Selector");
    }
}

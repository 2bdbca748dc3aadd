//! Cooperative scheduling for deferred view work.
//!
//! Nothing here runs on its own. The host drives the view from its event
//! loop and asks the scheduler which deferred tasks are due; the scheduler
//! only tracks deadlines, render tokens and scroll activity.

use std::time::Duration;

use web_time::Instant;

use crate::config::ViewConfig;

/// Identifies one scheduled or in-flight render. Only the newest token is
/// current; anything older resolves to a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RenderToken(u64);

#[derive(Debug)]
pub struct Scheduler {
    /// Content generation: file loads and other async renders.
    token: u64,
    /// Frame renders, tracked separately so typing never invalidates a load.
    frame: u64,
    render_due: Option<(Instant, RenderToken)>,
    reclassify_due: Option<Instant>,
    settings_due: Option<Instant>,
    last_scroll: Option<Instant>,
    settle: Duration,
    jump_lines: usize,
    reclassify_delay: Duration,
    settings_debounce: Duration,
}

impl Scheduler {
    pub fn new(config: &ViewConfig) -> Self {
        Self {
            token: 0,
            frame: 0,
            render_due: None,
            reclassify_due: None,
            settings_due: None,
            last_scroll: None,
            settle: config.scroll_settle(),
            jump_lines: config.scroll_jump_lines,
            reclassify_delay: config.reclassify_delay(),
            settings_debounce: config.settings_debounce(),
        }
    }

    /// Pick up new thresholds without dropping pending work.
    pub fn reconfigure(&mut self, config: &ViewConfig) {
        self.settle = config.scroll_settle();
        self.jump_lines = config.scroll_jump_lines;
        self.reclassify_delay = config.reclassify_delay();
        self.settings_debounce = config.settings_debounce();
    }

    /// Start a new content generation, invalidating every older token.
    pub fn issue_token(&mut self) -> RenderToken {
        self.token += 1;
        RenderToken(self.token)
    }

    pub fn is_current(&self, token: RenderToken) -> bool {
        token.0 == self.token
    }

    /// Schedule a render for the next frame, or for `now` when `immediate`.
    /// Replaces any render already pending.
    pub fn schedule_render(&mut self, now: Instant, immediate: bool) -> RenderToken {
        self.frame += 1;
        let token = RenderToken(self.frame);
        let due = if immediate {
            now
        } else {
            now + Duration::from_millis(16)
        };
        if let Some((_, old)) = self.render_due.replace((due, token)) {
            tracing::trace!(target: "tategaki::view", superseded = old.0, token = token.0, "render rescheduled");
        }
        token
    }

    pub fn cancel_render(&mut self) {
        self.render_due = None;
    }

    /// The pending render, if due and still current.
    pub fn take_due_render(&mut self, now: Instant) -> Option<RenderToken> {
        match self.render_due {
            Some((due, token)) if due <= now => {
                self.render_due = None;
                (token.0 == self.frame).then_some(token)
            }
            _ => None,
        }
    }

    /// Restart the reclassification timer.
    pub fn schedule_reclassify(&mut self, now: Instant) {
        self.reclassify_due = Some(now + self.reclassify_delay);
    }

    pub fn has_pending_reclassify(&self) -> bool {
        self.reclassify_due.is_some()
    }

    /// Whether the deferred reclassification should run now. Held back while
    /// the user is scrolling.
    pub fn take_due_reclassify(&mut self, now: Instant) -> bool {
        match self.reclassify_due {
            Some(due) if due <= now && !self.is_scrolling(now) => {
                self.reclassify_due = None;
                true
            }
            _ => false,
        }
    }

    /// Debounce a full render after a settings change.
    pub fn schedule_settings_render(&mut self, now: Instant) {
        self.settings_due = Some(now + self.settings_debounce);
    }

    pub fn take_due_settings_render(&mut self, now: Instant) -> bool {
        match self.settings_due {
            Some(due) if due <= now => {
                self.settings_due = None;
                true
            }
            _ => false,
        }
    }

    /// Record a scroll event. Returns true when it moved far enough to count
    /// as a jump (no overscan for the new window).
    pub fn note_scroll(&mut self, now: Instant, lines_moved: usize) -> bool {
        self.last_scroll = Some(now);
        lines_moved >= self.jump_lines
    }

    pub fn is_scrolling(&self, now: Instant) -> bool {
        self.last_scroll
            .is_some_and(|t| now.saturating_duration_since(t) < self.settle)
    }

    /// Earliest instant at which some deferred task becomes due.
    pub fn next_deadline(&self) -> Option<Instant> {
        let settle = self.last_scroll.map(|t| t + self.settle);
        [
            self.render_due.map(|(due, _)| due),
            self.reclassify_due,
            self.settings_due,
            settle.filter(|_| self.reclassify_due.is_some()),
        ]
        .into_iter()
        .flatten()
        .min()
    }
}

//! Cyclic navigation over the exercise catalog.
//!
//! The navigator owns the per-exercise session state: the active index, the
//! playback timer, and the unsaved draft. Moving to another exercise resets
//! the timer and clears the draft but keeps the play flag.

use crate::timer::{PlaybackTimer, TimerState};
use crate::{Catalog, Exercise};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct SessionNavigator {
    catalog: Arc<Catalog>,
    active_index: usize,
    timer: PlaybackTimer,
    draft: String,
}

impl SessionNavigator {
    /// Start at the first exercise, paused, with an empty draft
    pub fn new(catalog: Arc<Catalog>) -> Self {
        let timer = PlaybackTimer::new(catalog.get(0).duration_seconds);
        Self {
            catalog,
            active_index: 0,
            timer,
            draft: String::new(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn active_index(&self) -> usize {
        self.active_index
    }

    pub fn active_exercise(&self) -> &Exercise {
        self.catalog.get(self.active_index)
    }

    pub fn timer(&self) -> &PlaybackTimer {
        &self.timer
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Advance to the next exercise, wrapping to the first
    pub fn next(&mut self) -> usize {
        let len = self.catalog.len();
        self.go_to((self.active_index + 1) % len)
    }

    /// Step back to the previous exercise, wrapping to the last
    pub fn previous(&mut self) -> usize {
        let len = self.catalog.len();
        self.go_to((self.active_index + len - 1) % len)
    }

    pub fn toggle(&mut self) -> TimerState {
        self.timer.toggle()
    }

    /// Count one second on the active exercise's timer
    pub fn tick(&mut self) -> bool {
        self.timer.tick()
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Append a line of text to the draft
    pub fn append_draft(&mut self, text: &str) {
        if !self.draft.is_empty() {
            self.draft.push('\n');
        }
        self.draft.push_str(text);
    }

    pub fn clear_draft(&mut self) {
        self.draft.clear();
    }

    fn go_to(&mut self, index: usize) -> usize {
        self.active_index = index;
        let duration = self.catalog.get(index).duration_seconds;
        self.timer.reset(duration);
        self.draft.clear();
        tracing::debug!(
            index,
            title = %self.active_exercise().title,
            "Navigated to exercise"
        );
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_default_catalog;

    fn navigator() -> SessionNavigator {
        SessionNavigator::new(Arc::new(build_default_catalog()))
    }

    #[test]
    fn test_starts_at_first_exercise() {
        let nav = navigator();
        assert_eq!(nav.active_index(), 0);
        assert_eq!(nav.timer().remaining_seconds(), 600);
        assert!(!nav.timer().is_playing());
        assert!(nav.draft().is_empty());
    }

    #[test]
    fn test_next_three_times_returns_to_start() {
        let mut nav = navigator();
        nav.next();
        nav.next();
        nav.next();
        assert_eq!(nav.active_index(), 0);
    }

    #[test]
    fn test_previous_wraps_to_last() {
        let mut nav = navigator();
        assert_eq!(nav.previous(), 2);
        assert_eq!(nav.active_exercise().title, "Scene Construction");
        assert_eq!(nav.timer().remaining_seconds(), 1200);
    }

    #[test]
    fn test_index_follows_net_steps() {
        let mut nav = navigator();
        let len = nav.catalog().len() as i64;
        // Deterministic mixed walk
        let steps = [1, 1, -1, 1, -1, -1, -1, 1, 1, 1, 1, -1, 1];
        let mut net: i64 = 0;
        for step in steps {
            if step > 0 {
                nav.next();
            } else {
                nav.previous();
            }
            net += step;
            assert!(nav.active_index() < nav.catalog().len());
            assert_eq!(nav.active_index() as i64, net.rem_euclid(len));
        }
    }

    #[test]
    fn test_navigation_resets_timer_and_draft() {
        let mut nav = navigator();
        nav.toggle();
        nav.tick();
        nav.tick();
        nav.set_draft("Half-written thought");
        assert!(nav.timer().progress_percent() > 0.0);

        nav.next();

        assert_eq!(nav.timer().remaining_seconds(), 900);
        assert_eq!(nav.timer().progress_percent(), 0.0);
        assert!(nav.draft().is_empty());
    }

    #[test]
    fn test_navigation_keeps_play_state() {
        let mut nav = navigator();
        nav.toggle();
        nav.next();
        assert_eq!(nav.timer().state(), TimerState::Running);

        nav.toggle();
        nav.previous();
        assert_eq!(nav.timer().state(), TimerState::Idle);
    }

    #[test]
    fn test_navigation_leaves_exhausted_state() {
        let catalog = Catalog::new(vec![
            Exercise {
                title: "Blink".into(),
                description: "Very short.".into(),
                duration_seconds: 1,
                difficulty: crate::Difficulty::Beginner,
                prompts: vec![],
            },
            Exercise {
                title: "Breathe".into(),
                description: "A little longer.".into(),
                duration_seconds: 2,
                difficulty: crate::Difficulty::Beginner,
                prompts: vec![],
            },
        ])
        .unwrap();
        let mut nav = SessionNavigator::new(Arc::new(catalog));
        nav.toggle();
        nav.tick();
        assert_eq!(nav.timer().state(), TimerState::Exhausted);

        nav.next();
        assert_eq!(nav.timer().state(), TimerState::Running);
        assert_eq!(nav.timer().remaining_seconds(), 2);
    }

    #[test]
    fn test_append_draft_joins_lines() {
        let mut nav = navigator();
        nav.append_draft("Felt calm");
        nav.append_draft("and focused");
        assert_eq!(nav.draft(), "Felt calm\nand focused");
        nav.clear_draft();
        assert!(nav.draft().is_empty());
    }
}

//! Keeps history pointed at the chapter the reader is actually looking at.
//!
//! With several chapters appended, the newest one is not necessarily on
//! screen. The tracker picks the most visible chapter element and re-points
//! history when it changes.

use crate::controller::Controller;
use crate::fetch::ChapterSource;
use crate::surface::ReaderSurface;

pub const DEFAULT_VISIBILITY_THRESHOLD_PERCENT: f64 = 30.0;

/// A rendered chapter element, positioned relative to the viewport top.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterElement {
    pub url: String,
    pub title: String,
    pub top: f64,
    pub height: f64,
}

/// Share of the element on screen, relative to how much of it could fit.
pub fn visibility_percent(top: f64, height: f64, viewport_height: f64) -> f64 {
    let visible_top = top.max(0.0);
    let visible_bottom = (top + height).min(viewport_height);
    let visible = (visible_bottom - visible_top).max(0.0);
    let could_fit = height.min(viewport_height);
    if could_fit > 0.0 {
        visible / could_fit * 100.0
    } else {
        0.0
    }
}

/// Index of the most visible element, if it clears `threshold` percent.
pub fn most_visible(elements: &[ChapterElement], viewport_height: f64, threshold: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, element) in elements.iter().enumerate() {
        let visibility = visibility_percent(element.top, element.height, viewport_height);
        if best.is_none_or(|(_, max)| visibility > max) {
            best = Some((i, visibility));
        }
    }
    best.filter(|(_, visibility)| *visibility > threshold)
        .map(|(i, _)| i)
}

#[derive(Debug, Clone)]
pub struct ViewTracker {
    threshold: f64,
    current: Option<String>,
}

impl Default for ViewTracker {
    fn default() -> Self {
        Self::new(DEFAULT_VISIBILITY_THRESHOLD_PERCENT)
    }
}

impl ViewTracker {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            current: None,
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Returns the element history should now point at, if it changed.
    pub fn observe<'a>(
        &mut self,
        elements: &'a [ChapterElement],
        viewport_height: f64,
    ) -> Option<&'a ChapterElement> {
        let element = &elements[most_visible(elements, viewport_height, self.threshold)?];
        if self.current.as_deref() == Some(element.url.as_str()) {
            return None;
        }
        self.current = Some(element.url.clone());
        Some(element)
    }

    /// Observes and forwards any change to the controller's history.
    pub fn sync<S, D>(
        &mut self,
        controller: &Controller<S, D>,
        elements: &[ChapterElement],
        viewport_height: f64,
    ) -> bool
    where
        S: ChapterSource,
        D: ReaderSurface,
    {
        match self.observe(elements, viewport_height) {
            Some(element) => {
                controller.update_history(&element.url, &element.title);
                true
            }
            None => false,
        }
    }
}

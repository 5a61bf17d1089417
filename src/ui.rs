//! Read-only views of the questionnaire UI that the capture pipeline
//! consults on every tick. The UI owns these values; the pipeline never
//! writes them.

use std::sync::{Arc, RwLock};

use crate::models::Viewport;

/// Identifier of the question currently on screen.
pub trait QuestionSource: Send + Sync {
    fn current_question_id(&self) -> Option<String>;
}

/// Shared cell the UI updates when it changes question.
#[derive(Debug, Clone, Default)]
pub struct ActiveQuestion {
    inner: Arc<RwLock<Option<String>>>,
}

impl ActiveQuestion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, question_id: Option<String>) {
        match self.inner.write() {
            Ok(mut guard) => *guard = question_id,
            Err(poisoned) => *poisoned.into_inner() = question_id,
        }
    }
}

impl QuestionSource for ActiveQuestion {
    fn current_question_id(&self) -> Option<String> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Current viewport geometry, updated by the UI on resize and scroll.
#[derive(Debug, Clone, Default)]
pub struct SharedViewport {
    inner: Arc<RwLock<Viewport>>,
}

impl SharedViewport {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            inner: Arc::new(RwLock::new(viewport)),
        }
    }

    pub fn get(&self) -> Viewport {
        match self.inner.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn set(&self, viewport: Viewport) {
        match self.inner.write() {
            Ok(mut guard) => *guard = viewport,
            Err(poisoned) => *poisoned.into_inner() = viewport,
        }
    }

    pub fn set_scroll(&self, scroll_x: f64, scroll_y: f64) {
        let mut viewport = self.get();
        viewport.scroll_x = scroll_x;
        viewport.scroll_y = scroll_y;
        self.set(viewport);
    }
}

use serde::Serialize;

use super::state::{PhotoRef, Session};
use super::SessionError;
use crate::models::{Category, Step, STEPS};

/// Where a session stands in the intake sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StepView {
    Active {
        index: usize,
        category: Category,
        prompt: &'static str,
    },
    Complete,
}

/// Slot the next photo of the current step will occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhotoSlot {
    pub category: Category,
    pub sequence: u32,
}

/// Drives a session through a fixed list of steps.
#[derive(Debug, Clone, Copy)]
pub struct StepSequencer {
    steps: &'static [Step],
}

impl Default for StepSequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl StepSequencer {
    pub const fn new() -> Self {
        Self { steps: &STEPS }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn first_step(&self) -> StepView {
        self.view(0)
    }

    fn view(&self, index: usize) -> StepView {
        match self.steps.get(index) {
            Some(step) => StepView::Active {
                index,
                category: step.category,
                prompt: step.prompt,
            },
            None => StepView::Complete,
        }
    }

    pub fn current_step(&self, session: &Session) -> StepView {
        self.view(session.step_index())
    }

    /// True when `session` is on the last step.
    pub fn is_last_step(&self, session: &Session) -> bool {
        session.step_index() + 1 == self.steps.len()
    }

    pub fn next_photo_slot(&self, session: &Session) -> Result<PhotoSlot, SessionError> {
        match self.current_step(session) {
            StepView::Active { category, .. } => Ok(PhotoSlot {
                category,
                sequence: session.photo_count(category) as u32 + 1,
            }),
            StepView::Complete => Err(SessionError::AllStepsCompleted),
        }
    }

    /// Record a stored photo under the current step. Returns the step's new photo count.
    pub fn append_photo(
        &self,
        session: &mut Session,
        storage_key: String,
    ) -> Result<usize, SessionError> {
        let slot = self.next_photo_slot(session)?;
        Ok(session.push_photo(PhotoRef {
            category: slot.category,
            sequence: slot.sequence,
            storage_key,
        }))
    }

    /// Move to the next step whether or not photos were given.
    pub fn advance(&self, session: &mut Session) -> StepView {
        if session.step_index < self.steps.len() {
            session.step_index += 1;
        }
        self.current_step(session)
    }
}

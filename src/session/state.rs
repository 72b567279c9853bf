use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::models::{Category, ExtractedFields, SessionPhase};

/// Opaque identifier of the chat or client driving a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ClientId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A stored photo. `sequence` starts at 1 within its category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhotoRef {
    pub category: Category,
    pub sequence: u32,
    pub storage_key: String,
}

/// Intake state of one client.
#[derive(Debug, Clone)]
pub struct Session {
    id: ClientId,
    storage_scope: String,
    pub(super) step_index: usize,
    photos: BTreeMap<Category, Vec<PhotoRef>>,
    fields: ExtractedFields,
    phase: SessionPhase,
    last_activity: Instant,
}

impl Session {
    pub fn new(id: ClientId, storage_scope: impl Into<String>) -> Self {
        Self {
            id,
            storage_scope: storage_scope.into(),
            step_index: 0,
            photos: BTreeMap::new(),
            fields: ExtractedFields::default(),
            phase: SessionPhase::Collecting,
            last_activity: Instant::now(),
        }
    }

    pub fn id(&self) -> &ClientId {
        &self.id
    }

    /// Namespace under which this session's photos are stored. Unique per
    /// session, so a restarted client never shares photos with its old session.
    pub fn storage_scope(&self) -> &str {
        &self.storage_scope
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn photos(&self, category: Category) -> &[PhotoRef] {
        self.photos.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn photo_count(&self, category: Category) -> usize {
        self.photos(category).len()
    }

    pub fn total_photos(&self) -> usize {
        self.photos.values().map(Vec::len).sum()
    }

    pub(super) fn push_photo(&mut self, photo: PhotoRef) -> usize {
        let list = self.photos.entry(photo.category).or_default();
        list.push(photo);
        list.len()
    }

    pub fn fields(&self) -> &ExtractedFields {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut ExtractedFields {
        &mut self.fields
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: SessionPhase) {
        self.phase = phase;
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    #[cfg(test)]
    pub(crate) fn backdate(&mut self, by: Duration) {
        if let Some(earlier) = self.last_activity.checked_sub(by) {
            self.last_activity = earlier;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_collecting_at_first_step() {
        let session = Session::new("chat-1".into(), "chat-1-abc");
        assert_eq!(session.step_index(), 0);
        assert_eq!(session.phase(), SessionPhase::Collecting);
        assert_eq!(session.total_photos(), 0);
        assert!(session.photos(Category::Facade).is_empty());
        assert_eq!(session.storage_scope(), "chat-1-abc");
    }

    #[test]
    fn photos_grouped_by_category() {
        let mut session = Session::new("chat-1".into(), "scope");
        let count = session.push_photo(PhotoRef {
            category: Category::Roof,
            sequence: 1,
            storage_key: "a".into(),
        });
        assert_eq!(count, 1);
        assert_eq!(session.photo_count(Category::Roof), 1);
        assert_eq!(session.photo_count(Category::Walls), 0);
    }

    #[test]
    fn client_id_serializes_as_plain_string() {
        let id = ClientId::new("42");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"42\"");
        assert_eq!(id.to_string(), "42");
    }
}

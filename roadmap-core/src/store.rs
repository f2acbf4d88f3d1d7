//! In-memory epic collection for one product.
//!
//! The collection is an immutable snapshot swapped wholesale on every
//! mutation, so readers holding an older `Arc` never observe a partial edit.
//! Layout and aggregation code takes a snapshot as a plain slice.

use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::import::group_into_epics;
use crate::models::{Epic, Module, Priority, Quarter, RoadmapItem, StoryStatus, UserStory};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Epic not found: {0}")]
    EpicNotFound(Uuid),

    #[error("Story {story} not found in epic {epic}")]
    StoryNotFound { epic: Uuid, story: Uuid },
}

/// Field changes for an epic; `None` leaves a field alone.
///
/// Optional epic fields take `Some(None)` to clear them.
#[derive(Debug, Clone, Default)]
pub struct EpicPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub quarter: Option<Quarter>,
    pub sprint: Option<String>,
    pub customer: Option<Option<String>>,
    pub start_date: Option<Option<String>>,
    pub end_date: Option<Option<String>>,
    pub module: Option<Option<Module>>,
    pub dependencies: Option<Option<Vec<Uuid>>>,
}

impl EpicPatch {
    fn apply(self, epic: &mut Epic) {
        if let Some(v) = self.title {
            epic.title = v;
        }
        if let Some(v) = self.description {
            epic.description = v;
        }
        if let Some(v) = self.quarter {
            epic.quarter = v;
        }
        if let Some(v) = self.sprint {
            epic.sprint = v;
        }
        if let Some(v) = self.customer {
            epic.customer = v;
        }
        if let Some(v) = self.start_date {
            epic.start_date = v;
        }
        if let Some(v) = self.end_date {
            epic.end_date = v;
        }
        if let Some(v) = self.module {
            epic.module = v;
        }
        if let Some(v) = self.dependencies {
            epic.dependencies = v;
        }
    }
}

/// Field changes for a story; `None` leaves a field alone
#[derive(Debug, Clone, Default)]
pub struct StoryPatch {
    pub title: Option<String>,
    pub as_a: Option<String>,
    pub i_want: Option<String>,
    pub so_that: Option<String>,
    pub acceptance_criteria: Option<Vec<String>>,
    pub story_points: Option<u32>,
    pub priority: Option<Priority>,
    pub definition_of_done: Option<Vec<String>>,
    pub status: Option<StoryStatus>,
    pub tags: Option<Vec<String>>,
}

impl StoryPatch {
    pub fn status(status: StoryStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    fn apply(self, story: &mut UserStory) {
        if let Some(v) = self.title {
            story.title = v;
        }
        if let Some(v) = self.as_a {
            story.as_a = v;
        }
        if let Some(v) = self.i_want {
            story.i_want = v;
        }
        if let Some(v) = self.so_that {
            story.so_that = v;
        }
        if let Some(v) = self.acceptance_criteria {
            story.acceptance_criteria = v;
        }
        if let Some(v) = self.story_points {
            story.story_points = v;
        }
        if let Some(v) = self.priority {
            story.priority = v;
        }
        if let Some(v) = self.definition_of_done {
            story.definition_of_done = v;
        }
        if let Some(v) = self.status {
            story.status = v;
        }
        if let Some(v) = self.tags {
            story.tags = v;
        }
    }
}

type Listener = Box<dyn Fn(&[Epic])>;

/// Handle returned by [`EpicStore::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(usize);

pub struct EpicStore {
    product_id: String,
    epics: Arc<Vec<Epic>>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: usize,
}

impl fmt::Debug for EpicStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EpicStore")
            .field("product_id", &self.product_id)
            .field("epics", &self.epics.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl EpicStore {
    pub fn new(product_id: impl Into<String>) -> Self {
        Self::with_epics(product_id, Vec::new())
    }

    pub fn with_epics(product_id: impl Into<String>, epics: Vec<Epic>) -> Self {
        Self {
            product_id: product_id.into(),
            epics: Arc::new(epics),
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    /// Current collection; stays valid and unchanged after later mutations
    pub fn snapshot(&self) -> Arc<Vec<Epic>> {
        Arc::clone(&self.epics)
    }

    pub fn epics(&self) -> &[Epic] {
        &self.epics
    }

    pub fn get(&self, id: Uuid) -> Option<&Epic> {
        self.epics.iter().find(|e| e.id == id)
    }

    /// Calls `listener` with the new collection after every mutation
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: Fn(&[Epic]) + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.listeners.retain(|(sid, _)| *sid != id);
    }

    fn commit(&mut self, epics: Vec<Epic>) {
        self.epics = Arc::new(epics);
        for (_, listener) in &self.listeners {
            listener(&self.epics);
        }
    }

    fn edit_epic<F>(&mut self, id: Uuid, edit: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Epic) -> Result<(), StoreError>,
    {
        let mut epics = self.epics.as_ref().clone();
        let epic = epics
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(StoreError::EpicNotFound(id))?;
        edit(epic)?;
        epic.updated_at = Utc::now();
        self.commit(epics);
        Ok(())
    }

    /// Replaces the whole collection
    pub fn set_epics(&mut self, epics: Vec<Epic>) {
        debug!(product = %self.product_id, count = epics.len(), "replacing epics");
        self.commit(epics);
    }

    /// Appends an epic under this store's product
    pub fn add_epic(&mut self, mut epic: Epic) -> Uuid {
        epic.product_id = self.product_id.clone();
        let id = epic.id;
        let mut epics = self.epics.as_ref().clone();
        epics.push(epic);
        info!(product = %self.product_id, epic = %id, "added epic");
        self.commit(epics);
        id
    }

    pub fn update_epic(&mut self, id: Uuid, patch: EpicPatch) -> Result<(), StoreError> {
        self.edit_epic(id, |epic| {
            patch.apply(epic);
            Ok(())
        })?;
        debug!(epic = %id, "updated epic");
        Ok(())
    }

    /// Removes an epic together with its stories
    pub fn delete_epic(&mut self, id: Uuid) -> Result<Epic, StoreError> {
        let mut epics = self.epics.as_ref().clone();
        let index = epics
            .iter()
            .position(|e| e.id == id)
            .ok_or(StoreError::EpicNotFound(id))?;
        let removed = epics.remove(index);
        info!(epic = %id, stories = removed.stories.len(), "deleted epic");
        self.commit(epics);
        Ok(removed)
    }

    /// Appends a story to an epic, re-parenting it if needed
    pub fn add_story(&mut self, epic_id: Uuid, story: UserStory) -> Result<Uuid, StoreError> {
        let story_id = story.id;
        self.add_stories(epic_id, vec![story])?;
        Ok(story_id)
    }

    pub fn add_stories(&mut self, epic_id: Uuid, stories: Vec<UserStory>) -> Result<(), StoreError> {
        let count = stories.len();
        self.edit_epic(epic_id, |epic| {
            for mut story in stories {
                story.epic_id = epic_id;
                epic.stories.push(story);
            }
            Ok(())
        })?;
        debug!(epic = %epic_id, count, "added stories");
        Ok(())
    }

    pub fn update_story(
        &mut self,
        epic_id: Uuid,
        story_id: Uuid,
        patch: StoryPatch,
    ) -> Result<(), StoreError> {
        self.edit_epic(epic_id, |epic| {
            let story = epic
                .stories
                .iter_mut()
                .find(|s| s.id == story_id)
                .ok_or(StoreError::StoryNotFound { epic: epic_id, story: story_id })?;
            patch.apply(story);
            story.updated_at = Utc::now();
            Ok(())
        })
    }

    pub fn delete_story(&mut self, epic_id: Uuid, story_id: Uuid) -> Result<UserStory, StoreError> {
        let mut removed = None;
        self.edit_epic(epic_id, |epic| {
            let index = epic
                .stories
                .iter()
                .position(|s| s.id == story_id)
                .ok_or(StoreError::StoryNotFound { epic: epic_id, story: story_id })?;
            removed = Some(epic.stories.remove(index));
            Ok(())
        })?;
        removed.ok_or(StoreError::StoryNotFound { epic: epic_id, story: story_id })
    }

    /// Groups imported rows into new epics appended after the existing ones.
    /// Returns the number of epics created.
    pub fn import_items(&mut self, items: &[RoadmapItem]) -> usize {
        let new_epics = group_into_epics(items, &self.product_id, Utc::now());
        let created = new_epics.len();
        let mut epics = self.epics.as_ref().clone();
        epics.extend(new_epics);
        info!(product = %self.product_id, items = items.len(), epics = created, "imported roadmap items");
        self.commit(epics);
        created
    }

    pub fn clear(&mut self) {
        info!(product = %self.product_id, "cleared epics");
        self.commit(Vec::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn store_with_epic() -> (EpicStore, Uuid) {
        let mut store = EpicStore::new("horizon");
        let id = store.add_epic(Epic::new("other", "Risk Engine".into(), Quarter::Q2));
        (store, id)
    }

    #[test]
    fn test_add_epic_takes_store_product() {
        let (store, id) = store_with_epic();
        assert_eq!(store.get(id).map(|e| e.product_id.as_str()), Some("horizon"));
    }

    #[test]
    fn test_snapshots_are_copy_on_write() {
        let (mut store, id) = store_with_epic();
        let before = store.snapshot();
        store
            .update_epic(id, EpicPatch { title: Some("Renamed".into()), ..Default::default() })
            .unwrap();

        assert_eq!(before[0].title, "Risk Engine");
        assert_eq!(store.get(id).map(|e| e.title.as_str()), Some("Renamed"));
    }

    #[test]
    fn test_update_bumps_updated_at() {
        let (mut store, id) = store_with_epic();
        let created = store.get(id).unwrap().updated_at;
        store
            .update_epic(
                id,
                EpicPatch {
                    customer: Some(Some("Acme".into())),
                    start_date: Some(Some("2026-04-01".into())),
                    ..Default::default()
                },
            )
            .unwrap();
        let epic = store.get(id).unwrap();
        assert!(epic.updated_at >= created);
        assert_eq!(epic.customer.as_deref(), Some("Acme"));

        store
            .update_epic(id, EpicPatch { customer: Some(None), ..Default::default() })
            .unwrap();
        assert_eq!(store.get(id).unwrap().customer, None);
        assert_eq!(store.get(id).unwrap().start_date.as_deref(), Some("2026-04-01"));
    }

    #[test]
    fn test_unknown_ids() {
        let (mut store, id) = store_with_epic();
        let missing = Uuid::new_v4();
        assert_eq!(
            store.update_epic(missing, EpicPatch::default()),
            Err(StoreError::EpicNotFound(missing))
        );
        assert!(matches!(
            store.update_story(id, missing, StoryPatch::default()),
            Err(StoreError::StoryNotFound { .. })
        ));
        assert!(store.delete_epic(missing).is_err());
    }

    #[test]
    fn test_story_lifecycle() {
        let (mut store, id) = store_with_epic();
        let story_id = store
            .add_story(id, UserStory::new(Uuid::new_v4(), "Calibrate".into()))
            .unwrap();

        let epic = store.get(id).unwrap();
        assert_eq!(epic.stories[0].epic_id, id);

        store
            .update_story(id, story_id, StoryPatch::status(StoryStatus::Done))
            .unwrap();
        assert_eq!(store.get(id).unwrap().stories[0].status, StoryStatus::Done);

        let removed = store.delete_story(id, story_id).unwrap();
        assert_eq!(removed.title, "Calibrate");
        assert!(store.get(id).unwrap().stories.is_empty());
    }

    #[test]
    fn test_delete_epic_cascades() {
        let (mut store, id) = store_with_epic();
        store
            .add_stories(
                id,
                vec![
                    UserStory::new(id, "a".into()),
                    UserStory::new(id, "b".into()),
                ],
            )
            .unwrap();
        let removed = store.delete_epic(id).unwrap();
        assert_eq!(removed.stories.len(), 2);
        assert!(store.epics().is_empty());
    }

    #[test]
    fn test_subscribers_see_every_mutation() {
        let (mut store, id) = store_with_epic();
        let calls = Rc::new(Cell::new(0));
        let last_len = Rc::new(Cell::new(usize::MAX));

        let sub = {
            let calls = Rc::clone(&calls);
            let last_len = Rc::clone(&last_len);
            store.subscribe(move |epics| {
                calls.set(calls.get() + 1);
                last_len.set(epics.len());
            })
        };

        store.add_epic(Epic::new("horizon", "Second".into(), Quarter::Q3));
        store.delete_epic(id).unwrap();
        store.clear();
        assert_eq!(calls.get(), 3);
        assert_eq!(last_len.get(), 0);

        store.unsubscribe(sub);
        store.add_epic(Epic::new("horizon", "Third".into(), Quarter::Q3));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_import_appends_grouped_epics() {
        let (mut store, _) = store_with_epic();
        let item = |epic: &str, feature: &str| RoadmapItem {
            epic: epic.into(),
            sprint: "S1".into(),
            quarter: Quarter::Q3,
            feature: feature.into(),
            description: "d".into(),
            customer: None,
            start_date: None,
            end_date: None,
            module: None,
        };
        let created = store.import_items(&[item("Ledger", "a"), item("Ledger", "b"), item("Alerts", "c")]);
        assert_eq!(created, 2);
        assert_eq!(store.epics().len(), 3);
        assert_eq!(store.epics()[1].title, "Ledger");
        assert_eq!(store.epics()[1].product_id, "horizon");
    }
}

//! Seams to the language model and sequential batch drafting.

use tracing::{info, warn};
use uuid::Uuid;

use crate::ai::client::AiError;
use crate::ai::prompts::GenerationRequest;
use crate::ai::responses::GeneratedStory;
use crate::ai::stream::ChatMessage;
use crate::models::{Epic, UserStory};
use crate::store::{EpicStore, StoreError};

/// Drafts user stories for one epic
pub trait StoryGenerator {
    fn generate(&self, request: &GenerationRequest) -> Result<Vec<GeneratedStory>, AiError>;
}

/// Answers product questions with a streamed reply
pub trait ChatAssistant {
    /// Streams the reply to `messages`, calling `on_delta` with each text
    /// fragment in arrival order.
    fn stream_reply(
        &self,
        messages: &[ChatMessage],
        product_context: &str,
        on_delta: &mut dyn FnMut(&str),
    ) -> Result<(), AiError>;
}

/// Stories drafted for one epic
#[derive(Debug, Clone)]
pub struct EpicDraft {
    pub epic_id: Uuid,
    pub epic_title: String,
    pub stories: Vec<UserStory>,
}

/// Result of a batch run. Drafts for epics processed before a failure are kept.
#[derive(Debug)]
pub struct BatchOutcome {
    pub drafts: Vec<EpicDraft>,
    /// The error that stopped the batch and the epic it happened on
    pub halted: Option<(Uuid, AiError)>,
}

impl BatchOutcome {
    pub fn story_count(&self) -> usize {
        self.drafts.iter().map(|d| d.stories.len()).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.halted.is_none()
    }

    /// Adds every drafted story to its epic in the store; returns how many were saved.
    ///
    /// Nothing is saved when any draft's epic is no longer in the store.
    pub fn save_into(&self, store: &mut EpicStore) -> Result<usize, StoreError> {
        if let Some(missing) = self.drafts.iter().find(|d| store.get(d.epic_id).is_none()) {
            return Err(StoreError::EpicNotFound(missing.epic_id));
        }
        let mut saved = 0;
        for draft in &self.drafts {
            store.add_stories(draft.epic_id, draft.stories.clone())?;
            saved += draft.stories.len();
        }
        Ok(saved)
    }
}

/// Epics that have no stories yet, the default candidates for drafting
pub fn epics_without_stories(epics: &[Epic]) -> Vec<&Epic> {
    epics.iter().filter(|e| e.stories.is_empty()).collect()
}

/// The epics named by `ids`, in collection order
pub fn select_epics<'a>(epics: &'a [Epic], ids: &[Uuid]) -> Vec<&'a Epic> {
    epics.iter().filter(|e| ids.contains(&e.id)).collect()
}

/// Drafts stories for each epic in turn.
///
/// `on_progress` receives the completed fraction: `(i + 0.5) / n` when epic
/// `i` is sent and `(i + 1) / n` once its drafts are in. The first error stops
/// the batch; later epics are not attempted and nothing is retried.
pub fn generate_batch<G, P>(
    generator: &G,
    epics: &[&Epic],
    custom_prompt: Option<&str>,
    mut on_progress: P,
) -> BatchOutcome
where
    G: StoryGenerator + ?Sized,
    P: FnMut(f64, &Epic),
{
    let total = epics.len() as f64;
    let mut drafts = Vec::new();

    for (i, &epic) in epics.iter().enumerate() {
        on_progress((i as f64 + 0.5) / total, epic);

        let request = GenerationRequest::new(epic, custom_prompt);
        match generator.generate(&request) {
            Ok(generated) => {
                let stories = generated
                    .into_iter()
                    .map(|g| g.into_user_story(epic.id))
                    .collect();
                drafts.push(EpicDraft {
                    epic_id: epic.id,
                    epic_title: epic.title.clone(),
                    stories,
                });
                on_progress((i as f64 + 1.0) / total, epic);
            }
            Err(e) => {
                warn!(epic = %epic.title, error = %e, "story drafting halted");
                return BatchOutcome {
                    drafts,
                    halted: Some((epic.id, e)),
                };
            }
        }
    }

    info!(epics = drafts.len(), "story drafting finished");
    BatchOutcome { drafts, halted: None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Quarter;
    use std::cell::RefCell;

    /// Returns two drafts per epic, failing on the titles listed in `fail_on`
    struct ScriptedGenerator {
        fail_on: Vec<&'static str>,
        calls: RefCell<Vec<String>>,
    }

    impl ScriptedGenerator {
        fn new(fail_on: Vec<&'static str>) -> Self {
            Self { fail_on, calls: RefCell::new(Vec::new()) }
        }
    }

    impl StoryGenerator for ScriptedGenerator {
        fn generate(&self, request: &GenerationRequest) -> Result<Vec<GeneratedStory>, AiError> {
            self.calls.borrow_mut().push(request.epic.title.clone());
            if self.fail_on.contains(&request.epic.title.as_str()) {
                return Err(AiError::RateLimited);
            }
            let draft = |title: &str| GeneratedStory {
                title: title.to_string(),
                as_a: "analyst".into(),
                i_want: "x".into(),
                so_that: "y".into(),
                acceptance_criteria: vec![],
                story_points: None,
                priority: None,
                definition_of_done: vec![],
                tags: vec![],
            };
            Ok(vec![draft("one"), draft("two")])
        }
    }

    fn epics(titles: &[&str]) -> Vec<Epic> {
        titles
            .iter()
            .map(|t| Epic::new("horizon", t.to_string(), Quarter::Q1))
            .collect()
    }

    #[test]
    fn test_batch_reports_progress() {
        let all = epics(&["A", "B"]);
        let targets: Vec<&Epic> = all.iter().collect();
        let generator = ScriptedGenerator::new(vec![]);
        let mut progress = Vec::new();

        let outcome = generate_batch(&generator, &targets, None, |p, _| progress.push(p));

        assert!(outcome.is_complete());
        assert_eq!(outcome.story_count(), 4);
        assert_eq!(progress, vec![0.25, 0.5, 0.75, 1.0]);
        assert_eq!(outcome.drafts[1].stories[0].epic_id, all[1].id);
    }

    #[test]
    fn test_batch_halts_on_first_error_and_keeps_earlier_drafts() {
        let all = epics(&["A", "B", "C"]);
        let targets: Vec<&Epic> = all.iter().collect();
        let generator = ScriptedGenerator::new(vec!["B"]);

        let outcome = generate_batch(&generator, &targets, Some("focus"), |_, _| {});

        assert_eq!(*generator.calls.borrow(), vec!["A".to_string(), "B".to_string()]);
        assert_eq!(outcome.drafts.len(), 1);
        assert_eq!(outcome.drafts[0].epic_title, "A");
        let (failed, error) = outcome.halted.as_ref().unwrap();
        assert_eq!(*failed, all[1].id);
        assert!(matches!(error, AiError::RateLimited));
    }

    #[test]
    fn test_empty_batch() {
        let generator = ScriptedGenerator::new(vec![]);
        let outcome = generate_batch(&generator, &[], None, |_, _| panic!("no progress expected"));
        assert!(outcome.is_complete());
        assert_eq!(outcome.story_count(), 0);
    }

    #[test]
    fn test_selection_helpers() {
        let mut all = epics(&["A", "B", "C"]);
        let first_id = all[0].id;
        all[0].stories.push(UserStory::new(first_id, "s".into()));
        let ids = vec![all[2].id, all[0].id];

        let without: Vec<&str> = epics_without_stories(&all).iter().map(|e| e.title.as_str()).collect();
        assert_eq!(without, vec!["B", "C"]);

        let chosen: Vec<&str> = select_epics(&all, &ids).iter().map(|e| e.title.as_str()).collect();
        assert_eq!(chosen, vec!["A", "C"]);
    }

    #[test]
    fn test_save_into_store() {
        let all = epics(&["A"]);
        let mut store = EpicStore::with_epics("horizon", all.clone());
        let targets: Vec<&Epic> = all.iter().collect();
        let outcome = generate_batch(&ScriptedGenerator::new(vec![]), &targets, None, |_, _| {});

        assert_eq!(outcome.save_into(&mut store).unwrap(), 2);
        assert_eq!(store.get(all[0].id).unwrap().stories.len(), 2);
    }

    #[test]
    fn test_save_into_missing_epic_saves_nothing() {
        let all = epics(&["A", "B"]);
        let mut store = EpicStore::with_epics("horizon", vec![all[0].clone()]);
        let targets: Vec<&Epic> = all.iter().collect();
        let outcome = generate_batch(&ScriptedGenerator::new(vec![]), &targets, None, |_, _| {});

        let err = outcome.save_into(&mut store).unwrap_err();
        assert!(matches!(err, StoreError::EpicNotFound(id) if id == all[1].id));
        assert!(store.get(all[0].id).unwrap().stories.is_empty());
    }
}

//! The suggest input widget core.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, trace};
use treebind_core::{ChangeListener, Debouncer, FireReport, ListenerKey, Readiness, TimerId, Workspace};
use treebind_xml::Path;

use crate::candidate::{Candidate, CandidateSource};
use crate::config::SuggestConfig;
use crate::error::SuggestError;
use crate::matcher::{SuggestMatcher, Suggestion};
use crate::query::Query;

struct SuggestInner {
    config: SuggestConfig,
    source: CandidateSource,
    target: Path,
    target_caption: Option<Path>,
    matcher: SuggestMatcher,
    candidates: Vec<Candidate>,
    text: String,
    suggestions: Vec<Suggestion>,
    open: bool,
    debouncer: Debouncer,
    keys: Vec<ListenerKey>,
}

/// Shared handle; clones refer to the same widget.
#[derive(Clone)]
pub struct SuggestInput {
    inner: Rc<RefCell<SuggestInner>>,
}

impl std::fmt::Debug for SuggestInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("SuggestInput")
            .field("id", &inner.config.id)
            .field("text", &inner.text)
            .field("candidates", &inner.candidates.len())
            .field("suggestions", &inner.suggestions.len())
            .finish()
    }
}

impl SuggestInput {
    /// Create the widget: anchor, options listener and target listener.
    /// Candidates and text are loaded once both models are ready.
    pub fn create(ws: &mut Workspace, config: SuggestConfig) -> Result<Self, SuggestError> {
        let source = config.source()?;
        let target = config.target()?;
        let target_caption = config.target_caption()?;
        ws.attach_anchor(&config.id);

        let input = Self {
            inner: Rc::new(RefCell::new(SuggestInner {
                matcher: config.matcher(),
                debouncer: Debouncer::new(config.debounce_ms),
                source: source.clone(),
                target: target.clone(),
                target_caption,
                candidates: Vec::new(),
                text: String::new(),
                suggestions: Vec::new(),
                open: false,
                keys: Vec::new(),
                config: config.clone(),
            })),
        };

        let handle = input.clone();
        let options_key = ws.register(
            ChangeListener::new(&config.options_model, &config.id)
                .with_id(&format!("{}.options", config.id))
                .tracking(source.options),
            Box::new(move |ws, _| {
                handle.reload(ws)?;
                Ok(())
            }),
        );

        let handle = input.clone();
        let owner = config.id.clone();
        let target_key = ws.register(
            ChangeListener::new(&config.target_model, &config.id)
                .with_id(&format!("{}.target", config.id))
                .tracking(target),
            Box::new(move |ws, event| {
                if event.is_own(&owner) {
                    return Ok(());
                }
                handle.mirror_target(ws)?;
                Ok(())
            }),
        );
        input.inner.borrow_mut().keys = vec![options_key, target_key];

        let handle = input.clone();
        let models = [config.options_model.as_str(), config.target_model.as_str()];
        let readiness = ws.with_ready_models(&models, move |ws| {
            handle.reload(ws)?;
            handle.mirror_target(ws)?;
            Ok(())
        });
        if readiness != Readiness::Ran {
            debug!(input = %config.id, models = ?models, "waiting for models");
        }

        Ok(input)
    }

    pub fn id(&self) -> String {
        self.inner.borrow().config.id.clone()
    }

    pub fn config(&self) -> SuggestConfig {
        self.inner.borrow().config.clone()
    }

    /// Rebuild the candidates from the options model. An open suggestion
    /// list is matched again.
    pub fn reload(&self, ws: &Workspace) -> Result<usize, SuggestError> {
        let (model, source) = {
            let inner = self.inner.borrow();
            (inner.config.options_model.clone(), inner.source.clone())
        };
        let candidates = source.extract(ws.document(&model)?);
        let count = candidates.len();
        let open = {
            let mut inner = self.inner.borrow_mut();
            inner.candidates = candidates;
            inner.open
        };
        if open {
            self.refresh();
        }
        debug!(input = %self.id(), candidates = count, "options reloaded");
        Ok(count)
    }

    /// Record a keystroke. Matching runs once the text has been stable for
    /// the debounce delay.
    pub fn type_text(&self, ws: &mut Workspace, text: &str) -> TimerId {
        let handle = self.clone();
        let mut inner = self.inner.borrow_mut();
        inner.text = text.to_string();
        inner.debouncer.trigger(
            ws,
            Box::new(move |_| {
                handle.refresh();
                Ok(())
            }),
        )
    }

    /// Match the current text now and open the suggestion list. Returns the
    /// number of suggestions.
    pub fn refresh(&self) -> usize {
        let mut inner = self.inner.borrow_mut();
        let query = Query::parse(&inner.text, inner.config.level_separator.as_deref());
        let suggestions = inner.matcher.match_all(&query, &inner.candidates);
        trace!(input = %inner.config.id, query = %query.text, matches = suggestions.len(), "matched");
        inner.suggestions = suggestions;
        inner.open = true;
        inner.suggestions.len()
    }

    /// Close the suggestion list and drop any pending keystroke.
    pub fn close(&self, ws: &mut Workspace) {
        let mut inner = self.inner.borrow_mut();
        inner.debouncer.cancel(ws);
        inner.suggestions.clear();
        inner.open = false;
    }

    /// Write the value (and caption) of suggestion `index` into the target
    /// model with one fire. The text becomes the chosen caption.
    pub fn choose(&self, ws: &mut Workspace, index: usize) -> Result<FireReport, SuggestError> {
        let (candidate, model, target, target_caption, owner) = {
            let inner = self.inner.borrow();
            let suggestion = inner
                .suggestions
                .get(index)
                .ok_or(SuggestError::NoSuchSuggestion(index))?;
            (
                suggestion.candidate.clone(),
                inner.config.target_model.clone(),
                inner.target.clone(),
                inner.target_caption.clone(),
                inner.config.id.clone(),
            )
        };

        let origin = ws.next_origin(&owner);
        let (_, report) = ws.try_update::<_, SuggestError>(&model, Some(origin), |doc| {
            doc.set_value(&target, &candidate.value)?;
            if let Some(path) = &target_caption {
                doc.set_value(path, &candidate.caption)?;
            }
            Ok(())
        })?;

        self.close(ws);
        self.inner.borrow_mut().text = candidate.caption;
        Ok(report)
    }

    /// Remove the value (and caption) from the target model with one fire.
    pub fn clear(&self, ws: &mut Workspace) -> Result<usize, SuggestError> {
        let (model, target, target_caption, owner) = {
            let inner = self.inner.borrow();
            (
                inner.config.target_model.clone(),
                inner.target.clone(),
                inner.target_caption.clone(),
                inner.config.id.clone(),
            )
        };

        let origin = ws.next_origin(&owner);
        let (removed, _) = ws.update(&model, Some(origin), |doc| {
            let mut removed = doc.remove_path(&target)?;
            if let Some(path) = &target_caption {
                removed += doc.remove_path(path)?;
            }
            Ok(removed)
        })?;

        self.close(ws);
        self.inner.borrow_mut().text.clear();
        Ok(removed)
    }

    /// Unregister the listeners, drop a pending keystroke and detach the
    /// anchor.
    pub fn destroy(&self, ws: &mut Workspace) {
        let (id, keys) = {
            let mut inner = self.inner.borrow_mut();
            inner.debouncer.cancel(ws);
            (inner.config.id.clone(), std::mem::take(&mut inner.keys))
        };
        for key in &keys {
            ws.unregister(key);
        }
        ws.detach_anchor(&id);
        debug!(input = %id, "suggest input destroyed");
    }

    pub fn text(&self) -> String {
        self.inner.borrow().text.clone()
    }

    pub fn candidates(&self) -> Vec<Candidate> {
        self.inner.borrow().candidates.clone()
    }

    pub fn suggestions(&self) -> Vec<Suggestion> {
        self.inner.borrow().suggestions.clone()
    }

    pub fn is_open(&self) -> bool {
        self.inner.borrow().open
    }

    /// A keystroke is waiting for its debounce delay.
    pub fn is_pending(&self, ws: &Workspace) -> bool {
        self.inner.borrow().debouncer.is_pending(ws)
    }

    /// Show the caption of the target value: the configured caption path,
    /// then a candidate with that value, then the value itself.
    fn mirror_target(&self, ws: &mut Workspace) -> Result<(), SuggestError> {
        let (model, target, target_caption) = {
            let inner = self.inner.borrow();
            (
                inner.config.target_model.clone(),
                inner.target.clone(),
                inner.target_caption.clone(),
            )
        };
        let doc = ws.document(&model)?;
        let value = doc.value_of(&target).unwrap_or_default();
        let caption = target_caption.and_then(|path| doc.value_of(&path));

        let text = {
            let inner = self.inner.borrow();
            match caption {
                Some(caption) => caption,
                None => inner
                    .candidates
                    .iter()
                    .find(|c| !value.is_empty() && c.value == value)
                    .map(|c| c.caption.clone())
                    .unwrap_or(value),
            }
        };
        self.close(ws);
        self.inner.borrow_mut().text = text;
        Ok(())
    }
}

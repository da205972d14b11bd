//! The dimension chooser widget core.
//!
//! The chooser keeps an editable copy of the dimension's selection in its
//! own staging model, owns one input control per level of the active
//! level's required chain, and writes finished selections back into the
//! target filter through a [`FilterMerger`].

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::debug;
use treebind_core::{ChangeListener, FireReport, ListenerKey, Readiness, Workspace};

use crate::config::ChooserConfig;
use crate::error::ChooserError;
use crate::filter::{Expression, FilterState, SelectionGroup};
use crate::hierarchy::Hierarchy;
use crate::merge::{FilterMerger, MergeOptions};
use crate::resolver::{diff_inputs, guess_active_level, reconcile, ReconcileOutcome};
use crate::staging;

/// Input control of one level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelInput {
    pub level_id: String,
    pub b_ref: String,
    pub anchor_id: String,
    /// Mirror of the staged value.
    pub value: String,
    key: ListenerKey,
}

struct ChooserInner {
    config: ChooserConfig,
    hierarchy: Rc<Hierarchy>,
    merger: FilterMerger,
    staging_model: String,
    target_key: Option<ListenerKey>,
    inputs: IndexMap<String, LevelInput>,
}

/// Shared handle; clones refer to the same widget.
#[derive(Clone)]
pub struct DimensionChooser {
    inner: Rc<RefCell<ChooserInner>>,
}

impl std::fmt::Debug for DimensionChooser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("DimensionChooser")
            .field("id", &inner.config.id)
            .field("dimension", &inner.config.dimension)
            .field("inputs", &inner.inputs.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl DimensionChooser {
    /// Create the widget: staging model, anchor and target listener. The
    /// first sync runs once the target model is ready.
    pub fn create(ws: &mut Workspace, config: ChooserConfig, hierarchy: Hierarchy) -> Result<Self, ChooserError> {
        hierarchy.validate()?;
        let paths = config.paths()?;
        let staging_model = config.staging_model_id();

        if ws.has_model(&staging_model) {
            ws.replace_document(&staging_model, staging::new_document())?;
        } else {
            ws.add_ready_model(&staging_model, staging::new_document())?;
        }
        ws.attach_anchor(&config.id);

        let chooser = Self {
            inner: Rc::new(RefCell::new(ChooserInner {
                merger: FilterMerger::new(&config.target_model, paths.clone()),
                hierarchy: Rc::new(hierarchy),
                staging_model,
                target_key: None,
                inputs: IndexMap::new(),
                config: config.clone(),
            })),
        };

        let handle = chooser.clone();
        let owner = config.id.clone();
        let key = ws.register(
            ChangeListener::new(&config.target_model, &config.id)
                .with_id(&format!("{}.filter", config.id))
                .tracking(paths.filter),
            Box::new(move |ws, event| {
                if event.is_own(&owner) {
                    return Ok(());
                }
                handle.sync(ws)?;
                Ok(())
            }),
        );
        chooser.inner.borrow_mut().target_key = Some(key);

        let handle = chooser.clone();
        let readiness = ws.with_ready_models(&[config.target_model.as_str()], move |ws| {
            handle.sync(ws)?;
            Ok(())
        });
        if readiness != Readiness::Ran {
            debug!(chooser = %config.id, model = %config.target_model, "waiting for target model");
        }

        Ok(chooser)
    }

    pub fn id(&self) -> String {
        self.inner.borrow().config.id.clone()
    }

    pub fn config(&self) -> ChooserConfig {
        self.inner.borrow().config.clone()
    }

    pub fn staging_model(&self) -> String {
        self.inner.borrow().staging_model.clone()
    }

    pub fn hierarchy(&self) -> Rc<Hierarchy> {
        Rc::clone(&self.inner.borrow().hierarchy)
    }

    fn merger(&self) -> FilterMerger {
        self.inner.borrow().merger.clone()
    }

    /// Re-read the target filter: heal floating leaves, guess the active
    /// level, drop inclusion groups not shaped like that level and reconcile
    /// the staging model and the input controls. Fires the staging model
    /// once.
    pub fn sync(&self, ws: &mut Workspace) -> Result<ReconcileOutcome, ChooserError> {
        let (merger, hierarchy, staging_model, owner) = {
            let inner = self.inner.borrow();
            (
                inner.merger.clone(),
                Rc::clone(&inner.hierarchy),
                inner.staging_model.clone(),
                inner.config.id.clone(),
            )
        };
        let origin = ws.next_origin(&owner);

        let (cleanup, _) = merger.clean(ws, Some(origin.clone()), &hierarchy)?;
        if cleanup.changed() {
            debug!(chooser = %owner, ?cleanup, "healed floating filter leaves");
        }

        let mut filter = FilterState::read(ws.document(&merger.model_id)?, &merger.paths);
        let level = if filter.is_empty() {
            staging::level(ws.document(&staging_model)?)
        } else {
            guess_active_level(&filter, &hierarchy)?
        };
        if !level.is_empty() && filter.included.len() > 1 {
            let refs = hierarchy.required_refs(&level)?;
            let (pruned, _) = merger.prune(ws, Some(origin.clone()), &refs)?;
            if pruned > 0 {
                debug!(chooser = %owner, level = %level, pruned, "dropped inclusion groups of another level");
                filter = FilterState::read(ws.document(&merger.model_id)?, &merger.paths);
            }
        }

        let outcome = reconcile(ws.document_mut(&staging_model)?, &filter, &level, &hierarchy)?;
        self.update_inputs(ws, &outcome.created, &outcome.destroyed)?;
        ws.fire_as(&staging_model, Some(origin))?;
        Ok(outcome)
    }

    /// Make `level_id` the active level. Staged values of levels outside its
    /// chain are dropped, the others are kept.
    pub fn select_level(&self, ws: &mut Workspace, level_id: &str) -> Result<FireReport, ChooserError> {
        let (hierarchy, staging_model, owner) = self.staging_context();
        let chain = hierarchy.required_chain_ids(level_id)?;
        let refs = hierarchy.required_refs(level_id)?;

        let doc = ws.document_mut(&staging_model)?;
        for expression in staging::edit_group(doc).expressions {
            if !refs.contains(&expression.b_ref) {
                staging::remove_edit_expression(doc, &expression.b_ref)?;
            }
        }
        let (created, destroyed) = diff_inputs(&staging::input_levels(doc), &chain);
        staging::set_input_levels(doc, &chain)?;
        staging::set_level(doc, level_id)?;

        self.update_inputs(ws, &created, &destroyed)?;
        let origin = ws.next_origin(&owner);
        Ok(ws.fire_as(&staging_model, Some(origin))?)
    }

    /// Stage a value for one level of the active chain. Values of the levels
    /// that depend on it are cleared.
    pub fn set_level_value(
        &self,
        ws: &mut Workspace,
        level_id: &str,
        value: &str,
        caption: Option<&str>,
    ) -> Result<FireReport, ChooserError> {
        let (hierarchy, staging_model, _) = self.staging_context();
        let active = staging::level(ws.document(&staging_model)?);
        let chain = if active.is_empty() {
            Vec::new()
        } else {
            hierarchy.required_chain(&active)?
        };
        let Some(position) = chain.iter().position(|l| l.id == level_id) else {
            return Err(ChooserError::UnknownLevel(level_id.to_string()));
        };

        let mut expression = Expression::new(&chain[position].b_ref, value);
        if let Some(caption) = caption {
            expression = expression.with_caption(caption);
        }
        let doc = ws.document_mut(&staging_model)?;
        staging::set_edit_expression(doc, &expression)?;
        for dependent in &chain[position + 1..] {
            staging::remove_edit_expression(doc, &dependent.b_ref)?;
        }

        let anchor = {
            let mut inner = self.inner.borrow_mut();
            let anchor = inner.config.input_anchor(level_id);
            if let Some(input) = inner.inputs.get_mut(level_id) {
                input.value = value.to_string();
            }
            anchor
        };
        // Tagged with the input's anchor so the input does not react to its own write.
        let origin = ws.next_origin(&anchor);
        Ok(ws.fire_as(&staging_model, Some(origin))?)
    }

    /// Write the staged selection into the target filter and re-sync.
    pub fn apply(&self, ws: &mut Workspace, options: MergeOptions) -> Result<FireReport, ChooserError> {
        let (hierarchy, staging_model, owner) = self.staging_context();
        let doc = ws.document(&staging_model)?;
        let active = staging::level(doc);
        if active.is_empty() {
            return Err(ChooserError::IncompleteSelection(active));
        }
        let staged = staging::edit_group(doc);

        let mut group = SelectionGroup::new();
        for level in hierarchy.required_chain(&active)? {
            match staged.expression(&level.b_ref) {
                Some(e) if e.value.as_deref().is_some_and(|v| !v.is_empty()) => group.push(e.clone()),
                _ => return Err(ChooserError::IncompleteSelection(level.id.clone())),
            }
        }

        let origin = ws.next_origin(&owner);
        let report = self.merger().add_selection(ws, Some(origin), &[group], options)?;
        self.sync(ws)?;
        Ok(report)
    }

    /// Remove one selection from the inclusion or exclusion container.
    pub fn remove_group(&self, ws: &mut Workspace, group: &SelectionGroup, exclude: bool) -> Result<usize, ChooserError> {
        let origin = ws.next_origin(&self.id());
        let (removed, _) = self
            .merger()
            .remove_selection(ws, Some(origin), std::slice::from_ref(group), exclude)?;
        self.sync(ws)?;
        Ok(removed)
    }

    /// Remove the dimension's inclusion and exclusion containers.
    pub fn clear(&self, ws: &mut Workspace) -> Result<usize, ChooserError> {
        let origin = ws.next_origin(&self.id());
        let (removed, _) = self.merger().clear(ws, Some(origin))?;
        self.sync(ws)?;
        Ok(removed)
    }

    /// Unregister every listener, detach every anchor and drop the staging
    /// model.
    pub fn destroy(&self, ws: &mut Workspace) -> Result<(), ChooserError> {
        let (config, staging_model, target_key, inputs) = {
            let mut inner = self.inner.borrow_mut();
            (
                inner.config.clone(),
                inner.staging_model.clone(),
                inner.target_key.take(),
                std::mem::take(&mut inner.inputs),
            )
        };
        if let Some(key) = target_key {
            ws.unregister(&key);
        }
        for input in inputs.values() {
            ws.unregister(&input.key);
            ws.detach_anchor(&input.anchor_id);
        }
        ws.detach_anchor(&config.id);
        if ws.has_model(&staging_model) {
            ws.remove_model(&staging_model)?;
        }
        debug!(chooser = %config.id, "chooser destroyed");
        Ok(())
    }

    pub fn active_level(&self, ws: &Workspace) -> Result<String, ChooserError> {
        Ok(staging::level(ws.document(&self.staging_model())?))
    }

    /// Levels with an input control, in chain order.
    pub fn input_levels(&self) -> Vec<String> {
        self.inner.borrow().inputs.keys().cloned().collect()
    }

    pub fn input(&self, level_id: &str) -> Option<LevelInput> {
        self.inner.borrow().inputs.get(level_id).cloned()
    }

    pub fn multi_open(&self, ws: &Workspace) -> Result<bool, ChooserError> {
        Ok(staging::multi_open(ws.document(&self.staging_model())?))
    }

    pub fn staged(&self, ws: &Workspace) -> Result<SelectionGroup, ChooserError> {
        Ok(staging::edit_group(ws.document(&self.staging_model())?))
    }

    /// Current inclusion and exclusion groups of the dimension.
    pub fn selections(&self, ws: &Workspace) -> Result<FilterState, ChooserError> {
        let merger = self.merger();
        Ok(FilterState::read(ws.document(&merger.model_id)?, &merger.paths))
    }

    fn staging_context(&self) -> (Rc<Hierarchy>, String, String) {
        let inner = self.inner.borrow();
        (
            Rc::clone(&inner.hierarchy),
            inner.staging_model.clone(),
            inner.config.id.clone(),
        )
    }

    /// Destroy the controls of `destroyed`, create the controls of `created`
    /// and order the controls by the staged input list. Controls of other
    /// levels are left alone.
    fn update_inputs(&self, ws: &mut Workspace, created: &[String], destroyed: &[String]) -> Result<(), ChooserError> {
        let (config, hierarchy, staging_model) = {
            let inner = self.inner.borrow();
            (inner.config.clone(), Rc::clone(&inner.hierarchy), inner.staging_model.clone())
        };

        for level_id in destroyed {
            let removed = self.inner.borrow_mut().inputs.shift_remove(level_id);
            if let Some(input) = removed {
                ws.unregister(&input.key);
                ws.detach_anchor(&input.anchor_id);
            }
        }

        for level_id in created {
            let level = hierarchy.level(level_id)?;
            let anchor_id = config.input_anchor(level_id);
            let value_path = staging::edit_value_path(&level.b_ref);
            ws.attach_anchor(&anchor_id);

            let handle = Rc::downgrade(&self.inner);
            let (owner, model, tracked, input_level) =
                (anchor_id.clone(), staging_model.clone(), value_path.clone(), level_id.clone());
            let key = ws.register(
                ChangeListener::new(&staging_model, &anchor_id).tracking(value_path.clone()),
                Box::new(move |ws, event| {
                    if event.is_own(&owner) {
                        return Ok(());
                    }
                    let value = ws.document(&model)?.value_of(&tracked).unwrap_or_default();
                    if let Some(inner) = handle.upgrade() {
                        if let Some(input) = inner.borrow_mut().inputs.get_mut(&input_level) {
                            input.value = value;
                        }
                    }
                    Ok(())
                }),
            );

            let value = ws.document(&staging_model)?.value_of(&value_path).unwrap_or_default();
            self.inner.borrow_mut().inputs.insert(
                level_id.clone(),
                LevelInput {
                    level_id: level_id.clone(),
                    b_ref: level.b_ref.clone(),
                    anchor_id,
                    value,
                    key,
                },
            );
        }

        let order = staging::input_levels(ws.document(&staging_model)?);
        let position = |level: &String| order.iter().position(|l| l == level).unwrap_or(usize::MAX);
        self.inner
            .borrow_mut()
            .inputs
            .sort_by(|a, _, b, _| position(a).cmp(&position(b)));
        Ok(())
    }
}

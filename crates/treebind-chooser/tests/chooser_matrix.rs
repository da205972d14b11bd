use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;
use treebind_chooser::{
    add_selection, clean_floating_fragments, guess_active_level, prune_mismatched_groups, reconcile, staging,
    ChooserConfig, ChooserError, CleanupReport, DimensionChooser, DimensionPaths, Expression, FilterState, Hierarchy,
    Level, MergeOptions, SelectionGroup,
};
use treebind_core::Workspace;
use treebind_xml::{PathParser, XmlDocument};

fn geo() -> Hierarchy {
    Hierarchy::new(vec![
        Level::new("country", "country").unique(),
        Level::new("region", "region").requires("country"),
        Level::new("station", "station").requires("region"),
    ])
    .unwrap()
}

fn paths() -> DimensionPaths {
    DimensionPaths::new(PathParser::parse("/Status/Filter").unwrap(), "geo")
}

// ── Floating fragment healing ───────────────────────────────────────────

#[test]
fn cleanup_matrix() {
    let cases: [(&str, &str, CleanupReport); 10] = [
        (
            // Lone unique level: container created.
            r#"<Status><Filter><Expression bRef="country" op="=" value="DE"/></Filter></Status>"#,
            r#"<Status><Filter><Or dimension="geo"><And><Expression bRef="country" op="=" value="DE"/></And></Or></Filter></Status>"#,
            CleanupReport { folded: 1, deleted: 0, removed: 1 },
        ),
        (
            // Required level missing: deleted.
            r#"<Status><Filter><Expression bRef="region" op="=" value="BB"/></Filter></Status>"#,
            r#"<Status><Filter/></Status>"#,
            CleanupReport { folded: 0, deleted: 1, removed: 1 },
        ),
        (
            // Full chain in a wrapper: folded, wrapper pruned.
            r#"<Status><Filter><And><Expression bRef="country" op="=" value="DE"/><Expression bRef="region" op="=" value="BB"/></And></Filter></Status>"#,
            r#"<Status><Filter><Or dimension="geo"><And><Expression bRef="country" op="=" value="DE"/><Expression bRef="region" op="=" value="BB"/></And></Or></Filter></Status>"#,
            CleanupReport { folded: 1, deleted: 0, removed: 3 },
        ),
        (
            // Same shape as the single existing group: overwritten in place.
            r#"<Status><Filter><Or dimension="geo"><And><Expression bRef="country" op="=" value="FR"/></And></Or><Expression bRef="country" op="=" value="DE" caption="Germany"/></Filter></Status>"#,
            r#"<Status><Filter><Or dimension="geo"><And><Expression bRef="country" op="=" value="DE" caption="Germany"/></And></Or></Filter></Status>"#,
            CleanupReport { folded: 1, deleted: 0, removed: 1 },
        ),
        (
            // Other shape: the single existing group is replaced.
            r#"<Status><Filter><Or dimension="geo"><And><Expression bRef="country" op="=" value="FR"/></And></Or><Expression bRef="country" op="=" value="DE"/><Expression bRef="region" op="=" value="BB"/></Filter></Status>"#,
            r#"<Status><Filter><Or dimension="geo"><And><Expression bRef="country" op="=" value="DE"/><Expression bRef="region" op="=" value="BB"/></And></Or></Filter></Status>"#,
            CleanupReport { folded: 1, deleted: 0, removed: 2 },
        ),
        (
            // Several groups: ambiguous, the floating leaf is dropped.
            r#"<Status><Filter><Or dimension="geo"><And><Expression bRef="country" op="=" value="FR"/></And><And><Expression bRef="country" op="=" value="IT"/></And></Or><Expression bRef="country" op="=" value="DE"/></Filter></Status>"#,
            r#"<Status><Filter><Or dimension="geo"><And><Expression bRef="country" op="=" value="FR"/></And><And><Expression bRef="country" op="=" value="IT"/></And></Or></Filter></Status>"#,
            CleanupReport { folded: 0, deleted: 1, removed: 1 },
        ),
        (
            // The operator of the folded leaf replaces the existing one.
            r#"<Status><Filter><Or dimension="geo"><And><Expression bRef="country" op="=" value="FR"/></And></Or><Expression bRef="country" op="!=" value="DE"/></Filter></Status>"#,
            r#"<Status><Filter><Or dimension="geo"><And><Expression bRef="country" op="!=" value="DE"/></And></Or></Filter></Status>"#,
            CleanupReport { folded: 1, deleted: 0, removed: 1 },
        ),
        (
            // A new container keeps the operator too.
            r#"<Status><Filter><Expression bRef="country" op="!=" value="DE"/></Filter></Status>"#,
            r#"<Status><Filter><Or dimension="geo"><And><Expression bRef="country" op="!=" value="DE"/></And></Or></Filter></Status>"#,
            CleanupReport { folded: 1, deleted: 0, removed: 1 },
        ),
        (
            // Required level taken from the single existing group.
            r#"<Status><Filter><Or dimension="geo"><And><Expression bRef="country" op="=" value="DE" caption="Germany"/></And></Or><Expression bRef="region" op="=" value="BB"/></Filter></Status>"#,
            r#"<Status><Filter><Or dimension="geo"><And><Expression bRef="country" op="=" value="DE" caption="Germany"/><Expression bRef="region" op="=" value="BB"/></And></Or></Filter></Status>"#,
            CleanupReport { folded: 1, deleted: 0, removed: 1 },
        ),
        (
            // Leaves owned by another container and unknown bRefs stay.
            r#"<Status><Filter><Or dimension="other"><And><Expression bRef="country" op="=" value="DE"/></And></Or><Expression bRef="year" op="=" value="2024"/></Filter></Status>"#,
            r#"<Status><Filter><Or dimension="other"><And><Expression bRef="country" op="=" value="DE"/></And></Or><Expression bRef="year" op="=" value="2024"/></Filter></Status>"#,
            CleanupReport { folded: 0, deleted: 0, removed: 0 },
        ),
    ];

    for (input, expected, report) in cases {
        let mut doc = XmlDocument::parse(input).unwrap();
        let got = clean_floating_fragments(&mut doc, &paths(), &geo()).unwrap();
        assert_eq!(doc.to_xml_string(), expected, "cleanup of {input}");
        assert_eq!(got, report, "report for {input}");
    }
}

#[test]
fn cleanup_does_not_borrow_ancestors_from_several_groups() {
    let mut doc = XmlDocument::parse(
        r#"<Status><Filter><Or dimension="geo"><And><Expression bRef="country" op="=" value="DE"/></And><And><Expression bRef="country" op="=" value="FR"/></And></Or><Expression bRef="region" op="=" value="BB"/></Filter></Status>"#,
    )
    .unwrap();
    let report = clean_floating_fragments(&mut doc, &paths(), &geo()).unwrap();
    assert_eq!(report, CleanupReport { folded: 0, deleted: 1, removed: 1 });
    assert_eq!(
        FilterState::read(&doc, &paths()).included,
        vec![SelectionGroup::new().with("country", "DE"), SelectionGroup::new().with("country", "FR")]
    );
}

#[test]
fn cleanup_without_filter_element_is_noop() {
    let mut doc = XmlDocument::new("Status");
    let report = clean_floating_fragments(&mut doc, &paths(), &geo()).unwrap();
    assert!(!report.changed());
}

// ── Merging ─────────────────────────────────────────────────────────────

#[test]
fn include_drops_groups_of_another_level() {
    let mut doc = XmlDocument::parse(
        r#"<Status><Filter><Or dimension="geo"><And><Expression bRef="country" op="=" value="DE"/></And><And><Expression bRef="country" op="=" value="FR"/></And></Or></Filter></Status>"#,
    )
    .unwrap();
    let region = SelectionGroup::new().with("country", "DE").with("region", "BB");
    add_selection(&mut doc, &paths(), std::slice::from_ref(&region), MergeOptions::include()).unwrap();
    assert_eq!(FilterState::read(&doc, &paths()).included, vec![region.clone()]);

    // Same shape: appended next to the existing group.
    let other = SelectionGroup::new().with("country", "DE").with("region", "BE");
    add_selection(&mut doc, &paths(), std::slice::from_ref(&other), MergeOptions::include()).unwrap();
    assert_eq!(FilterState::read(&doc, &paths()).included, vec![region, other]);
}

#[test]
fn prune_keeps_only_groups_of_the_given_shape() {
    let mut doc = XmlDocument::parse(
        r#"<Status><Filter><Or dimension="geo"><And><Expression bRef="country" op="=" value="DE"/><Expression bRef="region" op="=" value="BB"/></And><And><Expression bRef="country" op="=" value="FR"/></And></Or></Filter></Status>"#,
    )
    .unwrap();
    let refs = geo().required_refs("region").unwrap();
    assert_eq!(prune_mismatched_groups(&mut doc, &paths(), &refs).unwrap(), 1);
    assert_eq!(
        FilterState::read(&doc, &paths()).included,
        vec![SelectionGroup::new().with("country", "DE").with("region", "BB")]
    );
    assert_eq!(prune_mismatched_groups(&mut doc, &paths(), &refs).unwrap(), 0);
}

#[test]
fn exclude_keeps_one_or_group_per_selection() {
    let mut doc = XmlDocument::parse("<Status><Filter/></Status>").unwrap();
    let group = SelectionGroup::new().with("country", "DE");
    add_selection(&mut doc, &paths(), std::slice::from_ref(&group), MergeOptions::exclude()).unwrap();
    add_selection(&mut doc, &paths(), std::slice::from_ref(&group), MergeOptions::exclude()).unwrap();
    assert_eq!(
        doc.to_xml_string(),
        r#"<Status><Filter><And dimension_exclude="geo"><Or><Expression bRef="country" op="!=" value="DE"/><Expression bRef="country" op="="/></Or></And></Filter></Status>"#
    );
}

// ── Reconcile ───────────────────────────────────────────────────────────

#[test]
fn reconcile_stages_first_group_and_inputs() {
    let mut staging_doc = staging::new_document();
    let filter = FilterState {
        included: vec![
            SelectionGroup::new().with("country", "DE").with("region", "BB"),
            SelectionGroup::new().with("country", "DE").with("region", "BE"),
        ],
        excluded: vec![],
    };
    let outcome = reconcile(&mut staging_doc, &filter, "region", &geo()).unwrap();
    assert_eq!(outcome.active_level, "region");
    assert_eq!(outcome.created, vec!["country", "region"]);
    assert!(outcome.destroyed.is_empty());
    assert!(outcome.multi_open);
    assert_eq!(staging::edit_group(&staging_doc), filter.included[0]);
    assert_eq!(staging::input_levels(&staging_doc), vec!["country", "region"]);

    // Narrowing to country destroys only the region input.
    let narrowed = FilterState {
        included: vec![SelectionGroup::new().with("country", "FR")],
        excluded: vec![],
    };
    let outcome = reconcile(&mut staging_doc, &narrowed, "country", &geo()).unwrap();
    assert!(outcome.created.is_empty());
    assert_eq!(outcome.destroyed, vec!["region"]);
    assert!(!outcome.multi_open);
}

#[test]
fn reconcile_exclusion_only_resets_level() {
    let mut staging_doc = staging::new_document();
    let filter = FilterState {
        included: vec![],
        excluded: vec![SelectionGroup::new().with("country", "DE")],
    };
    let outcome = reconcile(&mut staging_doc, &filter, "country", &geo()).unwrap();
    assert_eq!(outcome.active_level, "");
    assert!(outcome.multi_open);
    assert!(staging::input_levels(&staging_doc).is_empty());
    assert!(staging::edit_group(&staging_doc).is_empty());
}

// ── Widget ──────────────────────────────────────────────────────────────

fn chooser_workspace(filter_xml: &str) -> (Workspace, DimensionChooser) {
    let mut ws = Workspace::new();
    ws.add_ready_model("guiStatus", XmlDocument::parse(filter_xml).unwrap()).unwrap();
    let chooser = DimensionChooser::create(
        &mut ws,
        ChooserConfig::new("geoChooser", "geo", "guiStatus", "/Status/Filter"),
        geo(),
    )
    .unwrap();
    (ws, chooser)
}

#[test]
fn chooser_edit_and_apply_flow() {
    let (mut ws, chooser) = chooser_workspace("<Status><Filter/></Status>");
    assert_eq!(chooser.active_level(&ws).unwrap(), "");
    assert!(chooser.input_levels().is_empty());

    chooser.select_level(&mut ws, "region").unwrap();
    assert_eq!(chooser.active_level(&ws).unwrap(), "region");
    assert_eq!(chooser.input_levels(), vec!["country", "region"]);

    assert!(matches!(
        chooser.apply(&mut ws, MergeOptions::include()),
        Err(ChooserError::IncompleteSelection(level)) if level == "country"
    ));
    assert!(matches!(
        chooser.set_level_value(&mut ws, "station", "X", None),
        Err(ChooserError::UnknownLevel(_))
    ));

    chooser.set_level_value(&mut ws, "country", "DE", Some("Germany")).unwrap();
    chooser.set_level_value(&mut ws, "region", "BB", None).unwrap();
    assert_eq!(chooser.input("region").unwrap().value, "BB");

    // Changing a level clears the levels depending on it.
    chooser.set_level_value(&mut ws, "country", "FR", None).unwrap();
    assert_eq!(chooser.input("region").unwrap().value, "");
    assert_eq!(chooser.input("country").unwrap().value, "FR");
    chooser.set_level_value(&mut ws, "country", "DE", Some("Germany")).unwrap();
    chooser.set_level_value(&mut ws, "region", "BB", None).unwrap();

    chooser.apply(&mut ws, MergeOptions::include()).unwrap();
    let selections = chooser.selections(&ws).unwrap();
    assert_eq!(
        selections.included,
        vec![SelectionGroup {
            expressions: vec![
                Expression::new("country", "DE").with_caption("Germany"),
                Expression::new("region", "BB"),
            ],
        }]
    );
    assert_eq!(chooser.active_level(&ws).unwrap(), "region");
    assert!(!chooser.multi_open(&ws).unwrap());

    // A second selection opens the multi area.
    chooser.set_level_value(&mut ws, "region", "BE", None).unwrap();
    chooser.apply(&mut ws, MergeOptions::include()).unwrap();
    assert_eq!(chooser.selections(&ws).unwrap().included.len(), 2);
    assert!(chooser.multi_open(&ws).unwrap());

    let removed = chooser
        .remove_group(&mut ws, &SelectionGroup::new().with("country", "DE").with("region", "BB"), false)
        .unwrap();
    assert_eq!(removed, 1);
    assert!(!chooser.multi_open(&ws).unwrap());

    assert_eq!(chooser.clear(&mut ws).unwrap(), 1);
    assert!(chooser.selections(&ws).unwrap().is_empty());
}

#[test]
fn chooser_apply_at_another_level_replaces_the_shape() {
    let (mut ws, chooser) = chooser_workspace("<Status><Filter/></Status>");
    chooser.select_level(&mut ws, "country").unwrap();
    chooser.set_level_value(&mut ws, "country", "DE", None).unwrap();
    chooser.apply(&mut ws, MergeOptions::include()).unwrap();
    assert_eq!(chooser.active_level(&ws).unwrap(), "country");

    chooser.select_level(&mut ws, "region").unwrap();
    chooser.set_level_value(&mut ws, "region", "BB", None).unwrap();
    chooser.apply(&mut ws, MergeOptions::include()).unwrap();

    let included = chooser.selections(&ws).unwrap().included;
    assert_eq!(included.iter().map(SelectionGroup::arity).collect::<Vec<_>>(), vec![2]);
    assert_eq!(included[0], SelectionGroup::new().with("country", "DE").with("region", "BB"));
    assert_eq!(chooser.active_level(&ws).unwrap(), "region");
    assert_eq!(chooser.input_levels(), vec!["country", "region"]);
    assert!(!chooser.multi_open(&ws).unwrap());
}

#[test]
fn chooser_drops_groups_not_shaped_like_the_first() {
    let (ws, chooser) = chooser_workspace(
        r#"<Status><Filter><Or dimension="geo"><And><Expression bRef="country" op="=" value="DE"/><Expression bRef="region" op="=" value="BB"/></And><And><Expression bRef="country" op="=" value="FR"/></And></Or></Filter></Status>"#,
    );
    assert_eq!(chooser.active_level(&ws).unwrap(), "region");
    assert_eq!(
        chooser.selections(&ws).unwrap().included,
        vec![SelectionGroup::new().with("country", "DE").with("region", "BB")]
    );
    assert!(!chooser.multi_open(&ws).unwrap());
}

#[test]
fn chooser_staging_arena_stays_bounded() {
    let (mut ws, chooser) = chooser_workspace(
        r#"<Status><Filter><Or dimension="geo"><And><Expression bRef="country" op="=" value="DE"/><Expression bRef="region" op="=" value="BB"/></And></Or></Filter></Status>"#,
    );
    let staging_model = chooser.staging_model();
    let round = |ws: &mut Workspace| {
        chooser.select_level(ws, "country").unwrap();
        chooser.select_level(ws, "region").unwrap();
        chooser.set_level_value(ws, "region", "BE", None).unwrap();
        chooser.set_level_value(ws, "region", "BB", None).unwrap();
        chooser.sync(ws).unwrap();
    };

    round(&mut ws);
    let slots = ws.document(&staging_model).unwrap().arena_len();
    for _ in 0..25 {
        round(&mut ws);
    }
    let doc = ws.document(&staging_model).unwrap();
    assert_eq!(doc.arena_len(), slots);
    assert_eq!(staging::input_levels(doc), vec!["country", "region"]);
    assert_eq!(staging::edit_group(doc), SelectionGroup::new().with("country", "DE").with("region", "BB"));
}

#[test]
fn reconcile_twice_leaves_staging_untouched() {
    let mut staging_doc = staging::new_document();
    let filter = FilterState {
        included: vec![SelectionGroup::new().with("country", "DE").with("region", "BB")],
        excluded: vec![],
    };
    reconcile(&mut staging_doc, &filter, "region", &geo()).unwrap();
    let slots = staging_doc.arena_len();
    let before = staging_doc.clone();
    reconcile(&mut staging_doc, &filter, "region", &geo()).unwrap();
    assert_eq!(staging_doc, before);
    assert_eq!(staging_doc.arena_len(), slots);
}

#[test]
fn chooser_apply_exclude() {
    let (mut ws, chooser) = chooser_workspace("<Status><Filter/></Status>");
    chooser.select_level(&mut ws, "country").unwrap();
    chooser.set_level_value(&mut ws, "country", "DE", None).unwrap();
    chooser.apply(&mut ws, MergeOptions::exclude()).unwrap();

    let selections = chooser.selections(&ws).unwrap();
    assert!(selections.included.is_empty());
    assert_eq!(selections.excluded.len(), 1);
    assert_eq!(selections.excluded[0].value_of("country"), Some("DE"));
    // Exclusion only: no level can be edited.
    assert_eq!(chooser.active_level(&ws).unwrap(), "");
    assert!(chooser.input_levels().is_empty());
    assert!(chooser.multi_open(&ws).unwrap());
}

#[test]
fn chooser_follows_external_changes() {
    let (mut ws, chooser) = chooser_workspace(
        r#"<Status><Filter><Or dimension="geo"><And><Expression bRef="country" op="=" value="DE"/><Expression bRef="region" op="=" value="BB"/></And></Or></Filter></Status>"#,
    );
    assert_eq!(chooser.active_level(&ws).unwrap(), "region");
    assert_eq!(chooser.input_levels(), vec!["country", "region"]);
    assert_eq!(chooser.input("country").unwrap().value, "DE");
    let country_anchor = chooser.input("country").unwrap().anchor_id;

    // Another component narrows the selection to a country.
    ws.update("guiStatus", None, |doc| {
        doc.remove_path(&PathParser::parse("//Expression[@bRef='region']").unwrap())
    })
    .unwrap();
    assert_eq!(chooser.active_level(&ws).unwrap(), "country");
    assert_eq!(chooser.input_levels(), vec!["country"]);
    assert!(!ws.is_anchor_attached("geoChooser_region"));
    // The surviving input was not recreated.
    assert_eq!(chooser.input("country").unwrap().anchor_id, country_anchor);
    assert!(ws.is_anchor_attached(&country_anchor));

    // A floating leaf written elsewhere is healed on the next fire.
    ws.update("guiStatus", None, |doc| {
        doc.set_value(&PathParser::parse("/Status/Filter/Expression[@bRef='country']/@value").unwrap(), "FR")
    })
    .unwrap();
    let selections = chooser.selections(&ws).unwrap();
    assert_eq!(selections.included, vec![SelectionGroup::new().with("country", "FR")]);
    assert_eq!(
        ws.document("guiStatus").unwrap().select_str("/Status/Filter/Expression").unwrap().len(),
        0
    );
    assert_eq!(chooser.input("country").unwrap().value, "FR");
}

#[test]
fn chooser_waits_for_target_model() {
    let mut ws = Workspace::new();
    ws.add_model("guiStatus", XmlDocument::parse("<Status><Filter/></Status>").unwrap()).unwrap();
    let chooser = DimensionChooser::create(
        &mut ws,
        ChooserConfig::new("geoChooser", "geo", "guiStatus", "/Status/Filter"),
        geo(),
    )
    .unwrap();
    assert_eq!(ws.waiting(), 1);
    assert!(chooser.input_levels().is_empty());

    ws.replace_document(
        "guiStatus",
        XmlDocument::parse(
            r#"<Status><Filter><Or dimension="geo"><And><Expression bRef="country" op="=" value="DE"/></And></Or></Filter></Status>"#,
        )
        .unwrap(),
    )
    .unwrap();
    assert_eq!(ws.waiting(), 0);
    assert_eq!(chooser.active_level(&ws).unwrap(), "country");
    assert_eq!(chooser.input_levels(), vec!["country"]);
}

#[test]
fn chooser_destroy_releases_everything() {
    let (mut ws, chooser) = chooser_workspace("<Status><Filter/></Status>");
    chooser.select_level(&mut ws, "region").unwrap();
    let staging_model = chooser.staging_model();
    assert_eq!(ws.listener_count("guiStatus"), 1);
    assert_eq!(ws.listener_count(&staging_model), 2);

    chooser.destroy(&mut ws).unwrap();
    assert_eq!(ws.listener_count("guiStatus"), 0);
    assert!(!ws.has_model(&staging_model));
    assert!(!ws.is_anchor_attached("geoChooser"));
    assert!(!ws.is_anchor_attached("geoChooser_country"));
    assert!(chooser.input_levels().is_empty());
    let report = ws.fire("guiStatus").unwrap();
    assert_eq!(report.invoked(), 0);
}

#[test]
fn chooser_detached_anchor_is_collected_lazily() {
    let (mut ws, _chooser) = chooser_workspace("<Status><Filter/></Status>");
    ws.detach_anchor("geoChooser");
    assert_eq!(ws.listener_count("guiStatus"), 1);
    let report = ws.fire("guiStatus").unwrap();
    assert_eq!(report.dropped, 1);
    assert_eq!(ws.listener_count("guiStatus"), 0);
}

// ── Properties ──────────────────────────────────────────────────────────

fn chain_hierarchy(unique: &[bool]) -> Hierarchy {
    let levels = unique
        .iter()
        .enumerate()
        .map(|(i, u)| {
            let mut level = Level::new(&format!("l{i}"), &format!("b{i}"));
            level.unique = *u;
            if i > 0 {
                level = level.requires(&format!("l{}", i - 1));
            }
            level
        })
        .collect();
    Hierarchy::new(levels).unwrap()
}

fn group_strategy() -> impl Strategy<Value = SelectionGroup> {
    (0usize..3, prop::collection::vec("[A-Z]{2}", 3)).prop_map(|(depth, values)| {
        ["country", "region", "station"]
            .iter()
            .zip(values)
            .take(depth + 1)
            .fold(SelectionGroup::new(), |g, (b_ref, value)| g.with(b_ref, &value))
    })
}

proptest! {
    #[test]
    fn guess_matches_exactly_one_chain_or_none(
        unique in prop::collection::vec(any::<bool>(), 1..6),
        refs in prop::collection::btree_set(0usize..7, 0..5),
    ) {
        let hierarchy = chain_hierarchy(&unique);
        let group = refs.iter().fold(SelectionGroup::new(), |g, i| g.with(&format!("b{i}"), "v"));
        let group_refs = group.refs();
        let filter = FilterState { included: vec![group], excluded: vec![] };

        let level = guess_active_level(&filter, &hierarchy).unwrap();
        let matching: Vec<&Level> = hierarchy
            .levels
            .iter()
            .filter(|l| hierarchy.required_refs(&l.id).unwrap() == group_refs)
            .collect();
        prop_assert!(matching.len() <= 1);
        if level.is_empty() {
            prop_assert!(matching.is_empty());
        } else {
            prop_assert_eq!(hierarchy.required_refs(&level).unwrap(), group_refs);
            prop_assert_eq!(&matching[0].id, &level);
        }
    }

    #[test]
    fn exclude_keeps_ne_and_null_companion_per_ref(
        groups in prop::collection::vec(prop::collection::btree_map("[a-d]", "[A-Z]{1,3}", 1..4), 1..4),
        replace in any::<bool>(),
    ) {
        let groups: Vec<SelectionGroup> = groups
            .iter()
            .map(|m: &BTreeMap<String, String>| m.iter().fold(SelectionGroup::new(), |g, (k, v)| g.with(k, v)))
            .collect();
        let mut doc = XmlDocument::new("Status");
        let options = if replace { MergeOptions::exclude().replacing() } else { MergeOptions::exclude() };
        add_selection(&mut doc, &paths(), &groups, options).unwrap();

        let container = "/Status/Filter/And[@dimension_exclude='geo']";
        let and_query = format!("{container}/And");
        prop_assert!(doc.select_str(&and_query).unwrap().is_empty());
        for group in &groups {
            for e in &group.expressions {
                let value = e.value.as_deref().unwrap_or_default();
                let query = format!(
                    "{container}/Or[Expression[@bRef='{b}' and @op='!=' and @value='{value}']]/Expression[@bRef='{b}' and @op='=' and not(@value)]",
                    b = e.b_ref,
                );
                prop_assert!(!doc.select_str(&query).unwrap().is_empty(), "{}", query);
            }
        }
    }

    #[test]
    fn reconcile_is_idempotent(
        included in prop::collection::vec(group_strategy(), 0..4),
        excluded in prop::collection::vec(group_strategy(), 0..3),
        fallback in prop::sample::select(vec!["", "country", "region", "station"]),
    ) {
        let hierarchy = geo();
        let filter = FilterState { included, excluded };
        let level = if filter.is_empty() {
            fallback.to_string()
        } else {
            guess_active_level(&filter, &hierarchy).unwrap()
        };

        let mut once = staging::new_document();
        reconcile(&mut once, &filter, &level, &hierarchy).unwrap();
        let mut twice = once.clone();
        let second = reconcile(&mut twice, &filter, &level, &hierarchy).unwrap();

        prop_assert_eq!(&once, &twice);
        prop_assert!(second.created.is_empty());
        prop_assert!(second.destroyed.is_empty());
        let levels: BTreeSet<String> = staging::input_levels(&twice).into_iter().collect();
        prop_assert_eq!(levels.len(), staging::input_levels(&twice).len());
    }
}

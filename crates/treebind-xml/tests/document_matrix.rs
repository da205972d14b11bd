use proptest::prelude::*;
use treebind_xml::{Path, PathParser, XmlDocument, XmlError, XmlFragment, XmlItem};

fn path(s: &str) -> treebind_xml::Path {
    PathParser::parse(s).unwrap_or_else(|e| panic!("parse failed for '{s}': {e}"))
}

#[test]
fn codec_round_trip_matrix() {
    let cases = [
        r#"<Root/>"#,
        r#"<Root a="1" b="two"><Child/></Root>"#,
        r#"<Root><Text>hello &amp; goodbye</Text></Root>"#,
        r#"<Root note="&quot;quoted&quot; &lt;tag&gt;"/>"#,
        r#"<f:Filter><f:Or bcdDimension="geo"/></f:Filter>"#,
    ];
    for xml in cases {
        let doc = XmlDocument::parse(xml).unwrap_or_else(|e| panic!("parse failed for {xml}: {e}"));
        let reparsed = XmlDocument::parse(&doc.to_xml_string()).unwrap();
        assert_eq!(doc, reparsed, "round trip of {xml}");
    }
}

#[test]
fn codec_text_and_cdata_matrix() {
    let doc = XmlDocument::parse("<Root><A>  x &lt; y  </A><B><![CDATA[a<b]]></B></Root>").unwrap();
    assert_eq!(doc.value_of(&path("/Root/A")).as_deref(), Some("x < y"));
    assert_eq!(doc.value_of(&path("/Root/B")).as_deref(), Some("a<b"));
    assert_eq!(doc.string_value(doc.root()), "x < ya<b");
}

#[test]
fn codec_error_matrix() {
    assert!(matches!(XmlDocument::parse(""), Err(XmlError::Parse(_))));
    assert!(matches!(XmlDocument::parse("<A/><B/>"), Err(XmlError::Parse(_))));
    assert!(matches!(XmlDocument::parse("<A><B></A>"), Err(XmlError::Parse(_))));
}

#[test]
fn detach_keeps_ids_but_unreachable() {
    let mut doc = XmlDocument::parse("<Root><A><B/></A></Root>").unwrap();
    let a = doc.select_node(&path("/Root/A")).unwrap();
    let b = doc.select_node(&path("/Root/A/B")).unwrap();
    assert!(doc.is_attached(b));
    assert!(doc.is_ancestor(a, b));

    doc.remove(a).unwrap();
    assert!(!doc.is_attached(a));
    assert!(!doc.is_attached(b));
    assert_eq!(doc.name(b), Some("B"));
    assert!(doc.select_str("//B").unwrap().is_empty());
    assert_eq!(doc.remove(doc.root()), Err(XmlError::RootRemoval));
}

#[test]
fn purged_slots_are_reused_and_stale_ids_stop_resolving() {
    let mut doc = XmlDocument::parse("<Root><A><B/></A></Root>").unwrap();
    let root = doc.root();
    let a = doc.select_node(&path("/Root/A")).unwrap();
    let b = doc.select_node(&path("/Root/A/B")).unwrap();
    doc.remove(a).unwrap();
    assert_eq!(doc.node_count(), 3);

    assert_eq!(doc.purge_detached(), 2);
    assert_eq!(doc.node_count(), 1);
    assert_eq!(doc.name(a), None);
    assert_eq!(doc.name(b), None);
    assert_eq!(doc.remove(a), Err(XmlError::UnknownNode));

    let slots = doc.arena_len();
    let c = doc.append_child(root, "C").unwrap();
    assert!(c.index() == a.index() || c.index() == b.index());
    assert_eq!(doc.arena_len(), slots);
    assert_eq!(doc.name(c), Some("C"));
    assert_ne!(c, a);
    assert_ne!(c, b);
    assert_eq!(doc.name(a), None);
    assert_eq!(doc.to_xml_string(), "<Root><C/></Root>");
}

#[test]
fn rebuilding_a_subtree_with_purges_keeps_the_arena_bounded() {
    let mut doc = XmlDocument::new("Inputs");
    let root = doc.root();
    for round in 0..50 {
        doc.remove_children(root).unwrap();
        doc.purge_detached();
        for i in 0..3 {
            let input = doc.append_child(root, "Input").unwrap();
            doc.set_attribute(input, "level", &format!("l{i}-{round}")).unwrap();
        }
    }
    assert_eq!(doc.arena_len(), 4);
    assert_eq!(doc.node_count(), 4);
    assert_eq!(doc.select_str("/Inputs/Input/@level").unwrap().len(), 3);
}

#[test]
fn export_import_between_documents() {
    let source = XmlDocument::parse(
        r#"<Filter><And><Expression bRef="country" value="DE"/><Expression bRef="station" value="BER"/></And></Filter>"#,
    )
    .unwrap();
    let group = source.select_node(&path("/Filter/And")).unwrap();
    let fragment = source.export_subtree(group).unwrap();

    let mut target = XmlDocument::new("Edit");
    let root = target.root();
    let copy = target.import_subtree(root, &fragment).unwrap();
    assert_eq!(target.export_subtree(copy), Some(fragment));
    assert_eq!(
        target.to_xml_string(),
        r#"<Edit><And><Expression bRef="country" value="DE"/><Expression bRef="station" value="BER"/></And></Edit>"#
    );
}

#[test]
fn from_fragment_builds_document() {
    let fragment = XmlFragment::new("Values")
        .child(XmlFragment::new("Value").attr("id", "1").text("Berlin"))
        .child(XmlFragment::new("Value").attr("id", "2").text("Paris"));
    let doc = XmlDocument::from_fragment(&fragment);
    assert_eq!(doc.revision(), 0);
    let ids: Vec<_> = doc
        .select_str("/Values/Value/@id")
        .unwrap()
        .iter()
        .filter_map(|i| doc.item_value(i))
        .collect();
    assert_eq!(ids, vec!["1", "2"]);
}

#[test]
fn snapshot_reflects_selection_changes() {
    let mut doc = XmlDocument::parse(r#"<Root><A v="1"/><B v="1"/></Root>"#).unwrap();
    let tracked = path("/Root/A");
    let before = doc.snapshot(&tracked);

    let b = doc.select_node(&path("/Root/B")).unwrap();
    doc.set_attribute(b, "v", "2").unwrap();
    assert_eq!(doc.snapshot(&tracked), before);

    let a = doc.select_node(&tracked).unwrap();
    doc.set_attribute(a, "v", "2").unwrap();
    assert_ne!(doc.snapshot(&tracked), before);

    doc.remove(a).unwrap();
    assert_eq!(doc.snapshot(&tracked), "");
}

#[test]
fn select_attribute_items() {
    let doc = XmlDocument::parse(r#"<Root a="1" b="2"/>"#).unwrap();
    let items = doc.select(&path("/Root/@*"));
    assert_eq!(
        items,
        vec![
            XmlItem::Attribute { owner: doc.root(), name: "a".into() },
            XmlItem::Attribute { owner: doc.root(), name: "b".into() },
        ]
    );
    assert!(doc.select_nodes(&path("/Root/@*")).is_empty());
}

#[test]
fn relative_paths_from_context() {
    let doc = XmlDocument::parse(
        r#"<Wrs><Data><R id="1"><C>Berlin</C><C>Mitte</C></R><R id="2"><C>Paris</C></R></Data></Wrs>"#,
    )
    .unwrap();
    let rows = doc.select_nodes(&path("/Wrs/Data/R"));
    assert_eq!(rows.len(), 2);
    let cells: Vec<_> = doc
        .select_from(rows[0], &path("C"))
        .iter()
        .filter_map(|i| doc.item_value(i))
        .collect();
    assert_eq!(cells, vec!["Berlin", "Mitte"]);
    assert_eq!(doc.value_of_from(rows[1], &path("@id")).as_deref(), Some("2"));
    assert_eq!(doc.value_of_from(rows[1], &path("../../@missing")), None);
}

proptest! {
    #[test]
    fn built_paths_print_and_parse_back(
        names in prop::collection::vec("[A-Za-z][A-Za-z0-9]{0,5}", 1..4),
        attr in "[a-z]{1,4}",
        value in "[A-Za-z0-9 '\"\\\\]{0,8}",
        position in 1usize..4,
    ) {
        let mut path = Path::root();
        for name in &names {
            path = path.child(name);
        }
        let path = path.where_attr(&attr, &value).nth(position).attr(&attr);
        let printed = path.to_string();
        prop_assert_eq!(PathParser::parse(&printed).unwrap(), path);
    }

    #[test]
    fn set_value_survives_serialization(value in "[A-Za-z0-9 <>&'\"=/]{0,12}") {
        let mut doc = XmlDocument::new("Status");
        let target = path("/Status/Station[@kind='main']/@value");
        doc.set_value(&target, &value).unwrap();
        prop_assert_eq!(doc.value_of(&target), Some(value.clone()));
        let reparsed = XmlDocument::parse(&doc.to_xml_string()).unwrap();
        prop_assert_eq!(reparsed.value_of(&target), Some(value));
    }
}

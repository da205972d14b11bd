//! Mutable XML documents addressed by an XPath subset.
//!
//! [`XmlDocument`] is an ordered, mutable element tree. It can be selected
//! from with [`Path`] expressions, grown along a path with
//! [`XmlDocument::create_with_prototype`], and pruned with
//! [`XmlDocument::remove_path`].
//!
//! # Example
//!
//! ```
//! use treebind_xml::{PathParser, XmlDocument};
//!
//! let mut doc = XmlDocument::parse(
//!     r#"<Filter><Or dimension="geo"><And><Expression bRef="country" op="=" value="DE"/></And></Or></Filter>"#,
//! ).unwrap();
//!
//! let path = PathParser::parse("/Filter/Or[@dimension='geo']/And/Expression/@value").unwrap();
//! assert_eq!(doc.value_of(&path).as_deref(), Some("DE"));
//!
//! // Missing steps are created with their attribute predicates as prototype.
//! let station = PathParser::parse("/Filter/Or[@dimension='geo']/And/Expression[@bRef='station']/@value").unwrap();
//! doc.set_value(&station, "BER").unwrap();
//! assert_eq!(doc.select_str("//Expression").unwrap().len(), 2);
//! ```
//!
//! # Grammar
//!
//! ```text
//! path       := '/'? relative | '//' relative
//! relative   := step (('/' | '//') step)*
//! step       := ('.' | '..' | axis? node-test) predicate*
//! axis       := '@' | ('child' | 'descendant' | 'descendant-or-self' | 'parent'
//!                      | 'self' | 'ancestor' | 'ancestor-or-self' | 'attribute') '::'
//! predicate  := '[' or-expr ']'
//! or-expr    := and-expr ('or' and-expr)*
//! and-expr   := unary ('and' unary)*
//! unary      := 'not' '(' or-expr ')' | '(' or-expr ')' | comparison | relative | integer
//! comparison := operand ('=' | '!=') operand
//! ```

mod types;
pub use types::*;

mod parser;
pub use parser::{ParseError, PathParser};

mod eval;
pub use eval::PathEval;

mod document;
pub use document::{NodeId, XmlDocument};

mod fragment;
pub use fragment::XmlFragment;

mod error;
pub use error::XmlError;

mod codec;

mod util;
pub use util::{path_to_string, referenced_attributes};

#[cfg(test)]
mod tests {
    use super::*;

    fn filter_doc() -> XmlDocument {
        XmlDocument::parse(
            r#"<Status>
                 <Filter>
                   <Or dimension="geo">
                     <And>
                       <Expression bRef="country" op="=" value="DE" caption="Germany"/>
                       <Expression bRef="station" op="=" value="BER"/>
                     </And>
                     <And>
                       <Expression bRef="country" op="=" value="FR"/>
                       <Expression bRef="station" op="=" value="PAR"/>
                     </And>
                   </Or>
                   <Expression bRef="year" op="=" value="2024"/>
                 </Filter>
               </Status>"#,
        )
        .unwrap()
    }

    fn values(doc: &XmlDocument, path: &str) -> Vec<String> {
        doc.select_str(path)
            .unwrap()
            .iter()
            .filter_map(|i| doc.item_value(i))
            .collect()
    }

    #[test]
    fn test_parse_root_only() {
        let path = PathParser::parse("/").unwrap();
        assert!(path.absolute);
        assert!(path.steps.is_empty());
    }

    #[test]
    fn test_parse_child_steps() {
        let path = PathParser::parse("/Status/Filter").unwrap();
        assert_eq!(path.steps.len(), 2);
        assert_eq!(path.steps[0].test, NodeTest::Name("Status".into()));
        assert_eq!(path.steps[1].axis, Axis::Child);
    }

    #[test]
    fn test_parse_qualified_names_and_axes() {
        let path = PathParser::parse("f:Filter/ancestor::wrs:Wrs").unwrap();
        assert_eq!(path.steps[0].test, NodeTest::Name("f:Filter".into()));
        assert_eq!(path.steps[1].axis, Axis::Ancestor);
        assert_eq!(path.steps[1].test, NodeTest::Name("wrs:Wrs".into()));
    }

    #[test]
    fn test_parse_predicates() {
        let path = PathParser::parse("Or[@dimension='geo' and not(@x)][2]").unwrap();
        let preds = &path.steps[0].predicates;
        assert_eq!(preds.len(), 2);
        assert!(matches!(preds[0], Predicate::And(_, _)));
        assert_eq!(preds[1], Predicate::Position(2));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(PathParser::parse(""), Err(ParseError::Empty));
        assert!(PathParser::parse("/a[").is_err());
        assert!(PathParser::parse("/a[@b='x").is_err());
        assert_eq!(PathParser::parse("a[0]"), Err(ParseError::ZeroPosition));
        assert!(matches!(PathParser::parse("bogus::a"), Err(ParseError::UnknownAxis(_))));
        assert!(PathParser::parse("a//..").is_err());
    }

    #[test]
    fn test_select_attribute_values() {
        let doc = filter_doc();
        assert_eq!(
            values(&doc, "/Status/Filter/Or[@dimension='geo']/And/Expression[@bRef='country']/@value"),
            vec!["DE", "FR"]
        );
    }

    #[test]
    fn test_select_descendant_and_position() {
        let doc = filter_doc();
        assert_eq!(doc.select_str("//Expression").unwrap().len(), 5);
        assert_eq!(values(&doc, "//Or/And[2]/Expression[1]/@value"), vec!["FR"]);
    }

    #[test]
    fn test_select_ancestor_axis() {
        let doc = filter_doc();
        let free = values(&doc, "//Expression[not(ancestor::Or[@dimension])]/@bRef");
        assert_eq!(free, vec!["year"]);
    }

    #[test]
    fn test_not_equal_is_existential() {
        let doc = filter_doc();
        // `!=` on a missing attribute selects nothing.
        assert!(doc.select_str("//Expression[@caption!='Germany']").unwrap().is_empty());
        assert_eq!(doc.select_str("//Expression[@value!='DE']").unwrap().len(), 4);
    }

    #[test]
    fn test_results_in_document_order() {
        let doc = filter_doc();
        let items = doc.select_str("//Expression/ancestor::*").unwrap();
        let names: Vec<_> = items
            .iter()
            .map(|i| doc.name(i.owner()).unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["Status", "Filter", "Or", "And", "And"]);
    }

    #[test]
    fn test_create_with_prototype_seeds_attributes() {
        let mut doc = XmlDocument::new("Status");
        let path = PathParser::parse("/Status/Filter/Or[@dimension='geo']/And/Expression[@bRef='country' and @op='=']/@value").unwrap();
        let owner = doc.set_value(&path, "DE").unwrap();
        assert_eq!(doc.attribute(owner, "bRef"), Some("country"));
        assert_eq!(doc.attribute(owner, "op"), Some("="));
        assert_eq!(doc.attribute(owner, "value"), Some("DE"));
        assert_eq!(
            doc.to_xml_string(),
            r#"<Status><Filter><Or dimension="geo"><And><Expression bRef="country" op="=" value="DE"/></And></Or></Filter></Status>"#
        );

        // A second call reuses the existing chain.
        doc.set_value(&path, "FR").unwrap();
        assert_eq!(doc.select_str("//Expression").unwrap().len(), 1);
    }

    #[test]
    fn test_create_with_prototype_rejects_unsupported_predicates() {
        let mut doc = XmlDocument::new("Status");
        let path = PathParser::parse("/Status/Item[@a!='x']").unwrap();
        assert!(matches!(
            doc.create_with_prototype(&path),
            Err(XmlError::NotPrototypable(_))
        ));
        let wrong_root = PathParser::parse("/Other/Item").unwrap();
        assert!(matches!(
            doc.create_with_prototype(&wrong_root),
            Err(XmlError::RootMismatch { .. })
        ));
    }

    #[test]
    fn test_remove_path() {
        let mut doc = filter_doc();
        let removed = doc
            .remove_path(&PathParser::parse("//Or/And[Expression/@value='DE']").unwrap())
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(values(&doc, "//Or/And/Expression/@value"), vec!["FR", "PAR"]);
        assert_eq!(doc.remove_path(&PathParser::parse("/Status").unwrap()).unwrap(), 0);
    }

    #[test]
    fn test_revision_tracks_mutations() {
        let mut doc = filter_doc();
        assert_eq!(doc.revision(), 0);
        let root = doc.root();
        doc.set_attribute(root, "a", "1").unwrap();
        assert_eq!(doc.revision(), 1);
        doc.remove_attribute(root, "missing").unwrap();
        assert_eq!(doc.revision(), 1);
    }

    #[test]
    fn test_path_display_round_trip() {
        for input in [
            "/",
            ".",
            "/Status/Filter",
            "//Expression[@bRef='country']/@value",
            "Or[@dimension='geo' and (@a or not(@b))][2]",
            "..",
            "ancestor::And[1]",
            "descendant::Expression",
            "Expression[@value=\"it's\"]",
        ] {
            let parsed = PathParser::parse(input).unwrap();
            let printed = parsed.to_string();
            assert_eq!(PathParser::parse(&printed).unwrap(), parsed, "round trip of {input}");
        }
    }

    #[test]
    fn test_builder_matches_parser() {
        let built = Path::root()
            .child("Status")
            .child("Filter")
            .child("Or")
            .where_attr("dimension", "geo")
            .child("And")
            .nth(1);
        assert_eq!(built, PathParser::parse("/Status/Filter/Or[@dimension='geo']/And[1]").unwrap());
    }
}

//! Golden tests - fixture-based tests that lock expected behavior
//!
//! These tests use JSON fixtures to verify that the protocol-visible URI
//! scheme stays put. Any change in behavior will cause these tests to fail,
//! signaling a breaking change for clients that stored resource URIs.
//!
//! Run with: cargo test --test golden_tests

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;

fn load_fixture<T: for<'de> Deserialize<'de>>(name: &str) -> T {
    let path = format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name);
    let content =
        fs::read_to_string(&path).unwrap_or_else(|_| panic!("Failed to read {} fixture", name));
    serde_json::from_str(&content).expect("Failed to parse fixture JSON")
}

// ============================================================================
// ENTRY SHAPING GOLDEN TESTS
// ============================================================================

mod shaping_golden {
    use super::*;
    use sharepoint_mcp::shaper::shape;
    use sharepoint_mcp::{DriveItem, Entry, ListMeta, Site};

    #[derive(Debug, Deserialize)]
    struct Expected {
        uri: String,
        label: String,
    }

    #[derive(Debug, Deserialize)]
    struct TestCase {
        name: String,
        category: String,
        entity: serde_json::Value,
        expected: Expected,
    }

    #[derive(Debug, Deserialize)]
    struct Fixture {
        test_cases: Vec<TestCase>,
    }

    fn shape_case(case: &TestCase) -> Entry {
        let entity = case.entity.clone();
        match case.category.as_str() {
            "drive_item" => shape(&serde_json::from_value::<DriveItem>(entity).unwrap()),
            "site" => shape(&serde_json::from_value::<Site>(entity).unwrap()),
            "list" => shape(&serde_json::from_value::<ListMeta>(entity).unwrap()),
            other => panic!("Case '{}': unknown category {}", case.name, other),
        }
        .unwrap()
    }

    #[test]
    fn test_entry_shaping_golden() {
        let fixture: Fixture = load_fixture("entry_shaping.json");

        for case in &fixture.test_cases {
            let entry = shape_case(case);
            assert_eq!(entry.uri, case.expected.uri, "Case '{}': uri mismatch", case.name);
            assert_eq!(
                entry.label, case.expected.label,
                "Case '{}': label mismatch",
                case.name
            );
            assert_eq!(
                entry.payload, case.entity,
                "Case '{}': payload must be the untouched entity",
                case.name
            );
        }
    }
}

// ============================================================================
// URI TEMPLATE GOLDEN TESTS
// ============================================================================

mod template_golden {
    use super::*;
    use sharepoint_mcp::mcp::UriTemplate;

    #[derive(Debug, Deserialize)]
    #[serde(untagged)]
    enum Expected {
        NoMatch { no_match: bool },
        Params { params: HashMap<String, String> },
    }

    #[derive(Debug, Deserialize)]
    struct TestCase {
        name: String,
        template: String,
        uri: String,
        expected: Expected,
    }

    #[derive(Debug, Deserialize)]
    struct Fixture {
        test_cases: Vec<TestCase>,
    }

    #[test]
    fn test_uri_template_golden() {
        let fixture: Fixture = load_fixture("uri_templates.json");

        for case in fixture.test_cases {
            let template = UriTemplate::parse(&case.template)
                .unwrap_or_else(|e| panic!("Case '{}': bad template: {}", case.name, e));
            let result = template.matches(&case.uri);

            match case.expected {
                Expected::NoMatch { no_match } => {
                    assert!(no_match);
                    assert!(
                        result.is_none(),
                        "Case '{}': expected no match, got {:?}",
                        case.name,
                        result
                    );
                }
                Expected::Params { params } => {
                    let actual = result
                        .unwrap_or_else(|| panic!("Case '{}': expected a match", case.name));
                    assert_eq!(actual.len(), params.len(), "Case '{}'", case.name);
                    for (key, value) in &params {
                        assert_eq!(
                            actual.get(key),
                            Some(value.as_str()),
                            "Case '{}': param {}",
                            case.name,
                            key
                        );
                    }
                }
            }
        }
    }
}

#![allow(missing_docs)]

use chrono::{DateTime, Utc};
use facet::Facet;
use facet_tier::{Category, TierErrorKind, deep_tier_map};
use indoc::indoc;
use serde_json::{Value, json};

#[derive(Facet, Debug, PartialEq)]
struct LonLat {
    lon: f64,
    lat: f64,
}

#[derive(Facet, Debug, PartialEq)]
struct Address {
    lonlat: LonLat,
    code: i32,
}

#[derive(Facet, Debug, PartialEq)]
struct Person {
    address: Address,
    birth: Option<DateTime<Utc>>,
    age: u8,
    name: String,
}

fn jack() -> Person {
    Person {
        address: Address {
            lonlat: LonLat {
                lon: 0.12,
                lat: 0.10,
            },
            code: 30,
        },
        birth: Some(DateTime::from_timestamp_millis(1425988977384).unwrap()),
        age: 18,
        name: "jack".to_string(),
    }
}

fn scenario_tree() -> Value {
    serde_json::from_str(indoc! {r#"
        {
            "address": { "lonlat": { "lon": 0.12, "lat": 0.10 }, "code": 30 },
            "birth": 1425988977384,
            "age": 18,
            "name": "jack"
        }
    "#})
    .unwrap()
}

#[test]
fn it_works() {
    // one test must pass
}

#[test]
fn deep_tier_map_flattens_qualified_keys() {
    let flat = deep_tier_map(&scenario_tree());

    assert_eq!(flat.get("address.lonlat.lon").unwrap(), &json!(0.12));
    assert_eq!(flat.get("address.code").unwrap(), &json!(30));
    assert_eq!(flat.get("age").unwrap(), &json!(18));
    assert_eq!(flat.get("name").unwrap(), &json!("jack"));
}

#[test]
fn bare_leaf_resolves_by_unique_suffix() {
    let flat = deep_tier_map(&scenario_tree());
    assert_eq!(flat.get("lat").unwrap(), &json!(0.10));
    assert_eq!(flat.get("lon").unwrap(), &json!(0.12));
}

#[test]
fn multiple_suffix_matches_are_ambiguous() {
    let tree = json!({
        "home": { "code": 1 },
        "work": { "code": 2 }
    });
    let flat = deep_tier_map(&tree);
    let error = flat.get("code").unwrap_err();
    match error.kind() {
        TierErrorKind::AmbiguousPath { query, candidates } => {
            assert_eq!(query, "code");
            assert_eq!(candidates.len(), 2);
            assert!(candidates.contains(&"home.code".to_string()));
            assert!(candidates.contains(&"work.code".to_string()));
        }
        other => panic!("expected AmbiguousPath, got {other:?}"),
    }
}

#[test]
fn qualified_query_falls_back_to_bare_leaf() {
    // the key space is flatter than the query
    let flat = deep_tier_map(&json!({"code": 30, "name": "jack"}));
    assert_eq!(flat.get("address.code").unwrap(), &json!(30));

    let tree = json!({"code": 30});
    assert_eq!(
        facet_tier::resolve_tree(&tree, "address.code", '.').unwrap(),
        json!(30)
    );
}

#[test]
fn missing_paths_are_not_found() {
    let flat = deep_tier_map(&scenario_tree());
    assert!(matches!(
        flat.get("address.lonlat.alt").unwrap_err().kind(),
        TierErrorKind::PathNotFound { .. }
    ));
    assert!(matches!(
        flat.get("alt").unwrap_err().kind(),
        TierErrorKind::PathNotFound { .. }
    ));
}

#[test]
fn resolve_path_walks_live_objects() {
    let person = jack();
    assert_eq!(
        facet_tier::resolve_path(&person, "address.lonlat.lon").unwrap(),
        json!(0.12)
    );
    assert_eq!(facet_tier::resolve_path(&person, "age").unwrap(), json!(18));
}

#[test]
fn qualified_and_suffix_forms_agree() {
    let person = jack();
    let qualified = facet_tier::resolve_path(&person, "address.lonlat.lat").unwrap();
    let suffix = facet_tier::resolve_path(&person, "lat").unwrap();
    assert_eq!(qualified, suffix);
    assert_eq!(suffix, json!(0.10));
}

#[test]
fn set_path_rebuilds_the_graph() {
    let person = jack();
    let moved: Person = facet_tier::set_path(&person, "address.lonlat.lon", json!(0.5)).unwrap();
    assert_eq!(moved.address.lonlat.lon, 0.5);
    // untouched siblings survive the rebuild
    assert_eq!(moved.address.lonlat.lat, 0.10);
    assert_eq!(moved.name, "jack");
}

#[test]
fn set_path_preserves_skipped_attributes() {
    #[derive(Facet, Debug)]
    struct Server {
        host: String,
        #[facet(skip)]
        internal_id: u64,
    }

    let server = Server {
        host: "localhost".to_string(),
        internal_id: 9,
    };
    let moved: Server = facet_tier::set_path(&server, "host", json!("remote")).unwrap();
    assert_eq!(moved.host, "remote");
    assert_eq!(moved.internal_id, 9);
}

#[test]
fn set_path_rejects_unknown_segments() {
    let person = jack();
    let error = facet_tier::set_path(&person, "address.missing.lon", json!(1.0)).unwrap_err();
    assert!(matches!(
        error.kind(),
        TierErrorKind::PathNotFound { .. }
    ));
}

#[test]
fn type_at_path_composes_segment_resolution() {
    let descriptor = facet_tier::type_at_path::<Person>("address.lonlat.lat").unwrap();
    assert_eq!(descriptor.category(), Category::Primitive);
    assert!(std::ptr::eq(descriptor.shape(), f64::SHAPE));

    let error = facet_tier::type_at_path::<Person>("address.nowhere").unwrap_err();
    assert!(matches!(
        error.kind(),
        TierErrorKind::AttributeNotFound { .. }
    ));
}

#[test]
fn epoch_birth_renders_as_calendar_text() {
    let person: Person = facet_tier::from_tree(&scenario_tree()).unwrap();
    let birth = person.birth.unwrap();
    assert_eq!(birth.timestamp_millis(), 1425988977384);
    assert_eq!(
        facet_tier::stringify(&birth).unwrap(),
        "2015-03-10 20:02:57"
    );
}

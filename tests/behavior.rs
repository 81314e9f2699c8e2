#![allow(missing_docs)]

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use facet::Facet;
use facet_tier::NULL_STR;
use serde_json::json;

#[derive(Facet, Debug, PartialEq)]
struct LonLat {
    lon: f64,
    lat: f64,
}

#[test]
fn it_works() {
    // one test must pass
}

#[test]
fn absent_optionals_render_as_null_text() {
    let absent: Option<u8> = None;
    assert_eq!(facet_tier::stringify(&absent).unwrap(), NULL_STR);

    let present: Option<u8> = Some(7);
    assert_eq!(facet_tier::stringify(&present).unwrap(), "7");
}

#[test]
fn beans_render_with_type_and_attributes() {
    let point = LonLat {
        lon: 0.12,
        lat: 0.10,
    };
    assert_eq!(
        facet_tier::stringify(&point).unwrap(),
        "LonLat{lon=0.12, lat=0.1}"
    );
}

#[test]
fn sequences_render_bracketed() {
    let values = vec![1u8, 2, 3];
    assert_eq!(facet_tier::stringify(&values).unwrap(), "[1, 2, 3]");
}

#[test]
fn keyed_mappings_render_braced() {
    let entries = BTreeMap::from([("a".to_string(), 1u8)]);
    assert_eq!(facet_tier::stringify(&entries).unwrap(), "{a=1}");
}

#[test]
fn enums_render_as_variant_names() {
    #[derive(Facet, Debug)]
    #[repr(u8)]
    enum Mode {
        Active,
        Passive,
    }
    let _ = Mode::Active;
    assert_eq!(facet_tier::stringify(&Mode::Passive).unwrap(), "Passive");
}

#[test]
fn dates_render_as_calendar_text() {
    let birth: DateTime<Utc> = DateTime::from_timestamp_millis(1425988977384).unwrap();
    assert_eq!(
        facet_tier::stringify(&birth).unwrap(),
        "2015-03-10 20:02:57"
    );
}

#[test]
fn export_produces_a_value_tree() {
    #[derive(Facet, Debug)]
    struct Person {
        name: String,
        age: u8,
        home: LonLat,
        birth: Option<DateTime<Utc>>,
    }

    let tree = facet_tier::to_tree(&Person {
        name: "jack".to_string(),
        age: 18,
        home: LonLat {
            lon: 0.12,
            lat: 0.10,
        },
        birth: Some(DateTime::from_timestamp_millis(1425988977384).unwrap()),
    })
    .unwrap();

    assert_eq!(
        tree,
        json!({
            "name": "jack",
            "age": 18,
            "home": { "lon": 0.12, "lat": 0.10 },
            "birth": 1425988977384_i64
        })
    );
}

#[test]
fn mapping_hashes_ignore_keys_and_order() {
    let left = BTreeMap::from([("a".to_string(), 1u8), ("b".to_string(), 2)]);
    let right = BTreeMap::from([("x".to_string(), 2u8), ("y".to_string(), 1)]);
    // same value multiset under different keys and ordering
    assert_eq!(
        facet_tier::deep_hash(&left).unwrap(),
        facet_tier::deep_hash(&right).unwrap()
    );

    let other = BTreeMap::from([("a".to_string(), 1u8), ("b".to_string(), 3)]);
    assert_ne!(
        facet_tier::deep_hash(&left).unwrap(),
        facet_tier::deep_hash(&other).unwrap()
    );
}

#[test]
fn sequence_hashes_are_order_sensitive() {
    let forward = vec![1u8, 2, 3];
    let backward = vec![3u8, 2, 1];
    assert_ne!(
        facet_tier::deep_hash(&forward).unwrap(),
        facet_tier::deep_hash(&backward).unwrap()
    );
}

#[test]
fn deep_eq_is_reflexive_and_structural() {
    let point = LonLat {
        lon: 0.12,
        lat: 0.10,
    };
    assert!(facet_tier::deep_eq(&point, &point).unwrap());

    let other = LonLat {
        lon: 0.12,
        lat: 0.11,
    };
    assert!(!facet_tier::deep_eq(&point, &other).unwrap());
}

#[test]
fn different_shapes_are_unequal_not_an_error() {
    let narrow: u8 = 5;
    let wide: u16 = 5;
    assert!(!facet_tier::deep_eq(&narrow, &wide).unwrap());
}

#[test]
fn equal_values_hash_equal() {
    let point = LonLat {
        lon: 0.12,
        lat: 0.10,
    };
    let clone: LonLat = facet_tier::from_tree(&facet_tier::to_tree(&point).unwrap()).unwrap();
    assert!(facet_tier::deep_eq(&point, &clone).unwrap());
    assert_eq!(
        facet_tier::deep_hash(&point).unwrap(),
        facet_tier::deep_hash(&clone).unwrap()
    );
}

#[test]
fn non_finite_floats_export_as_null() {
    assert_eq!(facet_tier::to_tree(&f64::NAN).unwrap(), json!(null));
    assert_eq!(facet_tier::to_tree(&f64::INFINITY).unwrap(), json!(null));
}

#[test]
fn smart_pointers_hash_like_their_pointee() {
    let plain: u8 = 7;
    let boxed: Box<u8> = Box::new(7);
    assert_eq!(
        facet_tier::deep_hash(&plain).unwrap(),
        facet_tier::deep_hash(&boxed).unwrap()
    );
    assert_eq!(facet_tier::stringify(&boxed).unwrap(), "7");
}

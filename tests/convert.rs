#![allow(missing_docs)]

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use facet::Facet;
use facet_tier::{Category, TierErrorKind};
use serde_json::json;

#[test]
fn it_works() {
    // one test must pass
}

#[test]
fn keyed_mapping_of_collections_converts_recursively() {
    let tree = json!({"1": [1.5, 2.5], "2": [3.5]});
    let converted: BTreeMap<u8, Vec<f32>> = facet_tier::from_tree(&tree).unwrap();

    assert_eq!(converted[&1], vec![1.5, 2.5]);
    assert_eq!(converted[&2], vec![3.5]);

    assert_eq!(Category::of_shape(u8::SHAPE), Category::Primitive);
    assert_eq!(Category::of_shape(<Vec<f32>>::SHAPE), Category::Collection);
    assert_eq!(Category::of_shape(f32::SHAPE), Category::Primitive);
}

#[test]
fn dynamic_resolution_builds_from_a_shape() {
    let tree = json!({"1": [1.5], "2": []});
    let heap_value = facet_tier::resolve_shape(<BTreeMap<u8, Vec<f32>>>::SHAPE, &tree).unwrap();
    let converted: BTreeMap<u8, Vec<f32>> = heap_value.materialize().unwrap();
    assert_eq!(converted[&1], vec![1.5]);
    assert!(converted[&2].is_empty());
}

#[test]
fn beans_convert_field_by_field() {
    #[derive(Facet, Debug, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
        label: String,
    }

    let point: Point =
        facet_tier::from_tree(&json!({"x": 3, "y": -4, "label": "origin-ish"})).unwrap();
    assert_eq!(
        point,
        Point {
            x: 3,
            y: -4,
            label: "origin-ish".to_string()
        }
    );
}

#[test]
fn unmentioned_fields_default() {
    #[derive(Facet, Debug)]
    struct Config {
        host: String,
        port: u16,
        retries: Option<u8>,
    }

    let config: Config = facet_tier::from_tree(&json!({"host": "localhost"})).unwrap();
    assert_eq!(config.host, "localhost");
    assert_eq!(config.port, 0);
    assert_eq!(config.retries, None);
}

#[test]
fn null_fills_optionals_only() {
    #[derive(Facet, Debug)]
    struct Holder {
        value: Option<u8>,
    }

    let holder: Holder = facet_tier::from_tree(&json!({"value": null})).unwrap();
    assert_eq!(holder.value, None);

    let error = facet_tier::from_tree::<u8>(&json!(null)).unwrap_err();
    assert!(matches!(
        error.kind(),
        TierErrorKind::UnresolvableConversion { .. }
    ));
}

#[test]
fn enums_convert_by_variant_name() {
    #[derive(Facet, Debug, PartialEq)]
    #[repr(u8)]
    enum Mode {
        Active,
        Passive,
    }

    let mode: Mode = facet_tier::from_tree(&json!("Passive")).unwrap();
    assert_eq!(mode, Mode::Passive);

    let error = facet_tier::from_tree::<Mode>(&json!(3)).unwrap_err();
    assert!(matches!(
        error.kind(),
        TierErrorKind::UnresolvableConversion { .. }
    ));
}

#[test]
fn fixed_arrays_are_length_checked() {
    let values: [u8; 3] = facet_tier::from_tree(&json!([1, 2, 3])).unwrap();
    assert_eq!(values, [1, 2, 3]);

    let error = facet_tier::from_tree::<[u8; 3]>(&json!([1, 2])).unwrap_err();
    assert!(matches!(
        error.kind(),
        TierErrorKind::UnsupportedShape { .. }
    ));
}

#[test]
fn auto_exchange_bridges_scalar_kinds() {
    // text to number
    let n: u8 = facet_tier::from_tree(&json!("42")).unwrap();
    assert_eq!(n, 42);

    // number to text
    let s: String = facet_tier::from_tree(&json!(42)).unwrap();
    assert_eq!(s, "42");

    // text to boolean
    let b: bool = facet_tier::from_tree(&json!("true")).unwrap();
    assert!(b);
}

#[test]
fn out_of_range_numbers_fail_assignment() {
    let error = facet_tier::from_tree::<u8>(&json!(300)).unwrap_err();
    assert!(matches!(
        error.kind(),
        TierErrorKind::ValueAssignment { .. }
    ));
}

#[test]
fn scalars_never_convert_into_beans() {
    #[derive(Facet, Debug)]
    struct Point {
        x: i32,
        y: i32,
    }

    let error = facet_tier::from_tree::<Point>(&json!(5)).unwrap_err();
    assert!(matches!(
        error.kind(),
        TierErrorKind::UnresolvableConversion { .. }
    ));
}

#[test]
fn epoch_milliseconds_convert_into_dates() {
    let date: DateTime<Utc> = facet_tier::from_tree(&json!(1425988977384_i64)).unwrap();
    assert_eq!(date.timestamp_millis(), 1425988977384);
}

#[test]
fn calendar_text_converts_into_dates() {
    // the canonical rendering is fixed at UTC+8
    let date: DateTime<Utc> = facet_tier::from_tree(&json!("2015-03-10 20:02:57")).unwrap();
    assert_eq!(date.timestamp_millis(), 1425988977000);
}

#[test]
fn smart_pointers_convert_through_their_pointee() {
    let boxed: Box<u8> = facet_tier::from_tree(&json!(7)).unwrap();
    assert_eq!(*boxed, 7);
}

use rstest::rstest;
use serde_json::json;
use std::collections::BTreeSet;
use std::fs;
use stockflow_core::dimension::{Broadcaster, ShapeDeclaration};
use stockflow_core::equation::EquationRef;
use stockflow_core::merge::{MergeEngine, MergeOptions};
use stockflow_core::normalize::{Normalizer, RawField, RawLogics};
use stockflow_core::registry::ShapeSpec;
use stockflow_core::store::{Category, FieldBody, FieldPool, ShapeGroup, Value};
use stockflow_core::{ComposeError, Composer, EngineConfig, ModelRegistry, ModelSource, NoticeKind};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn logics(value: serde_json::Value) -> RawLogics {
    RawLogics::from_json(value).unwrap()
}

fn set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn pool(value: serde_json::Value) -> FieldPool {
    let mut pool = Normalizer::default().normalize(logics(value)).unwrap().pool;
    Broadcaster::default().broadcast(&mut pool, &ShapeDeclaration::new()).unwrap();
    pool
}

#[test]
fn test_population_growth_end_to_end() {
    init_tracing();
    let source = ModelSource::new(
        "Growth",
        logics(json!({
            "parameter": { "rate": 0.02 },
            "differential_variable": { "population": "population * rate" }
        })),
    );

    let model = Composer::default().compose(source).unwrap();
    let deps = model.dependencies("population").unwrap();
    assert_eq!(deps.parameter_names, set(&["rate"]));
    assert_eq!(deps.state_names, set(&["population"]));
    assert!(deps.equation_names.is_empty());
    assert_eq!(model.field("population").unwrap().shape_group(), Some(ShapeGroup::Scalar));
    assert_eq!(model.field("rate").unwrap().shape_group(), Some(ShapeGroup::Scalar));
}

#[test]
fn test_override_moves_delta_and_reclassifies_readers() {
    init_tracing();
    let base = ModelSource::new(
        "Solow",
        logics(json!({
            "parameter": { "delta": 0.05, "investment": 1.0 },
            "differential_variable": { "K": { "equation": "investment - delta * K", "initial": 3.0 } }
        })),
    );
    let overlay = ModelSource::new(
        "Depreciation",
        logics(json!({
            "statevar": { "delta": "0.05 * utilization" },
            "param": { "utilization": 0.8 }
        })),
    );

    let composer = Composer::new(EngineConfig::default());
    let model = composer.compose_all(base, [overlay]).unwrap();

    assert_eq!(model.pool().category_of("delta"), Some(Category::StateVariable));
    assert_eq!(model.pool().category(Category::Parameter).filter(|f| f.name == "delta").count(), 0);

    let k = model.dependencies("K").unwrap();
    assert_eq!(k.equation_names, set(&["delta"]));
    assert_eq!(k.parameter_names, set(&["investment"]));
    assert_eq!(model.dependencies("delta").unwrap().parameter_names, set(&["utilization"]));
    assert!(model.merge_report().is_clean());
}

fn sectors_base() -> ModelSource {
    ModelSource::new(
        "Sectors",
        logics(json!({
            "size_group": { "Nprod": ["food", "steel", "energy"] },
            "parameter": { "rate": 0.02, "p": [1.0, 2.0, 3.0] }
        })),
    )
    .with_shapes(ShapeSpec { declaration: ShapeDeclaration::new().with(ShapeGroup::Vector, ["p"]), dims: None })
}

#[test]
fn test_shaped_donor_keeps_base_definitions() {
    init_tracing();
    let overlay = ModelSource::new("Output", logics(json!({ "state_variable": { "q": "p * rate" } }))).with_shapes(
        ShapeSpec {
            declaration: ShapeDeclaration::new()
                .with(ShapeGroup::Vector, ["q"])
                .with(ShapeGroup::Scalar, ["rate"]),
            dims: None,
        },
    );

    let model = Composer::default().compose_all(sectors_base(), [overlay]).unwrap();
    assert_eq!(
        model.field("Nprod").unwrap().body,
        FieldBody::SizeGroup { labels: vec!["food".into(), "steel".into(), "energy".into()] }
    );
    assert_eq!(model.field("rate").unwrap().body, FieldBody::Parameter { value: Some(Value::Scalar(0.02)) });

    let q = model.field("q").unwrap();
    assert_eq!(q.shape_group(), Some(ShapeGroup::Vector));
    assert_eq!(q.shape.as_ref().unwrap().dims.as_slice(), ["Nprod"]);
    assert_eq!(model.dependencies("q").unwrap().parameter_names, set(&["p", "rate"]));

    assert!(model.merge_report().is_clean());
    assert!(!model.notices().iter().any(|n| n.kind == NoticeKind::SynthesizedField), "{:?}", model.notices());
}

#[test]
fn test_shaped_donor_fills_gaps_after_merge() {
    let base = ModelSource::new("Toy", logics(json!({ "parameter": { "k": 1.0 } })));
    let overlay = ModelSource::new("Vec", logics(json!({ "parameter": { "q": [0.5] } }))).with_shapes(ShapeSpec {
        declaration: ShapeDeclaration::new().with(ShapeGroup::Vector, ["q"]).with(ShapeGroup::Scalar, ["ghost"]),
        dims: None,
    });

    let model = Composer::default().compose_all(base, [overlay]).unwrap();
    assert_eq!(model.field("Nprod").unwrap().body, FieldBody::SizeGroup { labels: vec!["0".into()] });
    assert_eq!(model.field("ghost").unwrap().body, FieldBody::Parameter { value: None });
    assert_eq!(model.field("ghost").unwrap().shape_group(), Some(ShapeGroup::Scalar));
    let synthesized: Vec<_> = model
        .notices()
        .iter()
        .filter(|n| n.kind == NoticeKind::SynthesizedField)
        .filter_map(|n| n.field.as_deref())
        .collect();
    assert_eq!(synthesized, ["ghost", "Nprod"]);
}

#[test]
fn test_normalization_is_idempotent() {
    let raw = logics(json!({
        "parameters": { "alpha": { "val": 0.02, "com": "growth" } },
        "size": { "Nprod": 2 },
        "ODEs": { "a": { "func": "a * alpha", "init": 1.0 } },
        "state_variable": { "w": { "equation": { "args": ["a"], "expr": "a * 2" }, "Unit": "$" } }
    }));

    let normalizer = Normalizer::default();
    let first = normalizer.normalize(raw).unwrap();
    assert!(!first.notices.is_empty());

    let second = normalizer.normalize(first.logics.clone()).unwrap();
    assert!(second.notices.is_empty(), "Notices: {:?}", second.notices);
    assert_eq!(second.logics, first.logics);
    assert_eq!(second.pool, first.pool);
}

#[test]
fn test_synonyms_round_trip_to_canonical_pool() {
    let legacy = logics(json!({
        "param": { "k": { "val": 2.0, "com": "gain", "unit": "1/y", "def": "gain", "latex": "k" } },
        "sizes": { "Nprod": { "labels": ["a", "b"] } },
        "statevars": { "y": { "func": "k * x" } },
        "differentials": { "x": { "f": "y - x", "ini": 0.5 } }
    }));
    let canonical = logics(json!({
        "parameter": { "k": { "value": 2.0, "comment": "gain", "units": "1/y", "definition": "gain", "symbol": "k" } },
        "size_group": { "Nprod": { "list": ["a", "b"] } },
        "state_variable": { "y": { "equation": "k * x" } },
        "differential_variable": { "x": { "equation": "y - x", "initial": 0.5 } }
    }));

    let normalizer = Normalizer::default();
    let from_legacy = normalizer.normalize(legacy).unwrap();
    let from_canonical = normalizer.normalize(canonical).unwrap();
    assert_eq!(from_legacy.pool, from_canonical.pool);
    assert!(from_canonical.notices.is_empty());
    assert!(from_legacy.notices.iter().any(|n| n.kind == NoticeKind::CategorySynonym));
    assert!(from_legacy.notices.iter().any(|n| n.kind == NoticeKind::KeySynonym));
}

#[test]
fn test_dimension_completeness() {
    let source = ModelSource::new(
        "Sectors",
        logics(json!({
            "parameter": { "p": [1.0, 2.0], "a": [[1.0, 0.0], [0.0, 1.0]], "tau": 0.3 },
            "size_group": { "Nprod": ["food", "steel"] },
            "state_variable": { "cost": "p * tau" }
        })),
    )
    .with_shapes(ShapeSpec {
        declaration: ShapeDeclaration::new()
            .with(ShapeGroup::Scalar, ["tau"])
            .with(ShapeGroup::Matrix, ["a"]),
        dims: None,
    });

    let model = Composer::default().compose(source).unwrap();
    let pool = model.pool();
    assert_eq!(pool.get("p").unwrap().shape_group(), Some(ShapeGroup::Vector));
    assert_eq!(pool.get("cost").unwrap().shape_group(), Some(ShapeGroup::Vector));
    assert_eq!(pool.get("a").unwrap().shape_group(), Some(ShapeGroup::Matrix));
    assert_eq!(pool.get("tau").unwrap().shape_group(), Some(ShapeGroup::Scalar));

    for field in pool.fields() {
        let shape = field.shape.as_ref().unwrap();
        for dim in &shape.dims {
            assert_eq!(pool.category_of(dim), Some(Category::SizeGroup), "Dimension '{}' of '{}'", dim, field.name);
        }
    }
}

#[test]
fn test_merge_commutes_without_shared_names() {
    let a = pool(json!({ "parameter": { "k": 1.0 }, "state_variable": { "y": "k * 2" } }));
    let b = pool(json!({ "parameter": { "m": 3.0 }, "differential_variable": { "x": "m - x" } }));
    let engine = MergeEngine::default();

    let mut ab = a.clone();
    engine.merge(&mut ab, b.clone()).unwrap();
    let mut ba = b;
    engine.merge(&mut ba, a).unwrap();
    assert_eq!(ab, ba);
}

#[rstest]
#[case(true, 2.0)]
#[case(false, 1.0)]
fn test_merge_override_determinism(#[case] override_existing: bool, #[case] expected: f64) {
    let a = pool(json!({ "parameter": { "k": 1.0, "a_only": 0.0 } }));
    let b = pool(json!({ "parameter": { "k": 2.0, "b_only": 0.0 } }));
    let options = MergeOptions { override_existing, ..Default::default() };

    let mut merged = a;
    let report = MergeEngine::new(options).merge(&mut merged, b).unwrap();
    assert_eq!(merged.get("k").unwrap().body, FieldBody::Parameter { value: Some(Value::Scalar(expected)) });
    assert_eq!(report.conflicts.len(), usize::from(!override_existing));
    assert_eq!(merged.len(), 3);
}

#[test]
fn test_strict_merge_lists_every_conflict() {
    let base = ModelSource::new("A", logics(json!({ "parameter": { "k": 1.0, "m": 1.0 } })));
    let donor = ModelSource::new("B", logics(json!({ "parameter": { "k": 2.0 }, "state_variable": { "m": "k" } })));

    let mut config = EngineConfig::default();
    config.merge = MergeOptions { override_existing: false, strict: true, record_changes: false };

    match Composer::new(config).compose_all(base, [donor]) {
        Err(ComposeError::MergeConflict { conflicts }) => {
            let names: Vec<&str> = conflicts.iter().map(|c| c.field.as_str()).collect();
            assert_eq!(names, ["k", "m"]);
            assert_eq!(conflicts[1].donor_category, Category::StateVariable);
        }
        other => panic!("Unexpected result: {:?}", other.map(|m| m.name().to_string())),
    }
}

#[test]
fn test_closure_equations_classify_like_expressions() {
    let raw = RawLogics::new()
        .with("parameter", "rate", 0.02)
        .with(
            "differential_variable",
            "population",
            RawField::from(EquationRef::from_fn(["population", "rate"], |a| a[0] * a[1])).set("initial", 1.0),
        );

    let model = Composer::default().compose(ModelSource::new("Closure", raw)).unwrap();
    let population = model.field("population").unwrap();
    assert_eq!(population.equation().unwrap().evaluate(&[10.0, 0.5]).unwrap(), 5.0);
    assert_eq!(model.dependencies("population").unwrap().state_names, set(&["population"]));
}

#[test]
fn test_registry_on_disk() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("growth")).unwrap();
    fs::write(
        dir.path().join("growth/_model_Growth.json"),
        json!({
            "description": "Exponential growth",
            "logics": {
                "parameter": { "rate": 0.02 },
                "differential_variable": { "population": { "equation": "population * rate", "initial": 1.0 } }
            },
            "presets": { "fast": { "fields": { "rate": 0.1 }, "com": "fast growth" } }
        })
        .to_string(),
    )
    .unwrap();
    fs::write(
        dir.path().join("_model_Births.json"),
        json!({ "logics": { "state_variable": { "births": "population * rate" } } }).to_string(),
    )
    .unwrap();

    let registry = ModelRegistry::discover(EngineConfig::default().with_roots([dir.path()])).unwrap();
    assert_eq!(registry.names(), ["Births", "Growth"]);

    let mut model = registry.compose_with("Growth", &["Births"]).unwrap();
    assert_eq!(model.source().description, "Exponential growth");
    assert_eq!(model.dependencies("births").unwrap().state_names, set(&["population"]));

    assert!(model.apply_preset("fast").unwrap().is_empty());
    assert_eq!(model.field("rate").unwrap().body, FieldBody::Parameter { value: Some(Value::Scalar(0.1)) });

    let plan = model.evaluation_plan().unwrap();
    assert_eq!(plan.state_order, ["births"]);
    assert_eq!(plan.unused_state_variables, ["births"]);
}

#[test]
fn test_registry_duplicate_models_across_roots() {
    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();
    for root in [a.path(), b.path()] {
        fs::write(root.join("_model_Goodwin.json"), r#"{"logics": {}}"#).unwrap();
    }

    let err = ModelRegistry::discover(EngineConfig::default().with_roots([a.path(), b.path()])).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains(&a.path().join("_model_Goodwin.json").display().to_string()), "Msg: {}", msg);
    assert!(msg.contains(&b.path().join("_model_Goodwin.json").display().to_string()), "Msg: {}", msg);
}

#[test]
fn test_cycle_is_reported_by_the_plan() {
    let source = ModelSource::new(
        "Loop",
        logics(json!({ "state_variable": { "wage": "price * 2", "price": "wage / 2" } })),
    );
    let model = Composer::default().compose(source).unwrap();
    match model.evaluation_plan() {
        Err(ComposeError::Cycle { cycles }) => assert_eq!(cycles, vec![vec!["price".to_string(), "wage".to_string()]]),
        other => panic!("Unexpected result: {:?}", other),
    }
}

#[test]
fn test_unresolved_argument_fails_composition() {
    let source = ModelSource::new("Broken", logics(json!({ "state_variable": { "y": "k * 2" } })));
    let err = Composer::default().compose(source).unwrap_err();
    assert!(matches!(err, ComposeError::UnresolvedDependency { ref field, ref argument } if field == "y" && argument == "k"));
}

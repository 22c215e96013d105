// tests/topology_queries.rs

//! Integration tests for topology queries: feature sets, transitive
//! inbound resolution, and error reporting.

mod common;

use stagekit::topology::{parse_doc, Topology};
use stagekit::Error;

#[test]
fn test_stage_features_are_sorted_union_of_produced_and_inbound() {
    let topology = common::sample_topology();

    // math-libs produces BLAS and inherits CORE from foundation
    let features = topology.stage_features("math-libs").unwrap();
    assert_eq!(
        features.into_iter().collect::<Vec<_>>(),
        vec!["BLAS", "CORE"],
        "features are the sorted, deduplicated union"
    );
}

#[test]
fn test_root_stage_has_no_inbound_artifacts() {
    let topology = common::sample_topology();
    assert!(
        topology.inbound_artifacts("foundation").unwrap().is_empty(),
        "a stage with no inbound dependencies needs nothing"
    );
}

#[test]
fn test_chain_resolves_transitively_exactly_once() {
    // A -> B -> C: C sees everything A and B produce, each exactly once
    let doc = parse_doc(
        r#"
        [stages.a]
        artifacts = ["a-lib"]
        [stages.b]
        inbound = ["a"]
        artifacts = ["b-lib"]
        [stages.c]
        inbound = ["b"]
        artifacts = ["c-lib"]

        [artifacts.a-lib]
        feature = "A"
        [artifacts.b-lib]
        feature = "B"
        [artifacts.c-lib]
        feature = "C"
        "#,
    )
    .unwrap();
    let topology = Topology::from_doc(doc).unwrap();

    let inbound = topology.inbound_artifacts("c").unwrap();
    assert_eq!(
        inbound.into_iter().collect::<Vec<_>>(),
        vec!["a-lib", "b-lib"]
    );
}

#[test]
fn test_diamond_does_not_duplicate() {
    // frameworks reaches foundation through both math-libs and compilers
    let topology = common::sample_topology();
    let inbound = topology.inbound_artifacts("frameworks").unwrap();
    assert_eq!(
        inbound.into_iter().collect::<Vec<_>>(),
        vec!["blas-lib", "core-lib", "device-compiler"]
    );

    let features = topology.stage_features("frameworks").unwrap();
    assert_eq!(
        features.into_iter().collect::<Vec<_>>(),
        vec!["BLAS", "COMPILER", "CORE", "FRAMEWORKS"]
    );
}

#[test]
fn test_unknown_stage_is_a_config_error_naming_alternatives() {
    let topology = common::sample_topology();
    let err = topology.stage_features("ml-frameworks").unwrap_err();
    assert!(matches!(err, Error::UnknownStage { .. }));
    let message = err.to_string();
    assert!(
        message.contains("ml-frameworks") && message.contains("frameworks"),
        "error should name the bad stage and the alternatives: {message}"
    );
}

#[test]
fn test_topology_loads_from_disk() {
    let (_temp, path) = common::write_sample_topology();
    let topology = Topology::load(&path).unwrap();
    assert_eq!(
        topology.stage_names(),
        vec!["compilers", "foundation", "frameworks", "math-libs"]
    );
}

#[test]
fn test_missing_topology_file_is_fatal() {
    let err = Topology::load(std::path::Path::new("/nonexistent/topology.toml")).unwrap_err();
    assert!(matches!(err, Error::ConfigError(_)), "got: {err}");
}

//! Manifest-to-graph tests over a realistic project layout

use breakcheck_dbt::{DependencyGraph, ManifestFile, NodeSource};
use pretty_assertions::assert_eq;
use std::path::Path;

const MANIFEST: &str = r#"{
    "metadata": {"dbt_schema_version": "https://schemas.getdbt.com/dbt/manifest/v11.json", "dbt_version": "1.7.0"},
    "nodes": {
        "model.jaffle.stg_customers": {
            "unique_id": "model.jaffle.stg_customers",
            "name": "stg_customers",
            "resource_type": "model",
            "original_file_path": "models/staging/stg_customers.sql",
            "depends_on": {"nodes": ["source.jaffle.raw.customers"]}
        },
        "model.jaffle.stg_orders": {
            "unique_id": "model.jaffle.stg_orders",
            "name": "stg_orders",
            "resource_type": "model",
            "original_file_path": "models/staging/stg_orders.sql",
            "depends_on": {"nodes": ["source.jaffle.raw.orders"]}
        },
        "model.jaffle.customers": {
            "unique_id": "model.jaffle.customers",
            "name": "customers",
            "resource_type": "model",
            "original_file_path": "models/marts/customers.sql",
            "depends_on": {"nodes": ["model.jaffle.stg_customers", "model.jaffle.stg_orders"]}
        },
        "model.jaffle.customer_ltv": {
            "unique_id": "model.jaffle.customer_ltv",
            "name": "customer_ltv",
            "resource_type": "model",
            "original_file_path": "models/marts/customer_ltv.sql",
            "depends_on": {"nodes": ["model.jaffle.customers"]}
        },
        "test.jaffle.unique_customers_id": {
            "unique_id": "test.jaffle.unique_customers_id",
            "name": "unique_customers_id",
            "resource_type": "test",
            "depends_on": {"nodes": ["model.jaffle.customers"]}
        },
        "seed.jaffle.country_codes": {
            "unique_id": "seed.jaffle.country_codes",
            "name": "country_codes",
            "resource_type": "seed",
            "depends_on": {"nodes": []}
        }
    }
}"#;

fn write_project(dir: &Path, manifest: &str) {
    std::fs::create_dir_all(dir.join("target")).unwrap();
    std::fs::write(dir.join("target").join("manifest.json"), manifest).unwrap();
}

fn load_graph(dir: &Path) -> DependencyGraph {
    let nodes = ManifestFile::in_project(dir).load_nodes().unwrap();
    DependencyGraph::build(&nodes)
}

#[test]
fn tests_and_seeds_are_not_vertices() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path(), MANIFEST);
    let graph = load_graph(dir.path());

    assert!(!graph.contains("test.jaffle.unique_customers_id"));
    assert!(!graph.contains("seed.jaffle.country_codes"));
    assert!(graph.contains("source.jaffle.raw.orders"));
}

#[test]
fn staging_change_reaches_marts() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path(), MANIFEST);
    let graph = load_graph(dir.path());

    let changed = graph.nodes_for_file("models/staging/stg_orders.sql");
    assert_eq!(changed, vec!["model.jaffle.stg_orders"]);

    let affected: Vec<String> = graph.affected_by(changed).into_iter().collect();
    assert_eq!(
        affected,
        vec!["model.jaffle.customer_ltv".to_string(), "model.jaffle.customers".to_string()]
    );
}

#[test]
fn project_in_repository_subfolder() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path(), MANIFEST);
    let graph = load_graph(dir.path());

    assert_eq!(
        graph.nodes_for_file("warehouse/models/marts/customers.sql"),
        vec!["model.jaffle.customers"]
    );
}

#[test]
fn healthy_project_has_no_cycles() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path(), MANIFEST);
    assert!(load_graph(dir.path()).find_cycles().is_empty());
}

#[test]
fn cyclic_manifest_reports_cycle() {
    let dir = tempfile::tempdir().unwrap();
    write_project(
        dir.path(),
        r#"{"nodes": {
            "model.p.a": {"resource_type": "model", "depends_on": {"nodes": ["model.p.c"]}},
            "model.p.b": {"resource_type": "model", "depends_on": {"nodes": ["model.p.a"]}},
            "model.p.c": {"resource_type": "model", "depends_on": {"nodes": ["model.p.b"]}}
        }}"#,
    );

    let cycles = load_graph(dir.path()).find_cycles();
    assert_eq!(
        cycles,
        vec![vec![
            "model.p.a".to_string(),
            "model.p.b".to_string(),
            "model.p.c".to_string()
        ]]
    );
}

#[test]
fn empty_manifest_has_empty_graph() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path(), r#"{"nodes": {}}"#);
    let graph = load_graph(dir.path());

    assert!(graph.is_empty());
    assert!(graph.find_cycles().is_empty());
    assert!(graph.affected_by(["model.p.a"]).is_empty());
}

//! Unit tests for the dependency walker

use super::*;
use crate::marker::VisitState;
use proptest::prelude::*;
use sprig_core::types::{DefaultConstraintProvider, PackageId, VersionRange};
use sprig_repository::MemoryRepository;

fn pkg(id: &str, version: &str) -> Package {
    Package::parse(id, version).unwrap()
}

fn dep(id: &str, range: Option<&str>) -> Dependency {
    Dependency::parse(id, range).unwrap()
}

/// Route `tracing` output to the test harness
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("sprig_resolver=debug")
        .with_test_writer()
        .try_init();
}

fn names(packages: &[Package]) -> Vec<String> {
    packages.iter().map(|p| p.identity().to_string()).collect()
}

fn walker(packages: Vec<Package>, options: WalkOptions) -> DependencyWalker {
    let repository = MemoryRepository::new("memory").with_packages(packages);
    DependencyWalker::new(Arc::new(repository), options)
}

fn diamond() -> Vec<Package> {
    vec![
        pkg("App", "1.0.0")
            .with_dependency(dep("Web", Some("1.0")))
            .with_dependency(dep("Data", Some("1.0"))),
        pkg("Web", "1.0.0").with_dependency(dep("Core", Some("1.0"))),
        pkg("Data", "1.0.0").with_dependency(dep("Core", Some("1.0"))),
        pkg("Core", "1.0.0"),
        pkg("Core", "1.5.0"),
    ]
}

#[tokio::test]
async fn test_walk_orders_dependencies_first() {
    init_tracing();
    let packages = diamond();
    let root = packages[0].clone();
    let mut walker = walker(packages, WalkOptions::default());

    let order = walker.walk(&root).await.unwrap();
    assert_eq!(
        names(&order),
        ["Core 1.0.0", "Web 1.0.0", "Data 1.0.0", "App 1.0.0"]
    );

    let core = pkg("Core", "1.0.0");
    let marker = walker.marker();
    assert_eq!(marker.dependents(&core).len(), 2);
    assert_eq!(marker.transitive_dependents(&core).len(), 3);
    assert!(order.iter().all(|p| marker.state(p) == Some(VisitState::Completed)));
}

#[tokio::test]
async fn test_policy_and_constraints_apply() {
    let packages = diamond();
    let root = packages[0].clone();

    let mut highest = walker(
        packages.clone(),
        WalkOptions::default().with_policy(DependencyVersionPolicy::Highest),
    );
    let order = highest.walk(&root).await.unwrap();
    assert_eq!(order[0].identity().to_string(), "Core 1.5.0");

    let constraints = DefaultConstraintProvider::new().with_constraint(
        PackageId::new("core").unwrap(),
        VersionRange::parse("[1.0,1.5)").unwrap(),
    );
    let mut pinned = walker(
        packages,
        WalkOptions::default().with_policy(DependencyVersionPolicy::Highest),
    )
    .with_constraints(Arc::new(constraints));
    let order = pinned.walk(&root).await.unwrap();
    assert_eq!(order[0].identity().to_string(), "Core 1.0.0");
}

#[tokio::test]
async fn test_cycle_is_reported_with_path() {
    let a = pkg("A", "1.0.0").with_dependency(dep("B", Some("1.0")));
    let b = pkg("B", "1.0.0").with_dependency(dep("A", Some("1.0")));
    let mut walker = walker(vec![a.clone(), b], WalkOptions::default());

    let err = walker.walk(&a).await.unwrap_err();
    match err {
        SprigError::CircularDependency { cycle } => {
            assert_eq!(cycle, "A 1.0.0 -> B 1.0.0 -> A 1.0.0");
        },
        other => panic!("expected a cycle, got {other}"),
    }
    assert!(walker.marker().is_cycle(&a));
}

#[tokio::test]
async fn test_missing_dependency() {
    let root = pkg("App", "1.0.0")
        .with_dependency(dep("Missing", Some("1.0")))
        .with_dependency(dep("Core", None));
    let packages = vec![root.clone(), pkg("Core", "1.0.0")];

    let mut strict = walker(packages.clone(), WalkOptions::default());
    let err = strict.walk(&root).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Unable to resolve dependency 'Missing' (>= 1.0.0)"
    );

    let mut lenient = walker(packages, WalkOptions::default().with_skip_missing(true));
    let order = lenient.walk(&root).await.unwrap();
    assert_eq!(names(&order), ["Core 1.0.0", "App 1.0.0"]);
}

#[tokio::test]
async fn test_target_framework_selects_dependency_set() {
    let root = pkg("App", "1.0.0")
        .with_framework_dependency(Some("net45"), dep("Legacy", None))
        .with_dependency(dep("Core", None));
    let packages = vec![root.clone(), pkg("Legacy", "1.0.0"), pkg("Core", "1.0.0")];

    let mut neutral = walker(packages.clone(), WalkOptions::default());
    assert_eq!(names(&neutral.walk(&root).await.unwrap()), ["Core 1.0.0", "App 1.0.0"]);

    let mut framework = walker(packages, WalkOptions::default().with_target_framework("NET45"));
    assert_eq!(
        names(&framework.walk(&root).await.unwrap()),
        ["Legacy 1.0.0", "App 1.0.0"]
    );
}

#[tokio::test]
async fn test_walks_do_not_share_state() {
    let packages = diamond();
    let root = packages[0].clone();
    let mut walker = walker(packages, WalkOptions::default());

    let first = walker.walk(&root).await.unwrap();
    let second = walker.walk(&root).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(walker.marker().packages().len(), 4);
}

/// Acyclic graph: package `i` may only depend on packages with a larger index
fn acyclic_graph() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (2usize..8).prop_flat_map(|size| {
        (0..size)
            .map(|i| proptest::sample::subsequence((i + 1..size).collect::<Vec<_>>(), 0..=size - i - 1))
            .collect::<Vec<_>>()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_acyclic_walk_completes_every_node(edges in acyclic_graph()) {
        let packages: Vec<Package> = edges
            .iter()
            .enumerate()
            .map(|(i, deps)| {
                deps.iter().fold(pkg(&format!("P{i}"), "1.0.0"), |package, d| {
                    package.with_dependency(dep(&format!("P{d}"), None))
                })
            })
            .collect();
        let root = packages[0].clone();
        let mut walker = walker(packages, WalkOptions::default());

        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let order = runtime.block_on(walker.walk(&root)).unwrap();

        let marker = walker.marker();
        for package in &order {
            prop_assert!(!marker.is_cycle(package));
            prop_assert!(marker.is_visited(package));
            for dependency in package.dependencies_for(None) {
                let position = order.iter().position(|p| p.id == dependency.id);
                let own = order.iter().position(|p| p.id == package.id);
                prop_assert!(position < own);
            }
        }
        prop_assert_eq!(order.last().map(|p| p.identity()), Some(root.identity()));
    }
}

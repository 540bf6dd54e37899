//! Unit tests for the aggregate repository

use super::*;
use crate::factory::DefaultRepositoryFactory;
use crate::memory::MemoryRepository;
use crate::test_utils::{id, init_tracing, pkg, FailingRepository, SlowRepository};
use sprig_core::types::{DependencyVersionPolicy, NullConstraintProvider};

fn versions(packages: &[Package]) -> Vec<String> {
    packages
        .iter()
        .map(|p| format!("{} {}", p.id, p.version))
        .collect()
}

fn memory(source: &str, packages: &[(&str, &str)]) -> Arc<dyn PackageRepository> {
    Arc::new(MemoryRepository::new(source).with_packages(packages.iter().map(|(i, v)| pkg(i, v))))
}

#[tokio::test]
async fn test_union_is_distinct_and_ordered() {
    let aggregate = AggregateRepository::new(
        vec![
            memory("one", &[("B", "1.0.0"), ("A", "2.0.0")]),
            memory("two", &[("a", "2.0.0"), ("A", "1.0.0"), ("C", "0.1.0")]),
        ],
        AggregateOptions::default(),
    );

    let all = aggregate.get_all_packages().await.unwrap();
    assert_eq!(versions(&all), ["A 1.0.0", "A 2.0.0", "B 1.0.0", "C 0.1.0"]);

    let by_id = aggregate.get_packages_by_id(&id("a")).await.unwrap();
    assert_eq!(versions(&by_id), ["A 1.0.0", "A 2.0.0"]);
}

#[tokio::test]
async fn test_failing_source_is_isolated_and_not_retried() {
    init_tracing();
    let broken = Arc::new(FailingRepository::new("broken"));
    let aggregate = AggregateRepository::new(
        vec![
            memory("one", &[("A", "1.0.0")]),
            broken.clone() as Arc<dyn PackageRepository>,
            memory("three", &[("A", "1.0.0"), ("A", "1.1.0")]),
        ],
        AggregateOptions::default(),
    );

    let first = aggregate.get_packages_by_id(&id("A")).await.unwrap();
    assert_eq!(versions(&first), ["A 1.0.0", "A 1.1.0"]);
    assert_eq!(aggregate.failing_sources(), ["broken"]);

    let second = aggregate.get_packages_by_id(&id("A")).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(broken.calls(), 1);

    assert!(aggregate.exists(&id("A"), &Version::new(1, 1, 0)).await.unwrap());
    assert_eq!(broken.calls(), 1);
}

#[tokio::test]
async fn test_failures_propagate_without_isolation() {
    let aggregate = AggregateRepository::new(
        vec![
            memory("one", &[("A", "1.0.0")]),
            Arc::new(FailingRepository::new("broken")) as Arc<dyn PackageRepository>,
        ],
        AggregateOptions::default().with_ignore_failing_sources(false),
    );

    let err = aggregate.get_all_packages().await.unwrap_err();
    assert!(matches!(err, SprigError::Source { ref repository, .. } if repository == "broken"));
    assert!(aggregate.failing_sources().is_empty());
}

#[tokio::test]
async fn test_slow_source_times_out() {
    let slow = SlowRepository::new(
        MemoryRepository::new("slow").with_packages([pkg("A", "9.0.0")]),
        Duration::from_secs(30),
    );
    let aggregate = AggregateRepository::new(
        vec![
            Arc::new(slow) as Arc<dyn PackageRepository>,
            memory("fast", &[("A", "1.0.0")]),
        ],
        AggregateOptions::default().with_source_timeout(Duration::from_millis(50)),
    );

    let packages = aggregate.get_packages_by_id(&id("A")).await.unwrap();
    assert_eq!(versions(&packages), ["A 1.0.0"]);
    assert_eq!(aggregate.failing_sources(), ["slow"]);
}

#[tokio::test]
async fn test_point_lookups_prefer_earlier_sources() {
    let first = MemoryRepository::new("first")
        .with_packages([pkg("A", "1.0.0").with_description("from first")]);
    let second = MemoryRepository::new("second").with_packages([
        pkg("A", "1.0.0").with_description("from second"),
        pkg("B", "1.0.0"),
    ]);
    let aggregate = AggregateRepository::new(
        vec![Arc::new(first) as Arc<dyn PackageRepository>, Arc::new(second)],
        AggregateOptions::default(),
    );

    let found = aggregate
        .get_package(&id("a"), &Version::new(1, 0, 0))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.description.as_deref(), Some("from first"));
    assert!(aggregate.exists(&id("B"), &Version::new(1, 0, 0)).await.unwrap());
    assert!(!aggregate.exists(&id("C"), &Version::new(1, 0, 0)).await.unwrap());
}

#[tokio::test]
async fn test_resolve_over_merged_candidates() {
    let aggregate = AggregateRepository::new(
        vec![
            memory("one", &[("A", "1.0.0")]),
            memory("two", &[("A", "1.5.0"), ("A", "2.0.0")]),
        ],
        AggregateOptions::default(),
    );
    let dependency = Dependency::parse("A", Some("[1.0,2.0)")).unwrap();
    let options = ResolveOptions::default().with_policy(DependencyVersionPolicy::Highest);

    let selected = aggregate
        .resolve_dependency(&dependency, &NullConstraintProvider, &options)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(selected.version, Version::new(1, 5, 0));
}

#[tokio::test]
async fn test_resolve_vertically_takes_a_match() {
    let aggregate = AggregateRepository::new(
        vec![
            memory("empty", &[]),
            memory("one", &[("A", "1.0.0"), ("A", "1.2.0")]),
            Arc::new(FailingRepository::new("broken")) as Arc<dyn PackageRepository>,
        ],
        AggregateOptions::default().with_resolve_vertically(true),
    );

    let constraints = DefaultConstraintProvider::new()
        .with_constraint(id("A"), VersionRange::parse("[1.2]").unwrap());
    let dependency = Dependency::parse("A", Some("1.0")).unwrap();

    let selected = aggregate
        .resolve_dependency(&dependency, &constraints, &ResolveOptions::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(selected.version, Version::new(1, 2, 0));

    let missing = Dependency::parse("Z", None).unwrap();
    assert!(aggregate
        .resolve_dependency(&missing, &NullConstraintProvider, &ResolveOptions::default())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_latest_search_and_updates_fan_out() {
    let aggregate = AggregateRepository::new(
        vec![
            memory("one", &[("Json", "1.0.0"), ("Json", "1.2.0")]),
            memory("two", &[("Json", "1.2.0"), ("Json", "1.4.0"), ("Xml", "1.0.0")]),
        ],
        AggregateOptions::default(),
    );

    let latest = aggregate.find_latest(&id("json"), false, false).await.unwrap().unwrap();
    assert_eq!(latest.version, Version::new(1, 4, 0));

    let found = aggregate.search("json", QueryFilter::default()).await.unwrap();
    assert_eq!(versions(&found), ["Json 1.0.0", "Json 1.2.0", "Json 1.4.0"]);

    let installed = [PackageIdentity::parse("Json", "1.0.0").unwrap()];
    let updates = aggregate
        .get_updates(&installed, UpdateOptions::default(), None)
        .await
        .unwrap();
    assert_eq!(versions(&updates), ["Json 1.4.0"]);

    let options = UpdateOptions {
        include_all_versions: true,
        ..UpdateOptions::default()
    };
    let updates = aggregate.get_updates(&installed, options, None).await.unwrap();
    assert_eq!(versions(&updates), ["Json 1.2.0", "Json 1.4.0"]);
}

#[tokio::test]
async fn test_nested_aggregates_are_flattened() {
    let inner = AggregateRepository::new(
        vec![memory("a", &[]), memory("b", &[])],
        AggregateOptions::default(),
    );
    let outer = AggregateRepository::new(
        vec![Arc::new(inner) as Arc<dyn PackageRepository>, memory("c", &[])],
        AggregateOptions::default(),
    );

    let sources: Vec<&str> = outer.repositories().iter().map(|r| r.source()).collect();
    assert_eq!(sources, ["a", "b", "c"]);
    assert_eq!(outer.source(), AGGREGATE_SOURCE);
}

#[tokio::test]
async fn test_cancelled_aggregate_fails_calls() {
    let token = CancellationToken::new();
    let aggregate = AggregateRepository::new(
        vec![memory("one", &[("A", "1.0.0")])],
        AggregateOptions::default(),
    )
    .with_cancellation(token.clone());

    token.cancel();
    let err = aggregate.get_all_packages().await.unwrap_err();
    assert!(matches!(err, SprigError::Cancelled { .. }));
    assert!(aggregate.failing_sources().is_empty());
}

#[tokio::test]
async fn test_cancel_abandons_in_flight_queries() {
    init_tracing();
    let slow = SlowRepository::new(
        MemoryRepository::new("slow").with_packages([pkg("A", "1.0.0")]),
        Duration::from_secs(5),
    );
    let token = CancellationToken::new();
    let aggregate = AggregateRepository::new(
        vec![Arc::new(slow) as Arc<dyn PackageRepository>],
        AggregateOptions::default(),
    )
    .with_cancellation(token.clone());

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let started = tokio::time::Instant::now();
    let err = aggregate.get_packages_by_id(&id("A")).await.unwrap_err();
    assert!(matches!(err, SprigError::Cancelled { .. }));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(aggregate.failing_sources().is_empty());
}

#[tokio::test]
async fn test_vertical_race_does_not_wait_for_earlier_slow_source() {
    let slow = SlowRepository::new(
        MemoryRepository::new("slow").with_packages([pkg("A", "2.0.0")]),
        Duration::from_secs(5),
    );
    let aggregate = AggregateRepository::new(
        vec![
            Arc::new(slow) as Arc<dyn PackageRepository>,
            memory("fast", &[("A", "1.0.0")]),
        ],
        AggregateOptions::default().with_resolve_vertically(true),
    );
    let dependency = Dependency::parse("A", Some("1.0")).unwrap();

    let started = tokio::time::Instant::now();
    let selected = aggregate
        .resolve_dependency(&dependency, &NullConstraintProvider, &ResolveOptions::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(selected.version, Version::new(1, 0, 0));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(aggregate.failing_sources().is_empty());
}

#[tokio::test]
async fn test_flattened_sources_follow_outer_options() {
    let broken = Arc::new(FailingRepository::new("broken"));
    let inner = AggregateRepository::new(
        vec![broken.clone() as Arc<dyn PackageRepository>, memory("a", &[("A", "1.0.0")])],
        AggregateOptions::default().with_ignore_failing_sources(false),
    );
    assert!(inner.get_packages_by_id(&id("A")).await.is_err());

    let outer = AggregateRepository::new(
        vec![Arc::new(inner) as Arc<dyn PackageRepository>],
        AggregateOptions::default(),
    );
    let packages = outer.get_packages_by_id(&id("A")).await.unwrap();
    assert_eq!(versions(&packages), ["A 1.0.0"]);
    assert_eq!(outer.failing_sources(), ["broken"]);
}

#[test]
fn test_operations_compose_over_sources() {
    let first = Arc::new(MemoryRepository::new("first"));
    let second = Arc::new(MemoryRepository::new("second"));
    let aggregate = AggregateRepository::new(
        vec![
            first.clone() as Arc<dyn PackageRepository>,
            second.clone() as Arc<dyn PackageRepository>,
        ],
        AggregateOptions::default(),
    );

    let scope = aggregate.start_operation("install", None);
    assert_eq!(scope.children().len(), 2);
    drop(scope);

    assert_eq!(first.operations(), ["install"]);
    assert_eq!(second.operations(), ["install"]);
}

#[tokio::test]
async fn test_clone_copies_children() {
    let source = Arc::new(MemoryRepository::new("memory").with_packages([pkg("A", "1.0.0")]));
    let aggregate = AggregateRepository::new(
        vec![source.clone() as Arc<dyn PackageRepository>],
        AggregateOptions::default(),
    );

    let copy = aggregate.try_clone().unwrap();
    source.add_package(pkg("B", "1.0.0"));

    assert_eq!(aggregate.get_all_packages().await.unwrap().len(), 2);
    assert_eq!(copy.get_all_packages().await.unwrap().len(), 1);
}

#[test]
fn test_from_sources_skips_disabled_and_unsupported() {
    let sources = [
        PackageSource::new("local", "/var/packages"),
        PackageSource::new("disabled", "/srv/disabled").disabled(),
        PackageSource::new("remote", "https://api.example.org/v3/index.json"),
        PackageSource::new("other", "/srv/other"),
    ];

    let aggregate =
        AggregateRepository::from_sources(&DefaultRepositoryFactory, &sources, AggregateOptions::default())
            .unwrap();
    let names: Vec<&str> = aggregate.repositories().iter().map(|r| r.source()).collect();
    assert_eq!(names, ["/var/packages", "/srv/other"]);

    let err = AggregateRepository::from_sources(
        &DefaultRepositoryFactory,
        &sources,
        AggregateOptions::default().with_ignore_failing_sources(false),
    )
    .unwrap_err();
    assert!(matches!(err, SprigError::UnsupportedSource { .. }));
}

#[test]
fn test_create_unwraps_single_source() {
    let sources = [
        PackageSource::new("local", "/var/packages"),
        PackageSource::new("disabled", "/srv/disabled").disabled(),
    ];
    let repository =
        AggregateRepository::create(&DefaultRepositoryFactory, &sources, AggregateOptions::default()).unwrap();
    assert_eq!(repository.source(), "/var/packages");

    let sources = [
        PackageSource::new("a", "/srv/a"),
        PackageSource::new("b", "/srv/b"),
    ];
    let repository =
        AggregateRepository::create(&DefaultRepositoryFactory, &sources, AggregateOptions::default()).unwrap();
    assert_eq!(repository.source(), AGGREGATE_SOURCE);
}

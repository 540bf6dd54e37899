//! Common fixtures for benchmarks

use criterion::Criterion;
use std::sync::Arc;
use std::time::Duration;

use sprig_core::types::{Dependency, Package, PackageId, Version};
use sprig_repository::{MemoryRepository, PackageRepository};

/// Criterion settings shared by every bench
pub fn criterion_config() -> Criterion {
    Criterion::default()
        .warm_up_time(Duration::from_secs(3))
        .measurement_time(Duration::from_secs(10))
        .sample_size(100)
}

/// Mixed release and prerelease versions in scrambled order
pub fn version_list(count: usize) -> Vec<Version> {
    (0..count)
        .map(|i| {
            let major = (i * 7919) % 13;
            let minor = (i * 104_729) % 17;
            let patch = i % 5;
            let text = match i % 4 {
                0 => format!("{}.{}.{}-beta.{}", major, minor, patch, i % 11),
                1 => format!("{}.{}.{}.{}", major, minor, patch, i % 3),
                _ => format!("{}.{}.{}", major, minor, patch),
            };
            Version::parse(&text).unwrap()
        })
        .collect()
}

/// `ids` packages with `versions_per_id` releases each
pub fn package_set(ids: usize, versions_per_id: usize) -> Vec<Package> {
    (0..ids)
        .flat_map(|id| {
            (0..versions_per_id).map(move |v| {
                let id = PackageId::new(format!("Package{}", id)).unwrap();
                Package::new(id, Version::new((v / 10) as u64, (v % 10) as u64, 0))
            })
        })
        .collect()
}

/// A memory repository over [`package_set`]
pub fn memory_repository(source: &str, ids: usize, versions_per_id: usize) -> Arc<dyn PackageRepository> {
    Arc::new(MemoryRepository::new(source).with_packages(package_set(ids, versions_per_id)))
}

/// Packages `Node0 -> Node1 -> ... -> Node{depth-1}`, each also depending
/// on the node two steps ahead; returns the root first
pub fn dependency_chain(depth: usize) -> Vec<Package> {
    let node = |i: usize| format!("Node{}", i);
    (0..depth)
        .map(|i| {
            let mut package = Package::parse(&node(i), "1.0.0").unwrap();
            for next in [i + 1, i + 2].into_iter().filter(|n| *n < depth) {
                if let Ok(dependency) = Dependency::parse(&node(next), Some("1.0")) {
                    package = package.with_dependency(dependency);
                }
            }
            package
        })
        .collect()
}

//! The stage pipeline — runs the four lookup stages in fixed order.
//!
//! Basic → Enhanced → Photon → OpenCage. Each stage sees only what the
//! previous stages left unresolved; an empty carry-over short-circuits
//! the rest of the pipeline. The store is merged and persisted after
//! every stage.

use super::providers::{BasicLookup, EnhancedLookup, LookupStage, OpenCageLookup, PhotonLookup};
use super::store::{ResultStore, Summary};
use super::types::{Coordinate, GeocodeConfig, LocationRecord, PlaceContext, Stage, StageResult};

pub struct GeocodeResolver {
    stages: [Box<dyn LookupStage>; 4],
    store: ResultStore,
}

impl GeocodeResolver {
    pub fn new(config: &GeocodeConfig, store: ResultStore) -> Self {
        let stages: [Box<dyn LookupStage>; 4] = [
            Box::new(BasicLookup::new(config)),
            Box::new(EnhancedLookup::new(config)),
            Box::new(PhotonLookup::new(config)),
            Box::new(OpenCageLookup::new(config)),
        ];
        Self { stages, store }
    }

    /// Build a resolver from explicit stages (for testing).
    pub fn with_stages(stages: [Box<dyn LookupStage>; 4], store: ResultStore) -> Self {
        Self { stages, store }
    }

    /// Run the full pipeline over `records`.
    ///
    /// Every input title ends up in exactly one side of the returned
    /// partition. Records that already carry coordinates pass through
    /// without any lookup.
    pub fn resolve(&mut self, records: Vec<LocationRecord>, ctx: &PlaceContext) -> StageResult {
        let mut resolved_all: Vec<LocationRecord> = Vec::new();
        let mut candidates = records;

        for stage in &self.stages {
            if candidates.is_empty() {
                break;
            }
            let result = run_stage(stage.as_ref(), candidates, ctx);
            self.store.merge(&result.resolved, &result.remaining);
            resolved_all.extend(result.resolved);
            candidates = result.remaining;
        }

        StageResult {
            resolved: resolved_all,
            remaining: candidates,
        }
    }

    /// Run a single stage over `records` and merge its output into the
    /// store.
    pub fn run_stage(&mut self, stage: Stage, records: Vec<LocationRecord>, ctx: &PlaceContext) -> StageResult {
        let result = run_stage(self.stages[stage.index()].as_ref(), records, ctx);
        self.store.merge(&result.resolved, &result.remaining);
        result
    }

    pub fn summary(&self) -> Summary {
        self.store.summary()
    }

    pub fn reset(&mut self) {
        self.store.reset();
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }
}

/// Partition one stage's input. An unavailable stage passes its whole
/// input through unchanged.
fn run_stage(stage: &dyn LookupStage, records: Vec<LocationRecord>, ctx: &PlaceContext) -> StageResult {
    if !stage.available() {
        eprintln!("  warning: {} unavailable, stage skipped", stage.method());
        return StageResult {
            resolved: Vec::new(),
            remaining: records,
        };
    }

    let mut resolved = Vec::new();
    let mut remaining = Vec::new();
    for mut record in records {
        if record.is_resolved() {
            // Idempotence: never re-look-up, never delay.
            resolved.push(record);
            continue;
        }
        match stage.lookup(&record, ctx) {
            Some(fix) => {
                record.coordinates = Some(Coordinate {
                    latitude: fix.latitude,
                    longitude: fix.longitude,
                    method: stage.method().to_string(),
                    query: fix.query,
                });
                resolved.push(record);
            }
            None => remaining.push(record),
        }
    }

    StageResult { resolved, remaining }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::providers::Fix;
    use approx::assert_relative_eq;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;
    use tempfile::TempDir;

    /// Scripted stage: resolves titles from a fixed table and records
    /// every lookup it receives.
    struct MockStage {
        method: &'static str,
        available: bool,
        hits: HashMap<String, Fix>,
        calls: Rc<RefCell<Vec<String>>>,
    }

    impl MockStage {
        fn new(method: &'static str, hits: &[(&str, Fix)]) -> (Box<Self>, Rc<RefCell<Vec<String>>>) {
            let calls = Rc::new(RefCell::new(Vec::new()));
            let stage = Box::new(Self {
                method,
                available: true,
                hits: hits.iter().map(|(t, f)| (t.to_string(), f.clone())).collect(),
                calls: Rc::clone(&calls),
            });
            (stage, calls)
        }

        fn unavailable(method: &'static str) -> (Box<Self>, Rc<RefCell<Vec<String>>>) {
            let (mut stage, calls) = Self::new(method, &[]);
            stage.available = false;
            (stage, calls)
        }
    }

    impl LookupStage for MockStage {
        fn method(&self) -> &'static str {
            self.method
        }

        fn available(&self) -> bool {
            self.available
        }

        fn lookup(&self, record: &LocationRecord, _ctx: &PlaceContext) -> Option<Fix> {
            self.calls.borrow_mut().push(record.title.clone());
            self.hits.get(&record.title).cloned()
        }
    }

    fn fix(lat: f64, lon: f64, query: &str) -> Fix {
        Fix {
            latitude: lat,
            longitude: lon,
            query: query.to_string(),
        }
    }

    fn test_store(dir: &TempDir) -> ResultStore {
        ResultStore::open(
            dir.path().join("resolved.json"),
            dir.path().join("remaining.json"),
        )
    }

    /// Four mock stages with the given hit tables, plus their call logs.
    fn pipeline(
        hits: [&[(&str, Fix)]; 4],
        dir: &TempDir,
    ) -> (GeocodeResolver, [Rc<RefCell<Vec<String>>>; 4]) {
        let (s1, c1) = MockStage::new("nominatim_basic", hits[0]);
        let (s2, c2) = MockStage::new("nominatim_variants", hits[1]);
        let (s3, c3) = MockStage::new("photon", hits[2]);
        let (s4, c4) = MockStage::new("opencage", hits[3]);
        let resolver = GeocodeResolver::with_stages([s1, s2, s3, s4], test_store(dir));
        (resolver, [c1, c2, c3, c4])
    }

    fn ctx() -> PlaceContext {
        PlaceContext::new("İstanbul", "", "Türkiye")
    }

    #[test]
    fn test_already_resolved_passes_through_untouched() {
        let dir = TempDir::new().unwrap();
        let (mut resolver, calls) = pipeline([&[], &[], &[], &[]], &dir);

        let mut rec = LocationRecord::new("Önceden Bulunan");
        rec.content = "değişmemeli".to_string();
        rec.coordinates = Some(Coordinate {
            latitude: 40.0,
            longitude: 29.0,
            method: "nominatim_basic".into(),
            query: "Önceden Bulunan, Türkiye".into(),
        });
        let before = rec.clone();

        let result = resolver.resolve(vec![rec], &ctx());

        assert_eq!(result.resolved.len(), 1);
        assert_eq!(result.resolved[0].content, before.content);
        assert_eq!(result.resolved[0].coordinates, before.coordinates);
        // No provider was invoked for it, at any stage.
        for log in &calls {
            assert!(log.borrow().is_empty());
        }
    }

    #[test]
    fn test_partition_is_complete_and_duplicate_free() {
        let dir = TempDir::new().unwrap();
        let (mut resolver, _calls) = pipeline(
            [
                &[("A", fix(1.0, 2.0, "A, Türkiye"))],
                &[("B", fix(3.0, 4.0, "B, İstanbul, Türkiye"))],
                &[],
                &[],
            ],
            &dir,
        );

        let input = vec![
            LocationRecord::new("A"),
            LocationRecord::new("B"),
            LocationRecord::new("C"),
        ];
        let result = resolver.resolve(input, &ctx());

        let mut titles: Vec<String> = result
            .resolved
            .iter()
            .chain(result.remaining.iter())
            .map(|r| r.title.clone())
            .collect();
        titles.sort();
        assert_eq!(titles, vec!["A", "B", "C"]);
        assert_eq!(result.resolved.len(), 2);
        assert_eq!(result.remaining.len(), 1);
        assert_eq!(result.remaining[0].title, "C");
    }

    #[test]
    fn test_method_and_query_stamped_per_stage() {
        let dir = TempDir::new().unwrap();
        let (mut resolver, _calls) = pipeline(
            [
                &[],
                &[("B", fix(3.0, 4.0, "B mahallesi, Türkiye"))],
                &[],
                &[],
            ],
            &dir,
        );

        let result = resolver.resolve(vec![LocationRecord::new("B")], &ctx());
        let coord = result.resolved[0].coordinates.as_ref().unwrap();
        assert_eq!(coord.method, "nominatim_variants");
        assert_eq!(coord.query, "B mahallesi, Türkiye");
    }

    #[test]
    fn test_short_circuit_skips_later_stages() {
        let dir = TempDir::new().unwrap();
        let (mut resolver, calls) = pipeline(
            [
                &[
                    ("A", fix(1.0, 2.0, "A, Türkiye")),
                    ("B", fix(3.0, 4.0, "B, Türkiye")),
                ],
                &[],
                &[],
                &[],
            ],
            &dir,
        );

        let result = resolver.resolve(
            vec![LocationRecord::new("A"), LocationRecord::new("B")],
            &ctx(),
        );

        assert!(result.remaining.is_empty());
        assert_eq!(calls[0].borrow().len(), 2);
        assert!(calls[1].borrow().is_empty());
        assert!(calls[2].borrow().is_empty());
        assert!(calls[3].borrow().is_empty());
    }

    #[test]
    fn test_idempotent_second_run_makes_no_lookups() {
        let dir = TempDir::new().unwrap();
        let (mut resolver, calls) = pipeline(
            [&[("A", fix(1.0, 2.0, "A, Türkiye"))], &[], &[], &[]],
            &dir,
        );

        let first = resolver.resolve(vec![LocationRecord::new("A")], &ctx());
        assert_eq!(calls[0].borrow().len(), 1);

        let second = resolver.resolve(first.resolved.clone(), &ctx());
        assert_eq!(calls[0].borrow().len(), 1); // unchanged
        assert_eq!(second.resolved.len(), first.resolved.len());
        assert_eq!(
            second.resolved[0].coordinates,
            first.resolved[0].coordinates
        );
    }

    #[test]
    fn test_unavailable_stage_passes_input_unchanged() {
        let dir = TempDir::new().unwrap();
        let (s1, _c1) = MockStage::new("nominatim_basic", &[]);
        let (s2, _c2) = MockStage::new("nominatim_variants", &[]);
        let (s3, _c3) = MockStage::new("photon", &[]);
        let (s4, c4) = MockStage::unavailable("opencage");
        let mut resolver = GeocodeResolver::with_stages([s1, s2, s3, s4], test_store(&dir));

        let result = resolver.run_stage(
            Stage::OpenCage,
            vec![LocationRecord::new("A"), LocationRecord::new("B")],
            &ctx(),
        );

        assert!(result.resolved.is_empty());
        assert_eq!(result.remaining.len(), 2);
        assert!(c4.borrow().is_empty());
    }

    #[test]
    fn test_failed_records_fall_through_to_later_stage() {
        let dir = TempDir::new().unwrap();
        let (mut resolver, calls) = pipeline(
            [
                &[],
                &[],
                &[],
                &[("Zor Yer", fix(5.0, 6.0, "Zor Yer, İstanbul, Türkiye"))],
            ],
            &dir,
        );

        let result = resolver.resolve(vec![LocationRecord::new("Zor Yer")], &ctx());

        assert_eq!(result.resolved.len(), 1);
        assert_eq!(
            result.resolved[0].coordinates.as_ref().unwrap().method,
            "opencage"
        );
        // Each stage tried it exactly once.
        for log in &calls {
            assert_eq!(log.borrow().len(), 1);
        }
    }

    #[test]
    fn test_store_accumulates_after_each_stage() {
        let dir = TempDir::new().unwrap();
        let (mut resolver, _calls) = pipeline(
            [
                &[("A", fix(1.0, 2.0, "A, Türkiye"))],
                &[("B", fix(3.0, 4.0, "B, İstanbul, Türkiye"))],
                &[],
                &[],
            ],
            &dir,
        );

        resolver.resolve(
            vec![LocationRecord::new("A"), LocationRecord::new("B")],
            &ctx(),
        );

        let summary = resolver.summary();
        assert_eq!(summary.resolved, 2);
        assert_eq!(summary.remaining, 0);
    }

    #[test]
    fn test_balat_kilisesi_end_to_end() {
        // Stage 1 misses; stage 2's city variant hits.
        let dir = TempDir::new().unwrap();
        let (mut resolver, _calls) = pipeline(
            [
                &[],
                &[(
                    "Balat Kilisesi",
                    fix(41.0, 28.9, "Balat Kilisesi, İstanbul, Türkiye"),
                )],
                &[],
                &[],
            ],
            &dir,
        );

        let result = resolver.resolve(vec![LocationRecord::new("Balat Kilisesi")], &ctx());

        assert!(result.remaining.is_empty());
        let rec = &result.resolved[0];
        assert_eq!(rec.title, "Balat Kilisesi");
        let coord = rec.coordinates.as_ref().unwrap();
        assert_relative_eq!(coord.latitude, 41.0);
        assert_relative_eq!(coord.longitude, 28.9);
        assert_eq!(coord.method, "nominatim_variants");
        assert_eq!(coord.query, "Balat Kilisesi, İstanbul, Türkiye");
    }
}

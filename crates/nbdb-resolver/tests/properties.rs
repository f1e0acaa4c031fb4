use std::collections::{BTreeMap, BTreeSet};

use nbdb_core::{Batch, CanonicalRecord, RawRecord, Source};
use nbdb_resolver::{exact_key, similarity, Resolution, Resolver, ResolverConfig};

fn listing(source: Source, id: &str, name: &str, address: &str) -> RawRecord {
    RawRecord::new(source, name)
        .with_external_id(id)
        .with_address(address)
        .with_locality("Chattanooga", "TN")
}

fn city_batches() -> Vec<Batch> {
    vec![
        Batch::new(
            "foursquare",
            vec![
                listing(Source::Foursquare, "fsq-1", "Tony's Pasta Shop & Trattoria", "123 Main St")
                    .with_category("Italian")
                    .with_field("phone", "423-555-0101"),
                listing(Source::Foursquare, "fsq-2", "Tony's Pasta Shop & Trattoria", "123 Main St")
                    .with_category("Pizza")
                    .with_field("phone", "423-555-0102"),
                listing(Source::Foursquare, "fsq-4", "Blue Plate", "10 Oak Ave")
                    .with_coordinates(35.0601, -85.3089),
            ],
        ),
        Batch::new(
            "osm",
            vec![
                listing(Source::Osm, "node/1", "Main St Diner", "5 Main St")
                    .with_field("website", "b.com")
                    .with_field("phone", "423-555-0199"),
                listing(Source::Osm, "node/4", "Blue Plate", "10 Oak Ave")
                    .with_coordinates(35.0605, -85.3090),
                RawRecord::new(Source::Osm, "Lone Star Cafe").with_external_id("node/9"),
                RawRecord::new(Source::Osm, "").with_address("7 Pine St"),
                RawRecord::new(Source::Osm, "").with_address("7 Pine St"),
            ],
        ),
        Batch::new(
            "google_places",
            vec![
                listing(Source::GooglePlaces, "ChIJ1", "Main Street Diner", "5 Main Street")
                    .with_field("website", "a.com")
                    .with_field("rating", 4.5),
                RawRecord::new(Source::GooglePlaces, "Joe's").with_external_id("ChIJ3"),
                RawRecord::new(Source::GooglePlaces, "Joe's Cafe").with_external_id("ChIJ3"),
            ],
        ),
        Batch::new(
            "tourism",
            vec![
                listing(Source::TourismSite, "rec-4", "Blue Plates", "10 Oak Avenue")
                    .with_field("website", "blueplate.example"),
                listing(Source::TourismSite, "rec-5", "Sushi Nabe", "2 B St"),
            ],
        ),
    ]
}

fn resolve(batches: &[Batch]) -> Resolution {
    Resolver::new(ResolverConfig::default())
        .unwrap()
        .resolve(batches)
        .unwrap()
}

fn views(records: &[CanonicalRecord]) -> Vec<Batch> {
    vec![Batch::new(
        "previous output",
        records.iter().flat_map(CanonicalRecord::member_views).collect(),
    )]
}

#[test]
fn resolving_output_again_changes_nothing() {
    let first = resolve(&city_batches());
    let second = resolve(&views(&first.records));
    assert_eq!(second.records, first.records);

    let third = resolve(&views(&second.records));
    assert_eq!(third.records, first.records);
}

#[test]
fn reingesting_identified_records_changes_nothing() {
    let first = resolve(&city_batches());
    // Observations without a source id cannot be recognised a second time.
    let identified: Vec<Batch> = city_batches()
        .into_iter()
        .map(|batch| {
            let records = batch
                .records
                .into_iter()
                .filter(|r| r.identity().is_some())
                .collect();
            Batch::new(batch.label, records)
        })
        .collect();

    let again = Resolver::new(ResolverConfig::default())
        .unwrap()
        .resolve_onto(&first.records, &identified)
        .unwrap();
    assert_eq!(again.records, first.records);
    assert_eq!(again.stats.merged_onto_existing, again.stats.records_in);
}

#[test]
fn every_observation_lands_in_exactly_one_record() {
    let batches = city_batches();
    let resolution = resolve(&batches);

    for record in batches.iter().flat_map(|b| &b.records) {
        if let Some(id) = record.identity() {
            let owners = resolution
                .records
                .iter()
                .filter(|r| r.has_source_id(record.source, id))
                .count();
            assert_eq!(owners, 1, "{} {id}", record.source);
        }
        assert!(resolution
            .records
            .iter()
            .any(|r| r.contributing_sources.contains(&record.source)));
    }
    assert_eq!(
        resolution.stats.records_in,
        batches.iter().map(|b| b.records.len()).sum::<usize>()
    );
}

#[test]
fn no_two_outputs_are_duplicates() {
    let resolution = resolve(&city_batches());
    let config = ResolverConfig::default();
    let records = &resolution.records;

    for (at, a) in records.iter().enumerate() {
        for b in &records[at + 1..] {
            let (Some(key_a), Some(key_b)) = (
                exact_key(&a.name, a.address.as_deref()),
                exact_key(&b.name, b.address.as_deref()),
            ) else {
                continue;
            };
            assert_ne!(key_a, key_b);
            let name = similarity(&a.name, &b.name);
            let address = similarity(
                a.address.as_deref().unwrap_or(""),
                b.address.as_deref().unwrap_or(""),
            );
            assert!(
                name < config.name_threshold || address < config.address_threshold,
                "{} / {} still match",
                a.name,
                b.name
            );
        }
    }
}

#[test]
fn expected_records_come_out() {
    let resolution = resolve(&city_batches());
    let names: Vec<&str> = resolution.records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "Blue Plate",
            "Joe's",
            "Lone Star Cafe",
            "Main Street Diner",
            "Sushi Nabe",
            "Tony's Pasta Shop & Trattoria",
            "Unknown",
            "Unknown",
        ]
    );

    let tonys = resolution.records.iter().find(|r| r.name.starts_with("Tony")).unwrap();
    assert_eq!(tonys.categories.len(), 2);
    assert_eq!(tonys.fields["phone"].alternates.len(), 1);
}

#[test]
fn threshold_is_inclusive_at_the_boundary() {
    let batches = vec![Batch::new(
        "boundary",
        vec![
            listing(Source::Osm, "node/1", "Main St Diner", "5 Main St"),
            listing(Source::Foursquare, "fsq-1", "Main St Diners", "5 Main St"),
        ],
    )];
    let score = similarity("Main St Diner", "Main St Diners");

    let at = ResolverConfig {
        name_threshold: score,
        ..ResolverConfig::default()
    };
    let merged = Resolver::new(at).unwrap().resolve(&batches).unwrap();
    assert_eq!(merged.records.len(), 1);

    let above = ResolverConfig {
        name_threshold: score + 0.001,
        ..ResolverConfig::default()
    };
    let split = Resolver::new(above).unwrap().resolve(&batches).unwrap();
    assert_eq!(split.records.len(), 2);
}

#[test]
fn placeholder_named_listing_does_not_name_the_record() {
    let batches = vec![Batch::new(
        "foursquare",
        vec![
            listing(Source::Foursquare, "fsq-2", "Unknown", "5 Main St"),
            listing(Source::Foursquare, "fsq-2", "Main St Diner", "5 Main St"),
            listing(Source::Foursquare, "fsq-7", "Main St Diner", "5 Main St"),
        ],
    )];

    let first = resolve(&batches);
    assert_eq!(first.records.len(), 1);
    assert_eq!(first.records[0].name, "Main St Diner");
    assert_eq!(first.records[0].source_ids[&Source::Foursquare].len(), 2);

    let second = resolve(&views(&first.records));
    assert_eq!(second.records, first.records);
}

#[test]
fn views_of_an_unmatchable_record_stay_together() {
    // Written by an earlier run: no usable name and no address, but two
    // Foursquare ids.
    let record = CanonicalRecord {
        id: "prior".to_string(),
        name: "Unknown".to_string(),
        address: None,
        city: None,
        state: None,
        coordinates: None,
        categories: BTreeSet::new(),
        source_ids: BTreeMap::from([(
            Source::Foursquare,
            BTreeSet::from(["fsq-1".to_string(), "fsq-2".to_string()]),
        )]),
        fields: BTreeMap::new(),
        contributing_sources: BTreeSet::from([Source::Foursquare]),
    };

    let again = resolve(&views(std::slice::from_ref(&record)));
    assert_eq!(again.records.len(), 1);
    assert_eq!(again.records[0].source_ids, record.source_ids);

    let third = resolve(&views(&again.records));
    assert_eq!(third.records, again.records);
}

#[test]
fn default_thresholds_accept_exactly_085() {
    // 17 of 40 characters in common on both name and address.
    let name = similarity("Mockingbird Cafe 123", "Mockingbird Cafe 456");
    let address = similarity("1700 Chestnut St ABC", "1700 Chestnut St XYZ");
    assert!((name - 0.85).abs() < 1e-12, "name similarity {name}");
    assert!((address - 0.85).abs() < 1e-12, "address similarity {address}");

    let resolution = resolve(&[Batch::new(
        "boundary",
        vec![
            listing(Source::Osm, "node/1", "Mockingbird Cafe 123", "1700 Chestnut St ABC"),
            listing(Source::Foursquare, "fsq-1", "Mockingbird Cafe 456", "1700 Chestnut St XYZ"),
        ],
    )]);
    assert_eq!(resolution.records.len(), 1);
    assert_eq!(resolution.stats.fuzzy_matches, 1);
}

#[test]
fn default_thresholds_reject_084() {
    // 21 of 50 characters in common.
    let name = similarity("Mockingbird Cafe Bar 1234", "Mockingbird Cafe Bar 5678");
    let address = similarity("1700 Chestnut St Ste 1234", "1700 Chestnut St Ste 5678");
    assert!((name - 0.84).abs() < 1e-12, "name similarity {name}");
    assert!((address - 0.84).abs() < 1e-12, "address similarity {address}");

    let low_name = resolve(&[Batch::new(
        "boundary",
        vec![
            listing(Source::Osm, "node/1", "Mockingbird Cafe Bar 1234", "1700 Chestnut St"),
            listing(Source::Foursquare, "fsq-1", "Mockingbird Cafe Bar 5678", "1700 Chestnut St"),
        ],
    )]);
    assert_eq!(low_name.records.len(), 2);

    let low_address = resolve(&[Batch::new(
        "boundary",
        vec![
            listing(Source::Osm, "node/1", "Mockingbird Cafe", "1700 Chestnut St Ste 1234"),
            listing(Source::Foursquare, "fsq-1", "Mockingbird Cafe", "1700 Chestnut St Ste 5678"),
        ],
    )]);
    assert_eq!(low_address.records.len(), 2);
}

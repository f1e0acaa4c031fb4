use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};

use nbdb_core::{
    Batch, CanonicalRecord, FieldConflict, GeoOutlier, MatchStatistics, RawRecord, Source,
};

use crate::config::ResolverConfig;
use crate::error::ResolveError;
use crate::groups::DisjointSet;
use crate::merge::{self, Draft, Member};
use crate::normalize::{bucket_key, exact_key, normalize};
use crate::similarity::compare;

/// Output of one resolver run.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Canonical records ordered by normalized name, then id.
    pub records: Vec<CanonicalRecord>,
    pub stats: MatchStatistics,
    pub conflicts: Vec<FieldConflict>,
    pub geo_outliers: Vec<GeoOutlier>,
}

/// A group's name and address as seen by the convergence pass.
struct Representative {
    root: usize,
    name: String,
    address: String,
    key: String,
}

#[derive(Debug, Clone)]
pub struct Resolver {
    config: ResolverConfig,
}

impl Resolver {
    /// # Errors
    ///
    /// Returns [`ResolveError`] if the configuration fails validation.
    pub fn new(config: ResolverConfig) -> Result<Self, ResolveError> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve batches of raw observations into canonical records.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::MatchAmbiguity`] if a source id would end up
    /// on two canonical records.
    pub fn resolve(&self, batches: &[Batch]) -> Result<Resolution, ResolveError> {
        self.resolve_onto(&[], batches)
    }

    /// Resolve batches on top of an existing canonical dataset.
    ///
    /// Existing records keep their id and name. Observations that share a
    /// source id with one, or match it by name and address, are folded into
    /// it; the rest become new records.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::MatchAmbiguity`] if two existing records share
    /// a source id, or a source id would end up on two output records.
    pub fn resolve_onto(
        &self,
        existing: &[CanonicalRecord],
        batches: &[Batch],
    ) -> Result<Resolution, ResolveError> {
        let mut members: Vec<Member> = Vec::new();
        let mut untouched: Vec<Draft> = Vec::new();
        for (anchor, record) in existing.iter().enumerate() {
            let views = record.member_views();
            if views.is_empty() {
                tracing::warn!(
                    id = %record.id,
                    name = %record.name,
                    "existing record lists no contributing sources, keeping it unchanged"
                );
                untouched.push(Draft::unchanged(record.clone()));
            }
            for view in views {
                members.push(Member {
                    record: view,
                    order: members.len(),
                    anchor: Some(anchor),
                });
            }
        }
        let existing_members = members.len();
        for batch in batches {
            tracing::debug!(batch = %batch.label, records = batch.records.len(), "adding batch");
            for record in &batch.records {
                members.push(Member {
                    record: record.clone(),
                    order: members.len(),
                    anchor: None,
                });
            }
        }

        let mut stats = MatchStatistics {
            records_in: members.len() - existing_members,
            ..MatchStatistics::default()
        };
        let mut set = DisjointSet::new(members.len());

        join_anchors(&members, &mut set);
        stats.linked_by_id = join_origins(&members, &mut set);
        stats.linked_by_id += link_identities(&members, existing, &mut set)?;

        let keys: Vec<Option<String>> = members
            .iter()
            .map(|m| exact_key(&m.record.name, m.record.address.as_deref()))
            .collect();
        stats.unmatchable = keys[existing_members..]
            .iter()
            .filter(|k| k.is_none())
            .count();

        stats.exact_matches = join_exact(&keys, &mut set);
        stats.fuzzy_matches = self.join_singletons(&members, &keys, &mut set);
        stats.convergence_merges = self.converge(&members, &mut set);

        let mut drafts: Vec<Draft> = Vec::new();
        for group in set.groups().values() {
            let group: Vec<&Member> = group.iter().map(|&i| &members[i]).collect();
            if group.iter().any(|m| m.anchor.is_some()) {
                stats.merged_onto_existing += group.iter().filter(|m| m.anchor.is_none()).count();
            }
            drafts.push(merge::build(&group, &self.config));
        }

        assign_ids(&mut drafts, existing);
        drafts.extend(untouched);
        check_unique_ids(&drafts)?;
        drafts.sort_by_cached_key(|d| (normalize(&d.record.name), d.record.id.clone()));

        let mut resolution = Resolution::default();
        for draft in drafts {
            if draft.size == 1 {
                stats.singletons += 1;
            }
            for conflict in &draft.conflicts {
                tracing::debug!(
                    record_id = %conflict.record_id,
                    name = %conflict.name,
                    field = %conflict.field,
                    kept = %conflict.kept.value,
                    kept_source = %conflict.kept.source,
                    discarded = conflict.discarded.len(),
                    "field conflict"
                );
            }
            for outlier in &draft.outliers {
                tracing::warn!(
                    record_id = %outlier.record_id,
                    name = %outlier.name,
                    source = %outlier.source,
                    external_id = outlier.external_id.as_deref().unwrap_or(""),
                    distance_km = outlier.distance_km,
                    limit_km = self.config.geo_outlier_km,
                    "observation far from group centroid"
                );
            }
            resolution.conflicts.extend(draft.conflicts);
            resolution.geo_outliers.extend(draft.outliers);
            resolution.records.push(draft.record);
        }

        stats.canonical_out = resolution.records.len();
        stats.conflicts = resolution.conflicts.len();
        stats.geo_outliers = resolution.geo_outliers.len();
        tracing::info!(
            records_in = stats.records_in,
            existing = existing.len(),
            canonical_out = stats.canonical_out,
            linked_by_id = stats.linked_by_id,
            exact_matches = stats.exact_matches,
            fuzzy_matches = stats.fuzzy_matches,
            convergence_merges = stats.convergence_merges,
            "resolution complete"
        );
        resolution.stats = stats;
        Ok(resolution)
    }

    /// Collapse each group of observations into one canonical record, with
    /// no matching across groups. Records come back in group order; empty
    /// groups are skipped.
    #[must_use]
    pub fn collapse(&self, groups: &[Vec<RawRecord>]) -> Vec<CanonicalRecord> {
        let mut order = 0;
        let mut drafts: Vec<Draft> = Vec::new();
        for group in groups.iter().filter(|g| !g.is_empty()) {
            let members: Vec<Member> = group
                .iter()
                .map(|record| {
                    order += 1;
                    Member {
                        record: record.clone(),
                        order,
                        anchor: None,
                    }
                })
                .collect();
            let members: Vec<&Member> = members.iter().collect();
            drafts.push(merge::build(&members, &self.config));
        }
        assign_ids(&mut drafts, &[]);
        drafts.into_iter().map(|draft| draft.record).collect()
    }

    /// Compare groups that are still a single observation, bucket by bucket.
    fn join_singletons(
        &self,
        members: &[Member],
        keys: &[Option<String>],
        set: &mut DisjointSet,
    ) -> usize {
        let mut buckets: BTreeMap<char, Vec<usize>> = BTreeMap::new();
        for group in set.groups().values() {
            let [only] = group.as_slice() else {
                continue;
            };
            if keys[*only].is_none() {
                continue;
            }
            if let Some(bucket) = bucket_key(&members[*only].record.name, self.config.bucket_strategy)
            {
                buckets.entry(bucket).or_default().push(*only);
            }
        }

        let mut joined = 0;
        for bucket in buckets.values() {
            for (at, &i) in bucket.iter().enumerate() {
                for &j in &bucket[at + 1..] {
                    if set.find(i) == set.find(j) {
                        continue;
                    }
                    let a = &members[i].record;
                    let b = &members[j].record;
                    let Some((name_similarity, address_similarity)) = compare(
                        (a.name.as_str(), a.address.as_deref().unwrap_or("")),
                        (b.name.as_str(), b.address.as_deref().unwrap_or("")),
                        &self.config,
                    ) else {
                        continue;
                    };
                    tracing::debug!(
                        first = %a.name,
                        second = %b.name,
                        name_similarity,
                        address_similarity,
                        "fuzzy match"
                    );
                    if set.union(i, j) {
                        joined += 1;
                    }
                }
            }
        }
        joined
    }

    /// Merge groups whose representatives share an exact key or pass the
    /// duplicate test, until a round merges nothing.
    fn converge(&self, members: &[Member], set: &mut DisjointSet) -> usize {
        let mut total = 0;
        loop {
            let representatives: Vec<Representative> = set
                .groups()
                .into_iter()
                .filter_map(|(root, indices)| {
                    let group: Vec<&Member> = indices.iter().map(|&i| &members[i]).collect();
                    let (name, address) = merge::representative(&group);
                    let address = address?;
                    let key = exact_key(&name, Some(&address))?;
                    Some(Representative {
                        root,
                        name,
                        address,
                        key,
                    })
                })
                .collect();

            let mut merged = 0;
            let mut by_key: HashMap<&str, usize> = HashMap::new();
            for rep in &representatives {
                match by_key.entry(rep.key.as_str()) {
                    Entry::Occupied(first) => {
                        if set.union(*first.get(), rep.root) {
                            merged += 1;
                        }
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(rep.root);
                    }
                }
            }

            let mut buckets: BTreeMap<char, Vec<&Representative>> = BTreeMap::new();
            for rep in &representatives {
                if let Some(bucket) = bucket_key(&rep.name, self.config.bucket_strategy) {
                    buckets.entry(bucket).or_default().push(rep);
                }
            }
            for bucket in buckets.values() {
                for (at, a) in bucket.iter().enumerate() {
                    for b in &bucket[at + 1..] {
                        if set.find(a.root) == set.find(b.root) {
                            continue;
                        }
                        if compare(
                            (a.name.as_str(), a.address.as_str()),
                            (b.name.as_str(), b.address.as_str()),
                            &self.config,
                        )
                            .is_some()
                            && set.union(a.root, b.root)
                        {
                            tracing::debug!(first = %a.name, second = %b.name, "groups converged");
                            merged += 1;
                        }
                    }
                }
            }

            total += merged;
            if merged == 0 {
                return total;
            }
        }
    }
}

/// Views decomposed from one existing record start out joined.
fn join_anchors(members: &[Member], set: &mut DisjointSet) {
    let mut first_view: HashMap<usize, usize> = HashMap::new();
    for (index, member) in members.iter().enumerate() {
        let Some(anchor) = member.anchor else {
            continue;
        };
        match first_view.entry(anchor) {
            Entry::Occupied(first) => {
                set.union(*first.get(), index);
            }
            Entry::Vacant(slot) => {
                slot.insert(index);
            }
        }
    }
}

/// Join observations decomposed from the same canonical record. Returns the
/// number of joins made for input observations.
fn join_origins(members: &[Member], set: &mut DisjointSet) -> usize {
    let mut first_view: HashMap<&str, usize> = HashMap::new();
    let mut joined = 0;
    for (index, member) in members.iter().enumerate() {
        let Some(origin) = member.record.origin.as_deref() else {
            continue;
        };
        match first_view.entry(origin) {
            Entry::Occupied(first) => {
                if set.union(*first.get(), index) && member.anchor.is_none() {
                    joined += 1;
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(index);
            }
        }
    }
    joined
}

/// Join observations sharing `(source, external_id)`. Returns the number of
/// joins made for input observations.
fn link_identities(
    members: &[Member],
    existing: &[CanonicalRecord],
    set: &mut DisjointSet,
) -> Result<usize, ResolveError> {
    let mut identities: HashMap<(Source, &str), usize> = HashMap::new();
    let mut joined = 0;

    for (index, member) in members.iter().enumerate() {
        let Some(id) = member.record.identity() else {
            continue;
        };
        match identities.entry((member.record.source, id)) {
            Entry::Occupied(first) => {
                let first = *first.get();
                if let (Some(a), Some(b)) = (members[first].anchor, member.anchor) {
                    if a != b {
                        return Err(ResolveError::MatchAmbiguity {
                            provider: member.record.source,
                            external_id: id.to_string(),
                            first: existing[a].id.clone(),
                            second: existing[b].id.clone(),
                        });
                    }
                }
                if set.union(first, index) && member.anchor.is_none() {
                    joined += 1;
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(index);
            }
        }
    }

    Ok(joined)
}

fn join_exact(keys: &[Option<String>], set: &mut DisjointSet) -> usize {
    let mut by_key: HashMap<&str, usize> = HashMap::new();
    let mut joined = 0;
    for (index, key) in keys.iter().enumerate() {
        let Some(key) = key else {
            continue;
        };
        match by_key.entry(key.as_str()) {
            Entry::Occupied(first) => {
                if set.union(*first.get(), index) {
                    joined += 1;
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(index);
            }
        }
    }
    joined
}

/// Anchored groups keep the existing id. New groups hash their content;
/// colliding hashes get a `-2`, `-3`... suffix in input order. Ids of existing
/// records that take no part in matching stay reserved.
fn assign_ids(drafts: &mut [Draft], existing: &[CanonicalRecord]) {
    let mut used: HashSet<String> = existing
        .iter()
        .filter(|r| r.contributing_sources.is_empty())
        .map(|r| r.id.clone())
        .collect();
    let mut fresh: Vec<(String, usize, usize)> = Vec::new();

    for (at, draft) in drafts.iter_mut().enumerate() {
        if let Some(anchor) = draft.anchor {
            let id = existing[anchor].id.clone();
            used.insert(id.clone());
            draft.assign_id(id);
        } else {
            let record = &draft.record;
            let base = merge::canonical_id(&record.name, record.address.as_deref(), &record.source_ids);
            fresh.push((base, draft.first_order, at));
        }
    }

    fresh.sort();
    for (base, _, at) in fresh {
        let mut id = base.clone();
        let mut suffix = 2;
        while used.contains(&id) {
            id = format!("{base}-{suffix}");
            suffix += 1;
        }
        used.insert(id.clone());
        drafts[at].assign_id(id);
    }
}

fn check_unique_ids(drafts: &[Draft]) -> Result<(), ResolveError> {
    let mut owners: HashMap<(Source, &str), &str> = HashMap::new();
    for draft in drafts {
        for (source, ids) in &draft.record.source_ids {
            for id in ids {
                if let Some(first) = owners.insert((*source, id.as_str()), draft.record.id.as_str()) {
                    return Err(ResolveError::MatchAmbiguity {
                        provider: *source,
                        external_id: id.clone(),
                        first: first.to_string(),
                        second: draft.record.id.clone(),
                    });
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "resolve_test.rs"]
mod tests;

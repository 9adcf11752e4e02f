//! Shared live-then-cache resolution used by targeting and bid enrichment.

use std::collections::HashMap;

use crate::cache::ReceptivityCache;
use crate::receptivity::Receptivity;

/// Resolve receptivity for each target.
///
/// `live` is asked first; when it has nothing for a target the cache entry
/// named by `cache_key` is used. Targets resolving to neither are left out.
/// Each distinct cache key is read at most once per call.
pub(crate) fn resolve<L, K>(
    targets: &[String],
    mut live: L,
    cache: &ReceptivityCache,
    cache_key: K,
) -> HashMap<String, Receptivity>
where
    L: FnMut(&str) -> Option<Receptivity>,
    K: Fn(&str) -> String,
{
    let mut cache_reads: HashMap<String, Option<Receptivity>> = HashMap::new();
    let mut resolved = HashMap::new();

    for target in targets {
        let value = live(target).or_else(|| {
            cache_reads
                .entry(cache_key(target))
                .or_insert_with_key(|key| cache.read(key))
                .clone()
        });

        match value {
            Some(value) => {
                resolved.insert(target.clone(), value);
            }
            None => log::debug!("No receptivity available for '{}'", target),
        }
    }

    resolved
}

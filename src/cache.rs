/*! Caller-owned memoization for per-frame pose computations.
 *
 * Animation playback revisits the same driving values (loops, ping-pong
 * scrubbing), so callers that want memoization own a [`PoseCache`] and
 * invalidate it explicitly. There is no process-wide cache in this crate.
 */

use std::collections::HashMap;

use itertools::Itertools;
use tracing::debug;

use crate::errors::SolveError;
use crate::mechanism::{Linkage, LinkageKind, Pose};

/// Structural key over (linkage kind, link lengths, driving value). Floats
/// are keyed by bit pattern so the key is `Eq + Hash`; drivers that differ
/// in the last ulp are distinct entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    kind: LinkageKind,
    parameters: Vec<u64>,
    driver: u64,
}

impl CacheKey {
    pub fn new(kind: LinkageKind, parameters: &[f64], driver: f64) -> Self {
        CacheKey {
            kind,
            parameters: parameters.iter().map(|p| p.to_bits()).collect(),
            driver: driver.to_bits(),
        }
    }

    /// Key a linkage by its kind and link lengths.
    pub fn for_linkage(linkage: &dyn Linkage, driver: f64) -> Self {
        let lengths = linkage.links().iter().map(|link| link.length).collect_vec();
        Self::new(linkage.kind(), &lengths, driver)
    }
}

/// Explicit pose cache. Owned by the caller and safe to share across frame
/// computations behind whatever synchronization the caller chooses.
#[derive(Debug, Clone, Default)]
pub struct PoseCache {
    entries: HashMap<CacheKey, Pose>,
}

impl PoseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<&Pose> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: CacheKey, pose: Pose) -> Option<Pose> {
        self.entries.insert(key, pose)
    }

    /// Drop one entry. Returns the evicted pose if it was present.
    pub fn invalidate(&mut self, key: &CacheKey) -> Option<Pose> {
        self.entries.remove(key)
    }

    /// Drop every entry for one linkage kind, e.g. after a parameter edit.
    pub fn invalidate_kind(&mut self, kind: LinkageKind) {
        self.entries.retain(|key, _| key.kind != kind);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Solve through the cache. Only successful poses are stored, so a
    /// failing frame is re-attempted on the next call.
    pub fn pose_or_solve(
        &mut self,
        linkage: &dyn Linkage,
        driver: f64,
    ) -> Result<Pose, SolveError> {
        let key = CacheKey::for_linkage(linkage, driver);
        if let Some(pose) = self.entries.get(&key) {
            debug!(kind = %linkage.kind(), driver, "pose cache hit");
            return Ok(pose.clone());
        }
        let pose = linkage.pose_at(driver)?;
        self.entries.insert(key, pose.clone());
        Ok(pose)
    }
}

use crate::config::{MatcherConfig, MatcherKind};
use crate::error::MatchError;
use crate::pipeline::{Descriptor, Match};
use rayon::prelude::*;

/// Number of differing bits between two descriptors
#[inline]
pub fn hamming_distance(a: &Descriptor, b: &Descriptor) -> u32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// Index and distance of the closest candidate; ties go to the lowest index
fn nearest(query: &Descriptor, candidates: &[Descriptor]) -> Option<(usize, u32)> {
    candidates
        .iter()
        .enumerate()
        .map(|(idx, candidate)| (idx, hamming_distance(query, candidate)))
        .min_by_key(|&(idx, distance)| (distance, idx))
}

/// Brute-force nearest-neighbour matcher over binary descriptors
#[derive(Debug, Clone)]
pub struct DescriptorMatcher {
    kind: MatcherKind,
    cross_check: bool,
}

impl Default for DescriptorMatcher {
    fn default() -> Self {
        Self::new(&MatcherConfig::default())
    }
}

impl DescriptorMatcher {
    pub fn new(config: &MatcherConfig) -> Self {
        Self {
            kind: config.kind,
            cross_check: config.cross_check,
        }
    }

    pub fn kind(&self) -> MatcherKind {
        self.kind
    }

    /// One match per template descriptor naming its nearest scene descriptor.
    ///
    /// Output follows template order. With cross-checking enabled only mutual
    /// nearest neighbours are kept.
    pub fn try_match(&self, scene: &[Descriptor], template: &[Descriptor]) -> Result<Vec<Match>, MatchError> {
        if scene.is_empty() || template.is_empty() {
            return Err(MatchError::EmptyDescriptors {
                scene: scene.len(),
                template: template.len(),
            });
        }

        let matches: Vec<Match> = match self.kind {
            MatcherKind::BruteForceHamming => template
                .par_iter()
                .enumerate()
                .filter_map(|(query_idx, query)| {
                    let (train_idx, distance) = nearest(query, scene)?;
                    Some(Match {
                        query_idx,
                        train_idx,
                        distance,
                    })
                })
                .collect(),
        };

        if !self.cross_check {
            return Ok(matches);
        }

        let reverse: Vec<Option<usize>> = scene
            .par_iter()
            .map(|descriptor| nearest(descriptor, template).map(|(idx, _)| idx))
            .collect();

        Ok(matches
            .into_iter()
            .filter(|m| reverse[m.train_idx] == Some(m.query_idx))
            .collect())
    }

    /// Like [`try_match`](Self::try_match), but a failure is logged and counts as no matches
    pub fn match_or_empty(&self, scene: &[Descriptor], template: &[Descriptor]) -> Vec<Match> {
        match self.try_match(scene, template) {
            Ok(matches) => matches,
            Err(e) => {
                tracing::warn!(error = %e, "Descriptor matching failed, treating frame as unmatched");
                Vec::new()
            }
        }
    }
}

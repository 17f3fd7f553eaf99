use crate::config::VerificationConfig;
use crate::core::audit::{Confidence, Decision, Justification};
use crate::core::similarity::StructuralScorer;
use std::path::Path;

/// Outcome of checking one perceptual match.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub decision: Decision,
    pub confidence: Confidence,
    pub justification: Justification,
}

impl Verdict {
    pub fn is_verified(&self) -> bool {
        self.confidence == Confidence::NearVerified
    }
}

/// Confirms a perceptual match with a structural-similarity score before
/// anything is removed. Anything short of a confirmed score becomes review.
pub struct VerificationGate<'a> {
    scorer: &'a dyn StructuralScorer,
    threshold: f64,
}

impl<'a> VerificationGate<'a> {
    pub fn new(scorer: &'a dyn StructuralScorer, config: &VerificationConfig) -> Self {
        Self {
            scorer,
            threshold: config.threshold,
        }
    }

    pub fn check(&self, original: &Path, candidate: &Path, distance: u32) -> Verdict {
        match self.scorer.score(original, candidate) {
            Ok(score) if score >= self.threshold => Verdict {
                decision: Decision::Remove,
                confidence: Confidence::NearVerified,
                justification: Justification::Similarity {
                    original: original.to_path_buf(),
                    distance,
                    score,
                },
            },
            Ok(score) => {
                log::info!(
                    "Questionable match {} ~ {}: similarity {:.3}",
                    candidate.display(),
                    original.display(),
                    score
                );
                Verdict {
                    decision: Decision::Review,
                    confidence: Confidence::NearUnverified,
                    justification: Justification::Similarity {
                        original: original.to_path_buf(),
                        distance,
                        score,
                    },
                }
            }
            Err(e) => {
                log::warn!(
                    "Could not verify {} against {}: {}",
                    candidate.display(),
                    original.display(),
                    e
                );
                Verdict {
                    decision: Decision::Review,
                    confidence: Confidence::NearUnverified,
                    justification: Justification::ScoreUnavailable {
                        original: original.to_path_buf(),
                        distance,
                        reason: e.to_string(),
                    },
                }
            }
        }
    }
}

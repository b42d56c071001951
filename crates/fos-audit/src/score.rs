//! CSP score

use fos_csp::directive::{
    BASE_URI, BLOCK_ALL_MIXED, DEFAULT_SRC, FORM_ACTION, FRAME_ANCESTORS, OBJECT_SRC, SCRIPT_SRC, UPGRADE_INSECURE,
};
use fos_csp::{ContentSecurityPolicy, UnsafeToken};
use serde::Serialize;

pub const EXISTENCE_WEIGHT: u8 = 30;
pub const COVERAGE_WEIGHT: u8 = 20;
pub const SAFETY_WEIGHT: u8 = 30;
pub const CONSISTENCY_WEIGHT: u8 = 20;

/// Points per directive group; any one directive of a group earns its points
pub const COVERAGE_TABLE: &[(&[&str], u8)] = &[
    (&[DEFAULT_SRC, SCRIPT_SRC], 5),
    (&[OBJECT_SRC], 3),
    (&[FRAME_ANCESTORS], 3),
    (&[FORM_ACTION], 3),
    (&[BASE_URI], 2),
    (&[UPGRADE_INSECURE, BLOCK_ALL_MIXED], 4),
];

const SAFETY_PENALTIES: [(UnsafeToken, u8); 3] = [
    (UnsafeToken::UnsafeInline, 15),
    (UnsafeToken::UnsafeEval, 10),
    (UnsafeToken::Wildcard, 5),
];

const BLOCKED_PENALTY: u8 = 5;

/// Score components
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScoreBreakdown {
    pub existence: u8,
    pub coverage: u8,
    pub safety: u8,
    pub consistency: u8,
}

impl ScoreBreakdown {
    /// No policy: every component is zero
    pub fn absent() -> Self {
        Self::default()
    }

    /// Score a present policy given the number of distinct would-be-blocked findings
    pub fn compute(policy: &ContentSecurityPolicy, blocked: usize) -> Self {
        let coverage = COVERAGE_TABLE
            .iter()
            .filter(|(names, _)| names.iter().any(|name| policy.contains(name)))
            .map(|(_, points)| *points)
            .sum::<u8>()
            .min(COVERAGE_WEIGHT);

        let safety = SAFETY_PENALTIES
            .iter()
            .filter(|(token, _)| policy.has_unsafe_token(*token))
            .fold(SAFETY_WEIGHT, |score, (_, penalty)| score.saturating_sub(*penalty));

        let penalty = blocked.saturating_mul(BLOCKED_PENALTY as usize);
        let consistency = (CONSISTENCY_WEIGHT as usize).saturating_sub(penalty) as u8;

        Self {
            existence: EXISTENCE_WEIGHT,
            coverage,
            safety,
            consistency,
        }
    }

    pub fn total(&self) -> u8 {
        (self.existence + self.coverage + self.safety + self.consistency).min(100)
    }
}

//! Per-validator recomputation of a sender's claimed score: the core of
//! the HAT consensus response procedure (spec §4.5 steps 4-8).

use shared::types::ReputationRecord;

/// Normalized `[0, 1]` view of a reputation claim, the unit the
/// consensus tolerances and confidence formula operate in (the stored
/// `ReputationScore` components live in `[0, 100]`).
#[derive(Debug, Clone, Copy)]
pub struct ClaimedScore {
    pub behavior: f64,
    pub economic: f64,
    pub temporal: f64,
    pub wot: f64,
    pub has_wot_connection: bool,
}

impl ClaimedScore {
    /// Final score, redistributing the web-of-trust weight across the
    /// other three components when no trust path to the sender exists.
    pub fn final_score(&self) -> f64 {
        if self.has_wot_connection {
            0.4 * self.behavior + 0.3 * self.wot + 0.2 * self.economic + 0.1 * self.temporal
        } else {
            0.57 * self.behavior + 0.29 * self.economic + 0.14 * self.temporal
        }
    }
}

pub fn normalize(record: &ReputationRecord, has_wot_connection: bool) -> ClaimedScore {
    ClaimedScore {
        behavior: record.score.behavior / 100.0,
        economic: record.score.economic / 100.0,
        temporal: record.score.temporal / 100.0,
        wot: record.score.web_of_trust / 100.0,
        has_wot_connection,
    }
}

const BEHAVIOR_TOLERANCE: f64 = 0.03;
const ECONOMIC_TOLERANCE: f64 = 0.03;
const TEMPORAL_TOLERANCE: f64 = 0.03;
const WOT_TOLERANCE: f64 = 0.05;

/// Per-component verdict against a claimed score. With a WoT connection,
/// all four components must verify; without one, only the three
/// non-WoT components are checked.
pub fn verifies(claimed: &ClaimedScore, calculated: &ClaimedScore) -> bool {
    let behavior_ok = (claimed.behavior - calculated.behavior).abs() <= BEHAVIOR_TOLERANCE;
    let economic_ok = (claimed.economic - calculated.economic).abs() <= ECONOMIC_TOLERANCE;
    let temporal_ok = (claimed.temporal - calculated.temporal).abs() <= TEMPORAL_TOLERANCE;

    if calculated.has_wot_connection {
        let wot_ok = (claimed.wot - calculated.wot).abs() <= WOT_TOLERANCE;
        behavior_ok && economic_ok && temporal_ok && wot_ok
    } else {
        behavior_ok && economic_ok && temporal_ok
    }
}

/// Confidence a responding validator attaches to its vote: boosted by
/// trust-path strength when connected, scaled down for low-reputation
/// validators either way.
pub fn response_confidence(has_wot_connection: bool, avg_path_weight: f64, validator_reputation: f64) -> f64 {
    let base = if has_wot_connection {
        0.5 + 0.5 * avg_path_weight.clamp(0.0, 1.0)
    } else {
        0.5
    };
    (base * (validator_reputation / 100.0)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ethers::types::Address;
    use shared::types::ReputationScore;

    fn record(behavior: f64, economic: f64, temporal: f64, wot: f64) -> ReputationRecord {
        ReputationRecord {
            address: Address::zero(),
            score: ReputationScore { behavior, web_of_trust: wot, economic, temporal },
            transaction_count: 0,
            fraud_flags: 0,
            first_seen: Utc::now(),
            last_seen: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn matching_claim_verifies_without_wot() {
        let calculated = normalize(&record(80.0, 60.0, 40.0, 0.0), false);
        let claimed = calculated;
        assert!(verifies(&claimed, &calculated));
    }

    #[test]
    fn out_of_tolerance_claim_fails() {
        let calculated = normalize(&record(80.0, 60.0, 40.0, 0.0), false);
        let mut claimed = calculated;
        claimed.behavior += 0.5;
        assert!(!verifies(&claimed, &calculated));
    }

    #[test]
    fn wot_redistribution_without_connection() {
        let claimed = normalize(&record(100.0, 0.0, 0.0, 0.0), false);
        assert!((claimed.final_score() - 0.57).abs() < 1e-9);
    }

    #[test]
    fn confidence_scales_with_validator_reputation() {
        let high = response_confidence(true, 1.0, 100.0);
        let low = response_confidence(true, 1.0, 50.0);
        assert!(high > low);
    }
}

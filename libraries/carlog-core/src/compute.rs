//! Pure helpers for deriving aggregates from detail time series.
//!
//! These operate on plain slices so the sync engine can feed them from
//! whatever wire shape the backend returns.

/// Total elevation gained and lost over a position series, as the sums of
/// positive and negative successive deltas.
#[must_use]
pub fn elevation_change(elevations: &[i64]) -> (i64, i64) {
    if elevations.len() < 2 {
        return (0, 0);
    }

    let mut gain = 0;
    let mut loss = 0;
    for pair in elevations.windows(2) {
        let diff = pair[1] - pair[0];
        if diff > 0 {
            gain += diff;
        } else {
            loss += -diff;
        }
    }
    (gain, loss)
}

/// Classify a charge as DC (fast charger) from its per-point phase counts.
///
/// DC charging bypasses the onboard charger, so the backend reports phase
/// counts of zero or null for every point. AC charging reports 1-3. The
/// decision uses the mode of the positive phase counts: if no point reports
/// a positive count, the charge is DC.
#[must_use]
pub fn is_dc_charge(phases: &[Option<i64>]) -> bool {
    mode_positive_phases(phases).is_none()
}

/// Most frequent positive phase count in a charge's points, if any.
///
/// This is also the value persisted as the aggregate's `charger_phases`.
#[must_use]
pub fn mode_positive_phases(phases: &[Option<i64>]) -> Option<i64> {
    let mut counts: std::collections::HashMap<i64, usize> = std::collections::HashMap::new();
    for p in phases.iter().flatten().filter(|p| **p > 0) {
        *counts.entry(*p).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)))
        .map(|(phase, _)| phase)
}

/// Drive efficiency in Wh/km, when both energy and a positive distance are
/// known.
#[must_use]
pub fn efficiency_wh_per_km(energy_kwh: Option<f64>, distance_km: f64) -> Option<f64> {
    match energy_kwh {
        Some(kwh) if distance_km > 0.0 => Some(kwh * 1000.0 / distance_km),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elevation_change_sums_deltas() {
        // up 30, down 20, up 15
        let elevations = [100, 110, 130, 120, 110, 125];
        assert_eq!(elevation_change(&elevations), (45, 20));
    }

    #[test]
    fn elevation_change_needs_two_points() {
        assert_eq!(elevation_change(&[]), (0, 0));
        assert_eq!(elevation_change(&[500]), (0, 0));
    }

    #[test]
    fn dc_when_all_phases_absent_or_zero() {
        assert!(is_dc_charge(&[None, Some(0), None]));
        assert!(is_dc_charge(&[]));
    }

    #[test]
    fn ac_when_any_positive_phase_dominates() {
        assert!(!is_dc_charge(&[Some(3), Some(3), Some(0), None]));
        assert_eq!(mode_positive_phases(&[Some(3), Some(3), Some(1)]), Some(3));
        assert_eq!(mode_positive_phases(&[Some(0), None]), None);
    }

    #[test]
    fn efficiency_requires_energy_and_distance() {
        assert_eq!(efficiency_wh_per_km(Some(15.0), 100.0), Some(150.0));
        assert_eq!(efficiency_wh_per_km(None, 100.0), None);
        assert_eq!(efficiency_wh_per_km(Some(15.0), 0.0), None);
    }
}

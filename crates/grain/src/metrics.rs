use tracing::warn;

use crate::{intersections::Intersection, motifs::Motif, types::Metrics};

/// Weighted intersection count below which results are flagged
pub const MIN_SIGNIFICANT_INTERSECTIONS: f64 = 50.0;

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// ASTM grain size number from the mean intercept length in millimetres
pub fn astm_grain_size(ell_mm: f64) -> f64 {
    -3.288 - 6.643856 * ell_mm.log10()
}

/// Stereological metrics plus the warnings raised while computing them
pub fn compute_metrics(
    motifs: &[Motif],
    intersections: &[Intersection],
    pixel_size_um: f64,
) -> (Metrics, Vec<String>) {
    let mut warnings = Vec::new();

    let total_length_px: f64 = motifs.iter().map(|m| m.length_px).sum();
    if total_length_px == 0.0 {
        warnings.push("Total motif length is zero. Cannot compute metrics.".to_string());
        return finish(Metrics::default(), warnings);
    }
    let l_mm = total_length_px * pixel_size_um / 1000.0;

    let n_int: f64 = intersections.iter().map(|i| i.score).sum();
    if n_int == 0.0 {
        warnings.push("No intersections found. Grain size cannot be calculated.".to_string());
        return finish(Metrics { l_mm, ..Metrics::default() }, warnings);
    }

    let ell_mm = l_mm / n_int;
    let ell_um = ell_mm * 1000.0;

    let g = if ell_mm <= 0.0 {
        warnings.push(format!(
            "Mean intercept length is {ell_mm:.4} mm, which is invalid for G calculation."
        ));
        0.0
    } else {
        astm_grain_size(ell_mm)
    };

    let mut n_ae = 2f64.powf(g - 1.0);
    if !n_ae.is_finite() {
        n_ae = f64::INFINITY;
        warnings.push("Calculated G value is too large, resulting in N_AE overflow.".to_string());
    }

    if n_int < MIN_SIGNIFICANT_INTERSECTIONS {
        warnings.push(format!(
            "Low number of intersections ({}) may lead to statistically insignificant results.",
            n_int as i64
        ));
    }

    finish(
        Metrics {
            l_mm,
            n_int,
            ell_mm,
            ell_um: round_to(ell_um, 2),
            g: round_to(g, 3),
            n_ae,
        },
        warnings,
    )
}

fn finish(metrics: Metrics, warnings: Vec<String>) -> (Metrics, Vec<String>) {
    for warning in &warnings {
        warn!("{warning}");
    }
    (metrics, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{intersections::IntersectionKind, motifs::MotifKind};

    fn straight_motif(length: f64) -> Motif {
        Motif {
            id: "L-0".to_string(),
            kind: MotifKind::Linear,
            points: vec![[0.0, 0.0], [length, 0.0]],
            length_px: length,
        }
    }

    fn regular_hits(n: usize) -> Vec<Intersection> {
        (0..n)
            .map(|i| Intersection {
                id: i + 1,
                position: [i as f64, 0.0],
                kind: IntersectionKind::Regular,
                score: 1.0,
                motif_id: "L-0".to_string(),
                members: 1,
            })
            .collect()
    }

    #[test]
    fn one_millimetre_intercept_is_astm_zero_point() {
        let (metrics, warnings) = compute_metrics(&[straight_motif(1000.0)], &regular_hits(1), 1.0);
        assert_eq!(metrics.l_mm, 1.0);
        assert_eq!(metrics.ell_mm, 1.0);
        assert_eq!(metrics.ell_um, 1000.0);
        assert_eq!(metrics.g, -3.288);
        assert!((metrics.n_ae - 2f64.powf(-4.288)).abs() < 1e-12);
        assert!(warnings.iter().any(|w| w.contains("Low number of intersections (1)")));
    }

    #[test]
    fn tenth_of_a_millimetre() {
        let (metrics, _) = compute_metrics(&[straight_motif(1000.0)], &regular_hits(10), 1.0);
        assert!((metrics.ell_mm - 0.1).abs() < 1e-12);
        assert_eq!(metrics.ell_um, 100.0);
        assert_eq!(metrics.g, 3.356);
    }

    #[test]
    fn zero_length_gives_zero_metrics() {
        let (metrics, warnings) = compute_metrics(&[], &regular_hits(3), 1.0);
        assert_eq!(metrics, Metrics::default());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Total motif length is zero"));
    }

    #[test]
    fn nothing_at_all_is_zero_safe() {
        let (metrics, warnings) = compute_metrics(&[], &[], 1.0);
        assert_eq!(metrics.g, 0.0);
        assert_eq!(metrics, Metrics::default());
        assert!(!warnings.is_empty());
    }

    #[test]
    fn degenerate_motif_without_hits_is_zero_safe() {
        let (metrics, warnings) = compute_metrics(&[straight_motif(0.0)], &[], 1.0);
        assert_eq!(metrics.g, 0.0);
        assert_eq!(metrics.l_mm, 0.0);
        assert!(!warnings.is_empty());
        assert!(warnings[0].contains("Total motif length is zero"));
    }

    #[test]
    fn no_intersections_keeps_length_only() {
        let (metrics, warnings) = compute_metrics(&[straight_motif(500.0)], &[], 2.0);
        assert_eq!(metrics.l_mm, 1.0);
        assert_eq!(metrics.n_int, 0.0);
        assert_eq!(metrics.ell_mm, 0.0);
        assert_eq!(metrics.g, 0.0);
        assert_eq!(metrics.n_ae, 0.0);
        assert!(warnings[0].contains("No intersections found"));
    }

    #[test]
    fn enough_intersections_raise_no_warning() {
        let (metrics, warnings) = compute_metrics(&[straight_motif(10_000.0)], &regular_hits(60), 0.5);
        assert_eq!(metrics.n_int, 60.0);
        assert!(warnings.is_empty(), "unexpected warnings {warnings:?}");
        assert!(metrics.g != 0.0);
    }

    #[test]
    fn overflowing_density_is_infinite() {
        let (metrics, warnings) = compute_metrics(&[straight_motif(1.0)], &regular_hits(1), 1e-300);
        assert!(metrics.n_ae.is_infinite());
        assert!(warnings.iter().any(|w| w.contains("N_AE overflow")));
    }
}

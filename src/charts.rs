use crate::errors::{AppError, AppResult};
use crate::models::{
    CallDurationPoint, CallDurationSummary, SadPathCategory, SadPathEdit, SadPathShare, SadPathSummary,
};

pub const MIN_PEAK_DURATION: i64 = 1;
pub const MAX_PEAK_DURATION: i64 = 30;
pub const FALLBACK_PEAK_DURATION: i64 = 12;

/// Largest count a sad-path category may hold.
pub const MAX_SAD_PATH_COUNT: u64 = u32::MAX as u64;

const PEAK_AMPLITUDE: f64 = 3.0;
const PEAK_SPREAD: f64 = 4.0;

const DEFAULT_DENSITIES: [f64; 26] = [
    0.0, 0.1, 0.3, 0.8, 1.2, 1.5, 1.8, 2.1, 2.3, 2.5, 2.7, 2.8, 2.9, 2.7, 2.4, 2.0, 1.6, 1.2, 0.8, 0.5,
    0.3, 0.2, 0.1, 0.05, 0.02, 0.01,
];

const DEFAULT_SAD_PATHS: [(&str, u64, &str); 5] = [
    ("Technical Issues", 35, "#ff6b35"),
    ("Agent Unavailable", 25, "#ff4757"),
    ("Long Wait Times", 20, "#ffa502"),
    ("Language Barriers", 12, "#ff6348"),
    ("System Errors", 8, "#ff3838"),
];

pub fn default_call_duration() -> Vec<CallDurationPoint> {
    DEFAULT_DENSITIES
        .iter()
        .enumerate()
        .map(|(duration, density)| CallDurationPoint {
            duration: duration as i64,
            density: *density,
        })
        .collect()
}

pub fn default_sad_path() -> Vec<SadPathCategory> {
    DEFAULT_SAD_PATHS
        .iter()
        .map(|(name, value, color)| SadPathCategory {
            name: (*name).to_string(),
            value: *value,
            color: (*color).to_string(),
        })
        .collect()
}

/// Parses the peak-duration field. The field only ever holds digits, so
/// anything else is rejected along with out-of-range values.
pub fn parse_peak_input(raw: &str) -> AppResult<i64> {
    let trimmed = raw.trim();
    let invalid = || AppError::Validation("Please enter a valid number between 1 and 30".to_string());
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let value = trimmed.parse::<i64>().map_err(|_| invalid())?;
    if !(MIN_PEAK_DURATION..=MAX_PEAK_DURATION).contains(&value) {
        return Err(invalid());
    }
    Ok(value)
}

/// Recomputes every density as a Gaussian centred on `peak`. Durations are
/// kept as they are.
pub fn reshape_peak(points: &[CallDurationPoint], peak: i64) -> AppResult<Vec<CallDurationPoint>> {
    if !(MIN_PEAK_DURATION..=MAX_PEAK_DURATION).contains(&peak) {
        return Err(AppError::Validation(format!(
            "Peak duration {} is outside {}..={}",
            peak, MIN_PEAK_DURATION, MAX_PEAK_DURATION
        )));
    }

    Ok(points
        .iter()
        .map(|point| {
            let offset = (point.duration - peak) as f64 / PEAK_SPREAD;
            CallDurationPoint {
                duration: point.duration,
                density: PEAK_AMPLITUDE * (-(offset * offset)).exp(),
            }
        })
        .collect())
}

/// First point carrying the maximum density.
pub fn peak_point(points: &[CallDurationPoint]) -> Option<CallDurationPoint> {
    points.iter().fold(None, |best: Option<CallDurationPoint>, point| match best {
        Some(current) if current.density >= point.density => Some(current),
        _ => Some(*point),
    })
}

pub fn summarize_call_duration(points: &[CallDurationPoint]) -> CallDurationSummary {
    let peak = peak_point(points);
    CallDurationSummary {
        peak_duration: peak.map(|point| point.duration).unwrap_or(FALLBACK_PEAK_DURATION),
        data_points: points.len(),
        max_density: peak.map(|point| point.density).unwrap_or(0.0),
    }
}

/// Count fields accept digits only; an emptied field counts as zero.
pub fn parse_count(raw: &str) -> AppResult<u64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    if !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::Validation(format!("Count must contain digits only, got {:?}", raw)));
    }
    trimmed
        .parse::<u64>()
        .ok()
        .filter(|value| *value <= MAX_SAD_PATH_COUNT)
        .ok_or_else(|| AppError::Validation(format!("Count {:?} exceeds {}", raw, MAX_SAD_PATH_COUNT)))
}

pub fn apply_sad_path_edits(
    categories: &[SadPathCategory],
    edits: &[SadPathEdit],
) -> AppResult<Vec<SadPathCategory>> {
    let mut next = categories.to_vec();
    for edit in edits {
        let Some(entry) = next.get_mut(edit.index) else {
            return Err(AppError::Validation(format!(
                "No sad path category at position {} (have {})",
                edit.index,
                categories.len()
            )));
        };
        if let Some(name) = &edit.name {
            entry.name = name.clone();
        }
        if let Some(count) = &edit.count {
            entry.value = parse_count(count)?;
        }
    }
    Ok(next)
}

pub fn sad_path_total(categories: &[SadPathCategory]) -> u64 {
    categories
        .iter()
        .fold(0u64, |total, category| total.saturating_add(category.value))
}

pub fn summarize_sad_path(categories: &[SadPathCategory]) -> SadPathSummary {
    let total = sad_path_total(categories);
    let shares = categories
        .iter()
        .map(|category| SadPathShare {
            name: category.name.clone(),
            value: category.value,
            color: category.color.clone(),
            percentage: if total == 0 {
                0.0
            } else {
                category.value as f64 * 100.0 / total as f64
            },
        })
        .collect();
    SadPathSummary { total, shares }
}

pub fn edit_label(identified: bool) -> &'static str {
    if identified {
        "Edit"
    } else {
        "Customize"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_curve_peaks_at_twelve() {
        let points = default_call_duration();
        assert_eq!(points.len(), 26);
        let peak = peak_point(&points).expect("peak");
        assert_eq!(peak.duration, 12);
        assert!((peak.density - 2.9).abs() < f64::EPSILON);
    }

    #[test]
    fn reshape_moves_peak_for_every_duration_in_domain() {
        let points = default_call_duration();
        for peak in 1..=25 {
            let reshaped = reshape_peak(&points, peak).expect("reshape");
            assert_eq!(peak_point(&reshaped).expect("peak").duration, peak);
            assert!((peak_point(&reshaped).expect("peak").density - 3.0).abs() < 1e-12);
        }
    }

    #[test]
    fn reshape_keeps_durations() {
        let points = default_call_duration();
        let reshaped = reshape_peak(&points, 5).expect("reshape");
        let before: Vec<i64> = points.iter().map(|p| p.duration).collect();
        let after: Vec<i64> = reshaped.iter().map(|p| p.duration).collect();
        assert_eq!(before, after);
        let at_nine = reshaped.iter().find(|p| p.duration == 9).expect("point");
        assert!((at_nine.density - 3.0 * (-1.0f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn reshape_past_domain_peaks_at_last_point() {
        let reshaped = reshape_peak(&default_call_duration(), 30).expect("reshape");
        assert_eq!(peak_point(&reshaped).expect("peak").duration, 25);
    }

    #[test]
    fn peak_input_bounds() {
        assert_eq!(parse_peak_input("1").expect("one"), 1);
        assert_eq!(parse_peak_input(" 30 ").expect("thirty"), 30);
        for bad in ["0", "31", "", "abc", "-4", "5.5", "99999999999999999999999"] {
            let error = parse_peak_input(bad).expect_err(bad);
            assert!(error.is_validation());
        }
        assert!(reshape_peak(&default_call_duration(), 0).is_err());
        assert!(reshape_peak(&default_call_duration(), 31).is_err());
    }

    #[test]
    fn empty_curve_summary_falls_back() {
        let summary = summarize_call_duration(&[]);
        assert_eq!(summary.peak_duration, 12);
        assert_eq!(summary.data_points, 0);
    }

    #[test]
    fn sad_path_total_tracks_edits_with_empty_count() {
        let categories = default_sad_path();
        assert_eq!(sad_path_total(&categories), 100);

        let edited = apply_sad_path_edits(
            &categories,
            &[
                SadPathEdit {
                    index: 0,
                    name: Some("Dropped Calls".to_string()),
                    count: Some(String::new()),
                },
                SadPathEdit {
                    index: 4,
                    name: None,
                    count: Some("40".to_string()),
                },
            ],
        )
        .expect("edits");

        assert_eq!(edited[0].name, "Dropped Calls");
        assert_eq!(edited[0].value, 0);
        assert_eq!(edited[0].color, "#ff6b35");
        assert_eq!(edited[4].value, 40);
        assert_eq!(sad_path_total(&edited), 25 + 20 + 12 + 40);
        assert_eq!(summarize_sad_path(&edited).total, sad_path_total(&edited));
    }

    #[test]
    fn sad_path_edits_reject_bad_input() {
        let categories = default_sad_path();
        let bad_count = SadPathEdit {
            index: 1,
            name: None,
            count: Some("12a".to_string()),
        };
        assert!(apply_sad_path_edits(&categories, &[bad_count]).expect_err("digits").is_validation());

        let bad_index = SadPathEdit {
            index: 9,
            name: Some("x".to_string()),
            count: None,
        };
        assert!(apply_sad_path_edits(&categories, &[bad_index]).is_err());
    }

    #[test]
    fn oversized_counts_are_rejected_and_stored_totals_saturate() {
        let categories = default_sad_path();
        let huge = SadPathEdit {
            index: 0,
            name: None,
            count: Some(u64::MAX.to_string()),
        };
        let one = SadPathEdit {
            index: 1,
            name: None,
            count: Some("1".to_string()),
        };
        assert!(apply_sad_path_edits(&categories, &[huge, one]).expect_err("too large").is_validation());
        assert_eq!(parse_count(&MAX_SAD_PATH_COUNT.to_string()).expect("max"), MAX_SAD_PATH_COUNT);
        assert!(parse_count(&(MAX_SAD_PATH_COUNT + 1).to_string()).is_err());

        let mut stored = categories;
        stored[0].value = u64::MAX;
        stored[1].value = 1;
        let summary = summarize_sad_path(&stored);
        assert_eq!(summary.total, u64::MAX);
        assert_eq!(sad_path_total(&stored), u64::MAX);
    }

    #[test]
    fn shares_are_zero_when_total_is_zero() {
        let mut categories = default_sad_path();
        for category in &mut categories {
            category.value = 0;
        }
        let summary = summarize_sad_path(&categories);
        assert_eq!(summary.total, 0);
        assert!(summary.shares.iter().all(|share| share.percentage == 0.0));
    }
}

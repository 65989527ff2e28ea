//! Time-of-day and day-of-week relevance.

use crate::types::RecommendationContext;

/// Coarse part of the day an hour (0-23) falls into.
pub fn time_band(hour: u32) -> &'static str {
    match hour {
        6..=9 => "morning",
        10 => "late_morning",
        11..=14 => "midday",
        15..=17 => "afternoon",
        18..=22 => "evening",
        _ => "night",
    }
}

/// Relevance of the request hour: morning and evening peaks score highest.
pub fn hour_relevance(hour: u32) -> f32 {
    match hour {
        6..=9 | 18..=22 => 0.9,
        11..=14 => 0.7,
        0..=5 => 0.3,
        _ => 0.5,
    }
}

pub fn day_relevance(context: &RecommendationContext) -> f32 {
    if context.is_weekend() {
        0.8
    } else {
        0.6
    }
}

pub fn is_night(hour: u32) -> bool {
    hour >= 20 || hour <= 5
}

pub fn is_lunch(hour: u32) -> bool {
    (11..=14).contains(&hour)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hour_relevance_peaks() {
        assert_eq!(hour_relevance(7), 0.9);
        assert_eq!(hour_relevance(20), 0.9);
        assert_eq!(hour_relevance(12), 0.7);
        assert_eq!(hour_relevance(3), 0.3);
        assert_eq!(hour_relevance(16), 0.5);
        assert_eq!(hour_relevance(23), 0.5);
    }

    #[test]
    fn test_night_and_lunch_windows() {
        assert!(is_night(20));
        assert!(is_night(0));
        assert!(is_night(5));
        assert!(!is_night(6));
        assert!(is_lunch(11));
        assert!(is_lunch(14));
        assert!(!is_lunch(15));
    }

    #[test]
    fn test_day_relevance() {
        let sunday = RecommendationContext {
            day_of_week: Some(0),
            ..Default::default()
        };
        let wednesday = RecommendationContext {
            day_of_week: Some(3),
            ..Default::default()
        };
        assert_eq!(day_relevance(&sunday), 0.8);
        assert_eq!(day_relevance(&wednesday), 0.6);
    }
}

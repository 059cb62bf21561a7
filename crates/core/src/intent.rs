use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{Intent, PropertyType};

pub fn normalize_text(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

/// Ordered (keywords, intent) rules; first match wins. `city_rent` is the
/// fallback for anything nothing else claims.
const INTENT_RULES: &[(&[&str], Intent)] = &[
    (
        &[
            "what is rti",
            "what is rent-to-income",
            "explain transit score",
            "what is eps",
        ],
        Intent::Explain,
    ),
    (&["afford", "rti", "rent to income"], Intent::Affordability),
    (
        &[
            "suggest",
            "recommend",
            "neighbourhood",
            "where should i live",
        ],
        Intent::Suggest,
    ),
    (&["median", "rent in", "city median"], Intent::CityRent),
    (&["transit"], Intent::NeighStats),
];

pub fn classify_intent(text: &str) -> Intent {
    let lower = text.to_lowercase();
    for (needles, intent) in INTENT_RULES {
        if contains_any(&lower, needles) {
            return *intent;
        }
    }
    Intent::CityRent
}

const KNOWN_CITIES: &[&str] = &[
    "Toronto",
    "Montreal",
    "Vancouver",
    "Ottawa",
    "Calgary",
    "Edmonton",
    "Winnipeg",
    "Quebec City",
    "Hamilton",
    "Mississauga",
    "Brampton",
    "Markham",
];

/// Free-text city detection; explicit args always win over this scan.
pub fn scan_city(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    KNOWN_CITIES
        .iter()
        .find(|city| lower.contains(&city.to_lowercase()))
        .copied()
}

static PROPERTY_PATTERNS: Lazy<Vec<(Regex, PropertyType)>> = Lazy::new(|| {
    [
        (r"(?i)\b(studio|bachelor)\b", PropertyType::Studio),
        (r"(?i)\b(1[\s-]*bed|one[\s-]*bed(room)?)\b", PropertyType::OneBed),
        (r"(?i)\b(2[\s-]*bed|two[\s-]*bed(room)?)\b", PropertyType::TwoBed),
        (r"(?i)\b(3[\s-]*bed|three[\s-]*bed(room)?)\b", PropertyType::ThreeBed),
    ]
    .into_iter()
    .map(|(pattern, property)| {
        let regex = Regex::new(pattern).unwrap_or_else(|_| Regex::new(r"$^").unwrap());
        (regex, property)
    })
    .collect()
});

pub fn scan_property_type(text: &str) -> Option<PropertyType> {
    PROPERTY_PATTERNS
        .iter()
        .find(|(pattern, _)| pattern.is_match(text))
        .map(|(_, property)| *property)
}

fn contains_any(input: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| input.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explain_wins_over_affordability() {
        // "what is rti" also contains the affordability keyword "rti";
        // earlier rules take priority.
        assert_eq!(classify_intent("what is rti?"), Intent::Explain);
    }

    #[test]
    fn classifies_each_intent() {
        assert_eq!(classify_intent("is this affordable?"), Intent::Affordability);
        assert_eq!(classify_intent("suggest areas in Toronto"), Intent::Suggest);
        assert_eq!(classify_intent("median rent in Toronto"), Intent::CityRent);
        assert_eq!(classify_intent("check transit"), Intent::NeighStats);
    }

    #[test]
    fn falls_back_to_city_rent() {
        assert_eq!(classify_intent("hello there"), Intent::CityRent);
    }

    #[test]
    fn scans_city_case_insensitively() {
        assert_eq!(scan_city("rent in toronto please"), Some("Toronto"));
        assert_eq!(scan_city("somewhere nice"), None);
    }

    #[test]
    fn scans_property_type_variants() {
        assert_eq!(scan_property_type("a one-bedroom flat"), Some(PropertyType::OneBed));
        assert_eq!(scan_property_type("2 bed condo"), Some(PropertyType::TwoBed));
        assert_eq!(scan_property_type("bachelor unit"), Some(PropertyType::Studio));
        assert_eq!(scan_property_type("a big house"), None);
    }

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize_text("  median   rent \n in Toronto "), "median rent in Toronto");
    }
}

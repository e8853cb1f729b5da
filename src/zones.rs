//! Zone classification for flights.
//!
//! Maps (flight type, gate, terminal, region, overrides) to one of the five
//! canonical zones. Pure functions only; the caller supplies the override map
//! and the US airport code set read from the store.

use std::collections::{HashMap, HashSet};

pub const PIER_A: &str = "Pier A";
pub const TB: &str = "TB";
pub const GATES: &str = "Gates";
pub const T1: &str = "T1";
pub const UNASSIGNED: &str = "Unassigned";

/// Canonical zone labels, in board display order.
pub const ZONES: [&str; 5] = [PIER_A, TB, GATES, T1, UNASSIGNED];

const PIER_A_GATES: [&str; 7] = ["B2A", "B2C", "B3", "B4", "B5", "B20", "B22"];

/// Uppercases, strips a leading `GATE ` label, and removes whitespace and
/// hyphens so FIDS variants like "Gate B-3" and "b3" collapse together.
pub fn normalize_gate(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    let stripped = upper.strip_prefix("GATE ").unwrap_or(&upper);
    stripped
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

/// Region bucket for an IATA code: known US airports, Canadian (`Y` prefix),
/// international, or empty when the code is missing.
pub fn region_of(iata: &str, us_codes: &HashSet<String>) -> &'static str {
    let code = iata.trim().to_uppercase();
    if code.is_empty() {
        ""
    } else if us_codes.contains(&code) {
        "US"
    } else if code.starts_with('Y') {
        "DOM"
    } else {
        "INTL"
    }
}

/// Swing-door gates serve either pier depending on where the flight is
/// coming from or headed.
fn resolve_swing_door(flight_type: &str, region: &str) -> &'static str {
    match region {
        "US" => TB,
        "INTL" => {
            if flight_type == "DEP" {
                PIER_A
            } else {
                TB
            }
        }
        "DOM" => PIER_A,
        _ => TB,
    }
}

fn is_terminal_one(terminal: &str) -> bool {
    let t = terminal.trim().to_uppercase();
    t == "1" || t == "T1"
}

fn numeric_portion(gate: &str) -> Option<u32> {
    let digits: String = gate.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

/// Classifies a flight to its zone. Overrides win, then named gate sets,
/// then gate number ranges, then the terminal fallback.
pub fn classify(
    flight_type: &str,
    raw_gate: &str,
    terminal: &str,
    region: &str,
    overrides: &HashMap<String, String>,
) -> String {
    let gate = normalize_gate(raw_gate);

    if let Some(value) = overrides.get(&gate) {
        let collapsed: String = value
            .to_uppercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if collapsed == "SWINGDOOR" {
            return resolve_swing_door(flight_type, region).to_string();
        }
        if collapsed == "UNASSIGNED" {
            return UNASSIGNED.to_string();
        }
        return value.clone();
    }

    if gate.is_empty() {
        return if is_terminal_one(terminal) { T1 } else { UNASSIGNED }.to_string();
    }

    if PIER_A_GATES.contains(&gate.as_str()) {
        return PIER_A.to_string();
    }
    if let Some(rest) = gate.strip_prefix('A') {
        if let Ok(n) = rest.parse::<u32>() {
            if (6..=15).contains(&n) {
                return TB.to_string();
            }
        }
    }

    if let Some(n) = numeric_portion(&gate) {
        if (23..=41).contains(&n) {
            return GATES.to_string();
        }
        if (15..=19).contains(&n) {
            return resolve_swing_door(flight_type, region).to_string();
        }
    }

    if is_terminal_one(terminal) { T1 } else { UNASSIGNED }.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_overrides() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn gate_normalization_collapses_variants() {
        assert_eq!(normalize_gate("Gate B-3"), "B3");
        assert_eq!(normalize_gate(" b3 "), "B3");
        assert_eq!(normalize_gate("GATE A 10"), "A10");
        assert_eq!(normalize_gate(""), "");
    }

    #[test]
    fn named_gate_sets() {
        let ov = no_overrides();
        assert_eq!(classify("ARR", "B3", "1", "DOM", &ov), PIER_A);
        assert_eq!(classify("ARR", "B20", "1", "DOM", &ov), PIER_A);
        assert_eq!(classify("DEP", "A6", "1", "DOM", &ov), TB);
        assert_eq!(classify("DEP", "A15", "1", "DOM", &ov), TB);
        // A16 is outside the TB set; numeric 16 hits the swing-door range.
        assert_eq!(classify("DEP", "A16", "1", "DOM", &ov), PIER_A);
    }

    #[test]
    fn numeric_ranges() {
        let ov = no_overrides();
        assert_eq!(classify("ARR", "23", "1", "DOM", &ov), GATES);
        assert_eq!(classify("ARR", "41", "1", "DOM", &ov), GATES);
        assert_eq!(classify("ARR", "C24", "1", "DOM", &ov), GATES);
        // 42 misses both ranges and falls through to the terminal.
        assert_eq!(classify("ARR", "42", "1", "DOM", &ov), T1);
        assert_eq!(classify("ARR", "42", "3", "DOM", &ov), UNASSIGNED);
    }

    #[test]
    fn swing_door_range_by_type_and_region() {
        let ov = no_overrides();
        assert_eq!(classify("ARR", "16", "1", "US", &ov), TB);
        assert_eq!(classify("DEP", "16", "1", "US", &ov), TB);
        assert_eq!(classify("ARR", "17", "1", "INTL", &ov), TB);
        assert_eq!(classify("DEP", "17", "1", "INTL", &ov), PIER_A);
        assert_eq!(classify("ARR", "18", "1", "DOM", &ov), PIER_A);
        assert_eq!(classify("DEP", "19", "1", "", &ov), TB);
    }

    #[test]
    fn missing_gate_uses_terminal() {
        let ov = no_overrides();
        assert_eq!(classify("ARR", "", "1", "DOM", &ov), T1);
        assert_eq!(classify("ARR", "", "T1", "DOM", &ov), T1);
        assert_eq!(classify("ARR", "", "3", "DOM", &ov), UNASSIGNED);
        assert_eq!(classify("ARR", "", "", "DOM", &ov), UNASSIGNED);
    }

    #[test]
    fn overrides_win_over_everything() {
        let mut ov = no_overrides();
        ov.insert("B3".to_string(), "Gates".to_string());
        assert_eq!(classify("ARR", "Gate B-3", "1", "DOM", &ov), GATES);
    }

    #[test]
    fn override_special_tokens() {
        let mut ov = no_overrides();
        ov.insert("D7".to_string(), "Swing Door".to_string());
        ov.insert("D8".to_string(), "unassigned".to_string());
        // Swing-door token resolves by type and region.
        assert_eq!(classify("DEP", "D7", "1", "INTL", &ov), PIER_A);
        assert_eq!(classify("ARR", "D7", "1", "US", &ov), TB);
        assert_eq!(classify("ARR", "D8", "1", "DOM", &ov), UNASSIGNED);
    }

    #[test]
    fn override_free_form_value_passes_through() {
        let mut ov = no_overrides();
        ov.insert("V1".to_string(), "Valet".to_string());
        assert_eq!(classify("ARR", "V1", "1", "DOM", &ov), "Valet");
    }

    #[test]
    fn region_lookup() {
        let us: HashSet<String> = ["JFK", "LGA", "EWR"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(region_of("JFK", &us), "US");
        assert_eq!(region_of("jfk", &us), "US");
        assert_eq!(region_of("YEG", &us), "DOM");
        assert_eq!(region_of("LHR", &us), "INTL");
        assert_eq!(region_of("", &us), "");
    }
}

use crate::competency::InputError;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Unit {
    Hours,
    Minutes,
}

fn unit_for(word: &str) -> Option<Unit> {
    match word {
        "h" | "hr" | "hrs" | "hour" | "hours" | "heure" | "heures" => Some(Unit::Hours),
        "m" | "mn" | "min" | "mins" | "minute" | "minutes" => Some(Unit::Minutes),
        _ => None,
    }
}

/// Parse a free-text duration into whole minutes.
///
/// Accepts bare minutes (`90`), hours (`2h`, `2 hours`, `2 heures`, `1.5h`),
/// and mixed forms (`3h30`, `1 heure 30 minutes`). A number without a unit
/// that follows an hour component is read as minutes.
pub fn parse_duration_minutes(input: &str) -> Result<u32, InputError> {
    let invalid = || InputError::InvalidDuration(input.trim().to_string());
    let text = input.trim().to_lowercase();
    let chars: Vec<char> = text.chars().collect();

    let mut total = 0.0_f64;
    let mut last_unit: Option<Unit> = None;
    let mut seen_number = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if !c.is_ascii_digit() {
            return Err(invalid());
        }

        let start = i;
        while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.' || chars[i] == ',')
        {
            i += 1;
        }
        let number: String = chars[start..i]
            .iter()
            .map(|c| if *c == ',' { '.' } else { *c })
            .collect();
        let value: f64 = number.parse().map_err(|_| invalid())?;
        seen_number = true;

        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        let word_start = i;
        while i < chars.len() && chars[i].is_alphabetic() {
            i += 1;
        }
        let word: String = chars[word_start..i].iter().collect();

        let unit = if word.is_empty() {
            Unit::Minutes
        } else {
            unit_for(&word).ok_or_else(invalid)?
        };
        if unit == Unit::Hours && last_unit.is_some() {
            return Err(invalid());
        }

        total += match unit {
            Unit::Hours => value * 60.0,
            Unit::Minutes => value,
        };
        last_unit = Some(unit);
    }

    if !seen_number || total < 1.0 || total > f64::from(u32::MAX) {
        return Err(invalid());
    }
    Ok(total.round() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_minutes() {
        assert_eq!(parse_duration_minutes("90").unwrap(), 90);
        assert_eq!(parse_duration_minutes("45 min").unwrap(), 45);
    }

    #[test]
    fn test_hours() {
        assert_eq!(parse_duration_minutes("2h").unwrap(), 120);
        assert_eq!(parse_duration_minutes("2 hours").unwrap(), 120);
        assert_eq!(parse_duration_minutes("2 heures").unwrap(), 120);
        assert_eq!(parse_duration_minutes("1,5h").unwrap(), 90);
    }

    #[test]
    fn test_mixed_forms() {
        assert_eq!(parse_duration_minutes("3h30").unwrap(), 210);
        assert_eq!(parse_duration_minutes("1 heure 30 minutes").unwrap(), 90);
    }

    #[test]
    fn test_rejects_garbage_and_zero() {
        assert!(parse_duration_minutes("").is_err());
        assert!(parse_duration_minutes("soon").is_err());
        assert!(parse_duration_minutes("0").is_err());
        assert!(parse_duration_minutes("2 days").is_err());
        assert!(parse_duration_minutes("30min 2h").is_err());
    }
}

use serde::{Deserialize, Serialize};

/// The three-tier APC scale. Ordering follows declaration: ND < NI < NA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RubricLevel {
    /// Not achieved
    #[serde(rename = "ND")]
    NotAchieved,
    /// In progress
    #[serde(rename = "NI")]
    InProgress,
    /// Achieved
    #[serde(rename = "NA")]
    Achieved,
}

impl RubricLevel {
    /// All levels in ascending order
    pub const ALL: [RubricLevel; 3] = [
        RubricLevel::NotAchieved,
        RubricLevel::InProgress,
        RubricLevel::Achieved,
    ];

    /// Short code used as the JSON key
    pub fn code(&self) -> &'static str {
        match self {
            RubricLevel::NotAchieved => "ND",
            RubricLevel::InProgress => "NI",
            RubricLevel::Achieved => "NA",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RubricLevel::NotAchieved => "Not Achieved",
            RubricLevel::InProgress => "In Progress",
            RubricLevel::Achieved => "Achieved",
        }
    }
}

impl std::fmt::Display for RubricLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl std::str::FromStr for RubricLevel {
    type Err = String;

    /// Accepts the codes in any case, the `nd_criteria` / `nd_range` key
    /// spellings models tend to emit, and the long labels.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        let key = normalized
            .strip_suffix("_criteria")
            .or_else(|| normalized.strip_suffix("_range"))
            .unwrap_or(&normalized);

        match key {
            "nd" | "not achieved" | "not_achieved" => Ok(RubricLevel::NotAchieved),
            "ni" | "in progress" | "in_progress" => Ok(RubricLevel::InProgress),
            "na" | "achieved" => Ok(RubricLevel::Achieved),
            _ => Err(format!("Unknown rubric level: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_are_ordered() {
        assert!(RubricLevel::NotAchieved < RubricLevel::InProgress);
        assert!(RubricLevel::InProgress < RubricLevel::Achieved);
    }

    #[test]
    fn test_parse_key_spellings() {
        assert_eq!("ND".parse::<RubricLevel>().unwrap(), RubricLevel::NotAchieved);
        assert_eq!("ni_criteria".parse::<RubricLevel>().unwrap(), RubricLevel::InProgress);
        assert_eq!("na_range".parse::<RubricLevel>().unwrap(), RubricLevel::Achieved);
        assert_eq!("In Progress".parse::<RubricLevel>().unwrap(), RubricLevel::InProgress);
        assert!("NX".parse::<RubricLevel>().is_err());
    }

    #[test]
    fn test_serializes_as_code() {
        let json = serde_json::to_string(&RubricLevel::Achieved).unwrap();
        assert_eq!(json, "\"NA\"");
    }
}

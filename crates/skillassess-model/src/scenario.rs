use serde::{Deserialize, Serialize};

/// Authentic evaluation situation the learner is placed in
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Professional context of the situation
    #[serde(default)]
    pub context: String,
    /// The complex task to carry out
    #[serde(default)]
    pub task: String,
    /// Instructions handed to learners
    pub instructions: String,
}

impl Scenario {
    pub fn new(
        context: impl Into<String>,
        task: impl Into<String>,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            context: context.into(),
            task: task.into(),
            instructions: instructions.into(),
        }
    }

    /// Full scenario text (non-empty parts, blank-line separated)
    pub fn text(&self) -> String {
        [&self.context, &self.task, &self.instructions]
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Whether the text mentions `phrase`: either the whole phrase or one of
    /// its significant words, case-insensitively.
    pub fn mentions(&self, phrase: &str) -> bool {
        let text = self.text().to_lowercase();
        let phrase = phrase.trim().to_lowercase();
        if phrase.is_empty() {
            return false;
        }
        if text.contains(&phrase) {
            return true;
        }
        phrase
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| is_significant(word))
            .any(|word| text.contains(word))
    }
}

/// Function words that appear in almost any scenario
const STOP_WORDS: &[&str] = &[
    "and", "for", "the", "with", "from", "into", "over", "under", "les", "des", "une", "pour",
    "dans", "avec", "sans", "sur", "aux", "par", "entre", "vers",
];

fn is_significant(word: &str) -> bool {
    word.chars().count() >= 4 && !STOP_WORDS.contains(&word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_skips_empty_parts() {
        let s = Scenario::new("", "Configure the router", "Work alone");
        assert_eq!(s.text(), "Configure the router\n\nWork alone");
    }

    #[test]
    fn test_mentions_by_word() {
        let s = Scenario::new("A small networking company", "", "Do it");
        assert!(s.mentions("Networking"));
        assert!(s.mentions("Computer networking track"));
        assert!(!s.mentions("databases"));
        assert!(!s.mentions("  "));
    }

    #[test]
    fn test_function_words_do_not_count() {
        let s = Scenario::new(
            "Une agence des services publics recrute.",
            "Organiser les dossiers avec soin.",
            "Travail individuel",
        );
        assert!(!s.mentions("Développement des applications"));
        assert!(!s.mentions("Gestion avec les outils"));

        let web = Scenario::new("Une agence de développement web", "", "Travail individuel");
        assert!(web.mentions("Développement des applications"));
    }
}

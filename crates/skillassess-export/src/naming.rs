use sha2::{Digest, Sha256};

use skillassess_model::Competency;

const SLUG_CHARS: usize = 50;

/// File stem for a competency: `<slug>_<hash>`.
///
/// The slug keeps the first 50 characters of the statement; the 6-digit hash
/// of the whole record keeps stems of similar competencies apart.
pub fn file_stem(competency: &Competency) -> String {
    format!("{}_{}", slug(competency.statement()), short_hash(competency))
}

fn slug(statement: &str) -> String {
    let mut slug = String::new();
    for c in statement.chars().take(SLUG_CHARS) {
        if c.is_ascii_alphanumeric() || c == '-' {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    let slug = slug.trim_matches('_');
    if slug.is_empty() {
        "assessment".to_string()
    } else {
        slug.to_string()
    }
}

fn short_hash(competency: &Competency) -> String {
    let record = serde_json::to_vec(competency).unwrap_or_default();
    let digest = Sha256::digest(&record);
    hex::encode(digest)[..6].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_normalizes_statement() {
        assert_eq!(slug("Configure a small-office LAN!"), "configure_a_small-office_lan");
        assert_eq!(slug("Réseau   local"), "r_seau_local");
        assert_eq!(slug("!!!"), "assessment");
        assert_eq!(slug(&"x".repeat(80)).len(), 50);
    }

    #[test]
    fn test_stem_differs_by_context() {
        let a = Competency::new("Configure a LAN", "intermediate", "networking", 60).unwrap();
        let b = Competency::new("Configure a LAN", "advanced", "networking", 60).unwrap();
        let stem_a = file_stem(&a);
        assert!(stem_a.starts_with("configure_a_lan_"));
        assert_eq!(stem_a.len(), "configure_a_lan_".len() + 6);
        assert_ne!(stem_a, file_stem(&b));
        assert_eq!(stem_a, file_stem(&a));
    }
}

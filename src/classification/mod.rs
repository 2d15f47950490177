//! Incident classification.
//!
//! Classification is keyword driven and deterministic. Callers that want
//! spread in the reported confidence (simulations, load tests) inject a
//! [`ConfidenceJitter`] with an explicit seed.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{Classification, Incident, IncidentCategory};

/// Confidence when nothing in the incident points to a category
pub const FALLBACK_CONFIDENCE: u8 = 20;

/// Assigns a category and confidence to an incident
pub trait IncidentClassifier: Send + Sync {
    /// Never fails; unknown content falls back to `General`
    fn classify(&self, incident: &Incident, table: &KeywordTable) -> Classification;
}

/// Keywords per category, evaluated in table order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeywordTable {
    pub entries: Vec<KeywordEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeywordEntry {
    pub category: IncidentCategory,
    pub keywords: Vec<String>,
}

impl Default for KeywordTable {
    fn default() -> Self {
        let entry = |category, words: &[&str]| KeywordEntry {
            category,
            keywords: words.iter().map(|w| w.to_string()).collect(),
        };

        Self {
            entries: vec![
                entry(
                    IncidentCategory::DataBreach,
                    &["breach", "leak", "exfiltrat", "exposed", "personal data", "ransomware"],
                ),
                entry(
                    IncidentCategory::PaymentFraud,
                    &["fraud", "chargeback", "stolen card", "card", "unauthorized charge", "payment"],
                ),
                entry(
                    IncidentCategory::AccessViolation,
                    &["unauthorized access", "key card", "keycard", "tailgat", "forced entry", "restricted area"],
                ),
                entry(
                    IncidentCategory::OperationalSecurity,
                    &["cctv", "alarm", "suspicious", "camera", "intruder", "fire door"],
                ),
            ],
        }
    }
}

impl KeywordTable {
    /// Matched keywords per table entry, in table order
    fn hits<'a>(&'a self, text: &str) -> Vec<(IncidentCategory, Vec<&'a str>)> {
        self.entries
            .iter()
            .map(|entry| {
                let matched = entry
                    .keywords
                    .iter()
                    .filter(|k| !k.is_empty() && text.contains(k.to_lowercase().as_str()))
                    .map(String::as_str)
                    .collect();
                (entry.category, matched)
            })
            .collect()
    }
}

/// Seeded perturbation of the reported confidence
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfidenceJitter {
    pub seed: u64,
    pub max_jitter: u8,
}

impl ConfidenceJitter {
    pub fn new(seed: u64, max_jitter: u8) -> Self {
        Self { seed, max_jitter }
    }

    /// Same seed and incident always produce the same value
    fn apply(&self, incident: &Incident, confidence: u8) -> u8 {
        if self.max_jitter == 0 {
            return confidence;
        }

        let (high, low) = incident.id.as_u64_pair();
        let mut rng = StdRng::seed_from_u64(self.seed ^ high ^ low.rotate_left(17));
        let spread = self.max_jitter as i16;
        let delta = rng.gen_range(-spread..=spread);

        (confidence as i16 + delta).clamp(1, 100) as u8
    }
}

/// Default classifier backed by a keyword table
#[derive(Debug, Clone, Default)]
pub struct KeywordClassifier {
    jitter: Option<ConfidenceJitter>,
}

impl KeywordClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_jitter(mut self, jitter: ConfidenceJitter) -> Self {
        self.jitter = Some(jitter);
        self
    }

    fn score(&self, incident: &Incident, table: &KeywordTable) -> Classification {
        let text = incident.description.to_lowercase();
        let hits = table.hits(&text);

        let strongest = hits
            .iter()
            .filter(|(_, matched)| !matched.is_empty())
            .fold(None::<&(IncidentCategory, Vec<&str>)>, |best, candidate| match best {
                Some(b) if b.1.len() >= candidate.1.len() => Some(b),
                _ => Some(candidate),
            });

        let keyword_signals = |matched: &[&str]| -> Vec<String> {
            matched.iter().map(|k| format!("keyword:{}", k)).collect()
        };

        if incident.category != IncidentCategory::General {
            let own: &[&str] = hits
                .iter()
                .find(|(category, _)| *category == incident.category)
                .map(|(_, matched)| matched.as_slice())
                .unwrap_or(&[]);

            let mut signals = vec![format!("declared_category:{}", incident.category)];
            signals.extend(keyword_signals(own));

            if let Some((competitor, matched)) = strongest {
                if *competitor != incident.category && matched.len() > own.len() {
                    signals.push(format!("competing_category:{}", competitor));
                    return Classification {
                        category: incident.category,
                        confidence: 55,
                        reasoning: format!(
                            "Declared {} but description points more strongly to {}",
                            incident.category, competitor
                        ),
                        signals,
                    };
                }
            }

            let confidence = (70 + 5 * own.len()).min(99) as u8;
            return Classification {
                category: incident.category,
                confidence,
                reasoning: format!(
                    "Declared category {} supported by {} keyword(s)",
                    incident.category,
                    own.len()
                ),
                signals,
            };
        }

        match strongest {
            Some((category, matched)) => Classification {
                category: *category,
                confidence: (50 + 10 * matched.len()).min(90) as u8,
                reasoning: format!("Inferred {} from {} keyword(s)", category, matched.len()),
                signals: keyword_signals(matched),
            },
            None => Classification {
                category: IncidentCategory::General,
                confidence: FALLBACK_CONFIDENCE,
                reasoning: "No category evidence; defaulting to General".to_string(),
                signals: vec!["no_keyword_match".to_string()],
            },
        }
    }
}

impl IncidentClassifier for KeywordClassifier {
    fn classify(&self, incident: &Incident, table: &KeywordTable) -> Classification {
        let mut classification = self.score(incident, table);

        if let Some(jitter) = self.jitter {
            classification.confidence = jitter.apply(incident, classification.confidence);
            classification.signals.push(format!("jitter_seed:{}", jitter.seed));
        }

        debug!(
            incident_id = %incident.id,
            category = %classification.category,
            confidence = classification.confidence,
            "Incident classified"
        );

        classification
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;

    fn classify(category: IncidentCategory, description: &str) -> Classification {
        let incident = Incident::new(category, Severity::Medium, description, "test");
        KeywordClassifier::new().classify(&incident, &KeywordTable::default())
    }

    #[test]
    fn test_declared_category_kept() {
        let c = classify(IncidentCategory::AccessViolation, "Guest used a cloned key card");
        assert_eq!(c.category, IncidentCategory::AccessViolation);
        assert_eq!(c.confidence, 75);
        assert!(c.signals.contains(&"keyword:key card".to_string()));
    }

    #[test]
    fn test_declared_without_keywords() {
        let c = classify(IncidentCategory::DataBreach, "Reported by auditor");
        assert_eq!(c.category, IncidentCategory::DataBreach);
        assert_eq!(c.confidence, 70);
    }

    #[test]
    fn test_competing_evidence_lowers_confidence() {
        let c = classify(
            IncidentCategory::OperationalSecurity,
            "Stolen card used for unauthorized charge, fraud suspected",
        );
        assert_eq!(c.category, IncidentCategory::OperationalSecurity);
        assert_eq!(c.confidence, 55);
        assert!(c.signals.iter().any(|s| s == "competing_category:PaymentFraud"));
    }

    #[test]
    fn test_general_is_inferred_from_keywords() {
        let c = classify(IncidentCategory::General, "Possible data leak, personal data exposed");
        assert_eq!(c.category, IncidentCategory::DataBreach);
        assert_eq!(c.confidence, 80);
    }

    #[test]
    fn test_unknown_content_falls_back() {
        let c = classify(IncidentCategory::General, "Towels missing from room 204");
        assert_eq!(c.category, IncidentCategory::General);
        assert_eq!(c.confidence, FALLBACK_CONFIDENCE);
        assert!(c.confidence > 0);
    }

    #[test]
    fn test_tie_resolves_by_table_order() {
        // one DataBreach keyword, one PaymentFraud keyword
        let c = classify(IncidentCategory::General, "leak near the payment terminal");
        assert_eq!(c.category, IncidentCategory::DataBreach);
    }

    #[test]
    fn test_confidence_capped() {
        let c = classify(
            IncidentCategory::DataBreach,
            "breach leak exfiltration exposed personal data ransomware",
        );
        assert!(c.confidence <= 99);
    }

    #[test]
    fn test_deterministic() {
        let incident = Incident::new(IncidentCategory::General, Severity::Low, "suspicious person near camera", "cctv");
        let classifier = KeywordClassifier::new();
        let table = KeywordTable::default();
        assert_eq!(classifier.classify(&incident, &table), classifier.classify(&incident, &table));
    }

    #[test]
    fn test_seeded_jitter_is_reproducible() {
        let incident = Incident::new(IncidentCategory::PaymentFraud, Severity::High, "chargeback", "pos");
        let table = KeywordTable::default();
        let a = KeywordClassifier::new().with_jitter(ConfidenceJitter::new(42, 10));
        let b = KeywordClassifier::new().with_jitter(ConfidenceJitter::new(42, 10));

        let first = a.classify(&incident, &table);
        assert_eq!(first, b.classify(&incident, &table));
        assert!((65..=85).contains(&first.confidence));
    }

    #[test]
    fn test_zero_jitter_is_identity() {
        let incident = Incident::new(IncidentCategory::PaymentFraud, Severity::High, "chargeback", "pos");
        let table = KeywordTable::default();
        let plain = KeywordClassifier::new().classify(&incident, &table);
        let jittered = KeywordClassifier::new()
            .with_jitter(ConfidenceJitter::new(7, 0))
            .classify(&incident, &table);
        assert_eq!(plain.confidence, jittered.confidence);
    }
}

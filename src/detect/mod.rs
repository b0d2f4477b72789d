//! Local keyword-based animal and wildlife-product detection. Runs over the
//! description at parse time, before (and independent of) the LLM
//! enrichment path, so every candidate carries species information even
//! when no extraction service is reachable.

use crate::domain::IncidentCandidate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Reverse;
use std::collections::BTreeSet;
use tracing::debug;

/// Animal terms and the display name they normalize to. Plural forms are
/// listed explicitly; matching is whole-word.
const ANIMAL_TERMS: &[(&str, &str)] = &[
    ("elephant", "Asian Elephant"),
    ("elephants", "Asian Elephant"),
    ("tusker", "Asian Elephant"),
    ("tuskers", "Asian Elephant"),
    ("tiger", "Royal Bengal Tiger"),
    ("tigers", "Royal Bengal Tiger"),
    ("leopard", "Leopard"),
    ("leopards", "Leopard"),
    ("panther", "Leopard"),
    ("rhino", "Rhinoceros"),
    ("rhinos", "Rhinoceros"),
    ("rhinoceros", "Rhinoceros"),
    ("pangolin", "Pangolin"),
    ("pangolins", "Pangolin"),
    ("scaly anteater", "Pangolin"),
    ("sloth bear", "Sloth Bear"),
    ("bear", "Bear"),
    ("bears", "Bear"),
    ("spotted deer", "Spotted Deer"),
    ("chital", "Spotted Deer"),
    ("sambar", "Sambar Deer"),
    ("deer", "Deer"),
    ("otter", "Otter"),
    ("otters", "Otter"),
    ("macaque", "Macaque"),
    ("langur", "Langur"),
    ("monkey", "Monkey"),
    ("monkeys", "Monkey"),
    ("cobra", "Cobra"),
    ("cobras", "Cobra"),
    ("python", "Python"),
    ("pythons", "Python"),
    ("viper", "Viper"),
    ("snake", "Snake"),
    ("snakes", "Snake"),
    ("sea turtle", "Sea Turtle"),
    ("sea turtles", "Sea Turtle"),
    ("turtle", "Turtle"),
    ("turtles", "Turtle"),
    ("tortoise", "Tortoise"),
    ("tortoises", "Tortoise"),
    ("crocodile", "Crocodile"),
    ("alligator", "Alligator"),
    ("shark", "Shark"),
    ("sharks", "Shark"),
    ("seahorse", "Seahorse"),
    ("sea cucumber", "Sea Cucumber"),
    ("sea cucumbers", "Sea Cucumber"),
    ("whale", "Whale"),
    ("whales", "Whale"),
    ("dolphin", "Dolphin"),
    ("dolphins", "Dolphin"),
    ("eagle", "Eagle"),
    ("eagles", "Eagle"),
    ("hawk", "Hawk"),
    ("hawks", "Hawk"),
    ("vulture", "Vulture"),
    ("vultures", "Vulture"),
    ("parrot", "Parrot"),
    ("parrots", "Parrot"),
    ("macaw", "Macaw"),
    ("macaws", "Macaw"),
    ("peacock", "Peacock"),
    ("peafowl", "Peacock"),
    ("hornbill", "Hornbill"),
    ("hornbills", "Hornbill"),
    ("myna", "Myna"),
    ("mynas", "Myna"),
    ("carcass", "Carcass"),
    ("carcasses", "Carcass"),
];

/// Trafficked-part and product terms. Composite terms come before their
/// generic components so `pangolin scales` wins over `scales`.
const PRODUCT_TERMS: &[(&str, &str)] = &[
    ("elephant tusk", "Ivory"),
    ("elephant tusks", "Ivory"),
    ("ivory", "Ivory"),
    ("tusk", "Ivory"),
    ("tusks", "Ivory"),
    ("rhino horn", "Rhino Horn"),
    ("rhino horns", "Rhino Horn"),
    ("horn", "Horn"),
    ("horns", "Horn"),
    ("antler", "Antlers"),
    ("antlers", "Antlers"),
    ("pangolin scales", "Pangolin Scales"),
    ("scale", "Animal Scales"),
    ("scales", "Animal Scales"),
    ("skin", "Animal Skin"),
    ("skins", "Animal Skin"),
    ("pelt", "Animal Skin"),
    ("pelts", "Animal Skin"),
    ("hide", "Animal Skin"),
    ("hides", "Animal Skin"),
    ("leather", "Animal Skin"),
    ("bushmeat", "Bushmeat"),
    ("bone", "Animal Bones"),
    ("bones", "Animal Bones"),
    ("skull", "Animal Bones"),
    ("claw", "Claws"),
    ("claws", "Claws"),
    ("feather", "Feathers"),
    ("feathers", "Feathers"),
    ("turtle shell", "Turtle Shell"),
    ("tortoise shell", "Turtle Shell"),
    ("shell", "Shell"),
    ("shells", "Shell"),
    ("bile", "Bile"),
    ("gallbladder", "Bile"),
    ("shark fin", "Shark Fin"),
    ("shark fins", "Shark Fin"),
    ("trophy", "Trophy"),
    ("taxidermy", "Trophy"),
    ("coral", "Coral"),
    ("live specimen", "Live Specimen"),
    ("live specimens", "Live Specimen"),
];

static ANIMAL_RE: Lazy<Regex> = Lazy::new(|| term_regex(ANIMAL_TERMS));
static PRODUCT_RE: Lazy<Regex> = Lazy::new(|| term_regex(PRODUCT_TERMS));

/// Whole-word alternation over a term table, longest term first so that
/// composites beat their components.
fn term_regex(terms: &[(&str, &str)]) -> Regex {
    let mut keys: Vec<&str> = terms.iter().map(|(key, _)| *key).collect();
    keys.sort_by_key(|key| Reverse(key.len()));
    Regex::new(&format!(r"\b(?:{})\b", keys.join("|"))).expect("valid regex")
}

fn normalized(terms: &[(&'static str, &'static str)], key: &str) -> Option<&'static str> {
    terms
        .iter()
        .find(|(term, _)| *term == key)
        .map(|(_, name)| *name)
}

pub struct AnimalDetector;

impl AnimalDetector {
    /// Scans the description for known animal and product terms. Returns a
    /// sorted, de-duplicated, comma-joined list, or `None` when nothing is
    /// recognized.
    pub fn detect(description: &str) -> Option<String> {
        let text = description.to_ascii_lowercase();
        let mut found: BTreeSet<&'static str> = BTreeSet::new();

        for matched in PRODUCT_RE.find_iter(&text) {
            if let Some(name) = normalized(PRODUCT_TERMS, matched.as_str()) {
                found.insert(name);
            }
        }
        for matched in ANIMAL_RE.find_iter(&text) {
            if let Some(name) = normalized(ANIMAL_TERMS, matched.as_str()) {
                found.insert(name);
            }
        }

        (!found.is_empty()).then(|| found.into_iter().collect::<Vec<_>>().join(", "))
    }

    /// Seeds each candidate's `animals` field from its description. Purely
    /// local; never touches `ai_enriched` and never overwrites a value that
    /// is already present.
    pub fn annotate_batch(candidates: &mut [IncidentCandidate]) {
        for candidate in candidates.iter_mut() {
            if let Some(animals) = Self::detect(&candidate.description) {
                let enrichment = candidate.enrichment.get_or_insert_with(Default::default);
                if enrichment.animals.is_empty() {
                    debug!(candidate = %candidate.id, animals = %animals, "detected species locally");
                    enrichment.animals = animals;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn products_are_detected_and_normalized() {
        assert_eq!(
            AnimalDetector::detect("Ivory tusks seized from smugglers near the harbour"),
            Some("Ivory".to_string())
        );
    }

    #[test]
    fn animals_and_products_combine_sorted() {
        assert_eq!(
            AnimalDetector::detect("Forest patrol recovered elephant tusks"),
            Some("Asian Elephant, Ivory".to_string())
        );
        assert_eq!(
            AnimalDetector::detect("Leopard skins recovered from traders"),
            Some("Animal Skin, Leopard".to_string())
        );
    }

    #[test]
    fn composite_terms_beat_their_components() {
        // "pangolin scales" must not additionally report generic scales
        assert_eq!(
            AnimalDetector::detect("Pangolin scales found in cargo consignment"),
            Some("Pangolin, Pangolin Scales".to_string())
        );
    }

    #[test]
    fn whole_word_matching_avoids_partials() {
        // 'ear' in 'bear' style false positives, reversed: no 'bear' in 'bearing'
        assert_eq!(AnimalDetector::detect("Truck bearing registration ABC"), None);
        assert_eq!(AnimalDetector::detect("Routine traffic accident on highway"), None);
    }

    #[test]
    fn annotation_is_local_and_non_destructive() {
        let mut candidates = vec![
            IncidentCandidate::new(
                "08.01.2013".to_string(),
                "Mumbai".to_string(),
                "5".to_string(),
                "Ivory tusks seized from smugglers".to_string(),
                None,
            ),
            IncidentCandidate::new(
                "Jan 2013".to_string(),
                "Delhi".to_string(),
                "12".to_string(),
                "Routine paperwork audit".to_string(),
                None,
            ),
        ];

        AnimalDetector::annotate_batch(&mut candidates);

        let seeded = candidates[0].enrichment.as_ref().unwrap();
        assert_eq!(seeded.animals, "Ivory");
        assert!(!candidates[0].ai_enriched);
        assert!(candidates[1].enrichment.is_none());
    }

    #[test]
    fn existing_animals_value_is_not_overwritten() {
        let mut candidate = IncidentCandidate::new(
            "08.01.2013".to_string(),
            "Mumbai".to_string(),
            "5".to_string(),
            "Ivory tusks seized".to_string(),
            None,
        );
        candidate.enrichment = Some(crate::domain::Enrichment {
            animals: "Reviewer Entered".to_string(),
            ..Default::default()
        });

        AnimalDetector::annotate_batch(std::slice::from_mut(&mut candidate));
        assert_eq!(
            candidate.enrichment.as_ref().unwrap().animals,
            "Reviewer Entered"
        );
    }
}

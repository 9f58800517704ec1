//! UI chrome phrases that are never post text.
//!
//! Matched against whole, whitespace-normalized strings, case-insensitive.
//! English and French are covered.

use lazy_static::lazy_static;
use regex::RegexSet;

lazy_static! {
    static ref UI_CHROME: RegexSet = RegexSet::new([
        // Engagement verbs
        r"^(like|love|comment|comments|share|reply|send|save|react|j'aime|j’aime|commenter|commentaire|partager|répondre|envoyer|enregistrer|réagir)$",
        // Expanders and translation toggles
        r"^(see more|see less|show more|view more comments|view more replies|see translation|see original|rate this translation)$",
        r"^(voir plus|voir moins|afficher plus|voir plus de commentaires|voir la traduction|voir l’original|voir l'original|évaluer cette traduction)$",
        r"^…\s*(see more|voir plus)$",
        // Relative timestamps: 3h, 12 min, 2 d, 1 sem, 5 ans
        r"^\d+\s*(s|m|h|d|w|y|j|min|mins|hr|hrs|sem|an|ans)$",
        r"^\d+\s*(second|minute|hour|day|week|month|year)s?( ago)?$",
        r"^(il y a )?\d+\s*(seconde|minute|heure|jour|semaine|mois|an)s?$",
        r"^(just now|yesterday|à l’instant|à l'instant|hier)$",
        r"^(yesterday|hier) (at|à) \d{1,2}[:h]\d{2}$",
        // Counters: 12, 1.2k, 3,4 k, 15 comments, 2 partages
        r"^\d+([.,]\d+)?\s*[km]?$",
        r"^\d+([.,]\d+)?\s*[km]?\s*(comments?|shares?|reactions?|replies|reply|views?)$",
        r"^\d+([.,]\d+)?\s*[km]?\s*(commentaires?|partages?|réactions?|réponses?|vues?)$",
        // Follow and verification badges
        r"^·?\s*(follow|following|suivre|abonné|abonnée|s’abonner|s'abonner)$",
        r"^(verified|verified account|vérifié|compte vérifié)$",
        r"^(top contributor|rising contributor|admin|moderator|author|contributeur principal|contributrice principale|administrateur|modérateur|auteur)$",
        r"^(most relevant|newest|all comments|plus pertinents|plus récents|tous les commentaires)$",
        r"^[·•\s]*$",
    ].iter().map(|p| format!("(?i){}", p)))
    .unwrap();
}

/// True when `text` is a known UI label, counter, or timestamp
pub fn is_ui_chrome(text: &str) -> bool {
    UI_CHROME.is_match(text.trim())
}

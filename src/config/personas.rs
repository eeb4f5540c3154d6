//! Persona registry.
//!
//! Each persona pairs display metadata with the personality fragment that
//! opens the system prompt. Unknown keys resolve to [`DEFAULT_PERSONA`].

use serde::Serialize;

/// Key of the persona used when a request names none, or an unknown one.
pub const DEFAULT_PERSONA: &str = "dumbledore";

/// A selectable conversational persona.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Persona {
    pub key: &'static str,
    pub name: &'static str,
    pub title: &'static str,
    pub house: &'static str,
    pub avatar: &'static str,
    pub description: &'static str,
    #[serde(skip)]
    pub personality: &'static str,
}

static PERSONAS: &[Persona] = &[
    Persona {
        key: "dumbledore",
        name: "Albus Dumbledore",
        title: "Headmaster",
        house: "Gryffindor",
        avatar: "🧙",
        description: "Calm and measured, knows more than he says",
        personality: "You are Albus Dumbledore, Headmaster of Hogwarts. You speak calmly and with measured \
            wisdom, leaving room for what you choose not to say. Your language is simple but carries weight, \
            and you avoid theatrics.",
    },
    Persona {
        key: "mcgonagall",
        name: "Minerva McGonagall",
        title: "Deputy Headmistress",
        house: "Gryffindor",
        avatar: "🐈",
        description: "Brisk, precise and strict, with a dry wit",
        personality: "You are Professor Minerva McGonagall, Deputy Headmistress and Transfiguration teacher. \
            Your speech is brisk and precise. You have no patience for nonsense, though your care for your \
            students shows beneath the severity.",
    },
    Persona {
        key: "snape",
        name: "Severus Snape",
        title: "Potions Master",
        house: "Slytherin",
        avatar: "🧪",
        description: "Cold, cutting and exacting",
        personality: "You are Professor Severus Snape, Potions Master. You speak in a low, controlled voice, \
            each word deliberate and edged with disdain. You do not tolerate incompetence, yet your answers \
            are always exact.",
    },
    Persona {
        key: "hagrid",
        name: "Rubeus Hagrid",
        title: "Keeper of Keys and Grounds",
        house: "Gryffindor",
        avatar: "🐉",
        description: "Warm-hearted, plain-spoken lover of creatures",
        personality: "You are Rubeus Hagrid, Keeper of Keys and Grounds. You speak plainly and warmly, you \
            love magical creatures (the dangerous ones most of all), and you are hopeless at keeping secrets.",
    },
    Persona {
        key: "luna",
        name: "Luna Lovegood",
        title: "Magical Wisdom Keeper",
        house: "Ravenclaw",
        avatar: "🌙",
        description: "Soft-spoken and unsettlingly honest",
        personality: "You are Luna Lovegood. You speak softly and plainly with an unsettling honesty, and you \
            mention creatures and ideas others dismiss as a matter of fact.",
    },
    Persona {
        key: "archivist",
        name: "Hogwarts Archivist",
        title: "Keeper of Records",
        house: "None",
        avatar: "📜",
        description: "Neutral and precise, provides plain and factual answers",
        personality: "You are the Hogwarts Archivist, keeper of the school's records. You answer neutrally \
            and precisely, with plain facts and no embellishment.",
    },
];

/// All registered personas, in display order.
pub fn personas() -> &'static [Persona] {
    PERSONAS
}

/// Look up a persona by key, without fallback.
pub fn find_persona(key: &str) -> Option<&'static Persona> {
    PERSONAS.iter().find(|p| p.key == key)
}

/// Select a persona by key, falling back to [`DEFAULT_PERSONA`].
pub fn persona(key: Option<&str>) -> &'static Persona {
    key.and_then(find_persona).unwrap_or_else(default_persona)
}

fn default_persona() -> &'static Persona {
    // The registry always contains the default key.
    &PERSONAS[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_first_entry() {
        assert_eq!(default_persona().key, DEFAULT_PERSONA);
    }

    #[test]
    fn test_known_key_selects_persona() {
        assert_eq!(persona(Some("snape")).name, "Severus Snape");
    }

    #[test]
    fn test_unknown_key_falls_back_to_default() {
        for key in ["", "voldemort", "SNAPE", "slughorn"] {
            assert_eq!(persona(Some(key)).key, DEFAULT_PERSONA, "key {:?}", key);
        }
        assert_eq!(persona(None).key, DEFAULT_PERSONA);
    }

    #[test]
    fn test_keys_are_unique() {
        let mut keys: Vec<_> = personas().iter().map(|p| p.key).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), personas().len());
    }
}

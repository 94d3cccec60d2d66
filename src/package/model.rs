//! Deck, note model and notes of the exported package.
//!
//! The deck and model identifiers are fixed so that importing a regenerated
//! package into Anki updates the existing deck rather than creating a copy.

use crate::api::Subject;
use crate::media::sound_reference;

use super::PackageError;
use super::guid::guid_for;

/// Identifier of the exported deck.
pub const DECK_ID: i64 = 1_988_534_729;

/// Display name of the exported deck.
pub const DECK_NAME: &str = "WaniKani Audio Cards";

/// Identifier of the vocabulary note model.
pub const MODEL_ID: i64 = 1_959_455_220;

/// Display name of the vocabulary note model.
pub const MODEL_NAME: &str = "WaniVocab Audio Model";

/// Field names of the vocabulary model, in order.
pub const FIELD_NAMES: [&str; 5] = ["Audio", "Readings", "PartOfSpeech", "Meanings", "MeaningLong"];

/// Namespace mixed into every note GUID.
const GUID_NAMESPACE: &str = "wanikani-vocab";

const QUESTION_FORMAT: &str = r#"<div class="audio">{{Audio}}</div>"#;

const ANSWER_FORMAT: &str = concat!(
    "<h1>{{Readings}}</h1>",
    r#"<div>Meanings:<br><div class="meanings">{{Meanings}}</div></div>"#,
    "<p>Part of Speech: <b>{{PartOfSpeech}}</b></p>",
    "<hr>",
    "<p>{{MeaningLong}}</p>",
);

const CARD_CSS: &str = r"
.card {
    font-size: 13px;
}
.audio {
  text-align: center;
}
.meanings {
    font-size: 16px;
    margin-left: 20px;
}
kanji {
    background-color: pink;
    color: black;
}
vocabulary {
    background-color: purple;
}
";

/// A card template of a note model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub name: String,
    /// Question side.
    pub qfmt: String,
    /// Answer side.
    pub afmt: String,
}

/// A note type: named fields, card templates and styling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteModel {
    pub id: i64,
    pub name: String,
    pub fields: Vec<String>,
    pub templates: Vec<Template>,
    pub css: String,
}

impl NoteModel {
    /// The five-field audio vocabulary model.
    #[must_use]
    pub fn vocabulary() -> Self {
        Self {
            id: MODEL_ID,
            name: MODEL_NAME.to_string(),
            fields: FIELD_NAMES.iter().map(ToString::to_string).collect(),
            templates: vec![Template {
                name: "Card 1".to_string(),
                qfmt: QUESTION_FORMAT.to_string(),
                afmt: ANSWER_FORMAT.to_string(),
            }],
            css: CARD_CSS.to_string(),
        }
    }

    /// Ordinals of the fields a template's question side references.
    ///
    /// Anki only generates a card when at least one of these is non-empty.
    #[must_use]
    pub fn required_fields(&self, template: &Template) -> Vec<usize> {
        self.fields
            .iter()
            .enumerate()
            .filter(|(_, name)| template.qfmt.contains(&format!("{{{{{name}}}}}")))
            .map(|(ordinal, _)| ordinal)
            .collect()
    }
}

/// One flashcard note: a GUID and one value per model field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub guid: String,
    pub fields: Vec<String>,
}

impl Note {
    /// Builds the vocabulary note for `subject`.
    ///
    /// Fields: sound tag, readings, parts of speech, meanings followed by
    /// auxiliary meanings, and the meaning mnemonic.
    #[must_use]
    pub fn from_subject(subject: &Subject) -> Self {
        let readings = subject
            .readings()
            .iter()
            .map(|r| format!("<span>{}</span>", r.reading))
            .collect::<Vec<_>>()
            .join("<br>");

        let parts_of_speech = subject.parts_of_speech().join(", ");

        let meanings = subject
            .all_meanings()
            .map(|m| format!("<span>{}</span>", m.meaning))
            .collect::<Vec<_>>()
            .join("<br>");

        let id = subject.id.to_string();
        Self {
            guid: guid_for(&[GUID_NAMESPACE, &id]),
            fields: vec![
                sound_reference(subject.id),
                readings,
                parts_of_speech,
                meanings,
                subject.meaning_mnemonic().to_string(),
            ],
        }
    }
}

/// A deck holding notes of a single model.
#[derive(Debug, Clone)]
pub struct Deck {
    pub id: i64,
    pub name: String,
    pub model: NoteModel,
    notes: Vec<Note>,
}

impl Deck {
    /// An empty deck of `model` notes.
    #[must_use]
    pub fn new(id: i64, name: impl Into<String>, model: NoteModel) -> Self {
        Self {
            id,
            name: name.into(),
            model,
            notes: Vec::new(),
        }
    }

    /// The fixed WaniKani audio deck with one note per subject.
    ///
    /// Notes follow the iteration order of `subjects`.
    #[must_use]
    pub fn from_subjects<'a>(subjects: impl IntoIterator<Item = &'a Subject>) -> Self {
        let mut deck = Self::new(DECK_ID, DECK_NAME, NoteModel::vocabulary());
        deck.notes = subjects.into_iter().map(Note::from_subject).collect();
        deck
    }

    /// Appends a note after checking it fits the deck's model.
    ///
    /// # Errors
    ///
    /// Returns `PackageError::FieldCount` when the note's field count differs
    /// from the model's.
    pub fn add_note(&mut self, note: Note) -> Result<(), PackageError> {
        if note.fields.len() != self.model.fields.len() {
            return Err(PackageError::FieldCount {
                expected: self.model.fields.len(),
                actual: note.fields.len(),
            });
        }
        self.notes.push(note);
        Ok(())
    }

    #[must_use]
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn subject() -> Subject {
        serde_json::from_value(json!({
            "id": 2467,
            "object": "vocabulary",
            "data": {
                "readings": [{"reading": "いち"}, {"reading": "ひと"}],
                "parts_of_speech": ["numeral", "noun"],
                "meanings": [{"meaning": "One"}],
                "auxiliary_meanings": [{"meaning": "1", "type": "whitelist"}],
                "meaning_mnemonic": "The <kanji>one</kanji> number."
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_note_from_subject_fields() {
        let note = Note::from_subject(&subject());
        assert_eq!(
            note.fields,
            vec![
                "[sound:wbvocab-2467.mp3]",
                "<span>いち</span><br><span>ひと</span>",
                "numeral, noun",
                "<span>One</span><br><span>1</span>",
                "The <kanji>one</kanji> number.",
            ]
        );
    }

    #[test]
    fn test_note_from_kana_subject_has_empty_readings() {
        let kana: Subject = serde_json::from_value(json!({
            "id": 9001,
            "data": {"meanings": [{"meaning": "To Be"}]}
        }))
        .unwrap();

        let note = Note::from_subject(&kana);
        assert_eq!(note.fields[1], "");
        assert_eq!(note.fields[2], "");
        assert_eq!(note.fields[4], "");
    }

    #[test]
    fn test_note_guid_depends_only_on_subject_id() {
        let mut changed = subject();
        changed.data.meaning_mnemonic = Some("Different".to_string());
        assert_eq!(
            Note::from_subject(&subject()).guid,
            Note::from_subject(&changed).guid
        );
    }

    #[test]
    fn test_vocabulary_model_requires_audio_field() {
        let model = NoteModel::vocabulary();
        assert_eq!(model.required_fields(&model.templates[0]), vec![0]);
    }

    #[test]
    fn test_add_note_rejects_wrong_field_count() {
        let mut deck = Deck::new(1, "Test", NoteModel::vocabulary());
        let result = deck.add_note(Note {
            guid: "x".to_string(),
            fields: vec!["only one".to_string()],
        });
        assert!(matches!(
            result,
            Err(PackageError::FieldCount {
                expected: 5,
                actual: 1
            })
        ));
        assert!(deck.notes().is_empty());
    }

    #[test]
    fn test_deck_from_subjects_uses_fixed_ids() {
        let subject = subject();
        let deck = Deck::from_subjects([&subject]);
        assert_eq!(deck.id, DECK_ID);
        assert_eq!(deck.model.id, MODEL_ID);
        assert_eq!(deck.notes().len(), 1);
    }
}

//! Response shapes for the WaniKani v2 endpoints this tool reads.
//!
//! Only the fields the exporter consumes are typed. Everything else is kept
//! in `extra` maps so a subject written back to the cache matches the payload
//! the API returned.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Content type of the pronunciation clips embedded in the deck.
pub const AUDIO_CONTENT_TYPE: &str = "audio/mpeg";

/// Envelope of `GET /user`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserResource {
    pub data: User,
}

/// Account information relevant to choosing which levels to export.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    /// The level the user is currently working on.
    pub level: u32,
    pub subscription: Subscription,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Subscription {
    /// Highest level the subscription unlocks.
    pub max_level_granted: u32,
}

/// One page of `GET /subjects`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubjectPage {
    #[serde(default)]
    pub data: Vec<Subject>,
}

/// A vocabulary or kana-vocabulary subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: u64,
    pub data: SubjectData,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The `data` object of a subject.
///
/// Kana-only vocabulary has no `readings`, so the list fields stay optional to
/// preserve the difference between "absent" and "empty" in the cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubjectData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readings: Option<Vec<Reading>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parts_of_speech: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meanings: Option<Vec<Meaning>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auxiliary_meanings: Option<Vec<Meaning>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meaning_mnemonic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pronunciation_audios: Option<Vec<PronunciationAudio>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub reading: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meaning {
    pub meaning: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A pronunciation clip descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PronunciationAudio {
    pub url: String,
    pub content_type: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Subject {
    /// The first pronunciation clip in MP3 format, if any.
    #[must_use]
    pub fn mp3_audio(&self) -> Option<&PronunciationAudio> {
        self.data
            .pronunciation_audios
            .as_deref()
            .unwrap_or_default()
            .iter()
            .find(|audio| audio.content_type == AUDIO_CONTENT_TYPE)
    }

    /// Readings in API order.
    #[must_use]
    pub fn readings(&self) -> &[Reading] {
        self.data.readings.as_deref().unwrap_or_default()
    }

    /// Parts of speech in API order.
    #[must_use]
    pub fn parts_of_speech(&self) -> &[String] {
        self.data.parts_of_speech.as_deref().unwrap_or_default()
    }

    /// Primary meanings followed by auxiliary meanings.
    pub fn all_meanings(&self) -> impl Iterator<Item = &Meaning> {
        let primary = self.data.meanings.as_deref().unwrap_or_default();
        let auxiliary = self.data.auxiliary_meanings.as_deref().unwrap_or_default();
        primary.iter().chain(auxiliary)
    }

    /// The meaning mnemonic, or an empty string when the API omitted it.
    #[must_use]
    pub fn meaning_mnemonic(&self) -> &str {
        self.data.meaning_mnemonic.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vocabulary_json() -> Value {
        json!({
            "id": 2467,
            "object": "vocabulary",
            "url": "https://api.wanikani.com/v2/subjects/2467",
            "data_updated_at": "2018-12-12T23:09:52.234049Z",
            "data": {
                "level": 1,
                "characters": "一",
                "meanings": [{"meaning": "One", "primary": true, "accepted_answer": true}],
                "auxiliary_meanings": [{"type": "whitelist", "meaning": "1"}],
                "readings": [{"primary": true, "reading": "いち", "accepted_answer": true}],
                "parts_of_speech": ["numeral"],
                "meaning_mnemonic": "As is the case with most vocab...",
                "pronunciation_audios": [
                    {
                        "url": "https://files.wanikani.com/a.ogg",
                        "content_type": "audio/ogg",
                        "metadata": {"gender": "male"}
                    },
                    {
                        "url": "https://files.wanikani.com/b.mp3",
                        "content_type": "audio/mpeg",
                        "metadata": {"gender": "male"}
                    }
                ]
            }
        })
    }

    #[test]
    fn test_subject_roundtrip_preserves_unknown_fields() {
        let raw = vocabulary_json();
        let subject: Subject = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(serde_json::to_value(&subject).unwrap(), raw);
    }

    #[test]
    fn test_mp3_audio_skips_other_content_types() {
        let subject: Subject = serde_json::from_value(vocabulary_json()).unwrap();
        let audio = subject.mp3_audio().unwrap();
        assert_eq!(audio.url, "https://files.wanikani.com/b.mp3");
    }

    #[test]
    fn test_kana_vocabulary_without_readings() {
        let subject: Subject = serde_json::from_value(json!({
            "id": 9001,
            "object": "kana_vocabulary",
            "data": {
                "characters": "ある",
                "meanings": [{"meaning": "To Be"}],
                "parts_of_speech": ["godan verb"],
                "meaning_mnemonic": "This is a kana-only word."
            }
        }))
        .unwrap();

        assert!(subject.readings().is_empty());
        assert!(subject.mp3_audio().is_none());
        assert!(subject.data.readings.is_none());
        let reserialized = serde_json::to_value(&subject).unwrap();
        assert!(reserialized["data"].get("readings").is_none());
    }

    #[test]
    fn test_all_meanings_lists_primary_before_auxiliary() {
        let subject: Subject = serde_json::from_value(vocabulary_json()).unwrap();
        let meanings: Vec<&str> = subject.all_meanings().map(|m| m.meaning.as_str()).collect();
        assert_eq!(meanings, vec!["One", "1"]);
    }

    #[test]
    fn test_user_resource_parses_level_and_subscription() {
        let user: UserResource = serde_json::from_value(json!({
            "object": "user",
            "data": {
                "username": "example",
                "level": 5,
                "subscription": {"active": true, "type": "recurring", "max_level_granted": 60}
            }
        }))
        .unwrap();
        assert_eq!(user.data.level, 5);
        assert_eq!(user.data.subscription.max_level_granted, 60);
    }
}

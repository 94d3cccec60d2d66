//! The `collection.anki2` SQLite database inside a package.
//!
//! Writes a schema-version-11 collection holding one deck, one note model and
//! one card per note per template. Scheduling columns are left at their
//! "new card" defaults.

use std::path::Path;

use serde_json::{Value, json};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::{debug, instrument};

use super::PackageError;
use super::guid::field_checksum;
use super::model::{Deck, NoteModel};

/// Anki collection schema version written by this module.
const SCHEMA_VERSION: i64 = 11;

/// Separator between field values in the `notes.flds` column.
const FIELD_SEPARATOR: &str = "\u{1f}";

const SCHEMA: &str = r"
CREATE TABLE col (
    id              integer primary key,
    crt             integer not null,
    mod             integer not null,
    scm             integer not null,
    ver             integer not null,
    dty             integer not null,
    usn             integer not null,
    ls              integer not null,
    conf            text not null,
    models          text not null,
    decks           text not null,
    dconf           text not null,
    tags            text not null
);
CREATE TABLE notes (
    id              integer primary key,
    guid            text not null,
    mid             integer not null,
    mod             integer not null,
    usn             integer not null,
    tags            text not null,
    flds            text not null,
    sfld            integer not null,
    csum            integer not null,
    flags           integer not null,
    data            text not null
);
CREATE TABLE cards (
    id              integer primary key,
    nid             integer not null,
    did             integer not null,
    ord             integer not null,
    mod             integer not null,
    usn             integer not null,
    type            integer not null,
    queue           integer not null,
    due             integer not null,
    ivl             integer not null,
    factor          integer not null,
    reps            integer not null,
    lapses          integer not null,
    left            integer not null,
    odue            integer not null,
    odid            integer not null,
    flags           integer not null,
    data            text not null
);
CREATE TABLE revlog (
    id              integer primary key,
    cid             integer not null,
    usn             integer not null,
    ease            integer not null,
    ivl             integer not null,
    lastIvl         integer not null,
    factor          integer not null,
    time            integer not null,
    type            integer not null
);
CREATE TABLE graves (
    usn             integer not null,
    oid             integer not null,
    type            integer not null
);
CREATE INDEX ix_notes_usn on notes (usn);
CREATE INDEX ix_cards_usn on cards (usn);
CREATE INDEX ix_revlog_usn on revlog (usn);
CREATE INDEX ix_cards_nid on cards (nid);
CREATE INDEX ix_cards_sched on cards (did, queue, due);
CREATE INDEX ix_revlog_cid on revlog (cid);
CREATE INDEX ix_notes_csum on notes (csum);
";

/// Timestamps stamped onto collection rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    /// Milliseconds since the Unix epoch; also the base for row ids.
    pub millis: i64,
}

impl Timestamp {
    /// The current system time.
    #[must_use]
    pub fn now() -> Self {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self {
            millis: i64::try_from(millis).unwrap_or(i64::MAX),
        }
    }

    #[must_use]
    pub fn secs(self) -> i64 {
        self.millis / 1000
    }
}

/// Creates `path` and fills it with `deck`.
///
/// Note and card ids count up from `created.millis`, so they are unique
/// within the collection and sort in deck order.
///
/// # Errors
///
/// Returns `PackageError::Database` on any SQLite failure and
/// `PackageError::Serialize` if the collection metadata cannot be encoded.
#[instrument(skip(deck), fields(path = %path.display(), notes = deck.notes().len()))]
pub async fn write_collection(
    path: &Path,
    deck: &Deck,
    created: Timestamp,
) -> Result<(), PackageError> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Delete);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    let mut tx = pool.begin().await?;

    sqlx::raw_sql(SCHEMA).execute(&mut *tx).await?;

    let models = json!({ deck.model.id.to_string(): model_json(&deck.model, deck.id, created) });
    let decks = json!({
        "1": deck_json(1, "Default", created),
        deck.id.to_string(): deck_json(deck.id, &deck.name, created),
    });

    sqlx::query(
        "INSERT INTO col (id, crt, mod, scm, ver, dty, usn, ls, conf, models, decks, dconf, tags) \
         VALUES (1, ?, ?, ?, ?, 0, 0, 0, ?, ?, ?, ?, '{}')",
    )
    .bind(created.secs())
    .bind(created.millis)
    .bind(created.millis)
    .bind(SCHEMA_VERSION)
    .bind(serde_json::to_string(&collection_config(deck.id, deck.model.id))?)
    .bind(serde_json::to_string(&models)?)
    .bind(serde_json::to_string(&decks)?)
    .bind(serde_json::to_string(&deck_options())?)
    .execute(&mut *tx)
    .await?;

    let template_count = deck.model.templates.len();
    let mut next_card_id = created.millis;

    for (position, note) in (0_i64..).zip(deck.notes()) {
        let note_id = created.millis + position;
        let sort_field = note.fields.first().map_or("", String::as_str);

        sqlx::query(
            "INSERT INTO notes (id, guid, mid, mod, usn, tags, flds, sfld, csum, flags, data) \
             VALUES (?, ?, ?, ?, -1, '', ?, ?, ?, 0, '')",
        )
        .bind(note_id)
        .bind(&note.guid)
        .bind(deck.model.id)
        .bind(created.secs())
        .bind(note.fields.join(FIELD_SEPARATOR))
        .bind(sort_field)
        .bind(field_checksum(sort_field))
        .execute(&mut *tx)
        .await?;

        for ordinal in (0_i64..).take(template_count) {
            sqlx::query(
                "INSERT INTO cards (id, nid, did, ord, mod, usn, type, queue, due, ivl, factor, \
                 reps, lapses, left, odue, odid, flags, data) \
                 VALUES (?, ?, ?, ?, ?, -1, 0, 0, ?, 0, 0, 0, 0, 0, 0, 0, 0, '')",
            )
            .bind(next_card_id)
            .bind(note_id)
            .bind(deck.id)
            .bind(ordinal)
            .bind(created.secs())
            .bind(position)
            .execute(&mut *tx)
            .await?;
            next_card_id += 1;
        }
    }

    tx.commit().await?;
    pool.close().await;

    debug!("collection written");
    Ok(())
}

fn model_json(model: &NoteModel, deck_id: i64, created: Timestamp) -> Value {
    let fields: Vec<Value> = model
        .fields
        .iter()
        .enumerate()
        .map(|(ordinal, name)| {
            json!({
                "name": name,
                "ord": ordinal,
                "font": "Liberation Sans",
                "media": [],
                "rtl": false,
                "size": 20,
                "sticky": false,
            })
        })
        .collect();

    let templates: Vec<Value> = model
        .templates
        .iter()
        .enumerate()
        .map(|(ordinal, template)| {
            json!({
                "name": template.name,
                "ord": ordinal,
                "qfmt": template.qfmt,
                "afmt": template.afmt,
                "bqfmt": "",
                "bafmt": "",
                "did": null,
            })
        })
        .collect();

    let requirements: Vec<Value> = model
        .templates
        .iter()
        .enumerate()
        .map(|(ordinal, template)| {
            let required = model.required_fields(template);
            let mode = if required.len() == 1 { "all" } else { "any" };
            json!([ordinal, mode, required])
        })
        .collect();

    json!({
        "id": model.id.to_string(),
        "name": model.name,
        "type": 0,
        "mod": created.secs(),
        "usn": -1,
        "sortf": 0,
        "did": deck_id,
        "tmpls": templates,
        "flds": fields,
        "css": model.css,
        "latexPre": "\\documentclass[12pt]{article}\n\\special{papersize=3in,5in}\n\\usepackage[utf8]{inputenc}\n\\usepackage{amssymb,amsmath}\n\\pagestyle{empty}\n\\setlength{\\parindent}{0in}\n\\begin{document}\n",
        "latexPost": "\\end{document}",
        "latexsvg": false,
        "req": requirements,
        "tags": [],
        "vers": [],
    })
}

fn deck_json(id: i64, name: &str, created: Timestamp) -> Value {
    json!({
        "id": id,
        "name": name,
        "desc": "",
        "mod": created.secs(),
        "usn": -1,
        "collapsed": false,
        "conf": 1,
        "dyn": 0,
        "extendNew": 10,
        "extendRev": 50,
        "newToday": [0, 0],
        "revToday": [0, 0],
        "lrnToday": [0, 0],
        "timeToday": [0, 0],
    })
}

fn collection_config(deck_id: i64, model_id: i64) -> Value {
    json!({
        "activeDecks": [1],
        "curDeck": deck_id,
        "curModel": model_id.to_string(),
        "newSpread": 0,
        "collapseTime": 1200,
        "timeLim": 0,
        "estTimes": true,
        "dueCounts": true,
        "nextPos": 1,
        "sortType": "noteFld",
        "sortBackwards": false,
        "addToCur": true,
    })
}

fn deck_options() -> Value {
    json!({
        "1": {
            "id": 1,
            "name": "Default",
            "mod": 0,
            "usn": 0,
            "maxTaken": 60,
            "autoplay": true,
            "timer": 0,
            "replayq": true,
            "dyn": false,
            "new": {
                "bury": true,
                "delays": [1, 10],
                "initialFactor": 2500,
                "ints": [1, 4, 7],
                "order": 1,
                "perDay": 20,
                "separate": true,
            },
            "lapse": {
                "delays": [10],
                "leechAction": 0,
                "leechFails": 8,
                "minInt": 1,
                "mult": 0,
            },
            "rev": {
                "bury": true,
                "ease4": 1.3,
                "fuzz": 0.05,
                "ivlFct": 1,
                "maxIvl": 36500,
                "minSpace": 1,
                "perDay": 100,
            },
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use sqlx::Row;
    use tempfile::TempDir;

    use super::*;
    use crate::package::model::Note;

    fn deck_with(notes: usize) -> Deck {
        let mut deck = Deck::new(10, "Test Deck", NoteModel::vocabulary());
        for i in 0..notes {
            deck.add_note(Note {
                guid: format!("guid-{i}"),
                fields: vec![
                    format!("[sound:wbvocab-{i}.mp3]"),
                    "<span>よみ</span>".to_string(),
                    "noun".to_string(),
                    "<span>Meaning</span>".to_string(),
                    "mnemonic".to_string(),
                ],
            })
            .unwrap();
        }
        deck
    }

    async fn open(path: &Path) -> sqlx::SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(SqliteConnectOptions::new().filename(path))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_write_collection_one_note_and_card_per_entry() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("collection.anki2");
        write_collection(&path, &deck_with(3), Timestamp { millis: 1_700_000_000_000 })
            .await
            .unwrap();

        let pool = open(&path).await;
        let notes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notes")
            .fetch_one(&pool)
            .await
            .unwrap();
        let cards: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cards WHERE did = 10")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(notes, 3);
        assert_eq!(cards, 3);
    }

    #[tokio::test]
    async fn test_write_collection_stores_fields_with_unit_separator() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("collection.anki2");
        write_collection(&path, &deck_with(1), Timestamp { millis: 1_700_000_000_000 })
            .await
            .unwrap();

        let pool = open(&path).await;
        let row = sqlx::query("SELECT guid, mid, flds FROM notes")
            .fetch_one(&pool)
            .await
            .unwrap();
        let flds: String = row.get("flds");
        let fields: Vec<&str> = flds.split('\u{1f}').collect();

        assert_eq!(row.get::<String, _>("guid"), "guid-0");
        assert_eq!(row.get::<i64, _>("mid"), deck_with(0).model.id);
        assert_eq!(fields.len(), 5);
        assert_eq!(fields[0], "[sound:wbvocab-0.mp3]");
    }

    #[tokio::test]
    async fn test_write_collection_registers_model_and_deck() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("collection.anki2");
        write_collection(&path, &deck_with(0), Timestamp { millis: 1_700_000_000_000 })
            .await
            .unwrap();

        let pool = open(&path).await;
        let row = sqlx::query("SELECT ver, models, decks FROM col")
            .fetch_one(&pool)
            .await
            .unwrap();
        let models: Value = serde_json::from_str(&row.get::<String, _>("models")).unwrap();
        let decks: Value = serde_json::from_str(&row.get::<String, _>("decks")).unwrap();

        assert_eq!(row.get::<i64, _>("ver"), SCHEMA_VERSION);
        let model = &models[NoteModel::vocabulary().id.to_string()];
        assert_eq!(model["flds"].as_array().unwrap().len(), 5);
        assert_eq!(model["req"], json!([[0, "all", [0]]]));
        assert_eq!(decks["10"]["name"], "Test Deck");
        assert_eq!(decks["1"]["name"], "Default");
    }
}

use crate::api::models::{ContactEntry, ConversationId, Export};
use crate::error::Result;
use directories::ProjectDirs;
use rusqlite::{Connection, OptionalExtension, params};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn db_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("com", "example", "BotChat")?;
    let dir = proj.data_dir().to_path_buf();
    Some(dir.join("cache.sqlite"))
}

fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Caches the contact list so the sidebar can be drawn before the dashboard
/// has been fetched.
pub struct ContactCache {
    conn: Connection,
}

impl ContactCache {
    pub fn open_default() -> Result<Self> {
        let path = db_path().ok_or_else(|| rusqlite::Error::InvalidPath("no data dir".into()))?;
        Self::open(&path)
    }

    pub fn open(path: &Path) -> Result<Self> {
        ensure_dir(path)?;
        Self::init(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            CREATE TABLE IF NOT EXISTS contacts (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                preview TEXT,
                preview_from_user INTEGER NOT NULL DEFAULT 0,
                time TEXT NOT NULL DEFAULT '',
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(Self { conn })
    }

    /// Makes the cache hold exactly `contacts`, in display order: the first
    /// entry gets the newest `updated_at`, so [`ContactCache::load`] returns
    /// the same order. Rows missing from `contacts` are deleted.
    pub fn replace_all(&mut self, contacts: &[ContactEntry]) -> Result<()> {
        let now = now_secs();
        let tx = self.conn.transaction()?;
        let stored: Vec<ConversationId> = {
            let mut stmt = tx.prepare("SELECT id FROM contacts")?;
            let rows = stmt.query_map([], |row| row.get::<_, ConversationId>(0))?;
            rows.collect::<rusqlite::Result<_>>()?
        };
        for id in stored {
            if !contacts.iter().any(|c| c.id == id) {
                tx.execute("DELETE FROM contacts WHERE id = ?1", params![id])?;
            }
        }
        for (idx, c) in contacts.iter().enumerate() {
            tx.execute(
                r#"
                INSERT INTO contacts (id, name, description, preview, preview_from_user, time, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(id) DO UPDATE SET
                    name=excluded.name,
                    description=excluded.description,
                    preview=excluded.preview,
                    preview_from_user=excluded.preview_from_user,
                    time=excluded.time,
                    updated_at=excluded.updated_at
                "#,
                params![
                    c.id,
                    c.name,
                    c.description,
                    c.preview,
                    c.preview_from_user,
                    c.time,
                    now - idx as i64
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn load(&self, limit: Option<usize>) -> Result<Vec<ContactEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, preview, preview_from_user, time
             FROM contacts ORDER BY updated_at DESC, name ASC LIMIT ?1",
        )?;
        let lim = limit.unwrap_or(500) as i64;
        let rows = stmt.query_map(params![lim], |row| {
            Ok(ContactEntry {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
                preview: row.get(3)?,
                preview_from_user: row.get(4)?,
                time: row.get(5)?,
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn touch(&self, id: ConversationId) -> Result<()> {
        let newest: Option<i64> = self
            .conn
            .query_row("SELECT MAX(updated_at) FROM contacts", [], |row| {
                row.get::<_, Option<i64>>(0)
            })
            .optional()?
            .flatten();
        let stamp = newest.map_or(now_secs(), |n| n.max(now_secs()) + 1);
        self.conn.execute(
            "UPDATE contacts SET updated_at = ?1 WHERE id = ?2",
            params![stamp, id],
        )?;
        Ok(())
    }
}

/// Keeps only characters that are safe in a file name on every platform.
fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if cleaned.is_empty() {
        "conversation.csv".to_string()
    } else {
        cleaned.to_string()
    }
}

pub fn write_export(dir: &Path, export: &Export) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(sanitize_filename(&export.filename));
    fs::write(&path, &export.bytes)?;
    Ok(path)
}

pub fn default_export_dir() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| dirs.download_dir().map(Path::to_path_buf))
        .unwrap_or_else(std::env::temp_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: ConversationId, name: &str) -> ContactEntry {
        ContactEntry {
            id,
            name: name.into(),
            description: String::new(),
            preview: None,
            preview_from_user: false,
            time: String::new(),
        }
    }

    #[test]
    fn keeps_display_order_and_updates_in_place() {
        let mut cache = ContactCache::in_memory().unwrap();
        let mut list = vec![entry(3, "Eliza"), entry(1, "Jabberwacky"), entry(2, "Alice")];
        cache.replace_all(&list).unwrap();
        let ids: Vec<_> = cache.load(None).unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);

        list[1].preview = Some("hi".into());
        list[1].preview_from_user = true;
        cache.replace_all(&list).unwrap();
        let loaded = cache.load(None).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.iter().find(|c| c.id == 1), Some(&list[1]));
    }

    #[test]
    fn contacts_gone_from_the_dashboard_are_dropped() {
        let mut cache = ContactCache::in_memory().unwrap();
        cache
            .replace_all(&[entry(1, "Eliza"), entry(2, "Jabberwacky"), entry(3, "Alice")])
            .unwrap();
        cache.replace_all(&[entry(2, "Jabberwacky")]).unwrap();
        let ids: Vec<_> = cache.load(None).unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2]);

        cache.replace_all(&[]).unwrap();
        assert!(cache.load(None).unwrap().is_empty());
    }

    #[test]
    fn touch_moves_contact_first() {
        let mut cache = ContactCache::in_memory().unwrap();
        cache.replace_all(&[entry(1, "a"), entry(2, "b")]).unwrap();
        cache.touch(2).unwrap();
        let ids: Vec<_> = cache.load(Some(10)).unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.sqlite");
        {
            let mut cache = ContactCache::open(&path).unwrap();
            cache.replace_all(&[entry(4, "Eliza")]).unwrap();
        }
        let cache = ContactCache::open(&path).unwrap();
        assert_eq!(cache.load(None).unwrap()[0].name, "Eliza");
    }

    #[test]
    fn export_names_are_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let export = Export {
            filename: "../chatbot_A/B_1.csv".into(),
            bytes: b"x".to_vec(),
        };
        let path = write_export(dir.path(), &export).unwrap();
        assert_eq!(path.parent().unwrap(), dir.path());
        assert_eq!(path.file_name().unwrap(), "_chatbot_A_B_1.csv");
    }
}

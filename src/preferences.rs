//! UI preferences behind a key-value storage adapter.

use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::logging::{log, obj, v_str, Domain, Level};

pub const COLLAPSED_KEY: &str = "sidebar-collapsed";
pub const EXPANDED_MENUS_KEY: &str = "sidebar-expanded-menus";

pub trait PreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.values.remove(key);
        Ok(())
    }
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new(path: &str) -> Result<Self> {
        let store = Self {
            conn: Connection::open(path)?,
        };
        store.init()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS preferences (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }
}

impl PreferenceStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM preferences WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO preferences (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM preferences WHERE key = ?1", params![key])?;
        Ok(())
    }
}

/// Sidebar chrome state. Stored values that cannot be read fall back to
/// the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SidebarPrefs {
    pub collapsed: bool,
    pub expanded_menus: BTreeSet<String>,
}

impl SidebarPrefs {
    pub fn load(store: &dyn PreferenceStore) -> Self {
        let collapsed = read_or_warn(store, COLLAPSED_KEY)
            .map(|v| v == "true")
            .unwrap_or(false);
        let expanded_menus = read_or_warn(store, EXPANDED_MENUS_KEY)
            .and_then(|raw| match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(menus) => Some(menus.into_iter().collect()),
                Err(err) => {
                    warn_prefs(EXPANDED_MENUS_KEY, &err.to_string());
                    None
                }
            })
            .unwrap_or_default();
        Self {
            collapsed,
            expanded_menus,
        }
    }

    pub fn save(&self, store: &mut dyn PreferenceStore) -> Result<()> {
        store.set(COLLAPSED_KEY, if self.collapsed { "true" } else { "false" })?;
        let menus: Vec<&String> = self.expanded_menus.iter().collect();
        store.set(EXPANDED_MENUS_KEY, &serde_json::to_string(&menus)?)?;
        Ok(())
    }

    pub fn clear(store: &mut dyn PreferenceStore) -> Result<()> {
        store.remove(COLLAPSED_KEY)?;
        store.remove(EXPANDED_MENUS_KEY)
    }

    pub fn toggle_collapsed(&mut self) -> bool {
        self.collapsed = !self.collapsed;
        self.collapsed
    }

    /// Returns whether the menu is expanded after the toggle.
    pub fn toggle_menu(&mut self, menu_id: &str) -> bool {
        if self.expanded_menus.remove(menu_id) {
            false
        } else {
            self.expanded_menus.insert(menu_id.to_string());
            true
        }
    }

    pub fn is_expanded(&self, menu_id: &str) -> bool {
        self.expanded_menus.contains(menu_id)
    }
}

fn warn_prefs(key: &str, reason: &str) {
    log(
        Level::Warn,
        Domain::Prefs,
        "pref_unreadable",
        obj(&[("key", v_str(key)), ("reason", v_str(reason))]),
    );
}

fn read_or_warn(store: &dyn PreferenceStore, key: &str) -> Option<String> {
    store.get(key).unwrap_or_else(|err| {
        warn_prefs(key, &err.to_string());
        None
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_when_empty() {
        let store = MemoryStore::default();
        assert_eq!(SidebarPrefs::load(&store), SidebarPrefs::default());
    }

    #[test]
    fn test_round_trip_memory() {
        let mut store = MemoryStore::default();
        let mut prefs = SidebarPrefs::default();
        prefs.toggle_collapsed();
        assert!(prefs.toggle_menu("avaliacoes"));
        prefs.save(&mut store).unwrap();
        assert_eq!(store.get(COLLAPSED_KEY).unwrap().as_deref(), Some("true"));
        assert_eq!(
            store.get(EXPANDED_MENUS_KEY).unwrap().as_deref(),
            Some("[\"avaliacoes\"]")
        );
        assert_eq!(SidebarPrefs::load(&store), prefs);
    }

    #[test]
    fn test_corrupt_menu_list_falls_back() {
        let mut store = MemoryStore::default();
        store.set(EXPANDED_MENUS_KEY, "{not json").unwrap();
        store.set(COLLAPSED_KEY, "true").unwrap();
        let prefs = SidebarPrefs::load(&store);
        assert!(prefs.collapsed);
        assert!(prefs.expanded_menus.is_empty());
    }

    #[test]
    fn test_toggle_menu_twice() {
        let mut prefs = SidebarPrefs::default();
        assert!(prefs.toggle_menu("real"));
        assert!(prefs.is_expanded("real"));
        assert!(!prefs.toggle_menu("real"));
        assert!(!prefs.is_expanded("real"));
    }

    #[test]
    fn test_sqlite_store_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefs.sqlite");
        let path = path.to_str().unwrap();
        {
            let mut store = SqliteStore::new(path).unwrap();
            store.set("k", "v1").unwrap();
            store.set("k", "v2").unwrap();
        }
        let mut store = SqliteStore::new(path).unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v2"));
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn test_clear() {
        let mut store = SqliteStore::in_memory().unwrap();
        let mut prefs = SidebarPrefs::default();
        prefs.toggle_collapsed();
        prefs.save(&mut store).unwrap();
        SidebarPrefs::clear(&mut store).unwrap();
        assert_eq!(SidebarPrefs::load(&store), SidebarPrefs::default());
    }
}

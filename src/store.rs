use std::collections::HashMap;
use std::fs;
use std::io::{Error, ErrorKind};
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, info};

use crate::error::{Result, SkvError};
use crate::value::Value;

/// A mutable mapping of text keys to [`Value`]s, backed by a directory
/// where each key is materialized as one file holding the JSON text of
/// its value.
///
/// The mapping remembers insertion order: [`Store::select`] yields results
/// in the order keys were first inserted, and re-inserting an existing key
/// keeps its original position. A `Store` is owned by exactly one
/// [`Dispatcher`](crate::Dispatcher), which serializes all access.
///
/// Keys double as file names under the store directory, so the caller
/// must not insert the empty key; the dispatcher rejects it before it
/// gets here.
#[derive(Debug)]
pub struct Store {
    // directory holding one file per key
    dir: PathBuf,

    // the mapping itself
    items: HashMap<String, Value>,

    // keys in first-insertion order; always consistent with `items`
    order: Vec<String>,
}

impl Store {
    /// Opens the store rooted at `dir`, loading every existing file into
    /// the mapping, or creating the directory if it does not exist yet.
    pub fn open(dir: &Path) -> Result<Store> {
        let mut store = Store {
            dir: dir.to_path_buf(),
            items: HashMap::new(),
            order: Vec::new(),
        };
        if dir.exists() {
            store.load()?;
        } else {
            fs::create_dir_all(dir)?;
        }
        Ok(store)
    }

    /// reads every file under the store directory into the mapping
    fn load(&mut self) -> Result<()> {
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let key = name.to_str().ok_or_else(|| {
                Error::new(
                    ErrorKind::InvalidData,
                    format!("store file name is not valid UTF-8: {:?}", name),
                )
            })?;
            let contents = fs::read_to_string(entry.path())?;
            let value: Value = serde_json::from_str(&contents)?;
            self.insert(key.to_owned(), value);
        }
        info!("loaded {} keys from {:?}", self.items.len(), self.dir);
        Ok(())
    }

    /// Stores `value` under `key`, overwriting unconditionally.
    ///
    /// Returns the previously stored value, or `None` if the key was absent.
    pub fn insert(&mut self, key: String, value: Value) -> Option<Value> {
        let previous = self.items.insert(key.clone(), value);
        if previous.is_none() {
            self.order.push(key);
        }
        previous
    }

    /// returns the value stored under `key`, if any
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.items.get(key)
    }

    /// Removes `key` from the mapping.
    ///
    /// Returns the previously stored value, or `None` if the key was absent.
    pub fn delete(&mut self, key: &str) -> Option<Value> {
        let previous = self.items.remove(key);
        if previous.is_some() {
            self.order.retain(|k| k != key);
        }
        previous
    }

    /// Returns every `(key, value)` pair whose key starts with a match for
    /// `pattern`, in insertion order.
    ///
    /// The pattern is a regular expression anchored at the start of the
    /// key: a key matches if it begins with a match, the whole key does
    /// not have to match.
    ///
    /// # Errors
    /// Fails with [`SkvError::Protocol`] if `pattern` is not a valid
    /// regular expression.
    pub fn select(&self, pattern: &str) -> Result<Vec<(String, Value)>> {
        let anchored = Regex::new(&format!("^(?:{})", pattern))
            .map_err(|e| SkvError::Protocol(format!("invalid select pattern: {}", e)))?;
        Ok(self
            .order
            .iter()
            .filter(|key| anchored.is_match(key))
            .filter_map(|key| self.items.get(key).map(|v| (key.clone(), v.clone())))
            .collect())
    }

    /// Writes every current `(key, value)` pair to its own file under the
    /// store directory and prunes files whose key has been deleted, so the
    /// directory is a complete snapshot of the mapping afterwards.
    pub fn save(&self) -> Result<()> {
        for key in &self.order {
            if let Some(value) = self.items.get(key) {
                fs::write(self.dir.join(key), serde_json::to_string(value)?)?;
            }
        }
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let stale = match name.to_str() {
                Some(key) => !self.items.contains_key(key),
                None => true,
            };
            if stale {
                debug!("pruning stale store file {:?}", entry.path());
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }

    /// the number of keys currently held
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// true if the store holds no keys
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::open(dir.path()).expect("open store");
        (dir, store)
    }

    #[test]
    fn insert_returns_previous_value() {
        let (_dir, mut store) = open_temp();
        assert_eq!(store.insert("a".into(), Value::Integer(1)), None);
        assert_eq!(
            store.insert("a".into(), Value::Integer(2)),
            Some(Value::Integer(1))
        );
        assert_eq!(store.get("a"), Some(&Value::Integer(2)));
    }

    #[test]
    fn select_is_an_anchored_prefix_match_in_insertion_order() {
        let (_dir, mut store) = open_temp();
        store.insert("a1".into(), Value::Integer(1));
        store.insert("a2".into(), Value::Integer(2));
        store.insert("b1".into(), Value::Integer(3));
        let rows = store.select("a.*").unwrap();
        assert_eq!(
            rows,
            vec![
                ("a1".to_owned(), Value::Integer(1)),
                ("a2".to_owned(), Value::Integer(2)),
            ]
        );
        // prefix match: "a" alone still matches a1 and a2
        assert_eq!(store.select("a").unwrap().len(), 2);
        // but the match must start at the beginning of the key
        assert_eq!(store.select("1").unwrap().len(), 0);
    }

    #[test]
    fn invalid_select_pattern_is_an_error() {
        let (_dir, store) = open_temp();
        assert!(store.select("(").is_err());
    }

    #[test]
    fn reinserting_a_key_keeps_its_position() {
        let (_dir, mut store) = open_temp();
        store.insert("x".into(), Value::Integer(1));
        store.insert("y".into(), Value::Integer(2));
        store.insert("x".into(), Value::Integer(3));
        let rows = store.select(".*").unwrap();
        let keys: Vec<&str> = rows.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["x", "y"]);
    }

    #[test]
    fn save_then_reopen_recovers_every_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let mut store = Store::open(dir.path()).expect("open");
            store.insert(
                "k".into(),
                Value::Object(vec![("n".to_owned(), Value::Integer(-1))]),
            );
            store.insert("plain".into(), Value::Text("v".into()));
            store.save().expect("save");
        }
        let store = Store::open(dir.path()).expect("reopen");
        assert_eq!(store.len(), 2);
        assert_eq!(
            store.get("k"),
            Some(&Value::Object(vec![("n".to_owned(), Value::Integer(-1))]))
        );
        assert_eq!(store.get("plain"), Some(&Value::Text("v".into())));
    }

    #[test]
    fn save_prunes_files_of_deleted_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = Store::open(dir.path()).expect("open");
        store.insert("gone".into(), Value::Integer(9));
        store.save().expect("save");
        assert!(dir.path().join("gone").exists());

        assert_eq!(store.delete("gone"), Some(Value::Integer(9)));
        store.save().expect("save after delete");
        assert!(!dir.path().join("gone").exists());
        assert!(store.is_empty());
    }
}

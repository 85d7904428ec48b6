use std::path::PathBuf;

use rusqlite::OptionalExtension;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::consts::DEFAULT_DARK_VALIDITY;
use crate::error::Result;

use super::Store;

pub const FOLDERS_KEY: &str = "folders";
pub const DARK_VALIDITY_KEY: &str = "dark_validity";

impl Store {
    /// JSON-decoded user setting, if present.
    pub fn setting<T: DeserializeOwned>(&self, item: &str) -> Result<Option<T>> {
        let item = item.to_string();
        let raw: Option<String> = self.call(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT value FROM user_settings WHERE item = ?1",
                    [item],
                    |row| row.get(0),
                )
                .optional()?)
        })?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn set_setting<T: Serialize>(&self, item: &str, value: &T) -> Result<()> {
        let item = item.to_string();
        let json = serde_json::to_string(value)?;
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO user_settings (item, value) VALUES (?1, ?2)
                 ON CONFLICT(item) DO UPDATE SET value = excluded.value",
                [item, json],
            )?;
            Ok(())
        })
    }

    pub fn selected_folders(&self) -> Result<Vec<PathBuf>> {
        Ok(self.setting(FOLDERS_KEY)?.unwrap_or_default())
    }

    pub fn set_selected_folders(&self, folders: &[PathBuf]) -> Result<()> {
        self.set_setting(FOLDERS_KEY, &folders)
    }

    /// Stored dark/bias validity window, e.g. "3 months".
    pub fn dark_validity(&self) -> Result<String> {
        Ok(self
            .setting(DARK_VALIDITY_KEY)?
            .unwrap_or_else(|| DEFAULT_DARK_VALIDITY.to_string()))
    }
}

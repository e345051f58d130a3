use crate::backend::ConnectedSite;
use anyhow::anyhow;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

const SHOW_SAFE_NOTICE: &str = "show_safe_notice";

#[derive(Clone)]
pub struct Db {
    connection: Arc<Mutex<Connection>>,
}

impl Db {
    pub fn new(db_path: &str) -> anyhow::Result<Self> {
        let connection = Connection::open(db_path)?;
        Ok(Db {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    fn connection(&self) -> anyhow::Result<MutexGuard<Connection>> {
        self.connection
            .lock()
            .map_err(|_| anyhow!("Database lock poisoned"))
    }

    pub fn create(&self) -> anyhow::Result<()> {
        let connection = self.connection()?;
        connection.execute(
            "CREATE TABLE IF NOT EXISTS settings (
                name TEXT PRIMARY KEY,
                value TEXT NOT NULL)",
            [],
        )?;

        connection.execute(
            "CREATE TABLE IF NOT EXISTS connected_sites (
                tab_id INTEGER PRIMARY KEY,
                origin TEXT NOT NULL,
                is_connected BOOL NOT NULL)",
            [],
        )?;
        Ok(())
    }

    pub fn get_show_safe_notice(&self) -> anyhow::Result<bool> {
        let connection = self.connection()?;
        let value: Option<String> = connection
            .query_row(
                "SELECT value FROM settings WHERE name = ?1",
                params![SHOW_SAFE_NOTICE],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.map(|v| v == "true").unwrap_or(true))
    }

    pub fn set_show_safe_notice(&self, show: bool) -> anyhow::Result<()> {
        let connection = self.connection()?;
        connection.execute(
            "INSERT INTO settings(name, value) VALUES (?1, ?2)
             ON CONFLICT (name) DO UPDATE SET value = excluded.value",
            params![SHOW_SAFE_NOTICE, show.to_string()],
        )?;
        Ok(())
    }

    pub fn get_connected_site(&self, tab_id: u32) -> anyhow::Result<Option<ConnectedSite>> {
        let connection = self.connection()?;
        let site = connection
            .query_row(
                "SELECT origin, is_connected FROM connected_sites WHERE tab_id = ?1",
                params![tab_id],
                |row| {
                    Ok(ConnectedSite {
                        origin: row.get(0)?,
                        is_connected: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(site)
    }

    pub fn store_connected_site(&self, tab_id: u32, site: &ConnectedSite) -> anyhow::Result<()> {
        let connection = self.connection()?;
        connection.execute(
            "INSERT INTO connected_sites(tab_id, origin, is_connected) VALUES (?1, ?2, ?3)
             ON CONFLICT (tab_id) DO UPDATE SET origin = excluded.origin, is_connected = excluded.is_connected",
            params![tab_id, site.origin, site.is_connected],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> Db {
        let db = Db::new(":memory:").unwrap();
        db.create().unwrap();
        db
    }

    #[test]
    fn test_safe_notice_defaults_to_shown() {
        let db = open();
        assert!(db.get_show_safe_notice().unwrap());
        db.set_show_safe_notice(false).unwrap();
        assert!(!db.get_show_safe_notice().unwrap());
        db.set_show_safe_notice(true).unwrap();
        assert!(db.get_show_safe_notice().unwrap());
    }

    #[test]
    fn test_connected_sites() {
        let db = open();
        assert_eq!(db.get_connected_site(7).unwrap(), None);
        let site = ConnectedSite {
            origin: "https://app.example".to_string(),
            is_connected: true,
        };
        db.store_connected_site(7, &site).unwrap();
        assert_eq!(db.get_connected_site(7).unwrap(), Some(site));

        let site = ConnectedSite {
            origin: "https://app.example".to_string(),
            is_connected: false,
        };
        db.store_connected_site(7, &site).unwrap();
        assert_eq!(db.get_connected_site(7).unwrap(), Some(site));
        assert_eq!(db.get_connected_site(8).unwrap(), None);
    }

    #[test]
    fn test_create_is_idempotent() {
        let db = open();
        db.set_show_safe_notice(false).unwrap();
        db.create().unwrap();
        assert!(!db.get_show_safe_notice().unwrap());
    }
}

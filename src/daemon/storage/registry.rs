use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use crate::error::{TrackerError, TrackerResult};

use super::{
    database::Database,
    entities::{AppId, ApplicationEntity, UNKNOWN_LOCATION},
};

/// Result of [AppRepository::set_icon].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconChange {
    /// The application didn't exist and was created together with the icon.
    Created(AppId),
    Updated,
    Unchanged,
}

pub struct AppRepository<'a> {
    conn: &'a Connection,
}

impl<'a> AppRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Returns the id registered for `name`, creating the application when it is seen for the
    /// first time. Names are compared exactly.
    pub fn resolve_or_create(&self, name: &str, path: &str) -> TrackerResult<AppId> {
        let inserted = self.conn.execute(
            "INSERT INTO apps (app_name, file_location) VALUES (?1, ?2)
             ON CONFLICT(app_name) DO NOTHING",
            params![name, path],
        )?;
        if inserted > 0 {
            debug!("Registered application {name} at {path}");
        }

        Ok(self.conn.query_row(
            "SELECT id FROM apps WHERE app_name = ?1",
            params![name],
            |row| row.get(0),
        )?)
    }

    pub fn find(&self, name: &str) -> TrackerResult<Option<ApplicationEntity>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, app_name, file_location, icon_location FROM apps WHERE app_name = ?1",
                params![name],
                application_from_row,
            )
            .optional()?)
    }

    pub fn all(&self) -> TrackerResult<Vec<ApplicationEntity>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, app_name, file_location, icon_location FROM apps ORDER BY id")?;
        let apps = stmt
            .query_map([], application_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(apps)
    }

    /// Attaches an icon to `name`. Unknown applications are created on the spot with
    /// `fallback_path` as their location. Existing applications only take icons that point at an
    /// existing file.
    pub fn set_icon(
        &self,
        name: &str,
        icon_path: &str,
        fallback_path: Option<&str>,
    ) -> TrackerResult<IconChange> {
        if name.trim().is_empty() {
            return Err(TrackerError::Validation("application name is empty".into()));
        }

        match self.find(name)? {
            None => {
                let location = fallback_path
                    .filter(|v| !v.is_empty())
                    .unwrap_or(UNKNOWN_LOCATION);
                let icon = Some(icon_path).filter(|v| !v.is_empty());
                self.conn.execute(
                    "INSERT INTO apps (app_name, file_location, icon_location) VALUES (?1, ?2, ?3)",
                    params![name, location, icon],
                )?;
                Ok(IconChange::Created(self.conn.last_insert_rowid()))
            }
            Some(app) if is_usable_icon(icon_path) => {
                self.conn.execute(
                    "UPDATE apps SET icon_location = ?1 WHERE id = ?2",
                    params![icon_path, app.id],
                )?;
                Ok(IconChange::Updated)
            }
            Some(_) => Ok(IconChange::Unchanged),
        }
    }
}

fn is_usable_icon(icon_path: &str) -> bool {
    !icon_path.is_empty() && icon_path != UNKNOWN_LOCATION && Path::new(icon_path).exists()
}

fn application_from_row(row: &Row<'_>) -> rusqlite::Result<ApplicationEntity> {
    Ok(ApplicationEntity {
        id: row.get(0)?,
        name: row.get(1)?,
        file_location: row.get(2)?,
        icon_location: row.get(3)?,
    })
}

impl Database {
    pub async fn resolve_application(&self, name: &str, path: &str) -> TrackerResult<AppId> {
        if name.trim().is_empty() {
            return Err(TrackerError::Validation("application name is empty".into()));
        }
        let name = name.to_string();
        let path = path.to_string();
        self.execute(move |conn| AppRepository::new(conn).resolve_or_create(&name, &path))
            .await
    }

    pub async fn set_app_icon(
        &self,
        name: &str,
        icon_path: &str,
        fallback_path: Option<&str>,
    ) -> TrackerResult<IconChange> {
        let name = name.to_string();
        let icon_path = icon_path.to_string();
        let fallback_path = fallback_path.map(str::to_string);
        self.execute(move |conn| {
            AppRepository::new(conn).set_icon(&name, &icon_path, fallback_path.as_deref())
        })
        .await
    }

    pub async fn application(&self, name: &str) -> TrackerResult<Option<ApplicationEntity>> {
        let name = name.to_string();
        self.execute(move |conn| AppRepository::new(conn).find(&name))
            .await
    }

    pub async fn applications(&self) -> TrackerResult<Vec<ApplicationEntity>> {
        self.execute(|conn| AppRepository::new(conn).all()).await
    }
}

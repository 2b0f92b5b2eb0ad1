use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};

use super::Store;
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::types::*;

const USER_COLUMNS: &str = "id, email, display_name, created_at, updated_at";
const TOKEN_COLUMNS: &str =
    "id, token_hash, token_lookup, is_admin, user_id, created_at, expires_at, last_used_at";
const DRAFT_COLUMNS: &str =
    "id, owner_id, form_data, progress, last_saved_at, created_at, updated_at";
const APPLICATION_COLUMNS: &str =
    "id, owner_id, student_name, grade, school_id, status, created_at, updated_at";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens a private in-memory database. Used by tests and local demos.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

// Fixed precision keeps text ordering equal to time ordering.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(e, rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        display_name: row.get(2)?,
        created_at: parse_datetime(&row.get::<_, String>(3)?),
        updated_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

fn token_from_row(row: &Row<'_>) -> rusqlite::Result<Token> {
    Ok(Token {
        id: row.get(0)?,
        token_hash: row.get(1)?,
        token_lookup: row.get(2)?,
        is_admin: row.get(3)?,
        user_id: row.get(4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
        expires_at: row.get::<_, Option<String>>(6)?.map(|s| parse_datetime(&s)),
        last_used_at: row.get::<_, Option<String>>(7)?.map(|s| parse_datetime(&s)),
    })
}

fn application_from_row(row: &Row<'_>) -> rusqlite::Result<Application> {
    let status: String = row.get(5)?;
    Ok(Application {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        student_name: row.get(2)?,
        grade: row.get(3)?,
        school_id: row.get(4)?,
        status: ApplicationStatus::parse(&status).unwrap_or_else(|| {
            tracing::error!("Invalid application status in database: '{}'", status);
            ApplicationStatus::Draft
        }),
        created_at: parse_datetime(&row.get::<_, String>(6)?),
        updated_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

/// Draft columns as stored; JSON decoding happens outside the row callback so
/// a corrupt payload surfaces as a serialization error.
struct DraftRow {
    id: String,
    owner_id: String,
    form_data: String,
    progress: String,
    last_saved_at: String,
    created_at: String,
    updated_at: String,
}

impl DraftRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            form_data: row.get(2)?,
            progress: row.get(3)?,
            last_saved_at: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn into_draft(self) -> Result<Draft> {
        Ok(Draft {
            id: self.id,
            owner_id: self.owner_id,
            form_data: serde_json::from_str(&self.form_data)?,
            progress: serde_json::from_str(&self.progress)?,
            last_saved_at: parse_datetime(&self.last_saved_at),
            created_at: parse_datetime(&self.created_at),
            updated_at: parse_datetime(&self.updated_at),
        })
    }
}

fn query_draft(conn: &Connection, column: &str, value: &str) -> Result<Option<Draft>> {
    conn.query_row(
        &format!("SELECT {DRAFT_COLUMNS} FROM application_drafts WHERE {column} = ?1"),
        params![value],
        DraftRow::from_row,
    )
    .optional()?
    .map(DraftRow::into_draft)
    .transpose()
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // User operations

    fn create_user(&self, user: &User) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO users (id, email, display_name, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user.id,
                user.email,
                user.display_name,
                format_datetime(&user.created_at),
                format_datetime(&user.updated_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            params![email],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_users(&self, cursor: &str, limit: i32) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id > ?1 ORDER BY id LIMIT ?2"
        ))?;

        let rows = stmt.query_map(params![cursor, limit], user_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Token operations

    fn create_token(&self, token: &Token) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO tokens (id, token_hash, token_lookup, is_admin, user_id, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                token.id,
                token.token_hash,
                token.token_lookup,
                token.is_admin,
                token.user_id,
                format_datetime(&token.created_at),
                token.expires_at.as_ref().map(format_datetime),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(Error::TokenLookupCollision),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE token_lookup = ?1"),
            params![lookup],
            token_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_user_tokens(&self, user_id: &str) -> Result<Vec<Token>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens WHERE user_id = ?1 ORDER BY created_at"
        ))?;

        let rows = stmt.query_map(params![user_id], token_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_token(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM tokens WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn update_token_last_used(&self, id: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE tokens SET last_used_at = ?1 WHERE id = ?2",
            params![format_datetime(&Utc::now()), id],
        )?;
        Ok(())
    }

    // Draft operations

    fn get_draft_by_owner(&self, owner_id: &str) -> Result<Option<Draft>> {
        query_draft(&self.conn(), "owner_id", owner_id)
    }

    fn get_draft(&self, id: &str) -> Result<Option<Draft>> {
        query_draft(&self.conn(), "id", id)
    }

    fn upsert_draft(&self, draft: &Draft) -> Result<Draft> {
        let conn = self.conn();
        let result = conn.execute(
            "INSERT INTO application_drafts
                 (id, owner_id, form_data, progress, last_saved_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(owner_id) DO UPDATE SET
                 form_data = excluded.form_data,
                 progress = excluded.progress,
                 last_saved_at = excluded.last_saved_at,
                 updated_at = excluded.updated_at",
            params![
                draft.id,
                draft.owner_id,
                serde_json::to_string(&draft.form_data)?,
                serde_json::to_string(&draft.progress)?,
                format_datetime(&draft.last_saved_at),
                format_datetime(&draft.created_at),
                format_datetime(&draft.updated_at),
            ],
        );

        match result {
            Ok(_) => {}
            // Unknown owner.
            Err(e) if is_constraint_violation(&e) => return Err(Error::NotFound),
            Err(e) => return Err(Error::from(e)),
        }

        query_draft(&conn, "owner_id", &draft.owner_id)?.ok_or(Error::NotFound)
    }

    fn update_draft(&self, id: &str, form_data: &FormData, progress: &Progress) -> Result<Draft> {
        let conn = self.conn();
        let now = format_datetime(&Utc::now());
        let rows = conn.execute(
            "UPDATE application_drafts
             SET form_data = ?1, progress = ?2, last_saved_at = ?3, updated_at = ?3
             WHERE id = ?4",
            params![
                serde_json::to_string(form_data)?,
                serde_json::to_string(progress)?,
                now,
                id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }

        query_draft(&conn, "id", id)?.ok_or(Error::NotFound)
    }

    fn delete_draft(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM application_drafts WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Application operations

    fn create_application(&self, app: &Application) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO applications
                 (id, owner_id, student_name, grade, school_id, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                app.id,
                app.owner_id,
                app.student_name,
                app.grade,
                app.school_id,
                app.status.as_str(),
                format_datetime(&app.created_at),
                format_datetime(&app.updated_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_application(&self, id: &str) -> Result<Option<Application>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = ?1"),
            params![id],
            application_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_owner_applications(
        &self,
        owner_id: &str,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<Application>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications
             WHERE owner_id = ?1 AND (?2 IS NULL OR status = ?2)
             ORDER BY updated_at DESC, id DESC"
        ))?;

        let rows = stmt.query_map(
            params![owner_id, status.map(ApplicationStatus::as_str)],
            application_from_row,
        )?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_application(&self, id: &str) -> Result<bool> {
        let result = self
            .conn()
            .execute("DELETE FROM applications WHERE id = ?1", params![id]);

        match result {
            Ok(rows) => Ok(rows > 0),
            Err(e) if is_constraint_violation(&e) => Err(Error::Conflict(
                "application still has documents".to_string(),
            )),
            Err(e) => Err(Error::from(e)),
        }
    }

    // Document operations

    fn create_document(&self, doc: &Document) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO documents (id, application_id, name, kind, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                doc.id,
                doc.application_id,
                doc.name,
                doc.kind,
                format_datetime(&doc.created_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(Error::NotFound),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn list_application_documents(&self, application_id: &str) -> Result<Vec<Document>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, application_id, name, kind, created_at
             FROM documents WHERE application_id = ?1 ORDER BY created_at, id",
        )?;

        let rows = stmt.query_map(params![application_id], |row| {
            Ok(Document {
                id: row.get(0)?,
                application_id: row.get(1)?,
                name: row.get(2)?,
                kind: row.get(3)?,
                created_at: parse_datetime(&row.get::<_, String>(4)?),
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_application_documents(&self, application_id: &str) -> Result<usize> {
        let rows = self.conn().execute(
            "DELETE FROM documents WHERE application_id = ?1",
            params![application_id],
        )?;
        Ok(rows)
    }

    // Admin token check

    fn has_admin_token(&self) -> Result<bool> {
        let conn = self.conn();
        let count: i32 = conn.query_row(
            "SELECT COUNT(*) FROM tokens WHERE is_admin = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn open_store(temp: &TempDir) -> SqliteStore {
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        store
    }

    fn seed_user(store: &SqliteStore, id: &str) {
        let now = Utc::now();
        store
            .create_user(&User {
                id: id.to_string(),
                email: format!("{id}@example.com"),
                display_name: None,
                created_at: now,
                updated_at: now,
            })
            .unwrap();
    }

    fn application(id: &str, owner: &str, status: ApplicationStatus, age_minutes: i64) -> Application {
        let at = Utc::now() - Duration::minutes(age_minutes);
        Application {
            id: id.to_string(),
            owner_id: owner.to_string(),
            student_name: "Grace".to_string(),
            grade: Some("2".to_string()),
            school_id: None,
            status,
            created_at: at,
            updated_at: at,
        }
    }

    fn draft_for(owner: &str, id: &str, student: &str) -> Draft {
        let now = Utc::now();
        Draft {
            id: id.to_string(),
            owner_id: owner.to_string(),
            form_data: FormData {
                student_name: student.to_string(),
                ..FormData::default()
            },
            progress: Progress::default(),
            last_saved_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_initialize_creates_tables() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let conn = store.conn();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"users".to_string()));
        assert!(tables.contains(&"tokens".to_string()));
        assert!(tables.contains(&"application_drafts".to_string()));
        assert!(tables.contains(&"applications".to_string()));
        assert!(tables.contains(&"documents".to_string()));
    }

    #[test]
    fn test_upsert_draft_keeps_one_row_per_owner() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        seed_user(&store, "parent-1");

        let first = store.upsert_draft(&draft_for("parent-1", "draft-a", "Grace")).unwrap();
        let second = store.upsert_draft(&draft_for("parent-1", "draft-b", "Ada")).unwrap();

        assert_eq!(first.id, "draft-a");
        assert_eq!(second.id, "draft-a");
        assert_eq!(second.form_data.student_name, "Ada");

        let count: i64 = store
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM application_drafts WHERE owner_id = 'parent-1'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_upsert_draft_unknown_owner() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let result = store.upsert_draft(&draft_for("ghost", "draft-a", "Grace"));
        assert!(matches!(result, Err(Error::NotFound)));
    }

    #[test]
    fn test_update_and_delete_draft() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        seed_user(&store, "parent-1");
        store.upsert_draft(&draft_for("parent-1", "draft-a", "Grace")).unwrap();

        let form = FormData {
            student_name: "Grace".to_string(),
            grade: "2".to_string(),
            ..FormData::default()
        };
        let progress = Progress {
            student_info: false,
            guardian_info: false,
            additional_info: true,
        };
        let updated = store.update_draft("draft-a", &form, &progress).unwrap();
        assert_eq!(updated.form_data.grade, "2");
        assert_eq!(updated.progress, progress);

        let missing = store.update_draft("draft-z", &form, &progress);
        assert!(matches!(missing, Err(Error::NotFound)));

        assert!(store.delete_draft("draft-a").unwrap());
        assert!(!store.delete_draft("draft-a").unwrap());
        assert!(store.get_draft_by_owner("parent-1").unwrap().is_none());
    }

    #[test]
    fn test_list_owner_applications_filters_and_orders() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        seed_user(&store, "parent-1");
        seed_user(&store, "parent-2");

        store
            .create_application(&application("old", "parent-1", ApplicationStatus::Draft, 60))
            .unwrap();
        store
            .create_application(&application("new", "parent-1", ApplicationStatus::Draft, 1))
            .unwrap();
        store
            .create_application(&application("done", "parent-1", ApplicationStatus::Submitted, 0))
            .unwrap();
        store
            .create_application(&application("other", "parent-2", ApplicationStatus::Draft, 0))
            .unwrap();

        let drafts = store
            .list_owner_applications("parent-1", Some(ApplicationStatus::Draft))
            .unwrap();
        let ids: Vec<_> = drafts.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);

        let all = store.list_owner_applications("parent-1", None).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_application_delete_requires_documents_gone() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        seed_user(&store, "parent-1");
        store
            .create_application(&application("app-1", "parent-1", ApplicationStatus::Draft, 0))
            .unwrap();
        store
            .create_document(&Document {
                id: "doc-1".to_string(),
                application_id: "app-1".to_string(),
                name: "birth-certificate.pdf".to_string(),
                kind: "birth_certificate".to_string(),
                created_at: Utc::now(),
            })
            .unwrap();

        let blocked = store.delete_application("app-1");
        assert!(matches!(blocked, Err(Error::Conflict(_))));

        assert_eq!(store.delete_application_documents("app-1").unwrap(), 1);
        assert_eq!(store.delete_application_documents("app-1").unwrap(), 0);
        assert!(store.delete_application("app-1").unwrap());
        assert!(!store.delete_application("app-1").unwrap());
    }

    #[test]
    fn test_token_lookup_collision() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let token1 = Token {
            id: "token-1".to_string(),
            token_hash: "hash1".to_string(),
            token_lookup: "lookup123".to_string(),
            is_admin: true,
            user_id: None,
            created_at: Utc::now(),
            expires_at: None,
            last_used_at: None,
        };
        store.create_token(&token1).unwrap();

        let token2 = Token {
            id: "token-2".to_string(),
            token_lookup: "lookup123".to_string(), // Same lookup
            ..token1.clone()
        };

        let result = store.create_token(&token2);
        assert!(matches!(result, Err(Error::TokenLookupCollision)));
        assert!(store.has_admin_token().unwrap());
    }
}

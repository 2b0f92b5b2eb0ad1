use std::sync::Arc;

use axum::Router;
use chrono::Utc;
use tempfile::TempDir;
use uuid::Uuid;

use enrollment::auth::TokenGenerator;
use enrollment::server::{AppState, create_router};
use enrollment::store::{SqliteStore, Store};
use enrollment::types::{Application, ApplicationStatus, Document, Token, User};

/// A router over a fresh on-disk database with an admin token already issued.
pub struct TestApp {
    pub temp_dir: TempDir,
    pub store: Arc<SqliteStore>,
    pub router: Router,
    pub admin_token: String,
}

fn issue_token(store: &SqliteStore, is_admin: bool, user_id: Option<String>) -> String {
    let (raw_token, lookup, hash) = TokenGenerator::new().generate().expect("generate token");
    let token = Token {
        id: Uuid::new_v4().to_string(),
        token_hash: hash,
        token_lookup: lookup,
        is_admin,
        user_id,
        created_at: Utc::now(),
        expires_at: None,
        last_used_at: None,
    };
    store.create_token(&token).expect("store token");
    raw_token
}

impl TestApp {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let store = Arc::new(
            SqliteStore::new(temp_dir.path().join("enrollment.db")).expect("open store"),
        );
        store.initialize().expect("initialize store");

        let admin_token = issue_token(&store, true, None);
        let router = create_router(Arc::new(AppState::new(store.clone())));

        Self {
            temp_dir,
            store,
            router,
            admin_token,
        }
    }

    /// Creates a parent account and returns it with a fresh token.
    pub fn create_user(&self, email: &str) -> (User, String) {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            display_name: None,
            created_at: now,
            updated_at: now,
        };
        self.store.create_user(&user).expect("create user");
        let token = issue_token(&self.store, false, Some(user.id.clone()));
        (user, token)
    }

    pub fn create_application(
        &self,
        owner_id: &str,
        student_name: &str,
        status: ApplicationStatus,
        age_minutes: i64,
    ) -> Application {
        let updated_at = Utc::now() - chrono::Duration::minutes(age_minutes);
        let app = Application {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            student_name: student_name.to_string(),
            grade: Some("2".to_string()),
            school_id: None,
            status,
            created_at: updated_at,
            updated_at,
        };
        self.store.create_application(&app).expect("create application");
        app
    }

    pub fn create_document(&self, application_id: &str, name: &str) -> Document {
        let doc = Document {
            id: Uuid::new_v4().to_string(),
            application_id: application_id.to_string(),
            name: name.to_string(),
            kind: "birth_certificate".to_string(),
            created_at: Utc::now(),
        };
        self.store.create_document(&doc).expect("create document");
        doc
    }

    /// Serves the router on an ephemeral port and returns its base URL.
    pub async fn serve(&self) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let router = self.router.clone();
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve");
        });
        format!("http://{addr}")
    }
}

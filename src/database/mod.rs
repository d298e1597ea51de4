use mongodb::bson::{doc, Document};
use mongodb::options::IndexOptions;
use mongodb::{Client, ClientSession, Collection, Database, IndexModel};
use std::error::Error;
use std::time::Duration;

pub const USERS: &str = "users";
pub const STUDY_SETS: &str = "study_sets";
pub const QUIZ_ATTEMPTS: &str = "quiz_attempts";
pub const USER_FOLLOWS: &str = "user_follows";
pub const SESSIONS: &str = "sessions";

#[derive(Clone)]
pub struct MongoDB {
    client: Client,
    db: Database,
    transactions: bool,
}

impl MongoDB {
    pub async fn new(uri: &str, transactions: bool) -> Result<Self, Box<dyn Error>> {
        let mut client_options = mongodb::options::ClientOptions::parse(uri).await?;

        client_options.max_pool_size = Some(20);
        client_options.min_pool_size = Some(2);
        client_options.max_idle_time = Some(Duration::from_secs(300));
        client_options.connect_timeout = Some(Duration::from_secs(5));
        client_options.server_selection_timeout = Some(Duration::from_secs(5));
        client_options.app_name = Some("study-set-service".to_string());

        let db_name = client_options
            .default_database
            .clone()
            .unwrap_or_else(|| "studysets".to_string());

        let client = Client::with_options(client_options)?;
        let db = client.database(&db_name);

        db.run_command(doc! { "ping": 1 }).await?;

        let mongodb = Self { client, db, transactions };
        mongodb.ensure_indexes().await?;

        Ok(mongodb)
    }

    /// Creates the indexes the invariants rely on (uniqueness, TTL) plus the
    /// lookup indexes for the hot queries.
    async fn ensure_indexes(&self) -> Result<(), Box<dyn Error>> {
        log::info!("🔧 Creating database indexes...");

        let unique = || IndexOptions::builder().unique(true).build();

        let indexes: Vec<(&str, IndexModel)> = vec![
            (USERS, IndexModel::builder().keys(doc! { "user_id": 1 }).options(unique()).build()),
            (USERS, IndexModel::builder().keys(doc! { "username": 1 }).options(unique()).build()),
            (USERS, IndexModel::builder().keys(doc! { "email": 1 }).options(unique()).build()),
            (
                USERS,
                IndexModel::builder()
                    .keys(doc! { "google_id": 1 })
                    .options(IndexOptions::builder().unique(true).sparse(true).build())
                    .build(),
            ),
            (STUDY_SETS, IndexModel::builder().keys(doc! { "study_set_id": 1 }).options(unique()).build()),
            (STUDY_SETS, IndexModel::builder().keys(doc! { "owner_id": 1, "created_at": -1 }).build()),
            (STUDY_SETS, IndexModel::builder().keys(doc! { "is_public": 1, "created_at": -1 }).build()),
            (STUDY_SETS, IndexModel::builder().keys(doc! { "is_public": 1, "favorite_count": -1 }).build()),
            (QUIZ_ATTEMPTS, IndexModel::builder().keys(doc! { "study_set_id": 1, "user_id": 1, "created_at": -1 }).build()),
            (QUIZ_ATTEMPTS, IndexModel::builder().keys(doc! { "user_id": 1 }).build()),
            (
                USER_FOLLOWS,
                IndexModel::builder()
                    .keys(doc! { "follower_id": 1, "following_id": 1 })
                    .options(unique())
                    .build(),
            ),
            (USER_FOLLOWS, IndexModel::builder().keys(doc! { "following_id": 1 }).build()),
            (SESSIONS, IndexModel::builder().keys(doc! { "session_id": 1 }).options(unique()).build()),
            (
                SESSIONS,
                IndexModel::builder()
                    .keys(doc! { "expires_at": 1 })
                    .options(IndexOptions::builder().expire_after(Duration::from_secs(0)).build())
                    .build(),
            ),
        ];

        for (collection, index) in indexes {
            let keys = index.keys.clone();
            match self.collection::<Document>(collection).create_index(index).await {
                Ok(_) => log::info!("   ✅ Index ready: {}({})", collection, keys),
                Err(e) => log::warn!("   ⚠️  Index {}({}) not created: {}", collection, keys, e),
            }
        }

        log::info!("✅ Database indexes ready");
        Ok(())
    }

    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn transactions_enabled(&self) -> bool {
        self.transactions
    }

    pub async fn ping(&self) -> bool {
        self.db.run_command(doc! { "ping": 1 }).await.is_ok()
    }
}

/// Ordered multi-collection write used by the delete/reset flows.
///
/// Runs inside a transaction when the deployment supports it (replica set,
/// `DB_TRANSACTIONS=true`); otherwise the steps run sequentially. Dropping a
/// `Cascade` without `commit` aborts the transaction.
pub struct Cascade {
    session: Option<ClientSession>,
}

impl Cascade {
    pub async fn begin(db: &MongoDB) -> Result<Self, mongodb::error::Error> {
        if !db.transactions_enabled() {
            return Ok(Self { session: None });
        }

        let mut session = db.client().start_session().await?;
        session.start_transaction().await?;
        Ok(Self { session: Some(session) })
    }

    pub async fn delete_many(
        &mut self,
        collection: &Collection<Document>,
        filter: Document,
    ) -> Result<u64, mongodb::error::Error> {
        let action = collection.delete_many(filter);
        let result = match self.session.as_mut() {
            Some(session) => action.session(session).await?,
            None => action.await?,
        };
        Ok(result.deleted_count)
    }

    pub async fn delete_one(
        &mut self,
        collection: &Collection<Document>,
        filter: Document,
    ) -> Result<u64, mongodb::error::Error> {
        let action = collection.delete_one(filter);
        let result = match self.session.as_mut() {
            Some(session) => action.session(session).await?,
            None => action.await?,
        };
        Ok(result.deleted_count)
    }

    pub async fn update_many(
        &mut self,
        collection: &Collection<Document>,
        filter: Document,
        update: Document,
    ) -> Result<u64, mongodb::error::Error> {
        let action = collection.update_many(filter, update);
        let result = match self.session.as_mut() {
            Some(session) => action.session(session).await?,
            None => action.await?,
        };
        Ok(result.modified_count)
    }

    pub async fn commit(self) -> Result<(), mongodb::error::Error> {
        if let Some(mut session) = self.session {
            session.commit_transaction().await?;
        }
        Ok(())
    }
}

/// Seed data for tests that run against a live MongoDB.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::models::{Deck, Difficulty, Quiz, QuizQuestion, StudySet, User};

    pub async fn connect() -> MongoDB {
        dotenv::dotenv().ok();
        let uri = std::env::var("TEST_DATABASE_URL")
            .unwrap_or_else(|_| "mongodb://localhost:27017/studysets_test".to_string());
        MongoDB::new(&uri, false).await.expect("connect")
    }

    pub async fn insert_user(db: &MongoDB) -> User {
        let tag = uuid::Uuid::new_v4().simple().to_string();
        let username = format!("u_{}", &tag[..12]);
        let user = User::new_local(&username, &format!("{}@example.com", tag), "hash".into(), None);
        db.collection::<User>(USERS).insert_one(&user).await.expect("insert user");
        user
    }

    pub async fn insert_study_set(db: &MongoDB, owner_id: &str, is_public: bool, questions: usize) -> StudySet {
        let choices: Vec<String> = ["one", "two", "three", "four"].iter().map(|c| c.to_string()).collect();
        let questions = (0..questions)
            .filter_map(|i| QuizQuestion::checked(&format!("Question {}?", i), &choices, "A"))
            .collect();
        let deck = Deck::from_pairs(vec![("Term".to_string(), "Definition".to_string())]);

        let set = StudySet::new(
            owner_id,
            "Seeded set",
            vec!["testing".into()],
            Difficulty::Medium,
            is_public,
            deck,
            Quiz::new(questions),
        );
        db.collection::<StudySet>(STUDY_SETS).insert_one(&set).await.expect("insert study set");
        set
    }

    pub async fn count(db: &MongoDB, collection: &str, filter: Document) -> u64 {
        db.collection::<Document>(collection).count_documents(filter).await.expect("count")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn test_mongodb_connection() {
        let db = testing::connect().await;
        assert!(db.ping().await);
    }
}

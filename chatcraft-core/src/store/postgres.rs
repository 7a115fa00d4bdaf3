use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::{Store, StoreResult, TableCounts};
use crate::models::{ApiKey, Chatbot, User, UserDetails, UserSession};

const USER_COLUMNS: &str = "id, email, hashed_password, first_name, last_name, company, role, \
                            preferences, profile_data, created_at, updated_at";
const CHATBOT_COLUMNS: &str =
    "id, name, owner_id, llm_endpoint_url, chatbot_config, created_at, updated_at";
const API_KEY_COLUMNS: &str = "id, chatbot_id, key_hash, revoked, created_at, last_used";
const SESSION_COLUMNS: &str =
    "id, user_id, session_data, context_data, created_at, last_activity, is_active";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn ping(&self) -> StoreResult<String> {
        Ok(crate::db::health_check(&self.pool).await?)
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, hashed_password, first_name, last_name, company, role,
                               preferences, profile_data, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.hashed_password)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.company)
        .bind(&user.role)
        .bind(&user.preferences)
        .bind(&user.profile_data)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_user(&self, id: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at, id");
        Ok(sqlx::query_as::<_, User>(&sql).fetch_all(&self.pool).await?)
    }

    async fn first_user(&self) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at, id LIMIT 1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_user_details(
        &self,
        id: &str,
        details: &UserDetails,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET updated_at = ");
        qb.push_bind(now);
        for (column, value) in [
            ("first_name", &details.first_name),
            ("last_name", &details.last_name),
            ("company", &details.company),
            ("role", &details.role),
            ("profile_data", &details.profile_data),
        ] {
            if let Some(v) = value {
                qb.push(format!(", {column} = ")).push_bind(v.clone());
            }
        }
        if let Some(prefs) = &details.preferences {
            qb.push(", preferences = ").push_bind(prefs.clone());
        }
        qb.push(" WHERE id = ").push_bind(id.to_string());

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_chatbot(&self, chatbot: &Chatbot) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO chatbots (id, name, owner_id, llm_endpoint_url, chatbot_config,
                                  created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&chatbot.id)
        .bind(&chatbot.name)
        .bind(&chatbot.owner_id)
        .bind(&chatbot.llm_endpoint_url)
        .bind(&chatbot.chatbot_config)
        .bind(chatbot.created_at)
        .bind(chatbot.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_chatbot(&self, id: &str) -> StoreResult<Option<Chatbot>> {
        let sql = format!("SELECT {CHATBOT_COLUMNS} FROM chatbots WHERE id = $1");
        Ok(sqlx::query_as::<_, Chatbot>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_chatbots(&self) -> StoreResult<Vec<Chatbot>> {
        let sql = format!("SELECT {CHATBOT_COLUMNS} FROM chatbots ORDER BY created_at, id");
        Ok(sqlx::query_as::<_, Chatbot>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_chatbots_for_owner(&self, owner_id: &str) -> StoreResult<Vec<Chatbot>> {
        let sql = format!(
            "SELECT {CHATBOT_COLUMNS} FROM chatbots WHERE owner_id = $1 ORDER BY created_at, id"
        );
        Ok(sqlx::query_as::<_, Chatbot>(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn insert_api_key(
        &self,
        chatbot_id: &str,
        key_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<ApiKey> {
        let sql = format!(
            "INSERT INTO api_keys (chatbot_id, key_hash, revoked, created_at) \
             VALUES ($1, $2, FALSE, $3) RETURNING {API_KEY_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, ApiKey>(&sql)
            .bind(chatbot_id)
            .bind(key_hash)
            .bind(now)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn find_api_key(&self, key_hash: &str) -> StoreResult<Option<ApiKey>> {
        let sql = format!("SELECT {API_KEY_COLUMNS} FROM api_keys WHERE key_hash = $1");
        Ok(sqlx::query_as::<_, ApiKey>(&sql)
            .bind(key_hash)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn touch_api_key(&self, id: i64, now: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query("UPDATE api_keys SET last_used = $1 WHERE id = $2")
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_api_key_revoked(&self, id: i64, revoked: bool) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE api_keys SET revoked = $1 WHERE id = $2")
            .bind(revoked)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_api_keys_for_chatbot(&self, chatbot_id: &str) -> StoreResult<Vec<ApiKey>> {
        let sql = format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys WHERE chatbot_id = $1 ORDER BY id"
        );
        Ok(sqlx::query_as::<_, ApiKey>(&sql)
            .bind(chatbot_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn insert_session(&self, session: &UserSession) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_sessions (id, user_id, session_data, context_data, created_at,
                                       last_activity, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(&session.session_data)
        .bind(&session.context_data)
        .bind(session.created_at)
        .bind(session.last_activity)
        .bind(session.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_session(&self, id: &str) -> StoreResult<Option<UserSession>> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM user_sessions WHERE id = $1");
        Ok(sqlx::query_as::<_, UserSession>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn active_session(&self, user_id: &str) -> StoreResult<Option<UserSession>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM user_sessions \
             WHERE user_id = $1 AND is_active = TRUE \
             ORDER BY last_activity DESC, id DESC LIMIT 1"
        );
        Ok(sqlx::query_as::<_, UserSession>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_session(
        &self,
        id: &str,
        session_data: Option<&Value>,
        context_data: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE user_sessions SET last_activity = ");
        qb.push_bind(now);
        if let Some(data) = session_data {
            qb.push(", session_data = ").push_bind(data.clone());
        }
        if let Some(ctx) = context_data {
            qb.push(", context_data = ").push_bind(ctx.to_string());
        }
        qb.push(" WHERE id = ").push_bind(id.to_string());

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn table_counts(&self) -> StoreResult<TableCounts> {
        let count = |table: &'static str| {
            let sql = format!("SELECT COUNT(*) FROM {table}");
            let pool = self.pool.clone();
            async move { sqlx::query_scalar::<_, i64>(&sql).fetch_one(&pool).await }
        };
        Ok(TableCounts {
            users: count("users").await?,
            chatbots: count("chatbots").await?,
            api_keys: count("api_keys").await?,
            user_sessions: count("user_sessions").await?,
        })
    }
}

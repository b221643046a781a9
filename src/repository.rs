use crate::models::{City, NewCity, User};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// RepositoryError
///
/// Persistence failures. `Duplicate` is the only one callers branch on; it is
/// raised when a unique key (user email, saved-city key) already exists.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Duplicate,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository Trait
///
/// Abstract contract for all persistence operations, so handlers and services
/// stay independent of the concrete store (Postgres, in-memory, test mocks).
///
/// Every city operation takes the owner's id; a city that exists but belongs to
/// someone else is indistinguishable from one that does not exist.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;
    // Fails with `Duplicate` when the email is taken.
    async fn create_user(&self, user: User) -> Result<User, RepositoryError>;

    // --- Cities ---
    // Favorites first, then oldest first.
    async fn list_cities(&self, user_id: Uuid) -> Result<Vec<City>, RepositoryError>;
    async fn get_city(&self, id: Uuid, user_id: Uuid) -> Result<Option<City>, RepositoryError>;
    async fn find_city(
        &self,
        user_id: Uuid,
        normalized_name: &str,
        country: Option<&str>,
    ) -> Result<Option<City>, RepositoryError>;
    // Fails with `Duplicate` when the (owner, normalized name, country) key exists.
    async fn create_city(&self, city: NewCity) -> Result<City, RepositoryError>;
    // Returns `None` when the city is unknown or not owned by `user_id`.
    async fn set_favorite(
        &self,
        id: Uuid,
        user_id: Uuid,
        favorite: bool,
    ) -> Result<Option<City>, RepositoryError>;
    // Returns whether a row was removed.
    async fn delete_city(&self, id: Uuid, user_id: Uuid) -> Result<bool, RepositoryError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

const CITY_COLUMNS: &str = "id, user_id, name, normalized_name, country, is_favorite, created_at";

/// PostgresRepository
///
/// `Repository` backed by PostgreSQL. Queries are checked at runtime, so the
/// crate builds without a live database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, password_hash, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, password_hash, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// create_user
    ///
    /// `ON CONFLICT DO NOTHING` turns a taken email into an empty result instead
    /// of a constraint error, which maps to `Duplicate`.
    async fn create_user(&self, user: User) -> Result<User, RepositoryError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, password_hash, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT DO NOTHING
            RETURNING id, name, email, password_hash, created_at
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::Duplicate)
    }

    async fn list_cities(&self, user_id: Uuid) -> Result<Vec<City>, RepositoryError> {
        let query = format!(
            "SELECT {CITY_COLUMNS} FROM cities WHERE user_id = $1 \
             ORDER BY is_favorite DESC, created_at ASC"
        );
        let cities = sqlx::query_as::<_, City>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(cities)
    }

    async fn get_city(&self, id: Uuid, user_id: Uuid) -> Result<Option<City>, RepositoryError> {
        let query = format!("SELECT {CITY_COLUMNS} FROM cities WHERE id = $1 AND user_id = $2");
        let city = sqlx::query_as::<_, City>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(city)
    }

    /// find_city
    ///
    /// Looks up the uniqueness key. `COALESCE` mirrors the unique index so a
    /// missing country only matches another missing country.
    async fn find_city(
        &self,
        user_id: Uuid,
        normalized_name: &str,
        country: Option<&str>,
    ) -> Result<Option<City>, RepositoryError> {
        let query = format!(
            "SELECT {CITY_COLUMNS} FROM cities \
             WHERE user_id = $1 AND normalized_name = $2 \
             AND COALESCE(country, '') = COALESCE($3, '')"
        );
        let city = sqlx::query_as::<_, City>(&query)
            .bind(user_id)
            .bind(normalized_name)
            .bind(country)
            .fetch_optional(&self.pool)
            .await?;
        Ok(city)
    }

    async fn create_city(&self, city: NewCity) -> Result<City, RepositoryError> {
        let query = format!(
            "INSERT INTO cities (id, user_id, name, normalized_name, country, is_favorite, created_at) \
             VALUES ($1, $2, $3, $4, $5, false, NOW()) \
             ON CONFLICT DO NOTHING \
             RETURNING {CITY_COLUMNS}"
        );
        sqlx::query_as::<_, City>(&query)
            .bind(Uuid::new_v4())
            .bind(city.user_id)
            .bind(&city.name)
            .bind(&city.normalized_name)
            .bind(&city.country)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::Duplicate)
    }

    async fn set_favorite(
        &self,
        id: Uuid,
        user_id: Uuid,
        favorite: bool,
    ) -> Result<Option<City>, RepositoryError> {
        let query = format!(
            "UPDATE cities SET is_favorite = $3 WHERE id = $1 AND user_id = $2 \
             RETURNING {CITY_COLUMNS}"
        );
        let city = sqlx::query_as::<_, City>(&query)
            .bind(id)
            .bind(user_id)
            .bind(favorite)
            .fetch_optional(&self.pool)
            .await?;
        Ok(city)
    }

    async fn delete_city(&self, id: Uuid, user_id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM cities WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// InMemoryRepository
///
/// `Repository` held in process memory. Used when no `DATABASE_URL` is
/// configured in local mode and as the store behind router tests. Applies the
/// same uniqueness and ownership rules as the Postgres schema.
#[derive(Default)]
pub struct InMemoryRepository {
    users: RwLock<HashMap<Uuid, User>>,
    cities: RwLock<HashMap<Uuid, City>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn same_key(city: &City, user_id: Uuid, normalized_name: &str, country: Option<&str>) -> bool {
    city.user_id == user_id
        && city.normalized_name == normalized_name
        && city.country.as_deref() == country
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, user: User) -> Result<User, RepositoryError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(RepositoryError::Duplicate);
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn list_cities(&self, user_id: Uuid) -> Result<Vec<City>, RepositoryError> {
        let cities = self.cities.read().await;
        let mut owned: Vec<City> = cities
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| {
            b.is_favorite
                .cmp(&a.is_favorite)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        Ok(owned)
    }

    async fn get_city(&self, id: Uuid, user_id: Uuid) -> Result<Option<City>, RepositoryError> {
        let cities = self.cities.read().await;
        Ok(cities.get(&id).filter(|c| c.user_id == user_id).cloned())
    }

    async fn find_city(
        &self,
        user_id: Uuid,
        normalized_name: &str,
        country: Option<&str>,
    ) -> Result<Option<City>, RepositoryError> {
        let cities = self.cities.read().await;
        Ok(cities
            .values()
            .find(|c| same_key(c, user_id, normalized_name, country))
            .cloned())
    }

    async fn create_city(&self, city: NewCity) -> Result<City, RepositoryError> {
        let mut cities = self.cities.write().await;
        let taken = cities.values().any(|c| {
            same_key(
                c,
                city.user_id,
                &city.normalized_name,
                city.country.as_deref(),
            )
        });
        if taken {
            return Err(RepositoryError::Duplicate);
        }
        let saved = City {
            id: Uuid::new_v4(),
            user_id: city.user_id,
            name: city.name,
            normalized_name: city.normalized_name,
            country: city.country,
            is_favorite: false,
            created_at: Utc::now(),
        };
        cities.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn set_favorite(
        &self,
        id: Uuid,
        user_id: Uuid,
        favorite: bool,
    ) -> Result<Option<City>, RepositoryError> {
        let mut cities = self.cities.write().await;
        Ok(cities
            .get_mut(&id)
            .filter(|c| c.user_id == user_id)
            .map(|c| {
                c.is_favorite = favorite;
                c.clone()
            }))
    }

    async fn delete_city(&self, id: Uuid, user_id: Uuid) -> Result<bool, RepositoryError> {
        let mut cities = self.cities.write().await;
        match cities.get(&id) {
            Some(c) if c.user_id == user_id => {
                cities.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

// ABOUTME: SQLite database storage layer for users, portfolios, and reviews
// ABOUTME: Handles schema creation, login upserts, ownership-checked writes, and the ranked listing

use sqlx::{Row, sqlite::{SqlitePool, SqliteRow}};
use uuid::Uuid;

use crate::error::Result;
use crate::types::*;

pub struct Storage {
    pub pool: SqlitePool,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url).await?;

        let storage = Self { pool };
        storage.initialize_schema().await?;

        Ok(storage)
    }

    async fn initialize_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                discord_id TEXT UNIQUE NOT NULL,
                username TEXT NOT NULL,
                avatar TEXT,
                email TEXT,
                description TEXT NOT NULL DEFAULT '',
                profile_visibility TEXT NOT NULL DEFAULT 'public',
                restrictions TEXT,
                created_at INTEGER NOT NULL,
                last_login INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS portfolios (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                username TEXT NOT NULL,
                title TEXT NOT NULL,
                template TEXT NOT NULL,
                background_color TEXT NOT NULL,
                elements TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS reviews (
                id TEXT PRIMARY KEY,
                portfolio_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                username TEXT NOT NULL,
                rating INTEGER NOT NULL,
                comment TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // Users

    /// First login creates the user; every later login refreshes the fields
    /// the provider owns. Returns the stored record either way.
    pub async fn upsert_login(&self, profile: &DiscordProfile) -> Result<User> {
        let now = chrono::Utc::now().timestamp();

        let existing = self.find_user_by_discord_id(&profile.id).await?;
        match existing {
            Some(_) => {
                sqlx::query(
                    "UPDATE users SET username = ?, avatar = ?, email = ?, last_login = ? \
                     WHERE discord_id = ?",
                )
                .bind(&profile.username)
                .bind(&profile.avatar)
                .bind(&profile.email)
                .bind(now)
                .bind(&profile.id)
                .execute(&self.pool)
                .await?;
            }
            None => {
                sqlx::query(
                    "INSERT INTO users \
                     (id, discord_id, username, avatar, email, description, profile_visibility, created_at, last_login) \
                     VALUES (?, ?, ?, ?, ?, '', 'public', ?, ?)",
                )
                .bind(Uuid::new_v4().to_string())
                .bind(&profile.id)
                .bind(&profile.username)
                .bind(&profile.avatar)
                .bind(&profile.email)
                .bind(now)
                .bind(now)
                .execute(&self.pool)
                .await?;
            }
        }

        let user = self.find_user_by_discord_id(&profile.id).await?;
        user.ok_or_else(|| {
            crate::error::AppError::Internal("user row vanished after upsert".to_string())
        })
    }

    pub async fn find_user_by_discord_id(&self, discord_id: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE discord_id = ?")
            .bind(discord_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| user_from_row(&r)).transpose()
    }

    pub async fn find_user_by_id(&self, id: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| user_from_row(&r)).transpose()
    }

    pub async fn update_profile(
        &self,
        discord_id: &str,
        description: Option<&str>,
        visibility: Option<Visibility>,
    ) -> Result<()> {
        if let Some(description) = description {
            sqlx::query("UPDATE users SET description = ? WHERE discord_id = ?")
                .bind(description)
                .bind(discord_id)
                .execute(&self.pool)
                .await?;
        }

        if let Some(visibility) = visibility {
            sqlx::query("UPDATE users SET profile_visibility = ? WHERE discord_id = ?")
                .bind(visibility.as_str())
                .bind(discord_id)
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }

    /// Case-insensitive substring match on username or Discord id,
    /// capped at 20 records. `%` and `_` in the query are literals,
    /// not wildcards.
    pub async fn search_users(&self, query: &str) -> Result<Vec<User>> {
        let escaped = query
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");

        let rows = sqlx::query(
            "SELECT * FROM users \
             WHERE username LIKE '%' || ? || '%' ESCAPE '\\' \
                OR discord_id LIKE '%' || ? || '%' ESCAPE '\\' \
             LIMIT 20",
        )
        .bind(&escaped)
        .bind(&escaped)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(user_from_row).collect()
    }

    /// Full replace of the restriction overlay. Returns false when no user
    /// matched the internal id.
    pub async fn set_restrictions(&self, user_id: &str, restrictions: &Restrictions) -> Result<bool> {
        let payload = serde_json::to_string(restrictions)?;
        let result = sqlx::query("UPDATE users SET restrictions = ? WHERE id = ?")
            .bind(payload)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Absence of the overlay means unrestricted.
    pub async fn clear_restrictions(&self, user_id: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET restrictions = NULL WHERE id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // Portfolios

    pub async fn create_portfolio(
        &self,
        owner_id: &str,
        owner_name: &str,
        req: &SavePortfolioRequest,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp();
        let elements = req
            .elements
            .clone()
            .unwrap_or_else(|| serde_json::Value::Array(Vec::new()));

        sqlx::query(
            "INSERT INTO portfolios \
             (id, user_id, username, title, template, background_color, elements, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(owner_id)
        .bind(owner_name)
        .bind(req.title.as_deref().unwrap_or("Untitled Portfolio"))
        .bind(req.template.as_deref().unwrap_or("default"))
        .bind(req.background_color.as_deref().unwrap_or("#000000"))
        .bind(serde_json::to_string(&elements)?)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    /// The ownership check lives in the WHERE clause; zero affected rows
    /// means missing or not owned by the caller.
    pub async fn update_portfolio(
        &self,
        id: &str,
        owner_id: &str,
        owner_name: &str,
        req: &SavePortfolioRequest,
    ) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let elements = req
            .elements
            .clone()
            .unwrap_or_else(|| serde_json::Value::Array(Vec::new()));

        let result = sqlx::query(
            "UPDATE portfolios \
             SET username = ?, title = ?, template = ?, background_color = ?, elements = ?, updated_at = ? \
             WHERE id = ? AND user_id = ?",
        )
        .bind(owner_name)
        .bind(req.title.as_deref().unwrap_or("Untitled Portfolio"))
        .bind(req.template.as_deref().unwrap_or("default"))
        .bind(req.background_color.as_deref().unwrap_or("#000000"))
        .bind(serde_json::to_string(&elements)?)
        .bind(now)
        .bind(id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_portfolio(&self, id: &str) -> Result<Option<Portfolio>> {
        let row = sqlx::query("SELECT * FROM portfolios WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| portfolio_from_row(&r)).transpose()
    }

    pub async fn get_portfolio_for_owner(
        &self,
        id: &str,
        owner_id: &str,
    ) -> Result<Option<Portfolio>> {
        let row = sqlx::query("SELECT * FROM portfolios WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| portfolio_from_row(&r)).transpose()
    }

    pub async fn list_portfolios_by_owner(&self, owner_id: &str) -> Result<Vec<Portfolio>> {
        let rows = sqlx::query("SELECT * FROM portfolios WHERE user_id = ?")
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(portfolio_from_row).collect()
    }

    /// Every portfolio joined with its review aggregate, best rated first.
    /// Zero reviews averages to 0, so unreviewed portfolios sort after any
    /// positively rated one; ties break newest-first.
    pub async fn list_ranked(&self) -> Result<Vec<RankedPortfolio>> {
        let rows = sqlx::query(
            "SELECT p.*, \
                    CAST(COALESCE(AVG(r.rating), 0) AS REAL) AS avg_rating, \
                    COUNT(r.id) AS review_count \
             FROM portfolios p \
             LEFT JOIN reviews r ON r.portfolio_id = p.id \
             GROUP BY p.id \
             ORDER BY avg_rating DESC, p.created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(RankedPortfolio {
                    portfolio: portfolio_from_row(row)?,
                    avg_rating: row.get("avg_rating"),
                    review_count: row.get("review_count"),
                })
            })
            .collect()
    }

    /// Owner delete. Does not cascade; reviews of the deleted portfolio are
    /// left orphaned, unlike the admin delete.
    pub async fn delete_portfolio(&self, id: &str, owner_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM portfolios WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Admin delete: removes the portfolio and every review referencing it
    /// in one transaction. Returns the cascaded review count, or None when
    /// the portfolio id did not resolve.
    pub async fn delete_portfolio_cascade(&self, id: &str) -> Result<Option<u64>> {
        let mut tx = self.pool.begin().await?;

        let reviews = sqlx::query("DELETE FROM reviews WHERE portfolio_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let portfolio = sqlx::query("DELETE FROM portfolios WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if portfolio.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(reviews.rows_affected()))
    }

    // Reviews

    pub async fn find_review(
        &self,
        portfolio_id: &str,
        reviewer_id: &str,
    ) -> Result<Option<Review>> {
        let row = sqlx::query("SELECT * FROM reviews WHERE portfolio_id = ? AND user_id = ?")
            .bind(portfolio_id)
            .bind(reviewer_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| review_from_row(&r)).transpose()
    }

    pub async fn insert_review(
        &self,
        portfolio_id: &str,
        reviewer_id: &str,
        reviewer_name: &str,
        rating: i64,
        comment: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO reviews (id, portfolio_id, user_id, username, rating, comment, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(portfolio_id)
        .bind(reviewer_id)
        .bind(reviewer_name)
        .bind(rating)
        .bind(comment)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_reviews(&self, portfolio_id: &str) -> Result<Vec<Review>> {
        let rows =
            sqlx::query("SELECT * FROM reviews WHERE portfolio_id = ? ORDER BY created_at DESC")
                .bind(portfolio_id)
                .fetch_all(&self.pool)
                .await?;

        rows.iter().map(review_from_row).collect()
    }

    // Stats

    pub async fn counts(&self) -> Result<StatsResponse> {
        let portfolios: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM portfolios")
            .fetch_one(&self.pool)
            .await?;
        let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        let reviews: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews")
            .fetch_one(&self.pool)
            .await?;

        Ok(StatsResponse {
            portfolios,
            users,
            reviews,
        })
    }
}

// Row mapping

fn user_from_row(row: &SqliteRow) -> Result<User> {
    let restrictions: Option<String> = row.get("restrictions");
    let restrictions = restrictions
        .map(|raw| serde_json::from_str::<Restrictions>(&raw))
        .transpose()?;
    let visibility: String = row.get("profile_visibility");

    Ok(User {
        id: row.get("id"),
        discord_id: row.get("discord_id"),
        username: row.get("username"),
        avatar: row.get("avatar"),
        email: row.get("email"),
        description: row.get("description"),
        profile_visibility: Visibility::parse(&visibility)?,
        restrictions,
        created_at: row.get("created_at"),
        last_login: row.get("last_login"),
    })
}

fn portfolio_from_row(row: &SqliteRow) -> Result<Portfolio> {
    let elements: String = row.get("elements");

    Ok(Portfolio {
        id: row.get("id"),
        user_id: row.get("user_id"),
        username: row.get("username"),
        title: row.get("title"),
        template: row.get("template"),
        background_color: row.get("background_color"),
        elements: serde_json::from_str(&elements)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn review_from_row(row: &SqliteRow) -> Result<Review> {
    Ok(Review {
        id: row.get("id"),
        portfolio_id: row.get("portfolio_id"),
        user_id: row.get("user_id"),
        username: row.get("username"),
        rating: row.get("rating"),
        comment: row.get("comment"),
        created_at: row.get("created_at"),
    })
}

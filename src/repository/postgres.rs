use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool, query_builder::QueryBuilder};
use std::collections::HashMap;
use uuid::Uuid;

use super::{Repository, RepositoryError, TermKind, TitleFilter, contains_pattern};
use crate::models::{
    Comment, CreateCommentRequest, CreateReviewRequest, CreateTermRequest, CreateTitleRequest,
    NewUser, Review, Term, Title, UpdateCommentRequest, UpdateReviewRequest, UpdateTitleRequest,
    User, UserChanges,
};

const USER_COLUMNS: &str =
    "id, username, email, first_name, last_name, bio, role, is_staff, last_login, date_joined";

// Titles are read with their category and rating in one row; genres come from
// a second query keyed by title id.
const TITLE_SELECT: &str = r#"
    SELECT
        t.id, t.name, t.year, t.description,
        c.id AS category_id, c.name AS category_name, c.slug AS category_slug,
        (SELECT TRUNC(AVG(r.score))::int4 FROM reviews r WHERE r.title_id = t.id) AS rating
    FROM titles t
    LEFT JOIN categories c ON c.id = t.category_id
    WHERE TRUE
"#;

const REVIEW_SELECT: &str = r#"
    SELECT r.id, r.title_id, r.author_id, u.username AS author, r.text, r.score, r.pub_date
    FROM reviews r
    JOIN users u ON u.id = r.author_id
"#;

const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.review_id, c.author_id, u.username AS author, c.text, c.pub_date
    FROM comments c
    JOIN users u ON u.id = c.author_id
"#;

#[derive(FromRow)]
struct TitleRow {
    id: i64,
    name: String,
    year: i32,
    description: String,
    category_id: Option<i64>,
    category_name: Option<String>,
    category_slug: Option<String>,
    rating: Option<i32>,
}

#[derive(FromRow)]
struct TitleGenreRow {
    title_id: i64,
    id: i64,
    name: String,
    slug: String,
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs the embedded migrations in `migrations/`.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    /// load_titles
    ///
    /// Shared read path for listing and single-title lookups. Filters are bound
    /// through `QueryBuilder`, never interpolated.
    async fn load_titles(
        &self,
        filter: &TitleFilter,
        id: Option<i64>,
    ) -> Result<Vec<Title>, RepositoryError> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(TITLE_SELECT);

        if let Some(id) = id {
            builder.push(" AND t.id = ");
            builder.push_bind(id);
        }
        if let Some(category) = &filter.category {
            builder.push(" AND c.slug = ");
            builder.push_bind(category.clone());
        }
        if let Some(genre) = &filter.genre {
            builder.push(
                " AND EXISTS (SELECT 1 FROM title_genres tg JOIN genres g ON g.id = tg.genre_id \
                 WHERE tg.title_id = t.id AND g.slug = ",
            );
            builder.push_bind(genre.clone());
            builder.push(")");
        }
        if let Some(name) = &filter.name {
            builder.push(" AND t.name ILIKE ");
            builder.push_bind(contains_pattern(name));
        }
        if let Some(year) = filter.year {
            builder.push(" AND t.year = ");
            builder.push_bind(year);
        }
        builder.push(" ORDER BY t.name, t.id");

        let rows = builder
            .build_query_as::<TitleRow>()
            .fetch_all(&self.pool)
            .await?;

        let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
        let mut genres: HashMap<i64, Vec<Term>> = HashMap::new();
        if !ids.is_empty() {
            let links = sqlx::query_as::<_, TitleGenreRow>(
                r#"SELECT tg.title_id, g.id, g.name, g.slug
                   FROM title_genres tg JOIN genres g ON g.id = tg.genre_id
                   WHERE tg.title_id = ANY($1)
                   ORDER BY g.name"#,
            )
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?;
            for link in links {
                genres.entry(link.title_id).or_default().push(Term {
                    id: link.id,
                    name: link.name,
                    slug: link.slug,
                });
            }
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let category = match (row.category_id, row.category_name, row.category_slug) {
                    (Some(id), Some(name), Some(slug)) => Some(Term { id, name, slug }),
                    _ => None,
                };
                Title {
                    genre: genres.remove(&row.id).unwrap_or_default(),
                    id: row.id,
                    name: row.name,
                    year: row.year,
                    description: row.description,
                    category,
                    rating: row.rating,
                }
            })
            .collect())
    }
}

async fn resolve_category(
    conn: &mut PgConnection,
    slug: Option<&str>,
) -> Result<Option<i64>, RepositoryError> {
    let Some(slug) = slug else {
        return Ok(None);
    };
    sqlx::query_scalar::<_, i64>("SELECT id FROM categories WHERE slug = $1")
        .bind(slug)
        .fetch_optional(&mut *conn)
        .await?
        .map(Some)
        .ok_or_else(|| RepositoryError::UnknownReference {
            field: "category",
            slug: slug.to_string(),
        })
}

async fn resolve_genres(
    conn: &mut PgConnection,
    slugs: &[String],
) -> Result<Vec<i64>, RepositoryError> {
    if slugs.is_empty() {
        return Ok(Vec::new());
    }
    let found: Vec<(i64, String)> =
        sqlx::query_as("SELECT id, slug FROM genres WHERE slug = ANY($1)")
            .bind(slugs)
            .fetch_all(&mut *conn)
            .await?;

    let by_slug: HashMap<&str, i64> = found.iter().map(|(id, slug)| (slug.as_str(), *id)).collect();
    let mut ids = Vec::with_capacity(slugs.len());
    for slug in slugs {
        let id = by_slug
            .get(slug.as_str())
            .ok_or_else(|| RepositoryError::UnknownReference {
                field: "genre",
                slug: slug.clone(),
            })?;
        if !ids.contains(id) {
            ids.push(*id);
        }
    }
    Ok(ids)
}

async fn link_genres(
    conn: &mut PgConnection,
    title_id: i64,
    genre_ids: &[i64],
) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM title_genres WHERE title_id = $1")
        .bind(title_id)
        .execute(&mut *conn)
        .await?;
    if !genre_ids.is_empty() {
        sqlx::query("INSERT INTO title_genres (title_id, genre_id) SELECT $1, UNNEST($2::bigint[])")
            .bind(title_id)
            .bind(genre_ids)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS ---

    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let sql = format!(
            "INSERT INTO users (id, username, email, first_name, last_name, bio, role) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {USER_COLUMNS}"
        );
        let created = sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(user.username)
            .bind(user.email)
            .bind(user.first_name)
            .bind(user.last_name)
            .bind(user.bio)
            .bind(user.role)
            .fetch_one(&self.pool)
            .await?;
        Ok(created)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_users(&self, search: Option<String>) -> Result<Vec<User>, RepositoryError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE ($1::text IS NULL OR username ILIKE $1) \
             ORDER BY username"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(search.as_deref().map(contains_pattern))
            .fetch_all(&self.pool)
            .await?)
    }

    /// update_user
    ///
    /// Uses `COALESCE` so that only the provided fields change.
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<User, RepositoryError> {
        let sql = format!(
            "UPDATE users SET \
                username = COALESCE($2, username), \
                email = COALESCE($3, email), \
                first_name = COALESCE($4, first_name), \
                last_name = COALESCE($5, last_name), \
                bio = COALESCE($6, bio), \
                role = COALESCE($7, role) \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(changes.username)
            .bind(changes.email)
            .bind(changes.first_name)
            .bind(changes.last_name)
            .bind(changes.bio)
            .bind(changes.role)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn record_login(
        &self,
        id: Uuid,
        previous: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let res = sqlx::query(
            "UPDATE users SET last_login = $2 \
             WHERE id = $1 AND last_login IS NOT DISTINCT FROM $3",
        )
        .bind(id)
        .bind(at)
        .bind(previous)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    // --- CATEGORIES & GENRES ---

    async fn list_terms(
        &self,
        kind: TermKind,
        search: Option<String>,
    ) -> Result<Vec<Term>, RepositoryError> {
        let sql = format!(
            "SELECT id, name, slug FROM {} \
             WHERE ($1::text IS NULL OR name ILIKE $1) \
             ORDER BY name, id",
            kind.table()
        );
        Ok(sqlx::query_as::<_, Term>(&sql)
            .bind(search.as_deref().map(contains_pattern))
            .fetch_all(&self.pool)
            .await?)
    }

    async fn create_term(
        &self,
        kind: TermKind,
        req: CreateTermRequest,
    ) -> Result<Term, RepositoryError> {
        let sql = format!(
            "INSERT INTO {} (name, slug) VALUES ($1, $2) RETURNING id, name, slug",
            kind.table()
        );
        Ok(sqlx::query_as::<_, Term>(&sql)
            .bind(req.name)
            .bind(req.slug)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn delete_term(&self, kind: TermKind, slug: &str) -> Result<bool, RepositoryError> {
        // Titles keep existing: `category_id` is nulled, genre links cascade.
        let sql = format!("DELETE FROM {} WHERE slug = $1", kind.table());
        let res = sqlx::query(&sql).bind(slug).execute(&self.pool).await?;
        Ok(res.rows_affected() > 0)
    }

    // --- TITLES ---

    async fn list_titles(&self, filter: TitleFilter) -> Result<Vec<Title>, RepositoryError> {
        self.load_titles(&filter, None).await
    }

    async fn get_title(&self, id: i64) -> Result<Option<Title>, RepositoryError> {
        Ok(self
            .load_titles(&TitleFilter::default(), Some(id))
            .await?
            .into_iter()
            .next())
    }

    /// create_title
    ///
    /// Inserts the title row and its genre links in one transaction. Unknown slugs
    /// abort the transaction with `UnknownReference`.
    async fn create_title(&self, req: CreateTitleRequest) -> Result<Title, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let category_id = resolve_category(&mut tx, req.category.as_deref()).await?;
        let genre_ids = resolve_genres(&mut tx, &req.genre).await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO titles (name, year, description, category_id) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(req.name)
        .bind(req.year)
        .bind(req.description)
        .bind(category_id)
        .fetch_one(&mut *tx)
        .await?;

        link_genres(&mut tx, id, &genre_ids).await?;
        tx.commit().await?;

        self.get_title(id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn update_title(
        &self,
        id: i64,
        req: UpdateTitleRequest,
    ) -> Result<Title, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let category_id = resolve_category(&mut tx, req.category.as_deref()).await?;
        let res = sqlx::query(
            "UPDATE titles SET \
                name = COALESCE($2, name), \
                year = COALESCE($3, year), \
                description = COALESCE($4, description), \
                category_id = COALESCE($5, category_id) \
             WHERE id = $1",
        )
        .bind(id)
        .bind(req.name)
        .bind(req.year)
        .bind(req.description)
        .bind(category_id)
        .execute(&mut *tx)
        .await?;
        if res.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        if let Some(genre) = &req.genre {
            let genre_ids = resolve_genres(&mut tx, genre).await?;
            link_genres(&mut tx, id, &genre_ids).await?;
        }
        tx.commit().await?;

        self.get_title(id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn delete_title(&self, id: i64) -> Result<bool, RepositoryError> {
        let res = sqlx::query("DELETE FROM titles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    // --- REVIEWS ---

    async fn list_reviews(&self, title_id: i64) -> Result<Vec<Review>, RepositoryError> {
        let sql = format!("{REVIEW_SELECT} WHERE r.title_id = $1 ORDER BY r.pub_date DESC, r.id DESC");
        Ok(sqlx::query_as::<_, Review>(&sql)
            .bind(title_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_review(
        &self,
        title_id: i64,
        review_id: i64,
    ) -> Result<Option<Review>, RepositoryError> {
        let sql = format!("{REVIEW_SELECT} WHERE r.title_id = $1 AND r.id = $2");
        Ok(sqlx::query_as::<_, Review>(&sql)
            .bind(title_id)
            .bind(review_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// create_review
    ///
    /// Plain insert; a second review by the same author hits `unique_review` and
    /// comes back as `UniqueViolation`.
    async fn create_review(
        &self,
        title_id: i64,
        author_id: Uuid,
        req: CreateReviewRequest,
    ) -> Result<Review, RepositoryError> {
        Ok(sqlx::query_as::<_, Review>(
            r#"
            WITH inserted AS (
                INSERT INTO reviews (title_id, author_id, text, score)
                VALUES ($1, $2, $3, $4)
                RETURNING id, title_id, author_id, text, score, pub_date
            )
            SELECT i.id, i.title_id, i.author_id, u.username AS author, i.text, i.score, i.pub_date
            FROM inserted i JOIN users u ON u.id = i.author_id
            "#,
        )
        .bind(title_id)
        .bind(author_id)
        .bind(req.text)
        .bind(req.score)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn update_review(
        &self,
        review_id: i64,
        req: UpdateReviewRequest,
    ) -> Result<Review, RepositoryError> {
        sqlx::query_as::<_, Review>(
            r#"
            WITH updated AS (
                UPDATE reviews SET text = COALESCE($2, text), score = COALESCE($3, score)
                WHERE id = $1
                RETURNING id, title_id, author_id, text, score, pub_date
            )
            SELECT d.id, d.title_id, d.author_id, u.username AS author, d.text, d.score, d.pub_date
            FROM updated d JOIN users u ON u.id = d.author_id
            "#,
        )
        .bind(review_id)
        .bind(req.text)
        .bind(req.score)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    async fn delete_review(&self, review_id: i64) -> Result<bool, RepositoryError> {
        let res = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(review_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    // --- COMMENTS ---

    async fn list_comments(&self, review_id: i64) -> Result<Vec<Comment>, RepositoryError> {
        let sql = format!("{COMMENT_SELECT} WHERE c.review_id = $1 ORDER BY c.pub_date DESC, c.id DESC");
        Ok(sqlx::query_as::<_, Comment>(&sql)
            .bind(review_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_comment(
        &self,
        review_id: i64,
        comment_id: i64,
    ) -> Result<Option<Comment>, RepositoryError> {
        let sql = format!("{COMMENT_SELECT} WHERE c.review_id = $1 AND c.id = $2");
        Ok(sqlx::query_as::<_, Comment>(&sql)
            .bind(review_id)
            .bind(comment_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_comment(
        &self,
        review_id: i64,
        author_id: Uuid,
        req: CreateCommentRequest,
    ) -> Result<Comment, RepositoryError> {
        Ok(sqlx::query_as::<_, Comment>(
            r#"
            WITH inserted AS (
                INSERT INTO comments (review_id, author_id, text)
                VALUES ($1, $2, $3)
                RETURNING id, review_id, author_id, text, pub_date
            )
            SELECT i.id, i.review_id, i.author_id, u.username AS author, i.text, i.pub_date
            FROM inserted i JOIN users u ON u.id = i.author_id
            "#,
        )
        .bind(review_id)
        .bind(author_id)
        .bind(req.text)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn update_comment(
        &self,
        comment_id: i64,
        req: UpdateCommentRequest,
    ) -> Result<Comment, RepositoryError> {
        sqlx::query_as::<_, Comment>(
            r#"
            WITH updated AS (
                UPDATE comments SET text = COALESCE($2, text)
                WHERE id = $1
                RETURNING id, review_id, author_id, text, pub_date
            )
            SELECT d.id, d.review_id, d.author_id, u.username AS author, d.text, d.pub_date
            FROM updated d JOIN users u ON u.id = d.author_id
            "#,
        )
        .bind(comment_id)
        .bind(req.text)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    async fn delete_comment(&self, comment_id: i64) -> Result<bool, RepositoryError> {
        let res = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(comment_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Repository, RepositoryError, TermKind, TitleFilter, constraints};
use crate::models::{
    Comment, CreateCommentRequest, CreateReviewRequest, CreateTermRequest, CreateTitleRequest,
    NewUser, Review, Term, Title, UpdateCommentRequest, UpdateReviewRequest, UpdateTitleRequest,
    User, UserChanges,
};

struct TitleRecord {
    id: i64,
    name: String,
    year: i32,
    description: String,
    category_id: Option<i64>,
    genre_ids: Vec<i64>,
}

struct ReviewRecord {
    id: i64,
    title_id: i64,
    author_id: Uuid,
    text: String,
    score: i16,
    pub_date: DateTime<Utc>,
}

struct CommentRecord {
    id: i64,
    review_id: i64,
    author_id: Uuid,
    text: String,
    pub_date: DateTime<Utc>,
}

#[derive(Default)]
struct Store {
    users: Vec<User>,
    categories: Vec<Term>,
    genres: Vec<Term>,
    titles: Vec<TitleRecord>,
    reviews: Vec<ReviewRecord>,
    comments: Vec<CommentRecord>,
    sequence: i64,
}

fn unique(constraint: &str) -> RepositoryError {
    RepositoryError::UniqueViolation {
        constraint: constraint.to_string(),
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

impl Store {
    fn next_id(&mut self) -> i64 {
        self.sequence += 1;
        self.sequence
    }

    fn terms(&self, kind: TermKind) -> &Vec<Term> {
        match kind {
            TermKind::Category => &self.categories,
            TermKind::Genre => &self.genres,
        }
    }

    fn terms_mut(&mut self, kind: TermKind) -> &mut Vec<Term> {
        match kind {
            TermKind::Category => &mut self.categories,
            TermKind::Genre => &mut self.genres,
        }
    }

    fn username(&self, id: Uuid) -> String {
        self.users
            .iter()
            .find(|u| u.id == id)
            .map(|u| u.username.clone())
            .unwrap_or_default()
    }

    fn check_user_unique(
        &self,
        id: Option<Uuid>,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let others = self.users.iter().filter(|u| Some(u.id) != id);
        for other in others {
            if username == Some(other.username.as_str()) {
                return Err(unique(constraints::USERNAME));
            }
            if email == Some(other.email.as_str()) {
                return Err(unique(constraints::EMAIL));
            }
        }
        Ok(())
    }

    fn resolve_category(&self, slug: Option<&str>) -> Result<Option<i64>, RepositoryError> {
        let Some(slug) = slug else {
            return Ok(None);
        };
        self.categories
            .iter()
            .find(|c| c.slug == slug)
            .map(|c| Some(c.id))
            .ok_or_else(|| RepositoryError::UnknownReference {
                field: "category",
                slug: slug.to_string(),
            })
    }

    fn resolve_genres(&self, slugs: &[String]) -> Result<Vec<i64>, RepositoryError> {
        let mut ids = Vec::with_capacity(slugs.len());
        for slug in slugs {
            let id = self
                .genres
                .iter()
                .find(|g| &g.slug == slug)
                .map(|g| g.id)
                .ok_or_else(|| RepositoryError::UnknownReference {
                    field: "genre",
                    slug: slug.clone(),
                })?;
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    fn title(&self, record: &TitleRecord) -> Title {
        let scores: Vec<i64> = self
            .reviews
            .iter()
            .filter(|r| r.title_id == record.id)
            .map(|r| i64::from(r.score))
            .collect();
        let rating = if scores.is_empty() {
            None
        } else {
            Some((scores.iter().sum::<i64>() / scores.len() as i64) as i32)
        };
        let mut genre: Vec<Term> = self
            .genres
            .iter()
            .filter(|g| record.genre_ids.contains(&g.id))
            .cloned()
            .collect();
        genre.sort_by(|a, b| a.name.cmp(&b.name));

        Title {
            id: record.id,
            name: record.name.clone(),
            year: record.year,
            description: record.description.clone(),
            category: record
                .category_id
                .and_then(|id| self.categories.iter().find(|c| c.id == id).cloned()),
            genre,
            rating,
        }
    }

    fn review(&self, record: &ReviewRecord) -> Review {
        Review {
            id: record.id,
            title_id: record.title_id,
            author_id: record.author_id,
            author: self.username(record.author_id),
            text: record.text.clone(),
            score: record.score,
            pub_date: record.pub_date,
        }
    }

    fn comment(&self, record: &CommentRecord) -> Comment {
        Comment {
            id: record.id,
            review_id: record.review_id,
            author_id: record.author_id,
            author: self.username(record.author_id),
            text: record.text.clone(),
            pub_date: record.pub_date,
        }
    }

    fn remove_reviews(&mut self, keep: impl Fn(&ReviewRecord) -> bool) {
        let removed: Vec<i64> = self
            .reviews
            .iter()
            .filter(|r| !keep(*r))
            .map(|r| r.id)
            .collect();
        self.reviews.retain(|r| keep(r));
        self.comments.retain(|c| !removed.contains(&c.review_id));
    }
}

/// InMemoryRepository
///
/// A `Repository` that keeps everything in process memory while enforcing the
/// same unique constraints, cascades and `SET NULL` rules as the Postgres schema.
/// Writes are serialized behind a single lock. Used by the test-suite and for
/// running the API without a database.
#[derive(Default)]
pub struct InMemoryRepository {
    store: RwLock<Store>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a fully-formed user, bypassing signup. Useful for seeding staff
    /// accounts, which cannot be created through the API.
    pub async fn insert_user(&self, user: User) -> Result<User, RepositoryError> {
        let mut store = self.store.write().await;
        store.check_user_unique(None, Some(user.username.as_str()), Some(user.email.as_str()))?;
        store.users.push(user.clone());
        Ok(user)
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut store = self.store.write().await;
        store.check_user_unique(None, Some(user.username.as_str()), Some(user.email.as_str()))?;
        let created = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            bio: user.bio,
            role: user.role,
            is_staff: false,
            last_login: None,
            date_joined: Utc::now(),
        };
        store.users.push(created.clone());
        Ok(created)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let store = self.store.read().await;
        Ok(store.users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let store = self.store.read().await;
        Ok(store.users.iter().find(|u| u.username == username).cloned())
    }

    async fn list_users(&self, search: Option<String>) -> Result<Vec<User>, RepositoryError> {
        let store = self.store.read().await;
        let mut users: Vec<User> = store
            .users
            .iter()
            .filter(|u| search.as_deref().is_none_or(|s| contains_ci(&u.username, s)))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<User, RepositoryError> {
        let mut store = self.store.write().await;
        store.check_user_unique(Some(id), changes.username.as_deref(), changes.email.as_deref())?;
        let user = store
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(RepositoryError::NotFound)?;
        if let Some(username) = changes.username {
            user.username = username;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(first_name) = changes.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = changes.last_name {
            user.last_name = last_name;
        }
        if let Some(bio) = changes.bio {
            user.bio = bio;
        }
        if let Some(role) = changes.role {
            user.role = role;
        }
        Ok(user.clone())
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let mut store = self.store.write().await;
        let before = store.users.len();
        store.users.retain(|u| u.id != id);
        if store.users.len() == before {
            return Ok(false);
        }
        store.remove_reviews(|r| r.author_id != id);
        store.comments.retain(|c| c.author_id != id);
        Ok(true)
    }

    async fn record_login(
        &self,
        id: Uuid,
        previous: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut store = self.store.write().await;
        match store
            .users
            .iter_mut()
            .find(|u| u.id == id && u.last_login == previous)
        {
            Some(user) => {
                user.last_login = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_terms(
        &self,
        kind: TermKind,
        search: Option<String>,
    ) -> Result<Vec<Term>, RepositoryError> {
        let store = self.store.read().await;
        let mut terms: Vec<Term> = store
            .terms(kind)
            .iter()
            .filter(|t| search.as_deref().is_none_or(|s| contains_ci(&t.name, s)))
            .cloned()
            .collect();
        terms.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(terms)
    }

    async fn create_term(
        &self,
        kind: TermKind,
        req: CreateTermRequest,
    ) -> Result<Term, RepositoryError> {
        let mut store = self.store.write().await;
        if store.terms(kind).iter().any(|t| t.slug == req.slug) {
            return Err(unique(kind.slug_constraint()));
        }
        let term = Term {
            id: store.next_id(),
            name: req.name,
            slug: req.slug,
        };
        store.terms_mut(kind).push(term.clone());
        Ok(term)
    }

    async fn delete_term(&self, kind: TermKind, slug: &str) -> Result<bool, RepositoryError> {
        let mut store = self.store.write().await;
        let Some(id) = store.terms(kind).iter().find(|t| t.slug == slug).map(|t| t.id) else {
            return Ok(false);
        };
        store.terms_mut(kind).retain(|t| t.id != id);
        for title in store.titles.iter_mut() {
            match kind {
                TermKind::Category if title.category_id == Some(id) => title.category_id = None,
                TermKind::Genre => title.genre_ids.retain(|g| *g != id),
                _ => {}
            }
        }
        Ok(true)
    }

    async fn list_titles(&self, filter: TitleFilter) -> Result<Vec<Title>, RepositoryError> {
        let store = self.store.read().await;
        let mut titles: Vec<Title> = store
            .titles
            .iter()
            .map(|record| store.title(record))
            .filter(|t| {
                filter.year.is_none_or(|year| t.year == year)
                    && filter.name.as_deref().is_none_or(|name| contains_ci(&t.name, name))
                    && filter.category.as_deref().is_none_or(|slug| {
                        t.category.as_ref().is_some_and(|c| c.slug == slug)
                    })
                    && filter
                        .genre
                        .as_deref()
                        .is_none_or(|slug| t.genre.iter().any(|g| g.slug == slug))
            })
            .collect();
        titles.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(titles)
    }

    async fn get_title(&self, id: i64) -> Result<Option<Title>, RepositoryError> {
        let store = self.store.read().await;
        Ok(store
            .titles
            .iter()
            .find(|t| t.id == id)
            .map(|record| store.title(record)))
    }

    async fn create_title(&self, req: CreateTitleRequest) -> Result<Title, RepositoryError> {
        let mut store = self.store.write().await;
        let category_id = store.resolve_category(req.category.as_deref())?;
        let genre_ids = store.resolve_genres(&req.genre)?;
        let record = TitleRecord {
            id: store.next_id(),
            name: req.name,
            year: req.year,
            description: req.description,
            category_id,
            genre_ids,
        };
        let title = store.title(&record);
        store.titles.push(record);
        Ok(title)
    }

    async fn update_title(
        &self,
        id: i64,
        req: UpdateTitleRequest,
    ) -> Result<Title, RepositoryError> {
        let mut store = self.store.write().await;
        let category_id = store.resolve_category(req.category.as_deref())?;
        let genre_ids = match &req.genre {
            Some(slugs) => Some(store.resolve_genres(slugs)?),
            None => None,
        };
        let index = store
            .titles
            .iter()
            .position(|t| t.id == id)
            .ok_or(RepositoryError::NotFound)?;
        let record = &mut store.titles[index];
        if let Some(name) = req.name {
            record.name = name;
        }
        if let Some(year) = req.year {
            record.year = year;
        }
        if let Some(description) = req.description {
            record.description = description;
        }
        if category_id.is_some() {
            record.category_id = category_id;
        }
        if let Some(genre_ids) = genre_ids {
            record.genre_ids = genre_ids;
        }
        Ok(store.title(&store.titles[index]))
    }

    async fn delete_title(&self, id: i64) -> Result<bool, RepositoryError> {
        let mut store = self.store.write().await;
        let before = store.titles.len();
        store.titles.retain(|t| t.id != id);
        if store.titles.len() == before {
            return Ok(false);
        }
        store.remove_reviews(|r| r.title_id != id);
        Ok(true)
    }

    async fn list_reviews(&self, title_id: i64) -> Result<Vec<Review>, RepositoryError> {
        let store = self.store.read().await;
        let mut reviews: Vec<Review> = store
            .reviews
            .iter()
            .filter(|r| r.title_id == title_id)
            .map(|r| store.review(r))
            .collect();
        reviews.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
        Ok(reviews)
    }

    async fn get_review(
        &self,
        title_id: i64,
        review_id: i64,
    ) -> Result<Option<Review>, RepositoryError> {
        let store = self.store.read().await;
        Ok(store
            .reviews
            .iter()
            .find(|r| r.id == review_id && r.title_id == title_id)
            .map(|r| store.review(r)))
    }

    async fn create_review(
        &self,
        title_id: i64,
        author_id: Uuid,
        req: CreateReviewRequest,
    ) -> Result<Review, RepositoryError> {
        let mut store = self.store.write().await;
        if !store.titles.iter().any(|t| t.id == title_id) {
            return Err(RepositoryError::NotFound);
        }
        if store
            .reviews
            .iter()
            .any(|r| r.title_id == title_id && r.author_id == author_id)
        {
            return Err(unique(constraints::UNIQUE_REVIEW));
        }
        let record = ReviewRecord {
            id: store.next_id(),
            title_id,
            author_id,
            text: req.text,
            score: req.score,
            pub_date: Utc::now(),
        };
        let review = store.review(&record);
        store.reviews.push(record);
        Ok(review)
    }

    async fn update_review(
        &self,
        review_id: i64,
        req: UpdateReviewRequest,
    ) -> Result<Review, RepositoryError> {
        let mut store = self.store.write().await;
        let index = store
            .reviews
            .iter()
            .position(|r| r.id == review_id)
            .ok_or(RepositoryError::NotFound)?;
        let record = &mut store.reviews[index];
        if let Some(text) = req.text {
            record.text = text;
        }
        if let Some(score) = req.score {
            record.score = score;
        }
        Ok(store.review(&store.reviews[index]))
    }

    async fn delete_review(&self, review_id: i64) -> Result<bool, RepositoryError> {
        let mut store = self.store.write().await;
        let before = store.reviews.len();
        store.remove_reviews(|r| r.id != review_id);
        Ok(store.reviews.len() < before)
    }

    async fn list_comments(&self, review_id: i64) -> Result<Vec<Comment>, RepositoryError> {
        let store = self.store.read().await;
        let mut comments: Vec<Comment> = store
            .comments
            .iter()
            .filter(|c| c.review_id == review_id)
            .map(|c| store.comment(c))
            .collect();
        comments.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
        Ok(comments)
    }

    async fn get_comment(
        &self,
        review_id: i64,
        comment_id: i64,
    ) -> Result<Option<Comment>, RepositoryError> {
        let store = self.store.read().await;
        Ok(store
            .comments
            .iter()
            .find(|c| c.id == comment_id && c.review_id == review_id)
            .map(|c| store.comment(c)))
    }

    async fn create_comment(
        &self,
        review_id: i64,
        author_id: Uuid,
        req: CreateCommentRequest,
    ) -> Result<Comment, RepositoryError> {
        let mut store = self.store.write().await;
        if !store.reviews.iter().any(|r| r.id == review_id) {
            return Err(RepositoryError::NotFound);
        }
        let record = CommentRecord {
            id: store.next_id(),
            review_id,
            author_id,
            text: req.text,
            pub_date: Utc::now(),
        };
        let comment = store.comment(&record);
        store.comments.push(record);
        Ok(comment)
    }

    async fn update_comment(
        &self,
        comment_id: i64,
        req: UpdateCommentRequest,
    ) -> Result<Comment, RepositoryError> {
        let mut store = self.store.write().await;
        let index = store
            .comments
            .iter()
            .position(|c| c.id == comment_id)
            .ok_or(RepositoryError::NotFound)?;
        if let Some(text) = req.text {
            store.comments[index].text = text;
        }
        Ok(store.comment(&store.comments[index]))
    }

    async fn delete_comment(&self, comment_id: i64) -> Result<bool, RepositoryError> {
        let mut store = self.store.write().await;
        let before = store.comments.len();
        store.comments.retain(|c| c.id != comment_id);
        Ok(store.comments.len() < before)
    }
}

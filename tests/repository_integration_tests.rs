use review_portal::{
    InMemoryRepository, PostgresRepository,
    models::{
        CreateCommentRequest, CreateReviewRequest, CreateTermRequest, CreateTitleRequest,
        NewUser, UpdateTitleRequest, User, UserChanges,
    },
    repository::{Repository, RepositoryError, TermKind, TitleFilter, constraints, contains_pattern},
};
use sqlx::PgPool;
use uuid::Uuid;

// --- Test Data Helpers ---

fn new_user(username: &str) -> NewUser {
    NewUser {
        username: username.to_string(),
        email: format!("{username}@example.com"),
        ..Default::default()
    }
}

fn term(name: &str, slug: &str) -> CreateTermRequest {
    CreateTermRequest {
        name: name.to_string(),
        slug: slug.to_string(),
    }
}

fn title(name: &str, category: Option<&str>, genre: &[&str]) -> CreateTitleRequest {
    CreateTitleRequest {
        name: name.to_string(),
        year: 1999,
        description: String::new(),
        genre: genre.iter().map(|g| g.to_string()).collect(),
        category: category.map(str::to_string),
    }
}

fn review(score: i16) -> CreateReviewRequest {
    CreateReviewRequest {
        text: format!("scored {score}"),
        score,
    }
}

fn assert_unique_violation<T: std::fmt::Debug>(
    result: Result<T, RepositoryError>,
    expected: &str,
) {
    match result {
        Err(RepositoryError::UniqueViolation { constraint }) => assert_eq!(constraint, expected),
        other => panic!("expected `{expected}` violation, got {other:?}"),
    }
}

/// Repository contract checks shared by both implementations.
async fn review_uniqueness_contract(repo: &dyn Repository, suffix: &str) {
    let author = repo.create_user(new_user(&format!("author{suffix}"))).await.unwrap();
    let created = repo.create_title(title(&format!("Heat{suffix}"), None, &[])).await.unwrap();

    let first = repo.create_review(created.id, author.id, review(8)).await.unwrap();
    assert_eq!(first.author, author.username);

    let second = repo.create_review(created.id, author.id, review(3)).await;
    assert_unique_violation(second, constraints::UNIQUE_REVIEW);
}

async fn literal_search_contract(repo: &dyn Repository, suffix: &str) {
    repo.create_title(title(&format!("Half_Life {suffix}"), None, &[])).await.unwrap();
    repo.create_title(title(&format!("HalfXLife {suffix}"), None, &[])).await.unwrap();

    let by_name = |name: String| TitleFilter {
        name: Some(name),
        ..Default::default()
    };
    let underscore = repo
        .list_titles(by_name(format!("half_life {suffix}")))
        .await
        .unwrap();
    assert_eq!(underscore.len(), 1);
    assert_eq!(underscore[0].name, format!("Half_Life {suffix}"));

    let percent = repo.list_titles(by_name(format!("% {suffix}"))).await.unwrap();
    assert!(percent.is_empty());

    repo.create_user(new_user(&format!("under_{suffix}"))).await.unwrap();
    repo.create_user(new_user(&format!("underX{suffix}"))).await.unwrap();
    let users = repo.list_users(Some(format!("under_{suffix}"))).await.unwrap();
    assert_eq!(users.len(), 1);
}

async fn record_login_contract(repo: &dyn Repository, suffix: &str) {
    let user = repo.create_user(new_user(&format!("login{suffix}"))).await.unwrap();
    assert!(user.last_login.is_none());

    let at = chrono::Utc::now();
    assert!(repo.record_login(user.id, None, at).await.unwrap());
    assert!(!repo.record_login(user.id, None, chrono::Utc::now()).await.unwrap());

    let reloaded = repo.get_user(user.id).await.unwrap().unwrap();
    assert!(reloaded.last_login.is_some());
    assert!(
        repo.record_login(user.id, reloaded.last_login, chrono::Utc::now())
            .await
            .unwrap()
    );
    assert!(!repo.record_login(Uuid::new_v4(), None, at).await.unwrap());
}

#[test]
fn test_contains_pattern_escapes_wildcards() {
    assert_eq!(contains_pattern("heat"), "%heat%");
    assert_eq!(contains_pattern("100%"), "%100\\%%");
    assert_eq!(contains_pattern("a_b"), "%a\\_b%");
    assert_eq!(contains_pattern("c:\\dir"), "%c:\\\\dir%");
}

// --- In-memory repository ---

#[tokio::test]
async fn test_memory_review_uniqueness() {
    let repo = InMemoryRepository::new();
    review_uniqueness_contract(&repo, "").await;
}

#[tokio::test]
async fn test_memory_search_treats_wildcards_literally() {
    let repo = InMemoryRepository::new();
    literal_search_contract(&repo, "x").await;
}

#[tokio::test]
async fn test_memory_record_login_compares_previous_state() {
    let repo = InMemoryRepository::new();
    record_login_contract(&repo, "").await;
}

#[tokio::test]
async fn test_memory_user_uniqueness() {
    let repo = InMemoryRepository::new();
    repo.create_user(new_user("reader")).await.unwrap();

    assert_unique_violation(repo.create_user(new_user("reader")).await, constraints::USERNAME);

    let same_email = NewUser {
        username: "other".to_string(),
        email: "reader@example.com".to_string(),
        ..Default::default()
    };
    assert_unique_violation(repo.create_user(same_email).await, constraints::EMAIL);
}

#[tokio::test]
async fn test_memory_update_user_keeps_own_values() {
    let repo = InMemoryRepository::new();
    let user = repo.create_user(new_user("reader")).await.unwrap();
    repo.create_user(new_user("taken")).await.unwrap();

    // Re-submitting your own username is not a conflict.
    let same = repo
        .update_user(
            user.id,
            UserChanges {
                username: Some("reader".to_string()),
                bio: Some("hello".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(same.bio, "hello");

    let clash = repo
        .update_user(
            user.id,
            UserChanges {
                username: Some("taken".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert_unique_violation(clash, constraints::USERNAME);

    assert!(matches!(
        repo.update_user(Uuid::new_v4(), UserChanges::default()).await,
        Err(RepositoryError::NotFound)
    ));
}

#[tokio::test]
async fn test_memory_user_search_and_order() {
    let repo = InMemoryRepository::new();
    for name in ["zed", "anna", "bob"] {
        repo.create_user(new_user(name)).await.unwrap();
    }

    let all: Vec<String> = repo
        .list_users(None)
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.username)
        .collect();
    assert_eq!(all, ["anna", "bob", "zed"]);

    let found = repo.list_users(Some("AN".to_string())).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].username, "anna");
}

#[tokio::test]
async fn test_memory_term_slug_unique_per_kind() {
    let repo = InMemoryRepository::new();
    repo.create_term(TermKind::Category, term("Film", "film")).await.unwrap();

    assert_unique_violation(
        repo.create_term(TermKind::Category, term("Movies", "film")).await,
        constraints::CATEGORY_SLUG,
    );
    // The same slug is fine in the other table.
    repo.create_term(TermKind::Genre, term("Film", "film")).await.unwrap();

    assert!(repo.delete_term(TermKind::Genre, "film").await.unwrap());
    assert!(!repo.delete_term(TermKind::Genre, "film").await.unwrap());
}

#[tokio::test]
async fn test_memory_unknown_slug_in_title_payload() {
    let repo = InMemoryRepository::new();

    match repo.create_title(title("Alien", Some("film"), &[])).await {
        Err(RepositoryError::UnknownReference { field, slug }) => {
            assert_eq!(field, "category");
            assert_eq!(slug, "film");
        }
        other => panic!("expected unknown category, got {other:?}"),
    }

    repo.create_term(TermKind::Category, term("Film", "film")).await.unwrap();
    match repo.create_title(title("Alien", Some("film"), &["horror"])).await {
        Err(RepositoryError::UnknownReference { field, .. }) => assert_eq!(field, "genre"),
        other => panic!("expected unknown genre, got {other:?}"),
    }
}

#[tokio::test]
async fn test_memory_deleting_category_nulls_title_category() {
    let repo = InMemoryRepository::new();
    repo.create_term(TermKind::Category, term("Film", "film")).await.unwrap();
    repo.create_term(TermKind::Genre, term("Drama", "drama")).await.unwrap();
    let created = repo
        .create_title(title("Stalker", Some("film"), &["drama"]))
        .await
        .unwrap();
    assert_eq!(created.category.as_ref().map(|c| c.slug.as_str()), Some("film"));

    assert!(repo.delete_term(TermKind::Category, "film").await.unwrap());
    let reloaded = repo.get_title(created.id).await.unwrap().unwrap();
    assert!(reloaded.category.is_none());
    assert_eq!(reloaded.genre.len(), 1);

    repo.delete_term(TermKind::Genre, "drama").await.unwrap();
    let reloaded = repo.get_title(created.id).await.unwrap().unwrap();
    assert!(reloaded.genre.is_empty());
}

#[tokio::test]
async fn test_memory_deleting_title_cascades() {
    let repo = InMemoryRepository::new();
    let author = repo.create_user(new_user("author")).await.unwrap();
    let created = repo.create_title(title("Ran", None, &[])).await.unwrap();
    let r = repo.create_review(created.id, author.id, review(9)).await.unwrap();
    let c = repo
        .create_comment(
            r.id,
            author.id,
            CreateCommentRequest {
                text: "agreed".to_string(),
            },
        )
        .await
        .unwrap();

    assert!(repo.delete_title(created.id).await.unwrap());
    assert!(repo.get_review(created.id, r.id).await.unwrap().is_none());
    assert!(repo.get_comment(r.id, c.id).await.unwrap().is_none());
    assert!(!repo.delete_title(created.id).await.unwrap());
}

#[tokio::test]
async fn test_memory_deleting_user_cascades() {
    let repo = InMemoryRepository::new();
    let author = repo.create_user(new_user("author")).await.unwrap();
    let other = repo.create_user(new_user("other")).await.unwrap();
    let created = repo.create_title(title("Ran", None, &[])).await.unwrap();
    let r = repo.create_review(created.id, author.id, review(9)).await.unwrap();
    repo.create_comment(
        r.id,
        other.id,
        CreateCommentRequest {
            text: "reply".to_string(),
        },
    )
    .await
    .unwrap();

    assert!(repo.delete_user(author.id).await.unwrap());
    assert!(repo.list_reviews(created.id).await.unwrap().is_empty());
    assert!(repo.list_comments(r.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_memory_rating_is_integer_mean() {
    let repo = InMemoryRepository::new();
    let created = repo.create_title(title("Ikiru", None, &[])).await.unwrap();
    assert!(created.rating.is_none());

    for (name, score) in [("a", 10), ("b", 7), ("c", 8)] {
        let user = repo.create_user(new_user(name)).await.unwrap();
        repo.create_review(created.id, user.id, review(score)).await.unwrap();
    }

    // (10 + 7 + 8) / 3 = 8.33
    let reloaded = repo.get_title(created.id).await.unwrap().unwrap();
    assert_eq!(reloaded.rating, Some(8));
}

#[tokio::test]
async fn test_memory_title_filters() {
    let repo = InMemoryRepository::new();
    repo.create_term(TermKind::Category, term("Film", "film")).await.unwrap();
    repo.create_term(TermKind::Category, term("Book", "book")).await.unwrap();
    repo.create_term(TermKind::Genre, term("Drama", "drama")).await.unwrap();
    repo.create_title(title("Solaris", Some("film"), &["drama"])).await.unwrap();
    repo.create_title(title("Solaris", Some("book"), &[])).await.unwrap();
    let mut later = title("Heat", Some("film"), &[]);
    later.year = 1995;
    repo.create_title(later).await.unwrap();

    let by_category = repo
        .list_titles(TitleFilter {
            category: Some("film".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_category.len(), 2);
    assert_eq!(by_category[0].name, "Heat", "titles are ordered by name");

    let by_genre = repo
        .list_titles(TitleFilter {
            genre: Some("drama".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_genre.len(), 1);

    let combined = repo
        .list_titles(TitleFilter {
            name: Some("sol".to_string()),
            year: Some(1999),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(combined.len(), 2);
}

#[tokio::test]
async fn test_memory_partial_title_update() {
    let repo = InMemoryRepository::new();
    repo.create_term(TermKind::Genre, term("Drama", "drama")).await.unwrap();
    repo.create_term(TermKind::Genre, term("War", "war")).await.unwrap();
    let created = repo.create_title(title("Ran", None, &["drama"])).await.unwrap();

    let updated = repo
        .update_title(
            created.id,
            UpdateTitleRequest {
                genre: Some(vec!["war".to_string(), "drama".to_string()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Ran");
    let slugs: Vec<&str> = updated.genre.iter().map(|g| g.slug.as_str()).collect();
    assert_eq!(slugs, ["drama", "war"]);

    assert!(matches!(
        repo.update_title(9999, UpdateTitleRequest::default()).await,
        Err(RepositoryError::NotFound)
    ));
}

#[tokio::test]
async fn test_memory_nested_lookup_requires_matching_parent() {
    let repo = InMemoryRepository::new();
    let author = repo.create_user(new_user("author")).await.unwrap();
    let first = repo.create_title(title("One", None, &[])).await.unwrap();
    let second = repo.create_title(title("Two", None, &[])).await.unwrap();
    let r = repo.create_review(first.id, author.id, review(5)).await.unwrap();

    assert!(repo.get_review(first.id, r.id).await.unwrap().is_some());
    assert!(repo.get_review(second.id, r.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_memory_insert_user_keeps_staff_flag() {
    let repo = InMemoryRepository::new();
    let staff = User {
        id: Uuid::new_v4(),
        username: "staff".to_string(),
        email: "staff@example.com".to_string(),
        is_staff: true,
        ..Default::default()
    };
    repo.insert_user(staff.clone()).await.unwrap();

    let loaded = repo.get_user(staff.id).await.unwrap().unwrap();
    assert!(loaded.is_admin());
}

// --- Postgres repository (needs a database) ---

async fn postgres_repository() -> PostgresRepository {
    dotenv::dotenv().ok();
    let db_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set to run integration tests");
    let pool = PgPool::connect(&db_url)
        .await
        .expect("Failed to connect to database for integration tests.");
    let repo = PostgresRepository::new(pool);
    repo.migrate().await.expect("Failed to run database migrations.");
    repo
}

#[tokio::test]
#[ignore = "requires a Postgres database in DATABASE_URL"]
async fn test_postgres_review_uniqueness() {
    let repo = postgres_repository().await;
    let suffix = Uuid::new_v4().simple().to_string();
    review_uniqueness_contract(&repo, &suffix[..8]).await;
}

#[tokio::test]
#[ignore = "requires a Postgres database in DATABASE_URL"]
async fn test_postgres_deleting_category_nulls_title_category() {
    let repo = postgres_repository().await;
    let slug = format!("cat-{}", &Uuid::new_v4().simple().to_string()[..8]);
    repo.create_term(TermKind::Category, term("Temp", &slug)).await.unwrap();
    let created = repo
        .create_title(title("Temp title", Some(&slug), &[]))
        .await
        .unwrap();

    assert!(repo.delete_term(TermKind::Category, &slug).await.unwrap());
    let reloaded = repo.get_title(created.id).await.unwrap().unwrap();
    assert!(reloaded.category.is_none());

    assert!(repo.delete_title(created.id).await.unwrap());
}

#[tokio::test]
#[ignore = "requires a Postgres database in DATABASE_URL"]
async fn test_postgres_search_treats_wildcards_literally() {
    let repo = postgres_repository().await;
    let suffix = Uuid::new_v4().simple().to_string();
    literal_search_contract(&repo, &suffix[..8]).await;
}

#[tokio::test]
#[ignore = "requires a Postgres database in DATABASE_URL"]
async fn test_postgres_record_login_compares_previous_state() {
    let repo = postgres_repository().await;
    let suffix = Uuid::new_v4().simple().to_string();
    record_login_contract(&repo, &suffix[..8]).await;
}

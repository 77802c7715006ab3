use axum::http::Method;
use review_portal::{
    auth::AuthUser,
    models::Role,
    permissions::{Access, Policy, authorize, is_safe_method},
};
use uuid::Uuid;

fn user_with(role: Role, is_staff: bool) -> AuthUser {
    AuthUser {
        id: Uuid::new_v4(),
        username: format!("{role}-user"),
        role,
        is_staff,
    }
}

const OWNED: Policy = Policy::ReadOnlyOrIsAdminOrModeratorOrAuthor;

#[test]
fn test_safe_methods() {
    assert!(is_safe_method(&Method::GET));
    assert!(is_safe_method(&Method::HEAD));
    assert!(is_safe_method(&Method::OPTIONS));
    assert!(!is_safe_method(&Method::PATCH));
    assert!(!is_safe_method(&Method::DELETE));
}

#[test]
fn test_read_only_policies_allow_anonymous_reads() {
    for policy in [Policy::IsAdminOrReadOnly, OWNED] {
        assert_eq!(authorize(policy, None, &Method::GET, None), Access::Allow);
    }
}

#[test]
fn test_anonymous_writes_are_unauthenticated() {
    for policy in [
        Policy::IsAuthenticated,
        Policy::IsAdmin,
        Policy::IsAdminOrReadOnly,
        OWNED,
    ] {
        assert_eq!(
            authorize(policy, None, &Method::POST, None),
            Access::Unauthenticated,
            "{policy:?}"
        );
    }
    // IsAdmin protects reads too.
    assert_eq!(
        authorize(Policy::IsAdmin, None, &Method::GET, None),
        Access::Unauthenticated
    );
}

#[test]
fn test_admin_only_policies() {
    let user = user_with(Role::User, false);
    let moderator = user_with(Role::Moderator, false);
    let admin = user_with(Role::Admin, false);
    let staff = user_with(Role::User, true);

    for policy in [Policy::IsAdmin, Policy::IsAdminOrReadOnly] {
        assert_eq!(authorize(policy, Some(&user), &Method::POST, None), Access::Forbidden);
        assert_eq!(
            authorize(policy, Some(&moderator), &Method::DELETE, None),
            Access::Forbidden
        );
        assert!(authorize(policy, Some(&admin), &Method::POST, None).is_allowed());
        assert!(authorize(policy, Some(&staff), &Method::DELETE, None).is_allowed());
    }

    assert_eq!(
        authorize(Policy::IsAdmin, Some(&user), &Method::GET, None),
        Access::Forbidden
    );
}

#[test]
fn test_any_authenticated_user_may_create_owned_objects() {
    let user = user_with(Role::User, false);
    assert_eq!(authorize(OWNED, Some(&user), &Method::POST, None), Access::Allow);
}

#[test]
fn test_only_author_moderator_or_admin_change_owned_objects() {
    let author = user_with(Role::User, false);
    let stranger = user_with(Role::User, false);
    let moderator = user_with(Role::Moderator, false);
    let admin = user_with(Role::Admin, false);

    for method in [Method::PATCH, Method::PUT, Method::DELETE] {
        assert_eq!(authorize(OWNED, Some(&author), &method, Some(author.id)), Access::Allow);
        assert_eq!(
            authorize(OWNED, Some(&stranger), &method, Some(author.id)),
            Access::Forbidden
        );
        assert_eq!(
            authorize(OWNED, Some(&moderator), &method, Some(author.id)),
            Access::Allow
        );
        assert_eq!(authorize(OWNED, Some(&admin), &method, Some(author.id)), Access::Allow);
    }
}

#[test]
fn test_is_authenticated_allows_every_role() {
    for role in Role::ALL {
        let actor = user_with(role, false);
        assert!(authorize(Policy::IsAuthenticated, Some(&actor), &Method::PATCH, None).is_allowed());
    }
}

#[test]
fn test_access_into_result_maps_to_status() {
    use axum::http::StatusCode;

    assert!(Access::Allow.into_result().is_ok());
    assert_eq!(
        Access::Unauthenticated.into_result().unwrap_err().status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        Access::Forbidden.into_result().unwrap_err().status(),
        StatusCode::FORBIDDEN
    );
}

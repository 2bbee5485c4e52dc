use invitation_backend::{
    config::AdminBootstrap,
    db::{MemoryStore, models::LoginRequest},
    error::AppError,
    middleware::auth::AuthService as JwtService,
    services::AuthService,
};

use super::{TEST_PASSWORD, create_user, test_config};

fn jwt() -> JwtService {
    JwtService::new(test_config().auth())
}

#[test]
fn login_accepts_username_or_email() {
    let store = MemoryStore::new();
    let user = create_user(&store, "jane", false);

    for login in [user.username.clone(), user.email.clone()] {
        let request = LoginRequest {
            login,
            password: TEST_PASSWORD.to_string(),
        };
        let response = AuthService::login(&store, &jwt(), &request).unwrap();
        assert_eq!(response.user.id, user.id);
        assert_eq!(jwt().verify_token(&response.access_token).unwrap().sub, user.id);
    }
}

#[test]
fn login_rejects_a_wrong_password() {
    let store = MemoryStore::new();
    create_user(&store, "jane", false);

    let request = LoginRequest {
        login: "jane".to_string(),
        password: "nope".to_string(),
    };
    assert!(matches!(
        AuthService::login(&store, &jwt(), &request),
        Err(AppError::Auth { .. })
    ));
}

#[test]
fn admin_bootstrap_is_idempotent() {
    let store = MemoryStore::new();
    let admin = AdminBootstrap {
        username: "admin".to_string(),
        email: "admin@example.com".to_string(),
        password: TEST_PASSWORD.to_string(),
    };

    let first = AuthService::ensure_admin(&store, &admin, 4).unwrap();
    let second = AuthService::ensure_admin(&store, &admin, 4).unwrap();

    assert!(first.is_staff);
    assert_eq!(first.id, second.id);
}

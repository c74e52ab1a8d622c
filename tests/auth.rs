mod support;

use axum::http::{StatusCode, header};

use support::{SESSION_COOKIE, TestApp, body_text, location};

fn session_cookie_value(response: &axum::http::Response<axum::body::Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| {
            let pair = value.split(';').next()?;
            let (name, value) = pair.split_once('=')?;
            (name.trim() == SESSION_COOKIE && !value.is_empty()).then(|| format!("{name}={value}"))
        })
}

#[tokio::test]
async fn anonymous_users_are_sent_to_login_with_next() {
    let app = TestApp::new();
    let author = app.create_user("leo").await;
    let post = app.store.insert_post(&author, "text", None).await;

    let cases = [
        ("/create/".to_string(), "/auth/login/?next=/create/".to_string()),
        ("/follow/".to_string(), "/auth/login/?next=/follow/".to_string()),
        (
            format!("/posts/{}/edit/", post.id),
            format!("/auth/login/?next=/posts/{}/edit/", post.id),
        ),
        (
            "/profile/leo/follow/".to_string(),
            "/auth/login/?next=/profile/leo/follow/".to_string(),
        ),
    ];

    for (uri, expected) in cases {
        let response = app.get(&uri, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "GET {uri}");
        assert_eq!(location(response.headers()), Some(expected.as_str()));
    }
}

#[tokio::test]
async fn public_pages_are_open_to_anonymous_users() {
    let app = TestApp::new();
    let author = app.create_user("leo").await;
    let group = app.store.insert_group("Cats", "cats").await;
    let post = app.store.insert_post(&author, "hello", Some(group.id)).await;

    for uri in [
        "/".to_string(),
        "/group/cats/".to_string(),
        "/profile/leo/".to_string(),
        format!("/posts/{}/", post.id),
        "/auth/login/".to_string(),
        "/auth/signup/".to_string(),
    ] {
        let response = app.get(&uri, None).await;
        assert_eq!(response.status(), StatusCode::OK, "GET {uri}");
    }
}

#[tokio::test]
async fn login_sets_a_session_and_follows_next() {
    let app = TestApp::new();
    app.create_user_with_password("leo", "correct horse battery").await;

    let response = app
        .post_form(
            "/auth/login/",
            None,
            "username=leo&password=correct+horse+battery&next=%2Fcreate%2F",
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(response.headers()), Some("/create/"));

    let cookie = session_cookie_value(&response).expect("session cookie");
    let form = app.get("/create/", Some(&cookie)).await;
    assert_eq!(form.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_ignores_off_site_next() {
    let app = TestApp::new();
    app.create_user_with_password("leo", "correct horse battery").await;

    let response = app
        .post_form(
            "/auth/login/",
            None,
            "username=leo&password=correct+horse+battery&next=https%3A%2F%2Fevil.example%2F",
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(response.headers()), Some("/"));
}

#[tokio::test]
async fn wrong_password_re_renders_login() {
    let app = TestApp::new();
    app.create_user_with_password("leo", "correct horse battery").await;

    let response = app
        .post_form("/auth/login/", None, "username=leo&password=nope")
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_cookie_value(&response).is_none());
    let html = body_text(response).await;
    assert!(html.contains("class=\"errors\""));
}

#[tokio::test]
async fn signup_creates_an_account_and_signs_in() {
    let app = TestApp::new();

    let response = app
        .post_form(
            "/auth/signup/",
            None,
            "username=newcomer&first_name=New&last_name=Comer&email=new%40example.com\
             &password1=a-long-enough-passphrase&password2=a-long-enough-passphrase",
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(response.headers()), Some("/"));
    let cookie = session_cookie_value(&response).expect("session cookie");

    let html = body_text(app.get("/", Some(&cookie)).await).await;
    assert!(html.contains("New Comer"));
    assert!(html.contains("/auth/logout/"));
}

#[tokio::test]
async fn signup_rejects_mismatched_passwords_and_taken_names() {
    let app = TestApp::new();
    app.create_user("taken").await;

    let response = app
        .post_form(
            "/auth/signup/",
            None,
            "username=fresh&email=fresh%40example.com&password1=a-long-enough-passphrase&password2=different-passphrase",
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("class=\"errors\""));

    let response = app
        .post_form(
            "/auth/signup/",
            None,
            "username=taken&email=t%40example.com&password1=a-long-enough-passphrase&password2=a-long-enough-passphrase",
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("class=\"errors\""));
}

#[tokio::test]
async fn logout_revokes_the_session() {
    let app = TestApp::new();
    let user = app.create_user("leo").await;
    let cookie = app.login_cookie(&user).await;
    assert_eq!(app.store.session_count().await, 1);

    let response = app.post_form("/auth/logout/", Some(&cookie), "").await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("You have been logged out"));
    assert_eq!(app.store.session_count().await, 0);

    let response = app.get("/create/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn tampered_session_cookie_is_anonymous() {
    let app = TestApp::new();
    let user = app.create_user("leo").await;
    let cookie = app.login_cookie(&user).await;
    let tampered = format!("{}x", &cookie[..cookie.len() - 1]);

    let response = app.get("/create/", Some(&tampered)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = app.get("/create/", Some(&format!("{SESSION_COOKIE}=garbage"))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

mod support;

use axum::http::StatusCode;

use support::{MultipartBody, SMALL_GIF, TestApp, body_text, location};

#[tokio::test]
async fn creating_a_post_redirects_to_the_author_profile() {
    let app = TestApp::new();
    let author = app.create_user("leo").await;
    let group = app.store.insert_group("Cats", "cats").await;
    let cookie = app.login_cookie(&author).await;

    let body = MultipartBody::new()
        .text("text", "Fresh from the form")
        .text("group", &group.id.to_string())
        .file("image", "small.gif", "image/gif", SMALL_GIF)
        .finish();
    let response = app.post_multipart("/create/", Some(&cookie), body).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(response.headers()), Some("/profile/leo/"));
    assert_eq!(app.store.post_count().await, 1);

    let html = body_text(app.get("/", None).await).await;
    assert!(html.contains("Fresh from the form"));
    assert!(html.contains("/group/cats/"));

    let stored = app.store.latest_post().await.expect("stored post");
    assert_eq!(stored.group_id, Some(group.id));
    let image = stored.image.expect("stored image path");
    let file_name = image.strip_prefix("posts/").expect("posts directory");
    assert!(file_name.ends_with("-small.gif"));
    assert!(html.contains(file_name));

    let media = app.get(&format!("/media/{image}"), None).await;
    assert_eq!(media.status(), StatusCode::OK);
}

#[tokio::test]
async fn blank_text_re_renders_the_form_with_errors() {
    let app = TestApp::new();
    let author = app.create_user("leo").await;
    let cookie = app.login_cookie(&author).await;

    let body = MultipartBody::new().text("text", "   ").text("group", "").finish();
    let response = app.post_multipart("/create/", Some(&cookie), body).await;

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("class=\"errors\""));
    assert_eq!(app.store.post_count().await, 0);
}

#[tokio::test]
async fn non_image_upload_is_rejected_as_a_field_error() {
    let app = TestApp::new();
    let author = app.create_user("leo").await;
    let cookie = app.login_cookie(&author).await;

    let body = MultipartBody::new()
        .text("text", "with a bogus file")
        .file("image", "notes.txt", "text/plain", b"plain text, not pixels")
        .finish();
    let response = app.post_multipart("/create/", Some(&cookie), body).await;

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("class=\"errors\""));
    assert!(html.contains("with a bogus file"));
    assert_eq!(app.store.post_count().await, 0);
}

#[tokio::test]
async fn unknown_group_is_a_field_error() {
    let app = TestApp::new();
    let author = app.create_user("leo").await;
    let cookie = app.login_cookie(&author).await;

    let body = MultipartBody::new()
        .text("text", "lost post")
        .text("group", "4242")
        .finish();
    let response = app.post_multipart("/create/", Some(&cookie), body).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.store.post_count().await, 0);
}

#[tokio::test]
async fn create_form_lists_groups() {
    let app = TestApp::new();
    let author = app.create_user("leo").await;
    app.store.insert_group("Cats", "cats").await;
    let cookie = app.login_cookie(&author).await;

    let response = app.get("/create/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("New post"));
    assert!(html.contains(">Cats</option>"));
}

#[tokio::test]
async fn author_can_edit_their_post() {
    let app = TestApp::new();
    let author = app.create_user("leo").await;
    let post = app.store.insert_post(&author, "first draft", None).await;
    let cookie = app.login_cookie(&author).await;

    let form = body_text(app.get(&format!("/posts/{}/edit/", post.id), Some(&cookie)).await).await;
    assert!(form.contains("Edit post"));
    assert!(form.contains("first draft"));

    let body = MultipartBody::new().text("text", "second draft").finish();
    let response = app
        .post_multipart(&format!("/posts/{}/edit/", post.id), Some(&cookie), body)
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(response.headers()),
        Some(format!("/posts/{}/", post.id).as_str())
    );
    let stored = app.store.post(post.id).await.expect("post");
    assert_eq!(stored.text, "second draft");
}

#[tokio::test]
async fn non_author_edit_is_redirected_and_changes_nothing() {
    let app = TestApp::new();
    let author = app.create_user("leo").await;
    let intruder = app.create_user("anna").await;
    let post = app.store.insert_post(&author, "original words", None).await;
    let cookie = app.login_cookie(&intruder).await;
    let detail = format!("/posts/{}/", post.id);

    let response = app.get(&format!("/posts/{}/edit/", post.id), Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(response.headers()), Some(detail.as_str()));

    let body = MultipartBody::new().text("text", "defaced").finish();
    let response = app
        .post_multipart(&format!("/posts/{}/edit/", post.id), Some(&cookie), body)
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(response.headers()), Some(detail.as_str()));

    let stored = app.store.post(post.id).await.expect("post");
    assert_eq!(stored.text, "original words");
}

#[tokio::test]
async fn signed_in_users_can_comment() {
    let app = TestApp::new();
    let author = app.create_user("leo").await;
    let reader = app.create_user("anna").await;
    let post = app.store.insert_post(&author, "discuss", None).await;
    let cookie = app.login_cookie(&reader).await;
    let detail = format!("/posts/{}/", post.id);

    let response = app
        .post_form(
            &format!("/posts/{}/comment/", post.id),
            Some(&cookie),
            "text=Nice+one",
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(response.headers()), Some(detail.as_str()));
    assert_eq!(app.store.comment_count(post.id).await, 1);

    let html = body_text(app.get(&detail, Some(&cookie)).await).await;
    assert!(html.contains("Nice one"));
    assert!(html.contains("/comment/"));
}

#[tokio::test]
async fn blank_comments_are_dropped() {
    let app = TestApp::new();
    let author = app.create_user("leo").await;
    let post = app.store.insert_post(&author, "discuss", None).await;
    let cookie = app.login_cookie(&author).await;

    let response = app
        .post_form(&format!("/posts/{}/comment/", post.id), Some(&cookie), "text=++")
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(app.store.comment_count(post.id).await, 0);
}

#[tokio::test]
async fn anonymous_comment_is_not_stored() {
    let app = TestApp::new();
    let author = app.create_user("leo").await;
    let post = app.store.insert_post(&author, "discuss", None).await;

    let response = app
        .post_form(&format!("/posts/{}/comment/", post.id), None, "text=drive-by")
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(
        location(response.headers())
            .is_some_and(|target| target.starts_with("/auth/login/?next="))
    );
    assert_eq!(app.store.comment_count(post.id).await, 0);
}

#[tokio::test]
async fn commenting_on_a_missing_post_is_not_found() {
    let app = TestApp::new();
    let reader = app.create_user("anna").await;
    let cookie = app.login_cookie(&reader).await;

    let response = app
        .post_form("/posts/9999/comment/", Some(&cookie), "text=hello")
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_numeric_post_ids_are_not_found() {
    let app = TestApp::new();
    let author = app.create_user("leo").await;
    let post = app.store.insert_post(&author, "untouched", None).await;
    let cookie = app.login_cookie(&author).await;

    let response = app.get("/posts/abc/edit/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(response).await.contains("404"));

    let body = MultipartBody::new().text("text", "replaced").finish();
    let response = app.post_multipart("/posts/abc/edit/", Some(&cookie), body).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .post_form("/posts/abc/comment/", Some(&cookie), "text=hello")
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    assert_eq!(app.store.post(post.id).await.map(|p| p.text).as_deref(), Some("untouched"));
    assert_eq!(app.store.comment_count(post.id).await, 0);
}

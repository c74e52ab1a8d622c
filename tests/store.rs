//! Postgres repository checks. Run with `DATABASE_URL` set and `--ignored`.

use sqlx::PgPool;

use yatube::application::repos::{
    CommentsRepo, CreateCommentParams, CreateGroupParams, CreatePostParams, CreateUserParams,
    FollowsRepo, GroupsRepo, PostScope, PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams,
    UsersRepo,
};
use yatube::domain::entities::UserRecord;
use yatube::infra::db::PostgresRepositories;

async fn user(repos: &PostgresRepositories, username: &str) -> UserRecord {
    UsersRepo::create_user(
        repos,
        CreateUserParams {
            username: username.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            password_hash: "unused".to_string(),
        },
    )
    .await
    .expect("create user")
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn follow_edges_are_unique_and_never_self_referencing(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let reader = user(&repos, "anna").await;
    let author = user(&repos, "leo").await;

    assert!(repos.create_follow(reader.id, author.id).await.expect("follow"));
    assert!(!repos.create_follow(reader.id, author.id).await.expect("follow again"));
    assert_eq!(repos.count_followers(author.id).await.expect("count"), 1);

    let err = repos
        .create_follow(author.id, author.id)
        .await
        .expect_err("self follow must violate the check constraint");
    assert!(matches!(err, RepoError::Integrity { .. }));

    assert!(repos.delete_follow(reader.id, author.id).await.expect("unfollow"));
    assert!(!repos.delete_follow(reader.id, author.id).await.expect("unfollow again"));
    assert_eq!(repos.count_followers(author.id).await.expect("count"), 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn scoped_listings_page_newest_first(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let author = user(&repos, "leo").await;
    let reader = user(&repos, "anna").await;
    let group = repos
        .create_group(CreateGroupParams {
            title: "Cats".to_string(),
            slug: "cats".to_string(),
            description: String::new(),
        })
        .await
        .expect("group");

    for n in 0..12 {
        repos
            .create_post(CreatePostParams {
                author_id: author.id,
                text: format!("post {n:02}"),
                group_id: (n % 2 == 0).then_some(group.id),
                image: None,
            })
            .await
            .expect("post");
    }

    assert_eq!(repos.count_posts(PostScope::All).await.expect("count"), 12);
    assert_eq!(repos.count_posts(PostScope::Group(group.id)).await.expect("count"), 6);
    assert_eq!(repos.count_posts(PostScope::FollowedBy(reader.id)).await.expect("count"), 0);

    let first = repos.list_posts(PostScope::All, 0, 10).await.expect("page 1");
    assert_eq!(first.len(), 10);
    assert_eq!(first[0].text, "post 11");
    let second = repos.list_posts(PostScope::All, 10, 10).await.expect("page 2");
    assert_eq!(second.len(), 2);
    assert_eq!(second[1].text, "post 00");

    repos.create_follow(reader.id, author.id).await.expect("follow");
    assert_eq!(repos.count_posts(PostScope::FollowedBy(reader.id)).await.expect("count"), 12);

    let grouped = repos.list_posts(PostScope::Group(group.id), 0, 10).await.expect("group page");
    assert!(grouped.iter().all(|entry| entry.group.as_ref().is_some_and(|g| g.slug == "cats")));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn updates_keep_the_image_unless_replaced(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let author = user(&repos, "leo").await;
    let post = repos
        .create_post(CreatePostParams {
            author_id: author.id,
            text: "with picture".to_string(),
            group_id: None,
            image: Some("posts/abc-cat.gif".to_string()),
        })
        .await
        .expect("post");

    let updated = repos
        .update_post(UpdatePostParams {
            id: post.id,
            text: "edited".to_string(),
            group_id: None,
            image: None,
        })
        .await
        .expect("update");
    assert_eq!(updated.text, "edited");
    assert_eq!(updated.image.as_deref(), Some("posts/abc-cat.gif"));

    let comment = repos
        .create_comment(CreateCommentParams {
            post_id: post.id,
            author_id: author.id,
            text: "first".to_string(),
        })
        .await
        .expect("comment");
    assert_eq!(comment.author.username, "leo");
    assert_eq!(repos.list_for_post(post.id).await.expect("comments").len(), 1);
}

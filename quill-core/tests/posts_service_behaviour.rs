use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use quill_core::QuillError;
use quill_core::actor::FixedActor;
use quill_core::database::UnitOfWork;
use quill_core::database::repositories::{TagsRepository, UsersRepository};
use quill_core::services::PostsService;
use quill_core::storage::{MemoryObjectStore, ObjectStore};
use quill_model::{CreatePostInput, PageRequest, UpdatePostInput, User};
use sqlx::PgPool;
use uuid::Uuid;

struct Fixture {
    service: PostsService,
    store: Arc<MemoryObjectStore>,
    pool: PgPool,
    author_id: Uuid,
}

async fn fixture(pool: PgPool) -> Result<Fixture> {
    let mut uow = UnitOfWork::new(pool.clone());
    let users = UsersRepository::new(Arc::new(FixedActor::anonymous()));
    let mut author = User {
        username: "ada".to_owned(),
        email: "ada@example.com".to_owned(),
        profile_image_key: Some("public/avatars/ada.png".to_owned()),
        ..User::default()
    };
    users.add(&mut uow, &mut author).await?;

    let store = Arc::new(MemoryObjectStore::default());
    let service = PostsService::new(
        pool.clone(),
        store.clone(),
        Arc::new(FixedActor::user(author.id)),
    )
    .with_presign_ttl(Duration::from_secs(900));

    Ok(Fixture {
        service,
        store,
        pool,
        author_id: author.id,
    })
}

fn text_post(content: &str) -> CreatePostInput {
    CreatePostInput {
        content: Some(content.to_owned()),
        ..CreatePostInput::default()
    }
}

async fn tag_usage(pool: &PgPool, name: &str) -> Result<Option<i32>> {
    let mut uow = UnitOfWork::new(pool.clone());
    let tags = TagsRepository::new();
    Ok(tags.get_by_name(&mut uow, name).await?.map(|t| t.usage_count))
}

async fn count_rows(pool: &PgPool, table: &str) -> Result<i64> {
    let sql = format!("SELECT count(*) FROM {table}");
    Ok(sqlx::query_scalar(&sql).fetch_one(pool).await?)
}

#[sqlx::test(migrator = "quill_core::MIGRATOR")]
async fn create_extracts_one_canonical_tag_per_distinct_fact(pool: PgPool) -> Result<()> {
    let fx = fixture(pool).await?;

    let details = fx.service.create(text_post("Hello #World and #world")).await?;

    assert_eq!(details.tags, vec!["world".to_owned()]);
    assert_eq!(details.depth, 0);
    assert_eq!(tag_usage(&fx.pool, "world").await?, Some(1));

    let author = details.author.expect("author joined");
    assert_eq!(author.id, fx.author_id);
    assert_eq!(author.username, "ada");
    assert!(author.profile_image_url.expect("public url").contains("ada.png"));
    Ok(())
}

#[sqlx::test(migrator = "quill_core::MIGRATOR")]
async fn reply_bumps_parent_counter_and_derives_depth(pool: PgPool) -> Result<()> {
    let fx = fixture(pool).await?;

    let root = fx.service.create(text_post("root #world")).await?;
    let reply = fx
        .service
        .create(CreatePostInput {
            content: Some("nice".to_owned()),
            reply_for_id: Some(root.id),
            ..CreatePostInput::default()
        })
        .await?;

    assert_eq!(reply.depth, root.depth + 1);
    assert_eq!(fx.service.get(root.id).await?.replies_count, 1);
    Ok(())
}

#[sqlx::test(migrator = "quill_core::MIGRATOR")]
async fn deleting_a_reply_restores_the_parent_counter_and_spares_root_tags(
    pool: PgPool,
) -> Result<()> {
    let fx = fixture(pool).await?;

    let root = fx.service.create(text_post("Hello #World and #world")).await?;
    let reply = fx
        .service
        .create(CreatePostInput {
            content: Some("nice".to_owned()),
            reply_for_id: Some(root.id),
            ..CreatePostInput::default()
        })
        .await?;
    assert_eq!(fx.service.get(root.id).await?.replies_count, 1);

    fx.service.delete(reply.id).await?;

    assert_eq!(fx.service.get(root.id).await?.replies_count, 0);
    // only the root contributed to the tag's usage
    assert_eq!(tag_usage(&fx.pool, "world").await?, Some(1));
    Ok(())
}

#[sqlx::test(migrator = "quill_core::MIGRATOR")]
async fn create_persists_staged_media_in_input_order(pool: PgPool) -> Result<()> {
    let fx = fixture(pool).await?;

    let staged_a = fx
        .store
        .upload_temporary("a.png", vec![1], "image/png")
        .await?;
    let staged_b = fx
        .store
        .upload_temporary("b.png", vec![2], "image/png")
        .await?;

    let details = fx
        .service
        .create(CreatePostInput {
            content: Some("with media".to_owned()),
            media: vec![staged_a, staged_b],
            ..CreatePostInput::default()
        })
        .await?;

    assert_eq!(details.media.len(), 2);
    assert_eq!(details.media[0].key, "private/posts/media/a.png");
    assert_eq!(details.media[1].key, "private/posts/media/b.png");
    assert!(details.media[0].url.contains("expires=900"));
    assert!(fx.store.contains("private/posts/media/a.png"));
    assert!(fx.store.contains("private/posts/media/b.png"));
    Ok(())
}

#[sqlx::test(migrator = "quill_core::MIGRATOR")]
async fn create_rejects_a_post_that_is_both_reply_and_repost(pool: PgPool) -> Result<()> {
    let fx = fixture(pool).await?;

    let root = fx.service.create(text_post("root")).await?;
    let error = fx
        .service
        .create(CreatePostInput {
            content: Some("both".to_owned()),
            reply_for_id: Some(root.id),
            repost_id: Some(root.id),
            ..CreatePostInput::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(error, QuillError::Validation(_)));
    Ok(())
}

#[sqlx::test(migrator = "quill_core::MIGRATOR")]
async fn missing_reference_fails_before_any_blob_moves(pool: PgPool) -> Result<()> {
    let fx = fixture(pool).await?;

    let staged = fx
        .store
        .upload_temporary("orphan.png", vec![1], "image/png")
        .await?;

    let error = fx
        .service
        .create(CreatePostInput {
            content: Some("repost of nothing".to_owned()),
            repost_id: Some(Uuid::now_v7()),
            media: vec![staged.clone()],
            ..CreatePostInput::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(error, QuillError::NotFound { .. }));
    // references resolve before the persist step, so nothing moved
    assert!(fx.store.contains(&staged));
    assert!(fx.store.keys_under("private/").is_empty());
    assert_eq!(count_rows(&fx.pool, "posts").await?, 0);
    Ok(())
}

#[sqlx::test(migrator = "quill_core::MIGRATOR")]
async fn failed_create_rolls_back_and_deletes_every_blob_it_moved(pool: PgPool) -> Result<()> {
    let fx = fixture(pool).await?;

    let staged = fx
        .store
        .upload_temporary("c.png", vec![3], "image/png")
        .await?;

    // the datastore rejects content longer than the column allows, after
    // the blob was already moved to permanent storage
    let error = fx
        .service
        .create(CreatePostInput {
            content: Some("x".repeat(501)),
            media: vec![staged],
            ..CreatePostInput::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(error, QuillError::Database(_)));
    assert_eq!(count_rows(&fx.pool, "posts").await?, 0);
    assert_eq!(count_rows(&fx.pool, "post_media").await?, 0);
    assert_eq!(count_rows(&fx.pool, "tags").await?, 0);
    // compensation removed the permanent copy before create() returned
    assert!(fx.store.keys_under("private/").is_empty());
    Ok(())
}

#[sqlx::test(migrator = "quill_core::MIGRATOR")]
async fn update_reconciles_media_by_stable_key(pool: PgPool) -> Result<()> {
    let fx = fixture(pool).await?;

    let staged_a = fx
        .store
        .upload_temporary("a.png", vec![1], "image/png")
        .await?;
    let staged_b = fx
        .store
        .upload_temporary("b.png", vec![2], "image/png")
        .await?;
    let created = fx
        .service
        .create(CreatePostInput {
            content: Some("original".to_owned()),
            media: vec![staged_a, staged_b],
            ..CreatePostInput::default()
        })
        .await?;

    let b_key = created.media[1].key.clone();
    let b_row_id: Uuid = sqlx::query_scalar("SELECT id FROM post_media WHERE key = $1")
        .bind(&b_key)
        .fetch_one(&fx.pool)
        .await?;

    let staged_c = fx
        .store
        .upload_temporary("c.png", vec![3], "image/png")
        .await?;
    let updated = fx
        .service
        .update(UpdatePostInput {
            id: created.id,
            content: Some("original".to_owned()),
            media: vec![b_key.clone(), staged_c],
        })
        .await?;

    // B survives as the same row, repositioned to the front
    assert_eq!(updated.media.len(), 2);
    assert_eq!(updated.media[0].key, b_key);
    assert_eq!(updated.media[1].key, "private/posts/media/c.png");

    let b_row_after: Uuid = sqlx::query_scalar("SELECT id FROM post_media WHERE key = $1")
        .bind(&b_key)
        .fetch_one(&fx.pool)
        .await?;
    assert_eq!(b_row_after, b_row_id);

    let a_rows: i64 = sqlx::query_scalar("SELECT count(*) FROM post_media WHERE key = $1")
        .bind("private/posts/media/a.png")
        .fetch_one(&fx.pool)
        .await?;
    assert_eq!(a_rows, 0);
    Ok(())
}

#[sqlx::test(migrator = "quill_core::MIGRATOR")]
async fn update_adjusts_tag_usage_exactly_once_per_change(pool: PgPool) -> Result<()> {
    let fx = fixture(pool).await?;

    let created = fx.service.create(text_post("#old #keep")).await?;
    assert_eq!(tag_usage(&fx.pool, "old").await?, Some(1));
    assert_eq!(tag_usage(&fx.pool, "keep").await?, Some(1));

    fx.service
        .update(UpdatePostInput {
            id: created.id,
            content: Some("#keep #new".to_owned()),
            media: Vec::new(),
        })
        .await?;

    assert_eq!(tag_usage(&fx.pool, "old").await?, Some(0));
    assert_eq!(tag_usage(&fx.pool, "keep").await?, Some(1));
    assert_eq!(tag_usage(&fx.pool, "new").await?, Some(1));
    Ok(())
}

#[sqlx::test(migrator = "quill_core::MIGRATOR")]
async fn failed_update_compensates_only_blobs_moved_by_that_call(pool: PgPool) -> Result<()> {
    let fx = fixture(pool).await?;

    let staged_a = fx
        .store
        .upload_temporary("a.png", vec![1], "image/png")
        .await?;
    let created = fx
        .service
        .create(CreatePostInput {
            content: Some("original".to_owned()),
            media: vec![staged_a],
            ..CreatePostInput::default()
        })
        .await?;
    let a_key = created.media[0].key.clone();

    let staged_d = fx
        .store
        .upload_temporary("d.png", vec![4], "image/png")
        .await?;
    let error = fx
        .service
        .update(UpdatePostInput {
            id: created.id,
            content: Some("x".repeat(501)),
            media: vec![a_key.clone(), staged_d],
        })
        .await
        .unwrap_err();

    assert!(matches!(error, QuillError::Database(_)));
    // the surviving child's blob is never deleted; only this call's move is
    assert_eq!(fx.store.keys_under("private/"), vec![a_key]);

    let stored = fx.service.get(created.id).await?;
    assert_eq!(stored.content.as_deref(), Some("original"));
    assert_eq!(stored.media.len(), 1);
    Ok(())
}

#[sqlx::test(migrator = "quill_core::MIGRATOR")]
async fn likes_are_idempotent_per_user(pool: PgPool) -> Result<()> {
    let fx = fixture(pool).await?;
    let post = fx.service.create(text_post("likeable")).await?;

    fx.service.like(post.id, fx.author_id).await?;
    fx.service.like(post.id, fx.author_id).await?;
    assert_eq!(fx.service.get(post.id).await?.likes_count, 1);

    fx.service.unlike(post.id, fx.author_id).await?;
    assert_eq!(fx.service.get(post.id).await?.likes_count, 0);

    // unliking again stays at zero
    fx.service.unlike(post.id, fx.author_id).await?;
    assert_eq!(fx.service.get(post.id).await?.likes_count, 0);
    Ok(())
}

#[sqlx::test(migrator = "quill_core::MIGRATOR")]
async fn only_the_first_view_per_user_counts(pool: PgPool) -> Result<()> {
    let fx = fixture(pool).await?;
    let post = fx.service.create(text_post("viewable")).await?;

    fx.service.record_view(post.id, fx.author_id).await?;
    fx.service.record_view(post.id, fx.author_id).await?;

    assert_eq!(fx.service.get(post.id).await?.views_count, 1);

    let (first, last): (chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>) =
        sqlx::query_as::<_, (chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>)>(
            "SELECT first_viewed_at, last_viewed_at FROM post_views WHERE post_id = $1",
        )
        .bind(post.id)
        .fetch_one(&fx.pool)
        .await?;
    assert!(last >= first);
    Ok(())
}

#[sqlx::test(migrator = "quill_core::MIGRATOR")]
async fn repost_embeds_the_original_one_level_deep(pool: PgPool) -> Result<()> {
    let fx = fixture(pool).await?;

    let root = fx.service.create(text_post("the original")).await?;
    let repost = fx
        .service
        .create(CreatePostInput {
            repost_id: Some(root.id),
            ..CreatePostInput::default()
        })
        .await?;

    let embedded = repost.repost.expect("repost embedded");
    assert_eq!(embedded.id, root.id);
    assert_eq!(embedded.content.as_deref(), Some("the original"));
    assert_eq!(fx.service.get(root.id).await?.reposts_count, 1);
    Ok(())
}

#[sqlx::test(migrator = "quill_core::MIGRATOR")]
async fn creator_pages_separate_roots_from_replies(pool: PgPool) -> Result<()> {
    let fx = fixture(pool).await?;

    let root_one = fx.service.create(text_post("first")).await?;
    fx.service.create(text_post("second")).await?;
    fx.service
        .create(CreatePostInput {
            content: Some("a reply".to_owned()),
            reply_for_id: Some(root_one.id),
            ..CreatePostInput::default()
        })
        .await?;

    let roots = fx
        .service
        .get_user_posts(fx.author_id, PageRequest::default())
        .await?;
    assert_eq!(roots.total, 2);
    assert_eq!(roots.items.len(), 2);

    let replies = fx
        .service
        .get_user_replies(fx.author_id, PageRequest::default())
        .await?;
    assert_eq!(replies.total, 1);
    assert_eq!(replies.items[0].content.as_deref(), Some("a reply"));

    let post_replies = fx
        .service
        .get_post_replies(root_one.id, PageRequest::default())
        .await?;
    assert_eq!(post_replies.total, 1);
    Ok(())
}

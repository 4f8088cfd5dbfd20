use std::sync::Arc;

use newsroom_core::{
    Actor, ArticleFields, ArticlePatch, ArticleStatus, ArticleStore, ArticleType, EditorEdit,
    JsonArticleStore, LifecycleEngine, ScheduleEntry, ScheduleSet, TransitionPolicy,
    WorkflowError,
};

fn engine() -> (Arc<JsonArticleStore>, LifecycleEngine<JsonArticleStore>) {
    let store = Arc::new(JsonArticleStore::in_memory());
    (store.clone(), LifecycleEngine::new(store))
}

fn story() -> ArticleFields {
    ArticleFields::default()
        .with_title("Monsoon arrives early")
        .with_content("Heavy rain across the coast")
        .with_category("weather")
        .with_tags(["rain", "kerala"])
}

#[tokio::test]
async fn create_draft_sets_owner_and_draft_status() {
    let (_, engine) = engine();
    let alice = Actor::reporter("alice");

    let article = engine.create_draft(&alice, story()).await.unwrap();
    assert_eq!(article.status, ArticleStatus::Draft);
    assert_eq!(article.reporter_id.as_deref(), Some("alice"));
    assert_eq!(article.tags, vec!["rain".to_string(), "kerala".to_string()]);
    assert_eq!(article.kind, ArticleType::Text);
    assert!(article.remarks.is_empty());
}

#[tokio::test]
async fn editors_cannot_create_drafts() {
    let (_, engine) = engine();
    let err = engine.create_draft(&Actor::editor("ed"), story()).await.unwrap_err();
    assert!(matches!(err, WorkflowError::NotAllowed(_)));
}

#[tokio::test]
async fn update_draft_applies_only_supplied_fields() {
    let (_, engine) = engine();
    let alice = Actor::reporter("alice");
    let draft = engine.create_draft(&alice, story()).await.unwrap();

    let updated = engine
        .update_draft(draft.id, &alice, ArticleFields::default().with_title("Monsoon arrives"), None)
        .await
        .unwrap();
    assert_eq!(updated.title, "Monsoon arrives");
    assert_eq!(updated.content, "Heavy rain across the coast");
    assert_eq!(updated.category, "weather");
    assert!(updated.updated_at >= draft.updated_at);
    assert_eq!(updated.version, draft.version + 1);
}

#[tokio::test]
async fn update_draft_rejects_other_reporters() {
    let (_, engine) = engine();
    let draft = engine.create_draft(&Actor::reporter("alice"), story()).await.unwrap();

    let err = engine
        .update_draft(draft.id, &Actor::reporter("bob"), ArticleFields::default(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NotAllowed(_)));
}

#[tokio::test]
async fn update_draft_rejects_submitted_articles() {
    let (_, engine) = engine();
    let alice = Actor::reporter("alice");
    let submitted = engine.submit(None, &alice, story()).await.unwrap();
    assert_eq!(submitted.status, ArticleStatus::Submitted);

    let err = engine
        .update_draft(submitted.id, &alice, ArticleFields::default().with_title("x"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NotAllowed(_)));
}

#[tokio::test]
async fn resubmitting_a_scheduled_article_is_not_allowed() {
    let (store, engine) = engine();
    let alice = Actor::reporter("alice");
    let article = engine.submit(None, &alice, story()).await.unwrap();
    let schedule: ScheduleSet = vec![ScheduleEntry::new("x", "2099-01-01", "09:00")].into();
    store
        .update(article.id, ArticlePatch::status(ArticleStatus::Scheduled).with_schedule(schedule), None)
        .await
        .unwrap();

    for status in [ArticleStatus::Scheduled, ArticleStatus::Published] {
        store
            .update(article.id, ArticlePatch::status(status), None)
            .await
            .unwrap();
        let err = engine
            .submit(Some(article.id), &alice, ArticleFields::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotAllowed(_)), "{status}");
    }

    let stored = store.find_by_id(article.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ArticleStatus::Published);
    assert_eq!(stored.scheduled_posts.len(), 1);
    assert!(!stored.scheduled_posts.all_posted());
}

#[tokio::test]
async fn update_draft_of_missing_article_is_not_allowed() {
    let (_, engine) = engine();
    let err = engine
        .update_draft(42, &Actor::reporter("alice"), ArticleFields::default(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NotAllowed(_)));
}

#[tokio::test]
async fn update_draft_can_force_a_status() {
    let (_, engine) = engine();
    let alice = Actor::reporter("alice");
    let draft = engine.create_draft(&alice, story()).await.unwrap();

    let updated = engine
        .update_draft(draft.id, &alice, ArticleFields::default(), Some(ArticleStatus::Submitted))
        .await
        .unwrap();
    assert_eq!(updated.status, ArticleStatus::Submitted);
}

#[tokio::test]
async fn submit_existing_draft_keeps_unfilled_fields() {
    let (_, engine) = engine();
    let alice = Actor::reporter("alice");
    let draft = engine.create_draft(&alice, story()).await.unwrap();

    let fields = ArticleFields::default().with_title("").with_content("Updated copy");
    let submitted = engine.submit(Some(draft.id), &alice, fields).await.unwrap();
    assert_eq!(submitted.status, ArticleStatus::Submitted);
    assert_eq!(submitted.title, "Monsoon arrives early");
    assert_eq!(submitted.content, "Updated copy");
}

#[tokio::test]
async fn submit_of_someone_elses_article_is_not_allowed() {
    let (_, engine) = engine();
    let draft = engine.create_draft(&Actor::reporter("alice"), story()).await.unwrap();
    let err = engine
        .submit(Some(draft.id), &Actor::reporter("bob"), ArticleFields::default())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NotAllowed(_)));
}

#[tokio::test]
async fn revert_keeps_remarks_and_review_clears_them() {
    let (_, engine) = engine();
    let alice = Actor::reporter("alice");
    let ed = Actor::editor("ed");
    let article = engine.submit(None, &alice, story()).await.unwrap();

    let reverted = engine
        .review(article.id, &ed, ArticleStatus::Reverted, Some("needs sources".into()))
        .await
        .unwrap();
    assert_eq!(reverted.status, ArticleStatus::Reverted);
    assert_eq!(reverted.remarks, "needs sources");
    assert_eq!(reverted.editor_id.as_deref(), Some("ed"));

    // reverted articles are editable again
    let resubmitted = engine
        .submit(Some(article.id), &alice, ArticleFields::default().with_content("now with sources"))
        .await
        .unwrap();
    assert_eq!(resubmitted.status, ArticleStatus::Submitted);
    assert!(resubmitted.remarks.is_empty());

    let reviewed = engine
        .review(article.id, &ed, ArticleStatus::Reviewed, Some("ignored".into()))
        .await
        .unwrap();
    assert_eq!(reviewed.status, ArticleStatus::Reviewed);
    assert!(reviewed.remarks.is_empty());
}

#[tokio::test]
async fn review_and_publish_report_missing_articles() {
    let (_, engine) = engine();
    let ed = Actor::editor("ed");
    assert!(matches!(
        engine.review(7, &ed, ArticleStatus::Reviewed, None).await,
        Err(WorkflowError::NotFound(7))
    ));
    assert!(matches!(engine.publish(7, &ed).await, Err(WorkflowError::NotFound(7))));
}

#[tokio::test]
async fn reporters_cannot_review_or_publish() {
    let (_, engine) = engine();
    let alice = Actor::reporter("alice");
    let article = engine.submit(None, &alice, story()).await.unwrap();

    assert!(matches!(
        engine.review(article.id, &alice, ArticleStatus::Reviewed, None).await,
        Err(WorkflowError::NotAllowed(_))
    ));
    assert!(matches!(
        engine.publish(article.id, &alice).await,
        Err(WorkflowError::NotAllowed(_))
    ));
}

#[tokio::test]
async fn permissive_policy_publishes_from_any_status() {
    let (_, engine) = engine();
    let draft = engine.create_draft(&Actor::reporter("alice"), story()).await.unwrap();

    let published = engine.publish(draft.id, &Actor::editor("ed")).await.unwrap();
    assert_eq!(published.status, ArticleStatus::Published);
}

#[tokio::test]
async fn strict_policy_rejects_skipped_review() {
    let (_, engine) = engine();
    let engine = engine.with_policy(TransitionPolicy::Strict);
    let alice = Actor::reporter("alice");
    let ed = Actor::editor("ed");
    let draft = engine.create_draft(&alice, story()).await.unwrap();

    let err = engine.publish(draft.id, &ed).await.unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidState(_)));

    let err = engine
        .review(draft.id, &ed, ArticleStatus::Reviewed, None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidState(_)));

    engine.submit(Some(draft.id), &alice, ArticleFields::default()).await.unwrap();
    engine.review(draft.id, &ed, ArticleStatus::Reviewed, None).await.unwrap();
    let published = engine.publish(draft.id, &ed).await.unwrap();
    assert_eq!(published.status, ArticleStatus::Published);
}

#[tokio::test]
async fn editor_edit_records_editor_and_applies_fields() {
    let (_, engine) = engine();
    let article = engine.submit(None, &Actor::reporter("alice"), story()).await.unwrap();

    let edit = EditorEdit {
        fields: ArticleFields::default().with_category("climate"),
        status: Some(ArticleStatus::Reverted),
        remarks: Some("tighten the lede".into()),
    };
    let edited = engine.editor_edit(article.id, &Actor::editor("ed"), edit).await.unwrap();
    assert_eq!(edited.category, "climate");
    assert_eq!(edited.title, "Monsoon arrives early");
    assert_eq!(edited.status, ArticleStatus::Reverted);
    assert_eq!(edited.remarks, "tighten the lede");
    assert_eq!(edited.editor_id.as_deref(), Some("ed"));
}

#[tokio::test]
async fn editor_edit_refuses_articles_without_reporter() {
    let dir = std::env::temp_dir().join(format!(
        "newsroom_orphan_{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    tokio::fs::create_dir_all(&dir).await.unwrap();
    let path = dir.join("articles.json");
    let orphan = r#"{"nextId":2,"articles":[{
        "id":1,"title":"Wire copy","content":"...","category":"world","tags":[],"type":"TEXT",
        "audioUrl":null,"videoUrl":null,"thumbnailUrl":null,"status":"SUBMITTED",
        "reporterId":null,"editorId":null,"remarks":"","scheduledPosts":[],
        "createdAt":"2025-01-01T00:00:00Z","updatedAt":"2025-01-01T00:00:00Z","version":0
    }]}"#;
    tokio::fs::write(&path, orphan).await.unwrap();

    let store = Arc::new(JsonArticleStore::load_from(&path).await);
    let engine = LifecycleEngine::new(store);
    let err = engine
        .editor_edit(1, &Actor::editor("ed"), EditorEdit::default())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidState(_)));

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn forcing_scheduled_without_entries_is_invalid() {
    let (_, engine) = engine();
    let article = engine.submit(None, &Actor::reporter("alice"), story()).await.unwrap();
    let edit = EditorEdit {
        status: Some(ArticleStatus::Scheduled),
        ..EditorEdit::default()
    };
    let err = engine.editor_edit(article.id, &Actor::editor("ed"), edit).await.unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidState(_)));
}

#[tokio::test]
async fn delete_respects_ownership_for_reporters_only() {
    let (store, engine) = engine();
    let alice = Actor::reporter("alice");
    let first = engine.create_draft(&alice, story()).await.unwrap();
    let second = engine.create_draft(&alice, story()).await.unwrap();

    let err = engine.delete_article(first.id, &Actor::reporter("bob")).await.unwrap_err();
    assert!(matches!(err, WorkflowError::NotAllowed(_)));

    engine.delete_article(first.id, &alice).await.unwrap();
    assert!(store.find_by_id(first.id).await.unwrap().is_none());

    // editors delete regardless of owner or status
    let schedule: ScheduleSet = vec![ScheduleEntry::new("x", "2025-01-01", "09:00")].into();
    store
        .update(second.id, ArticlePatch::status(ArticleStatus::Scheduled).with_schedule(schedule), None)
        .await
        .unwrap();
    engine.delete_article(second.id, &Actor::editor("ed")).await.unwrap();
    assert!(store.find_by_id(second.id).await.unwrap().is_none());

    assert!(matches!(
        engine.delete_article(second.id, &Actor::editor("ed")).await,
        Err(WorkflowError::NotFound(_))
    ));
}

//! Submission pipeline tests against fake remote collaborators

mod helpers;

use helpers::{jpeg_bytes, png_bytes, FakeGenerator, FakeNotifier, TestEnv, PUBLIC_BASE_URL};
use inkfeed_server::services::{
    CommentError, CompositeError, NotifyError, SubmissionError, SubmissionForm, FALLBACK_COMMENT,
};

fn form(class_name: &str, student_name: &str, comment: &str) -> SubmissionForm {
    SubmissionForm {
        class_name: Some(class_name.to_string()),
        student_name: Some(student_name.to_string()),
        comment: Some(comment.to_string()),
        style: None,
        posture: Some(png_bytes(60, 80, [200, 40, 40])),
        work: Some(jpeg_bytes(120, 90, [40, 40, 200])),
    }
}

#[tokio::test]
async fn test_typed_comment_is_used_verbatim() {
    let generator = FakeGenerator::succeeding("不应被使用");
    let notifier = FakeNotifier::accepting();
    let env = TestEnv::new(generator.clone(), notifier.clone());

    let submission = form("一年级楷书基础班", "李四", "  横平竖直，很认真  ").validate().unwrap();
    let receipt = env.state.pipeline.run(submission).await.unwrap();

    assert_eq!(receipt.record.comment, "横平竖直，很认真");
    assert!(!receipt.record.ai_generated);
    assert_eq!(receipt.record.comment_length, 8);
    assert_eq!(receipt.record.ai_model, None);
    assert_eq!(receipt.message(), "已发送到家长群！");
    assert_eq!(generator.calls(), 0);

    let stored = env.state.store.load().await;
    assert_eq!(stored, vec![receipt.record.clone()]);
}

#[tokio::test]
async fn test_blank_comment_uses_generated_text() {
    let generated = "笔画舒展，结构稳健，继续保持！";
    let generator = FakeGenerator::succeeding(generated);
    let notifier = FakeNotifier::accepting();
    let env = TestEnv::new(generator.clone(), notifier.clone());

    let submission = form("二年级行书启蒙班", "王五", "   ").validate().unwrap();
    let receipt = env.state.pipeline.run(submission).await.unwrap();

    let record = &receipt.record;
    assert!(record.ai_generated);
    assert_eq!(record.comment, generated);
    assert_eq!(record.comment_length, generated.chars().count());
    assert_eq!(record.ai_model.as_deref(), Some("qwen-vl-max"));
    assert_eq!(record.generation_time_ms, Some(1234));
    assert_eq!(receipt.message(), "已发送到家长群！（AI生成评语）");
    assert_eq!(generator.calls(), 1);

    let posts = notifier.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].comment, generated);
}

#[tokio::test]
async fn test_generator_failure_falls_back() {
    let generator = FakeGenerator::failing(CommentError::Unavailable);
    let notifier = FakeNotifier::accepting();
    let env = TestEnv::new(generator.clone(), notifier);

    let submission = form("一年级楷书基础班", "张三", "").validate().unwrap();
    let receipt = env.state.pipeline.run(submission).await.unwrap();

    assert_eq!(receipt.record.comment, FALLBACK_COMMENT);
    assert!(!receipt.record.ai_generated);
    assert_eq!(receipt.record.generation_time_ms, None);
    assert_eq!(receipt.message(), "已发送到家长群！");
    assert_eq!(
        receipt.archive_url,
        format!(
            "{PUBLIC_BASE_URL}/archive?student=%E5%BC%A0%E4%B8%89&class=%E4%B8%80%E5%B9%B4%E7%BA%A7%E6%A5%B7%E4%B9%A6%E5%9F%BA%E7%A1%80%E7%8F%AD"
        )
    );
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn test_unconfigured_generator_falls_back() {
    let env = TestEnv::new(
        FakeGenerator::failing(CommentError::NotConfigured),
        FakeNotifier::accepting(),
    );

    let submission = form("三年级创作提升班", "赵六", "").validate().unwrap();
    let receipt = env.state.pipeline.run(submission).await.unwrap();
    assert_eq!(receipt.record.comment, FALLBACK_COMMENT);
}

#[tokio::test]
async fn test_files_and_notification_link() {
    let notifier = FakeNotifier::accepting();
    let env = TestEnv::new(FakeGenerator::succeeding("好"), notifier.clone());

    let submission = form("一年级楷书基础班", "张三", "好字").validate().unwrap();
    let receipt = env.state.pipeline.run(submission).await.unwrap();
    let id = &receipt.record.id;

    assert_eq!(id.len(), 8);
    for prefix in ["p", "w", "c"] {
        assert!(env.uploads().join(format!("{prefix}_{id}.jpg")).exists());
    }
    assert_eq!(receipt.record.collage_url, format!("/c_{id}.jpg"));
    assert_eq!(receipt.record.posture_url, format!("/p_{id}.jpg"));

    let composite = image::open(env.uploads().join(format!("c_{id}.jpg"))).unwrap();
    assert_eq!(composite.width(), 750);

    let posts = notifier.posts();
    assert_eq!(posts[0].image_url, format!("{PUBLIC_BASE_URL}/c_{id}.jpg"));
    assert_eq!(posts[0].title(), "【课堂记录】张三 (一年级楷书基础班)");
}

#[tokio::test]
async fn test_notify_failure_aborts_without_record() {
    let env = TestEnv::new(
        FakeGenerator::succeeding("好"),
        FakeNotifier::rejecting(NotifyError::Rejected("invalid webhook url".to_string())),
    );

    let submission = form("一年级楷书基础班", "张三", "好字").validate().unwrap();
    let err = env.state.pipeline.run(submission).await.unwrap_err();

    assert!(matches!(err, SubmissionError::Notify(_)));
    assert_eq!(err.to_string(), "群推送失败: invalid webhook url");
    assert!(env.state.store.load().await.is_empty());
    // Photos and composite are retained
    assert_eq!(env.upload_count(), 3);
}

#[tokio::test]
async fn test_corrupt_photo_aborts_before_notify() {
    let notifier = FakeNotifier::accepting();
    let env = TestEnv::new(FakeGenerator::succeeding("好"), notifier.clone());

    let mut bad = form("一年级楷书基础班", "张三", "好字");
    bad.posture = Some(b"not an image at all".to_vec());
    let err = env.state.pipeline.run(bad.validate().unwrap()).await.unwrap_err();

    assert!(matches!(err, SubmissionError::Composite(_)));
    assert_eq!(err.to_string(), "拼图生成失败");
    assert!(notifier.posts().is_empty());
    assert!(env.state.store.load().await.is_empty());
    assert_eq!(env.upload_count(), 2);
}

#[tokio::test]
async fn test_extreme_aspect_photo_fails_cleanly() {
    let notifier = FakeNotifier::accepting();
    let env = TestEnv::new(FakeGenerator::succeeding("好"), notifier.clone());

    // A one-pixel-wide strip would scale to 750x15000000
    let mut tall = form("一年级楷书基础班", "张三", "好字");
    tall.posture = Some(png_bytes(1, 20_000, [0, 0, 0]));
    let err = env.state.pipeline.run(tall.validate().unwrap()).await.unwrap_err();

    assert!(matches!(err, SubmissionError::Composite(CompositeError::TooLarge { .. })));
    assert_eq!(err.to_string(), "拼图生成失败");
    assert!(notifier.posts().is_empty());
    assert!(env.state.store.load().await.is_empty());
    assert_eq!(env.upload_count(), 2);

    // The service keeps accepting submissions
    let ok = form("一年级楷书基础班", "张三", "好字").validate().unwrap();
    assert!(env.state.pipeline.run(ok).await.is_ok());
}

#[tokio::test]
async fn test_store_write_failure_is_reported() {
    let env = TestEnv::new(FakeGenerator::succeeding("好"), FakeNotifier::accepting());
    // A directory where the store file should be makes the rename fail
    std::fs::create_dir_all(env.state.store.path()).unwrap();

    let submission = form("一年级楷书基础班", "张三", "好字").validate().unwrap();
    let err = env.state.pipeline.run(submission).await.unwrap_err();

    assert!(matches!(err, SubmissionError::Persist(_)));
    assert_eq!(err.to_string(), "记录保存失败");
}

#[tokio::test]
async fn test_each_submission_gets_its_own_record() {
    let env = TestEnv::new(FakeGenerator::succeeding("好"), FakeNotifier::accepting());

    let mut ids = Vec::new();
    for student in ["甲", "乙", "丙"] {
        let submission = form("一年级楷书基础班", student, "认真").validate().unwrap();
        ids.push(env.state.pipeline.run(submission).await.unwrap().record.id);
    }

    let stored: Vec<String> = env.state.store.load().await.into_iter().map(|r| r.id).collect();
    assert_eq!(stored, ids);
}

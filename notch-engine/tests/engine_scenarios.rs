//! End-to-end scenarios through the engine facade with mock providers.

use chrono::{Duration, Utc};
use std::sync::Arc;

use notch_core::{Category, Rank, TaskDefinition, TaskSchedule, VerificationConfig};
use notch_core::{ReferralRequirement, SocialRequirement};
use notch_engine::{
    CompletionOutcome, EngineConfig, EngineError, NotchEngine, PointsAward, TaskRegistry,
};
use notch_providers::{MockAttestationProvider, MockChainProvider, MockSocialProvider};

fn engine_with(social: MockSocialProvider) -> NotchEngine {
    NotchEngine::builder(EngineConfig::default())
        .with_social(Arc::new(social))
        .with_chain(Arc::new(MockChainProvider::new("base")))
        .with_attestations(Arc::new(MockAttestationProvider::new()))
        .build()
        .unwrap()
}

fn engine() -> NotchEngine {
    engine_with(MockSocialProvider::new())
}

#[tokio::test]
async fn fresh_user_first_award() {
    let engine = engine();
    assert!(matches!(
        engine.get_score(1001).await,
        Err(EngineError::NotFound(1001))
    ));

    let score = engine
        .award_points(1001, PointsAward::new(Category::Social, 10, "publish"))
        .await
        .unwrap();
    assert_eq!(score.total_score(), 10);
    assert_eq!(score.category_score(Category::Social), 10);
    assert_eq!(score.rank(), Rank::Mini);
    assert_eq!(score.level(), 1);
    assert_eq!(score.season(), engine.current_season().id);
}

#[tokio::test]
async fn crossing_a_rank_threshold() {
    let engine = engine();
    engine
        .award_points(7, PointsAward::new(Category::Builder, 95, "deploy"))
        .await
        .unwrap();
    let score = engine
        .award_points(7, PointsAward::new(Category::Builder, 10, "deploy"))
        .await
        .unwrap();

    assert_eq!(score.total_score(), 105);
    assert_eq!(score.rank(), Rank::Core);
    assert_eq!(score.level(), 2);
}

#[tokio::test]
async fn task_reward_is_paid_once() {
    let social = MockSocialProvider::new().with_post(
        55,
        "loving the #notch leaderboard today",
        Utc::now() - Duration::minutes(5),
    );
    let engine = engine_with(social);

    let first = engine
        .complete_task(55, "daily-cast-notch", serde_json::json!({ "source": "app" }))
        .await
        .unwrap();
    match &first {
        CompletionOutcome::Completed { points, score, .. } => {
            assert_eq!(*points, 25);
            assert_eq!(score.category_score(Category::Social), 25);
        }
        other => panic!("expected completion, got {other:?}"),
    }

    let second = engine
        .complete_task(55, "daily-cast-notch", serde_json::Value::Null)
        .await
        .unwrap();
    assert_eq!(second, CompletionOutcome::AlreadyCompleted);
    assert_eq!(engine.get_score(55).await.unwrap().total_score(), 25);

    let badges: Vec<_> = engine
        .badges(55)
        .await
        .unwrap()
        .into_iter()
        .map(|b| b.id)
        .collect();
    assert_eq!(badges, vec!["first-quest".to_string()]);

    let available: Vec<_> = engine
        .available_tasks(55)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert!(!available.contains(&"daily-cast-notch".to_string()));
}

#[tokio::test]
async fn concurrent_claims_pay_once() {
    let social = MockSocialProvider::new().with_post(
        9,
        "gm #notch builders everywhere",
        Utc::now() - Duration::minutes(1),
    );
    let engine = engine_with(social);

    let attempts = (0..10).map(|_| engine.complete_task(9, "daily-cast-notch", serde_json::Value::Null));
    let outcomes = futures::future::join_all(attempts).await;

    let completed = outcomes
        .iter()
        .filter(|o| matches!(o, Ok(CompletionOutcome::Completed { .. })))
        .count();
    assert_eq!(completed, 1);
    assert_eq!(engine.get_score(9).await.unwrap().total_score(), 25);
}

#[tokio::test]
async fn short_posts_do_not_verify() {
    let social = MockSocialProvider::new().with_post(3, "#notch", Utc::now());
    let engine = engine_with(social);

    let outcome = engine
        .complete_task(3, "daily-cast-notch", serde_json::Value::Null)
        .await
        .unwrap();
    assert_eq!(outcome, CompletionOutcome::VerificationFailed);
    assert!(engine.get_score(3).await.is_err());
}

#[tokio::test]
async fn expired_tasks_are_excluded() {
    let now = Utc::now();
    let registry = TaskRegistry::new();
    registry
        .register(TaskDefinition {
            id: "summer-cast".into(),
            title: "Summer cast".into(),
            description: "Cast about summer".into(),
            category: Category::Social,
            points: 20,
            schedule: TaskSchedule::Special,
            start_date: now - Duration::days(10),
            end_date: now - Duration::days(1),
            verification: VerificationConfig::Social(SocialRequirement {
                keywords: vec!["summer".into()],
                min_length: 1,
            }),
            active: true,
        })
        .await;

    let social = MockSocialProvider::new().with_post(4, "summer vibes", now);
    let engine = NotchEngine::builder(EngineConfig::default())
        .with_social(Arc::new(social))
        .with_chain(Arc::new(MockChainProvider::new("base")))
        .with_attestations(Arc::new(MockAttestationProvider::new()))
        .with_registry(registry)
        .build()
        .unwrap();

    assert!(engine.active_tasks().await.is_empty());
    let outcome = engine
        .complete_task(4, "summer-cast", serde_json::Value::Null)
        .await
        .unwrap();
    assert_eq!(outcome, CompletionOutcome::NotActive);

    assert!(matches!(
        engine
            .complete_task(4, "missing-task", serde_json::Value::Null)
            .await,
        Err(EngineError::TaskNotFound(_))
    ));
}

#[tokio::test]
async fn leaderboards_order_by_score() {
    let engine = engine();
    engine
        .award_points(1, PointsAward::new(Category::Social, 50, "publish"))
        .await
        .unwrap();
    engine
        .award_points(2, PointsAward::new(Category::Builder, 200, "deploy"))
        .await
        .unwrap();
    engine
        .award_points(3, PointsAward::new(Category::Social, 120, "publish"))
        .await
        .unwrap();

    let global = engine.leaderboard(None, 10).await.unwrap();
    let order: Vec<_> = global.iter().map(|e| (e.position, e.fid)).collect();
    assert_eq!(order, vec![(1, 2), (2, 3), (3, 1)]);
    assert_eq!(global[0].rank, Rank::Core);

    let social = engine.leaderboard(Some(Category::Social), 10).await.unwrap();
    assert_eq!(social[0].fid, 3);
    assert_eq!(social[0].score, 120);

    let top = engine.leaderboard(None, 1).await.unwrap();
    assert_eq!(top.len(), 1);

    let profile = engine.profile(1).await.unwrap();
    assert_eq!(profile.global_position, Some(3));
    assert_eq!(profile.category_positions.get(&Category::Social), Some(&2));
    assert_eq!(profile.total_users, 3);
}

#[tokio::test]
async fn badges_are_granted_once() {
    let engine = engine();
    for _ in 0..3 {
        engine
            .award_points(8, PointsAward::new(Category::Degen, 5, "swap"))
            .await
            .unwrap();
    }

    let badges = engine.badges(8).await.unwrap();
    assert_eq!(badges.len(), 1);
    assert_eq!(badges[0].id, "first-swap");
}

#[tokio::test]
async fn referral_task_needs_three_referrals() {
    let now = Utc::now();
    let registry = TaskRegistry::new();
    registry
        .register(TaskDefinition {
            id: "invite-friends".into(),
            title: "Invite Friends".into(),
            description: "Invite 3 friends".into(),
            category: Category::Player,
            points: 50,
            schedule: TaskSchedule::Special,
            start_date: now - Duration::days(1),
            end_date: now + Duration::days(30),
            verification: VerificationConfig::Referral(ReferralRequirement { min_referrals: 3 }),
            active: true,
        })
        .await;
    let engine = NotchEngine::builder(EngineConfig::default())
        .with_registry(registry)
        .build()
        .unwrap();

    engine.record_referral(10, 11).await.unwrap();
    engine.record_referral(10, 12).await.unwrap();
    assert_eq!(
        engine
            .complete_task(10, "invite-friends", serde_json::Value::Null)
            .await
            .unwrap(),
        CompletionOutcome::VerificationFailed
    );

    engine.record_referral(10, 13).await.unwrap();
    assert!(!engine.record_referral(99, 13).await.unwrap());
    assert_eq!(engine.referral_count(10).await.unwrap(), 3);

    let outcome = engine
        .complete_task(10, "invite-friends", serde_json::Value::Null)
        .await
        .unwrap();
    assert!(outcome.is_success());
    assert_eq!(
        engine.get_score(10).await.unwrap().category_score(Category::Player),
        50
    );
}

#[tokio::test]
async fn totals_always_match_categories() {
    let engine = engine();
    let awards = [
        (Category::Builder, 30),
        (Category::Social, 7),
        (Category::Degen, 64),
        (Category::Player, 15),
        (Category::Social, 99),
    ];
    for (category, points) in awards {
        engine
            .award_points(21, PointsAward::new(category, points, "manual"))
            .await
            .unwrap();
    }

    let score = engine.get_score(21).await.unwrap();
    let sum: u64 = score.category_scores().iter().map(|(_, p)| p).sum();
    assert_eq!(score.total_score(), sum);
    assert_eq!(score.total_score(), 215);
    assert_eq!(score.rank(), Rank::Core);
    score.check_invariants().unwrap();

    let profile = engine.profile(21).await.unwrap();
    assert_eq!(profile.recent_activity.len(), 5);
    assert_eq!(profile.primary_category, Category::Social);
}

//! Sync queue store behavior: coalescing, claiming, retry bookkeeping.

mod common;

use common::test_pool;
use shared::models::{EntityType, Operation, TaskPayload, TaskStatus};
use sync_server::db::repository::sync_queue;

fn deal_payload(order_id: i64) -> TaskPayload {
    TaskPayload::CreateDeal {
        order_id,
        title: format!("Order #{order_id}"),
        opportunity: 100.0,
        currency: "RUB".into(),
        comments: String::new(),
        contact_id: None,
    }
}

#[tokio::test]
async fn enqueue_coalesces_while_a_live_task_exists() {
    let pool = test_pool().await;
    let payload = deal_payload(1);

    let first = sync_queue::enqueue(&pool, EntityType::Deal, 1, Operation::Create, &payload)
        .await
        .unwrap();
    let second = sync_queue::enqueue(&pool, EntityType::Deal, 1, Operation::Create, &payload)
        .await
        .unwrap();
    assert!(first);
    assert!(!second);

    // Still coalesces while the task is processing
    let claimed = sync_queue::dequeue(&pool, 10).await.unwrap();
    assert_eq!(claimed.len(), 1);
    let third = sync_queue::enqueue(&pool, EntityType::Deal, 1, Operation::Create, &payload)
        .await
        .unwrap();
    assert!(!third);

    // A terminal row stops blocking
    sync_queue::complete(&pool, claimed[0].id).await.unwrap();
    let fourth = sync_queue::enqueue(&pool, EntityType::Deal, 1, Operation::Create, &payload)
        .await
        .unwrap();
    assert!(fourth);
}

#[tokio::test]
async fn different_operations_do_not_coalesce() {
    let pool = test_pool().await;
    let created = sync_queue::enqueue(&pool, EntityType::Deal, 1, Operation::Create, &deal_payload(1))
        .await
        .unwrap();
    let update_payload =
        TaskPayload::UpdateDeal { order_id: 1, opportunity: 200.0, comments: String::new() };
    let updated = sync_queue::enqueue(&pool, EntityType::Deal, 1, Operation::Update, &update_payload)
        .await
        .unwrap();
    assert!(created);
    assert!(updated);
}

#[tokio::test]
async fn dequeue_claims_oldest_first_and_marks_processing() {
    let pool = test_pool().await;
    for order_id in 1..=3 {
        sync_queue::enqueue(&pool, EntityType::Deal, order_id, Operation::Create, &deal_payload(order_id))
            .await
            .unwrap();
    }

    let claimed = sync_queue::dequeue(&pool, 2).await.unwrap();
    assert_eq!(claimed.len(), 2);
    assert!(claimed.iter().all(|t| t.status == TaskStatus::Processing));
    assert_eq!(claimed[0].entity_id, 1);
    assert_eq!(claimed[1].entity_id, 2);

    // The remaining pending task comes on the next claim
    let rest = sync_queue::dequeue(&pool, 10).await.unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].entity_id, 3);

    // Nothing pending anymore
    assert!(sync_queue::dequeue(&pool, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn fail_below_max_returns_to_pending_with_bookkeeping() {
    let pool = test_pool().await;
    sync_queue::enqueue(&pool, EntityType::Deal, 1, Operation::Create, &deal_payload(1))
        .await
        .unwrap();
    let task = sync_queue::dequeue(&pool, 1).await.unwrap().remove(0);

    let status = sync_queue::fail(&pool, task.id, "CRM request timed out", 3).await.unwrap();
    assert_eq!(status, TaskStatus::Pending);

    let task = sync_queue::find_by_id(&pool, task.id).await.unwrap();
    assert_eq!(task.attempts, 1);
    assert_eq!(task.error_message.as_deref(), Some("CRM request timed out"));
    assert!(task.last_attempt_at.is_some());
}

#[tokio::test]
async fn task_fails_terminally_after_max_attempts() {
    let pool = test_pool().await;
    sync_queue::enqueue(&pool, EntityType::Deal, 1, Operation::Create, &deal_payload(1))
        .await
        .unwrap();

    let mut final_status = TaskStatus::Pending;
    for _ in 0..3 {
        let task = sync_queue::dequeue(&pool, 1).await.unwrap().remove(0);
        final_status = sync_queue::fail(&pool, task.id, "transport error", 3).await.unwrap();
    }
    assert_eq!(final_status, TaskStatus::Failed);

    // Terminal tasks are never re-dispatched
    assert!(sync_queue::dequeue(&pool, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn reclaim_frees_a_claim_orphaned_by_a_crash() {
    let pool = test_pool().await;
    sync_queue::enqueue(&pool, EntityType::Deal, 1, Operation::Create, &deal_payload(1))
        .await
        .unwrap();
    let task = sync_queue::dequeue(&pool, 1).await.unwrap().remove(0);

    // Claimed but never settled: the key is wedged behind the live-task
    // index and no claim can pick the row up again.
    let re_enqueued =
        sync_queue::enqueue(&pool, EntityType::Deal, 1, Operation::Create, &deal_payload(1))
            .await
            .unwrap();
    assert!(!re_enqueued);
    assert!(sync_queue::dequeue(&pool, 10).await.unwrap().is_empty());

    assert_eq!(sync_queue::reclaim_processing(&pool).await.unwrap(), 1);

    // Back in rotation, same row, attempts untouched
    let reclaimed = sync_queue::dequeue(&pool, 10).await.unwrap();
    assert_eq!(reclaimed.len(), 1);
    assert_eq!(reclaimed[0].id, task.id);
    assert_eq!(reclaimed[0].attempts, 0);
}

#[tokio::test]
async fn reclaim_leaves_settled_rows_alone() {
    let pool = test_pool().await;
    sync_queue::enqueue(&pool, EntityType::Deal, 1, Operation::Create, &deal_payload(1))
        .await
        .unwrap();
    sync_queue::enqueue(&pool, EntityType::Deal, 2, Operation::Create, &deal_payload(2))
        .await
        .unwrap();
    let tasks = sync_queue::dequeue(&pool, 2).await.unwrap();
    sync_queue::complete(&pool, tasks[0].id).await.unwrap();
    let status = sync_queue::fail(&pool, tasks[1].id, "gone", 0).await.unwrap();
    assert_eq!(status, TaskStatus::Failed);

    assert_eq!(sync_queue::reclaim_processing(&pool).await.unwrap(), 0);
    assert!(sync_queue::dequeue(&pool, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn counts_group_by_status_and_entity_type() {
    let pool = test_pool().await;
    sync_queue::enqueue(&pool, EntityType::Deal, 1, Operation::Create, &deal_payload(1))
        .await
        .unwrap();
    sync_queue::enqueue(&pool, EntityType::Deal, 2, Operation::Create, &deal_payload(2))
        .await
        .unwrap();
    let contact_payload = TaskPayload::CreateContact {
        customer_id: 5,
        name: "Ivan".into(),
        email: "ivan@example.com".into(),
        phone: None,
        company: None,
        city: None,
    };
    sync_queue::enqueue(&pool, EntityType::Contact, 5, Operation::Create, &contact_payload)
        .await
        .unwrap();

    let task = sync_queue::dequeue(&pool, 1).await.unwrap().remove(0);
    sync_queue::complete(&pool, task.id).await.unwrap();

    let counts = sync_queue::counts(&pool).await.unwrap();
    assert_eq!(counts.total, 3);
    assert_eq!(counts.by_status.get("pending"), Some(&2));
    assert_eq!(counts.by_status.get("completed"), Some(&1));
    assert_eq!(counts.by_entity_type.get("deal"), Some(&2));
    assert_eq!(counts.by_entity_type.get("contact"), Some(&1));
}

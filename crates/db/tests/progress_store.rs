use std::sync::Arc;

use assert_matches::assert_matches;
use sqlx::PgPool;

use payout_core::onboarding::{PayoutStep, StepResult, COMPLETED_STEP};
use payout_core::workflow::{ProgressStore, StepOutcome, WorkflowController};
use payout_db::models::talent::UpsertTalent;
use payout_db::repositories::{TalentOnboardingRepo, TalentRepo};
use payout_db::PgProgressStore;

async fn seed_talent(pool: &PgPool, id: &str) {
    TalentRepo::upsert(
        pool,
        &UpsertTalent {
            id: id.to_string(),
            display_name: "Test Talent".to_string(),
            email: Some(format!("{id}@example.com")),
        },
    )
    .await
    .unwrap();
}

fn controller(pool: &PgPool) -> WorkflowController {
    WorkflowController::new(Arc::new(PgProgressStore::new(pool.clone())))
}

fn result_for(step: PayoutStep) -> StepResult {
    match step {
        PayoutStep::TaxInformation => StepResult::TaxInformation {
            document_id: "doc_1".into(),
        },
        PayoutStep::IdentityVerification => StepResult::IdentityVerification {
            session_id: "sess_1".into(),
        },
        PayoutStep::PaymentAccount => StepResult::PaymentAccount {
            moov_account_id: "acct_1".into(),
        },
        PayoutStep::BankLink => StepResult::BankLink {
            bank_account_id: "bank_1".into(),
        },
    }
}

/// Connect, migrate, and confirm the database answers.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_health_check(pool: PgPool) {
    payout_db::health_check(&pool).await.unwrap();
    PgProgressStore::new(pool).ping().await.unwrap();
}

/// The first read creates a not-started row; later reads return it as-is.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_first_read_creates_default_row(pool: PgPool) {
    seed_talent(&pool, "t1").await;
    assert!(TalentOnboardingRepo::find_by_talent(&pool, "t1").await.unwrap().is_none());

    let first = TalentOnboardingRepo::get_or_create(&pool, "t1").await.unwrap().unwrap();
    assert_eq!(first.current_step, 0);
    assert!(!first.completed);
    assert!(first.moov_account_id.is_none());

    let second = TalentOnboardingRepo::get_or_create(&pool, "t1").await.unwrap().unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.updated_at, first.updated_at);
}

/// Unknown talents have no progress and no row is created for them.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_unknown_talent_reads_none(pool: PgPool) {
    let store = PgProgressStore::new(pool.clone());
    assert!(store.load_or_init("ghost").await.unwrap().is_none());

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM talent_onboarding")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count.0, 0);
}

/// Walking every step persists the terminal flags and one history row per step.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_full_workflow_persists(pool: PgPool) {
    seed_talent(&pool, "t1").await;
    let controller = controller(&pool);

    controller.start_workflow("t1").await.unwrap();
    for step in PayoutStep::ALL {
        let outcome = controller
            .complete_step("t1", step, result_for(step))
            .await
            .unwrap();
        assert!(outcome.advanced(), "step {} should advance", step.to_number());
    }

    let row = TalentOnboardingRepo::find_by_talent(&pool, "t1").await.unwrap().unwrap();
    assert_eq!(row.current_step, COMPLETED_STEP);
    assert!(row.completed);
    assert!(row.bank_account_linked);
    assert!(row.completed_at.is_some());
    assert_eq!(row.moov_account_id.as_deref(), Some("acct_1"));

    let history = controller.history("t1").await.unwrap();
    let steps: Vec<_> = history.iter().map(|r| r.step).collect();
    assert_eq!(steps, PayoutStep::ALL.to_vec());
    assert_eq!(history[2].result, result_for(PayoutStep::PaymentAccount));
}

/// A second completion of the same step is ignored and writes no history.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_duplicate_completion_advances_once(pool: PgPool) {
    seed_talent(&pool, "t1").await;
    let controller = controller(&pool);
    controller.start_workflow("t1").await.unwrap();

    let tax = result_for(PayoutStep::TaxInformation);
    let first = controller
        .complete_step("t1", PayoutStep::TaxInformation, tax.clone())
        .await
        .unwrap();
    let second = controller
        .complete_step("t1", PayoutStep::TaxInformation, tax)
        .await
        .unwrap();

    assert!(first.advanced());
    assert_matches!(second, StepOutcome::Ignored { .. });
    assert_eq!(second.progress().current_step, 2);
    assert_eq!(controller.history("t1").await.unwrap().len(), 1);
}

/// A stale conditional write changes nothing.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_stale_advance_is_rejected(pool: PgPool) {
    seed_talent(&pool, "t1").await;
    let store = PgProgressStore::new(pool.clone());
    let controller = controller(&pool);
    controller.start_workflow("t1").await.unwrap();
    controller
        .complete_step("t1", PayoutStep::TaxInformation, result_for(PayoutStep::TaxInformation))
        .await
        .unwrap();

    // Another writer already moved the cursor from 1 to 2.
    let update = payout_core::onboarding::ProgressUpdate {
        step: PayoutStep::TaxInformation,
        next_step: 2,
        moov_account_id: None,
        completed: false,
        bank_account_linked: false,
        completed_at: None,
        result: result_for(PayoutStep::TaxInformation),
    };
    assert!(store.advance("t1", 1, &update).await.unwrap().is_none());
    assert_eq!(store.history("t1").await.unwrap().len(), 1);
}

/// Concurrent completions of the same step advance the cursor exactly once.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_concurrent_completions_advance_once(pool: PgPool) {
    seed_talent(&pool, "t1").await;
    let controller = controller(&pool);
    controller.start_workflow("t1").await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let controller = controller.clone();
        tasks.push(tokio::spawn(async move {
            controller
                .complete_step(
                    "t1",
                    PayoutStep::TaxInformation,
                    StepResult::TaxInformation {
                        document_id: "doc_1".into(),
                    },
                )
                .await
                .unwrap()
        }));
    }

    let mut advanced = 0;
    for task in tasks {
        if task.await.unwrap().advanced() {
            advanced += 1;
        }
    }
    assert_eq!(advanced, 1);
    assert_eq!(controller.load_progress("t1").await.unwrap().current_step, 2);
    assert_eq!(controller.history("t1").await.unwrap().len(), 1);
}

/// The schema refuses a completed row without its terminal fields.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_completion_constraint(pool: PgPool) {
    seed_talent(&pool, "t1").await;
    TalentOnboardingRepo::get_or_create(&pool, "t1").await.unwrap();

    let result = sqlx::query(
        "UPDATE talent_onboarding SET current_step = 5, completed = true WHERE talent_id = $1",
    )
    .bind("t1")
    .execute(&pool)
    .await;
    assert!(result.is_err(), "completed row without bank link must be rejected");
}

/// Upserting a talent twice keeps one row with the latest details.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_talent_upsert_updates_in_place(pool: PgPool) {
    seed_talent(&pool, "t9").await;
    TalentRepo::upsert(
        &pool,
        &UpsertTalent {
            id: "t9".to_string(),
            display_name: "Renamed".to_string(),
            email: None,
        },
    )
    .await
    .unwrap();

    let talent = TalentRepo::find_by_id(&pool, "t9").await.unwrap().unwrap();
    assert_eq!(talent.display_name, "Renamed");
    assert!(TalentRepo::find_by_id(&pool, "missing").await.unwrap().is_none());
}

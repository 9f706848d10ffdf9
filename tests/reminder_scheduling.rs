mod helpers;

use std::time::Duration;

use chrono::Utc;
use crm_ticketing_api::{
    execute, Application, CancelReminderUseCase, CreateReminderUseCase, SnoozeReminderUseCase,
};
use crm_ticketing_domain::{Reminder, ReminderStatus};
use helpers::{probe, setup_infra, ticket_details};

fn create_usecase(
    ticket_id: &str,
    user_id: &str,
    remind_time: chrono::DateTime<Utc>,
) -> CreateReminderUseCase {
    CreateReminderUseCase {
        ticket_id: ticket_id.to_string(),
        user_id: user_id.to_string(),
        remind_time,
        message: "follow up with the customer".into(),
        recipients: vec![],
        ticket: ticket_details(ticket_id),
    }
}

async fn stored_reminder(ctx: &crm_ticketing_infra::Context, key: &str) -> Reminder {
    let entry = ctx.kv.get(key).await.unwrap().expect("reminder record");
    serde_json::from_slice(&entry.value).unwrap()
}

#[tokio::test]
async fn created_reminder_fires_once_and_completes() {
    let infra = setup_infra();
    let ctx = infra.ctx.clone();
    let fired = probe(&ctx, "CRM_TICKETS", "crm.tickets.reminder.*", "fire_probe").await;

    let app = Application::new(ctx.clone()).await.unwrap();

    let remind_time = Utc::now() + chrono::Duration::milliseconds(300);
    let key = execute(create_usecase("T1", "U1", remind_time), &ctx)
        .await
        .unwrap();
    assert_eq!(key, "reminder_T1_U1");

    // Nothing may fire ahead of schedule
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(fired.lock().unwrap().is_empty());

    tokio::time::sleep(Duration::from_millis(800)).await;
    let fired = fired.lock().unwrap().clone();
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].subject, "crm.tickets.reminder.T1");

    let stored = stored_reminder(&ctx, &key).await;
    assert_eq!(stored.status, ReminderStatus::Completed);

    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn snooze_supersedes_the_original_fire_time() {
    let infra = setup_infra();
    let ctx = infra.ctx.clone();
    let fired = probe(&ctx, "CRM_TICKETS", "crm.tickets.reminder.*", "fire_probe").await;

    let app = Application::new(ctx.clone()).await.unwrap();

    let original = Utc::now() + chrono::Duration::milliseconds(300);
    let key = execute(create_usecase("T1", "U1", original), &ctx)
        .await
        .unwrap();

    // Snooze well before the original fire time
    let new_time = execute(
        SnoozeReminderUseCase {
            key: key.clone(),
            duration: chrono::Duration::milliseconds(500),
            scheduler: app.scheduler().clone(),
        },
        &ctx,
    )
    .await
    .unwrap();
    assert_eq!(new_time, original + chrono::Duration::milliseconds(500));

    // The original fire time passes without a fire
    tokio::time::sleep(Duration::from_millis(450)).await;
    assert!(fired.lock().unwrap().is_empty());

    // The snoozed time does fire, exactly once
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(fired.lock().unwrap().len(), 1);

    let stored = stored_reminder(&ctx, &key).await;
    assert_eq!(stored.status, ReminderStatus::Completed);

    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn canceled_reminder_never_fires() {
    let infra = setup_infra();
    let ctx = infra.ctx.clone();
    let fired = probe(&ctx, "CRM_TICKETS", "crm.tickets.reminder.*", "fire_probe").await;

    let app = Application::new(ctx.clone()).await.unwrap();

    let remind_time = Utc::now() + chrono::Duration::milliseconds(500);
    let key = execute(create_usecase("T1", "U1", remind_time), &ctx)
        .await
        .unwrap();

    execute(
        CancelReminderUseCase {
            key: key.clone(),
            scheduler: app.scheduler().clone(),
        },
        &ctx,
    )
    .await
    .unwrap();

    tokio::time::sleep(Duration::from_millis(900)).await;
    assert!(fired.lock().unwrap().is_empty());

    let stored = stored_reminder(&ctx, &key).await;
    assert_eq!(stored.status, ReminderStatus::Canceled);

    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn recovery_fires_missed_and_upcoming_reminders() {
    let infra = setup_infra();
    let ctx = infra.ctx.clone();
    let fired = probe(&ctx, "CRM_TICKETS", "crm.tickets.reminder.*", "fire_probe").await;

    // Reminders are persisted while no scheduler is running, as if the
    // process died right after accepting them
    let base = Utc::now();
    for (ticket, offset_ms) in [("T1", 200i64), ("T2", 700), ("T3", 1100)] {
        execute(
            create_usecase(ticket, "U1", base + chrono::Duration::milliseconds(offset_ms)),
            &ctx,
        )
        .await
        .unwrap();
    }

    // "Restart" well past the first fire time
    tokio::time::sleep(Duration::from_millis(400)).await;
    let app = Application::new(ctx.clone()).await.unwrap();

    // The past-due reminder fires immediately on recovery
    tokio::time::sleep(Duration::from_millis(150)).await;
    {
        let fired = fired.lock().unwrap();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].subject, "crm.tickets.reminder.T1");
    }

    // The remaining two fire at their scheduled times
    tokio::time::sleep(Duration::from_millis(1100)).await;
    let subjects: Vec<String> = fired
        .lock()
        .unwrap()
        .iter()
        .map(|m| m.subject.clone())
        .collect();
    assert_eq!(
        subjects,
        vec![
            "crm.tickets.reminder.T1".to_string(),
            "crm.tickets.reminder.T2".to_string(),
            "crm.tickets.reminder.T3".to_string(),
        ]
    );

    for ticket in ["T1", "T2", "T3"] {
        let stored = stored_reminder(&ctx, &format!("reminder_{}_U1", ticket)).await;
        assert_eq!(stored.status, ReminderStatus::Completed);
    }

    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn starting_twice_against_the_same_infra_is_idempotent() {
    let infra = setup_infra();
    let ctx = infra.ctx.clone();
    let fired = probe(&ctx, "CRM_TICKETS", "crm.tickets.reminder.*", "fire_probe").await;

    let first = Application::new(ctx.clone()).await.unwrap();
    let second = Application::new(ctx.clone()).await.unwrap();

    // Both processes race on the same record; CAS completion lets exactly
    // one of them fire it
    let remind_time = Utc::now() + chrono::Duration::milliseconds(200);
    let key = execute(create_usecase("T1", "U1", remind_time), &ctx)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(800)).await;
    assert_eq!(fired.lock().unwrap().len(), 1);

    let stored = stored_reminder(&ctx, &key).await;
    assert_eq!(stored.status, ReminderStatus::Completed);

    first.shutdown().await.unwrap();
    second.shutdown().await.unwrap();
}

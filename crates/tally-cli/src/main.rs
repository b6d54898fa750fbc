use std::sync::Arc;

use serde_json::json;
use tally_core::domain::{Collection, DeliveryResult, Document, PushBody};
use tally_core::impls::InMemoryStatusStore;
use tally_core::{JobStatusTracker, PushOptions, PushStatusTracker, TrackerConfig};
use tokio::time::{Duration, sleep};

fn object(value: serde_json::Value) -> Document {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Document::new(),
    }
}

/// ジョブ 1 件のライフサイクル：running -> message -> succeeded
async fn run_job(config: &TrackerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let job = JobStatusTracker::new(config);

    // await せずに投げても、ストアにはこの順で反映される
    let running = job.set_running("cleanup-sessions", json!({ "olderThanDays": 30 }));
    let progress = job.set_message(Some("scanned 1200 sessions"));
    running.await?;
    progress.await?;

    sleep(Duration::from_millis(50)).await;
    job.set_succeeded(Some("removed 87 sessions")).await?;

    // 終了済みのジョブは遷移しない
    let matched = job.set_failed(Some("late failure")).await?;
    tracing::info!(job_id = %job.id(), matched, "late failure after success");
    Ok(())
}

/// プッシュ 1 件のライフサイクル：pending -> running -> succeeded (2 回の集計)
async fn run_push(
    config: &TrackerConfig,
    store: &InMemoryStatusStore,
) -> Result<(), Box<dyn std::error::Error>> {
    for token in ["ios-1", "android-1", "android-stale"] {
        store
            .insert(Collection::Installation, object(json!({ "deviceToken": token })))
            .await;
    }

    let body = PushBody::new(object(json!({
        "alert": { "title": "Maintenance", "body": "Back online at 06:00" },
        "badge": 1
    })))
    .with_expiration_time(json!("2030-01-01T00:00:00.000Z"));
    let push = PushStatusTracker::new(body, config);
    tracing::info!(push_id = %push.id(), push_hash = push.push_hash(), "push created");

    push.set_initial(
        &json!({ "deviceType": { "$in": ["ios", "android"] } }),
        PushOptions::default().with_title("Maintenance"),
    )
    .await?;
    push.set_running(3).await?;

    // プロバイダごとに結果が届く想定。入れ子や壊れたエントリも混ざる
    let apns: Vec<DeliveryResult> = serde_json::from_value(json!([
        { "device": { "deviceType": "ios", "deviceToken": "ios-1" }, "transmitted": true },
        null
    ]))?;
    let fcm: Vec<DeliveryResult> = serde_json::from_value(json!([[
        { "device": { "deviceType": "android", "deviceToken": "android-1" }, "transmitted": true },
        {
            "device": { "deviceType": "android", "deviceToken": "android-stale" },
            "transmitted": false,
            "response": { "registration_id": "android-2", "error": "NotRegistered" }
        }
    ]]))?;

    push.complete(apns).await?;
    let counters = push.complete(fcm).await?;
    tracing::info!(
        push_id = %push.id(),
        sent = counters.num_sent,
        failed = counters.num_failed,
        "push finished"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tally_core::observability::init();

    let store = Arc::new(InMemoryStatusStore::new());
    let config = TrackerConfig::new(store.clone());

    run_job(&config).await?;
    run_push(&config, &store).await?;

    for collection in [Collection::JobStatus, Collection::PushStatus, Collection::Installation] {
        for record in store.snapshot(collection).await {
            println!("{collection}: {}", serde_json::Value::Object(record));
        }
    }
    Ok(())
}

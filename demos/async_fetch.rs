//! Last request wins: two overlapping fetches for the same path.

use eventstate::{AsyncStatus, EventStatePlus};
use serde_json::json;
use std::time::Duration;
use tokio::time::sleep;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let store = EventStatePlus::default();

    store.subscribe("user.status", |value, _| println!("user.status = {value}"))?;

    let slow = store.set_async("user", |token| async move {
        tokio::select! {
            _ = token.cancelled() => Err("request aborted"),
            _ = sleep(Duration::from_millis(500)) => Ok(json!({"name": "stale"})),
        }
    });
    let fast = store.set_async("user", |_token| async {
        sleep(Duration::from_millis(50)).await;
        Ok::<_, &str>(json!({"name": "Ann"}))
    });

    let (slow, fast) = tokio::join!(slow, fast);
    match slow {
        Err(e) if e.is_cancelled() => println!("first request superseded"),
        other => println!("first request: {other:?}"),
    }
    println!("second request: {}", fast?);

    assert_eq!(store.status("user")?, AsyncStatus::Success);
    println!("user.data = {}", store.get("user.data")?.unwrap_or_default());
    Ok(())
}

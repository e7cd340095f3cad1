mod support;

use serde_json::Value;
use support::{Client, TEST_GRACE, pairs_contain};

// One test per binary: a reset wipes the shared world for every client.
#[tokio::test]
async fn reset_destroys_everything_and_the_next_join_reseeds() {
    let mut pilot = Client::connect().await;
    let mut operator = Client::connect().await;
    pilot.join().await;
    operator.join().await;
    let tank_id = pilot.connid.clone();
    pilot.spawn_tank(100.0, 100.0).await;
    operator
        .next_matching("tankRoster", |data| pairs_contain(data, &tank_id))
        .await;
    pilot.move_tank(200.0, 200.0).await;
    operator.next_event("resourcePickedUp").await;

    operator.send("resetAll", Value::Null).await;

    for client in [&mut pilot, &mut operator] {
        let destroyed = client.next_event("tankDestroyed").await;
        assert_eq!(destroyed, tank_id.as_str());
        client.next_event("worldReset").await;
    }

    // Second reset has no tanks left to report.
    operator.send("resetAll", Value::Null).await;
    operator.next_event("worldReset").await;

    let snapshot = pilot.join().await;
    assert_eq!(snapshot["opponents"], Value::Array(Vec::new()));
    assert_eq!(snapshot["flying"], Value::Array(Vec::new()));
    let resources = snapshot["resource"].as_array().expect("resource list");
    assert_eq!(resources.len(), 5);
    assert_eq!(resources[0][1]["rounds"], 25);

    // A spawn followed at once by a reset never produces a roster.
    let new_tank = operator.connid.clone();
    operator.join().await;
    operator.spawn_tank(300.0, 500.0).await;
    operator.send("resetAll", Value::Null).await;
    operator.next_event("worldReset").await;
    pilot
        .expect_silence(
            "tankRoster",
            |data| pairs_contain(data, &new_tank),
            TEST_GRACE * 6,
        )
        .await;
}

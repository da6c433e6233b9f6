use async_trait::async_trait;
use safe_zones::core::api::{handle_api_event, ApiGatewayRequest};
use safe_zones::core::{GeoResolver, ProfileStore, ZoneStore};
use safe_zones::{
    LocalProfileStore, LocalZoneStore, PostalCode, Result, Status, SubscriptionDirectory, UserId,
    Zone, ZoneDescriptor, ZoneError,
};
use tempfile::TempDir;

struct OneZoneResolver;

#[async_trait]
impl GeoResolver for OneZoneResolver {
    async fn resolve(&self, _postal_code: &PostalCode) -> Result<ZoneDescriptor> {
        Ok(ZoneDescriptor {
            zone_id: "OHC049".to_string(),
            public_zone_id: "OHZ055".to_string(),
            fire_zone_id: "OHZ055".to_string(),
            name: "Franklin".to_string(),
            state: "OH".to_string(),
        })
    }
}

fn sample_zone() -> Zone {
    Zone::new(
        ZoneDescriptor {
            zone_id: "OHC049".to_string(),
            public_zone_id: "OHZ055".to_string(),
            fire_zone_id: String::new(),
            name: "Franklin".to_string(),
            state: "OH".to_string(),
        },
        PostalCode::parse("43215").unwrap(),
        UserId::new("u1").unwrap(),
    )
}

#[tokio::test]
async fn test_local_zone_store_round_trip_and_guards() {
    let temp_dir = TempDir::new().unwrap();
    let store = LocalZoneStore::new(temp_dir.path());

    assert!(store.list_zones().await.unwrap().is_empty());

    let version = store.put_zone(&sample_zone(), None).await.unwrap();
    assert!(temp_dir.path().join("zones").join("OHC049.json").exists());

    let found = store
        .find_zone_by_postal_code(&PostalCode::parse("43215").unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.record, sample_zone());
    assert_eq!(found.version, version);

    let again = store.put_zone(&sample_zone(), None).await;
    assert!(matches!(again, Err(ZoneError::WriteConflict { .. })));

    let mut updated = sample_zone();
    updated.subscribers.insert(UserId::new("u2").unwrap());
    store.put_zone(&updated, Some(&version)).await.unwrap();

    let stale = store.put_zone(&sample_zone(), Some(&version)).await;
    assert!(matches!(stale, Err(ZoneError::WriteConflict { .. })));

    let stored = store.find_zone_by_id("OHC049").await.unwrap().unwrap();
    assert_eq!(stored.record.subscribers.len(), 2);
}

#[tokio::test]
async fn test_corrupt_zone_file_is_storage_error() {
    let temp_dir = TempDir::new().unwrap();
    let zones_dir = temp_dir.path().join("zones");
    std::fs::create_dir_all(&zones_dir).unwrap();
    std::fs::write(
        zones_dir.join("OHC049.json"),
        r#"{"version": 1, "zone": {"zoneId": "OHC049", "postalCodes": [], "subscribers": []}}"#,
    )
    .unwrap();

    let store = LocalZoneStore::new(temp_dir.path());
    let err = store.list_zones().await.unwrap_err();
    assert_eq!(err.status(), Status::StorageError);
}

#[tokio::test]
async fn test_local_profile_store_reads_profile_layout() {
    let temp_dir = TempDir::new().unwrap();
    let profiles_dir = temp_dir.path().join("profiles");
    std::fs::create_dir_all(&profiles_dir).unwrap();
    std::fs::write(
        profiles_dir.join("jane@example.com.json"),
        serde_json::json!({
            "locations": [{"name": "home", "zip": "43215"}, {"name": "work", "zip": "43220"}],
            "alerts": [{"name": "storms", "location": "work", "channels": ["sms"]}]
        })
        .to_string(),
    )
    .unwrap();

    let store = LocalProfileStore::new(temp_dir.path());
    let profile = store
        .get_profile(&UserId::new("jane@example.com").unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(profile.locations.len(), 2);
    assert_eq!(profile.alerts[0].channels, vec!["sms".to_string()]);

    let missing = store.get_profile(&UserId::new("nobody").unwrap()).await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_gateway_events_against_local_directory() {
    let temp_dir = TempDir::new().unwrap();
    let profiles_dir = temp_dir.path().join("profiles");
    std::fs::create_dir_all(&profiles_dir).unwrap();
    std::fs::write(
        profiles_dir.join("u1.json"),
        serde_json::json!({
            "locations": [{"name": "home", "zip": "43215"}, {"name": "work", "zip": "43220"}],
            "alerts": [{"name": "storms", "location": "work", "channels": ["email"]}]
        })
        .to_string(),
    )
    .unwrap();

    let directory = SubscriptionDirectory::new(
        LocalZoneStore::new(temp_dir.path()),
        LocalProfileStore::new(temp_dir.path()),
        OneZoneResolver,
    );

    let send = |command: &str, zip: &str| {
        ApiGatewayRequest::from_query([("command", command), ("user", "u1"), ("zip", zip)])
    };
    let status_of = |body: &str| -> String {
        let body: serde_json::Value = serde_json::from_str(body).unwrap();
        body["status"].as_str().unwrap().to_string()
    };

    let created = handle_api_event(&directory, &send("create", "43215")).await;
    assert_eq!(created.status_code, 200);
    assert_eq!(status_of(&created.body), "Subscribed");

    let joined = handle_api_event(&directory, &send("create", "43220-0042")).await;
    assert_eq!(status_of(&joined.body), "Subscribed");

    let retained = handle_api_event(&directory, &send("remove", "43215")).await;
    assert_eq!(status_of(&retained.body), "RetainedMultiLocation");

    let removed = handle_api_event(&directory, &send("remove", "43220")).await;
    assert_eq!(status_of(&removed.body), "Unsubscribed");

    let rejected = handle_api_event(&directory, &send("create", "4321")).await;
    assert_eq!(rejected.status_code, 400);
    assert_eq!(status_of(&rejected.body), "InvalidPostalCode");

    let zones = directory.zones().await.unwrap();
    assert_eq!(zones.len(), 1);
    assert_eq!(zones[0].postal_codes.len(), 2);
    assert!(zones[0].subscribers.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_separate_stores_on_one_directory_admit_a_single_writer() {
    let temp_dir = TempDir::new().unwrap();
    let first = LocalZoneStore::new(temp_dir.path());
    let second = LocalZoneStore::new(temp_dir.path());

    let mut version = first.put_zone(&sample_zone(), None).await.unwrap();

    for round in 0..100 {
        let mut ours = sample_zone();
        ours.subscribers.insert(UserId::new(format!("first-{}", round)).unwrap());
        let mut theirs = sample_zone();
        theirs.subscribers.insert(UserId::new(format!("second-{}", round)).unwrap());

        let (store_a, store_b) = (first.clone(), second.clone());
        let (expected_a, expected_b) = (version.clone(), version.clone());
        let a = tokio::spawn(async move { store_a.put_zone(&ours, Some(&expected_a)).await });
        let b = tokio::spawn(async move { store_b.put_zone(&theirs, Some(&expected_b)).await });
        let results = [a.await.unwrap(), b.await.unwrap()];

        let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1, "round {} admitted {} writers", round, winners.len());
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(ZoneError::WriteConflict { .. }))));
        version = winners[0].clone();
    }

    let stored = second.find_zone_by_id("OHC049").await.unwrap().unwrap();
    assert_eq!(stored.version, version);
    assert_eq!(stored.version.as_str(), "101");

    let leftovers: Vec<_> = std::fs::read_dir(temp_dir.path().join("zones"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .filter(|name| name != "OHC049.json")
        .collect();
    assert!(leftovers.is_empty(), "unexpected files: {:?}", leftovers);
}

#[tokio::test]
async fn test_stale_lock_from_crashed_writer_is_reclaimed() {
    let temp_dir = TempDir::new().unwrap();
    let zones_dir = temp_dir.path().join("zones");
    std::fs::create_dir_all(&zones_dir).unwrap();
    let lock = std::fs::File::create(zones_dir.join("OHC049.lock")).unwrap();
    lock.set_modified(std::time::SystemTime::now() - std::time::Duration::from_secs(120))
        .unwrap();
    drop(lock);

    let store = LocalZoneStore::new(temp_dir.path());
    assert!(store.put_zone(&sample_zone(), None).await.is_ok());
    assert!(!zones_dir.join("OHC049.lock").exists());
}

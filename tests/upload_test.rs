//! Upload scenarios: successful creates, validation failures and rollback.

mod common;

use common::{get_json, upload, upload_ok, url, TestHarness, JPEG_BYTES};

#[tokio::test]
async fn upload_creates_row_and_servable_blob() {
    let (h, addr) = TestHarness::with_server().await;
    let client = reqwest::Client::new();

    let (status, body) = upload(
        &client,
        addr,
        Some("  Sunset  "),
        Some("beach, sunset,, vacation "),
        Some(JPEG_BYTES),
    )
    .await;
    assert_eq!(status, 201, "{body}");
    assert_eq!(body["name"], "Sunset");
    assert_eq!(body["tags"], serde_json::json!(["beach", "sunset", "vacation"]));
    assert!(body["id"].as_i64().unwrap() > 0);
    assert!(body["uploadTimestamp"].is_string());

    let locator = body["imageLocator"].as_str().unwrap();
    assert!(locator.starts_with("/uploads/"), "{locator}");
    assert!(locator.ends_with(".jpg"), "{locator}");
    assert_eq!(h.stored_files().len(), 1);

    let served = client.get(url(addr, locator)).send().await.unwrap();
    assert_eq!(served.status(), 200);
    assert_eq!(served.bytes().await.unwrap().as_ref(), JPEG_BYTES);

    let (_, listing) = get_json(&client, addr, "/api/photos").await;
    assert_eq!(listing["total"], 1);
    assert_eq!(listing["items"][0]["imageLocator"], locator);
}

#[tokio::test]
async fn two_megabyte_photo_is_accepted_and_listed_first() {
    let (h, addr) = TestHarness::with_server().await;
    let client = reqwest::Client::new();
    upload_ok(&client, addr, "Older").await;

    let jpeg = vec![0xFFu8; 2 * 1024 * 1024];
    let (status, body) = upload(
        &client,
        addr,
        Some("Sunset"),
        Some("beach, sky"),
        Some(jpeg.as_slice()),
    )
    .await;
    assert_eq!(status, 201, "{body}");
    assert_eq!(body["tags"], serde_json::json!(["beach", "sky"]));

    let stored = h
        .stored_files()
        .into_iter()
        .map(|p| std::fs::metadata(p).unwrap().len())
        .max()
        .unwrap();
    assert_eq!(stored, 2 * 1024 * 1024);

    let (status, listing) = get_json(&client, addr, "/api/photos?sort=date&order=desc").await;
    assert_eq!(status, 200);
    assert_eq!(listing["total"], 2);
    assert_eq!(listing["items"][0]["id"], body["id"]);
    assert_eq!(listing["items"][0]["name"], "Sunset");
}

#[tokio::test]
async fn missing_name_rejected_without_blob() {
    let (h, addr) = TestHarness::with_server().await;
    let client = reqwest::Client::new();

    let (status, body) = upload(&client, addr, None, Some("a"), Some(JPEG_BYTES)).await;
    assert_eq!(status, 400);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(h.stored_files().is_empty());
    assert_eq!(h.row_count(), 0);

    let (status, _) = upload(&client, addr, Some("   "), None, Some(JPEG_BYTES)).await;
    assert_eq!(status, 400);
    assert!(h.stored_files().is_empty());
}

#[tokio::test]
async fn name_length_boundary() {
    let (h, addr) = TestHarness::with_server().await;
    let client = reqwest::Client::new();

    let forty = "n".repeat(40);
    let (status, _) = upload(&client, addr, Some(forty.as_str()), None, Some(JPEG_BYTES)).await;
    assert_eq!(status, 201);

    let forty_one = "n".repeat(41);
    let (status, _) = upload(&client, addr, Some(forty_one.as_str()), None, Some(JPEG_BYTES)).await;
    assert_eq!(status, 400);

    assert_eq!(h.stored_files().len(), 1);
    assert_eq!(h.row_count(), 1);
}

#[tokio::test]
async fn missing_file_rejected() {
    let (h, addr) = TestHarness::with_server().await;
    let client = reqwest::Client::new();

    let (status, body) = upload(&client, addr, Some("No file"), None, None).await;
    assert_eq!(status, 400);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(h.row_count(), 0);
}

#[tokio::test]
async fn tags_are_capped_at_ten() {
    let (_h, addr) = TestHarness::with_server().await;
    let client = reqwest::Client::new();

    let tags: Vec<String> = (0..15).map(|i| format!("t{i}")).collect();
    let tags = tags.join(",");
    let (status, body) =
        upload(&client, addr, Some("Many tags"), Some(tags.as_str()), Some(JPEG_BYTES)).await;
    assert_eq!(status, 201);
    assert_eq!(body["tags"].as_array().unwrap().len(), 10);
    assert_eq!(body["tags"][9], "t9");
}

#[tokio::test]
async fn oversized_tags_rejected() {
    let (h, addr) = TestHarness::with_server().await;
    let client = reqwest::Client::new();

    let long_tag = "x".repeat(300);
    let (status, _) = upload(&client, addr, Some("Tagged"), Some(long_tag.as_str()), Some(JPEG_BYTES)).await;
    assert_eq!(status, 400);
    assert!(h.stored_files().is_empty());
}

#[tokio::test]
async fn oversized_upload_rejected_without_blob() {
    let h = TestHarness::with_config(|c| c.storage.max_upload_bytes = 1024).await;
    let addr = h.serve().await;
    let client = reqwest::Client::new();

    let big = vec![7u8; 4096];
    let (status, body) = upload(&client, addr, Some("Too big"), None, Some(big.as_slice())).await;
    assert_eq!(status, 413);
    assert_eq!(body["code"], "PAYLOAD_TOO_LARGE");
    assert!(h.stored_files().is_empty());
    assert_eq!(h.row_count(), 0);
}

#[tokio::test]
async fn non_multipart_body_rejected() {
    let (_h, addr) = TestHarness::with_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(url(addr, "/api/photos"))
        .json(&serde_json::json!({ "name": "json" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn unreachable_store_leaves_no_blob() {
    let h = TestHarness::unready().await;
    let addr = h.serve().await;
    let client = reqwest::Client::new();

    let (status, body) = upload(&client, addr, Some("Sunset"), None, Some(JPEG_BYTES)).await;
    assert_eq!(status, 500);
    assert!(body["message"].is_string());
    assert!(h.stored_files().is_empty());
}

#[tokio::test]
async fn ids_increase_across_uploads() {
    let (_h, addr) = TestHarness::with_server().await;
    let client = reqwest::Client::new();

    let first = common::upload_ok(&client, addr, "one").await;
    let second = common::upload_ok(&client, addr, "two").await;
    assert!(second > first);
}

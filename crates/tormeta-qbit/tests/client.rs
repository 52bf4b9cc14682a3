use std::time::Duration;

use anyhow::Result;
use httpmock::prelude::*;
use serde_json::json;
use tormeta_qbit::{QbitClient, QbitOptions};
use tormeta_torrent_core::{AddTransfer, InfoHash, TorrentError, TransferDaemon, TransferSource};

const HASH: &str = "abcdef0123456789abcdef0123456789abcdef01";

fn client_for(base_url: &str, add_poll_attempts: u32) -> Result<QbitClient> {
    Ok(QbitClient::new(QbitOptions {
        base_url: base_url.parse()?,
        username: "admin".into(),
        password: "adminadmin".into(),
        timeout: Duration::from_secs(2),
        add_poll_attempts,
        add_poll_delay: Duration::from_millis(5),
    })?)
}

fn mock_login(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(POST).path("/api/v2/auth/login");
        then.status(200)
            .header("set-cookie", "SID=session-1; HttpOnly; path=/")
            .body("Ok.");
    })
}

fn transfer_json(hash: &str, name: &str) -> serde_json::Value {
    json!({
        "hash": hash,
        "name": name,
        "progress": 0.5,
        "state": "downloading",
        "dlspeed": 1_024,
        "upspeed": 64,
        "eta": 120,
    })
}

#[tokio::test]
async fn list_logs_in_once_and_reuses_the_session() -> Result<()> {
    let server = MockServer::start_async().await;
    let login = mock_login(&server);
    let info = server.mock(|when, then| {
        when.method(GET)
            .path("/api/v2/torrents/info")
            .header("cookie", "SID=session-1");
        then.status(200)
            .json_body(json!([transfer_json(HASH, "Foo"), {"hash": HASH}]));
    });

    let client = client_for(&server.base_url(), 1)?;
    let first = client.list_transfers().await?;
    let second = client.list_transfers().await?;

    assert_eq!(first.len(), 1, "malformed entries are skipped");
    assert_eq!(first[0].hash.as_str(), HASH);
    assert_eq!(first[0].dlspeed, 1_024);
    assert_eq!(first, second);
    login.assert_calls(1);
    info.assert_calls(2);
    Ok(())
}

#[tokio::test]
async fn repeated_auth_failure_rebuilds_once_then_reports_unavailable() -> Result<()> {
    let server = MockServer::start_async().await;
    let login = mock_login(&server);
    let info = server.mock(|when, then| {
        when.method(GET).path("/api/v2/torrents/info");
        then.status(403).body("Forbidden");
    });

    let client = client_for(&server.base_url(), 1)?;
    let err = client.list_transfers().await.expect_err("403 twice must fail");

    assert!(matches!(
        err,
        TorrentError::DaemonUnavailable {
            operation: "qbit.list",
            ..
        }
    ));
    login.assert_calls(2);
    info.assert_calls(2);
    Ok(())
}

#[tokio::test]
async fn rejected_login_surfaces_unavailable() -> Result<()> {
    let server = MockServer::start_async().await;
    let login = server.mock(|when, then| {
        when.method(POST).path("/api/v2/auth/login");
        then.status(200).body("Fails.");
    });

    let client = client_for(&server.base_url(), 1)?;
    let err = client.list_transfers().await.expect_err("login rejected");
    assert!(err.is_daemon());
    login.assert_calls(2);
    Ok(())
}

#[tokio::test]
async fn unreachable_daemon_is_unavailable() -> Result<()> {
    let client = client_for("http://127.0.0.1:9", 1)?;
    let err = client.list_transfers().await.expect_err("nothing listens");
    assert!(matches!(err, TorrentError::DaemonUnavailable { .. }));
    Ok(())
}

#[tokio::test]
async fn magnet_add_returns_parsed_hash_without_lookup() -> Result<()> {
    let server = MockServer::start_async().await;
    mock_login(&server);
    let add = server.mock(|when, then| {
        when.method(POST).path("/api/v2/torrents/add");
        then.status(200).body("Ok.");
    });
    let info = server.mock(|when, then| {
        when.method(GET).path("/api/v2/torrents/info");
        then.status(200).json_body(json!([]));
    });

    let client = client_for(&server.base_url(), 3)?;
    let hash = client
        .add_transfer(AddTransfer {
            source: TransferSource::Magnet(format!(
                "magnet:?xt=urn:btih:{}&dn=Foo",
                HASH.to_ascii_uppercase()
            )),
            known_hash: None,
            save_path: Some("/downloads".into()),
            tags: vec!["movie".into()],
            category: Some("movie".into()),
        })
        .await?;

    assert_eq!(hash.as_ref().map(InfoHash::as_str), Some(HASH));
    add.assert_calls(1);
    info.assert_calls(0);
    Ok(())
}

#[tokio::test]
async fn refused_add_is_a_rejection_not_a_hash() -> Result<()> {
    let server = MockServer::start_async().await;
    mock_login(&server);
    let add = server.mock(|when, then| {
        when.method(POST).path("/api/v2/torrents/add");
        then.status(200).body("Fails.");
    });

    let client = client_for(&server.base_url(), 1)?;
    let err = client
        .add_transfer(AddTransfer {
            source: TransferSource::Magnet(format!("magnet:?xt=urn:btih:{HASH}&dn=Foo")),
            known_hash: None,
            save_path: None,
            tags: Vec::new(),
            category: None,
        })
        .await
        .expect_err("daemon refused the transfer");

    assert!(matches!(
        err,
        TorrentError::DaemonRejected {
            operation: "qbit.add",
            ..
        }
    ));
    add.assert_calls(1);
    Ok(())
}

#[tokio::test]
async fn v2_magnet_add_returns_the_daemon_transfer_id() -> Result<()> {
    let server = MockServer::start_async().await;
    mock_login(&server);
    server.mock(|when, then| {
        when.method(POST).path("/api/v2/torrents/add");
        then.status(200).body("Ok.");
    });

    let v2 = format!("{HASH}{}", "c".repeat(24));
    let client = client_for(&server.base_url(), 1)?;
    let hash = client
        .add_transfer(AddTransfer {
            source: TransferSource::Magnet(format!("magnet:?xt=urn:btmh:1220{v2}")),
            known_hash: None,
            save_path: None,
            tags: Vec::new(),
            category: None,
        })
        .await?;

    assert_eq!(hash.as_ref().map(InfoHash::as_str), Some(HASH));
    Ok(())
}

#[tokio::test]
async fn file_add_polls_until_the_hash_is_visible() -> Result<()> {
    let server = MockServer::start_async().await;
    mock_login(&server);
    server.mock(|when, then| {
        when.method(POST).path("/api/v2/torrents/add");
        then.status(200).body("Ok.");
    });
    let lookup = server.mock(|when, then| {
        when.method(GET)
            .path("/api/v2/torrents/info")
            .query_param("hashes", HASH);
        then.status(200).json_body(json!([]));
    });

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("foo.torrent");
    std::fs::write(&path, b"d4:infod4:name3:fooee")?;

    let client = client_for(&server.base_url(), 3)?;
    let resolved = client
        .add_transfer(AddTransfer {
            source: TransferSource::File(path),
            known_hash: Some(InfoHash::parse(HASH)?),
            save_path: None,
            tags: Vec::new(),
            category: None,
        })
        .await?;

    assert!(resolved.is_none(), "unresolved after the poll budget");
    lookup.assert_calls(3);
    Ok(())
}

#[tokio::test]
async fn url_add_returns_known_hash_only() -> Result<()> {
    let server = MockServer::start_async().await;
    mock_login(&server);
    server.mock(|when, then| {
        when.method(POST).path("/api/v2/torrents/add");
        then.status(200).body("Ok.");
    });

    let client = client_for(&server.base_url(), 1)?;
    let request = AddTransfer {
        source: TransferSource::Url("https://tracker.example/foo.torrent".into()),
        known_hash: None,
        save_path: None,
        tags: Vec::new(),
        category: None,
    };
    assert!(client.add_transfer(request.clone()).await?.is_none());

    let known = InfoHash::parse(HASH)?;
    let with_hash = AddTransfer {
        known_hash: Some(known.clone()),
        ..request
    };
    assert_eq!(client.add_transfer(with_hash).await?, Some(known));
    Ok(())
}

#[tokio::test]
async fn pause_falls_back_to_stop_on_newer_daemons() -> Result<()> {
    let server = MockServer::start_async().await;
    mock_login(&server);
    let pause = server.mock(|when, then| {
        when.method(POST).path("/api/v2/torrents/pause");
        then.status(404);
    });
    let stop = server.mock(|when, then| {
        when.method(POST).path("/api/v2/torrents/stop");
        then.status(200);
    });

    let client = client_for(&server.base_url(), 1)?;
    client.pause(&InfoHash::parse(HASH)?).await?;
    pause.assert_calls(1);
    stop.assert_calls(1);
    Ok(())
}

#[tokio::test]
async fn delete_failure_is_reported_as_rejection() -> Result<()> {
    let server = MockServer::start_async().await;
    mock_login(&server);
    server.mock(|when, then| {
        when.method(POST).path("/api/v2/torrents/delete");
        then.status(500);
    });

    let client = client_for(&server.base_url(), 1)?;
    let err = client
        .remove(&InfoHash::parse(HASH)?, true)
        .await
        .expect_err("daemon error");
    assert!(matches!(
        err,
        TorrentError::DaemonRejected {
            operation: "qbit.delete",
            status: 500
        }
    ));
    Ok(())
}

#[tokio::test]
async fn set_tags_replaces_daemon_tags() -> Result<()> {
    let server = MockServer::start_async().await;
    mock_login(&server);
    let remove = server.mock(|when, then| {
        when.method(POST).path("/api/v2/torrents/removeTags");
        then.status(200);
    });
    let create = server.mock(|when, then| {
        when.method(POST).path("/api/v2/torrents/createTags");
        then.status(200);
    });
    let add = server.mock(|when, then| {
        when.method(POST).path("/api/v2/torrents/addTags");
        then.status(200);
    });

    let client = client_for(&server.base_url(), 1)?;
    let hash = InfoHash::parse(HASH)?;
    client
        .set_tags(&hash, &["movie".to_string(), "4k".to_string()])
        .await?;
    client.set_tags(&hash, &[]).await?;

    remove.assert_calls(2);
    create.assert_calls(1);
    add.assert_calls(1);
    Ok(())
}

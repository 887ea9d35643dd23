use std::time::Duration;

use httpmock::prelude::*;
use reqwest::Client;
use siphon_config::SpeedTestSettings;
use siphon_probe::{Media, MediaSourceSpeedTester, ResourceLocation, SourceTier};

const SEGMENT: u64 = 64 * 1024;

fn settings(timeout: Duration) -> SpeedTestSettings {
    SpeedTestSettings {
        enabled: true,
        timeout,
        segment_size: SEGMENT,
    }
}

fn streaming(media_id: &str, source_id: &str, uri: String) -> Media {
    Media::new(
        media_id,
        source_id,
        ResourceLocation::HttpStreamingFile { uri },
    )
}

#[tokio::test]
async fn slow_source_times_out_and_gets_no_tier() -> anyhow::Result<()> {
    let fast = MockServer::start_async().await;
    let served = fast.mock(|when, then| {
        when.method(GET)
            .path("/episode.mp4")
            .header("range", "bytes=0-65535");
        then.status(206)
            .delay(Duration::from_millis(200))
            .body(vec![7u8; 64 * 1024]);
    });
    let slow = MockServer::start_async().await;
    slow.mock(|when, then| {
        when.method(GET).path("/episode.mp4");
        then.status(206)
            .delay(Duration::from_secs(5))
            .body(vec![7u8; 64 * 1024]);
    });

    let tester = MediaSourceSpeedTester::new(Client::new());
    let media = [
        streaming("a-1", "a", fast.url("/episode.mp4")),
        streaming("b-1", "b", slow.url("/episode.mp4")),
    ];
    let report = tester
        .test_and_rank(&media, &settings(Duration::from_secs(2)))
        .await;

    served.assert();
    assert_eq!(report.results.len(), 1);
    let a = &report.results[0];
    assert_eq!(a.source_id, "a");
    assert!(a.success);
    assert!(a.latency_ms >= 200);
    assert!(a.bytes_per_second > 0);
    assert!(a.bytes_per_second <= SEGMENT * 1000 / 200);
    assert_eq!(report.tiers.get("a"), Some(&SourceTier(0)));
    assert!(!report.tiers.contains_key("b"));
    Ok(())
}

#[tokio::test]
async fn results_are_ordered_fastest_first() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    for (path, delay) in [("/slow", 300), ("/fast", 20), ("/medium", 120)] {
        server.mock(move |when, then| {
            when.method(GET).path(path);
            then.status(200)
                .delay(Duration::from_millis(delay))
                .body(vec![1u8; 64 * 1024]);
        });
    }

    let tester = MediaSourceSpeedTester::new(Client::new());
    let media = [
        streaming("s", "slow", server.url("/slow")),
        streaming("f", "fast", server.url("/fast")),
        streaming("m", "medium", server.url("/medium")),
    ];
    let report = tester
        .test_and_rank(&media, &settings(Duration::from_secs(2)))
        .await;

    let order: Vec<&str> = report
        .results
        .iter()
        .map(|result| result.source_id.as_str())
        .collect();
    assert_eq!(order, ["fast", "medium", "slow"]);
    assert!(
        report
            .results
            .windows(2)
            .all(|pair| pair[0].bytes_per_second >= pair[1].bytes_per_second)
    );
    assert_eq!(report.tiers.get("fast"), Some(&SourceTier(0)));
    assert_eq!(report.tiers.get("slow"), Some(&SourceTier(2)));
    Ok(())
}

#[tokio::test]
async fn magnet_and_local_candidates_are_never_probed() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let web = server.mock(|when, then| {
        when.method(GET).path("/watch");
        then.status(200).body("<html>player</html>");
    });

    let tester = MediaSourceSpeedTester::new(Client::new());
    let media = [
        Media::new(
            "m-1",
            "magnets",
            ResourceLocation::MagnetLink {
                uri: "magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef01234567".into(),
            },
        ),
        Media::new(
            "l-1",
            "disk",
            ResourceLocation::LocalFile {
                path: "/media/episode.mkv".into(),
            },
        ),
        Media::new(
            "w-1",
            "web",
            ResourceLocation::WebVideo {
                uri: server.url("/watch"),
            },
        ),
    ];
    let results = tester
        .test_sources(&media, &settings(Duration::from_secs(2)))
        .await;

    web.assert();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].source_id, "web");
    Ok(())
}

#[tokio::test]
async fn only_first_candidate_per_source_is_probed() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let first = server.mock(|when, then| {
        when.method(GET).path("/first");
        then.status(200)
            .delay(Duration::from_millis(100))
            .body(vec![1u8; 1024]);
    });

    let tester = MediaSourceSpeedTester::new(Client::new());
    let media = [
        streaming("one", "src", server.url("/first")),
        streaming("two", "src", server.url("/second")),
    ];
    let results = tester
        .test_sources(&media, &settings(Duration::from_secs(2)))
        .await;

    first.assert();
    assert_eq!(results.len(), 1);
    assert!(results[0].latency_ms >= 100);
    Ok(())
}

#[tokio::test]
async fn error_status_and_empty_body_count_as_failures() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET).path("/missing");
        then.status(404).body("not found");
    });
    server.mock(|when, then| {
        when.method(GET).path("/empty");
        then.status(200);
    });

    let tester = MediaSourceSpeedTester::new(Client::new());
    let media = [
        streaming("x", "missing", server.url("/missing")),
        streaming("y", "empty", server.url("/empty")),
    ];
    let results = tester
        .test_sources(&media, &settings(Duration::from_secs(2)))
        .await;

    assert!(results.is_empty());
    Ok(())
}

#[tokio::test]
async fn oversized_body_is_capped_at_segment_size() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET).path("/ignores-range");
        then.status(200)
            .delay(Duration::from_millis(50))
            .body(vec![0u8; 512 * 1024]);
    });

    let tester = MediaSourceSpeedTester::new(Client::new());
    let result = tester
        .probe(
            &streaming("z", "big", server.url("/ignores-range")),
            &settings(Duration::from_secs(2)),
        )
        .await;

    assert!(result.success);
    assert!(result.bytes_per_second <= SEGMENT * 1000 / 50);
    Ok(())
}

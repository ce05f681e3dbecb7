use approx::assert_relative_eq;
use prometheus_trajectory::config::{Framing, MalformedPolicy, ServiceConfig};
use prometheus_trajectory::server::{ServeSummary, StopReason};
use prometheus_trajectory::{
    sampler_from_config, MotionLimits, Pose, Position, ProtocolError, ServerError, TrajectoryClient,
    TrajectoryReply, TrajectoryRequest, TrajectoryServer,
};
use std::net::SocketAddr;
use tokio::task::JoinHandle;

async fn start(mut config: ServiceConfig) -> (SocketAddr, JoinHandle<Result<ServeSummary, ServerError>>) {
    config.server.port = 0;
    config.validate().unwrap();
    let sampler = sampler_from_config(&config).unwrap();
    let server = TrajectoryServer::bind(&config.server, sampler).await.unwrap();
    let addr = server.local_addr().unwrap();
    (addr, tokio::spawn(server.serve()))
}

fn straight_request() -> TrajectoryRequest {
    TrajectoryRequest::new(Pose::new(0.0, 0.0, 0.0), vec![], Pose::new(5.0, 0.0, 0.0))
}

#[tokio::test]
async fn straight_line_request_reaches_the_goal() {
    let (addr, _server) = start(ServiceConfig::default()).await;
    let mut client = TrajectoryClient::connect(addr, Framing::Chunk).await.unwrap();

    let samples = client.sample(&straight_request()).await.unwrap();

    assert_eq!(samples.len(), 101);
    let first = samples.first().unwrap();
    let last = samples.last().unwrap();
    assert_relative_eq!(first.x, 0.0, epsilon = 1e-9);
    assert_relative_eq!(first.y, 0.0, epsilon = 1e-9);
    assert_relative_eq!(last.x, 5.0, epsilon = 1e-6);
    assert_relative_eq!(last.y, 0.0, epsilon = 1e-6);
    for pair in samples.positions().windows(2) {
        assert!(pair[1].x >= pair[0].x - 1e-9);
        assert_relative_eq!(pair[1].y, 0.0, epsilon = 1e-9);
    }
}

#[tokio::test]
async fn repeated_requests_get_identical_answers() {
    let (addr, _server) = start(ServiceConfig::default()).await;
    let mut client = TrajectoryClient::connect(addr, Framing::Chunk).await.unwrap();

    let request = TrajectoryRequest::new(
        Pose::new(0.5, 0.5, 0.0),
        vec![Position::new(2.0, 3.0), Position::new(4.0, 1.0)],
        Pose::new(6.0, 2.0, 1.0),
    );
    let first = client.sample(&request).await.unwrap();
    let second = client.sample(&request).await.unwrap();

    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[tokio::test]
async fn waypoints_are_followed_in_order() {
    let (addr, _server) = start(ServiceConfig::default()).await;
    let mut client = TrajectoryClient::connect(addr, Framing::Chunk).await.unwrap();

    let request = TrajectoryRequest::new(
        Pose::new(0.0, 0.0, 0.0),
        vec![Position::new(1.0, 1.0), Position::new(2.0, 2.0)],
        Pose::new(3.0, 0.0, 0.0),
    );
    let samples = client.sample(&request).await.unwrap();
    assert_eq!(samples.len(), 101);

    let first = samples.first().unwrap();
    let last = samples.last().unwrap();
    assert_relative_eq!(first.distance_to(&Position::new(0.0, 0.0)), 0.0, epsilon = 1e-9);
    assert_relative_eq!(last.distance_to(&Position::new(3.0, 0.0)), 0.0, epsilon = 1e-6);

    // Continuity: no jump larger than the velocity limit allows in one step
    let max_step = samples
        .positions()
        .windows(2)
        .map(|pair| pair[0].distance_to(&pair[1]))
        .fold(0.0, f64::max);
    assert!(max_step < 0.5, "largest step was {}", max_step);

    // The path passes near (2, 2) after (1, 1)
    let closest = |target: Position| {
        samples
            .iter()
            .enumerate()
            .min_by(|a, b| {
                a.1.distance_to(&target)
                    .partial_cmp(&b.1.distance_to(&target))
                    .unwrap()
            })
            .map(|(i, p)| (i, p.distance_to(&target)))
            .unwrap()
    };
    let (i1, d1) = closest(Position::new(1.0, 1.0));
    let (i2, d2) = closest(Position::new(2.0, 2.0));
    assert!(i1 < i2);
    assert!(d1 < 0.1 && d2 < 0.1);
}

#[tokio::test]
async fn planning_failure_answers_empty_and_keeps_the_session() {
    let (addr, _server) = start(ServiceConfig::default()).await;
    let mut client = TrajectoryClient::connect(addr, Framing::Chunk).await.unwrap();

    let degenerate = TrajectoryRequest::new(Pose::new(1.0, 1.0, 0.0), vec![], Pose::new(1.0, 1.0, 2.0));
    assert!(client.sample(&degenerate).await.unwrap().is_empty());

    assert_eq!(client.sample(&straight_request()).await.unwrap().len(), 101);
}

#[tokio::test]
async fn zero_limit_profile_answers_empty() {
    let mut config = ServiceConfig::default();
    config
        .planner
        .profiles
        .insert("parked".to_string(), MotionLimits::new(0.0, 0.0));
    config.planner.profile = "parked".to_string();
    let (addr, _server) = start(config).await;
    let mut client = TrajectoryClient::connect(addr, Framing::Chunk).await.unwrap();

    assert!(client.sample(&straight_request()).await.unwrap().is_empty());
}

#[tokio::test]
async fn malformed_request_is_rejected_without_closing() {
    let (addr, _server) = start(ServiceConfig::default()).await;
    let mut client = TrajectoryClient::connect(addr, Framing::Chunk).await.unwrap();

    client.send_raw(br#"{"start": "not-a-pose"}"#).await.unwrap();
    match client.read_reply().await.unwrap() {
        TrajectoryReply::Rejected(body) => assert_eq!(body.error, "malformed_request"),
        other => panic!("expected a rejection, got {:?}", other),
    }

    assert!(!client.sample(&straight_request()).await.unwrap().is_empty());
}

#[tokio::test]
async fn single_session_limit_stops_the_listener() {
    let mut config = ServiceConfig::default();
    config.server.max_sessions = Some(1);
    let (addr, server) = start(config).await;

    let mut client = TrajectoryClient::connect(addr, Framing::Chunk).await.unwrap();
    client.sample(&straight_request()).await.unwrap();
    client.sample(&straight_request()).await.unwrap();
    client.close().await.unwrap();

    let summary = server.await.unwrap().unwrap();
    assert_eq!(summary.sessions, 1);
    assert_eq!(summary.requests, 2);
    assert_eq!(summary.stop_reason, StopReason::SessionLimit);

    // The listening socket has been released
    assert!(TrajectoryClient::connect(addr, Framing::Chunk).await.is_err());
}

#[tokio::test]
async fn sessions_are_served_one_after_another() {
    let mut config = ServiceConfig::default();
    config.server.max_sessions = Some(2);
    let (addr, server) = start(config).await;

    for _ in 0..2 {
        let mut client = TrajectoryClient::connect(addr, Framing::Chunk).await.unwrap();
        assert_eq!(client.sample(&straight_request()).await.unwrap().len(), 101);
        client.close().await.unwrap();
    }

    let summary = server.await.unwrap().unwrap();
    assert_eq!(summary.sessions, 2);
    assert_eq!(summary.failed_sessions, 0);
}

#[tokio::test]
async fn line_framing_round_trip() {
    let mut config = ServiceConfig::default();
    config.server.framing = Framing::Lines;
    config.planner.sample_count = 10;
    let (addr, _server) = start(config).await;
    let mut client = TrajectoryClient::connect(addr, Framing::Lines).await.unwrap();

    let samples = client.sample(&straight_request()).await.unwrap();
    assert_eq!(samples.len(), 11);

    client.send_raw(b"[1, 2").await.unwrap();
    assert!(matches!(
        client.read_reply().await,
        Ok(TrajectoryReply::Rejected(_))
    ));

    assert_eq!(client.sample(&straight_request()).await.unwrap().len(), 11);
}

#[tokio::test]
async fn client_reports_a_closed_server() {
    let mut config = ServiceConfig::default();
    config.server.max_sessions = Some(1);
    config.server.malformed_requests = MalformedPolicy::Close;
    let (addr, server) = start(config).await;

    let mut client = TrajectoryClient::connect(addr, Framing::Chunk).await.unwrap();
    client.send_raw(b"garbage").await.unwrap();
    let err = client.read_reply().await.unwrap_err();
    assert!(matches!(err, ProtocolError::UnexpectedEof | ProtocolError::Io(_)));

    let summary = server.await.unwrap().unwrap();
    assert_eq!(summary.failed_sessions, 1);
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protocol unit tests

use super::*;
use std::time::Duration;
use wid_core::test_support::{file_changed, patch_plan};
use wid_core::{Event, ObservationCategory};

#[test]
fn encode_decode_event_request() {
    let request = Request::Event {
        project_id: ProjectId::new("p1"),
        event: file_changed("src/main.ts", "let x = 1;"),
    };

    let encoded = encode(&request).expect("encode failed");
    let decoded: Request = decode(&encoded).expect("decode failed");

    assert_eq!(request, decoded);
}

#[test]
fn event_request_nests_tagged_event() {
    let request = Request::Event {
        project_id: ProjectId::new("p1"),
        event: Event::BuildSucceeded,
    };

    let json: serde_json::Value = serde_json::from_slice(&encode(&request).unwrap()).unwrap();

    assert_eq!(json["type"], "Event");
    assert_eq!(json["project_id"], "p1");
    assert_eq!(json["event"]["type"], "build:succeeded");
}

#[test]
fn unknown_event_tag_decodes_to_custom() {
    let raw = br#"{"type":"Event","project_id":"p1","event":{"type":"git:pushed","branch":"main"}}"#;

    let decoded: Request = decode(raw).unwrap();

    assert_eq!(
        decoded,
        Request::Event {
            project_id: ProjectId::new("p1"),
            event: Event::Custom,
        }
    );
}

#[test]
fn observations_query_defaults_limit() {
    let raw = br#"{"type":"Query","project_id":"p1","query":{"type":"Observations"}}"#;

    let decoded: Request = decode(raw).unwrap();

    assert_eq!(
        decoded,
        Request::Query {
            project_id: ProjectId::new("p1"),
            query: Query::Observations {
                limit: DEFAULT_OBSERVATION_LIMIT
            },
        }
    );
}

#[test]
fn register_plan_request_carries_steps() {
    let request = Request::RegisterPlan {
        project_id: ProjectId::new("p1"),
        plan: patch_plan("plan-1", &["a.ts", "b.ts"]),
    };

    let decoded: Request = decode(&encode(&request).unwrap()).unwrap();

    match decoded {
        Request::RegisterPlan { plan, .. } => assert_eq!(plan.steps.len(), 2),
        other => panic!("unexpected request: {other:?}"),
    }
}

#[test]
fn observations_response_uses_snake_case_categories() {
    let response = Response::Observations {
        observations: vec![Observation::new(
            "obs-p1-1",
            1_000,
            ObservationCategory::BuildFailure,
            "Build failed 3 times in the last minute",
            0.8,
        )],
    };

    let json: serde_json::Value = serde_json::from_slice(&encode(&response).unwrap()).unwrap();

    assert_eq!(json["type"], "Observations");
    assert_eq!(json["observations"][0]["category"], "build_failure");
}

#[test]
fn encode_returns_json_without_length_prefix() {
    let encoded = encode(&Response::Ok).expect("encode failed");

    let json_str = std::str::from_utf8(&encoded).expect("should be valid UTF-8");
    assert_eq!(json_str, r#"{"type":"Ok"}"#);
}

#[tokio::test]
async fn request_and_response_survive_framing() {
    let (mut client, mut server) = tokio::io::duplex(1024);

    write_request(&mut client, &Request::Ping, DEFAULT_TIMEOUT)
        .await
        .unwrap();
    let request = read_request(&mut server, DEFAULT_TIMEOUT).await.unwrap();
    assert_eq!(request, Request::Ping);

    write_response(&mut server, &Response::Pong, DEFAULT_TIMEOUT)
        .await
        .unwrap();
    let response = read_response(&mut client, DEFAULT_TIMEOUT).await.unwrap();
    assert_eq!(response, Response::Pong);
}

#[tokio::test]
async fn frame_has_big_endian_length_prefix() {
    let mut buf = Vec::new();
    write_message(&mut buf, b"{}").await.unwrap();

    assert_eq!(buf, vec![0, 0, 0, 2, b'{', b'}']);
}

#[tokio::test]
async fn eof_before_prefix_is_connection_closed() {
    let mut empty: &[u8] = &[];

    let err = read_message(&mut empty).await.unwrap_err();

    assert!(matches!(err, ProtocolError::ConnectionClosed));
}

#[tokio::test]
async fn oversized_prefix_is_rejected_before_reading_payload() {
    let len = (MAX_MESSAGE_SIZE as u32) + 1;
    let prefix = len.to_be_bytes();
    let mut reader: &[u8] = &prefix;

    let err = read_message(&mut reader).await.unwrap_err();

    assert!(matches!(
        err,
        ProtocolError::MessageTooLarge { size, max } if size == MAX_MESSAGE_SIZE + 1 && max == MAX_MESSAGE_SIZE
    ));
}

#[tokio::test]
async fn silent_client_times_out() {
    let (_client, mut server) = tokio::io::duplex(64);

    let err = read_request(&mut server, Duration::from_millis(20))
        .await
        .unwrap_err();

    assert!(matches!(err, ProtocolError::Timeout));
}

#[tokio::test]
async fn malformed_json_is_a_json_error() {
    let (mut client, mut server) = tokio::io::duplex(64);
    write_message(&mut client, b"not json").await.unwrap();

    let err = read_request(&mut server, DEFAULT_TIMEOUT).await.unwrap_err();

    assert!(matches!(err, ProtocolError::Json(_)));
}

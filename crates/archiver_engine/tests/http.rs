use std::time::Duration;

use archiver_engine::{BasicAuth, FailureKind, FetchSettings, HttpClient};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn get_returns_body_and_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/proj/wiki/WikiStart"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("= Welcome =", "text/plain; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let client = HttpClient::new(FetchSettings::default()).unwrap();
    let url = format!("{}/proj/wiki/WikiStart", server.uri());

    let output = client.get(&url).await.expect("fetch ok");
    assert_eq!(output.metadata.final_url, url);
    assert_eq!(output.metadata.byte_len, 11);
    assert!(output
        .metadata
        .content_type
        .unwrap()
        .starts_with("text/plain"));
    assert_eq!(output.bytes, b"= Welcome =");
}

#[tokio::test]
async fn get_fails_on_http_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = HttpClient::new(FetchSettings::default()).unwrap();
    let err = client
        .get(&format!("{}/missing", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus { status: 404 });
}

#[tokio::test]
async fn get_times_out_on_slow_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_string("slow"),
        )
        .mount(&server)
        .await;

    let settings = FetchSettings {
        request_timeout: Duration::from_millis(50),
        ..FetchSettings::default()
    };
    let client = HttpClient::new(settings).unwrap();
    let err = client
        .get(&format!("{}/slow", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::Timeout);
}

#[tokio::test]
async fn get_rejects_too_large_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/large"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "application/octet-stream")
                .set_body_string("01234567890"),
        )
        .mount(&server)
        .await;

    let settings = FetchSettings {
        max_bytes: 10,
        ..FetchSettings::default()
    };
    let client = HttpClient::new(settings).unwrap();
    let err = client
        .get(&format!("{}/large", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::TooLarge {
            max_bytes: 10,
            actual: Some(11)
        }
    );
}

#[tokio::test]
async fn invalid_url_is_reported_without_a_request() {
    let client = HttpClient::new(FetchSettings::default()).unwrap();
    let err = client.get("not a url").await.unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidUrl);
}

#[tokio::test]
async fn post_xml_sends_basic_auth_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/proj/login/xmlrpc"))
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .and(header("content-type", "text/xml; charset=utf-8"))
        .and(body_string_contains("<methodName>wiki.getAllPages</methodName>"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<ok/>"))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(FetchSettings::default())
        .unwrap()
        .with_auth(BasicAuth {
            user: "user".to_string(),
            password: "pass".to_string(),
        });
    let output = client
        .post_xml(
            &format!("{}/proj/login/xmlrpc", server.uri()),
            "<methodCall><methodName>wiki.getAllPages</methodName></methodCall>".to_string(),
        )
        .await
        .expect("post ok");
    assert_eq!(output.bytes, b"<ok/>");
}

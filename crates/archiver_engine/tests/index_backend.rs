use archiver_core::{DefaultPageSet, PageId};
use archiver_engine::{DedupPolicy, FailureKind, FetchSettings, HtmlIndexBackend, IndexSite, WikiBackend};
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend(server: &MockServer) -> HtmlIndexBackend {
    let site = IndexSite::new(server.uri(), "/proj/wiki/");
    HtmlIndexBackend::new(site, DedupPolicy::default(), FetchSettings::default()).unwrap()
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><body>{body}</body></html>"),
        "text/html; charset=utf-8",
    )
}

#[tokio::test]
async fn pages_come_from_the_title_index() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/proj/wiki/TitleIndex"))
        .respond_with(html(
            r#"<a href="/proj/wiki/TitleIndex">index</a>
               <a href="/proj/wiki/TobiPage">Tobi</a>
               <a href="/proj/wiki/Dev/Road%20map">Road map</a>
               <a href="/proj/timeline">timeline</a>"#,
        ))
        .mount(&server)
        .await;

    let defaults = DefaultPageSet::from_names(["TitleIndex"]);
    let pages = backend(&server).list_pages(&defaults).await.unwrap();
    assert_eq!(
        pages,
        vec![PageId::new("TobiPage"), PageId::new("Dev/Road map")]
    );
}

#[tokio::test]
async fn unreachable_index_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/proj/wiki/TitleIndex"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = backend(&server)
        .list_pages(&DefaultPageSet::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus { status: 500 });
}

#[tokio::test]
async fn source_is_fetched_in_text_format() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/proj/wiki/Dev/Road%20map"))
        .and(query_param("format", "txt"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("= Road map =", "text/plain; charset=utf-8"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/proj/wiki/Dev/Road%20map"))
        .respond_with(html("<p>rendered</p>"))
        .mount(&server)
        .await;

    let backend = backend(&server);
    let page = PageId::new("Dev/Road map");
    assert_eq!(backend.page_source(&page).await.unwrap(), "= Road map =");
    assert_eq!(
        backend.page_html(&page).await.unwrap(),
        "<html><body><p>rendered</p></body></html>"
    );
}

#[tokio::test]
async fn attachments_are_listed_and_downloaded_raw() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/proj/attachment/wiki/Home/"))
        .respond_with(html(
            r#"<a href="/proj/attachment/wiki/Home/">Home</a>
               <a href="/proj/attachment/wiki/Home/logo.png" title="View attachment">logo.png</a>
               <a href="/proj/raw-attachment/wiki/Home/logo.png">download</a>
               <a href="/proj/attachment/wiki/Home/release%20notes.pdf">release notes.pdf</a>
               <a href="/proj/attachment/wiki/Home/logo.png?action=delete">delete</a>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/proj/attachment/wiki/Home/logo.png"))
        .and(query_param("format", "raw"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0x89, b'P', b'N', b'G'], "image/png"))
        .mount(&server)
        .await;

    let backend = backend(&server);
    let names = backend.list_attachments(&PageId::new("Home")).await.unwrap();
    assert_eq!(names, vec!["Home/logo.png", "Home/release notes.pdf"]);
    assert_eq!(
        backend.attachment("Home/logo.png").await.unwrap(),
        vec![0x89, b'P', b'N', b'G']
    );
}

#[tokio::test]
async fn missing_attachment_index_means_no_attachments() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/proj/attachment/wiki/Lonely/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let names = backend(&server)
        .list_attachments(&PageId::new("Lonely"))
        .await
        .unwrap();
    assert!(names.is_empty());
}

#[tokio::test]
async fn attachment_links_match_unescaped_page_names() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/proj/attachment/wiki/Foo%28Bar%29/"))
        .respond_with(html(
            r#"<a href="/proj/attachment/wiki/Foo(Bar)/">Foo(Bar)</a>
               <a href="/proj/attachment/wiki/Foo(Bar)/plan.pdf">plan.pdf</a>
               <a href="/proj/attachment/wiki/Foo%28Bar%29/notes.txt">notes.txt</a>"#,
        ))
        .mount(&server)
        .await;

    let names = backend(&server)
        .list_attachments(&PageId::new("Foo(Bar)"))
        .await
        .unwrap();
    assert_eq!(names, vec!["Foo(Bar)/plan.pdf", "Foo(Bar)/notes.txt"]);
}

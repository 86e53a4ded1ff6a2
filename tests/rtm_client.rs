// Tests for `client/core.rs` and `client/auth.rs` against a mocked REST endpoint.
use chrono::NaiveDate;
use mockito::{Matcher, Server, ServerGuard};
use serial_test::serial;
use things2rtm::client::{AuthState, RemoteTask, RtmClient, ServiceError, TaskService, Timeline};
use things2rtm::context::TestContext;
use things2rtm::controller::authorize;
use things2rtm::storage::LocalStorage;

fn method(name: &str) -> Matcher {
    Matcher::UrlEncoded("method".into(), name.into())
}

fn client_for(server: &ServerGuard) -> RtmClient {
    RtmClient::new(
        &format!("{}/rest/", server.url()),
        &format!("{}/auth/", server.url()),
        "apikey",
        "secret",
    )
    .unwrap()
}

fn milk() -> RemoteTask {
    RemoteTask {
        name: "Buy milk".to_string(),
        list_id: "100".to_string(),
        series_id: "200".to_string(),
        task_id: "300".to_string(),
    }
}

#[tokio::test]
async fn test_lists_and_task_series() {
    let mut server = Server::new_async().await;
    let lists = server
        .mock("GET", "/rest/")
        .match_query(Matcher::AllOf(vec![
            method("rtm.lists.getList"),
            Matcher::UrlEncoded("api_key".into(), "apikey".into()),
            Matcher::Regex("api_sig=[0-9a-f]{32}".into()),
        ]))
        .with_status(200)
        .with_body(
            r#"<rsp stat="ok"><lists>
                <list id="100" name="Inbox" deleted="0" locked="1" archived="0" position="-1" smart="0"/>
                <list id="101" name="This week" deleted="0" locked="0" archived="0" position="0" smart="1"/>
            </lists></rsp>"#,
        )
        .create_async()
        .await;
    let tasks = server
        .mock("GET", "/rest/")
        .match_query(method("rtm.tasks.getList"))
        .with_status(200)
        .with_body(
            r#"<rsp stat="ok"><tasks rev="1"><list id="100">
                <taskseries id="200" created="2026-10-01T10:00:00Z" name="Buy milk" source="api">
                    <tags/><participants/><notes/><task id="300" due="" completed=""/>
                </taskseries>
            </list></tasks></rsp>"#,
        )
        .create_async()
        .await;

    let client = client_for(&server);
    let remote_lists = client.lists().await.unwrap();
    assert_eq!(remote_lists.len(), 2);
    assert!(remote_lists[1].smart);

    let remote_tasks = client.task_series().await.unwrap();
    assert_eq!(remote_tasks, vec![milk()]);

    lists.assert_async().await;
    tasks.assert_async().await;
}

#[tokio::test]
async fn test_fail_response_is_api_error() {
    let mut server = Server::new_async().await;
    let _m = server
        .mock("GET", "/rest/")
        .match_query(method("rtm.timelines.create"))
        .with_status(200)
        .with_body(r#"<rsp stat="fail"><err code="105" msg="Service currently unavailable"/></rsp>"#)
        .create_async()
        .await;

    let client = client_for(&server);
    match client.create_timeline().await {
        Err(ServiceError::Api { code, message }) => {
            assert_eq!(code, 105);
            assert_eq!(message, "Service currently unavailable");
        }
        other => panic!("expected an API error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_http_error_is_transport_error() {
    let mut server = Server::new_async().await;
    let _m = server
        .mock("GET", "/rest/")
        .with_status(503)
        .create_async()
        .await;

    let client = client_for(&server);
    assert!(matches!(
        client.lists().await,
        Err(ServiceError::Transport(_))
    ));
}

#[tokio::test]
async fn test_add_task_and_enrichment_calls() {
    let mut server = Server::new_async().await;
    let add = server
        .mock("GET", "/rest/")
        .match_query(Matcher::AllOf(vec![
            method("rtm.tasks.add"),
            Matcher::UrlEncoded("timeline".into(), "42".into()),
            Matcher::UrlEncoded("list_id".into(), "100".into()),
            Matcher::UrlEncoded("name".into(), "Buy milk".into()),
            Matcher::UrlEncoded("auth_token".into(), "tok".into()),
        ]))
        .with_status(200)
        .with_body(
            r#"<rsp stat="ok"><transaction id="1" undoable="0"/><list id="100">
                <taskseries id="200" name="Buy milk"><task id="300"/></taskseries>
            </list></rsp>"#,
        )
        .create_async()
        .await;
    let tags = server
        .mock("GET", "/rest/")
        .match_query(Matcher::AllOf(vec![
            method("rtm.tasks.addTags"),
            Matcher::UrlEncoded("taskseries_id".into(), "200".into()),
            Matcher::UrlEncoded("task_id".into(), "300".into()),
            Matcher::UrlEncoded("tags".into(), "things2rtm,Errand".into()),
        ]))
        .with_status(200)
        .with_body(r#"<rsp stat="ok"><transaction id="2" undoable="1"/></rsp>"#)
        .create_async()
        .await;
    let due = server
        .mock("GET", "/rest/")
        .match_query(Matcher::AllOf(vec![
            method("rtm.tasks.setDueDate"),
            Matcher::UrlEncoded("due".into(), "2026-10-18".into()),
            Matcher::UrlEncoded("has_due_time".into(), "0".into()),
            Matcher::UrlEncoded("parse".into(), "0".into()),
        ]))
        .with_status(200)
        .with_body(r#"<rsp stat="ok"/>"#)
        .create_async()
        .await;

    let mut client = client_for(&server);
    client.set_token(Some("tok".to_string()));
    let timeline = Timeline("42".to_string());

    let task = client.add_task(&timeline, "100", "Buy milk").await.unwrap();
    assert_eq!(task, milk());
    client
        .add_tags(
            &timeline,
            &task,
            &["things2rtm".to_string(), "Errand".to_string()],
        )
        .await
        .unwrap();
    client
        .set_due_date(&timeline, &task, NaiveDate::from_ymd_opt(2026, 10, 18).unwrap())
        .await
        .unwrap();

    add.assert_async().await;
    tags.assert_async().await;
    due.assert_async().await;
}

#[tokio::test]
async fn test_valid_cached_token_is_reused() {
    let mut server = Server::new_async().await;
    let check = server
        .mock("GET", "/rest/")
        .match_query(Matcher::AllOf(vec![
            method("rtm.auth.checkToken"),
            Matcher::UrlEncoded("auth_token".into(), "cached".into()),
        ]))
        .with_status(200)
        .with_body(r#"<rsp stat="ok"><auth><token>cached</token><perms>delete</perms></auth></rsp>"#)
        .create_async()
        .await;

    let mut client = client_for(&server);
    let state = client.begin_auth(Some("cached")).await.unwrap();
    assert_eq!(
        state,
        AuthState::Authorized {
            token: "cached".to_string()
        }
    );
    assert_eq!(client.token(), Some("cached"));
    check.assert_async().await;
}

#[tokio::test]
async fn test_rejected_token_falls_back_to_frob() {
    let mut server = Server::new_async().await;
    let _check = server
        .mock("GET", "/rest/")
        .match_query(method("rtm.auth.checkToken"))
        .with_status(200)
        .with_body(r#"<rsp stat="fail"><err code="98" msg="Login failed / Invalid auth token"/></rsp>"#)
        .create_async()
        .await;
    let _frob = server
        .mock("GET", "/rest/")
        .match_query(method("rtm.auth.getFrob"))
        .with_status(200)
        .with_body(r#"<rsp stat="ok"><frob>f00d</frob></rsp>"#)
        .create_async()
        .await;
    let token = server
        .mock("GET", "/rest/")
        .match_query(Matcher::AllOf(vec![
            method("rtm.auth.getToken"),
            Matcher::UrlEncoded("frob".into(), "f00d".into()),
        ]))
        .with_status(200)
        .with_body(r#"<rsp stat="ok"><auth><token>fresh</token><perms>delete</perms></auth></rsp>"#)
        .create_async()
        .await;

    let mut client = client_for(&server);
    let state = client.begin_auth(Some("stale")).await.unwrap();
    let AuthState::AwaitingApproval { frob, url } = state else {
        panic!("expected approval step");
    };
    assert_eq!(frob, "f00d");
    assert!(url.contains("/auth/?"));
    assert!(url.contains("frob=f00d"));
    assert_eq!(client.token(), None);

    assert_eq!(client.complete_auth(&frob).await.unwrap(), "fresh");
    assert_eq!(client.token(), Some("fresh"));
    token.assert_async().await;
}

#[tokio::test]
#[serial]
async fn test_authorize_saves_new_token() {
    let mut server = Server::new_async().await;
    let _frob = server
        .mock("GET", "/rest/")
        .match_query(method("rtm.auth.getFrob"))
        .with_status(200)
        .with_body(r#"<rsp stat="ok"><frob>f00d</frob></rsp>"#)
        .create_async()
        .await;
    let _token = server
        .mock("GET", "/rest/")
        .match_query(method("rtm.auth.getToken"))
        .with_status(200)
        .with_body(r#"<rsp stat="ok"><auth><token>fresh</token></auth></rsp>"#)
        .create_async()
        .await;

    let ctx = TestContext::new();
    let mut client = client_for(&server);
    let mut enter: &[u8] = b"\n";
    authorize(&mut client, &ctx, &mut enter).await.unwrap();

    assert_eq!(LocalStorage::load_token(&ctx).as_deref(), Some("fresh"));
    assert_eq!(client.token(), Some("fresh"));
}

#[tokio::test]
#[serial]
async fn test_authorize_denied_is_an_error() {
    let mut server = Server::new_async().await;
    let _frob = server
        .mock("GET", "/rest/")
        .match_query(method("rtm.auth.getFrob"))
        .with_status(200)
        .with_body(r#"<rsp stat="ok"><frob>f00d</frob></rsp>"#)
        .create_async()
        .await;
    let _token = server
        .mock("GET", "/rest/")
        .match_query(method("rtm.auth.getToken"))
        .with_status(200)
        .with_body(r#"<rsp stat="fail"><err code="101" msg="Invalid frob - did you authenticate?"/></rsp>"#)
        .create_async()
        .await;

    let ctx = TestContext::new();
    let mut client = client_for(&server);
    let mut enter: &[u8] = b"\n";
    assert!(authorize(&mut client, &ctx, &mut enter).await.is_err());
    assert_eq!(LocalStorage::load_token(&ctx), None);
}

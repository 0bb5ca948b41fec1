use difychat_client::{ChatApi, ChatSession, HttpChatApi, SlackLanding, SubmitOutcome};
use difychat_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use difychat_core::{ConversationId, HistoryQuery, Locale};
use difychat_db::ConversationRepository;
use difychat_server::{bootstrap_with_config, build_router, Application};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn start(dify: &MockServer, slack_client_id: Option<&str>) -> (Application, String) {
    let config = AppConfig::load(LoadOptions {
        config_path: Some("does-not-exist.toml".into()),
        overrides: ConfigOverrides {
            database_url: Some("sqlite::memory:".to_string()),
            upstream_api_key: Some("app-e2e".to_string()),
            upstream_base_url: Some(format!("{}/v1", dify.uri())),
            slack_client_id: slack_client_id.map(str::to_string),
            ..ConfigOverrides::default()
        },
        ..LoadOptions::default()
    })
    .expect("config");

    let app = bootstrap_with_config(config).await.expect("bootstrap");
    let router = build_router(&app);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    (app, format!("http://{address}"))
}

#[tokio::test]
async fn chat_round_trip_persists_turn_and_reloads_history() {
    let dify = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat-messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "answer": "こんにちは",
            "conversation_id": "dify-conv-1"
        })))
        .expect(2)
        .mount(&dify)
        .await;

    let (app, base_url) = start(&dify, None).await;
    let api = HttpChatApi::new(&base_url).expect("client");
    let mut session = ChatSession::new(api.clone(), Locale::Ja);

    session.set_draft("hello");
    assert_eq!(session.submit().await, SubmitOutcome::Replied);
    session.set_draft("again");
    assert_eq!(session.submit().await, SubmitOutcome::Replied);
    assert_eq!(session.conversation_id(), Some(&ConversationId("dify-conv-1".to_string())));

    let stored = app
        .conversations
        .count_for_conversation(&ConversationId("dify-conv-1".to_string()))
        .await
        .expect("count");
    assert_eq!(stored, 2);

    let mut reloaded = ChatSession::new(api.clone(), Locale::Ja);
    reloaded.load_history().await.expect("history");
    let contents: Vec<&str> =
        reloaded.messages().iter().map(|message| message.content.as_str()).collect();
    assert_eq!(contents, vec!["hello", "こんにちは", "again", "こんにちは"]);
    assert_eq!(reloaded.conversation_id(), Some(&ConversationId("dify-conv-1".to_string())));

    let newest_first = api
        .fetch_history(&HistoryQuery { limit: Some(1), ..HistoryQuery::default() })
        .await
        .expect("limited history");
    assert_eq!(newest_first.len(), 1);
    assert_eq!(newest_first[0].user_message, "again");
}

#[tokio::test]
async fn upstream_outage_shows_fallback_and_persists_nothing() {
    let dify = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat-messages"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&dify)
        .await;

    let (app, base_url) = start(&dify, None).await;
    let mut session = ChatSession::new(HttpChatApi::new(&base_url).expect("client"), Locale::En);

    session.set_draft("hello");
    assert_eq!(session.submit().await, SubmitOutcome::Fallback);
    assert_eq!(
        session.messages().last().map(|message| message.content.as_str()),
        Some("Sorry, something went wrong. Please try again.")
    );
    assert!(session.input_enabled());

    let (rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM conversations")
        .fetch_one(&app.db_pool)
        .await
        .expect("count");
    assert_eq!(rows, 0);
}

#[tokio::test]
async fn slack_landing_receives_install_url_verbatim() {
    let dify = MockServer::start().await;
    let (_app, base_url) = start(&dify, Some("111.222")).await;
    let api = HttpChatApi::new(&base_url).expect("client");

    let expected = api.fetch_install_link().await.expect("install link").install_url;
    assert!(expected.starts_with("https://slack.com/oauth/v2/authorize?client_id=111.222"));

    let mut landing = SlackLanding::new(Locale::Ja);
    landing.load(&api).await;
    let href = landing.install_href().expect("ready").to_string();

    assert!(href.starts_with("https://slack.com/oauth/v2/authorize?client_id=111.222&scope="));
    assert_ne!(href, expected, "each request carries a fresh state token");
}

#[tokio::test]
async fn pages_and_health_are_served() {
    let dify = MockServer::start().await;
    let (_app, base_url) = start(&dify, None).await;
    let http = reqwest::Client::new();

    let healthz: serde_json::Value = http
        .get(format!("{base_url}/healthz"))
        .send()
        .await
        .expect("healthz")
        .json()
        .await
        .expect("json");
    assert_eq!(healthz, json!({"status": "ok"}));

    let page = http
        .get(format!("{base_url}/"))
        .send()
        .await
        .expect("chat page")
        .text()
        .await
        .expect("html");
    assert!(page.contains(Locale::Ja.fallback_message()));

    let preflight = http
        .request(reqwest::Method::OPTIONS, format!("{base_url}/api/chat"))
        .header("origin", "http://localhost:5173")
        .header("access-control-request-method", "POST")
        .send()
        .await
        .expect("preflight");
    assert_eq!(
        preflight
            .headers()
            .get("access-control-allow-origin")
            .and_then(|value| value.to_str().ok()),
        Some("*")
    );
}

use std::net::{SocketAddr, TcpListener};
use std::sync::mpsc;
use std::thread;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use terrapanel_server::PanelError;
use terrapanel_server::config::DiscordConfig;
use terrapanel_server::http::{HttpResponse, RequestHead, read_head};
use terrapanel_server::notify::{DiscordNotifier, Notifier};

#[derive(Debug)]
struct Captured {
    head: RequestHead,
    body: Value,
}

/// Accepts one request, records it, and answers with `status`.
fn one_shot_api(status: u16) -> (String, mpsc::Receiver<Captured>) {
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let read = read_head(&mut stream).expect("head");
        let body = read.read_body(&mut stream, 64 * 1024).expect("body");
        let body: Value = serde_json::from_slice(&body).expect("json body");
        HttpResponse::json(status, &json!({ "id": "1" }))
            .write_to(&mut stream)
            .expect("respond");
        let _ = tx.send(Captured {
            head: read.head,
            body,
        });
    });
    (format!("http://{addr}/api/v10"), rx)
}

fn config(api_base: String) -> DiscordConfig {
    DiscordConfig {
        enabled: true,
        channel_id: "998877".to_string(),
        bot_token: "token-abc".to_string(),
        api_base,
    }
}

#[test]
fn posts_message_as_bot_to_channel() {
    let (api_base, captured) = one_shot_api(200);
    let notifier = DiscordNotifier::new(&config(api_base)).expect("notifier");
    notifier.notify("Alice has joined!").expect("notify");

    let request = captured.recv().expect("captured request");
    assert_eq!(request.head.method, "POST");
    assert_eq!(request.head.path, "/api/v10/channels/998877/messages");
    assert_eq!(request.head.header("authorization"), Some("Bot token-abc"));
    assert_eq!(request.body, json!({ "content": "Alice has joined!" }));
}

#[test]
fn non_success_status_is_an_error() {
    let (api_base, _captured) = one_shot_api(403);
    let notifier = DiscordNotifier::new(&config(api_base)).expect("notifier");
    let error = notifier.notify("hello").expect_err("forbidden");
    assert!(matches!(error, PanelError::Notify { .. }));
    assert!(error.to_string().contains("403"), "{error}");
}

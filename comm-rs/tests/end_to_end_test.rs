//! Facade-level end-to-end: config in, aggregated report out

use comm_rs::config::{Config, EmailConfig};
use comm_rs::email::backend::stub::StubBackend;
use comm_rs::email::{EmailInterface, SendRequest, TransportRegistry};
use comm_rs::facade::Communications;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

fn write_templates(root: &Path) {
    let content = root.join("content").join("testing");
    std::fs::create_dir_all(&content).unwrap();
    std::fs::write(content.join("html.tera"), "<p>Hi {{ user.name }}</p>").unwrap();

    let subject = root.join("subject").join("testing");
    std::fs::create_dir_all(&subject).unwrap();
    std::fs::write(subject.join("subject.tera"), "Hi {{ user.name }}").unwrap();
}

#[tokio::test]
async fn test_send_via_config_built_stub() {
    let tmp = tempfile::tempdir().unwrap();
    write_templates(tmp.path());

    let toml = format!(
        r#"
        [email]
        templates_dir = "{}"

        [email.sender]
        stub = {{}}
        "#,
        tmp.path().display()
    );
    let config: Config = toml::from_str(&toml).unwrap();
    let comms = Communications::new(config).await.unwrap();

    let email = comms.with("email", None).expect("email configured");
    let settings = SendRequest::new(
        "noreply@example.com",
        vec!["to@example.com".to_string()],
        "testing",
    );
    let data = vec![json!({"user": {"name": "A"}}), json!({"user": {"name": "B"}})];
    let report = email.send(&settings, data).await.unwrap();

    assert!(report.failed.is_empty());
    assert_eq!(report.succeeded, vec!["to@example.com", "to@example.com"]);
}

#[tokio::test]
async fn test_facade_with_pins_transport_per_handle() {
    let tmp = tempfile::tempdir().unwrap();
    write_templates(tmp.path());

    let stub = Arc::new(StubBackend::new());
    let mut registry = TransportRegistry::new("stub");
    registry.register(stub.clone());
    let interface =
        EmailInterface::with_registry(EmailConfig::new(tmp.path()), Some(registry)).unwrap();
    let comms = Communications::from_parts(Some(interface));

    // 'ses' is unconfigured here; the handle must fall back to the default
    let email = comms.with("email", Some("ses")).unwrap();
    let settings = SendRequest::new(
        "noreply@example.com",
        vec!["to@example.com".to_string()],
        "testing",
    );
    email
        .send_one(&settings, json!({"user": {"name": "A"}}))
        .await
        .unwrap();
    assert_eq!(stub.sent_count(), 1);
}

#[tokio::test]
async fn test_unknown_protocol_is_none() {
    let comms = Communications::from_parts(None);
    assert!(comms.with("email", None).is_none());
    assert!(comms.with("sms", Some("*")).is_none());
}

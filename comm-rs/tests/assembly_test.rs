//! Envelope assembly through the interface: subjects, refs, attachments,
//! localization

use comm_rs::config::EmailConfig;
use comm_rs::email::backend::stub::StubBackend;
use comm_rs::email::{AttachmentRef, EmailInterface, SendRequest, TransportRegistry};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

fn write_templates(root: &Path) {
    let content = root.join("content").join("testing");
    std::fs::create_dir_all(&content).unwrap();
    std::fs::write(content.join("html.tera"), "<p>Hello {{ user.name }}</p>").unwrap();
    std::fs::write(content.join("text.tera"), "Hello {{ user.name }}").unwrap();

    let subject = root.join("subject").join("testing");
    std::fs::create_dir_all(&subject).unwrap();
    std::fs::write(
        subject.join("subject.tera"),
        "{{ t(key=\"invite\") }} {{ user.name }}",
    )
    .unwrap();

    let locales = root.join("locales");
    std::fs::create_dir_all(&locales).unwrap();
    std::fs::write(locales.join("en.toml"), "invite = \"Welcome\"\n").unwrap();
    std::fs::write(locales.join("fr.toml"), "invite = \"Bienvenue\"\n").unwrap();
}

fn interface_with_stub(root: &Path) -> (EmailInterface, Arc<StubBackend>) {
    let stub = Arc::new(StubBackend::new());
    let mut registry = TransportRegistry::new("stub");
    registry.register(stub.clone());

    let config = EmailConfig::new(root);
    let interface = EmailInterface::with_registry(config, Some(registry)).unwrap();
    (interface, stub)
}

fn request(root: &Path) -> (EmailInterface, Arc<StubBackend>, SendRequest) {
    write_templates(root);
    let (interface, stub) = interface_with_stub(root);
    let settings = SendRequest::new(
        "noreply@example.com",
        vec!["to@example.com".to_string()],
        "testing",
    );
    (interface, stub, settings)
}

#[tokio::test]
async fn test_templated_subject_is_localized() {
    let tmp = tempfile::tempdir().unwrap();
    let (interface, stub, mut settings) = request(tmp.path());
    settings.lang = Some("fr".to_string());

    interface
        .send_one(&settings, json!({"user": {"name": "Luc"}}))
        .await
        .unwrap();

    let sent = stub.sent();
    assert_eq!(sent[0].subject, "Bienvenue Luc");
}

#[tokio::test]
async fn test_literal_subject_bypasses_templating() {
    let tmp = tempfile::tempdir().unwrap();
    write_templates(tmp.path());
    // remove the subject bundle entirely: a literal subject must not
    // touch the subject templates at all
    std::fs::remove_dir_all(tmp.path().join("subject")).unwrap();

    let (interface, stub) = interface_with_stub(tmp.path());
    let mut settings = SendRequest::new(
        "noreply@example.com",
        vec!["to@example.com".to_string()],
        "testing",
    );
    settings.subject = Some("Fixed subject".to_string());

    interface
        .send_one(&settings, json!({"user": {"name": "A"}}))
        .await
        .unwrap();
    assert_eq!(stub.sent()[0].subject, "Fixed subject");
}

#[tokio::test]
async fn test_ref_tag_appended_to_every_subject() {
    let tmp = tempfile::tempdir().unwrap();
    let (interface, stub, mut settings) = request(tmp.path());
    settings.ref_tag = Some("ORDER-42".to_string());

    let data = vec![json!({"user": {"name": "A"}}), json!({"user": {"name": "B"}})];
    interface.send(&settings, data).await.unwrap();

    let sent = stub.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].subject, "Welcome A (ref:ORDER-42)");
    assert_eq!(sent[1].subject, "Welcome B (ref:ORDER-42)");
}

#[tokio::test]
async fn test_each_item_renders_its_own_body() {
    let tmp = tempfile::tempdir().unwrap();
    let (interface, stub, settings) = request(tmp.path());

    let data = vec![json!({"user": {"name": "A"}}), json!({"user": {"name": "B"}})];
    let report = interface.send(&settings, data).await.unwrap();

    assert!(report.failed.is_empty());
    assert_eq!(report.succeeded, vec!["to@example.com", "to@example.com"]);

    let sent = stub.sent();
    assert_eq!(sent[0].html, "<p>Hello A</p>");
    assert_eq!(sent[1].html, "<p>Hello B</p>");
    assert_eq!(sent[0].text, "Hello A");
    assert_eq!(sent[1].text, "Hello B");
}

#[tokio::test]
async fn test_discovered_and_caller_attachments_merge() {
    let tmp = tempfile::tempdir().unwrap();
    write_templates(tmp.path());
    let dir = tmp.path().join("attachments").join("testing");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("logo.png"), b"png").unwrap();
    std::fs::write(dir.join(".hidden"), b"junk").unwrap();

    let (interface, stub) = interface_with_stub(tmp.path());
    let mut settings = SendRequest::new(
        "noreply@example.com",
        vec!["to@example.com".to_string()],
        "testing",
    );
    settings.attachments = vec![
        AttachmentRef {
            filename: "report.pdf".to_string(),
            path: Some(tmp.path().join("report.pdf")),
            cid: None,
        },
        AttachmentRef::new(".sneaky"),
    ];

    interface
        .send_one(&settings, json!({"user": {"name": "A"}}))
        .await
        .unwrap();

    let attachments = &stub.sent()[0].attachments;
    let names: Vec<&str> = attachments.iter().map(|a| a.filename.as_str()).collect();
    assert_eq!(names, vec!["logo.png", "report.pdf"]);
}

#[tokio::test]
async fn test_same_attachments_shared_across_items() {
    let tmp = tempfile::tempdir().unwrap();
    write_templates(tmp.path());
    let dir = tmp.path().join("attachments").join("testing");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("logo.png"), b"png").unwrap();

    let (interface, stub) = interface_with_stub(tmp.path());
    let settings = SendRequest::new(
        "noreply@example.com",
        vec!["to@example.com".to_string()],
        "testing",
    );

    let data = vec![json!({"user": {"name": "A"}}), json!({"user": {"name": "B"}})];
    interface.send(&settings, data).await.unwrap();

    let sent = stub.sent();
    assert_eq!(sent[0].attachments, sent[1].attachments);
    assert_eq!(sent[0].attachments[0].filename, "logo.png");
}

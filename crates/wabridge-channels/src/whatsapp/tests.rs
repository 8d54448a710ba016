use super::address::{canonical_address, to_jid};
use super::events::message_text;
use super::send::split_message;
use super::WhatsAppSession;
use wabridge_core::{config::WhatsAppConfig, traits::SessionClient};
use wacore_binary::jid::{Jid, JidExt};

#[test]
fn test_split_short_message() {
    let chunks = split_message("hello", 4096);
    assert_eq!(chunks, vec!["hello"]);
}

#[test]
fn test_split_long_message_on_newlines() {
    let text = "a\n".repeat(3000);
    let chunks = split_message(&text, 4096);
    assert!(chunks.len() >= 2);
    for chunk in &chunks {
        assert!(chunk.len() <= 4096);
        assert!(chunk.ends_with('\n'));
    }
    assert_eq!(chunks.concat(), text);
}

#[test]
fn test_split_respects_char_boundaries() {
    let text = "é".repeat(3000);
    let chunks = split_message(&text, 4095);
    assert!(chunks.len() >= 2);
    assert_eq!(chunks.concat(), text);
}

#[test]
fn test_user_address_to_jid() {
    let jid = to_jid("6281111111111@c.us").unwrap();
    assert_eq!(jid.user, "6281111111111");
    assert!(!jid.is_group());
    assert_eq!(jid.to_string(), "6281111111111@s.whatsapp.net");
}

#[test]
fn test_group_address_roundtrip() {
    let jid = to_jid("120363001234567890@g.us").unwrap();
    assert!(jid.is_group(), "g.us JID should be detected as group");
    assert_eq!(canonical_address(&jid), "120363001234567890@g.us");
}

#[test]
fn test_canonical_address_for_user_jid() {
    let jid: Jid = "6281111111111@s.whatsapp.net".parse().unwrap();
    assert_eq!(canonical_address(&jid), "6281111111111@c.us");
}

#[test]
fn test_lid_chat_keeps_its_server() {
    let jid: Jid = "123456789012345@lid".parse().unwrap();
    let address = canonical_address(&jid);
    assert_eq!(address, "123456789012345@lid");

    let back = to_jid(&address).unwrap();
    assert_eq!(back.user, "123456789012345");
    assert_eq!(back.server, "lid");
    assert_eq!(back, jid);
}

#[test]
fn test_newsletter_chat_is_not_mapped_to_user() {
    let jid: Jid = "120363000000000000@newsletter".parse().unwrap();
    assert_eq!(canonical_address(&jid), "120363000000000000@newsletter");
}

#[test]
fn test_empty_address_rejected() {
    assert!(to_jid("@c.us").is_err());
}

#[test]
fn test_message_text_plain_and_wrapped() {
    let plain = waproto::whatsapp::Message {
        conversation: Some("halo".to_string()),
        ..Default::default()
    };
    assert_eq!(message_text(&plain).as_deref(), Some("halo"));

    let empty = waproto::whatsapp::Message::default();
    assert_eq!(message_text(&empty), None);
}

#[tokio::test]
async fn test_clear_session_removes_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let session = WhatsAppSession::new(WhatsAppConfig::default(), dir.path());
    std::fs::create_dir_all(session.session_dir()).unwrap();
    std::fs::write(session.session_dir().join("whatsapp.db"), b"creds").unwrap();
    assert!(session.has_persisted_session());

    session.clear_session().await.unwrap();
    assert!(!session.has_persisted_session());
    assert!(!session.session_dir().exists());

    // Clearing twice is harmless.
    session.clear_session().await.unwrap();
}

#[tokio::test]
async fn test_commands_fail_fast_without_client() {
    let dir = tempfile::tempdir().unwrap();
    let session = WhatsAppSession::new(WhatsAppConfig::default(), dir.path());
    assert!(!session.is_connected().await);
    assert!(session.send_message("6281111111111@c.us", "hi").await.is_err());
    assert!(session.is_registered_user("6281111111111@c.us").await.is_err());
    // Tearing down a session that never started is safe.
    session.destroy().await.unwrap();
    session.logout().await.unwrap();
}

use super::test_db;
use crate::tokens;

#[test]
fn test_open_and_migrate() {
    let db = test_db();
    let settings = db.get_all_settings().unwrap();
    assert!(settings.is_empty());

    let version: i64 = db
        .with_conn(|conn| Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?))
        .unwrap();
    assert_eq!(version, 1);
}

#[test]
fn test_settings_crud() {
    let db = test_db();
    db.set_setting("SERVER_PORT", "8080", "normal").unwrap();
    assert_eq!(db.get_setting("SERVER_PORT").unwrap(), Some("8080".into()));

    db.set_setting("SERVER_PORT", "9090", "normal").unwrap();
    assert_eq!(db.get_setting("SERVER_PORT").unwrap(), Some("9090".into()));

    db.delete_setting("SERVER_PORT").unwrap();
    assert_eq!(db.get_setting("SERVER_PORT").unwrap(), None);
}

#[test]
fn test_tokens_are_scoped_by_platform() {
    let db = test_db();
    assert!(db.get_latest_token("twitch").unwrap().is_none());

    let token = tokens::Token {
        platform: "twitch".into(),
        access_token: "abc".into(),
        refresh_token: "def".into(),
        scope: "user:read:follows".into(),
        user_id: "42".into(),
        expires_at: 9999999,
    };
    db.save_token(&token).unwrap();
    db.save_token(&tokens::Token {
        access_token: "newer".into(),
        ..token.clone()
    })
    .unwrap();

    let got = db.get_latest_token("twitch").unwrap().unwrap();
    assert_eq!(got.access_token, "newer");
    assert_eq!(got.user_id, "42");
    assert!(db.get_latest_token("twitcasting").unwrap().is_none());

    db.delete_tokens("twitch").unwrap();
    assert!(db.get_latest_token("twitch").unwrap().is_none());
}

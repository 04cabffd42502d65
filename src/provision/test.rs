use crate::error::ConvertError;
use crate::provision::{
    add_user, generate_password, provision, validate_label, PasswordPolicy, Strength, SYMBOLS,
};
use crate::xray::users::identities;
use crate::xray::{Protocol, XrayConfig};
use std::collections::HashSet;

const CONFIG: &str = r#"{"inbounds": [
    {"port": 443, "protocol": "vmess",
     "settings": {"clients": [{"id": "11111111-2222-3333-4444-555555555555", "email": "alice"}]},
     "streamSettings": {"network": "ws", "wsSettings": {"path": "/ray"}}},
    {"port": 443, "protocol": "trojan", "settings": {"clients": []}},
    {"port": 1080, "protocol": "socks"}
]}"#;

fn is_uuid(s: &str) -> bool {
    s.len() == 36
        && s.char_indices().all(|(i, c)| match i {
            8 | 13 | 18 | 23 => c == '-',
            _ => c.is_ascii_digit() || ('a'..='f').contains(&c),
        })
}

#[test]
fn test_vmess_gets_uuid() {
    let user = provision(Protocol::Vmess, "alice", &PasswordPolicy::default());
    assert!(is_uuid(&user.secret), "{}", user.secret);
    assert_eq!(user.label.as_deref(), Some("alice"));
}

#[test]
fn test_uuids_do_not_collide() {
    let mut seen = HashSet::new();
    seen.insert("11111111-2222-3333-4444-555555555555".to_string());
    for _ in 0..10_000 {
        let user = provision(Protocol::Vless, "alice", &PasswordPolicy::default());
        assert!(is_uuid(&user.secret));
        assert!(seen.insert(user.secret));
    }
}

#[test]
fn test_trojan_password_default() {
    let user = provision(Protocol::Trojan, "bob", &PasswordPolicy::default());
    assert_eq!(user.secret.len(), 18);
    assert!(user.secret.chars().all(|c| c.is_ascii_alphanumeric()));
}

#[test]
fn test_strong_password_alphabet() {
    let policy = PasswordPolicy {
        length: 4096,
        strength: Strength::Strong,
    };
    let pw = generate_password(&policy);
    assert_eq!(pw.len(), 4096);
    assert!(pw
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || SYMBOLS.contains(&b)));
    // 4096 draws over 71 characters; missing every symbol is practically impossible
    assert!(pw.bytes().any(|b| SYMBOLS.contains(&b)));
}

#[test]
fn test_label_validation() {
    assert!(validate_label("alice@example.com").is_ok());
    assert!(validate_label("bob_2").is_ok());
    assert!(validate_label("").is_err());
    assert!(validate_label("../etc").is_err());
    assert!(validate_label("a/b").is_err());
}

#[test]
fn test_add_user_appends() {
    let mut cfg = XrayConfig::from_json(CONFIG).unwrap();
    let user = add_user(&mut cfg, 1, "carol", &PasswordPolicy::default()).unwrap();
    let users: Vec<_> = identities(cfg.inbound_at(1).unwrap())
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(users, vec![user]);
}

#[test]
fn test_add_user_rejects_duplicate_label() {
    let mut cfg = XrayConfig::from_json(CONFIG).unwrap();
    match add_user(&mut cfg, 0, "alice", &PasswordPolicy::default()) {
        Err(ConvertError::AlreadyExists(label)) => assert_eq!(label, "alice"),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(cfg.inbound_at(0).unwrap().clients().len(), 1);
}

#[test]
fn test_add_user_errors() {
    let mut cfg = XrayConfig::from_json(CONFIG).unwrap();
    let policy = PasswordPolicy::default();
    assert!(matches!(
        add_user(&mut cfg, 7, "dave", &policy),
        Err(ConvertError::IndexOutOfRange { index: 7, len: 3 })
    ));
    assert!(matches!(
        add_user(&mut cfg, 2, "dave", &policy),
        Err(ConvertError::UnsupportedProtocol(_))
    ));
    assert!(matches!(
        add_user(&mut cfg, 0, "bad name", &policy),
        Err(ConvertError::InvalidLabel(_))
    ));
}

#[test]
fn test_add_user_rejects_short_password() {
    let mut cfg = XrayConfig::from_json(CONFIG).unwrap();
    for length in [0, 7] {
        let policy = PasswordPolicy {
            length,
            strength: Strength::Default,
        };
        assert!(matches!(
            add_user(&mut cfg, 1, "zed", &policy),
            Err(ConvertError::InvalidPasswordLength { min: 8, .. })
        ));
    }
    assert!(cfg.inbound_at(1).unwrap().clients().is_empty());

    // uuid inbounds never draw a password
    let policy = PasswordPolicy {
        length: 0,
        strength: Strength::Default,
    };
    assert!(add_user(&mut cfg, 0, "zed", &policy).is_ok());
    let policy = PasswordPolicy {
        length: 8,
        strength: Strength::Default,
    };
    assert_eq!(add_user(&mut cfg, 1, "zed", &policy).unwrap().secret.len(), 8);
}

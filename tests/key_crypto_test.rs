use flck::container::Mode;
use flck::crypto::{self, CryptoError, MIN_SEALED_LEN, NONCE_LEN, TAG_LEN};
use flck::key::{
    self, check_password_policy, derive_from_password, load_from_keyfile, CredentialError, Key,
    KEYFILE_LEN,
};
use proptest::prelude::*;

// ── Key derivation ───────────────────────────────────────────────────────────

#[test]
fn test_derivation_is_deterministic() {
    let salt = [42u8; 32];
    let a = derive_from_password("MySecurePassword123", Some(salt));
    let b = derive_from_password("MySecurePassword123", Some(salt));
    assert_eq!(a.key, b.key);
    assert_eq!(a.salt, Some(salt));
    assert_eq!(a.mode(), Mode::Password { salt });
}

#[test]
fn test_different_salts_give_different_keys() {
    let a = derive_from_password("MySecurePassword123", Some([1u8; 32]));
    let b = derive_from_password("MySecurePassword123", Some([2u8; 32]));
    assert_ne!(a.key, b.key);
}

#[test]
fn test_fresh_salt_when_none_given() {
    let a = derive_from_password("MySecurePassword123", None);
    let b = derive_from_password("MySecurePassword123", None);
    assert!(a.salt.is_some() && b.salt.is_some());
    assert_ne!(a.salt, b.salt);
    assert_ne!(a.key, b.key);

    // The generated salt reproduces the key.
    let again = derive_from_password("MySecurePassword123", a.salt);
    assert_eq!(again.key, a.key);
}

#[test]
fn test_password_policy() {
    assert_eq!(check_password_policy("", 8), Err(CredentialError::MissingPassword));
    assert_eq!(check_password_policy("short", 8), Err(CredentialError::PasswordTooShort { min: 8 }));
    assert_eq!(check_password_policy("12345678", 8), Ok(()));
    // Characters, not bytes.
    assert_eq!(check_password_policy("ééééééé", 8), Err(CredentialError::PasswordTooShort { min: 8 }));
}

// ── Keyfiles ─────────────────────────────────────────────────────────────────

#[test]
fn test_keyfile_roundtrip() {
    let encoded = key::generate_keyfile();
    assert_eq!(encoded.len(), KEYFILE_LEN);
    let key = load_from_keyfile(&encoded).unwrap();
    assert_eq!(key.to_keyfile(), encoded);
}

#[test]
fn test_keyfiles_are_random() {
    assert_ne!(key::generate_keyfile(), key::generate_keyfile());
}

#[test]
fn test_keyfile_trailing_newline_accepted() {
    let mut encoded = key::generate_keyfile();
    let key = load_from_keyfile(&encoded).unwrap();
    encoded.extend_from_slice(b"\r\n");
    assert_eq!(load_from_keyfile(&encoded).unwrap(), key);
}

#[test]
fn test_invalid_keyfiles_rejected() {
    let good = key::generate_keyfile();

    assert_eq!(load_from_keyfile(b""), Err(CredentialError::InvalidKeyfile));
    assert_eq!(load_from_keyfile(&good[..43]), Err(CredentialError::InvalidKeyfile));
    assert_eq!(load_from_keyfile(&[0u8; 32]), Err(CredentialError::InvalidKeyfile));

    let mut bad_char = good.clone();
    bad_char[0] = b'*';
    assert_eq!(load_from_keyfile(&bad_char), Err(CredentialError::InvalidKeyfile));

    let mut leading_space = vec![b' '];
    leading_space.extend_from_slice(&good[..43]);
    assert_eq!(load_from_keyfile(&leading_space), Err(CredentialError::InvalidKeyfile));
}

#[test]
fn test_fingerprint_identifies_key() {
    let a = Key::generate();
    let b = Key::generate();
    assert_eq!(a.fingerprint(), a.clone().fingerprint());
    assert_ne!(a.fingerprint(), b.fingerprint());
    assert_eq!(a.fingerprint().len(), 16);
    // Debug never prints key bytes.
    assert!(!format!("{a:?}").contains(&hex::encode(a.as_bytes())));
}

#[test]
fn test_key_equality_compares_every_byte() {
    let mut last_differs = [7u8; 32];
    last_differs[31] = 8;
    assert_eq!(Key::from_bytes([7u8; 32]), Key::from_bytes([7u8; 32]));
    assert_ne!(Key::from_bytes([7u8; 32]), Key::from_bytes(last_differs));
    assert_ne!(Key::from_bytes([0u8; 32]), Key::from_bytes([7u8; 32]));
}

// ── Cipher ───────────────────────────────────────────────────────────────────

#[test]
fn test_seal_open_roundtrip() {
    let key = Key::generate();
    let sealed = crypto::seal(&key, b"attack at dawn").unwrap();
    assert_eq!(sealed.len(), NONCE_LEN + 14 + TAG_LEN);
    assert_eq!(crypto::open(&key, &sealed).unwrap(), b"attack at dawn");
}

#[test]
fn test_empty_plaintext() {
    let key = Key::generate();
    let sealed = crypto::seal(&key, b"").unwrap();
    assert_eq!(sealed.len(), MIN_SEALED_LEN);
    assert!(crypto::open(&key, &sealed).unwrap().is_empty());
}

#[test]
fn test_nonce_is_fresh_per_seal() {
    let key = Key::generate();
    let a = crypto::seal(&key, b"same").unwrap();
    let b = crypto::seal(&key, b"same").unwrap();
    assert_ne!(a[..NONCE_LEN], b[..NONCE_LEN]);
    assert_ne!(a, b);
}

#[test]
fn test_wrong_key_and_tampering_look_the_same() {
    let key = Key::generate();
    let sealed = crypto::seal(&key, b"secret payload").unwrap();

    let wrong = crypto::open(&Key::generate(), &sealed).unwrap_err();

    let mut flipped = sealed.clone();
    let last = flipped.len() - 1;
    flipped[last] ^= 0x01;
    let tampered = crypto::open(&key, &flipped).unwrap_err();

    let truncated = crypto::open(&key, &sealed[..MIN_SEALED_LEN - 1]).unwrap_err();

    assert_eq!(wrong, CryptoError::AuthenticationFailed);
    assert_eq!(tampered, wrong);
    assert_eq!(truncated, wrong);
    assert_eq!(wrong.to_string(), "incorrect password or corrupted file");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_seal_open_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..4096)) {
        let key = Key::generate();
        let sealed = crypto::seal(&key, &data).unwrap();
        prop_assert_eq!(crypto::open(&key, &sealed).unwrap(), data);
    }
}

//! Criptografia das anotações clínicas
//!
//! Observações e sintomas registrados nos agendamentos são dados de saúde
//! e ficam criptografados em repouso com AES-256-GCM. A chave é derivada
//! da senha configurada com Argon2id e um salt único por banco.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use argon2::Argon2;
use rand::{rngs::OsRng as RandOsRng, RngCore};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Não foi possível cifrar a anotação: {0}")]
    Seal(String),

    /// Chave errada ou conteúdo adulterado; o GCM não distingue os dois
    #[error("Não foi possível abrir a anotação: {0}")]
    Open(String),

    #[error("Nonce com {found} bytes, esperado {expected}")]
    MalformedNonce { expected: usize, found: usize },

    #[error("Derivação de chave falhou: {0}")]
    KeyDerivation(String),
}

const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32;

/// Tamanho do salt usado na derivação da chave
pub const KEY_SALT_SIZE: usize = 16;

/// Chave AES-256 das anotações, zerada ao sair de escopo
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; KEY_SIZE]);

impl EncryptionKey {
    /// Chave aleatória, usada em testes e ferramentas
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        RandOsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Argon2id sobre a senha do banco e o salt persistido
    pub fn derive(passphrase: &str, salt: &[u8]) -> Result<Self, CryptoError> {
        if passphrase.is_empty() {
            return Err(CryptoError::KeyDerivation(
                "senha do banco vazia".to_string(),
            ));
        }

        let mut bytes = [0u8; KEY_SIZE];
        Argon2::default()
            .hash_password_into(passphrase.as_bytes(), salt, &mut bytes)
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.0))
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(***)")
    }
}

pub fn generate_salt() -> [u8; KEY_SALT_SIZE] {
    let mut salt = [0u8; KEY_SALT_SIZE];
    RandOsRng.fill_bytes(&mut salt);
    salt
}

/// Texto cifrado com a tag GCM, mais o nonce usado
#[derive(Debug, Clone)]
pub struct EncryptedData {
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
}

/// Cifra com um nonce novo a cada chamada
pub fn encrypt(plaintext: &[u8], key: &EncryptionKey) -> Result<EncryptedData, CryptoError> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = key
        .cipher()
        .encrypt(&nonce, plaintext)
        .map_err(|e| CryptoError::Seal(e.to_string()))?;

    Ok(EncryptedData {
        ciphertext,
        nonce: nonce.to_vec(),
    })
}

pub fn decrypt(sealed: &EncryptedData, key: &EncryptionKey) -> Result<Vec<u8>, CryptoError> {
    if sealed.nonce.len() != NONCE_SIZE {
        return Err(CryptoError::MalformedNonce {
            expected: NONCE_SIZE,
            found: sealed.nonce.len(),
        });
    }

    key.cipher()
        .decrypt(Nonce::from_slice(&sealed.nonce), sealed.ciphertext.as_slice())
        .map_err(|e| CryptoError::Open(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_survives_round_trip() -> Result<(), CryptoError> {
        let note = "Paciente relata dor de cabeça há 3 dias".as_bytes();
        let key = EncryptionKey::generate();

        let sealed = encrypt(note, &key)?;
        assert_ne!(sealed.ciphertext.as_slice(), note);
        assert_eq!(decrypt(&sealed, &key)?, note);
        Ok(())
    }

    #[test]
    fn test_foreign_key_cannot_open() -> Result<(), CryptoError> {
        let owner = EncryptionKey::generate();
        let stranger = EncryptionKey::generate();

        let sealed = encrypt(b"alergia a dipirona", &owner)?;
        assert!(matches!(decrypt(&sealed, &stranger), Err(CryptoError::Open(_))));
        Ok(())
    }

    #[test]
    fn test_tampered_ciphertext_is_rejected() -> Result<(), CryptoError> {
        let key = EncryptionKey::generate();
        let mut sealed = encrypt(b"pressao 12x8", &key)?;
        sealed.ciphertext[0] ^= 0xff;
        assert!(decrypt(&sealed, &key).is_err());
        Ok(())
    }

    #[test]
    fn test_same_plaintext_uses_fresh_nonce() -> Result<(), CryptoError> {
        let key = EncryptionKey::generate();
        let first = encrypt(b"retorno", &key)?;
        let second = encrypt(b"retorno", &key)?;
        assert_ne!(first.nonce, second.nonce);
        assert_ne!(first.ciphertext, second.ciphertext);
        Ok(())
    }

    #[test]
    fn test_truncated_nonce_is_rejected() -> Result<(), CryptoError> {
        let key = EncryptionKey::generate();
        let mut encrypted = encrypt(b"observacao", &key)?;
        encrypted.nonce.truncate(8);
        assert!(matches!(
            decrypt(&encrypted, &key),
            Err(CryptoError::MalformedNonce { expected: 12, found: 8 })
        ));
        Ok(())
    }

    #[test]
    fn test_key_derivation() -> Result<(), CryptoError> {
        let salt = generate_salt();
        let key1 = EncryptionKey::derive("senha-forte-do-admin", &salt)?;
        let key2 = EncryptionKey::derive("senha-forte-do-admin", &salt)?;
        assert_eq!(key1.as_bytes(), key2.as_bytes());

        let other_salt = generate_salt();
        let key3 = EncryptionKey::derive("senha-forte-do-admin", &other_salt)?;
        assert_ne!(key1.as_bytes(), key3.as_bytes());

        let key4 = EncryptionKey::derive("senha-errada", &salt)?;
        assert_ne!(key1.as_bytes(), key4.as_bytes());
        Ok(())
    }

    #[test]
    fn test_empty_passphrase_is_rejected() {
        let salt = generate_salt();
        assert!(matches!(
            EncryptionKey::derive("", &salt),
            Err(CryptoError::KeyDerivation(_))
        ));
    }

    #[test]
    fn test_debug_hides_key_material() {
        let key = EncryptionKey::generate();
        assert_eq!(format!("{:?}", key), "EncryptionKey(***)");
    }
}

// src/common/credentials.rs

use rand::{Rng, RngCore};
use sha2::{Digest, Sha256};

// Formato: "pdv_" + 48 caracteres hex (24 bytes aleatórios)
const KEY_MARKER: &str = "pdv_";
const KEY_RANDOM_BYTES: usize = 24;
pub const KEY_PREFIX_LEN: usize = 12;

/// Segredo recém-gerado. O `secret` só existe em memória e é devolvido uma única vez.
pub struct GeneratedKey {
    pub secret: String,
    pub prefix: String,
    pub hash: String,
}

impl std::fmt::Debug for GeneratedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedKey")
            .field("secret", &"<redacted>")
            .field("prefix", &self.prefix)
            .finish()
    }
}

pub fn generate_api_key() -> GeneratedKey {
    let mut bytes = [0u8; KEY_RANDOM_BYTES];
    rand::rng().fill_bytes(&mut bytes);

    let secret = format!("{}{}", KEY_MARKER, hex::encode(bytes));
    let prefix = key_prefix(&secret).to_string();
    let hash = hash_key(&secret);

    GeneratedKey { secret, prefix, hash }
}

/// Hash SHA-256 em hex. Só o hash vai para o banco.
pub fn hash_key(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Prefixo usado para achar os candidatos sem varrer a tabela inteira.
/// São os primeiros `KEY_PREFIX_LEN` caracteres, nunca um corte no meio de um caractere.
pub fn key_prefix(secret: &str) -> &str {
    secret
        .char_indices()
        .nth(KEY_PREFIX_LEN)
        .map_or(secret, |(end, _)| &secret[..end])
}

/// Comparação em tempo constante (para o conteúdo; o tamanho vaza).
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Código numérico de 6 dígitos (com zeros à esquerda).
pub fn generate_pairing_code() -> String {
    let value: u32 = rand::rng().random_range(0..1_000_000);
    format!("{:06}", value)
}

pub fn is_valid_pairing_code(code: &str) -> bool {
    code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit())
}

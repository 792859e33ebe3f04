use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::Zeroize;

/// 秘密的固定字节长度。
pub const SECRET_LEN: usize = 32;

/// 哈希锁输出的固定字节长度（Sha256）。
pub const SECRET_HASH_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum HashlockError {
    #[error("秘密长度非法: 期望 {expected} 字节, 实际 {actual} 字节")]
    InvalidSecretLength { expected: usize, actual: usize },
    #[error("十六进制编码非法: {0}")]
    InvalidEncoding(String),
}

pub type HashlockResult<T> = Result<T, HashlockError>;

/// 只有生成方知晓的 32 字节随机秘密，在主动披露前不得离开本进程。
/// 析构时清零内存。
#[derive(Clone, PartialEq, Eq)]
pub struct Secret([u8; SECRET_LEN]);

impl Secret {
    /// 用进程内随机源生成一个新秘密。
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let mut bytes = [0u8; SECRET_LEN];
        rng.fill(&mut bytes[..]);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; SECRET_LEN]) -> Self {
        Self(bytes)
    }

    /// 从任意长度切片构造；长度不符时拒绝。
    pub fn from_slice(bytes: &[u8]) -> HashlockResult<Self> {
        let sized: [u8; SECRET_LEN] =
            bytes
                .try_into()
                .map_err(|_| HashlockError::InvalidSecretLength {
                    expected: SECRET_LEN,
                    actual: bytes.len(),
                })?;
        Ok(Self(sized))
    }

    pub fn as_bytes(&self) -> &[u8; SECRET_LEN] {
        &self.0
    }

    /// 十六进制披露形式，仅在协议要求公开秘密的时刻使用。
    pub fn reveal_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl FromStr for Secret {
    type Err = HashlockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped)
            .map_err(|err| HashlockError::InvalidEncoding(err.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// 秘密的单向哈希承诺，可公开、可比较。
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SecretHash([u8; SECRET_HASH_LEN]);

impl SecretHash {
    pub fn from_bytes(bytes: [u8; SECRET_HASH_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SECRET_HASH_LEN] {
        &self.0
    }
}

impl fmt::Display for SecretHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for SecretHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretHash({self})")
    }
}

impl FromStr for SecretHash {
    type Err = HashlockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped)
            .map_err(|err| HashlockError::InvalidEncoding(err.to_string()))?;
        let sized: [u8; SECRET_HASH_LEN] =
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| HashlockError::InvalidEncoding(format!(
                    "expected {SECRET_HASH_LEN} bytes, got {}",
                    bytes.len()
                )))?;
        Ok(Self(sized))
    }
}

impl Serialize for SecretHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SecretHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(DeError::custom)
    }
}

/// 对秘密做确定性单向哈希，得到可发布的承诺。
pub fn commit(secret: &Secret) -> SecretHash {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    SecretHash(hasher.finalize().into())
}

/// 校验秘密与承诺是否互相绑定。
pub fn verify(secret: &Secret, hash: &SecretHash) -> bool {
    commit(secret) == *hash
}

/// 链上时间锁是否已过期（链时钟单位，绝对时刻）。
pub fn is_expired(time_lock: u64, now: u64) -> bool {
    now >= time_lock
}

mod error;
pub mod verify;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::hashlock::SecretHash;

pub use error::{ChainError, ChainResult};
pub use verify::{MismatchField, Verification, translate_status, verify_transaction};

/// 原生资产的固定精度（wei，18 位小数）。
pub const NATIVE_DECIMALS: u8 = 18;

const ADDRESS_LEN: usize = 20;

/// 20 字节链上账户地址。解析时统一小写比较，因此相等性天然大小写无关。
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    pub fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
}

impl FromStr for Address {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped)
            .map_err(|_| ChainError::InvalidAddress(s.to_string()))?;
        let sized: [u8; ADDRESS_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| ChainError::InvalidAddress(s.to_string()))?;
        Ok(Self(sized))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(DeError::custom)
    }
}

/// 交易涉及的资产：原生币或以合约地址标识的 ERC20 代币。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssetRef {
    Native,
    Erc20 { contract: Address, decimals: u8 },
}

impl AssetRef {
    pub fn decimals(&self) -> u8 {
        match self {
            AssetRef::Native => NATIVE_DECIMALS,
            AssetRef::Erc20 { decimals, .. } => *decimals,
        }
    }

    pub fn contract(&self) -> Option<&Address> {
        match self {
            AssetRef::Native => None,
            AssetRef::Erc20 { contract, .. } => Some(contract),
        }
    }
}

/// 资金托管在哪一侧合约：付款合约或保证金合约。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscrowKind {
    Payment,
    Deposit,
}

impl EscrowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscrowKind::Payment => "payment",
            EscrowKind::Deposit => "deposit",
        }
    }
}

/// 已离线签名、可直接广播的合约调用。本引擎只转发，从不构造或解签。
#[derive(Debug, Clone)]
pub struct SignedCall {
    pub raw: Vec<u8>,
}

/// 链上已打包交易的解码视图，由外部链客户端提供，本引擎只读。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub tx_id: String,
    pub args: RecordArgs,
}

/// 托管合约调用参数的解码结果。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordArgs {
    pub leg_id: String,
    pub sender: Address,
    pub recipient: Address,
    pub secret_hash: SecretHash,
    pub amount_native: u128,
    #[serde(default)]
    pub token: Option<Address>,
}

/// 合约侧的小整数状态码，封闭枚举：出现未列出的值必须报错，
/// 绝不允许把未知状态默认成任何一档。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscrowStatus {
    Uninitialized,
    Sent,
    ReceiverSpent,
    SenderRefunded,
}

impl EscrowStatus {
    pub fn from_code(code: u64) -> ChainResult<Self> {
        match code {
            0 => Ok(EscrowStatus::Uninitialized),
            1 => Ok(EscrowStatus::Sent),
            2 => Ok(EscrowStatus::ReceiverSpent),
            3 => Ok(EscrowStatus::SenderRefunded),
            other => Err(ChainError::UnknownStatusCode(other)),
        }
    }

    pub fn code(&self) -> u64 {
        match self {
            EscrowStatus::Uninitialized => 0,
            EscrowStatus::Sent => 1,
            EscrowStatus::ReceiverSpent => 2,
            EscrowStatus::SenderRefunded => 3,
        }
    }
}

/// 外部链客户端协作者。签名、广播、余额等均是其职责；
/// 本引擎仅在校验与对账期间短暂借用它，不缓存任何连接状态。
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// 广播已签名调用，返回交易号。
    async fn broadcast(&self, call: &SignedCall) -> ChainResult<String>;

    /// 取回已打包交易的解码记录。
    async fn fetch_transaction(&self, tx_id: &str) -> ChainResult<TransactionRecord>;

    /// 查询某条托管腿在合约侧的状态码。
    async fn query_status(&self, kind: EscrowKind, leg_id: &str) -> ChainResult<u64>;

    /// 从签名材料推导账户地址。
    fn derive_address(&self, key_material: &[u8]) -> ChainResult<Address>;

    /// 查询地址持有的资产余额（原生整数单位）。
    async fn balance_of(&self, address: &Address, asset: &AssetRef) -> ChainResult<u128>;

    /// 查询 ERC20 授权额度（原生整数单位）。
    async fn allowance_of(
        &self,
        owner: &Address,
        spender: &Address,
        asset: &AssetRef,
    ) -> ChainResult<u128>;
}

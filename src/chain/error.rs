use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("链上地址非法: {0}")]
    InvalidAddress(String),
    #[error("未知的托管状态码: {0}")]
    UnknownStatusCode(u64),
    #[error("交易记录无法解码: {0}")]
    MalformedRecord(String),
    #[error("链上 RPC 暂时不可用: {0}")]
    ChainUnavailable(String),
}

impl ChainError {
    /// 仅瞬时传输故障可由调用方按其退避策略重试，本引擎自身从不重试。
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChainError::ChainUnavailable(_))
    }
}

pub type ChainResult<T> = Result<T, ChainError>;

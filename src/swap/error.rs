use thiserror::Error;

use crate::chain::{ChainError, MismatchField};

use super::deal::DealPhase;
use super::leg::LegState;

#[derive(Debug, Error)]
pub enum SwapError {
    #[error("托管腿状态非法: {leg_id} 当前为 {state}, 不允许 {action}")]
    InvalidLegState {
        leg_id: String,
        state: LegState,
        action: &'static str,
    },
    #[error("秘密与哈希锁不匹配: {leg_id}")]
    SecretMismatch { leg_id: String },
    #[error("时间锁尚未到期: {leg_id} 锁定至 {time_lock}, 当前链时间 {now}")]
    TimeLockNotElapsed {
        leg_id: String,
        time_lock: u64,
        now: u64,
    },
    #[error("缺少必需的时间锁: {leg_id}")]
    TimeLockRequired { leg_id: String },
    #[error("时间锁过早: {leg_id} 的 {time_lock} 必须晚于 {min_exclusive}")]
    TimeLockTooShort {
        leg_id: String,
        time_lock: u64,
        min_exclusive: u64,
    },
    #[error("时间锁过晚: {leg_id} 的 {time_lock} 必须早于 {max_exclusive}")]
    TimeLockTooLong {
        leg_id: String,
        time_lock: u64,
        max_exclusive: u64,
    },
    #[error("调用方无权操作该托管腿: {leg_id}, 调用方 {caller}")]
    WrongCaller { leg_id: String, caller: String },
    #[error("哈希锁在交易双方间重复使用: {leg_id}")]
    CommitmentReuse { leg_id: String },
    #[error("托管金额不得为零: {leg_id}")]
    ZeroAmount { leg_id: String },
    #[error("链上记录与预期参数不符: {leg_id} 字段 {field}")]
    Mismatch {
        leg_id: String,
        field: MismatchField,
    },
    #[error("托管腿尚未创建: {0}")]
    LegNotPosted(&'static str),
    #[error("交易阶段非法: {deal_id} 处于 {phase}, 不允许 {action}")]
    InvalidDealPhase {
        deal_id: String,
        phase: DealPhase,
        action: &'static str,
    },
    #[error("本地意图与链上事实冲突: {leg_id} 预期 {expected}, 链上为 {observed}")]
    StatusConflict {
        leg_id: String,
        expected: LegState,
        observed: LegState,
    },
    #[error("链客户端调用失败: {0}")]
    Chain(#[from] ChainError),
}

pub type SwapResult<T> = Result<T, SwapError>;

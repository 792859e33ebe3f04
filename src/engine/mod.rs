use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::chain::{ChainClient, translate_status};
use crate::hashlock::Secret;
use crate::swap::{Deal, LegSlot, LegState, SwapError, SwapResult};

/// 把链上事实对账进本地交易状态的异步驱动。
///
/// 引擎只在单次调用期间借用链客户端，自身不保存任何连接状态；
/// 瞬时 RPC 故障原样上抛，由调用方决定是否退避重试，引擎从不
/// 内部重试，也从不把失败当作成功。
pub struct SwapEngine<'a, C: ChainClient> {
    client: &'a C,
}

impl<'a, C: ChainClient> SwapEngine<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// 取回交易记录并确认某条腿已上链。
    /// 记录与预期不符时交易保持原状，错误中带上首个不一致字段。
    pub async fn confirm_leg_sent(
        &self,
        deal: &mut Deal,
        slot: LegSlot,
        tx_id: &str,
    ) -> SwapResult<()> {
        let record = self.client.fetch_transaction(tx_id).await?;
        deal.confirm_sent(slot, &record)
    }

    /// 查询某条腿在合约侧的即时状态。
    pub async fn observed_state(&self, deal: &Deal, slot: LegSlot) -> SwapResult<LegState> {
        let leg = deal
            .leg(slot)
            .ok_or(SwapError::LegNotPosted(slot.as_str()))?;
        let code = self.client.query_status(leg.kind(), leg.id()).await?;
        let state = translate_status(code)?;
        debug!(
            target: "swap::engine",
            deal = deal.id(),
            slot = %slot,
            code,
            state = %state,
            "escrow status polled"
        );
        Ok(state)
    }

    /// 在链上状态确认为已领取后，把领取动作落回本地交易。
    ///
    /// 链上仍显示在途时返回 `Ok(false)`，留给调用方择机再试；
    /// 链上显示的是相反的终态则报冲突，绝不套用默认解释。
    pub async fn reconcile_claim(
        &self,
        deal: &mut Deal,
        slot: LegSlot,
        secret: &Secret,
    ) -> SwapResult<bool> {
        match self.observed_state(deal, slot).await? {
            LegState::Claimed => {}
            LegState::Pending | LegState::Sent => return Ok(false),
            observed => {
                let leg = deal
                    .leg(slot)
                    .ok_or(SwapError::LegNotPosted(slot.as_str()))?;
                return Err(SwapError::StatusConflict {
                    leg_id: leg.id().to_string(),
                    expected: LegState::Claimed,
                    observed,
                });
            }
        }
        match slot {
            LegSlot::ResponderPayment => deal.initiator_claims_responder_payment(secret)?,
            LegSlot::InitiatorPayment => deal.responder_claims_initiator_payment(secret)?,
            LegSlot::Deposit => deal.initiator_claims_deposit(secret)?,
        }
        info!(
            target: "swap::engine",
            deal = deal.id(),
            slot = %slot,
            "claim reconciled with on-chain evidence"
        );
        Ok(true)
    }

    /// 在链上状态确认为已赎回后，把赎回动作落回本地交易。
    pub async fn reconcile_reclaim(
        &self,
        deal: &mut Deal,
        slot: LegSlot,
        secret: &Secret,
        now: u64,
    ) -> SwapResult<bool> {
        match self.observed_state(deal, slot).await? {
            LegState::Refunded => {}
            LegState::Pending | LegState::Sent => return Ok(false),
            observed => {
                let leg = deal
                    .leg(slot)
                    .ok_or(SwapError::LegNotPosted(slot.as_str()))?;
                return Err(SwapError::StatusConflict {
                    leg_id: leg.id().to_string(),
                    expected: LegState::Refunded,
                    observed,
                });
            }
        }
        match slot {
            LegSlot::Deposit => deal.responder_reclaims_deposit(secret, now)?,
            LegSlot::InitiatorPayment => deal.initiator_reclaims_payment(secret, now)?,
            LegSlot::ResponderPayment => deal.responder_reclaims_payment(secret, now)?,
        }
        info!(
            target: "swap::engine",
            deal = deal.id(),
            slot = %slot,
            "reclaim reconciled with on-chain evidence"
        );
        Ok(true)
    }
}

/// 同一笔交易的单写者句柄：了结动作持锁串行执行，避免两条
/// 了结路径在链上结果落定前都自以为成功。不同交易互不阻塞。
#[derive(Clone)]
pub struct SharedDeal {
    inner: Arc<Mutex<Deal>>,
}

impl SharedDeal {
    pub fn new(deal: Deal) -> Self {
        Self {
            inner: Arc::new(Mutex::new(deal)),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, Deal> {
        self.inner.lock().await
    }
}

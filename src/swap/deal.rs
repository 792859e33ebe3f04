use std::fmt;

use tracing::{info, warn};

use crate::chain::{Address, AssetRef, EscrowKind, TransactionRecord, verify_transaction};
use crate::hashlock::{Secret, SecretHash};

use super::error::{SwapError, SwapResult};
use super::leg::{Leg, LegState};

/// 交易整体推进到的阶段，由各条腿的状态推导而来。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DealPhase {
    /// 保证金尚未上链。
    Setup,
    /// 保证金已上链，等待发起方付款。
    DepositSecured,
    /// 发起方付款已上链，等待应答方付款。
    PaymentsInFlight,
    /// 双方付款均已上链，进入领取与清算。
    Settling,
    /// 双方付款均被领取，保证金已了结。
    Completed,
    /// 交换未能按协议完成，各方走赎回路径。
    Aborted,
}

impl DealPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DealPhase::Completed | DealPhase::Aborted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DealPhase::Setup => "setup",
            DealPhase::DepositSecured => "deposit_secured",
            DealPhase::PaymentsInFlight => "payments_in_flight",
            DealPhase::Settling => "settling",
            DealPhase::Completed => "completed",
            DealPhase::Aborted => "aborted",
        }
    }
}

impl fmt::Display for DealPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 交易中三条腿的槽位。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegSlot {
    Deposit,
    InitiatorPayment,
    ResponderPayment,
}

impl LegSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            LegSlot::Deposit => "deposit",
            LegSlot::InitiatorPayment => "initiator_payment",
            LegSlot::ResponderPayment => "responder_payment",
        }
    }
}

impl fmt::Display for LegSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一次完整的双方资产交换：应答方保证金加双方各一笔付款。
///
/// 腿的创建与了结必须遵守协议时序；任何 `Sent` 转移都要求
/// 校验适配器的链上证据，本结构绝不凭本地断言推进状态。
#[derive(Debug)]
pub struct Deal {
    id: String,
    initiator: Address,
    responder: Address,
    deposit: Option<Leg>,
    initiator_payment: Option<Leg>,
    responder_payment: Option<Leg>,
    revealed_secret: Option<Secret>,
    phase: DealPhase,
}

impl Deal {
    pub fn new(id: impl Into<String>, initiator: Address, responder: Address) -> Self {
        Self {
            id: id.into(),
            initiator,
            responder,
            deposit: None,
            initiator_payment: None,
            responder_payment: None,
            revealed_secret: None,
            phase: DealPhase::Setup,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn initiator(&self) -> &Address {
        &self.initiator
    }

    pub fn responder(&self) -> &Address {
        &self.responder
    }

    pub fn phase(&self) -> DealPhase {
        self.phase
    }

    pub fn leg(&self, slot: LegSlot) -> Option<&Leg> {
        match slot {
            LegSlot::Deposit => self.deposit.as_ref(),
            LegSlot::InitiatorPayment => self.initiator_payment.as_ref(),
            LegSlot::ResponderPayment => self.responder_payment.as_ref(),
        }
    }

    pub fn deposit(&self) -> Option<&Leg> {
        self.deposit.as_ref()
    }

    pub fn initiator_payment(&self) -> Option<&Leg> {
        self.initiator_payment.as_ref()
    }

    pub fn responder_payment(&self) -> Option<&Leg> {
        self.responder_payment.as_ref()
    }

    /// 共享秘密首次在链上公开后的本地留存。
    pub fn revealed_secret(&self) -> Option<&Secret> {
        self.revealed_secret.as_ref()
    }

    /// 是否可以归档：所有已建的腿均到终态，或尚无任何腿离开 `Pending`。
    pub fn can_archive(&self) -> bool {
        let legs: Vec<&Leg> = [
            self.deposit.as_ref(),
            self.initiator_payment.as_ref(),
            self.responder_payment.as_ref(),
        ]
        .into_iter()
        .flatten()
        .collect();
        legs.iter().all(|leg| leg.state().is_terminal())
            || legs.iter().all(|leg| leg.state() == LegState::Pending)
    }

    fn ensure_phase(&self, expected: DealPhase, action: &'static str) -> SwapResult<()> {
        if self.phase != expected {
            return Err(SwapError::InvalidDealPhase {
                deal_id: self.id.clone(),
                phase: self.phase,
                action,
            });
        }
        Ok(())
    }

    fn ensure_not_finished(&self, action: &'static str) -> SwapResult<()> {
        if self.phase.is_terminal() {
            return Err(SwapError::InvalidDealPhase {
                deal_id: self.id.clone(),
                phase: self.phase,
                action,
            });
        }
        Ok(())
    }

    /// 应答方把保证金作为诚意押入。保证金的哈希锁是应答方自己的承诺。
    pub fn post_deposit(
        &mut self,
        leg_id: impl Into<String>,
        asset: AssetRef,
        amount: u64,
        commitment: SecretHash,
        time_lock: u64,
    ) -> SwapResult<&Leg> {
        self.ensure_phase(DealPhase::Setup, "post_deposit")?;
        if self.deposit.is_some() {
            return Err(SwapError::InvalidDealPhase {
                deal_id: self.id.clone(),
                phase: self.phase,
                action: "post_deposit",
            });
        }
        let leg = Leg::new(
            leg_id,
            EscrowKind::Deposit,
            self.responder,
            self.initiator,
            asset,
            amount,
            commitment,
            Some(time_lock),
        )?;
        info!(
            target: "swap::deal",
            deal = %self.id,
            leg = leg.id(),
            time_lock,
            "deposit leg created"
        );
        Ok(self.deposit.insert(leg))
    }

    /// 发起方付款。哈希锁必须是新的承诺，时间锁要给足比保证金更长的回旋余地。
    pub fn post_initiator_payment(
        &mut self,
        leg_id: impl Into<String>,
        asset: AssetRef,
        amount: u64,
        commitment: SecretHash,
        time_lock: u64,
    ) -> SwapResult<&Leg> {
        self.ensure_phase(DealPhase::DepositSecured, "post_initiator_payment")?;
        if self.initiator_payment.is_some() {
            return Err(SwapError::InvalidDealPhase {
                deal_id: self.id.clone(),
                phase: self.phase,
                action: "post_initiator_payment",
            });
        }
        let leg_id = leg_id.into();
        let deposit = self
            .deposit
            .as_ref()
            .ok_or(SwapError::LegNotPosted("deposit"))?;
        let deposit_lock = deposit.time_lock().ok_or_else(|| SwapError::TimeLockRequired {
            leg_id: deposit.id().to_string(),
        })?;
        if time_lock <= deposit_lock {
            return Err(SwapError::TimeLockTooShort {
                leg_id,
                time_lock,
                min_exclusive: deposit_lock,
            });
        }
        if commitment == *deposit.commitment() {
            return Err(SwapError::CommitmentReuse { leg_id });
        }
        let leg = Leg::new(
            leg_id,
            EscrowKind::Payment,
            self.initiator,
            self.responder,
            asset,
            amount,
            commitment,
            Some(time_lock),
        )?;
        info!(
            target: "swap::deal",
            deal = %self.id,
            leg = leg.id(),
            time_lock,
            "initiator payment leg created"
        );
        Ok(self.initiator_payment.insert(leg))
    }

    /// 应答方付款。哈希锁由本结构直接从发起方付款复制，杜绝承诺错配；
    /// 时间锁必须严格早于发起方付款，令应答方先于发起方获得赎回权。
    pub fn post_responder_payment(
        &mut self,
        leg_id: impl Into<String>,
        asset: AssetRef,
        amount: u64,
        time_lock: u64,
    ) -> SwapResult<&Leg> {
        self.ensure_phase(DealPhase::PaymentsInFlight, "post_responder_payment")?;
        if self.responder_payment.is_some() {
            return Err(SwapError::InvalidDealPhase {
                deal_id: self.id.clone(),
                phase: self.phase,
                action: "post_responder_payment",
            });
        }
        let leg_id = leg_id.into();
        let initiator_payment = self
            .initiator_payment
            .as_ref()
            .ok_or(SwapError::LegNotPosted("initiator_payment"))?;
        let initiator_lock =
            initiator_payment
                .time_lock()
                .ok_or_else(|| SwapError::TimeLockRequired {
                    leg_id: initiator_payment.id().to_string(),
                })?;
        if time_lock >= initiator_lock {
            return Err(SwapError::TimeLockTooLong {
                leg_id,
                time_lock,
                max_exclusive: initiator_lock,
            });
        }
        let commitment = *initiator_payment.commitment();
        let leg = Leg::new(
            leg_id,
            EscrowKind::Payment,
            self.responder,
            self.initiator,
            asset,
            amount,
            commitment,
            Some(time_lock),
        )?;
        info!(
            target: "swap::deal",
            deal = %self.id,
            leg = leg.id(),
            time_lock,
            "responder payment leg created"
        );
        Ok(self.responder_payment.insert(leg))
    }

    /// 用外部取回的链上记录确认某条腿已上链。
    /// 校验适配器是离开 `Pending` 的唯一闸门。
    pub fn confirm_sent(&mut self, slot: LegSlot, record: &TransactionRecord) -> SwapResult<()> {
        self.ensure_not_finished("confirm_sent")?;
        let deal_id = self.id.clone();
        let leg = self
            .leg_mut(slot)
            .ok_or(SwapError::LegNotPosted(slot.as_str()))?;
        let verification = verify_transaction(leg, record);
        let result = leg.mark_sent(verification, record.tx_id.clone());
        match &result {
            Ok(()) => {
                info!(
                    target: "swap::deal",
                    deal = %deal_id,
                    slot = %slot,
                    tx = %record.tx_id,
                    "leg confirmed on-chain"
                );
            }
            Err(err) => {
                warn!(
                    target: "swap::deal",
                    deal = %deal_id,
                    slot = %slot,
                    tx = %record.tx_id,
                    error = %err,
                    "on-chain record rejected"
                );
            }
        }
        result?;
        self.refresh_phase();
        Ok(())
    }

    /// 第 4 步：发起方领取应答方付款，共享秘密自此公开。
    pub fn initiator_claims_responder_payment(&mut self, secret: &Secret) -> SwapResult<()> {
        let initiator = self.initiator;
        let deal_id = self.id.clone();
        let leg = self
            .responder_payment
            .as_mut()
            .ok_or(SwapError::LegNotPosted("responder_payment"))?;
        leg.claim(secret, &initiator)?;
        if self.revealed_secret.is_none() {
            self.revealed_secret = Some(secret.clone());
        }
        info!(
            target: "swap::deal",
            deal = %deal_id,
            "responder payment claimed, swap secret now public"
        );
        self.refresh_phase();
        Ok(())
    }

    /// 第 5 步：应答方用已公开的秘密领取发起方付款。
    pub fn responder_claims_initiator_payment(&mut self, secret: &Secret) -> SwapResult<()> {
        let responder = self.responder;
        let deal_id = self.id.clone();
        let leg = self
            .initiator_payment
            .as_mut()
            .ok_or(SwapError::LegNotPosted("initiator_payment"))?;
        leg.claim(secret, &responder)?;
        if self.revealed_secret.is_none() {
            self.revealed_secret = Some(secret.clone());
        }
        info!(
            target: "swap::deal",
            deal = %deal_id,
            "initiator payment claimed"
        );
        self.refresh_phase();
        Ok(())
    }

    /// 应答方在保证金时间锁到期后赎回。若此刻双方付款尚未齐备，
    /// 交易随之进入中止清算。
    pub fn responder_reclaims_deposit(&mut self, secret: &Secret, now: u64) -> SwapResult<()> {
        let responder = self.responder;
        let deal_id = self.id.clone();
        let leg = self
            .deposit
            .as_mut()
            .ok_or(SwapError::LegNotPosted("deposit"))?;
        leg.reclaim(secret, &responder, now)?;
        info!(target: "swap::deal", deal = %deal_id, "deposit reclaimed by responder");
        self.refresh_phase();
        Ok(())
    }

    /// 与赎回互斥的补偿路径：发起方领走保证金。链上先落地者为准。
    pub fn initiator_claims_deposit(&mut self, secret: &Secret) -> SwapResult<()> {
        let initiator = self.initiator;
        let deal_id = self.id.clone();
        let leg = self
            .deposit
            .as_mut()
            .ok_or(SwapError::LegNotPosted("deposit"))?;
        leg.claim(secret, &initiator)?;
        info!(target: "swap::deal", deal = %deal_id, "deposit claimed by initiator as compensation");
        self.refresh_phase();
        Ok(())
    }

    /// 中止路径：应答方付款迟迟未上链，发起方到期赎回自己的付款。
    pub fn initiator_reclaims_payment(&mut self, secret: &Secret, now: u64) -> SwapResult<()> {
        let initiator = self.initiator;
        let deal_id = self.id.clone();
        let leg = self
            .initiator_payment
            .as_mut()
            .ok_or(SwapError::LegNotPosted("initiator_payment"))?;
        leg.reclaim(secret, &initiator, now)?;
        info!(target: "swap::deal", deal = %deal_id, "initiator payment reclaimed");
        self.refresh_phase();
        Ok(())
    }

    /// 中止路径：发起方迟迟不领取，应答方到期赎回自己的付款。
    pub fn responder_reclaims_payment(&mut self, secret: &Secret, now: u64) -> SwapResult<()> {
        let responder = self.responder;
        let deal_id = self.id.clone();
        let leg = self
            .responder_payment
            .as_mut()
            .ok_or(SwapError::LegNotPosted("responder_payment"))?;
        leg.reclaim(secret, &responder, now)?;
        info!(target: "swap::deal", deal = %deal_id, "responder payment reclaimed");
        self.refresh_phase();
        Ok(())
    }

    fn leg_mut(&mut self, slot: LegSlot) -> Option<&mut Leg> {
        match slot {
            LegSlot::Deposit => self.deposit.as_mut(),
            LegSlot::InitiatorPayment => self.initiator_payment.as_mut(),
            LegSlot::ResponderPayment => self.responder_payment.as_mut(),
        }
    }

    fn refresh_phase(&mut self) {
        if self.phase.is_terminal() {
            return;
        }

        let claimed =
            |leg: Option<&Leg>| leg.is_some_and(|leg| leg.state() == LegState::Claimed);
        let refunded =
            |leg: Option<&Leg>| leg.is_some_and(|leg| leg.state() == LegState::Refunded);
        let on_chain = |leg: Option<&Leg>| {
            leg.is_some_and(|leg| matches!(leg.state(), LegState::Sent | LegState::Claimed))
        };

        let deposit = self.deposit.as_ref();
        let p1 = self.initiator_payment.as_ref();
        let p2 = self.responder_payment.as_ref();
        let deposit_terminal = deposit.is_some_and(|leg| leg.state().is_terminal());

        let next = if claimed(p1) && claimed(p2) && deposit_terminal {
            DealPhase::Completed
        } else if refunded(p1) || refunded(p2) {
            DealPhase::Aborted
        } else if deposit_terminal && !(on_chain(p1) && on_chain(p2)) {
            // 保证金已了结而付款未齐备, 正常完成再无可能
            DealPhase::Aborted
        } else if on_chain(p1) && on_chain(p2) {
            DealPhase::Settling
        } else if on_chain(p1) {
            DealPhase::PaymentsInFlight
        } else if deposit.is_some_and(|leg| leg.state() == LegState::Sent) {
            DealPhase::DepositSecured
        } else {
            DealPhase::Setup
        };

        if next != self.phase {
            info!(
                target: "swap::deal",
                deal = %self.id,
                from = %self.phase,
                to = %next,
                "deal phase advanced"
            );
            self.phase = next;
        }
    }
}

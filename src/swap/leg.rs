use std::fmt;

use crate::chain::{Address, AssetRef, EscrowKind, Verification};
use crate::hashlock::{self, Secret, SecretHash};
use crate::units::{self, UnitsResult};

use super::error::{SwapError, SwapResult};

/// 托管腿的生命周期状态。`Claimed` 与 `Refunded` 为终态，不可再变。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegState {
    Pending,
    Sent,
    Claimed,
    Refunded,
}

impl LegState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LegState::Claimed | LegState::Refunded)
    }
}

impl fmt::Display for LegState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LegState::Pending => "pending",
            LegState::Sent => "sent",
            LegState::Claimed => "claimed",
            LegState::Refunded => "refunded",
        };
        f.write_str(label)
    }
}

/// 一笔带哈希锁（及可选时间锁）的单向转账。
///
/// 参数一经固定即进入 `Pending`；只有校验适配器确认链上存在匹配
/// 记录后才进入 `Sent`；终态由对方领取（`Claimed`）或原主到期
/// 赎回（`Refunded`）二选一。
#[derive(Debug, Clone)]
pub struct Leg {
    id: String,
    kind: EscrowKind,
    owner: Address,
    counterparty: Address,
    asset: AssetRef,
    amount: u64,
    commitment: SecretHash,
    time_lock: Option<u64>,
    state: LegState,
    revealed_secret: Option<Secret>,
    tx_id: Option<String>,
}

impl Leg {
    pub fn new(
        id: impl Into<String>,
        kind: EscrowKind,
        owner: Address,
        counterparty: Address,
        asset: AssetRef,
        amount: u64,
        commitment: SecretHash,
        time_lock: Option<u64>,
    ) -> SwapResult<Self> {
        let id = id.into();
        if amount == 0 {
            return Err(SwapError::ZeroAmount { leg_id: id });
        }
        // 保证金没有时间锁就失去了兜底意义
        if kind == EscrowKind::Deposit && time_lock.is_none() {
            return Err(SwapError::TimeLockRequired { leg_id: id });
        }
        Ok(Self {
            id,
            kind,
            owner,
            counterparty,
            asset,
            amount,
            commitment,
            time_lock,
            state: LegState::Pending,
            revealed_secret: None,
            tx_id: None,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> EscrowKind {
        self.kind
    }

    pub fn owner(&self) -> &Address {
        &self.owner
    }

    pub fn counterparty(&self) -> &Address {
        &self.counterparty
    }

    pub fn asset(&self) -> &AssetRef {
        &self.asset
    }

    /// 协议统一单位（8 位小数）下的金额。
    pub fn amount(&self) -> u64 {
        self.amount
    }

    /// 按资产精度还原的原生整数金额。
    pub fn native_amount(&self) -> UnitsResult<u128> {
        units::to_native(self.amount, self.asset.decimals())
    }

    pub fn commitment(&self) -> &SecretHash {
        &self.commitment
    }

    pub fn time_lock(&self) -> Option<u64> {
        self.time_lock
    }

    pub fn state(&self) -> LegState {
        self.state
    }

    /// 解锁该腿的秘密，仅在终态后存在。
    pub fn revealed_secret(&self) -> Option<&Secret> {
        self.revealed_secret.as_ref()
    }

    pub fn tx_id(&self) -> Option<&str> {
        self.tx_id.as_deref()
    }

    fn ensure_state(&self, expected: LegState, action: &'static str) -> SwapResult<()> {
        if self.state != expected {
            return Err(SwapError::InvalidLegState {
                leg_id: self.id.clone(),
                state: self.state,
                action,
            });
        }
        Ok(())
    }

    /// 凭校验适配器的通过结论把腿标记为已上链。
    /// 这是离开 `Pending` 的唯一通道；不带证据的本地断言无效。
    pub fn mark_sent(
        &mut self,
        verification: Verification,
        tx_id: impl Into<String>,
    ) -> SwapResult<()> {
        self.ensure_state(LegState::Pending, "mark_sent")?;
        if let Verification::Mismatch(field) = verification {
            return Err(SwapError::Mismatch {
                leg_id: self.id.clone(),
                field,
            });
        }
        self.tx_id = Some(tx_id.into());
        self.state = LegState::Sent;
        Ok(())
    }

    /// 对方出示正确秘密领取资金。付款腿只允许收款方领取；
    /// 保证金腿的领取权限由交易层的时序规则约束。
    pub fn claim(&mut self, secret: &Secret, caller: &Address) -> SwapResult<()> {
        self.ensure_state(LegState::Sent, "claim")?;
        if self.kind == EscrowKind::Payment && caller != &self.counterparty {
            return Err(SwapError::WrongCaller {
                leg_id: self.id.clone(),
                caller: caller.to_string(),
            });
        }
        if !hashlock::verify(secret, &self.commitment) {
            return Err(SwapError::SecretMismatch {
                leg_id: self.id.clone(),
            });
        }
        self.revealed_secret = Some(secret.clone());
        self.state = LegState::Claimed;
        Ok(())
    }

    /// 原主在时间锁到期后赎回资金。除签名身份外仍须出示原始秘密，
    /// 把赎回动作绑定回最初的承诺。
    pub fn reclaim(&mut self, secret: &Secret, caller: &Address, now: u64) -> SwapResult<()> {
        self.ensure_state(LegState::Sent, "reclaim")?;
        if caller != &self.owner {
            return Err(SwapError::WrongCaller {
                leg_id: self.id.clone(),
                caller: caller.to_string(),
            });
        }
        let time_lock = self.time_lock.ok_or_else(|| SwapError::TimeLockRequired {
            leg_id: self.id.clone(),
        })?;
        if !hashlock::is_expired(time_lock, now) {
            return Err(SwapError::TimeLockNotElapsed {
                leg_id: self.id.clone(),
                time_lock,
                now,
            });
        }
        if !hashlock::verify(secret, &self.commitment) {
            return Err(SwapError::SecretMismatch {
                leg_id: self.id.clone(),
            });
        }
        self.revealed_secret = Some(secret.clone());
        self.state = LegState::Refunded;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MismatchField;
    use crate::hashlock::commit;

    fn addr(tag: u8) -> Address {
        Address::from_bytes([tag; 20])
    }

    fn sent_payment(secret: &Secret, time_lock: Option<u64>) -> Leg {
        let mut leg = Leg::new(
            "p-1",
            EscrowKind::Payment,
            addr(1),
            addr(2),
            AssetRef::Native,
            100_000_000,
            commit(secret),
            time_lock,
        )
        .expect("build leg");
        leg.mark_sent(Verification::Verified, "0xabc").expect("mark sent");
        leg
    }

    #[test]
    fn zero_amount_is_rejected() {
        let secret = Secret::generate();
        let err = Leg::new(
            "p-0",
            EscrowKind::Payment,
            addr(1),
            addr(2),
            AssetRef::Native,
            0,
            commit(&secret),
            None,
        )
        .expect_err("zero amount");
        assert!(matches!(err, SwapError::ZeroAmount { .. }));
    }

    #[test]
    fn deposit_requires_time_lock() {
        let secret = Secret::generate();
        let err = Leg::new(
            "d-0",
            EscrowKind::Deposit,
            addr(1),
            addr(2),
            AssetRef::Native,
            1,
            commit(&secret),
            None,
        )
        .expect_err("deposit without lock");
        assert!(matches!(err, SwapError::TimeLockRequired { .. }));
    }

    #[test]
    fn mark_sent_rejects_mismatch_evidence() {
        let secret = Secret::generate();
        let mut leg = Leg::new(
            "p-1",
            EscrowKind::Payment,
            addr(1),
            addr(2),
            AssetRef::Native,
            1,
            commit(&secret),
            None,
        )
        .expect("build leg");
        let err = leg
            .mark_sent(Verification::Mismatch(MismatchField::Amount), "0xabc")
            .expect_err("mismatch must not advance");
        assert!(matches!(
            err,
            SwapError::Mismatch {
                field: MismatchField::Amount,
                ..
            }
        ));
        assert_eq!(leg.state(), LegState::Pending);
    }

    #[test]
    fn claim_requires_counterparty_on_payment() {
        let secret = Secret::generate();
        let mut leg = sent_payment(&secret, None);
        let err = leg.claim(&secret, &addr(1)).expect_err("owner cannot claim");
        assert!(matches!(err, SwapError::WrongCaller { .. }));
        leg.claim(&secret, &addr(2)).expect("counterparty claims");
        assert_eq!(leg.state(), LegState::Claimed);
        assert_eq!(leg.revealed_secret(), Some(&secret));
    }

    #[test]
    fn claim_rejects_wrong_secret() {
        let secret = Secret::generate();
        let mut leg = sent_payment(&secret, None);
        let err = leg
            .claim(&Secret::generate(), &addr(2))
            .expect_err("wrong secret");
        assert!(matches!(err, SwapError::SecretMismatch { .. }));
        assert_eq!(leg.state(), LegState::Sent);
    }

    #[test]
    fn reclaim_before_expiry_fails_even_with_correct_secret() {
        let secret = Secret::generate();
        let mut leg = sent_payment(&secret, Some(1_000));
        let err = leg.reclaim(&secret, &addr(1), 999).expect_err("not expired");
        assert!(matches!(err, SwapError::TimeLockNotElapsed { .. }));
        leg.reclaim(&secret, &addr(1), 1_000).expect("expired at boundary");
        assert_eq!(leg.state(), LegState::Refunded);
    }

    #[test]
    fn reclaim_requires_owner() {
        let secret = Secret::generate();
        let mut leg = sent_payment(&secret, Some(10));
        let err = leg
            .reclaim(&secret, &addr(2), 20)
            .expect_err("counterparty cannot reclaim");
        assert!(matches!(err, SwapError::WrongCaller { .. }));
    }

    #[test]
    fn terminal_state_is_immutable() {
        let secret = Secret::generate();
        let mut leg = sent_payment(&secret, Some(10));
        leg.claim(&secret, &addr(2)).expect("claim");
        for _ in 0..2 {
            let err = leg.claim(&secret, &addr(2)).expect_err("claimed is terminal");
            assert!(matches!(err, SwapError::InvalidLegState { .. }));
            let err = leg
                .reclaim(&secret, &addr(1), u64::MAX)
                .expect_err("claimed is terminal");
            assert!(matches!(err, SwapError::InvalidLegState { .. }));
        }
    }

    #[test]
    fn pending_leg_cannot_resolve() {
        let secret = Secret::generate();
        let mut leg = Leg::new(
            "p-1",
            EscrowKind::Payment,
            addr(1),
            addr(2),
            AssetRef::Native,
            1,
            commit(&secret),
            Some(10),
        )
        .expect("build leg");
        assert!(matches!(
            leg.claim(&secret, &addr(2)),
            Err(SwapError::InvalidLegState { .. })
        ));
        assert!(matches!(
            leg.reclaim(&secret, &addr(1), 20),
            Err(SwapError::InvalidLegState { .. })
        ));
    }
}

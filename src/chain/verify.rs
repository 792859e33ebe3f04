use std::fmt;

use tracing::debug;

use crate::swap::{Leg, LegState};
use crate::units;

use super::error::ChainResult;
use super::{EscrowStatus, TransactionRecord};

/// 链上记录与预期参数逐字段比对后第一个不一致的字段。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchField {
    LegId,
    Owner,
    Counterparty,
    Commitment,
    Amount,
    Token,
}

impl MismatchField {
    pub fn as_str(&self) -> &'static str {
        match self {
            MismatchField::LegId => "leg_id",
            MismatchField::Owner => "owner",
            MismatchField::Counterparty => "counterparty",
            MismatchField::Commitment => "commitment",
            MismatchField::Amount => "amount",
            MismatchField::Token => "token",
        }
    }
}

impl fmt::Display for MismatchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 比对结论。只有 `Verified` 才允许托管腿离开 `Pending`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Verified,
    Mismatch(MismatchField),
}

/// 把外部取回的链上交易记录与调用方认定的托管腿参数逐字段比对。
///
/// 金额先经统一单位换算再比较；换算不出精确值的记录（例如带有
/// 低位尘埃的原生金额）不可能与任何合法托管腿相等，按金额不符
/// 处理并留下日志。
pub fn verify_transaction(expected: &Leg, record: &TransactionRecord) -> Verification {
    let args = &record.args;

    if args.leg_id != expected.id() {
        return Verification::Mismatch(MismatchField::LegId);
    }
    if &args.sender != expected.owner() {
        return Verification::Mismatch(MismatchField::Owner);
    }
    if &args.recipient != expected.counterparty() {
        return Verification::Mismatch(MismatchField::Counterparty);
    }
    if &args.secret_hash != expected.commitment() {
        return Verification::Mismatch(MismatchField::Commitment);
    }

    let decimals = expected.asset().decimals();
    match units::to_canonical(args.amount_native, decimals) {
        Ok(canonical) if canonical == expected.amount() => {}
        Ok(canonical) => {
            debug!(
                target: "chain::verify",
                leg_id = expected.id(),
                expected = expected.amount(),
                observed = canonical,
                "on-chain amount differs from expected leg amount"
            );
            return Verification::Mismatch(MismatchField::Amount);
        }
        Err(err) => {
            debug!(
                target: "chain::verify",
                leg_id = expected.id(),
                error = %err,
                "on-chain amount not representable in canonical units"
            );
            return Verification::Mismatch(MismatchField::Amount);
        }
    }

    if args.token.as_ref() != expected.asset().contract() {
        return Verification::Mismatch(MismatchField::Token);
    }

    Verification::Verified
}

/// 把合约侧状态码翻译为托管腿状态。未知状态码按错误上报，
/// 绝不默认归入任何一档。
pub fn translate_status(code: u64) -> ChainResult<LegState> {
    let status = EscrowStatus::from_code(code)?;
    Ok(match status {
        EscrowStatus::Uninitialized => LegState::Pending,
        EscrowStatus::Sent => LegState::Sent,
        EscrowStatus::ReceiverSpent => LegState::Claimed,
        EscrowStatus::SenderRefunded => LegState::Refunded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{Address, AssetRef, ChainError, EscrowKind, RecordArgs};
    use crate::hashlock::{Secret, commit};
    use crate::swap::Leg;

    fn addr(tag: u8) -> Address {
        Address::from_bytes([tag; 20])
    }

    fn erc20_leg(secret: &Secret) -> Leg {
        Leg::new(
            "deal-1/payment",
            EscrowKind::Payment,
            addr(1),
            addr(2),
            AssetRef::Erc20 {
                contract: addr(9),
                decimals: 18,
            },
            150_000_000,
            commit(secret),
            Some(5_000),
        )
        .expect("build leg")
    }

    fn matching_record(leg: &Leg) -> TransactionRecord {
        TransactionRecord {
            tx_id: "0xfeed".to_string(),
            args: RecordArgs {
                leg_id: leg.id().to_string(),
                sender: *leg.owner(),
                recipient: *leg.counterparty(),
                secret_hash: *leg.commitment(),
                amount_native: 1_500_000_000_000_000_000,
                token: leg.asset().contract().copied(),
            },
        }
    }

    #[test]
    fn full_match_verifies() {
        let secret = Secret::generate();
        let leg = erc20_leg(&secret);
        let record = matching_record(&leg);
        assert_eq!(verify_transaction(&leg, &record), Verification::Verified);
    }

    #[test]
    fn amount_mismatch_after_decimal_conversion() {
        let secret = Secret::generate();
        let leg = erc20_leg(&secret);
        let mut record = matching_record(&leg);
        record.args.amount_native = 1_400_000_000_000_000_000;
        assert_eq!(
            verify_transaction(&leg, &record),
            Verification::Mismatch(MismatchField::Amount)
        );
    }

    #[test]
    fn dust_amount_cannot_match() {
        let secret = Secret::generate();
        let leg = erc20_leg(&secret);
        let mut record = matching_record(&leg);
        record.args.amount_native = 1_500_000_000_000_000_001;
        assert_eq!(
            verify_transaction(&leg, &record),
            Verification::Mismatch(MismatchField::Amount)
        );
    }

    #[test]
    fn commitment_mismatch_is_detected() {
        let secret = Secret::generate();
        let leg = erc20_leg(&secret);
        let mut record = matching_record(&leg);
        record.args.secret_hash = commit(&Secret::generate());
        assert_eq!(
            verify_transaction(&leg, &record),
            Verification::Mismatch(MismatchField::Commitment)
        );
    }

    #[test]
    fn token_identity_mismatch_is_detected() {
        let secret = Secret::generate();
        let leg = erc20_leg(&secret);
        let mut record = matching_record(&leg);
        record.args.token = Some(addr(8));
        assert_eq!(
            verify_transaction(&leg, &record),
            Verification::Mismatch(MismatchField::Token)
        );
    }

    #[test]
    fn counterparty_mismatch_is_detected() {
        let secret = Secret::generate();
        let leg = erc20_leg(&secret);
        let mut record = matching_record(&leg);
        record.args.recipient = addr(7);
        assert_eq!(
            verify_transaction(&leg, &record),
            Verification::Mismatch(MismatchField::Counterparty)
        );
    }

    #[test]
    fn status_translation_covers_contract_codes() {
        assert_eq!(translate_status(0).expect("0"), LegState::Pending);
        assert_eq!(translate_status(1).expect("1"), LegState::Sent);
        assert_eq!(translate_status(2).expect("2"), LegState::Claimed);
        assert_eq!(translate_status(3).expect("3"), LegState::Refunded);
        assert!(matches!(
            translate_status(4),
            Err(ChainError::UnknownStatusCode(4))
        ));
    }
}

use thiserror::Error;

/// 协议统一采用的金额精度（8 位小数，即“聪”表示）。
pub const CANONICAL_DECIMALS: u8 = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnitsError {
    #[error("单位换算会丢弃非零低位: 原生金额 {native}, 代币精度 {decimals}")]
    PrecisionLoss { native: u128, decimals: u8 },
    #[error("单位换算超出可表示范围: 原生金额 {native}, 代币精度 {decimals}")]
    AmountOverflow { native: u128, decimals: u8 },
}

pub type UnitsResult<T> = Result<T, UnitsError>;

// u128 最多容纳 10^38，再高的指数直接按溢出/丢精度处理。
const MAX_POW10_EXP: u32 = 38;

fn pow10(exp: u32) -> u128 {
    10u128.pow(exp)
}

/// 把代币原生整数金额换算为协议统一的 8 位小数金额。
///
/// 精度不超过 8 位时做无损放大；超过 8 位时仅当被截断的低位
/// 全为零才允许缩小，否则视为错误而不是悄悄截断。
pub fn to_canonical(native: u128, decimals: u8) -> UnitsResult<u64> {
    if decimals <= CANONICAL_DECIMALS {
        let exp = u32::from(CANONICAL_DECIMALS - decimals);
        let scaled = native
            .checked_mul(pow10(exp))
            .ok_or(UnitsError::AmountOverflow { native, decimals })?;
        return u64::try_from(scaled).map_err(|_| UnitsError::AmountOverflow { native, decimals });
    }

    let exp = u32::from(decimals - CANONICAL_DECIMALS);
    if exp > MAX_POW10_EXP {
        // 除数超出 u128 表示范围, 非零金额必然丢精度。
        return if native == 0 {
            Ok(0)
        } else {
            Err(UnitsError::PrecisionLoss { native, decimals })
        };
    }

    let divisor = pow10(exp);
    if native % divisor != 0 {
        return Err(UnitsError::PrecisionLoss { native, decimals });
    }
    u64::try_from(native / divisor).map_err(|_| UnitsError::AmountOverflow { native, decimals })
}

/// `to_canonical` 的精确逆运算：把 8 位小数金额还原为代币原生整数金额。
pub fn to_native(canonical: u64, decimals: u8) -> UnitsResult<u128> {
    let native = u128::from(canonical);
    if decimals >= CANONICAL_DECIMALS {
        let exp = u32::from(decimals - CANONICAL_DECIMALS);
        if exp > MAX_POW10_EXP {
            return if canonical == 0 {
                Ok(0)
            } else {
                Err(UnitsError::AmountOverflow { native, decimals })
            };
        }
        return native
            .checked_mul(pow10(exp))
            .ok_or(UnitsError::AmountOverflow { native, decimals });
    }

    let divisor = pow10(u32::from(CANONICAL_DECIMALS - decimals));
    if native % divisor != 0 {
        return Err(UnitsError::PrecisionLoss { native, decimals });
    }
    Ok(native / divisor)
}

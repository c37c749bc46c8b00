use bigdecimal::{BigDecimal, FromPrimitive};
use thiserror::Error;

pub const MAX_DISCOUNT: i32 = 100;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PricingError {
    #[error("Product price after applying discount cannot be lower than the cost price.")]
    BelowCost,

    #[error("Discount must be between 0 and {MAX_DISCOUNT}.")]
    DiscountOutOfRange,

    #[error("Loss factor {0} is not a finite number.")]
    InvalidLossFactor(f64),
}

/// Price after applying a percentage discount, rounded to cents.
pub fn discounted_price(price: &BigDecimal, discount: i32) -> BigDecimal {
    let remaining = BigDecimal::from(MAX_DISCOUNT - discount);
    (price * remaining / BigDecimal::from(MAX_DISCOUNT)).round(2)
}

/// Like `discounted_price`, but `None` when no discount applies.
pub fn effective_discounted_price(price: &BigDecimal, discount: i32) -> Option<BigDecimal> {
    (discount != 0).then(|| discounted_price(price, discount))
}

/// Rejects a price/discount combination that sells below
/// `cost_price * loss_factor`.
pub fn check_loss(
    price: &BigDecimal,
    discount: i32,
    cost_price: &BigDecimal,
    loss_factor: f64,
) -> Result<(), PricingError> {
    if !(0..=MAX_DISCOUNT).contains(&discount) {
        return Err(PricingError::DiscountOutOfRange);
    }
    let factor = BigDecimal::from_f64(loss_factor).ok_or(PricingError::InvalidLossFactor(loss_factor))?;
    let min_acceptable = cost_price * factor;
    let remaining = BigDecimal::from(MAX_DISCOUNT - discount);
    let after_discount = price * remaining / BigDecimal::from(MAX_DISCOUNT);

    if after_discount < min_acceptable {
        return Err(PricingError::BelowCost);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn discount_is_applied_and_rounded() {
        assert_eq!(discounted_price(&dec("100.00"), 15), dec("85.00"));
        assert_eq!(discounted_price(&dec("9.99"), 33), dec("6.69"));
        assert_eq!(discounted_price(&dec("10"), 100), dec("0"));
    }

    #[test]
    fn zero_discount_has_no_discounted_price() {
        assert_eq!(effective_discounted_price(&dec("10"), 0), None);
        assert_eq!(effective_discounted_price(&dec("10"), 50), Some(dec("5.00")));
    }

    #[test]
    fn price_at_cost_is_accepted() {
        assert_eq!(check_loss(&dec("100"), 20, &dec("80"), 1.0), Ok(()));
    }

    #[test]
    fn price_below_cost_is_rejected() {
        assert_eq!(
            check_loss(&dec("100"), 21, &dec("80"), 1.0),
            Err(PricingError::BelowCost)
        );
    }

    #[test]
    fn loss_factor_scales_the_floor() {
        // 90 after discount, floor is 80 * 1.2 = 96
        assert_eq!(
            check_loss(&dec("100"), 10, &dec("80"), 1.2),
            Err(PricingError::BelowCost)
        );
        assert_eq!(check_loss(&dec("100"), 10, &dec("80"), 0.5), Ok(()));
    }

    #[test]
    fn discount_outside_range_is_rejected() {
        assert_eq!(
            check_loss(&dec("100"), 101, &dec("1"), 1.0),
            Err(PricingError::DiscountOutOfRange)
        );
        assert_eq!(
            check_loss(&dec("100"), -1, &dec("1"), 1.0),
            Err(PricingError::DiscountOutOfRange)
        );
    }
}

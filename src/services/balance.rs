use rust_decimal::Decimal;

use crate::models::PaymentStatus;

/// Outstanding amount on a reservation: `max(0, total + deposit - paid)`.
pub fn balance(total: Decimal, paid: Decimal, deposit: Decimal) -> Decimal {
    (total + deposit - paid).max(Decimal::ZERO)
}

/// An expense is paid once its abonos cover the full amount.
pub fn expense_status(total_amount: Decimal, total_abonos: Decimal) -> PaymentStatus {
    if total_abonos >= total_amount {
        PaymentStatus::Paid
    } else {
        PaymentStatus::Pending
    }
}

/// Owner balances are not clamped; a negative value means the owner was overpaid.
pub fn owner_balance(total_owed: Decimal, amount_paid: Decimal) -> Decimal {
    total_owed - amount_paid
}

pub fn sum_amounts<I>(amounts: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    amounts.into_iter().fold(Decimal::ZERO, |acc, amount| acc + amount)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::{balance, expense_status, owner_balance, sum_amounts};
    use crate::models::PaymentStatus;

    #[test]
    fn balance_includes_deposit_and_never_goes_negative() {
        assert_eq!(balance(dec!(15000), dec!(10000), dec!(2000)), dec!(7000));
        assert_eq!(balance(dec!(15000), dec!(17000), dec!(2000)), Decimal::ZERO);
        assert_eq!(balance(dec!(15000), dec!(20000), dec!(0)), Decimal::ZERO);
        assert_eq!(balance(dec!(99.95), dec!(0.05), dec!(0)), dec!(99.90));
    }

    #[test]
    fn expense_is_paid_only_when_abonos_cover_amount() {
        assert_eq!(expense_status(dec!(500), dec!(499.99)), PaymentStatus::Pending);
        assert_eq!(expense_status(dec!(500), dec!(500)), PaymentStatus::Paid);
        assert_eq!(expense_status(dec!(500), dec!(650)), PaymentStatus::Paid);
    }

    #[test]
    fn owner_balance_can_show_overpayment() {
        assert_eq!(owner_balance(dec!(150), dec!(200)), dec!(-50));
    }

    #[test]
    fn sums_decimal_amounts_exactly() {
        assert_eq!(sum_amounts([dec!(0.1), dec!(0.2)]), dec!(0.3));
        assert_eq!(sum_amounts(Vec::<Decimal>::new()), Decimal::ZERO);
    }
}

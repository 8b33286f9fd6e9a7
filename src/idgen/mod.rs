//! Identifier Generator
//!
//! Produces account numbers, card numbers, CVVs and expiry dates.
//! All functions are pure over the injected random source; uniqueness is
//! NOT guaranteed here. The stores enforce it with unique constraints and
//! the registration handler retries with fresh values on conflict.

use chrono::{DateTime, Datelike, Utc};
use rand::Rng;

/// Length of an account number.
pub const ACCOUNT_NUMBER_LEN: usize = 12;

/// Fixed network prefix of every issued card.
pub const CARD_PREFIX: &str = "4016";

/// Random digits following the card prefix.
const CARD_SUFFIX_LEN: usize = 12;

/// Years until an issued card expires.
const CARD_VALIDITY_YEARS: i32 = 5;

fn random_digits<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len).map(|_| char::from(b'0' + rng.gen_range(0..10))).collect()
}

/// 12-digit numeric account number.
pub fn account_number<R: Rng + ?Sized>(rng: &mut R) -> String {
    random_digits(rng, ACCOUNT_NUMBER_LEN)
}

/// 16-digit card number: fixed network prefix + 12 random digits.
pub fn card_number<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("{}{}", CARD_PREFIX, random_digits(rng, CARD_SUFFIX_LEN))
}

/// 3-digit CVV.
pub fn cvv<R: Rng + ?Sized>(rng: &mut R) -> String {
    random_digits(rng, 3)
}

/// Card expiry as `MM/YY`, the issuance month exactly 5 calendar years out.
pub fn expiry(issued_at: DateTime<Utc>) -> String {
    let year = issued_at.year() + CARD_VALIDITY_YEARS;
    format!("{:02}/{:02}", issued_at.month(), year.rem_euclid(100))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_account_number_format() {
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let n = account_number(&mut rng);
            assert_eq!(n.len(), ACCOUNT_NUMBER_LEN);
            assert!(n.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_card_number_format() {
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let n = card_number(&mut rng);
            assert_eq!(n.len(), 16);
            assert!(n.starts_with(CARD_PREFIX));
            assert!(n.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_cvv_format() {
        let mut rng = rand::thread_rng();
        let c = cvv(&mut rng);
        assert_eq!(c.len(), 3);
        assert!(c.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_expiry_five_years_out() {
        let issued = Utc.with_ymd_and_hms(2026, 8, 14, 12, 0, 0).unwrap();
        assert_eq!(expiry(issued), "08/31");
    }

    #[test]
    fn test_expiry_pads_month() {
        let issued = Utc.with_ymd_and_hms(2026, 1, 3, 0, 0, 0).unwrap();
        assert_eq!(expiry(issued), "01/31");
    }

    #[test]
    fn test_expiry_century_rollover() {
        let issued = Utc.with_ymd_and_hms(2097, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(expiry(issued), "06/02");
    }
}

use std::{
    fmt::{Debug, Display},
    iter::Sum,
    str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

const DECIMALS: u32 = 18;
const ONE: u128 = 10u128.pow(DECIMALS);

/// Native-currency amount in the smallest unit (wei).
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u128);

impl Amount {
    pub fn wei(value: u128) -> Amount {
        Amount(value)
    }

    pub fn whole(value: u64) -> Amount {
        Amount(value as u128 * ONE)
    }

    pub fn zero() -> Amount {
        Amount(0)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn inner(&self) -> u128 {
        self.0
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }
}

impl Debug for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let int = self.0 / ONE;
        let frac = self.0 % ONE;
        if frac == 0 {
            write!(f, "{}", int)
        } else {
            let frac = format!("{:018}", frac);
            write!(f, "{}.{}", int, frac.trim_end_matches('0'))
        }
    }
}

impl TryFrom<&str> for Amount {
    type Error = ParseAmountError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let value = value.trim();
        let (int, frac) = match value.split_once('.') {
            Some((int, frac)) => (int, frac),
            None => (value, ""),
        };
        if int.is_empty() && frac.is_empty() {
            return Err(ParseAmountError);
        }
        if frac.len() > DECIMALS as usize {
            return Err(ParseAmountError);
        }
        let digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
        if !digits(int) || !digits(frac) {
            return Err(ParseAmountError);
        }

        let int: u128 = if int.is_empty() {
            0
        } else {
            int.parse().map_err(|_| ParseAmountError)?
        };
        let frac: u128 = if frac.is_empty() {
            0
        } else {
            let scale = 10u128.pow(DECIMALS - frac.len() as u32);
            frac.parse::<u128>().map_err(|_| ParseAmountError)? * scale
        };
        int.checked_mul(ONE)
            .and_then(|int| int.checked_add(frac))
            .map(Amount)
            .ok_or(ParseAmountError)
    }
}

impl FromStr for Amount {
    type Err = ParseAmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Amount::try_from(s)
    }
}

impl std::ops::AddAssign for Amount {
    fn add_assign(&mut self, other: Amount) {
        self.0 += other.0;
    }
}

impl std::ops::SubAssign for Amount {
    fn sub_assign(&mut self, other: Amount) {
        self.0 -= other.0;
    }
}

impl std::ops::Add for Amount {
    type Output = Amount;

    fn add(self, other: Amount) -> Amount {
        Amount(self.0 + other.0)
    }
}

impl std::ops::Sub for Amount {
    type Output = Amount;

    fn sub(self, other: Amount) -> Amount {
        Amount(self.0 - other.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::zero(), |acc, x| acc + x)
    }
}

#[derive(Debug)]
pub struct ParseAmountError;

impl std::fmt::Display for ParseAmountError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to parse amount value")
    }
}

impl std::error::Error for ParseAmountError {}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Amount, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        value
            .parse::<u128>()
            .map(Amount)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!("5", format!("{}", Amount::whole(5)));
        assert_eq!("0", format!("{}", Amount::zero()));
        assert_eq!("0.000000000000000001", format!("{}", Amount::wei(1)));
        assert_eq!("0.05", format!("{}", Amount::wei(50_000_000_000_000_000)));
    }

    #[test]
    fn test_from_str() {
        assert_eq!(
            Amount::try_from("0.05").unwrap(),
            Amount::wei(50_000_000_000_000_000)
        );
        assert_eq!(Amount::try_from("12").unwrap(), Amount::whole(12));
        assert_eq!(
            Amount::try_from("1.5").unwrap(),
            Amount::wei(1_500_000_000_000_000_000)
        );
        assert_eq!(Amount::try_from(".5").unwrap(), Amount::wei(ONE / 2));
        assert_eq!("123.456", Amount::try_from("123.456").unwrap().to_string());
    }

    #[test]
    fn test_from_str_errors() {
        assert!(Amount::try_from("").is_err());
        assert!(Amount::try_from(".").is_err());
        assert!(Amount::try_from("-1").is_err());
        assert!(Amount::try_from("1.2.3").is_err());
        assert!(Amount::try_from("abc").is_err());
        assert!(Amount::try_from("0.0000000000000000001").is_err());
    }

    #[test]
    fn test_arithmetic() {
        let a = Amount::try_from("0.75").unwrap();
        let b = Amount::try_from("0.25").unwrap();
        assert_eq!(a + b, Amount::whole(1));
        assert_eq!(a - b, Amount::try_from("0.5").unwrap());
        assert_eq!(b.checked_sub(a), None);
        assert_eq!(vec![a, b, b].into_iter().sum::<Amount>(), Amount::try_from("1.25").unwrap());

        let mut c = Amount::zero();
        c += a;
        c -= b;
        assert_eq!(c, Amount::try_from("0.5").unwrap());
    }

    #[test]
    fn test_ordering() {
        assert!(Amount::try_from("0.05").unwrap() < Amount::try_from("0.5").unwrap());
        assert!(Amount::whole(1) > Amount::wei(ONE - 1));
    }

    #[test]
    fn test_serde_keeps_precision() {
        let amount = Amount::wei(u128::MAX);
        let json = serde_json::to_string(&amount).unwrap();
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amount);
    }
}

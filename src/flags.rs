//! `userAccountControl` bit field.

use std::fmt;

/// Account is disabled.
pub const ACCOUNTDISABLE: Bits = Bits(0x0002);
/// Default flag of a regular user account.
pub const NORMAL_ACCOUNT: Bits = Bits(0x0200);
/// Password never expires.
pub const DONT_EXPIRE_PASSWORD: Bits = Bits(0x1_0000);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bits(pub u32);

impl Bits {
    pub fn has(self, flag: Bits) -> bool {
        self.0 & flag.0 != 0
    }

    pub fn add(&mut self, flag: Bits) {
        self.0 |= flag.0;
    }

    pub fn clear(&mut self, flag: Bits) {
        self.0 &= !flag.0;
    }
}

impl fmt::LowerHex for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl std::str::FromStr for Bits {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let mut uac: Bits = "512".parse().unwrap();
        assert_eq!(uac, NORMAL_ACCOUNT);
        assert!(!uac.has(ACCOUNTDISABLE));

        uac.add(ACCOUNTDISABLE);
        assert!(uac.has(ACCOUNTDISABLE));
        assert_eq!(uac.0, 514);
        assert_eq!(format!("{uac:x}"), "202");

        uac.clear(ACCOUNTDISABLE);
        uac.clear(DONT_EXPIRE_PASSWORD);
        assert_eq!(uac, NORMAL_ACCOUNT);
    }
}

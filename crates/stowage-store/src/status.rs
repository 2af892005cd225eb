//! The per-slot status byte.
//!
//! ```text
//! bit  7 6 5 4 3 | 2 1 | 0
//!      app flags | rsv | NULL
//! ```
//!
//! Bit 0 marks an absent element. Bits 1-2 are reserved for internal
//! metadata consumers. Bits 3-7 belong to the application and are the
//! only bits the flag API will touch.

use crate::error::StoreError;

/// Element is absent.
pub const NULL: u8 = 0b0000_0001;

/// Reserved for internal use.
pub const RESERVED: u8 = 0b0000_0110;

/// Bits the flag API refuses to touch.
pub const PROTECTED: u8 = NULL | RESERVED;

/// Bits available to applications.
pub const APP_FLAGS: u8 = !PROTECTED;

/// Check that `mask` names only application flag bits.
pub fn check_mask(mask: u8) -> Result<(), StoreError> {
    if mask == 0 {
        return Err(StoreError::IllegalAccess("empty flag mask"));
    }
    if mask & PROTECTED != 0 {
        return Err(StoreError::IllegalAccess("flag mask touches reserved status bits"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitions_the_byte() {
        assert_eq!(APP_FLAGS, 0b1111_1000);
        assert_eq!(PROTECTED | APP_FLAGS, 0xff);
    }

    #[test]
    fn masks() {
        assert!(check_mask(0b0100_0000).is_ok());
        assert!(check_mask(0b1000_1000).is_ok());
        assert!(matches!(
            check_mask(0b0000_0001),
            Err(StoreError::IllegalAccess(_))
        ));
        assert!(check_mask(0b0000_0100).is_err());
        assert!(check_mask(0b0100_0010).is_err());
        assert!(check_mask(0).is_err());
    }
}

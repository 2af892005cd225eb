//! Segment sizing from a [`StoreConfig`].

use stowage_core::{ConfigError, SizeType, StoreConfig};

/// Slot count and segment sizes of a store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sizing {
    /// Number of slots.
    pub capacity: usize,
    /// Bytes per slot: status byte, metadata, payload.
    pub node_size: usize,
    /// `capacity × node_size`.
    pub static_size: usize,
    /// Bytes handed to the dynamic allocator.
    pub dynamic_size: usize,
}

impl Sizing {
    /// Split the configured budget for slots of `node_size` bytes.
    ///
    /// By elements, the dynamic segment is sized so that it makes up
    /// `dynamic_ratio` of the total. By bytes, the slots take whole
    /// multiples of `node_size` out of `(1 - dynamic_ratio)` of the budget
    /// and the dynamic segment absorbs the remainder.
    pub fn compute(config: &StoreConfig, node_size: usize) -> Result<Self, ConfigError> {
        config.validate()?;
        let ratio = config.dynamic_ratio;
        let overflow = ConfigError::SizeOverflow {
            capacity: config.size,
            node_size,
        };

        let (capacity, static_size, dynamic_size) = match config.size_type {
            SizeType::Elements => {
                let capacity = usize::try_from(config.size).map_err(|_| overflow)?;
                let static_size = capacity.checked_mul(node_size).ok_or(ConfigError::SizeOverflow {
                    capacity: config.size,
                    node_size,
                })?;
                let dynamic = (static_size as f64 * ratio / (1.0 - ratio)).floor();
                if dynamic >= usize::MAX as f64 {
                    return Err(ConfigError::SizeOverflow {
                        capacity: config.size,
                        node_size,
                    });
                }
                (capacity, static_size, dynamic as usize)
            }
            SizeType::Bytes => {
                let total = usize::try_from(config.size).map_err(|_| overflow)?;
                let capacity = (total as f64 * (1.0 - ratio) / node_size as f64).floor() as usize;
                if capacity == 0 {
                    return Err(ConfigError::ZeroCapacity {
                        size: config.size,
                        node_size,
                    });
                }
                let static_size = capacity * node_size;
                (capacity, static_size, total - static_size)
            }
        };

        static_size
            .checked_add(dynamic_size)
            .filter(|&total| total <= isize::MAX as usize)
            .ok_or(ConfigError::SizeOverflow {
                capacity: capacity as u64,
                node_size,
            })?;

        Ok(Self {
            capacity,
            node_size,
            static_size,
            dynamic_size,
        })
    }

    /// Total arena size.
    pub fn total(&self) -> usize {
        self.static_size + self.dynamic_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn by_elements() {
        let s = Sizing::compute(&StoreConfig::elements(100).with_dynamic_ratio(0.2), 10).unwrap();
        assert_eq!(s.capacity, 100);
        assert_eq!(s.static_size, 1000);
        assert_eq!(s.dynamic_size, 250);
        assert_eq!(s.total(), 1250);
    }

    #[test]
    fn by_elements_without_dynamic() {
        let s = Sizing::compute(&StoreConfig::elements(7).with_dynamic_ratio(0.0), 13).unwrap();
        assert_eq!(s.dynamic_size, 0);
        assert_eq!(s.total(), 91);
    }

    #[test]
    fn by_bytes() {
        let config = StoreConfig::default()
            .with_size(1000)
            .with_size_type(SizeType::Bytes)
            .with_dynamic_ratio(0.25);
        let s = Sizing::compute(&config, 7).unwrap();
        // 750 / 7 = 107 slots, 749 bytes; the dynamic segment takes the rest.
        assert_eq!(s.capacity, 107);
        assert_eq!(s.static_size, 749);
        assert_eq!(s.dynamic_size, 251);
        assert_eq!(s.total(), 1000);
    }

    #[test]
    fn by_bytes_too_small() {
        let config = StoreConfig::default()
            .with_size(8)
            .with_size_type(SizeType::Bytes);
        assert!(matches!(
            Sizing::compute(&config, 9),
            Err(ConfigError::ZeroCapacity { .. })
        ));
    }

    #[test]
    fn invalid_config_rejected() {
        assert!(matches!(
            Sizing::compute(&StoreConfig::elements(0), 4),
            Err(ConfigError::ZeroSize)
        ));
        assert!(matches!(
            Sizing::compute(&StoreConfig::elements(1).with_dynamic_ratio(1.0), 4),
            Err(ConfigError::InvalidDynamicRatio { .. })
        ));
    }

    #[test]
    fn overflow_rejected() {
        assert!(matches!(
            Sizing::compute(&StoreConfig::elements(u64::MAX), 16),
            Err(ConfigError::SizeOverflow { .. })
        ));
    }
}

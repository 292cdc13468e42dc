//! Durability requirements and observe key states

use std::fmt;

/// How many nodes must have written the mutation to disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PersistTo {
    #[default]
    None,
    /// Only the active node's own disk counts
    Master,
    One,
    Two,
    Three,
}

impl PersistTo {
    /// Node count required; `Master` requires one, but only the master's
    pub fn value(&self) -> usize {
        match self {
            PersistTo::None => 0,
            PersistTo::Master | PersistTo::One => 1,
            PersistTo::Two => 2,
            PersistTo::Three => 3,
        }
    }

    /// Whether a replica can contribute to this requirement
    pub fn touches_replica(&self) -> bool {
        matches!(self, PersistTo::One | PersistTo::Two | PersistTo::Three)
    }
}

impl fmt::Display for PersistTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PersistTo::None => "none",
            PersistTo::Master => "master",
            PersistTo::One => "one",
            PersistTo::Two => "two",
            PersistTo::Three => "three",
        };
        f.write_str(s)
    }
}

/// How many replicas must hold the mutation in memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReplicateTo {
    #[default]
    None,
    One,
    Two,
    Three,
}

impl ReplicateTo {
    pub fn value(&self) -> usize {
        match self {
            ReplicateTo::None => 0,
            ReplicateTo::One => 1,
            ReplicateTo::Two => 2,
            ReplicateTo::Three => 3,
        }
    }

    pub fn touches_replica(&self) -> bool {
        !matches!(self, ReplicateTo::None)
    }
}

impl fmt::Display for ReplicateTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Key state reported by an observe probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObserveStatus {
    FoundNotPersisted,
    FoundPersisted,
    NotFoundPersisted,
    NotFoundNotPersisted,
    Unknown(u8),
}

impl ObserveStatus {
    pub fn from_code(code: u8) -> Self {
        match code {
            0x00 => ObserveStatus::FoundNotPersisted,
            0x01 => ObserveStatus::FoundPersisted,
            0x80 => ObserveStatus::NotFoundPersisted,
            0x81 => ObserveStatus::NotFoundNotPersisted,
            other => ObserveStatus::Unknown(other),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            ObserveStatus::FoundNotPersisted => 0x00,
            ObserveStatus::FoundPersisted => 0x01,
            ObserveStatus::NotFoundPersisted => 0x80,
            ObserveStatus::NotFoundNotPersisted => 0x81,
            ObserveStatus::Unknown(code) => *code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persist_values() {
        assert_eq!(PersistTo::None.value(), 0);
        assert_eq!(PersistTo::Master.value(), 1);
        assert_eq!(PersistTo::Three.value(), 3);
        assert!(!PersistTo::Master.touches_replica());
        assert!(PersistTo::One.touches_replica());
    }

    #[test]
    fn test_replicate_values() {
        assert_eq!(ReplicateTo::Two.value(), 2);
        assert!(!ReplicateTo::None.touches_replica());
        assert!(ReplicateTo::One.touches_replica());
    }

    #[test]
    fn test_observe_codes() {
        for code in [0x00, 0x01, 0x80, 0x81, 0x42] {
            assert_eq!(ObserveStatus::from_code(code).code(), code);
        }
        assert_eq!(ObserveStatus::from_code(0x42), ObserveStatus::Unknown(0x42));
    }
}

//! Packing errors

use thiserror::Error;

/// An item that cannot fit into any chunk at the configured capacity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OversizedItem {
    pub identifier: String,
    pub size: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PackError {
    #[error("invalid packing config: {0}")]
    InvalidConfig(String),

    #[error(
        "{} item(s) exceed capacity {capacity}: {}",
        .items.len(),
        describe(.items)
    )]
    OversizedItems {
        capacity: usize,
        items: Vec<OversizedItem>,
    },
}

fn describe(items: &[OversizedItem]) -> String {
    items
        .iter()
        .map(|item| format!("{} ({})", item.identifier, item.size))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oversized_message_lists_items() {
        let err = PackError::OversizedItems {
            capacity: 100,
            items: vec![
                OversizedItem {
                    identifier: "big.md".to_string(),
                    size: 150,
                },
                OversizedItem {
                    identifier: "huge.py".to_string(),
                    size: 900,
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "2 item(s) exceed capacity 100: big.md (150), huge.py (900)"
        );
    }

    #[test]
    fn test_invalid_config_message() {
        let err = PackError::InvalidConfig("capacity must be greater than 0".to_string());
        assert!(err.to_string().contains("capacity must be greater than 0"));
    }
}

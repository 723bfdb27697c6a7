use serde::{Deserialize, Serialize};

/// A permitted transition between two executor identities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Source executor id.
    pub from: String,
    /// Target executor id.
    pub to: String,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_serde() {
        let edge = Edge::new("TriageAgent", "BillingSpecialist");
        let json = serde_json::to_string(&edge).unwrap();
        assert_eq!(json, r#"{"from":"TriageAgent","to":"BillingSpecialist"}"#);
        let back: Edge = serde_json::from_str(&json).unwrap();
        assert_eq!(back, edge);
    }
}

//! Simulated customer account lookups for the tool-calling agent.

use futures::future::BoxFuture;
use serde::Deserialize;

use maestro_core::error::{MaestroError, Result};
use maestro_core::traits::Tool;
use maestro_core::types::{ToolContext, ToolResult};

#[derive(Deserialize)]
struct EmailInput {
    email: String,
}

#[derive(Deserialize)]
struct TransactionsInput {
    email: String,
    #[serde(default = "default_count")]
    count: u32,
}
fn default_count() -> u32 {
    3
}

fn email_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "email": { "type": "string", "description": "Customer email address" }
        },
        "required": ["email"]
    })
}

pub fn account_info(email: &str) -> String {
    match email.to_lowercase().as_str() {
        "john@example.com" => {
            "Account: John Doe, Plan: Premium, Status: Active, Member since: 2022-03-15".into()
        }
        "jane@example.com" => {
            "Account: Jane Smith, Plan: Basic, Status: Active, Member since: 2023-01-20".into()
        }
        _ => format!("Account not found for email: {}", email),
    }
}

pub fn account_balance(email: &str) -> String {
    match email.to_lowercase().as_str() {
        "john@example.com" => "Current balance: €125.50, Next billing date: 2026-02-01".into(),
        "jane@example.com" => "Current balance: €0.00, Next billing date: 2026-02-15".into(),
        _ => format!("Balance not found for email: {}", email),
    }
}

pub fn recent_transactions(email: &str, count: u32) -> String {
    match email.to_lowercase().as_str() {
        "john@example.com" => format!(
            "Last {count} transactions for John Doe:\n\
             - 2026-01-10: Premium subscription renewal - €49.99\n\
             - 2026-01-05: Add-on purchase - €15.00\n\
             - 2025-12-10: Premium subscription renewal - €49.99"
        ),
        "jane@example.com" => format!(
            "Last {count} transactions for Jane Smith:\n\
             - 2026-01-15: Basic subscription renewal - €9.99\n\
             - 2025-12-15: Basic subscription renewal - €9.99\n\
             - 2025-11-15: Basic subscription renewal - €9.99"
        ),
        _ => format!("No transactions found for email: {}", email),
    }
}

pub struct AccountInfoTool;

impl Tool for AccountInfoTool {
    fn name(&self) -> &str {
        "get_account_info"
    }
    fn description(&self) -> &str {
        "Get customer account information by email address"
    }
    fn input_schema(&self) -> serde_json::Value {
        email_schema()
    }
    fn execute(
        &self,
        input: serde_json::Value,
        _ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>> {
        Box::pin(async move {
            let p: EmailInput = serde_json::from_value(input)
                .map_err(|e| MaestroError::ToolValidation(e.to_string()))?;
            Ok(ToolResult::success(account_info(&p.email)))
        })
    }
}

pub struct AccountBalanceTool;

impl Tool for AccountBalanceTool {
    fn name(&self) -> &str {
        "get_account_balance"
    }
    fn description(&self) -> &str {
        "Get the current balance for a customer account"
    }
    fn input_schema(&self) -> serde_json::Value {
        email_schema()
    }
    fn execute(
        &self,
        input: serde_json::Value,
        _ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>> {
        Box::pin(async move {
            let p: EmailInput = serde_json::from_value(input)
                .map_err(|e| MaestroError::ToolValidation(e.to_string()))?;
            Ok(ToolResult::success(account_balance(&p.email)))
        })
    }
}

pub struct RecentTransactionsTool;

impl Tool for RecentTransactionsTool {
    fn name(&self) -> &str {
        "get_recent_transactions"
    }
    fn description(&self) -> &str {
        "Get recent transactions for a customer account"
    }
    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "email": { "type": "string", "description": "Customer email address" },
                "count": { "type": "integer", "description": "Number of transactions to retrieve (default: 3)" }
            },
            "required": ["email"]
        })
    }
    fn execute(
        &self,
        input: serde_json::Value,
        _ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>> {
        Box::pin(async move {
            let p: TransactionsInput = serde_json::from_value(input)
                .map_err(|e| MaestroError::ToolValidation(e.to_string()))?;
            Ok(ToolResult::success(recent_transactions(&p.email, p.count)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maestro_core::types::RunId;

    fn ctx() -> ToolContext {
        ToolContext {
            run_id: RunId::new(),
            agent_id: "support".into(),
        }
    }

    #[test]
    fn test_account_info_is_case_insensitive() {
        assert_eq!(
            account_info("John@Example.com"),
            "Account: John Doe, Plan: Premium, Status: Active, Member since: 2022-03-15"
        );
        assert_eq!(
            account_info("nobody@example.com"),
            "Account not found for email: nobody@example.com"
        );
    }

    #[test]
    fn test_account_balance() {
        assert_eq!(
            account_balance("jane@example.com"),
            "Current balance: €0.00, Next billing date: 2026-02-15"
        );
        assert_eq!(
            account_balance("x@y.z"),
            "Balance not found for email: x@y.z"
        );
    }

    #[test]
    fn test_recent_transactions_header_uses_count() {
        let out = recent_transactions("john@example.com", 5);
        assert!(out.starts_with("Last 5 transactions for John Doe:\n"));
        assert_eq!(out.lines().count(), 4);
        assert!(out.ends_with("- 2025-12-10: Premium subscription renewal - €49.99"));
    }

    #[tokio::test]
    async fn test_transactions_tool_default_count() {
        let result = RecentTransactionsTool
            .execute(serde_json::json!({"email": "jane@example.com"}), ctx())
            .await
            .unwrap();
        assert!(!result.is_error);
        assert!(result.content.starts_with("Last 3 transactions for Jane Smith:"));
    }

    #[tokio::test]
    async fn test_missing_email_is_validation_error() {
        let err = AccountInfoTool
            .execute(serde_json::json!({}), ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, MaestroError::ToolValidation(_)));
    }
}

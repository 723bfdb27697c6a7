//! Fixed agent sets for the customer-support and product-panel workflows.

use maestro_core::error::Result;

use crate::handle::{AgentConfig, AgentHandle};

pub const CLASSIFIER_INSTRUCTIONS: &str = "\
You classify customer support tickets. Analyze the customer's message and determine the category.
Categories: billing, technical, or general.

IMPORTANT: Your response format must be:
Category: [category]
Customer Issue: [repeat the customer's original message]

This format passes context to the next agent in the workflow.";

pub const ROUTER_INSTRUCTIONS: &str = "\
You route classified tickets to the appropriate specialist.
You receive input in the format \"Category: X, Customer Issue: Y\".

Based on the category, add the specialist assignment and pass along the customer issue.

IMPORTANT: Your response format must be:
Specialist: [billing-specialist/technical-support/general-support]
Customer Issue: [the customer's original issue from input]

This format passes context to the specialist agent.";

pub const SPECIALIST_INSTRUCTIONS: &str = "\
You receive routed input that may include \"Specialist:\" and \"Customer Issue:\" labels.
Extract the customer's actual issue and respond helpfully to solve their problem.
Ignore routing metadata and respond directly to the customer's concern.

You are a support specialist. Adapt your expertise based on the type of issue:
- For billing issues: Help with payments, invoices, refunds. Be empathetic.
- For technical issues: Help with bugs, errors, troubleshooting. Be methodical.
- For general issues: Help with any questions. Be friendly and helpful.";

pub const TOOLS_AGENT_INSTRUCTIONS: &str = "\
You are a helpful customer support agent with access to account lookup tools.
When a customer asks about their account, use the available tools to look up their information.
Always be helpful and provide accurate information based on the tool results.
If you need an email address to look up information, ask the customer for it.

Available test accounts:
- john@example.com (Premium plan)
- jane@example.com (Basic plan)";

pub const CONVERSATION_INSTRUCTIONS: &str = "\
You are a helpful assistant with excellent memory.
Remember details from our conversation and reference them naturally.
If the user mentions their name, remember it for later.
If they ask about previous topics, recall and reference them.
Be conversational and show that you remember our chat history.";

pub const MODERATOR_INSTRUCTIONS: &str = "You are a moderator. Synthesize the discussion into key decisions, consensus points, and any remaining open questions. Be structured and actionable.";

const CLASSIFIER_ROUTER_INSTRUCTIONS: &str = "\
You are a classifier and router. Analyze the user's message and hand off to the appropriate specialist:
- Use handoff to BillingSpecialist for payment, invoice, subscription, refund issues
- Use handoff to TechnicalSupport for bugs, errors, technical problems, how-to questions
- Use handoff to SalesAdvisor for pricing, upgrades, new features, purchases
- Use handoff to GeneralSupport for anything else

Always hand off to a specialist - do not respond directly.";

const TRIAGE_INSTRUCTIONS: &str = "\
You are a triage agent. Analyze the customer's request and determine the best course of action.
If you can handle simple questions yourself, do so. Otherwise, hand off to the appropriate specialist.";

/// Agent selected when the classifier never transfers.
pub const DEFAULT_ROUTE: &str = "GeneralSupport";

/// The three-step support chain: Classifier, Router, Specialist.
pub fn support_chain() -> Vec<AgentConfig> {
    vec![
        AgentConfig::new("Classifier", CLASSIFIER_INSTRUCTIONS),
        AgentConfig::new("Router", ROUTER_INSTRUCTIONS),
        AgentConfig::new("Specialist", SPECIALIST_INSTRUCTIONS),
    ]
}

/// Name the generic specialist step after the classifier's verdict.
pub fn specialist_name_from_classification(classifier_output: &str) -> &'static str {
    let lower = classifier_output.to_lowercase();
    if lower.contains("category: billing") || lower.contains("category:billing") {
        "BillingSpecialist"
    } else if lower.contains("category: technical") || lower.contains("category:technical") {
        "TechnicalSpecialist"
    } else {
        "GeneralSpecialist"
    }
}

fn agent(name: &str, instructions: &str, description: &str) -> Result<AgentHandle> {
    Ok(AgentHandle::named(name, instructions)?.with_description(description))
}

/// Classifier plus the four specialists it routes between.
pub fn routing_star() -> Result<(AgentHandle, Vec<AgentHandle>)> {
    let classifier = agent(
        "Classifier",
        CLASSIFIER_ROUTER_INSTRUCTIONS,
        "Classifies and routes customer requests to appropriate specialists",
    )?;
    let specialists = vec![
        agent(
            "BillingSpecialist",
            "You are a billing specialist. Help with payments, invoices, subscriptions, and refunds. Be empathetic about billing concerns.",
            "Handles payment, invoice, subscription, and refund issues",
        )?,
        agent(
            "TechnicalSupport",
            "You are a technical support expert. Help diagnose and solve technical issues. Be methodical and clear.",
            "Handles bugs, errors, technical problems, and how-to questions",
        )?,
        agent(
            "SalesAdvisor",
            "You are a sales advisor. Help with pricing questions, upgrades, and purchasing decisions. Be helpful but not pushy.",
            "Handles pricing, upgrades, new features, and purchases",
        )?,
        agent(
            DEFAULT_ROUTE,
            "You are a general support agent. Help with any questions and be friendly and helpful.",
            "Handles general inquiries and questions",
        )?,
    ];
    Ok((classifier, specialists))
}

/// Category reported for the agent a routing run ended with.
pub fn category_for_agent(agent_name: &str) -> &'static str {
    match agent_name {
        "BillingSpecialist" => "BILLING",
        "TechnicalSupport" => "TECHNICAL",
        "SalesAdvisor" => "SALES",
        _ => "GENERAL",
    }
}

/// Triage agent plus billing, technical and account specialists.
pub fn triage_star() -> Result<(AgentHandle, Vec<AgentHandle>)> {
    let triage = agent(
        "TriageAgent",
        TRIAGE_INSTRUCTIONS,
        "Initial triage and routing of customer requests",
    )?;
    let specialists = vec![
        agent(
            "BillingSpecialist",
            "You are a billing specialist. Help with payments, invoices, subscriptions, and refunds. Be empathetic about billing concerns.",
            "Handles payment, invoice, subscription, and refund issues",
        )?,
        agent(
            "TechnicalSpecialist",
            "You are a technical specialist. Help diagnose and solve technical issues. Be methodical and provide clear troubleshooting steps.",
            "Handles bugs, errors, and technical problems",
        )?,
        agent(
            "AccountSpecialist",
            "You are an account specialist. Help with account settings, profile changes, and access issues. Be security-conscious.",
            "Handles account settings, profile, and access issues",
        )?,
    ];
    Ok((triage, specialists))
}

/// The four-person product panel, briefed on `topic`.
pub fn product_panel(topic: &str) -> Result<Vec<AgentHandle>> {
    Ok(vec![
        agent(
            "ProductManager",
            &format!("You are a Product Manager in a group discussion about: {topic}. Focus on user needs, market fit, and business value. Be concise (2-3 sentences). Build on others' ideas."),
            "Focuses on user needs, market fit, and business value",
        )?,
        agent(
            "TechLead",
            &format!("You are a Tech Lead in a group discussion about: {topic}. Focus on technical feasibility, architecture, and implementation. Be practical (2-3 sentences)."),
            "Focuses on technical feasibility, architecture, and implementation",
        )?,
        agent(
            "Designer",
            &format!("You are a UX Designer in a group discussion about: {topic}. Focus on user experience, usability, and design principles. Advocate for users (2-3 sentences)."),
            "Focuses on user experience, usability, and design principles",
        )?,
        agent(
            "QAEngineer",
            &format!("You are a QA Engineer in a group discussion about: {topic}. Focus on quality, edge cases, and potential issues. Think about what could go wrong (2-3 sentences)."),
            "Focuses on quality, edge cases, and potential issues",
        )?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specialist_name_from_classification() {
        assert_eq!(
            specialist_name_from_classification("Category: Billing\nCustomer Issue: ..."),
            "BillingSpecialist"
        );
        assert_eq!(
            specialist_name_from_classification("category:technical"),
            "TechnicalSpecialist"
        );
        assert_eq!(
            specialist_name_from_classification("Category: general"),
            "GeneralSpecialist"
        );
        assert_eq!(specialist_name_from_classification(""), "GeneralSpecialist");
    }

    #[test]
    fn test_category_for_agent() {
        assert_eq!(category_for_agent("BillingSpecialist"), "BILLING");
        assert_eq!(category_for_agent("TechnicalSupport"), "TECHNICAL");
        assert_eq!(category_for_agent("SalesAdvisor"), "SALES");
        assert_eq!(category_for_agent("GeneralSupport"), "GENERAL");
        assert_eq!(category_for_agent("Classifier"), "GENERAL");
    }

    #[test]
    fn test_presets_build() {
        assert_eq!(support_chain().len(), 3);

        let (classifier, specialists) = routing_star().unwrap();
        assert_eq!(classifier.id(), "Classifier");
        assert_eq!(specialists.len(), 4);
        assert!(specialists.iter().all(|s| s.description().is_some()));

        let (triage, specialists) = triage_star().unwrap();
        assert_eq!(triage.id(), "TriageAgent");
        assert_eq!(specialists.len(), 3);
    }

    #[test]
    fn test_product_panel_mentions_topic() {
        let panel = product_panel("offline mode").unwrap();
        let names: Vec<&str> = panel.iter().map(|h| h.id()).collect();
        assert_eq!(names, vec!["ProductManager", "TechLead", "Designer", "QAEngineer"]);
        assert!(panel
            .iter()
            .all(|h| h.instructions().contains("group discussion about: offline mode")));
    }
}

//! Core data models for the order assistant

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

//
// ================= Enums =================
//

/// Identifies a handler and names its memory windows.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentKind {
    Triage,
    CreateOrder,
    QueryOrder,
    UpdateOrder,
    CancelOrder,
}

impl AgentKind {
    /// Specialized handlers in handoff priority order.
    pub const HANDLERS: [AgentKind; 4] = [
        AgentKind::CreateOrder,
        AgentKind::QueryOrder,
        AgentKind::UpdateOrder,
        AgentKind::CancelOrder,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Triage => "TRIAGE",
            AgentKind::CreateOrder => "CREATE_ORDER",
            AgentKind::QueryOrder => "QUERY_ORDER",
            AgentKind::UpdateOrder => "UPDATE_ORDER",
            AgentKind::CancelOrder => "CANCEL_ORDER",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_uppercase().as_str() {
            "TRIAGE" => Some(AgentKind::Triage),
            "CREATE_ORDER" => Some(AgentKind::CreateOrder),
            "QUERY_ORDER" => Some(AgentKind::QueryOrder),
            "UPDATE_ORDER" => Some(AgentKind::UpdateOrder),
            "CANCEL_ORDER" => Some(AgentKind::CancelOrder),
            _ => None,
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Created,
    Updated,
    Cancelled,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::Updated => "UPDATED",
            OrderStatus::Cancelled => "CANCELLED",
        };
        write!(f, "{}", s)
    }
}

//
// ================= Order =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub order_id: String,
    pub customer_name: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub total_amount: f64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Most recent change, used to find the latest order.
    pub fn last_changed(&self) -> DateTime<Utc> {
        self.updated_at.unwrap_or(self.created_at)
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Order {}", self.order_id)?;
        writeln!(f, "- Customer: {}", self.customer_name)?;
        writeln!(f, "- Product: {}", self.product_name)?;
        writeln!(f, "- Quantity: {}", self.quantity)?;
        writeln!(f, "- Unit price: {:.2}", self.unit_price)?;
        writeln!(f, "- Total: {:.2}", self.total_amount)?;
        writeln!(f, "- Status: {}", self.status)?;
        write!(f, "- Created: {}", self.created_at.format("%Y-%m-%d %H:%M:%S"))?;
        if let Some(updated_at) = self.updated_at {
            write!(f, "\n- Updated: {}", updated_at.format("%Y-%m-%d %H:%M:%S"))?;
        }
        Ok(())
    }
}

/// Field changes for an existing order
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OrderUpdate {
    pub product_name: Option<String>,
    pub quantity: Option<u32>,
    pub unit_price: Option<f64>,
}

//
// ================= Tool I/O =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInput {
    pub tool_name: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub data: serde_json::Value,
    pub error: Option<String>,
}

/// Tool request emitted by the model in place of a reply
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

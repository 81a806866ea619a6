//! Tool trait and registry
//!
//! Tools expose order-book operations to the specialized handlers. Each
//! handler kind gets its own registry so a query handler can never cancel
//! an order.

use crate::error::AgentError;
use crate::models::{AgentKind, Order, OrderUpdate, ToolCall, ToolInput, ToolOutput};
use crate::orders::OrderStore;
use crate::Result;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Trait for a single tool
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput>;
}

/// Tool registry for looking up and executing tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Registry holding exactly the tools `kind` may use.
    pub fn for_kind(kind: AgentKind, orders: Arc<dyn OrderStore>) -> Self {
        let mut registry = Self::new();

        match kind {
            AgentKind::Triage => {}
            AgentKind::CreateOrder => {
                registry.register(Arc::new(CreateOrderTool::new(orders)));
            }
            AgentKind::QueryOrder => {
                registry.register(Arc::new(GetOrderTool::new(orders.clone())));
                registry.register(Arc::new(OrdersByCustomerTool::new(orders.clone())));
                registry.register(Arc::new(OrdersByProductTool::new(orders.clone())));
                registry.register(Arc::new(AllOrdersTool::new(orders.clone())));
                registry.register(Arc::new(LatestOrderTool::new(orders)));
            }
            AgentKind::UpdateOrder => {
                registry.register(Arc::new(UpdateOrderTool::new(orders.clone())));
                registry.register(Arc::new(GetOrderTool::new(orders.clone())));
                registry.register(Arc::new(LatestOrderTool::new(orders)));
            }
            AgentKind::CancelOrder => {
                registry.register(Arc::new(CancelOrderTool::new(orders.clone())));
                registry.register(Arc::new(GetOrderTool::new(orders.clone())));
                registry.register(Arc::new(LatestOrderTool::new(orders)));
            }
        }

        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Tool names, sorted
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// One `- name: description` line per tool, for handler preambles.
    pub fn catalogue(&self) -> String {
        self.list()
            .into_iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| format!("- {}: {}", tool.name(), tool.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Execute a model-issued call against this registry.
    pub async fn execute(&self, call: &ToolCall) -> Result<ToolOutput> {
        let tool = self
            .get(&call.tool)
            .ok_or_else(|| AgentError::ToolNotFound(call.tool.clone()))?;

        let input = ToolInput {
            tool_name: call.tool.clone(),
            parameters: if call.arguments.is_null() {
                json!({})
            } else {
                call.arguments.clone()
            },
        };

        tool.execute(&input).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Recognize a tool call in a model reply.
///
/// Accepts a bare JSON object or one wrapped in a ```json fence. Anything
/// without a string `tool` field is a plain reply.
pub fn parse_tool_call(reply: &str) -> Option<ToolCall> {
    let cleaned = reply
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    if !cleaned.starts_with('{') {
        return None;
    }

    let value: Value = serde_json::from_str(cleaned).ok()?;
    value.get("tool")?.as_str()?;
    serde_json::from_value(value).ok()
}

/// Text appended to a handler's window after a tool ran.
pub fn render_tool_result(tool: &str, result: &Result<ToolOutput>) -> String {
    match result {
        Ok(output) if output.success => format!("{} succeeded: {}", tool, output.data),
        Ok(output) => format!(
            "{} failed: {}",
            tool,
            output.error.as_deref().unwrap_or("unknown error")
        ),
        Err(e) => format!("{} failed: {}", tool, e),
    }
}

//
// ================= Parameter helpers =================
//

fn ensure_object_parameters(input: &ToolInput) -> Result<()> {
    if input.parameters.is_object() {
        Ok(())
    } else {
        Err(AgentError::InvalidToolInput(
            "arguments must be a JSON object".to_string(),
        ))
    }
}

fn optional_str<'a>(input: &'a ToolInput, key: &str) -> Option<&'a str> {
    input
        .parameters
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn require_str<'a>(input: &'a ToolInput, key: &str) -> Result<&'a str> {
    optional_str(input, key)
        .ok_or_else(|| AgentError::InvalidToolInput(format!("Expected '{}' in arguments", key)))
}

/// Numbers may arrive as JSON numbers or numeric strings.
fn optional_f64(input: &ToolInput, key: &str) -> Result<Option<f64>> {
    match input.parameters.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) => s.trim().parse::<f64>().map(Some).map_err(|_| {
            AgentError::InvalidToolInput(format!("'{}' must be a number, got '{}'", key, s))
        }),
        Some(other) => Err(AgentError::InvalidToolInput(format!(
            "'{}' must be a number, got {}",
            key, other
        ))),
    }
}

fn optional_quantity(input: &ToolInput) -> Result<Option<u32>> {
    match optional_f64(input, "quantity")? {
        None => Ok(None),
        Some(q) if q.fract() == 0.0 && q >= 0.0 && q <= u32::MAX as f64 => Ok(Some(q as u32)),
        Some(q) => Err(AgentError::InvalidToolInput(format!(
            "'quantity' must be a whole number, got {}",
            q
        ))),
    }
}

fn found(order: Order) -> ToolOutput {
    ToolOutput {
        success: true,
        data: json!(order),
        error: None,
    }
}

fn not_found(what: String) -> ToolOutput {
    ToolOutput {
        success: false,
        data: Value::Null,
        error: Some(what),
    }
}

fn listing(orders: Vec<Order>) -> ToolOutput {
    ToolOutput {
        success: true,
        data: json!({
            "count": orders.len(),
            "orders": orders,
        }),
        error: None,
    }
}

//
// ================= Order tools =================
//

pub struct CreateOrderTool {
    orders: Arc<dyn OrderStore>,
}

impl CreateOrderTool {
    pub fn new(orders: Arc<dyn OrderStore>) -> Self {
        Self { orders }
    }
}

#[async_trait::async_trait]
impl Tool for CreateOrderTool {
    fn name(&self) -> &'static str {
        "create_order"
    }

    fn description(&self) -> &'static str {
        "Create an order. Arguments: customer_name, product_name, quantity, unit_price"
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        ensure_object_parameters(input)?;
        let customer_name = require_str(input, "customer_name")?;
        let product_name = require_str(input, "product_name")?;
        let quantity = optional_quantity(input)?
            .ok_or_else(|| AgentError::InvalidToolInput("Expected 'quantity' in arguments".to_string()))?;
        let unit_price = optional_f64(input, "unit_price")?.ok_or_else(|| {
            AgentError::InvalidToolInput("Expected 'unit_price' in arguments".to_string())
        })?;

        let order = self
            .orders
            .create(customer_name, product_name, quantity, unit_price)
            .await?;

        Ok(found(order))
    }
}

pub struct GetOrderTool {
    orders: Arc<dyn OrderStore>,
}

impl GetOrderTool {
    pub fn new(orders: Arc<dyn OrderStore>) -> Self {
        Self { orders }
    }
}

#[async_trait::async_trait]
impl Tool for GetOrderTool {
    fn name(&self) -> &'static str {
        "get_order"
    }

    fn description(&self) -> &'static str {
        "Look up one order by id. Arguments: order_id"
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        ensure_object_parameters(input)?;
        let order_id = require_str(input, "order_id")?;

        Ok(match self.orders.get(order_id).await? {
            Some(order) => found(order),
            None => not_found(format!("Order not found: {}", order_id)),
        })
    }
}

pub struct OrdersByCustomerTool {
    orders: Arc<dyn OrderStore>,
}

impl OrdersByCustomerTool {
    pub fn new(orders: Arc<dyn OrderStore>) -> Self {
        Self { orders }
    }
}

#[async_trait::async_trait]
impl Tool for OrdersByCustomerTool {
    fn name(&self) -> &'static str {
        "orders_by_customer"
    }

    fn description(&self) -> &'static str {
        "List orders placed by a customer. Arguments: customer_name"
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        ensure_object_parameters(input)?;
        let customer_name = require_str(input, "customer_name")?;
        Ok(listing(self.orders.by_customer(customer_name).await?))
    }
}

pub struct OrdersByProductTool {
    orders: Arc<dyn OrderStore>,
}

impl OrdersByProductTool {
    pub fn new(orders: Arc<dyn OrderStore>) -> Self {
        Self { orders }
    }
}

#[async_trait::async_trait]
impl Tool for OrdersByProductTool {
    fn name(&self) -> &'static str {
        "orders_by_product"
    }

    fn description(&self) -> &'static str {
        "List orders for a product. Arguments: product_name"
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        ensure_object_parameters(input)?;
        let product_name = require_str(input, "product_name")?;
        Ok(listing(self.orders.by_product(product_name).await?))
    }
}

pub struct AllOrdersTool {
    orders: Arc<dyn OrderStore>,
}

impl AllOrdersTool {
    pub fn new(orders: Arc<dyn OrderStore>) -> Self {
        Self { orders }
    }
}

#[async_trait::async_trait]
impl Tool for AllOrdersTool {
    fn name(&self) -> &'static str {
        "all_orders"
    }

    fn description(&self) -> &'static str {
        "List every order. No arguments"
    }

    async fn execute(&self, _input: &ToolInput) -> Result<ToolOutput> {
        Ok(listing(self.orders.all().await?))
    }
}

pub struct LatestOrderTool {
    orders: Arc<dyn OrderStore>,
}

impl LatestOrderTool {
    pub fn new(orders: Arc<dyn OrderStore>) -> Self {
        Self { orders }
    }
}

#[async_trait::async_trait]
impl Tool for LatestOrderTool {
    fn name(&self) -> &'static str {
        "latest_order"
    }

    fn description(&self) -> &'static str {
        "Fetch the most recently created or changed order. No arguments"
    }

    async fn execute(&self, _input: &ToolInput) -> Result<ToolOutput> {
        Ok(match self.orders.latest().await? {
            Some(order) => found(order),
            None => not_found("No orders yet".to_string()),
        })
    }
}

pub struct UpdateOrderTool {
    orders: Arc<dyn OrderStore>,
}

impl UpdateOrderTool {
    pub fn new(orders: Arc<dyn OrderStore>) -> Self {
        Self { orders }
    }
}

#[async_trait::async_trait]
impl Tool for UpdateOrderTool {
    fn name(&self) -> &'static str {
        "update_order"
    }

    fn description(&self) -> &'static str {
        "Change an order. Arguments: order_id, and any of product_name, quantity, unit_price"
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        ensure_object_parameters(input)?;
        let order_id = require_str(input, "order_id")?;

        let update = OrderUpdate {
            product_name: optional_str(input, "product_name").map(str::to_string),
            quantity: optional_quantity(input)?,
            unit_price: optional_f64(input, "unit_price")?,
        };

        if update == OrderUpdate::default() {
            return Err(AgentError::InvalidToolInput(
                "Expected at least one of 'product_name', 'quantity', 'unit_price'".to_string(),
            ));
        }

        Ok(found(self.orders.update(order_id, update).await?))
    }
}

pub struct CancelOrderTool {
    orders: Arc<dyn OrderStore>,
}

impl CancelOrderTool {
    pub fn new(orders: Arc<dyn OrderStore>) -> Self {
        Self { orders }
    }
}

#[async_trait::async_trait]
impl Tool for CancelOrderTool {
    fn name(&self) -> &'static str {
        "cancel_order"
    }

    fn description(&self) -> &'static str {
        "Cancel an order. Arguments: order_id"
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        ensure_object_parameters(input)?;
        let order_id = require_str(input, "order_id")?;
        Ok(found(self.orders.cancel(order_id).await?))
    }
}

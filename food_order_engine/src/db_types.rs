use std::{fmt::Display, str::FromStr, sync::OnceLock};

use chrono::{DateTime, Datelike, Utc};
pub use fo_common::Cents;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(pub String);

/// Implements `Display` and `FromStr` for a fieldless enum using the given wire names.
macro_rules! wire_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $text),)+
                }
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    s => Err(ConversionError(format!("{s} is not a valid {}", stringify!($name)))),
                }
            }
        }
    };
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// The order has been placed and is awaiting confirmation (usually payment).
    Pending,
    /// Payment has been received, or the restaurant accepted a cash order.
    Confirmed,
    /// The kitchen is preparing the order.
    Preparing,
    /// The order is ready for pick-up by a rider.
    Ready,
    OutForDelivery,
    Delivered,
    /// The order was cancelled by the customer or an admin before preparation started.
    Cancelled,
}

wire_enum!(OrderStatusType {
    Pending => "pending",
    Confirmed => "confirmed",
    Preparing => "preparing",
    Ready => "ready",
    OutForDelivery => "out_for_delivery",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

impl OrderStatusType {
    pub const ALL: [OrderStatusType; 7] = [
        OrderStatusType::Pending,
        OrderStatusType::Confirmed,
        OrderStatusType::Preparing,
        OrderStatusType::Ready,
        OrderStatusType::OutForDelivery,
        OrderStatusType::Delivered,
        OrderStatusType::Cancelled,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

//--------------------------------------   Payment enums       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    AlternativeGateway,
    Cash,
}

wire_enum!(PaymentMethod {
    Card => "card",
    AlternativeGateway => "alternative_gateway",
    Cash => "cash",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

wire_enum!(PaymentStatus {
    Pending => "pending",
    Paid => "paid",
    Failed => "failed",
    Refunded => "refunded",
});

//--------------------------------------   Identifiers         ---------------------------------------------------------
/// A reference to a registered user of the platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(pub String);

impl Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<S: Into<String>> From<S> for CustomerId {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

impl CustomerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The principal (admin, customer, or integration) that triggered a change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub String);

impl Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<S: Into<String>> From<S> for ActorId {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

//--------------------------------------     OrderNumber       ---------------------------------------------------------
/// Human-readable order number of the form `ORD-YYYYNNNNNN`. The sequence is zero-padded to six digits and grows
/// past that without padding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderNumber(String);

fn order_number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^ORD-(\d{4})(\d{6}|[1-9]\d{6,})$").expect("order number pattern is valid"))
}

impl OrderNumber {
    /// Builds the order number for the `sequence`th order, placed at `placed_at`.
    ///
    /// Sequences beyond 999,999 are written out in full rather than truncated, so numbers never collide.
    pub fn new(placed_at: DateTime<Utc>, sequence: i64) -> Self {
        Self(format!("ORD-{:04}{:06}", placed_at.year(), sequence))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn year(&self) -> i32 {
        self.0[4..8].parse().unwrap_or_default()
    }

    pub fn sequence(&self) -> i64 {
        self.0[8..].parse().unwrap_or_default()
    }
}

impl FromStr for OrderNumber {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_uppercase();
        if order_number_pattern().is_match(&s) {
            Ok(Self(s))
        } else {
            Err(ConversionError(format!("{s} is not a valid order number")))
        }
    }
}

impl TryFrom<String> for OrderNumber {
    type Error = ConversionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OrderNumber> for String {
    fn from(value: OrderNumber) -> Self {
        value.0
    }
}

impl Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------     CustomerInfo      ---------------------------------------------------------
/// Contact and delivery details captured when the order is placed. Later profile changes do not affect it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub postal_code: Option<String>,
    pub delivery_instructions: Option<String>,
}

impl CustomerInfo {
    pub fn new<S: Into<String>>(name: S, email: S, phone: S, address: S, city: S) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            phone: phone.into(),
            address: address.into(),
            city: city.into(),
            postal_code: None,
            delivery_instructions: None,
        }
    }

    pub fn with_postal_code<S: Into<String>>(mut self, postal_code: S) -> Self {
        self.postal_code = Some(postal_code.into());
        self
    }

    pub fn with_delivery_instructions<S: Into<String>>(mut self, instructions: S) -> Self {
        self.delivery_instructions = Some(instructions.into());
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        let required = [
            ("name", &self.name),
            ("email", &self.email),
            ("phone", &self.phone),
            ("address", &self.address),
            ("city", &self.city),
        ];
        if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(format!("Customer {field} is required"));
        }
        if !self.email.contains('@') {
            return Err(format!("{} is not a valid email address", self.email));
        }
        Ok(())
    }
}

//--------------------------------------       LineItem        ---------------------------------------------------------
/// A snapshot of a menu item at the time the order was placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub menu_item_id: String,
    pub name: String,
    pub unit_price: Cents,
    pub quantity: u32,
    pub category: Option<String>,
}

impl LineItem {
    pub fn new<S: Into<String>>(menu_item_id: S, name: S, unit_price: Cents, quantity: u32) -> Self {
        Self { menu_item_id: menu_item_id.into(), name: name.into(), unit_price, quantity, category: None }
    }

    pub fn with_category<S: Into<String>>(mut self, category: S) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn line_total(&self) -> Cents {
        self.unit_price * i64::from(self.quantity)
    }
}

//--------------------------------------    Status history     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusHistoryEntry {
    pub status: OrderStatusType,
    pub timestamp: DateTime<Utc>,
    pub actor: Option<ActorId>,
    pub note: Option<String>,
}

impl StatusHistoryEntry {
    pub fn new(status: OrderStatusType, timestamp: DateTime<Utc>) -> Self {
        Self { status, timestamp, actor: None, note: None }
    }

    pub fn with_actor(mut self, actor: Option<ActorId>) -> Self {
        self.actor = actor;
        self
    }

    pub fn with_note(mut self, note: Option<String>) -> Self {
        self.note = note;
        self
    }
}

/// The per-status "first entered at" timestamps of an order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusTimestamps {
    pub confirmed_at: Option<DateTime<Utc>>,
    pub preparing_at: Option<DateTime<Utc>>,
    pub ready_at: Option<DateTime<Utc>>,
    pub out_for_delivery_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl StatusTimestamps {
    /// The timestamp tracked for `status`. `Pending` has none; its time is the order creation time.
    pub fn get(&self, status: OrderStatusType) -> Option<DateTime<Utc>> {
        match status {
            OrderStatusType::Pending => None,
            OrderStatusType::Confirmed => self.confirmed_at,
            OrderStatusType::Preparing => self.preparing_at,
            OrderStatusType::Ready => self.ready_at,
            OrderStatusType::OutForDelivery => self.out_for_delivery_at,
            OrderStatusType::Delivered => self.delivered_at,
            OrderStatusType::Cancelled => self.cancelled_at,
        }
    }

    pub(crate) fn slot_mut(&mut self, status: OrderStatusType) -> Option<&mut Option<DateTime<Utc>>> {
        match status {
            OrderStatusType::Pending => None,
            OrderStatusType::Confirmed => Some(&mut self.confirmed_at),
            OrderStatusType::Preparing => Some(&mut self.preparing_at),
            OrderStatusType::Ready => Some(&mut self.ready_at),
            OrderStatusType::OutForDelivery => Some(&mut self.out_for_delivery_at),
            OrderStatusType::Delivered => Some(&mut self.delivered_at),
            OrderStatusType::Cancelled => Some(&mut self.cancelled_at),
        }
    }
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    pub order_number: OrderNumber,
    #[serde(rename = "customer")]
    pub customer_id: Option<CustomerId>,
    pub customer_info: CustomerInfo,
    pub items: Vec<LineItem>,
    pub subtotal: Cents,
    pub discount: Cents,
    pub coupon_code: Option<String>,
    pub total_amount: Cents,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub(crate) status: OrderStatusType,
    pub(crate) status_history: Vec<StatusHistoryEntry>,
    #[serde(flatten)]
    pub(crate) timestamps: StatusTimestamps,
    pub(crate) estimated_delivery_time: Option<DateTime<Utc>>,
    pub(crate) actual_delivery_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The raw, unchecked contents of an order record, as read back from storage.
#[derive(Debug, Clone)]
pub struct OrderParts {
    pub id: i64,
    pub order_number: OrderNumber,
    pub customer_id: Option<CustomerId>,
    pub customer_info: CustomerInfo,
    pub items: Vec<LineItem>,
    pub subtotal: Cents,
    pub discount: Cents,
    pub coupon_code: Option<String>,
    pub total_amount: Cents,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub status: OrderStatusType,
    pub status_history: Vec<StatusHistoryEntry>,
    pub timestamps: StatusTimestamps,
    pub estimated_delivery_time: Option<DateTime<Utc>>,
    pub actual_delivery_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Error)]
#[error("Order {order_number} is inconsistent: {reason}")]
pub struct OrderIntegrityError {
    pub order_number: String,
    pub reason: String,
}

impl Order {
    /// Assembles an order from stored parts, checking the lifecycle invariants:
    /// * the history is non-empty and its last entry matches the current status,
    /// * every derived timestamp is set if and only if its status appears in the history,
    /// * the delivery times are consistent with the statuses reached.
    pub fn from_parts(parts: OrderParts) -> Result<Self, OrderIntegrityError> {
        let fail = |reason: String| OrderIntegrityError { order_number: parts.order_number.to_string(), reason };
        let last = parts.status_history.last().ok_or_else(|| fail("status history is empty".into()))?;
        if last.status != parts.status {
            return Err(fail(format!("status is {} but the last history entry is {}", parts.status, last.status)));
        }
        for status in OrderStatusType::ALL.into_iter().filter(|s| *s != OrderStatusType::Pending) {
            let in_history = parts.status_history.iter().any(|e| e.status == status);
            let has_timestamp = parts.timestamps.get(status).is_some();
            if in_history != has_timestamp {
                return Err(fail(format!("{status} timestamp does not match the status history")));
            }
        }
        if parts.estimated_delivery_time.is_some() != parts.timestamps.out_for_delivery_at.is_some() {
            return Err(fail("estimated delivery time without an out_for_delivery transition".into()));
        }
        if parts.actual_delivery_time.is_some() != parts.timestamps.delivered_at.is_some() {
            return Err(fail("actual delivery time without a delivered transition".into()));
        }
        Ok(Self {
            id: parts.id,
            order_number: parts.order_number,
            customer_id: parts.customer_id,
            customer_info: parts.customer_info,
            items: parts.items,
            subtotal: parts.subtotal,
            discount: parts.discount,
            coupon_code: parts.coupon_code,
            total_amount: parts.total_amount,
            payment_method: parts.payment_method,
            payment_status: parts.payment_status,
            status: parts.status,
            status_history: parts.status_history,
            timestamps: parts.timestamps,
            estimated_delivery_time: parts.estimated_delivery_time,
            actual_delivery_time: parts.actual_delivery_time,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
        })
    }

    pub fn status(&self) -> OrderStatusType {
        self.status
    }

    pub fn status_history(&self) -> &[StatusHistoryEntry] {
        &self.status_history
    }

    pub fn timestamps(&self) -> &StatusTimestamps {
        &self.timestamps
    }

    pub fn estimated_delivery_time(&self) -> Option<DateTime<Utc>> {
        self.estimated_delivery_time
    }

    pub fn actual_delivery_time(&self) -> Option<DateTime<Utc>> {
        self.actual_delivery_time
    }

    pub fn is_guest_order(&self) -> bool {
        self.customer_id.is_none()
    }

    /// The topic that clients tracking this order subscribe to.
    pub fn tracking_topic(&self) -> String {
        format!("order-{}", self.id)
    }
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
/// A checkout request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub customer_id: Option<CustomerId>,
    pub customer_info: CustomerInfo,
    pub items: Vec<LineItem>,
    pub payment_method: PaymentMethod,
    pub coupon_code: Option<String>,
}

impl NewOrder {
    pub fn new(customer_info: CustomerInfo, items: Vec<LineItem>, payment_method: PaymentMethod) -> Self {
        Self { customer_id: None, customer_info, items, payment_method, coupon_code: None }
    }

    pub fn for_customer<C: Into<CustomerId>>(mut self, customer_id: C) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn with_coupon<S: Into<String>>(mut self, code: S) -> Self {
        self.coupon_code = Some(code.into());
        self
    }

    pub fn subtotal(&self) -> Cents {
        self.items.iter().map(LineItem::line_total).sum()
    }

    pub fn validate(&self) -> Result<(), String> {
        self.customer_info.validate()?;
        if self.items.is_empty() {
            return Err("An order must contain at least one item".into());
        }
        for item in &self.items {
            if item.quantity == 0 {
                return Err(format!("Quantity for {} must be at least 1", item.name));
            }
            if item.unit_price.is_negative() {
                return Err(format!("Price for {} cannot be negative", item.name));
            }
        }
        Ok(())
    }
}

/// A priced, validated order ready to be stored. The coupon usage, if any, is recorded in the same transaction.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub customer_id: Option<CustomerId>,
    pub customer_info: CustomerInfo,
    pub items: Vec<LineItem>,
    pub payment_method: PaymentMethod,
    pub subtotal: Cents,
    pub discount: Cents,
    pub total_amount: Cents,
    pub coupon: Option<AppliedCoupon>,
    pub placed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AppliedCoupon {
    pub coupon_id: i64,
    pub code: String,
    pub discount: Cents,
}

//--------------------------------------        Loyalty        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoyaltyTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

wire_enum!(LoyaltyTier {
    Bronze => "bronze",
    Silver => "silver",
    Gold => "gold",
    Platinum => "platinum",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoyaltyAccount {
    pub customer_id: CustomerId,
    pub points: i64,
    pub total_points_earned: i64,
    pub total_points_redeemed: i64,
    pub last_earned_at: Option<DateTime<Utc>>,
    pub last_redeemed_at: Option<DateTime<Utc>>,
    /// Optimistic-lock counter; incremented on every write.
    #[serde(skip)]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoyaltyTransactionType {
    Earned,
    Redeemed,
    Expired,
    Adjusted,
}

wire_enum!(LoyaltyTransactionType {
    Earned => "earned",
    Redeemed => "redeemed",
    Expired => "expired",
    Adjusted => "adjusted",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoyaltyTransaction {
    pub id: i64,
    pub customer_id: CustomerId,
    #[serde(rename = "type")]
    pub transaction_type: LoyaltyTransactionType,
    pub points: i64,
    pub balance_after: i64,
    pub description: String,
    pub related_order: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// A history entry produced by a ledger operation, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLoyaltyTransaction {
    pub transaction_type: LoyaltyTransactionType,
    pub points: i64,
    pub balance_after: i64,
    pub description: String,
    pub related_order: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// An accrual queued by the `delivered` transition and applied to the ledger exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoyaltyAccrual {
    pub id: i64,
    pub order_id: i64,
    pub order_number: OrderNumber,
    pub customer_id: CustomerId,
    pub amount: Cents,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------        Coupons        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "discountType", rename_all = "snake_case")]
pub enum DiscountKind {
    /// A share of the eligible amount in basis points (1/100 of a percent), so 1250 is 12.5%.
    #[serde(rename_all = "camelCase")]
    Percentage { basis_points: u32, max_discount: Option<Cents> },
    Fixed { amount: Cents },
}

impl DiscountKind {
    pub const FULL_BASIS_POINTS: u32 = 10_000;

    /// A whole-percent discount.
    pub fn percent(percent: u32, max_discount: Option<Cents>) -> Self {
        Self::Percentage { basis_points: percent.saturating_mul(100), max_discount }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponUsage {
    pub customer_id: Option<CustomerId>,
    pub order_id: i64,
    pub discount: Cents,
    pub used_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: i64,
    pub code: String,
    pub description: Option<String>,
    #[serde(flatten)]
    pub discount: DiscountKind,
    pub min_order_amount: Cents,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub usage_limit: Option<u32>,
    pub usage_limit_per_user: Option<u32>,
    pub applicable_categories: Vec<String>,
    pub excluded_categories: Vec<String>,
    pub allowed_customers: Vec<CustomerId>,
    pub excluded_customers: Vec<CustomerId>,
    pub first_order_only: bool,
    pub is_active: bool,
    pub usage_history: Vec<CouponUsage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Coupon {
    /// Number of times this coupon has been applied. Always derived from the usage history.
    pub fn usage_count(&self) -> usize {
        self.usage_history.len()
    }

    pub fn usage_count_for(&self, customer_id: &CustomerId) -> usize {
        self.usage_history.iter().filter(|u| u.customer_id.as_ref() == Some(customer_id)).count()
    }
}

/// Admin request to create a coupon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCoupon {
    pub code: String,
    pub description: Option<String>,
    #[serde(flatten)]
    pub discount: DiscountKind,
    #[serde(default)]
    pub min_order_amount: Cents,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub usage_limit: Option<u32>,
    pub usage_limit_per_user: Option<u32>,
    #[serde(default)]
    pub applicable_categories: Vec<String>,
    #[serde(default)]
    pub excluded_categories: Vec<String>,
    #[serde(default)]
    pub allowed_customers: Vec<CustomerId>,
    #[serde(default)]
    pub excluded_customers: Vec<CustomerId>,
    #[serde(default)]
    pub first_order_only: bool,
}

impl NewCoupon {
    pub fn new<S: Into<String>>(
        code: S,
        discount: DiscountKind,
        valid_from: DateTime<Utc>,
        valid_until: DateTime<Utc>,
    ) -> Self {
        Self {
            code: code.into(),
            description: None,
            discount,
            min_order_amount: Cents::zero(),
            valid_from,
            valid_until,
            usage_limit: None,
            usage_limit_per_user: None,
            applicable_categories: vec![],
            excluded_categories: vec![],
            allowed_customers: vec![],
            excluded_customers: vec![],
            first_order_only: false,
        }
    }

    pub fn with_min_order_amount(mut self, amount: Cents) -> Self {
        self.min_order_amount = amount;
        self
    }

    pub fn with_usage_limit(mut self, limit: u32) -> Self {
        self.usage_limit = Some(limit);
        self
    }

    pub fn with_usage_limit_per_user(mut self, limit: u32) -> Self {
        self.usage_limit_per_user = Some(limit);
        self
    }

    pub fn with_applicable_categories(mut self, categories: &[&str]) -> Self {
        self.applicable_categories = categories.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_excluded_categories(mut self, categories: &[&str]) -> Self {
        self.excluded_categories = categories.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn first_order_only(mut self) -> Self {
        self.first_order_only = true;
        self
    }

    /// Normalises the code to upper case and checks the discount definition and validity window.
    pub fn normalize(mut self) -> Result<Self, String> {
        self.code = self.code.trim().to_uppercase();
        if self.code.is_empty() {
            return Err("Coupon code cannot be empty".into());
        }
        match self.discount {
            DiscountKind::Percentage { basis_points, max_discount } => {
                if basis_points == 0 || basis_points > DiscountKind::FULL_BASIS_POINTS {
                    return Err(format!(
                        "Percentage discount must be between 1 and {} basis points, not {basis_points}",
                        DiscountKind::FULL_BASIS_POINTS
                    ));
                }
                if max_discount.is_some_and(|m| m.value() <= 0) {
                    return Err("Maximum discount must be positive".into());
                }
            },
            DiscountKind::Fixed { amount } => {
                if amount.value() <= 0 {
                    return Err("Fixed discount must be positive".into());
                }
            },
        }
        if self.min_order_amount.is_negative() {
            return Err("Minimum order amount cannot be negative".into());
        }
        if self.valid_until <= self.valid_from {
            return Err("Coupon must expire after it becomes valid".into());
        }
        Ok(self)
    }
}

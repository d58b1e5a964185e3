//! Request and Response Schemas
//!
//! Bodies are deserialized loosely and then validated into typed commands, so
//! a single response can list every violated rule.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PaymentError, Result};
use crate::mailing::MailingGroup;
use crate::model::{Reference, Role};

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// Accepts a JSON number or numeric string; only positive values pass
pub fn parse_amount(value: Option<&Value>) -> Option<Decimal> {
    let amount = match value? {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok()?,
        Value::String(s) => Decimal::from_str(s.trim()).ok()?,
        _ => return None,
    };
    (amount > Decimal::ZERO).then_some(amount)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

// ============================================================================
// Registration
// ============================================================================

/// `POST /register`
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default, rename = "planId")]
    pub plan_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// A registration that passed validation
#[derive(Clone, Debug, PartialEq)]
pub struct Registration {
    pub email: String,
    pub amount: Decimal,
    pub plan: String,
    pub plan_id: String,
    pub name: String,
    pub role: Role,
}

impl RegisterRequest {
    pub fn validate(self) -> Result<Registration> {
        let mut violations = Vec::new();

        let email = non_empty(self.email.as_deref()).filter(|e| is_valid_email(e));
        if email.is_none() {
            violations.push("email must be a valid email address".to_string());
        }

        let amount = parse_amount(self.amount.as_ref());
        if amount.is_none() {
            violations.push("amount must be a positive number".to_string());
        }

        let plan = non_empty(self.plan.as_deref());
        if plan.is_none() {
            violations.push("plan is required".to_string());
        }

        let plan_id = non_empty(self.plan_id.as_deref());
        if plan_id.is_none() {
            violations.push("planId is required".to_string());
        }

        let name = non_empty(self.name.as_deref());
        if name.is_none() {
            violations.push("name is required".to_string());
        }

        let role = match self.role.as_deref() {
            None => Some(Role::default()),
            Some(raw) => Role::parse(raw),
        };
        if role.is_none() {
            violations.push("role must be either 'business' or 'customer'".to_string());
        }

        match (email, amount, plan, plan_id, name, role) {
            (Some(email), Some(amount), Some(plan), Some(plan_id), Some(name), Some(role))
                if violations.is_empty() =>
            {
                Ok(Registration {
                    email,
                    amount,
                    plan,
                    plan_id,
                    name,
                    role,
                })
            }
            _ => Err(PaymentError::InvalidRequest(violations)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub authorization_url: String,
}

// ============================================================================
// Verification
// ============================================================================

/// `POST /verify`
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyRequest {
    #[serde(default)]
    pub reference: Option<String>,
}

impl VerifyRequest {
    pub fn validate(self) -> Result<Reference> {
        non_empty(self.reference.as_deref())
            .map(Reference::from_string)
            .ok_or_else(|| PaymentError::invalid("reference is required"))
    }
}

/// Success payload consumed by the payment-success page
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub message: String,
    #[serde(rename = "planId")]
    pub plan_id: String,
    pub metadata: VerifyMetadata,
    pub customer: VerifyCustomer,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyMetadata {
    pub full_name: String,
    pub role: Role,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyCustomer {
    pub email: String,
}

// ============================================================================
// Gateway callback
// ============================================================================

/// Form-encoded status update posted by the gateway
#[derive(Clone, Debug, PartialEq)]
pub struct CallbackNotice {
    pub reference: String,
    pub paynow_reference: String,
    pub amount: Decimal,
    pub status: String,
    pub poll_url: Option<String>,
    /// Fields in received order, for hash verification
    pub fields: Vec<(String, String)>,
}

impl CallbackNotice {
    /// Parses an `application/x-www-form-urlencoded` webhook body
    pub fn from_form(body: &str) -> Result<Self> {
        let fields: Vec<(String, String)> = serde_urlencoded::from_str(body)
            .map_err(|e| PaymentError::invalid(format!("malformed form body: {e}")))?;

        let get = |key: &str| {
            fields
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v.trim())
                .filter(|v| !v.is_empty())
                .map(ToString::to_string)
        };

        let mut violations = Vec::new();
        let reference = get("reference");
        if reference.is_none() {
            violations.push("reference is required".to_string());
        }
        let paynow_reference = get("paynowreference");
        if paynow_reference.is_none() {
            violations.push("paynowreference is required".to_string());
        }
        let amount = get("amount").and_then(|a| Decimal::from_str(&a).ok());
        if amount.is_none() {
            violations.push("amount must be a number".to_string());
        }
        let status = get("status");
        if status.is_none() {
            violations.push("status is required".to_string());
        }

        match (reference, paynow_reference, amount, status) {
            (Some(reference), Some(paynow_reference), Some(amount), Some(status)) => Ok(Self {
                reference,
                paynow_reference,
                amount,
                status,
                poll_url: get("pollurl"),
                fields,
            }),
            _ => Err(PaymentError::InvalidRequest(violations)),
        }
    }

    pub fn has_hash(&self) -> bool {
        self.fields.iter().any(|(k, _)| k.eq_ignore_ascii_case("hash"))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackResponse {
    pub success: bool,
}

// ============================================================================
// Process payment
// ============================================================================

/// `POST /process-payment`
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessPaymentRequest {
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "userId")]
    pub user_id: Option<String>,
    #[serde(default, rename = "businessId")]
    pub business_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PaymentOrder {
    pub amount: Decimal,
    pub email: String,
    pub reference: String,
    pub description: Option<String>,
    pub user_id: Option<String>,
    pub business_id: Option<String>,
}

impl ProcessPaymentRequest {
    pub fn validate(self) -> Result<PaymentOrder> {
        let mut violations = Vec::new();

        let amount = parse_amount(self.amount.as_ref());
        if amount.is_none() {
            violations.push("amount must be a positive number".to_string());
        }
        let email = non_empty(self.email.as_deref()).filter(|e| is_valid_email(e));
        if email.is_none() {
            violations.push("email must be a valid email address".to_string());
        }
        let reference = non_empty(self.reference.as_deref());
        if reference.is_none() {
            violations.push("reference is required".to_string());
        }
        let user_id = non_empty(self.user_id.as_deref());
        let business_id = non_empty(self.business_id.as_deref());
        if user_id.is_some() && business_id.is_some() {
            violations.push("only one of userId or businessId may be set".to_string());
        }

        match (amount, email, reference) {
            (Some(amount), Some(email), Some(reference)) if violations.is_empty() => {
                Ok(PaymentOrder {
                    amount,
                    email,
                    reference,
                    description: non_empty(self.description.as_deref()),
                    user_id,
                    business_id,
                })
            }
            _ => Err(PaymentError::InvalidRequest(violations)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPaymentResponse {
    pub success: bool,
    pub poll_url: String,
    pub instructions: Option<String>,
    pub redirect_url: String,
}

// ============================================================================
// Lead capture
// ============================================================================

/// `POST /subscribe`
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubscribeRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub lead_type: Option<String>,
    #[serde(default)]
    pub fields: Option<Map<String, Value>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LeadSignup {
    pub email: String,
    pub name: Option<String>,
    pub lead_type: Option<String>,
    pub fields: Map<String, Value>,
}

impl LeadSignup {
    /// `business` and `partner` signups join the business group
    pub fn group(&self) -> MailingGroup {
        match self.lead_type.as_deref().map(str::to_lowercase).as_deref() {
            Some("business" | "partner") => MailingGroup::Business,
            _ => MailingGroup::Customer,
        }
    }
}

impl SubscribeRequest {
    pub fn validate(self) -> Result<LeadSignup> {
        let email = non_empty(self.email.as_deref())
            .filter(|e| is_valid_email(e))
            .ok_or_else(|| PaymentError::invalid("email must be a valid email address"))?;

        Ok(LeadSignup {
            email,
            name: non_empty(self.name.as_deref()),
            lead_type: non_empty(self.lead_type.as_deref()),
            fields: self.fields.unwrap_or_default(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubscribeResponse {
    pub ok: bool,
    pub result: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn register(body: Value) -> Result<Registration> {
        serde_json::from_value::<RegisterRequest>(body).unwrap().validate()
    }

    #[test]
    fn test_valid_registration() {
        let registration = register(json!({
            "email": "a@b.com",
            "amount": 19.99,
            "plan": "Essential",
            "planId": "essential",
            "name": "Acme",
        }))
        .unwrap();
        assert_eq!(registration.amount, dec!(19.99));
        assert_eq!(registration.role, Role::Business);
    }

    #[test]
    fn test_registration_lists_every_violation() {
        let err = register(json!({
            "email": "not-an-email",
            "amount": -5,
            "plan": "",
            "role": "admin",
        }))
        .unwrap_err();

        let violations = err.violations().unwrap();
        assert_eq!(violations.len(), 6);
        assert!(violations.iter().any(|v| v.starts_with("email")));
        assert!(violations.iter().any(|v| v.starts_with("amount")));
        assert!(violations.iter().any(|v| v.starts_with("role")));
    }

    #[test]
    fn test_amount_parsing() {
        assert_eq!(parse_amount(Some(&json!("25.50"))), Some(dec!(25.50)));
        assert_eq!(parse_amount(Some(&json!(0))), None);
        assert_eq!(parse_amount(Some(&json!("abc"))), None);
        assert_eq!(parse_amount(Some(&json!(true))), None);
        assert_eq!(parse_amount(None), None);
    }

    #[test]
    fn test_role_accepts_mixed_case() {
        let registration = register(json!({
            "email": "a@b.com",
            "amount": "5",
            "plan": "Basic",
            "planId": "basic",
            "name": "Jo",
            "role": "Customer",
        }))
        .unwrap();
        assert_eq!(registration.role, Role::Customer);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(serde_json::from_value::<VerifyRequest>(json!({"ref": "HC-1"})).is_err());
    }

    #[test]
    fn test_verify_requires_reference() {
        let err = VerifyRequest { reference: Some("  ".into()) }.validate().unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_verify_response_shape() {
        let response = VerifyResponse {
            message: "ok".into(),
            plan_id: "essential".into(),
            metadata: VerifyMetadata {
                full_name: "Acme".into(),
                role: Role::Business,
            },
            customer: VerifyCustomer {
                email: "a@b.com".into(),
            },
        };
        assert_eq!(
            serde_json::to_value(response).unwrap(),
            json!({
                "message": "ok",
                "planId": "essential",
                "metadata": {"full_name": "Acme", "role": "business"},
                "customer": {"email": "a@b.com"},
            })
        );
    }

    #[test]
    fn test_callback_form_parsing() {
        let notice = CallbackNotice::from_form(
            "reference=INV-1&paynowreference=998877&amount=10.00&status=Paid&pollurl=https%3A%2F%2Fpay%2Fpoll&hash=ABC",
        )
        .unwrap();
        assert_eq!(notice.reference, "INV-1");
        assert_eq!(notice.amount, dec!(10.00));
        assert_eq!(notice.poll_url.as_deref(), Some("https://pay/poll"));
        assert!(notice.has_hash());
    }

    #[test]
    fn test_callback_form_missing_fields() {
        let err = CallbackNotice::from_form("reference=INV-1&amount=ten").unwrap_err();
        assert_eq!(err.violations().unwrap().len(), 3);
    }

    #[test]
    fn test_process_payment_rejects_both_owners() {
        let err = serde_json::from_value::<ProcessPaymentRequest>(json!({
            "amount": 10,
            "email": "a@b.com",
            "reference": "INV-1",
            "userId": "u1",
            "businessId": "b1",
        }))
        .unwrap()
        .validate()
        .unwrap_err();
        assert_eq!(err.violations().unwrap().len(), 1);
    }

    #[test]
    fn test_lead_group_routing() {
        let signup = |t: Option<&str>| LeadSignup {
            email: "a@b.com".into(),
            name: None,
            lead_type: t.map(Into::into),
            fields: Map::new(),
        };
        assert_eq!(signup(Some("Partner")).group(), MailingGroup::Business);
        assert_eq!(signup(Some("business")).group(), MailingGroup::Business);
        assert_eq!(signup(Some("shopper")).group(), MailingGroup::Customer);
        assert_eq!(signup(None).group(), MailingGroup::Customer);
    }
}

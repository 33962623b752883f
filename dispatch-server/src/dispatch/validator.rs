//! Inbound event validation

use serde_json::Value;
use shared::OrderEvent;
use shared::money::{MAX_AMOUNT, in_range};

use crate::error::DispatchError;

/// Parse an order-created event
///
/// Accepted shapes:
/// - the order object itself
/// - a JSON string whose content is the order object
/// - an envelope `{"body": "<order json>"}` (or `{"body": {...}}`)
pub fn parse_event(body: &[u8]) -> Result<OrderEvent, DispatchError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| DispatchError::Validation(format!("body is not JSON: {e}")))?;
    let value = unwrap_payload(value)?;

    if !value.is_object() {
        return Err(DispatchError::Validation("order must be a JSON object".into()));
    }

    let event: OrderEvent = serde_json::from_value(value)
        .map_err(|e| DispatchError::Validation(format!("order does not match schema: {e}")))?;

    match event.id.as_deref().map(str::trim) {
        None | Some("") | Some("0") => Err(DispatchError::Validation("order has no id".into())),
        Some(_) => {
            check_amounts(&event)?;
            Ok(event)
        }
    }
}

/// Every amount the pipeline does arithmetic on must be within [`MAX_AMOUNT`]
fn check_amounts(event: &OrderEvent) -> Result<(), DispatchError> {
    let order = [
        ("total_price", event.total_price),
        ("subtotal_price", event.subtotal_price),
    ];
    let lines = event.line_items.iter().flat_map(|li| {
        std::iter::once(("line_items.price", li.price))
            .chain(li.modifiers().into_iter().map(|m| ("modifiers.price", m.price)))
    });
    let shipping = event
        .shipping_lines
        .iter()
        .map(|s| ("shipping_lines.price", s.price));

    let mut amounts = order.into_iter().chain(lines).chain(shipping);
    match amounts.find(|(_, amount)| !in_range(*amount)) {
        Some((field, amount)) => Err(DispatchError::Validation(format!(
            "{field} {amount} exceeds {MAX_AMOUNT}"
        ))),
        None => Ok(()),
    }
}

fn unwrap_payload(value: Value) -> Result<Value, DispatchError> {
    match value {
        Value::String(inner) => serde_json::from_str(&inner)
            .map_err(|e| DispatchError::Validation(format!("embedded order is not JSON: {e}"))),
        Value::Object(mut map) if !map.contains_key("id") && map.contains_key("body") => {
            match map.remove("body") {
                Some(Value::String(inner)) => serde_json::from_str(&inner).map_err(|e| {
                    DispatchError::Validation(format!("envelope body is not JSON: {e}"))
                }),
                Some(inner) => Ok(inner),
                None => Ok(Value::Object(map)),
            }
        }
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_object() {
        let event = parse_event(br#"{"id": 1001, "total_price": "24.00"}"#).unwrap();
        assert_eq!(event.order_id(), "1001");
    }

    #[test]
    fn test_string_wrapped_object() {
        let body = serde_json::to_vec(&Value::String(r#"{"id": "1002"}"#.into())).unwrap();
        assert_eq!(parse_event(&body).unwrap().order_id(), "1002");
    }

    #[test]
    fn test_envelope() {
        let body = br##"{"body": "{\"id\": 1003, \"name\": \"#1003\"}"}"##;
        let event = parse_event(body).unwrap();
        assert_eq!(event.order_id(), "1003");
        assert_eq!(event.display_number(), "1003");

        let body = br#"{"body": {"id": 1004}}"#;
        assert_eq!(parse_event(body).unwrap().order_id(), "1004");
    }

    #[test]
    fn test_rejects_missing_identity() {
        for body in [
            &br#"{"total_price": "1.00"}"#[..],
            br#"{"id": null}"#,
            br#"{"id": ""}"#,
            br#"{"id": 0}"#,
        ] {
            assert!(matches!(
                parse_event(body),
                Err(DispatchError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_rejects_out_of_range_amounts() {
        for body in [
            &br#"{"id": 7, "total_price": "1000000000000000000000000000"}"#[..],
            br#"{"id": 7, "line_items": [{"title": "Cake", "price": "1000000000000000000000000000"}]}"#,
            br#"{"id": 7, "shipping_lines": [{"title": "Courier", "price": "-2000000000000"}]}"#,
        ] {
            let err = parse_event(body).unwrap_err();
            assert!(matches!(err, DispatchError::Validation(ref msg) if msg.contains("exceeds")));
        }
        assert!(parse_event(br#"{"id": 7, "total_price": "999999.99"}"#).is_ok());
    }

    #[test]
    fn test_rejects_non_json() {
        assert!(matches!(
            parse_event(b"not json"),
            Err(DispatchError::Validation(_))
        ));
        assert!(matches!(
            parse_event(b"[1, 2]"),
            Err(DispatchError::Validation(_))
        ));
    }
}

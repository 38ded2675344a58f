//! Terminal stand-in for the hosted payment widget.
//!
//! Prints the options the widget would be opened with and asks for the
//! payment id the gateway issued (pay in the gateway dashboard or with its
//! test card, then paste the id).

use async_trait::async_trait;
use bakehouse_core::Price;
use bakehouse_storefront::checkout::{
    PaymentConfirmation, PaymentFailure, PaymentGateway, PaymentOutcome, PaymentRequest,
};
use rust_decimal::Decimal;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

/// Reads the payment outcome from stdin.
#[derive(Debug, Default)]
pub struct ConsolePaymentGateway;

impl ConsolePaymentGateway {
    pub const fn new() -> Self {
        Self
    }
}

/// Turn one line of input into an outcome.
///
/// - blank: the customer closed the widget
/// - `fail: <reason>`: the gateway declined
/// - anything else: the payment id
fn parse_answer(line: &str, request: &PaymentRequest) -> PaymentOutcome {
    let line = line.trim();
    if line.is_empty() {
        return PaymentOutcome::Dismissed;
    }

    if let Some(reason) = line.strip_prefix("fail:") {
        let reason = reason.trim();
        return PaymentOutcome::Failed(PaymentFailure {
            code: None,
            description: if reason.is_empty() {
                "Payment declined".to_string()
            } else {
                reason.to_string()
            },
        });
    }

    PaymentOutcome::Completed(PaymentConfirmation {
        payment_id: line.to_string(),
        provider_order_id: Some(request.order_id.clone()),
        signature: None,
    })
}

#[async_trait]
impl PaymentGateway for ConsolePaymentGateway {
    async fn open(&self, request: PaymentRequest) -> PaymentOutcome {
        let exponent = bakehouse_core::minor_unit_exponent(&request.currency);
        let amount = Price::new(Decimal::new(request.amount, exponent), request.currency.clone());

        #[allow(clippy::print_stdout)]
        {
            println!("\n{} - pay {}", request.name, amount.display());
            match serde_json::to_string_pretty(&request) {
                Ok(options) => println!("Widget options:\n{options}"),
                Err(e) => warn!(error = %e, "Could not render payment options"),
            }
            println!(
                "\nEnter the payment id once paid, `fail: <reason>` if it was declined, \
                 or leave blank to cancel:"
            );
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        match lines.next_line().await {
            Ok(Some(line)) => parse_answer(&line, &request),
            Ok(None) => PaymentOutcome::Dismissed,
            Err(e) => {
                warn!(error = %e, "Could not read payment answer");
                PaymentOutcome::Dismissed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> PaymentRequest {
        PaymentRequest {
            key: "rzp_test_key".to_string(),
            amount: 215_000,
            currency: "INR".to_string(),
            order_id: "order_rzp_1".to_string(),
            name: "Bakehouse".to_string(),
            description: "Order order-1".to_string(),
            prefill: bakehouse_storefront::checkout::PaymentPrefill::default(),
            notes: std::collections::BTreeMap::new(),
        }
    }

    #[test]
    fn test_blank_answer_dismisses() {
        assert_eq!(parse_answer("  \n", &request()), PaymentOutcome::Dismissed);
    }

    #[test]
    fn test_fail_answer() {
        let PaymentOutcome::Failed(failure) = parse_answer("fail: card declined", &request()) else {
            panic!("expected a failure");
        };
        assert_eq!(failure.description, "card declined");

        let PaymentOutcome::Failed(failure) = parse_answer("fail:", &request()) else {
            panic!("expected a failure");
        };
        assert_eq!(failure.description, "Payment declined");
    }

    #[test]
    fn test_payment_id_completes() {
        let PaymentOutcome::Completed(confirmation) = parse_answer("pay_123\n", &request()) else {
            panic!("expected a completed payment");
        };
        assert_eq!(confirmation.payment_id, "pay_123");
        assert_eq!(confirmation.provider_order_id.as_deref(), Some("order_rzp_1"));
    }
}

pub mod webhook;

pub use webhook::{process_webhook, PaymentEvent, WebhookError, WebhookOutcome};

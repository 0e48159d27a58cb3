//! Payment gateway integration.
//!
//! [`PaymentGateway`] abstracts the external card processor. Two
//! implementations ship with the gateway: [`HttpPaymentGateway`] for a
//! Stripe-compatible API and [`SandboxGateway`] for local runs. Inbound
//! notifications are authenticated by [`WebhookVerifier`].

pub mod gateway;
pub mod http;
pub mod sandbox;
pub mod webhook;

pub use gateway::{
    IntentMetadata, IntentSnapshot, IntentStatus, PaymentGateway, PaymentGatewayError,
    PaymentIntent, PaymentOutcome,
};
pub use http::HttpPaymentGateway;
pub use sandbox::SandboxGateway;
pub use webhook::{GatewayEvent, GatewayEventKind, SIGNATURE_HEADER, WebhookError, WebhookVerifier};

//! Submit one sample document against the production endpoint.
//!
//! Run with: `cargo run --example create_document -- <signature>`
use crpt_api::telemetry::LogSink;
use crpt_api::{CrptApi, Document, Product};
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let signature = std::env::args().nth(1).unwrap_or_else(|| "test-signature".to_string());

    let api = CrptApi::builder()
        .request_limit(10)
        .window(Duration::from_secs(1))
        .max_wait(Duration::from_secs(30))
        .request_timeout(Duration::from_secs(15))
        .with_sink(Arc::new(LogSink))
        .build()?;

    let document = Document::new()
        .with_doc_id("test-doc-id")
        .with_owner_inn("test-owner-inn")
        .with_participant_inn("test-participant-inn")
        .with_producer_inn("test-producer-inn")
        .with_production_date("2022-01-01")
        .with_reg_date("2022-01-01")
        .with_reg_number("test-reg-number")
        .with_product(
            Product::new()
                .with_owner_inn("test-owner-inn")
                .with_producer_inn("test-producer-inn")
                .with_tnved_code("test-tnved-code")
                .with_uit_code("test-uit-code")
                .with_uitu_code("test-uitu-code"),
        );

    match api.create_document(&document, &signature) {
        Ok(created) => println!("Response: {:?}", created),
        Err(err) => eprintln!("create_document failed: {}", err),
    }
    Ok(())
}

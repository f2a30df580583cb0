//! Counter client example exercising the public invocation contract.
//!
//! A scripted in-proc peer plays the remote counter; the client connects,
//! fires a batch of `increment_and_get` requests with closures, and awaits
//! the futures.
//!
//! Run with: `cargo run --example counter_client -p hawser`

use std::sync::Arc;
use std::time::Instant;

use hawser::prelude::*;
use hawser_testkit::{
    INCREMENT_AND_GET, IncrementAndGetRequest, IncrementAndGetResponse, counter_peer,
};
use hawser_transport_mem::InProcTransport;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    rt.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let leader: Endpoint = "127.0.0.1:9000".parse()?;

    // Script the remote peer. A real deployment registers a network
    // transport here instead.
    let transport = InProcTransport::new();
    transport.register_peer(leader.connection_key(), counter_peer(0));

    let service = Arc::new(ClientService::new(transport));
    service.init(RpcOptions::default())?;

    if !service.connect(&leader).await? {
        return Err("failed to connect to leader".into());
    }
    println!("connected to {leader}");

    let n = 1000u64;
    let start = Instant::now();
    let mut futures = Vec::with_capacity(n as usize);
    for i in 0..n {
        let request = Message::App(AppMessage::encode(
            INCREMENT_AND_GET,
            &IncrementAndGetRequest { delta: 1 },
        )?);
        let done: Box<dyn ResponseClosure> = Box::new(move |status: Status, _response: Option<Message>| {
            if !status.is_ok() {
                eprintln!("request {i} failed: {status}");
            }
        });
        futures.push(service.invoke_with_done(&leader, request, Some(done), None));
    }

    let mut last = 0;
    for future in futures {
        let reply = future.await?;
        if let Some(app) = reply.as_app() {
            let response: IncrementAndGetResponse = app.decode()?;
            last = response.value;
        }
    }
    println!(
        "{n} ops, final value {last}, cost: {} ms",
        start.elapsed().as_millis()
    );

    service.shutdown();
    Ok(())
}

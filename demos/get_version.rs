//! Ask a controller on a local serial port for its library version.
//!
//! ```text
//! cargo run --example get_version --features serial -- /dev/ttyACM0
//! ```

use std::time::Duration;

use zwave_serial::transport::{SerialSettings, SerialTransport};
use zwave_serial::{Coordinator, LinkEvent, Message, TransactionOutcome};

#[tokio::main(flavor = "current_thread")]
async fn main() -> zwave_serial::Result<()> {
    let path = std::env::args().nth(1).unwrap_or_else(|| SerialSettings::default().path);

    let (link, mut events) = Coordinator::builder()
        .tx_timeout(Duration::from_secs(2))
        .spawn(SerialTransport::new(SerialSettings::new(path)))?;

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                LinkEvent::Unsolicited(message) => println!("unsolicited: {:?}", message),
                other => println!("event: {:?}", other),
            }
        }
    });

    link.open().await?;

    match link.request_version().await?.await? {
        TransactionOutcome::Completed(replies) => {
            for reply in replies {
                if let Message::Version(version) = reply {
                    println!("controller version: {}", version.controller_version().trim_end_matches('\0'));
                }
            }
        }
        TransactionOutcome::TimeoutExhausted => println!("controller did not answer"),
        TransactionOutcome::Failed(e) => println!("request failed: {}", e),
    }

    link.close().await
}
